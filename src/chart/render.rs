use image::Rgb;

use super::canvas::Canvas;
use super::theme::ChartTheme;
use super::{ChartError, ChartKind};
use crate::data::{Dataset, Sex};

const TITLE_SCALE: u32 = 3;
const LABEL_SCALE: u32 = 2;
const TITLE_TOP: i32 = 24;
const TICK_TARGET: usize = 5;

pub(crate) const HISTOGRAM_BINS: usize = 20;
pub(crate) const WEALTHIEST_LIMIT: usize = 50;
pub(crate) const NAME_BUDGET: usize = 25;
const ROW_HEIGHT: u32 = 28;

pub(crate) fn draw(
    kind: ChartKind,
    dataset: &Dataset,
    theme: &ChartTheme,
) -> Result<Canvas, ChartError> {
    match kind {
        ChartKind::AgeHistogram => age_histogram(dataset, theme),
        ChartKind::EmbarkationBarChart => embarkation_bar_chart(dataset, theme),
        ChartKind::SurvivalPieChart => survival_pie_chart(dataset, theme),
        ChartKind::SexDistributionPieChart => sex_distribution_pie_chart(dataset, theme),
        ChartKind::SurvivalByClassBarChart => survival_by_class_bar_chart(dataset, theme),
        ChartKind::TopWealthiestBarChart => top_wealthiest_bar_chart(dataset, theme),
    }
}

fn age_histogram(dataset: &Dataset, theme: &ChartTheme) -> Result<Canvas, ChartError> {
    let stats = dataset
        .age_stats()
        .ok_or(ChartError::NoData(ChartKind::AgeHistogram))?;
    let counts = histogram_counts(&dataset.ages(), stats.min, stats.max, HISTOGRAM_BINS);

    let mut canvas = Canvas::new(960, 600, theme.background);
    draw_title(&mut canvas, theme, "Distribution of Passenger Ages");
    let area = PlotArea::new(100, 80, 920, 510);

    let max = counts.iter().copied().max().unwrap_or(0) as f64;
    let axis_top = draw_vertical_axis(&mut canvas, &area, theme, max);
    let groups: Vec<BarGroup> = counts
        .iter()
        .map(|count| BarGroup::single(String::new(), *count as f64, theme.blue))
        .collect();
    let style = BarStyle {
        gap: 0.0,
        outline: true,
        value_labels: false,
    };
    draw_vertical_bars(&mut canvas, &area, theme, &groups, axis_top, style);

    let bin_width = (stats.max - stats.min) / HISTOGRAM_BINS as f64;
    for edge in (0..=HISTOGRAM_BINS).step_by(5) {
        let x = area.left + (f64::from(area.width()) * edge as f64 / HISTOGRAM_BINS as f64) as i32;
        let label = format_tick(stats.min + bin_width * edge as f64);
        canvas.vline(x, area.bottom, area.bottom + 6, theme.border);
        canvas.text_centered(x, area.bottom + 12, &label, LABEL_SCALE, theme.text);
    }

    draw_frame(&mut canvas, &area, theme);
    draw_axis_captions(&mut canvas, &area, theme, "Age", "Number of Passengers");
    Ok(canvas)
}

fn embarkation_bar_chart(dataset: &Dataset, theme: &ChartTheme) -> Result<Canvas, ChartError> {
    let counts = dataset.embarkation_counts();
    if counts.is_empty() {
        return Err(ChartError::NoData(ChartKind::EmbarkationBarChart));
    }

    let palette = [theme.blue, theme.coral, theme.green];
    let groups: Vec<BarGroup> = counts
        .iter()
        .enumerate()
        .map(|(index, (port, count))| {
            BarGroup::single(
                port.name().to_string(),
                *count as f64,
                palette[index % palette.len()],
            )
        })
        .collect();

    let mut canvas = Canvas::new(840, 600, theme.background);
    draw_title(&mut canvas, theme, "Passengers by Port of Embarkation");
    let area = PlotArea::new(100, 80, 800, 510);

    let max = counts.iter().map(|(_, count)| *count).max().unwrap_or(0) as f64;
    let axis_top = draw_vertical_axis(&mut canvas, &area, theme, max * 1.1);
    let style = BarStyle {
        gap: 0.4,
        outline: false,
        value_labels: true,
    };
    draw_vertical_bars(&mut canvas, &area, theme, &groups, axis_top, style);
    draw_frame(&mut canvas, &area, theme);
    draw_axis_captions(&mut canvas, &area, theme, "Port", "Number of Passengers");
    Ok(canvas)
}

fn survival_pie_chart(dataset: &Dataset, theme: &ChartTheme) -> Result<Canvas, ChartError> {
    let facts = dataset.facts();
    let slices = [
        Slice {
            label: format!("Survived ({})", facts.survived),
            value: facts.survived as f64,
            color: theme.green,
        },
        Slice {
            label: format!("Did Not Survive ({})", facts.not_survived),
            value: facts.not_survived as f64,
            color: theme.coral,
        },
    ];
    pie_chart(
        ChartKind::SurvivalPieChart,
        "Passenger Survival",
        &slices,
        140.0,
        theme,
    )
}

fn sex_distribution_pie_chart(
    dataset: &Dataset,
    theme: &ChartTheme,
) -> Result<Canvas, ChartError> {
    let counts = dataset.sex_counts();
    let slices: Vec<Slice> = Sex::ALL
        .iter()
        .map(|sex| {
            let (count, color) = match sex {
                Sex::Male => (counts.male, theme.blue),
                Sex::Female => (counts.female, theme.purple),
            };
            Slice {
                label: format!("{} ({count})", sex.label()),
                value: count as f64,
                color,
            }
        })
        .collect();
    pie_chart(
        ChartKind::SexDistributionPieChart,
        "Passengers by Sex",
        &slices,
        90.0,
        theme,
    )
}

fn survival_by_class_bar_chart(
    dataset: &Dataset,
    theme: &ChartTheme,
) -> Result<Canvas, ChartError> {
    let rows = dataset.survival_by_class();
    if rows.is_empty() {
        return Err(ChartError::NoData(ChartKind::SurvivalByClassBarChart));
    }

    let groups: Vec<BarGroup> = rows
        .iter()
        .map(|row| BarGroup {
            label: row.group.short_label().to_string(),
            bars: vec![
                (row.survived as f64, theme.green),
                (row.not_survived() as f64, theme.coral),
            ],
        })
        .collect();

    let mut canvas = Canvas::new(960, 600, theme.background);
    draw_title(&mut canvas, theme, "Survival by Passenger Class");
    let area = PlotArea::new(100, 80, 920, 510);

    let max = rows
        .iter()
        .map(|row| row.survived.max(row.not_survived()))
        .max()
        .unwrap_or(0) as f64;
    let axis_top = draw_vertical_axis(&mut canvas, &area, theme, max * 1.2);
    let style = BarStyle {
        gap: 0.3,
        outline: false,
        value_labels: false,
    };
    draw_vertical_bars(&mut canvas, &area, theme, &groups, axis_top, style);
    draw_frame(&mut canvas, &area, theme);
    draw_axis_captions(&mut canvas, &area, theme, "Class", "Number of Passengers");
    draw_legend(
        &mut canvas,
        theme,
        (area.right - 280, area.top + 12),
        &[
            ("Survived".to_string(), theme.green),
            ("Did Not Survive".to_string(), theme.coral),
        ],
    );
    Ok(canvas)
}

fn top_wealthiest_bar_chart(dataset: &Dataset, theme: &ChartTheme) -> Result<Canvas, ChartError> {
    let rows = wealthiest_rows(dataset);
    let Some((_, highest)) = rows.last() else {
        return Err(ChartError::NoData(ChartKind::TopWealthiestBarChart));
    };

    let plot_height = rows.len() as u32 * ROW_HEIGHT;
    let mut canvas = Canvas::new(1200, 170 + plot_height, theme.background);
    draw_title(
        &mut canvas,
        theme,
        &format!("Top {} Wealthiest Passengers by Fare", rows.len()),
    );
    let area = PlotArea::new(380, 80, 1120, 80 + plot_height as i32);

    let axis_top = draw_horizontal_axis(&mut canvas, &area, theme, highest * 1.12);
    let text_offset = (ROW_HEIGHT - Canvas::text_height(LABEL_SCALE)) as i32 / 2;
    for (index, (name, fare)) in rows.iter().enumerate() {
        let row_top = area.bottom - (index as i32 + 1) * ROW_HEIGHT as i32;
        let bar_width = (fare / axis_top * f64::from(area.width())).round() as u32;
        canvas.fill_rect(area.left, row_top + 4, bar_width, ROW_HEIGHT - 8, theme.blue);
        canvas.text_right(
            area.left - 10,
            row_top + text_offset,
            name,
            LABEL_SCALE,
            theme.text,
        );
        canvas.text(
            area.left + bar_width as i32 + 6,
            row_top + text_offset,
            &format!("£{}", fare.trunc() as i64),
            LABEL_SCALE,
            theme.text,
        );
    }

    draw_frame(&mut canvas, &area, theme);
    canvas.text_centered(
        area.center_x(),
        area.bottom + 44,
        "Ticket Fare (£)",
        LABEL_SCALE,
        theme.text,
    );
    Ok(canvas)
}

fn pie_chart(
    kind: ChartKind,
    title: &str,
    slices: &[Slice],
    start_deg: f64,
    theme: &ChartTheme,
) -> Result<Canvas, ChartError> {
    let total: f64 = slices.iter().map(|slice| slice.value).sum();
    if total <= 0.0 {
        return Err(ChartError::NoData(kind));
    }

    let mut canvas = Canvas::new(840, 600, theme.background);
    draw_title(&mut canvas, theme, title);

    let center = (290, 330);
    let radius = 210;
    let mut angle = start_deg;
    for slice in slices {
        let sweep = slice.value / total * 360.0;
        canvas.fill_wedge(center, radius, angle, sweep, slice.color);
        angle += sweep;
    }

    // Labels go on after every wedge is filled so no wedge paints over them.
    let label_height = Canvas::text_height(LABEL_SCALE) as i32;
    let mut angle = start_deg;
    for slice in slices {
        let sweep = slice.value / total * 360.0;
        if sweep > 0.0 {
            let mid = (angle + sweep / 2.0).to_radians();
            let distance = f64::from(radius) * 0.62;
            let x = center.0 + (distance * mid.cos()).round() as i32;
            let y = center.1 - (distance * mid.sin()).round() as i32;
            let label = format!("{:.1}%", slice.value / total * 100.0);
            canvas.text_centered(x, y - label_height / 2, &label, LABEL_SCALE, theme.text);
        }
        angle += sweep;
    }

    let entries: Vec<(String, Rgb<u8>)> = slices
        .iter()
        .map(|slice| (slice.label.clone(), slice.color))
        .collect();
    draw_legend(&mut canvas, theme, (540, 280), &entries);
    Ok(canvas)
}

/// Names as shown on the wealthiest chart, ascending by fare so the highest
/// fare is drawn on the top row.
pub(crate) fn wealthiest_rows(dataset: &Dataset) -> Vec<(String, f64)> {
    let mut rows: Vec<(String, f64)> = dataset
        .top_wealthiest(WEALTHIEST_LIMIT)
        .into_iter()
        .filter_map(|passenger| {
            passenger
                .fare
                .map(|fare| (display_name(&passenger.name), fare))
        })
        .collect();
    rows.sort_by(|a, b| a.1.total_cmp(&b.1));
    rows
}

pub(crate) fn display_name(name: &str) -> String {
    if name.chars().count() <= NAME_BUDGET {
        return name.to_string();
    }
    let head: String = name.chars().take(NAME_BUDGET).collect();
    format!("{head}...")
}

/// Equal-width bins over `[min, max]`; the maximum lands in the last bin.
pub(crate) fn histogram_counts(values: &[f64], min: f64, max: f64, bins: usize) -> Vec<usize> {
    let mut counts = vec![0; bins];
    if bins == 0 {
        return counts;
    }
    let span = max - min;
    for value in values {
        let index = if span <= 0.0 {
            0
        } else {
            ((value - min) / span * bins as f64).floor().max(0.0) as usize
        };
        counts[index.min(bins - 1)] += 1;
    }
    counts
}

/// Tick spacing of 1, 2 or 5 times a power of ten.
pub(crate) fn nice_step(max: f64, target_ticks: usize) -> f64 {
    if max <= 0.0 || target_ticks == 0 {
        return 1.0;
    }
    let raw = max / target_ticks as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let normalized = raw / magnitude;
    let nice = if normalized <= 1.0 {
        1.0
    } else if normalized <= 2.0 {
        2.0
    } else if normalized <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

fn format_tick(value: f64) -> String {
    if (value - value.round()).abs() < 1e-6 {
        format!("{}", value.round() as i64)
    } else {
        format!("{value:.1}")
    }
}

struct PlotArea {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
}

impl PlotArea {
    fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    fn width(&self) -> u32 {
        (self.right - self.left).max(0) as u32
    }

    fn height(&self) -> u32 {
        (self.bottom - self.top).max(0) as u32
    }

    fn center_x(&self) -> i32 {
        self.left + (self.right - self.left) / 2
    }
}

struct BarGroup {
    label: String,
    bars: Vec<(f64, Rgb<u8>)>,
}

impl BarGroup {
    fn single(label: String, value: f64, color: Rgb<u8>) -> Self {
        Self {
            label,
            bars: vec![(value, color)],
        }
    }
}

#[derive(Clone, Copy)]
struct BarStyle {
    /// Share of each category slot left empty.
    gap: f64,
    /// Leave a one pixel background seam between adjacent bars.
    outline: bool,
    value_labels: bool,
}

struct Slice {
    label: String,
    value: f64,
    color: Rgb<u8>,
}

fn draw_title(canvas: &mut Canvas, theme: &ChartTheme, title: &str) {
    let center = canvas.width() as i32 / 2;
    canvas.text_centered(center, TITLE_TOP, title, TITLE_SCALE, theme.text);
}

fn draw_frame(canvas: &mut Canvas, area: &PlotArea, theme: &ChartTheme) {
    canvas.stroke_rect(
        area.left,
        area.top,
        area.width() + 1,
        area.height() + 1,
        theme.border,
    );
}

fn draw_axis_captions(
    canvas: &mut Canvas,
    area: &PlotArea,
    theme: &ChartTheme,
    x_caption: &str,
    y_caption: &str,
) {
    canvas.text_centered(area.center_x(), area.bottom + 44, x_caption, LABEL_SCALE, theme.text);
    canvas.text(area.left, area.top - 22, y_caption, LABEL_SCALE, theme.text);
}

/// Draws value ticks up the left edge and returns the value at the top of the
/// plot area.
fn draw_vertical_axis(canvas: &mut Canvas, area: &PlotArea, theme: &ChartTheme, max: f64) -> f64 {
    let step = nice_step(max, TICK_TARGET);
    let top = ((max / step).ceil() * step).max(step);
    let half_label = Canvas::text_height(LABEL_SCALE) as i32 / 2;
    for tick in ticks(step, top) {
        let y = area.bottom - (tick / top * f64::from(area.height())).round() as i32;
        canvas.hline(area.left - 6, area.left, y, theme.border);
        canvas.text_right(area.left - 10, y - half_label, &format_tick(tick), LABEL_SCALE, theme.text);
    }
    top
}

/// Horizontal counterpart of [`draw_vertical_axis`], ticks along the bottom.
fn draw_horizontal_axis(
    canvas: &mut Canvas,
    area: &PlotArea,
    theme: &ChartTheme,
    max: f64,
) -> f64 {
    let step = nice_step(max, TICK_TARGET);
    let top = ((max / step).ceil() * step).max(step);
    for tick in ticks(step, top) {
        let x = area.left + (tick / top * f64::from(area.width())).round() as i32;
        canvas.vline(x, area.bottom, area.bottom + 6, theme.border);
        canvas.text_centered(x, area.bottom + 12, &format_tick(tick), LABEL_SCALE, theme.text);
    }
    top
}

fn ticks(step: f64, top: f64) -> impl Iterator<Item = f64> {
    let count = (top / step).round() as usize;
    (0..=count).map(move |index| step * index as f64)
}

fn draw_vertical_bars(
    canvas: &mut Canvas,
    area: &PlotArea,
    theme: &ChartTheme,
    groups: &[BarGroup],
    axis_top: f64,
    style: BarStyle,
) {
    if groups.is_empty() || axis_top <= 0.0 {
        return;
    }
    let slot = f64::from(area.width()) / groups.len() as f64;
    let label_height = Canvas::text_height(LABEL_SCALE) as i32;

    for (index, group) in groups.iter().enumerate() {
        let slot_left = f64::from(area.left) + slot * index as f64;
        let inner = slot * (1.0 - style.gap);
        let inner_left = slot_left + (slot - inner) / 2.0;
        let bar_width = inner / group.bars.len().max(1) as f64;

        for (bar, (value, color)) in group.bars.iter().enumerate() {
            let height = (value / axis_top * f64::from(area.height())).round().max(0.0) as u32;
            let x = (inner_left + bar_width * bar as f64).round() as i32;
            let width = (bar_width.round() as i32 - i32::from(style.outline)).max(1) as u32;
            canvas.fill_rect(x, area.bottom - height as i32, width, height, *color);
            if style.value_labels {
                canvas.text_centered(
                    x + width as i32 / 2,
                    area.bottom - height as i32 - label_height - 6,
                    &format_tick(*value),
                    LABEL_SCALE,
                    theme.text,
                );
            }
        }

        if !group.label.is_empty() {
            let center = (slot_left + slot / 2.0).round() as i32;
            canvas.text_centered(center, area.bottom + 12, &group.label, LABEL_SCALE, theme.text);
        }
    }
}

fn draw_legend(
    canvas: &mut Canvas,
    theme: &ChartTheme,
    origin: (i32, i32),
    entries: &[(String, Rgb<u8>)],
) {
    const SWATCH: u32 = 18;
    const LINE: i32 = 30;
    const PADDING: i32 = 12;

    let text_width = entries
        .iter()
        .map(|(label, _)| Canvas::text_width(label, LABEL_SCALE))
        .max()
        .unwrap_or(0);
    let width = PADDING as u32 * 3 + SWATCH + text_width;
    let height = PADDING as u32 * 2 + entries.len() as u32 * LINE as u32 - (LINE as u32 - SWATCH);
    let (x, y) = origin;
    canvas.fill_rect(x, y, width, height, theme.legend_background);
    canvas.stroke_rect(x, y, width, height, theme.border);

    let text_offset = (SWATCH - Canvas::text_height(LABEL_SCALE)) as i32 / 2;
    for (index, (label, color)) in entries.iter().enumerate() {
        let row = y + PADDING + index as i32 * LINE;
        canvas.fill_rect(x + PADDING, row, SWATCH, SWATCH, *color);
        canvas.text(
            x + PADDING * 2 + SWATCH as i32,
            row + text_offset,
            label,
            LABEL_SCALE,
            theme.text,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{passenger, sample_dataset};

    #[test]
    fn histogram_puts_maximum_in_last_bin() {
        let counts = histogram_counts(&[0.0, 5.0, 10.0], 0.0, 10.0, 20);
        assert_eq!(counts.len(), 20);
        assert_eq!(counts[0], 1);
        assert_eq!(counts[10], 1);
        assert_eq!(counts[19], 1);
        assert_eq!(counts.iter().sum::<usize>(), 3);
    }

    #[test]
    fn histogram_of_single_age_uses_first_bin() {
        let counts = histogram_counts(&[30.0, 30.0], 30.0, 30.0, HISTOGRAM_BINS);
        assert_eq!(counts[0], 2);
    }

    #[test]
    fn histogram_counts_every_known_age() {
        let dataset = sample_dataset();
        let stats = dataset.age_stats().expect("ages");
        let counts = histogram_counts(&dataset.ages(), stats.min, stats.max, HISTOGRAM_BINS);
        assert_eq!(counts.iter().sum::<usize>(), stats.count);
    }

    #[test]
    fn nice_steps_are_round() {
        assert_eq!(nice_step(10.0, 5), 2.0);
        assert_eq!(nice_step(644.0, 5), 200.0);
        assert_eq!(nice_step(512.3292, 5), 200.0);
        assert_eq!(nice_step(0.0, 5), 1.0);
        assert_eq!(nice_step(3.0, 5), 1.0);
    }

    #[test]
    fn long_names_are_truncated() {
        assert_eq!(display_name("Icard, Miss. Amelie"), "Icard, Miss. Amelie");
        let long = "Cumings, Mrs. John Bradley (Florence Briggs Thayer)";
        assert_eq!(display_name(long), "Cumings, Mrs. John Bradle...");
        assert_eq!(display_name(&"x".repeat(25)), "x".repeat(25));
    }

    #[test]
    fn wealthiest_rows_end_with_highest_fare() {
        let rows = wealthiest_rows(&sample_dataset());
        assert_eq!(rows.len(), 15);
        let (name, fare) = rows.last().expect("rows");
        assert_eq!(name, "Icard, Miss. Amelie");
        assert_eq!(*fare, 80.0);
        assert!(rows.windows(2).all(|pair| pair[0].1 <= pair[1].1));
    }

    #[test]
    fn wealthiest_rows_skip_unknown_fares() {
        let dataset = Dataset::from_passengers(vec![
            passenger("A", Sex::Male, None),
            passenger("B", Sex::Female, Some(12.0)),
        ]);
        assert_eq!(wealthiest_rows(&dataset), vec![("B".to_string(), 12.0)]);
    }

    #[test]
    fn charts_paint_theme_background() {
        let theme = ChartTheme::DARK;
        for kind in ChartKind::ALL {
            let canvas = draw(kind, &sample_dataset(), &theme).expect("chart");
            assert_eq!(canvas.pixel(1, 1), theme.background, "{kind}");
        }
    }

    #[test]
    fn pie_without_counts_has_no_data() {
        let result = pie_chart(
            ChartKind::SurvivalPieChart,
            "Empty",
            &[],
            90.0,
            &ChartTheme::DARK,
        );
        assert!(matches!(
            result,
            Err(ChartError::NoData(ChartKind::SurvivalPieChart))
        ));
    }

    #[test]
    fn missing_ages_leave_histogram_without_data() {
        let dataset = Dataset::from_passengers(vec![passenger("A", Sex::Male, Some(5.0))]);
        assert!(matches!(
            draw(ChartKind::AgeHistogram, &dataset, &ChartTheme::DARK),
            Err(ChartError::NoData(ChartKind::AgeHistogram))
        ));
    }
}
