//! Text renderings of dataset aggregates, worded for direct use as tool output.

use super::{Dataset, percentage, round_to};

pub const HISTORICAL_TOTAL_ABOARD: usize = 2_224;
pub const HISTORICAL_DEATHS: usize = 1_500;

pub fn male_percentage(dataset: &Dataset) -> String {
    let counts = dataset.sex_counts();
    format!("{:.2}%", percentage(counts.male, dataset.len()))
}

pub fn female_percentage(dataset: &Dataset) -> String {
    let counts = dataset.sex_counts();
    format!("{:.2}%", percentage(counts.female, dataset.len()))
}

pub fn average_fare(dataset: &Dataset) -> String {
    match dataset.average_fare() {
        Some(fare) => format!("${fare:.2}"),
        None => "No fare data available".to_string(),
    }
}

pub fn survival_rate(dataset: &Dataset) -> String {
    format!("{:.2}%", dataset.survival_rate())
}

pub fn embarkation_counts(dataset: &Dataset) -> String {
    let counts = dataset.embarkation_counts();
    if counts.is_empty() {
        return "No embarkation data available".to_string();
    }

    counts
        .iter()
        .map(|(port, count)| format!("{}: {count}", port.name()))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn age_stats(dataset: &Dataset) -> String {
    match dataset.age_stats() {
        Some(stats) => format!(
            "Average age: {:.1}, Youngest: {}, Oldest: {}",
            stats.mean,
            compact_number(stats.min),
            compact_number(stats.max)
        ),
        None => "No age data available".to_string(),
    }
}

pub fn total_passengers(dataset: &Dataset) -> String {
    format!(
        "{} records (note: this is a sample of the passenger list, not the full ~{} person manifest)",
        dataset.len(),
        with_thousands(HISTORICAL_TOTAL_ABOARD)
    )
}

pub fn dataset_summary(dataset: &Dataset) -> String {
    let facts = dataset.facts();
    let sexes = dataset.sex_counts();
    let fare = dataset
        .average_fare()
        .map_or_else(|| "n/a".to_string(), |fare| format!("${fare:.2}"));
    let age = dataset
        .age_stats()
        .map_or_else(|| "n/a".to_string(), |stats| format!("{:.1}", stats.mean));

    format!(
        "Dataset has {} records. Survived: {} ({:.2}%), Did not survive: {}. \
         Male: {}, Female: {}. Avg fare: {fare}, Avg age: {age}.",
        facts.total,
        facts.survived,
        facts.survival_rate,
        facts.not_survived,
        sexes.male,
        sexes.female,
    )
}

pub fn class_distribution(dataset: &Dataset) -> String {
    dataset
        .class_counts()
        .iter()
        .map(|(class, count)| format!("{}: {count}", class.label()))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn survival_by_sex(dataset: &Dataset) -> String {
    dataset
        .survival_by_sex()
        .iter()
        .map(|group| {
            format!(
                "{}: {}/{} survived ({:.2}%)",
                group.group.label(),
                group.survived,
                group.total,
                group.rate()
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Up to two decimals, trailing zeros dropped (`0.42`, `80`).
fn compact_number(value: f64) -> String {
    let text = format!("{:.2}", round_to(value, 2));
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

pub(crate) fn with_thousands(value: usize) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
