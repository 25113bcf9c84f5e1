//! Chart rendering to base64-encoded PNG, and the per-request slot that carries
//! a rendered chart past the agent to the HTTP response.

mod canvas;
mod font;
mod render;
mod slot;
mod theme;

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::Dataset;

pub use slot::ChartSlot;
pub use theme::ChartTheme;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    AgeHistogram,
    EmbarkationBarChart,
    SurvivalPieChart,
    SexDistributionPieChart,
    SurvivalByClassBarChart,
    TopWealthiestBarChart,
}

impl ChartKind {
    pub const ALL: [ChartKind; 6] = [
        ChartKind::AgeHistogram,
        ChartKind::EmbarkationBarChart,
        ChartKind::SurvivalPieChart,
        ChartKind::SexDistributionPieChart,
        ChartKind::SurvivalByClassBarChart,
        ChartKind::TopWealthiestBarChart,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ChartKind::AgeHistogram => "age_histogram",
            ChartKind::EmbarkationBarChart => "embarkation_bar_chart",
            ChartKind::SurvivalPieChart => "survival_pie_chart",
            ChartKind::SexDistributionPieChart => "sex_distribution_pie_chart",
            ChartKind::SurvivalByClassBarChart => "survival_by_class_bar_chart",
            ChartKind::TopWealthiestBarChart => "top_wealthiest_bar_chart",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ChartPayload {
    /// Base64 (standard alphabet, padded) PNG bytes.
    pub encoded_image: String,
    pub kind: ChartKind,
}

impl fmt::Debug for ChartPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChartPayload")
            .field("kind", &self.kind)
            .field("encoded_len", &self.encoded_image.len())
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("no data available for {0}")]
    NoData(ChartKind),
    #[error("failed to encode {kind} as PNG: {source}")]
    Encode {
        kind: ChartKind,
        #[source]
        source: image::ImageError,
    },
}

/// Renders `kind` from `dataset` and returns the PNG as base64.
pub fn render(kind: ChartKind, dataset: &Dataset) -> Result<String, ChartError> {
    let canvas = render::draw(kind, dataset, &ChartTheme::DARK)?;
    let png = canvas
        .encode_png()
        .map_err(|source| ChartError::Encode { kind, source })?;
    tracing::debug!(
        chart = %kind,
        width = canvas.width(),
        height = canvas.height(),
        bytes = png.len(),
        "rendered chart"
    );
    Ok(STANDARD.encode(png))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::sample_dataset;
    use base64::Engine;

    const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

    #[test]
    fn every_kind_renders_a_png() {
        let dataset = sample_dataset();
        for kind in ChartKind::ALL {
            let encoded = render(kind, &dataset).expect("render");
            let bytes = STANDARD.decode(encoded).expect("base64");
            assert!(bytes.starts_with(PNG_SIGNATURE), "{kind}");
        }
    }

    #[test]
    fn rendering_is_deterministic() {
        let dataset = sample_dataset();
        let first = render(ChartKind::SurvivalPieChart, &dataset).expect("render");
        let second = render(ChartKind::SurvivalPieChart, &dataset).expect("render");
        assert_eq!(first, second);
    }

    #[test]
    fn kinds_serialize_to_their_identifiers() {
        for kind in ChartKind::ALL {
            let json = serde_json::to_string(&kind).expect("json");
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn empty_dataset_has_nothing_to_draw() {
        let dataset = Dataset::default();
        for kind in ChartKind::ALL {
            assert!(
                matches!(render(kind, &dataset), Err(ChartError::NoData(k)) if k == kind),
                "{kind}"
            );
        }
    }

    #[test]
    fn payload_debug_omits_image_bytes() {
        let payload = ChartPayload {
            encoded_image: "A".repeat(64),
            kind: ChartKind::AgeHistogram,
        };
        let debug = format!("{payload:?}");
        assert!(debug.contains("encoded_len: 64"));
        assert!(!debug.contains("AAAA"));
    }
}
