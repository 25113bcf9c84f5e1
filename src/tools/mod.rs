//! Callable tools exposed to the model: dataset queries that answer with text,
//! and chart tools that render into the request's [`ChartSlot`].

mod registry;

use thiserror::Error;

use crate::chart::{self, ChartError, ChartKind, ChartPayload, ChartSlot};
use crate::data::{DataError, DatasetSource, queries};

pub use registry::ToolRegistry;

/// Everything a tool may touch while running for one request.
#[derive(Debug, Clone, Copy)]
pub struct ToolContext<'a> {
    pub data: &'a DatasetSource,
    pub charts: &'a ChartSlot,
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("dataset unavailable: {0}")]
    DataUnavailable(#[from] DataError),
    #[error("chart rendering failed: {0}")]
    Render(#[from] ChartError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    MalePercentage,
    FemalePercentage,
    AverageFare,
    SurvivalRate,
    EmbarkationCounts,
    AgeStats,
    TotalPassengers,
    DatasetSummary,
    ClassDistribution,
    SurvivalBySex,
    Chart(ChartKind),
}

impl Tool {
    pub const QUERIES: [Tool; 10] = [
        Tool::MalePercentage,
        Tool::FemalePercentage,
        Tool::AverageFare,
        Tool::SurvivalRate,
        Tool::EmbarkationCounts,
        Tool::AgeStats,
        Tool::TotalPassengers,
        Tool::DatasetSummary,
        Tool::ClassDistribution,
        Tool::SurvivalBySex,
    ];

    /// Query tools first, then one chart tool per chart kind.
    pub fn all() -> impl Iterator<Item = Tool> {
        Self::QUERIES
            .into_iter()
            .chain(ChartKind::ALL.into_iter().map(Tool::Chart))
    }

    pub fn name(self) -> &'static str {
        match self {
            Tool::MalePercentage => "get_male_percentage",
            Tool::FemalePercentage => "get_female_percentage",
            Tool::AverageFare => "get_average_fare",
            Tool::SurvivalRate => "get_survival_rate",
            Tool::EmbarkationCounts => "get_embarkation_counts",
            Tool::AgeStats => "get_age_stats",
            Tool::TotalPassengers => "get_total_passengers",
            Tool::DatasetSummary => "get_dataset_summary",
            Tool::ClassDistribution => "get_class_distribution",
            Tool::SurvivalBySex => "get_survival_by_sex",
            Tool::Chart(kind) => kind.as_str(),
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Tool::MalePercentage => "Returns the percentage of male passengers on the Titanic.",
            Tool::FemalePercentage => {
                "Returns the percentage of female passengers on the Titanic."
            }
            Tool::AverageFare => "Returns the average ticket fare paid by Titanic passengers.",
            Tool::SurvivalRate => {
                "Returns the overall survival rate of Titanic passengers as a percentage."
            }
            Tool::EmbarkationCounts => {
                "Returns the number of passengers per embarkation port: Southampton, Cherbourg, Queenstown."
            }
            Tool::AgeStats => "Returns the average, minimum, and maximum passenger age.",
            Tool::TotalPassengers => {
                "Returns the number of records in the dataset sample. This is a training sample, \
                 not the full Titanic manifest; the real ship carried approximately 2,224 people. \
                 Always clarify this distinction."
            }
            Tool::DatasetSummary => {
                "Returns a computed summary of the dataset: total records, survival counts, sex \
                 breakdown, average fare and age. Use when the user asks for an overview or \
                 general statistics."
            }
            Tool::ClassDistribution => {
                "Returns the number of passengers in each travel class (1st, 2nd, 3rd)."
            }
            Tool::SurvivalBySex => {
                "Returns survival counts and rates broken down by sex (male vs female)."
            }
            Tool::Chart(ChartKind::AgeHistogram) => {
                "Generates a histogram of passenger age distribution. Use when the user asks for \
                 an age chart or age histogram."
            }
            Tool::Chart(ChartKind::EmbarkationBarChart) => {
                "Generates a bar chart of passengers per embarkation port. Use when the user asks \
                 for an embarkation chart."
            }
            Tool::Chart(ChartKind::SurvivalPieChart) => {
                "Generates a pie chart of survived vs did-not-survive passengers. Use when the \
                 user asks for an overall survival chart."
            }
            Tool::Chart(ChartKind::SexDistributionPieChart) => {
                "Generates a pie chart showing the distribution of male and female passengers. \
                 Use when the user asks for a chart of males and females, or sex distribution. \
                 It does not show survival."
            }
            Tool::Chart(ChartKind::SurvivalByClassBarChart) => {
                "Generates a bar chart of survival by passenger class (1st, 2nd, 3rd). Use when \
                 asked about survival across classes."
            }
            Tool::Chart(ChartKind::TopWealthiestBarChart) => {
                "Generates a horizontal bar chart of the top 50 wealthiest passengers by ticket \
                 fare. Use when the user asks for a chart of the wealthiest, richest, or top \
                 passengers."
            }
        }
    }

    pub fn chart_kind(self) -> Option<ChartKind> {
        match self {
            Tool::Chart(kind) => Some(kind),
            _ => None,
        }
    }

    /// Runs the tool. Chart tools store their image in `ctx.charts` and return
    /// only a short confirmation, so image bytes never enter the conversation.
    pub fn invoke(self, ctx: &ToolContext<'_>) -> Result<String, ToolError> {
        let dataset = ctx.data.get()?;
        let text = match self {
            Tool::MalePercentage => queries::male_percentage(&dataset),
            Tool::FemalePercentage => queries::female_percentage(&dataset),
            Tool::AverageFare => queries::average_fare(&dataset),
            Tool::SurvivalRate => queries::survival_rate(&dataset),
            Tool::EmbarkationCounts => queries::embarkation_counts(&dataset),
            Tool::AgeStats => queries::age_stats(&dataset),
            Tool::TotalPassengers => queries::total_passengers(&dataset),
            Tool::DatasetSummary => queries::dataset_summary(&dataset),
            Tool::ClassDistribution => queries::class_distribution(&dataset),
            Tool::SurvivalBySex => queries::survival_by_sex(&dataset),
            Tool::Chart(kind) => {
                let encoded_image = chart::render(kind, &dataset)?;
                ctx.charts.store(ChartPayload {
                    encoded_image,
                    kind,
                });
                chart_confirmation(kind).to_string()
            }
        };
        Ok(text)
    }
}

fn chart_confirmation(kind: ChartKind) -> &'static str {
    match kind {
        ChartKind::AgeHistogram => {
            "Age distribution histogram generated and will be displayed to the user."
        }
        ChartKind::EmbarkationBarChart => {
            "Embarkation port bar chart generated and will be displayed to the user."
        }
        ChartKind::SurvivalPieChart => {
            "Survival pie chart generated and will be displayed to the user."
        }
        ChartKind::SexDistributionPieChart => {
            "Sex distribution pie chart generated and will be displayed to the user."
        }
        ChartKind::SurvivalByClassBarChart => {
            "Survival by class bar chart generated and will be displayed to the user."
        }
        ChartKind::TopWealthiestBarChart => {
            "Top 50 wealthiest passengers chart generated and will be displayed to the user."
        }
    }
}
