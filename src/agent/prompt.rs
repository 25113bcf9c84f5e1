use crate::data::DatasetFacts;
use crate::data::queries::{HISTORICAL_DEATHS, HISTORICAL_TOTAL_ABOARD, with_thousands};

/// Appended to the system instruction for the final, tool-free answer request.
pub const FINALIZE_INSTRUCTION: &str = "The tool loop is complete. Do not call functions. \
Provide the best concise plain-text answer from the tool results already gathered.";

pub const REPAIR_PROMPT: &str = "Your previous response was invalid. Either call one of the \
declared functions or provide a non-empty plain-text answer.";

/// Builds the agent's system instruction. Dataset figures are taken from the
/// live data; when the dataset could not be read they are written as
/// "unknown".
pub fn build_system_prompt(facts: Option<DatasetFacts>) -> String {
    let (total, survived, not_survived, rate) = match facts {
        Some(facts) => (
            facts.total.to_string(),
            facts.survived.to_string(),
            facts.not_survived.to_string(),
            format!("{}%", facts.survival_rate),
        ),
        None => {
            let unknown = || "unknown".to_string();
            (unknown(), unknown(), unknown(), unknown())
        }
    };
    let aboard = with_thousands(HISTORICAL_TOTAL_ABOARD);
    let deaths = with_thousands(HISTORICAL_DEATHS);

    format!(
        r#"You are a friendly data analyst specialized in the Titanic passenger dataset. You have tools that query the dataset and generate charts.

Rules:
1) Always use tools to answer data questions. Never guess numbers.
2) When the user asks for a chart or histogram, call the matching chart tool, then briefly describe what the chart shows.
3) Keep answers concise and easy to understand.
4) Keep the full conversation in mind. Resolve pronouns such as "their" or "those" against earlier turns.

Dataset versus history:
The dataset contains {total} passenger records. It is a well-known training sample, not the complete Titanic manifest. The real ship carried approximately {aboard} people and around {deaths} perished.
Dataset figures for reference: {total} total records, {survived} survived, {not_survived} did not survive, {rate} survival rate.
Never use dataset numbers to make claims about the historical event. When answering from the dataset, say "in this dataset" or "among the {total} records". When the user asks about historical totals, answer from historical knowledge and note that it differs from the dataset sample.
Example: asked "how many didn't survive", answer: "Historically, around {deaths} of the ~{aboard} aboard perished. In this {total}-record dataset, {not_survived} passengers did not survive.""#
    )
}

#[cfg(test)]
mod tests {
    use super::build_system_prompt;
    use crate::data::fixtures::sample_dataset;

    #[test]
    fn prompt_quotes_live_figures() {
        let prompt = build_system_prompt(Some(sample_dataset().facts()));
        assert!(prompt.contains("The dataset contains 15 passenger records"));
        assert!(prompt.contains("9 survived, 6 did not survive, 60% survival rate"));
        assert!(prompt.contains("among the 15 records"));
        assert!(prompt.contains("approximately 2,224 people"));
        assert!(prompt.contains("around 1,500 perished"));
    }

    #[test]
    fn prompt_marks_figures_unknown_without_dataset() {
        let prompt = build_system_prompt(None);
        assert!(prompt.contains("The dataset contains unknown passenger records"));
        assert!(prompt.contains("unknown survival rate"));
        assert!(!prompt.contains("{total}"));
    }
}
