pub mod agent;
pub mod chart;
pub mod chat;
pub mod cli;
pub mod config;
pub mod data;
pub mod http;
pub mod llm;
pub mod server;
pub mod tools;

use agent::Agent;
use agent::prompt::build_system_prompt;
use anyhow::Result;
use chat::{ChatRequest, ChatService};
use cli::{CliArgs, Command, print_response, write_chart};
use config::AppConfig;
use data::DatasetSource;
use http::{HttpClient, HttpDebugConfig};
use llm::AnyProvider;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

pub async fn run(args: CliArgs) -> Result<()> {
    let config = AppConfig::load_with_path(args.config.as_deref())?;
    let service = Arc::new(build_service(&config, args.verbose));

    match args.command {
        Command::Serve { host, port } => {
            let addr = SocketAddr::new(host.unwrap_or(config.host), port.unwrap_or(config.port));
            server::serve(service, addr).await
        }
        Command::Ask {
            question,
            chart_out,
        } => {
            let response = service.answer(ChatRequest::new(question)).await?;
            let written = write_chart(&response, chart_out.as_deref())?;
            print_response(
                &mut io::stdout().lock(),
                &response,
                chart_out.as_deref(),
                written,
            )?;
            Ok(())
        }
    }
}

/// Loads the dataset facts for the system prompt and builds the provider.
/// A provider that cannot be built leaves the service in degraded mode.
pub fn build_service(config: &AppConfig, verbose: bool) -> ChatService {
    let data = Arc::new(DatasetSource::new(config.dataset_path.clone()));
    let facts = match data.get() {
        Ok(dataset) => Some(dataset.facts()),
        Err(err) => {
            tracing::warn!(error = %err, "dataset unavailable at startup, prompt figures unknown");
            None
        }
    };
    let system_prompt = build_system_prompt(facts);

    let http = HttpClient::new(reqwest::Client::new(), HttpDebugConfig::from_verbose(verbose));
    let service = match AnyProvider::new(config.provider, http, config.provider_settings()) {
        Ok(provider) => {
            tracing::info!(
                provider = %provider.kind(),
                model = provider.model(),
                "agent ready"
            );
            ChatService::new(Agent::new(provider, system_prompt), data)
        }
        Err(err) => {
            tracing::error!(error = %err, "agent unavailable, every answer will be degraded");
            ChatService::unavailable(data)
        }
    };

    service.with_request_timeout(config.request_timeout)
}

#[cfg(test)]
mod tests {
    use super::build_service;
    use crate::config::{AppConfig, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TEMPERATURE};
    use crate::llm::ProviderKind;
    use std::path::PathBuf;
    use std::time::Duration;

    fn config(api_key: Option<&str>, dataset_path: &str) -> AppConfig {
        AppConfig {
            config_path: PathBuf::from("config.toml"),
            provider: ProviderKind::Groq,
            api_key: api_key.map(ToOwned::to_owned),
            model: ProviderKind::Groq.default_model().to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            temperature: DEFAULT_TEMPERATURE,
            dataset_path: PathBuf::from(dataset_path),
            host: DEFAULT_HOST,
            port: DEFAULT_PORT,
            request_timeout: Duration::from_secs(5),
        }
    }

    const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/passengers.csv");

    #[test]
    fn service_with_key_and_dataset_is_available() {
        let service = build_service(&config(Some("key"), FIXTURE), false);
        assert!(service.is_available());
        assert!(service.data().is_loaded());
    }

    #[test]
    fn missing_key_degrades_service() {
        let service = build_service(&config(None, FIXTURE), false);
        assert!(!service.is_available());
    }

    #[test]
    fn missing_dataset_still_builds_service() {
        let service = build_service(&config(Some("key"), "/missing/titanic.csv"), false);
        assert!(service.is_available());
        assert!(!service.data().is_loaded());
    }
}
