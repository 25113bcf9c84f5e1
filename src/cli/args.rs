use clap::{Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone, PartialEq, Eq)]
#[command(name = "titanic_chat")]
#[command(
    about = "Ask questions about the Titanic passenger dataset",
    long_about = "Ask questions about the Titanic passenger dataset\n\nConfig file loading:\n  - --config <path> (explicit file, overrides default path discovery)\n  - Default probe path when --config is not provided:\n    1. $XDG_CONFIG_HOME/titanic-chat/config.toml\n    2. ~/.config/titanic-chat/config.toml\n\nEnvironment variables (and a .env file) override the config file."
)]
pub struct CliArgs {
    /// Load config from this file path instead of the default discovery path.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Debug-level logging, including redacted outbound HTTP traffic.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP service.
    Serve {
        #[arg(long)]
        host: Option<IpAddr>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Answer a single question and exit.
    Ask {
        question: String,
        /// Write a produced chart to this PNG file.
        #[arg(long, value_name = "FILE")]
        chart_out: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::{CliArgs, Command};
    use clap::Parser;
    use std::net::IpAddr;
    use std::path::Path;

    #[test]
    fn parse_serve_defaults() {
        let args = CliArgs::try_parse_from(["titanic_chat", "serve"]).expect("should parse");
        assert_eq!(args.config, None);
        assert!(!args.verbose);
        assert_eq!(
            args.command,
            Command::Serve {
                host: None,
                port: None
            }
        );
    }

    #[test]
    fn parse_serve_overrides() {
        let args = CliArgs::try_parse_from([
            "titanic_chat",
            "serve",
            "--host",
            "0.0.0.0",
            "--port",
            "9000",
            "--verbose",
        ])
        .expect("parse");
        assert!(args.verbose);
        assert_eq!(
            args.command,
            Command::Serve {
                host: Some(IpAddr::from([0, 0, 0, 0])),
                port: Some(9000)
            }
        );
    }

    #[test]
    fn parse_ask_with_chart_out_and_config() {
        let args = CliArgs::try_parse_from([
            "titanic_chat",
            "--config",
            "/tmp/custom.toml",
            "ask",
            "Show me an age histogram",
            "--chart-out",
            "ages.png",
        ])
        .expect("parse");
        assert_eq!(
            args.config.as_deref(),
            Some(Path::new("/tmp/custom.toml"))
        );
        let Command::Ask {
            question,
            chart_out,
        } = args.command
        else {
            panic!("expected ask command");
        };
        assert_eq!(question, "Show me an age histogram");
        assert_eq!(chart_out.as_deref(), Some(Path::new("ages.png")));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(CliArgs::try_parse_from(["titanic_chat"]).is_err());
    }

    #[test]
    fn invalid_port_is_rejected() {
        assert!(CliArgs::try_parse_from(["titanic_chat", "serve", "--port", "99999"]).is_err());
    }
}
