use anyhow::Result;
use clap::Parser;
use titanic_chat::cli::CliArgs;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let filter = if args.verbose {
        "titanic_chat=debug"
    } else {
        "titanic_chat=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    titanic_chat::run(args).await
}
