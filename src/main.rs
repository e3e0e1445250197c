use clap::Parser;
use media_wishlist::cli::{Cli, Commands, LogFormat};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "media_wishlist=info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    match cli.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    match cli.command {
        Some(Commands::Init { path }) => {
            media_wishlist::cli::init::run(&path).await?;
        }
        Some(Commands::Migrate { command }) => {
            media_wishlist::cli::migrate::run(&cli.config, command).await?;
        }
        Some(Commands::Serve { host, port }) => {
            media_wishlist::cli::serve::run(&cli.config, host, port).await?;
        }
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
        }
    }

    Ok(())
}
