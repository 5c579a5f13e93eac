mod app;
mod logging;

use std::{path::PathBuf, sync::Arc};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    saturn_memory::SearchQuery,
    tracing::debug,
};

#[derive(Parser, Debug)]
#[command(
    name = "saturn",
    version,
    about = "Local semantic memory for browsed pages"
)]
struct Cli {
    /// Path to saturn.toml. Defaults to the platform config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the persisted store. Overrides config and MEMORY_DATA_DIR.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `saturn_memory=trace`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Run the HTTP API (default).
    Serve {
        /// Address to bind (host:port).
        #[arg(long)]
        bind: Option<String>,
    },
    /// Print store statistics as JSON.
    Stats,
    /// Run a semantic search and print the hits as JSON.
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        top_k: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref(), cli.json_logs)?;
    if let Some(path) = dotenv {
        debug!(path = %path.display(), "loaded .env");
    }

    let mut config = saturn_config::discover_and_load(cli.config.as_deref())
        .context("loading configuration")?;
    if let Some(dir) = cli.data_dir {
        config.memory.data_dir = Some(dir);
    }

    match cli.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            let addr = config.bind_addr()?;
            let manager = Arc::new(app::build_manager(&config).await?);
            saturn_gateway::serve(addr, manager).await
        },
        Command::Stats => {
            let manager = app::build_manager(&config).await?;
            println!("{}", serde_json::to_string_pretty(&manager.stats().await)?);
            Ok(())
        },
        Command::Search { query, top_k } => {
            let manager = app::build_manager(&config).await?;
            let hits = manager.search(&SearchQuery::new(query, top_k)).await?;
            println!("{}", serde_json::to_string_pretty(&hits)?);
            Ok(())
        },
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["saturn"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.json_logs);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "saturn",
            "search",
            "rust ownership",
            "--top-k",
            "3",
            "--data-dir",
            "/tmp/mem",
            "--json-logs",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Search {
                query: "rust ownership".into(),
                top_k: 3
            })
        );
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/mem")));
        assert!(cli.json_logs);
    }

    #[test]
    fn serve_accepts_bind() {
        let cli = Cli::try_parse_from(["saturn", "serve", "--bind", "0.0.0.0:7420"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Serve {
                bind: Some("0.0.0.0:7420".into())
            })
        );
    }

    #[test]
    fn search_requires_query() {
        assert!(Cli::try_parse_from(["saturn", "search"]).is_err());
    }
}
