//! Load tests the journal with one of the named strategies.
//!
//! Usage: load JOURNAL_ALL --limit 1000

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use spectrum_checks::{Catalog, ObjectStoreListing};
use spectrum_common::Config;
use spectrum_load::{Journal, Limit, StrategyRegistry};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "load")]
#[command(about = "Load tests the journal")]
struct Cli {
    /// Strategy to use, e.g. JOURNAL_ALL
    strategy: Option<String>,

    /// The maximum number of iterations before stopping
    #[arg(long)]
    limit: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    spectrum_common::logging::init();

    let cli = Cli::parse();
    let strategy = match resolve(cli.strategy.as_deref()) {
        Ok(strategy) => strategy,
        Err(code) => return ExitCode::from(code),
    };

    match run(strategy, Limit::new(cli.limit)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

/// The strategy to run, or the exit status for a bad command line: 1 when
/// none is given, 2 when it is not a known strategy.
fn resolve(strategy: Option<&str>) -> std::result::Result<&str, u8> {
    let Some(strategy) = strategy else {
        error!("No strategy given");
        return Err(1);
    };
    if let Err(unknown) = StrategyRegistry::check_journal_name(strategy) {
        error!("{unknown}");
        return Err(2);
    }
    Ok(strategy)
}

async fn run(name: &str, limit: Limit) -> Result<()> {
    let config = Config::from_env()?;
    config.settings.log_redacted();
    let catalog = Catalog::from_settings(&config.settings, Arc::new(ObjectStoreListing::new()))?;
    let journal: Arc<dyn Journal> = Arc::new(catalog.journal);

    info!(strategy = name, "Loading strategy");
    let mut strategy = StrategyRegistry::journal(journal).build(name)?;
    info!(limit = %limit, "Setting iterations limit");
    limit.run(strategy.as_mut()).await?;
    Ok(())
}
