//! Load tests profiles and their annotations, on the API and the journal.
//!
//! Usage: load-profiles profile_ids.txt --check api --limit 100

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use spectrum_checks::{Catalog, ObjectStoreListing, ResourceMethod};
use spectrum_common::Config;
use spectrum_load::profiles::{check_profiles_on_api, profile_crawlers, read_profile_ids, OPEN_SESAME};
use spectrum_load::{Journal, Limit};
use tracing::{error, info};

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Service {
    Api,
    Journal,
}

#[derive(Parser)]
#[command(name = "load-profiles")]
#[command(about = "Load tests profiles and annotations, data and pages")]
struct Cli {
    /// File from which to read profile ids
    profile_ids: PathBuf,

    /// Which service to run checks on
    #[arg(long, value_enum, default_value_t = Service::Journal)]
    check: Service,

    /// The maximum number of iterations before stopping
    #[arg(long)]
    limit: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    spectrum_common::logging::init();

    if let Err(e) = run(Cli::parse()).await {
        error!("{e:#}");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env()?;
    let catalog = Catalog::from_settings(&config.settings, Arc::new(ObjectStoreListing::new()))?;

    let contents = std::fs::read_to_string(&cli.profile_ids)
        .with_context(|| format!("Cannot read profile ids from {}", cli.profile_ids.display()))?;
    let ids = read_profile_ids(&contents);
    info!(profiles = ids.len(), "Read profile ids");

    if cli.check == Service::Api {
        check_profiles_on_api(&catalog.api, &ids).await?;
    }

    let journal: Arc<dyn Journal> = Arc::new(
        catalog
            .journal
            .with_resource_checking_method(ResourceMethod::Head)
            .with_query_string(OPEN_SESAME),
    );
    let mut crawlers = profile_crawlers(journal, &ids)?;
    let limit = Limit::new(cli.limit);
    info!(limit = %limit, "Setting iterations limit");
    limit.run(&mut crawlers).await?;
    Ok(())
}
