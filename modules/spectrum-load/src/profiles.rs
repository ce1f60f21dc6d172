//! Crawling many profiles at once, one weighted crawler per profile.

use std::sync::Arc;

use spectrum_checks::ApiCheck;
use tracing::info;

use crate::all_of::AllOf;
use crate::behaviors::JournalProfile;
use crate::error::Result;
use crate::journal::Journal;
use crate::strategy::Strategy;

/// Query string that lets crawlers past the journal's bot protection.
pub const OPEN_SESAME: &str = "open-sesame";

/// Profile ids, one per line; blank lines are skipped.
pub fn read_profile_ids(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Assert each profile exists on the API and log how many annotations it has.
pub async fn check_profiles_on_api(api: &ApiCheck, ids: &[String]) -> Result<()> {
    for id in ids {
        api.profile(id).await?;
        let annotations = api.annotations(id, "public").await?;
        info!(profile = %id, annotations = %annotations["total"], "Profile checked on api");
    }
    Ok(())
}

/// An equally weighted crawl over `/profiles/{id}` for every id.
pub fn profile_crawlers(journal: Arc<dyn Journal>, ids: &[String]) -> Result<AllOf> {
    let actions = ids
        .iter()
        .map(|id| {
            info!(profile = %id, "Profile");
            let crawler: Box<dyn Strategy> =
                Box::new(JournalProfile::new(journal.clone(), format!("/profiles/{id}")));
            (crawler, 1)
        })
        .collect();
    AllOf::new(actions)
}
