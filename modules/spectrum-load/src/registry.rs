//! Named strategies selectable from the command line.

use std::collections::BTreeMap;
use std::sync::Arc;

use spectrum_checks::{JOURNAL_GENERIC_PATHS, JOURNAL_LISTING_OF_LISTING_PATHS, JOURNAL_LISTING_PATHS};

use crate::all_of::AllOf;
use crate::behaviors::{
    JournalHomepage, JournalListing, JournalListingOfListing, JournalPage, JournalSearch,
};
use crate::error::{LoadError, Result};
use crate::journal::Journal;
use crate::strategy::Strategy;

/// Names [`StrategyRegistry::journal`] registers, in registry order.
pub const JOURNAL_STRATEGIES: [&str; 6] = [
    "JOURNAL_ALL",
    "JOURNAL_HOMEPAGE",
    "JOURNAL_LISTINGS",
    "JOURNAL_LISTING_OF_LISTINGS",
    "JOURNAL_PAGES",
    "JOURNAL_SEARCH",
];

type Builder = Box<dyn Fn() -> Result<Box<dyn Strategy>> + Send + Sync>;

/// Strategy names mapped to constructors. Every build starts from fresh
/// crawl state.
#[derive(Default)]
pub struct StrategyRegistry {
    builders: BTreeMap<String, Builder>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        builder: impl Fn() -> Result<Box<dyn Strategy>> + Send + Sync + 'static,
    ) {
        self.builders.insert(name.into(), Box::new(builder));
    }

    pub fn names(&self) -> Vec<String> {
        self.builders.keys().cloned().collect()
    }

    pub fn build(&self, name: &str) -> Result<Box<dyn Strategy>> {
        match self.builders.get(name) {
            Some(builder) => builder(),
            None => Err(LoadError::UnknownStrategy {
                name: name.to_string(),
                available: self.names(),
            }),
        }
    }

    /// Reject a journal strategy name without building anything.
    pub fn check_journal_name(name: &str) -> Result<()> {
        if JOURNAL_STRATEGIES.contains(&name) {
            Ok(())
        } else {
            Err(LoadError::UnknownStrategy {
                name: name.to_string(),
                available: JOURNAL_STRATEGIES.iter().map(|s| s.to_string()).collect(),
            })
        }
    }

    /// The journal crawls: each behavior on its own plus `JOURNAL_ALL`
    /// mixing them.
    pub fn journal(journal: Arc<dyn Journal>) -> Self {
        let mut registry = Self::new();

        let j = journal.clone();
        registry.register("JOURNAL_SEARCH", move || single(JournalSearch::new(j.clone())));
        let j = journal.clone();
        registry.register("JOURNAL_LISTINGS", move || mixed(journal_listings(&j)));
        let j = journal.clone();
        registry.register("JOURNAL_LISTING_OF_LISTINGS", move || {
            mixed(journal_listings_of_listings(&j))
        });
        let j = journal.clone();
        registry.register("JOURNAL_PAGES", move || mixed(journal_pages(&j)));
        let j = journal.clone();
        registry.register("JOURNAL_HOMEPAGE", move || single(JournalHomepage::new(j.clone())));
        registry.register("JOURNAL_ALL", move || {
            let mut actions = vec![
                weighted(JournalSearch::new(journal.clone()), 4),
                weighted(JournalHomepage::new(journal.clone()), 2),
            ];
            actions.extend(journal_listings(&journal));
            actions.extend(journal_listings_of_listings(&journal));
            actions.extend(journal_pages(&journal));
            mixed(actions)
        });
        registry
    }
}

fn single(strategy: impl Strategy + 'static) -> Result<Box<dyn Strategy>> {
    Ok(Box::new(strategy))
}

fn mixed(actions: Vec<(Box<dyn Strategy>, u32)>) -> Result<Box<dyn Strategy>> {
    Ok(Box::new(AllOf::new(actions)?))
}

fn weighted(strategy: impl Strategy + 'static, weight: u32) -> (Box<dyn Strategy>, u32) {
    (Box::new(strategy), weight)
}

fn journal_listings(journal: &Arc<dyn Journal>) -> Vec<(Box<dyn Strategy>, u32)> {
    JOURNAL_LISTING_PATHS
        .iter()
        .map(|path| weighted(JournalListing::new(journal.clone(), *path), 2))
        .collect()
}

fn journal_listings_of_listings(journal: &Arc<dyn Journal>) -> Vec<(Box<dyn Strategy>, u32)> {
    JOURNAL_LISTING_OF_LISTING_PATHS
        .iter()
        .map(|path| weighted(JournalListingOfListing::new(journal.clone(), *path), 1))
        .collect()
}

fn journal_pages(journal: &Arc<dyn Journal>) -> Vec<(Box<dyn Strategy>, u32)> {
    JOURNAL_GENERIC_PATHS
        .iter()
        .map(|path| weighted(JournalPage::new(journal.clone(), *path), 1))
        .collect()
}
