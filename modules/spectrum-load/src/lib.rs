//! Traffic generation against the journal.
//!
//! A [`Strategy`] is one kind of visitor; [`AllOf`] mixes visitors by weight
//! and [`Limit`] drives the mix for a number of iterations.

pub mod all_of;
pub mod behaviors;
pub mod error;
pub mod journal;
pub mod limit;
pub mod profiles;
pub mod queue;
pub mod registry;
pub mod strategy;

pub use all_of::AllOf;
pub use behaviors::{
    invented_word, JournalHomepage, JournalListing, JournalListingOfListing, JournalPage,
    JournalProfile, JournalSearch,
};
pub use error::{LoadError, Result};
pub use journal::Journal;
pub use limit::Limit;
pub use queue::CrawlQueue;
pub use registry::{StrategyRegistry, JOURNAL_STRATEGIES};
pub use strategy::Strategy;
