//! Read-only, headless checks against the services under test.
//!
//! Covers REST JSON APIs, HTML pages and everything they embed, RSS reports,
//! captured email and the presence or recent modification of stored objects.

pub mod api;
pub mod bucket;
pub mod catalog;
pub mod check;
pub mod dashboard;
pub mod feed;
pub mod http_page;
pub mod journal;
pub mod lax;
pub mod mail;
pub mod resources;

pub use api::{ApiCheck, ItemCheck};
pub use bucket::{
    BucketFileCheck, BucketMatch, BucketQuery, ObjectListing, ObjectStoreListing, StoredObject,
};
pub use catalog::{
    Catalog, JOURNAL_GENERIC_PATHS, JOURNAL_LISTING_OF_LISTING_PATHS, JOURNAL_LISTING_PATHS,
};
pub use check::{fill_template, wait_for, Check, Fields};
pub use dashboard::{DashboardArticleCheck, DashboardQuery, RunFilter};
pub use feed::{ObserverCheck, ReportItem};
pub use http_page::{ContentQuery, GithubCheck, HttpCheck};
pub use journal::{JournalCheck, LoadedPage};
pub use lax::{LaxArticleCheck, LaxQuery};
pub use mail::{MailMessage, MailcatcherCheck};
pub use resources::{ResourceCache, ResourceMethod};
