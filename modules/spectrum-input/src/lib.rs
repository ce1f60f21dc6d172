//! Actions that start workflows on the system under test.

pub mod articles;
pub mod bucket;
pub mod dashboard;

pub use articles::{last_run_id, Articles};
pub use bucket::InputBucket;
pub use dashboard::Dashboard;
