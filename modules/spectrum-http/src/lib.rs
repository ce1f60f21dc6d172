pub mod client;
pub mod error;
pub mod policy;

pub use client::{ClientOptions, RetryingClient, HTTP_TIMEOUT};
pub use error::{HttpError, Result};
pub use policy::{persistently, HasStatus, RetryPolicy, BACKOFF_BASE, MAX_TRIES};
pub use reqwest::header::HeaderMap;
