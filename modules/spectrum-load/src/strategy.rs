use async_trait::async_trait;

use crate::error::Result;

/// One kind of visitor. Each `run` performs a single bounded unit of work,
/// such as loading one page, and keeps crawl state between calls.
#[async_trait]
pub trait Strategy: Send {
    fn name(&self) -> String;

    async fn run(&mut self) -> Result<()>;
}
