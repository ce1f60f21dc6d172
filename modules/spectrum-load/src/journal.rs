use async_trait::async_trait;
use spectrum_checks::JournalCheck;
use spectrum_poll::Result;

/// The journal pages a crawler can visit.
#[async_trait]
pub trait Journal: Send + Sync {
    /// Result links of a search.
    async fn search(&self, query: &str) -> Result<Vec<String>>;

    /// Item links and further page links of a listing.
    async fn listing(&self, path: &str) -> Result<(Vec<String>, Vec<String>)>;

    /// Child listings of a listing of listings.
    async fn listing_of_listing(&self, path: &str) -> Result<Vec<String>>;

    /// Annotation links and further page links of a profile.
    async fn profile(&self, path: &str) -> Result<(Vec<String>, Vec<String>)>;

    async fn homepage(&self) -> Result<Vec<String>>;

    /// Load any page and what it embeds.
    async fn generic(&self, path: &str) -> Result<()>;
}

#[async_trait]
impl Journal for JournalCheck {
    async fn search(&self, query: &str) -> Result<Vec<String>> {
        JournalCheck::search(self, query, None).await
    }

    async fn listing(&self, path: &str) -> Result<(Vec<String>, Vec<String>)> {
        JournalCheck::listing(self, path).await
    }

    async fn listing_of_listing(&self, path: &str) -> Result<Vec<String>> {
        JournalCheck::listing_of_listing(self, path).await
    }

    async fn profile(&self, path: &str) -> Result<(Vec<String>, Vec<String>)> {
        JournalCheck::profile(self, path).await
    }

    async fn homepage(&self) -> Result<Vec<String>> {
        JournalCheck::homepage(self).await
    }

    async fn generic(&self, path: &str) -> Result<()> {
        JournalCheck::generic(self, path).await.map(|_| ())
    }
}
