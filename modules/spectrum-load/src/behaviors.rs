//! Visitor behaviors. Each owns its crawl state and advances it one page per run.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use tracing::{info, warn};

use crate::error::Result;
use crate::journal::Journal;
use crate::queue::CrawlQueue;
use crate::strategy::Strategy;

const SEARCH_WORD_LENGTH: usize = 3;
const WORD_CHARACTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// A random word over lowercase letters and digits.
pub fn invented_word(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| WORD_CHARACTERS[rng.random_range(0..WORD_CHARACTERS.len())] as char)
        .collect()
}

/// Searches for invented words, then visits what each search found.
pub struct JournalSearch {
    journal: Arc<dyn Journal>,
    results: VecDeque<String>,
}

impl JournalSearch {
    pub fn new(journal: Arc<dyn Journal>) -> Self {
        Self {
            journal,
            results: VecDeque::new(),
        }
    }
}

#[async_trait]
impl Strategy for JournalSearch {
    fn name(&self) -> String {
        "JournalSearch".to_string()
    }

    async fn run(&mut self) -> Result<()> {
        if let Some(result) = self.results.pop_back() {
            info!(path = %result, "Loading search result");
            return Ok(self.journal.generic(&result).await?);
        }
        let word = invented_word(SEARCH_WORD_LENGTH);
        info!(word = %word, "Searching");
        let found = self.journal.search(&word).await?;
        self.results.extend(found.into_iter().rev());
        Ok(())
    }
}

/// Walks a paginated listing: every item of a page, then the next page.
/// Starts over from the first page once every page was seen.
pub struct JournalListing {
    journal: Arc<dyn Journal>,
    path: String,
    pages: CrawlQueue,
    items: CrawlQueue,
}

impl JournalListing {
    pub fn new(journal: Arc<dyn Journal>, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            journal,
            pages: CrawlQueue::new([path.clone()]),
            items: CrawlQueue::unseeded(),
            path,
        }
    }

    pub fn pending_items(&self) -> usize {
        self.items.len()
    }

    pub fn pending_pages(&self) -> usize {
        self.pages.len()
    }
}

#[async_trait]
impl Strategy for JournalListing {
    fn name(&self) -> String {
        format!("JournalListing({})", self.path)
    }

    async fn run(&mut self) -> Result<()> {
        if let Some(item) = self.items.pop_back() {
            info!(path = %item, "Loading listing item");
            return Ok(self.journal.generic(&item).await?);
        }
        let Some(page) = self.pages.next() else {
            return Ok(());
        };
        info!(path = %page, "Loading listing");
        let (items, pages) = self.journal.listing(&page).await?;
        self.items.extend_front(items);
        self.pages.extend_front(pages);
        Ok(())
    }
}

/// Round robin over the child listings of a listing of listings,
/// discovered on first run.
pub struct JournalListingOfListing {
    journal: Arc<dyn Journal>,
    path: String,
    children: Option<VecDeque<JournalListing>>,
}

impl JournalListingOfListing {
    pub fn new(journal: Arc<dyn Journal>, path: impl Into<String>) -> Self {
        Self {
            journal,
            path: path.into(),
            children: None,
        }
    }
}

#[async_trait]
impl Strategy for JournalListingOfListing {
    fn name(&self) -> String {
        format!("JournalListingOfListing({})", self.path)
    }

    async fn run(&mut self) -> Result<()> {
        if self.children.is_none() {
            info!(path = %self.path, "Loading listing of listing");
            let links = self.journal.listing_of_listing(&self.path).await?;
            self.children = Some(
                links
                    .into_iter()
                    .map(|link| JournalListing::new(self.journal.clone(), link))
                    .collect(),
            );
        }
        let Some(children) = self.children.as_mut() else {
            return Ok(());
        };
        let Some(mut child) = children.pop_front() else {
            warn!(path = %self.path, "No child listings found, discovering again next time");
            self.children = None;
            return Ok(());
        };
        let outcome = child.run().await;
        children.push_back(child);
        outcome
    }
}

/// Always the same page.
pub struct JournalPage {
    journal: Arc<dyn Journal>,
    path: String,
}

impl JournalPage {
    pub fn new(journal: Arc<dyn Journal>, path: impl Into<String>) -> Self {
        Self {
            journal,
            path: path.into(),
        }
    }
}

#[async_trait]
impl Strategy for JournalPage {
    fn name(&self) -> String {
        format!("JournalPage({})", self.path)
    }

    async fn run(&mut self) -> Result<()> {
        info!(path = %self.path, "Loading fixed page");
        Ok(self.journal.generic(&self.path).await?)
    }
}

/// Follows the homepage links one by one, reloading the homepage for fresh
/// links once they are used up.
pub struct JournalHomepage {
    journal: Arc<dyn Journal>,
    links: CrawlQueue,
}

impl JournalHomepage {
    pub fn new(journal: Arc<dyn Journal>) -> Self {
        Self {
            journal,
            links: CrawlQueue::unseeded(),
        }
    }
}

#[async_trait]
impl Strategy for JournalHomepage {
    fn name(&self) -> String {
        "JournalHomepage".to_string()
    }

    async fn run(&mut self) -> Result<()> {
        if let Some(link) = self.links.pop_back() {
            info!(path = %link, "Loading homepage link");
            return Ok(self.journal.generic(&link).await?);
        }
        info!("Loading homepage");
        let links = self.journal.homepage().await?;
        self.links.extend_front(links);
        Ok(())
    }
}

/// Walks the annotations of a profile page by page, like a listing.
pub struct JournalProfile {
    journal: Arc<dyn Journal>,
    path: String,
    pages: CrawlQueue,
    annotations: CrawlQueue,
}

impl JournalProfile {
    pub fn new(journal: Arc<dyn Journal>, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            journal,
            pages: CrawlQueue::new([path.clone()]),
            annotations: CrawlQueue::unseeded(),
            path,
        }
    }
}

#[async_trait]
impl Strategy for JournalProfile {
    fn name(&self) -> String {
        format!("JournalProfile({})", self.path)
    }

    async fn run(&mut self) -> Result<()> {
        if let Some(annotation) = self.annotations.pop_back() {
            info!(path = %annotation, "Loading annotation");
            return Ok(self.journal.generic(&annotation).await?);
        }
        let Some(page) = self.pages.next() else {
            return Ok(());
        };
        info!(path = %page, "Loading profile");
        let (annotations, pages) = self.journal.profile(&page).await?;
        self.annotations.extend_front(annotations);
        self.pages.extend_front(pages);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invented_words_use_the_word_alphabet() {
        let word = invented_word(30);
        assert_eq!(word.len(), 30);
        assert!(word.bytes().all(|c| WORD_CHARACTERS.contains(&c)));
    }
}
