use std::path::PathBuf;

use tracing::warn;

use crate::article::ArticleZip;

/// Teardown guard: everything tracked is deleted when the guard drops,
/// whether the test passed or not.
#[derive(Debug, Default)]
pub struct Fixtures {
    articles: Vec<ArticleZip>,
    files: Vec<PathBuf>,
}

impl Fixtures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track an article and hand it back.
    pub fn article(&mut self, article: ArticleZip) -> ArticleZip {
        self.articles.push(article.clone());
        article
    }

    pub fn file(&mut self, path: impl Into<PathBuf>) {
        self.files.push(path.into());
    }

    pub fn len(&self) -> usize {
        self.articles.len() + self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for Fixtures {
    fn drop(&mut self) {
        for article in self.articles.drain(..) {
            if let Err(e) = article.clean() {
                warn!(id = %article.id(), error = %e, "Failed to clean article");
            }
        }
        for file in self.files.drain(..) {
            if !file.exists() {
                continue;
            }
            if let Err(e) = std::fs::remove_file(&file) {
                warn!(filename = %file.display(), error = %e, "Failed to clean file");
            }
        }
    }
}
