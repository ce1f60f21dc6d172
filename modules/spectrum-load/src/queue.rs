use std::collections::VecDeque;

/// Paths still to visit: added at the front, taken from the back, and
/// refilled from the seed once empty so a crawl never ends.
#[derive(Debug, Clone)]
pub struct CrawlQueue {
    seed: Vec<String>,
    queue: VecDeque<String>,
}

impl CrawlQueue {
    pub fn new(seed: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let seed: Vec<String> = seed.into_iter().map(Into::into).collect();
        Self {
            queue: seed.iter().cloned().collect(),
            seed,
        }
    }

    /// An empty queue with no seed: `next` on it yields nothing.
    pub fn unseeded() -> Self {
        Self {
            seed: Vec::new(),
            queue: VecDeque::new(),
        }
    }

    pub fn push_front(&mut self, path: impl Into<String>) {
        self.queue.push_front(path.into());
    }

    pub fn extend_front(&mut self, paths: impl IntoIterator<Item = String>) {
        for path in paths {
            self.queue.push_front(path);
        }
    }

    /// Take the oldest path, without reseeding.
    pub fn pop_back(&mut self) -> Option<String> {
        self.queue.pop_back()
    }

    /// Take the oldest path, reseeding first when the queue is exhausted.
    pub fn next(&mut self) -> Option<String> {
        if self.queue.is_empty() {
            self.reseed();
        }
        self.queue.pop_back()
    }

    pub fn reseed(&mut self) {
        self.queue = self.seed.iter().cloned().collect();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
