use std::fmt;

use tracing::{error, info};

use crate::error::Result;
use crate::strategy::Strategy;

/// Drives a strategy in a loop, surviving the failures expected while the
/// system is under load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Limit {
    /// `None` runs until the process is stopped.
    pub iterations: Option<u64>,
}

impl Limit {
    pub fn new(iterations: Option<u64>) -> Self {
        Self { iterations }
    }

    /// Returns how many iterations ran, failed ones included. Only failures
    /// outside the expected class stop the loop.
    pub async fn run(&self, strategy: &mut dyn Strategy) -> Result<u64> {
        let mut done = 0;
        while self.iterations.map_or(true, |limit| done < limit) {
            done += 1;
            if let Err(e) = strategy.run().await {
                if !e.is_expected_during_load() {
                    return Err(e);
                }
                error!(strategy = %strategy.name(), iteration = done, error = %e, "Iteration failed");
            }
        }
        info!(strategy = %strategy.name(), iterations = done, "Iteration limit reached");
        Ok(done)
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.iterations {
            Some(iterations) => write!(f, "Limit({iterations})"),
            None => f.write_str("Limit(unlimited)"),
        }
    }
}
