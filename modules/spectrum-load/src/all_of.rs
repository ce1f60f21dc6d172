use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::error::{LoadError, Result};
use crate::strategy::Strategy;

struct Interval {
    start: u32,
    end: u32,
    strategy: Box<dyn Strategy>,
}

/// Runs one of its actions per call, chosen at random in proportion to the
/// action weights.
pub struct AllOf {
    intervals: Vec<Interval>,
    total: u32,
    rng: StdRng,
}

impl AllOf {
    pub fn new(actions: Vec<(Box<dyn Strategy>, u32)>) -> Result<Self> {
        Self::with_rng(actions, StdRng::from_rng(&mut rand::rng()))
    }

    /// Contiguous ranges over `[0, total - 1]`, one per action, sized by weight.
    pub fn with_rng(actions: Vec<(Box<dyn Strategy>, u32)>, rng: StdRng) -> Result<Self> {
        if actions.is_empty() {
            return Err(LoadError::NoActions);
        }
        let mut intervals = Vec::with_capacity(actions.len());
        let mut start: u32 = 0;
        for (strategy, weight) in actions {
            if weight == 0 {
                return Err(LoadError::ZeroWeight {
                    name: strategy.name(),
                });
            }
            let Some((end, next)) = start
                .checked_add(weight - 1)
                .and_then(|end| end.checked_add(1).map(|next| (end, next)))
            else {
                return Err(LoadError::WeightOverflow {
                    name: strategy.name(),
                });
            };
            intervals.push(Interval { start, end, strategy });
            start = next;
        }
        Ok(Self {
            intervals,
            total: start,
            rng,
        })
    }

    /// Sum of the weights.
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Index of the action owning `choice`.
    pub fn select(&self, choice: u32) -> Result<usize> {
        self.intervals
            .iter()
            .position(|interval| interval.start <= choice && choice <= interval.end)
            .ok_or(LoadError::NoActionSelected {
                choice,
                total: self.total,
            })
    }

    /// Draw the action the next `run` would dispatch to.
    pub fn draw(&mut self) -> Result<usize> {
        let choice = self.rng.random_range(0..self.total);
        self.select(choice)
    }
}

#[async_trait]
impl Strategy for AllOf {
    fn name(&self) -> String {
        let names: Vec<String> = self
            .intervals
            .iter()
            .map(|interval| format!("{}x{}", interval.strategy.name(), interval.end - interval.start + 1))
            .collect();
        format!("AllOf({})", names.join(", "))
    }

    async fn run(&mut self) -> Result<()> {
        let index = self.draw()?;
        let strategy = &mut self.intervals[index].strategy;
        info!(action = %strategy.name(), "Selecting action");
        strategy.run().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    struct Counting {
        name: &'static str,
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Strategy for Counting {
        fn name(&self) -> String {
            self.name.to_string()
        }

        async fn run(&mut self) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn counting(name: &'static str) -> (Box<dyn Strategy>, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        (
            Box::new(Counting {
                name,
                runs: runs.clone(),
            }),
            runs,
        )
    }

    #[tokio::test]
    async fn draws_in_proportion_to_weights() {
        let (a, a_runs) = counting("a");
        let (b, b_runs) = counting("b");
        let (c, c_runs) = counting("c");
        let mut all = AllOf::with_rng(vec![(a, 1), (b, 2), (c, 1)], StdRng::seed_from_u64(42)).unwrap();

        for _ in 0..10_000 {
            all.run().await.unwrap();
        }

        let (a, b, c) = (
            a_runs.load(Ordering::SeqCst) as f64,
            b_runs.load(Ordering::SeqCst) as f64,
            c_runs.load(Ordering::SeqCst) as f64,
        );
        assert_eq!(a + b + c, 10_000.0);
        assert!((1.7..2.3).contains(&(b / a)), "b/a = {}", b / a);
        assert!((1.7..2.3).contains(&(b / c)), "b/c = {}", b / c);
    }

    #[test]
    fn ranges_are_contiguous() {
        let all = AllOf::new(vec![(counting("a").0, 1), (counting("b").0, 2), (counting("c").0, 1)]).unwrap();
        assert_eq!(all.total(), 4);
        let selected: Vec<usize> = (0..4).map(|choice| all.select(choice).unwrap()).collect();
        assert_eq!(selected, vec![0, 1, 1, 2]);
        assert!(matches!(
            all.select(4),
            Err(LoadError::NoActionSelected { choice: 4, total: 4 })
        ));
        assert_eq!(all.name(), "AllOf(ax1, bx2, cx1)");
    }

    #[test]
    fn empty_and_zero_weight_are_rejected() {
        assert!(matches!(AllOf::new(Vec::new()), Err(LoadError::NoActions)));
        assert!(matches!(
            AllOf::new(vec![(counting("a").0, 1), (counting("idle").0, 0)]),
            Err(LoadError::ZeroWeight { name }) if name == "idle"
        ));
    }

    #[test]
    fn weights_beyond_u32_are_rejected() {
        assert!(matches!(
            AllOf::new(vec![(counting("a").0, u32::MAX), (counting("b").0, 1)]),
            Err(LoadError::WeightOverflow { name }) if name == "b"
        ));
        let all = AllOf::new(vec![(counting("a").0, u32::MAX - 1), (counting("b").0, 1)]).unwrap();
        assert_eq!(all.total(), u32::MAX);
        assert_eq!(all.select(u32::MAX - 1).unwrap(), 1);
        assert!(matches!(
            AllOf::new(vec![(counting("a").0, 2), (counting("big").0, u32::MAX)]),
            Err(LoadError::WeightOverflow { name }) if name == "big"
        ));
    }
}
