//! Round provider: the host framework's unit of work.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Supplies round numbers to the crawler.
#[async_trait]
pub trait RoundProvider: Send + Sync {
    /// The round the host currently considers active.
    async fn current_round(&self) -> u64;

    /// Refresh the round from the host and return it.
    async fn update_round(&self) -> u64;
}

/// A round number set by hand.
#[derive(Debug, Default)]
pub struct FixedRound {
    round: AtomicU64,
}

impl FixedRound {
    pub fn new(round: u64) -> Self {
        Self {
            round: AtomicU64::new(round),
        }
    }

    /// Move to another round.
    pub fn set(&self, round: u64) {
        self.round.store(round, Ordering::SeqCst);
    }
}

#[async_trait]
impl RoundProvider for FixedRound {
    async fn current_round(&self) -> u64 {
        self.round.load(Ordering::SeqCst)
    }

    async fn update_round(&self) -> u64 {
        self.round.load(Ordering::SeqCst)
    }
}

/// Rounds of fixed length counted from a starting instant.
///
/// Stands in for the host framework when the crawler runs on its own.
#[derive(Debug, Clone)]
pub struct ClockRounds {
    genesis: Instant,
    first_round: u64,
    round_length: Duration,
}

impl ClockRounds {
    /// Start counting at `first_round` from now.
    ///
    /// # Panics
    /// Panics if `round_length` is zero.
    pub fn new(first_round: u64, round_length: Duration) -> Self {
        assert!(!round_length.is_zero(), "round_length must be > 0");
        Self {
            genesis: Instant::now(),
            first_round,
            round_length,
        }
    }

    fn round_at(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.genesis);
        let rounds = elapsed.as_millis() / self.round_length.as_millis().max(1);
        self.first_round + rounds as u64
    }
}

#[async_trait]
impl RoundProvider for ClockRounds {
    async fn current_round(&self) -> u64 {
        self.round_at(Instant::now())
    }

    async fn update_round(&self) -> u64 {
        self.round_at(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_round_can_move() {
        let rounds = FixedRound::new(4);
        assert_eq!(rounds.update_round().await, 4);
        rounds.set(5);
        assert_eq!(rounds.current_round().await, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_rounds_advance() {
        let rounds = ClockRounds::new(10, Duration::from_secs(60));
        assert_eq!(rounds.current_round().await, 10);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(rounds.current_round().await, 11);

        tokio::time::advance(Duration::from_secs(120)).await;
        assert_eq!(rounds.update_round().await, 13);
    }
}
