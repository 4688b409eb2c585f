// Pacing Module
// Derives first-token and inter-token delays from a model profile and
// applies them with cancellation support.

use crate::registry::ModelProfile;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Delay between consecutive tokens for a given throughput.
///
/// `1000 / (otps + 1)` ms, truncated. The `+ 1` keeps a zero throughput
/// from dividing by zero and slightly underestimates throughput.
pub fn inter_token_delay_ms(output_tokens_per_second: u32) -> u64 {
    1000 / (output_tokens_per_second as u64 + 1)
}

/// Timing parameters for one model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacingProfile {
    /// Lower bound of time to first token in milliseconds
    pub ttft_min_ms: u64,
    /// Upper bound of time to first token in milliseconds
    pub ttft_max_ms: u64,
    /// Fixed delay before every token after the first
    pub inter_token: Duration,
}

impl PacingProfile {
    /// Create a pacing profile; the TTFT bounds are reordered if reversed
    pub fn new(ttft_min_ms: u64, ttft_max_ms: u64, output_tokens_per_second: u32) -> Self {
        Self {
            ttft_min_ms: ttft_min_ms.min(ttft_max_ms),
            ttft_max_ms: ttft_min_ms.max(ttft_max_ms),
            inter_token: Duration::from_millis(inter_token_delay_ms(output_tokens_per_second)),
        }
    }

    pub fn from_model(profile: &ModelProfile) -> Self {
        Self::new(
            profile.ttft_min_ms,
            profile.ttft_max_ms,
            profile.output_tokens_per_second,
        )
    }

    /// No delay at all (for fast tests)
    pub fn instant() -> Self {
        Self {
            ttft_min_ms: 0,
            ttft_max_ms: 0,
            inter_token: Duration::ZERO,
        }
    }

    /// Sample time to first token uniformly from `[ttft_min_ms, ttft_max_ms]`
    pub fn sample_ttft<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        Duration::from_millis(rng.random_range(self.ttft_min_ms..=self.ttft_max_ms))
    }

    pub fn inter_token_delay(&self) -> Duration {
        self.inter_token
    }
}

/// Result of a single paced wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paced {
    /// The delay elapsed, emit the next unit
    Elapsed,
    /// The request was cancelled; stop emitting
    Cancelled,
}

/// Wait for `delay` unless `cancel` fires first.
///
/// An already-cancelled token returns immediately even for a zero delay,
/// so callers observe cancellation between every emitted unit.
pub async fn wait(delay: Duration, cancel: &CancellationToken) -> Paced {
    if cancel.is_cancelled() {
        return Paced::Cancelled;
    }
    if delay.is_zero() {
        return Paced::Elapsed;
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Paced::Cancelled,
        _ = sleep(delay) => Paced::Elapsed,
    }
}

/// Cancel `cancel` once `deadline` elapses.
///
/// The timer task ends as soon as the token is cancelled for any other
/// reason, so it never outlives its request.
pub fn cancel_after(cancel: &CancellationToken, deadline: Duration) {
    let cancel = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = sleep(deadline) => {
                tracing::debug!(?deadline, "Request deadline reached, cancelling emission");
                cancel.cancel();
            }
        }
    });
}

/// Per-request pacer.
///
/// Owns its own random generator so concurrent requests never contend on a
/// shared one, and a cancellation token scoped to the request.
#[derive(Debug)]
pub struct Pacer {
    profile: PacingProfile,
    rng: StdRng,
    cancel: CancellationToken,
}

impl Pacer {
    /// Create a pacer with a freshly seeded generator
    pub fn new(profile: PacingProfile, cancel: CancellationToken) -> Self {
        Self::with_rng(profile, cancel, StdRng::from_rng(&mut rand::rng()))
    }

    /// Create a pacer with an explicit generator (deterministic in tests)
    pub fn with_rng(profile: PacingProfile, cancel: CancellationToken, rng: StdRng) -> Self {
        Self {
            profile,
            rng,
            cancel,
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait a freshly sampled time to first token
    pub async fn first_token(&mut self) -> Paced {
        let delay = self.profile.sample_ttft(&mut self.rng);
        wait(delay, &self.cancel).await
    }

    /// Wait the fixed inter-token delay
    pub async fn next_token(&self) -> Paced {
        wait(self.profile.inter_token, &self.cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn assert_elapsed(start: Instant, expected_ms: u64) {
        let elapsed = start.elapsed();
        let expected = Duration::from_millis(expected_ms);
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(5),
            "elapsed {:?}, expected {:?}",
            elapsed,
            expected
        );
    }

    #[test]
    fn test_inter_token_delay() {
        assert_eq!(inter_token_delay_ms(0), 1000);
        assert_eq!(inter_token_delay_ms(9), 100);
        assert_eq!(inter_token_delay_ms(50), 19);
        assert_eq!(inter_token_delay_ms(1000), 0);
    }

    #[test]
    fn test_sample_ttft_within_bounds() {
        let profile = PacingProfile::new(200, 450, 30);
        let mut rng = StdRng::seed_from_u64(7);

        let samples: Vec<u64> = (0..2000)
            .map(|_| profile.sample_ttft(&mut rng).as_millis() as u64)
            .collect();

        assert!(samples.iter().all(|ms| (200..=450).contains(ms)));
        // Both ends of the inclusive range are reachable
        assert!(samples.iter().any(|ms| *ms < 210));
        assert!(samples.iter().any(|ms| *ms > 440));
    }

    #[test]
    fn test_sample_ttft_is_resampled() {
        let profile = PacingProfile::new(0, 10_000, 30);
        let mut rng = StdRng::seed_from_u64(1);
        let first = profile.sample_ttft(&mut rng);
        assert!((0..20).any(|_| profile.sample_ttft(&mut rng) != first));
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let profile = PacingProfile::new(10, 90, 30);
        let a: Vec<Duration> = {
            let mut rng = StdRng::seed_from_u64(42);
            (0..10).map(|_| profile.sample_ttft(&mut rng)).collect()
        };
        let b: Vec<Duration> = {
            let mut rng = StdRng::seed_from_u64(42);
            (0..10).map(|_| profile.sample_ttft(&mut rng)).collect()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_reversed_bounds_are_reordered() {
        let profile = PacingProfile::new(500, 100, 9);
        assert_eq!(profile.ttft_min_ms, 100);
        assert_eq!(profile.ttft_max_ms, 500);
    }

    #[test]
    fn test_from_model() {
        let model = ModelProfile {
            name: "m".to_string(),
            max_context_tokens: 100,
            max_output_tokens: 10,
            ttft_min_ms: 5,
            ttft_max_ms: 15,
            output_tokens_per_second: 9,
        };
        let profile = PacingProfile::from_model(&model);
        assert_eq!(profile.ttft_min_ms, 5);
        assert_eq!(profile.ttft_max_ms, 15);
        assert_eq!(profile.inter_token_delay(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_elapses() {
        let cancel = CancellationToken::new();
        let start = Instant::now();
        assert_eq!(wait(Duration::from_millis(250), &cancel).await, Paced::Elapsed);
        assert_elapsed(start, 250);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_observes_prior_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(wait(Duration::ZERO, &cancel).await, Paced::Cancelled);
        assert_eq!(wait(Duration::from_secs(5), &cancel).await, Paced::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_interrupted_by_cancellation() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        assert_eq!(wait(Duration::from_secs(10), &cancel).await, Paced::Cancelled);
        assert_elapsed(start, 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_deadline() {
        let cancel = CancellationToken::new();
        cancel_after(&cancel, Duration::from_millis(500));

        let start = Instant::now();
        cancel.cancelled().await;
        assert_elapsed(start, 500);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacer_first_token_fixed_range() {
        let cancel = CancellationToken::new();
        let mut pacer = Pacer::with_rng(
            PacingProfile::new(80, 80, 9),
            cancel,
            StdRng::seed_from_u64(3),
        );

        let start = Instant::now();
        assert_eq!(pacer.first_token().await, Paced::Elapsed);
        assert_elapsed(start, 80);

        assert_eq!(pacer.next_token().await, Paced::Elapsed);
        assert_elapsed(start, 180);
    }
}
