//! Core environment context trait for QKD playback.

use async_trait::async_trait;
use std::time::{Duration, SystemTime};

/// The central interface for time and pacing.
///
/// This trait abstracts the "real world" so that the protocol playback
/// can run against a wall clock (interactive front ends) or against a
/// virtual clock (tests, `--instant` CLI runs).
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`
/// - **Simulation**: `SimContext` - virtual clock that advances on `sleep`
///
/// # Determinism
///
/// The numeric simulation never reads the context. Only the playback layer
/// uses it to pace events, so swapping contexts can never change a result.
#[async_trait]
pub trait QkdContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// In simulation, this is the virtual clock time.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time used for session and export timestamps.
    ///
    /// In simulation, this is derived from virtual clock + epoch offset.
    fn system_time(&self) -> SystemTime;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances virtual clock
    async fn sleep(&self, duration: Duration);

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    /// In simulation, returns the master seed.
    fn seed(&self) -> u64;
}
