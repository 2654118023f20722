//! Bounded polling for slow backend transitions
//!
//! Cluster creation and deletion are asynchronous on the backend: the API
//! call returns immediately and the cluster drifts through states for
//! minutes. This module provides the one polling loop both flows share: a
//! probe raced against a deadline, with the first probe issued only after a
//! full cadence has passed.

use std::future::Future;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};

use crate::error::Result;

/// Outcome of a single state probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe<T> {
    /// The transition finished; carry the observed value out of the loop
    Ready(T),
    /// Still in flight, probe again after the next cadence
    Pending,
}

/// Run `probe` every `cadence` until it reports ready or `deadline` elapses.
///
/// Returns `Ok(Some(value))` when a probe reports ready, `Ok(None)` when the
/// deadline fires first, and the probe's error unchanged if one fails. The
/// deadline is only consulted between probes: a probe already in flight runs
/// to completion even if the deadline passes meanwhile, and its result still
/// counts.
pub async fn until<T, F, Fut>(cadence: Duration, deadline: Duration, mut probe: F) -> Result<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Probe<T>>>,
{
    let mut ticker = time::interval_at(Instant::now() + cadence, cadence);
    // A slow probe pushes the next one out by a full cadence instead of
    // bursting to catch up.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let expired = time::sleep(deadline);
    tokio::pin!(expired);

    loop {
        tokio::select! {
            _ = &mut expired => return Ok(None),
            _ = ticker.tick() => match probe().await? {
                Probe::Ready(value) => return Ok(Some(value)),
                Probe::Pending => {}
            },
        }
    }
}
