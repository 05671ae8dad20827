//! Background cleanup of expired temporary bans and sessions.
//!
//! The worker sweeps once at startup and then every interval. If storage is
//! unreachable it retries with exponential backoff (1s, 2s, 4s) before
//! giving up on that tick; repeated failures escalate to `error!`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use vivid_core::ban::BanStore;
use vivid_core::error::{BanError, SessionError};
use vivid_core::session::SessionStore;

/// Maximum retries per tick when the storage backend is unreachable.
const SWEEP_MAX_RETRIES: u32 = 3;

/// Consecutive failed ticks before logging at error level.
const ESCALATE_AFTER: u32 = 5;

/// A failed sweep.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error(transparent)]
    Ban(#[from] BanError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// What one sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub bans: usize,
    pub sessions: usize,
}

/// Delete bans and sessions that have expired by `now`.
///
/// # Errors
///
/// Returns [`SweepError`] if either store cannot be listed.
pub async fn sweep_once(
    bans: &BanStore,
    sessions: &SessionStore,
    now: DateTime<Utc>,
) -> Result<SweepReport, SweepError> {
    Ok(SweepReport {
        bans: bans.sweep_expired(now).await?,
        sessions: sessions.sweep_expired(now).await?,
    })
}

/// Run [`sweep_once`] every `interval_secs` until `shutdown` flips.
pub async fn sweep_worker(
    bans: BanStore,
    sessions: SessionStore,
    mut shutdown: watch::Receiver<bool>,
    interval_secs: u64,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    let mut consecutive_failures: u32 = 0;
    info!(interval_secs, "sweep worker started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match retry_sweep(&bans, &sessions, &mut shutdown).await {
                    Ok(None) => {
                        info!("sweep worker shutting down");
                        return;
                    }
                    Ok(Some(report)) => {
                        consecutive_failures = 0;
                        if report != SweepReport::default() {
                            info!(
                                bans = report.bans,
                                sessions = report.sessions,
                                "expired records swept"
                            );
                        }
                    }
                    Err(last_err) => {
                        consecutive_failures = consecutive_failures.saturating_add(1);
                        if consecutive_failures >= ESCALATE_AFTER {
                            error!(
                                error = %last_err,
                                consecutive_failures,
                                "sweep persistently failing, storage may be down"
                            );
                        } else {
                            warn!(
                                error = %last_err,
                                consecutive_failures,
                                retries = SWEEP_MAX_RETRIES,
                                "sweep failed after retries, will retry next tick"
                            );
                        }
                    }
                }
            }
            _ = shutdown.changed() => {
                info!("sweep worker shutting down");
                return;
            }
        }
    }
}

/// Attempt a sweep with exponential backoff. Returns:
/// - `Ok(Some(report))` on success
/// - `Ok(None)` if shutdown was signalled during retry
/// - `Err(last_error)` if all retries are exhausted
async fn retry_sweep(
    bans: &BanStore,
    sessions: &SessionStore,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<Option<SweepReport>, SweepError> {
    let mut attempt: u32 = 0;
    loop {
        match sweep_once(bans, sessions, Utc::now()).await {
            Ok(report) => return Ok(Some(report)),
            Err(e) if attempt >= SWEEP_MAX_RETRIES => return Err(e),
            Err(e) => {
                let backoff = Duration::from_secs(1u64 << attempt);
                debug!(
                    attempt = attempt.saturating_add(1),
                    backoff_secs = backoff.as_secs(),
                    error = %e,
                    "sweep failed, retrying"
                );
                tokio::select! {
                    () = tokio::time::sleep(backoff) => {}
                    _ = shutdown.changed() => return Ok(None),
                }
                attempt = attempt.saturating_add(1);
            }
        }
    }
}
