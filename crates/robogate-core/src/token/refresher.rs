//! Background refresh scheduling for the identity token.
//!
//! The refresher never mutates token state itself; it only decides
//! when to enqueue work on the authority's request channel. On-robot
//! clocks start at the epoch until time syncs, so a token issued "in
//! the future" means the clock is still wrong and scheduling math
//! would be garbage; the loop waits that out in short steps.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{TokenAuthority, TokenRecord};

/// Retry period after a failed acquisition or refresh attempt.
const RETRY_PERIOD: Duration = Duration::from_secs(5 * 60);

/// Poll period while the robot clock has not synced yet.
const CLOCK_SYNC_POLL: Duration = Duration::from_secs(20);

/// Scheduled refreshes run this long after the refresh time proper.
const REFRESH_SLACK: Duration = Duration::from_secs(10);

/// What the refresher should do next for a given token and wall time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum RefreshStep {
    /// Clock not yet synced; check again shortly.
    AwaitClockSync,
    /// Past the refresh window; refresh now.
    RefreshNow,
    /// Sleep until the refresh window opens.
    Sleep(Duration),
}

pub(super) fn next_step(record: &TokenRecord, now: DateTime<Utc>) -> RefreshStep {
    if now < record.issued_at() {
        return RefreshStep::AwaitClockSync;
    }
    if now >= record.refresh_time() {
        return RefreshStep::RefreshNow;
    }
    let remaining = (record.refresh_time() - now)
        .to_std()
        .unwrap_or(Duration::ZERO);
    RefreshStep::Sleep(remaining + REFRESH_SLACK)
}

pub(super) async fn run(authority: TokenAuthority, shutdown: CancellationToken) {
    debug!("token refresher started");
    loop {
        let Some(record) = authority.current() else {
            // No identity yet: poke the acquisition placeholder and
            // back off; real acquisition arrives via user auth.
            if let Err(err) = authority.authenticate(String::new()).await {
                debug!(error = %err, "placeholder token acquisition failed");
                if !sleep_cancellable(RETRY_PERIOD, &shutdown).await {
                    return;
                }
            }
            continue;
        };

        match next_step(&record, Utc::now()) {
            RefreshStep::AwaitClockSync => {
                debug!("token issued in the future, waiting for clock sync");
                if !sleep_cancellable(CLOCK_SYNC_POLL, &shutdown).await {
                    return;
                }
            }
            RefreshStep::Sleep(wait) => {
                debug!(?wait, "sleeping until token refresh window");
                if !sleep_cancellable(wait, &shutdown).await {
                    return;
                }
            }
            RefreshStep::RefreshNow => {
                if let Err(err) = authority.refresh(false).await {
                    warn!(error = %err, "scheduled token refresh failed");
                    if !sleep_cancellable(RETRY_PERIOD, &shutdown).await {
                        return;
                    }
                }
            }
        }
    }
}

/// Returns `false` when shutdown fired during the sleep.
async fn sleep_cancellable(duration: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        () = tokio::time::sleep(duration) => true,
        () = shutdown.cancelled() => false,
    }
}

#[cfg(test)]
mod tests {
    use super::super::jwt::make_test_jwt;
    use super::*;

    fn record(iat: i64, exp: i64) -> TokenRecord {
        TokenRecord::parse(&make_test_jwt(iat, exp, "user-1")).unwrap()
    }

    #[test]
    fn test_refresh_boundary_sleeps_with_slack() {
        // Refresh time five seconds out: sleep those five plus the
        // ten-second slack.
        let now = Utc::now();
        let record = record(
            now.timestamp() - 60,
            now.timestamp() + 3 * 3600 + 5,
        );
        match next_step(&record, now) {
            RefreshStep::Sleep(wait) => {
                assert!(wait >= Duration::from_secs(14) && wait <= Duration::from_secs(16));
            }
            other => panic!("expected sleep, got {other:?}"),
        }
    }

    #[test]
    fn test_past_refresh_time_refreshes_immediately() {
        // Refresh time one second in the past: no slack, refresh now.
        let now = Utc::now();
        let record = record(
            now.timestamp() - 60,
            now.timestamp() + 3 * 3600 - 1,
        );
        assert_eq!(next_step(&record, now), RefreshStep::RefreshNow);
    }

    #[test]
    fn test_future_issued_at_waits_for_clock_sync() {
        let now = Utc::now();
        let record = record(now.timestamp() + 3600, now.timestamp() + 7200);
        assert_eq!(next_step(&record, now), RefreshStep::AwaitClockSync);
    }
}
