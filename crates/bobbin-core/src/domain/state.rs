//! Fetch state of a queued job.

use chrono::{DateTime, Utc};

/// Whether a job on a queue can be claimed right now.
///
/// State transitions:
/// - Available -> Claimed (conditional write of `fetched_at = now`)
/// - Claimed -> Available (requeue, or claim older than the claim timeout)
/// - Claimed -> off the queue (remove from queue)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Available,
    Claimed,
    /// Claimed, but the claim is older than the claim timeout.
    Stale,
}

impl FetchState {
    pub fn of(
        fetched_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        claim_timeout: chrono::Duration,
    ) -> Self {
        match fetched_at {
            None => FetchState::Available,
            Some(at) => match now.checked_sub_signed(claim_timeout) {
                Some(cutoff) if at < cutoff => FetchState::Stale,
                _ => FetchState::Claimed,
            },
        }
    }

    /// Can a worker claim the job in this state?
    pub fn is_claimable(self) -> bool {
        matches!(self, FetchState::Available | FetchState::Stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rstest::rstest;

    #[rstest]
    #[case::never_fetched(None, FetchState::Available)]
    #[case::fresh_claim(Some(Duration::minutes(1)), FetchState::Claimed)]
    #[case::at_the_boundary(Some(Duration::minutes(30)), FetchState::Claimed)]
    #[case::stale_claim(Some(Duration::minutes(31)), FetchState::Stale)]
    fn classifies_claims(#[case] claimed_ago: Option<Duration>, #[case] expected: FetchState) {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let fetched_at = claimed_ago.map(|ago| now - ago);

        let state = FetchState::of(fetched_at, now, Duration::minutes(30));

        assert_eq!(state, expected);
        assert_eq!(state.is_claimable(), expected != FetchState::Claimed);
    }

    #[test]
    fn timeout_past_the_calendar_keeps_the_claim() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let fetched_at = now - Duration::days(365 * 1000);

        let state = FetchState::of(Some(fetched_at), now, Duration::MAX);

        assert_eq!(state, FetchState::Claimed);
    }
}
