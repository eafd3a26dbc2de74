//! Retry delay planning for the startup handshake.
//!
//! A [`RetryPlan`] fits an exact number of tries into a wall-clock budget.
//! Every delay is `backoff(m, i)` for one shared parameter `m`; since the
//! plan's sum grows monotonically with `m`, the parameter is found by
//! bisection rather than in closed form, which keeps arbitrary caller
//! supplied backoff functions usable.
//!
//! ```
//! use gpmwatch_core::backoff::{default_backoff, retries_within_timeout, DEFAULT_SLACK};
//!
//! let plan = retries_within_timeout(10, 5.0, default_backoff, DEFAULT_SLACK).unwrap();
//! assert_eq!(plan.len(), 10);
//! assert!((plan.total() - 5.0).abs() < DEFAULT_SLACK);
//! ```

use std::time::Duration;

use crate::error::ScheduleError;

/// Default tolerance between the plan's sum and the requested timeout.
pub const DEFAULT_SLACK: f64 = 0.01;

/// Number of existence checks made during the handshake.
pub const DEFAULT_HANDSHAKE_TRIES: usize = 10;

/// Time budget for the handshake, in seconds.
pub const DEFAULT_HANDSHAKE_TIMEOUT: f64 = 5.0;

/// Upper bound on bisection steps. Doubles stop changing long before this.
const MAX_BISECTIONS: usize = 200;

/// Upper bound on doublings of the search interval's upper end.
const MAX_EXPANSIONS: usize = 64;

/// Exponential backoff: `(m^i - 1) / m`.
///
/// The first delay is always zero, so the first check happens immediately.
pub fn default_backoff(m: f64, i: usize) -> f64 {
    (m.powi(i as i32) - 1.0) / m
}

/// An ordered list of delays, in seconds, one per try.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPlan {
    delays: Vec<f64>,
}

impl RetryPlan {
    /// Plan for the handshake using the default exponential backoff.
    pub fn for_handshake(tries: usize, timeout: f64) -> Result<Self, ScheduleError> {
        retries_within_timeout(tries, timeout, default_backoff, DEFAULT_SLACK)
    }

    pub fn delays(&self) -> &[f64] {
        &self.delays
    }

    pub fn len(&self) -> usize {
        self.delays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }

    /// Sum of all delays in seconds.
    pub fn total(&self) -> f64 {
        self.delays.iter().sum()
    }

    /// Delays as durations, in order.
    pub fn durations(&self) -> impl Iterator<Item = Duration> + '_ {
        self.delays
            .iter()
            .map(|&d| Duration::from_secs_f64(d.max(0.0)))
    }
}

/// Compute `tries` delays whose sum lands within `slack` of `timeout`.
///
/// The search starts on `[0, timeout]`. If the plan at the upper end is still
/// too short, the upper end is doubled until it overshoots. Targets the
/// backoff function can never reach (a single try with [`default_backoff`]
/// always sums to zero) fail with [`ScheduleError::Unreachable`].
pub fn retries_within_timeout<F>(
    tries: usize,
    timeout: f64,
    backoff: F,
    slack: f64,
) -> Result<RetryPlan, ScheduleError>
where
    F: Fn(f64, usize) -> f64,
{
    if tries == 0 {
        return Err(ScheduleError::InvalidTries);
    }
    if !timeout.is_finite() || timeout <= 0.0 {
        return Err(ScheduleError::InvalidTimeout(timeout));
    }
    if !slack.is_finite() || slack <= 0.0 {
        return Err(ScheduleError::InvalidSlack(slack));
    }

    let plan_at = |m: f64| -> Vec<f64> { (0..tries).map(|i| backoff(m, i)).collect() };
    let error_at = |delays: &[f64]| -> f64 { delays.iter().sum::<f64>() - timeout };
    let unreachable = || ScheduleError::Unreachable { tries, timeout };

    let (mut a, mut b) = (0.0_f64, timeout);

    let mut expansions = 0;
    while error_at(&plan_at(b)) <= -slack {
        if expansions == MAX_EXPANSIONS {
            return Err(unreachable());
        }
        a = b;
        b *= 2.0;
        expansions += 1;
    }

    for _ in 0..MAX_BISECTIONS {
        let m = (a + b) / 2.0;
        let delays = plan_at(m);
        let error = error_at(&delays);

        if error.abs() < slack {
            if let Some((index, &delay)) = delays.iter().enumerate().find(|&(_, &d)| d < 0.0) {
                return Err(ScheduleError::NegativeDelay { index, delay });
            }
            return Ok(RetryPlan { delays });
        } else if error > 0.0 {
            b = m;
        } else {
            a = m;
        }
    }

    Err(unreachable())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_plan_fits(tries: usize, timeout: f64) {
        let plan = retries_within_timeout(tries, timeout, default_backoff, DEFAULT_SLACK)
            .unwrap_or_else(|e| panic!("tries={} timeout={}: {}", tries, timeout, e));

        assert_eq!(plan.len(), tries, "tries={} timeout={}", tries, timeout);
        assert!(
            (plan.total() - timeout).abs() < DEFAULT_SLACK,
            "tries={} timeout={}: sum {} outside slack",
            tries,
            timeout,
            plan.total()
        );
        assert!(
            plan.delays().iter().all(|&d| d >= 0.0),
            "tries={} timeout={}: negative delay in {:?}",
            tries,
            timeout,
            plan.delays()
        );
    }

    #[test]
    fn test_handshake_default_plan() {
        let plan = RetryPlan::for_handshake(DEFAULT_HANDSHAKE_TRIES, DEFAULT_HANDSHAKE_TIMEOUT)
            .expect("default handshake plan");

        assert_eq!(plan.len(), 10);
        assert!((plan.total() - 5.0).abs() < DEFAULT_SLACK);
        assert_eq!(plan.delays()[0], 0.0, "first check should be immediate");
    }

    #[test]
    fn test_plan_fits_across_inputs() {
        for tries in 3..=25 {
            for timeout in [0.5, 1.0, 2.5, 5.0, 30.0, 120.0] {
                assert_plan_fits(tries, timeout);
            }
        }
    }

    #[test]
    fn test_two_tries_short_timeout() {
        // Two tries sum to (m - 1) / m, which stays below 1.
        assert_plan_fits(2, 0.5);
    }

    #[test]
    fn test_default_backoff_is_non_decreasing() {
        for tries in [3, 5, 10, 20] {
            for timeout in [1.0, 5.0, 60.0] {
                let plan = RetryPlan::for_handshake(tries, timeout).expect("plan");
                for pair in plan.delays().windows(2) {
                    assert!(
                        pair[0] <= pair[1],
                        "delays not monotonic for tries={} timeout={}: {:?}",
                        tries,
                        timeout,
                        plan.delays()
                    );
                }
            }
        }
    }

    #[test]
    fn test_rejects_zero_tries() {
        assert_eq!(
            retries_within_timeout(0, 5.0, default_backoff, DEFAULT_SLACK),
            Err(ScheduleError::InvalidTries)
        );
    }

    #[test]
    fn test_rejects_bad_timeout_and_slack() {
        assert!(matches!(
            retries_within_timeout(10, 0.0, default_backoff, DEFAULT_SLACK),
            Err(ScheduleError::InvalidTimeout(_))
        ));
        assert!(matches!(
            retries_within_timeout(10, -1.0, default_backoff, DEFAULT_SLACK),
            Err(ScheduleError::InvalidTimeout(_))
        ));
        assert!(matches!(
            retries_within_timeout(10, f64::NAN, default_backoff, DEFAULT_SLACK),
            Err(ScheduleError::InvalidTimeout(_))
        ));
        assert!(matches!(
            retries_within_timeout(10, 5.0, default_backoff, 0.0),
            Err(ScheduleError::InvalidSlack(_))
        ));
    }

    #[test]
    fn test_single_try_is_unreachable() {
        assert_eq!(
            retries_within_timeout(1, 5.0, default_backoff, DEFAULT_SLACK),
            Err(ScheduleError::Unreachable {
                tries: 1,
                timeout: 5.0
            })
        );
    }

    #[test]
    fn test_custom_linear_backoff() {
        // Linear: delays m * i, sum m * n(n-1)/2.
        let plan = retries_within_timeout(5, 10.0, |m, i| m * i as f64, DEFAULT_SLACK)
            .expect("linear plan");
        assert_eq!(plan.len(), 5);
        assert!((plan.total() - 10.0).abs() < DEFAULT_SLACK);
        assert!((plan.delays()[1] - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_custom_backoff_negative_delay_rejected() {
        // Sum reaches the target, but the first delay is negative.
        let result = retries_within_timeout(3, 3.0, |m, i| m * (i as f64) - 0.5, DEFAULT_SLACK);
        assert!(matches!(
            result,
            Err(ScheduleError::NegativeDelay { index: 0, .. })
        ));
    }

    #[test]
    fn test_plan_is_deterministic() {
        let a = RetryPlan::for_handshake(10, 5.0).expect("plan");
        let b = RetryPlan::for_handshake(10, 5.0).expect("plan");
        assert_eq!(a, b);
    }

    #[test]
    fn test_durations_match_delays() {
        let plan = RetryPlan::for_handshake(10, 5.0).expect("plan");
        let total: Duration = plan.durations().sum();
        assert!((total.as_secs_f64() - plan.total()).abs() < 1e-6);
        assert_eq!(plan.durations().count(), plan.len());
    }
}
