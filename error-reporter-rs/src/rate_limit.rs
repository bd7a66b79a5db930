//! # Rate Limiter
//!
//! Fixed 60 second windows for the whole reporter and for each error type.
//! Windows reset lazily: the first arrival after a window has elapsed resets
//! that scope's counter before it is tested. Both scopes are guarded by one
//! mutex so concurrent arrivals cannot race past a threshold.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::catalog::ErrorType;
use crate::record::ErrorRecord;

/// Length of every rate limiting window
pub const WINDOW: Duration = Duration::from_secs(60);

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    /// The reporter-wide budget for this window is spent
    GlobalLimited,
    /// The budget for this record's type is spent
    TypeLimited,
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed)
    }
}

#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    count: u64,
    window_start: Instant,
}

impl WindowCounter {
    fn new(now: Instant) -> Self {
        Self { count: 0, window_start: now }
    }

    fn roll(&mut self, now: Instant) {
        if now.saturating_duration_since(self.window_start) >= WINDOW {
            self.count = 0;
            self.window_start = now;
        }
    }

    fn has_room(&self, limit: Option<u64>) -> bool {
        limit.map_or(true, |limit| self.count < limit)
    }
}

#[derive(Debug)]
struct RateLimitState {
    global: WindowCounter,
    per_type: HashMap<ErrorType, WindowCounter>,
}

/// Process-wide limiter owned by one reporter
#[derive(Debug)]
pub struct RateLimiter {
    max_per_minute: Option<u64>,
    max_per_type: Option<u64>,
    state: Mutex<RateLimitState>,
}

fn limit(value: i64) -> Option<u64> {
    u64::try_from(value).ok().filter(|v| *v > 0)
}

impl RateLimiter {
    /// Creates a limiter; a budget `<= 0` disables that dimension
    pub fn new(max_errors_per_minute: i64, max_errors_per_type: i64) -> Self {
        Self {
            max_per_minute: limit(max_errors_per_minute),
            max_per_type: limit(max_errors_per_type),
            state: Mutex::new(RateLimitState {
                global: WindowCounter::new(Instant::now()),
                per_type: HashMap::new(),
            }),
        }
    }

    /// Admits or rejects a record, counting it when admitted
    pub fn allow(&self, record: &ErrorRecord) -> bool {
        self.check(record.error_type).is_allowed()
    }

    /// Checks both budgets for `error_type` at the current instant
    pub fn check(&self, error_type: ErrorType) -> RateDecision {
        self.check_at(error_type, Instant::now())
    }

    /// Checks both budgets for `error_type` as of `now`
    pub fn check_at(&self, error_type: ErrorType, now: Instant) -> RateDecision {
        let mut guard = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let state = &mut *guard;

        // Resets depend only on elapsed time, so both scopes roll before deciding.
        state.global.roll(now);
        let type_counter = state
            .per_type
            .entry(error_type)
            .or_insert_with(|| WindowCounter::new(now));
        type_counter.roll(now);

        let type_ok = type_counter.has_room(self.max_per_type);
        let global_ok = state.global.has_room(self.max_per_minute);

        let decision = match (global_ok, type_ok) {
            (false, _) => RateDecision::GlobalLimited,
            (true, false) => RateDecision::TypeLimited,
            (true, true) => RateDecision::Allowed,
        };

        if decision.is_allowed() {
            type_counter.count += 1;
            state.global.count += 1;
        } else {
            debug!(
                error_type = %error_type,
                decision = ?decision,
                global_count = state.global.count,
                "Rate limit reached"
            );
        }

        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_global_window() {
        let limiter = RateLimiter::new(5, 0);
        let start = Instant::now();

        for i in 0..5 {
            let now = start + Duration::from_secs(i);
            assert_eq!(limiter.check_at(ErrorType::CssError, now), RateDecision::Allowed);
        }
        assert_eq!(
            limiter.check_at(ErrorType::CssError, start + Duration::from_secs(10)),
            RateDecision::GlobalLimited
        );

        // first record of the next window
        let next = start + WINDOW + Duration::from_secs(1);
        assert_eq!(limiter.check_at(ErrorType::CssError, next), RateDecision::Allowed);
    }

    #[test]
    fn test_per_type_budget_is_independent() {
        let limiter = RateLimiter::new(100, 2);
        let now = Instant::now();

        assert!(limiter.check_at(ErrorType::SyntaxError, now).is_allowed());
        assert!(limiter.check_at(ErrorType::SyntaxError, now).is_allowed());
        assert_eq!(limiter.check_at(ErrorType::SyntaxError, now), RateDecision::TypeLimited);

        // other types still have budget
        assert!(limiter.check_at(ErrorType::CssError, now).is_allowed());
    }

    #[test]
    fn test_rejection_does_not_consume_global_budget() {
        let limiter = RateLimiter::new(3, 1);
        let now = Instant::now();

        assert!(limiter.check_at(ErrorType::HmrError, now).is_allowed());
        for _ in 0..5 {
            assert_eq!(limiter.check_at(ErrorType::HmrError, now), RateDecision::TypeLimited);
        }

        assert!(limiter.check_at(ErrorType::CssError, now).is_allowed());
        assert!(limiter.check_at(ErrorType::LoadError, now).is_allowed());
        assert_eq!(limiter.check_at(ErrorType::PortError, now), RateDecision::GlobalLimited);
    }

    #[test]
    fn test_type_window_resets_independently() {
        let limiter = RateLimiter::new(100, 1);
        let start = Instant::now();

        assert!(limiter.check_at(ErrorType::CssError, start).is_allowed());
        // global window starts at construction, type window at the first arrival
        let later = start + Duration::from_secs(30);
        assert!(limiter.check_at(ErrorType::LoadError, later).is_allowed());

        let after_css_window = start + WINDOW;
        assert!(limiter.check_at(ErrorType::CssError, after_css_window).is_allowed());
        assert_eq!(
            limiter.check_at(ErrorType::LoadError, after_css_window),
            RateDecision::TypeLimited
        );
    }

    #[test]
    fn test_disabled_limits_always_allow() {
        let limiter = RateLimiter::new(0, -1);
        let now = Instant::now();
        for _ in 0..1_000 {
            assert!(limiter.check_at(ErrorType::BuildError, now).is_allowed());
        }
    }

    #[test]
    fn test_concurrent_arrivals_never_exceed_budget() {
        let limiter = Arc::new(RateLimiter::new(50, 0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || {
                    (0..100)
                        .filter(|_| limiter.check(ErrorType::PluginError).is_allowed())
                        .count()
                })
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
    }
}
