//! Sliding-window rate limiting, keyed by tenant (or client IP when no
//! tenant is known). A request is admitted only if both the global and the
//! per-key limiter admit it (§4.8).

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// A parsed `N/{second|minute|hour}` limit spec.
#[derive(Debug, Clone, Copy)]
pub struct LimitSpec {
    pub max_requests: u32,
    pub window: Duration,
}

impl LimitSpec {
    /// Parse `"200/minute"`, `"1/second"`, `"10000/hour"`.
    pub fn parse(spec: &str) -> Result<Self> {
        let (count_str, unit) = spec
            .split_once('/')
            .ok_or_else(|| Error::Configuration(format!("invalid rate limit spec: {spec}")))?;
        let max_requests: u32 = count_str
            .trim()
            .parse()
            .map_err(|_| Error::Configuration(format!("invalid rate limit count: {spec}")))?;
        let window = match unit.trim() {
            "second" => Duration::from_secs(1),
            "minute" => Duration::from_secs(60),
            "hour" => Duration::from_secs(3600),
            other => {
                return Err(Error::Configuration(format!(
                    "invalid rate limit unit '{other}' in spec: {spec}"
                )))
            }
        };
        Ok(Self { max_requests, window })
    }
}

/// Per-key sliding-window counters: a deque of admitted-request timestamps,
/// pruned to the current window on every check.
struct Windows {
    by_key: HashMap<String, VecDeque<Instant>>,
}

/// A single sliding-window limiter for one [`LimitSpec`].
pub struct SlidingWindowLimiter {
    spec: LimitSpec,
    state: Mutex<Windows>,
}

impl SlidingWindowLimiter {
    #[must_use]
    pub fn new(spec: LimitSpec) -> Self {
        Self {
            spec,
            state: Mutex::new(Windows {
                by_key: HashMap::new(),
            }),
        }
    }

    /// Returns `true` if a request for `key` is admitted right now, and
    /// records it if so.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock().expect("rate limiter lock poisoned");
        let deque = state.by_key.entry(key.to_string()).or_default();

        while let Some(front) = deque.front() {
            if now.duration_since(*front) > self.spec.window {
                deque.pop_front();
            } else {
                break;
            }
        }

        if deque.len() as u32 >= self.spec.max_requests {
            return false;
        }

        deque.push_back(now);
        true
    }
}

/// Two independent limiters: a process-wide `global` limit and a per-key
/// (tenant, or client IP as fallback) limit. Both must admit a request.
pub struct RateLimiter {
    global: SlidingWindowLimiter,
    per_key: SlidingWindowLimiter,
}

impl RateLimiter {
    pub fn new(global_spec: &str, per_key_spec: &str) -> Result<Self> {
        Ok(Self {
            global: SlidingWindowLimiter::new(LimitSpec::parse(global_spec)?),
            per_key: SlidingWindowLimiter::new(LimitSpec::parse(per_key_spec)?),
        })
    }

    /// Checks both limiters for `key`, short-circuiting (but still
    /// consuming the global slot) if the global limiter rejects first.
    pub fn admit(&self, key: &str) -> bool {
        self.global.check("__global__") && self.per_key.check(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_specs() {
        let spec = LimitSpec::parse("120/minute").unwrap();
        assert_eq!(spec.max_requests, 120);
        assert_eq!(spec.window, Duration::from_secs(60));
    }

    #[test]
    fn rejects_malformed_specs() {
        assert!(LimitSpec::parse("not-a-spec").is_err());
        assert!(LimitSpec::parse("10/fortnight").is_err());
    }

    #[test]
    fn admits_up_to_limit_then_rejects() {
        let limiter = SlidingWindowLimiter::new(LimitSpec {
            max_requests: 2,
            window: Duration::from_secs(60),
        });
        assert!(limiter.check("tenant-a"));
        assert!(limiter.check("tenant-a"));
        assert!(!limiter.check("tenant-a"));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = SlidingWindowLimiter::new(LimitSpec {
            max_requests: 1,
            window: Duration::from_secs(60),
        });
        assert!(limiter.check("tenant-a"));
        assert!(limiter.check("tenant-b"));
    }

    #[test]
    fn rate_limiter_requires_both_limiters_to_admit() {
        let limiter = RateLimiter::new("1/minute", "5/minute").unwrap();
        assert!(limiter.admit("tenant-a"));
        assert!(!limiter.admit("tenant-a"));
        assert!(!limiter.admit("tenant-b"));
    }
}
