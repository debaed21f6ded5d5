//! Per-rule token bucket rate limiting.
//!
//! Buckets are created on first use and refilled lazily from elapsed time,
//! so there are no background timers. `acquire` never waits.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::schema::RateLimiterConfig;
use crate::routing::rule::{RuleDefinition, RuleId};

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// A token bucket for one rule.
struct TokenBucket {
    capacity: f64,
    refill_per_second: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    fn new(config: &RateLimiterConfig, now: Instant) -> Self {
        let capacity = f64::from(config.capacity);
        Self {
            capacity,
            refill_per_second: config.refill_per_second,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: now,
            }),
        }
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_second).min(self.capacity);
        if now > state.last_refill {
            state.last_refill = now;
        }
    }

    fn try_acquire(&self, now: Instant) -> bool {
        let mut state = self.state.lock();
        self.refill(&mut state, now);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn available(&self, now: Instant) -> f64 {
        let mut state = self.state.lock();
        self.refill(&mut state, now);
        state.tokens
    }
}

/// Point-in-time view of one rule's limiter.
#[derive(Debug, Clone, Serialize)]
pub struct LimiterStatus {
    pub rule: usize,
    pub path: String,
    pub capacity: u32,
    pub refill_per_second: f64,
    /// `None` until the first request allocates the bucket.
    pub available: Option<f64>,
}

/// Owns every rule's limiter state within one rule snapshot.
#[derive(Default)]
pub struct RateLimiterRegistry {
    buckets: DashMap<RuleId, Arc<TokenBucket>>,
}

impl RateLimiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take one token for the rule. Rules without a limiter always pass and
    /// allocate nothing.
    pub fn acquire(&self, rule: &RuleDefinition) -> bool {
        self.acquire_at(rule, Instant::now())
    }

    fn acquire_at(&self, rule: &RuleDefinition, now: Instant) -> bool {
        let Some(limit) = rule.rate_limiter() else {
            return true;
        };

        let bucket = self
            .buckets
            .entry(rule.id())
            .or_insert_with(|| Arc::new(TokenBucket::new(limit, now)))
            .clone();

        bucket.try_acquire(now)
    }

    /// Number of allocated buckets.
    pub fn allocated(&self) -> usize {
        self.buckets.len()
    }

    pub fn status<'a>(
        &self,
        rules: impl IntoIterator<Item = &'a Arc<RuleDefinition>>,
    ) -> Vec<LimiterStatus> {
        let now = Instant::now();
        rules
            .into_iter()
            .filter_map(|rule| {
                let limit = rule.rate_limiter()?;
                let available = self
                    .buckets
                    .get(&rule.id())
                    .map(|bucket| bucket.value().clone())
                    .map(|bucket| bucket.available(now));
                Some(LimiterStatus {
                    rule: rule.id().0,
                    path: rule.path().to_string(),
                    capacity: limit.capacity,
                    refill_per_second: limit.refill_per_second,
                    available,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RuleConfig;
    use std::time::Duration;

    fn limited_rule(index: usize, capacity: u32, refill_per_second: f64) -> RuleDefinition {
        let config = RuleConfig {
            path: format!("/r{index}"),
            service: Some("svc".into()),
            rate_limiter: Some(RateLimiterConfig { capacity, refill_per_second }),
            ..RuleConfig::default()
        };
        RuleDefinition::compile(index, &config).unwrap()
    }

    #[test]
    fn test_capacity_then_reject_without_elapsed_time() {
        let registry = RateLimiterRegistry::new();
        let rule = limited_rule(0, 3, 1.0);
        let now = Instant::now();

        for _ in 0..3 {
            assert!(registry.acquire_at(&rule, now));
        }
        assert!(!registry.acquire_at(&rule, now));
    }

    #[test]
    fn test_lazy_refill() {
        let registry = RateLimiterRegistry::new();
        let rule = limited_rule(0, 2, 2.0);
        let start = Instant::now();

        assert!(registry.acquire_at(&rule, start));
        assert!(registry.acquire_at(&rule, start));
        assert!(!registry.acquire_at(&rule, start));

        // 0.5s at 2 tokens/s refills exactly one token.
        let later = start + Duration::from_millis(500);
        assert!(registry.acquire_at(&rule, later));
        assert!(!registry.acquire_at(&rule, later));

        // Refill never exceeds capacity.
        let much_later = later + Duration::from_secs(60);
        assert!(registry.acquire_at(&rule, much_later));
        assert!(registry.acquire_at(&rule, much_later));
        assert!(!registry.acquire_at(&rule, much_later));
    }

    #[test]
    fn test_unlimited_rule_allocates_nothing() {
        let registry = RateLimiterRegistry::new();
        let config = RuleConfig {
            path: "/free".into(),
            service: Some("svc".into()),
            ..RuleConfig::default()
        };
        let rule = RuleDefinition::compile(0, &config).unwrap();

        for _ in 0..1000 {
            assert!(registry.acquire(&rule));
        }
        assert_eq!(registry.allocated(), 0);
    }

    #[test]
    fn test_rules_are_isolated() {
        let registry = RateLimiterRegistry::new();
        let a = limited_rule(0, 1, 0.001);
        let b = limited_rule(1, 1, 0.001);
        let now = Instant::now();

        assert!(registry.acquire_at(&a, now));
        assert!(!registry.acquire_at(&a, now));
        assert!(registry.acquire_at(&b, now));
    }

    #[test]
    fn test_concurrent_acquire_never_double_spends() {
        let registry = Arc::new(RateLimiterRegistry::new());
        let rule = Arc::new(limited_rule(0, 100, 0.0001));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let rule = rule.clone();
                std::thread::spawn(move || (0..50).filter(|_| registry.acquire(&rule)).count())
            })
            .collect();

        let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 100);
    }

    #[test]
    fn test_status_reports_lazy_allocation() {
        let registry = RateLimiterRegistry::new();
        let rules = vec![Arc::new(limited_rule(0, 5, 1.0))];

        let before = registry.status(&rules);
        assert_eq!(before.len(), 1);
        assert!(before[0].available.is_none());

        registry.acquire(&rules[0]);
        let after = registry.status(&rules);
        let available = after[0].available.unwrap();
        assert!((4.0..5.0).contains(&available));
    }
}
