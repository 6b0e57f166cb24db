//! Throttle policy.
//!
//! Request budgets per scope and per caller. A single instance keeps them in
//! process with `governor` keyed limiters ([`KeyedLimiters`]); instances that
//! share Redis count hits in fixed windows ([`FixedWindow`] over a
//! [`CounterStore`]).

use std::{
    fmt::Display,
    num::NonZeroU32,
    str::FromStr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::{DateTime, TimeZone, Utc};
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter,
};
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    models::Actor,
};

/// A request budget such as `10/day`. The limit is at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Rate {
    pub limit: u64,
    pub period_secs: i64,
}

impl Rate {
    pub const fn new(limit: u64, period_secs: i64) -> Self {
        Self { limit, period_secs }
    }
}

impl FromStr for Rate {
    type Err = String;

    /// Parses `<limit>/<period>` where the period is read from its first
    /// letter: `s`econd, `m`inute, `h`our or `d`ay.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (limit, period) = s
            .split_once('/')
            .ok_or_else(|| format!("invalid rate '{}': expected <limit>/<period>", s))?;

        let limit = limit
            .trim()
            .parse::<u64>()
            .map_err(|e| format!("invalid rate limit in '{}': {}", s, e))?;
        if limit == 0 {
            return Err(format!("invalid rate '{}': limit must be positive", s));
        }

        let period_secs = match period.trim().chars().next() {
            Some('s') => 1,
            Some('m') => 60,
            Some('h') => 60 * 60,
            Some('d') => 60 * 60 * 24,
            _ => return Err(format!("invalid rate period in '{}'", s)),
        };

        Ok(Self { limit, period_secs })
    }
}

impl TryFrom<String> for Rate {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl Display for Rate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let period = match self.period_secs {
            1 => "second",
            60 => "minute",
            3600 => "hour",
            _ => "day",
        };
        write!(f, "{}/{}", self.limit, period)
    }
}

/// A named budget bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Generic browsing by unauthenticated callers
    Anon,
    ReviewCreate,
    ReviewList,
    ReviewDetail,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Anon => "anon",
            Scope::ReviewCreate => "review-create",
            Scope::ReviewList => "review-list",
            Scope::ReviewDetail => "review-detail",
        }
    }

    /// The anonymous budget never counts authenticated callers
    pub fn applies_to(&self, actor: &Actor) -> bool {
        match self {
            Scope::Anon => actor.is_anonymous(),
            Scope::ReviewCreate | Scope::ReviewList | Scope::ReviewDetail => true,
        }
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleRates {
    pub anon: Rate,
    pub review_create: Rate,
    pub review_list: Rate,
    pub review_detail: Rate,
}

impl ThrottleRates {
    pub fn for_scope(&self, scope: Scope) -> Rate {
        match scope {
            Scope::Anon => self.anon,
            Scope::ReviewCreate => self.review_create,
            Scope::ReviewList => self.review_list,
            Scope::ReviewDetail => self.review_detail,
        }
    }
}

impl Default for ThrottleRates {
    fn default() -> Self {
        Self {
            anon: Rate::new(100, 3600),
            review_create: Rate::new(10, 86400),
            review_list: Rate::new(100, 3600),
            review_detail: Rate::new(60, 60),
        }
    }
}

/// Where hits are recorded
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ThrottleBackend: Send + Sync {
    /// Records one hit by `ident` against `scope`.
    ///
    /// Returns the seconds to wait when the budget is already spent.
    async fn hit(&self, scope: Scope, ident: &str) -> AppResult<Option<u64>>;
}

fn ceil_secs(wait: Duration) -> u64 {
    (wait.as_secs() + u64::from(wait.subsec_nanos() > 0)).max(1)
}

type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Hits between sweeps of idle keys out of a limiter
const RETAIN_EVERY: u64 = 1024;

/// GCRA budgets: `limit` requests at once, refilled evenly over the period
fn quota(rate: Rate) -> Quota {
    let burst = NonZeroU32::new(u32::try_from(rate.limit).unwrap_or(u32::MAX))
        .unwrap_or(NonZeroU32::MIN);
    let period = Duration::from_secs(rate.period_secs.max(1).unsigned_abs());

    Quota::with_period(period / burst.get())
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}

/// In-process keyed limiters, one per scope
pub struct KeyedLimiters {
    anon: KeyedLimiter,
    review_create: KeyedLimiter,
    review_list: KeyedLimiter,
    review_detail: KeyedLimiter,
    clock: DefaultClock,
    hits: AtomicU64,
}

impl KeyedLimiters {
    pub fn new(rates: &ThrottleRates) -> Self {
        Self {
            anon: RateLimiter::keyed(quota(rates.anon)),
            review_create: RateLimiter::keyed(quota(rates.review_create)),
            review_list: RateLimiter::keyed(quota(rates.review_list)),
            review_detail: RateLimiter::keyed(quota(rates.review_detail)),
            clock: DefaultClock::default(),
            hits: AtomicU64::new(0),
        }
    }

    fn limiter(&self, scope: Scope) -> &KeyedLimiter {
        match scope {
            Scope::Anon => &self.anon,
            Scope::ReviewCreate => &self.review_create,
            Scope::ReviewList => &self.review_list,
            Scope::ReviewDetail => &self.review_detail,
        }
    }
}

#[async_trait::async_trait]
impl ThrottleBackend for KeyedLimiters {
    async fn hit(&self, scope: Scope, ident: &str) -> AppResult<Option<u64>> {
        let limiter = self.limiter(scope);

        if self.hits.fetch_add(1, Ordering::Relaxed) % RETAIN_EVERY == RETAIN_EVERY - 1 {
            limiter.retain_recent();
        }

        match limiter.check_key(&ident.to_string()) {
            Ok(_) => Ok(None),
            Err(not_until) => Ok(Some(ceil_secs(
                not_until.wait_time_from(self.clock.now()),
            ))),
        }
    }
}

/// Storage for fixed-window hit counters
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CounterStore: Send + Sync {
    /// Adds one hit to `key` and returns the new count.
    ///
    /// The counter is discarded once `expires_at` has passed.
    async fn increment(
        &self,
        key: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> AppResult<u64>;
}

/// Epoch-aligned windows counted in a shared [`CounterStore`]
pub struct FixedWindow {
    counters: Arc<dyn CounterStore>,
    rates: ThrottleRates,
}

impl FixedWindow {
    pub fn new(counters: Arc<dyn CounterStore>, rates: ThrottleRates) -> Self {
        Self { counters, rates }
    }

    pub async fn hit_at(
        &self,
        scope: Scope,
        ident: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<u64>> {
        let rate = self.rates.for_scope(scope);
        let period = rate.period_secs.max(1);
        let window = now.timestamp().div_euclid(period);
        let window_end = (window + 1) * period;

        let expires_at = Utc
            .timestamp_opt(window_end, 0)
            .single()
            .ok_or_else(|| AppError::Internal("Throttle window out of range".to_string()))?;

        let key = format!("throttle:{}:{}:{}", scope, ident, window);
        let count = self.counters.increment(&key, now, expires_at).await?;
        tracing::trace!(key = %key, count, limit = rate.limit, "Throttle hit");

        if count <= rate.limit {
            return Ok(None);
        }
        let wait = u64::try_from(window_end - now.timestamp()).unwrap_or(0);
        Ok(Some(wait.max(1)))
    }
}

#[async_trait::async_trait]
impl ThrottleBackend for FixedWindow {
    async fn hit(&self, scope: Scope, ident: &str) -> AppResult<Option<u64>> {
        self.hit_at(scope, ident, Utc::now()).await
    }
}

/// Evaluates scope budgets for incoming requests
pub struct Throttle {
    backend: Arc<dyn ThrottleBackend>,
    rates: ThrottleRates,
}

impl Throttle {
    pub fn new(backend: Arc<dyn ThrottleBackend>, rates: ThrottleRates) -> Self {
        Self { backend, rates }
    }

    /// Throttle for a single instance
    pub fn in_memory(rates: ThrottleRates) -> Self {
        Self::new(Arc::new(KeyedLimiters::new(&rates)), rates)
    }

    /// Throttle whose counters are shared through `counters`
    pub fn fixed_window(counters: Arc<dyn CounterStore>, rates: ThrottleRates) -> Self {
        Self::new(Arc::new(FixedWindow::new(counters, rates)), rates)
    }

    pub fn rates(&self) -> &ThrottleRates {
        &self.rates
    }

    /// Counts this request against every applicable scope.
    ///
    /// Fails with [`AppError::RateLimited`] if any scope is exhausted, carrying
    /// the longest wait among the exhausted scopes.
    pub async fn check(&self, actor: &Actor, scopes: &[Scope]) -> AppResult<()> {
        let ident = actor.throttle_ident();
        let mut retry_after: Option<u64> = None;

        for scope in scopes.iter().filter(|scope| scope.applies_to(actor)) {
            let Some(wait) = self.backend.hit(*scope, &ident).await? else {
                continue;
            };

            tracing::warn!(
                scope = %scope,
                ident = %ident,
                limit = %self.rates.for_scope(*scope),
                retry_after = wait,
                "Throttle budget exceeded"
            );
            retry_after = Some(retry_after.map_or(wait, |current| current.max(wait)));
        }

        match retry_after {
            Some(retry_after_secs) => Err(AppError::RateLimited { retry_after_secs }),
            None => Ok(()),
        }
    }
}
