//! Token Bucket (C1) and the two rate-limit filters of the Interceptor
//! Chain (C2 parts 1 and 3): a single global bucket and a sharded per-user
//! bucket map with lazy eviction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use agentd_domain::config::RateLimitConfig;

/// O(1) token bucket over integer tokens and monotonic time (§4.1).
///
/// Construction fails if `rate <= 0.0` or `capacity == 0` — both are
/// programming errors (malformed static config), not runtime conditions.
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    rate_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(rate_per_sec: f64, capacity: u64) -> Self {
        assert!(rate_per_sec > 0.0, "token bucket rate must be positive");
        assert!(capacity > 0, "token bucket capacity must be positive");
        Self {
            capacity: capacity as f64,
            tokens: capacity as f64,
            rate_per_sec,
            last_refill: Instant::now(),
        }
    }

    /// Refill based on elapsed time, then deduct `n` if available.
    pub fn try_take(&mut self, n: u64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;
        self.tokens = (self.tokens + elapsed * self.rate_per_sec).min(self.capacity);

        let n = n as f64;
        if self.tokens >= n {
            self.tokens -= n;
            true
        } else {
            false
        }
    }
}

/// The global QPS filter: one shared bucket behind a mutex.
pub struct GlobalRateLimiter {
    bucket: Mutex<TokenBucket>,
}

impl GlobalRateLimiter {
    pub fn new(cfg: &RateLimitConfig) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(cfg.global_rate_per_sec, cfg.global_burst)),
        }
    }

    pub fn try_admit(&self) -> bool {
        self.bucket.lock().try_take(1)
    }
}

struct UserEntry {
    bucket: TokenBucket,
    last_seen: Instant,
}

struct Shard {
    users: HashMap<String, UserEntry>,
    last_swept: Instant,
}

/// The per-user RPM filter (§4.2 part 3): `N_SHARDS` independently-mutexed
/// shards, each holding lazily-created per-user buckets. A sweep evicting
/// stale entries runs at most once per `cleanup_interval` per shard,
/// triggered by the next admitted request that lands on that shard.
pub struct UserRateLimiter {
    shards: Vec<Mutex<Shard>>,
    rate_per_sec: f64,
    burst: u64,
    bucket_ttl: std::time::Duration,
    cleanup_interval: std::time::Duration,
}

impl UserRateLimiter {
    pub fn new(cfg: &RateLimitConfig) -> Self {
        let shards = (0..cfg.shard_count.max(1))
            .map(|_| {
                Mutex::new(Shard {
                    users: HashMap::new(),
                    last_swept: Instant::now(),
                })
            })
            .collect();
        Self {
            shards,
            // Config names this "per_user_rate_per_sec"; §4.2 phrases the
            // filter as RPM, but the stored rate is already per-second.
            rate_per_sec: cfg.per_user_rate_per_sec,
            burst: cfg.per_user_burst,
            bucket_ttl: std::time::Duration::from_secs(cfg.bucket_ttl_secs),
            cleanup_interval: std::time::Duration::from_secs(cfg.cleanup_interval_secs),
        }
    }

    fn shard_for(&self, user_id: &str) -> &Mutex<Shard> {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        std::hash::Hash::hash(&user_id, &mut hasher);
        let idx = (std::hash::Hasher::finish(&hasher) as usize) % self.shards.len();
        &self.shards[idx]
    }

    pub fn try_admit(&self, user_id: &str) -> bool {
        let shard_lock = self.shard_for(user_id);
        let mut shard = shard_lock.lock();
        let now = Instant::now();

        if now.duration_since(shard.last_swept) >= self.cleanup_interval {
            let ttl = self.bucket_ttl;
            shard.users.retain(|_, entry| now.duration_since(entry.last_seen) < ttl);
            shard.last_swept = now;
        }

        let rate = self.rate_per_sec;
        let burst = self.burst;
        let entry = shard
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| UserEntry { bucket: TokenBucket::new(rate, burst), last_seen: now });
        entry.last_seen = now;
        entry.bucket.try_take(1)
    }
}

pub struct RateLimiters {
    pub global: Arc<GlobalRateLimiter>,
    pub per_user: Arc<UserRateLimiter>,
}

impl RateLimiters {
    pub fn new(cfg: &RateLimitConfig) -> Self {
        Self {
            global: Arc::new(GlobalRateLimiter::new(cfg)),
            per_user: Arc::new(UserRateLimiter::new(cfg)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_grants_up_to_capacity_then_denies() {
        let mut bucket = TokenBucket::new(1.0, 2);
        assert!(bucket.try_take(1));
        assert!(bucket.try_take(1));
        assert!(!bucket.try_take(1));
    }

    #[test]
    fn bucket_refills_over_time() {
        let mut bucket = TokenBucket::new(1000.0, 1);
        assert!(bucket.try_take(1));
        assert!(!bucket.try_take(1));
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(bucket.try_take(1), "bucket should have refilled after 5ms at 1000/s");
    }

    #[test]
    #[should_panic(expected = "capacity must be positive")]
    fn zero_capacity_panics_at_construction() {
        TokenBucket::new(1.0, 0);
    }

    #[test]
    fn global_limiter_denies_second_request_over_burst_one() {
        let cfg = RateLimitConfig { global_rate_per_sec: 1.0, global_burst: 1, ..RateLimitConfig::default() };
        let limiter = GlobalRateLimiter::new(&cfg);
        assert!(limiter.try_admit());
        assert!(!limiter.try_admit());
    }

    #[test]
    fn per_user_limiter_tracks_users_independently() {
        let cfg = RateLimitConfig { per_user_rate_per_sec: 1.0, per_user_burst: 1, ..RateLimitConfig::default() };
        let limiter = UserRateLimiter::new(&cfg);
        assert!(limiter.try_admit("alice"));
        assert!(!limiter.try_admit("alice"));
        assert!(limiter.try_admit("bob"), "a different user has an independent bucket");
    }
}
