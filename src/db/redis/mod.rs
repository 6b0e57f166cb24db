pub mod counters;

pub use counters::create_redis_client;
pub use counters::RedisCounters;
