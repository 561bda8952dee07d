//! GCRA counter store on Valkey/Redis.
//!
//! The whole check-and-increment runs inside one Lua script so concurrent
//! instances never race on the same key. Server `TIME` is the clock.
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;

use crate::services::cache::{CacheError, ValkeyClient};
use crate::services::ratelimit::store::{Limit, RateLimitDecision, RateStore, RateStoreError};

// KEYS[1] = key, ARGV = burst, rate, period (seconds), cost
// Returns {allowed, remaining, retry_after, reset_after}; durations as strings (seconds).
const GCRA_SCRIPT: &str = r#"
local key = KEYS[1]
local burst = tonumber(ARGV[1])
local rate = tonumber(ARGV[2])
local period = tonumber(ARGV[3])
local cost = tonumber(ARGV[4])

local emission_interval = period / rate
local increment = emission_interval * cost
local burst_offset = emission_interval * burst

-- seconds relative to 2017-01-01 to keep float precision
local jan_1_2017 = 1483228800
local now = redis.call("TIME")
now = (now[1] - jan_1_2017) + (now[2] / 1000000)

local tat = redis.call("GET", key)
if not tat then
  tat = now
else
  tat = tonumber(tat)
end
tat = math.max(tat, now)

local new_tat = tat + increment
local allow_at = new_tat - burst_offset
local diff = now - allow_at
local remaining = diff / emission_interval

if remaining < 0 then
  local reset_after = tat - now
  local retry_after = diff * -1
  return {0, 0, tostring(retry_after), tostring(reset_after)}
end

local reset_after = new_tat - now
if reset_after > 0 then
  redis.call("SET", key, new_tat, "EX", math.ceil(reset_after))
end
return {cost, math.floor(remaining), "0", tostring(reset_after)}
"#;

static GCRA: LazyLock<redis::Script> = LazyLock::new(|| redis::Script::new(GCRA_SCRIPT));

#[async_trait]
impl RateStore for ValkeyClient {
    fn backend_name(&self) -> &'static str {
        "valkey"
    }

    async fn allow(&self, key: &str, limit: Limit) -> Result<RateLimitDecision, RateStoreError> {
        let mut conn = self.connection();

        let (allowed, remaining, retry_after, reset_after): (i64, i64, String, String) = GCRA
            .key(key)
            .arg(limit.burst)
            .arg(limit.rate.max(1))
            .arg(limit.period.as_secs_f64())
            .arg(1)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendCommand(e.to_string()))?;

        Ok(RateLimitDecision {
            allowed: allowed > 0,
            remaining: u32::try_from(remaining.max(0)).unwrap_or(u32::MAX),
            reset_after: parse_seconds(&reset_after)?,
            retry_after: parse_seconds(&retry_after)?,
        })
    }
}

fn parse_seconds(raw: &str) -> Result<Duration, RateStoreError> {
    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|_| RateStoreError::InvalidReply(raw.to_string()))?;
    // negative / NaN collapse to zero
    Duration::try_from_secs_f64(secs.max(0.0))
        .map_err(|_| RateStoreError::InvalidReply(raw.to_string()))
}
