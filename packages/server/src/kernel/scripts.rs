//! Lua scripts for the atomic shared-store primitives.
//!
//! Each primitive is a single server-side transaction over sorted sets or
//! counters. `redis::Script` handles EVALSHA caching and transparent reload,
//! so no SHA bookkeeping lives on this side.

use redis::Script;

/// Sliding-window rate limit check-and-increment.
///
/// KEYS: [rate_limit_key]
/// ARGV: [window_seconds, limit, now, request_id]
/// Returns: [allowed (0/1), remaining, reset_timestamp]
pub const RATE_LIMIT: &str = r#"
local key = KEYS[1]
local window = tonumber(ARGV[1])
local limit = tonumber(ARGV[2])
local now = tonumber(ARGV[3])
local request_id = ARGV[4]

-- Drop entries older than the window
redis.call('ZREMRANGEBYSCORE', key, 0, now - window)

local count = redis.call('ZCARD', key)

if count < limit then
    redis.call('ZADD', key, now, request_id)
    redis.call('EXPIRE', key, window * 2)
    return {1, limit - count - 1, math.floor(now + window)}
else
    -- Denied: reset is when the oldest entry ages out
    local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
    local reset_at = now + window
    if oldest and #oldest >= 2 then
        reset_at = tonumber(oldest[2]) + window
    end
    return {0, 0, math.floor(reset_at)}
end
"#;

/// Queue insert returning the 1-indexed rank.
///
/// KEYS: [queue_key]
/// ARGV: [member, score]
pub const QUEUE_ENQUEUE: &str = r#"
local key = KEYS[1]
local member = ARGV[1]
local score = tonumber(ARGV[2])

redis.call('ZADD', key, score, member)

local rank = redis.call('ZRANK', key, member)
return rank + 1
"#;

/// Pop the lowest-score member, or nil when empty.
///
/// KEYS: [queue_key]
pub const QUEUE_DEQUEUE: &str = r#"
local key = KEYS[1]

local members = redis.call('ZRANGE', key, 0, 0)
if #members == 0 then
    return nil
end

local member = members[1]
redis.call('ZREM', key, member)
return member
"#;

/// 1-indexed rank of a member, or -1 when absent.
///
/// KEYS: [queue_key]
/// ARGV: [member]
pub const QUEUE_RANK: &str = r#"
local key = KEYS[1]
local member = ARGV[1]

local rank = redis.call('ZRANK', key, member)
if rank == false then
    return -1
end
return rank + 1
"#;

/// Increment the daily and monthly usage counters together.
///
/// KEYS: [daily_key, monthly_key]
/// ARGV: [amount]
/// Daily keys expire after 25 hours (timezone slack), monthly after 32 days.
pub const USAGE_INCREMENT: &str = r#"
local daily_key = KEYS[1]
local monthly_key = KEYS[2]
local amount = tonumber(ARGV[1])

local daily = redis.call('INCRBY', daily_key, amount)
local monthly = redis.call('INCRBY', monthly_key, amount)

redis.call('EXPIRE', daily_key, 90000)
redis.call('EXPIRE', monthly_key, 2764800)

return {daily, monthly}
"#;

/// Pre-parsed script handles shared by the Redis store.
pub struct Scripts {
    pub rate_limit: Script,
    pub queue_enqueue: Script,
    pub queue_dequeue: Script,
    pub queue_rank: Script,
    pub usage_increment: Script,
}

impl Scripts {
    pub fn new() -> Self {
        Self {
            rate_limit: Script::new(RATE_LIMIT),
            queue_enqueue: Script::new(QUEUE_ENQUEUE),
            queue_dequeue: Script::new(QUEUE_DEQUEUE),
            queue_rank: Script::new(QUEUE_RANK),
            usage_increment: Script::new(USAGE_INCREMENT),
        }
    }
}

impl Default for Scripts {
    fn default() -> Self {
        Self::new()
    }
}
