//! Lua sources for the atomic window scripts.
//!
//! Each script reads, decides, and mutates counter state in one step, so
//! the decision is globally consistent across concurrent callers. Replies
//! are arrays of integers; a TTL of `-1` signals admission.

/// Fixed window counting.
///
/// KEYS: the counter key. ARGV: increment, window size ms, limit.
/// Reply: `{counter_after, ttl_ms}`.
///
/// Rejects when the increment would push the counter past the limit,
/// reporting the remaining window without touching the TTL. A fresh key is
/// created with the window size as its TTL.
pub(crate) const FIXED_WINDOW: &str = r#"
local count = redis.call("get", KEYS[1])
if count == false then
    count = 0
end
if count + ARGV[1] > tonumber(ARGV[3]) then
    return { tonumber(count), redis.call("pttl", KEYS[1]) }
end
if count == 0 then
    redis.call("set", KEYS[1], ARGV[1], "px", ARGV[2])
    return { tonumber(ARGV[1]), -1 }
end
return { redis.call("incrby", KEYS[1], ARGV[1]), -1 }
"#;

/// Sliding window counting.
///
/// KEYS: the counter key. ARGV: increment, window size ms, limit.
/// Reply: `{effective_counter_after, ttl_ms}`.
///
/// The key holds a hash of the current window counter `c`, the previous
/// window counter `p`, and the current window start `s` in milliseconds.
/// The window is anchored at the store-clock timestamp (`TIME`) of the
/// first admission; once `size` has elapsed the start advances by one
/// window, the current counter becoming the previous, and after two idle
/// sizes both windows are forgotten and the anchor is fresh. The
/// effective counter weighs the previous window by the fraction of it
/// still covered: `c + p * (size - elapsed) / size`. The key expires two
/// window sizes after the last admission, so the previous window stays
/// addressable for one full size after it ended. Rejection mutates
/// nothing and reports the wait until the next window boundary (the full
/// size on an absent key).
pub(crate) const SLIDING_WINDOW: &str = r#"
local t = redis.call("time")
local now = t[1] * 1000 + math.floor(t[2] / 1000)
local value = tonumber(ARGV[1])
local size = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])

local count = 0
local prev = 0
local start = now
local state = redis.call("hmget", KEYS[1], "c", "p", "s")
if state[1] then
    start = tonumber(state[3])
    local elapsed = now - start
    if elapsed < size then
        count = tonumber(state[1])
        prev = tonumber(state[2])
    elseif elapsed < size * 2 then
        prev = tonumber(state[1])
        start = start + size
    else
        start = now
    end
end
local elapsed = now - start
local effective = math.floor(count + prev * (size - elapsed) / size)
if effective + value > limit then
    return { effective, size - elapsed }
end
redis.call("hset", KEYS[1], "c", count + value, "p", prev, "s", start)
redis.call("pexpire", KEYS[1], size * 2)
return { effective + value, -1 }
"#;

/// Batch evaluation of N limits over N keys.
///
/// KEYS: one prefixed key per limit. ARGV: four per limit, in order:
/// increment, window size ms, limit, algorithm (1 fixed, 2 sliding).
/// Reply: `{ok, counter, ttl_ms, limit}`.
///
/// A dry-run pass simulates every limit without side effects; counters are
/// committed only when all limits admit, so either all windows advance or
/// none do. The reply carries the tightest admitting limit (smallest
/// remainder) or the rejecting limit with the longest wait; ties go to the
/// lowest index.
pub(crate) const BATCH_LIMIT: &str = r#"
local t = redis.call("time")
local now = t[1] * 1000 + math.floor(t[2] / 1000)

local n = #KEYS
local allow = true
local admitted = {}
local counts = {}
local ttls = {}
local limits = {}
local commits = {}

for i = 1, n do
    local j = (i - 1) * 4
    local rate = tonumber(ARGV[j + 1])
    local size = tonumber(ARGV[j + 2])
    local limit = tonumber(ARGV[j + 3])
    local alg = tonumber(ARGV[j + 4])
    limits[i] = limit
    if alg == 1 then
        local count = redis.call("get", KEYS[i])
        if count == false then
            count = 0
        else
            count = tonumber(count)
        end
        if count + rate > limit then
            admitted[i] = false
            counts[i] = count
            ttls[i] = redis.call("pttl", KEYS[i])
        else
            admitted[i] = true
            counts[i] = count + rate
            commits[i] = count
        end
    else
        local count = 0
        local prev = 0
        local start = now
        local state = redis.call("hmget", KEYS[i], "c", "p", "s")
        if state[1] then
            start = tonumber(state[3])
            local elapsed = now - start
            if elapsed < size then
                count = tonumber(state[1])
                prev = tonumber(state[2])
            elseif elapsed < size * 2 then
                prev = tonumber(state[1])
                start = start + size
            else
                start = now
            end
        end
        local elapsed = now - start
        local effective = math.floor(count + prev * (size - elapsed) / size)
        if effective + rate > limit then
            admitted[i] = false
            counts[i] = effective
            ttls[i] = size - elapsed
        else
            admitted[i] = true
            counts[i] = effective + rate
            commits[i] = { count + rate, prev, start }
        end
    end
    if not admitted[i] then
        allow = false
    end
end

if allow then
    for i = 1, n do
        local j = (i - 1) * 4
        local rate = ARGV[j + 1]
        local size = tonumber(ARGV[j + 2])
        local alg = tonumber(ARGV[j + 4])
        if alg == 1 then
            if commits[i] == 0 then
                redis.call("set", KEYS[i], rate, "px", size)
            else
                redis.call("incrby", KEYS[i], rate)
            end
        else
            local c = commits[i]
            redis.call("hset", KEYS[i], "c", c[1], "p", c[2], "s", c[3])
            redis.call("pexpire", KEYS[i], size * 2)
        end
    end
    local best = 1
    for i = 2, n do
        if limits[i] - counts[i] < limits[best] - counts[best] then
            best = i
        end
    end
    return { 1, counts[best], -1, limits[best] }
end

local best = 0
for i = 1, n do
    if not admitted[i] then
        if best == 0 or ttls[i] > ttls[best] then
            best = i
        end
    end
end
return { 0, counts[best], ttls[best], limits[best] }
"#;
