use num_integer::Integer;

/// System time in ticks of the underlying scheduler
#[cfg(not(feature = "tick-16bit"))]
pub type MTSysTime = u32;

/// System time in ticks of the underlying scheduler
#[cfg(feature = "tick-16bit")]
pub type MTSysTime = u16;

/// Timeout that never blocks.
pub const MT_TIME_IMMEDIATE: MTSysTime = 0;

/// Timeout that never expires.
pub const MT_TIME_INFINITE: MTSysTime = MTSysTime::MAX;

/// Converts `t` units of `1 / div` seconds into ticks at `hz`, rounding up.
/// * The result is clamped below `MT_TIME_INFINITE` so that a long finite time stays finite.
pub fn mt_t2st(hz: u32, t: u32, div: u32) -> MTSysTime
{
    let st = Integer::div_ceil(&(u64::from(hz) * u64::from(t)), &u64::from(div));
    let max = u64::from(MT_TIME_INFINITE - 1);

    if st > max {
        MT_TIME_INFINITE - 1
    }
    else {
        st as MTSysTime
    }
}

/// Checks if `now` lies in the half-open window `[begin, end)`, with wrap-around.
pub fn mt_is_time_within(now: MTSysTime, begin: MTSysTime, end: MTSysTime) -> bool
{
    now.wrapping_sub(begin) < end.wrapping_sub(begin)
}
