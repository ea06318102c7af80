//! `MTPort` on top of `std::thread` for host tests.
//!
//! One logical critical section is shared by every test thread, so tests running in
//! parallel serialize on it just like threads and interrupts of a single core would.
//! 1 tick = 1 ms. Interrupt context is simulated per thread with `HostPort::isr`.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, OnceLock};
use std::time::{Duration, Instant};

use crate::{MTMsg, MTPort, MTSysTime, MT_TIME_INFINITE};

#[derive(Clone, Copy, PartialEq, Eq, Debug, PartialOrd, Ord)]
pub(crate) struct HostThread(u32);

struct HostState
{
    owner: Option<HostThread>,
    nest: u32,
    pending: BTreeMap<HostThread, MTMsg>
}

static STATE: Mutex<HostState> = Mutex::new(HostState {
    owner: None,
    nest: 0,
    pending: BTreeMap::new()
});

static CHANGED: Condvar = Condvar::new();

static NEXT_THREAD: AtomicU32 = AtomicU32::new(1);

thread_local! {
    static CURR_THREAD: HostThread = HostThread(NEXT_THREAD.fetch_add(1, Ordering::Relaxed));
    static IN_ISR: Cell<bool> = Cell::new(false);
}

fn state() -> MutexGuard<'static, HostState>
{
    STATE.lock().unwrap_or_else(|e| e.into_inner())
}

fn wait(st: MutexGuard<'static, HostState>) -> MutexGuard<'static, HostState>
{
    CHANGED.wait(st).unwrap_or_else(|e| e.into_inner())
}

fn epoch() -> Instant
{
    static EPOCH: OnceLock<Instant> = OnceLock::new();

    *EPOCH.get_or_init(Instant::now)
}

pub(crate) struct HostPort;

impl HostPort
{
    /// Runs `f` as if it were an interrupt handler.
    pub(crate) fn isr<R>(f: impl FnOnce() -> R) -> R
    {
        struct Leave;

        impl Drop for Leave
        {
            fn drop(&mut self)
            {
                IN_ISR.with(|c| c.set(false));
            }
        }

        IN_ISR.with(|c| c.set(true));
        let _leave = Leave;

        f()
    }
}

unsafe impl MTPort for HostPort
{
    type Thread = HostThread;
    type IsrStatus = u32;

    const TICK_HZ: u32 = 1000;

    fn curr_thread() -> HostThread
    {
        CURR_THREAD.with(|t| *t)
    }

    fn notify_wait(timeout: MTSysTime) -> Option<MTMsg>
    {
        let me = Self::curr_thread();
        let mut st = state();

        assert_eq!(st.owner, Some(me), "notify_wait outside the critical section");

        st.pending.remove(&me);

        let nest = st.nest;
        st.owner = None;
        st.nest = 0;
        CHANGED.notify_all();

        let deadline = if timeout == MT_TIME_INFINITE {
            None
        }
        else {
            Some(Instant::now() + Duration::from_millis(u64::from(timeout)))
        };

        let msg = loop {
            if let Some(msg) = st.pending.remove(&me) {
                break Some(msg);
            }

            match deadline {
                None => {
                    st = wait(st);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break None;
                    }

                    st = CHANGED.wait_timeout(st, deadline - now)
                        .unwrap_or_else(|e| e.into_inner()).0;
                }
            }
        };

        while st.owner.is_some() {
            st = wait(st);
        }
        st.owner = Some(me);
        st.nest = nest;

        // delivered while the section was held by another thread
        let msg = msg.or_else(|| st.pending.remove(&me));

        msg
    }

    fn notify(thread: HostThread, msg: MTMsg)
    {
        state().pending.insert(thread, msg);
        CHANGED.notify_all();
    }

    fn notify_from_isr(thread: HostThread, msg: MTMsg)
    {
        Self::notify(thread, msg);
    }

    fn enter_critical()
    {
        let me = Self::curr_thread();
        let mut st = state();

        if st.owner == Some(me) {
            st.nest += 1;
            return;
        }

        while st.owner.is_some() {
            st = wait(st);
        }
        st.owner = Some(me);
        st.nest = 1;
    }

    fn exit_critical()
    {
        let mut st = state();

        assert_eq!(st.owner, Some(Self::curr_thread()), "exit_critical by a non-owner");

        st.nest -= 1;
        if st.nest == 0 {
            st.owner = None;
            CHANGED.notify_all();
        }
    }

    fn enter_critical_from_isr() -> u32
    {
        let me = Self::curr_thread();
        let prev = {
            let st = state();
            if st.owner == Some(me) {st.nest} else {0}
        };

        Self::enter_critical();

        prev
    }

    fn exit_critical_from_isr(sts: u32)
    {
        Self::exit_critical();

        let st = state();
        let nest = if st.owner == Some(Self::curr_thread()) {st.nest} else {0};
        assert_eq!(nest, sts, "unbalanced interrupt critical section");
    }

    fn is_critical() -> bool
    {
        state().owner == Some(Self::curr_thread())
    }

    fn is_isr() -> bool
    {
        IN_ISR.with(|c| c.get())
    }

    fn yield_pending() -> bool
    {
        false
    }

    fn yield_now()
    {
        std::thread::yield_now();
    }

    fn yield_from_isr()
    {
    }

    fn tick_count() -> MTSysTime
    {
        epoch().elapsed().as_millis() as MTSysTime
    }

    fn delay(ticks: MTSysTime)
    {
        std::thread::sleep(Duration::from_millis(u64::from(ticks)));
    }
}

/// Polls `cond` until it holds; gives up after a few seconds.
pub(crate) fn wait_until(mut cond: impl FnMut() -> bool)
{
    let start = Instant::now();

    while !cond() {
        assert!(start.elapsed() < Duration::from_secs(5), "condition never met");
        std::thread::sleep(Duration::from_millis(1));
    }
}
