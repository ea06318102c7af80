use core::cell::Cell;
use core::marker::PhantomData;

use crate::{MTPort, MTSysTime, MT_TIME_IMMEDIATE, MT_TIME_INFINITE};
use crate::time::mt_t2st;
use crate::{mt_dbg_check, mt_dbg_check_class_i, mt_dbg_check_class_s};

/// Message delivered to a resumed thread
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MTMsg(pub i32);

impl MTMsg
{
    /// Normal wake-up.
    pub const OK: MTMsg = MTMsg(0);
    /// The wait timed out.
    pub const TIMEOUT: MTMsg = MTMsg(-1);
    /// The waited object was reset.
    pub const RESET: MTMsg = MTMsg(-2);
    /// Flags are pending on the waited event source.
    pub const EVENT_W: MTMsg = MTMsg(-3);
}

//

/// Reference to a suspended thread
///
/// Holds at most one thread, recorded by `MTSys::suspend_timeout_s` and cleared once
/// the thread is resumed.
pub struct MTThreadRef<P: MTPort>
{
    thread: Cell<Option<P::Thread>>
}

// NOTE: mutated only in the critical section
unsafe impl<P: MTPort> Sync for MTThreadRef<P> {}

impl<P: MTPort> MTThreadRef<P>
{
    /// Creates an empty reference.
    pub const fn new() -> MTThreadRef<P>
    {
        MTThreadRef {
            thread: Cell::new(None)
        }
    }

    /// Checks if no thread is referred.
    pub fn is_empty_i<C: MTClassI<P>>(&self, _cs: &C) -> bool
    {
        mt_dbg_check_class_i!(P);

        self.thread.get().is_none()
    }

    pub(crate) fn is_empty(&self) -> bool
    {
        self.thread.get().is_none()
    }
}

//

mod private
{
    pub trait Sealed {}
}

/// Proof of holding the critical section, from either thread or interrupt context.
/// * Class I operations accept any of them.
pub trait MTClassI<P: MTPort>: private::Sealed {}

/// Critical section held from thread context
///
/// Class S operations require this guard. Dropping it reschedules if needed and leaves the section.
pub struct MTSysLock<P: MTPort>
{
    phantom: PhantomData<(P, *const ())>
}

impl<P: MTPort> private::Sealed for MTSysLock<P> {}
impl<P: MTPort> MTClassI<P> for MTSysLock<P> {}

impl<P: MTPort> Drop for MTSysLock<P>
{
    fn drop(&mut self)
    {
        MTSys::<P>::reschedule_s(self);
        P::exit_critical();
    }
}

/// Critical section held from interrupt context
///
/// Carries the interrupt status saved on entry and restores it on drop.
pub struct MTIsrLock<P: MTPort>
{
    sts: P::IsrStatus,
    phantom: PhantomData<*const ()>
}

impl<P: MTPort> private::Sealed for MTIsrLock<P> {}
impl<P: MTPort> MTClassI<P> for MTIsrLock<P> {}

impl<P: MTPort> Drop for MTIsrLock<P>
{
    fn drop(&mut self)
    {
        P::exit_critical_from_isr(self.sts);
    }
}

//

/// OS abstraction API
///
/// Functions suffixed `_i` need the critical section and may run in an interrupt.
/// Functions suffixed `_s` need the critical section held from thread context since they may suspend.
/// The rest manage the critical section themselves.
pub struct MTSys<P: MTPort>
{
    phantom: PhantomData<P>
}

impl<P: MTPort> MTSys<P>
{
    // ----- ----- Critical section ----- ----- //

    /// Enters the critical section from thread context.
    /// * Returns the guard which leaves the section when dropped.
    pub fn lock() -> MTSysLock<P>
    {
        mt_dbg_check!(!P::is_isr(), "in interrupt");

        P::enter_critical();

        MTSysLock {
            phantom: PhantomData
        }
    }

    /// Enters the critical section from an interrupt handler.
    /// * Returns the guard which restores the saved interrupt status when dropped.
    pub fn lock_from_isr() -> MTIsrLock<P>
    {
        let sts = P::enter_critical_from_isr();

        MTIsrLock {
            sts,
            phantom: PhantomData
        }
    }

    /// Yields if a higher priority thread has become ready.
    pub fn reschedule_s(_cs: &MTSysLock<P>)
    {
        mt_dbg_check_class_s!(P);

        if P::yield_pending() {
            P::yield_now();
        }
    }

    /// Requests a switch on exception return if a higher priority thread has become ready.
    /// * Call at the end of an interrupt handler that used `_i` functions.
    pub fn irq_epilogue()
    {
        if P::yield_pending() {
            P::yield_from_isr();
        }
    }

    // ----- ----- Thread context ----- ----- //

    /// Suspends the current thread until resumed.
    /// * Same as `suspend_timeout_s` with `MT_TIME_INFINITE`.
    pub fn suspend_s(cs: &MTSysLock<P>, tref: Option<&MTThreadRef<P>>) -> MTMsg
    {
        Self::suspend_timeout_s(cs, tref, MT_TIME_INFINITE)
    }

    /// Suspends the current thread until resumed or timed out.
    /// * `tref` - reference to record the current thread in, if any.
    /// * `timeout` - ticks to wait. `MT_TIME_IMMEDIATE` returns at once without recording.
    /// * Returns the message given to `resume_*`, or `MTMsg::TIMEOUT`.
    pub fn suspend_timeout_s(_cs: &MTSysLock<P>, tref: Option<&MTThreadRef<P>>, timeout: MTSysTime) -> MTMsg
    {
        mt_dbg_check_class_s!(P);

        if timeout == MT_TIME_IMMEDIATE {
            return MTMsg::TIMEOUT;
        }

        let curr = P::curr_thread();

        if let Some(tref) = tref {
            tref.thread.set(Some(curr));
        }

        match P::notify_wait(timeout) {
            Some(msg) => msg,
            None => {
                if let Some(tref) = tref {
                    if tref.thread.get() == Some(curr) {
                        tref.thread.set(None);
                    }
                }

                MTMsg::TIMEOUT
            }
        }
    }

    /// Resumes a thread referred by `tref` and empties `tref`.
    /// * Does nothing if `tref` is empty.
    pub fn resume_s(_cs: &MTSysLock<P>, tref: &MTThreadRef<P>, msg: MTMsg)
    {
        mt_dbg_check_class_s!(P);

        if let Some(thread) = tref.thread.take() {
            P::notify(thread, msg);
        }
    }

    /// Same as `resume_s` but manages the critical section itself.
    pub fn resume(tref: &MTThreadRef<P>, msg: MTMsg)
    {
        let cs = Self::lock();

        Self::resume_s(&cs, tref, msg);
    }

    /// Blocks the current thread for `ticks`.
    /// * Call outside the critical section.
    pub fn sleep(ticks: MTSysTime)
    {
        mt_dbg_check!(!P::is_isr(), "in interrupt");

        if ticks != MT_TIME_IMMEDIATE {
            P::delay(ticks);
        }
    }

    pub fn sleep_us(us: u32)
    {
        Self::sleep(Self::us2st(us));
    }

    pub fn sleep_ms(ms: u32)
    {
        Self::sleep(Self::ms2st(ms));
    }

    pub fn sleep_s(s: u32)
    {
        Self::sleep(Self::s2st(s));
    }

    // ----- ----- Thread and Interrupt context ----- ----- //

    /// Resumes a thread referred by `tref` and empties `tref`.
    /// * Does nothing if `tref` is empty.
    /// * A message not yet consumed by the thread is overwritten.
    pub fn resume_i<C: MTClassI<P>>(_cs: &C, tref: &MTThreadRef<P>, msg: MTMsg)
    {
        mt_dbg_check_class_i!(P);

        if let Some(thread) = tref.thread.take() {
            P::notify_from_isr(thread, msg);
        }
    }

    /// Gets the system time in ticks.
    pub fn system_time() -> MTSysTime
    {
        P::tick_count()
    }

    pub fn us2st(us: u32) -> MTSysTime
    {
        mt_t2st(P::TICK_HZ, us, 1_000_000)
    }

    pub fn ms2st(ms: u32) -> MTSysTime
    {
        mt_t2st(P::TICK_HZ, ms, 1_000)
    }

    pub fn s2st(s: u32) -> MTSysTime
    {
        mt_t2st(P::TICK_HZ, s, 1)
    }
}

#[cfg(test)]
mod tests
{
    use std::sync::{Barrier, Mutex};
    use std::thread;

    use super::*;
    use crate::hostport::{wait_until, HostPort};

    type Sys = MTSys<HostPort>;

    fn is_empty(tref: &MTThreadRef<HostPort>) -> bool
    {
        let cs = Sys::lock();
        tref.is_empty_i(&cs)
    }

    #[test]
    fn immediate_timeout_never_blocks()
    {
        let tref = MTThreadRef::<HostPort>::new();

        let cs = Sys::lock();
        let msg = Sys::suspend_timeout_s(&cs, Some(&tref), MT_TIME_IMMEDIATE);

        assert_eq!(msg, MTMsg::TIMEOUT);
        assert!(tref.is_empty_i(&cs));
    }

    #[test]
    fn resume_delivers_message()
    {
        let tref = MTThreadRef::<HostPort>::new();

        thread::scope(|s| {
            let waiter = s.spawn(|| {
                let cs = Sys::lock();
                Sys::suspend_s(&cs, Some(&tref))
            });

            wait_until(|| !is_empty(&tref));
            Sys::resume(&tref, MTMsg(42));

            assert_eq!(waiter.join().unwrap(), MTMsg(42));
        });

        assert!(is_empty(&tref));
    }

    #[test]
    fn resume_from_isr()
    {
        let tref = MTThreadRef::<HostPort>::new();

        thread::scope(|s| {
            let waiter = s.spawn(|| {
                let cs = Sys::lock();
                Sys::suspend_timeout_s(&cs, Some(&tref), 5_000)
            });

            wait_until(|| !is_empty(&tref));
            HostPort::isr(|| {
                let cs = Sys::lock_from_isr();
                Sys::resume_i(&cs, &tref, MTMsg::OK);
                assert!(tref.is_empty_i(&cs));
            });
            Sys::irq_epilogue();

            assert_eq!(waiter.join().unwrap(), MTMsg::OK);
        });
    }

    #[test]
    fn resume_empty_is_noop()
    {
        let tref = MTThreadRef::<HostPort>::new();

        Sys::resume(&tref, MTMsg(1));

        let cs = Sys::lock();
        Sys::resume_i(&cs, &tref, MTMsg(2));
        assert!(tref.is_empty_i(&cs));
    }

    #[test]
    fn timeout_clears_reference()
    {
        let tref = MTThreadRef::<HostPort>::new();

        let cs = Sys::lock();
        let msg = Sys::suspend_timeout_s(&cs, Some(&tref), 10);

        assert_eq!(msg, MTMsg::TIMEOUT);
        assert!(tref.is_empty_i(&cs));
    }

    #[test]
    fn timeout_ignores_stale_message()
    {
        let barrier = Barrier::new(2);
        let handle = Mutex::new(None);

        thread::scope(|s| {
            let waiter = s.spawn(|| {
                *handle.lock().unwrap() = Some(HostPort::curr_thread());

                let first = {
                    let cs = Sys::lock();
                    Sys::suspend_timeout_s(&cs, None, 10)
                };

                barrier.wait(); // late delivery happens here
                barrier.wait();

                let second = {
                    let cs = Sys::lock();
                    Sys::suspend_timeout_s(&cs, None, 10)
                };

                (first, second)
            });

            barrier.wait();
            let thread = handle.lock().unwrap().unwrap();
            HostPort::notify(thread, MTMsg(7));
            barrier.wait();

            assert_eq!(waiter.join().unwrap(), (MTMsg::TIMEOUT, MTMsg::TIMEOUT));
        });
    }

    #[test]
    fn isr_lock_restores_status()
    {
        HostPort::isr(|| {
            let outer = Sys::lock_from_isr();
            let inner = Sys::lock_from_isr();
            drop(inner);
            assert!(HostPort::is_critical());
            drop(outer);
            assert!(!HostPort::is_critical());
        });
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "in interrupt")]
    fn lock_in_isr_is_violation()
    {
        HostPort::isr(|| {
            let _cs = Sys::lock();
        });
    }

    #[test]
    fn time_conversion_follows_tick_rate()
    {
        assert_eq!(Sys::ms2st(5), 5);
        assert_eq!(Sys::us2st(1), 1);
        assert_eq!(Sys::s2st(2), 2_000);
    }

    #[test]
    fn sleep_advances_system_time()
    {
        let start = Sys::system_time();
        Sys::sleep_ms(20);
        let elapsed = Sys::system_time().wrapping_sub(start);

        assert!(elapsed >= 20);
    }
}
