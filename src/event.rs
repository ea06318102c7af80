use core::cell::Cell;

use crate::{MTPort, MTSys, MTSysLock, MTClassI, MTThreadRef, MTMsg, MTSysTime};
use crate::{mt_dbg_check, mt_dbg_check_class_i, mt_dbg_check_class_s};

/// Bitmask of event flags
pub type MTEventFlags = u32;

/// Callback of an event source, called on every broadcast with the pending flags.
/// * Runs in the critical section, possibly in an interrupt. Must not block.
pub type MTEventCallback<'a, P> = fn(&MTEventSource<'a, P>, MTEventFlags);

/// Repeater chains longer than this are reported as a contract violation.
/// * Checked only when contract checks are enabled; a cyclic graph recurses without bound otherwise.
pub const MT_REPEATER_DEPTH_MAX: usize = 32;

//

/// Event source
///
/// Accumulates flags until read, wakes its single waiter and feeds its repeaters.
pub struct MTEventSource<'a, P: MTPort>
{
    flags: Cell<MTEventFlags>,
    waiter: MTThreadRef<P>,
    first: Cell<Option<&'a MTEventRepeater<'a, P>>>,
    callback: Cell<Option<MTEventCallback<'a, P>>>
}

// NOTE: mutated only in the critical section
unsafe impl<P: MTPort> Sync for MTEventSource<'_, P> {}

impl<'a, P: MTPort> MTEventSource<'a, P>
{
    /// Creates an event source with no flags, no waiter and no repeaters.
    pub const fn new() -> MTEventSource<'a, P>
    {
        MTEventSource::new_with_callback(None)
    }

    /// Same as `new` but with `callback` already set.
    pub const fn new_with_callback(callback: Option<MTEventCallback<'a, P>>) -> MTEventSource<'a, P>
    {
        MTEventSource {
            flags: Cell::new(0),
            waiter: MTThreadRef::new(),
            first: Cell::new(None),
            callback: Cell::new(callback)
        }
    }

    /// Resets to the state of `new`.
    /// * Repeaters referring to this source must have been unregistered.
    pub fn init(&mut self)
    {
        *self = MTEventSource::new();
    }

    // ----- ----- Thread context ----- ----- //

    /// Sets or clears the callback.
    /// * The next broadcast calls the new one.
    pub fn set_callback_s(&self, _cs: &MTSysLock<P>, callback: Option<MTEventCallback<'a, P>>)
    {
        mt_dbg_check_class_s!(P);

        self.callback.set(callback);
    }

    /// Same as `set_callback_s` but manages the critical section itself.
    pub fn set_callback(&self, callback: Option<MTEventCallback<'a, P>>)
    {
        let cs = MTSys::<P>::lock();

        self.set_callback_s(&cs, callback);
    }

    /// Waits for flags.
    /// * Returns at once if any flag is pending; otherwise suspends the current thread
    ///   as the only waiter of this source until a broadcast leaves flags or `timeout` expires.
    /// * Returns the pending flags, clearing them. `0` on timeout.
    pub fn wait_timeout_s(&self, cs: &MTSysLock<P>, timeout: MTSysTime) -> MTEventFlags
    {
        mt_dbg_check_class_s!(P);

        if self.flags.get() == 0 {
            mt_dbg_check!(self.waiter.is_empty(), "event source already has a waiter");

            MTSys::suspend_timeout_s(cs, Some(&self.waiter), timeout);
        }

        self.get_and_clear_flags_i(cs)
    }

    /// Same as `wait_timeout_s` but manages the critical section itself.
    pub fn wait_timeout(&self, timeout: MTSysTime) -> MTEventFlags
    {
        let cs = MTSys::<P>::lock();

        self.wait_timeout_s(&cs, timeout)
    }

    // ----- ----- Thread and Interrupt context ----- ----- //

    /// Sets flags and propagates them.
    /// * The callback, if any, is called with the pending flags.
    /// * Each repeater, most recently registered first, whose trigger matches the pending
    ///   flags collects them and broadcasts its own event to its target. The trigger bits are
    ///   consumed from this source.
    /// * The waiter is resumed if flags remain.
    pub fn broadcast_flags_i<C: MTClassI<P>>(&self, cs: &C, set: MTEventFlags)
    {
        mt_dbg_check_class_i!(P);

        self.propagate(cs, set, 0);
    }

    /// Same as `broadcast_flags_i` but manages the critical section itself.
    pub fn broadcast_flags(&self, set: MTEventFlags)
    {
        let cs = MTSys::<P>::lock();

        self.broadcast_flags_i(&cs, set);
    }

    /// Reads the pending flags and clears them.
    pub fn get_and_clear_flags_i<C: MTClassI<P>>(&self, _cs: &C) -> MTEventFlags
    {
        mt_dbg_check_class_i!(P);

        self.flags.replace(0)
    }

    fn propagate<C: MTClassI<P>>(&self, cs: &C, set: MTEventFlags, depth: usize)
    {
        mt_dbg_check!(depth <= MT_REPEATER_DEPTH_MAX, "event repeater chain too deep");

        self.flags.set(self.flags.get() | set);
        let local = self.flags.get();

        if let Some(callback) = self.callback.get() {
            callback(self, local);
        }

        let mut repeater = self.first.get();

        while let Some(r) = repeater {
            if local & r.trigger.get() != 0 {
                r.collected.set(r.collected.get() | local);

                if let Some(target) = r.target.get() {
                    target.propagate(cs, r.own_event.get(), depth + 1);
                }
            }

            self.flags.set(self.flags.get() & !r.trigger.get());

            repeater = r.next.get();
        }

        if self.flags.get() != 0 {
            MTSys::resume_i(cs, &self.waiter, MTMsg::EVENT_W);
        }
    }
}

//

/// Event repeater
///
/// Asserts its own event on a target source when trigger flags appear on a source.
pub struct MTEventRepeater<'a, P: MTPort>
{
    next: Cell<Option<&'a MTEventRepeater<'a, P>>>,
    prev: Cell<Option<&'a MTEventRepeater<'a, P>>>,
    source: Cell<Option<&'a MTEventSource<'a, P>>>,
    target: Cell<Option<&'a MTEventSource<'a, P>>>,
    trigger: Cell<MTEventFlags>,
    own_event: Cell<MTEventFlags>,
    collected: Cell<MTEventFlags>
}

// NOTE: mutated only in the critical section
unsafe impl<P: MTPort> Sync for MTEventRepeater<'_, P> {}

impl<'a, P: MTPort> MTEventRepeater<'a, P>
{
    /// Creates an unregistered repeater.
    pub const fn new() -> MTEventRepeater<'a, P>
    {
        MTEventRepeater {
            next: Cell::new(None),
            prev: Cell::new(None),
            source: Cell::new(None),
            target: Cell::new(None),
            trigger: Cell::new(0),
            own_event: Cell::new(0),
            collected: Cell::new(0)
        }
    }

    // ----- ----- Thread context ----- ----- //

    /// Registers the repeater on `source`.
    /// * `trigger` - flags of `source` that activate the repeater.
    /// * `target` - source to broadcast `own_event` to.
    /// * Pending flags of `source` are broadcast again right away so that they reach the new repeater.
    pub fn register_s(&'a self, cs: &MTSysLock<P>, source: &'a MTEventSource<'a, P>,
                      trigger: MTEventFlags, target: &'a MTEventSource<'a, P>, own_event: MTEventFlags)
    {
        mt_dbg_check_class_s!(P);
        mt_dbg_check!(self.source.get().is_none(), "event repeater already registered");

        self.trigger.set(trigger);
        self.own_event.set(own_event);
        self.collected.set(0);
        self.target.set(Some(target));
        self.source.set(Some(source));

        let old_first = source.first.get();
        source.first.set(Some(self));
        self.next.set(old_first);
        self.prev.set(None);
        if let Some(old_first) = old_first {
            old_first.prev.set(Some(self));
        }

        log::trace!("event repeater registered: trigger {:#x} -> event {:#x}", trigger, own_event);

        source.broadcast_flags_i(cs, 0);
    }

    /// Same as `register_s` but manages the critical section itself.
    pub fn register(&'a self, source: &'a MTEventSource<'a, P>,
                    trigger: MTEventFlags, target: &'a MTEventSource<'a, P>, own_event: MTEventFlags)
    {
        let cs = MTSys::<P>::lock();

        self.register_s(&cs, source, trigger, target, own_event);
    }

    /// Removes the repeater from its source.
    /// * The repeater may be registered again afterwards.
    pub fn unregister_s(&self, _cs: &MTSysLock<P>)
    {
        mt_dbg_check_class_s!(P);

        let source = match self.source.get() {
            Some(source) => source,
            None => {
                mt_dbg_check!(false, "event repeater not registered");
                return;
            }
        };

        let prev = self.prev.get();
        let next = self.next.get();

        match prev {
            Some(prev) => prev.next.set(next),
            None => source.first.set(next)
        }
        if let Some(next) = next {
            next.prev.set(prev);
        }

        self.prev.set(None);
        self.next.set(None);
        self.source.set(None);
        self.target.set(None);

        log::trace!("event repeater unregistered: trigger {:#x}", self.trigger.get());
    }

    /// Same as `unregister_s` but manages the critical section itself.
    pub fn unregister(&self)
    {
        let cs = MTSys::<P>::lock();

        self.unregister_s(&cs);
    }

    /// Reads the source flags that fired the repeater since the last call, and clears them.
    pub fn collect_s(&self, _cs: &MTSysLock<P>) -> MTEventFlags
    {
        mt_dbg_check_class_s!(P);

        self.collected.replace(0)
    }

    /// Same as `collect_s` but manages the critical section itself.
    pub fn collect(&self) -> MTEventFlags
    {
        let cs = MTSys::<P>::lock();

        self.collect_s(&cs)
    }
}
