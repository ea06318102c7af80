use crate::{MTMsg, MTSysTime};

/// Boundary to the underlying preemptive scheduler.
///
/// The scheduler owns task creation, priority-based dispatching and the tick;
/// this crate only needs the handful of services below.
/// Every function is associated; a port is a zero-sized type.
///
/// # Safety
///
/// The critical section of `enter_critical`/`enter_critical_from_isr` must
/// exclude every other thread and every interrupt that may call into this crate.
/// Objects of this crate are shared among threads and interrupts on that premise alone.
pub unsafe trait MTPort: 'static
{
    /// Handle of an execution context.
    type Thread: Copy + Eq + Send;

    /// Interrupt status saved by `enter_critical_from_isr`.
    type IsrStatus: Copy;

    /// Tick frequency in Hz.
    const TICK_HZ: u32;

    /// Gets the handle of the calling context.
    fn curr_thread() -> Self::Thread;

    /// Blocks the calling thread until a message is delivered.
    /// * Called with the critical section held from thread context; the section is
    ///   released while blocked and held again on return.
    /// * A message delivered before this call is discarded, not returned.
    ///   On FreeRTOS, `xTaskNotifyWait` returns at once on a notification already pending,
    ///   so the port must call `xTaskNotifyStateClear` first.
    /// * A message delivered before the section is held again is returned, even if the
    ///   timeout expired meanwhile. A delivery made inside the section precedes the tick
    ///   that would have timed the thread out.
    /// * `timeout` - ticks to wait, or `MT_TIME_INFINITE`. Never `MT_TIME_IMMEDIATE`.
    /// * Returns the delivered message, or `None` on timeout with nothing delivered.
    fn notify_wait(timeout: MTSysTime) -> Option<MTMsg>;

    /// Delivers `msg` to `thread` and makes it ready, overwriting a message not yet consumed.
    fn notify(thread: Self::Thread, msg: MTMsg);

    /// Same as `notify` but callable from an interrupt.
    /// * Records a pending yield instead of switching when `thread` outranks the current one.
    fn notify_from_isr(thread: Self::Thread, msg: MTMsg);

    fn enter_critical();
    fn exit_critical();

    fn enter_critical_from_isr() -> Self::IsrStatus;
    fn exit_critical_from_isr(sts: Self::IsrStatus);

    /// Checks if the calling context holds the critical section.
    /// * Only consulted by contract checks.
    fn is_critical() -> bool
    {
        crate::cortex::irq_masked()
    }

    /// Checks if the calling context is an interrupt handler.
    /// * Only consulted by contract checks.
    fn is_isr() -> bool
    {
        crate::cortex::in_handler_mode()
    }

    /// Checks if a higher priority thread became ready and a switch is due.
    fn yield_pending() -> bool;

    /// Switches to a higher priority thread from thread context.
    fn yield_now();

    /// Requests a switch on exception return.
    fn yield_from_isr();

    /// Gets the tick count since the scheduler started.
    fn tick_count() -> MTSysTime;

    /// Blocks the calling thread for `ticks`.
    fn delay(ticks: MTSysTime);
}
