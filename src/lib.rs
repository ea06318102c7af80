/*!
This crate for Rust provides an OS abstraction layer `MTSys` for Cortex-M microcontrollers:
the thread suspension, thread queue and event primitives a hardware abstraction layer builds its drivers on.

# Target

**Single-core** systems of

* Cortex-M0 / M0+ / M1  (`thumbv6m-none-eabi`)
* Cortex-M3  (`thumbv7m-none-eabi`)
* Cortex-M4 / M7  (`thumbv7em-none-eabi`)
* Cortex-M4 / M7 with FPU  (`thumbv7em-none-eabihf`)
* Cortex-M23  (`thumbv8m.base-none-eabi`)
* Cortex-M33 / M35P  (`thumbv8m.main-none-eabi`)

running a preemptive priority-based scheduler, which is reached through `MTPort`.
The scheduler itself is not part of this crate.

# Features

* Critical section discipline
  * `MTSys::lock` and `MTSys::lock_from_isr` return guards proving the critical section is held.
  * Functions suffixed `_i` take either guard and may run in interrupts.
  * Functions suffixed `_s` take the thread-context guard only since they may suspend.
  * Functions without suffix take the critical section themselves.
  * Contract violations halt when `debug_assertions` or the `dbg-checks` feature is enabled.
* Thread suspension
  * `MTSys::suspend_timeout_s` and `MTSys::resume_i` through a `MTThreadRef`.
* Thread queue
  * `MTThreadQueue` wakes the most recently enqueued thread first; `MTThreadQueue::new_fifo` the oldest.
* Events
  * `MTEventSource` accumulates flags for a single waiter.
  * `MTEventRepeater` derives a flag on another source when trigger flags appear.
  * *Not supported: detecting cycles of repeaters. Callers must keep the graph acyclic.*
* Static memory allocation
  * Every object is `const`-constructible and placed by the caller; nothing is allocated.

# Examples
## Usage Outline

```ignore
// Build-only example

#![no_main]
#![no_std]

use mtosal_cortex_m::*;

struct Port; // glue to the underlying scheduler

unsafe impl MTPort for Port {
    // other codes...
}

static RX_DONE: MTEventSource<'static, Port> = MTEventSource::new();
static ANY_DONE: MTEventSource<'static, Port> = MTEventSource::new();
static RX_REP: MTEventRepeater<'static, Port> = MTEventRepeater::new();

fn setup()
{
    RX_REP.register(&RX_DONE, 1, &ANY_DONE, 1 << 4);
}

fn uart_irq()
{
    {
        let cs = MTSys::<Port>::lock_from_isr();
        RX_DONE.broadcast_flags_i(&cs, 1);
    }
    MTSys::<Port>::irq_epilogue();
}

fn task()
{
    loop {
        let flags = ANY_DONE.wait_timeout(MTSys::<Port>::ms2st(100));
        if flags == 0 {
            // timed out
            continue;
        }

        let rx_flags = RX_REP.collect();

        // other codes...
    }
}
```
*/

#![cfg_attr(not(test), no_std)]

mod bkptpanic;
pub mod cortex;
mod port;
mod time;
mod sys;
mod thdqueue;
mod event;

#[cfg(test)]
mod hostport;

pub use crate::port::MTPort;
pub use crate::time::{MTSysTime, MT_TIME_IMMEDIATE, MT_TIME_INFINITE, mt_t2st, mt_is_time_within};
pub use crate::sys::{MTSys, MTSysLock, MTIsrLock, MTClassI, MTThreadRef, MTMsg};
pub use crate::thdqueue::MTThreadQueue;
pub use crate::event::{MTEventSource, MTEventRepeater, MTEventFlags, MTEventCallback, MT_REPEATER_DEPTH_MAX};
