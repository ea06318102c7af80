use core::cell::Cell;
use core::ptr::NonNull;

use crate::{MTPort, MTSys, MTSysLock, MTClassI, MTThreadRef, MTMsg, MTSysTime, MT_TIME_IMMEDIATE};
use crate::{mt_dbg_check, mt_dbg_check_class_i, mt_dbg_check_class_s};

//

#[derive(Clone, Copy, PartialEq, Debug)]
enum MTQueueOrder
{
    Lifo,
    Fifo
}

/// Link of a waiting thread; lives on the waiting thread's stack while it is enqueued.
struct MTWaitNode<P: MTPort>
{
    tref: MTThreadRef<P>,
    next: Cell<Option<NonNull<MTWaitNode<P>>>>,
    linked: Cell<bool>
}

//

/// Queue of threads waiting for a condition
///
/// `new` builds the compatible last-in-first-out queue: `dequeue_next_*` wakes the most
/// recently enqueued thread. `new_fifo` builds a first-in-first-out one instead.
pub struct MTThreadQueue<P: MTPort>
{
    head: Cell<Option<NonNull<MTWaitNode<P>>>>,
    tail: Cell<Option<NonNull<MTWaitNode<P>>>>,
    order: MTQueueOrder
}

// NOTE: nodes are touched only in the critical section and unlinked before their owner returns
unsafe impl<P: MTPort> Sync for MTThreadQueue<P> {}
unsafe impl<P: MTPort> Send for MTThreadQueue<P> {}

impl<P: MTPort> MTThreadQueue<P>
{
    /// Creates an empty queue waking the most recently enqueued thread first.
    pub const fn new() -> MTThreadQueue<P>
    {
        MTThreadQueue {
            head: Cell::new(None),
            tail: Cell::new(None),
            order: MTQueueOrder::Lifo
        }
    }

    /// Creates an empty queue waking the least recently enqueued thread first.
    pub const fn new_fifo() -> MTThreadQueue<P>
    {
        MTThreadQueue {
            head: Cell::new(None),
            tail: Cell::new(None),
            order: MTQueueOrder::Fifo
        }
    }

    /// Makes the queue empty, keeping its order.
    pub fn init(&mut self)
    {
        self.head.set(None);
        self.tail.set(None);
    }

    // ----- ----- Thread context ----- ----- //

    /// Enqueues the current thread and suspends it until dequeued or timed out.
    /// * `timeout` - ticks to wait. `MT_TIME_IMMEDIATE` returns at once without enqueueing.
    /// * Returns the message given to `dequeue_*`, or `MTMsg::TIMEOUT`.
    pub fn enqueue_timeout_s(&self, cs: &MTSysLock<P>, timeout: MTSysTime) -> MTMsg
    {
        if timeout == MT_TIME_IMMEDIATE {
            return MTMsg::TIMEOUT;
        }

        mt_dbg_check_class_s!(P);

        let node = MTWaitNode {
            tref: MTThreadRef::new(),
            next: Cell::new(None),
            linked: Cell::new(false)
        };

        self.link(&node);

        let msg = MTSys::suspend_timeout_s(cs, Some(&node.tref), timeout);

        if node.linked.get() {
            log::trace!("thread queue: waiter timed out");
            self.unlink(&node);
        }

        msg
    }

    /// Same as `enqueue_timeout_s` but manages the critical section itself.
    pub fn enqueue_timeout(&self, timeout: MTSysTime) -> MTMsg
    {
        let cs = MTSys::<P>::lock();

        self.enqueue_timeout_s(&cs, timeout)
    }

    // ----- ----- Thread and Interrupt context ----- ----- //

    /// Wakes the thread at the head of the queue, if any, with `msg`.
    pub fn dequeue_next_i<C: MTClassI<P>>(&self, cs: &C, msg: MTMsg)
    {
        mt_dbg_check_class_i!(P);

        if let Some(node) = self.pop() {
            // NOTE: the node stays valid until its thread runs, which needs the critical section
            let node = unsafe { node.as_ref() };
            MTSys::resume_i(cs, &node.tref, msg);
        }
    }

    /// Same as `dequeue_next_i` but manages the critical section itself.
    pub fn dequeue_next(&self, msg: MTMsg)
    {
        let cs = MTSys::<P>::lock();

        self.dequeue_next_i(&cs, msg);
    }

    /// Wakes every thread in the queue with the same `msg`.
    pub fn dequeue_all_i<C: MTClassI<P>>(&self, cs: &C, msg: MTMsg)
    {
        mt_dbg_check_class_i!(P);

        while let Some(node) = self.pop() {
            let node = unsafe { node.as_ref() };
            MTSys::resume_i(cs, &node.tref, msg);
        }
    }

    /// Same as `dequeue_all_i` but manages the critical section itself.
    pub fn dequeue_all(&self, msg: MTMsg)
    {
        let cs = MTSys::<P>::lock();

        self.dequeue_all_i(&cs, msg);
    }

    /// Checks if no thread is waiting.
    pub fn is_empty_i<C: MTClassI<P>>(&self, _cs: &C) -> bool
    {
        mt_dbg_check_class_i!(P);

        self.head.get().is_none()
    }

    // ----- ----- List operations ----- ----- //

    fn link(&self, node: &MTWaitNode<P>)
    {
        let ptr = NonNull::from(node);

        match self.order {
            MTQueueOrder::Lifo => {
                node.next.set(self.head.get());
                self.head.set(Some(ptr));
                if self.tail.get().is_none() {
                    self.tail.set(Some(ptr));
                }
            }
            MTQueueOrder::Fifo => {
                node.next.set(None);
                if let Some(tail) = self.tail.get() {
                    unsafe { tail.as_ref() }.next.set(Some(ptr));
                }
                else {
                    self.head.set(Some(ptr));
                }
                self.tail.set(Some(ptr));
            }
        }

        node.linked.set(true);
    }

    fn pop(&self) -> Option<NonNull<MTWaitNode<P>>>
    {
        let head = self.head.get()?;
        let node = unsafe { head.as_ref() };

        self.head.set(node.next.get());
        if self.head.get().is_none() {
            self.tail.set(None);
        }

        node.next.set(None);
        node.linked.set(false);

        Some(head)
    }

    fn unlink(&self, node: &MTWaitNode<P>)
    {
        let target = NonNull::from(node);

        let mut prev: Option<NonNull<MTWaitNode<P>>> = None;
        let mut cur = self.head.get();

        while let Some(ptr) = cur {
            let next = unsafe { ptr.as_ref() }.next.get();

            if ptr == target {
                match prev {
                    Some(prev) => unsafe { prev.as_ref() }.next.set(next),
                    None => self.head.set(next)
                }
                if self.tail.get() == Some(target) {
                    self.tail.set(prev);
                }

                node.next.set(None);
                node.linked.set(false);
                return;
            }

            prev = cur;
            cur = next;
        }

        mt_dbg_check!(false, "wait node not in its queue");
    }
}
