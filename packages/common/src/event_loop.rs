//! # Host Event Loop
//!
//! Single-threaded, cooperative task queues standing in for the host environment's
//! event loop.
//!
//! ## Queues
//!
//! - **Microtasks**: drained completely (including tasks queued while draining) by
//!   [`EventLoop::run_microtasks`]. Futures spawned with [`EventLoop::spawn_local`]
//!   are polled as part of the same drain.
//! - **Animation frames**: callbacks registered before a call to
//!   [`EventLoop::next_frame`] run during it; callbacks registered while a frame is
//!   running wait for the following frame.
//! - **Timers**: keyed by a virtual millisecond clock that only moves through
//!   [`EventLoop::advance_time`] or [`EventLoop::run_until_idle`].
//!
//! Microtasks are drained after every frame callback and every timer, matching
//! browser ordering.

use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawnExt;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::rc::Rc;
use tracing::{error, trace};

/// A unit of deferred work
pub type Task = Box<dyn FnOnce()>;

/// Handle returned by [`EventLoop::set_timeout`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// Handle returned by [`EventLoop::request_animation_frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(u64);

/// Upper bound on loop iterations in [`EventLoop::run_until_idle`]
const IDLE_ITERATION_LIMIT: usize = 10_000;

struct Inner {
    microtasks: RefCell<VecDeque<Task>>,
    frames: RefCell<Vec<(FrameId, Task)>>,
    /// (deadline, sequence) -> task
    timers: RefCell<BTreeMap<(u64, u64), Task>>,
    now: Cell<u64>,
    seq: Cell<u64>,
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
    draining: Cell<bool>,
}

/// Cloneable handle to the host event loop
#[derive(Clone)]
pub struct EventLoop {
    inner: Rc<Inner>,
}

impl EventLoop {
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            inner: Rc::new(Inner {
                microtasks: RefCell::new(VecDeque::new()),
                frames: RefCell::new(Vec::new()),
                timers: RefCell::new(BTreeMap::new()),
                now: Cell::new(0),
                seq: Cell::new(0),
                pool: RefCell::new(pool),
                spawner,
                draining: Cell::new(false),
            }),
        }
    }

    fn next_seq(&self) -> u64 {
        let seq = self.inner.seq.get() + 1;
        self.inner.seq.set(seq);
        seq
    }

    /// Current virtual time in milliseconds
    pub fn now(&self) -> u64 {
        self.inner.now.get()
    }

    pub fn queue_microtask(&self, task: impl FnOnce() + 'static) {
        self.inner.microtasks.borrow_mut().push_back(Box::new(task));
    }

    pub fn request_animation_frame(&self, task: impl FnOnce() + 'static) -> FrameId {
        let id = FrameId(self.next_seq());
        self.inner.frames.borrow_mut().push((id, Box::new(task)));
        id
    }

    pub fn cancel_animation_frame(&self, id: FrameId) {
        self.inner.frames.borrow_mut().retain(|(frame, _)| *frame != id);
    }

    pub fn set_timeout(&self, task: impl FnOnce() + 'static, delay_ms: u64) -> TimerId {
        let seq = self.next_seq();
        let deadline = self.now() + delay_ms;
        self.inner
            .timers
            .borrow_mut()
            .insert((deadline, seq), Box::new(task));
        TimerId(seq)
    }

    pub fn clear_timeout(&self, id: TimerId) {
        self.inner
            .timers
            .borrow_mut()
            .retain(|(_, seq), _| *seq != id.0);
    }

    /// Spawn a future onto the local executor; it is polled while microtasks drain
    pub fn spawn_local(&self, future: impl Future<Output = ()> + 'static) {
        if let Err(err) = self.inner.spawner.spawn_local(future) {
            error!(error = %err, "Failed to spawn local task");
        }
    }

    /// Drain the microtask queue and poll spawned futures until both are quiet.
    ///
    /// Re-entrant calls (from inside a microtask) return immediately; the outer
    /// drain picks up anything they would have run.
    pub fn run_microtasks(&self) {
        if self.inner.draining.replace(true) {
            return;
        }
        let _reset = DrainReset(&self.inner.draining);

        loop {
            loop {
                let next = self.inner.microtasks.borrow_mut().pop_front();
                match next {
                    Some(task) => task(),
                    None => break,
                }
            }

            if let Ok(mut pool) = self.inner.pool.try_borrow_mut() {
                pool.run_until_stalled();
            }

            if self.inner.microtasks.borrow().is_empty() {
                break;
            }
        }
    }

    /// Run every animation-frame callback registered so far.
    ///
    /// Returns the number of callbacks executed.
    pub fn next_frame(&self) -> usize {
        self.run_microtasks();
        let frames = std::mem::take(&mut *self.inner.frames.borrow_mut());
        let count = frames.len();
        trace!(count, "Running animation frame");
        for (_, task) in frames {
            task();
            self.run_microtasks();
        }
        count
    }

    /// Move the virtual clock forward, firing due timers in deadline order
    pub fn advance_time(&self, ms: u64) {
        self.run_microtasks();
        let target = self.now() + ms;
        while let Some(task) = self.pop_timer_due_by(target) {
            task();
            self.run_microtasks();
        }
        self.inner.now.set(target);
    }

    fn pop_timer_due_by(&self, limit: u64) -> Option<Task> {
        let mut timers = self.inner.timers.borrow_mut();
        let key = *timers.keys().next()?;
        if key.0 > limit {
            return None;
        }
        self.inner.now.set(key.0.max(self.now()));
        timers.remove(&key)
    }

    /// Run microtasks, frames and timers until nothing is left to do
    pub fn run_until_idle(&self) {
        for _ in 0..IDLE_ITERATION_LIMIT {
            self.run_microtasks();

            if !self.inner.frames.borrow().is_empty() {
                self.next_frame();
                continue;
            }

            let next_deadline = self.inner.timers.borrow().keys().next().map(|(d, _)| *d);
            match next_deadline {
                Some(deadline) => {
                    let delta = deadline.saturating_sub(self.now());
                    self.advance_time(delta);
                }
                None => return,
            }
        }
        error!("Event loop did not settle; giving up after {IDLE_ITERATION_LIMIT} iterations");
    }

    pub fn has_pending_work(&self) -> bool {
        !self.inner.microtasks.borrow().is_empty()
            || !self.inner.frames.borrow().is_empty()
            || !self.inner.timers.borrow().is_empty()
    }

    pub fn pending_timers(&self) -> usize {
        self.inner.timers.borrow().len()
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("now", &self.now())
            .field("microtasks", &self.inner.microtasks.borrow().len())
            .field("frames", &self.inner.frames.borrow().len())
            .field("timers", &self.inner.timers.borrow().len())
            .finish()
    }
}

struct DrainReset<'a>(&'a Cell<bool>);

impl Drop for DrainReset<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}
