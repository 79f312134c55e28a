//! Microtask-batched job queue
//!
//! Jobs run in enqueue order within one flush. Jobs queued during a flush are
//! appended and run before the flush completes. A job stays in the queue until the
//! flush ends, so re-queuing one that already ran in this flush is a no-op, and
//! `dequeue` cannot remove a job at or before the last flushed index.

use crate::effect::{effect_with_scheduler, EffectHandle};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::{instrument, trace};

pub type Job = Rc<dyn Fn()>;

/// Posts a task to run on the next microtask
pub type MicrotaskHook = Box<dyn Fn(Box<dyn FnOnce()>)>;

fn same_job(a: &Job, b: &Job) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

struct SchedulerInner {
    queue: RefCell<Vec<Job>>,
    flush_pending: Cell<bool>,
    flushing: Cell<bool>,
    last_flushed: Cell<Option<usize>>,
    post: MicrotaskHook,
}

#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(post: impl Fn(Box<dyn FnOnce()>) + 'static) -> Self {
        Self {
            inner: Rc::new(SchedulerInner {
                queue: RefCell::new(Vec::new()),
                flush_pending: Cell::new(false),
                flushing: Cell::new(false),
                last_flushed: Cell::new(None),
                post: Box::new(post),
            }),
        }
    }

    /// Enqueue `job` unless it is already queued, and make sure a flush is posted
    pub fn schedule(&self, job: Job) {
        {
            let mut queue = self.inner.queue.borrow_mut();
            if !queue.iter().any(|queued| same_job(queued, &job)) {
                queue.push(job);
            }
        }
        self.queue_flush();
    }

    /// Remove `job` if it has not run yet in the current flush
    pub fn dequeue(&self, job: &Job) {
        let mut queue = self.inner.queue.borrow_mut();
        let Some(index) = queue.iter().position(|queued| same_job(queued, job)) else {
            return;
        };
        let already_ran = self
            .inner
            .last_flushed
            .get()
            .is_some_and(|last| index <= last);
        if !already_ran {
            queue.remove(index);
        }
    }

    fn queue_flush(&self) {
        if self.inner.flushing.get() || self.inner.flush_pending.get() {
            return;
        }
        self.inner.flush_pending.set(true);

        let weak: Weak<SchedulerInner> = Rc::downgrade(&self.inner);
        (self.inner.post)(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                Scheduler { inner }.flush();
            }
        }));
    }

    /// Run every queued job, including ones appended while flushing
    #[instrument(skip(self), name = "scheduler_flush")]
    pub fn flush(&self) {
        if self.inner.flushing.replace(true) {
            return;
        }
        self.inner.flush_pending.set(false);

        let mut index = 0;
        loop {
            let job = self.inner.queue.borrow().get(index).cloned();
            let Some(job) = job else {
                break;
            };
            // Marked before running so a job cannot dequeue the one after it
            self.inner.last_flushed.set(Some(index));
            job();
            index += 1;
        }
        trace!(jobs = index, "Flushed");

        self.inner.queue.borrow_mut().clear();
        self.inner.last_flushed.set(None);
        self.inner.flushing.set(false);
    }

    pub fn is_flush_pending(&self) -> bool {
        self.inner.flush_pending.get()
    }

    pub fn queued(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Create an effect whose reruns are queued on this scheduler
    pub fn effect(&self, f: impl Fn() + 'static) -> EffectHandle {
        let scheduler = self.clone();
        let job: RefCell<Option<Job>> = RefCell::new(None);
        effect_with_scheduler(f, move |handle| {
            let job = job
                .borrow_mut()
                .get_or_insert_with(|| Rc::new(move || handle.run()) as Job)
                .clone();
            scheduler.schedule(job);
        })
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("queued", &self.queued())
            .field("flush_pending", &self.is_flush_pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scheduler whose microtasks are collected for the test to run by hand
    fn manual() -> (Scheduler, Rc<RefCell<Vec<Box<dyn FnOnce()>>>>) {
        let posted: Rc<RefCell<Vec<Box<dyn FnOnce()>>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = posted.clone();
        let scheduler = Scheduler::new(move |task| sink.borrow_mut().push(task));
        (scheduler, posted)
    }

    fn drain(posted: &Rc<RefCell<Vec<Box<dyn FnOnce()>>>>) {
        let tasks = std::mem::take(&mut *posted.borrow_mut());
        tasks.into_iter().for_each(|task| task());
    }

    #[test]
    fn test_duplicate_job_runs_once() {
        let (scheduler, posted) = manual();
        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();
        let job: Job = Rc::new(move || count_clone.set(count_clone.get() + 1));

        scheduler.schedule(job.clone());
        scheduler.schedule(job);
        assert_eq!(posted.borrow().len(), 1);

        drain(&posted);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_jobs_added_during_flush_run_in_same_flush() {
        let (scheduler, posted) = manual();
        let log = Rc::new(RefCell::new(Vec::new()));

        let log_b = log.clone();
        let job_b: Job = Rc::new(move || log_b.borrow_mut().push("b"));
        let log_a = log.clone();
        let inner = scheduler.clone();
        let job_a: Job = Rc::new(move || {
            log_a.borrow_mut().push("a");
            inner.schedule(job_b.clone());
        });

        scheduler.schedule(job_a);
        drain(&posted);
        assert_eq!(*log.borrow(), vec!["a", "b"]);
        assert!(posted.borrow().is_empty());
    }

    #[test]
    fn test_dequeue_only_removes_pending_jobs() {
        let (scheduler, posted) = manual();
        let log = Rc::new(RefCell::new(Vec::new()));

        let log_c = log.clone();
        let job_c: Job = Rc::new(move || log_c.borrow_mut().push("c"));
        let log_b = log.clone();
        let job_b: Job = Rc::new(move || log_b.borrow_mut().push("b"));

        let log_a = log.clone();
        let inner = scheduler.clone();
        let (b, c) = (job_b.clone(), job_c.clone());
        let job_a: Job = Rc::new(move || {
            log_a.borrow_mut().push("a");
            // `a` already ran; `c` is still pending
            inner.dequeue(&c);
            inner.schedule(b.clone());
        });

        scheduler.schedule(job_a);
        scheduler.schedule(job_c);
        drain(&posted);
        assert_eq!(*log.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn test_rescheduling_a_flushed_job_is_ignored_until_next_flush() {
        let (scheduler, posted) = manual();
        let count = Rc::new(Cell::new(0));

        let self_ref: Rc<RefCell<Option<Job>>> = Rc::new(RefCell::new(None));
        let inner = scheduler.clone();
        let (count_clone, self_clone) = (count.clone(), self_ref.clone());
        let job: Job = Rc::new(move || {
            count_clone.set(count_clone.get() + 1);
            if let Some(me) = self_clone.borrow().clone() {
                inner.schedule(me);
            }
        });
        *self_ref.borrow_mut() = Some(job.clone());

        scheduler.schedule(job);
        drain(&posted);
        assert_eq!(count.get(), 1);
        self_ref.borrow_mut().take();
    }
}
