use crate::graph::{self, with_graph, EffectId, EffectSlot, Key, TargetId};
use indexmap::IndexSet;
use std::rc::Rc;
use tracing::trace;

/// Handle to a registered effect. Copyable; outlives the effect safely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectHandle {
    id: EffectId,
}

impl EffectHandle {
    /// Run the effect now, re-collecting its dependencies. No-op once released.
    pub fn run(&self) {
        run_effect(self.id);
    }

    pub fn is_active(&self) -> bool {
        with_graph(|graph| graph.effects.contains_key(self.id))
    }

    /// Number of dependency entries this effect currently belongs to
    pub fn dependency_count(&self) -> usize {
        with_graph(|graph| graph.effects.get(self.id).map_or(0, |slot| slot.deps.len()))
    }
}

/// Register `f` as an effect and run it immediately. Reruns inline on trigger.
pub fn effect(f: impl Fn() + 'static) -> EffectHandle {
    register(Rc::new(f), None)
}

/// Register `f` as an effect and run it immediately. On trigger, `scheduler`
/// is handed the effect's handle instead of rerunning it inline.
pub fn effect_with_scheduler(
    f: impl Fn() + 'static,
    scheduler: impl Fn(EffectHandle) + 'static,
) -> EffectHandle {
    register(Rc::new(f), Some(Rc::new(scheduler)))
}

fn register(run: graph::EffectFn, scheduler: Option<graph::SchedulerFn>) -> EffectHandle {
    let id = with_graph(|graph| {
        graph.effects.insert(EffectSlot {
            run,
            scheduler,
            deps: Vec::new(),
        })
    });
    let handle = EffectHandle { id };
    handle.run();
    handle
}

/// Release an effect: it leaves every dependency entry before this returns and
/// never runs again. Releasing twice is a no-op.
pub fn release(handle: EffectHandle) {
    with_graph(|graph| {
        graph.cleanup(handle.id);
        graph.effects.remove(handle.id);
    })
}

/// Run `f` without recording dependencies for the surrounding effect
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    with_graph(|graph| graph.paused += 1);
    let _resume = ResumeTracking;
    f()
}

struct ResumeTracking;

impl Drop for ResumeTracking {
    fn drop(&mut self) {
        with_graph(|graph| graph.paused = graph.paused.saturating_sub(1));
    }
}

/// Restores the effect stack and pause depth after a run, even on panic
struct RunGuard {
    paused: usize,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        with_graph(|graph| {
            graph.stack.pop();
            graph.paused = self.paused;
        });
    }
}

fn run_effect(id: EffectId) {
    let run = with_graph(|graph| {
        // Recursion guard: an effect never re-enters itself
        if graph.stack.contains(&id) {
            return None;
        }
        let run = graph.effects.get(id)?.run.clone();
        graph.cleanup(id);
        Some(run)
    });
    let Some(run) = run else {
        return;
    };

    let paused = with_graph(|graph| {
        graph.stack.push(id);
        std::mem::replace(&mut graph.paused, 0)
    });
    let _guard = RunGuard { paused };
    run();
}

/// Notify every effect depending on `(target, key)`
pub fn trigger(target: TargetId, key: Key) {
    trigger_effects(graph::collect(target, &[key]));
}

/// Notify every effect depending on any of `keys`
pub fn trigger_keys(target: TargetId, keys: &[Key]) {
    trigger_effects(graph::collect(target, keys));
}

/// Notify every effect depending on any key of `target` (bulk clear)
pub fn trigger_all(target: TargetId) {
    trigger_effects(graph::collect_where(target, |_| true));
}

/// Notify effects depending on `length` or on any index at or past `from`
pub fn trigger_from_index(target: TargetId, from: usize) {
    trigger_effects(graph::collect_where(target, |key| match key {
        Key::Index(i) => *i >= from,
        Key::Length | Key::Iterate => true,
        _ => false,
    }));
}

fn trigger_effects(effects: IndexSet<EffectId>) {
    for id in effects {
        let scheduler = with_graph(|graph| {
            if graph.stack.last() == Some(&id) {
                return None;
            }
            graph.effects.get(id).map(|slot| slot.scheduler.clone())
        });
        match scheduler {
            // Released, or the effect is writing to its own dependency
            None => continue,
            Some(Some(scheduler)) => {
                trace!(?id, "Scheduling effect");
                scheduler(EffectHandle { id });
            }
            Some(None) => run_effect(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{graph_stats, track};
    use std::cell::Cell;

    #[test]
    fn test_effect_reruns_on_trigger() {
        let target = TargetId::fresh();
        let runs = Rc::new(Cell::new(0));

        let runs_clone = runs.clone();
        let handle = effect(move || {
            track(target, Key::Length);
            runs_clone.set(runs_clone.get() + 1);
        });
        assert_eq!(runs.get(), 1);
        assert_eq!(handle.dependency_count(), 1);

        trigger(target, Key::Length);
        assert_eq!(runs.get(), 2);

        trigger(target, Key::Iterate);
        assert_eq!(runs.get(), 2);
        release(handle);
    }

    #[test]
    fn test_release_is_idempotent_and_final() {
        let target = TargetId::fresh();
        let runs = Rc::new(Cell::new(0));
        let before = graph_stats();

        let runs_clone = runs.clone();
        let handle = effect(move || {
            track(target, Key::Value);
            runs_clone.set(runs_clone.get() + 1);
        });
        release(handle);
        release(handle);

        trigger(target, Key::Value);
        handle.run();
        assert_eq!(runs.get(), 1);
        assert!(!handle.is_active());
        assert_eq!(graph_stats(), before);
    }

    #[test]
    fn test_scheduler_receives_handle() {
        let target = TargetId::fresh();
        let scheduled = Rc::new(Cell::new(0));

        let scheduled_clone = scheduled.clone();
        let handle = effect_with_scheduler(
            move || track(target, Key::Value),
            move |_| scheduled_clone.set(scheduled_clone.get() + 1),
        );

        trigger(target, Key::Value);
        trigger(target, Key::Value);
        assert_eq!(scheduled.get(), 2);
        release(handle);
    }

    #[test]
    fn test_untracked_reads_do_not_subscribe() {
        let target = TargetId::fresh();
        let runs = Rc::new(Cell::new(0));

        let runs_clone = runs.clone();
        let handle = effect(move || {
            untracked(|| track(target, Key::Value));
            runs_clone.set(runs_clone.get() + 1);
        });

        trigger(target, Key::Value);
        assert_eq!(runs.get(), 1);
        assert_eq!(handle.dependency_count(), 0);
        release(handle);
    }

    #[test]
    fn test_trigger_from_index_selects_truncated_slots() {
        let target = TargetId::fresh();
        let seen = Rc::new(Cell::new(0));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let seen = seen.clone();
                effect(move || {
                    track(target, Key::Index(i));
                    seen.set(seen.get() + 1);
                })
            })
            .collect();
        seen.set(0);

        trigger_from_index(target, 2);
        assert_eq!(seen.get(), 2);
        handles.into_iter().for_each(release);
    }
}
