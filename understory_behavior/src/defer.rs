// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deferred work: timers on a logical clock, one-shot event waits,
//! persistent element listeners and externally triggered trampolines.
//!
//! Everything here is single-threaded. The engine owns the clock; hosts move
//! it forward with [`Behavior::advance`](crate::Behavior::advance) and feed
//! native events through
//! [`Behavior::dispatch_event`](crate::Behavior::dispatch_event).

use core::time::Duration;
use std::collections::BTreeMap;
use std::rc::Rc;

use hashbrown::HashMap;
use understory_dom::{Document, Event, NodeId};

use crate::engine::Behavior;
use crate::error::Result;
use crate::filter::{Filter, Output};

/// Handle of a scheduled task.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    #[cfg(test)]
    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

/// One-shot handle that runs a deferred filter's setup.
///
/// Handed to [`Deferral::Initializer`](crate::Deferral::Initializer)
/// callbacks; pass it to [`Behavior::run_setup`](crate::Behavior::run_setup).
/// Running it more than once, or after the filter was cleaned up, does nothing.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Trampoline(pub(crate) TaskId);

/// Work run by a timer.
pub(crate) type Callback = Box<dyn FnOnce(&Behavior, &mut Document) -> Result<()>>;

pub(crate) enum Job {
    Activate {
        element: NodeId,
        filter: Rc<Filter>,
        force: bool,
        plugin_target: Option<Output>,
    },
    Callback(Callback),
}

/// A persistent listener added with [`Behavior::add_listener`].
pub type ListenerFn = dyn Fn(&Behavior, &mut Document, &Event) -> Result<()>;

struct Listener {
    element: NodeId,
    types: Vec<String>,
    callback: Rc<ListenerFn>,
}

struct Wait {
    element: NodeId,
    types: Vec<String>,
    job: Job,
}

#[derive(Default)]
pub(crate) struct Scheduler {
    now: Duration,
    next: u64,
    timers: BTreeMap<(Duration, TaskId), Job>,
    due: HashMap<TaskId, Duration>,
    waits: BTreeMap<TaskId, Wait>,
    listeners: BTreeMap<TaskId, Listener>,
    trampolines: HashMap<TaskId, Job>,
}

impl core::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scheduler")
            .field("now", &self.now)
            .field("timers", &self.timers.len())
            .field("waits", &self.waits.len())
            .field("listeners", &self.listeners.len())
            .field("trampolines", &self.trampolines.len())
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    pub(crate) fn now(&self) -> Duration {
        self.now
    }

    pub(crate) fn set_now(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }

    fn alloc(&mut self) -> TaskId {
        self.next += 1;
        TaskId(self.next)
    }

    pub(crate) fn after(&mut self, delay: Duration, job: Job) -> TaskId {
        let id = self.alloc();
        let due = self.now + delay;
        self.timers.insert((due, id), job);
        self.due.insert(id, due);
        id
    }

    pub(crate) fn until(&mut self, element: NodeId, types: Vec<String>, job: Job) -> TaskId {
        let id = self.alloc();
        self.waits.insert(id, Wait { element, types, job });
        id
    }

    pub(crate) fn listen(&mut self, element: NodeId, types: Vec<String>, callback: Rc<ListenerFn>) -> TaskId {
        let id = self.alloc();
        self.listeners.insert(
            id,
            Listener {
                element,
                types,
                callback,
            },
        );
        id
    }

    pub(crate) fn trampoline(&mut self, job: Job) -> TaskId {
        let id = self.alloc();
        self.trampolines.insert(id, job);
        id
    }

    /// Drop a task wherever it is scheduled. Returns true if it was pending.
    pub(crate) fn cancel(&mut self, id: TaskId) -> bool {
        if let Some(due) = self.due.remove(&id) {
            self.timers.remove(&(due, id));
            return true;
        }
        self.waits.remove(&id).is_some()
            || self.listeners.remove(&id).is_some()
            || self.trampolines.remove(&id).is_some()
    }

    #[cfg(test)]
    pub(crate) fn is_scheduled(&self, id: TaskId) -> bool {
        self.due.contains_key(&id)
            || self.waits.contains_key(&id)
            || self.listeners.contains_key(&id)
            || self.trampolines.contains_key(&id)
    }

    /// Pop the earliest timer due at or before `until`, advancing the clock to it.
    pub(crate) fn pop_due(&mut self, until: Duration) -> Option<(TaskId, Job)> {
        let (&(due, id), _) = self.timers.first_key_value()?;
        if due > until {
            return None;
        }
        let job = self.timers.remove(&(due, id))?;
        self.due.remove(&id);
        self.set_now(due);
        Some((id, job))
    }

    /// Remove and return waits whose element lies on `path` and that listen for `kind`.
    pub(crate) fn take_waiting(&mut self, path: &[NodeId], kind: &str) -> Vec<(TaskId, Job)> {
        let ready: Vec<TaskId> = self
            .waits
            .iter()
            .filter(|(_, w)| path.contains(&w.element) && w.types.iter().any(|t| t == kind))
            .map(|(id, _)| *id)
            .collect();
        ready
            .into_iter()
            .filter_map(|id| self.waits.remove(&id).map(|w| (id, w.job)))
            .collect()
    }

    /// Listeners on `path` that accept the event, in the order they were added.
    ///
    /// `accepts` decides whether a declared type matches for a listener's element.
    pub(crate) fn listeners_on(
        &self,
        path: &[NodeId],
        accepts: impl Fn(NodeId, &str) -> bool,
    ) -> Vec<(NodeId, Rc<ListenerFn>)> {
        self.listeners
            .values()
            .filter(|l| path.contains(&l.element) && l.types.iter().any(|t| accepts(l.element, t)))
            .map(|l| (l.element, l.callback.clone()))
            .collect()
    }

    pub(crate) fn take_trampoline(&mut self, id: TaskId) -> Option<Job> {
        self.trampolines.remove(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.timers.len() + self.waits.len() + self.listeners.len() + self.trampolines.len()
    }
}
