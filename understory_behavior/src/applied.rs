// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Side table of filters applied to elements.

use std::rc::Rc;

use hashbrown::HashMap;
use understory_dom::{Document, NodeId};

use crate::defer::TaskId;
use crate::filter::{Filter, Output};

/// Undo hook registered by a filter.
pub(crate) type Cleanup = Box<dyn FnOnce(&mut Document)>;

pub(crate) enum Phase {
    /// Waiting on a deferred activation.
    Pending,
    /// Setup ran and produced this result.
    Active(Option<Output>),
}

pub(crate) struct AppliedState {
    pub(crate) filter: Rc<Filter>,
    pub(crate) phase: Phase,
    pub(crate) cleanups: Vec<Cleanup>,
    /// Deferred activation and filter-owned timers; cancelled on cleanup.
    pub(crate) tasks: Vec<TaskId>,
}

impl AppliedState {
    pub(crate) fn pending(filter: Rc<Filter>, task: TaskId) -> Self {
        Self {
            filter,
            phase: Phase::Pending,
            cleanups: Vec::new(),
            tasks: vec![task],
        }
    }
}

/// Applied states keyed by element, in application order per element.
#[derive(Default)]
pub(crate) struct AppliedTable {
    states: HashMap<NodeId, Vec<AppliedState>>,
}

impl core::fmt::Debug for AppliedTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let applied: usize = self.states.values().map(Vec::len).sum();
        f.debug_struct("AppliedTable")
            .field("elements", &self.states.len())
            .field("applied", &applied)
            .finish_non_exhaustive()
    }
}

impl AppliedTable {
    pub(crate) fn get(&self, element: NodeId, name: &str) -> Option<&AppliedState> {
        self.states
            .get(&element)?
            .iter()
            .find(|s| s.filter.name() == name)
    }

    pub(crate) fn contains(&self, element: NodeId, name: &str) -> bool {
        self.get(element, name).is_some()
    }

    pub(crate) fn is_pending(&self, element: NodeId, name: &str, task: TaskId) -> bool {
        self.get(element, name)
            .is_some_and(|s| matches!(s.phase, Phase::Pending) && s.tasks.contains(&task))
    }

    pub(crate) fn result(&self, element: NodeId, name: &str) -> Option<Output> {
        match &self.get(element, name)?.phase {
            Phase::Active(result) => result.clone(),
            Phase::Pending => None,
        }
    }

    /// Insert a state, replacing one with the same filter name in place.
    pub(crate) fn insert(&mut self, element: NodeId, state: AppliedState) {
        let states = self.states.entry(element).or_default();
        match states
            .iter_mut()
            .find(|s| s.filter.name() == state.filter.name())
        {
            Some(slot) => *slot = state,
            None => states.push(state),
        }
    }

    pub(crate) fn take(&mut self, element: NodeId, name: &str) -> Option<AppliedState> {
        let states = self.states.get_mut(&element)?;
        let pos = states.iter().position(|s| s.filter.name() == name)?;
        let state = states.remove(pos);
        if states.is_empty() {
            self.states.remove(&element);
        }
        Some(state)
    }

    pub(crate) fn take_all(&mut self, element: NodeId) -> Vec<AppliedState> {
        self.states.remove(&element).unwrap_or_default()
    }

    pub(crate) fn names(&self, element: NodeId) -> Vec<String> {
        self.states
            .get(&element)
            .map(|states| states.iter().map(|s| s.filter.name().to_string()).collect())
            .unwrap_or_default()
    }

    pub(crate) fn elements(&self) -> Vec<NodeId> {
        let mut elements: Vec<NodeId> = self.states.keys().copied().collect();
        elements.sort_unstable();
        elements
    }
}
