// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Notification channel for errors, warnings, and lifecycle events.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use understory_dom::NodeId;

use crate::error::Error;

/// Handle returned by [`Notifier::subscribe`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A list of callbacks receiving notices of type `N`.
///
/// Callbacks may subscribe or unsubscribe while a notice is being delivered;
/// the change takes effect for the next notice.
pub struct Notifier<N> {
    next: Cell<u64>,
    subscribers: RefCell<Vec<(SubscriptionId, Rc<dyn Fn(&N)>)>>,
}

impl<N> core::fmt::Debug for Notifier<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Notifier")
            .field("subscribers", &self.subscribers.borrow().len())
            .finish_non_exhaustive()
    }
}

impl<N> Default for Notifier<N> {
    fn default() -> Self {
        Self {
            next: Cell::new(0),
            subscribers: RefCell::new(Vec::new()),
        }
    }
}

impl<N> Notifier<N> {
    /// A notifier without subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a callback.
    pub fn subscribe(&self, callback: impl Fn(&N) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next.get());
        self.next.set(self.next.get() + 1);
        self.subscribers.borrow_mut().push((id, Rc::new(callback)));
        id
    }

    /// Remove a callback. Returns true if it was subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Deliver `notice` to every callback in subscription order.
    pub fn emit(&self, notice: &N) {
        let callbacks: Vec<Rc<dyn Fn(&N)>> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in callbacks {
            callback(notice);
        }
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// Returns true if nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Notices emitted by a [`Behavior`](crate::Behavior).
#[derive(Clone, Debug, PartialEq)]
pub enum Notice {
    /// A filter failed and the failure was caught.
    Error {
        /// The filter, when known.
        name: Option<String>,
        /// The element, when known.
        element: Option<NodeId>,
        /// What went wrong.
        error: Error,
    },
    /// Something a developer should look at.
    Warn {
        /// The element, when known.
        element: Option<NodeId>,
        /// The message.
        message: String,
    },
    /// Verbose-mode progress.
    Log {
        /// The element, when known.
        element: Option<NodeId>,
        /// The message.
        message: String,
    },
    /// New content was added and had filters applied.
    AmendDom(NodeId),
    /// Content was cleaned up and removed.
    DestroyDom(NodeId),
}
