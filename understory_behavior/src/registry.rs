// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Name-keyed registries with overwrite guards.

use std::rc::Rc;

use hashbrown::HashMap;

use crate::error::{Error, Result};

/// Registered items keyed by name.
///
/// Registration is write-once per name unless `overwrite` is requested. Items
/// are stored behind [`Rc`] so a lookup stays valid while the registry
/// changes underneath a running handler.
pub struct Registry<T> {
    kind: &'static str,
    entries: HashMap<String, Rc<T>>,
}

impl<T> core::fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("names", &names)
            .finish_non_exhaustive()
    }
}

impl<T> Registry<T> {
    /// An empty registry; `kind` names its items in errors.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
        }
    }

    /// Register `item` under `name`.
    ///
    /// Fails with [`Error::DuplicateRegistration`] if the name is taken and
    /// `overwrite` is false; the existing item stays registered.
    pub fn register(&mut self, name: &str, item: T, overwrite: bool) -> Result<()> {
        if !overwrite && self.entries.contains_key(name) {
            return Err(Error::DuplicateRegistration {
                kind: self.kind,
                name: name.to_string(),
            });
        }
        self.entries.insert(name.to_string(), Rc::new(item));
        Ok(())
    }

    /// Register every `(name, item)` pair in order.
    ///
    /// Stops at the first failure; pairs registered before it stay registered.
    pub fn register_many(&mut self, items: impl IntoIterator<Item = (String, T)>, overwrite: bool) -> Result<()> {
        for (name, item) in items {
            self.register(&name, item, overwrite)?;
        }
        Ok(())
    }

    /// Look up a name.
    pub fn get(&self, name: &str) -> Option<Rc<T>> {
        self.entries.get(name).cloned()
    }

    /// Returns true if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Remove a name, returning its item.
    pub fn remove(&mut self, name: &str) -> Option<Rc<T>> {
        self.entries.remove(name)
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over registered items (unordered).
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Rc<T>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Look `name` up in `local` first, then in `global`.
pub fn resolve<T>(local: &Registry<T>, global: &Registry<T>, name: &str) -> Option<Rc<T>> {
    local.get(name).or_else(|| global.get(name))
}
