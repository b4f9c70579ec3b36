// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use understory_dom::DomError;

/// Convenient result type for behavior and trigger code.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors raised while reading configuration, registering or running behaviors.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
    /// An `-options` attribute is malformed or failed the safety scan.
    #[error("Could not get options from element; check your syntax. {attribute}: \"{value}\" ({message})")]
    Parse {
        /// The attribute that was read, for example `data-foo-options`.
        attribute: String,
        /// Its raw value.
        value: String,
        /// What went wrong.
        message: String,
    },

    /// A required option has no value.
    #[error("Could not retrieve {key} option from element.")]
    MissingOption {
        /// The prefixed key, for example `foo-width`.
        key: String,
    },

    /// An option is present but cannot be read as the requested type.
    #[error("Could not retrieve value '{key}' as {expected}. Its value is: {value}")]
    TypeMismatch {
        /// The prefixed key.
        key: String,
        /// The requested type.
        expected: String,
        /// The raw value that was found.
        value: String,
    },

    /// A name is already registered and overwriting was not requested.
    #[error("Could not add the {kind} \"{name}\" as a previous {kind} by that same name exists.")]
    DuplicateRegistration {
        /// What was being registered (`filter`, `plugin`, `trigger`, `method`).
        kind: &'static str,
        /// The conflicting name.
        name: String,
    },

    /// A filter's result did not satisfy its declared result type.
    #[error("Filter {name} did not return a valid instance of {expected}.")]
    InvalidResult {
        /// The filter name.
        name: String,
        /// The expected type name.
        expected: &'static str,
    },

    /// A conditional's target selector matched nothing.
    #[error("could not find targets for selector `{selector}`")]
    Resolution {
        /// The selector that matched nothing.
        selector: String,
    },

    /// A handler failed.
    #[error("{0}")]
    Handler(String),

    /// A name could not be resolved.
    #[error("There is no {kind} registered with this name: {name}")]
    NotFound {
        /// What was looked up.
        kind: &'static str,
        /// The unknown name.
        name: String,
    },

    /// A document query or element method failed.
    #[error(transparent)]
    Dom(#[from] DomError),
}

impl Error {
    /// Shorthand for [`Error::Handler`].
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }
}
