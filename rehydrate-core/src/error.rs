//! Error types shared by every layer of the crate.

use thiserror::Error;

use crate::model::FailedValidator;

/// Errors raised while observing, assigning, compiling or rehydrating values.
#[derive(Debug, Error)]
pub enum Error {
    /// A component name did not resolve against the known components.
    #[error("the component '{0}' is unknown (it must be listed in the known components)")]
    UnknownComponent(String),

    /// A component was asked for an attribute it does not declare.
    #[error("the attribute '{attribute}' is missing in the component '{component}'")]
    UnknownAttribute { component: String, attribute: String },

    /// A value was rejected by an attribute's type.
    #[error("cannot assign a value of type '{actual}' to the attribute '{attribute}' (path: '{path}', expected type: '{expected}')")]
    TypeMismatch {
        attribute: String,
        path: String,
        expected: String,
        actual: String,
    },

    /// One or more validators failed for an attribute value.
    #[error("the following error(s) occurred while validating the attribute '{attribute}': {details}")]
    Validation {
        attribute: String,
        details: String,
        failures: Vec<FailedValidator>,
    },

    /// Validators were run against an attribute that holds no value.
    #[error("cannot run the validators of an unset attribute ('{0}')")]
    UnsetAttribute(String),

    /// An attribute with a getter override was written without a setter.
    #[error("cannot set the value of the attribute '{0}' (it has a getter but no setter)")]
    MissingSetter(String),

    /// An attribute accessor ran after its component was dropped.
    #[error("the attribute '{0}' is no longer attached to a component")]
    DetachedAttribute(String),

    /// Only plain objects and arrays can become observable.
    #[error("an observable target must be an object or an array (got {0})")]
    InvalidObservableTarget(String),

    /// `observe`, `unobserve` and `notify` are owned by the observable wrapper.
    #[error("the property '{0}' is reserved by observable values ('observe', 'unobserve' and 'notify' cannot be owned, set or deleted)")]
    ReservedNameConflict(String),

    /// A key of the wrong shape was used against an observable target.
    #[error("the key '{key}' cannot address an observable {target}")]
    InvalidKey { key: String, target: &'static str },

    /// An observer cannot be called (its forwarding target is gone).
    #[error("an observer must be callable")]
    InvalidObserver,

    /// Raised by observer callbacks to abort a notification round.
    #[error("observer failed: {0}")]
    ObserverFailed(String),

    /// Function source did not parse as a function expression.
    #[error("cannot compile function: {0}")]
    Compilation(String),

    /// A compiled function failed while running.
    #[error("function evaluation failed: {0}")]
    Evaluation(String),

    /// A type string could not be parsed.
    #[error("'{0}' is not a valid type")]
    InvalidType(String),

    /// A marker key carried a value of the wrong shape.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid MessagePack input: {0}")]
    MessagePack(#[from] rmp_serde::decode::Error),
}

impl Error {
    /// Build an [`Error::ObserverFailed`] from any message.
    pub fn observer(message: impl Into<String>) -> Self {
        Self::ObserverFailed(message.into())
    }

    /// Failed validators carried by a validation error.
    pub fn failed_validators(&self) -> &[FailedValidator] {
        match self {
            Self::Validation { failures, .. } => failures,
            _ => &[],
        }
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
