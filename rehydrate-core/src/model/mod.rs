//! Component Model
//!
//! Component classes, their typed attributes and the registry used to
//! resolve class names during rehydration.
//!
//! # Layout
//!
//! - [`types`]: type descriptors (`string`, `number?`, `array(Actor)`, ...)
//! - [`validator`]: named checks attached to types
//! - [`attribute`]: descriptors shared by a class, slots owned by instances
//! - [`component`]: classes and instances
//! - [`registry`]: name lookup

pub mod attribute;
pub mod component;
pub mod registry;
pub mod types;
pub mod validator;

pub use attribute::{
    Attribute, AttributeDescriptor, AttributeIntrospection, AttributeUnset, AttributeWrite,
};
pub use component::{Component, ComponentClass, ComponentClassBuilder, WeakComponent};
pub use registry::ComponentRegistry;
pub use types::{TypeIntrospection, TypeKind, ValueType};
pub use validator::{FailedValidator, Validator, ValidatorIntrospection};
