//! Rehydrate Core
//!
//! This crate rebuilds live, observable component graphs from serialized
//! value trees. It implements:
//!
//! - Observable maps and lists with nested change propagation
//! - Typed component attributes with validation
//! - A deserialization pipeline driven by tagged envelopes
//! - An opt-in compiler for serialized function expressions
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `observe`: observers, the observation capability and observable values
//! - `model`: component classes, typed attributes and the registry
//! - `function`: compilation of function source into callables
//! - `codec`: envelope recognition, deserialization and serialization
//! - `value`: the materialized value model shared by all of the above
//!
//! # Example
//!
//! ```rust,ignore
//! use rehydrate_core::{
//!     deserialize, AttributeDescriptor, ComponentClass, DeserializeOptions, Observe, Observer,
//!     ValueType,
//! };
//! use serde_json::json;
//!
//! let movie = ComponentClass::builder("Movie")
//!     .attribute(AttributeDescriptor::new("title", ValueType::string()))
//!     .build();
//!
//! let options = DeserializeOptions::new().known_component(movie);
//! let value = deserialize(json!({"__component": "Movie", "title": "Inception"}), options)
//!     .await?;
//!
//! let movie = value.as_component().unwrap();
//! movie.observe(Observer::new(|| println!("movie changed")))?;
//! movie.set("title", "Interstellar")?;
//! // prints: "movie changed"
//! ```

pub mod codec;
pub mod error;
pub mod function;
pub mod model;
pub mod observe;
pub mod value;

pub use codec::{deserialize, serialize, Deferred, DeserializeOptions, Deserializer};
pub use error::{Error, Result};
pub use function::{compile, Function};
pub use model::{
    Attribute, AttributeDescriptor, Component, ComponentClass, ComponentRegistry, Validator,
    ValueType,
};
pub use observe::{Observable, Observe, Observer};
pub use value::Value;
