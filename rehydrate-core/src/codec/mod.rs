//! Serialized Trees
//!
//! The wire side of the crate: recognizing envelopes, rehydrating them into
//! live values, and encoding values back.
//!
//! # Envelopes
//!
//! A serialized object is plain data unless it carries a marker key:
//!
//! | Key | Meaning |
//! |---|---|
//! | `__Component` | the named component class |
//! | `__component` | an instance of the named class; other keys are attributes |
//! | `__new` | `true` to construct the instance with defaults |
//! | `__function` | function source; other keys are properties |
//! | `__context` | names visible to the function body |
//! | `__undefined` | `undefined` |
//! | `__date` | an RFC 3339 date |

pub mod deferred;
pub mod deserialize;
pub mod envelope;
pub mod options;
pub mod serialize;

pub use deferred::Deferred;
pub use deserialize::{deserialize, Deserializer};
pub use envelope::Envelope;
pub use options::{AttributeFilter, DeserializeOptions, ObjectHandler};
pub use serialize::serialize;
