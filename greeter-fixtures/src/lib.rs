//! # Greeter Fixtures
//!
//! **INTERNAL USE ONLY**: descriptor sets and reflection servers for integration testing
//! `svcscope-core`. Descriptors are assembled by hand with `prost-types` so the tests do not
//! need a protobuf compiler.
//! It is not intended for production use.
pub mod descriptors;
pub mod refusing;
pub mod scripted;

pub use descriptors::{conflicting_sets, greeter_file_descriptor_set};
pub use refusing::RefusingReflection;
pub use scripted::ScriptedReflection;
