//! # Svcscope Core
//!
//! `svcscope-core` discovers the RPC surface of a gRPC server at runtime, either by talking to the
//! server's reflection endpoint or by compiling `.proto` sources, and exposes the result through a
//! single, origin-agnostic set of descriptor types.
//!
//! ## Key Components
//!
//! * **[`metadata`]:** The entry point. [`metadata::ReflectionServiceMeta`] and
//!   [`metadata::ProtoServiceMeta`] both produce a [`metadata::ServiceMetaList`], so callers never
//!   branch on where the schema came from.
//! * **[`reflection::client::ReflectionClient`]:** Speaks `grpc.reflection.v1` or, when the server
//!   only knows the older protocol, `grpc.reflection.v1alpha`. The version is negotiated once per
//!   client and every legacy message is translated at the edge.
//! * **[`descriptor`]:** Read-only wrappers over the descriptor graph (file, service, method, message).
//! * **[`registry`]:** An injectable type registry with conservative, name-based file registration.
//! * **[`any`]:** Type-URL resolution for `google.protobuf.Any` payloads that never fails on
//!   unknown types.
//!
//! ## Collaborators
//!
//! * [`connection::ConnectionFactory`] hands out transports (a cached [`tonic::transport::Channel`]
//!   per target by default).
//! * [`protoc::ProtoParser`] turns `.proto` paths into file descriptors (shells out to `protoc` by default).
//!
//! ## Re-exports
//!
//! This crate re-exports `prost`, `prost-reflect`, and `tonic` to ensure that consumers
//! use compatible versions of these underlying dependencies.
pub mod any;
pub mod config;
pub mod connection;
pub mod descriptor;
pub mod metadata;
pub mod protoc;
pub mod reflection;
pub mod registry;

// Re-exports
pub use prost;
pub use prost_reflect;
pub use tonic;

/// Type alias for the standard boxed error used in generic bounds.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
