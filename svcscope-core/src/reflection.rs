//! # Server Reflection
//!
//! This module contains the logic necessary to interact with the gRPC Server Reflection Protocol.
//!
//! Two wire-incompatible versions of the protocol are deployed in the wild: `grpc.reflection.v1`
//! and its predecessor `grpc.reflection.v1alpha`. The [`client::ReflectionClient`] commits to one
//! of them when it connects; everything above it works with `v1` messages only, and
//! [`legacy`] translates at the edge when the server only speaks `v1alpha`.
//!
//! ## References
//!
//! * [gRPC Server Reflection Protocol](https://github.com/grpc/grpc/blob/master/doc/server-reflection.md)
pub mod client;
pub mod legacy;

use std::fmt;

/// The protocol version a [`client::ReflectionClient`] committed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReflectionVersion {
    V1,
    V1Alpha,
}

impl fmt::Display for ReflectionVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReflectionVersion::V1 => f.write_str("grpc.reflection.v1"),
            ReflectionVersion::V1Alpha => f.write_str("grpc.reflection.v1alpha"),
        }
    }
}
