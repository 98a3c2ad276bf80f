//! Collaborators shared by the integration tests.
#![allow(dead_code)]

use greeter_fixtures::greeter_file_descriptor_set;
use prost_reflect::DescriptorPool;
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Mutex;
use svcscope_core::connection::ConnectionFactory;
use svcscope_core::descriptor::FileDescriptor;
use svcscope_core::protoc::{ParseError, ProtoParser};

/// Hands out clones of an in-process service for every target.
pub struct InMemoryFactory<S> {
    service: S,
    targets: Mutex<Vec<String>>,
}

impl<S: Clone> InMemoryFactory<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            targets: Mutex::new(Vec::new()),
        }
    }

    pub fn requested_targets(&self) -> Vec<String> {
        self.targets.lock().unwrap().clone()
    }
}

impl<S: Clone> ConnectionFactory for InMemoryFactory<S> {
    type Connection = S;
    type Error = Infallible;

    async fn get_connection(&self, target: &str) -> Result<S, Infallible> {
        self.targets.lock().unwrap().push(target.to_string());
        Ok(self.service.clone())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("connection refused")]
pub struct Refused;

/// A factory whose every connection attempt fails.
pub struct RefusingFactory;

impl ConnectionFactory for RefusingFactory {
    type Connection = tonic::transport::Channel;
    type Error = Refused;

    async fn get_connection(&self, _target: &str) -> Result<Self::Connection, Refused> {
        Err(Refused)
    }
}

/// A parser answering from a fixed outcome and recording the paths it was given.
pub struct StaticParser {
    outcome: fn(&[PathBuf]) -> Result<Vec<FileDescriptor>, ParseError>,
    calls: Mutex<Vec<Vec<PathBuf>>>,
}

impl StaticParser {
    pub fn new(outcome: fn(&[PathBuf]) -> Result<Vec<FileDescriptor>, ParseError>) -> Self {
        Self {
            outcome,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always returns the greeter schema.
    pub fn greeter() -> Self {
        Self::new(|_| Ok(greeter_files()))
    }

    pub fn no_proto_files() -> Self {
        Self::new(|paths| Err(ParseError::NoProtoFiles(paths.to_vec())))
    }

    pub fn broken() -> Self {
        Self::new(|_| Err(ParseError::Io(std::io::Error::other("unreadable descriptor set"))))
    }

    pub fn calls(&self) -> Vec<Vec<PathBuf>> {
        self.calls.lock().unwrap().clone()
    }
}

impl ProtoParser for StaticParser {
    fn parse_files(
        &self,
        paths: &[PathBuf],
        _import_paths: &[PathBuf],
    ) -> Result<Vec<FileDescriptor>, ParseError> {
        self.calls.lock().unwrap().push(paths.to_vec());
        (self.outcome)(paths)
    }
}

/// `pkg/types.proto` and `pkg/greeter.proto`, compiled together.
pub fn greeter_files() -> Vec<FileDescriptor> {
    let pool = DescriptorPool::from_file_descriptor_set(greeter_file_descriptor_set())
        .expect("greeter fixtures are valid");
    pool.files().map(FileDescriptor::from).collect()
}
