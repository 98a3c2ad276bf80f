//! # Service Metadata
//!
//! Produces a [`ServiceMetaList`] describing every service of a target, from one of two origins:
//!
//! * [`ReflectionServiceMeta`] asks a running server through the reflection protocol.
//! * [`ProtoServiceMeta`] compiles `.proto` sources.
//!
//! Both implement [`ServiceMetaData`] and hand out the same descriptor types with JSON names
//! filled in (see [`json_names`]), so consumers never branch on where the schema came from.
//! Any failure aborts the whole listing: there are no partial results.
pub mod json_names;
pub mod proto;
pub mod reflection;

pub use proto::ProtoServiceMeta;
pub use reflection::ReflectionServiceMeta;

use crate::BoxError;
use crate::descriptor::{FileDescriptor, MethodDescriptor, ServiceDescriptor};
use crate::protoc::{ParseError, ProtoParser};
use crate::reflection::client::ReflectionError;
use prost_reflect::DescriptorError;
use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ServiceMetaError {
    #[error("Failed to connect to '{target}': {source}")]
    Connection {
        target: String,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Reflection(#[from] ReflectionError),

    #[error("Service metadata resolution exceeded the {0}s deadline")]
    DeadlineExceeded(u64),

    #[error(transparent)]
    Parse(ParseError),

    #[error("error parsing proto files: {0}")]
    ParseProtos(#[source] ParseError),

    #[error("error parsing additional proto files: {0}")]
    ParseAdditionalProtos(#[source] ParseError),

    #[error("Failed to rebuild descriptors of '{service}': {source}")]
    Descriptor {
        service: String,
        #[source]
        source: DescriptorError,
    },

    #[error("Service '{0}' not found")]
    ServiceNotFound(String),
}

impl ServiceMetaError {
    /// `true` when no `.proto` file matched the configured paths.
    pub fn is_no_proto_files(&self) -> bool {
        matches!(self, ServiceMetaError::Parse(ParseError::NoProtoFiles(_)))
    }
}

/// A resolved service, ready for display or invocation.
#[derive(Clone, Debug)]
pub struct ServiceMeta {
    name: String,
    methods: Vec<MethodDescriptor>,
    file: FileDescriptor,
}

impl ServiceMeta {
    /// Builds the entry for `service`, with JSON names on every message its methods reach.
    pub fn resolve(service: &ServiceDescriptor) -> Result<Self, ServiceMetaError> {
        let normalized = json_names::normalize_service(service)
            .map_err(|source| ServiceMetaError::Descriptor {
                service: service.full_name().to_string(),
                source,
            })?
            .ok_or_else(|| ServiceMetaError::ServiceNotFound(service.full_name().to_string()))?;

        Ok(Self {
            name: normalized.full_name().to_string(),
            methods: normalized.methods(),
            file: normalized.file(),
        })
    }

    /// The fully qualified service name (e.g. `pkg.Greeter`).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    /// The file declaring the service.
    pub fn file(&self) -> &FileDescriptor {
        &self.file
    }
}

/// Resolved services in origin order.
#[derive(Clone, Debug, Default)]
pub struct ServiceMetaList(Vec<ServiceMeta>);

impl ServiceMetaList {
    pub fn iter(&self) -> std::slice::Iter<'_, ServiceMeta> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ServiceMeta> {
        self.0.iter().find(|meta| meta.name == name)
    }

    /// The files declaring the services, once per path, in order of first appearance.
    pub fn files(&self) -> Vec<FileDescriptor> {
        let mut seen = HashSet::new();
        self.0
            .iter()
            .filter(|meta| seen.insert(meta.file.path().to_string()))
            .map(|meta| meta.file.clone())
            .collect()
    }
}

impl From<Vec<ServiceMeta>> for ServiceMetaList {
    fn from(value: Vec<ServiceMeta>) -> Self {
        Self(value)
    }
}

impl IntoIterator for ServiceMetaList {
    type Item = ServiceMeta;
    type IntoIter = std::vec::IntoIter<ServiceMeta>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ServiceMetaList {
    type Item = &'a ServiceMeta;
    type IntoIter = std::slice::Iter<'a, ServiceMeta>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A source of service metadata.
pub trait ServiceMetaData {
    /// Every service of the origin, fully resolved.
    fn service_meta_list(
        &self,
    ) -> impl Future<Output = Result<ServiceMetaList, ServiceMetaError>>;

    /// Files compiled from the configured import paths, to be registered next to the services'
    /// own files. Empty when no import path is configured or none holds a `.proto` file.
    fn additional_files(&self) -> Result<Vec<FileDescriptor>, ServiceMetaError>;
}

fn parse_additional_files<P: ProtoParser>(
    parser: &P,
    proto_imports: &[PathBuf],
) -> Result<Vec<FileDescriptor>, ServiceMetaError> {
    if proto_imports.is_empty() {
        return Ok(Vec::new());
    }

    match parser.parse_files(proto_imports, &[]) {
        Ok(files) => Ok(files),
        Err(ParseError::NoProtoFiles(_)) => Ok(Vec::new()),
        Err(e) => Err(ServiceMetaError::ParseAdditionalProtos(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greeter_fixtures::greeter_file_descriptor_set;
    use prost_reflect::DescriptorPool;
    use std::cell::Cell;

    fn greeter() -> ServiceDescriptor {
        let pool = DescriptorPool::from_file_descriptor_set(greeter_file_descriptor_set()).unwrap();
        pool.get_service_by_name("pkg.Greeter").unwrap().into()
    }

    struct FailingParser {
        error: fn(&[PathBuf]) -> ParseError,
        calls: Cell<usize>,
    }

    impl FailingParser {
        fn new(error: fn(&[PathBuf]) -> ParseError) -> Self {
            Self {
                error,
                calls: Cell::new(0),
            }
        }
    }

    impl ProtoParser for FailingParser {
        fn parse_files(
            &self,
            paths: &[PathBuf],
            _import_paths: &[PathBuf],
        ) -> Result<Vec<FileDescriptor>, ParseError> {
            self.calls.set(self.calls.get() + 1);
            Err((self.error)(paths))
        }
    }

    #[test]
    fn resolved_meta_carries_service_and_file() {
        let meta = ServiceMeta::resolve(&greeter()).unwrap();

        assert_eq!(meta.name(), "pkg.Greeter");
        assert_eq!(meta.file().path(), "pkg/greeter.proto");
        let names: Vec<_> = meta.methods().iter().map(|m| m.name()).collect();
        assert_eq!(
            names,
            vec!["SayHello", "LotsOfReplies", "LotsOfGreetings", "BidiHello"]
        );
    }

    #[test]
    fn files_are_distinct_by_path() {
        let meta = ServiceMeta::resolve(&greeter()).unwrap();
        let list = ServiceMetaList::from(vec![meta.clone(), meta]);

        let files = list.files();

        assert_eq!(list.len(), 2);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path(), "pkg/greeter.proto");
    }

    #[test]
    fn no_imports_means_no_parsing() {
        let parser = FailingParser::new(|p| ParseError::NoProtoFiles(p.to_vec()));

        let files = parse_additional_files(&parser, &[]).unwrap();

        assert!(files.is_empty());
        assert_eq!(parser.calls.get(), 0);
    }

    #[test]
    fn missing_proto_files_are_not_an_error_for_additional_files() {
        let parser = FailingParser::new(|p| ParseError::NoProtoFiles(p.to_vec()));

        let files = parse_additional_files(&parser, &[PathBuf::from("empty")]).unwrap();

        assert!(files.is_empty());
        assert_eq!(parser.calls.get(), 1);
    }

    #[test]
    fn other_failures_are_wrapped_for_additional_files() {
        let parser = FailingParser::new(|_| ParseError::Io(std::io::Error::other("disk on fire")));

        let err = parse_additional_files(&parser, &[PathBuf::from("imports")]).unwrap_err();

        assert!(matches!(err, ServiceMetaError::ParseAdditionalProtos(_)));
        assert_eq!(
            err.to_string(),
            "error parsing additional proto files: Failed to read the compiled descriptor set: disk on fire"
        );
    }
}
