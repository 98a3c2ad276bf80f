//! # Type Registry
//!
//! A shared index of file descriptors, used to resolve message types by name after discovery
//! (for example the type URL inside a `google.protobuf.Any`).
//!
//! The same logical `.proto` content regularly shows up more than once: reflection against two
//! servers, or reflection plus local files. Registering an alternate compilation of an already
//! known type fails with a duplicate-name error, so [`register_files`] is conservative and decides
//! by name rather than by path:
//!
//! 1. A file whose path is already registered is skipped.
//! 2. A file declaring at least one top-level message that is already known is skipped.
//! 3. Anything else is registered, after its imports went through the same rules.
//!
//! Failures are collected per file and returned together, so one bad file never blocks the rest.
//!
//! The pool only accepts a file once all of its imports are in it. When an import is skipped by
//! rule 2, a file importing it can therefore not be registered either, and fails with a missing
//! import error even though the types it needs are known under another path.
//!
//! Registration may run from several threads at once. A file raced in by another thread between
//! the checks and the write is treated as already registered.
use crate::descriptor::FileDescriptor;
use prost_reflect::{DescriptorError, DescriptorPool};
use prost_types::FileDescriptorProto;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock, RwLock};
use tracing::{debug, warn};

static GLOBAL: LazyLock<TypeRegistry> = LazyLock::new(TypeRegistry::new);

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("The type registry lock was poisoned by a panicking writer")]
    Poisoned,
    #[error("Failed to register '{path}': {source}")]
    Register {
        path: String,
        #[source]
        source: DescriptorError,
    },
}

/// Every failure of a [`register_files`] batch, one per line when displayed.
#[derive(Debug, thiserror::Error)]
#[error("{}", join_lines(.errors))]
pub struct RegisterFilesError {
    pub errors: Vec<RegistryError>,
}

/// The operations [`register_files`] needs from a registry.
pub trait DescriptorRegistry {
    fn contains_file(&self, path: &str) -> Result<bool, RegistryError>;

    fn contains_message(&self, full_name: &str) -> Result<bool, RegistryError>;

    fn register_file(&self, file: FileDescriptorProto) -> Result<(), RegistryError>;
}

/// A cloneable handle to a [`DescriptorPool`] guarded for concurrent registration.
///
/// Use [`TypeRegistry::new`] for an isolated registry or [`TypeRegistry::global`] for the
/// process-wide one.
#[derive(Clone, Debug)]
pub struct TypeRegistry {
    pool: Arc<RwLock<DescriptorPool>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            pool: Arc::new(RwLock::new(DescriptorPool::new())),
        }
    }

    /// The registry shared by the whole process.
    pub fn global() -> Self {
        GLOBAL.clone()
    }

    /// A snapshot of the registered descriptors.
    pub fn pool(&self) -> Result<DescriptorPool, RegistryError> {
        let pool = self.pool.read().map_err(|_| RegistryError::Poisoned)?;
        Ok(pool.clone())
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DescriptorRegistry for TypeRegistry {
    fn contains_file(&self, path: &str) -> Result<bool, RegistryError> {
        let pool = self.pool.read().map_err(|_| RegistryError::Poisoned)?;
        Ok(pool.get_file_by_name(path).is_some())
    }

    fn contains_message(&self, full_name: &str) -> Result<bool, RegistryError> {
        let pool = self.pool.read().map_err(|_| RegistryError::Poisoned)?;
        Ok(pool.get_message_by_name(full_name).is_some())
    }

    fn register_file(&self, file: FileDescriptorProto) -> Result<(), RegistryError> {
        let path = file.name().to_string();
        let mut pool = self.pool.write().map_err(|_| RegistryError::Poisoned)?;
        if pool.get_file_by_name(&path).is_some() {
            return Ok(());
        }

        pool.add_file_descriptor_proto(file)
            .map_err(|source| RegistryError::Register { path, source })
    }
}

/// Registers `files` (and their imports) into `registry`.
///
/// See the [module documentation](self) for the rules deciding which files are registered.
pub fn register_files<R>(registry: &R, files: &[FileDescriptor]) -> Result<(), RegisterFilesError>
where
    R: DescriptorRegistry + ?Sized,
{
    let mut visited = HashSet::new();
    let mut errors = Vec::new();

    for file in files {
        register_with_imports(registry, file, &mut visited, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(RegisterFilesError { errors })
    }
}

fn register_with_imports<R>(
    registry: &R,
    file: &FileDescriptor,
    visited: &mut HashSet<String>,
    errors: &mut Vec<RegistryError>,
) where
    R: DescriptorRegistry + ?Sized,
{
    if !visited.insert(file.path().to_string()) {
        return;
    }

    // The pool rejects files whose imports it does not know yet.
    for dependency in file.dependencies() {
        register_with_imports(registry, &dependency, visited, errors);
    }

    if let Err(err) = register_file(registry, file) {
        errors.push(err);
    }
}

fn register_file<R>(registry: &R, file: &FileDescriptor) -> Result<(), RegistryError>
where
    R: DescriptorRegistry + ?Sized,
{
    if registry.contains_file(file.path())? {
        debug!(path = file.path(), "file already registered");
        return Ok(());
    }

    for message in file.message_types() {
        if registry.contains_message(message.full_name())? {
            warn!(
                path = file.path(),
                message = message.full_name(),
                "skipping file, one of its types is already registered from another file"
            );
            return Ok(());
        }
    }

    registry.register_file(file.file_descriptor_proto().clone())
}

fn join_lines(errors: &[RegistryError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
