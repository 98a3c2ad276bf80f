//! # Proto Parsing
//!
//! Turns `.proto` sources into file descriptors by running the protobuf compiler.
//!
//! The resolver depends on the [`ProtoParser`] trait only. [`Protoc`] is the stock
//! implementation:
//!
//! 1. **Discovery**: `.proto` paths are taken as they are and their directory becomes an import
//!    root; extension-less paths are walked recursively for `.proto` files; anything else is ignored.
//! 2. **Compilation**: `protoc -I <roots> --include_imports --descriptor_set_out=<tmp> <files>`.
//!    The binary comes from the `PROTOC` environment variable, or `protoc` on the `PATH`.
//! 3. **Loading**: the descriptor set is decoded into a pool and every file is handed back,
//!    imports included.
use crate::descriptor::FileDescriptor;
use prost_reflect::{DescriptorError, DescriptorPool};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use tracing::debug;
use walkdir::WalkDir;

const PROTO_EXTENSION: &str = "proto";

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("no proto files found: {0:?}")]
    NoProtoFiles(Vec<PathBuf>),

    #[error("Failed to walk '{path}': {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("protoc exited with {status}: {stderr}")]
    Compiler { status: ExitStatus, stderr: String },

    #[error("Failed to read the compiled descriptor set: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to load the compiled descriptor set: {0}")]
    Descriptor(#[from] DescriptorError),
}

/// Produces file descriptors from `.proto` files or directories.
pub trait ProtoParser {
    /// Fails with [`ParseError::NoProtoFiles`] when `paths` contain no `.proto` file.
    fn parse_files(
        &self,
        paths: &[PathBuf],
        import_paths: &[PathBuf],
    ) -> Result<Vec<FileDescriptor>, ParseError>;
}

impl<T: ProtoParser + ?Sized> ProtoParser for &T {
    fn parse_files(
        &self,
        paths: &[PathBuf],
        import_paths: &[PathBuf],
    ) -> Result<Vec<FileDescriptor>, ParseError> {
        (**self).parse_files(paths, import_paths)
    }
}

/// [`ProtoParser`] backed by the `protoc` binary.
#[derive(Clone, Debug)]
pub struct Protoc {
    program: OsString,
}

impl Protoc {
    /// Uses `$PROTOC` if set, `protoc` otherwise.
    pub fn new() -> Self {
        let program = std::env::var_os("PROTOC").unwrap_or_else(|| OsString::from("protoc"));
        Self { program }
    }

    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn compile(&self, files: &[PathBuf], import_paths: &[PathBuf]) -> Result<Vec<u8>, ParseError> {
        let output_file = tempfile::NamedTempFile::new()?;

        let mut command = Command::new(&self.program);
        for import in import_paths {
            command.arg("-I").arg(import);
        }
        let mut descriptor_set_out = OsString::from("--descriptor_set_out=");
        descriptor_set_out.push(output_file.path());
        command
            .arg("--include_imports")
            .arg(descriptor_set_out)
            .args(files);

        debug!(?command, "running protoc");
        let output = command.output().map_err(|source| ParseError::Spawn {
            program: self.program.to_string_lossy().into_owned(),
            source,
        })?;

        if !output.status.success() {
            return Err(ParseError::Compiler {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(std::fs::read(output_file.path())?)
    }
}

impl Default for Protoc {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtoParser for Protoc {
    fn parse_files(
        &self,
        paths: &[PathBuf],
        import_paths: &[PathBuf],
    ) -> Result<Vec<FileDescriptor>, ParseError> {
        let files = find_proto_files(paths)?;
        if files.is_empty() {
            return Err(ParseError::NoProtoFiles(paths.to_vec()));
        }

        let mut roots = import_roots(paths);
        roots.extend(import_paths.iter().cloned());

        let bytes = self.compile(&files, &roots)?;
        let pool = DescriptorPool::decode(bytes.as_slice())?;

        Ok(pool.files().map(FileDescriptor::from).collect())
    }
}

/// Lists the `.proto` files named by `paths`.
///
/// Explicit files are reduced to their file name, since their directory is passed to the
/// compiler as an import root.
pub fn find_proto_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>, ParseError> {
    let mut files = Vec::new();

    for path in paths {
        match path.extension() {
            Some(ext) if ext == PROTO_EXTENSION => {
                if let Some(name) = path.file_name() {
                    files.push(PathBuf::from(name));
                }
            }
            Some(_) => continue,
            None => {
                for entry in WalkDir::new(path).sort_by_file_name() {
                    let entry = entry.map_err(|source| ParseError::Walk {
                        path: path.clone(),
                        source,
                    })?;

                    if entry.file_type().is_file() && is_proto(entry.path()) {
                        files.push(entry.into_path());
                    }
                }
            }
        }
    }

    Ok(files)
}

/// Directories of the explicit files, and the directories themselves.
fn import_roots(paths: &[PathBuf]) -> Vec<PathBuf> {
    paths
        .iter()
        .map(|path| match path.extension() {
            // A bare file name has an empty parent, which protoc rejects as an import root.
            Some(_) => path
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
            None => path.clone(),
        })
        .collect()
}

fn is_proto(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == PROTO_EXTENSION)
}
