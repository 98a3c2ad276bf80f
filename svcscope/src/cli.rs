//! # CLI
//!
//! This module defines the command-line interface of `svcscope` using `clap`.
//!
//! It is also responsible for turning the flags (or a `--config` file) into the [`SourceConfig`]
//! the metadata resolver is built from.
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use svcscope_core::config::{
    DEFAULT_DEADLINE_SECS, ProtoConfig, ReflectVersion, ReflectionConfig, SourceConfig,
};

#[derive(Parser, Debug)]
#[command(
    name = "svcscope",
    version,
    about = "List and describe the services of a gRPC server"
)]
pub struct Cli {
    /// The server URL to reflect on (e.g. http://localhost:50051)
    #[arg(short, long, global = true)]
    pub target: Option<String>,

    /// Read the source from a JSON file instead of the flags
    #[arg(long, global = true, conflicts_with_all = ["target", "proto_paths"])]
    pub config: Option<PathBuf>,

    /// A .proto file or a directory of them. Replaces reflection when given
    #[arg(long = "proto", global = true)]
    pub proto_paths: Vec<PathBuf>,

    /// A directory searched for imports, whose files are also registered next to the services
    #[arg(long = "import", global = true)]
    pub proto_imports: Vec<PathBuf>,

    /// Seconds allowed for the whole reflection exchange
    #[arg(long, global = true, default_value_t = DEFAULT_DEADLINE_SECS)]
    pub deadline: u64,

    /// Reflection protocol version: auto, v1 or v1alpha
    #[arg(long, global = true, default_value = "auto", value_parser = parse_reflect_version)]
    pub reflect_version: ReflectVersion,

    /// Log negotiation and resolution details to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List all services
    List,

    /// Describe a service: its methods and the messages they exchange
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// svcscope --target http://localhost:50051 describe my.package.Service
    /// ```
    Describe {
        /// Fully qualified service name (e.g. my.package.Service)
        service: String,
    },

    /// List the files registered from the services and the import paths
    Files,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Either --target, --proto or --config is required")]
    Missing,
    #[error("Failed to read '{0}': {1}")]
    Read(PathBuf, #[source] std::io::Error),
    #[error("Invalid config file '{0}': {1}")]
    Invalid(PathBuf, #[source] serde_json::Error),
}

impl Cli {
    /// `--config` wins, then `--proto`, then `--target`.
    pub fn source(&self) -> Result<SourceConfig, SourceError> {
        if let Some(path) = &self.config {
            let raw =
                std::fs::read_to_string(path).map_err(|e| SourceError::Read(path.clone(), e))?;
            return serde_json::from_str(&raw).map_err(|e| SourceError::Invalid(path.clone(), e));
        }

        if !self.proto_paths.is_empty() {
            return Ok(SourceConfig::Proto(ProtoConfig {
                proto_paths: self.proto_paths.clone(),
                proto_imports: self.proto_imports.clone(),
            }));
        }

        let target = self.target.clone().ok_or(SourceError::Missing)?;

        Ok(SourceConfig::Reflection(ReflectionConfig {
            target,
            deadline_secs: self.deadline,
            proto_imports: self.proto_imports.clone(),
            reflect_version: self.reflect_version,
        }))
    }
}

fn parse_reflect_version(value: &str) -> Result<ReflectVersion, String> {
    match value.to_ascii_lowercase().as_str() {
        "auto" => Ok(ReflectVersion::Auto),
        "v1" => Ok(ReflectVersion::V1),
        "v1alpha" => Ok(ReflectVersion::V1Alpha),
        other => Err(format!(
            "Unknown reflection version '{other}', expected auto, v1 or v1alpha"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("svcscope").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn target_builds_a_reflection_source() {
        let cli = parse(&[
            "--target",
            "http://localhost:50051",
            "--deadline",
            "3",
            "--reflect-version",
            "v1alpha",
            "list",
        ]);

        assert_eq!(
            cli.source().unwrap(),
            SourceConfig::Reflection(ReflectionConfig {
                target: "http://localhost:50051".to_string(),
                deadline_secs: 3,
                proto_imports: vec![],
                reflect_version: ReflectVersion::V1Alpha,
            })
        );
    }

    #[test]
    fn proto_paths_take_precedence_over_target() {
        let cli = parse(&[
            "describe",
            "pkg.Greeter",
            "--proto",
            "protos/greeter.proto",
            "--import",
            "vendor",
            "-t",
            "http://localhost:50051",
        ]);

        assert!(matches!(cli.command, Commands::Describe { ref service } if service == "pkg.Greeter"));
        assert_eq!(
            cli.source().unwrap(),
            SourceConfig::Proto(ProtoConfig {
                proto_paths: vec![PathBuf::from("protos/greeter.proto")],
                proto_imports: vec![PathBuf::from("vendor")],
            })
        );
    }

    #[test]
    fn config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source.json");
        std::fs::write(
            &path,
            r#"{ "type": "Proto", "value": { "proto_paths": ["protos"] } }"#,
        )
        .unwrap();

        let cli = parse(&["--config", path.to_str().unwrap(), "files"]);

        assert_eq!(
            cli.source().unwrap(),
            SourceConfig::Proto(ProtoConfig {
                proto_paths: vec![PathBuf::from("protos")],
                proto_imports: vec![],
            })
        );
    }

    #[test]
    fn a_source_is_required() {
        assert!(matches!(parse(&["list"]).source(), Err(SourceError::Missing)));
    }

    #[test]
    fn rejects_unknown_reflection_versions() {
        let result = Cli::try_parse_from(["svcscope", "--reflect-version", "v2", "list"]);
        assert!(result.is_err());
    }
}
