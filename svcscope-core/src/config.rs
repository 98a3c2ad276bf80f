//! # Configuration
//!
//! Serializable settings for the two metadata strategies. The binary builds these from command
//! line flags or loads them from a JSON file.
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default bound, in seconds, for a whole reflection-based resolution.
pub const DEFAULT_DEADLINE_SECS: u64 = 15;

/// Which reflection protocol version(s) a client may speak.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReflectVersion {
    /// Try `grpc.reflection.v1` and fall back to `v1alpha` if the server lacks it.
    #[default]
    Auto,
    /// Only `grpc.reflection.v1`.
    V1,
    /// Only `grpc.reflection.v1alpha`.
    V1Alpha,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ReflectionConfig {
    /// Server address (e.g. `http://localhost:50051`).
    pub target: String,
    #[serde(default = "default_deadline")]
    pub deadline_secs: u64,
    /// Directories with extra `.proto` files to merge next to the reflected ones.
    #[serde(default)]
    pub proto_imports: Vec<PathBuf>,
    #[serde(default)]
    pub reflect_version: ReflectVersion,
}

impl ReflectionConfig {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            deadline_secs: DEFAULT_DEADLINE_SECS,
            proto_imports: Vec::new(),
            reflect_version: ReflectVersion::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct ProtoConfig {
    /// `.proto` files or directories containing them.
    pub proto_paths: Vec<PathBuf>,
    /// Additional directories searched for imports.
    #[serde(default)]
    pub proto_imports: Vec<PathBuf>,
}

/// Where service metadata is read from.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", content = "value")]
pub enum SourceConfig {
    Reflection(ReflectionConfig),
    Proto(ProtoConfig),
}

fn default_deadline() -> u64 {
    DEFAULT_DEADLINE_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflection_source_fills_defaults() {
        let raw = r#"{ "type": "Reflection", "value": { "target": "http://localhost:50051" } }"#;
        let config: SourceConfig = serde_json::from_str(raw).unwrap();

        assert_eq!(
            config,
            SourceConfig::Reflection(ReflectionConfig::new("http://localhost:50051"))
        );
    }

    #[test]
    fn reflect_version_uses_lowercase_names() {
        let raw = r#"{ "target": "t", "reflect_version": "v1alpha", "deadline_secs": 3 }"#;
        let config: ReflectionConfig = serde_json::from_str(raw).unwrap();

        assert_eq!(config.reflect_version, ReflectVersion::V1Alpha);
        assert_eq!(config.deadline_secs, 3);
    }
}
