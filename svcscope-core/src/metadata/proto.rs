use super::{ServiceMeta, ServiceMetaData, ServiceMetaError, ServiceMetaList};
use crate::config::ProtoConfig;
use crate::descriptor::FileDescriptor;
use crate::protoc::{ParseError, ProtoParser, Protoc};
use tracing::info;

/// Service metadata compiled from `.proto` files or directories.
#[derive(Debug)]
pub struct ProtoServiceMeta<P = Protoc> {
    config: ProtoConfig,
    parser: P,
}

impl ProtoServiceMeta<Protoc> {
    pub fn new(config: ProtoConfig) -> Self {
        Self {
            config,
            parser: Protoc::new(),
        }
    }
}

impl<P: ProtoParser> ProtoServiceMeta<P> {
    pub fn with_parser(config: ProtoConfig, parser: P) -> Self {
        Self { config, parser }
    }

    pub fn config(&self) -> &ProtoConfig {
        &self.config
    }
}

impl<P: ProtoParser> ServiceMetaData for ProtoServiceMeta<P> {
    async fn service_meta_list(&self) -> Result<ServiceMetaList, ServiceMetaError> {
        let files = self
            .parser
            .parse_files(&self.config.proto_paths, &self.config.proto_imports)
            .map_err(|e| match e {
                ParseError::NoProtoFiles(_) => ServiceMetaError::Parse(e),
                other => ServiceMetaError::ParseProtos(other),
            })?;

        let mut services = Vec::new();
        for file in &files {
            for service in file.services() {
                services.push(ServiceMeta::resolve(&service)?);
            }
        }

        info!(files = files.len(), services = services.len(), "resolved services from proto files");
        Ok(services.into())
    }

    fn additional_files(&self) -> Result<Vec<FileDescriptor>, ServiceMetaError> {
        super::parse_additional_files(&self.parser, &self.config.proto_imports)
    }
}
