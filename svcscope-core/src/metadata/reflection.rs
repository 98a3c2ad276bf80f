use super::{ServiceMeta, ServiceMetaData, ServiceMetaError, ServiceMetaList};
use crate::BoxError;
use crate::config::ReflectionConfig;
use crate::connection::ConnectionFactory;
use crate::descriptor::FileDescriptor;
use crate::protoc::{ProtoParser, Protoc};
use crate::reflection::client::ReflectionClient;
use http_body::Body as HttpBody;
use std::time::Duration;
use tonic::client::GrpcService;
use tracing::{debug, info, warn};

/// Service metadata read from a server's reflection endpoint.
///
/// Services are resolved one after the other on a single reflection stream. A service that fails
/// to resolve gets exactly one more attempt on a fresh client, whose empty descriptor cache cannot
/// hold a stale file left behind by an earlier service. Every symbol has its own retry. The whole
/// resolution is bounded by the configured deadline.
#[derive(Debug)]
pub struct ReflectionServiceMeta<F, P = Protoc> {
    factory: F,
    config: ReflectionConfig,
    parser: P,
}

impl<F> ReflectionServiceMeta<F, Protoc> {
    pub fn new(factory: F, config: ReflectionConfig) -> Self {
        Self {
            factory,
            config,
            parser: Protoc::new(),
        }
    }
}

impl<F, P> ReflectionServiceMeta<F, P> {
    /// Replaces the parser used for [`ServiceMetaData::additional_files`].
    pub fn with_parser<Q: ProtoParser>(self, parser: Q) -> ReflectionServiceMeta<F, Q> {
        ReflectionServiceMeta {
            factory: self.factory,
            config: self.config,
            parser,
        }
    }

    pub fn config(&self) -> &ReflectionConfig {
        &self.config
    }

    async fn resolve_all<S>(&self, connection: S) -> Result<ServiceMetaList, ServiceMetaError>
    where
        S: GrpcService<tonic::body::Body> + Clone,
        S::Error: Into<BoxError>,
        S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
        <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
    {
        let version = self.config.reflect_version;
        let mut client = ReflectionClient::connect(connection.clone(), version).await?;

        let names = client.list_services().await?;
        debug!(services = names.len(), "listed services");

        let mut services = Vec::with_capacity(names.len());
        for name in &names {
            let service = match client.resolve_service(name).await {
                Ok(service) => service,
                Err(err) => {
                    warn!(service = %name, error = %err, "retrying with a fresh reflection client");
                    client.reset();
                    client = ReflectionClient::connect(connection.clone(), version).await?;
                    client.resolve_service(name).await?
                }
            };

            services.push(ServiceMeta::resolve(&service)?);
        }

        client.reset();

        Ok(services.into())
    }
}

impl<F, P> ServiceMetaData for ReflectionServiceMeta<F, P>
where
    F: ConnectionFactory,
    F::Connection: GrpcService<tonic::body::Body> + Clone,
    <F::Connection as GrpcService<tonic::body::Body>>::Error: Into<BoxError>,
    <F::Connection as GrpcService<tonic::body::Body>>::ResponseBody:
        HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <<F::Connection as GrpcService<tonic::body::Body>>::ResponseBody as HttpBody>::Error:
        Into<BoxError> + Send,
    P: ProtoParser,
{
    async fn service_meta_list(&self) -> Result<ServiceMetaList, ServiceMetaError> {
        let target = &self.config.target;
        let connection = self
            .factory
            .get_connection(target)
            .await
            .map_err(|e| ServiceMetaError::Connection {
                target: target.clone(),
                source: Box::new(e),
            })?;

        // Expiry drops the pending resolution, and with it the reflection client and its stream.
        let deadline = Duration::from_secs(self.config.deadline_secs);
        let services = tokio::time::timeout(deadline, self.resolve_all(connection))
            .await
            .map_err(|_| ServiceMetaError::DeadlineExceeded(self.config.deadline_secs))??;

        info!(endpoint = %target, services = services.len(), "resolved services through reflection");
        Ok(services)
    }

    fn additional_files(&self) -> Result<Vec<FileDescriptor>, ServiceMetaError> {
        super::parse_additional_files(&self.parser, &self.config.proto_imports)
    }
}
