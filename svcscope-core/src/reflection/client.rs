//! # Reflection Client
//!
//! A client for the gRPC Server Reflection Protocol that speaks either `grpc.reflection.v1` or
//! `grpc.reflection.v1alpha` over a single bidirectional stream.
//!
//! ## Negotiation
//!
//! The version is chosen once, in [`ReflectionClient::connect`], and never changes afterwards:
//!
//! * [`ReflectVersion::Auto`] opens a `v1` stream and commits to it when it opens. Otherwise it
//!   opens a `v1alpha` stream; if that fails too, the `v1` error is returned.
//! * [`ReflectVersion::V1`] and [`ReflectVersion::V1Alpha`] only try their own version.
//!
//! Some servers hold back response headers until they have read a request, so a stream only
//! counts as open once the server answered a wildcard `list_services` probe sent on it.
//!
//! ## Descriptor cache
//!
//! Files received on the stream are cached by name for the lifetime of the client, so shared
//! imports are fetched once. The first copy of a name wins. When two independently compiled
//! schemas ship different files under the same name the cache hands out the wrong one, which
//! surfaces as [`ReflectionError::Descriptor`]; dropping the client is the way to start over.
use super::{ReflectionVersion, legacy};
use crate::BoxError;
use crate::config::ReflectVersion;
use crate::descriptor::ServiceDescriptor;
use http_body::Body as HttpBody;
use prost::Message;
use prost_reflect::{DescriptorError, DescriptorPool};
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Streaming, client::GrpcService};
use tonic_reflection::pb::{v1, v1alpha};
use tracing::debug;

use v1::server_reflection_request::MessageRequest;
use v1::server_reflection_response::MessageResponse;

#[derive(Debug, thiserror::Error)]
pub enum ReflectionError {
    #[error(
        "Failed to start a stream request with the reflection server, reflection might not be supported: '{0}'"
    )]
    ServerStreamInitFailed(#[source] tonic::Status),

    #[error("The server stream returned an error status: '{0}'")]
    ServerStreamFailure(#[source] tonic::Status),

    #[error("Reflection stream closed unexpectedly")]
    StreamClosed,

    #[error("Internal error: Failed to send request to stream")]
    SendFailed,

    #[error("Server returned reflection error code {code}: {message}")]
    ServerError { code: i32, message: String },

    #[error("Unsupported request for the v1alpha protocol: {0}")]
    UnsupportedRequest(String),

    #[error("Unsupported response from the v1alpha protocol: {0}")]
    UnsupportedResponse(String),

    #[error("The server answered without a service list")]
    NoServices,

    #[error("The server answered without file descriptors for '{0}'")]
    NoDescriptor(String),

    #[error("Service '{0}' not found in the returned file descriptors")]
    ServiceNotFound(String),

    #[error("Failed to decode FileDescriptorProto: {0}")]
    DecodeError(#[from] prost::DecodeError),

    #[error("Failed to build descriptors for '{symbol}': {source}")]
    Descriptor {
        symbol: String,
        #[source]
        source: DescriptorError,
    },
}

// The host defined in the reflection requests doesn't seem to be a mandatory field
// and there is no documentation about what it is about.
// So we won't enforce it from the user.
const EMPTY_HOST: &str = "";

const LIST_ALL_SERVICES: &str = "*";

// Only one request is ever in flight.
const REQUEST_BUFFER: usize = 4;

enum Session {
    V1 {
        requests: Option<mpsc::Sender<v1::ServerReflectionRequest>>,
        responses: Streaming<v1::ServerReflectionResponse>,
    },
    V1Alpha {
        requests: Option<mpsc::Sender<v1alpha::ServerReflectionRequest>>,
        responses: Streaming<v1alpha::ServerReflectionResponse>,
    },
}

/// A reflection client bound to one open stream.
///
/// The outbound half of the stream is closed by [`ReflectionClient::reset`] or when the client
/// is dropped.
pub struct ReflectionClient {
    session: Session,
    files: HashMap<String, FileDescriptorProto>,
}

impl ReflectionClient {
    /// Opens a reflection stream over `service`, negotiating the protocol version as described
    /// in the [module documentation](self).
    pub async fn connect<S>(service: S, version: ReflectVersion) -> Result<Self, ReflectionError>
    where
        S: GrpcService<tonic::body::Body> + Clone,
        S::Error: Into<BoxError>,
        S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
        <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
    {
        let session = match version {
            ReflectVersion::V1 => open_v1(service).await?,
            ReflectVersion::V1Alpha => open_v1alpha(service).await?,
            ReflectVersion::Auto => match open_v1(service.clone()).await {
                Ok(session) => session,
                Err(err) => {
                    debug!(error = %err, "v1 reflection unavailable, trying v1alpha");
                    open_v1alpha(service).await.map_err(|alpha_err| {
                        debug!(error = %alpha_err, "v1alpha reflection unavailable");
                        err
                    })?
                }
            },
        };

        let client = Self {
            session,
            files: HashMap::new(),
        };
        debug!(version = %client.version(), "reflection stream open");

        Ok(client)
    }

    /// The protocol version this client committed to.
    pub fn version(&self) -> ReflectionVersion {
        match self.session {
            Session::V1 { .. } => ReflectionVersion::V1,
            Session::V1Alpha { .. } => ReflectionVersion::V1Alpha,
        }
    }

    /// Lists all services exposed by the server, in the order the server returns them.
    pub async fn list_services(&mut self) -> Result<Vec<String>, ReflectionError> {
        let response = self
            .exchange(MessageRequest::ListServices(LIST_ALL_SERVICES.to_string()))
            .await?;

        match response {
            Some(MessageResponse::ListServicesResponse(resp)) => {
                Ok(resp.service.into_iter().map(|s| s.name).collect())
            }
            _ => Err(ReflectionError::NoServices),
        }
    }

    /// Asks the reflection service for the file containing the requested symbol (e.g., `my.package.MyService`).
    ///
    /// Every payload of the response is decoded on its own and a single bad payload fails the
    /// call. Imports that the server left out are then requested by file name, on the same
    /// stream, until the returned set is closed under its dependencies. The files the server
    /// returned for `symbol` come first.
    pub async fn file_containing_symbol(
        &mut self,
        symbol: &str,
    ) -> Result<Vec<FileDescriptorProto>, ReflectionError> {
        let request = MessageRequest::FileContainingSymbol(symbol.to_string());
        let decoded = self.fetch_files(request, symbol).await?;

        let mut collected = Collected::default();
        for fd in decoded {
            collected.push(self.cache(fd));
        }

        self.fetch_missing_imports(&mut collected).await?;

        Ok(collected.files)
    }

    /// Resolves the service `name` (e.g., `my.package.MyService`).
    ///
    /// The first top-level service among the returned files whose short name matches the last
    /// segment of `name` wins.
    pub async fn resolve_service(
        &mut self,
        name: &str,
    ) -> Result<ServiceDescriptor, ReflectionError> {
        let files = self.file_containing_symbol(name).await?;
        let order: Vec<String> = files.iter().map(|f| f.name().to_string()).collect();

        let pool = DescriptorPool::from_file_descriptor_set(FileDescriptorSet { file: files })
            .map_err(|source| ReflectionError::Descriptor {
                symbol: name.to_string(),
                source,
            })?;

        let short_name = name.rsplit('.').next().unwrap_or(name);

        order
            .iter()
            .filter_map(|file| pool.get_file_by_name(file))
            .flat_map(|file| file.services().collect::<Vec<_>>())
            .find(|service| service.name() == short_name)
            .map(ServiceDescriptor::from)
            .ok_or_else(|| ReflectionError::ServiceNotFound(name.to_string()))
    }

    /// Closes the outbound half of the stream. Later calls fail with [`ReflectionError::StreamClosed`].
    ///
    /// Dropping the client does the same, so every exit path releases the stream.
    pub fn reset(&mut self) {
        let closed = match &mut self.session {
            Session::V1 { requests, .. } => requests.take().is_some(),
            Session::V1Alpha { requests, .. } => requests.take().is_some(),
        };

        if closed {
            debug!(version = %self.version(), "reflection stream closed");
        }
    }

    /// Sends one request and waits for its response, translating through `v1alpha` if needed.
    ///
    /// Error responses become [`ReflectionError::ServerError`].
    async fn exchange(
        &mut self,
        request: MessageRequest,
    ) -> Result<Option<MessageResponse>, ReflectionError> {
        let request = v1::ServerReflectionRequest {
            host: EMPTY_HOST.to_string(),
            message_request: Some(request),
        };

        let response = match &mut self.session {
            Session::V1 {
                requests,
                responses,
            } => {
                send(requests.as_ref(), request).await?;
                receive(responses).await?
            }
            Session::V1Alpha {
                requests,
                responses,
            } => {
                send(requests.as_ref(), legacy::to_v1alpha_request(request)?).await?;
                legacy::from_v1alpha_response(receive(responses).await?)?
            }
        };

        match response.message_response {
            Some(MessageResponse::ErrorResponse(e)) => Err(ReflectionError::ServerError {
                code: e.error_code,
                message: e.error_message,
            }),
            other => Ok(other),
        }
    }

    async fn fetch_files(
        &mut self,
        request: MessageRequest,
        subject: &str,
    ) -> Result<Vec<FileDescriptorProto>, ReflectionError> {
        match self.exchange(request).await? {
            Some(MessageResponse::FileDescriptorResponse(res)) => res
                .file_descriptor_proto
                .iter()
                .map(|raw| FileDescriptorProto::decode(raw.as_slice()))
                .collect::<Result<Vec<_>, _>>()
                .map_err(ReflectionError::from),
            _ => Err(ReflectionError::NoDescriptor(subject.to_string())),
        }
    }

    async fn fetch_missing_imports(
        &mut self,
        collected: &mut Collected,
    ) -> Result<(), ReflectionError> {
        let mut requested = HashSet::new();
        let mut next = 0;

        while next < collected.files.len() {
            let imports = collected.files[next].dependency.clone();
            next += 1;

            for import in imports {
                if collected.contains(&import) || !requested.insert(import.clone()) {
                    continue;
                }

                if let Some(cached) = self.files.get(&import) {
                    collected.push(cached.clone());
                    continue;
                }

                debug!(file = %import, "requesting missing import");
                let request = MessageRequest::FileByFilename(import.clone());
                for fd in self.fetch_files(request, &import).await? {
                    collected.push(self.cache(fd));
                }
            }
        }

        Ok(())
    }

    fn cache(&mut self, fd: FileDescriptorProto) -> FileDescriptorProto {
        match fd.name.clone() {
            Some(name) => self.files.entry(name).or_insert(fd).clone(),
            None => fd,
        }
    }
}

impl Drop for ReflectionClient {
    fn drop(&mut self) {
        self.reset();
    }
}

impl fmt::Debug for ReflectionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflectionClient")
            .field("version", &self.version())
            .field("cached_files", &self.files.len())
            .finish()
    }
}

/// Files gathered for one symbol, unique by name, in arrival order.
#[derive(Default)]
struct Collected {
    files: Vec<FileDescriptorProto>,
    names: HashSet<String>,
}

impl Collected {
    fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    fn push(&mut self, fd: FileDescriptorProto) {
        if let Some(name) = &fd.name
            && !self.names.insert(name.clone())
        {
            return;
        }
        self.files.push(fd);
    }
}

fn list_services_probe() -> v1::ServerReflectionRequest {
    v1::ServerReflectionRequest {
        host: EMPTY_HOST.to_string(),
        message_request: Some(MessageRequest::ListServices(
            LIST_ALL_SERVICES.to_string(),
        )),
    }
}

async fn open_v1<S>(service: S) -> Result<Session, ReflectionError>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    let (tx, rx) = mpsc::channel(REQUEST_BUFFER);
    send(Some(&tx), list_services_probe()).await?;

    let mut responses = v1::server_reflection_client::ServerReflectionClient::new(service)
        .server_reflection_info(ReceiverStream::new(rx))
        .await
        .map_err(ReflectionError::ServerStreamInitFailed)?
        .into_inner();

    await_probe(&mut responses).await?;

    Ok(Session::V1 {
        requests: Some(tx),
        responses,
    })
}

async fn open_v1alpha<S>(service: S) -> Result<Session, ReflectionError>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    let (tx, rx) = mpsc::channel(REQUEST_BUFFER);
    send(Some(&tx), legacy::to_v1alpha_request(list_services_probe())?).await?;

    let mut responses = v1alpha::server_reflection_client::ServerReflectionClient::new(service)
        .server_reflection_info(ReceiverStream::new(rx))
        .await
        .map_err(ReflectionError::ServerStreamInitFailed)?
        .into_inner();

    await_probe(&mut responses).await?;

    Ok(Session::V1Alpha {
        requests: Some(tx),
        responses,
    })
}

/// Any answer to the probe proves the method exists; a status means it does not.
async fn await_probe<T>(responses: &mut Streaming<T>) -> Result<(), ReflectionError> {
    responses
        .message()
        .await
        .map_err(ReflectionError::ServerStreamInitFailed)?
        .ok_or(ReflectionError::StreamClosed)?;
    Ok(())
}

async fn send<T>(requests: Option<&mpsc::Sender<T>>, request: T) -> Result<(), ReflectionError> {
    let requests = requests.ok_or(ReflectionError::StreamClosed)?;
    requests
        .send(request)
        .await
        .map_err(|_| ReflectionError::SendFailed)
}

async fn receive<T>(responses: &mut Streaming<T>) -> Result<T, ReflectionError> {
    responses
        .message()
        .await
        .map_err(ReflectionError::ServerStreamFailure)?
        .ok_or(ReflectionError::StreamClosed)
}
