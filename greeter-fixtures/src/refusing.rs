//! Reflection servers that refuse to open a stream.
//!
//! The same [`RefusingReflection`] can be served under both protocol versions, each with its own
//! status, to tell apart which attempt an error came from.
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Code, Request, Response, Status, Streaming};
use tonic_reflection::pb::{v1, v1alpha};

#[derive(Clone, Debug)]
pub struct RefusingReflection {
    code: Code,
    message: String,
}

impl RefusingReflection {
    pub fn new(code: Code, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
        }
    }

    pub fn into_v1_server(self) -> v1::server_reflection_server::ServerReflectionServer<Self> {
        v1::server_reflection_server::ServerReflectionServer::new(self)
    }

    pub fn into_v1alpha_server(
        self,
    ) -> v1alpha::server_reflection_server::ServerReflectionServer<Self> {
        v1alpha::server_reflection_server::ServerReflectionServer::new(self)
    }

    fn status(&self) -> Status {
        Status::new(self.code, self.message.clone())
    }
}

#[tonic::async_trait]
impl v1::server_reflection_server::ServerReflection for RefusingReflection {
    type ServerReflectionInfoStream =
        ReceiverStream<Result<v1::ServerReflectionResponse, Status>>;

    async fn server_reflection_info(
        &self,
        _request: Request<Streaming<v1::ServerReflectionRequest>>,
    ) -> Result<Response<Self::ServerReflectionInfoStream>, Status> {
        Err(self.status())
    }
}

#[tonic::async_trait]
impl v1alpha::server_reflection_server::ServerReflection for RefusingReflection {
    type ServerReflectionInfoStream =
        ReceiverStream<Result<v1alpha::ServerReflectionResponse, Status>>;

    async fn server_reflection_info(
        &self,
        _request: Request<Streaming<v1alpha::ServerReflectionRequest>>,
    ) -> Result<Response<Self::ServerReflectionInfoStream>, Status> {
        Err(self.status())
    }
}
