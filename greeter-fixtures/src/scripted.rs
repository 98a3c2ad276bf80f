//! A `grpc.reflection.v1` server whose answers are scripted per symbol.
//!
//! Unlike the `tonic-reflection` server it can return several files in one response, return
//! conflicting files under the same name, and report how many streams were opened against it.
use prost::Message;
use prost_types::FileDescriptorProto;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};
use tonic_reflection::pb::v1::server_reflection_request::MessageRequest;
use tonic_reflection::pb::v1::server_reflection_response::MessageResponse;
use tonic_reflection::pb::v1::server_reflection_server::{
    ServerReflection, ServerReflectionServer,
};
use tonic_reflection::pb::v1::{
    ErrorResponse, FileDescriptorResponse, ListServiceResponse, ServerReflectionRequest,
    ServerReflectionResponse, ServiceResponse,
};

const NOT_FOUND: i32 = 5;

#[derive(Clone, Debug)]
enum Reply {
    Files(Vec<Vec<u8>>),
    ServiceList(Vec<String>),
    Error(String),
    Silence,
}

#[derive(Clone, Debug, Default)]
pub struct ScriptedReflection {
    services: Vec<String>,
    symbols: HashMap<String, Reply>,
    files: HashMap<String, Vec<u8>>,
    omit_service_list: bool,
    opened: Arc<AtomicUsize>,
}

impl ScriptedReflection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lists `name` and answers symbol lookups for it with `files`, all in a single response.
    pub fn with_service(mut self, name: &str, files: Vec<FileDescriptorProto>) -> Self {
        self.services.push(name.to_string());
        let payloads = files.iter().map(Message::encode_to_vec).collect();
        self.symbols.insert(name.to_string(), Reply::Files(payloads));
        self
    }

    /// Lists `name` but answers every lookup for it with a NOT_FOUND error response.
    pub fn with_broken_service(mut self, name: &str) -> Self {
        self.services.push(name.to_string());
        self.symbols.insert(
            name.to_string(),
            Reply::Error(format!("symbol '{name}' is gone")),
        );
        self
    }

    /// Lists `name` but never answers lookups for it, leaving the stream open.
    pub fn with_stalled_service(mut self, name: &str) -> Self {
        self.services.push(name.to_string());
        self.symbols.insert(name.to_string(), Reply::Silence);
        self
    }

    /// Answers lookups for `symbol` with raw, possibly undecodable, payloads.
    pub fn with_raw_symbol(mut self, symbol: &str, payloads: Vec<Vec<u8>>) -> Self {
        self.symbols.insert(symbol.to_string(), Reply::Files(payloads));
        self
    }

    /// Answers lookups for `symbol` with a list-services response instead of descriptors.
    pub fn with_mismatched_symbol(mut self, symbol: &str) -> Self {
        self.symbols
            .insert(symbol.to_string(), Reply::ServiceList(vec![symbol.to_string()]));
        self
    }

    /// Serves `file` to `FileByFilename` requests.
    pub fn with_file(mut self, file: FileDescriptorProto) -> Self {
        let name = file.name.clone().unwrap_or_default();
        self.files.insert(name, file.encode_to_vec());
        self
    }

    /// Answers list-services requests with an empty message instead of a service list.
    pub fn without_service_list(mut self) -> Self {
        self.omit_service_list = true;
        self
    }

    /// Number of reflection streams opened so far, shared by every clone.
    pub fn stream_opens(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn into_server(self) -> ServerReflectionServer<Self> {
        ServerReflectionServer::new(self)
    }

    fn respond(&self, request: ServerReflectionRequest) -> Option<ServerReflectionResponse> {
        let message_response = match request.message_request.clone() {
            Some(MessageRequest::ListServices(_)) if self.omit_service_list => None,
            Some(MessageRequest::ListServices(_)) => {
                Some(MessageResponse::ListServicesResponse(ListServiceResponse {
                    service: self
                        .services
                        .iter()
                        .map(|name| ServiceResponse { name: name.clone() })
                        .collect(),
                }))
            }
            Some(MessageRequest::FileContainingSymbol(symbol)) => match self.symbols.get(&symbol) {
                Some(Reply::Silence) => return None,
                Some(reply) => Some(reply_message(reply)),
                None => Some(not_found(format!("unknown symbol '{symbol}'"))),
            },
            Some(MessageRequest::FileByFilename(name)) => Some(match self.files.get(&name) {
                Some(payload) => MessageResponse::FileDescriptorResponse(FileDescriptorResponse {
                    file_descriptor_proto: vec![payload.clone()],
                }),
                None => not_found(format!("unknown file '{name}'")),
            }),
            _ => Some(MessageResponse::ErrorResponse(ErrorResponse {
                error_code: 12,
                error_message: "unimplemented".to_string(),
            })),
        };

        Some(ServerReflectionResponse {
            valid_host: request.host.clone(),
            original_request: Some(request),
            message_response,
        })
    }
}

fn reply_message(reply: &Reply) -> MessageResponse {
    match reply {
        Reply::Files(payloads) => MessageResponse::FileDescriptorResponse(FileDescriptorResponse {
            file_descriptor_proto: payloads.clone(),
        }),
        Reply::ServiceList(names) => MessageResponse::ListServicesResponse(ListServiceResponse {
            service: names
                .iter()
                .map(|name| ServiceResponse { name: name.clone() })
                .collect(),
        }),
        Reply::Error(message) => not_found(message.clone()),
        Reply::Silence => unreachable!("silent symbols are never answered"),
    }
}

fn not_found(error_message: String) -> MessageResponse {
    MessageResponse::ErrorResponse(ErrorResponse {
        error_code: NOT_FOUND,
        error_message,
    })
}

#[tonic::async_trait]
impl ServerReflection for ScriptedReflection {
    type ServerReflectionInfoStream = ReceiverStream<Result<ServerReflectionResponse, Status>>;

    async fn server_reflection_info(
        &self,
        request: Request<Streaming<ServerReflectionRequest>>,
    ) -> Result<Response<Self::ServerReflectionInfoStream>, Status> {
        self.opened.fetch_add(1, Ordering::SeqCst);

        let mut requests = request.into_inner();
        let (tx, rx) = mpsc::channel(4);
        let script = self.clone();

        tokio::spawn(async move {
            while let Ok(Some(request)) = requests.message().await {
                let Some(response) = script.respond(request) else {
                    continue;
                };
                if tx.send(Ok(response)).await.is_err() {
                    break;
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}
