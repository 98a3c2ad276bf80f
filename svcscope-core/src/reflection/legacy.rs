//! # `v1alpha` Translation
//!
//! Field-by-field mapping between `grpc.reflection.v1` messages and their `v1alpha`
//! counterparts. Only the exchanges the client performs are supported:
//!
//! | Requests                 | Responses                  |
//! |--------------------------|----------------------------|
//! | `file_by_filename`       | `file_descriptor_response` |
//! | `file_containing_symbol` | `list_services_response`   |
//! | `list_services`          | `error_response`           |
//!
//! Anything else is rejected explicitly.
use super::client::ReflectionError;
use tonic_reflection::pb::{v1, v1alpha};

use v1::server_reflection_request::MessageRequest as V1Request;
use v1::server_reflection_response::MessageResponse as V1Response;
use v1alpha::server_reflection_request::MessageRequest as AlphaRequest;
use v1alpha::server_reflection_response::MessageResponse as AlphaResponse;

/// Translates an outgoing `v1` request into its `v1alpha` shape.
pub fn to_v1alpha_request(
    request: v1::ServerReflectionRequest,
) -> Result<v1alpha::ServerReflectionRequest, ReflectionError> {
    let message_request = match request.message_request {
        Some(V1Request::FileByFilename(name)) => AlphaRequest::FileByFilename(name),
        Some(V1Request::FileContainingSymbol(symbol)) => {
            AlphaRequest::FileContainingSymbol(symbol)
        }
        Some(V1Request::ListServices(filter)) => AlphaRequest::ListServices(filter),
        other => {
            return Err(ReflectionError::UnsupportedRequest(format!("{other:?}")));
        }
    };

    Ok(v1alpha::ServerReflectionRequest {
        host: request.host,
        message_request: Some(message_request),
    })
}

/// Translates an incoming `v1alpha` response into its `v1` shape.
pub fn from_v1alpha_response(
    response: v1alpha::ServerReflectionResponse,
) -> Result<v1::ServerReflectionResponse, ReflectionError> {
    let message_response = match response.message_response {
        Some(AlphaResponse::FileDescriptorResponse(res)) => {
            V1Response::FileDescriptorResponse(v1::FileDescriptorResponse {
                file_descriptor_proto: res.file_descriptor_proto,
            })
        }
        Some(AlphaResponse::ListServicesResponse(res)) => {
            V1Response::ListServicesResponse(v1::ListServiceResponse {
                service: res
                    .service
                    .into_iter()
                    .map(|s| v1::ServiceResponse { name: s.name })
                    .collect(),
            })
        }
        Some(AlphaResponse::ErrorResponse(e)) => V1Response::ErrorResponse(v1::ErrorResponse {
            error_code: e.error_code,
            error_message: e.error_message,
        }),
        other => {
            return Err(ReflectionError::UnsupportedResponse(format!("{other:?}")));
        }
    };

    Ok(v1::ServerReflectionResponse {
        valid_host: response.valid_host,
        original_request: response.original_request.and_then(from_v1alpha_request),
        message_response: Some(message_response),
    })
}

/// Echoed requests are informational, so kinds we never send are dropped instead of failing.
fn from_v1alpha_request(
    request: v1alpha::ServerReflectionRequest,
) -> Option<v1::ServerReflectionRequest> {
    let message_request = match request.message_request? {
        AlphaRequest::FileByFilename(name) => V1Request::FileByFilename(name),
        AlphaRequest::FileContainingSymbol(symbol) => V1Request::FileContainingSymbol(symbol),
        AlphaRequest::ListServices(filter) => V1Request::ListServices(filter),
        _ => return None,
    };

    Some(v1::ServerReflectionRequest {
        host: request.host,
        message_request: Some(message_request),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v1_request(message_request: V1Request) -> v1::ServerReflectionRequest {
        v1::ServerReflectionRequest {
            host: "localhost".to_string(),
            message_request: Some(message_request),
        }
    }

    /// What a `v1alpha` server would answer to `request`, translated back.
    fn legacy_exchange(
        request: v1::ServerReflectionRequest,
        answer: AlphaResponse,
    ) -> v1::ServerReflectionResponse {
        let legacy_request = to_v1alpha_request(request).unwrap();
        let legacy_response = v1alpha::ServerReflectionResponse {
            valid_host: legacy_request.host.clone(),
            original_request: Some(legacy_request),
            message_response: Some(answer),
        };
        from_v1alpha_response(legacy_response).unwrap()
    }

    #[test]
    fn file_by_filename_round_trip() {
        let request = v1_request(V1Request::FileByFilename("pkg/greeter.proto".into()));
        let payload = vec![vec![10, 3, b'a', b'b', b'c']];

        let response = legacy_exchange(
            request.clone(),
            AlphaResponse::FileDescriptorResponse(v1alpha::FileDescriptorResponse {
                file_descriptor_proto: payload.clone(),
            }),
        );

        let native = v1::ServerReflectionResponse {
            valid_host: "localhost".to_string(),
            original_request: Some(request),
            message_response: Some(V1Response::FileDescriptorResponse(
                v1::FileDescriptorResponse {
                    file_descriptor_proto: payload,
                },
            )),
        };
        assert_eq!(response, native);
    }

    #[test]
    fn file_containing_symbol_round_trip_with_error() {
        let request = v1_request(V1Request::FileContainingSymbol("pkg.Ghost".into()));

        let response = legacy_exchange(
            request.clone(),
            AlphaResponse::ErrorResponse(v1alpha::ErrorResponse {
                error_code: 5,
                error_message: "not found".into(),
            }),
        );

        let native = v1::ServerReflectionResponse {
            valid_host: "localhost".to_string(),
            original_request: Some(request),
            message_response: Some(V1Response::ErrorResponse(v1::ErrorResponse {
                error_code: 5,
                error_message: "not found".into(),
            })),
        };
        assert_eq!(response, native);
    }

    #[test]
    fn list_services_round_trip_keeps_order() {
        let request = v1_request(V1Request::ListServices("*".into()));

        let response = legacy_exchange(
            request.clone(),
            AlphaResponse::ListServicesResponse(v1alpha::ListServiceResponse {
                service: ["b.Second", "a.First"]
                    .into_iter()
                    .map(|name| v1alpha::ServiceResponse { name: name.into() })
                    .collect(),
            }),
        );

        let native = v1::ServerReflectionResponse {
            valid_host: "localhost".to_string(),
            original_request: Some(request),
            message_response: Some(V1Response::ListServicesResponse(v1::ListServiceResponse {
                service: ["b.Second", "a.First"]
                    .into_iter()
                    .map(|name| v1::ServiceResponse { name: name.into() })
                    .collect(),
            })),
        };
        assert_eq!(response, native);
    }

    #[test]
    fn rejects_unsupported_requests() {
        let extension = v1_request(V1Request::AllExtensionNumbersOfType("pkg.Msg".into()));
        let empty = v1::ServerReflectionRequest {
            host: String::new(),
            message_request: None,
        };

        assert!(matches!(
            to_v1alpha_request(extension),
            Err(ReflectionError::UnsupportedRequest(_))
        ));
        assert!(matches!(
            to_v1alpha_request(empty),
            Err(ReflectionError::UnsupportedRequest(_))
        ));
    }

    #[test]
    fn rejects_unsupported_responses() {
        let response = v1alpha::ServerReflectionResponse {
            valid_host: String::new(),
            original_request: None,
            message_response: Some(AlphaResponse::AllExtensionNumbersResponse(
                v1alpha::ExtensionNumberResponse::default(),
            )),
        };

        assert!(matches!(
            from_v1alpha_response(response),
            Err(ReflectionError::UnsupportedResponse(_))
        ));
    }
}
