use greeter_fixtures::descriptors::types_file;
use greeter_fixtures::{
    RefusingReflection, ScriptedReflection, conflicting_sets, greeter_file_descriptor_set,
};
use prost::Message;
use svcscope_core::config::ReflectVersion;
use svcscope_core::reflection::ReflectionVersion;
use svcscope_core::reflection::client::{ReflectionClient, ReflectionError};
use tonic::Code;

fn greeter_reflection() -> tonic_reflection::server::Builder<'static> {
    tonic_reflection::server::Builder::configure()
        .register_file_descriptor_set(greeter_file_descriptor_set())
        .include_reflection_service(false)
}

async fn v1_client() -> ReflectionClient {
    let service = greeter_reflection()
        .build_v1()
        .expect("Failed to setup Reflection Service");

    ReflectionClient::connect(service, ReflectVersion::Auto)
        .await
        .expect("Failed to open reflection stream")
}

async fn scripted_client(script: &ScriptedReflection) -> ReflectionClient {
    ReflectionClient::connect(script.clone().into_server(), ReflectVersion::V1)
        .await
        .expect("Failed to open reflection stream")
}

#[tokio::test]
async fn test_auto_commits_to_v1_when_available() {
    let client = v1_client().await;

    assert_eq!(client.version(), ReflectionVersion::V1);
}

#[tokio::test]
async fn test_auto_falls_back_to_v1alpha() {
    let service = greeter_reflection().build_v1alpha().unwrap();

    let mut client = ReflectionClient::connect(service, ReflectVersion::Auto)
        .await
        .expect("Failed to negotiate v1alpha");

    assert_eq!(client.version(), ReflectionVersion::V1Alpha);

    // Every later call keeps going through the translated protocol.
    let services = client.list_services().await.unwrap();
    assert_eq!(services, vec!["pkg.Greeter"]);

    let greeter = client.resolve_service("pkg.Greeter").await.unwrap();
    assert_eq!(greeter.full_name(), "pkg.Greeter");
    assert_eq!(client.version(), ReflectionVersion::V1Alpha);
}

#[tokio::test]
async fn test_explicit_v1alpha_never_tries_v1() {
    let service = greeter_reflection().build_v1alpha().unwrap();

    let client = ReflectionClient::connect(service, ReflectVersion::V1Alpha)
        .await
        .unwrap();

    assert_eq!(client.version(), ReflectionVersion::V1Alpha);
}

#[tokio::test]
async fn test_explicit_v1alpha_surfaces_its_own_failure() {
    let service = greeter_reflection().build_v1().unwrap();

    let result = ReflectionClient::connect(service, ReflectVersion::V1Alpha).await;

    assert!(matches!(
        result,
        Err(ReflectionError::ServerStreamInitFailed(status)) if status.code() == Code::Unimplemented
    ));
}

#[tokio::test]
async fn test_explicit_v1_does_not_fall_back() {
    let service = greeter_reflection().build_v1alpha().unwrap();

    let result = ReflectionClient::connect(service, ReflectVersion::V1).await;

    assert!(matches!(
        result,
        Err(ReflectionError::ServerStreamInitFailed(status)) if status.code() == Code::Unimplemented
    ));
}

#[tokio::test]
async fn test_auto_surfaces_v1_error_when_both_versions_fail() {
    let routes = tonic::service::Routes::new(
        RefusingReflection::new(Code::PermissionDenied, "v1 is locked").into_v1_server(),
    )
    .add_service(RefusingReflection::new(Code::Internal, "v1alpha is broken").into_v1alpha_server());

    let result = ReflectionClient::connect(routes, ReflectVersion::Auto).await;

    match result {
        Err(ReflectionError::ServerStreamInitFailed(status)) => {
            assert_eq!(status.code(), Code::PermissionDenied);
            assert_eq!(status.message(), "v1 is locked");
        }
        other => panic!("Expected ServerStreamInitFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_auto_fails_when_nothing_is_served() {
    let routes = tonic::service::Routes::default();

    let result = ReflectionClient::connect(routes, ReflectVersion::Auto).await;

    match result {
        Err(ReflectionError::ServerStreamInitFailed(status)) => {
            assert_eq!(status.code(), Code::Unimplemented);
        }
        other => panic!("Expected ServerStreamInitFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_list_services_keeps_server_order() {
    let (alpha, beta) = conflicting_sets();
    let script = ScriptedReflection::new()
        .with_service("beta.BetaService", beta)
        .with_service("alpha.AlphaService", alpha);
    let mut client = scripted_client(&script).await;

    let services = client.list_services().await.unwrap();

    assert_eq!(services, vec!["beta.BetaService", "alpha.AlphaService"]);
}

#[tokio::test]
async fn test_list_services_without_payload_is_no_services() {
    let script = ScriptedReflection::new().without_service_list();

    // The probe is answered, with an empty message, so the stream opens.
    let mut client = scripted_client(&script).await;

    assert!(matches!(
        client.list_services().await,
        Err(ReflectionError::NoServices)
    ));
}

#[tokio::test]
async fn test_file_containing_symbol_fetches_missing_imports() {
    let mut client = v1_client().await;

    let files = client.file_containing_symbol("pkg.Greeter").await.unwrap();

    let names: Vec<_> = files.iter().map(|f| f.name()).collect();
    assert_eq!(names.first(), Some(&"pkg/greeter.proto"));
    assert!(names.contains(&"pkg/types.proto"));
    assert_eq!(names.len(), 2);
}

#[tokio::test]
async fn test_file_containing_symbol_fails_on_any_bad_payload() {
    let script = ScriptedReflection::new()
        .with_raw_symbol("pkg.Bad", vec![types_file().encode_to_vec(), vec![0xFF, 0xFF, 0xFF]]);
    let mut client = scripted_client(&script).await;

    let result = client.file_containing_symbol("pkg.Bad").await;

    assert!(matches!(result, Err(ReflectionError::DecodeError(_))));
}

#[tokio::test]
async fn test_file_containing_symbol_without_descriptors() {
    let script = ScriptedReflection::new().with_mismatched_symbol("pkg.Odd");
    let mut client = scripted_client(&script).await;

    let result = client.file_containing_symbol("pkg.Odd").await;

    assert!(matches!(result, Err(ReflectionError::NoDescriptor(symbol)) if symbol == "pkg.Odd"));
}

#[tokio::test]
async fn test_unknown_symbol_ends_the_stream_with_not_found() {
    let mut client = v1_client().await;

    let result = client.file_containing_symbol("pkg.Nope").await;

    assert!(matches!(
        result,
        Err(ReflectionError::ServerStreamFailure(status)) if status.code() == Code::NotFound
    ));
}

#[tokio::test]
async fn test_error_response_is_a_server_error() {
    let script = ScriptedReflection::new().with_broken_service("pkg.Gone");
    let mut client = scripted_client(&script).await;

    let result = client.file_containing_symbol("pkg.Gone").await;

    assert!(matches!(
        result,
        Err(ReflectionError::ServerError { code: 5, message }) if message == "symbol 'pkg.Gone' is gone"
    ));
}

#[tokio::test]
async fn test_resolve_service_exposes_methods() {
    let mut client = v1_client().await;

    let service = client.resolve_service("pkg.Greeter").await.unwrap();

    assert_eq!(service.name(), "Greeter");
    assert_eq!(service.file().path(), "pkg/greeter.proto");

    let bidi = service.method("BidiHello").expect("BidiHello is declared");
    assert!(bidi.is_client_streaming());
    assert!(bidi.is_server_streaming());
    assert_eq!(bidi.input_type().full_name(), "pkg.HelloRequest");
    assert_eq!(bidi.service().full_name(), "pkg.Greeter");

    let unary = service.method("SayHello").unwrap();
    assert!(!unary.is_client_streaming());
    assert!(!unary.is_server_streaming());
}

#[tokio::test]
async fn test_resolve_service_matches_short_name_only_in_returned_files() {
    let script = ScriptedReflection::new().with_raw_symbol(
        "pkg.Ghost",
        vec![types_file().encode_to_vec()],
    );
    let mut client = scripted_client(&script).await;

    let result = client.resolve_service("pkg.Ghost").await;

    assert!(matches!(result, Err(ReflectionError::ServiceNotFound(name)) if name == "pkg.Ghost"));
}

#[tokio::test]
async fn test_descriptor_cache_keeps_first_file_of_a_name() {
    let (alpha, beta) = conflicting_sets();
    let script = ScriptedReflection::new()
        .with_service("alpha.AlphaService", alpha)
        .with_service("beta.BetaService", beta);
    let mut client = scripted_client(&script).await;

    client.resolve_service("alpha.AlphaService").await.unwrap();

    // `beta.proto` is built against the cached `common.proto` from alpha, which lacks `common.Pong`.
    let result = client.resolve_service("beta.BetaService").await;
    assert!(matches!(
        result,
        Err(ReflectionError::Descriptor { symbol, .. }) if symbol == "beta.BetaService"
    ));

    // A fresh client starts with an empty cache.
    let mut fresh = scripted_client(&script).await;
    let beta = fresh.resolve_service("beta.BetaService").await.unwrap();
    let call = beta.method("Call").unwrap();
    assert_eq!(call.input_type().full_name(), "common.Pong");
    assert_eq!(script.stream_opens(), 2);
}

#[tokio::test]
async fn test_reset_closes_the_stream() {
    let mut client = v1_client().await;

    client.reset();

    assert!(matches!(
        client.list_services().await,
        Err(ReflectionError::StreamClosed)
    ));
}
