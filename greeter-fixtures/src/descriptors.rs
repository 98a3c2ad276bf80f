use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet,
    MethodDescriptorProto, ServiceDescriptorProto,
};

pub fn scalar_field(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(ty as i32),
        ..Default::default()
    }
}

/// A message-typed field. `type_name` is fully qualified without the leading dot.
pub fn message_field(name: &str, number: i32, type_name: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(Type::Message as i32),
        type_name: Some(format!(".{type_name}")),
        ..Default::default()
    }
}

pub fn message(name: &str, field: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field,
        ..Default::default()
    }
}

pub fn method(
    name: &str,
    input: &str,
    output: &str,
    client_streaming: bool,
    server_streaming: bool,
) -> MethodDescriptorProto {
    MethodDescriptorProto {
        name: Some(name.to_string()),
        input_type: Some(format!(".{input}")),
        output_type: Some(format!(".{output}")),
        client_streaming: Some(client_streaming),
        server_streaming: Some(server_streaming),
        ..Default::default()
    }
}

pub fn service(name: &str, method: Vec<MethodDescriptorProto>) -> ServiceDescriptorProto {
    ServiceDescriptorProto {
        name: Some(name.to_string()),
        method,
        ..Default::default()
    }
}

pub fn file(
    name: &str,
    package: &str,
    dependency: &[&str],
    message_type: Vec<DescriptorProto>,
    service: Vec<ServiceDescriptorProto>,
) -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some(name.to_string()),
        package: Some(package.to_string()),
        dependency: dependency.iter().map(|d| d.to_string()).collect(),
        message_type,
        service,
        syntax: Some("proto3".to_string()),
        ..Default::default()
    }
}

/// `pkg/types.proto`: shared types imported by the greeter.
pub fn types_file() -> FileDescriptorProto {
    file(
        "pkg/types.proto",
        "pkg",
        &[],
        vec![message(
            "Meta",
            vec![
                scalar_field("request_id", 1, Type::String),
                scalar_field("sent_at_ms", 2, Type::Int64),
            ],
        )],
        vec![],
    )
}

/// `pkg/greeter.proto`: the `pkg.Greeter` service with one method per streaming shape.
pub fn greeter_file() -> FileDescriptorProto {
    let mut reply = message("HelloReply", vec![scalar_field("message_text", 1, Type::String)]);
    reply.field.push(FieldDescriptorProto {
        json_name: Some("text_custom".to_string()),
        ..scalar_field("custom_named", 2, Type::String)
    });

    file(
        "pkg/greeter.proto",
        "pkg",
        &["pkg/types.proto"],
        vec![
            message(
                "HelloRequest",
                vec![
                    scalar_field("user_name", 1, Type::String),
                    message_field("meta", 2, "pkg.Meta"),
                ],
            ),
            reply,
        ],
        vec![service(
            "Greeter",
            vec![
                method("SayHello", "pkg.HelloRequest", "pkg.HelloReply", false, false),
                method("LotsOfReplies", "pkg.HelloRequest", "pkg.HelloReply", false, true),
                method("LotsOfGreetings", "pkg.HelloRequest", "pkg.HelloReply", true, false),
                method("BidiHello", "pkg.HelloRequest", "pkg.HelloReply", true, true),
            ],
        )],
    )
}

/// The complete greeter schema, dependencies first.
pub fn greeter_file_descriptor_set() -> FileDescriptorSet {
    FileDescriptorSet {
        file: vec![types_file(), greeter_file()],
    }
}

/// Two services compiled independently against two different files that share the name
/// `common.proto`. Returns `(alpha_files, beta_files)`, each a self-contained closure.
pub fn conflicting_sets() -> (Vec<FileDescriptorProto>, Vec<FileDescriptorProto>) {
    let alpha_common = file(
        "common.proto",
        "common",
        &[],
        vec![message("Ping", vec![scalar_field("id", 1, Type::String)])],
        vec![],
    );
    let alpha = file(
        "alpha.proto",
        "alpha",
        &["common.proto"],
        vec![],
        vec![service(
            "AlphaService",
            vec![method("Call", "common.Ping", "common.Ping", false, false)],
        )],
    );

    let beta_common = file(
        "common.proto",
        "common",
        &[],
        vec![message("Pong", vec![scalar_field("reply_id", 1, Type::String)])],
        vec![],
    );
    let beta = file(
        "beta.proto",
        "beta",
        &["common.proto"],
        vec![],
        vec![service(
            "BetaService",
            vec![method("Call", "common.Pong", "common.Pong", false, false)],
        )],
    );

    (vec![alpha, alpha_common], vec![beta, beta_common])
}
