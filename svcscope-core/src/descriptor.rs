//! # Descriptor Wrappers
//!
//! Thin, read-only views over a `prost_reflect` descriptor graph.
//!
//! The graph itself lives in a [`DescriptorPool`](prost_reflect::DescriptorPool): every descriptor
//! is a cheap handle made of the pool and an index into it, so parent links (method → service →
//! file) are lookups rather than owning edges. Whether the pool was built from a reflection
//! response or from compiled `.proto` files makes no difference to anything in this module.
use prost_reflect::FieldDescriptor;
use prost_types::FileDescriptorProto;

/// A compiled `.proto` file. Its identity is its path (e.g. `pkg/greeter.proto`).
#[derive(Clone, Debug)]
pub struct FileDescriptor(prost_reflect::FileDescriptor);

/// A service declared in a [`FileDescriptor`].
#[derive(Clone, Debug)]
pub struct ServiceDescriptor(prost_reflect::ServiceDescriptor);

/// A method of a [`ServiceDescriptor`].
#[derive(Clone, Debug)]
pub struct MethodDescriptor(prost_reflect::MethodDescriptor);

/// A message type, used as method input/output or as a field type.
#[derive(Clone, Debug)]
pub struct MessageDescriptor(prost_reflect::MessageDescriptor);

impl FileDescriptor {
    /// The path of the file, relative to the import root it was compiled from.
    pub fn path(&self) -> &str {
        self.0.name()
    }

    pub fn package(&self) -> &str {
        self.0.package_name()
    }

    /// Services declared at the top level of this file, in declaration order.
    pub fn services(&self) -> Vec<ServiceDescriptor> {
        self.0.services().map(ServiceDescriptor).collect()
    }

    /// Top-level message types of this file, in declaration order. Nested types are not included.
    pub fn message_types(&self) -> Vec<MessageDescriptor> {
        self.0.messages().map(MessageDescriptor).collect()
    }

    /// Files imported by this one.
    pub fn dependencies(&self) -> Vec<FileDescriptor> {
        self.0.dependencies().map(FileDescriptor).collect()
    }

    pub fn file_descriptor_proto(&self) -> &FileDescriptorProto {
        self.0.file_descriptor_proto()
    }

    pub fn inner(&self) -> &prost_reflect::FileDescriptor {
        &self.0
    }
}

impl ServiceDescriptor {
    /// The fully qualified name (e.g. `pkg.Greeter`).
    pub fn full_name(&self) -> &str {
        self.0.full_name()
    }

    /// The short name (e.g. `Greeter`).
    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// The file declaring this service.
    pub fn file(&self) -> FileDescriptor {
        FileDescriptor(self.0.parent_file())
    }

    pub fn methods(&self) -> Vec<MethodDescriptor> {
        self.0.methods().map(MethodDescriptor).collect()
    }

    /// Looks up a method by its short name.
    pub fn method(&self, name: &str) -> Option<MethodDescriptor> {
        self.0.methods().find(|m| m.name() == name).map(MethodDescriptor)
    }

    pub fn inner(&self) -> &prost_reflect::ServiceDescriptor {
        &self.0
    }
}

impl MethodDescriptor {
    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// The fully qualified name (e.g. `pkg.Greeter.SayHello`).
    pub fn full_name(&self) -> &str {
        self.0.full_name()
    }

    /// The service declaring this method.
    pub fn service(&self) -> ServiceDescriptor {
        ServiceDescriptor(self.0.parent_service().clone())
    }

    pub fn is_client_streaming(&self) -> bool {
        self.0.is_client_streaming()
    }

    pub fn is_server_streaming(&self) -> bool {
        self.0.is_server_streaming()
    }

    pub fn input_type(&self) -> MessageDescriptor {
        MessageDescriptor(self.0.input())
    }

    pub fn output_type(&self) -> MessageDescriptor {
        MessageDescriptor(self.0.output())
    }

    pub fn inner(&self) -> &prost_reflect::MethodDescriptor {
        &self.0
    }
}

impl MessageDescriptor {
    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// The fully qualified name (e.g. `pkg.HelloRequest`).
    pub fn full_name(&self) -> &str {
        self.0.full_name()
    }

    /// Fields in declaration order. Each carries its JSON name once the descriptor went through
    /// the metadata resolver.
    pub fn fields(&self) -> impl ExactSizeIterator<Item = FieldDescriptor> + '_ {
        self.0.fields()
    }

    /// The file declaring this message.
    pub fn file(&self) -> FileDescriptor {
        FileDescriptor(self.0.parent_file())
    }

    pub fn inner(&self) -> &prost_reflect::MessageDescriptor {
        &self.0
    }
}

impl From<prost_reflect::FileDescriptor> for FileDescriptor {
    fn from(value: prost_reflect::FileDescriptor) -> Self {
        Self(value)
    }
}

impl From<prost_reflect::ServiceDescriptor> for ServiceDescriptor {
    fn from(value: prost_reflect::ServiceDescriptor) -> Self {
        Self(value)
    }
}

impl From<prost_reflect::MethodDescriptor> for MethodDescriptor {
    fn from(value: prost_reflect::MethodDescriptor) -> Self {
        Self(value)
    }
}

impl From<prost_reflect::MessageDescriptor> for MessageDescriptor {
    fn from(value: prost_reflect::MessageDescriptor) -> Self {
        Self(value)
    }
}
