//! # `google.protobuf.Any` Resolution
//!
//! Resolves the type URL of an `Any` payload into a message type without ever failing on types
//! that are simply unknown.
//!
//! [`AnyResolver`] asks a [`MessageTypeLookup`] first. When the lookup reports
//! [`LookupError::NotFound`] it answers with [`MessageType::Unresolved`]: a stand-in type with a
//! single string field `err`. Decoding any payload with it yields `err = "type not found"` and
//! leaves the actual bytes untouched, so display code can render unknown payloads without a
//! special case. Other lookup failures are returned as they are.
//!
//! The same fallback covers `Any` values nested inside other messages when they are rendered as
//! JSON through [`AnyResolver::message_to_json`].
use crate::registry::{RegistryError, TypeRegistry};
use prost::DecodeError;
use prost_reflect::{DescriptorPool, DynamicMessage, Kind, MapKey, MessageDescriptor, ReflectMessage, Value};
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{Any, DescriptorProto, FieldDescriptorProto, FileDescriptorProto};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashSet;
use std::sync::LazyLock;

/// Value stored in the `err` field of [`MessageType::Unresolved`] messages.
pub const TYPE_NOT_FOUND: &str = "type not found";

const UNRESOLVED_FIELD: &str = "err";

const ANY_TYPE: &str = "google.protobuf.Any";

const WELL_KNOWN_PACKAGE: &str = "google.protobuf";

static UNRESOLVED: LazyLock<MessageDescriptor> = LazyLock::new(unresolved_descriptor);

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("Message type for '{0}' not found")]
    NotFound(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, thiserror::Error)]
pub enum AnyDecodeError {
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error("Failed to decode payload of '{type_url}': {source}")]
    Decode {
        type_url: String,
        #[source]
        source: DecodeError,
    },
    #[error("Failed to render payload of '{type_url}' as JSON: {source}")]
    Json {
        type_url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Maps a type URL to a message descriptor.
pub trait MessageTypeLookup {
    fn lookup_message(&self, type_url: &str) -> Result<MessageDescriptor, LookupError>;
}

impl MessageTypeLookup for DescriptorPool {
    fn lookup_message(&self, type_url: &str) -> Result<MessageDescriptor, LookupError> {
        self.get_message_by_name(message_name(type_url))
            .ok_or_else(|| LookupError::NotFound(type_url.to_string()))
    }
}

impl MessageTypeLookup for TypeRegistry {
    fn lookup_message(&self, type_url: &str) -> Result<MessageDescriptor, LookupError> {
        self.pool()?.lookup_message(type_url)
    }
}

/// The result of resolving a type URL.
#[derive(Clone, Debug)]
pub enum MessageType {
    /// The type is known to the registry.
    Concrete(MessageDescriptor),
    /// The type is unknown; see the [module documentation](self).
    Unresolved,
}

impl MessageType {
    pub fn descriptor(&self) -> MessageDescriptor {
        match self {
            MessageType::Concrete(desc) => desc.clone(),
            MessageType::Unresolved => UNRESOLVED.clone(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, MessageType::Concrete(_))
    }

    /// Decodes `bytes` as an instance of this type.
    ///
    /// For [`MessageType::Unresolved`] the bytes are ignored and the message only carries
    /// [`TYPE_NOT_FOUND`].
    pub fn decode(&self, bytes: &[u8]) -> Result<DynamicMessage, DecodeError> {
        match self {
            MessageType::Concrete(desc) => DynamicMessage::decode(desc.clone(), bytes),
            MessageType::Unresolved => {
                let mut msg = DynamicMessage::new(UNRESOLVED.clone());
                msg.set_field_by_name(UNRESOLVED_FIELD, Value::String(TYPE_NOT_FOUND.to_string()));
                Ok(msg)
            }
        }
    }
}

/// Type URL resolution with a fallback for unknown types.
#[derive(Clone, Debug)]
pub struct AnyResolver<L = TypeRegistry> {
    lookup: L,
}

impl AnyResolver<TypeRegistry> {
    /// A resolver backed by the process-wide [`TypeRegistry`].
    pub fn global() -> Self {
        Self::new(TypeRegistry::global())
    }
}

impl<L> AnyResolver<L>
where
    L: MessageTypeLookup,
{
    pub fn new(lookup: L) -> Self {
        Self { lookup }
    }

    /// Resolves `type_url`, answering [`MessageType::Unresolved`] instead of failing when the
    /// type is unknown.
    pub fn find_message_by_url(&self, type_url: &str) -> Result<MessageType, LookupError> {
        match self.lookup.lookup_message(type_url) {
            Ok(desc) => Ok(MessageType::Concrete(desc)),
            Err(LookupError::NotFound(_)) => Ok(MessageType::Unresolved),
            Err(err) => Err(err),
        }
    }

    /// Decodes the payload of `any` with its resolved type.
    pub fn decode_any(&self, any: &Any) -> Result<DynamicMessage, AnyDecodeError> {
        let message_type = self.find_message_by_url(&any.type_url)?;

        message_type
            .decode(&any.value)
            .map_err(|source| AnyDecodeError::Decode {
                type_url: any.type_url.clone(),
                source,
            })
    }

    /// Renders `any` as JSON in the canonical `{"@type": ..., <fields>}` shape.
    ///
    /// Well-known payload types keep their own JSON form under a `value` key.
    pub fn any_to_json(&self, any: &Any) -> Result<JsonValue, AnyDecodeError> {
        let msg = self.decode_any(any)?;
        let value = self.message_to_json(&msg)?;

        let mut object = Map::new();
        object.insert("@type".to_string(), JsonValue::String(any.type_url.clone()));
        match value {
            JsonValue::Object(fields) if !is_well_known(&msg.descriptor()) => object.extend(fields),
            other => {
                object.insert("value".to_string(), other);
            }
        }

        Ok(JsonValue::Object(object))
    }

    /// Renders `msg` as JSON, resolving every `Any` it holds at any depth with
    /// [`Self::any_to_json`].
    pub fn message_to_json(&self, msg: &DynamicMessage) -> Result<JsonValue, AnyDecodeError> {
        let desc = msg.descriptor();
        if desc.full_name() == ANY_TYPE {
            let any = msg
                .transcode_to::<Any>()
                .map_err(|source| AnyDecodeError::Decode {
                    type_url: desc.full_name().to_string(),
                    source,
                })?;
            return self.any_to_json(&any);
        }

        // Fields that may hold an `Any` are rendered here; the rest by prost-reflect.
        let mut plain = msg.clone();
        let mut rendered = Vec::new();
        for (field, value) in msg.fields() {
            if kind_holds_any(&field.kind()) {
                rendered.push((field.json_name().to_string(), self.value_to_json(value)?));
                plain.clear_field(&field);
            }
        }

        let mut json = serde_json::to_value(&plain).map_err(|source| AnyDecodeError::Json {
            type_url: desc.full_name().to_string(),
            source,
        })?;
        if let JsonValue::Object(object) = &mut json {
            object.extend(rendered);
        }

        Ok(json)
    }

    fn value_to_json(&self, value: &Value) -> Result<JsonValue, AnyDecodeError> {
        match value {
            Value::Message(msg) => self.message_to_json(msg),
            Value::List(items) => items
                .iter()
                .map(|item| self.value_to_json(item))
                .collect::<Result<Vec<_>, _>>()
                .map(JsonValue::Array),
            Value::Map(entries) => {
                let mut object = Map::new();
                for (key, value) in entries {
                    object.insert(map_key_to_string(key), self.value_to_json(value)?);
                }
                Ok(JsonValue::Object(object))
            }
            // Only message-typed values can hold an `Any`.
            _ => Ok(JsonValue::Null),
        }
    }
}

fn kind_holds_any(kind: &Kind) -> bool {
    match kind {
        Kind::Message(desc) => holds_any(desc, &mut HashSet::new()),
        _ => false,
    }
}

/// `true` when `desc` is `Any` or has a field reaching one. Recursive types are visited once.
fn holds_any(desc: &MessageDescriptor, seen: &mut HashSet<String>) -> bool {
    if desc.full_name() == ANY_TYPE {
        return true;
    }
    if !seen.insert(desc.full_name().to_string()) {
        return false;
    }

    for field in desc.fields() {
        if let Kind::Message(nested) = field.kind()
            && holds_any(&nested, seen)
        {
            return true;
        }
    }
    false
}

fn is_well_known(desc: &MessageDescriptor) -> bool {
    desc.package_name() == WELL_KNOWN_PACKAGE
}

fn map_key_to_string(key: &MapKey) -> String {
    match key {
        MapKey::Bool(v) => v.to_string(),
        MapKey::I32(v) => v.to_string(),
        MapKey::I64(v) => v.to_string(),
        MapKey::U32(v) => v.to_string(),
        MapKey::U64(v) => v.to_string(),
        MapKey::String(v) => v.clone(),
    }
}

/// The message name is whatever follows the last `/` of the URL.
fn message_name(type_url: &str) -> &str {
    match type_url.rfind('/') {
        Some(idx) => &type_url[idx + 1..],
        None => type_url,
    }
}

fn unresolved_descriptor() -> MessageDescriptor {
    let file = FileDescriptorProto {
        name: Some("any.proto".to_string()),
        syntax: Some("proto3".to_string()),
        message_type: vec![DescriptorProto {
            name: Some("any".to_string()),
            field: vec![FieldDescriptorProto {
                name: Some(UNRESOLVED_FIELD.to_string()),
                number: Some(1),
                label: Some(Label::Optional as i32),
                r#type: Some(Type::String as i32),
                ..Default::default()
            }],
            ..Default::default()
        }],
        ..Default::default()
    };

    // The file above is a constant and always valid.
    let mut pool = DescriptorPool::new();
    pool.add_file_descriptor_proto(file)
        .expect("synthetic any.proto is valid");
    pool.get_message_by_name("any")
        .expect("synthetic any.proto declares 'any'")
}
