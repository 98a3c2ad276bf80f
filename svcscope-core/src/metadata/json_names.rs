//! JSON field names for resolved services.
//!
//! Descriptors obtained through reflection, or compiled without `protoc`'s JSON names, may lack
//! `json_name` on their fields. The names are filled in with the derivation `protoc` applies, for
//! every message reachable from a method's input or output, and the schema is rebuilt so the
//! descriptors handed out carry them.
use crate::descriptor::ServiceDescriptor;
use prost_reflect::{DescriptorError, DescriptorPool, Kind, MessageDescriptor};
use prost_types::{DescriptorProto, FileDescriptorProto, FileDescriptorSet};
use std::collections::HashSet;

/// Collects the messages reachable from a set of roots and fills their missing JSON names.
#[derive(Debug, Default)]
pub struct JsonNamesUpdater {
    reachable: HashSet<String>,
}

impl JsonNamesUpdater {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `message` and every message reachable through its fields.
    pub fn visit(&mut self, message: &MessageDescriptor) {
        let mut pending = vec![message.clone()];

        while let Some(message) = pending.pop() {
            if !self.reachable.insert(message.full_name().to_string()) {
                continue;
            }

            for field in message.fields() {
                if let Kind::Message(nested) = field.kind() {
                    pending.push(nested);
                }
            }
        }
    }

    pub fn visit_service(&mut self, service: &ServiceDescriptor) {
        for method in service.inner().methods() {
            self.visit(&method.input());
            self.visit(&method.output());
        }
    }

    /// Names of the messages visited so far.
    pub fn reachable(&self) -> impl Iterator<Item = &str> {
        self.reachable.iter().map(String::as_str)
    }

    /// Fills absent `json_name`s of the visited messages found in `files`. Explicit names are kept.
    pub fn apply(&self, files: &mut [FileDescriptorProto]) {
        for file in files {
            let prefix = file.package().to_string();
            self.apply_messages(&prefix, &mut file.message_type);
        }
    }

    fn apply_messages(&self, prefix: &str, messages: &mut [DescriptorProto]) {
        for message in messages {
            let full_name = if prefix.is_empty() {
                message.name().to_string()
            } else {
                format!("{prefix}.{}", message.name())
            };

            if self.reachable.contains(&full_name) {
                for field in &mut message.field {
                    if field.json_name.is_none() {
                        field.json_name = Some(to_json_name(field.name()));
                    }
                }
            }

            self.apply_messages(&full_name, &mut message.nested_type);
        }
    }
}

/// Derives the JSON name of a field: every `_` is dropped and the character after it is upper-cased.
pub fn to_json_name(field_name: &str) -> String {
    let mut json_name = String::with_capacity(field_name.len());
    let mut capitalize_next = false;

    for c in field_name.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            json_name.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            json_name.push(c);
        }
    }

    json_name
}

/// Rebuilds the schema of `service` with JSON names on every message its methods reach.
///
/// Returns `None` if the rebuilt schema no longer declares the service, which cannot happen for a
/// service taken from a valid pool.
pub fn normalize_service(
    service: &ServiceDescriptor,
) -> Result<Option<ServiceDescriptor>, DescriptorError> {
    let mut updater = JsonNamesUpdater::new();
    updater.visit_service(service);

    let mut files: Vec<FileDescriptorProto> = service
        .inner()
        .parent_pool()
        .file_descriptor_protos()
        .cloned()
        .collect();
    updater.apply(&mut files);

    let pool = DescriptorPool::from_file_descriptor_set(FileDescriptorSet { file: files })?;

    Ok(pool
        .get_service_by_name(service.full_name())
        .map(ServiceDescriptor::from))
}
