use colored::*;
use std::collections::HashSet;
use std::fmt::Display;
use svcscope_core::descriptor::{FileDescriptor, MessageDescriptor, MethodDescriptor};
use svcscope_core::metadata::ServiceMeta;
use svcscope_core::prost_reflect::Kind;

/// A wrapper struct for a formatted, colored string.
///
/// Implements `Display` so it can be printed directly.
pub struct FormattedString(pub String);

pub struct ServiceList(pub Vec<String>);

pub struct FileList(pub Vec<FileDescriptor>);

pub struct GenericError<T: Display>(pub &'static str, pub T);

impl std::fmt::Display for FormattedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", self.0)?;
        Ok(())
    }
}

impl<T: Display> From<GenericError<T>> for FormattedString {
    fn from(GenericError(msg, err): GenericError<T>) -> Self {
        FormattedString(format!("{}:\n\n'{}'", msg.red().bold(), err))
    }
}

impl From<ServiceList> for FormattedString {
    fn from(ServiceList(services): ServiceList) -> Self {
        if services.is_empty() {
            return FormattedString("No services found.".yellow().to_string());
        }

        let mut out = String::new();
        out.push_str("Available Services:\n");
        for svc in services {
            out.push_str(&format!("  - {}\n", svc.green()));
        }
        FormattedString(out.trim_end().to_string())
    }
}

impl From<FileList> for FormattedString {
    fn from(FileList(files): FileList) -> Self {
        if files.is_empty() {
            return FormattedString("No files registered.".yellow().to_string());
        }

        let mut out = String::new();
        out.push_str("Registered Files:\n");
        for file in files {
            out.push_str(&format!("  - {}", file.path().green()));
            if !file.package().is_empty() {
                out.push_str(&format!(" ({})", file.package().cyan()));
            }
            out.push('\n');
        }
        FormattedString(out.trim_end().to_string())
    }
}

/// A service block followed by the definitions of the messages its methods exchange.
impl From<&ServiceMeta> for FormattedString {
    fn from(meta: &ServiceMeta) -> Self {
        let mut out = String::new();
        out.push_str(&format!(
            "{} {}\n\n",
            "//".dimmed(),
            meta.file().path().dimmed()
        ));
        out.push_str(&format!("{} {} {{\n", "service".cyan(), meta.name().green()));

        for method in meta.methods() {
            out.push_str("  ");
            out.push_str(&FormattedString::from(method).0);
            out.push('\n');
        }
        out.push('}');

        let mut seen = HashSet::new();
        for method in meta.methods() {
            for message in [method.input_type(), method.output_type()] {
                if seen.insert(message.full_name().to_string()) {
                    out.push_str("\n\n");
                    out.push_str(&FormattedString::from(&message).0);
                }
            }
        }

        FormattedString(out)
    }
}

impl From<&MethodDescriptor> for FormattedString {
    fn from(method: &MethodDescriptor) -> Self {
        let input_stream = if method.is_client_streaming() {
            format!("{} ", "stream".cyan())
        } else {
            "".to_string()
        };
        let output_stream = if method.is_server_streaming() {
            format!("{} ", "stream".cyan())
        } else {
            "".to_string()
        };

        FormattedString(format!(
            "{} {}({}{}) {} ({}{});",
            "rpc".cyan(),
            method.name().green(),
            input_stream,
            method.input_type().full_name().yellow(),
            "returns".cyan(),
            output_stream,
            method.output_type().full_name().yellow()
        ))
    }
}

/// Fields are annotated with the name they take in JSON.
impl From<&MessageDescriptor> for FormattedString {
    fn from(message: &MessageDescriptor) -> Self {
        let mut out = String::new();
        out.push_str(&format!(
            "{} {} {{\n",
            "message".cyan(),
            message.full_name().green()
        ));

        for field in message.fields() {
            let label = if field.is_list() {
                format!("{} ", "repeated".cyan())
            } else {
                "".to_string()
            };

            let type_name = match field.kind() {
                Kind::Double => "double".yellow(),
                Kind::Float => "float".yellow(),
                Kind::Int32 => "int32".yellow(),
                Kind::Int64 => "int64".yellow(),
                Kind::Uint32 => "uint32".yellow(),
                Kind::Uint64 => "uint64".yellow(),
                Kind::Sint32 => "sint32".yellow(),
                Kind::Sint64 => "sint64".yellow(),
                Kind::Fixed32 => "fixed32".yellow(),
                Kind::Fixed64 => "fixed64".yellow(),
                Kind::Sfixed32 => "sfixed32".yellow(),
                Kind::Sfixed64 => "sfixed64".yellow(),
                Kind::Bool => "bool".yellow(),
                Kind::String => "string".yellow(),
                Kind::Bytes => "bytes".yellow(),
                Kind::Message(m) => m.full_name().yellow(),
                Kind::Enum(e) => e.full_name().yellow(),
            };

            out.push_str(&format!(
                "  {}{} {} = {}; {}\n",
                label,
                type_name,
                field.name(),
                field.number(),
                format!("// json: {}", field.json_name()).dimmed()
            ));
        }
        out.push('}');
        FormattedString(out)
    }
}
