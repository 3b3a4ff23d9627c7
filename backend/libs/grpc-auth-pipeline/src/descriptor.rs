//! Method and message descriptors
//!
//! Stand-in for proto descriptors carrying custom options: which methods
//! stream, which ones touch sensitive data, what access they declare, and
//! which message fields are sensitive. A [`DescriptorRegistry`] is validated
//! and compiled once at startup into
//!
//! - the metadata override table consulted by the authorizer, and
//! - a redaction plan per method.
//!
//! Every annotation defect is a [`ConfigError`] here, so nothing about
//! descriptors can fail per call.

use crate::error::ConfigError;
use crate::method::MethodIdentity;
use crate::policy::AccessRequirement;
use crate::redaction::Redactor;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,

    /// Removed from payloads of methods that use sensitive data
    #[serde(default)]
    pub sensitive: bool,

    /// Nested message type, for object fields and arrays of objects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDescriptor {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl MessageDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.into(),
            sensitive: false,
            message: None,
        });
        self
    }

    pub fn sensitive_field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.into(),
            sensitive: true,
            message: None,
        });
        self
    }

    /// Field holding a nested message (or a list of them)
    pub fn message_field(mut self, name: impl Into<String>, message: impl Into<String>) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.into(),
            sensitive: false,
            message: Some(message.into()),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub method: MethodIdentity,

    /// Request message type
    pub input: String,

    /// Response message type
    pub output: String,

    #[serde(default)]
    pub server_streaming: bool,

    /// Only methods with this marker are scanned by the redaction layer
    #[serde(default)]
    pub uses_sensitive_data: bool,

    /// Also redact the inbound request before the handler sees it
    #[serde(default)]
    pub redact_request: bool,

    /// Declarative access metadata; overrides the programmatic rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<AccessRequirement>,
}

impl MethodDescriptor {
    pub fn unary(method: MethodIdentity, input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            method,
            input: input.into(),
            output: output.into(),
            server_streaming: false,
            uses_sensitive_data: false,
            redact_request: false,
            access: None,
        }
    }

    pub fn server_streaming(mut self) -> Self {
        self.server_streaming = true;
        self
    }

    pub fn uses_sensitive_data(mut self) -> Self {
        self.uses_sensitive_data = true;
        self
    }

    pub fn redact_request(mut self) -> Self {
        self.redact_request = true;
        self
    }

    pub fn access(mut self, access: AccessRequirement) -> Self {
        self.access = Some(access);
        self
    }
}

/// Raw, unvalidated descriptor set, as loaded from a file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorSet {
    #[serde(default)]
    pub messages: Vec<MessageDescriptor>,
    #[serde(default)]
    pub methods: Vec<MethodDescriptor>,
}

impl DescriptorSet {
    pub fn message(mut self, message: MessageDescriptor) -> Self {
        self.messages.push(message);
        self
    }

    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    /// Load from a YAML, TOML or JSON file (format picked by extension)
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let set = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()?;
        Ok(set)
    }
}

/// Which message to redact on each side of a call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodRedaction {
    pub request: Option<String>,
    pub response: Option<String>,
}

/// Validated descriptors plus the lookup tables compiled from them
#[derive(Debug, Clone, Default)]
pub struct DescriptorRegistry {
    methods: HashMap<MethodIdentity, MethodDescriptor>,
    redactions: HashMap<MethodIdentity, MethodRedaction>,
    redactor: Redactor,
}

impl DescriptorRegistry {
    /// Validate and compile a descriptor set
    ///
    /// ## Errors
    ///
    /// - duplicate message or method descriptors
    /// - empty or repeated field names within a message
    /// - a field or method referencing an undeclared message
    pub fn new(set: DescriptorSet) -> Result<Self, ConfigError> {
        let mut messages: HashMap<&str, &MessageDescriptor> = HashMap::new();
        for message in &set.messages {
            if messages.insert(message.name.as_str(), message).is_some() {
                return Err(ConfigError::DuplicateMessage(message.name.clone()));
            }

            let mut seen = HashSet::new();
            for field in &message.fields {
                if field.name.trim().is_empty() {
                    return Err(ConfigError::EmptyFieldName(message.name.clone()));
                }
                if !seen.insert(field.name.as_str()) {
                    return Err(ConfigError::DuplicateField {
                        message: message.name.clone(),
                        field: field.name.clone(),
                    });
                }
            }
        }

        for message in &set.messages {
            for field in &message.fields {
                if let Some(target) = &field.message {
                    if !messages.contains_key(target.as_str()) {
                        return Err(ConfigError::UnknownFieldType {
                            message: message.name.clone(),
                            field: field.name.clone(),
                            target: target.clone(),
                        });
                    }
                }
            }
        }

        let redactor = Redactor::compile(&set.messages);

        let mut methods = HashMap::new();
        let mut redactions = HashMap::new();
        for descriptor in set.methods {
            for message in [&descriptor.input, &descriptor.output] {
                if !messages.contains_key(message.as_str()) {
                    return Err(ConfigError::UnknownMessage {
                        method: descriptor.method.to_string(),
                        message: message.clone(),
                    });
                }
            }

            if descriptor.uses_sensitive_data {
                let plan = MethodRedaction {
                    request: (descriptor.redact_request && redactor.needs_redaction(&descriptor.input))
                        .then(|| descriptor.input.clone()),
                    response: redactor
                        .needs_redaction(&descriptor.output)
                        .then(|| descriptor.output.clone()),
                };
                if plan.request.is_some() || plan.response.is_some() {
                    redactions.insert(descriptor.method.clone(), plan);
                }
            }

            let key = descriptor.method.clone();
            if methods.insert(key.clone(), descriptor).is_some() {
                return Err(ConfigError::DuplicateMethod(key.to_string()));
            }
        }

        Ok(Self {
            methods,
            redactions,
            redactor,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::new(DescriptorSet::from_file(path)?)
    }

    pub fn method(&self, method: &MethodIdentity) -> Option<&MethodDescriptor> {
        self.methods.get(method)
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.methods.values()
    }

    /// Declarative access metadata for `method`, if any
    pub fn access(&self, method: &MethodIdentity) -> Option<&AccessRequirement> {
        self.methods.get(method).and_then(|m| m.access.as_ref())
    }

    /// Redaction plan for `method`; `None` when there is nothing to strip
    pub fn redaction(&self, method: &MethodIdentity) -> Option<&MethodRedaction> {
        self.redactions.get(method)
    }

    pub fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
