//! Sensitive field removal
//!
//! [`Redactor::compile`] walks the message descriptors once and keeps a plan
//! only for message types that have a sensitive field somewhere below them.
//! Applying a plan is then a walk over exactly those subtrees of the JSON
//! payload; everything else is left untouched and in its original order.
//!
//! Recursive message types are fine: plans refer to nested types by name,
//! and the walk is bounded by the depth of the payload itself.

use crate::descriptor::MessageDescriptor;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
struct MessagePlan {
    /// Sensitive fields, removed outright
    remove: HashSet<String>,

    /// Non-sensitive fields whose message type needs redaction: field -> type
    nested: Vec<(String, String)>,
}

/// Compiled redaction plans, keyed by message name
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    plans: Arc<HashMap<String, MessagePlan>>,
}

impl Redactor {
    /// Build plans from already validated descriptors
    pub(crate) fn compile(messages: &[MessageDescriptor]) -> Self {
        let mut dirty: HashSet<&str> = messages
            .iter()
            .filter(|m| m.fields.iter().any(|f| f.sensitive))
            .map(|m| m.name.as_str())
            .collect();

        // Propagate upwards until no parent changes
        loop {
            let before = dirty.len();
            for message in messages {
                if dirty.contains(message.name.as_str()) {
                    continue;
                }
                let reaches_dirty = message.fields.iter().any(|f| {
                    !f.sensitive
                        && f.message
                            .as_deref()
                            .is_some_and(|target| dirty.contains(target))
                });
                if reaches_dirty {
                    dirty.insert(message.name.as_str());
                }
            }
            if dirty.len() == before {
                break;
            }
        }

        let plans = messages
            .iter()
            .filter(|m| dirty.contains(m.name.as_str()))
            .map(|message| {
                let mut plan = MessagePlan::default();
                for field in &message.fields {
                    if field.sensitive {
                        plan.remove.insert(field.name.clone());
                    } else if let Some(target) = field.message.as_deref().filter(|t| dirty.contains(t)) {
                        plan.nested.push((field.name.clone(), target.to_string()));
                    }
                }
                (message.name.clone(), plan)
            })
            .collect();

        Self {
            plans: Arc::new(plans),
        }
    }

    /// Whether values of `message` can contain anything to remove
    pub fn needs_redaction(&self, message: &str) -> bool {
        self.plans.contains_key(message)
    }

    /// Remove every sensitive field of `message` from `value`, in place
    ///
    /// Values that are not JSON objects are left as they are.
    pub fn redact(&self, message: &str, value: &mut Value) {
        let Some(plan) = self.plans.get(message) else {
            return;
        };
        let Value::Object(map) = value else {
            return;
        };

        if !plan.remove.is_empty() {
            map.retain(|key, _| !plan.remove.contains(key));
        }

        for (field, target) in &plan.nested {
            match map.get_mut(field) {
                Some(Value::Array(items)) => {
                    for item in items {
                        self.redact(target, item);
                    }
                }
                Some(nested) => self.redact(target, nested),
                None => {}
            }
        }
    }

    /// Owned variant of [`redact`](Self::redact)
    pub fn redacted(&self, message: &str, mut value: Value) -> Value {
        self.redact(message, &mut value);
        value
    }
}
