//! The action protocol: what the model may ask for, and how its textual
//! reply becomes an [`ActionDescriptor`].

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{PilotError, PilotResult};

/// Which of the two mutually exclusive action vocabularies a run speaks.
/// Fixed for the whole run by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActionProtocol {
    /// `{action, text?, x?, y?}` with TYPE / CLICK / DONE.
    #[default]
    Coordinate,
    /// `{action, control?, value?}` with INVOKE / SET_VALUE / DONE.
    Accessibility,
}

/// Partial description of a control. Empty fields impose no constraint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ControlReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub control_type: Option<String>,
    #[serde(rename = "automationId", default, skip_serializing_if = "Option::is_none")]
    pub automation_id: Option<String>,
}

impl ControlReference {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

impl fmt::Display for ControlReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(n) = &self.name {
            parts.push(format!("name={n:?}"));
        }
        if let Some(t) = &self.control_type {
            parts.push(format!("type={t:?}"));
        }
        if let Some(id) = &self.automation_id {
            parts.push(format!("automationId={id:?}"));
        }
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// A single next action. Each variant carries only its own protocol's fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionDescriptor {
    Type { text: String },
    Click { x: i32, y: i32 },
    Invoke { control: ControlReference },
    SetValue { control: ControlReference, value: String },
    Done,
    /// Anything outside the active vocabulary; a no-op.
    Unknown { kind: String },
}

impl ActionDescriptor {
    pub fn is_done(&self) -> bool {
        matches!(self, ActionDescriptor::Done)
    }
}

impl fmt::Display for ActionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionDescriptor::Type { text } => write!(f, "TYPE {text:?}"),
            ActionDescriptor::Click { x, y } => write!(f, "CLICK ({x},{y})"),
            ActionDescriptor::Invoke { control } => write!(f, "INVOKE {control}"),
            ActionDescriptor::SetValue { control, value } => {
                write!(f, "SET_VALUE {control} = {value:?}")
            }
            ActionDescriptor::Done => f.write_str("DONE"),
            ActionDescriptor::Unknown { kind } => write!(f, "UNKNOWN {kind:?}"),
        }
    }
}

impl ActionProtocol {
    /// Parses one model reply. Replies that are not a JSON object with a
    /// string `action` are malformed; recognised JSON with an unsupported
    /// kind or missing fields becomes `Unknown`.
    pub fn parse(&self, reply: &str) -> PilotResult<ActionDescriptor> {
        let cleaned = strip_code_fence(reply);
        if cleaned.is_empty() {
            return Err(PilotError::malformed("empty reply", reply));
        }
        let value: Value = serde_json::from_str(cleaned)
            .map_err(|e| PilotError::malformed(format!("not valid JSON: {e}"), reply))?;
        let Some(obj) = value.as_object() else {
            return Err(PilotError::malformed("reply is not a JSON object", reply));
        };
        let Some(kind) = field(obj, "action").and_then(Value::as_str) else {
            return Err(PilotError::malformed("missing string `action` field", reply));
        };

        let upper = kind.trim().to_ascii_uppercase();
        let descriptor = match (self, upper.as_str()) {
            (_, "DONE") => Some(ActionDescriptor::Done),
            (ActionProtocol::Coordinate, "TYPE") => field(obj, "text")
                .and_then(Value::as_str)
                .map(|text| ActionDescriptor::Type { text: text.to_string() }),
            (ActionProtocol::Coordinate, "CLICK") => {
                match (field(obj, "x").and_then(as_coord), field(obj, "y").and_then(as_coord)) {
                    (Some(x), Some(y)) => Some(ActionDescriptor::Click { x, y }),
                    _ => None,
                }
            }
            (ActionProtocol::Accessibility, "INVOKE") => field(obj, "control")
                .and_then(control_reference)
                .map(|control| ActionDescriptor::Invoke { control }),
            (ActionProtocol::Accessibility, "SET_VALUE") => {
                let control = field(obj, "control").and_then(control_reference);
                let value = field(obj, "value").and_then(Value::as_str);
                match (control, value) {
                    (Some(control), Some(value)) => Some(ActionDescriptor::SetValue {
                        control,
                        value: value.to_string(),
                    }),
                    _ => None,
                }
            }
            _ => None,
        };

        Ok(descriptor.unwrap_or_else(|| {
            tracing::warn!(action = %kind, protocol = ?self, "unrecognised or incomplete action; treating as no-op");
            ActionDescriptor::Unknown { kind: kind.to_string() }
        }))
    }
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)^```[A-Za-z0-9_-]*\s*(.*?)\s*```$").expect("static regex")
    })
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    fence_regex()
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed)
}

/// Case-insensitive key lookup; the model is not consistent about casing.
fn field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).or_else(|| {
        obj.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

fn as_coord(v: &Value) -> Option<i32> {
    if let Some(i) = v.as_i64() {
        return i32::try_from(i).ok();
    }
    v.as_f64()
        .filter(|f| f.fract() == 0.0 && f.abs() <= i32::MAX as f64)
        .map(|f| f as i32)
}

fn control_reference(v: &Value) -> Option<ControlReference> {
    let obj = v.as_object()?;
    let text = |key: &str| field(obj, key).and_then(Value::as_str).map(str::to_string);
    Some(ControlReference {
        name: text("name"),
        control_type: text("type").or_else(|| text("controlType")),
        automation_id: text("automationId").or_else(|| text("automation_id")),
    })
}
