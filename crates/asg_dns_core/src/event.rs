//! Lifecycle event extraction from Auto Scaling notifications.
//!
//! Notifications arrive either wrapped in an SNS envelope, as an EventBridge
//! event, or as the bare Auto Scaling message. All three are reduced to a
//! [`LifecycleEvent`]; kinds this system does not act on decode to `None`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const LAUNCH_EVENT: &str = "autoscaling:EC2_INSTANCE_LAUNCH";
pub const TERMINATE_EVENT: &str = "autoscaling:EC2_INSTANCE_TERMINATE";
pub const LAUNCHING_TRANSITION: &str = "autoscaling:EC2_INSTANCE_LAUNCHING";
pub const TERMINATING_TRANSITION: &str = "autoscaling:EC2_INSTANCE_TERMINATING";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleKind {
    Launch,
    Terminate,
}

impl LifecycleKind {
    pub fn from_event_name(name: &str) -> Option<Self> {
        match name {
            LAUNCH_EVENT | LAUNCHING_TRANSITION => Some(Self::Launch),
            TERMINATE_EVENT | TERMINATING_TRANSITION => Some(Self::Terminate),
            _ => None,
        }
    }

    fn from_detail_type(detail_type: &str) -> Option<Self> {
        match detail_type {
            "EC2 Instance Launch Successful" | "EC2 Instance-launch Lifecycle Action" => {
                Some(Self::Launch)
            }
            "EC2 Instance Terminate Successful" | "EC2 Instance-terminate Lifecycle Action" => {
                Some(Self::Terminate)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub group_name: String,
    pub instance_id: String,
    pub kind: LifecycleKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("notification payload must be a JSON object")]
    NotAnObject,

    #[error("SNS message is not a JSON object: {0}")]
    MalformedSnsMessage(String),

    #[error("{kind:?} notification is missing field '{field}'")]
    MissingField {
        kind: LifecycleKind,
        field: &'static str,
    },
}

/// Reduces a notification payload to the lifecycle event it describes.
///
/// Returns `Ok(None)` for notifications that carry no launch or terminate
/// (test notifications, failed launches, unrelated EventBridge events).
pub fn parse_notification(payload: &Value) -> Result<Option<LifecycleEvent>, EventError> {
    let Some(object) = payload.as_object() else {
        return Err(EventError::NotAnObject);
    };

    if let Some(records) = object.get("Records").and_then(Value::as_array) {
        let Some(message) = records
            .first()
            .and_then(|record| record.pointer("/Sns/Message"))
        else {
            return Ok(None);
        };
        let message = decode_sns_message(message)?;
        return parse_autoscaling_message(&message, None);
    }

    if let Some(detail_type) = object.get("detail-type").and_then(Value::as_str) {
        let Some(kind) = LifecycleKind::from_detail_type(detail_type) else {
            return Ok(None);
        };
        let detail = object.get("detail").unwrap_or(&Value::Null);
        return parse_autoscaling_message(detail, Some(kind));
    }

    parse_autoscaling_message(payload, None)
}

fn decode_sns_message(message: &Value) -> Result<Value, EventError> {
    match message {
        Value::Object(_) => Ok(message.clone()),
        Value::String(text) => {
            let decoded: Value = serde_json::from_str(text)
                .map_err(|error| EventError::MalformedSnsMessage(error.to_string()))?;
            if decoded.is_object() {
                Ok(decoded)
            } else {
                Err(EventError::MalformedSnsMessage(
                    "message body is not an object".to_string(),
                ))
            }
        }
        _ => Err(EventError::MalformedSnsMessage(
            "message must be a string or object".to_string(),
        )),
    }
}

fn parse_autoscaling_message(
    message: &Value,
    known_kind: Option<LifecycleKind>,
) -> Result<Option<LifecycleEvent>, EventError> {
    let kind = match known_kind {
        Some(kind) => kind,
        None => {
            let event_name = message
                .get("Event")
                .or_else(|| message.get("LifecycleTransition"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            match LifecycleKind::from_event_name(event_name) {
                Some(kind) => kind,
                None => return Ok(None),
            }
        }
    };

    Ok(Some(LifecycleEvent {
        group_name: required_field(message, "AutoScalingGroupName", kind)?,
        instance_id: required_field(message, "EC2InstanceId", kind)?,
        kind,
    }))
}

fn required_field(
    message: &Value,
    field: &'static str,
    kind: LifecycleKind,
) -> Result<String, EventError> {
    message
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(EventError::MissingField { kind, field })
}
