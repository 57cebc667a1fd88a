use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::EventError;

/// Storage metadata key and message attribute name carrying the correlation id.
pub const CORRELATION_ID_KEY: &str = "correlation-id";
pub const DEFAULT_MESSAGE_GROUP_ID: &str = "otel";
pub const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Create,
    Check,
    Update,
    Delete,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Check => "check",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Name of the span event recorded once per observed operation.
    pub fn span_event_name(self) -> &'static str {
        match self {
            Self::Create => "LambdaCreateEvent",
            Self::Check => "LambdaCheckEvent",
            Self::Update => "LambdaUpdateEvent",
            Self::Delete => "LambdaDeleteEvent",
        }
    }

    pub fn failure_description(self) -> &'static str {
        match self {
            Self::Create => "Create Lambda is failed.",
            Self::Check => "Check Lambda is failed.",
            Self::Update => "Update Lambda is failed.",
            Self::Delete => "Delete Lambda is failed.",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn mint() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body of the queue message handed from update to check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectNotification {
    pub bucket: String,
    pub key: String,
}

impl From<&ObjectLocation> for ObjectNotification {
    fn from(location: &ObjectLocation) -> Self {
        Self {
            bucket: location.bucket.clone(),
            key: location.key.clone(),
        }
    }
}

/// One decoded SQS record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub message_id: String,
    pub location: ObjectLocation,
    pub correlation_id: Option<CorrelationId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiGatewayResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: Value,
    pub body: String,
}

impl ApiGatewayResponse {
    pub fn json(status_code: u16, body: String) -> Self {
        Self {
            status_code,
            headers: json!({"Content-Type": JSON_CONTENT_TYPE}),
            body,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SqsBatchResponse {
    #[serde(rename = "batchItemFailures")]
    pub batch_item_failures: Vec<BatchItemFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchItemFailure {
    #[serde(rename = "itemIdentifier")]
    pub item_identifier: String,
}

/// One record of an S3 object-created notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Record {
    pub location: ObjectLocation,
    /// `eventTime` as sent by S3, when present.
    pub event_time: Option<String>,
}

/// Extracts `(bucket, key)` from every record of an S3 notification.
pub fn parse_s3_event(event: &Value) -> Result<Vec<ObjectLocation>, EventError> {
    Ok(parse_s3_records(event)?
        .into_iter()
        .map(|record| record.location)
        .collect())
}

pub fn parse_s3_records(event: &Value) -> Result<Vec<S3Record>, EventError> {
    let records = records(event)?;

    let mut parsed = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let bucket = record
            .pointer("/s3/bucket/name")
            .and_then(Value::as_str)
            .ok_or(EventError::MissingField {
                index,
                field: "s3.bucket.name",
            })?;
        let key = record
            .pointer("/s3/object/key")
            .and_then(Value::as_str)
            .ok_or(EventError::MissingField {
                index,
                field: "s3.object.key",
            })?;
        parsed.push(S3Record {
            location: ObjectLocation::new(bucket, key),
            event_time: record
                .get("eventTime")
                .and_then(Value::as_str)
                .map(str::to_string),
        });
    }

    Ok(parsed)
}

/// Decodes every record of an SQS event into an [`InboundMessage`].
pub fn parse_sqs_event(event: &Value) -> Result<Vec<InboundMessage>, EventError> {
    let records = records(event)?;

    let mut messages = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let message_id = record
            .get("messageId")
            .and_then(Value::as_str)
            .ok_or(EventError::MissingField {
                index,
                field: "messageId",
            })?;
        let body = record
            .get("body")
            .and_then(Value::as_str)
            .ok_or(EventError::MissingField {
                index,
                field: "body",
            })?;
        let notification: ObjectNotification = serde_json::from_str(body)
            .map_err(|source| EventError::MalformedBody { index, source })?;
        let correlation_id = record
            .get("messageAttributes")
            .and_then(|attributes| attributes.get(CORRELATION_ID_KEY))
            .and_then(|attribute| attribute.get("stringValue"))
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
            .map(CorrelationId::from);

        messages.push(InboundMessage {
            message_id: message_id.to_string(),
            location: ObjectLocation::new(notification.bucket, notification.key),
            correlation_id,
        });
    }

    Ok(messages)
}

fn records(event: &Value) -> Result<&Vec<Value>, EventError> {
    event
        .get("Records")
        .and_then(Value::as_array)
        .ok_or(EventError::MissingRecords)
}
