use std::collections::HashMap;

use aws_sdk_sqs::types::MessageAttributeValue;
use object_pipeline_core::error::AdapterError;
use tracing::Instrument;

use crate::adapters::queue::{MessageQueue, OutboundMessage};
use crate::adapters::{block_on, classify};
use crate::observability::{record_client_outcome, sqs_send_span};

#[derive(Debug, Clone)]
pub struct SqsMessageQueue {
    client: aws_sdk_sqs::Client,
    queue_url: String,
}

impl SqsMessageQueue {
    pub fn new(client: aws_sdk_sqs::Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }
}

impl MessageQueue for SqsMessageQueue {
    fn send_message(&self, message: &OutboundMessage) -> Result<String, AdapterError> {
        let attributes = message
            .attributes
            .iter()
            .map(|(name, value)| {
                MessageAttributeValue::builder()
                    .data_type("String")
                    .string_value(value.clone())
                    .build()
                    .map(|attribute| (name.clone(), attribute))
            })
            .collect::<Result<HashMap<_, _>, _>>()
            .map_err(|error| AdapterError::other(format!("invalid message attribute: {error}")))?;

        let client = self.client.clone();
        let queue_url = self.queue_url.clone();
        let body = message.body.clone();
        let group_id = message.group_id.clone();
        let span = sqs_send_span(&queue_url);

        let request = async move {
            let output = client
                .send_message()
                .queue_url(queue_url)
                .message_body(body)
                .set_message_group_id(group_id)
                .set_message_attributes((!attributes.is_empty()).then_some(attributes))
                .send()
                .await
                .map_err(|error| classify("enqueue message to sqs", error))?;

            Ok::<_, AdapterError>(output.message_id().unwrap_or_default().to_string())
        };

        let result = block_on(request.instrument(span.clone()));
        if let Ok(message_id) = &result {
            span.record("messaging.message_id", message_id.as_str());
        }
        record_client_outcome(&span, &result);
        result
    }
}
