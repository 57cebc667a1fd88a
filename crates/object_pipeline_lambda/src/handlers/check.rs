use object_pipeline_core::contract::{
    parse_sqs_event, BatchItemFailure, CorrelationId, InboundMessage, ObjectLocation,
    SqsBatchResponse, Stage,
};
use object_pipeline_core::envelope::{Envelope, ObservationContext, Observer};
use object_pipeline_core::error::{EventError, FailureCause, OperationError};
use object_pipeline_core::fault::{apply_fault, FaultInjector, FaultTarget};
use object_pipeline_core::object::CustomObject;
use serde_json::Value;

use crate::adapters::object_store::ObjectStore;
use crate::handlers::{correlation_id_from_metadata, with_correlation_id};
use crate::observability::record_sqs_trigger;

pub const CHECK_OPERATION: &str = "Checking custom object";

#[derive(Debug)]
pub struct FailedMessage {
    pub message_id: String,
    pub error: OperationError,
}

#[derive(Debug, Default)]
pub struct CheckSummary {
    pub checked: Vec<ObjectLocation>,
    pub failures: Vec<FailedMessage>,
}

impl CheckSummary {
    /// Partial batch response so only failed messages are redelivered.
    pub fn batch_response(&self) -> SqsBatchResponse {
        SqsBatchResponse {
            batch_item_failures: self
                .failures
                .iter()
                .map(|failure| BatchItemFailure {
                    item_identifier: failure.message_id.clone(),
                })
                .collect(),
        }
    }
}

/// Checks every object referenced by an SQS event.
///
/// A malformed event fails as a whole before any object is touched; a failed
/// record does not stop the remaining records.
pub fn handle_check_event(
    event: &Value,
    request_id: &str,
    store: &dyn ObjectStore,
    injector: &mut dyn FaultInjector,
    observer: &dyn Observer,
) -> Result<CheckSummary, EventError> {
    let messages = parse_sqs_event(event)?;
    let envelope = Envelope::new(Stage::Check, observer);

    let mut summary = CheckSummary::default();
    for message in &messages {
        record_sqs_trigger(&message.message_id);
        let context = ObservationContext::new(request_id);
        match check_object(message, &envelope, &context, store, injector) {
            Ok(location) => summary.checked.push(location),
            Err(error) => summary.failures.push(FailedMessage {
                message_id: message.message_id.clone(),
                error,
            }),
        }
    }
    Ok(summary)
}

/// Sets `isChecked` on the referenced object and writes it back.
///
/// Returns the location actually written, which differs from the message's
/// location when the fault injector substituted the key.
pub fn check_object(
    message: &InboundMessage,
    envelope: &Envelope<'_>,
    context: &ObservationContext,
    store: &dyn ObjectStore,
    injector: &mut dyn FaultInjector,
) -> Result<ObjectLocation, OperationError> {
    context.set_location(&message.location);
    if let Some(correlation_id) = &message.correlation_id {
        context.set_correlation_id(correlation_id);
    }

    envelope.run(CHECK_OPERATION, context, || {
        tracing::debug!(location = %message.location, "Getting custom object from the S3...");
        let stored = store
            .get_object(&message.location)
            .map_err(FailureCause::Read)?;

        let correlation_id = message
            .correlation_id
            .clone()
            .or_else(|| correlation_id_from_metadata(&stored.metadata))
            .unwrap_or_else(CorrelationId::mint);
        context.set_correlation_id(&correlation_id);

        let mut object = CustomObject::from_slice(&stored.body).map_err(FailureCause::Decode)?;
        object.mark_checked();
        let body = object.to_vec().map_err(FailureCause::Encode)?;

        let target = apply_fault(
            &message.location,
            FaultTarget::for_stage(Stage::Check),
            injector,
        );
        context.set_location(&target);

        let metadata = with_correlation_id(stored.metadata, &correlation_id);
        store
            .put_object(&target, &body, &metadata)
            .map_err(FailureCause::Write)?;
        Ok(target)
    })
}
