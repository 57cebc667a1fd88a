use std::collections::BTreeMap;

use object_pipeline_core::contract::{
    parse_s3_records, CorrelationId, ObjectLocation, ObjectNotification, Stage, CORRELATION_ID_KEY,
};
use object_pipeline_core::envelope::{Envelope, ObservationContext, Observer};
use object_pipeline_core::error::{EventError, FailureCause, OperationError};
use object_pipeline_core::fault::{apply_fault, FaultInjector, FaultTarget};
use object_pipeline_core::object::CustomObject;
use serde_json::Value;

use crate::adapters::object_store::ObjectStore;
use crate::adapters::queue::{MessageQueue, OutboundMessage};
use crate::handlers::{correlation_id_from_metadata, with_correlation_id};
use crate::observability::record_s3_trigger;

pub const UPDATE_OPERATION: &str = "Updating custom object";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateHandlerConfig {
    pub output_bucket: String,
    pub message_group_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatedObject {
    pub source: ObjectLocation,
    pub destination: ObjectLocation,
    pub correlation_id: CorrelationId,
    pub message_id: String,
}

#[derive(Debug, Default)]
pub struct UpdateSummary {
    pub updated: Vec<UpdatedObject>,
    pub failures: Vec<OperationError>,
}

/// Updates every object named by an S3 object-created notification.
pub fn handle_update_event(
    event: &Value,
    config: &UpdateHandlerConfig,
    request_id: &str,
    store: &dyn ObjectStore,
    queue: &dyn MessageQueue,
    injector: &mut dyn FaultInjector,
    observer: &dyn Observer,
) -> Result<UpdateSummary, EventError> {
    let records = parse_s3_records(event)?;
    let envelope = Envelope::new(Stage::Update, observer);

    let mut summary = UpdateSummary::default();
    for record in &records {
        let location = &record.location;
        record_s3_trigger(location, record.event_time.as_deref());
        let context = ObservationContext::new(request_id);
        match update_object(location, config, &envelope, &context, store, queue, injector) {
            Ok(updated) => summary.updated.push(updated),
            Err(error) => summary.failures.push(error),
        }
    }
    Ok(summary)
}

/// Sets `isUpdated`, writes the object to the output bucket, and notifies the
/// next stage.
///
/// A failed enqueue leaves the output object written; nothing is rolled back.
pub fn update_object(
    source: &ObjectLocation,
    config: &UpdateHandlerConfig,
    envelope: &Envelope<'_>,
    context: &ObservationContext,
    store: &dyn ObjectStore,
    queue: &dyn MessageQueue,
    injector: &mut dyn FaultInjector,
) -> Result<UpdatedObject, OperationError> {
    context.set_location(source);

    envelope.run(UPDATE_OPERATION, context, || {
        tracing::debug!(location = %source, "Getting custom object from the input S3...");
        let stored = store.get_object(source).map_err(FailureCause::Read)?;

        let correlation_id = correlation_id_from_metadata(&stored.metadata).unwrap_or_else(|| {
            let minted = CorrelationId::mint();
            tracing::debug!(correlation.id = %minted, "input object carries no correlation id");
            minted
        });
        context.set_correlation_id(&correlation_id);

        let mut object = CustomObject::from_slice(&stored.body).map_err(FailureCause::Decode)?;
        object.mark_updated();
        let body = object.to_vec().map_err(FailureCause::Encode)?;

        let intended = ObjectLocation::new(config.output_bucket.clone(), source.key.clone());
        let destination = apply_fault(&intended, FaultTarget::for_stage(Stage::Update), injector);
        context.set_location(&destination);

        let metadata = with_correlation_id(stored.metadata, &correlation_id);
        store
            .put_object(&destination, &body, &metadata)
            .map_err(FailureCause::Write)?;

        tracing::debug!(location = %intended, "Sending S3 info of the updated custom object to SQS...");
        let message = notification_message(&intended, &correlation_id, config)?;
        let message_id = queue
            .send_message(&message)
            .map_err(FailureCause::Enqueue)?;
        tracing::debug!(
            messaging.message_id = %message_id,
            "Sending S3 info of the updated custom object to SQS is succeeded."
        );

        Ok(UpdatedObject {
            source: source.clone(),
            destination,
            correlation_id,
            message_id,
        })
    })
}

fn notification_message(
    location: &ObjectLocation,
    correlation_id: &CorrelationId,
    config: &UpdateHandlerConfig,
) -> Result<OutboundMessage, FailureCause> {
    let body = serde_json::to_string(&ObjectNotification::from(location))
        .map_err(FailureCause::Encode)?;
    Ok(OutboundMessage {
        body,
        group_id: config.message_group_id.clone(),
        attributes: BTreeMap::from([(
            CORRELATION_ID_KEY.to_string(),
            correlation_id.as_str().to_string(),
        )]),
    })
}
