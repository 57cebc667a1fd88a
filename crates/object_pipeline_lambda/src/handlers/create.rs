use chrono::{DateTime, Utc};
use object_pipeline_core::contract::{
    ApiGatewayResponse, CorrelationId, ObjectLocation, Stage,
};
use object_pipeline_core::envelope::{Envelope, ObservationContext, Observer};
use object_pipeline_core::error::{FailureCause, OperationError};
use object_pipeline_core::fault::{apply_fault, FaultInjector, FaultTarget};
use object_pipeline_core::object::CustomObject;
use object_pipeline_core::storage_keys::KeyStrategy;
use serde_json::json;

use crate::adapters::object_store::{ObjectMetadata, ObjectStore};
use crate::handlers::with_correlation_id;

pub const CREATE_OPERATION: &str = "Storing custom object into S3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateHandlerConfig {
    pub bucket: String,
    pub key_strategy: KeyStrategy,
    pub failure_status_code: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedObject {
    pub location: ObjectLocation,
    pub correlation_id: CorrelationId,
    pub object: CustomObject,
}

/// Creates one object and renders the API Gateway response for it.
pub fn handle_create(
    config: &CreateHandlerConfig,
    request_id: &str,
    now: DateTime<Utc>,
    store: &dyn ObjectStore,
    injector: &mut dyn FaultInjector,
    observer: &dyn Observer,
) -> ApiGatewayResponse {
    let envelope = Envelope::new(Stage::Create, observer);
    let context = ObservationContext::new(request_id);

    match create_object(config, now, &envelope, &context, store, injector) {
        Ok(created) => match created.object.to_json_string() {
            Ok(body) => ApiGatewayResponse::json(200, body),
            Err(error) => failure_response(config, CREATE_OPERATION, &error.to_string()),
        },
        Err(error) => failure_response(config, error.operation(), &error.to_string()),
    }
}

pub fn create_object(
    config: &CreateHandlerConfig,
    now: DateTime<Utc>,
    envelope: &Envelope<'_>,
    context: &ObservationContext,
    store: &dyn ObjectStore,
    injector: &mut dyn FaultInjector,
) -> Result<CreatedObject, OperationError> {
    let correlation_id = CorrelationId::mint();
    context.set_correlation_id(&correlation_id);

    envelope.run(CREATE_OPERATION, context, || {
        let object = CustomObject::initial();
        let intended = ObjectLocation::new(config.bucket.clone(), config.key_strategy.generate(now));
        let location = apply_fault(&intended, FaultTarget::for_stage(Stage::Create), injector);
        context.set_location(&location);

        tracing::debug!(
            correlation.id = %correlation_id,
            bucket.name = %location.bucket,
            key.name = %location.key,
            "Storing custom object into S3..."
        );

        let body = object.to_vec().map_err(FailureCause::Encode)?;
        let metadata = with_correlation_id(ObjectMetadata::new(), &correlation_id);
        store
            .put_object(&location, &body, &metadata)
            .map_err(FailureCause::Write)?;

        Ok(CreatedObject {
            location,
            correlation_id: correlation_id.clone(),
            object,
        })
    })
}

fn failure_response(
    config: &CreateHandlerConfig,
    operation: &str,
    message: &str,
) -> ApiGatewayResponse {
    ApiGatewayResponse::json(
        config.failure_status_code,
        json!({
            "error": "create_failed",
            "operation": operation,
            "message": message,
        })
        .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use object_pipeline_core::contract::CORRELATION_ID_KEY;
    use object_pipeline_core::envelope::RecordingObserver;
    use object_pipeline_core::error::AdapterErrorKind;
    use object_pipeline_core::fault::{NeverFail, ScriptedFaultInjector, WRONG_BUCKET_NAME};
    use object_pipeline_core::object::{IS_CHECKED_FIELD, IS_UPDATED_FIELD};
    use serde_json::Value;

    use super::*;
    use crate::adapters::memory::InMemoryObjectStore;

    fn sample_config() -> CreateHandlerConfig {
        CreateHandlerConfig {
            bucket: "input".to_string(),
            key_strategy: KeyStrategy::Uuid,
            failure_status_code: 500,
        }
    }

    #[test]
    fn stores_initial_object_with_correlation_metadata() {
        let store = InMemoryObjectStore::with_buckets(["input"]);
        let observer = RecordingObserver::new();

        let response = handle_create(
            &sample_config(),
            "req-1",
            Utc::now(),
            &store,
            &mut NeverFail,
            &observer,
        );

        assert_eq!(response.status_code, 200);
        let body: Value = serde_json::from_str(&response.body).expect("body should be JSON");
        assert_eq!(body[IS_CHECKED_FIELD], Value::Bool(false));
        assert_eq!(body[IS_UPDATED_FIELD], Value::Bool(false));

        let keys = store.keys("input");
        assert_eq!(keys.len(), 1);
        let stored = store
            .object(&ObjectLocation::new("input", keys[0].clone()))
            .expect("object should be stored");
        let stored_object = CustomObject::from_slice(&stored.body).expect("stored JSON");
        assert_eq!(stored_object, CustomObject::initial());

        let spans = observer.span_events();
        assert_eq!(spans.len(), 1);
        assert!(spans[0].successful);
        assert_eq!(
            spans[0].attributes.correlation_id.as_ref().map(|id| id.as_str()),
            stored.metadata.get(CORRELATION_ID_KEY).map(String::as_str)
        );
    }

    #[test]
    fn never_reuses_a_key_across_invocations() {
        let store = InMemoryObjectStore::with_buckets(["input"]);
        let observer = RecordingObserver::new();
        let now = Utc::now();

        for index in 0..20 {
            handle_create(
                &sample_config(),
                &format!("req-{index}"),
                now,
                &store,
                &mut NeverFail,
                &observer,
            );
        }

        assert_eq!(store.keys("input").len(), 20);
    }

    #[test]
    fn injected_fault_returns_failure_status() {
        let store = InMemoryObjectStore::with_buckets(["input"]);
        let observer = RecordingObserver::new();
        let mut injector = ScriptedFaultInjector::new([true]);

        let response = handle_create(
            &sample_config(),
            "req-2",
            Utc::now(),
            &store,
            &mut injector,
            &observer,
        );

        assert_eq!(response.status_code, 500);
        assert!(response.body.contains("Storing custom object into S3 is failed"));
        assert!(store.keys("input").is_empty());

        let logs = observer.logs();
        assert_eq!(logs.len(), 1);
        assert!(!logs[0].successful);
        assert_eq!(logs[0].attributes.bucket.as_deref(), Some(WRONG_BUCKET_NAME));
    }

    #[test]
    fn failure_keeps_adapter_error_kind() {
        let store = InMemoryObjectStore::with_buckets(["input"]);
        let observer = RecordingObserver::new();
        let envelope = Envelope::new(Stage::Create, &observer);
        let context = ObservationContext::new("req-3");
        let mut injector = ScriptedFaultInjector::new([true]);

        let error = create_object(
            &sample_config(),
            Utc::now(),
            &envelope,
            &context,
            &store,
            &mut injector,
        )
        .expect_err("write to substituted bucket should fail");

        let adapter_error = error
            .cause()
            .adapter_error()
            .expect("write failure should carry adapter error");
        assert!(matches!(error.cause(), FailureCause::Write(_)));
        assert_eq!(adapter_error.kind(), AdapterErrorKind::NotFound);
    }

    #[test]
    fn failure_status_is_configurable() {
        let store = InMemoryObjectStore::with_buckets(["input"]);
        let observer = RecordingObserver::new();
        let config = CreateHandlerConfig {
            failure_status_code: 200,
            ..sample_config()
        };

        let response = handle_create(
            &config,
            "req-4",
            Utc::now(),
            &store,
            &mut ScriptedFaultInjector::new([true]),
            &observer,
        );

        assert_eq!(response.status_code, 200);
        assert!(response.body.contains("create_failed"));
    }
}
