use chrono::{TimeZone, Utc};
use object_pipeline_core::contract::{ObjectLocation, Stage, CORRELATION_ID_KEY};
use object_pipeline_core::envelope::RecordingObserver;
use object_pipeline_core::fault::{NeverFail, ScriptedFaultInjector};
use object_pipeline_core::object::{CustomObject, DEFAULT_ITEM, IS_CHECKED_FIELD, IS_UPDATED_FIELD};
use object_pipeline_core::storage_keys::KeyStrategy;
use object_pipeline_lambda::adapters::memory::{InMemoryObjectStore, RecordingQueue};
use object_pipeline_lambda::adapters::queue::OutboundMessage;
use object_pipeline_lambda::handlers::check::handle_check_event;
use object_pipeline_lambda::handlers::create::{handle_create, CreateHandlerConfig};
use object_pipeline_lambda::handlers::delete::{handle_delete, DeleteHandlerConfig};
use object_pipeline_lambda::handlers::update::{handle_update_event, UpdateHandlerConfig};
use serde_json::{json, Value};

const INPUT: &str = "pipeline-input";
const OUTPUT: &str = "pipeline-output";

fn create_config() -> CreateHandlerConfig {
    CreateHandlerConfig {
        bucket: INPUT.to_string(),
        key_strategy: KeyStrategy::Uuid,
        failure_status_code: 500,
    }
}

fn update_config() -> UpdateHandlerConfig {
    UpdateHandlerConfig {
        output_bucket: OUTPUT.to_string(),
        message_group_id: Some("otel".to_string()),
    }
}

fn s3_event(location: &ObjectLocation) -> Value {
    json!({
        "Records": [{
            "eventSource": "aws:s3",
            "eventName": "ObjectCreated:Put",
            "s3": {
                "bucket": { "name": location.bucket },
                "object": { "key": location.key },
            },
        }]
    })
}

fn sqs_event(messages: &[OutboundMessage], forward_attributes: bool) -> Value {
    let records: Vec<Value> = messages
        .iter()
        .enumerate()
        .map(|(index, message)| {
            let attributes: serde_json::Map<String, Value> = if forward_attributes {
                message
                    .attributes
                    .iter()
                    .map(|(name, value)| {
                        (
                            name.clone(),
                            json!({ "stringValue": value, "dataType": "String" }),
                        )
                    })
                    .collect()
            } else {
                serde_json::Map::new()
            };
            json!({
                "messageId": format!("sqs-{index}"),
                "eventSource": "aws:sqs",
                "body": message.body,
                "messageAttributes": attributes,
            })
        })
        .collect();
    json!({ "Records": records })
}

fn created_location(store: &InMemoryObjectStore) -> ObjectLocation {
    let keys = store.keys(INPUT);
    assert_eq!(keys.len(), 1, "create should write exactly one object");
    ObjectLocation::new(INPUT, keys[0].clone())
}

#[test]
fn object_flows_through_create_update_and_check() {
    let store = InMemoryObjectStore::with_buckets([INPUT, OUTPUT]);
    let queue = RecordingQueue::new();
    let observer = RecordingObserver::new();
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().expect("valid time");

    let response = handle_create(
        &create_config(),
        "req-create",
        now,
        &store,
        &mut NeverFail,
        &observer,
    );
    assert_eq!(response.status_code, 200);

    let input = created_location(&store);
    let created = store.object(&input).expect("created object");
    let correlation_id = created
        .metadata
        .get(CORRELATION_ID_KEY)
        .cloned()
        .expect("create stamps a correlation id");

    let updated = handle_update_event(
        &s3_event(&input),
        &update_config(),
        "req-update",
        &store,
        &queue,
        &mut NeverFail,
        &observer,
    )
    .expect("well-formed S3 event");
    assert!(updated.failures.is_empty());
    assert_eq!(updated.updated.len(), 1);

    let messages = queue.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].group_id.as_deref(), Some("otel"));
    assert_eq!(
        messages[0].attributes.get(CORRELATION_ID_KEY),
        Some(&correlation_id)
    );

    let checked = handle_check_event(
        &sqs_event(&messages, true),
        "req-check",
        &store,
        &mut NeverFail,
        &observer,
    )
    .expect("well-formed SQS event");
    assert!(checked.failures.is_empty());
    assert!(checked.batch_response().batch_item_failures.is_empty());

    let output = ObjectLocation::new(OUTPUT, input.key.clone());
    let stored = store.object(&output).expect("output object");
    let object = CustomObject::from_slice(&stored.body).expect("valid JSON");
    assert_eq!(object.get("item"), Some(&json!(DEFAULT_ITEM)));
    assert_eq!(object.flag(IS_UPDATED_FIELD), Some(true));
    assert_eq!(object.flag(IS_CHECKED_FIELD), Some(true));
    assert_eq!(stored.metadata.get(CORRELATION_ID_KEY), Some(&correlation_id));

    let original = CustomObject::from_slice(&created.body).expect("valid JSON");
    assert_eq!(original.flag(IS_UPDATED_FIELD), Some(false));
    assert_eq!(original.flag(IS_CHECKED_FIELD), Some(false));

    let logs = observer.logs();
    let stages: Vec<Stage> = logs.iter().map(|record| record.stage).collect();
    assert_eq!(stages, vec![Stage::Create, Stage::Update, Stage::Check]);
    assert!(logs.iter().all(|record| record.successful));
    assert!(logs.iter().all(|record| {
        record.attributes.correlation_id.as_ref().map(|id| id.as_str())
            == Some(correlation_id.as_str())
    }));
    assert_eq!(observer.span_events().len(), 3);
}

#[test]
fn check_recovers_correlation_id_from_metadata_when_attribute_is_missing() {
    let store = InMemoryObjectStore::with_buckets([INPUT, OUTPUT]);
    let queue = RecordingQueue::new();
    let observer = RecordingObserver::new();

    handle_create(
        &create_config(),
        "req-create",
        Utc::now(),
        &store,
        &mut NeverFail,
        &observer,
    );
    let input = created_location(&store);
    handle_update_event(
        &s3_event(&input),
        &update_config(),
        "req-update",
        &store,
        &queue,
        &mut NeverFail,
        &observer,
    )
    .expect("well-formed S3 event");

    let expected = queue.messages()[0].attributes[CORRELATION_ID_KEY].clone();
    handle_check_event(
        &sqs_event(&queue.messages(), false),
        "req-check",
        &store,
        &mut NeverFail,
        &observer,
    )
    .expect("well-formed SQS event");

    let check_log = observer
        .logs()
        .into_iter()
        .find(|record| record.stage == Stage::Check)
        .expect("check log");
    assert_eq!(
        check_log.attributes.correlation_id.map(|id| id.as_str().to_string()),
        Some(expected)
    );
}

#[test]
fn faulted_update_stops_the_pipeline_before_enqueue() {
    let store = InMemoryObjectStore::with_buckets([INPUT, OUTPUT]);
    let queue = RecordingQueue::new();
    let observer = RecordingObserver::new();

    handle_create(
        &create_config(),
        "req-create",
        Utc::now(),
        &store,
        &mut NeverFail,
        &observer,
    );
    let input = created_location(&store);

    let summary = handle_update_event(
        &s3_event(&input),
        &update_config(),
        "req-update",
        &store,
        &queue,
        &mut ScriptedFaultInjector::new([true]),
        &observer,
    )
    .expect("well-formed S3 event");

    assert!(summary.updated.is_empty());
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].to_string(), "Updating custom object is failed");
    assert!(queue.messages().is_empty());
    assert!(store.keys(OUTPUT).is_empty());

    let update_log = observer
        .logs()
        .into_iter()
        .find(|record| record.stage == Stage::Update)
        .expect("update log");
    assert!(!update_log.successful);
}

#[test]
fn delete_empties_both_buckets_after_a_full_run() {
    let store = InMemoryObjectStore::with_buckets([INPUT, OUTPUT]);
    let queue = RecordingQueue::new();
    let observer = RecordingObserver::new();

    for request in ["req-1", "req-2"] {
        handle_create(
            &create_config(),
            request,
            Utc::now(),
            &store,
            &mut NeverFail,
            &observer,
        );
    }
    for key in store.keys(INPUT) {
        handle_update_event(
            &s3_event(&ObjectLocation::new(INPUT, key)),
            &update_config(),
            "req-update",
            &store,
            &queue,
            &mut NeverFail,
            &observer,
        )
        .expect("well-formed S3 event");
    }
    assert_eq!(store.keys(OUTPUT).len(), 2);

    let summary = handle_delete(
        &DeleteHandlerConfig {
            buckets: vec![INPUT.to_string(), OUTPUT.to_string()],
        },
        "req-delete",
        &store,
        &mut NeverFail,
        &observer,
    )
    .expect("delete succeeds");

    assert_eq!(summary.total(), 4);
    assert!(store.keys(INPUT).is_empty());
    assert!(store.keys(OUTPUT).is_empty());
}
