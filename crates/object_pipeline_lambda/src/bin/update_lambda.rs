use lambda_runtime::{service_fn, Error, LambdaEvent};
use object_pipeline_core::contract::Stage;
use object_pipeline_lambda::adapters::s3::S3ObjectStore;
use object_pipeline_lambda::adapters::sqs::SqsMessageQueue;
use object_pipeline_lambda::config::{
    process_env, queue_url, service_name, update_config, FaultConfig,
};
use object_pipeline_lambda::handlers::update::{handle_update_event, UpdateHandlerConfig};
use object_pipeline_lambda::observability::{init_subscriber, invocation_span, TracingObserver};
use serde_json::{json, Value};

struct RuntimeDependencies {
    config: UpdateHandlerConfig,
    fault: FaultConfig,
    service_name: String,
    store: S3ObjectStore,
    queue: SqsMessageQueue,
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: &RuntimeDependencies,
) -> Result<Value, Error> {
    let request_id = event.context.request_id;
    let span = invocation_span(Stage::Update, &deps.service_name, &request_id);

    let summary = span.in_scope(|| {
        let mut injector = deps.fault.injector();
        handle_update_event(
            &event.payload,
            &deps.config,
            &request_id,
            &deps.store,
            &deps.queue,
            &mut injector,
            &TracingObserver,
        )
    })?;

    // Any failed record fails the invocation so the platform can redeliver the event.
    if let Some(first) = summary.failures.first() {
        return Err(Error::from(format!(
            "{} of {} records failed: {first}",
            summary.failures.len(),
            summary.failures.len() + summary.updated.len()
        )));
    }

    Ok(json!({ "status": "ok", "updated": summary.updated.len() }))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_subscriber();

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let deps = RuntimeDependencies {
        config: update_config(&process_env)?,
        fault: FaultConfig::from_lookup(Stage::Update, &process_env)?,
        service_name: service_name(Stage::Update, &process_env),
        store: S3ObjectStore::new(aws_sdk_s3::Client::new(&aws_config)),
        queue: SqsMessageQueue::new(
            aws_sdk_sqs::Client::new(&aws_config),
            queue_url(&process_env)?,
        ),
    };

    lambda_runtime::run(service_fn(|event| handle_request(event, &deps))).await
}
