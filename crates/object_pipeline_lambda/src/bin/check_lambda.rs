use lambda_runtime::{service_fn, Error, LambdaEvent};
use object_pipeline_core::contract::{SqsBatchResponse, Stage};
use object_pipeline_lambda::adapters::s3::S3ObjectStore;
use object_pipeline_lambda::config::{process_env, service_name, FaultConfig};
use object_pipeline_lambda::handlers::check::handle_check_event;
use object_pipeline_lambda::observability::{init_subscriber, invocation_span, TracingObserver};
use serde_json::Value;

struct RuntimeDependencies {
    fault: FaultConfig,
    service_name: String,
    store: S3ObjectStore,
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: &RuntimeDependencies,
) -> Result<SqsBatchResponse, Error> {
    let request_id = event.context.request_id;
    let span = invocation_span(Stage::Check, &deps.service_name, &request_id);

    let summary = span.in_scope(|| {
        let mut injector = deps.fault.injector();
        handle_check_event(
            &event.payload,
            &request_id,
            &deps.store,
            &mut injector,
            &TracingObserver,
        )
    })?;

    Ok(summary.batch_response())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_subscriber();

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let deps = RuntimeDependencies {
        fault: FaultConfig::from_lookup(Stage::Check, &process_env)?,
        service_name: service_name(Stage::Check, &process_env),
        store: S3ObjectStore::new(aws_sdk_s3::Client::new(&aws_config)),
    };

    lambda_runtime::run(service_fn(|event| handle_request(event, &deps))).await
}
