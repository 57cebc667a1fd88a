use chrono::Utc;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use object_pipeline_core::contract::{ApiGatewayResponse, Stage};
use object_pipeline_lambda::adapters::s3::S3ObjectStore;
use object_pipeline_lambda::config::{create_config, process_env, service_name, FaultConfig};
use object_pipeline_lambda::handlers::create::{handle_create, CreateHandlerConfig};
use object_pipeline_lambda::observability::{init_subscriber, invocation_span, TracingObserver};
use serde_json::Value;

struct RuntimeDependencies {
    config: CreateHandlerConfig,
    fault: FaultConfig,
    service_name: String,
    store: S3ObjectStore,
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: &RuntimeDependencies,
) -> Result<ApiGatewayResponse, Error> {
    let request_id = event.context.request_id;
    let span = invocation_span(Stage::Create, &deps.service_name, &request_id);

    let response = span.in_scope(|| {
        let mut injector = deps.fault.injector();
        handle_create(
            &deps.config,
            &request_id,
            Utc::now(),
            &deps.store,
            &mut injector,
            &TracingObserver,
        )
    });
    span.record("http.status_code", response.status_code);
    Ok(response)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_subscriber();

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let deps = RuntimeDependencies {
        config: create_config(&process_env)?,
        fault: FaultConfig::from_lookup(Stage::Create, &process_env)?,
        service_name: service_name(Stage::Create, &process_env),
        store: S3ObjectStore::new(aws_sdk_s3::Client::new(&aws_config)),
    };

    lambda_runtime::run(service_fn(|event| handle_request(event, &deps))).await
}
