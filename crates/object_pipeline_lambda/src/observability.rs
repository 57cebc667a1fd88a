//! Tracing setup and the tracing-backed observer.
//!
//! Each invocation runs inside a `main.handler` span. [`TracingObserver`]
//! writes the envelope's log record as a JSON log line and its span
//! annotation as attributes on that span plus one event named after the stage
//! (`LambdaCheckEvent`, ...). Every S3 and SQS call made by the adapters
//! runs in its own client span (`S3.GetObject`, `SQS.SendMessage`, ...) nested
//! under the invocation span.

use object_pipeline_core::contract::{CorrelationId, ObjectLocation, Stage};
use object_pipeline_core::envelope::{Observation, Observer, Outcome};
use object_pipeline_core::error::AdapterError;
use tracing::field::{display, Empty};
use tracing::Span;
use tracing_subscriber::EnvFilter;

pub const SPAN_EVENT_TARGET: &str = "span_event";

/// Installs the JSON subscriber. Filter comes from `RUST_LOG`, default `info`.
pub fn init_subscriber() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(true)
        .with_span_list(false)
        .flatten_event(true)
        .with_target(true)
        .init();
}

pub fn invocation_span(stage: Stage, service_name: &str, request_id: &str) -> Span {
    let (trigger, kind) = match stage {
        Stage::Create | Stage::Delete => ("http", "server"),
        Stage::Check | Stage::Update => ("datasource", "consumer"),
    };
    let span = tracing::info_span!(
        "main.handler",
        stage = stage.as_str(),
        service.name = %service_name,
        faas.trigger = trigger,
        otel.kind = kind,
        aws.request.id = %request_id,
        correlation.id = Empty,
        otel.status_code = Empty,
        otel.status_description = Empty,
        exception.message = Empty,
        http.status_code = Empty,
        messaging.system = Empty,
        messaging.destination.kind = Empty,
        messaging.message_id = Empty,
        faas.document.operation = Empty,
        faas.document.collection = Empty,
        faas.document.name = Empty,
        faas.document.time = Empty,
    );
    match stage {
        Stage::Check => {
            span.record("messaging.system", "AmazonSQS");
            span.record("messaging.destination.kind", "queue");
        }
        Stage::Update => {
            span.record("faas.document.operation", "insert");
        }
        Stage::Create | Stage::Delete => {}
    }
    span
}

/// Puts the SQS record being processed on the invocation span.
pub fn record_sqs_trigger(message_id: &str) {
    Span::current().record("messaging.message_id", message_id);
}

/// Puts the S3 record being processed on the invocation span.
pub fn record_s3_trigger(location: &ObjectLocation, event_time: Option<&str>) {
    let span = Span::current();
    span.record("faas.document.collection", location.bucket.as_str());
    span.record("faas.document.name", location.key.as_str());
    if let Some(event_time) = event_time {
        span.record("faas.document.time", event_time);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S3Call {
    GetObject,
    PutObject,
    ListObjectsV2,
    DeleteObjects,
}

macro_rules! s3_client_span {
    ($name:literal, $method:literal, $bucket:expr, $key:expr) => {
        tracing::info_span!(
            $name,
            otel.kind = "client",
            net.transport = "ip_tcp",
            rpc.system = "aws-api",
            rpc.service = "S3",
            rpc.method = $method,
            aws.s3.bucket = %$bucket,
            aws.s3.key = $key,
            otel.status_code = Empty,
            exception.message = Empty,
        )
    };
}

pub fn s3_call_span(call: S3Call, bucket: &str, key: Option<&str>) -> Span {
    match call {
        S3Call::GetObject => s3_client_span!("S3.GetObject", "GetObject", bucket, key),
        S3Call::PutObject => s3_client_span!("S3.PutObject", "PutObject", bucket, key),
        S3Call::ListObjectsV2 => {
            s3_client_span!("S3.ListObjectsV2", "ListObjectsV2", bucket, key)
        }
        S3Call::DeleteObjects => {
            s3_client_span!("S3.DeleteObjects", "DeleteObjects", bucket, key)
        }
    }
}

pub fn sqs_send_span(queue_url: &str) -> Span {
    tracing::info_span!(
        "SQS.SendMessage",
        otel.kind = "producer",
        net.transport = "ip_tcp",
        messaging.system = "AmazonSQS",
        messaging.operation = "publish",
        messaging.destination.kind = "queue",
        messaging.destination.name = %queue_name(queue_url),
        aws.queue_url = %queue_url,
        messaging.message_id = Empty,
        otel.status_code = Empty,
        exception.message = Empty,
    )
}

/// Last path segment of a queue URL.
pub fn queue_name(queue_url: &str) -> &str {
    queue_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(queue_url)
}

/// Marks a client span as failed when the call returned an error.
pub fn record_client_outcome<T>(span: &Span, result: &Result<T, AdapterError>) {
    if let Err(error) = result {
        span.record("otel.status_code", "ERROR");
        span.record("exception.message", display(error));
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn log(&self, observation: &Observation<'_>) {
        let attributes = &observation.attributes;
        let correlation_id = attributes.correlation_id.as_ref().map(CorrelationId::as_str);

        match &observation.outcome {
            Outcome::Succeeded => tracing::info!(
                stage = observation.stage.as_str(),
                operation = observation.operation,
                outcome = "succeeded",
                correlation.id = correlation_id,
                bucket.name = attributes.bucket.as_deref(),
                key.name = attributes.key.as_deref(),
                aws.request.id = attributes.request_id.as_deref(),
                "{} is succeeded.",
                observation.operation
            ),
            Outcome::Failed(cause) => tracing::error!(
                stage = observation.stage.as_str(),
                operation = observation.operation,
                outcome = "failed",
                correlation.id = correlation_id,
                bucket.name = attributes.bucket.as_deref(),
                key.name = attributes.key.as_deref(),
                aws.request.id = attributes.request_id.as_deref(),
                error.message = %cause,
                "{} is failed.",
                observation.operation
            ),
        }
    }

    fn annotate_span(&self, observation: &Observation<'_>) {
        let attributes = &observation.attributes;
        let correlation_id = attributes.correlation_id.as_ref().map(CorrelationId::as_str);

        let span = Span::current();
        if let Some(correlation_id) = correlation_id {
            span.record("correlation.id", correlation_id);
        }
        if let Outcome::Failed(cause) = &observation.outcome {
            span.record("otel.status_code", "ERROR");
            span.record(
                "otel.status_description",
                observation.stage.failure_description(),
            );
            span.record("exception.message", display(cause));
        }

        tracing::info!(
            target: SPAN_EVENT_TARGET,
            {
                event.name = observation.stage.span_event_name(),
                is.successful = observation.is_successful(),
                bucket.id = attributes.bucket.as_deref(),
                key.name = attributes.key.as_deref(),
                aws.request.id = attributes.request_id.as_deref(),
                correlation.id = correlation_id,
            },
            "{}",
            observation.stage.span_event_name()
        );
    }
}

#[cfg(feature = "test-helpers")]
pub use capture::JsonCapture;

#[cfg(feature = "test-helpers")]
mod capture {
    use std::io;
    use std::sync::{Arc, Mutex};

    use serde_json::Value;
    use tracing_subscriber::fmt::format::FmtSpan;

    /// Collects the JSON lines a subscriber shaped like the production one writes.
    #[derive(Debug, Clone, Default)]
    pub struct JsonCapture {
        buffer: Arc<Mutex<Vec<u8>>>,
    }

    struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CaptureWriter {
        fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
            self.0
                .lock()
                .expect("poisoned mutex")
                .extend_from_slice(bytes);
            Ok(bytes.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl JsonCapture {
        pub fn new() -> Self {
            Self::default()
        }

        /// Runs `work` with the capturing subscriber as the thread default.
        /// Span closes are written too, so client spans show up with their fields.
        pub fn in_scope<T>(&self, work: impl FnOnce() -> T) -> T {
            let buffer = Arc::clone(&self.buffer);
            let subscriber = tracing_subscriber::fmt()
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .flatten_event(true)
                .with_span_events(FmtSpan::CLOSE)
                .with_max_level(tracing::Level::INFO)
                .with_writer(move || CaptureWriter(Arc::clone(&buffer)))
                .finish();
            tracing::subscriber::with_default(subscriber, work)
        }

        pub fn lines(&self) -> Vec<Value> {
            let buffer = self.buffer.lock().expect("poisoned mutex");
            String::from_utf8_lossy(&buffer)
                .lines()
                .filter_map(|line| serde_json::from_str(line).ok())
                .collect()
        }

        /// Close records of spans named `name`.
        pub fn closed_spans(&self, name: &str) -> Vec<Value> {
            self.lines()
                .into_iter()
                .filter(|line| line["message"] == "close" && line["span"]["name"] == name)
                .collect()
        }

        pub fn events_named(&self, event_name: &str) -> Vec<Value> {
            self.lines()
                .into_iter()
                .filter(|line| line["event.name"] == event_name)
                .collect()
        }
    }
}
