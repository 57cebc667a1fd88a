//! Observed-operation envelope.
//!
//! [`Envelope::run`] executes one unit of stage work and reports the outcome
//! exactly once to each of the observer's two sinks: one log record and one
//! span annotation. Failures come back as [`OperationError`], which names the
//! operation and keeps the original [`FailureCause`] as its source.

use std::cell::RefCell;

use crate::contract::{CorrelationId, ObjectLocation, Stage};
use crate::error::{FailureCause, OperationError};

/// Attributes attached to every log record and span event of an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservationAttributes {
    pub correlation_id: Option<CorrelationId>,
    pub bucket: Option<String>,
    pub key: Option<String>,
    pub request_id: Option<String>,
}

/// Per-invocation attribute holder.
///
/// Work running inside the envelope may learn attributes late (a key that
/// was just generated, a correlation id read from metadata) and record them
/// here through a shared reference.
#[derive(Debug, Default)]
pub struct ObservationContext {
    attributes: RefCell<ObservationAttributes>,
}

impl ObservationContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            attributes: RefCell::new(ObservationAttributes {
                request_id: Some(request_id.into()),
                ..ObservationAttributes::default()
            }),
        }
    }

    pub fn set_location(&self, location: &ObjectLocation) {
        let mut attributes = self.attributes.borrow_mut();
        attributes.bucket = Some(location.bucket.clone());
        attributes.key = Some(location.key.clone());
    }

    pub fn set_bucket(&self, bucket: &str) {
        self.attributes.borrow_mut().bucket = Some(bucket.to_string());
    }

    pub fn set_correlation_id(&self, correlation_id: &CorrelationId) {
        self.attributes.borrow_mut().correlation_id = Some(correlation_id.clone());
    }

    pub fn snapshot(&self) -> ObservationAttributes {
        self.attributes.borrow().clone()
    }
}

#[derive(Debug)]
pub enum Outcome<'a> {
    Succeeded,
    Failed(&'a FailureCause),
}

#[derive(Debug)]
pub struct Observation<'a> {
    pub stage: Stage,
    pub operation: &'a str,
    pub outcome: Outcome<'a>,
    pub attributes: ObservationAttributes,
}

impl Observation<'_> {
    pub fn is_successful(&self) -> bool {
        matches!(self.outcome, Outcome::Succeeded)
    }

    pub fn outcome_label(&self) -> &'static str {
        match self.outcome {
            Outcome::Succeeded => "succeeded",
            Outcome::Failed(_) => "failed",
        }
    }

    pub fn error_message(&self) -> Option<String> {
        match self.outcome {
            Outcome::Succeeded => None,
            Outcome::Failed(cause) => Some(cause.to_string()),
        }
    }
}

/// Log and span sinks consuming observations.
pub trait Observer {
    fn log(&self, observation: &Observation<'_>);
    fn annotate_span(&self, observation: &Observation<'_>);
}

pub struct Envelope<'a> {
    stage: Stage,
    observer: &'a dyn Observer,
}

impl<'a> Envelope<'a> {
    pub fn new(stage: Stage, observer: &'a dyn Observer) -> Self {
        Self { stage, observer }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn run<T, F>(
        &self,
        operation: &str,
        context: &ObservationContext,
        work: F,
    ) -> Result<T, OperationError>
    where
        F: FnOnce() -> Result<T, FailureCause>,
    {
        let result = work();
        let outcome = match &result {
            Ok(_) => Outcome::Succeeded,
            Err(cause) => Outcome::Failed(cause),
        };
        let observation = Observation {
            stage: self.stage,
            operation,
            outcome,
            attributes: context.snapshot(),
        };
        self.observer.log(&observation);
        self.observer.annotate_span(&observation);

        result.map_err(|cause| OperationError::new(operation, cause))
    }
}

#[cfg(feature = "test-helpers")]
pub use recording::{ObservationSink, RecordedObservation, RecordingObserver};

#[cfg(feature = "test-helpers")]
mod recording {
    use std::sync::Mutex;

    use super::{Observation, ObservationAttributes, Observer};
    use crate::contract::Stage;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ObservationSink {
        Log,
        Span,
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct RecordedObservation {
        pub sink: ObservationSink,
        pub stage: Stage,
        pub operation: String,
        pub successful: bool,
        pub error_message: Option<String>,
        pub attributes: ObservationAttributes,
    }

    /// Observer that keeps every observation in memory.
    #[derive(Debug, Default)]
    pub struct RecordingObserver {
        records: Mutex<Vec<RecordedObservation>>,
    }

    impl RecordingObserver {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn records(&self) -> Vec<RecordedObservation> {
            self.records.lock().expect("poisoned mutex").clone()
        }

        pub fn logs(&self) -> Vec<RecordedObservation> {
            self.filtered(ObservationSink::Log)
        }

        pub fn span_events(&self) -> Vec<RecordedObservation> {
            self.filtered(ObservationSink::Span)
        }

        fn filtered(&self, sink: ObservationSink) -> Vec<RecordedObservation> {
            self.records()
                .into_iter()
                .filter(|record| record.sink == sink)
                .collect()
        }

        fn push(&self, sink: ObservationSink, observation: &Observation<'_>) {
            self.records
                .lock()
                .expect("poisoned mutex")
                .push(RecordedObservation {
                    sink,
                    stage: observation.stage,
                    operation: observation.operation.to_string(),
                    successful: observation.is_successful(),
                    error_message: observation.error_message(),
                    attributes: observation.attributes.clone(),
                });
        }
    }

    impl Observer for RecordingObserver {
        fn log(&self, observation: &Observation<'_>) {
            self.push(ObservationSink::Log, observation);
        }

        fn annotate_span(&self, observation: &Observation<'_>) {
            self.push(ObservationSink::Span, observation);
        }
    }
}
