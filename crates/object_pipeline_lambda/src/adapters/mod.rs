use std::future::Future;

use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use object_pipeline_core::error::{AdapterError, AdapterErrorKind};

pub mod object_store;
pub mod queue;
pub mod s3;
pub mod sqs;

#[cfg(feature = "test-helpers")]
pub mod memory;

/// Drives an SDK future to completion from synchronous adapter code.
///
/// Must be called from within a multi-threaded tokio runtime.
pub(crate) fn block_on<F: Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

/// Converts an SDK error into an [`AdapterError`], keeping the service error code's meaning.
pub(crate) fn classify<E>(action: &str, error: E) -> AdapterError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    AdapterError::new(
        error_kind(error.code()),
        format!("failed to {action}: {}", DisplayErrorContext(&error)),
    )
}

fn error_kind(code: Option<&str>) -> AdapterErrorKind {
    match code {
        Some(
            "NoSuchKey"
            | "NoSuchBucket"
            | "NotFound"
            | "AWS.SimpleQueueService.NonExistentQueue"
            | "QueueDoesNotExist",
        ) => AdapterErrorKind::NotFound,
        Some("AccessDenied" | "AccessDeniedException" | "Forbidden") => {
            AdapterErrorKind::AccessDenied
        }
        _ => AdapterErrorKind::Other,
    }
}
