use object_pipeline_core::contract::{CorrelationId, CORRELATION_ID_KEY};

use crate::adapters::object_store::ObjectMetadata;

pub mod check;
pub mod create;
pub mod delete;
pub mod update;

pub(crate) fn correlation_id_from_metadata(metadata: &ObjectMetadata) -> Option<CorrelationId> {
    metadata
        .get(CORRELATION_ID_KEY)
        .filter(|value| !value.is_empty())
        .map(|value| CorrelationId::from(value.as_str()))
}

pub(crate) fn with_correlation_id(
    mut metadata: ObjectMetadata,
    correlation_id: &CorrelationId,
) -> ObjectMetadata {
    metadata.insert(
        CORRELATION_ID_KEY.to_string(),
        correlation_id.as_str().to_string(),
    );
    metadata
}
