use std::collections::BTreeMap;

use object_pipeline_core::error::AdapterError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundMessage {
    pub body: String,
    /// Required by FIFO queues, ignored otherwise.
    pub group_id: Option<String>,
    pub attributes: BTreeMap<String, String>,
}

pub trait MessageQueue {
    /// Sends one message and returns the id assigned by the queue.
    fn send_message(&self, message: &OutboundMessage) -> Result<String, AdapterError>;
}
