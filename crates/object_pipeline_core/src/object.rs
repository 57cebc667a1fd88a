use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const ITEM_FIELD: &str = "item";
pub const IS_CHECKED_FIELD: &str = "isChecked";
pub const IS_UPDATED_FIELD: &str = "isUpdated";
pub const DEFAULT_ITEM: &str = "test";

/// JSON document moved through the pipeline.
///
/// No schema is enforced: stages set their own flag and keep every other
/// field as they found it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomObject(Map<String, Value>);

impl CustomObject {
    /// Object synthesized by the create stage.
    pub fn initial() -> Self {
        let mut fields = Map::new();
        fields.insert(ITEM_FIELD.to_string(), Value::from(DEFAULT_ITEM));
        fields.insert(IS_UPDATED_FIELD.to_string(), Value::Bool(false));
        fields.insert(IS_CHECKED_FIELD.to_string(), Value::Bool(false));
        Self(fields)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.0)
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }

    pub fn mark_checked(&mut self) {
        self.set_flag(IS_CHECKED_FIELD, true);
    }

    pub fn mark_updated(&mut self) {
        self.set_flag(IS_UPDATED_FIELD, true);
    }

    pub fn set_flag(&mut self, name: &str, value: bool) {
        self.0.insert(name.to_string(), Value::Bool(value));
    }

    /// Returns `None` when the field is absent or not a boolean.
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.0.get(name).and_then(Value::as_bool)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for CustomObject {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn initial_object_starts_unchecked_and_not_updated() {
        let object = CustomObject::initial();
        assert_eq!(object.get(ITEM_FIELD), Some(&json!("test")));
        assert_eq!(object.flag(IS_CHECKED_FIELD), Some(false));
        assert_eq!(object.flag(IS_UPDATED_FIELD), Some(false));
    }

    #[test]
    fn marking_keeps_unknown_fields() {
        let mut object = CustomObject::from_slice(br#"{"item":"x","owner":{"id":7}}"#)
            .expect("object should parse");
        object.mark_checked();
        object.mark_updated();

        assert_eq!(object.get("owner"), Some(&json!({"id": 7})));
        assert_eq!(object.flag(IS_CHECKED_FIELD), Some(true));
        assert_eq!(object.flag(IS_UPDATED_FIELD), Some(true));
    }

    #[test]
    fn rejects_non_object_documents() {
        assert!(CustomObject::from_slice(b"[1,2,3]").is_err());
    }
}
