//! Loaded-model description.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize, Serializer};

/// Information about the model behind a detection engine.
///
/// Populated once when the engine is built and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct ModelInfo {
    #[serde(rename = "model_loaded")]
    pub loaded: bool,
    /// Execution device ("cpu", "cuda", "coreml")
    pub device: String,
    /// Class labels; the index is the class id
    #[serde(rename = "classes")]
    pub class_names: Vec<String>,
    pub model_path: String,
}

impl ModelInfo {
    /// Number of known classes.
    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// Label for a class id, synthesizing `class_{id}` when out of range.
    pub fn label_for(&self, class_id: usize) -> String {
        self.class_names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| crate::Detection::fallback_label(class_id))
    }
}

// Serialized by hand to add the derived `num_classes` field.
impl Serialize for ModelInfo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut s = serializer.serialize_struct("ModelInfo", 5)?;
        s.serialize_field("model_loaded", &self.loaded)?;
        s.serialize_field("device", &self.device)?;
        s.serialize_field("classes", &self.class_names)?;
        s.serialize_field("num_classes", &self.num_classes())?;
        s.serialize_field("model_path", &self.model_path)?;
        s.end()
    }
}
