// Test (ensayo) domain model
use serde::{Deserialize, Serialize};

/// One recorded test session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRun {
    #[serde(rename = "codigo_ensayo")]
    pub id: String,
    #[serde(rename = "descripcion")]
    pub description: String,
}

impl TestRun {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_field_names() {
        let json = serde_json::to_value(TestRun::new("senoidal", "Señal senoidal")).unwrap();
        assert_eq!(json["codigo_ensayo"], "senoidal");
        assert_eq!(json["descripcion"], "Señal senoidal");
    }
}
