use serde::{Deserialize, Serialize};

/// What the explanation service needs to explain a missed question.
///
/// The service itself lives outside this workspace; this is the shape both sides agree on.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, schemars::JsonSchema, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct ExplainRequest {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_answer: Option<String>,
    pub category: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, schemars::JsonSchema, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct ExplainResponse {
    pub explanation: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_uses_camel_case_keys() {
        let request = ExplainRequest {
            question: "חם : קר".to_string(),
            options: vec!["ניגוד".to_string(), "דמיון".to_string()],
            correct_answer: "ניגוד".to_string(),
            student_answer: None,
            category: "Analogies".to_string(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["correctAnswer"], "ניגוד");
        assert!(json.get("studentAnswer").is_none());
    }

    #[test]
    fn test_schema_names_required_fields() {
        let schema = serde_json::to_value(schemars::schema_for!(ExplainRequest)).unwrap();
        let required = schema["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v == "correctAnswer"));
        assert!(!required.iter().any(|v| v == "studentAnswer"));
    }
}
