use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// The answer the completion service is constrained to produce.
///
/// Missing fields decode as empty strings; whether an answer is usable is decided by
/// [`StructuredAnswer::is_complete`], not by the decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredAnswer {
    /// HTML formatted answer, at most 200 words
    #[serde(rename = "longresponse")]
    pub long_response: String,
    /// Plain text answer, at most 50 words
    #[serde(rename = "shortresponse")]
    pub short_response: String,
    pub title: String,
}

impl StructuredAnswer {
    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// An answer is accepted once either the long or the short form carries text.
    pub fn is_complete(&self) -> bool {
        !self.long_response.is_empty() || !self.short_response.is_empty()
    }

    /// The `response_format` descriptor forcing the service to emit this shape.
    pub fn response_format() -> Value {
        json!({
            "type": "json_schema",
            "json_schema": {
                "name": "Response",
                "description": "Answers of the prompt with given information",
                "strict": true,
                "schema": {
                    "type": "object",
                    "properties": {
                        "longresponse": { "type": "string" },
                        "shortresponse": { "type": "string" },
                        "title": { "type": "string" }
                    },
                    "required": ["longresponse", "shortresponse", "title"],
                    "additionalProperties": false
                }
            }
        })
    }
}

/// Terminal output of one analysis
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub content: StructuredAnswer,
    /// Set when any attempt executed a web search
    pub internet_search: bool,
}
