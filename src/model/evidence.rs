//! Evidence produced by analysis runs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// A piece of evidence attached to a run.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Evidence {
    pub evidence_id: String,
    #[serde(skip)]
    pub tenant_id: String,
    #[serde(skip)]
    pub run_id: Option<String>,
    #[serde(rename = "type")]
    pub evidence_type: String,
    pub created_at: DateTime<Utc>,
    #[schema(value_type = Object)]
    pub content: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_listing_shape() {
        let evidence = Evidence {
            evidence_id: "evi_demo_1".to_string(),
            tenant_id: "default".to_string(),
            run_id: Some("run_1".to_string()),
            evidence_type: "generated".to_string(),
            created_at: Utc::now(),
            content: json!({"percentile": 50}),
        };

        let value = serde_json::to_value(&evidence).unwrap();
        assert_eq!(value["type"], json!("generated"));
        assert_eq!(value["content"]["percentile"], json!(50));
        assert!(value.get("tenant_id").is_none());
    }
}
