//! Response types for session endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub trust_score: f64,
    /// Hash of the stored device fingerprint.
    pub fingerprint: Option<String>,
    pub user_id: Option<String>,
    pub created_at: String,
    /// Trust of the current fingerprint against the bound principal's history.
    pub history_trust: Option<f64>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RejectionResponse {
    pub error: String,
    pub message: String,
    pub code: String,
}
