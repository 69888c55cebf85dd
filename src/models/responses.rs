use serde::{Deserialize, Serialize};
use crate::models::domain::{DetailedResult, PointDetails, RankedResult, Unit};

/// Response for the zips-in-range endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZipsInRangeResponse {
    pub results: Vec<RankedResult>,
    pub unit: Unit,
    pub total_candidates: usize,
}

/// Response for the detailed zips-in-range endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedRangeResponse {
    pub results: Vec<DetailedResult>,
    pub unit: Unit,
}

/// Response for the distance endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceResponse {
    pub from: String,
    pub to: String,
    pub distance: f64,
    pub unit: Unit,
}

/// Response for the viewport endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoxResponse {
    pub points: Vec<PointDetails>,
    pub count: usize,
}

/// Response for free-text zip lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextLookupResponse {
    pub zip: String,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
