//! Tenant-scoped asset records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::JsonMap;

/// Asset as submitted to the bulk upsert route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AssetIn {
    /// Caller-owned identifier, unique per tenant.
    pub external_id: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Latitude in degrees.
    #[serde(default)]
    pub lat: Option<f64>,
    /// Longitude in degrees.
    #[serde(default)]
    pub lon: Option<f64>,
    /// Arbitrary metadata.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub meta: JsonMap,
}

/// Stored asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Asset {
    pub tenant_id: String,
    pub external_id: String,
    pub name: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub meta: JsonMap,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Asset {
    /// Build a fresh asset from its request form.
    pub fn create(tenant_id: &str, input: AssetIn, now: DateTime<Utc>) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            external_id: input.external_id,
            name: input.name,
            lat: input.lat,
            lon: input.lon,
            meta: input.meta,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the mutable fields, keeping identity and `created_at`.
    pub fn apply(&mut self, input: AssetIn, now: DateTime<Utc>) {
        self.name = input.name;
        self.lat = input.lat;
        self.lon = input.lon;
        self.meta = input.meta;
        self.updated_at = now;
    }
}
