//! Tenant administrative info

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::storage::StorageEntity;

/// Fixed record id: there is one TenantInfo row per tenant, distinguished
/// by the store's tenant column.
pub const TENANT_INFO_ID: &str = "tenant";

/// Administrative details for a tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TenantInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default)]
    pub email_entry_skipped: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StorageEntity for TenantInfo {
    const KIND: &'static str = "tenant_info";

    fn id(&self) -> &str {
        TENANT_INFO_ID
    }

    // There is one row per tenant under a fixed id
    fn set_id(&mut self, _id: &str) {}

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn stamp(&mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) {
        self.created_at = Some(created_at);
        self.updated_at = Some(updated_at);
    }
}
