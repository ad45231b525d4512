//! Persisted audit record for a `RequireApproval` suspension: created the
//! moment a run suspends, resolved exactly once when the run is resumed.

use std::collections::HashMap;
use std::future::Future;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use spacehost_protocol::ApprovalDetails;
use spacehost_protocol::RunId;
use spacehost_protocol::SpaceId;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Denied,
    Expired,
}

/// The caller-supplied resolution for a pending approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalDecision {
    Approved,
    Denied,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalDecisionRequest {
    pub operation_id: String,
    pub decision: ApprovalDecision,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub id: String,
    pub space_id: SpaceId,
    pub run_id: RunId,
    pub operation_id: String,
    pub operation_type: String,
    pub status: ApprovalStatus,
    pub details: ApprovalDetails,
    pub reason: String,
    pub decision_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

pub trait ApprovalStore: Send + Sync {
    fn create(&self, record: ApprovalRecord) -> impl Future<Output = ()> + Send;
    fn get(&self, id: &str) -> impl Future<Output = Option<ApprovalRecord>> + Send;
    fn update(&self, record: ApprovalRecord) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Default)]
pub struct MemoryApprovalStore {
    records: RwLock<HashMap<String, ApprovalRecord>>,
}

impl MemoryApprovalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ApprovalStore for MemoryApprovalStore {
    async fn create(&self, record: ApprovalRecord) {
        self.records.write().await.insert(record.id.clone(), record);
    }

    async fn get(&self, id: &str) -> Option<ApprovalRecord> {
        self.records.read().await.get(id).cloned()
    }

    async fn update(&self, record: ApprovalRecord) {
        self.records.write().await.insert(record.id.clone(), record);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[tokio::test]
    async fn memory_approval_store_resolves_pending_to_approved() {
        let store = MemoryApprovalStore::new();
        let record = ApprovalRecord {
            id: "appr_1".to_string(),
            space_id: SpaceId::generate(),
            run_id: RunId::generate(),
            operation_id: "op1".to_string(),
            operation_type: "shell".to_string(),
            status: ApprovalStatus::Pending,
            details: ApprovalDetails::default(),
            reason: "gated".to_string(),
            decision_reason: None,
            created_at: Utc::now(),
            decided_at: None,
        };
        store.create(record.clone()).await;

        let mut resolved = record;
        resolved.status = ApprovalStatus::Approved;
        resolved.decided_at = Some(Utc::now());
        store.update(resolved).await;

        let fetched = store.get("appr_1").await.expect("present");
        assert_eq!(fetched.status, ApprovalStatus::Approved);
        assert!(fetched.decided_at.is_some());
    }
}
