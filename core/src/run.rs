//! Persists runs and orchestrates `RunExecutor` calls: `create`, `resume`,
//! `cancel`, `list`, `get`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use spacehost_protocol::Event;
use spacehost_protocol::EventKind;
use spacehost_protocol::Operation;
use spacehost_protocol::RunId;
use spacehost_protocol::SpaceId;
use tokio::sync::Mutex;
use tokio::sync::RwLock;

use crate::approval::ApprovalDecision;
use crate::approval::ApprovalDecisionRequest;
use crate::approval::ApprovalRecord;
use crate::approval::ApprovalStatus;
use crate::approval::ApprovalStore;
use crate::error::CoreError;
use crate::error::Result;
use crate::run_executor::PendingApproval;
use crate::run_executor::RunExecutor;
use crate::run_executor::RunStatus;
use crate::space::SpaceRegistry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: RunId,
    pub space_id: SpaceId,
    pub status: RunStatus,
    pub operations: Vec<Operation>,
    pub events: Vec<Event>,
    pub pending_approval: Option<PendingApproval>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

pub trait RunStore: Send + Sync {
    fn create(&self, record: RunRecord) -> impl Future<Output = ()> + Send;
    fn get(&self, id: &RunId) -> impl Future<Output = Option<RunRecord>> + Send;
    fn update(&self, record: RunRecord) -> impl Future<Output = ()> + Send;
    fn list_by_space(&self, space_id: &SpaceId) -> impl Future<Output = Vec<RunRecord>> + Send;
}

#[derive(Debug, Default)]
pub struct MemoryRunStore {
    records: RwLock<HashMap<RunId, RunRecord>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunStore for MemoryRunStore {
    async fn create(&self, record: RunRecord) {
        self.records.write().await.insert(record.id.clone(), record);
    }

    async fn get(&self, id: &RunId) -> Option<RunRecord> {
        self.records.read().await.get(id).cloned()
    }

    async fn update(&self, record: RunRecord) {
        self.records.write().await.insert(record.id.clone(), record);
    }

    async fn list_by_space(&self, space_id: &SpaceId) -> Vec<RunRecord> {
        self.records
            .read()
            .await
            .values()
            .filter(|r| &r.space_id == space_id)
            .cloned()
            .collect()
    }
}

pub struct RunService<Reg: SpaceRegistry, R: RunStore, A: ApprovalStore> {
    registry: Reg,
    run_store: R,
    approval_store: A,
    // Serializes the resume read-modify-write per run id; a real persistence
    // layer would use a row lock, this approximates it in-process.
    resume_locks: Mutex<HashMap<RunId, Arc<Mutex<()>>>>,
}

impl<Reg: SpaceRegistry, R: RunStore, A: ApprovalStore> RunService<Reg, R, A> {
    pub fn new(registry: Reg, run_store: R, approval_store: A) -> Self {
        Self {
            registry,
            run_store,
            approval_store,
            resume_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, id: &RunId) -> Arc<Mutex<()>> {
        self.resume_locks
            .lock()
            .await
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    #[tracing::instrument(skip_all)]
    pub async fn create(&self, space_id: &SpaceId, operations: Vec<Operation>) -> Result<RunRecord> {
        let sandbox = self
            .registry
            .get_sandbox(space_id)
            .await
            .ok_or_else(|| CoreError::SpaceNotFound(space_id.clone()))?;
        let policy = self
            .registry
            .get_policy_engine(space_id)
            .await
            .ok_or_else(|| CoreError::SpaceNotFound(space_id.clone()))?;

        let id = RunId::generate();
        let started_at = Utc::now();

        let outcome = {
            let guard = sandbox.lock().await;
            RunExecutor::run(&operations, &policy, &*guard).await
        };

        let completed_at = (outcome.status != RunStatus::AwaitingApproval).then(Utc::now);
        let record = RunRecord {
            id: id.clone(),
            space_id: space_id.clone(),
            status: outcome.status,
            operations,
            events: outcome.events,
            pending_approval: outcome.pending_approval.clone(),
            started_at,
            completed_at,
        };
        self.run_store.create(record.clone()).await;

        if let Some(pending) = &outcome.pending_approval {
            self.record_pending_approval(&id, space_id, pending).await;
        }

        Ok(record)
    }

    async fn record_pending_approval(&self, run_id: &RunId, space_id: &SpaceId, pending: &PendingApproval) {
        let approval = ApprovalRecord {
            id: format!("appr_{}", pending.operation_id.as_deref().unwrap_or("unknown")),
            space_id: space_id.clone(),
            run_id: run_id.clone(),
            operation_id: pending.operation_id.clone().unwrap_or_default(),
            operation_type: pending.operation_type.clone(),
            status: ApprovalStatus::Pending,
            details: pending.details.clone(),
            reason: pending.reason.clone(),
            decision_reason: None,
            created_at: Utc::now(),
            decided_at: None,
        };
        self.approval_store.create(approval).await;
    }

    #[tracing::instrument(skip_all)]
    pub async fn resume(&self, run_id: &RunId, approval: ApprovalDecisionRequest) -> Result<RunRecord> {
        let lock = self.lock_for(run_id).await;
        let _guard = lock.lock().await;

        let mut record = self
            .run_store
            .get(run_id)
            .await
            .ok_or_else(|| CoreError::RunNotFound(run_id.to_string()))?;

        if record.status != RunStatus::AwaitingApproval {
            return Err(CoreError::RunNotAwaitingApproval(run_id.to_string()));
        }
        let pending = record
            .pending_approval
            .clone()
            .ok_or_else(|| CoreError::RunNotAwaitingApproval(run_id.to_string()))?;
        let expected = pending.operation_id.clone().unwrap_or_default();
        if expected != approval.operation_id {
            return Err(CoreError::OperationIdMismatch {
                expected,
                actual: approval.operation_id,
            });
        }

        let index = record
            .operations
            .iter()
            .position(|op| op.id() == Some(approval.operation_id.as_str()))
            .ok_or_else(|| CoreError::OperationIdMismatch {
                expected: approval.operation_id.clone(),
                actual: approval.operation_id.clone(),
            })?;

        let sandbox = self
            .registry
            .get_sandbox(&record.space_id)
            .await
            .ok_or_else(|| CoreError::SpaceNotFound(record.space_id.clone()))?;
        let policy = self
            .registry
            .get_policy_engine(&record.space_id)
            .await
            .ok_or_else(|| CoreError::SpaceNotFound(record.space_id.clone()))?;

        let (resume_index, bypass) = match approval.decision {
            ApprovalDecision::Approved => (index, true),
            ApprovalDecision::Denied => {
                let reason = approval
                    .reason
                    .clone()
                    .unwrap_or_else(|| "Approval denied by user".to_string());
                record.events.push(Event::new(
                    EventKind::PolicyDenied {
                        operation_type: pending.operation_type.clone(),
                        reason,
                        suggestion: None,
                    },
                    Some(approval.operation_id.clone()),
                ));
                (index + 1, false)
            }
        };

        let outcome = {
            let guard = sandbox.lock().await;
            RunExecutor::resume(&record.operations, resume_index, bypass, &policy, &*guard).await
        };

        record.events.extend(outcome.events);
        record.status = outcome.status;
        record.pending_approval = outcome.pending_approval.clone();
        if record.status != RunStatus::AwaitingApproval {
            record.completed_at = Some(Utc::now());
        }

        self.update_approval_record(&pending, approval.decision, approval.reason).await;
        self.run_store.update(record.clone()).await;

        Ok(record)
    }

    async fn update_approval_record(
        &self,
        pending: &PendingApproval,
        decision: ApprovalDecision,
        decision_reason: Option<String>,
    ) {
        let id = format!("appr_{}", pending.operation_id.as_deref().unwrap_or("unknown"));
        if let Some(mut record) = self.approval_store.get(&id).await {
            record.status = match decision {
                ApprovalDecision::Approved => ApprovalStatus::Approved,
                ApprovalDecision::Denied => ApprovalStatus::Denied,
            };
            record.decision_reason = decision_reason;
            record.decided_at = Some(Utc::now());
            self.approval_store.update(record).await;
        }
    }

    pub async fn cancel(&self, run_id: &RunId) -> Result<RunRecord> {
        let mut record = self
            .run_store
            .get(run_id)
            .await
            .ok_or_else(|| CoreError::RunNotFound(run_id.to_string()))?;
        record.status = RunStatus::Cancelled;
        record.completed_at = Some(Utc::now());
        self.run_store.update(record.clone()).await;
        Ok(record)
    }

    pub async fn list(&self, space_id: &SpaceId) -> Vec<RunRecord> {
        self.run_store.list_by_space(space_id).await
    }

    pub async fn get(&self, run_id: &RunId) -> Option<RunRecord> {
        self.run_store.get(run_id).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[tokio::test]
    async fn memory_run_store_lists_by_space() {
        let store = MemoryRunStore::new();
        let space_id = SpaceId::generate();
        let record = RunRecord {
            id: RunId::generate(),
            space_id: space_id.clone(),
            status: RunStatus::Completed,
            operations: vec![],
            events: vec![],
            pending_approval: None,
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
        };
        store.create(record.clone()).await;
        let listed = store.list_by_space(&space_id).await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, record.id);
    }
}
