//! The in-memory registry mapping a space id to its live `Sandbox` and
//! `PolicyEngine`, plus the persisted-record collaborator interface. Shape
//! mirrors the teacher's `ConversationManager`: a registry-wide `RwLock` for
//! create/destroy/list, a per-entry `Mutex` serializing concurrent access to
//! one sandbox.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use spacehost_policy::PolicyEngine;
use spacehost_protocol::Policy;
use spacehost_protocol::PolicyOverrides;
use spacehost_protocol::PresetName;
use spacehost_protocol::SpaceId;
use spacehost_sandbox::Sandbox;
use spacehost_sandbox::SandboxConfig;
use tokio::sync::Mutex;
use tokio::sync::RwLock;

use crate::error::CoreError;
use crate::error::Result;

const DEFAULT_TTL_SECONDS: i64 = 12 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpaceStatus {
    Creating,
    Ready,
    Running,
    Paused,
    Destroyed,
}

/// The persisted metadata for a space. `Policy` is stored resolved (preset +
/// overrides already merged) so a restart does not need to re-merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceRecord {
    pub id: SpaceId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: SpaceStatus,
    pub policy_preset: PresetName,
    pub policy_overrides: Option<PolicyOverrides>,
    pub workspace_path: String,
    pub capabilities: Vec<String>,
    pub env: HashMap<String, String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateSpaceOptions {
    pub name: Option<String>,
    pub description: Option<String>,
    pub policy_preset: Option<PresetName>,
    pub policy_overrides: Option<PolicyOverrides>,
    pub capabilities: Vec<String>,
    pub env: HashMap<String, String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub ttl_seconds: Option<i64>,
    pub base_image: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SpaceFilter {
    pub status: Option<SpaceStatus>,
}

impl SpaceFilter {
    fn matches(&self, record: &SpaceRecord) -> bool {
        self.status.is_none_or(|status| status == record.status)
    }
}

/// Persisted-record CRUD, the out-of-scope persistence collaborator. An
/// in-memory implementation (`MemorySpaceStore`) is provided so the crate is
/// runnable and testable without a real database.
pub trait SpaceStore: Send + Sync {
    fn create(&self, record: SpaceRecord) -> impl Future<Output = ()> + Send;
    fn get(&self, id: &SpaceId) -> impl Future<Output = Option<SpaceRecord>> + Send;
    fn list(&self, filter: &SpaceFilter) -> impl Future<Output = Vec<SpaceRecord>> + Send;
    fn update(&self, record: SpaceRecord) -> impl Future<Output = ()> + Send;
    fn delete(&self, id: &SpaceId) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Default)]
pub struct MemorySpaceStore {
    records: RwLock<HashMap<SpaceId, SpaceRecord>>,
}

impl MemorySpaceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SpaceStore for MemorySpaceStore {
    async fn create(&self, record: SpaceRecord) {
        self.records.write().await.insert(record.id.clone(), record);
    }

    async fn get(&self, id: &SpaceId) -> Option<SpaceRecord> {
        self.records.read().await.get(id).cloned()
    }

    async fn list(&self, filter: &SpaceFilter) -> Vec<SpaceRecord> {
        self.records
            .read()
            .await
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect()
    }

    async fn update(&self, record: SpaceRecord) {
        self.records.write().await.insert(record.id.clone(), record);
    }

    async fn delete(&self, id: &SpaceId) {
        self.records.write().await.remove(id);
    }
}

struct SpaceEntry {
    sandbox: Arc<Mutex<Sandbox>>,
    policy: PolicyEngine,
}

/// The interface the Run Service depends on: looking up a space's live
/// sandbox and resolved policy. `SpaceManager` is the only implementation.
pub trait SpaceRegistry: Send + Sync {
    fn get_sandbox(&self, id: &SpaceId) -> impl Future<Output = Option<Arc<Mutex<Sandbox>>>> + Send;
    fn get_policy_engine(&self, id: &SpaceId) -> impl Future<Output = Option<PolicyEngine>> + Send;
}

pub struct SpaceManager<St: SpaceStore> {
    entries: RwLock<HashMap<SpaceId, SpaceEntry>>,
    store: St,
    workspace_base_dir: std::path::PathBuf,
}

impl<St: SpaceStore> SpaceManager<St> {
    pub fn new(store: St, workspace_base_dir: std::path::PathBuf) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            store,
            workspace_base_dir,
        }
    }

    #[tracing::instrument(skip_all)]
    pub async fn create(&self, options: CreateSpaceOptions) -> Result<SpaceRecord> {
        let id = SpaceId::generate();
        let preset = options.policy_preset.unwrap_or(PresetName::Standard);
        let policy = match &options.policy_overrides {
            Some(overrides) => Policy::with_overrides(preset, overrides),
            None => Policy::preset(preset),
        };
        let policy_engine = PolicyEngine::new(policy);

        let mut sandbox_config = SandboxConfig::new(id.as_str(), self.workspace_base_dir.clone());
        if let Some(image) = &options.base_image {
            sandbox_config.base_image = image.clone();
        }
        sandbox_config.env.extend(options.env.clone());

        let workspace_path = sandbox_config.host_workspace_dir().to_string_lossy().into_owned();
        let sandbox = Sandbox::create(sandbox_config).await?;

        let now = Utc::now();
        let ttl = options.ttl_seconds.unwrap_or(DEFAULT_TTL_SECONDS);
        let record = SpaceRecord {
            id: id.clone(),
            name: options.name,
            description: options.description,
            status: SpaceStatus::Ready,
            policy_preset: preset,
            policy_overrides: options.policy_overrides,
            workspace_path,
            capabilities: options.capabilities,
            env: options.env,
            metadata: options.metadata,
            created_at: now,
            expires_at: now + chrono::Duration::seconds(ttl),
        };

        self.store.create(record.clone()).await;
        self.entries.write().await.insert(
            id,
            SpaceEntry {
                sandbox: Arc::new(Mutex::new(sandbox)),
                policy: policy_engine,
            },
        );

        Ok(record)
    }

    pub async fn get(&self, id: &SpaceId) -> Option<SpaceRecord> {
        self.store.get(id).await
    }

    pub async fn list(&self, filter: &SpaceFilter) -> Vec<SpaceRecord> {
        self.store.list(filter).await
    }

    pub async fn update(&self, id: &SpaceId, patch: impl FnOnce(&mut SpaceRecord)) -> Result<SpaceRecord> {
        let mut record = self.store.get(id).await.ok_or_else(|| CoreError::SpaceNotFound(id.clone()))?;
        patch(&mut record);
        self.store.update(record.clone()).await;
        Ok(record)
    }

    pub async fn extend(&self, id: &SpaceId, additional_seconds: i64) -> Result<SpaceRecord> {
        self.update(id, |record| {
            record.expires_at += chrono::Duration::seconds(additional_seconds);
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn destroy(&self, id: &SpaceId) -> Result<()> {
        let entry = self.entries.write().await.remove(id);
        if let Some(entry) = entry {
            entry.sandbox.lock().await.destroy().await?;
        }
        if let Some(mut record) = self.store.get(id).await {
            record.status = SpaceStatus::Destroyed;
            self.store.update(record).await;
        }
        Ok(())
    }

    /// Destroys every space whose `expiresAt` has passed; returns their ids.
    /// Not wired to a background timer -- a scheduling concern outside this
    /// crate.
    pub async fn sweep_expired(&self) -> Vec<SpaceId> {
        let now = Utc::now();
        let expired: Vec<SpaceId> = self
            .store
            .list(&SpaceFilter::default())
            .await
            .into_iter()
            .filter(|r| r.status != SpaceStatus::Destroyed && r.expires_at <= now)
            .map(|r| r.id)
            .collect();

        for id in &expired {
            let _ = self.destroy(id).await;
        }
        expired
    }
}

impl<St: SpaceStore> SpaceRegistry for SpaceManager<St> {
    async fn get_sandbox(&self, id: &SpaceId) -> Option<Arc<Mutex<Sandbox>>> {
        self.entries.read().await.get(id).map(|e| e.sandbox.clone())
    }

    async fn get_policy_engine(&self, id: &SpaceId) -> Option<PolicyEngine> {
        self.entries.read().await.get(id).map(|e| e.policy.clone())
    }
}

/// Lets callers share one `SpaceManager` between a `RunService` and their own
/// lifecycle code (create/destroy) without cloning it.
impl<T: SpaceRegistry> SpaceRegistry for Arc<T> {
    async fn get_sandbox(&self, id: &SpaceId) -> Option<Arc<Mutex<Sandbox>>> {
        T::get_sandbox(self, id).await
    }

    async fn get_policy_engine(&self, id: &SpaceId) -> Option<PolicyEngine> {
        T::get_policy_engine(self, id).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn space_filter_with_no_status_matches_everything() {
        let record = SpaceRecord {
            id: SpaceId::generate(),
            name: None,
            description: None,
            status: SpaceStatus::Ready,
            policy_preset: PresetName::Standard,
            policy_overrides: None,
            workspace_path: "/tmp/x".to_string(),
            capabilities: vec![],
            env: HashMap::new(),
            metadata: HashMap::new(),
            created_at: Utc::now(),
            expires_at: Utc::now(),
        };
        assert!(SpaceFilter::default().matches(&record));
        assert!(!SpaceFilter {
            status: Some(SpaceStatus::Destroyed)
        }
        .matches(&record));
    }

    #[tokio::test]
    async fn memory_store_round_trips_and_deletes() {
        let store = MemorySpaceStore::new();
        let record = SpaceRecord {
            id: SpaceId::generate(),
            name: Some("demo".to_string()),
            description: None,
            status: SpaceStatus::Ready,
            policy_preset: PresetName::Standard,
            policy_overrides: None,
            workspace_path: "/tmp/x".to_string(),
            capabilities: vec![],
            env: HashMap::new(),
            metadata: HashMap::new(),
            created_at: Utc::now(),
            expires_at: Utc::now(),
        };
        store.create(record.clone()).await;
        assert_eq!(store.get(&record.id).await.and_then(|r| r.name), Some("demo".to_string()));
        store.delete(&record.id).await;
        assert!(store.get(&record.id).await.is_none());
    }
}
