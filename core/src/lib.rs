//! Orchestrates the run executor, space registry, and run service against a
//! container-backed sandbox and a pure policy engine.

mod approval;
mod error;
mod run;
mod run_executor;
mod space;

pub use approval::ApprovalDecision;
pub use approval::ApprovalDecisionRequest;
pub use approval::ApprovalRecord;
pub use approval::ApprovalStatus;
pub use approval::ApprovalStore;
pub use approval::MemoryApprovalStore;
pub use error::CoreError;
pub use error::Result;
pub use run::MemoryRunStore;
pub use run::RunRecord;
pub use run::RunService;
pub use run::RunStore;
pub use run_executor::PendingApproval;
pub use run_executor::RunExecutor;
pub use run_executor::RunOutcome;
pub use run_executor::RunStatus;
pub use space::CreateSpaceOptions;
pub use space::MemorySpaceStore;
pub use space::SpaceFilter;
pub use space::SpaceManager;
pub use space::SpaceRecord;
pub use space::SpaceRegistry;
pub use space::SpaceStatus;
pub use space::SpaceStore;
