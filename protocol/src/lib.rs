//! Wire protocol for submitting operation batches to a space and recording
//! the resulting events. Pure data: no I/O, no policy evaluation, no
//! container concerns.

mod event;
mod ids;
mod operation;
mod policy;
mod validate;

pub use event::ApprovalDetails;
pub use event::ErrorCategory;
pub use event::Event;
pub use event::EventKind;
pub use ids::RunId;
pub use ids::SpaceId;
pub use operation::Edit;
pub use operation::Encoding;
pub use operation::Operation;
pub use policy::FilesystemOverrides;
pub use policy::FilesystemPolicy;
pub use policy::NetworkOverrides;
pub use policy::NetworkPolicy;
pub use policy::Policy;
pub use policy::PolicyOverrides;
pub use policy::PresetName;
pub use policy::ShellOverrides;
pub use policy::ShellPolicy;
pub use validate::Issue;
pub use validate::OperationsMessage;
pub use validate::PROTOCOL_VERSION;
pub use validate::ValidationError;
pub use validate::validate_operation;
pub use validate::validate_operations_message;
pub use validate::validate_path;
