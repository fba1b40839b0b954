pub mod access;
pub mod auth;
pub mod completion;
pub mod dao;
pub mod orchestrator;

pub use access::{Caller, Decision, DenyReason, Grant, Level, ScopeResolver, authorize};
pub use auth::AuthService;
pub use completion::{CompletionBackend, HttpCompletionClient};
pub use dao::*;
pub use orchestrator::ChatOrchestrator;
