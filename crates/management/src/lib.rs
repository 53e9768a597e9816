//! Thumbnail experiment management backend — experiments, videos, sessions.
//!
//! Provides REST API endpoints for the ClickPilot dashboard UI.
//! Data stored in DashMap (development); swap to a durable store for production.

pub mod auth;
pub mod catalog;
pub mod handlers;
pub mod models;
pub mod router;
pub mod scheduler;
pub mod session;
pub mod store;

pub use catalog::InMemoryCatalog;
pub use handlers::ManagementState;
pub use router::management_router;
pub use scheduler::CompletionScheduler;
pub use session::SessionStore;
pub use store::ExperimentStore;
