//! `nodes` crate — the node-category dispatch contract and built-in node
//! implementations.
//!
//! Every node type resolves to a [`category::NodeCategory`], and every
//! category has exactly one [`traits::CategoryExecutor`] registered against
//! it in a [`registry::NodeRegistry`]. The engine crate holds the registry
//! and dispatches execution through it; this crate has no dependency on
//! `engine` so the context collaborators it needs (`PersistentStateAccess`,
//! `CredentialStore`, `NotificationSink`) are defined here as traits for
//! `engine` to implement.

pub mod broker;
pub mod category;
pub mod communication;
pub mod control_flow;
pub mod datasource;
pub mod defaults;
pub mod error;
pub mod http;
pub mod indicator;
pub mod mock;
pub mod registry;
pub mod traits;
pub mod utility;

pub use category::{derive_category, NodeCategory, BRANCHING_TYPES, LOOP_TYPE};
pub use error::NodeError;
pub use registry::NodeRegistry;
pub use traits::{CategoryExecutor, CredentialStore, ExecutionContext, NodeExecutionRequest, NotificationSink, PersistentStateAccess};
