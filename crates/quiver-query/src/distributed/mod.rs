//! Distributed execution plumbing.
//!
//! - [`future`] - Pollable task handles for work that must not block the
//!   pull chain
//! - [`rpc`] - The RPC client pool traits and their wire state codes
//! - [`data_manager`] - The shared cache of remote records
//!
//! The actual transport is an external collaborator: the in-process
//! cluster used in tests and embedded deployments implements the same
//! traits a networked transport would.

pub mod data_manager;
pub mod future;
pub mod rpc;

pub use data_manager::DataManager;
pub use future::{spawn, TaskHandle};
pub use rpc::{DistributedRuntime, PlanDispatcher, PullBatch, PullClients, PullState, UpdateClients};
