//! Task lifecycle and callback ingestion for ephemeral compute.
//!
//! This crate dispatches one unit of work to an external, short-lived
//! compute resource, tracks the work through a three-state lifecycle, accepts
//! the asynchronous completion callback, and gates artifact downloads on that
//! callback.
//!
//! # Overview
//!
//! A task is created in `processing` when the compute provider accepts the
//! spawn request. The external compute later reports `success` (with an
//! artifact locator) or `error` (with a message). Terminal states are final:
//! duplicate or late callbacks are detected and acknowledged without being
//! applied.
//!
//! ```text
//! (none) --create--> processing --success callback--> success
//!                              \---error callback----> error
//! ```
//!
//! # Module Organization
//!
//! - [`types`] - Status enum, request and response bodies
//! - [`domain`] - [`TaskRecord`], artifact locators and completion outcomes
//! - [`store`] - Versioned storage backends and the CAS-based task store
//! - [`dispatch`] - Compute provider trait, HTTP and in-memory providers
//! - [`dispatcher`] - Task creation: validate, spawn, persist
//! - [`callback`] - Completion callback ingestion
//! - [`artifact`] - Object store trait with in-memory and filesystem stores
//! - [`gateway`] - Status projection and gated artifact download
//! - [`api`] - axum routes over all of the above
//! - [`config`] - Command line and environment configuration

pub mod api;
pub mod artifact;
pub mod callback;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod dispatcher;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod service;
pub mod store;
pub mod types;

pub use callback::CallbackIngestor;
pub use dispatcher::Dispatcher;
pub use domain::{ArtifactLocator, CompletionOutcome, TaskRecord, TaskResult};
pub use error::TaskError;
pub use gateway::{ArtifactDownload, TaskGateway};
pub use service::TaskService;
pub use store::memory::InMemoryTaskStore;
pub use store::{StoreConfig, TaskStore};
pub use types::*;
