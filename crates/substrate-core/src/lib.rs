//! # substrate-core
//!
//! Foundation types and utilities shared by the event store and session
//! orchestrator: branded IDs, the base error taxonomy, tracing setup, retry
//! backoff, and UTF-8–safe string truncation.
//!
//! - **Branded IDs**: [`ids::EventId`], [`ids::SessionId`], [`ids::WorkspaceId`] as newtypes
//! - **Errors**: [`errors::CoreError`] hierarchy via `thiserror`
//! - **Logging**: [`logging::init_tracing`] — structured, env-filtered tracing setup
//! - **Retry**: [`retry::RetryConfig`] and backoff calculation
//! - **Text**: [`text::truncate_str`], [`text::truncate_with_suffix`]
//!
//! ## Crate Position
//!
//! Foundation crate depended on by the rest of the workspace.

#![deny(unsafe_code)]

pub mod constants;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod retry;
pub mod text;
