//! PAPI — asynchronous media job service.
//!
//! Clients submit a source locator, receive a job id at once and poll while
//! a [`processing::Processor`] runs in the background. Job records live in
//! memory only and are never evicted.

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod orchestrator;
pub mod processing;
pub mod state_machine;
pub mod store;
pub mod ui;
