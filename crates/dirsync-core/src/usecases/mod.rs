//! Use cases (interactors) for dirsync
//!
//! This module contains the application use cases that orchestrate
//! domain entities and port interfaces. Use cases are thin coordinators
//! that delegate business rules to domain methods and I/O to ports.
//!
//! ## Use Cases
//!
//! - [`FetchBatchUseCase`] - Fetches one page from a profile and applies it to the identity store

pub mod fetch_batch;

pub use fetch_batch::{BatchReport, FetchBatchUseCase, FetchError};
