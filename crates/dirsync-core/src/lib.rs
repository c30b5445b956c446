//! dirsync Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `ProfilePrefix`, `CycleState`, `BatchResult`, `ProfileSettings`
//! - **Interval estimator** - `recompute_interval` and `IntervalBounds`
//! - **Use cases** - `FetchBatchUseCase`
//! - **Port definitions** - Traits for adapters: `IDirectoryClient`, `IIdentityMapper`,
//!   `IConfigStore`, `IClock`
//! - **Configuration** - YAML-backed `Config`
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no external dependencies.
//! Ports define trait interfaces that adapter crates implement.
//! Use cases orchestrate domain types through port interfaces.

pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
