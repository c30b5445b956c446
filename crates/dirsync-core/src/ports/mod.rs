//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IConfigStore`] - Namespaced key/value persistence for scheduler state and profile settings
//! - [`IDirectoryClient`] - Paged directory searches (LDAP)
//! - [`IIdentityMapper`] - Local identity store fed from directory records
//! - [`IClock`] - Current time

pub mod clock;
pub mod config_store;
pub mod directory_client;
pub mod identity_mapper;

pub use clock::{IClock, SystemClock};
pub use config_store::{load_profile_settings, IConfigStore};
pub use directory_client::{DirectoryError, DirectoryRecord, IDirectoryClient};
pub use identity_mapper::{ApplyOutcome, IIdentityMapper, MapperError};
