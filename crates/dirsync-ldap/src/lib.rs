//! dirsync LDAP - Directory client adapter
//!
//! Implements the `IDirectoryClient` port from `dirsync-core` with `ldap3`:
//! simple bind with the profile's agent credentials, optional StartTLS or
//! LDAPS, subtree search below the user base and offset/limit paging.
//!
//! ## Modules
//!
//! - [`client`] - Connection handling, timeouts and error classification
//! - [`entry`] - Conversion of search entries into directory records

pub mod client;
pub mod entry;

pub use client::{server_url, LdapDirectoryClient};
