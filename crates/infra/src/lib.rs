//! Infrastructure layer: stores, services, config and background workers.
//!
//! The custody engine itself is pure; this crate gives it row-locked storage
//! (in-memory or Postgres), publishes committed events and wires accounts in.

pub mod activity;
pub mod config;
pub mod custody_service;
pub mod error;
pub mod store;
pub mod user_service;
pub mod workers;


pub use custody_service::{CustodyLookup, CustodyService, Holding, Outcome};
pub use error::{ServiceError, ServiceResult, StoreError};
pub use user_service::{IssuedToken, UserService};
