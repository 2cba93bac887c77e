//! `custodia-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! the error taxonomy, strongly-typed identifiers and small value objects shared
//! by the asset, library and user modules.

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{CustodyId, ResourceId, UserId};
pub use value_object::{Quantity, ValueObject};
