//! `custodia-assets`: school property (furniture, projectors, lab kits).
//!
//! Assets are the single-holder instantiation of the custody engine: one
//! responsible person at a time, condition tracked, assignment history kept
//! after return.

pub mod asset;

pub use asset::{Asset, AssetDetails, AssetFilter, AssetKind, AssetPatch, AssetType};
