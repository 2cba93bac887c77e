//! `custodia-library`: book titles and reader loans.
//!
//! Books are the shared instantiation of the custody engine: any number of
//! readers may hold copies of the same title, loans are the only custody kind,
//! and a fully returned loan is removed (the activity feed keeps the trace).

pub mod book;

pub use book::{Book, BookDetails, BookFilter, BookKind, BookPatch};
