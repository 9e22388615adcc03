//! Domain model for reconciled entities.
//!
//! # Responsibility
//! - Define the raw and validated property value shapes shared by both
//!   extractors and the validator.
//! - Define the per-class records mirrored into the index.

pub mod records;
pub mod value;
