//! Metadata extraction front-ends.
//!
//! # Responsibility
//! - Turn on-disk text into the shared raw property bag shape, through two
//!   front-ends: front-matter blocks for single-entity note files and
//!   symbol-delimited inline metadata for batch lines.
//! - Render validated entities back into their canonical on-disk form.

pub mod front_matter;
pub mod inline;
