//! Preprocessing: section normalization and structural signal derivation.

pub mod cleaner;
pub mod structure;

pub use cleaner::{NormalizedSection, TextCleaner};
pub use structure::{DocumentFeatures, StructureDetector};
