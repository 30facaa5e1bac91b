//! mechanyx-common: Shared types, errors, and mechanism vectors used across all Mechanyx crates.

pub mod error;
pub mod mechanism;
pub mod catalog;
pub mod labels;
pub mod case;

// Re-export commonly used types
pub use error::{MechanyxError, Result};
pub use mechanism::{Axis, Dimensionality, MechanismVector};
pub use catalog::{CatalogEntry, ReferenceCatalog};
pub use labels::{Direction, DrugClass, LabelProvenance, MarginRule};
pub use case::{Biomarkers, CaseRecord, Mutation, Outcomes};
