//! Brand catalog reference data.
//!
//! The closed set of brands a line item may carry. The set ships with
//! defaults and is extensible through configuration, never through free-form
//! operator input.

pub mod brand;

pub use brand::{Brand, BrandCatalog, BrandTag};
