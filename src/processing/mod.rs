// src/processing/mod.rs
pub mod composite;
pub mod ndvi;

// Re-export main components
pub use composite::{median, median_composite};
pub use ndvi::{CloudMask, Ndvi, DEFAULT_MASK_CODES};
