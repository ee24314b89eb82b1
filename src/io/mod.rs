// src/io/mod.rs
pub mod catalog;
pub mod fields;
pub mod reader;
pub mod writer;

pub use catalog::{Catalog, CatalogEntry, CatalogSource};
pub use fields::{load_fields, parse_fields};
pub use reader::{read_band, read_band_window, read_bands_parallel, read_grid, BandRequest};
pub use writer::write_raster;
