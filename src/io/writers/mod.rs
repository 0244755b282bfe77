//! GeoTIFF output and embedded provenance metadata.
pub mod metadata;
pub mod tiff;

pub use tiff::write_tiff;
