//! Core building blocks: pipeline configuration, grid geometry, folder
//! organization and raster processing stages. These are internal primitives
//! consumed by the high-level `api` module.
pub mod grid;
pub mod organize;
pub mod params;
pub mod processing;
