//! Raster processing stages: resampling kernels, band compositing, reprojection,
//! merging and mosaicking.
pub mod composite;
pub mod merge;
pub mod mosaic;
pub mod reproject;
pub mod resample;
