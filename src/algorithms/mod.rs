//! Geodesic algorithms

pub mod haversine;

pub use haversine::{haversine_distance, initial_bearing, local_offset, CompassDirection};
