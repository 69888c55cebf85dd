//! Zippy Geo - zip code and location proximity search
//!
//! Finds every stored point within a radius of a reference zip code or
//! coordinate pair. A cheap bounding box narrows the candidate set in the
//! store; exact great-circle distances then filter and rank what is left.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{ProximitySearch, RangeResult, SearchError, distance::{great_circle_miles, calculate_bounding_box}};
pub use models::{Point, Radius, RangeQuery, RankedResult, Reference, SortOrder, Unit};
pub use services::{PointStore, MemoryPointStore, StoreError};
