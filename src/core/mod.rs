// Core algorithm exports
pub mod distance;
pub mod search;
pub mod text;
pub mod viewport;

pub use distance::{great_circle_miles, calculate_bounding_box, is_within_bounding_box, round_to};
pub use search::{ProximitySearch, RangeResult, SearchError, DEFAULT_DECIMALS};
pub use text::find_zip_in_text;
pub use viewport::{markers_in_viewport, points_in_viewport, collapse_colocated, Window};
