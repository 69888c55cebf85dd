// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    normalize_zip, BoundingBox, DetailedResult, Point, PointDetails, Predicate, Radius, RangeQuery, RankedResult, Reference,
    SortOrder, Unit, MILES_TO_KM,
};
pub use requests::{BoxRequest, DistanceRequest, TextLookupRequest, ZipsInRangeRequest};
pub use responses::{
    BoxResponse, DetailedRangeResponse, DistanceResponse, ErrorResponse, HealthResponse, TextLookupResponse,
    ZipsInRangeResponse,
};
