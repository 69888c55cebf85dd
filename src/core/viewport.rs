use std::collections::HashSet;
use crate::models::{BoundingBox, Point, PointDetails, Predicate};
use crate::services::store::{PointStore, StoreError};

/// Inclusive `start..=end` slice of an ordered result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub end: usize,
}

impl Window {
    /// Window from optional bounds; both must be present and ordered
    pub fn from_bounds(start: Option<usize>, end: Option<usize>) -> Option<Self> {
        match (start, end) {
            (Some(start), Some(end)) if end >= start => Some(Self { start, end }),
            _ => None,
        }
    }

    /// (offset, limit) of the page containing `start`, pages being `end - start + 1` long
    pub fn page_bounds(&self) -> (usize, usize) {
        let chunk = self.end - self.start + 1;
        let page = 1 + self.start / chunk;
        ((page - 1) * chunk, chunk)
    }
}

/// Points to draw on a map viewport
///
/// Ordered by latitude then longitude, both descending; points sharing
/// exactly the same coordinates collapse to the first one since markers
/// would stack on top of each other.
pub async fn points_in_viewport(
    store: &dyn PointStore,
    bbox: &BoundingBox,
    window: Option<Window>,
    predicates: &[Predicate],
) -> Result<Vec<Point>, StoreError> {
    let mut points = store.find_in_box(bbox, predicates).await?;
    tracing::debug!("bounding box {:?} holds {} points", bbox, points.len());

    points.sort_by(|a, b| {
        b.latitude
            .total_cmp(&a.latitude)
            .then_with(|| b.longitude.total_cmp(&a.longitude))
    });

    if let Some(window) = window {
        let (offset, limit) = window.page_bounds();
        tracing::debug!("window {:?} -> offset {} limit {}", window, offset, limit);
        points = points.into_iter().skip(offset).take(limit).collect();
    }

    Ok(collapse_colocated(points))
}

/// [`points_in_viewport`] with each marker's display attributes
pub async fn markers_in_viewport(
    store: &dyn PointStore,
    bbox: &BoundingBox,
    window: Option<Window>,
    predicates: &[Predicate],
) -> Result<Vec<PointDetails>, StoreError> {
    let points = points_in_viewport(store, bbox, window, predicates).await?;
    if points.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<String> = points.iter().map(|p| p.id.clone()).collect();
    store.details(&ids).await
}

/// Keep the first point at each distinct coordinate pair
pub fn collapse_colocated(points: Vec<Point>) -> Vec<Point> {
    let mut seen = HashSet::with_capacity(points.len());
    points
        .into_iter()
        .filter(|p| seen.insert((p.latitude.to_bits(), p.longitude.to_bits())))
        .collect()
}
