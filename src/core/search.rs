use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use crate::core::distance::{calculate_bounding_box, great_circle_miles, round_to};
use crate::models::{DetailedResult, Point, Predicate, Radius, RangeQuery, RankedResult, Reference, SortOrder, Unit};
use crate::services::store::{PointStore, StoreError};

/// Default decimal places for returned distances
pub const DEFAULT_DECIMALS: u32 = 2;

/// Errors returned by proximity searches
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("No details found for zip code: {0}")]
    PointNotFound(String),

    #[error("Invalid radius: {0}")]
    InvalidRadius(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Ranked output of a range query
#[derive(Debug, Clone, Default)]
pub struct RangeResult {
    pub results: Vec<RankedResult>,
    pub total_candidates: usize,
}

impl RangeResult {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Result identifiers in rank order, e.g. for SQL `IN` lists
    pub fn ids(&self) -> Vec<String> {
        self.results.iter().map(|r| r.id.clone()).collect()
    }
}

/// Point-radius search over a point store
///
/// # Pipeline Stages
/// 1. Resolve the reference point
/// 2. Bounding box pre-filter (pushed down to the store)
/// 3. Exact great-circle distance and radius filter
/// 4. Ordering
///
/// Holds no mutable state; a single instance can serve concurrent queries.
#[derive(Debug, Clone, Copy)]
pub struct ProximitySearch {
    decimals: u32,
}

impl ProximitySearch {
    pub fn new(decimals: u32) -> Self {
        Self { decimals }
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    /// Distance between two stored points, rounded to the configured precision
    ///
    /// Identical identifiers are 0 apart without touching the store.
    pub async fn distance_between(
        &self,
        store: &dyn PointStore,
        a: &str,
        b: &str,
        unit: Unit,
    ) -> Result<f64, SearchError> {
        let (a_id, b_id) = (store.canonical_id(a), store.canonical_id(b));
        if !a_id.is_empty() && a_id == b_id {
            return Ok(0.0);
        }

        let first = resolve(store, a).await?;
        let second = resolve(store, b).await?;

        Ok(self.distance_between_points(&first, &second, unit))
    }

    /// Distance between two known points, rounded to the configured precision
    pub fn distance_between_points(&self, a: &Point, b: &Point, unit: Unit) -> f64 {
        if !a.id.is_empty() && a.id == b.id {
            return 0.0;
        }
        let miles = great_circle_miles(a.latitude, a.longitude, b.latitude, b.longitude);
        round_to(unit.from_miles(miles), self.decimals)
    }

    /// Find every point within the query radius of its reference, ranked
    ///
    /// An empty result is a valid answer, not an error.
    pub async fn zips_in_range(
        &self,
        store: &dyn PointStore,
        query: &RangeQuery,
    ) -> Result<RangeResult, SearchError> {
        let radius = validate_radius(query.radius)?;

        let center = match &query.reference {
            Reference::Id(id) => resolve(store, id).await?,
            Reference::Point(point) => Point {
                id: store.canonical_id(&point.id),
                ..point.clone()
            },
            Reference::Coordinates { latitude, longitude } => Point::new("", *latitude, *longitude),
        };
        let self_id = query.reference.id().map(|_| center.id.clone());

        let mut predicates = query.predicates.clone();
        if !query.include_self {
            if let Some(id) = &self_id {
                predicates.push(Predicate::ExcludeId { id: id.clone() });
            }
        }

        let candidates = match radius {
            Some(r) => {
                let bbox = calculate_bounding_box(center.latitude, center.longitude, query.unit.to_miles(r));
                tracing::debug!("Range {} {:?} around {:?} -> box {:?}", r, query.unit, center.id, bbox);
                let mut candidates = Vec::new();
                for part in bbox.split_at_antimeridian() {
                    candidates.extend(store.find_in_box(&part, &predicates).await?);
                }
                candidates
            }
            None => store.find_all(&predicates).await?,
        };

        let total_candidates = candidates.len();
        let mut seen = HashSet::with_capacity(total_candidates);

        let mut results: Vec<RankedResult> = candidates
            .into_iter()
            .filter(|point| query.include_self || self_id.as_deref() != Some(point.id.as_str()))
            .filter_map(|point| {
                let distance = if self_id.as_deref() == Some(point.id.as_str()) {
                    0.0
                } else {
                    query.unit.from_miles(great_circle_miles(
                        center.latitude,
                        center.longitude,
                        point.latitude,
                        point.longitude,
                    ))
                };

                match radius {
                    Some(r) if distance > r => None,
                    _ => Some(RankedResult {
                        id: point.id,
                        distance: round_to(distance, self.decimals),
                    }),
                }
            })
            .filter(|result| seen.insert(result.id.clone()))
            .collect();

        sort_results(&mut results, query.sort);

        tracing::debug!(
            "{} of {} candidates within range of {:?}",
            results.len(),
            total_candidates,
            center.id
        );

        Ok(RangeResult {
            results,
            total_candidates,
        })
    }

    /// Range query whose results carry the stored row of each point
    ///
    /// Same ranking as [`zips_in_range`](Self::zips_in_range). A point
    /// removed from the store between the two reads is dropped.
    pub async fn detailed_zips_in_range(
        &self,
        store: &dyn PointStore,
        query: &RangeQuery,
    ) -> Result<Vec<DetailedResult>, SearchError> {
        let ranked = self.zips_in_range(store, query).await?;
        if ranked.is_empty() {
            return Ok(Vec::new());
        }

        let mut details: HashMap<String, _> = store
            .details(&ranked.ids())
            .await?
            .into_iter()
            .map(|d| (d.point.id.clone(), d))
            .collect();

        Ok(ranked
            .results
            .into_iter()
            .filter_map(|r| details.remove(&r.id).map(|d| DetailedResult::new(d, r.distance)))
            .collect())
    }
}

impl Default for ProximitySearch {
    fn default() -> Self {
        Self::new(DEFAULT_DECIMALS)
    }
}

async fn resolve(store: &dyn PointStore, id: &str) -> Result<Point, SearchError> {
    store
        .resolve_point(id)
        .await?
        .ok_or_else(|| SearchError::PointNotFound(id.to_string()))
}

/// `Some(r)` for a bounded radius, `None` for unbounded
fn validate_radius(radius: Radius) -> Result<Option<f64>, SearchError> {
    match radius {
        Radius::Unbounded => Ok(None),
        Radius::Within(r) if r.is_finite() && r >= 0.0 => Ok(Some(r)),
        Radius::Within(r) => Err(SearchError::InvalidRadius(r.to_string())),
    }
}

/// Stable sort; ties keep candidate order
fn sort_results(results: &mut [RankedResult], sort: SortOrder) {
    let by_distance = |a: &RankedResult, b: &RankedResult| -> Ordering { a.distance.total_cmp(&b.distance) };
    match sort {
        SortOrder::DistanceAsc => results.sort_by(by_distance),
        SortOrder::DistanceDesc => results.sort_by(|a, b| by_distance(b, a)),
        SortOrder::IdAsc => results.sort_by(|a, b| a.id.cmp(&b.id)),
        SortOrder::IdDesc => results.sort_by(|a, b| b.id.cmp(&a.id)),
    }
}
