use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use crate::core::distance::is_within_bounding_box;
use crate::models::{normalize_zip, BoundingBox, Point, PointDetails, Predicate};

/// Errors raised by a point store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Unknown filter field: {0}")]
    UnknownField(String),
}

/// Capability interface over a collection of located points
///
/// Any store able to resolve an identifier and answer box and full-scan
/// queries can back a proximity search.
#[async_trait]
pub trait PointStore: Send + Sync {
    /// Look up a single point by identifier
    async fn resolve_point(&self, id: &str) -> Result<Option<Point>, StoreError>;

    /// All points inside the box (edges inclusive) matching every predicate
    async fn find_in_box(
        &self,
        bbox: &BoundingBox,
        predicates: &[Predicate],
    ) -> Result<Vec<Point>, StoreError>;

    /// All points matching every predicate
    async fn find_all(&self, predicates: &[Predicate]) -> Result<Vec<Point>, StoreError>;

    /// Points for `ids` with their display attributes, in the order of `ids`
    ///
    /// Unknown ids are skipped; a repeated id is returned once.
    async fn details(&self, ids: &[String]) -> Result<Vec<PointDetails>, StoreError>;

    /// The form identifiers take in this store
    fn canonical_id(&self, id: &str) -> String {
        id.trim().to_string()
    }
}

/// Trim an identifier, zero-padding it as a zip code when the source asks for it
pub fn canonical_id(id: &str, pad_ids: bool) -> String {
    if pad_ids {
        normalize_zip(id)
    } else {
        id.trim().to_string()
    }
}

/// A point with free-form attributes that predicates can match on
#[derive(Debug, Clone)]
pub struct StoredPoint {
    pub point: Point,
    pub attributes: HashMap<String, String>,
}

impl StoredPoint {
    pub fn new(point: Point) -> Self {
        Self {
            point,
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(field.into(), value.into());
        self
    }

    fn matches(&self, predicates: &[Predicate], pad_ids: bool) -> bool {
        predicates.iter().all(|predicate| match predicate {
            Predicate::Equals { field, value } => {
                self.attributes.get(field).is_some_and(|v| v.eq_ignore_ascii_case(value))
            }
            Predicate::StartsWith { field, value } => self.attributes.get(field).is_some_and(|v| {
                v.to_ascii_lowercase().starts_with(&value.to_ascii_lowercase())
            }),
            Predicate::ExcludeId { id } => canonical_id(id, pad_ids) != self.point.id,
        })
    }
}

/// In-process point store
///
/// Keeps points in insertion order; query results preserve that order.
/// Ids are kept as given unless the store holds zip codes.
#[derive(Debug, Clone, Default)]
pub struct MemoryPointStore {
    points: Vec<StoredPoint>,
    pad_ids: bool,
}

impl MemoryPointStore {
    pub fn new(points: Vec<StoredPoint>) -> Self {
        Self::build(points, false)
    }

    /// Store of zip codes; short numeric ids get their leading zeros back
    pub fn zip_codes(points: Vec<StoredPoint>) -> Self {
        Self::build(points, true)
    }

    fn build(points: Vec<StoredPoint>, pad_ids: bool) -> Self {
        let points = points
            .into_iter()
            .map(|mut stored| {
                stored.point.id = canonical_id(&stored.point.id, pad_ids);
                stored
            })
            .collect();
        Self { points, pad_ids }
    }

    /// Build a store from bare points with no attributes
    pub fn from_points(points: impl IntoIterator<Item = Point>) -> Self {
        Self::new(points.into_iter().map(StoredPoint::new).collect())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[async_trait]
impl PointStore for MemoryPointStore {
    async fn resolve_point(&self, id: &str) -> Result<Option<Point>, StoreError> {
        let id = self.canonical_id(id);
        Ok(self
            .points
            .iter()
            .find(|stored| stored.point.id == id)
            .map(|stored| stored.point.clone()))
    }

    async fn find_in_box(
        &self,
        bbox: &BoundingBox,
        predicates: &[Predicate],
    ) -> Result<Vec<Point>, StoreError> {
        Ok(self
            .points
            .iter()
            .filter(|stored| {
                is_within_bounding_box(stored.point.latitude, stored.point.longitude, bbox)
            })
            .filter(|stored| stored.matches(predicates, self.pad_ids))
            .map(|stored| stored.point.clone())
            .collect())
    }

    async fn find_all(&self, predicates: &[Predicate]) -> Result<Vec<Point>, StoreError> {
        Ok(self
            .points
            .iter()
            .filter(|stored| stored.matches(predicates, self.pad_ids))
            .map(|stored| stored.point.clone())
            .collect())
    }

    async fn details(&self, ids: &[String]) -> Result<Vec<PointDetails>, StoreError> {
        let mut seen = HashSet::with_capacity(ids.len());
        Ok(ids
            .iter()
            .map(|id| self.canonical_id(id))
            .filter(|id| seen.insert(id.clone()))
            .filter_map(|id| self.points.iter().find(|stored| stored.point.id == id))
            .map(|stored| PointDetails {
                point: stored.point.clone(),
                attributes: stored.attributes.clone().into_iter().collect(),
            })
            .collect())
    }

    fn canonical_id(&self, id: &str) -> String {
        canonical_id(id, self.pad_ids)
    }
}
