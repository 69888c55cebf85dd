use geo::{coord, Rect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Miles to kilometers conversion factor
pub const MILES_TO_KM: f64 = 1.609344;

/// A stored location: zip code or location id plus coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Point {
    pub fn new(id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.into(),
            latitude,
            longitude,
        }
    }
}

/// Left-pad purely numeric identifiers to five digits.
///
/// Zip codes stored as integers lose their leading zero ("4072" for "04072").
pub fn normalize_zip(id: &str) -> String {
    let trimmed = id.trim();
    if !trimmed.is_empty() && trimmed.len() < 5 && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        format!("{:0>5}", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Where a range query is centred
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    /// Identifier to resolve through the point store
    Id(String),
    /// A point already known to the caller
    Point(Point),
    /// Raw coordinates with no identifier
    Coordinates { latitude: f64, longitude: f64 },
}

impl Reference {
    /// Identifier of the reference, if it has one; blank ids count as none
    pub fn id(&self) -> Option<&str> {
        let id = match self {
            Reference::Id(id) => id.as_str(),
            Reference::Point(point) => point.id.as_str(),
            Reference::Coordinates { .. } => return None,
        };
        Some(id).filter(|id| !id.trim().is_empty())
    }
}

/// Distance unit for query radius and results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[default]
    #[serde(alias = "m", alias = "mi")]
    Miles,
    #[serde(alias = "k", alias = "km")]
    Kilometers,
}

impl Unit {
    /// Convert a distance in miles into this unit
    #[inline]
    pub fn from_miles(self, miles: f64) -> f64 {
        match self {
            Unit::Miles => miles,
            Unit::Kilometers => miles * MILES_TO_KM,
        }
    }

    /// Convert a distance in this unit into miles
    #[inline]
    pub fn to_miles(self, value: f64) -> f64 {
        match self {
            Unit::Miles => value,
            Unit::Kilometers => value / MILES_TO_KM,
        }
    }
}

/// Result ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    DistanceAsc,
    DistanceDesc,
    IdAsc,
    IdDesc,
}

/// Search radius; `"all"` on the wire means unbounded
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RadiusInput", into = "RadiusInput")]
pub enum Radius {
    Within(f64),
    Unbounded,
}

impl Radius {
    /// Validate a numeric radius
    pub fn within(value: f64) -> Result<Self, String> {
        if !value.is_finite() {
            return Err(format!("radius must be a finite number, got {}", value));
        }
        if value < 0.0 {
            return Err(format!("radius must not be negative, got {}", value));
        }
        Ok(Radius::Within(value))
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, Radius::Unbounded)
    }
}

impl FromStr for Radius {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Radius::Unbounded);
        }
        let value: f64 = s
            .parse()
            .map_err(|_| format!("radius must be a number or \"all\", got {:?}", s))?;
        Radius::within(value)
    }
}

impl fmt::Display for Radius {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Radius::Within(value) => write!(f, "{}", value),
            Radius::Unbounded => f.write_str("all"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RadiusInput {
    Number(f64),
    Text(String),
}

impl TryFrom<RadiusInput> for Radius {
    type Error = String;

    fn try_from(value: RadiusInput) -> Result<Self, Self::Error> {
        match value {
            RadiusInput::Number(n) => Radius::within(n),
            RadiusInput::Text(s) => s.parse(),
        }
    }
}

impl From<Radius> for RadiusInput {
    fn from(value: Radius) -> Self {
        match value {
            Radius::Within(n) => RadiusInput::Number(n),
            Radius::Unbounded => RadiusInput::Text("all".to_string()),
        }
    }
}

/// Extra candidate filter ANDed with the bounding box
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    Equals { field: String, value: String },
    StartsWith { field: String, value: String },
    ExcludeId { id: String },
}

/// Geospatial bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Box spanning two opposite corners given as (lat, lon), in either order
    pub fn from_corners(a: (f64, f64), b: (f64, f64)) -> Self {
        Rect::new(coord! { x: a.1, y: a.0 }, coord! { x: b.1, y: b.0 }).into()
    }
}

impl BoundingBox {
    /// Split a box whose longitudes run past ±180 into boxes that don't
    pub fn split_at_antimeridian(&self) -> Vec<BoundingBox> {
        if self.min_lon < -180.0 {
            vec![
                BoundingBox { min_lon: -180.0, ..*self },
                BoundingBox { min_lon: self.min_lon + 360.0, max_lon: 180.0, ..*self },
            ]
        } else if self.max_lon > 180.0 {
            vec![
                BoundingBox { max_lon: 180.0, ..*self },
                BoundingBox { min_lon: -180.0, max_lon: self.max_lon - 360.0, ..*self },
            ]
        } else {
            vec![*self]
        }
    }
}

impl From<Rect<f64>> for BoundingBox {
    fn from(rect: Rect<f64>) -> Self {
        Self {
            min_lat: rect.min().y,
            max_lat: rect.max().y,
            min_lon: rect.min().x,
            max_lon: rect.max().x,
        }
    }
}

/// A point-radius query
#[derive(Debug, Clone)]
pub struct RangeQuery {
    pub reference: Reference,
    pub radius: Radius,
    pub unit: Unit,
    pub sort: SortOrder,
    pub include_self: bool,
    pub predicates: Vec<Predicate>,
}

impl RangeQuery {
    /// Query with default unit (miles), order (distance ascending) and include_self
    pub fn new(reference: Reference, radius: Radius) -> Self {
        Self {
            reference,
            radius,
            unit: Unit::default(),
            sort: SortOrder::default(),
            include_self: true,
            predicates: Vec::new(),
        }
    }

    pub fn unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    pub fn sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn include_self(mut self, include_self: bool) -> Self {
        self.include_self = include_self;
        self
    }

    pub fn predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }
}

/// A point identifier with its rounded distance from the reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub id: String,
    pub distance: f64,
}

/// A point with the display columns of its source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointDetails {
    #[serde(flatten)]
    pub point: Point,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl PointDetails {
    pub fn new(point: Point) -> Self {
        Self {
            point,
            attributes: BTreeMap::new(),
        }
    }
}

/// A ranked result joined back with its stored row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedResult {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub distance: f64,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl DetailedResult {
    pub fn new(details: PointDetails, distance: f64) -> Self {
        Self {
            id: details.point.id,
            latitude: details.point.latitude,
            longitude: details.point.longitude,
            distance,
            attributes: details.attributes,
        }
    }
}
