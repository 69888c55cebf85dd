use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};
use crate::models::domain::{Point, Predicate, Radius, RangeQuery, Reference, SortOrder, Unit};

/// Request to find zip codes within range of a reference
///
/// The reference is either `zip` (resolved through the source) or a
/// `latitude`/`longitude` pair.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_reference"))]
pub struct ZipsInRangeRequest {
    #[serde(alias = "zip_code")]
    pub zip: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
    pub radius: Radius,
    #[serde(default)]
    pub unit: Option<Unit>,
    #[serde(default)]
    pub sort: SortOrder,
    #[serde(default = "default_true", alias = "include_self", rename = "includeSelf")]
    pub include_self: bool,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub filters: Vec<Predicate>,
}

fn default_true() -> bool {
    true
}

fn validate_reference(req: &ZipsInRangeRequest) -> Result<(), ValidationError> {
    match (&req.zip, req.latitude, req.longitude) {
        (Some(zip), _, _) if !zip.trim().is_empty() => Ok(()),
        (_, Some(_), Some(_)) => Ok(()),
        _ => Err(ValidationError::new("reference_required")
            .with_message("either zip or latitude and longitude are required".into())),
    }
}

impl ZipsInRangeRequest {
    /// Build the core query, falling back to `default_unit`
    pub fn to_query(&self, default_unit: Unit) -> RangeQuery {
        let reference = match (&self.zip, self.latitude, self.longitude) {
            (Some(zip), Some(lat), Some(lon)) => Reference::Point(Point::new(zip.trim(), lat, lon)),
            (Some(zip), _, _) => Reference::Id(zip.trim().to_string()),
            (None, Some(lat), Some(lon)) => Reference::Coordinates {
                latitude: lat,
                longitude: lon,
            },
            // rejected by validation
            (None, _, _) => Reference::Id(String::new()),
        };

        RangeQuery {
            reference,
            radius: self.radius,
            unit: self.unit.unwrap_or(default_unit),
            sort: self.sort,
            include_self: self.include_self,
            predicates: self.filters.clone(),
        }
    }
}

/// Request for the distance between two zip codes
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DistanceRequest {
    #[validate(length(min = 1))]
    pub from: String,
    #[validate(length(min = 1))]
    pub to: String,
    #[serde(default)]
    pub unit: Option<Unit>,
    #[serde(default)]
    pub source: Option<String>,
}

/// Map viewport query, south-west and north-east corners
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BoxRequest {
    #[serde(default)]
    pub source: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub sw_lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub sw_lon: f64,
    #[validate(range(min = -90.0, max = 90.0))]
    pub ne_lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub ne_lon: f64,
    pub start: Option<usize>,
    pub end: Option<usize>,
}

/// Free-text zip lookup
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TextLookupRequest {
    #[validate(length(min = 1))]
    pub q: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_by_zip() {
        let req: ZipsInRangeRequest =
            serde_json::from_str(r#"{"zip":"04072","radius":25,"sort":"id_desc"}"#).unwrap();
        assert!(req.validate().is_ok());

        let query = req.to_query(Unit::Kilometers);
        assert_eq!(query.reference, Reference::Id("04072".to_string()));
        assert_eq!(query.unit, Unit::Kilometers);
        assert_eq!(query.radius, Radius::Within(25.0));
        assert_eq!(query.sort, SortOrder::IdDesc);
        assert!(query.include_self);
    }

    #[test]
    fn test_request_by_coordinates() {
        let req: ZipsInRangeRequest = serde_json::from_str(
            r#"{"latitude":43.5,"longitude":-70.4,"radius":"all","includeSelf":false,"unit":"kilometers"}"#,
        )
        .unwrap();
        assert!(req.validate().is_ok());

        let query = req.to_query(Unit::Miles);
        assert!(matches!(query.reference, Reference::Coordinates { .. }));
        assert!(query.radius.is_unbounded());
        assert_eq!(query.unit, Unit::Kilometers);
        assert!(!query.include_self);
    }

    #[test]
    fn test_request_without_reference_fails_validation() {
        let req: ZipsInRangeRequest = serde_json::from_str(r#"{"radius":10}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_request_out_of_range_latitude() {
        let req: ZipsInRangeRequest =
            serde_json::from_str(r#"{"latitude":123.0,"longitude":0.0,"radius":10}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_request_negative_radius_rejected() {
        assert!(serde_json::from_str::<ZipsInRangeRequest>(r#"{"zip":"04072","radius":-5}"#).is_err());
    }
}
