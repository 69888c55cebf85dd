use actix_web::{web, HttpResponse, Responder};
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;
use crate::core::{find_zip_in_text, markers_in_viewport, ProximitySearch, SearchError, Window};
use crate::models::{
    BoundingBox, BoxRequest, BoxResponse, DetailedRangeResponse, DistanceRequest, DistanceResponse, ErrorResponse,
    HealthResponse, TextLookupRequest, TextLookupResponse, Unit, ZipsInRangeRequest,
    ZipsInRangeResponse,
};
use crate::services::{CacheKey, CacheManager, PointStore, PostgresClient, StoreError};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub search: ProximitySearch,
    pub stores: HashMap<String, Arc<dyn PointStore>>,
    pub default_source: String,
    pub default_unit: Unit,
    pub cache: Arc<CacheManager>,
    pub postgres: Option<Arc<PostgresClient>>,
}

impl AppState {
    fn store(&self, source: Option<&str>) -> Result<(&str, &Arc<dyn PointStore>), HttpResponse> {
        let name = source.unwrap_or(self.default_source.as_str());
        self.stores
            .get_key_value(name)
            .map(|(name, store)| (name.as_str(), store))
            .ok_or_else(|| {
                bad_request("Unknown source", format!("No point source named {:?}", name))
            })
    }
}

/// Configure all zip-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/zips/in-range", web::post().to(zips_in_range))
        .route("/zips/in-range/detailed", web::post().to(detailed_zips_in_range))
        .route("/zips/distance", web::post().to(distance))
        .route("/zips/from-text", web::get().to(zip_from_text))
        .route("/points/box", web::get().to(points_in_box));
}

fn bad_request(error: &str, message: String) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        error: error.to_string(),
        message,
        status_code: 400,
    })
}

fn search_error_response(err: SearchError) -> HttpResponse {
    match err {
        SearchError::PointNotFound(id) => HttpResponse::NotFound().json(ErrorResponse {
            error: "Point not found".to_string(),
            message: format!("No details found for zip code: {}", id),
            status_code: 404,
        }),
        SearchError::InvalidRadius(msg) => bad_request("Invalid radius", msg),
        SearchError::Store(e) => store_error_response(e),
    }
}

fn store_error_response(err: StoreError) -> HttpResponse {
    match err {
        StoreError::UnknownField(field) => {
            bad_request("Invalid filter", format!("Cannot filter on field {:?}", field))
        }
        e => {
            tracing::error!("Point store failure: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Point store failure".to_string(),
                message: e.to_string(),
                status_code: 500,
            })
        }
    }
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let healthy = match &state.postgres {
        Some(pg) => pg.health_check().await.unwrap_or(false),
        None => true,
    };

    let status = if healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Zips in range endpoint
///
/// POST /api/v1/zips/in-range
///
/// Request body:
/// ```json
/// {
///   "zip": "04072",
///   "radius": 25,
///   "unit": "miles",
///   "sort": "distance_asc",
///   "includeSelf": true,
///   "source": "zip_code",
///   "filters": [{"op": "equals", "field": "state_prefix", "value": "ME"}]
/// }
/// ```
async fn zips_in_range(
    state: web::Data<AppState>,
    req: web::Json<ZipsInRangeRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for zips_in_range request: {:?}", errors);
        return bad_request("Validation failed", errors.to_string());
    }

    let (source, store) = match state.store(req.source.as_deref()) {
        Ok(found) => found,
        Err(response) => return response,
    };

    let cache_key = match CacheKey::zips_in_range(source, &req) {
        Ok(key) => Some(key),
        Err(e) => {
            tracing::warn!("Failed to build cache key: {}", e);
            None
        }
    };

    if let Some(key) = &cache_key {
        if let Ok(cached) = state.cache.get::<ZipsInRangeResponse>(key).await {
            return HttpResponse::Ok().json(cached);
        }
    }

    let query = req.to_query(state.default_unit);
    tracing::info!(
        "Zips in range: source={}, reference={:?}, radius={}, unit={:?}",
        source,
        query.reference,
        query.radius,
        query.unit
    );

    let result = match state.search.zips_in_range(store.as_ref(), &query).await {
        Ok(result) => result,
        Err(e) => return search_error_response(e),
    };

    let response = ZipsInRangeResponse {
        results: result.results,
        unit: query.unit,
        total_candidates: result.total_candidates,
    };

    if let Some(key) = &cache_key {
        if let Err(e) = state.cache.set(key, &response).await {
            tracing::warn!("Failed to cache zips in range: {}", e);
        }
    }

    tracing::info!(
        "Returning {} results (from {} candidates)",
        response.results.len(),
        response.total_candidates
    );

    HttpResponse::Ok().json(response)
}

/// Detailed zips in range endpoint
///
/// POST /api/v1/zips/in-range/detailed
///
/// Same body as `/zips/in-range`; each result carries the display columns
/// of its source. Add `{"op": "equals", "field": "z_primary", "value": "PRIMARY"}`
/// to keep primary zip records only.
async fn detailed_zips_in_range(
    state: web::Data<AppState>,
    req: web::Json<ZipsInRangeRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for detailed zips_in_range request: {:?}", errors);
        return bad_request("Validation failed", errors.to_string());
    }

    let (source, store) = match state.store(req.source.as_deref()) {
        Ok(found) => found,
        Err(response) => return response,
    };

    let cache_key = CacheKey::detailed_zips_in_range(source, &req).ok();
    if let Some(key) = &cache_key {
        if let Ok(cached) = state.cache.get::<DetailedRangeResponse>(key).await {
            return HttpResponse::Ok().json(cached);
        }
    }

    let query = req.to_query(state.default_unit);
    let results = match state.search.detailed_zips_in_range(store.as_ref(), &query).await {
        Ok(results) => results,
        Err(e) => return search_error_response(e),
    };

    tracing::info!("Returning {} detailed results from {}", results.len(), source);

    let response = DetailedRangeResponse {
        results,
        unit: query.unit,
    };

    if let Some(key) = &cache_key {
        if let Err(e) = state.cache.set(key, &response).await {
            tracing::warn!("Failed to cache detailed zips in range: {}", e);
        }
    }

    HttpResponse::Ok().json(response)
}

/// Distance endpoint
///
/// POST /api/v1/zips/distance
///
/// Request body:
/// ```json
/// { "from": "04072", "to": "03801", "unit": "kilometers" }
/// ```
async fn distance(
    state: web::Data<AppState>,
    req: web::Json<DistanceRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return bad_request("Validation failed", errors.to_string());
    }

    let (source, store) = match state.store(req.source.as_deref()) {
        Ok(found) => found,
        Err(response) => return response,
    };

    let unit = req.unit.unwrap_or(state.default_unit);
    let unit_name = format!("{:?}", unit).to_lowercase();
    let cache_key = CacheKey::distance(source, &req.from, &req.to, &unit_name);

    let distance = match state.cache.get::<f64>(&cache_key).await {
        Ok(cached) => cached,
        Err(_) => {
            let distance = match state
                .search
                .distance_between(store.as_ref(), &req.from, &req.to, unit)
                .await
            {
                Ok(d) => d,
                Err(e) => return search_error_response(e),
            };
            if let Err(e) = state.cache.set(&cache_key, &distance).await {
                tracing::warn!("Failed to cache distance: {}", e);
            }
            distance
        }
    };

    tracing::debug!("Distance {} -> {}: {} {}", req.from, req.to, distance, unit_name);

    HttpResponse::Ok().json(DistanceResponse {
        from: req.from.clone(),
        to: req.to.clone(),
        distance,
        unit,
    })
}

/// Viewport endpoint
///
/// GET /api/v1/points/box?source=locations&swLat=43.0&swLon=-71.0&neLat=44.0&neLon=-70.0&start=0&end=49
async fn points_in_box(
    state: web::Data<AppState>,
    query: web::Query<BoxRequest>,
) -> impl Responder {
    if let Err(errors) = query.validate() {
        return bad_request("Validation failed", errors.to_string());
    }

    let (_, store) = match state.store(query.source.as_deref()) {
        Ok(found) => found,
        Err(response) => return response,
    };

    let bbox = BoundingBox::from_corners((query.sw_lat, query.sw_lon), (query.ne_lat, query.ne_lon));
    let window = Window::from_bounds(query.start, query.end);

    match markers_in_viewport(store.as_ref(), &bbox, window, &[]).await {
        Ok(points) => HttpResponse::Ok().json(BoxResponse {
            count: points.len(),
            points,
        }),
        Err(e) => store_error_response(e),
    }
}

/// Free-text zip lookup
///
/// GET /api/v1/zips/from-text?q=Saco,%20ME%2004072
async fn zip_from_text(query: web::Query<TextLookupRequest>) -> impl Responder {
    if let Err(errors) = query.validate() {
        return bad_request("Validation failed", errors.to_string());
    }

    match find_zip_in_text(&query.q) {
        Some(zip) => HttpResponse::Ok().json(TextLookupResponse { zip }),
        None => HttpResponse::NotFound().json(ErrorResponse {
            error: "Zip not found".to_string(),
            message: format!("No zip code found in {:?}", query.q),
            status_code: 404,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App};
    use crate::models::Point;
    use crate::services::{MemoryPointStore, StoredPoint};

    fn state() -> AppState {
        let zips: Arc<dyn PointStore> = Arc::new(MemoryPointStore::zip_codes(vec![
            StoredPoint::new(Point::new("04072", 43.5009, -70.4428)).with_attribute("city", "Saco"),
            StoredPoint::new(Point::new("04005", 43.4926, -70.4534)).with_attribute("city", "Biddeford"),
            StoredPoint::new(Point::new("04101", 43.6591, -70.2568)).with_attribute("city", "Portland"),
        ]));
        let locations: Arc<dyn PointStore> = Arc::new(MemoryPointStore::new(vec![
            StoredPoint::new(Point::new("12", 43.6600, -70.2600)).with_attribute("name", "Harbor Lights"),
            StoredPoint::new(Point::new("7", 43.5000, -70.4400)).with_attribute("name", "Saco Pier"),
        ]));
        let mut stores = HashMap::new();
        stores.insert("zip_code".to_string(), zips);
        stores.insert("locations".to_string(), locations);

        AppState {
            search: ProximitySearch::default(),
            stores,
            default_source: "zip_code".to_string(),
            default_unit: Unit::Miles,
            cache: Arc::new(CacheManager::in_memory(100, 60)),
            postgres: None,
        }
    }

    #[actix_web::test]
    async fn test_zips_in_range_endpoint() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/zips/in-range")
            .set_json(serde_json::json!({"zip": "04072", "radius": 5, "includeSelf": false}))
            .to_request();
        let body: ZipsInRangeResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.results.len(), 1);
        assert_eq!(body.results[0].id, "04005");
        assert_eq!(body.unit, Unit::Miles);
    }

    #[actix_web::test]
    async fn test_detailed_zips_in_range_endpoint() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/zips/in-range/detailed")
            .set_json(serde_json::json!({"zip": "4072", "radius": 20, "sort": "id_asc"}))
            .to_request();
        let body: DetailedRangeResponse = test::call_and_read_body_json(&app, req).await;

        let ids: Vec<&str> = body.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["04005", "04072", "04101"]);
        assert_eq!(body.results[2].attributes.get("city").map(String::as_str), Some("Portland"));
        assert_eq!(body.results[1].distance, 0.0);
    }

    #[actix_web::test]
    async fn test_points_box_returns_location_markers() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/points/box?source=locations&swLat=43.0&swLon=-71.0&neLat=44.0&neLon=-70.0")
            .to_request();
        let body: BoxResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.count, 2);
        assert_eq!(body.points[0].point.id, "12");
        assert_eq!(body.points[0].attributes.get("name").map(String::as_str), Some("Harbor Lights"));
        assert_eq!(body.points[1].point.id, "7");
    }

    #[actix_web::test]
    async fn test_unknown_zip_is_404() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/zips/distance")
            .set_json(serde_json::json!({"from": "04072", "to": "99999"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_unknown_source_is_400() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/zips/in-range")
            .set_json(serde_json::json!({"zip": "04072", "radius": "all", "source": "nope"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_zip_from_text() {
        let app = test::init_service(App::new().configure(configure)).await;

        let req = test::TestRequest::get()
            .uri("/zips/from-text?q=Saco%2C%20ME%2004072-1234")
            .to_request();
        let body: TextLookupResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.zip, "04072");
    }

    #[::core::prelude::v1::test]
    fn test_health_check_response() {
        let response = HealthResponse {
            status: "healthy".to_string(),
            version: "0.1.0".to_string(),
            timestamp: chrono::Utc::now(),
        };

        assert_eq!(response.status, "healthy");
    }
}
