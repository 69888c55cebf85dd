use actix_cors::Cors;
use actix_web::{error, middleware, web, App, HttpResponse, HttpServer};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, error};
use tracing_subscriber::EnvFilter;
use zippy_geo::config::{LoggingSettings, Settings};
use zippy_geo::core::ProximitySearch;
use zippy_geo::models::ErrorResponse;
use zippy_geo::routes::{self, zips::AppState};
use zippy_geo::services::{CacheManager, PointStore, PostgresClient};

/// Reject a malformed body or query string with the usual error payload
fn payload_error(kind: &str, err: impl std::fmt::Display + std::fmt::Debug + 'static) -> actix_web::Error {
    let response = HttpResponse::BadRequest().json(ErrorResponse {
        error: kind.to_string(),
        message: err.to_string(),
        status_code: 400,
    });
    error::InternalError::from_response(err, response).into()
}

fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    info!("Rejected JSON body on {}: {}", req.path(), err);
    payload_error("Invalid JSON", err)
}

fn handle_query_payload_error(err: error::QueryPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    info!("Rejected query string on {}: {}", req.path(), err);
    payload_error("Invalid query", err)
}

fn init_logging(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if logging.format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

fn startup_error(context: &str, e: impl std::fmt::Display) -> std::io::Error {
    error!("{}: {}", context, e);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, e))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    let settings = Settings::load().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    init_logging(&settings.logging);

    info!("Starting Zippy Geo proximity service...");

    // Initialize cache manager (Redis is optional)
    let cache_ttl = settings.cache.ttl_secs.unwrap_or(300);
    let l1_size = settings.cache.l1_cache_size.unwrap_or(1000);

    let cache = match &settings.cache.redis_url {
        Some(url) => match CacheManager::new(url, l1_size, cache_ttl).await {
            Ok(c) => {
                info!("Result cache: {} entries in process, redis behind, TTL {}s", l1_size, cache_ttl);
                c
            }
            Err(e) => {
                error!("Failed to connect to Redis ({}), running with in-process cache only", e);
                CacheManager::in_memory(l1_size, cache_ttl)
            }
        },
        None => {
            info!("Result cache: {} entries in process, no redis, TTL {}s", l1_size, cache_ttl);
            CacheManager::in_memory(l1_size, cache_ttl)
        }
    };

    let postgres = PostgresClient::from_settings(
        &settings.database.url,
        settings.database.max_connections,
        settings.database.min_connections,
        settings.database.acquire_timeout_secs,
        settings.database.idle_timeout_secs,
    )
    .await
    .map_err(|e| startup_error("PostgreSQL connection error", e))?;

    info!("PostgreSQL client initialized");

    let mut stores: HashMap<String, Arc<dyn PointStore>> = HashMap::new();
    for source in &settings.sources {
        let store = postgres
            .store(source.spec())
            .map_err(|e| startup_error(&format!("Invalid source {}", source.name), e))?;
        info!("Point source {} -> table {}", source.name, source.table);
        stores.insert(source.name.clone(), Arc::new(store));
    }

    if !stores.contains_key(&settings.search.default_source) {
        return Err(startup_error(
            "Configuration error",
            format!("default source {} is not configured", settings.search.default_source),
        ));
    }

    let search = ProximitySearch::new(settings.search.decimals);

    info!(
        "Proximity search initialized ({} decimals, default unit {:?})",
        settings.search.decimals, settings.search.default_unit
    );

    let state = web::Data::new(AppState {
        search,
        stores,
        default_source: settings.search.default_source.clone(),
        default_unit: settings.search.default_unit,
        cache: Arc::new(cache),
        postgres: Some(Arc::new(postgres)),
    });

    // Configure HTTP server
    let bind = (settings.server.host.clone(), settings.server.port);
    let workers = settings.server.workers.unwrap_or(4);

    info!("Listening on {}:{} with {} workers", bind.0, bind.1, workers);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind(bind)?
    .run()
    .await
}
