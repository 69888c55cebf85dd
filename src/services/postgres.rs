use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::time::Duration;
use std::collections::{BTreeMap, HashSet};
use crate::models::{normalize_zip, BoundingBox, Point, PointDetails, Predicate};
use crate::services::store::{canonical_id, PointStore, StoreError};

/// Table layout of a point source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub table: String,
    pub id_column: String,
    pub lat_column: String,
    pub lon_column: String,
    /// Columns callers may filter on
    pub filter_columns: Vec<String>,
    /// Columns returned alongside each point in detailed results
    pub display_columns: Vec<String>,
    /// Ids are zip codes that may have lost their leading zeros
    pub pad_ids: bool,
}

impl SourceSpec {
    /// The bundled `zip_code` table
    pub fn zip_codes() -> Self {
        Self {
            table: "zip_code".to_string(),
            id_column: "zip_code".to_string(),
            lat_column: "lat".to_string(),
            lon_column: "lon".to_string(),
            filter_columns: vec![
                "city".to_string(),
                "state_prefix".to_string(),
                "county".to_string(),
                "z_primary".to_string(),
            ],
            display_columns: vec![
                "city".to_string(),
                "state_prefix".to_string(),
                "county".to_string(),
                "z_primary".to_string(),
            ],
            pad_ids: true,
        }
    }

    /// Check every configured identifier is a plain SQL identifier
    fn validate(&self) -> Result<(), StoreError> {
        let identifiers = [&self.table, &self.id_column, &self.lat_column, &self.lon_column];
        let columns = self.filter_columns.iter().chain(self.display_columns.iter());
        for ident in identifiers.into_iter().chain(columns) {
            if !is_plain_identifier(ident) {
                return Err(StoreError::UnknownField(ident.clone()));
            }
        }
        Ok(())
    }
}

fn is_plain_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Shared PostgreSQL connection pool
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout_secs: u64,
        idle_timeout_secs: u64,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(idle_timeout_secs))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, StoreError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            acquire_timeout_secs.unwrap_or(5),
            idle_timeout_secs.unwrap_or(600),
        )
        .await
    }

    /// Point store over one table of this database
    pub fn store(&self, spec: SourceSpec) -> Result<PostgresPointStore, StoreError> {
        spec.validate()?;
        Ok(PostgresPointStore {
            pool: self.pool.clone(),
            spec,
        })
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

/// Point store backed by a PostgreSQL table
pub struct PostgresPointStore {
    pool: PgPool,
    spec: SourceSpec,
}

impl PostgresPointStore {
    fn select(&self) -> QueryBuilder<'static, Postgres> {
        self.select_with(&[])
    }

    /// `SELECT` of id, lat, lon plus `extra` columns as text
    fn select_with(&self, extra: &[String]) -> QueryBuilder<'static, Postgres> {
        let extra: String = extra
            .iter()
            .map(|column| format!(", CAST({0} AS TEXT) AS {0}", column))
            .collect();

        QueryBuilder::new(format!(
            "SELECT CAST({id} AS TEXT) AS id, \
             CAST({lat} AS DOUBLE PRECISION) AS lat, \
             CAST({lon} AS DOUBLE PRECISION) AS lon{extra} \
             FROM {table} WHERE 1 = 1",
            id = self.spec.id_column,
            lat = self.spec.lat_column,
            lon = self.spec.lon_column,
            extra = extra,
            table = self.spec.table,
        ))
    }

    fn push_predicates(
        &self,
        query: &mut QueryBuilder<'static, Postgres>,
        predicates: &[Predicate],
    ) -> Result<(), StoreError> {
        for predicate in predicates {
            match predicate {
                Predicate::Equals { field, value } => {
                    let column = self.filter_column(field)?;
                    query.push(format!(" AND LOWER(CAST({} AS TEXT)) = LOWER(", column));
                    query.push_bind(value.clone());
                    query.push(")");
                }
                Predicate::StartsWith { field, value } => {
                    let column = self.filter_column(field)?;
                    query.push(format!(" AND CAST({} AS TEXT) ILIKE ", column));
                    query.push_bind(format!("{}%", escape_like(value)));
                }
                Predicate::ExcludeId { id } => {
                    query.push(format!(" AND CAST({} AS TEXT) <> ", self.spec.id_column));
                    query.push_bind(id.clone());
                }
            }
        }
        Ok(())
    }

    fn filter_column(&self, field: &str) -> Result<&str, StoreError> {
        self.spec
            .filter_columns
            .iter()
            .find(|column| column.as_str() == field)
            .map(String::as_str)
            .ok_or_else(|| StoreError::UnknownField(field.to_string()))
    }

    async fn fetch(&self, mut query: QueryBuilder<'static, Postgres>) -> Result<Vec<Point>, StoreError> {
        let rows = query.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(|row| self.row_to_point(row)).collect())
    }

    fn row_to_point(&self, row: &PgRow) -> Point {
        let id: String = row.get("id");
        Point {
            id: canonical_id(&id, self.spec.pad_ids),
            latitude: row.get("lat"),
            longitude: row.get("lon"),
        }
    }

    fn row_to_details(&self, row: &PgRow) -> Result<PointDetails, StoreError> {
        let mut attributes = BTreeMap::new();
        for column in &self.spec.display_columns {
            let value: Option<String> = row.try_get(column.as_str())?;
            if let Some(value) = value {
                attributes.insert(column.clone(), value);
            }
        }
        Ok(PointDetails {
            point: self.row_to_point(row),
            attributes,
        })
    }
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[async_trait]
impl PointStore for PostgresPointStore {
    async fn resolve_point(&self, id: &str) -> Result<Option<Point>, StoreError> {
        let mut query = self.select();
        query.push(format!(" AND CAST({} AS TEXT) IN (", self.spec.id_column));
        {
            let mut ids = query.separated(", ");
            ids.push_bind(self.canonical_id(id));
            if self.spec.pad_ids {
                // stored integer zips have lost their leading zero
                ids.push_bind(normalize_zip(id).trim_start_matches('0').to_string());
            }
        }
        query.push(") LIMIT 1");

        let row = query.build().fetch_optional(&self.pool).await?;
        Ok(row.map(|row| self.row_to_point(&row)))
    }

    async fn find_in_box(
        &self,
        bbox: &BoundingBox,
        predicates: &[Predicate],
    ) -> Result<Vec<Point>, StoreError> {
        let mut query = self.select();
        query.push(format!(" AND {} BETWEEN ", self.spec.lat_column));
        query.push_bind(bbox.min_lat);
        query.push(" AND ");
        query.push_bind(bbox.max_lat);
        query.push(format!(" AND {} BETWEEN ", self.spec.lon_column));
        query.push_bind(bbox.min_lon);
        query.push(" AND ");
        query.push_bind(bbox.max_lon);
        self.push_predicates(&mut query, predicates)?;

        tracing::debug!("Box query on {}: {:?}", self.spec.table, bbox);
        self.fetch(query).await
    }

    async fn find_all(&self, predicates: &[Predicate]) -> Result<Vec<Point>, StoreError> {
        let mut query = self.select();
        self.push_predicates(&mut query, predicates)?;

        tracing::debug!("Full scan on {}", self.spec.table);
        self.fetch(query).await
    }

    async fn details(&self, ids: &[String]) -> Result<Vec<PointDetails>, StoreError> {
        let ids: Vec<String> = ids.iter().map(|id| self.canonical_id(id)).collect();
        // quoted ids are coerced to the id column's type
        let Some(order) = rank_order_case(&ids, &self.spec.id_column) else {
            return Ok(Vec::new());
        };

        let mut query = self.select_with(&self.spec.display_columns);
        query.push(format!(" AND CAST({} AS TEXT) IN (", self.spec.id_column));
        {
            let mut binds = query.separated(", ");
            for id in &ids {
                binds.push_bind(id.clone());
            }
        }
        query.push(") ORDER BY ");
        query.push(order);

        tracing::debug!("Details of {} ids from {}", ids.len(), self.spec.table);
        let rows = query.build().fetch_all(&self.pool).await?;

        let mut seen = HashSet::with_capacity(rows.len());
        let mut details = Vec::with_capacity(rows.len());
        for row in &rows {
            let point = self.row_to_details(row)?;
            if seen.insert(point.point.id.clone()) {
                details.push(point);
            }
        }
        Ok(details)
    }

    fn canonical_id(&self, id: &str) -> String {
        canonical_id(id, self.spec.pad_ids)
    }
}

/// Build an `ORDER BY` clause that preserves a ranked id order
///
/// Produces `(CASE column WHEN 'a' THEN 1 WHEN 'b' THEN 2 ... ELSE 100 END) ASC`,
/// or `None` when there is nothing to rank.
pub fn rank_order_case(ids: &[String], column: &str) -> Option<String> {
    if ids.is_empty() || !is_plain_identifier(column) {
        return None;
    }

    let whens: String = ids
        .iter()
        .enumerate()
        .map(|(i, id)| format!(" WHEN '{}' THEN {}", id.replace('\'', "''"), i + 1))
        .collect();

    Some(format!("(CASE {}{} ELSE 100 END) ASC", column, whens))
}
