//! The `/mr` HTTP surface.
//!
//! Every response is JSON wrapped in the `{"_api", "_comment"}` envelope.
//! Handlers read the store; nothing here writes.

use std::collections::{BTreeMap, BTreeSet};

use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use apt_index::Buildinfo;
use debsnap_store::Store;

use crate::error::{ApiError, ApiResult};
use crate::solver;
use crate::API_VERSION;

/// Buildinfo uploads beyond this size are rejected.
const MAX_BUILDINFO_BYTES: usize = 4 * 1024 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Read-only store handle.
    pub store: Store,
}

/// Build the router with every `/mr` route.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/mr/package", get(source_packages))
        .route("/mr/package/:name", get(source_package_versions))
        .route("/mr/package/:name/:version/srcfiles", get(srcfiles))
        .route("/mr/binary/:name", get(binary_package_versions))
        .route("/mr/binary/:name/:version/binfiles", get(binfiles))
        .route("/mr/file", get(files))
        .route("/mr/file/:hash/info", get(file_info))
        .route("/mr/file/:hash/download", get(file_download))
        .route("/mr/timestamp/:archive", get(archive_timestamps))
        .route("/mr/timestamp/:archive/:value", get(resolve_timestamp))
        .route("/mr/buildinfo", post(buildinfo_cover))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(MAX_BUILDINFO_BYTES)),
        )
}

/// Serve until the listener dies.
pub async fn serve(state: AppState, bind_address: &str) -> std::io::Result<()> {
    let app = router(state);
    info!("query service listening on {bind_address}");
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    axum::serve(listener, app).await
}

fn envelope() -> serde_json::Map<String, serde_json::Value> {
    let mut map = serde_json::Map::new();
    map.insert("_api".to_string(), json!(API_VERSION));
    map.insert("_comment".to_string(), json!("debsnap"));
    map
}

fn respond(mut body: serde_json::Map<String, serde_json::Value>) -> Response {
    if !body.contains_key("_api") {
        body.extend(envelope());
    }
    Json(serde_json::Value::Object(body)).into_response()
}

#[derive(Deserialize)]
struct FileinfoQuery {
    fileinfo: Option<String>,
}

impl FileinfoQuery {
    fn wanted(&self) -> bool {
        self.fileinfo.as_deref() == Some("1")
    }
}

/// `GET /mr/package` — all source package names.
async fn source_packages(State(state): State<AppState>) -> ApiResult<Response> {
    let names = state.store.source_package_names().await?;
    let mut body = envelope();
    body.insert(
        "result".into(),
        json!(names
            .iter()
            .map(|name| json!({ "package": name }))
            .collect::<Vec<_>>()),
    );
    Ok(respond(body))
}

/// `GET /mr/package/{name}` — versions of one source package.
async fn source_package_versions(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    let versions = state.store.source_package_versions(&name).await?;
    if versions.is_empty() {
        return Err(ApiError::NotFound);
    }
    let mut body = envelope();
    body.insert("package".into(), json!(name));
    body.insert(
        "result".into(),
        json!(versions
            .iter()
            .map(|version| json!({ "version": version }))
            .collect::<Vec<_>>()),
    );
    Ok(respond(body))
}

/// `GET /mr/package/{name}/{version}/srcfiles` — hashes of one source
/// package version, optionally expanded with per-file location info.
async fn srcfiles(
    State(state): State<AppState>,
    Path((name, version)): Path<(String, String)>,
    Query(query): Query<FileinfoQuery>,
) -> ApiResult<Response> {
    let hashes = state
        .store
        .source_package_files(&name, &version)
        .await?
        .ok_or(ApiError::NotFound)?;

    let mut body = envelope();
    body.insert("package".into(), json!(name));
    body.insert("version".into(), json!(version));
    body.insert(
        "result".into(),
        json!(hashes
            .iter()
            .map(|hash| json!({ "hash": hash }))
            .collect::<Vec<_>>()),
    );
    if query.wanted() {
        body.insert("fileinfo".into(), fileinfo(&state.store, &hashes).await?);
    }
    Ok(respond(body))
}

/// `GET /mr/binary/{name}` — versions of one binary package.
async fn binary_package_versions(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    let versions = state.store.binary_package_versions(&name).await?;
    if versions.is_empty() {
        return Err(ApiError::NotFound);
    }
    let mut body = envelope();
    body.insert("binary".into(), json!(name));
    body.insert(
        "result".into(),
        json!(versions
            .iter()
            .map(|version| json!({ "name": name, "binary_version": version }))
            .collect::<Vec<_>>()),
    );
    Ok(respond(body))
}

/// `GET /mr/binary/{name}/{version}/binfiles` — hash/architecture pairs of
/// one binary package version.
async fn binfiles(
    State(state): State<AppState>,
    Path((name, version)): Path<(String, String)>,
    Query(query): Query<FileinfoQuery>,
) -> ApiResult<Response> {
    let pairs = state
        .store
        .binary_package_files(&name, &version)
        .await?
        .ok_or(ApiError::NotFound)?;

    let mut body = envelope();
    body.insert("binary".into(), json!(name));
    body.insert("binary_version".into(), json!(version));
    body.insert(
        "result".into(),
        json!(pairs
            .iter()
            .map(|(hash, architecture)| json!({
                "hash": hash,
                "architecture": architecture
            }))
            .collect::<Vec<_>>()),
    );
    if query.wanted() {
        let hashes: Vec<String> = pairs.iter().map(|(hash, _)| hash.clone()).collect();
        body.insert("fileinfo".into(), fileinfo(&state.store, &hashes).await?);
    }
    Ok(respond(body))
}

/// `GET /mr/file` — every known file hash.
async fn files(State(state): State<AppState>) -> ApiResult<Response> {
    let hashes = state.store.all_file_hashes().await?;
    let mut body = envelope();
    body.insert(
        "result".into(),
        json!(hashes
            .iter()
            .map(|hash| json!({ "file": hash }))
            .collect::<Vec<_>>()),
    );
    Ok(respond(body))
}

/// `GET /mr/file/{hash}/info` — every location of one file.
async fn file_info(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> ApiResult<Response> {
    if !state.store.file_exists(&hash).await? {
        return Err(ApiError::NotFound);
    }
    let locations = state.store.file_locations(&hash).await?;
    let mut body = envelope();
    body.insert("result".into(), json!(locations));
    Ok(respond(body))
}

/// `GET /mr/file/{hash}/download` — 302 into the by-hash tree.
async fn file_download(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> ApiResult<Response> {
    if !state.store.file_exists(&hash).await? {
        return Err(ApiError::NotFound);
    }
    let location = format!("/by-hash/{}/{}", &hash[..2.min(hash.len())], hash);
    debug!(%hash, %location, "redirecting download");
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}

/// `GET /mr/timestamp/{archive}` — all timestamps of one archive.
async fn archive_timestamps(
    State(state): State<AppState>,
    Path(archive): Path<String>,
) -> ApiResult<Response> {
    let timestamps = state.store.archive_timestamps(&archive).await?;
    if timestamps.is_empty() {
        return Err(ApiError::NotFound);
    }
    let mut body = envelope();
    body.insert("result".into(), json!(timestamps));
    Ok(respond(body))
}

/// `GET /mr/timestamp/{archive}/{value}` — exact match, the closest
/// earlier timestamp, or `latest`.
async fn resolve_timestamp(
    State(state): State<AppState>,
    Path((archive, value)): Path<(String, String)>,
) -> ApiResult<Response> {
    let resolved = if value == "latest" {
        state.store.latest_timestamp(&archive).await?
    } else if !debsnap_store::is_valid_timestamp(&value) {
        return Err(ApiError::NotFound);
    } else {
        state.store.resolve_timestamp(&archive, &value).await?
    };
    let resolved = resolved.ok_or(ApiError::NotFound)?;
    let mut body = envelope();
    body.insert("result".into(), json!(resolved));
    Ok(respond(body))
}

#[derive(Deserialize)]
struct BuildinfoQuery {
    suite_name: Option<String>,
}

/// `POST /mr/buildinfo` — greedy timestamp cover for the exact package
/// versions a buildinfo records.
async fn buildinfo_cover(
    State(state): State<AppState>,
    Query(query): Query<BuildinfoQuery>,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    let mut content: Option<String> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() == Some("buildinfo") {
            content = Some(
                field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?,
            );
            break;
        }
    }
    let content =
        content.ok_or_else(|| ApiError::BadRequest("missing 'buildinfo' field".to_string()))?;
    let info = Buildinfo::parse(content.as_bytes())
        .map_err(|e| ApiError::BadRequest(format!("unparsable buildinfo: {e}")))?;

    // per (archive, suite, component, architecture) location:
    // package label -> timestamps it is present at
    type LocationKey = (String, String, String, String);
    let mut locations: BTreeMap<LocationKey, BTreeMap<String, BTreeSet<String>>> = BTreeMap::new();
    let mut labels: Vec<String> = Vec::new();

    for dep in &info.installed_build_depends {
        let arch = dep.effective_architecture(&info.build_architecture);
        let label = format!("{}:{}={}", dep.name, arch, dep.version);
        labels.push(label.clone());
        let observations = state.store.binary_observations(&dep.name, &dep.version).await?;

        for observation in &observations {
            if let Some(suite) = &query.suite_name {
                if &observation.suite_name != suite {
                    continue;
                }
            }
            let key = (
                observation.archive_name.clone(),
                observation.suite_name.clone(),
                observation.component_name.clone(),
                arch.clone(),
            );
            let entry = locations
                .entry(key)
                .or_default()
                .entry(label.clone())
                .or_default();
            // exact-architecture presence only
            if observation.architecture != arch {
                continue;
            }
            for range in &observation.ranges {
                let expanded = state
                    .store
                    .timestamps_between(&observation.archive_name, &range.begin, &range.end)
                    .await?;
                entry.extend(expanded);
            }
        }
    }

    // every required package appears in every candidate location's report,
    // so uncoverable ones show up under `missing`
    for availability in locations.values_mut() {
        for label in &labels {
            availability.entry(label.clone()).or_default();
        }
    }

    let results: Vec<serde_json::Value> = locations
        .iter()
        .map(|((archive, suite, component, architecture), availability)| {
            let cover = solver::greedy_cover(availability);
            json!({
                "archive_name": archive,
                "suite_name": suite,
                "component_name": component,
                "architecture": architecture,
                "timestamps": cover.timestamps,
                "covered": cover.covered,
                "missing": cover.missing,
            })
        })
        .collect();

    let mut body = envelope();
    body.insert(
        "_comment".into(),
        json!("debsnap: this endpoint is experimental"),
    );
    body.insert("results".into(), json!(results));
    Ok(respond(body))
}

/// Expand a hash list into the per-file location descriptors keyed by hash.
async fn fileinfo(store: &Store, hashes: &[String]) -> ApiResult<serde_json::Value> {
    let mut map = serde_json::Map::new();
    for hash in hashes {
        let locations = store.file_locations(hash).await?;
        map.insert(hash.clone(), json!(locations));
    }
    Ok(serde_json::Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> AppState {
        let store = Store::connect_lazy("postgresql://snapshot@localhost/snapshot").unwrap();
        AppState { store }
    }

    #[tokio::test]
    async fn test_router_builds() {
        // axum validates route syntax at construction time
        let _ = router(test_state());
    }

    #[test]
    fn test_envelope_fields() {
        let body = envelope();
        assert_eq!(body["_api"], json!(API_VERSION));
        assert!(body.contains_key("_comment"));
    }

    #[test]
    fn test_fileinfo_query_flag() {
        assert!(FileinfoQuery {
            fileinfo: Some("1".to_string())
        }
        .wanted());
        assert!(!FileinfoQuery {
            fileinfo: Some("0".to_string())
        }
        .wanted());
        assert!(!FileinfoQuery { fileinfo: None }.wanted());
    }
}
