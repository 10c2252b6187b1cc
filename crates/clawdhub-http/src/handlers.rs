//! API request handlers.

use axum::{
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use clawdhub_registry::{
    sha256_hex, MetadataStore, NewFile, ObjectStore, PublishRequest as EnginePublishRequest,
    SearchQuery, SkillSort, User, DEFAULT_SEARCH_LIMIT,
};
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info};

use crate::middleware::{bearer_token, AppError};
use crate::server::AppState;
use crate::types::*;

/// Authenticate the request or fail with 401.
async fn require_user(state: &AppState, headers: &HeaderMap) -> Result<User, AppError> {
    let token = bearer_token(headers).ok_or_else(AppError::unauthorized)?;
    Ok(state.registry.authenticate(&token).await?)
}

/// GET /api/v1/health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}

/// GET /api/v1/search
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    debug!(query = %params.q, "search request");

    let hits = state
        .registry
        .search(SearchQuery {
            query: params.q,
            limit: params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
            highlighted_only: params.highlighted_only.unwrap_or(false),
        })
        .await?;

    let results = hits
        .into_iter()
        .map(|hit| SearchResultDto {
            score: hit.score,
            slug: hit.skill.slug,
            display_name: hit.skill.display_name,
            summary: hit.skill.summary,
            version: hit.version.version,
            owner_handle: hit.owner_handle,
            updated_at: hit.skill.updated_at,
        })
        .collect();

    Ok(Json(SearchResponse { results }))
}

/// GET /api/v1/skills
pub async fn list_skills(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<SkillListResponse>, AppError> {
    let sort: SkillSort = params
        .sort
        .as_deref()
        .unwrap_or("updated")
        .parse()
        .map_err(AppError::bad_request)?;
    let limit = params.limit.unwrap_or(50).clamp(1, 200);

    let page = state
        .registry
        .list_skills(sort, limit, params.cursor.as_deref())
        .await?;

    let mut skills = Vec::with_capacity(page.items.len());
    for skill in &page.items {
        let badges = state.registry.store().badges_for_skill(&skill.id).await?;
        skills.push(SkillDto::from_skill(skill, &badges));
    }

    Ok(Json(SkillListResponse { skills, next_cursor: page.next_cursor }))
}

/// GET /api/v1/skills/:slug
pub async fn get_skill(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<SkillDetailResponse>, AppError> {
    let view = state.registry.get_skill_view(&slug).await?;
    Ok(Json(SkillDetailResponse {
        skill: SkillDto::from_skill(&view.skill, &view.badges),
        latest_version: view.latest_version.as_ref().map(VersionSummaryDto::from),
        owner: view.owner.as_ref().map(OwnerDto::from),
    }))
}

/// GET /api/v1/skills/:slug/versions
pub async fn list_versions(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<VersionListResponse>, AppError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 200);
    let page = state
        .registry
        .list_versions(&slug, limit, params.cursor.as_deref())
        .await?;
    Ok(Json(VersionListResponse {
        versions: page.items.iter().map(VersionSummaryDto::from).collect(),
        next_cursor: page.next_cursor,
    }))
}

/// GET /api/v1/skills/:slug/versions/:version
pub async fn get_version(
    State(state): State<Arc<AppState>>,
    Path((slug, version)): Path<(String, String)>,
) -> Result<Json<VersionDetailDto>, AppError> {
    let found = state.registry.get_version_by_semver(&slug, &version).await?;
    Ok(Json(VersionDetailDto::from(&found)))
}

/// GET /api/v1/skills/:slug/file?path=...&version=...|&tag=...
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(params): Query<FileParams>,
) -> Result<Response, AppError> {
    let raw = state
        .registry
        .read_file(
            &slug,
            &params.path,
            params.version.as_deref(),
            params.tag.as_deref(),
        )
        .await?;

    let content_type = raw
        .entry
        .content_type
        .clone()
        .unwrap_or_else(|| "text/plain; charset=utf-8".to_string());

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::ETAG, format!("\"{}\"", raw.entry.sha256));
    if raw.archived {
        builder = builder.header(header::CACHE_CONTROL, "private, max-age=60");
    }
    builder
        .body(axum::body::Body::from(raw.bytes))
        .map_err(|e| AppError::internal(e.to_string()))
}

/// GET /api/v1/skill/resolve?slug=...&hash=...
pub async fn resolve(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ResolveParams>,
) -> Result<Json<ResolveResponse>, AppError> {
    let outcome = state
        .registry
        .resolve_fingerprint(&params.slug, &params.hash)
        .await?;
    Ok(Json(ResolveResponse {
        matched: outcome.match_version.map(|version| ResolvedVersion { version }),
        latest_version: outcome.latest_version.map(|version| ResolvedVersion { version }),
    }))
}

/// GET /api/v1/download?slug=...&version=...
pub async fn download(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DownloadParams>,
) -> Result<Response, AppError> {
    let files = state
        .registry
        .collect_download(&params.slug, &params.version)
        .await?;

    // Zip with the original paths, no wrapping directory.
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (entry, bytes) in &files {
        writer
            .start_file(entry.path.as_str(), options)
            .map_err(|e| AppError::internal(format!("zip: {e}")))?;
        writer
            .write_all(bytes)
            .map_err(|e| AppError::internal(format!("zip: {e}")))?;
    }
    let cursor = writer
        .finish()
        .map_err(|e| AppError::internal(format!("zip: {e}")))?;

    let filename = format!("{}-{}.zip", params.slug, params.version);
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(axum::body::Body::from(cursor.into_inner()))
        .map_err(|e| AppError::internal(e.to_string()))
}

/// GET /api/v1/whoami
pub async fn whoami(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<WhoamiResponse>, AppError> {
    let user = require_user(&state, &headers).await?;
    Ok(Json(WhoamiResponse { user: OwnerDto::from(&user) }))
}

/// POST /api/v1/skills
///
/// Accepts `application/json` with storage-id file references (after a
/// prior upload-url flow), or `multipart/form-data` with a `payload`
/// field and inline `files` parts whose file names are the relative
/// paths.
pub async fn publish_skill(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
) -> Result<Json<PublishResponse>, AppError> {
    let user = require_user(&state, &headers).await?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let (payload, files) = if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| AppError::bad_request(format!("invalid multipart body: {e}")))?;
        read_multipart_publish(&state, multipart).await?
    } else {
        let Json(payload): Json<PublishPayload> = Json::from_request(request, &())
            .await
            .map_err(|e| AppError::bad_request(format!("invalid JSON body: {e}")))?;
        let files = payload
            .files
            .clone()
            .unwrap_or_default()
            .into_iter()
            .map(|f| NewFile {
                path: f.path,
                size: f.size,
                storage_id: f.storage_id,
                sha256: f.sha256,
                content_type: f.content_type,
            })
            .collect();
        (payload, files)
    };

    info!(slug = %payload.slug, version = %payload.version, "publish request");

    let outcome = state
        .registry
        .publish(
            &user,
            EnginePublishRequest {
                slug: payload.slug,
                display_name: payload.display_name,
                version: payload.version,
                changelog: payload.changelog.unwrap_or_default(),
                tags: payload.tags.unwrap_or_default(),
                fork_of: payload.fork_of.map(|f| clawdhub_registry::ForkOfRequest {
                    slug: f.slug,
                    version: f.version,
                }),
                source: payload.source,
                files,
            },
        )
        .await?;

    Ok(Json(PublishResponse {
        skill_id: outcome.skill_id,
        version_id: outcome.version_id,
        slug: outcome.slug,
        version: outcome.version,
        fingerprint: outcome.fingerprint,
        created: outcome.created_skill,
    }))
}

/// Stream the multipart parts: a `payload` JSON field plus inline file
/// parts. File bytes land in the object store; sha256 and size are
/// computed server-side.
async fn read_multipart_publish(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<(PublishPayload, Vec<NewFile>), AppError> {
    let mut payload: Option<PublishPayload> = None;
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(format!("multipart read failed: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "payload" {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::bad_request(format!("payload field: {e}")))?;
            payload = Some(
                serde_json::from_str(&text)
                    .map_err(|e| AppError::bad_request(format!("invalid payload JSON: {e}")))?,
            );
            continue;
        }

        let path = field
            .file_name()
            .map(|n| n.to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| AppError::bad_request("file part without a file name"))?;
        let content_type = field.content_type().map(|c| c.to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(format!("file part '{path}': {e}")))?;

        let sha256 = sha256_hex(&bytes);
        let size = bytes.len() as u64;
        let storage_id = state.registry.objects().put(bytes).await?;
        files.push(NewFile { path, size, storage_id, sha256, content_type });
    }

    let payload =
        payload.ok_or_else(|| AppError::bad_request("multipart publish requires a payload field"))?;
    Ok((payload, files))
}

/// DELETE /api/v1/skills/:slug — soft delete.
pub async fn soft_delete_skill(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Result<Json<OkResponse>, AppError> {
    let user = require_user(&state, &headers).await?;
    state.registry.set_soft_deleted(&user, &slug, true).await?;
    Ok(Json(OkResponse { ok: true }))
}

/// POST /api/v1/skills/:slug/undelete
pub async fn undelete_skill(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Result<Json<OkResponse>, AppError> {
    let user = require_user(&state, &headers).await?;
    state.registry.set_soft_deleted(&user, &slug, false).await?;
    Ok(Json(OkResponse { ok: true }))
}

/// POST /api/v1/stars/:slug
pub async fn star_skill(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Result<Json<StarResponse>, AppError> {
    let user = require_user(&state, &headers).await?;
    let stars = state.registry.star(&user, &slug).await?;
    Ok(Json(StarResponse { stars }))
}

/// DELETE /api/v1/stars/:slug
pub async fn unstar_skill(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Result<Json<StarResponse>, AppError> {
    let user = require_user(&state, &headers).await?;
    let stars = state.registry.unstar(&user, &slug).await?;
    Ok(Json(StarResponse { stars }))
}

/// Fallback for unknown routes
pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError::not_found("Route")),
    )
}
