//! OpenAPI specification generation for the ClawdHub registry API.

use utoipa::OpenApi;

use crate::types::*;

/// OpenAPI documentation for the registry HTTP API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "ClawdHub Registry API",
        version = "1.0.0",
        description = "REST API for publishing, resolving, searching, and installing agent skill bundles",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        ),
        contact(
            name = "ClawdHub",
            url = "https://github.com/clawdhub/clawdhub"
        )
    ),
    servers(
        (url = "http://localhost:3000/api/v1", description = "Local development server"),
        (url = "https://clawdhub.dev/api/v1", description = "Production API")
    ),
    components(
        schemas(
            ApiError,
            OwnerDto,
            SkillStatsDto,
            ForkOfDto,
            SkillDto,
            FileDto,
            VersionSummaryDto,
            VersionDetailDto,
            SkillDetailResponse,
            SkillListResponse,
            VersionListResponse,
            SearchResultDto,
            SearchResponse,
            ResolveResponse,
            ResolvedVersion,
            WhoamiResponse,
            PublishForkOf,
            PublishFileRef,
            PublishPayload,
            PublishResponse,
            StarResponse,
            OkResponse,
        )
    ),
    tags(
        (name = "skills", description = "Skill metadata and version reads"),
        (name = "publish", description = "Version publishing"),
        (name = "search", description = "Hybrid semantic search"),
        (name = "resolve", description = "Fingerprint resolution"),
        (name = "stars", description = "Starring"),
        (name = "system", description = "Health and identity"),
    )
)]
pub struct ApiDoc;

/// Generate the OpenAPI specification as JSON
pub fn generate_openapi_json() -> String {
    ApiDoc::openapi().to_pretty_json().expect("Failed to serialize OpenAPI spec")
}
