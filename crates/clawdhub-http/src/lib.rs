//! ClawdHub HTTP facade - REST API over the registry engine.
//!
//! ## API endpoints (all under `/api/v1`)
//!
//! ### Reads
//! - `GET /search?q=&limit=&highlightedOnly=` - hybrid search
//! - `GET /skills?limit=&cursor=&sort=` - paginated listing
//! - `GET /skills/{slug}` - skill with latest version and owner
//! - `GET /skills/{slug}/versions` - paginated version list
//! - `GET /skills/{slug}/versions/{semver}` - version with file manifest
//! - `GET /skills/{slug}/file?path=&version=|&tag=` - raw text file
//! - `GET /skill/resolve?slug=&hash=` - fingerprint resolution
//! - `GET /download?slug=&version=` - zip of a version's files
//! - `GET /whoami` - authenticated identity
//!
//! ### Writes (bearer required)
//! - `POST /skills` - publish a version (JSON or multipart)
//! - `DELETE /skills/{slug}` / `POST /skills/{slug}/undelete` - soft delete toggle
//! - `POST /stars/{slug}` / `DELETE /stars/{slug}` - starring
//!
//! Every response carries `X-RateLimit-Limit`, `X-RateLimit-Remaining`,
//! and `X-RateLimit-Reset`; denials are 429 with `Retry-After`.

pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod ratelimit;
pub mod routes;
pub mod server;
pub mod types;

pub use ratelimit::{RateDecision, RateLimiter, RequestClass};
pub use server::{AppState, HttpServer, HttpServerConfig};
pub use types::*;
