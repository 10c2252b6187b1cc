//! Typed HTTP client for the registry API.
//!
//! Non-upload calls carry a 15-second timeout. 429 responses are retried
//! once after honoring `Retry-After`.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Error body shape shared by every endpoint.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: String,
    message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillDto {
    pub slug: String,
    pub display_name: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSummaryDto {
    pub version: String,
    #[serde(default)]
    pub changelog: String,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillDetailResponse {
    pub skill: SkillDto,
    #[serde(default)]
    pub latest_version: Option<VersionSummaryDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillListResponse {
    pub skills: Vec<SkillDto>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultDto {
    pub score: f32,
    pub slug: String,
    pub display_name: String,
    #[serde(default)]
    pub summary: Option<String>,
    pub version: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<SearchResultDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolvedVersion {
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
    #[serde(rename = "match")]
    pub matched: Option<ResolvedVersion>,
    #[serde(default)]
    pub latest_version: Option<ResolvedVersion>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoamiUser {
    #[serde(default)]
    pub handle: Option<String>,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
struct WhoamiResponse {
    user: WhoamiUser,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    pub slug: String,
    pub version: String,
    pub fingerprint: String,
    pub created: bool,
}

/// One file of a bundle being published.
pub struct UploadFile {
    pub path: String,
    pub bytes: Vec<u8>,
}

/// Registry API client.
pub struct RegistryClient {
    http: reqwest::Client,
    base: String,
    token: Option<String>,
}

impl RegistryClient {
    pub fn new(base: impl Into<String>, token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("clawdhub/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send with a single retry honoring `Retry-After` on 429.
    async fn send(&self, build: impl Fn() -> reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = build().send().await.context("Request failed")?;
        if response.status() != reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Ok(response);
        }
        let wait = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(1)
            .min(60);
        tracing::debug!(wait, "rate limited; retrying");
        tokio::time::sleep(Duration::from_secs(wait)).await;
        build().send().await.context("Request failed after retry")
    }

    async fn expect_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return response.json().await.context("Failed to parse response");
        }
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(err) => bail!("{} ({})", err.message, err.code),
            Err(_) => bail!("Registry returned {}: {}", status, body),
        }
    }

    pub async fn whoami(&self) -> Result<WhoamiUser> {
        let response = self
            .send(|| {
                self.authed(self.http.get(self.url("/whoami")))
                    .timeout(REQUEST_TIMEOUT)
            })
            .await?;
        Ok(Self::expect_json::<WhoamiResponse>(response).await?.user)
    }

    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResultDto>> {
        let response = self
            .send(|| {
                self.http
                    .get(self.url("/search"))
                    .query(&[("q", query), ("limit", &limit.to_string())])
                    .timeout(REQUEST_TIMEOUT)
            })
            .await?;
        Ok(Self::expect_json::<SearchResponse>(response).await?.results)
    }

    pub async fn list_skills(&self, limit: usize, sort: &str) -> Result<SkillListResponse> {
        let response = self
            .send(|| {
                self.http
                    .get(self.url("/skills"))
                    .query(&[("limit", limit.to_string().as_str()), ("sort", sort)])
                    .timeout(REQUEST_TIMEOUT)
            })
            .await?;
        Self::expect_json(response).await
    }

    /// None when the slug is not on the registry.
    pub async fn get_skill(&self, slug: &str) -> Result<Option<SkillDetailResponse>> {
        let response = self
            .send(|| {
                self.http
                    .get(self.url(&format!("/skills/{slug}")))
                    .timeout(REQUEST_TIMEOUT)
            })
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(Self::expect_json(response).await?))
    }

    pub async fn resolve(&self, slug: &str, hash: &str) -> Result<ResolveResponse> {
        let response = self
            .send(|| {
                self.http
                    .get(self.url("/skill/resolve"))
                    .query(&[("slug", slug), ("hash", hash)])
                    .timeout(REQUEST_TIMEOUT)
            })
            .await?;
        Self::expect_json(response).await
    }

    /// Download a version as a zip archive.
    pub async fn download(&self, slug: &str, version: &str) -> Result<Vec<u8>> {
        let response = self
            .send(|| {
                self.http
                    .get(self.url("/download"))
                    .query(&[("slug", slug), ("version", version)])
            })
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Download failed with {}: {}", status, body);
        }
        Ok(response.bytes().await.context("Failed to read archive")?.to_vec())
    }

    /// Publish a bundle as one multipart request. Uploads carry no
    /// 15-second cap.
    pub async fn publish(
        &self,
        payload: &serde_json::Value,
        files: Vec<UploadFile>,
    ) -> Result<PublishResponse> {
        // multipart bodies are not replayable, so no retry wrapper here
        let mut form = reqwest::multipart::Form::new().text("payload", payload.to_string());
        for file in files {
            let part = reqwest::multipart::Part::bytes(file.bytes)
                .file_name(file.path.clone())
                .mime_str("text/plain")
                .context("Invalid mime type")?;
            form = form.part("files", part);
        }

        let response = self
            .authed(self.http.post(self.url("/skills")))
            .multipart(form)
            .send()
            .await
            .context("Publish request failed")?;
        Self::expect_json(response).await
    }

    pub async fn soft_delete(&self, slug: &str) -> Result<()> {
        let response = self
            .send(|| {
                self.authed(self.http.delete(self.url(&format!("/skills/{slug}"))))
                    .timeout(REQUEST_TIMEOUT)
            })
            .await?;
        Self::expect_json::<serde_json::Value>(response).await.map(|_| ())
    }

    pub async fn undelete(&self, slug: &str) -> Result<()> {
        let response = self
            .send(|| {
                self.authed(
                    self.http
                        .post(self.url(&format!("/skills/{slug}/undelete"))),
                )
                .timeout(REQUEST_TIMEOUT)
            })
            .await?;
        Self::expect_json::<serde_json::Value>(response).await.map(|_| ())
    }
}
