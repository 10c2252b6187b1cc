//! HTTP surface integration tests.

mod common;

use axum::http::StatusCode;
use clawdhub_registry::{bundle_fingerprint, sha256_hex};
use common::{multipart_publish, TestApp, TOKEN_ADMIN, TOKEN_U1, TOKEN_U2};
use serde_json::json;

fn demo_payload(slug: &str, version: &str) -> serde_json::Value {
    json!({
        "slug": slug,
        "displayName": "Demo",
        "version": version,
        "changelog": "",
    })
}

const DEMO_SKILL_MD: &str = "---\nname: demo\ndescription: A demo skill\n---\nBody";

#[tokio::test]
async fn test_publish_get_and_resolve() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(multipart_publish(
            TOKEN_U1,
            &demo_payload("demo", "1.0.0"),
            &[("SKILL.md", DEMO_SKILL_MD)],
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&body));
    let published: serde_json::Value = TestApp::parse_json(&body);
    assert!(published["skillId"].is_string());
    assert!(published["versionId"].is_string());
    assert_eq!(published["created"], true);

    let (status, body) = app.request(TestApp::get("/api/v1/skills/demo")).await;
    assert_eq!(status, StatusCode::OK);
    let detail: serde_json::Value = TestApp::parse_json(&body);
    assert_eq!(detail["skill"]["slug"], "demo");
    assert_eq!(detail["skill"]["summary"], "A demo skill");
    assert_eq!(detail["latestVersion"]["version"], "1.0.0");
    assert_eq!(detail["owner"]["handle"], "u1");

    let fingerprint = bundle_fingerprint(&[(
        "SKILL.md",
        sha256_hex(DEMO_SKILL_MD.as_bytes()).as_str(),
    )]);
    let (status, body) = app
        .request(TestApp::get(&format!(
            "/api/v1/skill/resolve?slug=demo&hash={fingerprint}"
        )))
        .await;
    assert_eq!(status, StatusCode::OK);
    let resolved: serde_json::Value = TestApp::parse_json(&body);
    assert_eq!(resolved["match"]["version"], "1.0.0");
    assert_eq!(resolved["latestVersion"]["version"], "1.0.0");
}

#[tokio::test]
async fn test_republish_same_version_conflicts() {
    let app = TestApp::new().await;

    let (status, _) = app
        .request(multipart_publish(
            TOKEN_U1,
            &demo_payload("demo", "1.0.0"),
            &[("SKILL.md", DEMO_SKILL_MD)],
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request(multipart_publish(
            TOKEN_U1,
            &demo_payload("demo", "1.0.0"),
            &[("SKILL.md", "---\nname: demo\n---\nChanged")],
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let error: serde_json::Value = TestApp::parse_json(&body);
    assert_eq!(error["code"], "VERSION_EXISTS");
}

#[tokio::test]
async fn test_publish_requires_bearer() {
    let app = TestApp::new().await;
    let (status, _) = app
        .request(multipart_publish(
            "not-a-token",
            &demo_payload("demo", "1.0.0"),
            &[("SKILL.md", DEMO_SKILL_MD)],
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_foreign_slug_is_forbidden() {
    let app = TestApp::new().await;
    let (status, _) = app
        .request(multipart_publish(
            TOKEN_U1,
            &demo_payload("demo", "1.0.0"),
            &[("SKILL.md", DEMO_SKILL_MD)],
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(multipart_publish(
            TOKEN_U2,
            &demo_payload("demo", "1.0.1"),
            &[("SKILL.md", DEMO_SKILL_MD)],
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_whoami() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(TestApp::get_with_token("/api/v1/whoami", TOKEN_U1))
        .await;
    assert_eq!(status, StatusCode::OK);
    let whoami: serde_json::Value = TestApp::parse_json(&body);
    assert_eq!(whoami["user"]["handle"], "u1");

    let (status, _) = app.request(TestApp::get("/api/v1/whoami")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rate_limit_write_budget() {
    let app = TestApp::new().await;

    // 30 writes pass the limiter (each fails 401 on auth, which is fine)
    for n in 1..=30 {
        let (status, headers, _) = app
            .request_full(TestApp::post_empty("/api/v1/stars/ghost"))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "request {n}");
        assert!(headers.contains_key("x-ratelimit-limit"));
    }

    // the 31st write in the window is denied
    let (status, headers, _) = app
        .request_full(TestApp::post_empty("/api/v1/stars/ghost"))
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(headers["x-ratelimit-remaining"], "0");
    let retry_after: u64 = headers["retry-after"].to_str().unwrap().parse().unwrap();
    assert!((1..=60).contains(&retry_after));
}

#[tokio::test]
async fn test_rate_limit_headers_on_reads() {
    let app = TestApp::new().await;
    let (status, headers, _) = app.request_full(TestApp::get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-ratelimit-limit"], "120");
    assert_eq!(headers["x-ratelimit-remaining"], "119");
}

#[tokio::test]
async fn test_raw_file_etag_and_size_cap() {
    let app = TestApp::new().await;

    let big = "x".repeat(201 * 1024);
    let (status, body) = app
        .request(multipart_publish(
            TOKEN_U1,
            &demo_payload("demo", "1.0.0"),
            &[("SKILL.md", DEMO_SKILL_MD), ("notes.txt", big.as_str())],
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&body));

    let (status, headers, body) = app
        .request_full(TestApp::get("/api/v1/skills/demo/file?path=SKILL.md"))
        .await;
    assert_eq!(status, StatusCode::OK);
    let expected_etag = format!("\"{}\"", sha256_hex(DEMO_SKILL_MD.as_bytes()));
    assert_eq!(headers["etag"].to_str().unwrap(), expected_etag);
    assert_eq!(String::from_utf8_lossy(&body), DEMO_SKILL_MD);

    let (status, _, _) = app
        .request_full(TestApp::get("/api/v1/skills/demo/file?path=notes.txt"))
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_archived_file_reads_are_privately_cached() {
    let app = TestApp::new().await;

    for version in ["1.0.0", "1.0.1"] {
        let (status, _) = app
            .request(multipart_publish(
                TOKEN_U1,
                &demo_payload("demo", version),
                &[("SKILL.md", DEMO_SKILL_MD)],
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, headers, _) = app
        .request_full(TestApp::get(
            "/api/v1/skills/demo/file?path=SKILL.md&version=1.0.0",
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["cache-control"], "private, max-age=60");

    // latest reads carry no private cache directive
    let (status, headers, _) = app
        .request_full(TestApp::get("/api/v1/skills/demo/file?path=SKILL.md"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!headers.contains_key("cache-control"));
}

#[tokio::test]
async fn test_download_zip_contains_original_paths() {
    let app = TestApp::new().await;

    let (status, _) = app
        .request(multipart_publish(
            TOKEN_U1,
            &demo_payload("demo", "1.0.0"),
            &[("SKILL.md", DEMO_SKILL_MD), ("docs/usage.md", "# Usage")],
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, headers, body) = app
        .request_full(TestApp::get("/api/v1/download?slug=demo&version=1.0.0"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "application/zip");

    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(body)).unwrap();
    let names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    assert!(names.contains(&"SKILL.md".to_string()));
    assert!(names.contains(&"docs/usage.md".to_string()));
}

#[tokio::test]
async fn test_soft_delete_round_trip() {
    let app = TestApp::new().await;

    let (status, _) = app
        .request(multipart_publish(
            TOKEN_U1,
            &demo_payload("demo", "1.0.0"),
            &[("SKILL.md", DEMO_SKILL_MD)],
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(TestApp::delete_with_token("/api/v1/skills/demo", TOKEN_U1))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.request(TestApp::get("/api/v1/skills/demo")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .request(TestApp::post_with_token(
            "/api/v1/skills/demo/undelete",
            TOKEN_U1,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.request(TestApp::get("/api/v1/skills/demo")).await;
    assert_eq!(status, StatusCode::OK);
    let detail: serde_json::Value = TestApp::parse_json(&body);
    assert_eq!(detail["latestVersion"]["version"], "1.0.0");
}

#[tokio::test]
async fn test_star_endpoints() {
    let app = TestApp::new().await;

    let (status, _) = app
        .request(multipart_publish(
            TOKEN_U1,
            &demo_payload("demo", "1.0.0"),
            &[("SKILL.md", DEMO_SKILL_MD)],
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request(TestApp::post_with_token("/api/v1/stars/demo", TOKEN_U2))
        .await;
    assert_eq!(status, StatusCode::OK);
    let starred: serde_json::Value = TestApp::parse_json(&body);
    assert_eq!(starred["stars"], 1);

    let (status, body) = app
        .request(TestApp::delete_with_token("/api/v1/stars/demo", TOKEN_U2))
        .await;
    assert_eq!(status, StatusCode::OK);
    let unstarred: serde_json::Value = TestApp::parse_json(&body);
    assert_eq!(unstarred["stars"], 0);
}

#[tokio::test]
async fn test_search_endpoint_token_gate() {
    let app = TestApp::new().await;

    let (status, _) = app
        .request(multipart_publish(
            TOKEN_U1,
            &json!({"slug": "gogkit", "displayName": "gogkit", "version": "1.0.0"}),
            &[("SKILL.md", "---\nname: gogkit\ndescription: Google Workspace CLI\n---\nTools")],
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .request(multipart_publish(
            TOKEN_U1,
            &json!({"slug": "gif-encoder", "displayName": "gif-encoder", "version": "1.0.0"}),
            &[("SKILL.md", "---\nname: gif-encoder\ndescription: Animated GIF encoder\n---\nEncodes")],
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request(TestApp::get("/api/v1/search?q=gif&limit=5"))
        .await;
    assert_eq!(status, StatusCode::OK);
    let response: serde_json::Value = TestApp::parse_json(&body);
    let results = response["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["slug"], "gif-encoder");
    assert!(results[0]["score"].is_number());
}

#[tokio::test]
async fn test_admin_moderation_via_engine() {
    let app = TestApp::new().await;

    let (status, _) = app
        .request(multipart_publish(
            TOKEN_U1,
            &demo_payload("demo", "1.0.0"),
            &[("SKILL.md", DEMO_SKILL_MD)],
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    // a moderator-only action through the facade: u2 cannot delete u1's skill
    let (status, _) = app
        .request(TestApp::delete_with_token("/api/v1/skills/demo", TOKEN_U2))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // the admin can
    let (status, _) = app
        .request(TestApp::delete_with_token("/api/v1/skills/demo", TOKEN_ADMIN))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_list_skills_pagination_and_sorts() {
    let app = TestApp::new().await;

    for slug in ["alpha", "beta", "gamma"] {
        let (status, _) = app
            .request(multipart_publish(
                TOKEN_U1,
                &json!({"slug": slug, "displayName": slug, "version": "1.0.0"}),
                &[("SKILL.md", &format!("---\nname: {slug}\n---\nBody of {slug}"))],
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = app
        .request(TestApp::get("/api/v1/skills?limit=2&sort=updated"))
        .await;
    assert_eq!(status, StatusCode::OK);
    let page: serde_json::Value = TestApp::parse_json(&body);
    assert_eq!(page["skills"].as_array().unwrap().len(), 2);
    let cursor = page["nextCursor"].as_str().unwrap().to_string();

    let (status, body) = app
        .request(TestApp::get(&format!(
            "/api/v1/skills?limit=2&sort=updated&cursor={}",
            urlencode(&cursor)
        )))
        .await;
    assert_eq!(status, StatusCode::OK);
    let page2: serde_json::Value = TestApp::parse_json(&body);
    assert_eq!(page2["skills"].as_array().unwrap().len(), 1);

    // non-updated sorts return a single bounded page without a cursor
    let (status, body) = app
        .request(TestApp::get("/api/v1/skills?limit=2&sort=trending"))
        .await;
    assert_eq!(status, StatusCode::OK);
    let trending: serde_json::Value = TestApp::parse_json(&body);
    assert!(trending["nextCursor"].is_null());

    let (status, _) = app.request(TestApp::get("/api/v1/skills?sort=bogus")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn urlencode(s: &str) -> String {
    s.replace(':', "%3A")
}
