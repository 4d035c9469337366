//! Shared test helpers for Gaudeam integration tests
//!
//! Each helper mounts the endpoints one scenario needs on a wiremock
//! server. `setup_gaudeam_mock` returns a client already pointing at it.

use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use igitur_gaudeam::client::GaudeamClient;

pub const TEST_COOKIE: &str = "test-session-cookie";

/// Starts a mock instance that accepts the test session
///
/// Pre-configured endpoints:
/// - GET /api/v1/current_member → member profile
pub async fn setup_gaudeam_mock() -> (MockServer, GaudeamClient) {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/current_member"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 7,
            "personal_record": {"email": "max@example.com", "first_name": "Max"}
        })))
        .mount(&server)
        .await;

    let client = GaudeamClient::with_base_url(TEST_COOKIE, server.uri());
    (server, client)
}

/// Mounts the properties endpoint of a group-owned folder
pub async fn mount_folder(server: &MockServer, id: &str, name: &str, kind: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/drive/folders/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": id.parse::<u64>().map(Value::from).unwrap_or_else(|_| Value::from(id)),
            "name": name,
            "type": kind,
            "owner_type": "Group",
            "owner_id": 3,
            "restrict_to": {"id": 11}
        })))
        .mount(server)
        .await;
}

/// Mounts a single-page listing of `parent`
pub async fn mount_listing(server: &MockServer, parent: &str, inodes: Value) {
    Mock::given(method("GET"))
        .and(path("/api/v1/drive/folders"))
        .and(query_param("parent_id", parent))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": inodes })))
        .mount(server)
        .await;
}

/// Mounts a listing of `parent` split into pages at `offset`
#[allow(dead_code)]
pub async fn mount_listing_page(server: &MockServer, parent: &str, offset: u32, inodes: Value) {
    Mock::given(method("GET"))
        .and(path("/api/v1/drive/folders"))
        .and(query_param("parent_id", parent))
        .and(query_param("offset", offset.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": inodes })))
        .mount(server)
        .await;
}

/// Mounts a drive file download
pub async fn mount_download(server: &MockServer, file_id: &str, content: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/drive/uploaded_files/{file_id}/download")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(content.to_vec())
                .append_header("Content-Type", "application/octet-stream"),
        )
        .mount(server)
        .await;
}

/// Mounts the three upload steps; the stored file is registered as `new_id`
pub async fn mount_upload(server: &MockServer, new_id: u64) {
    Mock::given(method("POST"))
        .and(path("/api/v1/drive/sign"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "postEndpoint": format!("{}/storage", server.uri()),
            "signature": {"key": "uploads/${filename}", "policy": "p0l1cy", "x-amz-signature": "s1g"}
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/storage"))
        .respond_with(ResponseTemplate::new(201).set_body_string(
            "<PostResponse><Key>uploads/abc/photo.jpg</Key></PostResponse>",
        ))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/drive/uploaded_files"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": new_id,
            "type": "DriveFile"
        })))
        .mount(server)
        .await;
}

pub fn folder_inode(id: u64, name: &str) -> Value {
    json!({"id": id, "type": "Folder", "name": name})
}

pub fn file_inode(id: u64, name: &str, download_name: &str, size: u64) -> Value {
    json!({
        "id": id,
        "type": "DriveFile",
        "name": name,
        "download_name": download_name,
        "file_size": size
    })
}
