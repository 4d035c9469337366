//! Integration tests for drive traversal, folder creation and uploads

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use igitur_core::domain::entry::{EntryIdentity, EntryKind};
use igitur_core::domain::newtypes::RemoteId;
use igitur_core::ports::remote_drive::IRemoteDrive;
use igitur_gaudeam::{GaudeamDriveProvider, GaudeamError};

use crate::common;

fn rid(id: &str) -> RemoteId {
    RemoteId::new(id.to_string()).unwrap()
}

#[tokio::test]
async fn test_get_folder_returns_root_entry() {
    let (server, client) = common::setup_gaudeam_mock().await;
    common::mount_folder(&server, "100", "Fotos", "Folder").await;

    let drive = GaudeamDriveProvider::new(client);
    let root = drive.get_folder(&rid("100")).await.expect("get_folder failed");

    assert_eq!(root.name, "Fotos");
    assert_eq!(root.kind, EntryKind::Folder);
}

#[tokio::test]
async fn test_get_folder_rejects_files() {
    let (server, client) = common::setup_gaudeam_mock().await;
    common::mount_folder(&server, "101", "report", "DriveFile").await;

    let drive = GaudeamDriveProvider::new(client);
    assert!(drive.get_folder(&rid("101")).await.is_err());
}

#[tokio::test]
async fn test_list_folder_maps_inodes() {
    let (server, client) = common::setup_gaudeam_mock().await;
    common::mount_listing(
        &server,
        "100",
        json!([
            common::folder_inode(200, "Sommer"),
            common::file_inode(201, "bild", "bild.jpg", 2048),
            {"id": 202, "type": "Poll", "name": "Umfrage"}
        ]),
    )
    .await;

    let drive = GaudeamDriveProvider::new(client);
    let entries = drive.list_folder(&rid("100")).await.expect("list failed");

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name, "Sommer");
    assert!(entries[0].is_folder());
    assert_eq!(entries[1].name, "bild.jpg");
    assert_eq!(entries[1].size, Some(2048));
    assert_eq!(entries[1].identity, EntryIdentity::Remote(rid("201")));
    assert_eq!(drive.count_children(&rid("100")).await.unwrap(), 3);
}

#[tokio::test]
async fn test_list_folder_follows_pages() {
    let (server, client) = common::setup_gaudeam_mock().await;
    common::mount_listing_page(
        &server,
        "100",
        0,
        json!([
            common::file_inode(1, "a", "a.txt", 1),
            common::file_inode(2, "b", "b.txt", 1)
        ]),
    )
    .await;
    common::mount_listing_page(&server, "100", 2, json!([common::file_inode(3, "c", "c.txt", 1)]))
        .await;

    let drive = GaudeamDriveProvider::new(client).with_page_size(2);
    let names: Vec<_> = drive
        .list_folder(&rid("100"))
        .await
        .expect("list failed")
        .into_iter()
        .map(|e| e.name)
        .collect();

    assert_eq!(names, vec!["a.txt", "b.txt", "c.txt"]);
}

#[tokio::test]
async fn test_fetch_file_sends_session_cookie() {
    let (server, client) = common::setup_gaudeam_mock().await;
    Mock::given(method("GET"))
        .and(path("/drive/uploaded_files/201/download"))
        .and(header("cookie", "_gaudeam_session=test-session-cookie"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg".to_vec()))
        .mount(&server)
        .await;

    let drive = GaudeamDriveProvider::new(client);
    let data = drive.fetch_file(&rid("201")).await.expect("download failed");
    assert_eq!(data, b"jpeg");
}

#[tokio::test]
async fn test_fetch_missing_file_is_not_found() {
    let (_server, client) = common::setup_gaudeam_mock().await;

    let drive = GaudeamDriveProvider::new(client);
    let err = drive.fetch_file(&rid("999")).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<GaudeamError>(),
        Some(GaudeamError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_create_folder_reuses_existing() {
    let (server, client) = common::setup_gaudeam_mock().await;
    common::mount_listing(&server, "100", json!([common::folder_inode(300, "Archiv")])).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/drive/folders"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 999})))
        .expect(0)
        .mount(&server)
        .await;

    let drive = GaudeamDriveProvider::new(client);
    let id = drive.create_folder(&rid("100"), "Archiv").await.unwrap();
    assert_eq!(id.as_str(), "300");
}

#[tokio::test]
async fn test_create_folder_copies_group_ownership() {
    let (server, client) = common::setup_gaudeam_mock().await;
    common::mount_listing(&server, "100", json!([])).await;
    common::mount_folder(&server, "100", "Fotos", "Folder").await;
    Mock::given(method("POST"))
        .and(path("/api/v1/drive/folders"))
        .and(body_partial_json(json!({
            "inode": {
                "name": "Neu",
                "parent_id": "100",
                "owner_type": "Group",
                "owner_id": 3,
                "restrict_to_id": 11
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 301})))
        .expect(1)
        .mount(&server)
        .await;

    let drive = GaudeamDriveProvider::new(client);
    let id = drive.create_folder(&rid("100"), "Neu").await.unwrap();
    assert_eq!(id.as_str(), "301");
}

#[tokio::test]
async fn test_upload_file_signs_stores_and_registers() {
    let (server, client) = common::setup_gaudeam_mock().await;
    common::mount_upload(&server, 400).await;

    let drive = GaudeamDriveProvider::new(client);
    let id = drive
        .upload_file(&rid("100"), "photo.jpg", b"jpeg-bytes".to_vec())
        .await
        .expect("upload failed");
    assert_eq!(id.as_str(), "400");
}

#[tokio::test]
async fn test_upload_fails_when_storage_rejects() {
    let (server, client) = common::setup_gaudeam_mock().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/drive/sign"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "postEndpoint": format!("{}/storage", server.uri()),
            "signature": {"key": "k"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/storage"))
        .respond_with(ResponseTemplate::new(403).set_body_string("<Error/>"))
        .mount(&server)
        .await;

    let drive = GaudeamDriveProvider::new(client);
    assert!(drive
        .upload_file(&rid("100"), "photo.jpg", b"x".to_vec())
        .await
        .is_err());
}

#[tokio::test]
async fn test_delete_folder_and_file() {
    let (server, client) = common::setup_gaudeam_mock().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/drive/folders/200"))
        .and(header("cookie", "_gaudeam_session=test-session-cookie"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/drive/uploaded_files/201"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let drive = GaudeamDriveProvider::new(client);
    drive.delete_folder(&rid("200")).await.expect("delete folder failed");
    drive.delete_file(&rid("201")).await.expect("delete file failed");
}

#[tokio::test]
async fn test_delete_rejected_session_is_unauthorized() {
    let (server, client) = common::setup_gaudeam_mock().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/drive/uploaded_files/201"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let drive = GaudeamDriveProvider::new(client);
    let err = drive.delete_file(&rid("201")).await.unwrap_err();
    assert!(err
        .downcast_ref::<GaudeamError>()
        .is_some_and(GaudeamError::is_auth_error));
}
