//! Integration tests for the login form flow and the session profile

use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use igitur_core::config::SessionConfig;
use igitur_core::ports::session::ISessionProvider;
use igitur_gaudeam::{GaudeamError, GaudeamSessionProvider};

use crate::common;

const LOGIN_PAGE: &str = r#"<!DOCTYPE html><html><body>
<form class="new_user" action="/login" method="post">
  <input type="hidden" name="authenticity_token" value="tok123" autocomplete="off" />
  <input type="email" name="user[email]" id="user_email" />
</form></body></html>"#;

fn provider_for(server: &MockServer, dir: &TempDir) -> GaudeamSessionProvider {
    let config = SessionConfig {
        profile_path: dir.path().join("session.json"),
        login_url: format!("{}/login", server.uri()),
        service_domain: "gaudeam.de".to_string(),
    };
    GaudeamSessionProvider::new(&config)
        .expect("provider")
        .with_instance_base_url(server.uri())
}

async fn mount_login_page(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(LOGIN_PAGE)
                .append_header("Set-Cookie", "_gaudeam_session=pre-login; path=/; HttpOnly"),
        )
        .mount(server)
        .await;
}

async fn mount_login_success(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_string_contains("authenticity_token=tok123"))
        .and(body_string_contains("user%5Bemail%5D=max%40example.com"))
        .and(body_string_contains(
            "user%5Bremember_me%5D=0&user%5Bremember_me%5D=1",
        ))
        .and(body_string_contains("commit=Einloggen"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", "https://aldania.gaudeam.de/")
                .append_header("Set-Cookie", "_gaudeam_session=s3ss10n; path=/; HttpOnly"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_stores_session() {
    let (server, _client) = common::setup_gaudeam_mock().await;
    mount_login_page(&server).await;
    mount_login_success(&server).await;
    let dir = TempDir::new().unwrap();
    let provider = provider_for(&server, &dir);

    let token = provider
        .login("max@example.com", "geheim")
        .await
        .expect("login failed");

    assert_eq!(token.cookie(), "s3ss10n");
    assert_eq!(token.subdomain(), "aldania");

    let stored = provider.store().load().await.unwrap().expect("profile written");
    assert_eq!(stored, token);
}

#[tokio::test]
async fn test_rejected_credentials_fail_without_profile() {
    let (server, _client) = common::setup_gaudeam_mock().await;
    mount_login_page(&server).await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let provider = provider_for(&server, &dir);

    let err = provider.login("max@example.com", "falsch").await.unwrap_err();

    let gaudeam = err.downcast_ref::<GaudeamError>().expect("GaudeamError");
    assert!(gaudeam.is_auth_error());
    assert!(provider.store().load().await.unwrap().is_none());
}

#[tokio::test]
async fn test_login_page_without_token_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>Wartungsarbeiten</html>"))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();

    let result = provider_for(&server, &dir).login("max@example.com", "x").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_current_session_validates_stored_profile() {
    let (server, _client) = common::setup_gaudeam_mock().await;
    mount_login_page(&server).await;
    mount_login_success(&server).await;
    let dir = TempDir::new().unwrap();
    let provider = provider_for(&server, &dir);

    assert!(provider.current_session().await.unwrap().is_none());

    provider.login("max@example.com", "geheim").await.unwrap();
    let session = provider.current_session().await.unwrap();
    assert_eq!(session.map(|s| s.subdomain().to_string()), Some("aldania".to_string()));
}

#[tokio::test]
async fn test_expired_session_is_reported_as_absent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/current_member"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let provider = provider_for(&server, &dir);
    provider
        .store()
        .save(&igitur_core::domain::SessionToken::new("old", "aldania").unwrap())
        .await
        .unwrap();

    assert!(provider.current_session().await.unwrap().is_none());
}

#[tokio::test]
async fn test_member_info_and_logout() {
    let (server, _client) = common::setup_gaudeam_mock().await;
    mount_login_page(&server).await;
    mount_login_success(&server).await;
    let dir = TempDir::new().unwrap();
    let provider = provider_for(&server, &dir);

    let token = provider.login("max@example.com", "geheim").await.unwrap();
    let info = provider.member_info(&token).await.unwrap();
    assert_eq!(info.email, "max@example.com");
    assert_eq!(info.instance_url, server.uri());

    assert!(provider.logout().await.unwrap());
    assert!(!provider.logout().await.unwrap());
}
