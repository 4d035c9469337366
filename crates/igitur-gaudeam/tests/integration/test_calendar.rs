//! Integration tests for the calendar and event media endpoints

use chrono::{TimeZone, Utc};
use serde_json::json;
use wiremock::matchers::{header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use igitur_core::domain::newtypes::EventId;
use igitur_core::ports::event_source::IEventSource;
use igitur_gaudeam::GaudeamEventSource;

use crate::common;

async fn mount_event_posts(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/events/55/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "creator": {"full_name": "Max Mustermann"}},
            {"id": 2, "creator": {"full_name": "Erika Musterfrau"}}
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/posts/1/event_media"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 10, "uploaded_file": {"file_name": "a.jpg", "original": {"url": format!("{}/media/10", server.uri())}}},
            {"id": 11, "uploaded_file": {"file_name": "b.jpg", "original": {"url": "/media/11"}}}
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/posts/2/event_media"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 12, "uploaded_file": {"file_name": "c.png", "file_size": 3, "original": {"url": "/media/12"}}}
        ])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_list_events_skips_birthdays() {
    let (server, client) = common::setup_gaudeam_mock().await;
    Mock::given(method("GET"))
        .and(path("/global_calendar.json"))
        .and(query_param("start", "2025-06-01T00:00:00Z"))
        .and(query_param("end", "2025-06-08T00:00:00Z"))
        .and(query_param("timeZone", "UTC"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 2, "title": "Kneipe", "start": "2025-06-05T19:00:00.000Z", "url": "/events/2"},
            {"id": 9, "title": "Max", "start": "2025-06-03T00:00:00.000Z", "url": "/personal_records/9"},
            {"id": 1, "title": "Convent", "start": "2025-06-02T18:00:00.000Z", "url": "/events/1"}
        ])))
        .mount(&server)
        .await;

    let source = GaudeamEventSource::new(client);
    let events = source
        .list_events(
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 8, 12, 0, 0).unwrap(),
        )
        .await
        .expect("calendar failed");

    let titles: Vec<_> = events.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["Kneipe", "Convent"]);
}

#[tokio::test]
async fn test_get_event() {
    let (server, client) = common::setup_gaudeam_mock().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/events/55"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 55, "title": "Stiftungsfest", "start": "2025-06-14T18:00:00.000Z",
            "url": "/events/55", "description": ""
        })))
        .mount(&server)
        .await;

    let source = GaudeamEventSource::new(client);
    let event = source.get_event(&EventId::new("55".to_string()).unwrap()).await.unwrap();
    assert_eq!(event.title, "Stiftungsfest");
    assert_eq!(event.folder_name().unwrap(), "2025-06-14 Stiftungsfest");
}

#[tokio::test]
async fn test_list_media_tags_uploader() {
    let (server, client) = common::setup_gaudeam_mock().await;
    mount_event_posts(&server).await;

    let source = GaudeamEventSource::new(client);
    let media = source
        .list_media(&EventId::new("55".to_string()).unwrap())
        .await
        .expect("media failed");

    assert_eq!(media.len(), 3);
    assert_eq!(media[0].uploader, "Max Mustermann");
    assert_eq!(media[1].file_name, "b.jpg");
    assert_eq!(media[2].uploader, "Erika Musterfrau");
    assert_eq!(media[2].size, Some(3));
}

#[tokio::test]
async fn test_fetch_media_resolves_relative_urls() {
    let (server, client) = common::setup_gaudeam_mock().await;
    mount_event_posts(&server).await;
    Mock::given(method("GET"))
        .and(path("/media/11"))
        .and(header_exists("cookie"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png!".to_vec()))
        .mount(&server)
        .await;

    let source = GaudeamEventSource::new(client);
    let media = source
        .list_media(&EventId::new("55".to_string()).unwrap())
        .await
        .unwrap();

    let data = source.fetch_media(&media[1]).await.expect("fetch failed");
    assert_eq!(data, b"png!");
}

#[tokio::test]
async fn test_missing_event_fails() {
    let (_server, client) = common::setup_gaudeam_mock().await;

    let source = GaudeamEventSource::new(client);
    assert!(source
        .get_event(&EventId::new("404".to_string()).unwrap())
        .await
        .is_err());
}
