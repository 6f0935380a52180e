//! Contract tests for RemoteApiResolver against a mocked extraction API

use tubefetch_core::api::{RemoteApiResolver, VideoResolver};
use tubefetch_core::config::ApiConfig;
use tubefetch_core::storage::{VideoFormat, VideoQuality};
use tubefetch_core::{FailureKind, TubeFetchError};
use wiremock::matchers::{header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const VIDEO_URL: &str = "https://youtu.be/dQw4w9WgXcQ";

fn resolver(server: &MockServer) -> RemoteApiResolver {
    let config = ApiConfig {
        base_url: server.uri(),
        timeout_secs: 5,
        ..ApiConfig::default()
    };
    RemoteApiResolver::new(&config).unwrap()
}

#[tokio::test]
async fn test_fetch_video_info() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/info"))
        .and(query_param("url", VIDEO_URL))
        .and(header_exists("user-agent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "title": "Never Gonna Give You Up",
            "duration": 213,
            "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg",
            "channel": "Rick Astley",
            "view_count": 1500000000u64,
            "upload_date": "2009-10-25"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let info = resolver(&server).fetch_video_info(VIDEO_URL).await.unwrap();
    assert_eq!(info.title, "Never Gonna Give You Up");
    assert_eq!(info.duration, 213);
    assert_eq!(info.view_count, 1_500_000_000);
}

#[tokio::test]
async fn test_resolve_stream_sends_format_and_quality() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/stream"))
        .and(query_param("url", VIDEO_URL))
        .and(query_param("format", "webm"))
        .and(query_param("quality", "1080p"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "downloadUrl": "https://cdn.example.com/v.webm",
            "quality": "1080p",
            "format": "webm"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let stream = resolver(&server)
        .resolve_stream(VIDEO_URL, VideoFormat::Webm, VideoQuality::Hd1080)
        .await
        .unwrap();
    assert_eq!(stream.download_url, "https://cdn.example.com/v.webm");
}

#[tokio::test]
async fn test_missing_stream_is_no_matching_stream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/stream"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = resolver(&server)
        .resolve_stream(VIDEO_URL, VideoFormat::Mp3, VideoQuality::Auto)
        .await
        .unwrap_err();

    match err {
        TubeFetchError::NoMatchingStream { format, quality } => {
            assert_eq!(format, "mp3");
            assert_eq!(quality, "auto");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_download_url_is_no_matching_stream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "url": "" })))
        .mount(&server)
        .await;

    let err = resolver(&server)
        .resolve_stream(VIDEO_URL, VideoFormat::Mp4, VideoQuality::Hd720)
        .await
        .unwrap_err();
    assert!(matches!(err, TubeFetchError::NoMatchingStream { .. }));
}

#[tokio::test]
async fn test_server_error_is_upstream_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/info"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = resolver(&server).fetch_video_info(VIDEO_URL).await.unwrap_err();
    assert!(err.is_resolution_error());
    assert!(matches!(
        err,
        TubeFetchError::UpstreamStatus { status: 500, ref endpoint } if endpoint == "/api/info"
    ));
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/info"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = resolver(&server).fetch_video_info(VIDEO_URL).await.unwrap_err();
    assert!(matches!(err, TubeFetchError::InvalidApiResponse(_)));
}

#[tokio::test]
async fn test_invalid_url_sends_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = resolver(&server)
        .resolve_stream("https://vimeo.com/12345", VideoFormat::Mp4, VideoQuality::Auto)
        .await
        .unwrap_err();
    assert!(matches!(err, TubeFetchError::InvalidVideoUrl(_)));
}

#[tokio::test]
async fn test_unreachable_api_is_resolution_failure() {
    // Bind then drop so nothing is listening on the port
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let config = ApiConfig {
        base_url: format!("http://{}", addr),
        timeout_secs: 5,
        ..ApiConfig::default()
    };

    let err = RemoteApiResolver::new(&config)
        .unwrap()
        .resolve_stream(VIDEO_URL, VideoFormat::Mp4, VideoQuality::Auto)
        .await
        .unwrap_err();

    assert!(err.is_resolution_error());
    assert!(!err.is_transport_error());
    assert!(matches!(
        err,
        TubeFetchError::ApiUnreachable { ref endpoint, .. } if endpoint == "/api/stream"
    ));
    assert!(matches!(err.failure_kind(), FailureKind::Resolution { .. }));
}
