use crate::api::{PlatformApiClient, PostSearch, ReplyPoster};
use chirp_core::{CoreError, PlatformApiError, PlatformCredentials, SearchFilter};
use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn search_credentials() -> PlatformCredentials {
    PlatformCredentials {
        bearer_token: "test-bearer".to_string(),
        client_id: None,
        client_secret: None,
        redirect_url: None,
        refresh_token: None,
    }
}

fn posting_credentials() -> PlatformCredentials {
    PlatformCredentials {
        bearer_token: "test-bearer".to_string(),
        client_id: Some("test-client".to_string()),
        client_secret: Some("test-secret".to_string()),
        redirect_url: Some("http://localhost/callback".to_string()),
        refresh_token: Some("test-refresh".to_string()),
    }
}

fn test_filter() -> SearchFilter {
    SearchFilter {
        topics: vec!["web3 growth".to_string()],
        ..SearchFilter::default()
    }
}

fn client(server: &MockServer, credentials: PlatformCredentials) -> PlatformApiClient {
    PlatformApiClient::with_base_url(credentials, &server.uri())
        .expect("client construction should not fail")
}

#[tokio::test]
async fn test_search_parses_and_revalidates_candidates() {
    let server = MockServer::start().await;
    let created_at = Utc::now().to_rfc3339();

    let body = json!({
        "data": [
            {
                "id": "100",
                "text": "KOL campaigns without retention are theatre",
                "author_id": "u1",
                "created_at": created_at,
                "public_metrics": {"reply_count": 25, "like_count": 80}
            },
            {
                "id": "101",
                "text": "small account slipping through the server filter",
                "author_id": "u2",
                "created_at": created_at,
                "public_metrics": {"reply_count": 25, "like_count": 80}
            }
        ],
        "includes": {
            "users": [
                {"id": "u1", "username": "bigvoice", "verified": true,
                 "public_metrics": {"followers_count": 52_000}},
                {"id": "u2", "username": "smallvoice", "verified": false,
                 "public_metrics": {"followers_count": 300}}
            ]
        }
    });

    Mock::given(method("GET"))
        .and(path("/2/tweets/search/recent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, search_credentials());
    let candidates = client.search_recent(&test_filter(), 5).await.unwrap();

    // The under-followed author is dropped client-side even though the
    // server returned it
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].id, "100");
    assert_eq!(candidates[0].handle, "bigvoice");
}

#[tokio::test]
async fn test_search_respects_result_limit() {
    let server = MockServer::start().await;
    let created_at = Utc::now().to_rfc3339();

    let tweets: Vec<_> = (0..5)
        .map(|i| {
            json!({
                "id": format!("t{i}"),
                "text": format!("post number {i} about growth"),
                "author_id": "u1",
                "created_at": created_at,
                "public_metrics": {"reply_count": 25, "like_count": 80}
            })
        })
        .collect();

    let body = json!({
        "data": tweets,
        "includes": {"users": [
            {"id": "u1", "username": "bigvoice",
             "public_metrics": {"followers_count": 52_000}}
        ]}
    });

    Mock::given(method("GET"))
        .and(path("/2/tweets/search/recent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let client = client(&server, search_credentials());
    let candidates = client.search_recent(&test_filter(), 2).await.unwrap();
    assert_eq!(candidates.len(), 2);
}

#[tokio::test]
async fn test_search_401_surfaces_authentication_error_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/2/tweets/search/recent"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1) // never retried
        .mount(&server)
        .await;

    let client = client(&server, search_credentials());
    let error = client.search_recent(&test_filter(), 1).await.unwrap_err();

    assert!(matches!(
        error,
        CoreError::PlatformApi(PlatformApiError::AuthenticationFailed { .. })
    ));
}

#[tokio::test]
async fn test_search_429_carries_reset_time_and_aborts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/2/tweets/search/recent"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "120"))
        .expect(1) // no immediate retry
        .mount(&server)
        .await;

    let client = client(&server, search_credentials());
    let error = client.search_recent(&test_filter(), 1).await.unwrap_err();

    match error {
        CoreError::PlatformApi(PlatformApiError::RateLimitExceeded { retry_after }) => {
            assert_eq!(retry_after, 120);
        }
        other => panic!("expected RateLimitExceeded, got {other:?}"),
    }
}

#[tokio::test]
async fn test_get_post_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/2/tweets/9999"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client(&server, search_credentials());
    let error = client.get_post("9999").await.unwrap_err();

    assert!(matches!(
        error,
        CoreError::PlatformApi(PlatformApiError::PostNotFound { .. })
    ));
}

#[tokio::test]
async fn test_post_reply_refreshes_token_then_posts() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/2/oauth2/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access_token": "fresh-token"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {"id": "777", "text": "nice thread"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, posting_credentials());
    let receipt = client.post_reply("nice thread", "100").await.unwrap();

    assert_eq!(receipt.posted_id, "777");
    assert_eq!(receipt.text, "nice thread");
}

#[tokio::test]
async fn test_post_reply_403_is_permission_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/2/oauth2/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access_token": "fresh-token"})),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let client = client(&server, posting_credentials());
    let error = client.post_reply("hello", "100").await.unwrap_err();

    assert!(matches!(
        error,
        CoreError::PlatformApi(PlatformApiError::Forbidden { .. })
    ));
}

#[tokio::test]
async fn test_token_refresh_failure_is_authentication_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/2/oauth2/token"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let client = client(&server, posting_credentials());
    let error = client.post_reply("hello", "100").await.unwrap_err();

    assert!(matches!(
        error,
        CoreError::PlatformApi(PlatformApiError::AuthenticationFailed { .. })
    ));
}

#[tokio::test]
async fn test_post_reply_without_credentials_fails_before_network() {
    let server = MockServer::start().await;

    let client = client(&server, search_credentials());
    let error = client.post_reply("hello", "100").await.unwrap_err();

    assert!(matches!(
        error,
        CoreError::PlatformApi(PlatformApiError::AuthenticationFailed { .. })
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}
