//! Integration tests for the provider client against a mock HTTP server.
//!
//! Exercises the status mapping, the streams decoding path, and the
//! refresh-and-retry flow without touching the real provider.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tokio::sync::Mutex;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use async_trait::async_trait;
use cadence_core::{
    RepoError, Resolution, SharedUser, StravaCredentials, StreamType, User, UserRepository,
    shared_user,
};
use cadence_strava::{ActivityQuery, StravaClient, StravaConfig, StravaError};

// ═══════════════════════════════════════════════════════════════════════
//  Fixtures
// ═══════════════════════════════════════════════════════════════════════

/// Records every persisted user so tests can assert on refresh side effects.
#[derive(Default)]
struct RecordingUserRepository {
    updates: Mutex<Vec<User>>,
}

#[async_trait]
impl UserRepository for RecordingUserRepository {
    async fn update(&self, user: &User) -> Result<(), RepoError> {
        self.updates.lock().await.push(user.clone());
        Ok(())
    }
}

fn test_user() -> SharedUser {
    shared_user(User {
        id: "athlete-1".into(),
        credentials: StravaCredentials {
            access_token: "old-access".into(),
            refresh_token: "old-refresh".into(),
            expires_at: Utc::now() - chrono::Duration::minutes(5),
        },
    })
}

fn client_for(server: &MockServer, repo: Arc<RecordingUserRepository>) -> StravaClient {
    let config = StravaConfig::new("client-id", "client-secret")
        .with_base_url(server.uri())
        .with_token_url(format!("{}/oauth/token", server.uri()));
    StravaClient::new(config, repo).unwrap()
}

// ═══════════════════════════════════════════════════════════════════════
//  Token refresh
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn refresh_and_retry_on_expired_token() {
    let server = MockServer::start().await;
    let repo = Arc::new(RecordingUserRepository::default());

    // First /athlete call with the stale token is rejected.
    Mock::given(method("GET"))
        .and(path("/athlete"))
        .and(header("authorization", "Bearer old-access"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    // Exactly one form-encoded refresh exchange is expected.
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=old-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-access",
            "refresh_token": "new-refresh",
            "expires_at": (Utc::now() + chrono::Duration::hours(6)).timestamp(),
        })))
        .expect(1)
        .mount(&server)
        .await;

    // The retried call must carry the refreshed token.
    Mock::given(method("GET"))
        .and(path("/athlete"))
        .and(header("authorization", "Bearer new-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 42,
            "firstname": "Jo",
            "lastname": "Rider",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let user = test_user();
    let client = client_for(&server, Arc::clone(&repo));

    let athlete = client.get_athlete(&user).await.unwrap();
    assert_eq!(athlete.id, 42);
    assert_eq!(athlete.firstname, "Jo");

    // The shared handle now carries the new tokens.
    {
        let guard = user.read().await;
        assert_eq!(guard.credentials.access_token, "new-access");
        assert_eq!(guard.credentials.refresh_token, "new-refresh");
        assert!(guard.credentials.expires_at > Utc::now());
    }

    // The repository persisted exactly one refreshed record.
    let updates = repo.updates.lock().await;
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].credentials.access_token, "new-access");
}

#[tokio::test]
async fn failed_refresh_surfaces_error() {
    let server = MockServer::start().await;
    let repo = Arc::new(RecordingUserRepository::default());

    Mock::given(method("GET"))
        .and(path("/athlete"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid grant"))
        .mount(&server)
        .await;

    let user = test_user();
    let client = client_for(&server, Arc::clone(&repo));

    let err = client.get_athlete(&user).await.unwrap_err();
    assert!(matches!(err, StravaError::RefreshFailed { .. }));
    assert!(repo.updates.lock().await.is_empty());
}

// ═══════════════════════════════════════════════════════════════════════
//  Status mapping
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn not_found_maps_to_typed_error() {
    let server = MockServer::start().await;
    let repo = Arc::new(RecordingUserRepository::default());

    Mock::given(method("GET"))
        .and(path("/activities/999"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server, repo);
    let err = client.get_activity(&test_user(), 999).await.unwrap_err();
    assert!(matches!(err, StravaError::NotFound { .. }));
}

#[tokio::test]
async fn server_errors_map_to_unavailable() {
    let server = MockServer::start().await;
    let repo = Arc::new(RecordingUserRepository::default());

    Mock::given(method("GET"))
        .and(path("/athlete/activities"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client_for(&server, repo);
    let err = client
        .get_activities(&test_user(), &ActivityQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StravaError::ServiceUnavailable { status: 503 }
    ));
}

#[tokio::test]
async fn provider_throttle_maps_to_typed_error() {
    let server = MockServer::start().await;
    let repo = Arc::new(RecordingUserRepository::default());

    Mock::given(method("GET"))
        .and(path("/athlete"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let client = client_for(&server, repo);
    let err = client.get_athlete(&test_user()).await.unwrap_err();
    assert!(matches!(err, StravaError::Throttled));
}

// ═══════════════════════════════════════════════════════════════════════
//  Streams endpoint
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn streams_request_decodes_keyed_payload() {
    let server = MockServer::start().await;
    let repo = Arc::new(RecordingUserRepository::default());

    Mock::given(method("GET"))
        .and(path("/activities/1234/streams"))
        .and(query_param("keys", "time,heartrate"))
        .and(query_param("resolution", "low"))
        .and(query_param("key_by_type", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "time": {"data": [0, 1, 2, 3], "series_type": "distance", "original_size": 4},
            "heartrate": {"data": [120, 125, null, 131], "series_type": "distance", "original_size": 4},
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, repo);
    let set = client
        .get_activity_streams(
            &test_user(),
            1234,
            &[StreamType::Time, StreamType::Heartrate],
            Resolution::Low,
        )
        .await
        .unwrap();

    assert_eq!(set.len(), 4);
    assert_eq!(set.time, Some(vec![0, 1, 2, 3]));
    assert_eq!(set.heartrate, Some(vec![120, 125, 0, 131]));
}

#[tokio::test]
async fn activity_listing_passes_query_filters() {
    let server = MockServer::start().await;
    let repo = Arc::new(RecordingUserRepository::default());

    Mock::given(method("GET"))
        .and(path("/athlete/activities"))
        .and(query_param("per_page", "5"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": 1,
            "name": "Morning Ride",
            "sport_type": "Ride",
            "distance": 42000.0,
            "moving_time": 5400,
            "elapsed_time": 5600,
            "total_elevation_gain": 380.0,
            "start_date": "2026-07-30T06:30:00Z",
        }])))
        .mount(&server)
        .await;

    let client = client_for(&server, repo);
    let activities = client
        .get_activities(
            &test_user(),
            &ActivityQuery {
                page: Some(2),
                per_page: Some(5),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0].name, "Morning Ride");
    assert_eq!(activities[0].distance, 42000.0);
}
