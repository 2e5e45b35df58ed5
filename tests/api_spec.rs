use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::{TestRequest, TestServer};
use rankshelf::api::{create_router, create_router_with_security, AppState, SecurityConfig, USER_ID_HEADER};
use rankshelf::config::EngineConfig;
use rankshelf::db::Database;
use rankshelf::models::*;
use rankshelf::rating::SelectionPolicy;
use uuid::Uuid;

fn engine_config() -> EngineConfig {
    EngineConfig {
        selection: SelectionPolicy::First,
        ..EngineConfig::default()
    }
}

fn setup() -> TestServer {
    let db = Database::open_memory().expect("Failed to create database");
    db.migrate().expect("Failed to migrate");
    let app = create_router(db, &engine_config());
    TestServer::new(app).expect("Failed to create test server")
}

fn as_user(request: TestRequest, user: Uuid) -> TestRequest {
    request.add_header(
        HeaderName::from_static(USER_ID_HEADER),
        HeaderValue::from_str(&user.to_string()).expect("Invalid header"),
    )
}

async fn create_test_book(server: &TestServer, external_ref: &str) -> Book {
    server
        .post("/api/v1/books")
        .json(&BookRef::new(external_ref, format!("Title {}", external_ref)))
        .await
        .json::<Book>()
}

async fn start(server: &TestServer, user: Uuid, book: &Book, sentiment: SentimentBand) -> SessionView {
    let response = as_user(server.post("/api/v1/sessions"), user)
        .json(&StartSessionInput {
            book_id: book.id,
            sentiment,
        })
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<SessionView>()
}

async fn choose(server: &TestServer, user: Uuid, session: &SessionView, choice: Choice) -> SessionView {
    let response = as_user(
        server.post(&format!("/api/v1/sessions/{}/choice", session.id)),
        user,
    )
    .json(&ChoiceInput { choice })
    .await;
    response.assert_status_ok();
    response.json::<SessionView>()
}

async fn submit(server: &TestServer, user: Uuid, session: &SessionView) -> RatingOutcome {
    let response = as_user(
        server.post(&format!("/api/v1/sessions/{}/submit", session.id)),
        user,
    )
    .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<RatingOutcome>()
}

mod health {
    use super::*;

    #[tokio::test]
    async fn returns_ok() {
        let server = setup();
        let response = server.get("/api/v1/health").await;
        response.assert_status_ok();
        response.assert_json(&serde_json::json!({ "status": "ok" }));
    }
}

mod books {
    use super::*;

    #[tokio::test]
    async fn ensure_book_is_idempotent() {
        let server = setup();
        let first = create_test_book(&server, "vol-1").await;
        let second = create_test_book(&server, "vol-1").await;
        assert_eq!(first.id, second.id);

        let response = server.get(&format!("/api/v1/books/{}", first.id)).await;
        response.assert_status_ok();
        assert_eq!(response.json::<Book>().title, "Title vol-1");
    }

    #[tokio::test]
    async fn rejects_empty_title() {
        let server = setup();
        let response = server
            .post("/api/v1/books")
            .json(&BookRef::new("vol-1", "  "))
            .await;
        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn returns_404_for_unknown_book() {
        let server = setup();
        let response = server.get(&format!("/api/v1/books/{}", Uuid::new_v4())).await;
        response.assert_status_not_found();
    }

    #[tokio::test]
    async fn lists_band_ranges() {
        let server = setup();
        let response = server.get("/api/v1/bands").await;
        response.assert_status_ok();
        let bands: Vec<BandInfo> = response.json();
        assert_eq!(bands.len(), 3);
        assert_eq!(bands[0].sentiment, SentimentBand::Loved);
        assert_eq!(bands[0].max, 10.0);
        assert_eq!(bands[2].min, 1.0);
    }
}

mod sessions {
    use super::*;

    #[tokio::test]
    async fn requires_user_header() {
        let server = setup();
        let book = create_test_book(&server, "vol-1").await;
        let response = server
            .post("/api/v1/sessions")
            .json(&StartSessionInput {
                book_id: book.id,
                sentiment: SentimentBand::Loved,
            })
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn first_book_in_band_is_finished_at_midpoint() {
        let server = setup();
        let user = Uuid::new_v4();
        let book = create_test_book(&server, "vol-1").await;

        let view = start(&server, user, &book, SentimentBand::Loved).await;
        match view.state {
            SessionState::Finished {
                placement,
                provisional_rating,
            } => {
                assert_eq!(placement, Placement::Middle);
                assert_eq!(provisional_rating, 8.5);
            }
            other => panic!("unexpected state {:?}", other),
        }

        let outcome = submit(&server, user, &view).await;
        assert_eq!(outcome.rated.rating, 8.5);
    }

    #[tokio::test]
    async fn full_flow_ties_and_lists_ratings() {
        let server = setup();
        let user = Uuid::new_v4();
        let first = create_test_book(&server, "vol-1").await;
        let second = create_test_book(&server, "vol-2").await;

        let view = start(&server, user, &first, SentimentBand::Liked).await;
        submit(&server, user, &view).await;

        let view = start(&server, user, &second, SentimentBand::Liked).await;
        let view = choose(&server, user, &view, Choice::Tie).await;
        let outcome = submit(&server, user, &view).await;
        assert_eq!(outcome.rated.tied_book_ids, vec![first.id]);
        assert_eq!(outcome.updated.len(), 1);
        assert_eq!(outcome.updated[0].tied_book_ids, vec![second.id]);

        let response = as_user(server.get("/api/v1/ratings?sentiment=liked"), user).await;
        response.assert_status_ok();
        let ratings: Vec<RatedBook> = response.json();
        assert_eq!(ratings.len(), 2);
        assert_eq!(ratings[0].rating, ratings[1].rating);
    }

    #[tokio::test]
    async fn too_tough_counts_as_a_tie() {
        let server = setup();
        let user = Uuid::new_v4();
        let first = create_test_book(&server, "vol-1").await;
        let second = create_test_book(&server, "vol-2").await;

        let view = start(&server, user, &first, SentimentBand::Hated).await;
        submit(&server, user, &view).await;

        let view = start(&server, user, &second, SentimentBand::Hated).await;
        let response = as_user(
            server.post(&format!("/api/v1/sessions/{}/choice", view.id)),
            user,
        )
        .json(&serde_json::json!({ "choice": "too_tough" }))
        .await;
        response.assert_status_ok();
        let view: SessionView = response.json();
        assert!(matches!(
            view.state,
            SessionState::Finished { placement: Placement::Tied { book_id }, .. } if book_id == first.id
        ));
    }

    #[tokio::test]
    async fn undo_returns_to_previous_comparison() {
        let server = setup();
        let user = Uuid::new_v4();
        let first = create_test_book(&server, "vol-1").await;
        let second = create_test_book(&server, "vol-2").await;

        let view = start(&server, user, &first, SentimentBand::Loved).await;
        submit(&server, user, &view).await;

        let view = start(&server, user, &second, SentimentBand::Loved).await;
        let finished = choose(&server, user, &view, Choice::PreferNew).await;
        assert!(finished.can_undo);

        let response = as_user(
            server.post(&format!("/api/v1/sessions/{}/undo", view.id)),
            user,
        )
        .await;
        response.assert_status_ok();
        let view: SessionView = response.json();
        assert!(matches!(view.state, SessionState::Comparing { cursor: 0, .. }));
    }

    #[tokio::test]
    async fn choice_after_finish_is_bad_request_and_ends_session() {
        let server = setup();
        let user = Uuid::new_v4();
        let book = create_test_book(&server, "vol-1").await;
        let view = start(&server, user, &book, SentimentBand::Loved).await;

        let response = as_user(
            server.post(&format!("/api/v1/sessions/{}/choice", view.id)),
            user,
        )
        .json(&ChoiceInput { choice: Choice::PreferNew })
        .await;
        response.assert_status_bad_request();

        as_user(server.get(&format!("/api/v1/sessions/{}", view.id)), user)
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn rating_the_same_book_twice_conflicts() {
        let server = setup();
        let user = Uuid::new_v4();
        let book = create_test_book(&server, "vol-1").await;
        let view = start(&server, user, &book, SentimentBand::Loved).await;
        submit(&server, user, &view).await;

        let response = as_user(server.post("/api/v1/sessions"), user)
            .json(&StartSessionInput {
                book_id: book.id,
                sentiment: SentimentBand::Liked,
            })
            .await;
        response.assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn cancel_discards_the_session() {
        let server = setup();
        let user = Uuid::new_v4();
        let book = create_test_book(&server, "vol-1").await;
        let view = start(&server, user, &book, SentimentBand::Loved).await;

        as_user(server.delete(&format!("/api/v1/sessions/{}", view.id)), user)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        as_user(server.get(&format!("/api/v1/sessions/{}", view.id)), user)
            .await
            .assert_status_not_found();

        let response = as_user(server.get("/api/v1/ratings"), user).await;
        response.assert_status_ok();
        assert!(response.json::<Vec<RatedBook>>().is_empty());
    }

    #[tokio::test]
    async fn sessions_are_private_to_their_user() {
        let server = setup();
        let owner = Uuid::new_v4();
        let book = create_test_book(&server, "vol-1").await;
        let view = start(&server, owner, &book, SentimentBand::Loved).await;

        as_user(server.get(&format!("/api/v1/sessions/{}", view.id)), Uuid::new_v4())
            .await
            .assert_status_not_found();
    }
}

mod auth {
    use super::*;

    fn secured() -> TestServer {
        let db = Database::open_memory().expect("Failed to create database");
        db.migrate().expect("Failed to migrate");
        let state = AppState::new(db, &engine_config());
        let app = create_router_with_security(state, SecurityConfig::with_api_key("secret"));
        TestServer::new(app).expect("Failed to create test server")
    }

    #[tokio::test]
    async fn rejects_missing_api_key() {
        let server = secured();
        server.get("/api/v1/bands").await.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn accepts_valid_api_key() {
        let server = secured();
        server
            .get("/api/v1/bands")
            .add_header(
                HeaderName::from_static("authorization"),
                HeaderValue::from_static("Bearer secret"),
            )
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn health_is_public() {
        let server = secured();
        server.get("/api/v1/health").await.assert_status_ok();
    }
}
