use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::json;
use wildprompt::api::create_router;
use wildprompt::db::Database;
use wildprompt::expand::ExpandConfig;
use wildprompt::models::*;

fn setup() -> TestServer {
    let db = Database::open_memory().expect("Failed to create database");
    db.migrate().expect("Failed to migrate");
    let app = create_router(db, ExpandConfig::default());
    TestServer::new(app).expect("Failed to create test server")
}

async fn create_test_fragment(server: &TestServer, folder: Option<&str>, name: &str, lines: &[&str]) -> Fragment {
    server
        .post("/api/v1/fragments")
        .json(&CreateFragmentInput {
            folder: folder.map(str::to_string),
            name: name.to_string(),
            lines: lines.iter().map(|s| s.to_string()).collect(),
        })
        .await
        .json::<Fragment>()
}

async fn expand(server: &TestServer, prompt: &str) -> String {
    let response = server
        .post("/api/v1/expand")
        .json(&json!({ "prompt": prompt }))
        .await;
    response.assert_status_ok();
    response.json::<serde_json::Value>()["expanded"]
        .as_str()
        .expect("expanded should be a string")
        .to_string()
}

mod health {
    use super::*;

    #[tokio::test]
    async fn returns_ok() {
        let server = setup();
        let response = server.get("/api/v1/health").await;

        response.assert_status_ok();
        assert_eq!(response.json::<serde_json::Value>()["status"], "ok");
    }
}

mod fragments {
    use super::*;

    #[tokio::test]
    async fn create_returns_created() {
        let server = setup();
        let response = server
            .post("/api/v1/fragments")
            .json(&json!({ "folder": "chars", "name": "hair", "lines": ["blonde", "# c", "black"] }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let fragment: Fragment = response.json();
        assert_eq!(fragment.path(), "chars/hair");
        assert_eq!(fragment.line_count, 2);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_paths() {
        let server = setup();
        create_test_fragment(&server, None, "hair", &["a"]).await;

        let response = server
            .post("/api/v1/fragments")
            .json(&json!({ "name": "HAIR" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(response.text().contains("already exists"));
    }

    #[tokio::test]
    async fn create_rejects_empty_names() {
        let server = setup();
        let response = server
            .post("/api/v1/fragments")
            .json(&json!({ "name": "" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn import_parses_text() {
        let server = setup();
        let response = server
            .post("/api/v1/fragments/import")
            .json(&ImportFragmentInput {
                folder: None,
                name: "styles".to_string(),
                text: "# header\nwatercolor\n\nsketch\n".to_string(),
            })
            .await;

        response.assert_status(StatusCode::CREATED);
        let fragment: Fragment = response.json();
        assert_eq!(fragment.line_count, 2);
    }

    #[tokio::test]
    async fn get_returns_lines() {
        let server = setup();
        let created = create_test_fragment(&server, None, "hair", &["a", "b"]).await;

        let response = server.get(&format!("/api/v1/fragments/{}", created.id)).await;

        response.assert_status_ok();
        let found: FragmentWithLines = response.json();
        assert_eq!(found.fragment.id, created.id);
        assert_eq!(found.lines, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn get_returns_not_found_for_unknown_id() {
        let server = setup();
        let response = server
            .get(&format!("/api/v1/fragments/{}", uuid::Uuid::new_v4()))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_filters_by_folder() {
        let server = setup();
        create_test_fragment(&server, Some("chars"), "hair", &[]).await;
        create_test_fragment(&server, None, "style", &[]).await;

        let all: Vec<Fragment> = server.get("/api/v1/fragments").await.json();
        assert_eq!(all.len(), 2);

        let chars: Vec<Fragment> = server
            .get("/api/v1/fragments")
            .add_query_param("folder", "chars")
            .await
            .json();
        assert_eq!(chars.len(), 1);
        assert_eq!(chars[0].name, "hair");
    }

    #[tokio::test]
    async fn update_replaces_lines() {
        let server = setup();
        let created = create_test_fragment(&server, None, "hair", &["a"]).await;

        let response = server
            .put(&format!("/api/v1/fragments/{}", created.id))
            .json(&json!({ "lines": ["x", "y", "z"] }))
            .await;

        response.assert_status_ok();
        let updated: Fragment = response.json();
        assert_eq!(updated.line_count, 3);
    }

    #[tokio::test]
    async fn update_returns_not_found_for_unknown_id() {
        let server = setup();
        let response = server
            .put(&format!("/api/v1/fragments/{}", uuid::Uuid::new_v4()))
            .json(&json!({ "name": "x" }))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let server = setup();
        let created = create_test_fragment(&server, None, "hair", &["a"]).await;

        server
            .delete(&format!("/api/v1/fragments/{}", created.id))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        server
            .get(&format!("/api/v1/fragments/{}", created.id))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        server
            .delete(&format!("/api/v1/fragments/{}", created.id))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn duplicate_creates_a_copy() {
        let server = setup();
        let created = create_test_fragment(&server, None, "hair", &["a", "b"]).await;

        let response = server
            .post(&format!("/api/v1/fragments/{}/duplicate", created.id))
            .json(&json!({}))
            .await;

        response.assert_status(StatusCode::CREATED);
        let copy: Fragment = response.json();
        assert_eq!(copy.name, "hair copy");
        assert_eq!(copy.line_count, 2);
    }
}

mod expansion {
    use super::*;

    #[tokio::test]
    async fn expands_fragment_references() {
        let server = setup();
        create_test_fragment(&server, Some("chars"), "hair", &["blonde"]).await;

        assert_eq!(expand(&server, "1girl, <chars/hair> hair").await, "1girl, blonde hair");
    }

    #[tokio::test]
    async fn echoes_the_original_prompt() {
        let server = setup();
        let response = server
            .post("/api/v1/expand")
            .json(&json!({ "prompt": "<x|x>" }))
            .await;

        let body: serde_json::Value = response.json();
        assert_eq!(body["prompt"], "<x|x>");
        assert_eq!(body["expanded"], "x");
    }

    #[tokio::test]
    async fn leaves_unknown_references() {
        let server = setup();
        assert_eq!(expand(&server, "<nope>").await, "<nope>");
    }

    #[tokio::test]
    async fn check_reports_choice_points() {
        let server = setup();

        let yes: serde_json::Value = server
            .post("/api/v1/expand/check")
            .json(&json!({ "prompt": "a, b/c" }))
            .await
            .json();
        assert_eq!(yes["has_choice_points"], true);

        let no: serde_json::Value = server
            .post("/api/v1/expand/check")
            .json(&json!({ "prompt": "see http://a/b, tag2" }))
            .await
            .json();
        assert_eq!(no["has_choice_points"], false);
    }
}

mod counters {
    use super::*;

    #[tokio::test]
    async fn sequential_expansion_advances_and_resets() {
        let server = setup();
        create_test_fragment(&server, None, "hair", &["a", "b", "c"]).await;

        assert_eq!(expand(&server, "<*hair>").await, "a");
        assert_eq!(expand(&server, "<*hair>").await, "b");

        let counters: Vec<SequentialCounter> = server.get("/api/v1/counters").await.json();
        assert_eq!(counters.len(), 1);
        assert_eq!(counters[0].position, 2);

        server
            .post("/api/v1/counters/reset")
            .json(&json!({ "path": "hair" }))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        assert_eq!(expand(&server, "<*hair>").await, "a");
    }

    #[tokio::test]
    async fn reset_without_path_clears_everything() {
        let server = setup();
        create_test_fragment(&server, None, "hair", &["a", "b"]).await;
        create_test_fragment(&server, None, "eyes", &["x", "y"]).await;
        expand(&server, "<*hair> <*eyes>").await;

        server
            .post("/api/v1/counters/reset")
            .json(&json!({}))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let counters: Vec<SequentialCounter> = server.get("/api/v1/counters").await.json();
        assert!(counters.is_empty());
    }
}
