//! End-to-end tests: the real router on an ephemeral port, in-memory stores,
//! driven over HTTP with reqwest.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use book_catalog::domain::authz::{Caller, Permission};
use book_catalog::infra::auth::ApiKeys;
use book_catalog::storage::books::MemoryBookStore;
use book_catalog::storage::covers::MemoryCoverStore;
use book_catalog::{transport, CatalogService};
use reqwest::StatusCode;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

type TestResult = Result<(), Box<dyn std::error::Error>>;

const ADMIN: &str = "admin-key";
const OTHER: &str = "other-key";
const VIEWER: &str = "viewer-key";

struct TestApp {
    base_url: String,
    client: reqwest::Client,
}

impl TestApp {
    async fn spawn() -> Result<Self, Box<dyn std::error::Error>> {
        let mut api_keys = ApiKeys::default();
        api_keys.insert(ADMIN, Caller::user("admin", Permission::ALL));
        api_keys.insert(OTHER, Caller::authenticated("other"));
        api_keys.insert(VIEWER, Caller::user("viewer", [Permission::ViewBook]));

        let catalog = CatalogService::new(
            Arc::new(MemoryBookStore::new()),
            Arc::new(MemoryCoverStore::new()),
        );
        let app_state = transport::http::AppState {
            catalog: Arc::new(catalog),
            api_keys: Arc::new(api_keys),
        };
        let router = transport::http::create_router(app_state);

        // Bind to an ephemeral port so tests can run in parallel.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", port),
            client: reqwest::Client::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, key: Option<&str>, path: &str) -> reqwest::Result<(StatusCode, JsonValue)> {
        let mut req = self.client.get(self.url(path));
        if let Some(key) = key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await?;
        let status = resp.status();
        Ok((status, resp.json().await?))
    }

    async fn post(&self, key: Option<&str>, path: &str, body: JsonValue) -> reqwest::Result<(StatusCode, JsonValue)> {
        let mut req = self.client.post(self.url(path)).json(&body);
        if let Some(key) = key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await?;
        let status = resp.status();
        Ok((status, resp.json().await?))
    }

    /// Creates a book as the admin and returns its id.
    async fn create_book(&self, body: JsonValue) -> Result<i64, Box<dyn std::error::Error>> {
        let (status, resp) = self.post(Some(ADMIN), "/api/books", body).await?;
        assert_eq!(status, StatusCode::CREATED, "{resp}");
        resp["data"]["id"]
            .as_i64()
            .ok_or_else(|| format!("no id in {resp}").into())
    }
}

fn book(title: &str, pages: i64, rating: i64) -> JsonValue {
    json!({
        "title": title,
        "pages": pages,
        "rating": rating,
        "status": "RE",
        "published_date": "2001-05-01",
        "read_date": "2010-01-01"
    })
}

fn errors_for<'a>(resp: &'a JsonValue, field: &str) -> Vec<&'a str> {
    resp["data"]["errors"][field]
        .as_array()
        .map(|msgs| msgs.iter().filter_map(JsonValue::as_str).collect())
        .unwrap_or_default()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn health_reports_ok() -> TestResult {
    let app = TestApp::spawn().await?;
    let (status, resp) = app.get(None, "/health").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["data"]["status"], "ok");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn anonymous_callers_browse_but_must_authenticate_for_details() -> TestResult {
    let app = TestApp::spawn().await?;
    let id = app.create_book(book("Dune", 412, 5)).await?;

    // List and stats answer the same with or without an identity.
    for path in ["/api/books?sort=pages", "/api/stats", "/api/authors"] {
        let anonymous = app.get(None, path).await?;
        let other = app.get(Some(OTHER), path).await?;
        assert_eq!(anonymous.0, StatusCode::OK, "{path}");
        assert_eq!(anonymous, other, "{path}");
    }
    // An unknown key is the same as no key.
    let (status, resp) = app.get(Some("not-a-key"), "/api/books").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["data"]["items"][0]["title"], "Dune");

    for path in [format!("/api/books/{id}"), format!("/api/books/{id}/cover")] {
        let (status, resp) = app.get(None, &path).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{path}");
        assert_eq!(resp["success"], false);
    }

    let (status, _) = app.post(None, "/api/books", book("Emma", 300, 3)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.post(None, &format!("/api/books/{id}"), json!({ "rating": 1 })).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.post(None, &format!("/api/books/{id}/delete"), json!({})).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .post(None, "/api/authors", json!({ "name": "Mary", "last_name": "Shelley" }))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn denied_callers_learn_nothing_about_their_input() -> TestResult {
    let app = TestApp::spawn().await?;

    let resp = app
        .client
        .post(app.url("/api/books"))
        .header("content-type", "application/json")
        .body("{ nope")
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .client
        .post(app.url("/api/books"))
        .bearer_auth(OTHER)
        .header("content-type", "application/json")
        .body("{ nope")
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let (status, _) = app.get(None, "/api/books/abc").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.post(None, "/api/books/abc", json!({ "rating": 1 })).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.post(Some(OTHER), "/api/books/abc/delete", json!({})).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Allowed callers get the input errors.
    let (status, _) = app.get(Some(OTHER), "/api/books/abc").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dot_cover_names_are_field_errors() -> TestResult {
    let app = TestApp::spawn().await?;
    let mut body = book("Dots", 10, 1);
    body["cover_image"] = json!({ "filename": "..", "content_base64": "eA==" });
    let (status, resp) = app.post(Some(ADMIN), "/api/books", body).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        errors_for(&resp, "cover_image"),
        vec!["No file was submitted. Check the encoding type on the form."]
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn permission_matrix() -> TestResult {
    let app = TestApp::spawn().await?;
    let id = app.create_book(book("Dune", 412, 5)).await?;

    // Authenticated without grants: reads succeed, writes are forbidden.
    let (status, resp) = app.get(Some(OTHER), "/api/books").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["data"]["items"][0]["title"], "Dune");
    let (status, _) = app.get(Some(OTHER), &format!("/api/books/{id}")).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(Some(OTHER), "/api/stats").await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.post(Some(OTHER), "/api/books", book("Emma", 300, 3)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.post(Some(OTHER), &format!("/api/books/{id}"), json!({ "rating": 1 })).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.post(Some(OTHER), &format!("/api/books/{id}/delete"), json!({})).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // view_book alone does not allow creating.
    let (status, _) = app.post(Some(VIEWER), "/api/books", book("Emma", 300, 3)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Forbidden writes left the record untouched.
    let (_, resp) = app.get(Some(ADMIN), &format!("/api/books/{id}")).await?;
    assert_eq!(resp["data"]["rating"], 5);

    // Deleting twice: success, then not found.
    let (status, _) = app.post(Some(ADMIN), &format!("/api/books/{id}/delete"), json!({})).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.post(Some(ADMIN), &format!("/api/books/{id}/delete"), json!({})).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get(Some(ADMIN), &format!("/api/books/{id}")).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn create_reports_field_errors() -> TestResult {
    let app = TestApp::spawn().await?;

    let (status, resp) = app
        .post(
            Some(ADMIN),
            "/api/books",
            json!({
                "title": "x".repeat(51),
                "pages": 0,
                "rating": 6,
                "status": "RE",
                "published_date": "2010-01-01",
                "read_date": "2009-12-31"
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        errors_for(&resp, "title"),
        vec!["The title must be less than 50 characters long"]
    );
    assert_eq!(
        errors_for(&resp, "pages"),
        vec!["Ensure this value is greater than or equal to 1."]
    );
    assert_eq!(
        errors_for(&resp, "rating"),
        vec!["Ensure this value is less than or equal to 5."]
    );
    assert_eq!(
        errors_for(&resp, "read_date"),
        vec!["The read date must be after the published date"]
    );

    let (status, resp) = app
        .post(Some(ADMIN), "/api/books", json!({ "title": "", "status": "XX" }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(errors_for(&resp, "title"), vec!["The title is mandatory"]);
    assert_eq!(errors_for(&resp, "pages"), vec!["This field is required."]);
    assert_eq!(
        errors_for(&resp, "status"),
        vec!["Select a valid choice. XX is not one of the available choices."]
    );

    let mut with_author = book("Dune", 412, 5);
    with_author["authors"] = json!([99]);
    let (status, resp) = app.post(Some(ADMIN), "/api/books", with_author).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        errors_for(&resp, "authors"),
        vec!["Select a valid choice. 99 is not one of the available choices."]
    );

    // Nothing was stored.
    let (_, resp) = app.get(Some(ADMIN), "/api/books").await?;
    assert_eq!(resp["data"]["pagination"]["total"], 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn malformed_json_is_unprocessable() -> TestResult {
    let app = TestApp::spawn().await?;
    let resp = app
        .client
        .post(app.url("/api/books"))
        .bearer_auth(ADMIN)
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn list_filters_sorts_and_reports_meta() -> TestResult {
    let app = TestApp::spawn().await?;
    app.create_book(book("The Hobbit", 310, 4)).await?;
    app.create_book(book("Brave New World", 288, 3)).await?;
    app.create_book(book("On the Road", 320, 2)).await?;
    app.create_book(book("Ulysses", 730, 5)).await?;

    let (status, resp) = app
        .get(Some(OTHER), "/api/books?title=THE&sort=pages&direction=desc&page=1")
        .await?;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = resp["data"]["items"]
        .as_array()
        .map(|items| items.iter().filter_map(|b| b["title"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(titles, vec!["On the Road", "The Hobbit"]);
    assert_eq!(resp["data"]["meta"]["sort"], "pages");
    assert_eq!(resp["data"]["meta"]["direction"], "desc");
    assert_eq!(resp["data"]["meta"]["title"], "THE");
    assert_eq!(
        resp["data"]["meta"]["query_string"],
        "title=THE&sort=pages&direction=desc"
    );

    // Unknown sort and direction fall back to title ascending.
    let (status, resp) = app
        .get(Some(OTHER), "/api/books?sort=password&direction=sideways")
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["data"]["meta"]["sort"], "title");
    assert_eq!(resp["data"]["meta"]["direction"], "asc");
    assert_eq!(resp["data"]["items"][0]["title"], "Brave New World");
    assert_eq!(resp["data"]["items"][3]["title"], "Ulysses");
    assert_eq!(resp["data"]["items"][0]["status_label"], "Read");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn list_pagination() -> TestResult {
    let app = TestApp::spawn().await?;
    for i in 0..12 {
        app.create_book(book(&format!("Volume {i:02}"), 100 + i, 3)).await?;
    }

    let (_, resp) = app.get(Some(OTHER), "/api/books").await?;
    assert_eq!(resp["data"]["items"].as_array().map(Vec::len), Some(10));
    assert_eq!(resp["data"]["pagination"]["num_pages"], 2);
    assert_eq!(resp["data"]["pagination"]["has_next"], true);

    let (_, resp) = app.get(Some(OTHER), "/api/books?page=last").await?;
    assert_eq!(resp["data"]["pagination"]["page"], 2);
    assert_eq!(resp["data"]["items"].as_array().map(Vec::len), Some(2));
    assert_eq!(resp["data"]["items"][1]["title"], "Volume 11");

    let (_, resp) = app.get(Some(OTHER), "/api/books?page=abc").await?;
    assert_eq!(resp["data"]["pagination"]["page"], 1);

    for page in ["3", "0", "-1", "99999999999999999999999"] {
        let (status, resp) = app.get(Some(OTHER), &format!("/api/books?page={page}")).await?;
        assert_eq!(status, StatusCode::OK, "page={page}");
        assert_eq!(resp["data"]["items"].as_array().map(Vec::len), Some(0), "page={page}");
        assert_eq!(resp["data"]["pagination"]["total"], 12);
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stats_over_empty_and_single_book_catalogs() -> TestResult {
    let app = TestApp::spawn().await?;

    let (status, resp) = app.get(Some(OTHER), "/api/stats").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["data"]["avg_pages"], 0.0);
    assert_eq!(resp["data"]["avg_rating"], 0.0);
    assert!(resp["data"]["max_pages_book"].is_null());
    assert_eq!(resp["data"]["status_distribution"], json!([]));
    assert_eq!(resp["data"]["rating_distribution"], json!([]));

    let id = app.create_book(book("Solo", 300, 4)).await?;
    let (_, resp) = app.get(Some(OTHER), "/api/stats").await?;
    assert_eq!(resp["data"]["max_pages_book"]["id"], id);
    assert_eq!(resp["data"]["min_pages_book"]["id"], id);
    assert_eq!(resp["data"]["avg_pages"], 300.0);
    assert_eq!(resp["data"]["avg_rating"], 4.0);
    assert_eq!(
        resp["data"]["status_distribution"],
        json!([{ "status": "RE", "label": "Read", "count": 1 }])
    );
    assert_eq!(
        resp["data"]["rating_distribution"],
        json!([{ "rating": 4, "count": 1 }])
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn update_merges_and_revalidates() -> TestResult {
    let app = TestApp::spawn().await?;
    let id = app.create_book(book("Middlemarch", 880, 4)).await?;

    let (status, resp) = app
        .post(Some(ADMIN), &format!("/api/books/{id}"), json!({ "rating": 2 }))
        .await?;
    assert_eq!(status, StatusCode::OK, "{resp}");
    assert_eq!(resp["data"]["rating"], 2);
    assert_eq!(resp["data"]["title"], "Middlemarch");
    assert_eq!(resp["data"]["pages"], 880);
    assert_eq!(resp["data"]["read_date"], "2010-01-01");

    // The merged record is validated as a whole.
    let (status, resp) = app
        .post(Some(ADMIN), &format!("/api/books/{id}"), json!({ "read_date": "1999-01-01" }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        errors_for(&resp, "read_date"),
        vec!["The read date must be after the published date"]
    );

    let (status, _) = app
        .post(Some(ADMIN), "/api/books/4242", json!({ "rating": 2 }))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get(Some(ADMIN), "/api/books/not-a-number").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn covers_upload_fetch_and_clear() -> TestResult {
    let app = TestApp::spawn().await?;
    let png = vec![0x89, b'P', b'N', b'G', 1, 2, 3];

    let mut body = book("Illustrated", 120, 5);
    body["cover_image"] = json!({
        "filename": "C:\\scans\\front.png",
        "content_base64": BASE64.encode(&png)
    });
    let (status, resp) = app.post(Some(ADMIN), "/api/books", body.clone()).await?;
    assert_eq!(status, StatusCode::CREATED, "{resp}");
    assert_eq!(resp["data"]["cover_image"], "covers/front.png");
    let id = resp["data"]["id"].as_i64().ok_or("no id")?;

    // A second upload with the same name gets a distinct blob.
    let (_, resp) = app.post(Some(ADMIN), "/api/books", body).await?;
    assert_eq!(resp["data"]["cover_image"], "covers/front_1.png");

    let resp = app
        .client
        .get(app.url(&format!("/api/books/{id}/cover")))
        .bearer_auth(OTHER)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").and_then(|v| v.to_str().ok()),
        Some("image/png")
    );
    assert_eq!(resp.bytes().await?.to_vec(), png);

    // Updates that omit the cover keep it; null clears it.
    let (_, resp) = app
        .post(Some(ADMIN), &format!("/api/books/{id}"), json!({ "pages": 121 }))
        .await?;
    assert_eq!(resp["data"]["cover_image"], "covers/front.png");
    let (_, resp) = app
        .post(Some(ADMIN), &format!("/api/books/{id}"), json!({ "cover_image": null }))
        .await?;
    assert!(resp["data"]["cover_image"].is_null());

    let (status, _) = app.get(Some(OTHER), &format!("/api/books/{id}/cover")).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn authors_are_created_and_linked() -> TestResult {
    let app = TestApp::spawn().await?;

    let author = json!({ "name": "Mary", "last_name": "Shelley" });
    let (status, _) = app.post(Some(OTHER), "/api/authors", author.clone()).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, resp) = app.post(Some(ADMIN), "/api/authors", author).await?;
    assert_eq!(status, StatusCode::CREATED);
    let author_id = resp["data"]["id"].as_i64().ok_or("no author id")?;

    let (status, resp) = app
        .post(Some(ADMIN), "/api/authors", json!({ "name": " ", "last_name": "" }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(errors_for(&resp, "name"), vec!["This field is required."]);
    assert_eq!(errors_for(&resp, "last_name"), vec!["This field is required."]);

    let mut body = book("Frankenstein", 280, 5);
    body["authors"] = json!([author_id, author_id.to_string()]);
    let id = app.create_book(body).await?;

    let (_, resp) = app.get(Some(OTHER), &format!("/api/books/{id}")).await?;
    assert_eq!(
        resp["data"]["authors"],
        json!([{ "id": author_id, "name": "Mary", "last_name": "Shelley" }])
    );

    let (status, resp) = app.get(Some(OTHER), "/api/authors").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["data"].as_array().map(Vec::len), Some(1));
    Ok(())
}
