use chrono::{Duration as ChronoDuration, Utc};
use custodia_auth::{JwtClaims, Role};
use custodia_core::UserId;
use custodia_infra::config::AppConfig;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

const JWT_SECRET: &str = "test-secret";
const ADMIN: &str = "admin";
const ADMIN_PASSWORD: &str = "admin-password";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let config = AppConfig {
            jwt_secret: JWT_SECRET.to_string(),
            admin_username: Some(ADMIN.to_string()),
            admin_password: Some(ADMIN_PASSWORD.to_string()),
            ..AppConfig::default()
        };

        // Build app (same router as prod), but bind to an ephemeral port.
        let app = custodia_api::app::build_app(&config)
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn login(&self, username: &str, password: &str) -> String {
        let res = self
            .client
            .post(self.url("/auth/token"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["token_type"], "Bearer");
        body["access_token"].as_str().unwrap().to_string()
    }

    async fn register_user(&self, username: &str, dni: &str) -> String {
        let res = self
            .client
            .post(self.url("/auth/register"))
            .json(&json!({
                "username": username,
                "password": "clave-segura",
                "first_name": "Carla",
                "last_name": "Quispe",
                "dni": dni,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = res.json().await.unwrap();
        assert!(body.get("password_hash").is_none());
        body["id"].as_str().unwrap().to_string()
    }

    async fn post(&self, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn get(&self, token: &str, path: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn delete(&self, token: &str, path: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn register_book(&self, token: &str, isbn: &str, copies: u32) -> String {
        let (status, body) = self
            .post(
                token,
                "/library",
                json!({
                    "code": isbn,
                    "quantity": copies,
                    "details": { "title": "Los ríos profundos", "author": "José María Arguedas" },
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["resource"]["id"].as_str().unwrap().to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(roles: Vec<Role>) -> String {
    let now = Utc::now();
    let claims = JwtClaims::new(UserId::new(), "minted", roles, now, now + ChronoDuration::minutes(10));

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

#[tokio::test]
async fn health_is_public_and_whoami_requires_auth() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["backend"], "memory");

    let res = srv.client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let (status, body) = srv.get(&mint_jwt(vec![Role::LIBRARIAN]), "/whoami").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "librarian"));
    assert!(body["permissions"].as_array().unwrap().iter().any(|p| p == "library.manage"));
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let srv = TestServer::spawn().await;
    let res = srv
        .client
        .post(srv.url("/auth/token"))
        .json(&json!({ "username": ADMIN, "password": "nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_credentials");
}

#[tokio::test]
async fn loan_lifecycle_conserves_copies() {
    let srv = TestServer::spawn().await;
    let admin = srv.login(ADMIN, ADMIN_PASSWORD).await;
    let reader = srv.register_user("cquispe", "40404040").await;
    let book = srv.register_book(&admin, "978-612-305-100-1", 5).await;

    let (status, body) = srv
        .post(&admin, &format!("/library/{book}/grant"), json!({ "holder_id": reader, "quantity": 3 }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["resource"]["quantity"], 2);

    let (status, body) = srv
        .post(&admin, &format!("/library/{book}/grant"), json!({ "holder_id": reader, "quantity": 1 }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["record"]["quantity"], 4);
    assert!(body["message"].as_str().is_some());

    let (_, stock) = srv.get(&admin, &format!("/library/{book}/stock")).await;
    assert_eq!(stock["available"], 1);
    assert_eq!(stock["in_custody"], 4);
    assert_eq!(stock["total"], 5);

    let reader_token = srv.login("cquispe", "clave-segura").await;
    let (status, mine) = srv.get(&reader_token, "/library/mine").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let (status, body) = srv
        .post(&admin, &format!("/library/{book}/return"), json!({ "holder_id": reader }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["resource"]["quantity"], 5);

    let (_, mine) = srv.get(&reader_token, "/library/mine").await;
    assert!(mine.as_array().unwrap().is_empty());

    let mut feed = Value::Null;
    for _ in 0..50 {
        let (_, body) = srv.get(&admin, &format!("/activity?resource_id={book}")).await;
        if body.as_array().is_some_and(|a| a.len() == 4) {
            feed = body;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(feed[0]["event_type"], "custody.returned");
    assert_eq!(feed[3]["event_type"], "custody.resource.registered");
}

#[tokio::test]
async fn over_grant_is_rejected_and_nothing_changes() {
    let srv = TestServer::spawn().await;
    let admin = srv.login(ADMIN, ADMIN_PASSWORD).await;
    let reader = srv.register_user("lector", "50505050").await;
    let book = srv.register_book(&admin, "9786123051002", 2).await;

    let (status, body) = srv
        .post(&admin, &format!("/library/{book}/grant"), json!({ "holder_id": reader, "quantity": 3 }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "insufficient_stock");
    assert_eq!(body["retryable"], false);

    let (_, resource) = srv.get(&admin, &format!("/library/{book}")).await;
    assert_eq!(resource["quantity"], 2);

    let (status, body) = srv
        .post(
            &admin,
            &format!("/library/{book}/grant"),
            json!({ "holder_id": UserId::new(), "quantity": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{body}");
}

#[tokio::test]
async fn duplicate_isbn_conflicts() {
    let srv = TestServer::spawn().await;
    let admin = srv.login(ADMIN, ADMIN_PASSWORD).await;
    srv.register_book(&admin, "978-612-305-100-3", 1).await;

    let (status, body) = srv
        .post(
            &admin,
            "/library",
            json!({ "code": "9786123051003", "details": { "title": "Otra", "author": "Otro" } }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "duplicate");
}

#[tokio::test]
async fn permissions_gate_management_and_forced_removal() {
    let srv = TestServer::spawn().await;
    let admin = srv.login(ADMIN, ADMIN_PASSWORD).await;
    let reader = srv.register_user("docente", "60606060").await;
    let reader_token = srv.login("docente", "clave-segura").await;

    let asset = json!({
        "code": "inv-2024-001",
        "details": {
            "name": "Proyector",
            "asset_type": "movable",
            "acquired_on": "2024-03-01",
        },
    });
    let (status, _) = srv.post(&reader_token, "/assets", asset.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = srv.post(&admin, "/assets", asset).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let asset_id = body["resource"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["resource"]["code"], "INV-2024-001");

    let (status, body) = srv
        .post(
            &admin,
            &format!("/assets/{asset_id}/grant"),
            json!({ "holder_id": reader, "kind": "assignment" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["resource"]["status"], "in_use");

    let manager = mint_jwt(vec![Role::ASSETS_MANAGER]);
    let (status, _) = srv.delete(&manager, &format!("/assets/{asset_id}?force=true")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = srv.delete(&manager, &format!("/assets/{asset_id}")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["retryable"], true);

    let (status, body) = srv.delete(&admin, &format!("/users/{reader}")).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, body) = srv.delete(&admin, &format!("/assets/{asset_id}?force=true")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["resource"].is_null());

    let (status, _) = srv.delete(&admin, &format!("/users/{reader}")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn malformed_ids_are_bad_requests() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(vec![Role::GENERAL]);
    let (status, body) = srv.get(&token, "/assets/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");
}

#[tokio::test]
async fn multibyte_isbn_is_a_validation_error() {
    let srv = TestServer::spawn().await;
    let admin = srv.login(ADMIN, ADMIN_PASSWORD).await;

    let (status, body) = srv.get(&admin, "/library/code/978%C3%A9").await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["error"], "validation_error");

    let (status, body) = srv
        .post(
            &admin,
            "/library",
            json!({ "code": "978é", "details": { "title": "Paco Yunque", "author": "César Vallejo" } }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn unknown_custody_kind_is_a_validation_error() {
    let srv = TestServer::spawn().await;
    let admin = srv.login(ADMIN, ADMIN_PASSWORD).await;
    let reader = srv.register_user("alumna", "70707070").await;
    let book = srv.register_book(&admin, "9786123051004", 2).await;

    let (status, body) = srv
        .post(&admin, &format!("/library/{book}/grant"), json!({ "holder_id": reader, "kind": "gift" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["retryable"], false);

    let (_, resource) = srv.get(&admin, &format!("/library/{book}")).await;
    assert_eq!(resource["quantity"], 2);
}

#[tokio::test]
async fn malformed_bodies_and_queries_get_the_error_body() {
    let srv = TestServer::spawn().await;
    let admin = srv.login(ADMIN, ADMIN_PASSWORD).await;
    let book = srv.register_book(&admin, "9786123051005", 1).await;

    let (status, body) = srv
        .post(&admin, &format!("/library/{book}/units/add"), json!({ "delta": "many" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = srv.get(&admin, "/library?status=lost").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = srv.get(&admin, "/library/records?kind=gift").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn record_return_accepts_an_empty_body() {
    let srv = TestServer::spawn().await;
    let admin = srv.login(ADMIN, ADMIN_PASSWORD).await;
    let reader = srv.register_user("lectora", "80808080").await;
    let book = srv.register_book(&admin, "9786123051006", 3).await;

    let (status, body) = srv
        .post(&admin, &format!("/library/{book}/grant"), json!({ "holder_id": reader, "quantity": 2 }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let record = body["record"]["id"].as_str().unwrap().to_string();

    let res = srv
        .client
        .post(srv.url(&format!("/library/records/{record}/return")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["resource"]["quantity"], 3);

    let (status, body) = srv
        .post(&admin, &format!("/library/records/{record}/return"), json!({ "quantity": "all" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}
