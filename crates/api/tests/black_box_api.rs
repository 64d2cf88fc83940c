use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;

use usersvc_api::app::{build_app, services::AppServices};
use usersvc_auth::{JwtClaims, Role, UserStatus};
use usersvc_core::UserId;
use usersvc_infra::{AppConfig, InMemoryUserDirectory, OutboxNotifier};

const JWT_SECRET: &str = "black-box-secret";
const ADMIN_EMAIL: &str = "root@example.com";
const ADMIN_PASSWORD: &str = "Root-pass-2024";
const PASSWORD: &str = "Kx7-blue-river";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
    outbox: Arc<OutboxNotifier>,
    client: reqwest::Client,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(&[]).await
    }

    async fn spawn_with(overrides: &[(&str, &str)]) -> Self {
        let mut env: HashMap<String, String> = [
            ("JWT_SECRET", JWT_SECRET),
            ("BCRYPT_COST", "4"),
            ("BOOTSTRAP_ADMIN_EMAIL", ADMIN_EMAIL),
            ("BOOTSTRAP_ADMIN_PASSWORD", ADMIN_PASSWORD),
            ("BOOTSTRAP_ADMIN_CPF", "52998224725"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in overrides {
            env.insert(k.to_string(), v.to_string());
        }

        let config = AppConfig::from_lookup(|key| env.get(key).cloned()).expect("valid test config");
        let outbox = Arc::new(OutboxNotifier::new());
        let services = AppServices::assemble(
            &config,
            Arc::new(InMemoryUserDirectory::new()),
            outbox.clone(),
            config.jwt_strategy().expect("jwt strategy"),
        )
        .expect("services");
        services.bootstrap(&config).await.expect("bootstrap admin");

        // Same router as prod, bound to an ephemeral port.
        let app = build_app(Arc::new(services));
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
            handle,
            outbox,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap()
    }

    async fn token(&self, email: &str, password: &str) -> String {
        let res = self.login(email, password).await;
        assert_eq!(res.status(), StatusCode::OK, "login failed for {email}");
        let body: serde_json::Value = res.json().await.unwrap();
        body["access_token"].as_str().unwrap().to_string()
    }

    async fn admin_token(&self) -> String {
        self.token(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    async fn create(&self, token: &str, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url("/users"))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .unwrap()
    }

    async fn activate(&self, token: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/activate"))
            .json(&json!({ "token": token, "password": password }))
            .send()
            .await
            .unwrap()
    }

    async fn get(&self, token: &str, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    async fn patch(&self, token: &str, path: &str, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .patch(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .unwrap()
    }

    /// Create, activate and log in a user. Returns `(id, bearer token)`.
    async fn onboard(&self, creator: &str, body: serde_json::Value) -> (String, String) {
        let res = self.create(creator, &body).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let created: serde_json::Value = res.json().await.unwrap();
        let email = body["email"].as_str().unwrap();

        let activation = self.outbox.token_for(email).expect("activation was sent");
        let res = self.activate(&activation, PASSWORD).await;
        assert_eq!(res.status(), StatusCode::OK);

        let token = self.token(email, PASSWORD).await;
        (created["id"].as_str().unwrap().to_string(), token)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn user_body(name: &str, email: &str, cpf: &str, role: &str, secretary: Option<&str>) -> serde_json::Value {
    let mut body = json!({
        "name": name,
        "email": email,
        "cpf": cpf,
        "phone": "(61) 98888-7777",
        "role": role,
    });
    if let Some(s) = secretary {
        body["secretary"] = json!(s);
    }
    body
}

fn mint_jwt(secret: &str, sub: UserId, role: Role, expires_in: ChronoDuration) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub,
        email: "someone@example.com".to_string(),
        role: Some(role),
        scope: Vec::new(),
        status: Some(UserStatus::Active),
        secretary: None,
        iat: (now - ChronoDuration::minutes(30)).timestamp(),
        exp: (now + expires_in).timestamp(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "user-microservice");
}

#[tokio::test]
async fn auth_required_for_user_endpoints() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/users")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv.get("not-a-jwt", "/users").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn every_route_in_the_access_table_is_served() {
    let srv = TestServer::spawn().await;
    let id = UserId::new().to_string();

    for rule in usersvc_api::authz::routes() {
        let path = rule.path.replace(":id", &id);
        let res = srv
            .client
            .request(rule.method.clone(), srv.url(&path))
            .send()
            .await
            .unwrap();
        assert_ne!(res.status(), StatusCode::NOT_FOUND, "{} {}", rule.method, rule.path);
        assert_ne!(res.status(), StatusCode::METHOD_NOT_ALLOWED, "{} {}", rule.method, rule.path);
    }
}

#[tokio::test]
async fn login_issues_a_bearer_token_the_api_accepts() {
    let srv = TestServer::spawn().await;

    let res = srv.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 3600);

    let token = body["access_token"].as_str().unwrap();
    let res = srv.get(token, "/users").await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_failures_do_not_reveal_which_part_was_wrong() {
    let srv = TestServer::spawn().await;

    let wrong_password = srv.login(ADMIN_EMAIL, "Wrong-pass-1").await;
    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    let a: serde_json::Value = wrong_password.json().await.unwrap();

    let unknown = srv.login("nobody@example.com", "Wrong-pass-1").await;
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    let b: serde_json::Value = unknown.json().await.unwrap();

    assert_eq!(a["message"], b["message"]);
}

#[tokio::test]
async fn expired_or_foreign_tokens_are_rejected() {
    let srv = TestServer::spawn().await;

    let expired = mint_jwt(JWT_SECRET, UserId::new(), Role::Admin, ChronoDuration::minutes(-5));
    assert_eq!(srv.get(&expired, "/users").await.status(), StatusCode::UNAUTHORIZED);

    let foreign = mint_jwt("some-other-secret", UserId::new(), Role::Admin, ChronoDuration::minutes(10));
    assert_eq!(srv.get(&foreign, "/users").await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn activation_flow_end_to_end() {
    let srv = TestServer::spawn().await;
    let admin = srv.admin_token().await;

    let body = user_body("Gabriela Lima", "gabi@example.com", "52601815906", "GESTOR", Some("Saude"));
    let res = srv.create(&admin, &body).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    assert_eq!(created["status"], "PENDING_PASSWORD");
    assert_eq!(created["cpf"], "52601815906");
    assert!(created.get("password").is_none());
    assert!(created.get("activationToken").is_none());
    assert!(created.get("tokenExpiresAt").is_none());

    // Pending users cannot log in.
    assert_eq!(
        srv.login("gabi@example.com", PASSWORD).await.status(),
        StatusCode::UNAUTHORIZED
    );

    let activation = srv.outbox.token_for("gabi@example.com").unwrap();

    // A weak password is refused and does not burn the token.
    assert_eq!(srv.activate(&activation, "abc123").await.status(), StatusCode::BAD_REQUEST);

    let res = srv.activate(&activation, PASSWORD).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["message"].is_string());

    // Single use.
    assert_eq!(srv.activate(&activation, PASSWORD).await.status(), StatusCode::UNAUTHORIZED);

    let token = srv.token("gabi@example.com", PASSWORD).await;
    let me = srv.get(&token, &format!("/users/{}", created["id"].as_str().unwrap())).await;
    assert_eq!(me.status(), StatusCode::OK);
    let me: serde_json::Value = me.json().await.unwrap();
    assert_eq!(me["status"], "ACTIVE");
}

#[tokio::test]
async fn unknown_activation_token_is_unauthorized() {
    let srv = TestServer::spawn().await;

    let res = srv.activate("00000000-0000-4000-8000-000000000000", PASSWORD).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn operador_cannot_create_users() {
    let srv = TestServer::spawn().await;
    let admin = srv.admin_token().await;

    let (_, operador) = srv
        .onboard(
            &admin,
            user_body("Otavio Reis", "otavio@example.com", "08301661305", "OPERADOR", Some("Saude")),
        )
        .await;

    let res = srv
        .create(
            &operador,
            &user_body("Nina Alves", "nina@example.com", "18609139034", "OPERADOR", Some("Saude")),
        )
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn gestor_is_confined_to_their_secretary() {
    let srv = TestServer::spawn().await;
    let admin = srv.admin_token().await;

    let (_, gestor) = srv
        .onboard(
            &admin,
            user_body("Gabriela Lima", "gabi@example.com", "52601815906", "GESTOR", Some("Saude")),
        )
        .await;

    let res = srv
        .create(
            &admin,
            &user_body("Eduardo Pires", "edu@example.com", "08301661305", "OPERADOR", Some("Educacao")),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let other: serde_json::Value = res.json().await.unwrap();

    // Cannot create in another secretary.
    let res = srv
        .create(
            &gestor,
            &user_body("Nina Alves", "nina@example.com", "18609139034", "OPERADOR", Some("Educacao")),
        )
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Cannot read across secretaries.
    let res = srv.get(&gestor, &format!("/users/{}", other["id"].as_str().unwrap())).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Listing only shows their own secretary.
    let res = srv
        .create(
            &gestor,
            &user_body("Nina Alves", "nina@example.com", "18609139034", "OPERADOR", Some("Saude")),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = srv.get(&gestor, "/users").await;
    assert_eq!(res.status(), StatusCode::OK);
    let page: serde_json::Value = res.json().await.unwrap();
    let data = page["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert!(data.iter().all(|u| u["secretary"] == "Saude"));
    assert_eq!(page["meta"]["total"], 2);
}

#[tokio::test]
async fn non_admin_cannot_see_an_admin() {
    let srv = TestServer::spawn().await;
    let admin = srv.admin_token().await;

    let (_, gestor) = srv
        .onboard(
            &admin,
            user_body("Gabriela Lima", "gabi@example.com", "52601815906", "GESTOR", Some("Saude")),
        )
        .await;

    let res = srv
        .create(&admin, &user_body("Ana Costa", "ana@example.com", "99603082430", "ADMIN", Some("Saude")))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let target: serde_json::Value = res.json().await.unwrap();

    let res = srv.get(&gestor, &format!("/users/{}", target["id"].as_str().unwrap())).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn list_is_paged_with_metadata() {
    let srv = TestServer::spawn().await;
    let admin = srv.admin_token().await;

    for (name, email, cpf) in [
        ("Bruno Dias", "bruno@example.com", "62819482112"),
        ("Carla Melo", "carla@example.com", "99351819019"),
    ] {
        let res = srv
            .create(&admin, &user_body(name, email, cpf, "OPERADOR", Some("Saude")))
            .await;
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let res = srv.get(&admin, "/users?page=2&limit=1").await;
    assert_eq!(res.status(), StatusCode::OK);
    let page: serde_json::Value = res.json().await.unwrap();
    assert_eq!(page["meta"]["total"], 3);
    assert_eq!(page["meta"]["page"], 2);
    assert_eq!(page["meta"]["lastPage"], 3);
    // Sorted by name: Administrador, Bruno, Carla.
    assert_eq!(page["data"][0]["name"], "Bruno Dias");
}

#[tokio::test]
async fn malformed_paging_parameters_are_a_json_bad_request() {
    let srv = TestServer::spawn().await;
    let admin = srv.admin_token().await;

    for path in ["/users?page=abc", "/users?limit=-1"] {
        let res = srv.get(&admin, path).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{path}");
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["error"], "bad_request");
        assert!(body["message"].is_string());
    }
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let srv = TestServer::spawn().await;
    let admin = srv.admin_token().await;

    let body = user_body("Bruno Dias", "bruno@example.com", "62819482112", "OPERADOR", Some("Saude"));
    assert_eq!(srv.create(&admin, &body).await.status(), StatusCode::CREATED);

    let again = user_body("Bruno Outro", "BRUNO@example.com", "99351819019", "OPERADOR", Some("Saude"));
    assert_eq!(srv.create(&admin, &again).await.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn request_bodies_reject_unknown_fields_and_bad_shapes() {
    let srv = TestServer::spawn().await;
    let admin = srv.admin_token().await;

    let mut body = user_body("Bruno Dias", "bruno@example.com", "62819482112", "OPERADOR", Some("Saude"));
    body["status"] = json!("ACTIVE");
    let res = srv.create(&admin, &body).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let err: serde_json::Value = res.json().await.unwrap();
    assert_eq!(err["error"], "bad_request");

    let mut body = user_body("Bruno Dias", "bruno@example.com", "62819482112", "OPERADOR", Some("Saude"));
    body["phone"] = json!("6198888-7777");
    assert_eq!(srv.create(&admin, &body).await.status(), StatusCode::BAD_REQUEST);

    let body = user_body("Bruno Dias", "bruno@example.com", "11111111111", "OPERADOR", Some("Saude"));
    assert_eq!(srv.create(&admin, &body).await.status(), StatusCode::BAD_REQUEST);

    let res = srv.get(&admin, "/users/not-a-uuid").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn identity_fields_cannot_be_patched() {
    let srv = TestServer::spawn().await;
    let admin = srv.admin_token().await;

    let res = srv
        .create(&admin, &user_body("Bruno Dias", "bruno@example.com", "62819482112", "OPERADOR", Some("Saude")))
        .await;
    let created: serde_json::Value = res.json().await.unwrap();
    let path = format!("/users/{}", created["id"].as_str().unwrap());

    let res = srv.patch(&admin, &path, &json!({ "name": "Bruno Novo" })).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = srv.patch(&admin, &path, &json!({ "phone": "(61) 91111-2222" })).await;
    assert_eq!(res.status(), StatusCode::OK);
    let updated: serde_json::Value = res.json().await.unwrap();
    assert_eq!(updated["phone"], "(61) 91111-2222");
}

#[tokio::test]
async fn last_gestor_of_a_secretary_cannot_be_demoted() {
    let srv = TestServer::spawn().await;
    let admin = srv.admin_token().await;

    let (gestor_id, _) = srv
        .onboard(
            &admin,
            user_body("Gabriela Lima", "gabi@example.com", "52601815906", "GESTOR", Some("Saude")),
        )
        .await;

    let res = srv
        .patch(&admin, &format!("/users/{gestor_id}"), &json!({ "role": "OPERADOR" }))
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn delete_is_admin_only_and_soft() {
    let srv = TestServer::spawn().await;
    let admin = srv.admin_token().await;

    let (_, gestor) = srv
        .onboard(
            &admin,
            user_body("Gabriela Lima", "gabi@example.com", "52601815906", "GESTOR", Some("Saude")),
        )
        .await;
    let res = srv
        .create(&gestor, &user_body("Nina Alves", "nina@example.com", "18609139034", "OPERADOR", Some("Saude")))
        .await;
    let target: serde_json::Value = res.json().await.unwrap();
    let path = srv.url(&format!("/users/{}", target["id"].as_str().unwrap()));

    let res = srv.client.delete(&path).bearer_auth(&gestor).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = srv.client.delete(&path).bearer_auth(&admin).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let deleted: serde_json::Value = res.json().await.unwrap();
    assert_eq!(deleted["status"], "INACTIVE");
    assert!(deleted["inactivatedAt"].is_string());

    // Still there.
    let res = srv.get(&admin, &format!("/users/{}", target["id"].as_str().unwrap())).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn inactivated_user_loses_access_immediately() {
    let srv = TestServer::spawn().await;
    let admin = srv.admin_token().await;

    let (operador_id, operador) = srv
        .onboard(
            &admin,
            user_body("Otavio Reis", "otavio@example.com", "08301661305", "OPERADOR", Some("Saude")),
        )
        .await;
    assert_eq!(srv.get(&operador, "/users").await.status(), StatusCode::OK);

    let res = srv
        .patch(&admin, &format!("/users/{operador_id}/inactivate"), &json!({}))
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    assert_eq!(srv.get(&operador, "/users").await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        srv.login("otavio@example.com", PASSWORD).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn embedded_mode_trusts_the_token_until_expiry() {
    let srv = TestServer::spawn_with(&[("TOKEN_VALIDATION", "embedded")]).await;
    let admin = srv.admin_token().await;

    let (operador_id, operador) = srv
        .onboard(
            &admin,
            user_body("Otavio Reis", "otavio@example.com", "08301661305", "OPERADOR", Some("Saude")),
        )
        .await;

    let res = srv
        .patch(&admin, &format!("/users/{operador_id}/inactivate"), &json!({}))
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    assert_eq!(srv.get(&operador, "/users").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn internal_validate_answers_200_for_bad_credentials() {
    let srv = TestServer::spawn().await;

    let res = srv
        .client
        .post(srv.url("/internal/auth/validate"))
        .json(&json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["valid"], true);
    assert!(body["userId"].is_string());
    assert_eq!(body["roles"], json!(["ADMIN"]));

    let res = srv
        .client
        .post(srv.url("/internal/auth/validate"))
        .json(&json!({ "email": ADMIN_EMAIL, "password": "Wrong-pass-1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["valid"], false);
    assert!(body["userId"].is_null());
    assert_eq!(body["roles"], json!([]));
}
