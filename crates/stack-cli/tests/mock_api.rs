//! CLI integration tests against a wiremock API server.

mod common;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{
    ACCESS_TOKEN, PROJECT_ID, run_cli_with_env, run_cli_with_env_failure,
    run_cli_with_env_success,
};

fn api_url(server: &MockServer) -> String {
    format!("http://127.0.0.1:{}", server.address().port())
}

fn known_error(status: u16, code: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("x-stack-actual-status", status.to_string().as_str())
        .insert_header("x-stack-known-error", code)
        .set_body_json(json!({"code": code, "message": message}))
}

async fn mount_sign_in(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/password/sign-in"))
        .and(header("x-stack-project-id", PROJECT_ID))
        .and(body_string_contains("alice@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": ACCESS_TOKEN,
            "refresh_token": "refresh-1",
            "user_id": "user-1"
        })))
        .mount(server)
        .await;
}

fn login(home: &std::path::Path, api: &str) {
    run_cli_with_env_success(
        &[
            "auth",
            "login",
            "--email",
            "alice@example.com",
            "--password",
            "secret123",
        ],
        home,
        api,
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_login_whoami_logout() {
    let server = MockServer::start().await;
    let api = api_url(&server);
    let temp_dir = TempDir::new().unwrap();
    let home = temp_dir.path();

    mount_sign_in(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/me"))
        .and(header("x-stack-access-token", ACCESS_TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "user-1",
            "display_name": "Alice",
            "primary_email": "alice@example.com"
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/auth/sessions/current"))
        .and(header("x-stack-refresh-token", "refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    login(home, &api);

    let stdout = run_cli_with_env_success(&["auth", "whoami"], home, &api);
    assert!(stdout.contains("user-1"));
    assert!(stdout.contains("alice@example.com"));

    run_cli_with_env_success(&["auth", "logout"], home, &api);

    let stderr = run_cli_with_env_failure(&["auth", "whoami"], home, &api);
    assert!(stderr.contains("No active session"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_login_with_wrong_password() {
    let server = MockServer::start().await;
    let api = api_url(&server);
    let temp_dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/password/sign-in"))
        .respond_with(known_error(
            400,
            "EMAIL_PASSWORD_MISMATCH",
            "Wrong e-mail or password.",
        ))
        .mount(&server)
        .await;

    let stderr = run_cli_with_env_failure(
        &["auth", "login", "--email", "alice@example.com", "--password", "wrong"],
        temp_dir.path(),
        &api,
    );
    assert!(stderr.contains("Sign-in rejected"));
    assert!(stderr.contains("Wrong e-mail or password"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_refresh_token_updates_stored_session() {
    let server = MockServer::start().await;
    let api = api_url(&server);
    let temp_dir = TempDir::new().unwrap();
    let home = temp_dir.path();

    mount_sign_in(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/oauth/token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "eyJhbGciOiJub25lIn0.eyJzdWIiOiJ1c2VyLTIifQ.sig"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/me"))
        .and(header(
            "x-stack-access-token",
            "eyJhbGciOiJub25lIn0.eyJzdWIiOiJ1c2VyLTIifQ.sig",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "user-1"})))
        .expect(1)
        .mount(&server)
        .await;

    login(home, &api);
    run_cli_with_env_success(&["auth", "refresh-token"], home, &api);

    let stdout = run_cli_with_env_success(&["api", "request", "GET", "/users/me"], home, &api);
    let body: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(body["id"], "user-1");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rejected_refresh_token_clears_session() {
    let server = MockServer::start().await;
    let api = api_url(&server);
    let temp_dir = TempDir::new().unwrap();
    let home = temp_dir.path();

    mount_sign_in(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/oauth/token"))
        .respond_with(known_error(
            401,
            "REFRESH_TOKEN_NOT_FOUND_OR_EXPIRED",
            "Refresh token not found for this project, or the session has expired/been revoked.",
        ))
        .mount(&server)
        .await;

    login(home, &api);

    let stderr = run_cli_with_env_failure(&["auth", "refresh-token"], home, &api);
    assert!(stderr.contains("refresh token was rejected"));

    let stderr = run_cli_with_env_failure(&["auth", "whoami"], home, &api);
    assert!(stderr.contains("No active session"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_request_reports_known_error() {
    let server = MockServer::start().await;
    let api = api_url(&server);
    let temp_dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/api/v1/users/nobody"))
        .and(header("x-stack-access-type", "server"))
        .and(header("x-stack-secret-server-key", "ssk_cli"))
        .respond_with(known_error(404, "USER_NOT_FOUND", "User not found."))
        .expect(1)
        .mount(&server)
        .await;

    let output = run_cli_with_env(
        &[
            "api",
            "request",
            "GET",
            "/users/nobody",
            "--access-type",
            "server",
            "--secret-server-key",
            "ssk_cli",
        ],
        temp_dir.path(),
        &api,
    );

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.contains("USER_NOT_FOUND"));
    assert!(stderr.contains("404 USER_NOT_FOUND"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_diagnostics_with_config_file() {
    let server = MockServer::start().await;
    let api = api_url(&server);
    let temp_dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .mount(&server)
        .await;

    let config_path = temp_dir.path().join("stack.json");
    std::fs::write(
        &config_path,
        json!({
            "projectId": PROJECT_ID,
            "apiUrl": api,
            "publishableClientKey": "pck_cli",
            "diagnostics": {
                "connectivityCheckUrl": format!("{api}/cdn-cgi/trace"),
                "prodDashboardHealthUrl": format!("{api}/dashboard/health"),
                "prodBackendHealthUrl": format!("{api}/health")
            }
        })
        .to_string(),
    )
    .unwrap();

    let stdout = run_cli_with_env_success(
        &[
            "api",
            "diagnostics",
            "--config",
            config_path.to_str().unwrap(),
        ],
        temp_dir.path(),
        &api,
    );

    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    for probe in ["cfTrace", "apiRoot", "baseUrlBackend", "prodDashboard", "prodBackend"] {
        assert_eq!(report[probe], "OK", "probe {probe}");
    }
}

#[test]
fn test_known_errors_listing() {
    let temp_dir = TempDir::new().unwrap();

    let stdout = run_cli_with_env_success(
        &["known-errors", "--json"],
        temp_dir.path(),
        "https://api.example.com",
    );
    let kinds: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();

    let user_not_found = kinds
        .iter()
        .find(|k| k["code"] == "USER_NOT_FOUND")
        .expect("USER_NOT_FOUND listed");
    assert_eq!(user_not_found["name"], "UserNotFound");
    assert!(kinds.iter().all(|k| !k["code"].is_null()));

    let stdout = run_cli_with_env_success(
        &["known-errors", "--all"],
        temp_dir.path(),
        "https://api.example.com",
    );
    assert!(stdout.contains("(abstract)"));
}
