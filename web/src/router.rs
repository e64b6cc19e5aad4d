use crate::controller::{auth_controller, health_check_controller};
use crate::AppState;
use axum::{routing::get, Router};
use service::config::Config;
use tower_sessions::cookie::SameSite;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

/// Name of the cookie carrying the session id.
const SESSION_COOKIE_NAME: &str = "sign_in.sid";

pub fn define_routes(app_state: AppState) -> Router {
    let session_layer = session_layer(&app_state.config);

    Router::new()
        .merge(auth_routes(app_state))
        .merge(health_routes())
        .layer(session_layer)
}

fn auth_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(auth_controller::index))
        .route(
            "/sign-out",
            get(auth_controller::sign_out).post(auth_controller::sign_out),
        )
        .with_state(app_state)
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

// SameSite=Lax so the cookie survives the top-level redirect back from Google.
fn session_layer(config: &Config) -> SessionManagerLayer<MemoryStore> {
    let expiry_seconds = i64::try_from(config.session_expiry_seconds).unwrap_or(i64::MAX);

    SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE_NAME)
        .with_secure(config.is_production())
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::seconds(expiry_seconds)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use clap::Parser;
    use google_auth::controller::AuthController;
    use google_auth::http::HttpClientBuilder;
    use google_auth::oauth::ProviderConfig;
    use mockito::{Matcher, Server, ServerGuard};
    use tower::ServiceExt;
    use url::form_urlencoded;

    fn app(server: &ServerGuard, client_secret: &str) -> Router {
        let config = Config::parse_from(["web-test"]);
        let provider_config = ProviderConfig::google(
            "client-123".to_string(),
            client_secret.to_string(),
            "http://localhost:4000/".to_string(),
        )
        .with_token_endpoint(&format!("{}/token", server.url()))
        .with_userinfo_endpoint(&format!("{}/userinfo", server.url()));
        let http_client = HttpClientBuilder::new().build().unwrap();
        let controller = AuthController::with_http_client(provider_config, http_client);

        define_routes(AppState::new(config, controller))
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn session_cookie(response: &Response) -> Option<String> {
        response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(str::to_string)
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn state_from(login_url: &str) -> String {
        let query = login_url.split_once('?').map(|(_, q)| q).unwrap();
        form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
            .unwrap()
    }

    /// First visit: returns the session cookie and the `state` of the login URL.
    async fn visit(app: &Router) -> (String, String) {
        let response = app.clone().oneshot(get("/", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = session_cookie(&response).unwrap();
        let body = json_body(response).await;
        let state = state_from(body["loginUrl"].as_str().unwrap());
        (cookie, state)
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = Server::new_async().await;
        let response = app(&server, "secret")
            .oneshot(get("/health", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn test_first_visit_renders_login_url_and_sets_cookie() {
        let server = Server::new_async().await;
        let response = app(&server, "secret")
            .oneshot(get("/", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = session_cookie(&response).unwrap();
        assert!(cookie.starts_with("sign_in.sid="));
        let body = json_body(response).await;
        let login_url = body["loginUrl"].as_str().unwrap();
        assert!(login_url.starts_with("https://accounts.google.com/o/oauth2/auth?"));
        assert!(login_url.contains("client_id=client-123"));
    }

    #[tokio::test]
    async fn test_callback_redirects_then_renders_profile() {
        let mut server = Server::new_async().await;
        let token_mock = server
            .mock("POST", "/token")
            .match_body(Matcher::UrlEncoded("code".into(), "auth-code".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"tok123","refresh_token":"ref456","expires_in":3600}"#)
            .expect(1)
            .create_async()
            .await;
        let _userinfo_mock = server
            .mock("GET", "/userinfo")
            .match_header("authorization", "Bearer tok123")
            .with_status(200)
            .with_body(r#"{"id":"42","name":"Ada","email":"a@x.com"}"#)
            .create_async()
            .await;
        let app = app(&server, "secret");
        let (cookie, state) = visit(&app).await;

        let response = app
            .clone()
            .oneshot(get(
                &format!("/?code=auth-code&state={state}"),
                Some(&cookie),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");
        let cookie = session_cookie(&response).unwrap_or(cookie);

        let response = app.clone().oneshot(get("/", Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["profile"]["id"], "42");
        assert_eq!(body["profile"]["name"], "Ada");
        assert_eq!(body["profile"]["email"], "a@x.com");

        token_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_callback_error_is_shown_once_after_redirect() {
        let mut server = Server::new_async().await;
        let token_mock = server
            .mock("POST", "/token")
            .expect(0)
            .create_async()
            .await;
        let app = app(&server, "secret");
        let (cookie, _state) = visit(&app).await;

        let response = app
            .clone()
            .oneshot(get("/?code=auth-code&state=forged", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = app.clone().oneshot(get("/", Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["errorMessage"].as_str().is_some());

        let response = app.clone().oneshot(get("/", Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(json_body(response).await["loginUrl"].is_string());

        token_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_repeated_callback_parameters_use_first_occurrence() {
        let mut server = Server::new_async().await;
        let token_mock = server
            .mock("POST", "/token")
            .match_body(Matcher::UrlEncoded("code".into(), "first-code".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"tok123","expires_in":3600}"#)
            .expect(1)
            .create_async()
            .await;
        let _userinfo_mock = server
            .mock("GET", "/userinfo")
            .with_status(200)
            .with_body(r#"{"id":"42","name":"Ada"}"#)
            .create_async()
            .await;
        let app = app(&server, "secret");
        let (cookie, state) = visit(&app).await;

        let response = app
            .clone()
            .oneshot(get(
                &format!("/?code=first-code&state={state}&code=second-code&state=forged"),
                Some(&cookie),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let cookie = session_cookie(&response).unwrap_or(cookie);
        let response = app.clone().oneshot(get("/", Some(&cookie))).await.unwrap();
        assert_eq!(json_body(response).await["profile"]["id"], "42");

        token_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_denied_consent_is_shown_as_error_once() {
        let mut server = Server::new_async().await;
        let token_mock = server
            .mock("POST", "/token")
            .expect(0)
            .create_async()
            .await;
        let app = app(&server, "secret");
        let (cookie, state) = visit(&app).await;

        let response = app
            .clone()
            .oneshot(get(
                &format!("/?error=access_denied&state={state}"),
                Some(&cookie),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");

        let response = app.clone().oneshot(get("/", Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({ "errorMessage": "Authentication error: access_denied" })
        );

        let response = app.clone().oneshot(get("/", Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(json_body(response).await["loginUrl"].is_string());

        token_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_sign_out_renders_login() {
        let server = Server::new_async().await;
        let app = app(&server, "secret");
        let (cookie, _state) = visit(&app).await;

        let request = Request::builder()
            .method("POST")
            .uri("/sign-out")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(json_body(response).await["loginUrl"].is_string());
    }

    #[tokio::test]
    async fn test_missing_client_secret_is_server_error() {
        let server = Server::new_async().await;
        let response = app(&server, "")
            .oneshot(get("/", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert!(body["errorMessage"]
            .as_str()
            .unwrap()
            .contains("GOOGLE_CLIENT_SECRET"));
    }
}
