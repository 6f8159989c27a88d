//! Shared mock-workspace fixtures for integration tests.

#![allow(dead_code)]

pub mod socket_guard;

use porter_core::{Credentials, SessionSettings, Workspace, WorkspaceAccess};
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const EMAIL: &str = "me@example.com";
pub const PASSWORD: &str = "hunter2";
pub const SESSION_COOKIE: &str = "d=session-abc";

pub const LOGIN_PAGE: &str = r#"<html><body>
<form action="/" method="post" id="signin_form">
  <input type="hidden" name="signin" value="1" />
  <input type="hidden" name="redir" value="" />
  <input type="hidden" name="crumb" value="login-crumb" />
  <input type="email" name="email" />
  <input type="password" name="password" />
</form>
<script>var boot = {"team_id": "T0TEST1"};</script>
</body></html>"#;

pub const UPLOAD_PAGE: &str = r#"<html><body>
<form id="addemoji" action="/customize/emoji" method="post" enctype="multipart/form-data">
  <input type="hidden" name="add" value="1" />
  <input type="hidden" name="crumb" value="upload-crumb" />
  <input type="text" name="name" />
</form>
</body></html>"#;

/// Settings pointing the web API at the mock server.
pub fn settings_for(server: &MockServer) -> SessionSettings {
    SessionSettings {
        api_base_url: format!("{}/api", server.uri()),
        ..SessionSettings::default()
    }
}

pub fn workspace_root(server: &MockServer) -> String {
    format!("{}/", server.uri())
}

pub fn credentials_workspace(server: &MockServer, token: Option<&str>) -> Workspace {
    Workspace::new(
        Url::parse(&workspace_root(server)).expect("mock server url"),
        WorkspaceAccess::Credentials {
            credentials: Credentials::new(EMAIL, PASSWORD),
            token: token.map(str::to_string),
        },
    )
}

pub fn token_workspace(server: &MockServer, token: &str) -> Workspace {
    Workspace::new(
        Url::parse(&workspace_root(server)).expect("mock server url"),
        WorkspaceAccess::Token(token.to_string()),
    )
}

/// Mounts a login page and a login submission that issues a session cookie.
pub async fn mount_login(server: &MockServer) {
    mount_login_with(server, LOGIN_PAGE, SESSION_COOKIE).await;
}

/// Mounts `page` as the login page and a submission issuing `session_cookie`.
pub async fn mount_login_with(server: &MockServer, page: &str, session_cookie: &str) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_string_contains("email=me%40example.com"))
        .and(body_string_contains("crumb=login-crumb"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", format!("{session_cookie}; Path=/").as_str())
                .set_body_string("<html>welcome</html>"),
        )
        .mount(server)
        .await;
}

/// A localhost URL nothing listens on, or `None` if no port can be reserved.
pub fn closed_local_url() -> Option<String> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").ok()?;
    let address = listener.local_addr().ok()?;
    drop(listener);
    Some(format!("http://{address}/"))
}

/// Mounts an emoji listing answering only for `token`.
pub async fn mount_inventory(server: &MockServer, token: &str, emoji: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/api/emoji.list"))
        .and(body_string_contains(format!("token={token}").as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "emoji": emoji,
            })),
        )
        .mount(server)
        .await;
}
