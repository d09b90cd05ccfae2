use std::time::Duration;

use press_engine::{
    fetch_page, Credentials, FailureKind, FetchSettings, LoginForm, ReqwestSession, ResourceKind,
    Session,
};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session(server: &MockServer, settings: FetchSettings) -> ReqwestSession {
    let login = LoginForm {
        url: format!("{}/user/login", server.uri()),
        form_selector: "form#user-login".to_string(),
        email_field: "name".to_string(),
        password_field: "pass".to_string(),
    };
    ReqwestSession::new(settings, login)
}

fn credentials() -> Credentials {
    Credentials {
        email: "reader@example.com".to_string(),
        password: "s3cret".to_string(),
    }
}

const LOGIN_PAGE: &str = r#"<html><body>
<form id="user-login" action="/user/login" method="post">
  <input type="text" name="name" value="">
  <input type="password" name="pass">
  <input type="hidden" name="form_build_id" value="form-abc">
  <input type="submit" name="op" value="Log in">
</form></body></html>"#;

#[tokio::test]
async fn page_fetch_returns_decoded_markup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/printedition"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html>caf\u{e9}</html>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let session = session(&server, FetchSettings::default());
    let url = format!("{}/printedition", server.uri());

    let output = session.fetch(&url, ResourceKind::Page).await.expect("fetch ok");
    assert_eq!(output.metadata.original_url, url);
    assert_eq!(output.metadata.final_url, url);
    assert_eq!(output.metadata.redirect_count, 0);

    let page = fetch_page(&session, &url).await.expect("page ok");
    assert_eq!(page.html, "<html>caf\u{e9}</html>");
    assert_eq!(page.url.path(), "/printedition");
}

#[tokio::test]
async fn redirected_page_reports_its_final_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/printedition"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "/printedition/2013-01-05"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/printedition/2013-01-05"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .mount(&server)
        .await;

    let session = session(&server, FetchSettings::default());
    let page = fetch_page(&session, &format!("{}/printedition", server.uri()))
        .await
        .expect("page ok");
    assert_eq!(page.url.path(), "/printedition/2013-01-05");
}

#[tokio::test]
async fn http_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let session = session(&server, FetchSettings::default());
    let err = session
        .fetch(&format!("{}/missing", server.uri()), ResourceKind::Page)
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));
}

#[tokio::test]
async fn image_fetch_rejects_html() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .mount(&server)
        .await;

    let session = session(&server, FetchSettings::default());
    let err = session
        .fetch(&format!("{}/a.jpg", server.uri()), ResourceKind::Image)
        .await
        .unwrap_err();
    assert!(matches!(err.kind, FailureKind::UnsupportedContentType { .. }));
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_string("slow"),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        request_timeout: Duration::from_millis(50),
        ..FetchSettings::default()
    };
    let session = session(&server, settings);
    let err = session
        .fetch(&format!("{}/slow", server.uri()), ResourceKind::Page)
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn oversized_response_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/large"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html")
                .set_body_string("01234567890"),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        max_bytes: 10,
        ..FetchSettings::default()
    };
    let session = session(&server, settings);
    let err = session
        .fetch(&format!("{}/large", server.uri()), ResourceKind::Page)
        .await
        .unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::TooLarge {
            max_bytes: 10,
            actual: Some(11)
        }
    );
}

#[tokio::test]
async fn login_posts_the_form_and_keeps_the_session_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/login"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(LOGIN_PAGE, "text/html"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/user/login"))
        .and(body_string_contains("name=reader%40example.com"))
        .and(body_string_contains("pass=s3cret"))
        .and(body_string_contains("form_build_id=form-abc"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "SESS=abc123; Path=/")
                .set_body_raw("<p>Logged in as reader@example.com</p>", "text/html"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/members"))
        .and(header("cookie", "SESS=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>members</p>", "text/html"))
        .mount(&server)
        .await;

    let session = session(&server, FetchSettings::default());
    assert!(session.login(&credentials()).await.expect("login ok"));

    let page = fetch_page(&session, &format!("{}/members", server.uri()))
        .await
        .expect("cookie sent");
    assert_eq!(page.html, "<p>members</p>");
}

#[tokio::test]
async fn rejected_login_is_false_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/login"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(LOGIN_PAGE, "text/html"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/user/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<p>Sorry, unrecognized username</p>", "text/html"),
        )
        .mount(&server)
        .await;

    let session = session(&server, FetchSettings::default());
    assert!(!session.login(&credentials()).await.expect("login round trip"));
}

#[tokio::test]
async fn missing_login_form_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/login"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>maintenance</p>", "text/html"))
        .mount(&server)
        .await;

    let session = session(&server, FetchSettings::default());
    let err = session.login(&credentials()).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::LoginForm);
}
