mod common;

use std::time::Duration;

use antel_browser::Frame;
use antel_consumo_lib::{Authenticator, ErrorKind, LoginState};
use common::{credentials, settings, PasswordPlacement, Portal, Script, PASSWORD, USERNAME};

#[tokio::test(start_paused = true)]
async fn password_in_delayed_frame_is_found() {
    let portal = Portal::new(Script {
        password: PasswordPlacement::DelayedFrame(Duration::from_secs(4)),
        ..Script::default()
    });
    let page = portal.page();
    let settings = settings();
    let creds = credentials();

    let mut auth = Authenticator::new(&page, &creds, &settings.urls, &settings.timeouts);
    auth.run().await.unwrap();

    assert_eq!(auth.state(), LoginState::LoginConfirmed);
    let log = portal.log();
    assert_eq!(
        log.fills,
        vec![
            (Frame::Main, USERNAME.to_string()),
            (Frame::Child(0), PASSWORD.to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn password_in_main_document() {
    let portal = Portal::new(Script::default());
    let page = portal.page();
    let settings = settings();
    let creds = credentials();

    let mut auth = Authenticator::new(&page, &creds, &settings.urls, &settings.timeouts);
    auth.run().await.unwrap();

    assert_eq!(auth.state(), LoginState::LoginConfirmed);
    assert_eq!(portal.log().fills[1].0, Frame::Main);
}

#[tokio::test(start_paused = true)]
async fn missing_password_field_fails_authentication_after_budget() {
    let portal = Portal::new(Script {
        password: PasswordPlacement::Never,
        ..Script::default()
    });
    let page = portal.page();
    let settings = settings();
    let creds = credentials();

    let started = tokio::time::Instant::now();
    let mut auth = Authenticator::new(&page, &creds, &settings.urls, &settings.timeouts);
    let err = auth.run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
    assert_eq!(
        auth.state(),
        LoginState::Failed(ErrorKind::AuthenticationFailed)
    );
    assert!(started.elapsed() >= settings.timeouts.password_field);
    assert_eq!(portal.log().fills.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn password_slower_than_budget_fails() {
    let portal = Portal::new(Script {
        password: PasswordPlacement::DelayedFrame(Duration::from_secs(120)),
        ..Script::default()
    });
    let page = portal.page();
    let settings = settings();
    let creds = credentials();

    let mut auth = Authenticator::new(&page, &creds, &settings.urls, &settings.timeouts);
    let err = auth.run().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
}

#[tokio::test(start_paused = true)]
async fn login_error_banner_rejects() {
    let portal = Portal::new(Script {
        login_error: Some("Usuario o contraseña incorrectos".to_string()),
        ..Script::default()
    });
    let page = portal.page();
    let settings = settings();
    let creds = credentials();

    let mut auth = Authenticator::new(&page, &creds, &settings.urls, &settings.timeouts);
    let err = auth.run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
    assert!(err.to_string().contains("incorrectos"));
}

#[tokio::test(start_paused = true)]
async fn login_page_timeout_is_connection_timeout() {
    let portal = Portal::new(Script {
        login_timeouts: 1,
        ..Script::default()
    });
    let page = portal.page();
    let settings = settings();
    let creds = credentials();

    let mut auth = Authenticator::new(&page, &creds, &settings.urls, &settings.timeouts);
    let err = auth.run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConnectionTimeout);
    assert_eq!(
        auth.state(),
        LoginState::Failed(ErrorKind::ConnectionTimeout)
    );
}
