mod common;

use axum_storefront_api::{
    dto::auth::{ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest},
    error::AppError,
    middleware::auth::decode_token,
    services::auth_service,
};
use common::setup;

fn register(name: &str, email: &str) -> RegisterRequest {
    RegisterRequest {
        name: name.into(),
        email: email.into(),
        password: "correct horse".into(),
    }
}

#[tokio::test]
async fn register_then_login_issues_bearer_token() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;

    let user = auth_service::register_user(state, register("dana", "Dana@Example.com"))
        .await?
        .data
        .unwrap();
    assert_eq!(user.email, "dana@example.com");

    let err = auth_service::register_user(state, register("dana", "other@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let login = auth_service::login_user(
        state,
        LoginRequest {
            email: "dana@example.com".into(),
            password: "correct horse".into(),
        },
    )
    .await?
    .data
    .unwrap();
    let token = login.token.strip_prefix("Bearer ").unwrap();
    let claims = decode_token(token, &state.config.jwt_secret)?;
    assert_eq!(claims.user_id, user.id);
    assert!(!claims.is_admin());

    let err = auth_service::login_user(
        state,
        LoginRequest {
            email: "dana@example.com".into(),
            password: "wrong password".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    Ok(())
}

#[tokio::test]
async fn password_reset_round_trip() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    auth_service::register_user(state, register("eli", "eli@example.com")).await?;

    // Unknown addresses get the same answer and no mail.
    auth_service::forgot_password(
        state,
        ForgotPasswordRequest {
            email: "nobody@example.com".into(),
        },
    )
    .await?;
    assert!(app.notifier.resets.lock().unwrap().is_empty());

    auth_service::forgot_password(
        state,
        ForgotPasswordRequest {
            email: "eli@example.com".into(),
        },
    )
    .await?;
    let (email, url) = app.notifier.resets.lock().unwrap()[0].clone();
    assert_eq!(email, "eli@example.com");
    let token = url
        .strip_prefix("http://localhost:5173/reset-password/")
        .unwrap()
        .to_string();

    auth_service::reset_password(
        state,
        ResetPasswordRequest {
            token: token.clone(),
            password: "brand new secret".into(),
        },
    )
    .await?;

    auth_service::login_user(
        state,
        LoginRequest {
            email: "eli@example.com".into(),
            password: "brand new secret".into(),
        },
    )
    .await?;

    // Tokens are single use.
    let err = auth_service::reset_password(
        state,
        ResetPasswordRequest {
            token,
            password: "another secret".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    Ok(())
}
