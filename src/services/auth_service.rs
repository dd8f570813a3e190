use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::{OsRng, RngCore};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, Set,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    dto::auth::{
        Claims, ForgotPasswordRequest, LoginRequest, LoginResponse, RegisterRequest,
        ResetPasswordRequest,
    },
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, UserRole},
    error::{AppError, AppResult},
    models::User,
    response::{ApiResponse, Meta},
    state::AppState,
};

const RESET_TOKEN_TTL_MINUTES: i64 = 15;

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    payload.validate()?;
    let RegisterRequest {
        name,
        email,
        password,
    } = payload;
    let name = name.trim().to_string();
    let email = email.trim().to_lowercase();

    let exist = Users::find()
        .filter(
            Condition::any()
                .add(UserCol::Email.eq(email.as_str()))
                .add(UserCol::Name.eq(name.as_str())),
        )
        .one(&state.orm)
        .await?;
    if let Some(existing) = exist {
        let field = if existing.email == email { "Email" } else { "Name" };
        return Err(AppError::Conflict(format!("{field} is already taken")));
    }

    let password_hash = hash_password(&password)?;

    let user = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        email: Set(email),
        password_hash: Set(Some(password_hash)),
        google_id: Set(None),
        role: Set(UserRole::Customer),
        address: Set(None),
        reset_password_token: Set(None),
        reset_password_expires: Set(None),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.orm,
        Some(user.id),
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success("User created", User::from(user), None))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest { email, password } = payload;
    let user = Users::find()
        .filter(UserCol::Email.eq(email.trim().to_lowercase()))
        .one(&state.orm)
        .await?;

    let user = match user {
        Some(u) => u,
        None => return Err(AppError::BadRequest("Invalid email or password".into())),
    };

    // Accounts created through an external identity provider have no local password.
    let Some(stored_hash) = user.password_hash.as_deref() else {
        return Err(AppError::BadRequest("Invalid email or password".into()));
    };
    let parsed_hash = PasswordHash::new(stored_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;

    let argon2 = Argon2::default();
    if argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(AppError::BadRequest("Invalid email or password".into()));
    }

    let token = issue_token(user.id, &user.role, &state.config.jwt_secret)?;

    audit::record(
        &state.orm,
        Some(user.id),
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    let resp = LoginResponse {
        token: format!("Bearer {}", token),
        user: User::from(user),
    };

    Ok(ApiResponse::success(
        "Logged in",
        resp,
        Some(Meta::empty()),
    ))
}

/// Always answers the same way so the endpoint cannot be used to probe for accounts.
pub async fn forgot_password(
    state: &AppState,
    payload: ForgotPasswordRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    payload.validate()?;
    let email = payload.email.trim().to_lowercase();

    if let Some(user) = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?
    {
        let token = generate_reset_token();
        let expires = Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES);

        let mut active: UserActive = user.into();
        active.reset_password_token = Set(Some(hash_reset_token(&token)));
        active.reset_password_expires = Set(Some(expires.into()));
        active.update(&state.orm).await?;

        let reset_url = format!(
            "{}/reset-password/{}",
            state.config.frontend_url.trim_end_matches('/'),
            token
        );
        if let Err(err) = state.notifier.send_password_reset(&email, &reset_url).await {
            tracing::warn!(error = %err, "password reset email failed");
        }
    }

    Ok(ApiResponse::success(
        "If the email is registered, a reset link has been sent",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn reset_password(
    state: &AppState,
    payload: ResetPasswordRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    payload.validate()?;

    let user = Users::find()
        .filter(UserCol::ResetPasswordToken.eq(hash_reset_token(payload.token.trim())))
        .one(&state.orm)
        .await?
        .filter(|u| {
            u.reset_password_expires
                .is_some_and(|expires| expires.with_timezone(&Utc) > Utc::now())
        })
        .ok_or_else(|| AppError::BadRequest("Reset token is invalid or has expired".into()))?;

    let user_id = user.id;
    let mut active: UserActive = user.into();
    active.password_hash = Set(Some(hash_password(&payload.password)?));
    active.reset_password_token = Set(None);
    active.reset_password_expires = Set(None);
    active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user_id),
        "password_reset",
        "users",
        serde_json::json!({ "user_id": user_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Password updated",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub fn issue_token(user_id: Uuid, role: &UserRole, secret: &str) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(24))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user_id.to_string(),
        role: role.as_str().to_string(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::decode_token;

    #[test]
    fn issued_token_decodes_to_same_identity() {
        let id = Uuid::new_v4();
        let token = issue_token(id, &UserRole::Admin, "unit-secret").unwrap();
        let user = decode_token(&token, "unit-secret").unwrap();
        assert_eq!(user.user_id, id);
        assert!(user.is_admin());
        assert!(decode_token(&token, "wrong-secret").is_err());
    }

    #[test]
    fn reset_tokens_are_random_and_hashed() {
        let a = generate_reset_token();
        let b = generate_reset_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(hash_reset_token(&a), a);
        assert_eq!(hash_reset_token(&a), hash_reset_token(&a));
    }
}
