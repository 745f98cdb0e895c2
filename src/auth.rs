use crate::{now, AppState, Error, Result};
use actix_web::http::header::AUTHORIZATION;
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use entity::user;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::{future::Future, pin::Pin};

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("{0}")]
    Invalid(&'static str),
}

#[derive(Serialize, Deserialize, Debug)]
pub struct JwtToken {
    // issued at
    pub iat: i64,
    // expiration
    pub exp: i64,
    // data
    pub user_id: i32,
}

impl JwtToken {
    pub fn from_str(token: &str, secret: &[u8]) -> Result<Self, AuthError> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        Ok(
            jsonwebtoken::decode::<JwtToken>(
                token,
                &DecodingKey::from_secret(secret),
                &validation,
            )?
            .claims,
        )
    }

    pub fn generate(user_id: i32, expiry: usize, secret: &[u8]) -> Result<String, AuthError> {
        let now = now() as i64;
        let payload = JwtToken {
            iat: now,
            exp: now + expiry as i64,
            user_id,
        };

        Ok(jsonwebtoken::encode(
            &Header::default(),
            &payload,
            &EncodingKey::from_secret(secret),
        )?)
    }
}

/// verified donor resolved from a bearer token
#[derive(Debug)]
pub struct AuthedUser {
    pub user: user::Model,
}

impl AuthedUser {
    pub async fn from_token(token: &str, state: &AppState) -> Result<Self, Error> {
        let token = JwtToken::from_str(token, state.setting.auth.secret.as_bytes())?;
        let user = state
            .service
            .get_user_by_id(token.user_id)
            .await?
            .ok_or(Error::from(AuthError::Invalid("unknown user")))?;
        if !user.is_verified {
            return Err(Error::Forbidden(
                "Please verify your email before continuing".to_owned(),
            ));
        }
        Ok(Self { user })
    }
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    let auth = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    if auth.starts_with("bearer") || auth.starts_with("Bearer") {
        Some(auth[6..auth.len()].trim())
    } else {
        None
    }
}

impl FromRequest for AuthedUser {
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<AuthedUser>>>>;

    fn from_request(req: &HttpRequest, _pl: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            if let Some(state) = req.app_data::<web::Data<AppState>>() {
                if let Some(token) = bearer_token(&req) {
                    return AuthedUser::from_token(token, state).await;
                }
            }
            Err(AuthError::Invalid("missing auth token").into())
        })
    }
}

/// operator access, bearer token compared to the configured admin token
#[derive(Debug)]
pub struct AdminAuth;

impl FromRequest for AdminAuth {
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<AdminAuth>>>>;

    fn from_request(req: &HttpRequest, _pl: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            if let Some(state) = req.app_data::<web::Data<AppState>>() {
                if let Some(expected) = &state.setting.auth.admin_token {
                    if let Some(token) = bearer_token(&req) {
                        if token == expected {
                            return Ok(AdminAuth);
                        }
                    }
                }
            }
            Err(Error::Unauthorized)
        })
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::Message(e.to_string()))?
        .to_string())
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}
