//! JWT Token 生成和验证模块
//!
//! `sub` 承载调用方邮箱，交易历史按它过滤。

use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT Claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (email)
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

impl Claims {
    pub fn new(email: &str, expires_in_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: email.to_string(),
            exp: (now + Duration::seconds(expires_in_secs)).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    pub fn email(&self) -> &str {
        &self.sub
    }
}

/// 生成JWT Token
pub fn generate_token(email: &str, secret: &str, expires_in_secs: i64) -> Result<String> {
    let claims = Claims::new(email, expires_in_secs);

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| anyhow!("Failed to encode token: {}", e))
}

/// 验证JWT Token
pub fn verify_token(token: &str, secret: &str) -> Result<Claims> {
    tracing::debug!("JWT: starting verification, token_len={}", token.len());

    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.leeway = 10; // 允许10秒时钟偏差

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::warn!("JWT: token verification failed: {}", e);
        anyhow!("Token verification failed: {}", e)
    })?;

    let claims = token_data.claims;
    if !claims.sub.contains('@') {
        return Err(anyhow!("Invalid email in token subject"));
    }

    Ok(claims)
}
