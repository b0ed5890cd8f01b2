// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer-token authentication for the gateway.
//!
//! Tokens are HMAC-SHA256 signed JSON claims (`user_id`, `role`, `exp`),
//! encoded as `base64url(claims).base64url(signature)`. When no signing
//! secret is configured, all authenticated routes reject (fail-closed).

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use wagate_core::GateError;
use wagate_core::types::{Identity, Role};

type HmacSha256 = Hmac<Sha256>;

/// Signed token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub role: Role,
    /// Unix seconds.
    pub exp: i64,
}

/// Issues and verifies bearer tokens.
#[derive(Clone)]
pub struct TokenService {
    secret: Option<String>,
    ttl_secs: u64,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("secret", &self.secret.as_ref().map(|_| "[redacted]"))
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

impl TokenService {
    pub fn new(secret: Option<String>, ttl_secs: u64) -> Self {
        Self { secret, ttl_secs }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    /// Sign a token for `user_id` with the configured TTL. Returns the token
    /// and its expiry (unix seconds).
    pub fn issue(&self, user_id: &str, role: Role) -> Result<(String, i64), GateError> {
        let secret = self
            .secret
            .as_ref()
            .ok_or_else(|| GateError::Internal("token secret not configured".into()))?;
        let exp = chrono::Utc::now().timestamp() + self.ttl_secs as i64;
        let claims = Claims {
            user_id: user_id.to_string(),
            role,
            exp,
        };
        let payload = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&claims)
                .map_err(|e| GateError::Internal(format!("claims serialization: {e}")))?,
        );
        let signature = URL_SAFE_NO_PAD.encode(sign(secret, &payload)?);
        Ok((format!("{payload}.{signature}"), exp))
    }

    /// Verify a token's signature and expiry, returning the caller identity.
    pub fn verify(&self, token: &str) -> Result<Identity, GateError> {
        let secret = self.secret.as_ref().ok_or(GateError::Forbidden)?;
        let (payload, signature) = token.split_once('.').ok_or(GateError::Forbidden)?;

        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| GateError::Forbidden)?;
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| GateError::Forbidden)?;
        mac.verify_slice(&signature).map_err(|_| GateError::Forbidden)?;

        let claims: Claims = serde_json::from_slice(
            &URL_SAFE_NO_PAD
                .decode(payload)
                .map_err(|_| GateError::Forbidden)?,
        )
        .map_err(|_| GateError::Forbidden)?;

        if claims.exp <= chrono::Utc::now().timestamp() {
            return Err(GateError::Forbidden);
        }
        Ok(Identity::new(claims.user_id, claims.role))
    }
}

/// Verifies logins against a single configured admin credential pair.
///
/// Successful logins carry the admin role. With no credentials configured
/// every login is rejected (fail-closed).
pub struct StaticCredentialVerifier {
    credentials: Option<(String, String)>,
}

impl std::fmt::Debug for StaticCredentialVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentialVerifier")
            .field(
                "credentials",
                &self.credentials.as_ref().map(|(u, _)| (u, "[redacted]")),
            )
            .finish()
    }
}

impl StaticCredentialVerifier {
    pub fn new(username: Option<String>, password: Option<String>) -> Self {
        Self {
            credentials: username.zip(password),
        }
    }
}

#[async_trait::async_trait]
impl wagate_core::traits::CredentialVerifier for StaticCredentialVerifier {
    async fn verify(&self, username: &str, password: &str) -> Result<Identity, GateError> {
        let Some((expected_user, expected_pass)) = &self.credentials else {
            tracing::warn!("login attempted but no admin credentials are configured");
            return Err(GateError::Forbidden);
        };
        // Digest comparison keeps the check constant-time in the password
        // length.
        let ok = username == expected_user
            && Sha256::digest(password.as_bytes()) == Sha256::digest(expected_pass.as_bytes());
        if ok {
            Ok(Identity::new(expected_user.clone(), Role::Admin))
        } else {
            Err(GateError::Forbidden)
        }
    }
}

fn sign(secret: &str, payload: &str) -> Result<Vec<u8>, GateError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| GateError::Internal(format!("hmac key: {e}")))?;
    mac.update(payload.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Middleware validating the `Authorization: Bearer` header.
///
/// A verified identity lands in request extensions for handlers to extract.
/// With no secret configured every request is rejected (fail-closed).
pub async fn auth_middleware(
    State(tokens): State<TokenService>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if !tokens.is_configured() {
        tracing::error!("gateway has no token secret configured -- rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let bearer = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match bearer.map(|token| tokens.verify(token)) {
        Some(Ok(identity)) => {
            request.extensions_mut().insert(identity);
            Ok(next.run(request).await)
        }
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}
