use axum::extract::FromRef;
use jsonwebtoken::{decode, DecodingKey, Validation};
use tracing::debug;

use super::claims::Claims;
use crate::state::AppState;

/// Verification half of the identity provider's HS256 keys.
#[derive(Clone)]
pub struct JwtKeys {
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    #[cfg(test)]
    pub encoding: jsonwebtoken::EncodingKey,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let cfg = &state.config.jwt;
        Self {
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            #[cfg(test)]
            encoding: jsonwebtoken::EncodingKey::from_secret(cfg.secret.as_bytes()),
        }
    }
}

impl JwtKeys {
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
impl JwtKeys {
    /// Mint a token the way the identity provider does.
    pub fn sign(
        &self,
        user_id: uuid::Uuid,
        kind: super::claims::TokenKind,
        ttl: time::Duration,
    ) -> String {
        let claims = Claims::new(
            user_id,
            kind,
            time::OffsetDateTime::now_utc(),
            ttl,
            &self.issuer,
            &self.audience,
        );
        jsonwebtoken::encode(&jsonwebtoken::Header::default(), &claims, &self.encoding)
            .expect("sign test token")
    }

    pub fn sign_access(&self, user_id: uuid::Uuid) -> String {
        self.sign(user_id, super::claims::TokenKind::Access, time::Duration::minutes(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::TokenKind;
    use crate::config::JwtConfig;
    use std::sync::Arc;
    use uuid::Uuid;

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        let mut config = crate::state::test_config();
        config.jwt = JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
        };
        let mut state = AppState::fake();
        state.config = Arc::new(config);
        JwtKeys::from_ref(&state)
    }

    #[test]
    fn sign_and_verify_access_token() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud");
        let user_id = Uuid::new_v4();
        let token = keys.sign_access(user_id);
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let good_keys = make_keys("same-secret", "good-iss", "good-aud");
        let bad_keys = make_keys("same-secret", "bad-iss", "bad-aud");
        let token = good_keys.sign_access(Uuid::new_v4());
        assert!(bad_keys.verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_other_secret() {
        let keys = make_keys("one", "iss", "aud");
        let other = make_keys("two", "iss", "aud");
        assert!(other.verify(&keys.sign_access(Uuid::new_v4())).is_err());
    }

    #[test]
    fn verify_rejects_expired_token() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let token = keys.sign(Uuid::new_v4(), TokenKind::Access, time::Duration::hours(-1));
        assert!(keys.verify(&token).is_err());
    }
}
