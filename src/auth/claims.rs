use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Which of the identity provider's two tokens a payload came from.
///
/// Older issuers wrote the kind capitalised, both spellings are accepted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    #[serde(alias = "Access")]
    Access,
    #[serde(alias = "Refresh")]
    Refresh,
}

/// Verified bearer token payload. Timestamps are unix seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Id of the authenticated user.
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

impl Claims {
    /// Payload for `user_id` valid from `now` for `ttl`.
    pub fn new(
        user_id: Uuid,
        kind: TokenKind,
        now: OffsetDateTime,
        ttl: Duration,
        issuer: &str,
        audience: &str,
    ) -> Self {
        Self {
            sub: user_id,
            iat: now.unix_timestamp(),
            exp: (now + ttl).unix_timestamp(),
            iss: issuer.to_owned(),
            aud: audience.to_owned(),
            kind,
        }
    }

    /// Only access tokens authorize API calls.
    pub fn is_access(&self) -> bool {
        self.kind == TokenKind::Access
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_accepts_both_spellings() {
        let lower: TokenKind = serde_json::from_value(json!("refresh")).unwrap();
        let upper: TokenKind = serde_json::from_value(json!("Refresh")).unwrap();
        assert_eq!(lower, TokenKind::Refresh);
        assert_eq!(upper, TokenKind::Refresh);
        assert_eq!(serde_json::to_value(TokenKind::Access).unwrap(), json!("access"));
    }

    #[test]
    fn new_spans_the_ttl() {
        let now = time::macros::datetime!(2024-03-04 12:00 UTC);
        let claims = Claims::new(
            Uuid::new_v4(),
            TokenKind::Access,
            now,
            Duration::minutes(5),
            "iss",
            "aud",
        );
        assert_eq!(claims.exp - claims.iat, 300);
        assert!(claims.is_access());
    }

    #[test]
    fn refresh_payload_is_not_access() {
        let claims: Claims = serde_json::from_value(json!({
            "sub": Uuid::new_v4(),
            "iat": 0,
            "exp": 60,
            "iss": "iss",
            "aud": "aud",
            "kind": "Refresh"
        }))
        .unwrap();
        assert!(!claims.is_access());
    }
}
