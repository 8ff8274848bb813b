//! Signature and expiry verification for cookie session tokens.
//!
//! Tokens are compact JWS strings (`header.payload.signature`) signed with an
//! HMAC-SHA2 algorithm (HS256, HS384 or HS512) using the shared secret. Any
//! other algorithm, including `none`, is refused.

use std::fmt;

use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde_json::{Map, Value};
use tracing::debug;

use super::claims::{ClaimSet, IdentityVariant};
use super::secret::SecretKey;
use crate::error::AuthError;

/// HMAC algorithms a token may be signed with.
pub const ACCEPTED_ALGORITHMS: [Algorithm; 3] =
    [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Verifies tokens and decodes their claims.
///
/// Holds no mutable state: the decoding key and validation rules are fixed at
/// construction, so a single instance is shared across all requests.
#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
    variant: IdentityVariant,
}

impl TokenValidator {
    /// Build a validator for `secret`, decoding claims per `variant`.
    ///
    /// `leeway_secs` is the clock skew tolerated on `exp`. Tokens without an
    /// `exp` claim are accepted.
    pub fn new(secret: &SecretKey, variant: IdentityVariant, leeway_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
        validation.leeway = leeway_secs;
        validation.validate_exp = true;
        validation.set_required_spec_claims::<&str>(&[]);

        Self {
            key: secret.decoding_key(),
            validation,
            variant,
        }
    }

    pub fn variant(&self) -> IdentityVariant {
        self.variant
    }

    /// True iff the token is well-formed, correctly signed and not expired.
    ///
    /// The failure category is logged at debug level and otherwise dropped.
    pub fn validate(&self, token: &str) -> bool {
        match self.parse(token) {
            Ok(_) => true,
            Err(e) => {
                debug!(category = e.category(), reason = %e, "Token validation failed");
                false
            }
        }
    }

    /// Re-parse a token and map its payload into a [`ClaimSet`].
    ///
    /// Meant to be called after [`validate`](Self::validate) returned true, but
    /// safe on any input: an invalid token yields an error, not a claim set.
    ///
    /// # Errors
    ///
    /// Returns the `AuthError` category of the first check that failed.
    pub fn decode(&self, token: &str) -> Result<ClaimSet, AuthError> {
        let payload = self.parse(token)?;
        ClaimSet::from_payload(payload, self.variant)
    }

    /// Validate and decode in a single parse.
    ///
    /// # Errors
    ///
    /// Same as [`decode`](Self::decode), plus `MissingToken` for a blank token.
    pub fn verify(&self, token: &str) -> Result<ClaimSet, AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::MissingToken);
        }
        self.decode(token)
    }

    fn parse(&self, token: &str) -> Result<Map<String, Value>, AuthError> {
        decode::<Map<String, Value>>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(classify)
    }
}

impl fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenValidator")
            .field("algorithms", &self.validation.algorithms)
            .field("leeway", &self.validation.leeway)
            .field("variant", &self.variant)
            .finish_non_exhaustive()
    }
}

/// Collapse library errors into the gateway's categories.
fn classify(err: JwtError) -> AuthError {
    let reason = err.to_string();
    match err.kind() {
        ErrorKind::InvalidSignature => AuthError::BadSignature(reason),
        ErrorKind::ExpiredSignature => AuthError::ExpiredToken(reason),
        ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::MissingAlgorithm
        | ErrorKind::InvalidKeyFormat => AuthError::UnsupportedTokenFormat(reason),
        _ => AuthError::MalformedToken(reason),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::token::PrincipalType;
    use crate::token::test_support::{OTHER_SECRET, TEST_SECRET, mint, mint_with, unsigned};
    use chrono::Utc;
    use jsonwebtoken::Header;
    use serde_json::json;

    fn validator(variant: IdentityVariant) -> TokenValidator {
        TokenValidator::new(&SecretKey::new(TEST_SECRET).unwrap(), variant, 0)
    }

    fn headquarters_claims() -> Value {
        json!({
            "sub": "2412161700",
            "companyName": "Acme HQ",
            "userType": "HEADQUARTERS",
            "headquartersId": 77,
            "exp": Utc::now().timestamp() + 3600
        })
    }

    #[test]
    fn test_valid_token_round_trips() {
        let validator = validator(IdentityVariant::PartnerId);
        let token = mint(TEST_SECRET, &headquarters_claims());

        assert!(validator.validate(&token));
        let claims = validator.decode(&token).unwrap();
        assert_eq!(claims.subject(), "2412161700");
        assert_eq!(claims.company_name(), "Acme HQ");
        assert_eq!(claims.principal_type(), PrincipalType::Headquarters);
        assert_eq!(claims.headquarters_id(), 77);
    }

    #[test]
    fn test_partner_token_round_trips() {
        let validator = validator(IdentityVariant::PartnerId);
        let token = mint(
            TEST_SECRET,
            &json!({
                "sub": "2412161700-L1-001",
                "companyName": "Supplier One",
                "userType": "PARTNER",
                "headquartersId": 77,
                "partnerId": 55,
                "level": 2,
                "treePath": "/1/L1-001/",
                "exp": Utc::now().timestamp() + 3600
            }),
        );

        let claims = validator.verify(&token).unwrap();
        assert_eq!(claims.partner_id(), Some(55));
        assert_eq!(claims.level(), Some(2));
        assert_eq!(claims.tree_path(), Some("/1/L1-001/"));
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let validator = validator(IdentityVariant::PartnerId);
        let token = mint(OTHER_SECRET, &headquarters_claims());

        assert!(!validator.validate(&token));
        assert_eq!(
            validator.decode(&token).unwrap_err().category(),
            "bad_signature"
        );
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let validator = validator(IdentityVariant::PartnerId);
        let mut claims = headquarters_claims();
        claims["exp"] = json!(Utc::now().timestamp() - 60);
        let token = mint(TEST_SECRET, &claims);

        assert!(!validator.validate(&token));
        assert_eq!(
            validator.decode(&token).unwrap_err().category(),
            "expired_token"
        );
    }

    #[test]
    fn test_leeway_tolerates_recent_expiry() {
        let validator = TokenValidator::new(
            &SecretKey::new(TEST_SECRET).unwrap(),
            IdentityVariant::PartnerId,
            300,
        );
        let mut claims = headquarters_claims();
        claims["exp"] = json!(Utc::now().timestamp() - 60);
        let token = mint(TEST_SECRET, &claims);

        assert!(validator.validate(&token));
    }

    #[test]
    fn test_token_without_exp_is_accepted() {
        let validator = validator(IdentityVariant::PartnerId);
        let mut claims = headquarters_claims();
        claims.as_object_mut().unwrap().remove("exp");
        let token = mint(TEST_SECRET, &claims);

        assert!(validator.validate(&token));
    }

    #[test]
    fn test_hs512_token_is_accepted() {
        let validator = validator(IdentityVariant::PartnerId);
        let token = mint_with(
            Header::new(Algorithm::HS512),
            TEST_SECRET,
            &headquarters_claims(),
        );

        assert!(validator.validate(&token));
    }

    #[test]
    fn test_non_hmac_algorithm_is_unsupported() {
        let validator = validator(IdentityVariant::PartnerId);
        let token = unsigned(r#"{"alg":"RS256","typ":"JWT"}"#, &headquarters_claims());

        assert!(!validator.validate(&token));
        assert_eq!(
            validator.decode(&token).unwrap_err().category(),
            "unsupported_token_format"
        );
    }

    #[test]
    fn test_alg_none_is_rejected() {
        let validator = validator(IdentityVariant::PartnerId);
        let token = unsigned(r#"{"alg":"none","typ":"JWT"}"#, &headquarters_claims());

        assert!(!validator.validate(&token));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let validator = validator(IdentityVariant::PartnerId);

        for token in ["not-a-token", "a.b.c", "..", "eyJhbGciOiJIUzI1NiJ9.%%%.sig"] {
            assert!(!validator.validate(token), "accepted {token}");
            assert!(validator.decode(token).is_err());
        }
    }

    #[test]
    fn test_verify_blank_token_is_missing() {
        let validator = validator(IdentityVariant::PartnerId);
        assert_eq!(validator.verify("   ").unwrap_err(), AuthError::MissingToken);
    }

    #[test]
    fn test_valid_signature_with_bad_claims_validates_but_fails_decode() {
        let validator = validator(IdentityVariant::PartnerId);
        let token = mint(
            TEST_SECRET,
            &json!({ "sub": "1", "userType": "HEADQUARTERS" }),
        );

        assert!(validator.validate(&token));
        assert_eq!(
            validator.decode(&token).unwrap_err().category(),
            "claim_decode_failure"
        );
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let validator = validator(IdentityVariant::UserId);
        let debug = format!("{validator:?}");
        assert!(!debug.contains(TEST_SECRET));
        assert!(debug.contains("UserId"));
    }
}
