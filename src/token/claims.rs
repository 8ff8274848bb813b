//! Typed identity claims decoded from a verified token payload.
//!
//! # Payload Fields
//!
//! | Field            | Type    | Notes                                        |
//! |------------------|---------|----------------------------------------------|
//! | `sub`            | string  | account number, required                     |
//! | `companyName`    | string  | required                                     |
//! | `userType`       | string  | `HEADQUARTERS` or `PARTNER`, required        |
//! | `headquartersId` | integer | required                                     |
//! | `level`          | integer | partner hierarchy depth                      |
//! | `treePath`       | string  | slash-delimited hierarchy path               |
//! | `partnerId`      | integer | read in the `partner-id` variant             |
//! | `userId`         | integer | read in the `user-id` variant                |
//!
//! Registered claims such as `exp` and `iat` are handled by the validator and
//! ignored here.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AuthError;

/// Kind of authenticated principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrincipalType {
    Headquarters,
    Partner,
}

impl PrincipalType {
    /// Wire form, as carried in the token and the `X-User-Type` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalType::Headquarters => "HEADQUARTERS",
            PrincipalType::Partner => "PARTNER",
        }
    }
}

impl fmt::Display for PrincipalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrincipalType {
    type Err = String;

    /// Exact, case-sensitive match on the wire form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HEADQUARTERS" => Ok(PrincipalType::Headquarters),
            "PARTNER" => Ok(PrincipalType::Partner),
            other => Err(format!("unknown userType '{other}'")),
        }
    }
}

/// Which secondary numeric identifier a deployment carries in its tokens.
///
/// Selected once per deployment through `IDENTITY_VARIANT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityVariant {
    /// Tokens carry `partnerId` for partner principals.
    #[default]
    PartnerId,
    /// Tokens carry `userId` for any principal.
    UserId,
}

impl IdentityVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityVariant::PartnerId => "partner-id",
            IdentityVariant::UserId => "user-id",
        }
    }
}

impl fmt::Display for IdentityVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentityVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "partner-id" | "partner" => Ok(IdentityVariant::PartnerId),
            "user-id" | "user" => Ok(IdentityVariant::UserId),
            other => Err(format!(
                "unknown identity variant '{other}' (expected 'partner-id' or 'user-id')"
            )),
        }
    }
}

/// Secondary identifier populated from the token, depending on the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkedId {
    None,
    Partner(i64),
    User(i64),
}

/// Payload as it appears on the wire, before invariants are checked.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawClaims {
    sub: Option<String>,
    company_name: Option<String>,
    user_type: Option<String>,
    headquarters_id: Option<i64>,
    partner_id: Option<i64>,
    user_id: Option<i64>,
    level: Option<i32>,
    tree_path: Option<String>,
}

/// Identity claims of an authenticated principal.
///
/// Only produced by decoding a verified token, and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimSet {
    subject: String,
    company_name: String,
    principal_type: PrincipalType,
    headquarters_id: i64,
    linked_id: LinkedId,
    level: Option<i32>,
    tree_path: Option<String>,
}

impl ClaimSet {
    /// Map a verified payload into a claim set.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ClaimDecodeFailure` when a required field is missing
    /// or has the wrong type, when `userType` is unknown, or when a partner
    /// token in the `partner-id` variant has no `partnerId`.
    pub(crate) fn from_payload(
        payload: Map<String, Value>,
        variant: IdentityVariant,
    ) -> Result<Self, AuthError> {
        let raw: RawClaims = serde_json::from_value(Value::Object(payload))
            .map_err(|e| AuthError::ClaimDecodeFailure(e.to_string()))?;

        let subject = raw
            .sub
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| missing("sub"))?;
        let company_name = raw.company_name.ok_or_else(|| missing("companyName"))?;
        let principal_type = raw
            .user_type
            .ok_or_else(|| missing("userType"))?
            .parse::<PrincipalType>()
            .map_err(AuthError::ClaimDecodeFailure)?;
        let headquarters_id = raw
            .headquarters_id
            .ok_or_else(|| missing("headquartersId"))?;

        let linked_id = match (variant, principal_type) {
            (IdentityVariant::PartnerId, PrincipalType::Partner) => {
                LinkedId::Partner(raw.partner_id.ok_or_else(|| missing("partnerId"))?)
            }
            (IdentityVariant::PartnerId, PrincipalType::Headquarters) => LinkedId::None,
            (IdentityVariant::UserId, _) => raw.user_id.map_or(LinkedId::None, LinkedId::User),
        };

        Ok(Self {
            subject,
            company_name,
            principal_type,
            headquarters_id,
            linked_id,
            level: raw.level,
            tree_path: raw.tree_path,
        })
    }

    /// Account identifier; doubles as the outward-facing account number.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn company_name(&self) -> &str {
        &self.company_name
    }

    pub fn principal_type(&self) -> PrincipalType {
        self.principal_type
    }

    pub fn headquarters_id(&self) -> i64 {
        self.headquarters_id
    }

    pub fn linked_id(&self) -> LinkedId {
        self.linked_id
    }

    pub fn partner_id(&self) -> Option<i64> {
        match self.linked_id {
            LinkedId::Partner(id) => Some(id),
            _ => None,
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        match self.linked_id {
            LinkedId::User(id) => Some(id),
            _ => None,
        }
    }

    /// `level` exactly as carried by the token.
    pub fn level(&self) -> Option<i32> {
        self.level
    }

    /// `treePath` exactly as carried by the token.
    pub fn tree_path(&self) -> Option<&str> {
        self.tree_path.as_deref()
    }

    /// Hierarchy depth, with headquarters defaulting to 0.
    ///
    /// `None` only for a partner token that carried no `level`.
    pub fn effective_level(&self) -> Option<i32> {
        match (self.level, self.principal_type) {
            (Some(level), _) => Some(level),
            (None, PrincipalType::Headquarters) => Some(0),
            (None, PrincipalType::Partner) => None,
        }
    }

    /// Hierarchy path, with headquarters defaulting to `/<subject>/`.
    ///
    /// `None` only for a partner token that carried no `treePath`.
    pub fn effective_tree_path(&self) -> Option<Cow<'_, str>> {
        match (&self.tree_path, self.principal_type) {
            (Some(path), _) => Some(Cow::Borrowed(path.as_str())),
            (None, PrincipalType::Headquarters) => Some(Cow::Owned(format!("/{}/", self.subject))),
            (None, PrincipalType::Partner) => None,
        }
    }
}

fn missing(field: &str) -> AuthError {
    AuthError::ClaimDecodeFailure(format!("missing required claim '{field}'"))
}
