//! Trusted identity headers forwarded to backend services.
//!
//! # Naming Convention
//!
//! This gateway uses title-case names (`X-User-Type`, `X-Account-Number`, ...).
//! HTTP header names are case-insensitive, and the `http` crate stores them
//! lowercase, so backends reading `X-USER-TYPE` see the same header.
//!
//! # Mapping
//!
//! | Header              | Source                                                 |
//! |---------------------|--------------------------------------------------------|
//! | `X-User-Type`       | `userType`                                             |
//! | `X-Company-Name`    | `companyName`                                          |
//! | `X-Account-Number`  | `sub`                                                  |
//! | `X-Headquarters-Id` | `headquartersId`                                       |
//! | `X-Level`           | `level`, else `0` (headquarters) or empty (partner)    |
//! | `X-Tree-Path`       | `treePath`, else `/<sub>/` (headquarters) or empty     |
//! | `X-Partner-Id`      | `partnerId`, partner principals in `partner-id` mode   |
//! | `X-User-Id`         | `userId`, when present in `user-id` mode               |

use axum::http::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

use crate::error::AuthError;
use crate::token::{ClaimSet, LinkedId, PrincipalType};

pub const USER_TYPE: HeaderName = HeaderName::from_static("x-user-type");
pub const COMPANY_NAME: HeaderName = HeaderName::from_static("x-company-name");
pub const ACCOUNT_NUMBER: HeaderName = HeaderName::from_static("x-account-number");
pub const HEADQUARTERS_ID: HeaderName = HeaderName::from_static("x-headquarters-id");
pub const LEVEL: HeaderName = HeaderName::from_static("x-level");
pub const TREE_PATH: HeaderName = HeaderName::from_static("x-tree-path");
pub const PARTNER_ID: HeaderName = HeaderName::from_static("x-partner-id");
pub const USER_ID: HeaderName = HeaderName::from_static("x-user-id");

/// Every header the gateway owns. Stripped from every authenticated request,
/// whichever identity variant is active.
pub const IDENTITY_HEADERS: [HeaderName; 8] = [
    USER_TYPE,
    COMPANY_NAME,
    ACCOUNT_NUMBER,
    HEADQUARTERS_ID,
    LEVEL,
    TREE_PATH,
    PARTNER_ID,
    USER_ID,
];

/// Remove all values of every identity header.
pub fn strip_identity_headers(headers: &mut HeaderMap) {
    for name in &IDENTITY_HEADERS {
        headers.remove(name);
    }
}

/// Identity headers derived from one claim set.
///
/// Fully encoded up front, so a claim that cannot be carried in a header fails
/// before the request is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityHeaders {
    entries: Vec<(HeaderName, HeaderValue)>,
}

impl IdentityHeaders {
    /// Encode the headers for `claims`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::HeaderEncoding` when a claim contains characters
    /// that are not valid in a header value (e.g. control characters).
    pub fn from_claims(claims: &ClaimSet) -> Result<Self, AuthError> {
        let principal = claims.principal_type();

        let level = match claims.effective_level() {
            Some(level) => level.to_string(),
            None => {
                warn!(
                    account_number = claims.subject(),
                    "Partner token has no level claim, forwarding empty X-Level"
                );
                String::new()
            }
        };

        let tree_path = match claims.effective_tree_path() {
            Some(path) => path.into_owned(),
            None => {
                warn!(
                    account_number = claims.subject(),
                    "Partner token has no treePath claim, forwarding empty X-Tree-Path"
                );
                String::new()
            }
        };

        let mut entries = Vec::with_capacity(IDENTITY_HEADERS.len());
        push(&mut entries, USER_TYPE, principal.as_str())?;
        push(&mut entries, COMPANY_NAME, claims.company_name())?;
        push(&mut entries, ACCOUNT_NUMBER, claims.subject())?;
        push(
            &mut entries,
            HEADQUARTERS_ID,
            &claims.headquarters_id().to_string(),
        )?;
        push(&mut entries, LEVEL, &level)?;
        push(&mut entries, TREE_PATH, &tree_path)?;

        match (claims.linked_id(), principal) {
            (LinkedId::Partner(id), PrincipalType::Partner) => {
                push(&mut entries, PARTNER_ID, &id.to_string())?;
            }
            (LinkedId::User(id), _) => {
                push(&mut entries, USER_ID, &id.to_string())?;
            }
            _ => {}
        }

        Ok(Self { entries })
    }

    /// Strip every identity header from `headers`, then set these.
    pub fn apply(self, headers: &mut HeaderMap) {
        strip_identity_headers(headers);
        for (name, value) in self.entries {
            headers.insert(name, value);
        }
    }

    pub fn get(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn push(
    entries: &mut Vec<(HeaderName, HeaderValue)>,
    name: HeaderName,
    value: &str,
) -> Result<(), AuthError> {
    let value = HeaderValue::from_str(value).map_err(|e| AuthError::HeaderEncoding {
        header: name.to_string(),
        reason: e.to_string(),
    })?;
    entries.push((name, value));
    Ok(())
}
