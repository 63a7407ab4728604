//! OAuth2 protocol and HTTP surface types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Query of `GET /login?from=&aud=&session=&noava=`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginQuery {
    pub from: Option<String>,
    pub aud: Option<String>,
    /// Legacy name of `aud`, preferred when present.
    pub site: Option<String>,
    pub session: Option<String>,
    pub noava: Option<String>,
}

impl LoginQuery {
    pub fn audience(&self) -> String {
        self.site
            .as_deref()
            .filter(|site| !site.is_empty())
            .or(self.aud.as_deref())
            .unwrap_or_default()
            .to_string()
    }

    pub fn session_only(&self) -> bool {
        matches!(self.session.as_deref(), Some(session) if !session.is_empty() && session != "0")
    }

    pub fn no_avatar(&self) -> bool {
        self.noava.as_deref() == Some("1")
    }
}

/// Query of the provider's redirect back to `GET /callback`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// OAuth2 token response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    pub expires_in: Option<u64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
}

/// Untyped provider payload for mappers that only pick a few string fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawUserInfo(pub Map<String, Value>);

impl RawUserInfo {
    /// Field rendered as a string; missing and `null` fields are empty.
    pub fn value(&self, key: &str) -> String {
        match self.0.get(key) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}
