//! Canonical user identity and the per-login accumulator built around it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha1::{Digest, Sha1};
use std::collections::HashMap;

/// Name of the collection holding every email address seen during a login.
pub const EMAILS_COLLECTION: &str = "emails";

/// Canonical identity produced by a provider login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub picture: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub paid_sub: bool,
}

impl User {
    pub fn set_paid_sub(&mut self, paid: bool) {
        self.paid_sub = paid;
    }
}

/// Named bag of unique keys, each carrying a value (for emails: the "is primary" flag).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    #[serde(rename = "type")]
    pub kind: String,
    pub items: HashMap<String, Value>,
}

impl Collection {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            items: HashMap::new(),
        }
    }

    pub fn add(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.items.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.items.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Everything gathered about a user while one provider's mappers run.
///
/// `raw` keeps the decoded payload of every fetched resource keyed by its URL, and
/// `collections` holds multi-value data such as alternate email addresses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserData {
    pub user: User,
    #[serde(default)]
    pub social: String,
    #[serde(default)]
    pub collections: HashMap<String, Collection>,
    #[serde(default)]
    pub raw: HashMap<String, Value>,
}

impl UserData {
    pub fn set_raw(&mut self, key: impl Into<String>, value: Value) {
        self.raw.insert(key.into(), value);
    }

    /// Returns the named collection, creating it on first use.
    pub fn collection(&mut self, name: &str) -> &mut Collection {
        self.collections
            .entry(name.to_string())
            .or_insert_with(|| Collection::new(name))
    }

    pub fn get_collection(&self, name: &str) -> Option<&Collection> {
        self.collections.get(name)
    }

    /// Attaches a collection unless one of the same kind already exists.
    pub fn add_collection(&mut self, collection: Collection) {
        self.collections
            .entry(collection.kind.clone())
            .or_insert(collection);
    }

    pub fn email_collection(&mut self) -> &mut Collection {
        self.collection(EMAILS_COLLECTION)
    }

    /// The email currently flagged as the user's primary address, if any.
    pub fn primary_email(&self) -> Option<&str> {
        self.get_collection(EMAILS_COLLECTION)?
            .items
            .iter()
            .find(|(_, flag)| flag.as_bool() == Some(true))
            .map(|(email, _)| email.as_str())
    }

    /// Records an email address.
    ///
    /// A primary address demotes the previous primary and becomes `user.email`.
    /// A non-primary address is only recorded if it is not known yet, so it can
    /// never demote an existing primary.
    pub fn add_email(&mut self, email: &str, primary: bool) {
        if email.is_empty() {
            return;
        }

        let emails = self.email_collection();
        if primary {
            for flag in emails.items.values_mut() {
                *flag = Value::Bool(false);
            }
            emails.add(email, true);
            self.user.email = email.to_string();
        } else if !emails.contains(email) {
            emails.add(email, false);
        }
    }

    /// Folds the user returned by a mapper into the accumulator.
    ///
    /// The first email seen becomes primary unless it was explicitly recorded as an
    /// alternate. Once a primary exists, a different email coming back from a later
    /// mapper is kept as an alternate and `user.email` stays on the primary.
    pub fn apply_user(&mut self, user: User) {
        self.user = user;
        let email = self.user.email.clone();

        match self.primary_email().map(str::to_owned) {
            Some(primary) if primary != email => {
                self.add_email(&email, false);
                self.user.email = primary;
            }
            Some(_) => {}
            None if !email.is_empty() => {
                let emails = self.email_collection();
                if !emails.contains(&email) {
                    emails.add(email, true);
                }
            }
            None => {}
        }
    }
}

/// Stable, provider-independent hash of an identifier (hex encoded SHA-1).
pub fn hash_id(value: &str) -> String {
    hex::encode(Sha1::digest(value.as_bytes()))
}
