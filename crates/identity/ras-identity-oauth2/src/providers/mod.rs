//! Built-in provider catalog.
//!
//! Each entry is endpoint data plus the mappers turning the provider's profile
//! resources into a [`User`](ras_identity_core::User).

mod facebook;
mod github;
mod google;
mod others;
mod yandex;

use crate::config::ProviderSpec;

pub use facebook::facebook;
pub use github::github;
pub use google::google;
pub use others::{battlenet, microsoft, patreon};
pub use yandex::yandex;

/// Names accepted by [`by_name`].
pub const NAMES: &[&str] = &[
    "github",
    "google",
    "facebook",
    "yandex",
    "microsoft",
    "battlenet",
    "patreon",
];

pub fn by_name(name: &str) -> Option<ProviderSpec> {
    match name {
        "github" => Some(github()),
        "google" => Some(google()),
        "facebook" => Some(facebook()),
        "yandex" => Some(yandex()),
        "microsoft" => Some(microsoft()),
        "battlenet" => Some(battlenet()),
        "patreon" => Some(patreon()),
        _ => None,
    }
}
