use crate::config::{Endpoint, ProviderSpec};
use crate::mapper::Mapper;
use crate::types::RawUserInfo;
use ras_identity_core::{User, UserData, hash_id};
use serde::Deserialize;

const USER_URL: &str = "https://api.github.com/user";
const EMAILS_URL: &str = "https://api.github.com/user/emails";

/// Entry of `GET /user/emails`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubEmail {
    pub email: String,
    #[serde(default)]
    pub primary: bool,
}

/// GitHub: profile first, then every address from `/user/emails`.
pub fn github() -> ProviderSpec {
    ProviderSpec::new(
        "github",
        Endpoint::new(
            "https://github.com/login/oauth/authorize",
            "https://github.com/login/oauth/access_token",
        ),
    )
    .with_scopes(["user:email"])
    .with_mapper(Mapper::new(
        USER_URL,
        |_ud: &mut UserData, info: RawUserInfo, _| {
            let login = info.value("login");
            let mut user = User {
                id: format!("github_{}", hash_id(&login)),
                name: info.value("name"),
                picture: info.value("avatar_url"),
                ..User::default()
            };
            // no display name set, fall back to the login
            if user.name.is_empty() {
                user.name = login;
            }
            Ok(user)
        },
    ))
    .with_mapper(Mapper::new(
        EMAILS_URL,
        |ud: &mut UserData, emails: Vec<GitHubEmail>, _| {
            for email in &emails {
                ud.add_email(&email.email, email.primary);
            }
            Ok(ud.user.clone())
        },
    ))
}
