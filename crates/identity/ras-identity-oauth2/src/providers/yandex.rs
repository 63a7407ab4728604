use crate::config::{Endpoint, ProviderSpec};
use crate::mapper::Mapper;
use ras_identity_core::{User, UserData, hash_id};
use serde::Deserialize;

/// Response of `https://login.yandex.ru/info?format=json`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct YandexInfo {
    pub id: String,
    pub login: String,
    pub display_name: String,
    pub real_name: String,
    pub default_email: String,
    pub emails: Vec<String>,
    pub default_avatar_id: String,
}

pub fn yandex() -> ProviderSpec {
    ProviderSpec::new(
        "yandex",
        Endpoint::new(
            "https://oauth.yandex.com/authorize",
            "https://oauth.yandex.com/token",
        ),
    )
    .with_mapper(Mapper::new(
        "https://login.yandex.ru/info?format=json",
        |ud: &mut UserData, info: YandexInfo, _| {
            let name = [&info.display_name, &info.real_name, &info.login]
                .into_iter()
                .find(|name| !name.is_empty())
                .cloned()
                .unwrap_or_default();

            ud.add_email(&info.default_email, true);
            for email in &info.emails {
                ud.add_email(email, false);
            }

            let mut user = User {
                id: format!("yandex_{}", hash_id(&info.id)),
                name,
                email: info.default_email,
                ..ud.user.clone()
            };
            if !info.default_avatar_id.is_empty() {
                user.picture = format!(
                    "https://avatars.yandex.net/get-yapic/{}/islands-200",
                    info.default_avatar_id
                );
            }
            Ok(user)
        },
    ))
}
