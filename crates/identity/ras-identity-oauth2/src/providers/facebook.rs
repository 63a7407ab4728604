use crate::config::{Endpoint, ProviderSpec};
use crate::mapper::Mapper;
use crate::types::RawUserInfo;
use ras_identity_core::{User, UserData, hash_id};
use serde::Deserialize;

/// Picture part of the `/me?fields=id,name,picture` response.
#[derive(Debug, Default, Deserialize)]
struct MePicture {
    #[serde(default)]
    picture: PictureData,
}

#[derive(Debug, Default, Deserialize)]
struct PictureData {
    #[serde(default)]
    data: PictureUrl,
}

#[derive(Debug, Default, Deserialize)]
struct PictureUrl {
    #[serde(default)]
    url: String,
}

pub fn facebook() -> ProviderSpec {
    ProviderSpec::new(
        "facebook",
        Endpoint::new(
            "https://www.facebook.com/v3.2/dialog/oauth",
            "https://graph.facebook.com/v3.2/oauth/access_token",
        ),
    )
    .with_scopes(["public_profile"])
    .with_mapper(Mapper::new(
        "https://graph.facebook.com/me?fields=id,name,picture",
        |_ud: &mut UserData, info: RawUserInfo, body: &[u8]| {
            let mut user = User {
                id: format!("facebook_{}", hash_id(&info.value("id"))),
                name: info.value("name"),
                ..User::default()
            };
            if user.name.is_empty() {
                user.name = user.id.get(0..16).unwrap_or_default().to_string();
            }

            // a picture in an unexpected shape is left out rather than failing the login
            if let Ok(me) = serde_json::from_slice::<MePicture>(body) {
                user.picture = me.picture.data.url;
            }
            Ok(user)
        },
    ))
}
