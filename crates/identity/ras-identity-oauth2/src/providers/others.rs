use crate::config::{Endpoint, ProviderSpec};
use crate::mapper::Mapper;
use crate::types::RawUserInfo;
use ras_identity_core::{User, UserData, hash_id};
use serde::Deserialize;

pub fn microsoft() -> ProviderSpec {
    ProviderSpec::new(
        "microsoft",
        Endpoint::new(
            "https://login.microsoftonline.com/consumers/oauth2/v2.0/authorize",
            "https://login.microsoftonline.com/consumers/oauth2/v2.0/token",
        ),
    )
    .with_scopes(["User.Read"])
    .with_mapper(Mapper::new(
        "https://graph.microsoft.com/v1.0/me",
        |_ud: &mut UserData, info: RawUserInfo, _| {
            Ok(User {
                id: format!("microsoft_{}", hash_id(&info.value("id"))),
                name: info.value("displayName"),
                // served only with the access token, so an avatar saver is needed to show it
                picture: "https://graph.microsoft.com/beta/me/photo/$value".to_string(),
                ..User::default()
            })
        },
    ))
}

pub fn battlenet() -> ProviderSpec {
    ProviderSpec::new(
        "battlenet",
        Endpoint::new(
            "https://eu.battle.net/oauth/authorize",
            "https://eu.battle.net/oauth/token",
        ),
    )
    .with_mapper(Mapper::new(
        "https://eu.battle.net/oauth/userinfo",
        |_ud: &mut UserData, info: RawUserInfo, _| {
            Ok(User {
                id: format!("battlenet_{}", hash_id(&info.value("id"))),
                name: info.value("battletag"),
                ..User::default()
            })
        },
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PatreonUser {
    pub data: PatreonData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PatreonData {
    pub id: String,
    pub attributes: PatreonAttributes,
    pub relationships: PatreonRelationships,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PatreonAttributes {
    pub full_name: String,
    pub image_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PatreonRelationships {
    pub pledges: PatreonPledges,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PatreonPledges {
    pub data: Vec<PatreonPledge>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PatreonPledge {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Patreon; users with at least one pledge are flagged as paid subscribers.
pub fn patreon() -> ProviderSpec {
    ProviderSpec::new(
        "patreon",
        Endpoint::new(
            "https://www.patreon.com/oauth2/authorize",
            "https://api.patreon.com/oauth2/token",
        ),
    )
    .with_mapper(Mapper::new(
        "https://www.patreon.com/api/oauth2/api/current_user",
        |ud: &mut UserData, info: PatreonUser, _| {
            let mut user = User {
                id: format!("patreon_{}", hash_id(&info.data.id)),
                name: info.data.attributes.full_name,
                picture: info.data.attributes.image_url,
                ..ud.user.clone()
            };
            user.set_paid_sub(!info.data.relationships.pledges.data.is_empty());
            Ok(user)
        },
    ))
}
