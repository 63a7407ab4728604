use crate::config::{Endpoint, ProviderSpec};
use crate::mapper::Mapper;
use crate::types::RawUserInfo;
use ras_identity_core::{User, UserData, hash_id};

pub fn google() -> ProviderSpec {
    ProviderSpec::new(
        "google",
        Endpoint::new(
            "https://accounts.google.com/o/oauth2/auth",
            "https://oauth2.googleapis.com/token",
        ),
    )
    .with_scopes(["https://www.googleapis.com/auth/userinfo.profile"])
    .with_mapper(Mapper::new(
        "https://www.googleapis.com/oauth2/v3/userinfo",
        |_ud: &mut UserData, info: RawUserInfo, _| {
            let mut user = User {
                // provider prefix keeps ids from colliding across providers
                id: format!("google_{}", hash_id(&info.value("sub"))),
                name: info.value("name"),
                picture: info.value("picture"),
                email: info.value("email"),
                ..User::default()
            };
            if user.name.is_empty() {
                user.name = format!("noname_{}", user.id.get(8..12).unwrap_or_default());
            }
            Ok(user)
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_google_userinfo() {
        let mut ud = UserData::default();
        google().mappers[0]
            .apply(
                &mut ud,
                br#"{"sub": "1090", "name": "Jane Doe", "picture": "https://lh3/photo.jpg"}"#,
            )
            .unwrap();

        assert_eq!(ud.user.id, format!("google_{}", hash_id("1090")));
        assert_eq!(ud.user.name, "Jane Doe");
        assert_eq!(ud.user.picture, "https://lh3/photo.jpg");
    }

    #[test]
    fn test_google_anonymous_name() {
        let mut ud = UserData::default();
        google().mappers[0].apply(&mut ud, br#"{"sub": "1090"}"#).unwrap();

        assert_eq!(ud.user.name, format!("noname_{}", &ud.user.id[8..12]));
        assert_eq!(ud.user.name.len(), 11);
    }
}
