use std::borrow::Cow;

use crate::users::models::User;

pub const DEFAULT_IMAGE: &str = "https://static.productionready.io/images/smiley-cyrus.jpg";

#[derive(Debug, Serialize, PartialEq)]
pub struct ProfileResponse<'a> {
    pub profile: ProfileView<'a>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ProfileView<'a> {
    pub username: Cow<'a, str>,
    pub bio: Option<Cow<'a, str>>,
    pub image: Cow<'a, str>,
    pub following: bool,
}

impl<'a> ProfileView<'a> {
    pub fn into_response(self) -> ProfileResponse<'a> {
        ProfileResponse { profile: self }
    }
}

impl User {
    /// Public view of this user as seen by `viewer`; anonymous viewers never follow.
    pub fn to_profile_view(&self, viewer: Option<&User>) -> ProfileView<'_> {
        ProfileView {
            username: Cow::Borrowed(&self.username),
            bio: self.bio.as_ref().map(|bio| Cow::Borrowed(bio.as_str())),
            image: match self.image {
                Some(ref image) => Cow::Borrowed(image.as_str()),
                None => Cow::Borrowed(DEFAULT_IMAGE),
            },
            following: viewer.map_or(false, |viewer| viewer.is_following(self.id)),
        }
    }
}
