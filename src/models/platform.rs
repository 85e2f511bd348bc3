use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The fixed set of platforms a title can be provisioned on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum Platform {
    #[serde(alias = "fb")]
    #[strum(to_string = "facebook", serialize = "fb")]
    Facebook,
    #[serde(alias = "yt")]
    #[strum(to_string = "youtube", serialize = "yt")]
    Youtube,
    #[serde(alias = "ig")]
    #[strum(to_string = "instagram", serialize = "ig")]
    Instagram,
}

impl Platform {
    /// All platforms, in the order step records are reported.
    pub const ALL: [Platform; 3] = [Platform::Facebook, Platform::Youtube, Platform::Instagram];
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn parses_short_and_long_forms() {
        assert_eq!(Platform::from_str("fb").unwrap(), Platform::Facebook);
        assert_eq!(Platform::from_str("facebook").unwrap(), Platform::Facebook);
        assert_eq!(Platform::from_str("YT").unwrap(), Platform::Youtube);
        assert_eq!(Platform::from_str("ig").unwrap(), Platform::Instagram);
        assert!(Platform::from_str("tiktok").is_err());
    }

    #[test]
    fn deserializes_short_and_long_forms() {
        let parsed: Platform = serde_json::from_str("\"fb\"").unwrap();
        assert_eq!(parsed, Platform::Facebook);
        let parsed: Platform = serde_json::from_str("\"yt\"").unwrap();
        assert_eq!(parsed, Platform::Youtube);
        let parsed: Platform = serde_json::from_str("\"ig\"").unwrap();
        assert_eq!(parsed, Platform::Instagram);
        let parsed: Platform = serde_json::from_str("\"instagram\"").unwrap();
        assert_eq!(parsed, Platform::Instagram);
        assert!(serde_json::from_str::<Platform>("\"tiktok\"").is_err());
    }

    #[test]
    fn displays_long_form() {
        assert_eq!(Platform::Facebook.to_string(), "facebook");
        assert_eq!(Platform::Youtube.to_string(), "youtube");
        assert_eq!(Platform::Instagram.to_string(), "instagram");
    }
}
