use serde::{Deserialize, Serialize};

use crate::models::platform::Platform;

/// Canonical name representation for one title, derived once per job.
///
/// Carries the clean Roman form of the title plus the handle each platform
/// gets, already normalized to that platform's charset and length rules.
/// Derivation is deterministic, so retries and re-runs never diverge in naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Title as received, original script preserved.
    pub input_title: String,
    /// Clean Roman transliteration ("बांसवाड़ा" -> "bansavada").
    pub roman_form: String,
    /// Kebab-case form for URLs and device names.
    pub slug: String,

    /// Instagram username: `stage.titlename`.
    pub ig_handle: String,
    /// Facebook page display name: `STAGE Title Name` (Devanagari kept).
    pub fb_page_name: String,
    /// Facebook vanity username: `StageTitleName`.
    pub fb_username: String,
    /// YouTube channel display name (Devanagari kept for regional SEO).
    pub yt_channel_name: String,
    /// YouTube handle without the leading `@`: `StageTitleName`.
    pub yt_handle: String,
}

impl Identity {
    /// The public identifier this platform gets.
    pub fn handle_for(&self, platform: Platform) -> &str {
        match platform {
            Platform::Facebook => &self.fb_username,
            Platform::Youtube => &self.yt_handle,
            Platform::Instagram => &self.ig_handle,
        }
    }

    /// Display name shown on the created presence.
    pub fn display_name_for(&self, platform: Platform) -> &str {
        match platform {
            Platform::Facebook => &self.fb_page_name,
            Platform::Youtube => &self.yt_channel_name,
            Platform::Instagram => &self.ig_handle,
        }
    }

    /// Canonical public URL for the handle. The executor may record a
    /// different URL if the platform assigns one (e.g. a numeric page URL).
    pub fn url_for(&self, platform: Platform) -> String {
        match platform {
            Platform::Facebook => format!("https://facebook.com/{}", self.fb_username),
            Platform::Youtube => format!("https://youtube.com/@{}", self.yt_handle),
            Platform::Instagram => format!("https://instagram.com/{}", self.ig_handle),
        }
    }
}
