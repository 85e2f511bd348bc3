//! Naming engine: title -> canonical identity -> per-platform handles.
//!
//! Pure and deterministic: the same title always yields the same
//! [`Identity`], so retries and re-runs never diverge in naming. No network
//! calls and no collision lookup against the live platforms; a taken handle
//! only surfaces at execution time.
//!
//! Platform rules:
//! - Instagram: `a-z 0-9 _ .`, max 30 chars, no consecutive dots, no dot at
//!   either end. Handle shape `stage.titlename`.
//! - Facebook username: `a-z A-Z 0-9 .`, max 50, min 5. Shape `StageTitleName`.
//! - YouTube handle: `a-z A-Z 0-9 _ - .`, max 30, min 3. Shape `StageTitleName`.
//! - Display names keep Devanagari (regional SEO), capped at 75 (FB) and
//!   100 (YT) characters.

pub mod translit;

use crate::models::identity::Identity;
use translit::{has_devanagari, transliterate};

#[derive(Debug, thiserror::Error)]
pub enum NamingError {
    #[error("title has no usable characters")]
    InvalidTitle,
}

const IG_MAX: usize = 30;
const FB_USERNAME_MAX: usize = 50;
const FB_USERNAME_MIN: usize = 5;
const FB_PAGE_NAME_MAX: usize = 75;
const YT_HANDLE_MAX: usize = 30;
const YT_HANDLE_MIN: usize = 3;
const YT_CHANNEL_NAME_MAX: usize = 100;

/// Official English spellings for known district titles; these skip
/// transliteration entirely.
const DISTRICT_CANONICAL: &[(&str, &str)] = &[
    ("banswara", "Banswara"),
    ("dungarpur", "Dungarpur"),
    ("pratapgarh", "Pratapgarh"),
    ("udaipur", "Udaipur"),
    ("rajsamand", "Rajsamand"),
    ("salumbar", "Salumbar"),
    ("kota", "Kota"),
    ("bundi", "Bundi"),
    ("baran", "Baran"),
    ("jhalawar", "Jhalawar"),
    ("chittorgarh", "Chittorgarh"),
    ("bhilwara", "Bhilwara"),
];

/// Derive the full identity for a title under the given brand prefix.
pub fn derive_identity(title: &str, brand_prefix: &str) -> Result<Identity, NamingError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(NamingError::InvalidTitle);
    }

    let prefix_title = capitalize(&brand_prefix.to_lowercase()); // "Stage"
    let prefix_upper = brand_prefix.to_uppercase(); // "STAGE"
    let prefix_lower = brand_prefix.to_lowercase(); // "stage"

    let roman = to_roman(trimmed);
    let words: Vec<&str> = split_words(&roman);
    if words.is_empty() {
        return Err(NamingError::InvalidTitle);
    }

    Ok(Identity {
        input_title: trimmed.to_string(),
        roman_form: roman.clone(),
        slug: slug_from_words(&words),
        ig_handle: ig_handle(&words, &prefix_lower),
        fb_page_name: display_name(trimmed, &prefix_upper, FB_PAGE_NAME_MAX),
        fb_username: fb_username(&words, &prefix_title),
        yt_channel_name: display_name(trimmed, &prefix_upper, YT_CHANNEL_NAME_MAX),
        yt_handle: yt_handle(&words, &prefix_title),
    })
}

/// Title (Hindi or English) -> clean lowercase Roman form.
fn to_roman(title: &str) -> String {
    let lower = title.to_lowercase();
    let lower = lower.trim();
    if let Some((_, canonical)) = DISTRICT_CANONICAL.iter().find(|(k, _)| *k == lower) {
        return canonical.to_lowercase();
    }
    let roman = if has_devanagari(title) {
        transliterate(title)
    } else {
        lower.to_string()
    };
    collapse_whitespace(&roman)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn split_words(roman: &str) -> Vec<&str> {
    roman
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

fn slug_from_words(words: &[&str]) -> String {
    words.join("-")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `STAGE Title Name` display form; Devanagari titles are kept as-is,
/// Latin titles are title-cased. Truncation is per character, never
/// inside a code point.
fn display_name(title: &str, prefix: &str, max: usize) -> String {
    let name = if has_devanagari(title) {
        format!("{prefix} {title}")
    } else {
        let cased = title
            .split_whitespace()
            .map(|w| capitalize(&w.to_lowercase()))
            .collect::<Vec<_>>()
            .join(" ");
        format!("{prefix} {cased}")
    };
    truncate_chars(&name, max)
}

/// `stage.titlename`: joined lowercase words behind the brand, dot-separated.
fn ig_handle(words: &[&str], prefix_lower: &str) -> String {
    let core: String = words.concat();
    let core = keep_chars(&core.to_lowercase(), |c| {
        c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.'
    });
    let prefix = keep_chars(prefix_lower, |c| {
        c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.'
    });
    let handle = if prefix.is_empty() { core } else { format!("{prefix}.{core}") };
    let handle = collapse_dots(&handle);
    truncate_chars(handle.trim_matches('.'), IG_MAX)
        .trim_matches('.')
        .to_string()
}

/// `StageTitleName`: capitalized words behind the brand, alnum + dot only.
fn fb_username(words: &[&str], prefix_title: &str) -> String {
    let core: String = words.iter().map(|w| capitalize(w)).collect();
    let username = keep_chars(&format!("{prefix_title}{core}"), |c| {
        c.is_ascii_alphanumeric() || c == '.'
    });
    let mut username = truncate_chars(&username, FB_USERNAME_MAX);
    if username.chars().count() < FB_USERNAME_MIN {
        username.push_str("Official");
    }
    username
}

/// `StageTitleName` with YouTube's slightly wider charset.
fn yt_handle(words: &[&str], prefix_title: &str) -> String {
    let core: String = words.iter().map(|w| capitalize(w)).collect();
    let handle = keep_chars(&format!("{prefix_title}{core}"), |c| {
        c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.'
    });
    let handle = collapse_dots(&handle);
    let mut handle = truncate_chars(handle.trim_matches(|c| c == '.' || c == '-'), YT_HANDLE_MAX)
        .trim_matches(|c| c == '.' || c == '-')
        .to_string();
    if handle.chars().count() < YT_HANDLE_MIN {
        handle.push_str("Official");
    }
    handle
}

fn keep_chars(s: &str, keep: impl Fn(char) -> bool) -> String {
    s.chars().filter(|&c| keep(c)).collect()
}

fn collapse_dots(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_dot = false;
    for c in s.chars() {
        if c == '.' {
            if !prev_dot {
                out.push(c);
            }
            prev_dot = true;
        } else {
            out.push(c);
            prev_dot = false;
        }
    }
    out
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
