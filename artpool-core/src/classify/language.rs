//! Best-effort guess of an item's original language.
//!
//! Branch order is a policy, not a guarantee: an original title's script
//! wins, then anime-catalog cross references, then language-named folders,
//! then English. There is no confidence score.

use artpool_model::CatalogItem;

/// Cross-reference keys that only anime catalogs hand out.
const ANIME_PROVIDERS: &[&str] = &["anidb", "anilist", "myanimelist", "mal", "kitsu"];

/// Path tokens that name a language outright.
const PATH_KEYWORDS: &[(&str, &str)] = &[
    ("anime", "ja"),
    ("japanese", "ja"),
    ("korean", "ko"),
    ("kdrama", "ko"),
    ("chinese", "zh"),
    ("mandarin", "zh"),
    ("cantonese", "zh"),
    ("french", "fr"),
    ("francais", "fr"),
    ("german", "de"),
    ("deutsch", "de"),
    ("spanish", "es"),
    ("espanol", "es"),
    ("italian", "it"),
    ("russian", "ru"),
    ("hindi", "hi"),
    ("bollywood", "hi"),
    ("thai", "th"),
    ("arabic", "ar"),
    ("hebrew", "he"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    Kana,
    Hangul,
    Han,
    Cyrillic,
    Arabic,
    Hebrew,
    Thai,
    Latin,
}

fn script_of(c: char) -> Option<Script> {
    let script = match c as u32 {
        0x3040..=0x30FF | 0x31F0..=0x31FF | 0xFF66..=0xFF9F => Script::Kana,
        0x1100..=0x11FF | 0x3130..=0x318F | 0xAC00..=0xD7AF => Script::Hangul,
        0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF => Script::Han,
        0x0400..=0x052F => Script::Cyrillic,
        0x0600..=0x06FF | 0x0750..=0x077F | 0xFB50..=0xFDFF | 0xFE70..=0xFEFF => {
            Script::Arabic
        }
        0x0590..=0x05FF => Script::Hebrew,
        0x0E00..=0x0E7F => Script::Thai,
        _ if c.is_alphabetic() => Script::Latin,
        _ => return None,
    };
    Some(script)
}

/// Language implied by the dominant script of `text`.
///
/// Any kana marks Japanese even when kanji dominate; Han without kana is
/// Chinese. Latin or unrecognised text falls back to English.
pub fn language_from_script(text: &str) -> &'static str {
    let mut counts = [0usize; 8];
    for script in text.chars().filter_map(script_of) {
        counts[script as usize] += 1;
    }

    if counts[Script::Kana as usize] > 0 {
        return "ja";
    }

    let candidates = [
        (Script::Hangul, "ko"),
        (Script::Han, "zh"),
        (Script::Cyrillic, "ru"),
        (Script::Arabic, "ar"),
        (Script::Hebrew, "he"),
        (Script::Thai, "th"),
    ];
    let best = candidates
        .iter()
        .map(|(script, lang)| (counts[*script as usize], *lang))
        .filter(|(count, _)| *count > 0)
        .max_by_key(|(count, _)| *count);

    match best {
        Some((count, lang)) if count >= counts[Script::Latin as usize] => lang,
        _ => "en",
    }
}

fn language_from_path(item: &CatalogItem) -> Option<&'static str> {
    item.content_path
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .flat_map(|component| {
            component
                .split(|c: char| !c.is_alphanumeric())
                .filter(|token| !token.is_empty())
                .map(str::to_lowercase)
                .collect::<Vec<_>>()
        })
        .find_map(|token| {
            PATH_KEYWORDS
                .iter()
                .find(|(keyword, _)| *keyword == token)
                .map(|(_, lang)| *lang)
        })
}

/// Guess the original language of an item.
pub fn detect_original_language(item: &CatalogItem) -> &'static str {
    if let Some(original) = item.original_title.as_deref().map(str::trim)
        && !original.is_empty()
        && !original.eq_ignore_ascii_case(item.title.trim())
    {
        return language_from_script(original);
    }

    if ANIME_PROVIDERS
        .iter()
        .any(|provider| item.provider_id(provider).is_some())
    {
        return "ja";
    }

    language_from_path(item).unwrap_or("en")
}
