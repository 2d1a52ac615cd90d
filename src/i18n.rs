use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use yuuka::derive_struct;

// Include translation TOML at compile time
const EN_US_TOML: &str = include_str!("../res/i18n/en_us.toml");
const FR_FR_TOML: &str = include_str!("../res/i18n/fr_fr.toml");

derive_struct! {
    #[derive(PartialEq, Serialize, Deserialize)]
    pub Lang {
        // status line
        status_open: String = "status_open".to_string(),
        status_closed: String = "status_closed".to_string(),
        // mutation feedback
        already_open: String = "already_open".to_string(),
        already_closed: String = "already_closed".to_string(),
        now_open: String = "now_open".to_string(),
        now_closed: String = "now_closed".to_string(),
        // announcements relayed to the tweet bot
        tweet_open: String = "tweet_open".to_string(),
        tweet_closed: String = "tweet_closed".to_string(),
        invalid_command: String = "invalid_command".to_string(),
        help_usage: String = "help_usage".to_string(),
        help_commands: String = "help_commands".to_string(),
        spaceapi_sync_failed: String = "spaceapi_sync_failed".to_string(),
    }
}

pub const LOCALES: [&str; 2] = ["en_us", "fr_fr"];

static LANG_SELECTED: OnceCell<Lang> = OnceCell::new();
static LOCALE: OnceCell<String> = OnceCell::new();

fn parse_toml_to_lang(content: &str) -> Lang {
    match toml::from_str::<Lang>(content) {
        Ok(l) => l,
        Err(e) => {
            log::warn!(
                "i18n: failed to parse toml: {}\ncontent preview: {}",
                e,
                &content.chars().take(200).collect::<String>()
            );
            Lang::default()
        }
    }
}

/// Message table of a supported locale.
pub fn load_locale(locale: &str) -> Option<Lang> {
    match locale {
        "en_us" => Some(parse_toml_to_lang(EN_US_TOML)),
        "fr_fr" => Some(parse_toml_to_lang(FR_FR_TOML)),
        _ => None,
    }
}

/// Map a locale string such as `fr_FR.UTF-8` or `en` to a supported locale.
pub fn match_locale(preference: &str) -> Option<&'static str> {
    let preference = preference.to_lowercase();
    if preference.starts_with("fr") {
        Some("fr_fr")
    } else if preference.starts_with("en") {
        Some("en_us")
    } else {
        None
    }
}

/// Return a reference to the currently selected `Lang`.
/// Callers can access fields directly, e.g. `i18n::lang().status_open`.
pub fn lang() -> &'static Lang {
    LANG_SELECTED.get_or_init(|| parse_toml_to_lang(EN_US_TOML))
}

pub fn locale() -> &'static str {
    LOCALE.get().map(|s| s.as_str()).unwrap_or("en_us")
}

/// Replace `{name}` placeholders in a message template.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |acc, (name, value)| {
            acc.replace(&format!("{{{name}}}"), value)
        })
}

/// Select the message table. An explicit `preferred` locale wins over the
/// environment; English is the fallback.
pub fn init_i18n(preferred: Option<&str>) {
    let mut prefs: Vec<String> = Vec::new();
    if let Some(p) = preferred {
        prefs.push(p.to_string());
    }
    if let Ok(v) = std::env::var("LANGUAGE") {
        prefs.extend(v.split(':').map(|s| s.to_string()));
    }
    if let Ok(v) = std::env::var("LC_ALL") {
        prefs.push(v);
    }
    if let Ok(v) = std::env::var("LANG") {
        prefs.push(v);
    }

    let chosen = prefs
        .iter()
        .find_map(|p| match_locale(p))
        .unwrap_or(LOCALES[0]);

    if let Some(l) = load_locale(chosen) {
        LOCALE.set(chosen.to_string()).ok();
        LANG_SELECTED.set(l).ok();
    }

    let user = whoami::username();
    log::info!("i18n: user={} locale={}", user, locale());
}
