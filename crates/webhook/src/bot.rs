//! Built-in bot/crawler/social-previewer signature filter (spec §4.1 step 5).

/// Substrings matched case-insensitively against the `User-Agent` header.
/// Covers link-preview bots, social crawlers, and common search-engine
/// crawlers, not scraping tools in general — the goal is to stop chat apps
/// and social platforms from firing workflows when they unfurl a posted
/// webhook URL, not to build a general bot-detection system.
const BOT_SIGNATURES: &[&str] = &[
    "facebookexternalhit",
    "facebookcatalog",
    "slackbot",
    "twitterbot",
    "whatsapp",
    "telegrambot",
    "discordbot",
    "linkedinbot",
    "pinterest",
    "googlebot",
    "bingbot",
    "duckduckbot",
    "baiduspider",
    "yandexbot",
    "ahrefsbot",
    "semrushbot",
    "mj12bot",
    "skypeuripreview",
    "redditbot",
    "embedly",
    "quora link preview",
    "vkshare",
    "w3c_validator",
];

/// Returns `true` if `user_agent` matches a known bot/crawler signature.
#[must_use]
pub fn is_bot(user_agent: Option<&str>) -> bool {
    let Some(ua) = user_agent else {
        return false;
    };
    let lower = ua.to_ascii_lowercase();
    BOT_SIGNATURES.iter().any(|sig| lower.contains(sig))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_known_bots() {
        assert!(is_bot(Some("Mozilla/5.0 (compatible; Slackbot-LinkExpanding 1.0)")));
        assert!(is_bot(Some("facebookexternalhit/1.1")));
        assert!(is_bot(Some("TelegramBot (like TwitterBot)")));
    }

    #[test]
    fn allows_normal_browsers() {
        assert!(!is_bot(Some(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36"
        )));
    }

    #[test]
    fn missing_user_agent_is_not_a_bot() {
        assert!(!is_bot(None));
    }
}
