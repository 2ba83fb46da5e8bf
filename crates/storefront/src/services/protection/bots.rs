//! User-agent classification.

use std::sync::LazyLock;

use regex::Regex;

/// What a user agent looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotVerdict {
    /// An ordinary browser.
    Human,
    /// A search engine crawler we let index the catalog.
    SearchEngine(&'static str),
    /// Scripted or automated client.
    Automated(&'static str),
}

/// Crawlers allowed to read (GET/HEAD) pages.
static SEARCH_ENGINES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    compile(&[
        ("google", r"(?i)\b(googlebot|google-inspectiontool|adsbot-google)\b"),
        ("bing", r"(?i)\b(bingbot|msnbot|bingpreview)\b"),
        ("duckduckgo", r"(?i)\bduckduckbot\b"),
        ("yandex", r"(?i)\byandex(bot|images)\b"),
        ("baidu", r"(?i)\bbaiduspider\b"),
        ("applebot", r"(?i)\bapplebot\b"),
    ])
});

/// Automated clients, checked after search engines.
static AUTOMATED: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    compile(&[
        ("curl", r"(?i)^curl/"),
        ("wget", r"(?i)^wget/"),
        ("http-library", r"(?i)(python-requests|python-urllib|aiohttp|httpx|go-http-client|okhttp|java/|libwww-perl|node-fetch|axios/)"),
        ("scraper", r"(?i)(scrapy|httrack|colly|mechanize)"),
        ("headless-browser", r"(?i)(headlesschrome|phantomjs|puppeteer|playwright|selenium)"),
        ("crawler", r"(?i)(bot|spider|crawler|crawling)\b"),
    ])
});

fn compile(patterns: &[(&'static str, &str)]) -> Vec<(&'static str, Regex)> {
    patterns
        .iter()
        .filter_map(|(name, pattern)| match Regex::new(pattern) {
            Ok(re) => Some((*name, re)),
            Err(err) => {
                tracing::error!(pattern = name, error = %err, "Invalid bot pattern");
                None
            }
        })
        .collect()
}

/// Classify a request's `User-Agent`. A missing or blank header is automated.
#[must_use]
pub fn classify(user_agent: Option<&str>) -> BotVerdict {
    let Some(ua) = user_agent.map(str::trim).filter(|ua| !ua.is_empty()) else {
        return BotVerdict::Automated("missing-user-agent");
    };

    if let Some((name, _)) = SEARCH_ENGINES.iter().find(|(_, re)| re.is_match(ua)) {
        return BotVerdict::SearchEngine(name);
    }
    if let Some((name, _)) = AUTOMATED.iter().find(|(_, re)| re.is_match(ua)) {
        return BotVerdict::Automated(name);
    }
    BotVerdict::Human
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIREFOX: &str =
        "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";
    const SAFARI: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X) \
                          AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Mobile/15E148 Safari/604.1";

    #[test]
    fn test_browsers_are_human() {
        assert_eq!(classify(Some(FIREFOX)), BotVerdict::Human);
        assert_eq!(classify(Some(SAFARI)), BotVerdict::Human);
    }

    #[test]
    fn test_missing_user_agent_is_automated() {
        assert_eq!(classify(None), BotVerdict::Automated("missing-user-agent"));
        assert_eq!(classify(Some("   ")), BotVerdict::Automated("missing-user-agent"));
    }

    #[test]
    fn test_scripted_clients_are_automated() {
        assert_eq!(classify(Some("curl/8.5.0")), BotVerdict::Automated("curl"));
        assert_eq!(classify(Some("Wget/1.21.4")), BotVerdict::Automated("wget"));
        assert_eq!(
            classify(Some("python-requests/2.32.3")),
            BotVerdict::Automated("http-library")
        );
        assert_eq!(
            classify(Some("Scrapy/2.11 (+https://scrapy.org)")),
            BotVerdict::Automated("scraper")
        );
        assert_eq!(
            classify(Some("Mozilla/5.0 HeadlessChrome/120.0.0.0 Safari/537.36")),
            BotVerdict::Automated("headless-browser")
        );
        assert_eq!(
            classify(Some("SomeRandomBot/1.0")),
            BotVerdict::Automated("crawler")
        );
    }

    #[test]
    fn test_search_engines_are_recognized() {
        assert_eq!(
            classify(Some(
                "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)"
            )),
            BotVerdict::SearchEngine("google")
        );
        assert_eq!(
            classify(Some(
                "Mozilla/5.0 (compatible; bingbot/2.0; +http://www.bing.com/bingbot.htm)"
            )),
            BotVerdict::SearchEngine("bing")
        );
    }

    #[test]
    fn test_words_containing_bot_are_not_flagged() {
        // "robot" inside a product or device name is not a crawler marker.
        assert_eq!(classify(Some("Mozilla/5.0 (Robotics Lab Kiosk)")), BotVerdict::Human);
    }
}
