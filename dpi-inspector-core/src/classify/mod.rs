use crate::flow::AppType;

/// One classification rule: the first entry whose substring set contains a
/// match against the lowercased domain wins. Order matters (spec.md §4.6).
type Rule = (&'static [&'static str], AppType);

const RULES: &[Rule] = &[
    (&["google", "gstatic", "googleapis", "ggpht", "gvt1"], AppType::Google),
    (&["youtube", "ytimg", "youtu.be", "yt3.ggpht"], AppType::Youtube),
    (&["facebook", "fbcdn", "fb.com", "fbsbx", "meta.com"], AppType::Facebook),
    (&["instagram", "cdninstagram"], AppType::Instagram),
    (&["whatsapp", "wa.me"], AppType::Whatsapp),
    (&["twitter", "twimg", "x.com", "t.co"], AppType::Twitter),
    (&["netflix", "nflxvideo", "nflximg"], AppType::Netflix),
    (&["amazon", "amazonaws", "cloudfront", "aws"], AppType::Amazon),
    (
        &["microsoft", "msn.com", "office", "azure", "live.com", "outlook", "bing"],
        AppType::Microsoft,
    ),
    (&["apple", "icloud", "mzstatic", "itunes"], AppType::Apple),
    (&["telegram", "t.me"], AppType::Telegram),
    (&["tiktok", "tiktokcdn", "musical.ly", "bytedance"], AppType::Tiktok),
    (&["spotify", "scdn.co"], AppType::Spotify),
    (&["zoom"], AppType::Zoom),
    (&["discord", "discordapp"], AppType::Discord),
    (&["github", "githubusercontent"], AppType::Github),
    (&["cloudflare", "cf-"], AppType::Cloudflare),
];

/// Pure `domain -> app category` classification (spec.md §4.6). Empty
/// input yields `Unknown`; a non-empty domain matching no rule yields
/// `Https` (most unclassified traffic observed this way was HTTPS).
pub fn classify(domain: &str) -> AppType {
    if domain.is_empty() {
        return AppType::Unknown;
    }

    let lower = domain.to_lowercase();
    for (substrings, app) in RULES {
        if substrings.iter().any(|s| lower.contains(s)) {
            return *app;
        }
    }
    AppType::Https
}
