//! Shared User-Agent string for feed and media requests.
//!
//! The mobile feed endpoints serve the JSON API only to mobile browsers, so
//! every request identifies as one.

const MOBILE_BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 9; Pixel 3 XL) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/70.0.3538.80 Mobile Safari/537.36";

/// Default User-Agent for every request.
#[must_use]
pub(crate) fn default_user_agent() -> &'static str {
    MOBILE_BROWSER_USER_AGENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_is_a_mobile_browser() {
        let ua = default_user_agent();
        assert!(ua.starts_with("Mozilla/5.0"), "got: {ua}");
        assert!(ua.contains("Android"), "feed API needs a mobile UA: {ua}");
        assert!(ua.contains("Mobile Safari"), "got: {ua}");
    }
}
