//! Strategies that turn fetched content into a [`NewsItem`](crate::models::NewsItem).
//!
//! | Strategy | Module | Input | guid |
//! |----------|--------|-------|------|
//! | Feed | [`rss`] | RSS 2.0 document, first `<item>` | `<guid>` |
//! | Scraped page | [`html`] | Fallback news page + detail page | detail page url |
//!
//! Both report a missing candidate as `Ok(None)` or an error; neither decides
//! freshness, which is left to the [`filter`](crate::filter).

pub mod html;
pub mod rss;

use itertools::Itertools;
use scraper::Html;

/// Reduce a markup fragment to its visible text.
///
/// Text nodes are trimmed, empty ones dropped, and the rest joined by single
/// spaces.
pub fn strip_markup(fragment: &str) -> String {
    Html::parse_fragment(fragment)
        .root_element()
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_markup_removes_tags() {
        assert_eq!(
            strip_markup("<p>Hello <b>brave</b>\n new</p><p>  world </p>"),
            "Hello brave new world"
        );
    }

    #[test]
    fn test_strip_markup_plain_text_untouched() {
        assert_eq!(strip_markup("already plain"), "already plain");
    }

    #[test]
    fn test_strip_markup_empty() {
        assert_eq!(strip_markup(""), "");
        assert_eq!(strip_markup("<br/><img src='x.jpg'>"), "");
    }
}
