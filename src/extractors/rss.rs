//! RSS feed strategy.
//!
//! Feeds are assumed to list their newest entry first, so only the first
//! `<item>` is considered. If that item lacks a `pubDate` or `guid` the whole
//! candidate is dropped; later items of the same feed are never consulted.
//!
//! The lead image is not part of the feed. It is looked up on the article
//! page only after the item has been accepted, see [`RssExtractor::locate_image`].

use crate::config::RssSettings;
use crate::error::{ConfigError, ExtractError, ImageError};
use crate::extractors::strip_markup;
use crate::fetcher::Fetch;
use crate::models::{NewsItem, SourceKind};
use chrono::{DateTime, FixedOffset};
use once_cell::sync::Lazy;
use quick_xml::Reader;
use quick_xml::errors::IllFormedError;
use quick_xml::escape::{EscapeError, resolve_predefined_entity};
use quick_xml::events::{BytesRef, Event};
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument, warn};

/// Some feeds drop the seconds from their RFC 822 dates.
const SHORT_RFC822: &str = "%a, %d %b %Y %H:%M %z";

static ABSOLUTE_HTTPS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https://.*$").expect("static regex compiles"));

/// `<item>` children that make up a candidate. Names are matched with their
/// prefix, so `media:title` or `atom:link` never stand in for `title`/`link`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Guid,
    PubDate,
    Description,
}

impl Field {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Self::Title),
            b"link" => Some(Self::Link),
            b"guid" => Some(Self::Guid),
            b"pubDate" => Some(Self::PubDate),
            b"description" => Some(Self::Description),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct RawItem {
    title: String,
    link: String,
    guid: String,
    pub_date: String,
    description: String,
}

impl RawItem {
    fn slot(&mut self, field: Field) -> &mut String {
        match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Guid => &mut self.guid,
            Field::PubDate => &mut self.pub_date,
            Field::Description => &mut self.description,
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Collect the direct children of the first `<item>`.
///
/// The encoding comes from the XML declaration (UTF-8 when absent) and the
/// whole document is read, so malformed markup after the first item is
/// still an error.
fn first_item(raw: &[u8]) -> quick_xml::Result<Option<RawItem>> {
    let mut reader = Reader::from_reader(raw);
    let mut first: Option<RawItem> = None;
    let mut current: Option<RawItem> = None;
    let mut field: Option<Field> = None;
    // Open elements in the document, and inside the current item.
    let mut open = 0usize;
    let mut depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                open += 1;
                if current.is_some() {
                    depth += 1;
                    if depth == 1 {
                        field = Field::from_name(e.name().as_ref());
                    }
                } else if first.is_none() && e.name().as_ref() == b"item" {
                    current = Some(RawItem::default());
                }
            }
            Event::Empty(e) => {
                if current.is_none() && first.is_none() && e.name().as_ref() == b"item" {
                    first = Some(RawItem::default());
                }
            }
            Event::End(_) => {
                open = open.saturating_sub(1);
                if current.is_some() {
                    if depth == 0 {
                        first = current.take();
                    } else {
                        if depth == 1 {
                            field = None;
                        }
                        depth -= 1;
                    }
                }
            }
            Event::Text(e) => append(&mut current, depth, field, &e.decode()?),
            Event::CData(e) => append(&mut current, depth, field, &e.decode()?),
            Event::GeneralRef(e) => append(&mut current, depth, field, &resolve_reference(&e)?),
            Event::Eof => break,
            _ => {}
        }
    }

    if open > 0 {
        return Err(IllFormedError::MissingEndTag("document".to_string()).into());
    }
    Ok(first)
}

fn append(item: &mut Option<RawItem>, depth: usize, field: Option<Field>, text: &str) {
    if let (Some(item), 1, Some(field)) = (item.as_mut(), depth, field) {
        item.slot(field).push_str(text);
    }
}

/// Character references and the five predefined XML entities.
fn resolve_reference(reference: &BytesRef<'_>) -> quick_xml::Result<String> {
    if let Some(ch) = reference.resolve_char_ref()? {
        return Ok(ch.to_string());
    }
    let name = reference.decode()?;
    match resolve_predefined_entity(&name) {
        Some(value) => Ok(value.to_string()),
        None => Err(EscapeError::UnrecognizedEntity(0..name.len(), name.into_owned()).into()),
    }
}

#[derive(Debug)]
pub struct RssExtractor {
    image_selector: Selector,
}

impl RssExtractor {
    pub fn new(settings: &RssSettings) -> Result<Self, ConfigError> {
        let image_selector = Selector::parse(&settings.image_selector).map_err(|e| {
            ConfigError::InvalidSelector {
                name: "rss.image_selector",
                selector: settings.image_selector.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self { image_selector })
    }

    /// Build a candidate from the first item of a feed.
    pub fn extract(&self, raw: &[u8]) -> Result<NewsItem, ExtractError> {
        let item = first_item(raw)
            .map_err(|e| ExtractError::Parse(e.to_string()))?
            .ok_or(ExtractError::MissingField("item"))?;

        let raw_date = non_empty(item.pub_date).ok_or(ExtractError::MissingField("pubDate"))?;
        let guid = non_empty(item.guid).ok_or(ExtractError::MissingField("guid"))?;
        let published_at = parse_pub_date(&raw_date)?;

        let news = NewsItem {
            title: non_empty(item.title).unwrap_or_default(),
            description: non_empty(item.description)
                .map(|d| strip_markup(&d))
                .unwrap_or_default(),
            published_at,
            guid,
            link: non_empty(item.link).unwrap_or_default(),
            image_url: None,
            image_path: None,
            kind: SourceKind::Rss,
        };
        debug!(guid = %news.guid, published_at = %news.published_at, "Extracted first feed item");
        Ok(news)
    }

    /// Find the lead image url on an article page.
    ///
    /// Only the absolute `https://` tail of the `src` attribute is kept, which
    /// also unwraps resizing proxies that embed the real url.
    #[instrument(level = "info", skip(self, fetcher))]
    pub async fn locate_image<F: Fetch>(
        &self,
        fetcher: &F,
        link: &str,
    ) -> Result<String, ImageError> {
        let body = fetcher.fetch(link).await?;
        let page = Html::parse_document(&String::from_utf8_lossy(&body));

        let src = page
            .select(&self.image_selector)
            .next()
            .and_then(|img| img.value().attr("src"))
            .ok_or_else(|| ImageError::NotFound(link.to_string()))?;

        match ABSOLUTE_HTTPS.find(src) {
            Some(m) => {
                info!(image_url = %m.as_str(), "Located article image");
                Ok(m.as_str().to_string())
            }
            None => {
                warn!(%src, "Image src has no absolute https url");
                Err(ImageError::NotFound(link.to_string()))
            }
        }
    }
}

/// Parse an RFC 822 style date; the zone is mandatory.
pub fn parse_pub_date(raw: &str) -> Result<DateTime<FixedOffset>, ExtractError> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_str(raw, SHORT_RFC822))
        .map_err(|_| ExtractError::InvalidDate(raw.to_string()))
}
