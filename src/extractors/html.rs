//! Scraped-page strategy used by the fallback source.
//!
//! The page contract is a container of "news blocks". Blocks are walked in
//! order and the first conclusive one decides the outcome:
//!
//! - a block without a title ends the search with "not found";
//! - a block without a detail link is skipped;
//! - otherwise the block is chosen and its detail page is fetched for the
//!   description and publication time. A missing description ends the search
//!   with "not found" rather than moving on to the next block.
//!
//! When the detail page carries no usable time element the current instant is
//! used, so such items always look fresh.

use crate::config::{FallbackSettings, HtmlSelectors};
use crate::error::{ConfigError, ExtractError, FetchError};
use crate::fetcher::Fetch;
use crate::models::{NewsItem, SourceKind};
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

#[derive(Debug)]
struct Selectors {
    container: Selector,
    block: Selector,
    title: Selector,
    image: Selector,
    link: Selector,
    description: Selector,
    paragraph: Selector,
    date_container: Selector,
    time: Selector,
}

impl Selectors {
    fn compile(s: &HtmlSelectors) -> Result<Self, ConfigError> {
        Ok(Self {
            container: compile("container", &s.container)?,
            block: compile("block", &s.block)?,
            title: compile("title", &s.title)?,
            image: compile("image", &s.image)?,
            link: compile("link", &s.link)?,
            description: compile("description", &s.description)?,
            paragraph: compile("paragraph", &s.paragraph)?,
            date_container: compile("date_container", &s.date_container)?,
            time: compile("time", &s.time)?,
        })
    }
}

fn compile(name: &'static str, selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        name,
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// The block picked from the news page.
#[derive(Debug)]
struct Block {
    title: String,
    link: Url,
    image_url: Option<String>,
}

/// The fallback news page together with its DOM contract.
#[derive(Debug)]
pub struct HtmlExtractor {
    page_url: Url,
    selectors: Selectors,
    request_delay: Duration,
}

impl HtmlExtractor {
    pub fn new(settings: &FallbackSettings) -> Result<Self, ConfigError> {
        let raw = settings.url.as_deref().ok_or(ConfigError::MissingFallback)?;
        let page_url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            page_url,
            selectors: Selectors::compile(&settings.selectors)?,
            request_delay: settings.request_delay(),
        })
    }

    pub fn page_url(&self) -> &str {
        self.page_url.as_str()
    }

    /// GET a page of the scraped site, pausing first to stay polite.
    pub async fn fetch_page<F: Fetch>(&self, fetcher: &F, url: &str) -> Result<Vec<u8>, FetchError> {
        if !self.request_delay.is_zero() {
            sleep(self.request_delay).await;
        }
        let body = fetcher.fetch(url).await?;
        info!(%url, bytes = body.len(), "Fetched fallback page");
        Ok(body)
    }

    /// Build a candidate from the news page, following one detail link.
    ///
    /// `now` stands in for the publication time when the page has none.
    #[instrument(level = "info", skip_all, fields(page = %self.page_url))]
    pub async fn extract<F: Fetch>(
        &self,
        raw: &[u8],
        fetcher: &F,
        now: DateTime<Utc>,
    ) -> Result<Option<NewsItem>, ExtractError> {
        let Some(block) = self.first_block(&String::from_utf8_lossy(raw)) else {
            return Ok(None);
        };

        let detail = self.fetch_page(fetcher, block.link.as_str()).await?;
        let Some((description, published_at)) = self.read_detail(&String::from_utf8_lossy(&detail))
        else {
            return Ok(None);
        };

        let published_at = published_at.unwrap_or_else(|| {
            warn!(link = %block.link, "No publication time on detail page; using current time");
            now.fixed_offset()
        });

        let item = NewsItem {
            title: block.title,
            description,
            published_at,
            guid: block.link.to_string(),
            link: block.link.to_string(),
            image_url: block.image_url,
            image_path: None,
            kind: SourceKind::Html,
        };
        info!(title = %item.title, guid = %item.guid, "Extracted fallback item");
        Ok(Some(item))
    }

    fn first_block(&self, page: &str) -> Option<Block> {
        let document = Html::parse_document(page);
        let Some(container) = document.select(&self.selectors.container).next() else {
            warn!("No news container on fallback page");
            return None;
        };

        let mut saw_block = false;
        for (idx, block) in container.select(&self.selectors.block).enumerate() {
            saw_block = true;
            let idx = idx + 1;

            let Some(title) = select_text(block, &self.selectors.title) else {
                warn!(block = idx, "No title in news block");
                return None;
            };
            debug!(block = idx, %title, "Title found");

            let image_url = block
                .select(&self.selectors.image)
                .next()
                .and_then(|img| img.value().attr("src"))
                .and_then(|src| self.page_url.join(src).ok())
                .map(String::from);
            if image_url.is_none() {
                warn!(block = idx, "No image in news block");
            }

            let link = block
                .select(&self.selectors.link)
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| self.page_url.join(href).ok());
            let Some(link) = link else {
                warn!(block = idx, "No detail link in news block; trying next block");
                continue;
            };

            return Some(Block {
                title,
                link,
                image_url,
            });
        }

        if saw_block {
            warn!("No news block with a detail link");
        } else {
            warn!("No news blocks inside container");
        }
        None
    }

    /// Description paragraphs and publication time of a detail page.
    fn read_detail(&self, page: &str) -> Option<(String, Option<DateTime<FixedOffset>>)> {
        let document = Html::parse_document(page);
        let Some(body) = document.select(&self.selectors.description).next() else {
            warn!("No description block on detail page");
            return None;
        };

        let paragraphs: Vec<String> = body
            .select(&self.selectors.paragraph)
            .map(|p| p.text().collect::<String>().trim().to_string())
            .collect();
        if paragraphs.is_empty() {
            warn!("Description block has no paragraphs");
            return None;
        }
        let description = paragraphs.iter().join("\n");

        let published_at = document
            .select(&self.selectors.date_container)
            .next()
            .and_then(|c| c.select(&self.selectors.time).next())
            .and_then(|t| t.value().attr("datetime"))
            .and_then(|raw| {
                let parsed = parse_datetime_attr(raw);
                if parsed.is_none() {
                    warn!(%raw, "Unparseable datetime attribute");
                }
                parsed
            });

        Some((description, published_at))
    }
}

fn select_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// ISO 8601 timestamp; values without an offset are taken as UTC.
pub fn parse_datetime_attr(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc().fixed_offset())
}

#[cfg(test)]
pub(crate) mod pages {
    /// News page with one block whose detail page is `/news/museum`.
    pub fn news_page(blocks: &str) -> String {
        format!(
            r#"<html><body>
            <div class="H6jWj commercial-branding">{blocks}</div>
            </body></html>"#
        )
    }

    pub fn block(title: Option<&str>, href: Option<&str>) -> String {
        let title = title
            .map(|t| format!(r#"<div class="NS1jn"><div class="PtPn1"> {t} </div></div>"#))
            .unwrap_or_default();
        let link = href
            .map(|h| format!(r#"<a class="dnRo0" href="{h}">more</a>"#))
            .unwrap_or_default();
        format!(
            r#"<div class="VxecQ" data-travel_media-desktop="top_news_block_1">
                {title}
                <div class="Q0hlD"><img class="PNvWC" src="/img/lead.png"></div>
                {link}
            </div>"#
        )
    }

    pub fn detail_page(paragraphs: &[&str], datetime: Option<&str>) -> String {
        let body: String = paragraphs.iter().map(|p| format!("<p> {p} </p>")).collect();
        let time = datetime
            .map(|d| format!(r#"<div class="kqSy_"><time datetime="{d}">then</time></div>"#))
            .unwrap_or_default();
        format!(
            r#"<html><body>{time}<div class="WSusQ fontSize_0">{body}</div></body></html>"#
        )
    }
}
