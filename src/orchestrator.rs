//! Retry and fallback state machine driving one selection run.
//!
//! ```text
//! SelectingPrimary ──accept──────────────────────────────▶ Accepted
//!   │  ▲
//!   │  └── reject/fail while attempt <= budget
//!   │      (next primary pool starts with a fresh counter)
//!   ▼
//! PrimaryExhausted ─▶ TrySecondary ──accept──────────────▶ Accepted
//!                          └──────── reject/fail ────────▶ Rejected
//! ```
//!
//! The budget of a pool is its endpoint count, and a pool is left only after
//! strictly more attempts than that. The counter carries over as one when the
//! next pool takes over, so every later pool gets one fetch per endpoint. The fallback page is consulted at most
//! once per run. `Rejected` is a normal ending ("no fresh news today"); only
//! configuration problems abort selection.

use crate::config::{FallbackSettings, Settings};
use crate::error::{ConfigError, ExtractError, RunError};
use crate::extractors::html::HtmlExtractor;
use crate::extractors::rss::RssExtractor;
use crate::fetcher::Fetch;
use crate::filter::{Clock, NoveltyFilter, Verdict};
use crate::image::ImageRetriever;
use crate::models::{NewsItem, PublicationRecord, SourceKind, SourcePool};
use crate::publisher::Publisher;
use crate::selector::SourceSelector;
use crate::state::StateStore;
use tracing::{error, info, instrument, warn};

/// Result of a run that did not hit a fatal error.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Accepted(NewsItem),
    NoFreshNews,
}

#[derive(Debug)]
enum State {
    SelectingPrimary,
    PrimaryExhausted,
    TrySecondary,
    Accepted(NewsItem),
    Rejected,
}

/// Per-run bookkeeping of the primary pools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptContext {
    pub pool_index: usize,
    pub attempt: usize,
    pub pool_size: usize,
    pub exhausted: bool,
}

impl AttemptContext {
    fn new(pool: &SourcePool) -> Self {
        Self {
            pool_index: 0,
            attempt: 0,
            pool_size: pool.size(),
            exhausted: false,
        }
    }

    fn budget_left(&self) -> bool {
        self.attempt <= self.pool_size
    }

    /// Later pools start counting at one, so they get exactly one fetch per
    /// endpoint while the first pool gets one extra.
    fn advance(&mut self, index: usize, pool: &SourcePool) {
        self.pool_index = index;
        self.attempt = 1;
        self.pool_size = pool.size();
    }
}

pub struct Orchestrator<'a, F, S, C, P> {
    fetcher: &'a F,
    store: &'a S,
    clock: &'a C,
    publisher: &'a P,
    pools: Vec<SourcePool>,
    selector: SourceSelector,
    rss: RssExtractor,
    filter: NoveltyFilter,
    images: ImageRetriever,
    fallback_settings: FallbackSettings,
    fallback: Option<HtmlExtractor>,
}

impl<'a, F, S, C, P> Orchestrator<'a, F, S, C, P>
where
    F: Fetch,
    S: StateStore,
    C: Clock,
    P: Publisher,
{
    pub fn new(
        settings: &Settings,
        fetcher: &'a F,
        store: &'a S,
        clock: &'a C,
        publisher: &'a P,
    ) -> Result<Self, ConfigError> {
        let pools = settings.primary_pools()?;
        if pools.is_empty() {
            return Err(ConfigError::NoPrimaryPool);
        }
        Ok(Self {
            fetcher,
            store,
            clock,
            publisher,
            pools,
            selector: SourceSelector::new(settings.selection.seed),
            rss: RssExtractor::new(&settings.rss)?,
            filter: NoveltyFilter::new(settings.news_age_limit_days()),
            images: ImageRetriever::new(&settings.image),
            fallback_settings: settings.fallback.clone(),
            fallback: None,
        })
    }

    /// Select, announce and record one item.
    ///
    /// The record is saved only after the publisher accepted the item, and
    /// the transient image is removed afterwards.
    #[instrument(level = "info", skip_all)]
    pub async fn run(&mut self) -> Result<Outcome, RunError> {
        let Outcome::Accepted(item) = self.select().await? else {
            warn!(outcome = "no_fresh_news", "No fresh news today; nothing published");
            return Ok(Outcome::NoFreshNews);
        };
        let item = self.publish(item).await?;
        info!(outcome = "published", guid = %item.guid, kind = %item.kind, "News published");
        Ok(Outcome::Accepted(item))
    }

    /// Walk the state machine until an item is accepted or every source is spent.
    pub async fn select(&mut self) -> Result<Outcome, ConfigError> {
        let persisted = self.store.load().await;
        let mut ctx = AttemptContext::new(&self.pools[0]);
        let mut state = State::SelectingPrimary;

        loop {
            state = match state {
                State::SelectingPrimary => self.try_primary(&mut ctx, persisted.as_ref()).await?,
                State::PrimaryExhausted => {
                    warn!(
                        pools = self.pools.len(),
                        attempts = ctx.attempt,
                        exhausted = ctx.exhausted,
                        "Primary pools exhausted; trying fallback source"
                    );
                    State::TrySecondary
                }
                State::TrySecondary => self.try_secondary(persisted.as_ref()).await?,
                State::Accepted(item) => return Ok(Outcome::Accepted(item)),
                State::Rejected => return Ok(Outcome::NoFreshNews),
            };
        }
    }

    async fn try_primary(
        &mut self,
        ctx: &mut AttemptContext,
        persisted: Option<&PublicationRecord>,
    ) -> Result<State, ConfigError> {
        let pool = &self.pools[ctx.pool_index];
        ctx.attempt += 1;
        let url = self.selector.pick(pool)?;
        info!(
            pool = %pool.name,
            attempt = ctx.attempt,
            budget = ctx.pool_size,
            %url,
            "Trying feed candidate"
        );

        let candidate = match self.fetcher.fetch(&url).await {
            Ok(raw) => self.rss.extract(&raw),
            Err(e) => Err(ExtractError::from(e)),
        };
        match candidate {
            Ok(item) => {
                let verdict = self.filter.evaluate(&item, persisted, self.clock.now());
                if verdict.is_accepted() {
                    info!(guid = %item.guid, title = %item.title, "News approved");
                    return Ok(State::Accepted(item));
                }
                log_rejection(&item, verdict);
            }
            Err(e) => warn!(%url, error = %e, "Feed candidate failed"),
        }

        if ctx.budget_left() {
            return Ok(State::SelectingPrimary);
        }

        ctx.exhausted = true;
        let next = ctx.pool_index + 1;
        match self.pools.get(next) {
            Some(pool) => {
                info!(from = %self.pools[ctx.pool_index].name, to = %pool.name, "Switching source pool");
                ctx.advance(next, pool);
                ctx.exhausted = false;
                Ok(State::SelectingPrimary)
            }
            None => Ok(State::PrimaryExhausted),
        }
    }

    async fn try_secondary(
        &mut self,
        persisted: Option<&PublicationRecord>,
    ) -> Result<State, ConfigError> {
        if self.fallback.is_none() {
            let built = HtmlExtractor::new(&self.fallback_settings)?;
            info!(page = %built.page_url(), "Built fallback source");
            self.fallback = Some(built);
        }
        let Some(html) = self.fallback.as_ref() else {
            return Err(ConfigError::MissingFallback);
        };

        let fetcher = self.fetcher;
        let now = self.clock.now();
        let candidate = match html.fetch_page(fetcher, html.page_url()).await {
            Ok(raw) => html.extract(&raw, fetcher, now).await,
            Err(e) => Err(ExtractError::from(e)),
        };

        match candidate {
            Ok(Some(item)) => {
                let verdict = self.filter.evaluate(&item, persisted, now);
                if verdict.is_accepted() {
                    info!(guid = %item.guid, title = %item.title, "News from fallback source approved");
                    return Ok(State::Accepted(item));
                }
                log_rejection(&item, verdict);
            }
            Ok(None) => warn!("Fallback page offered no usable news block"),
            Err(e) => warn!(error = %e, "Fallback candidate failed"),
        }
        warn!("No news from the fallback source either");
        Ok(State::Rejected)
    }

    async fn publish(&self, mut item: NewsItem) -> Result<NewsItem, RunError> {
        self.resolve_image(&mut item).await;

        if let Err(e) = self.publisher.post(&item).await {
            error!(guid = %item.guid, error = %e, "Publishing failed; state left untouched");
            self.discard_image(&item).await;
            return Err(e.into());
        }

        if let Err(e) = self.store.save(&PublicationRecord::from(&item)).await {
            error!(guid = %item.guid, error = %e, "Item published but state could not be saved");
            self.discard_image(&item).await;
            return Err(e.into());
        }

        self.discard_image(&item).await;
        Ok(item)
    }

    /// Fill `image_url`/`image_path`. Missing images never block publishing.
    async fn resolve_image(&self, item: &mut NewsItem) {
        if item.image_url.is_none() && item.kind == SourceKind::Rss && !item.link.is_empty() {
            match self.rss.locate_image(self.fetcher, &item.link).await {
                Ok(url) => item.image_url = Some(url),
                Err(e) => warn!(link = %item.link, error = %e, "No image found on the article page"),
            }
        }
        item.image_path = match item.image_url.as_deref() {
            Some(url) => self.images.retrieve(self.fetcher, url).await,
            None => None,
        };
        if item.image_path.is_none() {
            warn!(guid = %item.guid, "Publishing without image");
        }
    }

    async fn discard_image(&self, item: &NewsItem) {
        if let Some(path) = &item.image_path {
            self.images.discard(path).await;
        }
    }
}

fn log_rejection(item: &NewsItem, verdict: Verdict) {
    match verdict {
        Verdict::Stale { age_days } => {
            info!(guid = %item.guid, age_days, published_at = %item.published_at, "News too old")
        }
        Verdict::Duplicate => warn!(guid = %item.guid, "This news was published before"),
        Verdict::Accept => {}
    }
}
