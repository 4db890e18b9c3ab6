//! Pseudo-random choice of the next candidate feed.

use crate::error::ConfigError;
use crate::models::SourcePool;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Picks (source, endpoint) pairs uniformly from a pool.
///
/// The random source is owned here so a fixed seed replays the exact same
/// sequence of picks.
#[derive(Debug)]
pub struct SourceSelector {
    rng: StdRng,
}

impl SourceSelector {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng }
    }

    /// Choose one endpoint of the pool and build its full url.
    pub fn pick(&mut self, pool: &SourcePool) -> Result<String, ConfigError> {
        let pairs: Vec<_> = pool
            .sources
            .iter()
            .flat_map(|s| s.endpoints.iter().map(move |e| (s, e)))
            .collect();
        if pairs.is_empty() {
            return Err(ConfigError::EmptyPool(pool.name.clone()));
        }

        let (source, endpoint) = pairs[self.rng.random_range(0..pairs.len())];
        let url = join_url(&source.base_url, endpoint);
        debug!(pool = %pool.name, source = %source.name, %url, "Picked candidate");
        Ok(url)
    }
}

/// Join a base url and an endpoint with exactly one slash between them.
pub fn join_url(base: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}
