//! The four detail caches, built once at startup and passed around by reference

use tracing::info;

use crate::cache::{
    CacheKey, DetailCache, DetailFetcher, EntityKind, FetchCoordinator, KeyError, ResolveError,
    SharedClock,
};
use crate::config::CacheConfig;
use crate::data::{DetailRecord, MovieDetail, PersonDetail, SeasonDetail, ShowDetail};

/// One fetch coordinator per detail kind
pub struct DetailServices {
    pub shows: FetchCoordinator<ShowDetail>,
    pub seasons: FetchCoordinator<SeasonDetail>,
    pub movies: FetchCoordinator<MovieDetail>,
    pub people: FetchCoordinator<PersonDetail>,
}

fn coordinator<V: DetailRecord>(config: &CacheConfig, clock: &SharedClock) -> FetchCoordinator<V> {
    FetchCoordinator::new(DetailCache::open(V::KIND, config, clock.clone()))
}

impl DetailServices {
    /// Opens all four caches
    ///
    /// Caches whose disk tier cannot be opened run memory-only; this never fails.
    pub fn open(config: &CacheConfig, clock: SharedClock) -> Self {
        let services = Self {
            shows: coordinator(config, &clock),
            seasons: coordinator(config, &clock),
            movies: coordinator(config, &clock),
            people: coordinator(config, &clock),
        };

        info!(
            disk = services.movies.cache().has_disk(),
            count_limit = config.count_limit,
            ttl_minutes = config.ttl.num_minutes(),
            "detail caches ready"
        );
        services
    }

    pub async fn show(&self, id: u64, fetcher: &dyn DetailFetcher) -> Result<ShowDetail, ResolveError> {
        self.shows.resolve_with(&CacheKey::show(id), fetcher).await
    }

    pub async fn season(
        &self,
        tv_id: u64,
        season_number: u32,
        fetcher: &dyn DetailFetcher,
    ) -> Result<SeasonDetail, ResolveError> {
        self.seasons
            .resolve_with(&CacheKey::season(tv_id, season_number), fetcher)
            .await
    }

    pub async fn movie(&self, id: u64, fetcher: &dyn DetailFetcher) -> Result<MovieDetail, ResolveError> {
        self.movies.resolve_with(&CacheKey::movie(id), fetcher).await
    }

    pub async fn person(&self, id: u64, fetcher: &dyn DetailFetcher) -> Result<PersonDetail, ResolveError> {
        self.people.resolve_with(&CacheKey::person(id), fetcher).await
    }

    /// Removes a key from whichever cache its prefix names
    pub fn invalidate(&self, key: &str) -> Result<(), KeyError> {
        let key: CacheKey = key.parse()?;
        match key.kind() {
            EntityKind::Show => self.shows.cache().invalidate(&key),
            EntityKind::Season => self.seasons.cache().invalidate(&key),
            EntityKind::Movie => self.movies.cache().invalidate(&key),
            EntityKind::Person => self.people.cache().invalidate(&key),
        }
        Ok(())
    }

    /// Empties every cache, memory and disk
    pub fn clear_all(&self) {
        self.shows.cache().clear();
        self.seasons.cache().clear();
        self.movies.cache().clear();
        self.people.cache().clear();
    }

    /// Drops expired entries everywhere, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        self.shows.cache().purge_expired()
            + self.seasons.cache().purge_expired()
            + self.movies.cache().purge_expired()
            + self.people.cache().purge_expired()
    }
}
