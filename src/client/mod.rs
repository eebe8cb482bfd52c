//! Cached, instrumented SRV resolution.

use crate::{
    reporter::{NoopReporter, Reporter},
    resolver::SrvResolver,
    Endpoint,
};
use std::{
    fmt::{self, Debug},
    sync::Arc,
    time::{Duration, Instant},
};

mod cache;
pub use cache::Cache;
use cache::CacheMap;

/// Default bound on a single SRV lookup.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors encountered by a [`ServiceResolver`].
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError<Lookup: Debug> {
    /// SRV lookup errors
    #[error("SRV lookup error: {0}")]
    Lookup(#[source] Lookup),
    /// The lookup did not complete within the configured timeout
    #[error("SRV lookup timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    /// The lookup succeeded but produced no records
    #[error("no SRV records found for {0}")]
    Empty(String),
}

/// How long a successful lookup may be served from the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheTtl {
    /// Serve cached results until they are invalidated, or evicted by a
    /// failed lookup that could not fall back to them.
    #[default]
    UntilInvalidated,
    /// Honour the TTL of the DNS answer.
    Record,
    /// Serve cached results for a fixed duration after they were fetched.
    Fixed(Duration),
}

impl CacheTtl {
    fn deadline(self, fetched_at: Instant, record_valid_until: Instant) -> Option<Instant> {
        match self {
            CacheTtl::UntilInvalidated => None,
            CacheTtl::Record => Some(record_valid_until),
            CacheTtl::Fixed(ttl) => fetched_at.checked_add(ttl),
        }
    }
}

/// Resolves services located by SRV records into ordered [`Endpoint`]s.
///
/// # Usage
///
/// A [`ServiceResolver`] is created once around a [`SrvResolver`] backend with
/// [`ServiceResolver::new`], configured with its consuming setters and then
/// shared between every caller of [`resolve`], so that they all benefit from
/// its cache.
///
/// ## Caching
///
/// With [`caching_lookups`] enabled, a valid cached result is returned without
/// touching the network. How long a result stays valid is set by
/// [`cache_ttl`].
///
/// ## Retention
///
/// With [`retaining_data_on_failures`] enabled, a lookup that fails or comes
/// back empty falls back to the last successful result for the same service,
/// as long as it is not older than [`retention`].
///
/// ## Reporting
///
/// Every call to [`resolve`] is timed by the configured [`Reporter`], which is
/// also told about failed and empty lookups, including those answered from
/// retained data.
///
/// [`resolve`]: ServiceResolver::resolve()
/// [`caching_lookups`]: ServiceResolver::caching_lookups()
/// [`cache_ttl`]: ServiceResolver::cache_ttl()
/// [`retaining_data_on_failures`]: ServiceResolver::retaining_data_on_failures()
/// [`retention`]: ServiceResolver::retention()
pub struct ServiceResolver<Resolver> {
    resolver: Resolver,
    caching_lookups: bool,
    retaining_data_on_failures: bool,
    lookup_timeout: Duration,
    cache_ttl: CacheTtl,
    retention: Option<Duration>,
    reporter: Arc<dyn Reporter>,
    cache: CacheMap<Endpoint>,
}

impl<Resolver: Default> Default for ServiceResolver<Resolver> {
    fn default() -> Self {
        Self::new(Resolver::default())
    }
}

impl<Resolver> ServiceResolver<Resolver> {
    /// Creates a resolver that looks up SRV records with `resolver`, without
    /// caching, retention or reporting.
    pub fn new(resolver: Resolver) -> Self {
        Self {
            resolver,
            caching_lookups: false,
            retaining_data_on_failures: false,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            cache_ttl: CacheTtl::default(),
            retention: None,
            reporter: Arc::new(NoopReporter),
            cache: Default::default(),
        }
    }

    /// Sets whether successful lookups are cached and served from the cache.
    pub fn caching_lookups(self, caching_lookups: bool) -> Self {
        Self {
            caching_lookups,
            ..self
        }
    }

    /// Sets whether failed lookups fall back to the last successful result.
    pub fn retaining_data_on_failures(self, retaining_data_on_failures: bool) -> Self {
        Self {
            retaining_data_on_failures,
            ..self
        }
    }

    /// Sets the bound on a single SRV lookup.
    pub fn lookup_timeout(self, lookup_timeout: Duration) -> Self {
        Self {
            lookup_timeout,
            ..self
        }
    }

    /// Sets how long cached results are served.
    pub fn cache_ttl(self, cache_ttl: CacheTtl) -> Self {
        Self { cache_ttl, ..self }
    }

    /// Sets the maximum age of retained data served after a failure.
    /// `None` retains data indefinitely.
    pub fn retention(self, retention: Option<Duration>) -> Self {
        Self { retention, ..self }
    }

    /// Sets the reporter notified about lookups.
    pub fn reporter(self, reporter: impl Reporter + 'static) -> Self {
        Self {
            reporter: Arc::new(reporter),
            ..self
        }
    }

    /// Gets the endpoints stored for `srv`, whether or not they are still valid.
    pub fn cached(&self, srv: &str) -> Option<Vec<Endpoint>> {
        self.cache.get(srv).map(|cache| cache.items().to_vec())
    }

    /// Forgets the stored result for `srv`. Returns whether there was one.
    pub fn invalidate(&self, srv: &str) -> bool {
        self.cache.remove(srv)
    }

    /// Forgets every stored result.
    pub fn invalidate_all(&self) {
        self.cache.clear();
    }

    fn stores_results(&self) -> bool {
        self.caching_lookups || self.retaining_data_on_failures
    }

    fn retainable(&self, cache: &Cache<Endpoint>) -> bool {
        self.retention.map_or(true, |max_age| cache.age() <= max_age)
    }
}

impl<Resolver: SrvResolver> ServiceResolver<Resolver> {
    /// Resolves `srv` into endpoints ordered by priority and weight.
    ///
    /// The returned list is never empty.
    pub async fn resolve(&self, srv: &str) -> Result<Vec<Endpoint>, ResolutionError<Resolver::Error>> {
        let timer = self.reporter.on_lookup_start();
        let result = self.resolve_timed(srv).await;
        timer.stop();
        result
    }

    async fn resolve_timed(&self, srv: &str) -> Result<Vec<Endpoint>, ResolutionError<Resolver::Error>> {
        if self.caching_lookups {
            if let Some(cache) = self.cache.get(srv).filter(|cache| cache.valid()) {
                #[cfg(feature = "log")]
                tracing::trace!(srv, "Serving SRV records from cache");
                return Ok(cache.items().to_vec());
            }
        }

        let error = match self.lookup(srv).await {
            Ok((endpoints, valid_until)) if !endpoints.is_empty() => {
                if self.stores_results() {
                    let now = Instant::now();
                    let deadline = self.cache_ttl.deadline(now, valid_until);
                    self.cache.insert(srv, Cache::new(endpoints.clone(), now, deadline));
                }
                return Ok(endpoints);
            }
            Ok(_) => {
                self.reporter.on_empty();
                ResolutionError::Empty(srv.to_owned())
            }
            Err(error) => {
                self.reporter.on_failure(&error);
                error
            }
        };

        if self.retaining_data_on_failures {
            if let Some(cache) = self.cache.get(srv).filter(|cache| self.retainable(cache)) {
                #[cfg(feature = "log")]
                tracing::debug!(srv, %error, "Serving retained SRV records after failed lookup");
                return Ok(cache.items().to_vec());
            }
        }

        if self.cache.remove(srv) {
            #[cfg(feature = "log")]
            tracing::debug!(srv, "Evicted cached SRV records after failed lookup");
        }
        Err(error)
    }

    /// Performs one bounded lookup against the backend.
    async fn lookup(
        &self,
        srv: &str,
    ) -> Result<(Vec<Endpoint>, Instant), ResolutionError<Resolver::Error>> {
        match tokio::time::timeout(self.lookup_timeout, self.resolver.get_srv_records(srv)).await {
            Ok(Ok((records, valid_until))) => {
                let endpoints = records
                    .iter()
                    .map(|record| Endpoint::from_record(record))
                    .collect();
                Ok((endpoints, valid_until))
            }
            Ok(Err(error)) => Err(ResolutionError::Lookup(error)),
            Err(_) => Err(ResolutionError::Timeout(self.lookup_timeout)),
        }
    }
}

impl<Resolver: Debug> Debug for ServiceResolver<Resolver> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceResolver")
            .field("resolver", &self.resolver)
            .field("caching_lookups", &self.caching_lookups)
            .field("retaining_data_on_failures", &self.retaining_data_on_failures)
            .field("lookup_timeout", &self.lookup_timeout)
            .field("cache_ttl", &self.cache_ttl)
            .field("retention", &self.retention)
            .finish_non_exhaustive()
    }
}
