//! EditalSearch - the search service callers talk to.
//!
//! Pipeline: filter → [`QueryCompiler`] → store query (predicate, filters,
//! order, page) → relevance re-check → excerpts and highlights.
//!
//! Async Cancellation Architecture:
//! Store work runs on `spawn_blocking` threads. Each request owns a
//! CancellationToken guarded by a DropGuard, so dropping the future cancels
//! it; the blocking side checks the token between stages and interrupts the
//! running SQLite statement. [`SearchSession`] builds last-request-wins on top
//! of this by cancelling the previous token whenever a new search starts.

use crate::config::SearchConfig;
use crate::database::{Database, DistinctField, EditalQuery};
use crate::highlight::highlight_with;
use crate::interface::{SearchError, SearchFilter, SearchPage};
use crate::matcher::KeywordMatcher;
use crate::models::Edital;
use crate::query::{PredicateSet, QueryCompiler};
use crate::relevance::{post_process_with, searched_fields};
use crate::variations::VariationGenerator;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Global fallback Tokio runtime for when async functions are called outside any runtime context.
/// Shared across all instances and never dropped.
static FALLBACK_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create fallback tokio runtime")
});

/// RAII guard that cancels a token when dropped.
struct DropGuard {
    token: CancellationToken,
}

impl DropGuard {
    fn new(token: CancellationToken) -> Self {
        Self { token }
    }
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Thread-safe search service over a [`Database`].
///
/// Concurrency Model:
/// - Database uses r2d2 connection pool (concurrent reads, no mutex blocking)
/// - Search is async with cancellation support via CancellationToken
/// - Blocking work runs on tokio::spawn_blocking threads
/// - Uses global FALLBACK_RUNTIME when called outside any runtime
#[derive(Clone)]
pub struct EditalSearch {
    db: Arc<Database>,
    config: Arc<SearchConfig>,
    generator: Arc<VariationGenerator>,
    compiler: Arc<QueryCompiler>,
}

impl EditalSearch {
    pub fn from_database(db: Database, config: SearchConfig) -> Self {
        let generator = VariationGenerator::new(config.dictionary.clone());
        let compiler = QueryCompiler::new(generator.clone(), searched_fields(&config));
        Self {
            db: Arc::new(db),
            config: Arc::new(config),
            generator: Arc::new(generator),
            compiler: Arc::new(compiler),
        }
    }

    /// Open (or create) the store at `path`
    pub fn open<P: AsRef<Path>>(path: P, config: SearchConfig) -> Result<Self, SearchError> {
        let db = Database::open(path)?;
        Ok(Self::from_database(db, config))
    }

    pub fn in_memory(config: SearchConfig) -> Result<Self, SearchError> {
        let db = Database::open_in_memory()?;
        Ok(Self::from_database(db, config))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Store predicate for a filter's keywords
    pub fn compile(&self, filter: &SearchFilter) -> PredicateSet {
        self.compiler.compile_search(filter)
    }

    /// The matcher used for both relevance and highlighting of `filter`
    pub fn matcher(&self, filter: &SearchFilter) -> KeywordMatcher {
        KeywordMatcher::new(&self.generator, &filter.keyword_list(), filter.smart_search)
    }

    pub fn insert_editais(&self, editais: &[Edital]) -> Result<usize, SearchError> {
        Ok(self.db.insert_many(editais)?)
    }

    /// Sorted option list for a filter control
    pub fn options(&self, field: DistinctField, state: Option<&str>) -> Result<Vec<String>, SearchError> {
        Ok(self.db.distinct_values(field, state)?)
    }

    /// HTML for `text` with the filter's keywords marked, using the configured palette
    pub fn render_highlighted(&self, text: &str, filter: &SearchFilter) -> String {
        let matcher = self.matcher(filter);
        highlight_with(&matcher, text, self.config.palette.len()).to_html(&self.config.palette)
    }

    /// Get a tokio runtime handle - uses current runtime if available, otherwise global fallback
    fn runtime_handle(&self) -> tokio::runtime::Handle {
        tokio::runtime::Handle::try_current().unwrap_or_else(|_| FALLBACK_RUNTIME.handle().clone())
    }

    fn search_sync(
        &self,
        filter: &SearchFilter,
        page: u32,
        token: &CancellationToken,
        runtime: &tokio::runtime::Handle,
    ) -> Result<SearchPage, SearchError> {
        if token.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        let page_size = self.config.page_size;
        let predicates = self.compile(filter);
        debug!(
            conditions = predicates.conditions().len(),
            unfiltered = predicates.is_unfiltered(),
            page,
            "compiled search"
        );

        let query = EditalQuery::from_filter(filter, predicates, page, page_size);
        let (rows, total_count) = self
            .db
            .query_editais_interruptible(&query, token, runtime)?
            .ok_or(SearchError::Cancelled)?;

        if token.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        let fetched = rows.len();
        let matcher = self.matcher(filter);
        let items = post_process_with(rows, &matcher, &self.config, &|| token.is_cancelled())
            .ok_or(SearchError::Cancelled)?;
        debug!(fetched, kept = items.len(), total_count, "search finished");

        Ok(SearchPage {
            items,
            total_count,
            page,
            page_size,
        })
    }

    /// One page of results for `filter`. `page` is 1-based; 0 reads as 1.
    ///
    /// A filter with no active criterion yields an empty page without
    /// touching the store. Dropping the returned future cancels the search.
    pub async fn search(&self, filter: SearchFilter, page: u32) -> Result<SearchPage, SearchError> {
        self.search_with_token(filter, page, CancellationToken::new()).await
    }

    pub(crate) async fn search_with_token(
        &self,
        filter: SearchFilter,
        page: u32,
        token: CancellationToken,
    ) -> Result<SearchPage, SearchError> {
        let page = page.max(1);
        if !filter.is_active() {
            debug!("inactive filter, skipping store");
            return Ok(SearchPage::empty(page, self.config.page_size));
        }

        let _guard = DropGuard::new(token.clone());

        // runtime.spawn_blocking() rather than tokio::task::spawn_blocking(),
        // callers may not be inside a tokio runtime
        let runtime = self.runtime_handle();
        let runtime_for_closure = runtime.clone();
        let this = self.clone();
        let token_clone = token.clone();

        let handle = runtime.spawn_blocking(move || {
            this.search_sync(&filter, page, &token_clone, &runtime_for_closure)
        });

        match handle.await {
            Ok(result) => {
                if matches!(result, Err(SearchError::Cancelled)) {
                    debug!("search cancelled");
                }
                result
            }
            Err(join_error) => {
                warn!(%join_error, "search task did not complete");
                Err(SearchError::Cancelled)
            }
        }
    }
}

/// Result pages keyed by the exact request.
#[derive(Default)]
struct SessionState {
    /// Bumped on every request; a completion from an older generation is stale.
    generation: u64,
    in_flight: Option<CancellationToken>,
    cache: HashMap<(SearchFilter, u32), SearchPage>,
    /// Insertion order for eviction.
    order: VecDeque<(SearchFilter, u32)>,
}

impl SessionState {
    fn supersede(&mut self) -> u64 {
        self.generation += 1;
        if let Some(previous) = self.in_flight.take() {
            previous.cancel();
            debug!("cancelled superseded search");
        }
        self.generation
    }

    fn remember(&mut self, key: (SearchFilter, u32), page: SearchPage, capacity: usize) {
        if capacity == 0 {
            return;
        }
        if self.cache.insert(key.clone(), page).is_none() {
            self.order.push_back(key);
        }
        while self.order.len() > capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.cache.remove(&oldest);
            }
        }
    }
}

/// Last-request-wins front end for one user's search box.
///
/// Starting a search cancels the one in flight, and a result that arrives
/// after a newer request started is discarded as [`SearchError::Cancelled`].
/// Identical `(filter, page)` requests are answered from a bounded cache.
pub struct SearchSession {
    search: EditalSearch,
    state: Mutex<SessionState>,
}

impl SearchSession {
    pub fn new(search: EditalSearch) -> Self {
        Self {
            search,
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn service(&self) -> &EditalSearch {
        &self.search
    }

    pub async fn search(&self, filter: SearchFilter, page: u32) -> Result<SearchPage, SearchError> {
        let key = (filter.clone(), page.max(1));

        let (generation, token) = {
            let mut state = self.state.lock();
            let cached = state.cache.get(&key).cloned();
            let generation = state.supersede();
            if let Some(hit) = cached {
                debug!(page = key.1, "served from session cache");
                return Ok(hit);
            }
            let token = CancellationToken::new();
            state.in_flight = Some(token.clone());
            (generation, token)
        };

        let result = self.search.search_with_token(filter, key.1, token).await;

        let mut state = self.state.lock();
        if state.generation != generation {
            debug!("discarding stale search result");
            return Err(SearchError::Cancelled);
        }
        state.in_flight = None;

        let page = result?;
        let capacity = self.search.config.cache_capacity;
        state.remember(key, page.clone(), capacity);
        Ok(page)
    }

    /// Drop cached pages, e.g. after the store changed.
    pub fn invalidate(&self) {
        let mut state = self.state.lock();
        state.cache.clear();
        state.order.clear();
        info!("session cache cleared");
    }

    pub fn cached_pages(&self) -> usize {
        self.state.lock().cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::demo_editais;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    fn demo_search() -> EditalSearch {
        let search = EditalSearch::in_memory(SearchConfig::default()).unwrap();
        search.insert_editais(&demo_editais()).unwrap();
        search
    }

    fn keywords(raw: &str) -> SearchFilter {
        SearchFilter {
            keywords: raw.to_string(),
            smart_search: true,
            ..Default::default()
        }
    }

    fn ids(page: &SearchPage) -> Vec<&str> {
        page.items.iter().map(|m| m.edital.id.as_str()).collect()
    }

    #[test]
    fn test_search_creation() {
        let search = EditalSearch::in_memory(SearchConfig::default()).unwrap();
        assert_eq!(search.database().count().unwrap(), 0);
        assert_eq!(search.config().page_size, 20);
    }

    #[tokio::test]
    async fn test_inactive_filter_returns_empty_page() {
        let search = demo_search();
        let page = search.search(SearchFilter { smart_search: true, ..Default::default() }, 1).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total_count, 0);
        assert_eq!(page.page, 1);
    }

    #[tokio::test]
    async fn test_keyword_search_returns_highlighted_matches() {
        let search = demo_search();
        let page = search.search(keywords("ração"), 1).await.unwrap();
        assert_eq!(ids(&page), vec!["ed-0005"]);
        let data = &page.items[0].match_data;
        assert_eq!(data.highlights.len(), 1);
        assert!(data.text.starts_with("Ração"));
    }

    #[tokio::test]
    async fn test_search_combines_keywords_and_filters() {
        let search = demo_search();
        let filter = SearchFilter { states: vec!["SP".into()], ..keywords("hospitalar") };
        let page = search.search(filter, 1).await.unwrap();
        assert!(!page.items.is_empty());
        assert!(page.items.iter().all(|m| m.edital.unidade.uf_sigla.as_deref() == Some("SP")));
        assert!(ids(&page).contains(&"ed-0002"));
    }

    #[tokio::test]
    async fn test_options() {
        let search = demo_search();
        let states = search.options(DistinctField::State, None).unwrap();
        assert!(states.contains(&"SP".to_string()));
        let mut sorted = states.clone();
        sorted.sort();
        assert_eq!(states, sorted);

        let cities = search.options(DistinctField::City, Some("SP")).unwrap();
        assert_eq!(cities, vec!["Campinas", "Ribeirão Preto", "São Paulo"]);
    }

    #[test]
    fn test_render_highlighted_uses_configured_palette() {
        let config = SearchConfig { palette: vec!["hl".into()], ..Default::default() };
        let search = EditalSearch::in_memory(config).unwrap();
        let html = search.render_highlighted("Ração & sal", &keywords("racao"));
        assert_eq!(html, "<mark class=\"hl px-1 rounded\">Ração</mark> &amp; sal");
    }

    #[tokio::test]
    async fn test_search_token_is_cancelled_when_done_or_dropped() {
        use futures::FutureExt;

        let search = demo_search();

        let token = CancellationToken::new();
        let pending = search.search_with_token(keywords("hospital"), 1, token.clone());
        // polled once, then dropped
        let _ = pending.now_or_never();
        assert!(token.is_cancelled());

        let token = CancellationToken::new();
        let page = search.search_with_token(keywords("hospital"), 1, token.clone()).await.unwrap();
        assert!(!page.items.is_empty());
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_search_with_precancelled_token_returns_cancelled() {
        let rt = runtime();
        let search = demo_search();
        let token = CancellationToken::new();
        token.cancel();

        let result = search.search_sync(&keywords("hospital"), 1, &token, rt.handle());
        assert_eq!(result, Err(SearchError::Cancelled));
    }

    #[tokio::test]
    async fn test_async_search_cancellation_via_drop() {
        let search = demo_search();

        let future = search.search(keywords("equipamento"), 1);
        drop(future);

        let page = search.search(keywords("equipamento"), 1).await.unwrap();
        assert!(!page.items.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_searches_independent() {
        let search = demo_search();
        let (a, b, c) = (search.clone(), search.clone(), search.clone());

        let first = tokio::spawn(async move { a.search(keywords("equipamento"), 1).await });
        let second = tokio::spawn(async move { b.search(keywords("hospital"), 1).await });
        let third = tokio::spawn(async move { c.search(keywords("medicamento"), 1).await });

        assert!(!first.await.unwrap().unwrap().items.is_empty());
        assert!(!second.await.unwrap().unwrap().items.is_empty());
        assert!(!third.await.unwrap().unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn test_search_abort_doesnt_corrupt_store() {
        let search = demo_search();
        for _ in 0..5 {
            let clone = search.clone();
            let handle = tokio::spawn(async move { clone.search(keywords("equipamento"), 1).await });
            handle.abort();
            let _ = handle.await;
        }
        let page = search.search(keywords("equipamento"), 1).await.unwrap();
        assert!(!page.items.is_empty());
    }

    /// No tokio runtime around the caller: the fallback runtime does the work.
    #[test]
    fn test_search_works_without_external_tokio_runtime() {
        let search = demo_search();
        let result = futures::executor::block_on(search.search(keywords("informática"), 1));
        let page = result.unwrap();
        assert!(ids(&page).contains(&"ed-0007"));
    }

    #[tokio::test]
    async fn test_session_serves_repeated_requests_from_cache() {
        let search = demo_search();
        let session = SearchSession::new(search.clone());
        let filter = keywords("hospitalar");

        let first = session.search(filter.clone(), 1).await.unwrap();
        search.database().clear().unwrap();
        let second = session.search(filter.clone(), 1).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(session.cached_pages(), 1);

        session.invalidate();
        let third = session.search(filter, 1).await.unwrap();
        assert!(third.items.is_empty());
    }

    #[tokio::test]
    async fn test_session_cache_is_bounded() {
        let config = SearchConfig { cache_capacity: 2, ..Default::default() };
        let search = EditalSearch::in_memory(config).unwrap();
        search.insert_editais(&demo_editais()).unwrap();
        let session = SearchSession::new(search);

        for word in ["hospital", "equipamento", "medicamento"] {
            session.search(keywords(word), 1).await.unwrap();
        }
        assert_eq!(session.cached_pages(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_session_last_request_wins() {
        let search = demo_search();
        let session = SearchSession::new(search.clone());

        // The in-memory pool has one connection. Holding it keeps both
        // searches in flight until the second has superseded the first.
        let held = search.database().get_conn().unwrap();
        let release = async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            drop(held);
        };

        let (older, newer, ()) = tokio::join!(
            session.search(keywords("equipamento"), 1),
            session.search(keywords("ração"), 1),
            release
        );

        assert_eq!(older, Err(SearchError::Cancelled));
        assert_eq!(ids(&newer.unwrap()), vec!["ed-0005"]);
        assert_eq!(session.cached_pages(), 1);
    }
}
