//! Multi-source company search.
//!
//! Stage 1 runs one candidate-key query per search source concurrently and
//! merges the returned key lists after every task has finished. Stage 2
//! sorts the merged keys and slices one page. Stage 3 hydrates only the keys
//! of that page.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

use crate::{
    config::SearchConfig,
    db::{RecordStore, SearchSource, SearchTerm, SEARCH_SOURCES},
    models::{CompanyDetails, Paginated, Pagination},
    services::CompanyService,
    Error, Result,
};

/// Deduplicated business keys, kept in lexicographic order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateKeySet {
    keys: BTreeSet<String>,
}

impl CandidateKeySet {
    /// Blank keys are ignored.
    pub fn merge(&mut self, keys: impl IntoIterator<Item = String>) {
        self.keys
            .extend(keys.into_iter().filter(|k| !k.trim().is_empty()));
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys of one page; out-of-range pages are empty.
    pub fn page(&self, pagination: Pagination) -> Vec<String> {
        let offset = usize::try_from(pagination.offset()).unwrap_or(usize::MAX);
        self.keys
            .iter()
            .skip(offset)
            .take(pagination.limit as usize)
            .cloned()
            .collect()
    }
}

/// One page of candidate keys and the size of the whole candidate set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPage {
    pub total_records: usize,
    pub pagination: Pagination,
    pub keys: Vec<String>,
}

#[derive(Clone)]
pub struct SearchService {
    store: Arc<dyn RecordStore>,
    company: CompanyService,
    sources: &'static [SearchSource],
    query_timeout: Duration,
}

impl SearchService {
    pub fn new(store: Arc<dyn RecordStore>, config: &SearchConfig) -> Self {
        Self {
            company: CompanyService::new(Arc::clone(&store)),
            store,
            sources: SEARCH_SOURCES,
            query_timeout: config.query_timeout(),
        }
    }

    /// Stage 1: fan out over every source and merge the keys.
    ///
    /// Waits for all sources. Any failed or timed-out source fails the search.
    pub async fn find_candidate_keys(&self, term: &SearchTerm) -> Result<CandidateKeySet> {
        let started = Instant::now();
        let mut tasks = JoinSet::new();

        for source in self.sources {
            let store = Arc::clone(&self.store);
            let term = term.clone();
            let timeout = self.query_timeout;
            tasks.spawn(async move {
                let started = Instant::now();
                let result =
                    match tokio::time::timeout(timeout, store.find_candidate_keys(source, &term))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(Error::SearchFailed(format!(
                            "query timed out after {}s",
                            timeout.as_secs()
                        ))),
                    };
                tracing::debug!(
                    source = source.name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    ok = result.is_ok(),
                    "Fan-out query finished"
                );
                (source.name, result)
            });
        }

        let mut results = Vec::with_capacity(self.sources.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => results.push((
                    "unknown",
                    Err(Error::SearchFailed(format!("fan-out task failed: {e}"))),
                )),
            }
        }

        let mut keys = CandidateKeySet::default();
        let mut failures = Vec::new();
        for (source, result) in results {
            match result {
                Ok(found) => keys.merge(found),
                Err(e) => {
                    tracing::warn!(source, error = %e, "Search source failed");
                    failures.push(format!("{source}: {e}"));
                }
            }
        }
        if !failures.is_empty() {
            return Err(Error::SearchFailed(failures.join("; ")));
        }

        tracing::debug!(
            candidates = keys.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Candidate keys merged"
        );
        Ok(keys)
    }

    /// Stages 1 and 2: candidate keys of one page.
    pub async fn search(&self, term: &SearchTerm, pagination: Pagination) -> Result<KeyPage> {
        let keys = self.find_candidate_keys(term).await?;
        Ok(KeyPage {
            total_records: keys.len(),
            pagination,
            keys: keys.page(pagination),
        })
    }

    /// Stage 3: hydrate keys into full company records.
    pub async fn hydrate(&self, keys: &[String]) -> Result<Vec<CompanyDetails>> {
        self.company.hydrate(keys).await
    }

    /// Full search: validate the term, page the keys, hydrate the page.
    pub async fn detailed_search(
        &self,
        raw_term: &str,
        pagination: Pagination,
    ) -> Result<Paginated<CompanyDetails>> {
        let started = Instant::now();
        let term = SearchTerm::parse(raw_term)?;
        let page = self.search(&term, pagination).await?;
        let data = self.hydrate(&page.keys).await?;

        tracing::info!(
            total_records = page.total_records,
            page = pagination.page,
            limit = pagination.limit,
            returned = data.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Detailed search completed"
        );
        Ok(Paginated::new(
            data,
            i64::try_from(page.total_records).unwrap_or(i64::MAX),
            pagination,
        ))
    }
}
