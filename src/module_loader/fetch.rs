//! Remote module fetching and the per-worker fetch cache.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use anyhow::Error;
use futures::future::{LocalBoxFuture, Shared};
use futures::FutureExt;
use reqwest::Client;

static USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

lazy_static! {
    static ref REQWEST_CLIENT: Client = reqwest::ClientBuilder::new()
        .user_agent(USER_AGENT)
        .build()
        .expect("Failed to construct reqwest client");
}

/// Produces the text of a remote module. Implementations are constructed on
/// the worker thread and do not need to be `Send`.
pub trait TextFetcher {
    fn fetch_text(&self, url: &str) -> LocalBoxFuture<'static, Result<String, Error>>;
}

/// Production fetcher backed by a shared reqwest client.
#[derive(Default)]
pub struct HttpTextFetcher;

impl TextFetcher for HttpTextFetcher {
    fn fetch_text(&self, url: &str) -> LocalBoxFuture<'static, Result<String, Error>> {
        let url = url.to_string();
        Box::pin(async move {
            let response = REQWEST_CLIENT.get(&url).send().await?;
            let response = response.error_for_status()?;
            Ok(response.text().await?)
        })
    }
}

/// An explicit fetch failure. Distinguishable from valid-but-empty module
/// text, and cloneable so concurrent sharers of one fetch all observe it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub url: String,
    pub message: String,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to fetch \"{}\": {}", self.url, self.message)
    }
}

impl std::error::Error for FetchFailure {}

type SharedFetch = Shared<LocalBoxFuture<'static, Result<String, FetchFailure>>>;

/// Memoizes network text fetches by URL for the worker's lifetime.
///
/// The first request for a URL stores the in-flight future; concurrent
/// requests for the same URL share it, so each URL is fetched at most once.
/// Failed entries are evicted before sharers observe the failure, allowing a
/// later request to retry. Interior mutability is a plain `RefCell`: the
/// worker's scheduling is cooperative and the borrow never spans an await.
pub struct RemoteFetchCache {
    fetcher: Rc<dyn TextFetcher>,
    entries: Rc<RefCell<HashMap<String, SharedFetch>>>,
}

impl RemoteFetchCache {
    pub fn new(fetcher: Rc<dyn TextFetcher>) -> Self {
        Self {
            fetcher,
            entries: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    pub async fn fetch(&self, url: &str) -> Result<String, FetchFailure> {
        let shared = {
            let mut entries = self.entries.borrow_mut();
            if let Some(existing) = entries.get(url) {
                existing.clone()
            } else {
                let entries_handle = Rc::clone(&self.entries);
                let fetch_url = url.to_string();
                let pending = self.fetcher.fetch_text(url);
                let fut: LocalBoxFuture<'static, Result<String, FetchFailure>> =
                    Box::pin(async move {
                        match pending.await {
                            Ok(text) => Ok(text),
                            Err(err) => {
                                log::error!("failed to fetch {}: {:#}", fetch_url, err);
                                // evict so a later request can retry
                                entries_handle.borrow_mut().remove(&fetch_url);
                                Err(FetchFailure {
                                    url: fetch_url,
                                    message: err.to_string(),
                                })
                            }
                        }
                    });
                let shared = fut.shared();
                entries.insert(url.to_string(), shared.clone());
                shared
            }
        };
        shared.await
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}
