//! Data sources feeding the dashboard refresh.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use futures::future::BoxFuture;

use super::ContentState;
use super::phase::LoadingPhase;
use crate::api::ApiClient;
use crate::db::Database;
use crate::models::{Broadcast, Investment, NewsPost, Product};

/// One slice of dashboard content produced by a source
#[derive(Debug, Clone, PartialEq)]
pub enum PartialUpdate {
    Broadcast(Broadcast),
    Investments(Vec<Investment>),
    FutureProducts(Vec<Product>),
    News(Vec<NewsPost>),
}

impl PartialUpdate {
    /// Write this slice into `state`, replacing whatever the field held
    pub fn apply(self, mut state: ContentState) -> ContentState {
        match self {
            PartialUpdate::Broadcast(broadcast) => state.broadcast = Some(broadcast),
            PartialUpdate::Investments(investments) => state.investments = Some(investments),
            PartialUpdate::FutureProducts(products) => state.future_products = Some(products),
            PartialUpdate::News(news) => state.news = Some(news),
        }
        state
    }
}

/// Something the dashboard can load content from.
///
/// `load_data` may fail; a failure only means this source contributes
/// nothing to the phase.
pub trait DataSource: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Whether the source takes part in `phase` at all
    fn handles(&self, _phase: LoadingPhase) -> bool {
        true
    }

    fn load_data(&self, phase: LoadingPhase) -> BoxFuture<'_, Result<Option<PartialUpdate>>>;

    /// Merge a loaded update into the previous content. Must be pure.
    fn create_state(&self, previous: ContentState, update: PartialUpdate) -> ContentState {
        update.apply(previous)
    }
}

/// Loads every phase from the backend
pub struct ApiDataSource {
    client: ApiClient,
    cache: Option<Arc<Mutex<Database>>>,
}

impl ApiDataSource {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            cache: None,
        }
    }

    /// Also write fetched future products into the product cache
    pub fn with_cache(mut self, cache: Arc<Mutex<Database>>) -> Self {
        self.cache = Some(cache);
        self
    }
}

impl DataSource for ApiDataSource {
    fn name(&self) -> &str {
        "api"
    }

    fn load_data(&self, phase: LoadingPhase) -> BoxFuture<'_, Result<Option<PartialUpdate>>> {
        Box::pin(async move {
            let update = match phase {
                LoadingPhase::Broadcast => {
                    PartialUpdate::Broadcast(self.client.current_broadcast().await?)
                }
                LoadingPhase::Investments => {
                    PartialUpdate::Investments(self.client.investments().await?)
                }
                LoadingPhase::FutureProducts => {
                    let products = self.client.future_products().await?;
                    if let Some(cache) = &self.cache {
                        store_in_cache(cache.clone(), products.clone()).await;
                    }
                    PartialUpdate::FutureProducts(products)
                }
                LoadingPhase::News => PartialUpdate::News(self.client.news().await?),
            };
            Ok(Some(update))
        })
    }
}

async fn store_in_cache(cache: Arc<Mutex<Database>>, products: Vec<Product>) {
    let result = tokio::task::spawn_blocking(move || -> Result<()> {
        let db = cache
            .lock()
            .map_err(|_| anyhow::anyhow!("product cache lock poisoned"))?;
        db.insert(&products)
    })
    .await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!("Failed to cache future products: {:#}", e),
        Err(e) => tracing::warn!("Cache write task failed: {}", e),
    }
}

/// Serves future products from the local cache so the list shows up before
/// (or without) the network
pub struct CacheDataSource {
    db: Arc<Mutex<Database>>,
    limit: usize,
}

impl CacheDataSource {
    pub fn new(db: Arc<Mutex<Database>>, limit: usize) -> Self {
        Self { db, limit }
    }
}

impl DataSource for CacheDataSource {
    fn name(&self) -> &str {
        "cache"
    }

    fn handles(&self, phase: LoadingPhase) -> bool {
        phase == LoadingPhase::FutureProducts
    }

    fn load_data(&self, _phase: LoadingPhase) -> BoxFuture<'_, Result<Option<PartialUpdate>>> {
        let db = self.db.clone();
        let limit = self.limit;
        Box::pin(async move {
            let products = tokio::task::spawn_blocking(move || -> Result<Vec<Product>> {
                let db = db
                    .lock()
                    .map_err(|_| anyhow::anyhow!("product cache lock poisoned"))?;
                db.select_newest(0, limit)
            })
            .await??;

            if products.is_empty() {
                Ok(None)
            } else {
                tracing::debug!("Serving {} cached products", products.len());
                Ok(Some(PartialUpdate::FutureProducts(products)))
            }
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    /// What a scripted source does when asked for a phase
    #[derive(Debug, Clone)]
    pub enum Script {
        Update { delay: Duration, update: PartialUpdate },
        Fail { delay: Duration },
    }

    impl Script {
        pub fn after(millis: u64, update: PartialUpdate) -> Self {
            Script::Update {
                delay: Duration::from_millis(millis),
                update,
            }
        }

        pub fn fail(millis: u64) -> Self {
            Script::Fail {
                delay: Duration::from_millis(millis),
            }
        }
    }

    /// Source answering from per-phase scripts. Each call consumes the next
    /// script for the phase; the last one repeats.
    pub struct ScriptedSource {
        name: String,
        scripts: Mutex<HashMap<LoadingPhase, VecDeque<Script>>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                scripts: Mutex::new(HashMap::new()),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn on(self, phase: LoadingPhase, script: Script) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .entry(phase)
                .or_default()
                .push_back(script);
            self
        }

        pub fn calls(&self) -> Arc<AtomicUsize> {
            self.calls.clone()
        }

        fn next_script(&self, phase: LoadingPhase) -> Option<Script> {
            let mut scripts = self.scripts.lock().unwrap();
            let queue = scripts.get_mut(&phase)?;
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        }
    }

    impl DataSource for ScriptedSource {
        fn name(&self) -> &str {
            &self.name
        }

        fn handles(&self, phase: LoadingPhase) -> bool {
            self.scripts.lock().unwrap().contains_key(&phase)
        }

        fn load_data(&self, phase: LoadingPhase) -> BoxFuture<'_, Result<Option<PartialUpdate>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let script = self.next_script(phase);
            Box::pin(async move {
                match script {
                    None => Ok(None),
                    Some(Script::Update { delay, update }) => {
                        tokio::time::sleep(delay).await;
                        Ok(Some(update))
                    }
                    Some(Script::Fail { delay }) => {
                        tokio::time::sleep(delay).await;
                        anyhow::bail!("scripted failure")
                    }
                }
            })
        }
    }
}
