//! Keyed get-or-populate cache for in-process memoization.
//!
//! Registry catalogs, manifests, package specs and framework lookups are all
//! addressed by immutable keys (package name, `name:version`, target plus
//! candidate frameworks). [`MemoCache`] guarantees that concurrent callers
//! asking for the same key share a single computation.

use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Instance-scoped memoization with an atomic per-key initializer.
///
/// # Examples
///
/// ```
/// use nuget_core::memo::MemoCache;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cache: MemoCache<String, u32> = MemoCache::new();
///
/// let value = cache
///     .get_or_try_init("answer".to_string(), || async { Ok::<_, ()>(42) })
///     .await
///     .unwrap();
/// assert_eq!(value, 42);
///
/// // The initializer is not invoked again for a populated key.
/// let cached = cache
///     .get_or_try_init("answer".to_string(), || async { Err::<u32, ()>(()) })
///     .await;
/// assert_eq!(cached, Ok(42));
/// # }
/// ```
pub struct MemoCache<K, V> {
    entries: DashMap<K, Arc<OnceCell<V>>>,
}

impl<K, V> MemoCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    fn cell(&self, key: K) -> Arc<OnceCell<V>> {
        Arc::clone(
            &self
                .entries
                .entry(key)
                .or_insert_with(|| Arc::new(OnceCell::new())),
        )
    }

    /// Returns the cached value for `key`, running `init` if there is none.
    ///
    /// A failed initialization leaves the key unpopulated, so a later call
    /// retries it.
    pub async fn get_or_try_init<F, Fut, E>(&self, key: K, init: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let cell = self.cell(key);
        cell.get_or_try_init(init).await.cloned()
    }

    /// Infallible variant of [`MemoCache::get_or_try_init`].
    pub async fn get_or_init<F, Fut>(&self, key: K, init: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let cell = self.cell(key);
        cell.get_or_init(init).await.clone()
    }

    /// Returns the value for `key` if it has been populated.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries
            .get(key)
            .and_then(|cell| cell.value().get().cloned())
    }

    /// Number of populated keys.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for MemoCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
