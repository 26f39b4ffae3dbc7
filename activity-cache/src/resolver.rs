//! Fallback resolution
//!
//! A [`ResolverChain`] tries its resolvers in priority order and returns the
//! first one that produces a value. A typical chain puts the cache first and
//! the expensive upstream computation last.

use crate::cache::{CacheCoordinator, CacheValue, Resolution};
use crate::context::SearchContext;
use crate::error::{CacheError, Result};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// What a single resolver made of a request
#[derive(Debug)]
pub enum Outcome<T> {
    Resolved(T),
    /// Nothing to offer, e.g. a cache miss
    Skipped(String),
    Failed(CacheError),
}

#[async_trait]
pub trait Resolver<T>: Send + Sync {
    fn name(&self) -> &str;

    async fn attempt(&self, context: &SearchContext) -> Outcome<T>;
}

/// First successful result of a chain
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,

    /// Name of the resolver that produced the value
    pub resolver: String,

    /// Resolvers tried before it
    pub skipped: Vec<String>,
}

/// Resolvers in priority order
pub struct ResolverChain<T> {
    resolvers: Vec<Arc<dyn Resolver<T>>>,
}

impl<T> Default for ResolverChain<T> {
    fn default() -> Self {
        Self {
            resolvers: Vec::new(),
        }
    }
}

impl<T: Send + 'static> ResolverChain<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resolver with lower priority than those already added
    pub fn with(mut self, resolver: impl Resolver<T> + 'static) -> Self {
        self.resolvers.push(Arc::new(resolver));
        self
    }

    pub fn push(&mut self, resolver: Arc<dyn Resolver<T>>) {
        self.resolvers.push(resolver);
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.resolvers.iter().map(|r| r.name()).collect()
    }

    /// Try each resolver in turn.
    ///
    /// Skips and recoverable failures move on to the next resolver; an
    /// unkeyable context or bad configuration stops the chain. `Ok(None)`
    /// means every resolver passed.
    pub async fn resolve(&self, context: &SearchContext) -> Result<Option<Resolved<T>>> {
        let mut skipped = Vec::new();

        for resolver in &self.resolvers {
            match resolver.attempt(context).await {
                Outcome::Resolved(value) => {
                    debug!("Resolved by {} after {} fallbacks", resolver.name(), skipped.len());
                    return Ok(Some(Resolved {
                        value,
                        resolver: resolver.name().to_string(),
                        skipped,
                    }));
                }
                Outcome::Skipped(reason) => {
                    debug!("Resolver {} skipped: {}", resolver.name(), reason);
                }
                Outcome::Failed(e) if e.is_request_fatal() => return Err(e),
                Outcome::Failed(e) => {
                    warn!("Resolver {} failed: {}", resolver.name(), e);
                }
            }
            skipped.push(resolver.name().to_string());
        }

        Ok(None)
    }
}

/// Serves activities from a [`CacheCoordinator`]
pub struct CacheResolver {
    cache: CacheCoordinator,
}

impl CacheResolver {
    pub fn new(cache: CacheCoordinator) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl Resolver<CacheValue> for CacheResolver {
    fn name(&self) -> &str {
        "cache"
    }

    async fn attempt(&self, context: &SearchContext) -> Outcome<CacheValue> {
        match self.cache.resolve(context).await {
            Ok(Resolution::Hit { payload, info }) => {
                debug!("Cache resolver hit in {} ({:.3})", info.store, info.similarity);
                Outcome::Resolved(payload)
            }
            Ok(Resolution::Miss) => Outcome::Skipped("cache miss".to_string()),
            Err(e) => Outcome::Failed(e),
        }
    }
}

type BoxedFn<T> = Box<dyn Fn(SearchContext) -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// Adapts an async closure into a resolver
pub struct FnResolver<T> {
    name: String,
    func: BoxedFn<T>,
}

impl<T: Send + 'static> FnResolver<T> {
    pub fn new<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(SearchContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(move |context| func(context).boxed()),
        }
    }
}

#[async_trait]
impl<T: Send + 'static> Resolver<T> for FnResolver<T> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt(&self, context: &SearchContext) -> Outcome<T> {
        match (self.func)(context.clone()).await {
            Ok(value) => Outcome::Resolved(value),
            Err(e) => Outcome::Failed(e),
        }
    }
}
