//! [`RepositoryResolver`]: lazily built, append-only cache over a static
//! repository registry.
//!
//! The cache uses `arc-swap` so that hits are lock-free reads on the hot path.

use std::{collections::HashMap, sync::Arc};

use arc_swap::ArcSwap;
use thiserror::Error;
use tracing::debug;

use super::Repository;

/// Errors from repository resolution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    /// No registered repository declares the requested entity type.
    #[error("no repository registered for entity type: {entity_type}")]
    NoRepository { entity_type: String },
}

/// Resolves entity types to repositories, caching each hit.
pub struct RepositoryResolver<R: Repository + ?Sized> {
    /// Repository name → instance. Static for the process lifetime.
    registry: HashMap<String, Arc<R>>,
    /// Entity type → resolved repository. Entries are never replaced.
    cache: ArcSwap<HashMap<String, Arc<R>>>,
}

impl<R: Repository + ?Sized> RepositoryResolver<R> {
    /// Create a resolver over `registry` (repository name → instance).
    pub fn new(registry: HashMap<String, Arc<R>>) -> Self {
        Self {
            registry,
            cache: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Find the repository that persists `entity_type`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::NoRepository`] if no registered repository
    /// declares `entity_type`.
    pub fn resolve(&self, entity_type: &str) -> Result<Arc<R>, LookupError> {
        if let Some(hit) = self.cache.load().get(entity_type) {
            return Ok(Arc::clone(hit));
        }

        let found = self
            .registry
            .values()
            .find(|repo| repo.entity_type() == entity_type)
            .cloned()
            .ok_or_else(|| LookupError::NoRepository {
                entity_type: entity_type.to_owned(),
            })?;

        // A concurrent miss may have inserted first; keep whichever landed.
        self.cache.rcu(|current| {
            if current.contains_key(entity_type) {
                return Arc::clone(current);
            }
            let mut next = HashMap::clone(current);
            next.insert(entity_type.to_owned(), Arc::clone(&found));
            Arc::new(next)
        });
        debug!(entity_type, "repository resolved");

        Ok(self
            .cache
            .load()
            .get(entity_type)
            .cloned()
            .unwrap_or(found))
    }

    /// Number of entity types resolved so far.
    pub fn cached(&self) -> usize {
        self.cache.load().len()
    }

    /// Number of registered repositories.
    pub fn registered(&self) -> usize {
        self.registry.len()
    }
}

impl<R: Repository + ?Sized> std::fmt::Debug for RepositoryResolver<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryResolver")
            .field("registered", &self.registered())
            .field("cached", &self.cached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Collection {
        entity: &'static str,
    }

    impl Repository for Collection {
        fn entity_type(&self) -> &str {
            self.entity
        }
    }

    fn resolver() -> RepositoryResolver<Collection> {
        let mut registry = HashMap::new();
        registry.insert("customers".to_owned(), Arc::new(Collection { entity: "Customer" }));
        registry.insert("invoices".to_owned(), Arc::new(Collection { entity: "Invoice" }));
        RepositoryResolver::new(registry)
    }

    #[test]
    fn resolves_by_declared_entity_type() {
        let r = resolver();
        assert_eq!(r.resolve("Invoice").unwrap().entity_type(), "Invoice");
        assert_eq!(r.cached(), 1);
    }

    #[test]
    fn second_resolution_returns_cached_instance() {
        let r = resolver();
        let first = r.resolve("Customer").unwrap();
        let second = r.resolve("Customer").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(r.cached(), 1);
    }

    #[test]
    fn unknown_type_names_the_type() {
        let r = resolver();
        let err = r.resolve("Payment").unwrap_err();
        assert_eq!(
            err,
            LookupError::NoRepository {
                entity_type: "Payment".into()
            }
        );
        assert!(err.to_string().contains("Payment"));
        assert_eq!(r.cached(), 0);
    }

    #[test]
    fn concurrent_first_resolution_is_consistent() {
        let r = Arc::new(resolver());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let r = Arc::clone(&r);
                std::thread::spawn(move || r.resolve("Customer").unwrap())
            })
            .collect();
        let resolved: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(resolved.iter().all(|x| Arc::ptr_eq(x, &resolved[0])));
        assert_eq!(r.cached(), 1);
    }

    #[test]
    fn works_with_trait_objects() {
        let mut registry: HashMap<String, Arc<dyn Repository>> = HashMap::new();
        registry.insert("customers".into(), Arc::new(Collection { entity: "Customer" }));
        let r = RepositoryResolver::new(registry);
        assert_eq!(r.resolve("Customer").unwrap().entity_type(), "Customer");
    }
}
