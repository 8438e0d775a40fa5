//! # Packfit Memstore
//!
//! In-memory implementation of the core's versioned document store. The
//! reference store for tests and single-process deployments; a durable
//! backend (document or relational) slots in behind the same
//! [`DocumentStore`] trait.
//!
//! Compare-and-swap semantics are exact: `update` takes one write lock,
//! checks the stored version against the caller's expectation, and either
//! replaces the document and bumps the version or fails with
//! [`StoreError::VersionConflict`] without writing. That single point of
//! atomicity is what the core's read-revalidate-write loops lean on.

use packfit_core::store::{Document, DocumentStore, StoreError, Version, Versioned};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::RwLock;

/// In-memory versioned document store.
///
/// One instance per collection; cheap to construct, safe to share behind
/// `Arc`.
pub struct InMemoryStore<D: Document> {
    documents: RwLock<HashMap<D::Id, (Version, D)>>,
}

impl<D: Document> InMemoryStore<D> {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
        }
    }

    /// Number of documents currently stored
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Whether the store holds no documents
    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

impl<D: Document> Default for InMemoryStore<D> {
    fn default() -> Self {
        Self::new()
    }
}

fn qualified<D: Document>(id: D::Id) -> String {
    format!("{}/{id}", D::COLLECTION)
}

impl<D: Document> DocumentStore<D> for InMemoryStore<D> {
    fn get(
        &self,
        id: D::Id,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Versioned<D>>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let guard = self.documents.read().await;
            Ok(guard.get(&id).map(|(version, document)| Versioned {
                version: *version,
                document: document.clone(),
            }))
        })
    }

    fn insert(
        &self,
        document: D,
    ) -> Pin<Box<dyn Future<Output = Result<Version, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut guard = self.documents.write().await;
            let id = document.id();
            if guard.contains_key(&id) {
                return Err(StoreError::AlreadyExists(qualified::<D>(id)));
            }
            guard.insert(id, (Version::INITIAL, document));
            tracing::trace!(collection = D::COLLECTION, %id, "document inserted");
            Ok(Version::INITIAL)
        })
    }

    fn update(
        &self,
        expected: Version,
        document: D,
    ) -> Pin<Box<dyn Future<Output = Result<Version, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut guard = self.documents.write().await;
            let id = document.id();
            let Some((current, stored)) = guard.get_mut(&id) else {
                return Err(StoreError::NotFound(qualified::<D>(id)));
            };
            if *current != expected {
                return Err(StoreError::VersionConflict {
                    document: qualified::<D>(id),
                    expected,
                    actual: *current,
                });
            }
            *current = current.next();
            *stored = document;
            tracing::trace!(collection = D::COLLECTION, %id, version = %current, "document updated");
            Ok(*current)
        })
    }

    fn scan(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Versioned<D>>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let guard = self.documents.read().await;
            Ok(guard
                .values()
                .map(|(version, document)| Versioned {
                    version: *version,
                    document: document.clone(),
                })
                .collect())
        })
    }
}
