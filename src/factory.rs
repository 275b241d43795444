//! The caller-supplied factory contract.
//!
//! The pool drives every resource's lifecycle through a `ResourceFactory`:
//! `create` and `destroy` do the expensive asynchronous work, `validate`
//! and `compare` are cheap pure checks, and `backoff` rate-limits creation
//! retries after a failure.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::BoxError;
use crate::record::ResourceRecord;

/// Factory for pooled resource values.
///
/// Only `create` is required. `Resource` values are cloned by the pool when
/// serving (the pool keeps its own copy for bookkeeping), so they should be
/// cheap handles — an `Arc`-wrapped connection, a descriptor, an id.
#[async_trait]
pub trait ResourceFactory: Send + Sync + 'static {
    /// The pooled value type.
    ///
    /// `PartialEq` is the default identity used by [`compare`](Self::compare)
    /// when locating a value at release/destroy time.
    type Resource: Clone + PartialEq + Send + 'static;

    /// Produce one new resource.
    ///
    /// Errors are internal to the pool: they are emitted as
    /// [`PoolEvent::CreateError`](crate::PoolEvent::CreateError) and absorbed
    /// by [`backoff`](Self::backoff); acquire callers never see them.
    async fn create(&self) -> Result<Self::Resource, BoxError>;

    /// Tear one resource down. The pool treats completion as "done" and
    /// ignores the error value.
    async fn destroy(&self, resource: Self::Resource) -> Result<(), BoxError> {
        drop(resource);
        Ok(())
    }

    /// Check whether a resource may be served or re-admitted to the free
    /// list. Pure; called before every serve and on every release.
    fn validate(&self, _record: &ResourceRecord<Self::Resource>) -> bool {
        true
    }

    /// Equivalence used to locate a value in the lent and free lists.
    fn compare(&self, a: &Self::Resource, b: &Self::Resource) -> bool {
        a == b
    }

    /// Cool-down applied after a failed creation. While the cool-down runs
    /// the creation slot stays occupied, which is what rate-limits retries
    /// under `max_creating`. `None` frees the slot immediately.
    fn backoff(&self) -> Option<Duration> {
        None
    }
}
