//! # lendpool
//!
//! A general-purpose resource pool: amortizes the cost of expensive,
//! reusable resources (connections, handles, workers) by keeping a bounded
//! population of them, matching acquire requests to free instances, and
//! governing creation, reuse, expiry and destruction.
//!
//! The caller supplies a [`ResourceFactory`]; the pool supplies the
//! coordination: a deadline-sorted request queue, four-state population
//! accounting, bounded-concurrency creation with backoff, idle and
//! absolute-lifetime reaping, and a clean two-phase drain.
//!
//! ```no_run
//! use lendpool::{Pool, PoolConfig, ResourceFactory};
//!
//! struct Connector;
//!
//! #[async_trait::async_trait]
//! impl ResourceFactory for Connector {
//!     type Resource = u64;
//!
//!     async fn create(&self) -> Result<u64, lendpool::BoxError> {
//!         Ok(42) // open the real connection here
//!     }
//! }
//!
//! # async fn run() -> lendpool::Result<()> {
//! let pool = Pool::new(Connector, PoolConfig::default())?;
//! let conn = pool.acquire().await?;
//! // ... use conn ...
//! pool.release(&conn);
//! pool.drain().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod factory;
pub mod pool;
pub mod record;
pub mod request;
pub mod stats;

mod registry;

pub use config::PoolConfig;
pub use error::{BoxError, Error, Result};
pub use events::{EventBus, PoolEvent};
pub use factory::ResourceFactory;
pub use pool::Pool;
pub use record::ResourceRecord;
pub use request::{AcquireOptions, AcquireTimeout, Origin};
pub use stats::PoolStats;
