//! A striped, FIFO-fair pool for expensive reusable resources.
//!
//! `striped-pool` amortizes the cost of constructing expensive resources
//! (database connections, cryptographic sessions, worker handles) by
//! keeping a bounded idle set from which concurrent callers borrow and
//! return values built by a caller-supplied factory. It guarantees a
//! bounded resource count, fair FIFO waiting under contention, timely
//! reclamation of idle resources via a background reaper, and
//! exception-safe release along every acquisition path.
//!
//! The pool is *striped*: it shards its state across one independent
//! stripe per execution context (by default, per reported CPU), so
//! uncontended use pays almost no synchronization cost and contention on
//! one stripe never blocks callers bound to another.
//!
//! This crate does not validate or health-check resources — any value
//! returned through [`Pool::put`] is assumed reusable. Callers that
//! discover a resource is broken should call [`Pool::destroy`] instead of
//! `put` so it's torn down rather than recycled.
//!
//! ```
//! use std::convert::Infallible;
//! use striped_pool::new_pool;
//!
//! let pool = new_pool::<String, _, Infallible, _, Infallible>(
//!     || Ok(String::from("connection")),
//!     |_v| Ok(()),
//!     1.0,
//!     4,
//! )
//! .unwrap();
//!
//! let (resource, handle) = pool.take().unwrap();
//! pool.put(handle, resource.value);
//! ```

#![warn(missing_docs)]
#![allow(dead_code)]

mod clock;
mod entry;
mod error;
mod pool;
mod queue;
mod reaper;
mod selector;
mod slot;
mod stripe;

pub use error::{Cancelled, ConfigError, PoolError};
pub use pool::{new_pool, AcquireError, CancelToken, LocalPool, Method, Pool, Resource};
pub use selector::{DefaultScheduler, Scheduler};
