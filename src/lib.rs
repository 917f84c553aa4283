//! # `threadward` - Retrofitted Thread Safety
//!
//! Tools for making plain, single-threaded types usable from many threads without
//! rewriting them.
//!
//! ## Key Features
//!
//! - **Thread-local attributes** ([`local`]): per-object values that every thread
//!   sees privately, declared with [`thread_locals!`] on instances or on a type.
//! - **Synchronized proxy** ([`sync`]): [`Synchronized<T>`] serializes every call
//!   routed through it behind one lock, which several proxies may share.
//! - **Synchronized methods** ([`safer`]): a class registry that wraps chosen
//!   methods, present or future, in a per-instance [`Monitor`](safer::Monitor).
//! - **Glue** ([`glue`]): request-scoped globals and worker threads with cleanup.
//!
//! ## Guarantees
//!
//! - Reading a thread-local attribute never creates bookkeeping; only writes do,
//!   and a thread's first write to an object is the only step that synchronizes
//!   with other threads.
//! - Every lock is released on every exit path, including unwinding. Locks never
//!   poison.
//! - Locks are **not reentrant**. A synchronized method that calls another
//!   synchronized method of the same instance deadlocks.
//!
//! ## Feature flags
//!
//! - `tracing`: emits `trace`/`debug` events for registrations, prunes, method
//!   activation and scope changes.
//!
//! ## Example
//!
//! ```rust
//! use std::cell::Cell;
//! use threadward::local::{ThreadLocalHost, ThreadScopedStore};
//! use threadward::{thread_locals, Synchronized};
//!
//! #[derive(Default)]
//! struct Job {
//!     locals: ThreadScopedStore,
//! }
//!
//! impl ThreadLocalHost for Job {
//!     fn thread_locals(&self) -> &ThreadScopedStore {
//!         &self.locals
//!     }
//! }
//!
//! thread_locals! {
//!     impl Job {
//!         pub count, set_count: i32 = 0;
//!     }
//! }
//!
//! let job = Job::default();
//! job.set_count(5);
//! std::thread::scope(|s| {
//!     s.spawn(|| assert_eq!(job.count(), 0));
//! });
//! assert_eq!(job.count(), 5);
//!
//! let total = Synchronized::new(Cell::new(0));
//! std::thread::scope(|s| {
//!     for _ in 0..4 {
//!         s.spawn(|| total.call(|t| t.set(t.get() + 1)));
//!     }
//! });
//! assert_eq!(total.into_inner().get(), 4);
//! ```

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

/// Emits a `tracing` trace event when the `tracing` feature is enabled.
macro_rules! trace {
    ($($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        ::tracing::trace!($($arg)*);
    }};
}

/// Emits a `tracing` debug event when the `tracing` feature is enabled.
macro_rules! debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        ::tracing::debug!($($arg)*);
    }};
}

pub(crate) use {debug, trace};

pub mod error;
pub mod glue;
pub mod local;
pub mod safer;
pub mod sync;

pub use error::{DefinitionError, MethodError, ScopeError};
pub use glue::{RequestContext, RequestGlobals, RequestScope, RequestTable};
pub use local::{Attribute, ClassLocalHost, ThreadLocalHost, ThreadScopedStore, Visibility};
pub use safer::{Class, ClassBuilder, Invocation, Method, MethodState, Monitor, Synchronizable};
pub use sync::{Lock, LockGuard, Synchronized, SynchronizedGuard};
