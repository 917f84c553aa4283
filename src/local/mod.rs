//! Thread-local attributes.
//!
//! A [`ThreadScopedStore`] holds, for one host, a private sub-table per thread.
//! [`Attribute`] and the [`thread_locals!`](crate::thread_locals) macro layer typed
//! accessors with default and visibility policies on top of it.
//!
//! Hosts come in two flavours, which never interfere even when they declare the
//! same key:
//!
//! - instances ([`ThreadLocalHost`]): each value owns a store;
//! - types ([`ClassLocalHost`]): one `static` store per type.

pub mod attribute;
pub mod store;

mod macros;
mod slot;

pub use attribute::{
    Attribute, AttributeDescriptor, ClassLocalHost, ThreadLocalHost, TypeHost, Visibility,
};
pub use store::{HostId, StoreStats, ThreadScopedStore};
