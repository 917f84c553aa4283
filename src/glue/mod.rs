//! Integration helpers for servers and worker pools.
//!
//! - [`request`]: values scoped to the request a thread is currently serving.
//! - [`worker`]: threads that run a cleanup action however their work ends.

pub mod request;
pub mod worker;

pub use request::{RequestContext, RequestGlobals, RequestScope, RequestTable};
pub use worker::{
    run_with_cleanup, spawn_named_with_cleanup, spawn_scoped_with_cleanup, spawn_with_cleanup,
};
