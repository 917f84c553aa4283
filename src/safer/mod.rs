//! Automatic method synchronization.
//!
//! A [`ClassBuilder`] collects the methods of a host type and the names that must be
//! serialized per instance. Names may be declared before their bodies exist; the
//! wrapper is installed when the body is defined. The finished [`Class`] invokes
//! methods by name or through typed [`Method`] handles.
//!
//! Synchronized bodies run under the host's [`Monitor`]: a per-instance lock
//! created on first use, plus a marker naming the method in flight. The lock is
//! not reentrant.
//!
//! Class-level (singleton) methods are just a second `Class` whose host is the
//! singleton value, so the two levels never share pending sets or locks.

pub mod class;
pub mod monitor;

pub use class::{Class, ClassBuilder, Method, MethodState};
pub use monitor::{Invocation, Monitor, MonitorGuard, Synchronizable};
