//! Request-scoped globals.
//!
//! A request handler enters a scope for the request it serves. While the scope is
//! active, code running on that thread can read and write named values stored on
//! the request itself, without passing the request around. The thread only keeps
//! a weak reference, so a request is never kept alive by the scope.
//!
//! Scopes do not nest: leaving any scope resets the thread to "no request".
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use threadward::glue::{RequestContext, RequestGlobals, RequestTable};
//! use threadward::request_global;
//!
//! #[derive(Default)]
//! struct Request {
//!     globals: RequestTable,
//! }
//!
//! impl RequestContext for Request {
//!     fn globals(&self) -> &RequestTable {
//!         &self.globals
//!     }
//! }
//!
//! request_global! {
//!     pub current_user, set_current_user as "user": String;
//! }
//!
//! let request = Arc::new(Request::default());
//! assert!(set_current_user("nobody".into()).is_err());
//! {
//!     let _scope = RequestGlobals::enter(&request);
//!     set_current_user("ada".into()).unwrap();
//!     assert_eq!(current_user().as_deref(), Some("ada"));
//! }
//! assert_eq!(current_user(), None);
//! assert!(request.globals().is_empty());
//! ```

use crate::error::ScopeError;
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Value = Box<dyn Any + Send>;

/// Named values attached to one request.
#[derive(Default)]
pub struct RequestTable {
    values: Mutex<HashMap<&'static str, Value>>,
}

impl RequestTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> MutexGuard<'_, HashMap<&'static str, Value>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A clone of the value stored under `name`, if it has type `T`.
    pub fn get<T: Clone + 'static>(&self, name: &str) -> Option<T> {
        self.values()
            .get(name)
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }

    /// Stores `value` under `name`, replacing any previous value.
    pub fn set<T: Send + 'static>(&self, name: &'static str, value: T) {
        // The replaced value is dropped after the table is unlocked.
        let _previous = self.values().insert(name, Box::new(value));
    }

    /// Removes the value stored under `name`.
    pub fn remove(&self, name: &str) -> bool {
        let previous = self.values().remove(name);
        previous.is_some()
    }

    /// Removes every value.
    pub fn clear(&self) {
        let _drained = std::mem::take(&mut *self.values());
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for RequestTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.values().keys().copied().collect();
        names.sort_unstable();
        f.debug_struct("RequestTable").field("names", &names).finish()
    }
}

/// A request that carries its own [`RequestTable`].
pub trait RequestContext: Any + Send + Sync {
    /// The request's globals.
    fn globals(&self) -> &RequestTable;
}

struct Current {
    request: Weak<dyn Any + Send + Sync>,
    context: Weak<dyn RequestContext>,
}

thread_local! {
    static CURRENT: RefCell<Option<Current>> = const { RefCell::new(None) };
}

/// Access to the calling thread's current request and its globals.
pub struct RequestGlobals;

impl RequestGlobals {
    /// Makes `request` current on this thread until the returned guard drops.
    pub fn enter<R: RequestContext>(request: &Arc<R>) -> RequestScope {
        Self::set_request(Some(request));
        crate::trace!(thread = ?std::thread::current().id(), "request scope entered");
        RequestScope {
            _not_send: PhantomData,
        }
    }

    /// Replaces this thread's current request without a guard.
    pub fn set_request<R: RequestContext>(request: Option<&Arc<R>>) {
        let current = request.map(|request| {
            let weak: Weak<R> = Arc::downgrade(request);
            Current {
                request: weak.clone(),
                context: weak,
            }
        });
        let _ = CURRENT.try_with(|slot| *slot.borrow_mut() = current);
    }

    /// The current request, if one is set, still alive and of type `R`.
    pub fn request<R: RequestContext>() -> Option<Arc<R>> {
        let request = CURRENT
            .try_with(|slot| slot.borrow().as_ref().and_then(|c| c.request.upgrade()))
            .ok()
            .flatten()?;
        request.downcast::<R>().ok()
    }

    /// Returns `true` while a live request is current.
    pub fn is_active() -> bool {
        Self::context().is_some()
    }

    fn context() -> Option<Arc<dyn RequestContext>> {
        CURRENT
            .try_with(|slot| slot.borrow().as_ref().and_then(|c| c.context.upgrade()))
            .ok()
            .flatten()
    }

    /// The value stored under `name` on the current request.
    ///
    /// Returns `None` outside a request scope.
    pub fn get<T: Clone + 'static>(name: &str) -> Option<T> {
        Self::context()?.globals().get(name)
    }

    /// Stores `value` under `name` on the current request.
    ///
    /// # Errors
    ///
    /// [`ScopeError::NoActiveScope`] if no live request is current.
    pub fn set<T: Send + 'static>(name: &'static str, value: T) -> Result<(), ScopeError> {
        let context = Self::context().ok_or(ScopeError::NoActiveScope(name))?;
        context.globals().set(name, value);
        Ok(())
    }

    /// Removes `name` from the current request. Returns `false` outside a scope.
    pub fn remove(name: &str) -> bool {
        Self::context().is_some_and(|context| context.globals().remove(name))
    }

    /// Clears the current request's globals and forgets the request.
    pub fn reset() {
        if let Some(context) = Self::context() {
            context.globals().clear();
        }
        let _ = CURRENT.try_with(|slot| slot.borrow_mut().take());
    }
}

impl fmt::Debug for RequestGlobals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestGlobals")
            .field("active", &Self::is_active())
            .finish()
    }
}

/// Keeps a request current on this thread. Dropping it calls [`RequestGlobals::reset`].
#[must_use = "the request scope ends as soon as the guard is dropped"]
pub struct RequestScope {
    _not_send: PhantomData<*const ()>,
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        RequestGlobals::reset();
        crate::trace!(thread = ?std::thread::current().id(), "request scope left");
    }
}

impl fmt::Debug for RequestScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestScope").finish_non_exhaustive()
    }
}

/// Generates free accessor functions for named request globals.
///
/// Each entry is `vis reader, writer [as "key"]: Type;`. The reader returns
/// `Option<Type>` and is `None` outside a request scope; the writer returns
/// `Result<(), ScopeError>`.
#[macro_export]
macro_rules! request_global {
    ($(
        $(#[$meta:meta])*
        $vis:vis $get:ident, $set:ident $(as $key:literal)? : $ty:ty;
    )*) => {
        $(
            $(#[$meta])*
            $vis fn $get() -> ::core::option::Option<$ty> {
                $crate::glue::RequestGlobals::get::<$ty>($crate::thread_locals!(@key $get $($key)?))
            }

            $(#[$meta])*
            $vis fn $set(value: $ty) -> ::core::result::Result<(), $crate::error::ScopeError> {
                $crate::glue::RequestGlobals::set::<$ty>($crate::thread_locals!(@key $get $($key)?), value)
            }
        )*
    };
}
