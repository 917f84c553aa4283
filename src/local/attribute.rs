//! Thread-local attribute descriptors and the host traits they attach to.
//!
//! An [`Attribute`] is a `Copy`, `const`-constructible description of one
//! thread-local attribute: its key, its visibility and its fallback policy. The
//! [`thread_locals!`](crate::thread_locals) macro generates one typed reader and
//! writer per attribute on top of it, but `Attribute` can be used directly too.

use super::store::ThreadScopedStore;
use core::fmt;
use core::marker::PhantomData;
use serde::{Deserialize, Serialize};
use std::thread::ThreadId;

/// Visibility of a generated accessor pair.
///
/// Only affects the generated reader and writer, never storage. Derived from the
/// Rust visibility written in the declaration: `pub` is [`Public`](Self::Public),
/// any restricted `pub(..)` is [`Protected`](Self::Protected) and inherited
/// visibility is [`Private`](Self::Private).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Reachable from anywhere.
    #[default]
    Public,
    /// Reachable within a restricted path (`pub(crate)`, `pub(super)`, ...).
    Protected,
    /// Reachable only from the declaring module.
    Private,
}

impl Visibility {
    /// Maps the stringified tokens of a Rust visibility qualifier.
    pub const fn from_tokens(tokens: &str) -> Self {
        let b = tokens.as_bytes();
        if b.is_empty() {
            Self::Private
        } else if b.len() == 3 && b[0] == b'p' && b[1] == b'u' && b[2] == b'b' {
            Self::Public
        } else {
            Self::Protected
        }
    }
}

/// A type's class-level host: what computed defaults of class-level attributes
/// receive in place of an instance.
pub struct TypeHost<C>(PhantomData<fn() -> C>);

impl<C> TypeHost<C> {
    /// The host for `C`.
    pub const fn new() -> Self {
        Self(PhantomData)
    }

    /// The full type name of `C`.
    pub fn type_name(&self) -> &'static str {
        std::any::type_name::<C>()
    }

    /// The last path segment of `C`'s type name.
    pub fn short_name(&self) -> &'static str {
        let full = self.type_name();
        let base = full.split('<').next().unwrap_or(full);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl<C: ClassLocalHost> TypeHost<C> {
    /// `C`'s class-level store.
    pub fn store(&self) -> &'static ThreadScopedStore {
        C::class_thread_locals()
    }
}

impl<C> Default for TypeHost<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Clone for TypeHost<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for TypeHost<C> {}

impl<C> fmt::Debug for TypeHost<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeHost").field(&self.type_name()).finish()
    }
}

/// A value whose instances carry their own thread-local attributes.
pub trait ThreadLocalHost {
    /// The instance's store.
    fn thread_locals(&self) -> &ThreadScopedStore;

    /// Drops the records of every thread not in `live`. See [`ThreadScopedStore::prune`].
    fn prune_thread_locals<I>(&self, live: I) -> usize
    where
        I: IntoIterator<Item = ThreadId>,
        Self: Sized,
    {
        self.thread_locals().prune(live)
    }

    /// Drops the records of threads that have terminated.
    fn prune_exited_thread_locals(&self) -> usize {
        self.thread_locals().prune_exited()
    }
}

/// A type with class-level thread-local attributes, stored in a `static`.
///
/// Usually implemented by the `static` form of [`thread_locals!`](crate::thread_locals).
pub trait ClassLocalHost {
    /// The type's class-level store.
    fn class_thread_locals() -> &'static ThreadScopedStore;

    /// Drops the class-level records of every thread not in `live`.
    fn prune_class_thread_locals<I>(live: I) -> usize
    where
        I: IntoIterator<Item = ThreadId>,
    {
        Self::class_thread_locals().prune(live)
    }
}

/// Static metadata of one declared attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttributeDescriptor {
    /// Storage key.
    pub name: &'static str,
    /// Visibility of the accessor pair.
    pub visibility: Visibility,
    /// A constant default was declared.
    pub has_default: bool,
    /// A computed default was declared.
    pub has_default_fn: bool,
    /// The attribute's value type.
    pub value_type: &'static str,
}

/// A thread-local attribute of hosts of type `H` holding values of type `T`.
///
/// On a read that finds no value for the calling thread, the fallback chain is:
/// the computed default if declared (evaluated fresh on every miss, never
/// cached), else the constant default, else `None`. Reads never create
/// bookkeeping; only [`write`](Self::write) does.
///
/// # Example
///
/// ```rust
/// use threadward::local::{Attribute, ThreadLocalHost, ThreadScopedStore};
///
/// struct Session {
///     locals: ThreadScopedStore,
/// }
///
/// impl ThreadLocalHost for Session {
///     fn thread_locals(&self) -> &ThreadScopedStore {
///         &self.locals
///     }
/// }
///
/// const RETRIES: Attribute<Session, u32> = Attribute::new("retries").with_default(|| 3);
///
/// let session = Session { locals: ThreadScopedStore::new() };
/// assert_eq!(RETRIES.read(&session, &session.locals), Some(3));
/// RETRIES.write(&session.locals, 5);
/// assert_eq!(RETRIES.read(&session, &session.locals), Some(5));
/// ```
pub struct Attribute<H, T> {
    name: &'static str,
    visibility: Visibility,
    constant: Option<fn() -> T>,
    computed: Option<fn(&H, &str) -> T>,
}

impl<H, T> Attribute<H, T> {
    /// A public attribute with no default.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            visibility: Visibility::Public,
            constant: None,
            computed: None,
        }
    }

    /// Declares a constant default.
    pub const fn with_default(self, default: fn() -> T) -> Self {
        Self {
            constant: Some(default),
            ..self
        }
    }

    /// Declares a computed default, called with the host and the key on every miss.
    /// Takes precedence over a constant default.
    pub const fn with_default_fn(self, compute: fn(&H, &str) -> T) -> Self {
        Self {
            computed: Some(compute),
            ..self
        }
    }

    /// Sets the accessor visibility recorded in the descriptor.
    pub const fn with_visibility(self, visibility: Visibility) -> Self {
        Self { visibility, ..self }
    }

    /// The storage key.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The declared visibility.
    pub const fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Type-erased metadata.
    pub fn descriptor(&self) -> AttributeDescriptor {
        AttributeDescriptor {
            name: self.name,
            visibility: self.visibility,
            has_default: self.constant.is_some(),
            has_default_fn: self.computed.is_some(),
            value_type: std::any::type_name::<T>(),
        }
    }
}

impl<H, T: 'static> Attribute<H, T> {
    /// The calling thread's stored value, ignoring defaults.
    pub fn lookup(&self, store: &ThreadScopedStore) -> Option<T>
    where
        T: Clone,
    {
        store.get(self.name)
    }

    /// The calling thread's value, falling back to the declared defaults.
    pub fn read(&self, host: &H, store: &ThreadScopedStore) -> Option<T>
    where
        T: Clone,
    {
        self.lookup(store).or_else(|| self.fallback(host))
    }

    /// The value a read would produce on a miss.
    pub fn fallback(&self, host: &H) -> Option<T> {
        match (self.computed, self.constant) {
            (Some(compute), _) => Some(compute(host, self.name)),
            (None, Some(constant)) => Some(constant()),
            (None, None) => None,
        }
    }

    /// Stores `value` for the calling thread.
    pub fn write(&self, store: &ThreadScopedStore, value: T) {
        store.set(self.name, value);
    }

    /// Returns `true` if the calling thread has stored a value.
    pub fn is_set(&self, store: &ThreadScopedStore) -> bool {
        store.contains(self.name)
    }

    /// Removes the calling thread's value, so reads fall back to the defaults again.
    pub fn clear(&self, store: &ThreadScopedStore) -> bool {
        store.remove(self.name)
    }
}

impl<H, T> Clone for Attribute<H, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<H, T> Copy for Attribute<H, T> {}

impl<H, T> fmt::Debug for Attribute<H, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("visibility", &self.visibility)
            .field("has_default", &self.constant.is_some())
            .field("has_default_fn", &self.computed.is_some())
            .finish()
    }
}
