//! Class-level method registry with deferred synchronization.
//!
//! Every method name of a [`ClassBuilder`] is in exactly one of three states:
//!
//! - unregistered: not declared thread-safe (it may or may not be defined);
//! - pending: declared thread-safe before being defined;
//! - active: defined, with the synchronized wrapper installed.
//!
//! `make_thread_safe` moves a defined name straight to active and an undefined
//! one to pending. Defining a pending name activates it at that moment. Declaring
//! an already pending or active name again does nothing, so a body is never wrapped
//! twice.

use super::monitor::{Invocation, Synchronizable};
use crate::error::{DefinitionError, MethodError};
use serde::Serialize;
use std::any::{type_name, Any};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

type Body<H, A, R> = Arc<dyn Fn(&H, &Invocation, A) -> R + Send + Sync>;
type Installed = Box<dyn Any + Send + Sync>;

/// Synchronization state of one method name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodState {
    /// Not declared thread-safe.
    Unregistered,
    /// Declared thread-safe, waiting for its definition.
    Pending,
    /// Defined and wrapped.
    Active,
}

/// The argument and return types a method was defined with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Signature {
    args: &'static str,
    ret: &'static str,
}

impl Signature {
    fn of<A, R>() -> Self {
        Self {
            args: type_name::<A>(),
            ret: type_name::<R>(),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) -> {}", self.args, self.ret)
    }
}

/// A body with its types erased, able to produce either callable form.
trait ErasedBody<H>: Send + Sync {
    fn plain(&self) -> Installed;
    fn synchronized(&self, name: &'static str) -> Installed;
    fn signature(&self) -> Signature;
}

struct Typed<H, A, R>(Body<H, A, R>);

impl<H, A, R> ErasedBody<H> for Typed<H, A, R>
where
    H: Synchronizable + 'static,
    A: 'static,
    R: 'static,
{
    fn plain(&self) -> Installed {
        Box::new(Arc::clone(&self.0))
    }

    fn synchronized(&self, name: &'static str) -> Installed {
        let body = Arc::clone(&self.0);
        let wrapped: Body<H, A, R> = Arc::new(move |host: &H, _: &Invocation, args: A| {
            host.monitor().run(name, |invocation| body(host, invocation, args))
        });
        Box::new(wrapped)
    }

    fn signature(&self) -> Signature {
        Signature::of::<A, R>()
    }
}

/// One defined method: the body as written and the form callers reach.
struct Entry<H> {
    original: Box<dyn ErasedBody<H>>,
    installed: Installed,
    synchronized: bool,
}

impl<H> Entry<H> {
    fn install(original: Box<dyn ErasedBody<H>>, name: &'static str, synchronized: bool) -> Self {
        let installed = if synchronized {
            original.synchronized(name)
        } else {
            original.plain()
        };
        Self {
            original,
            installed,
            synchronized,
        }
    }
}

/// Defines the methods of a class of hosts `H` and which of them are synchronized.
///
/// # Example
///
/// ```rust
/// use std::sync::atomic::{AtomicU64, Ordering};
/// use threadward::safer::{ClassBuilder, Monitor, Synchronizable};
///
/// #[derive(Default)]
/// struct Account {
///     balance: AtomicU64,
///     monitor: Monitor,
/// }
///
/// impl Synchronizable for Account {
///     fn monitor(&self) -> &Monitor {
///         &self.monitor
///     }
/// }
///
/// // Declared before it is defined: the wrapper is installed by `define`.
/// let class = ClassBuilder::<Account>::new("Account")
///     .make_thread_safe(["deposit"])
///     .define("deposit", |account: &Account, call, amount: u64| {
///         assert_eq!(call.synchronized_method(), Some("deposit"));
///         let seen = account.balance.load(Ordering::Relaxed);
///         account.balance.store(seen + amount, Ordering::Relaxed);
///     })
///     .build()
///     .unwrap();
///
/// let account = Account::default();
/// std::thread::scope(|s| {
///     for _ in 0..4 {
///         s.spawn(|| class.invoke::<u64, ()>(&account, "deposit", 10).unwrap());
///     }
/// });
/// assert_eq!(account.balance.load(Ordering::Relaxed), 40);
/// ```
pub struct ClassBuilder<H> {
    name: &'static str,
    methods: HashMap<&'static str, Entry<H>>,
    pending: BTreeSet<&'static str>,
}

impl<H: Synchronizable + 'static> ClassBuilder<H> {
    /// An empty class named `name`.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            methods: HashMap::new(),
            pending: BTreeSet::new(),
        }
    }

    /// Defines, or redefines, the method `name`.
    ///
    /// A pending name becomes active here. Redefining a name keeps its
    /// synchronization state and wraps the new body if it is active.
    pub fn define<A, R, F>(mut self, name: &'static str, body: F) -> Self
    where
        A: 'static,
        R: 'static,
        F: Fn(&H, &Invocation, A) -> R + Send + Sync + 'static,
    {
        let original: Box<dyn ErasedBody<H>> = Box::new(Typed::<H, A, R>(Arc::new(body)));
        let activated = self.pending.remove(name);
        let synchronized =
            activated || self.methods.get(name).is_some_and(|entry| entry.synchronized);
        if activated {
            crate::debug!(class = self.name, method = name, "pending method activated");
        }
        self.methods
            .insert(name, Entry::install(original, name, synchronized));
        self
    }

    /// Declares methods thread-safe, whether or not they are defined yet.
    pub fn make_thread_safe<I>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = &'static str>,
    {
        for name in names {
            match self.methods.remove(name) {
                Some(entry) if !entry.synchronized => {
                    crate::trace!(class = self.name, method = name, "method wrapped");
                    self.methods
                        .insert(name, Entry::install(entry.original, name, true));
                }
                Some(entry) => {
                    self.methods.insert(name, entry);
                }
                None => {
                    if self.pending.insert(name) {
                        crate::trace!(class = self.name, method = name, "method pending");
                    }
                }
            }
        }
        self
    }

    /// The synchronization state of `name`.
    pub fn state(&self, name: &str) -> MethodState {
        state_of(&self.methods, &self.pending, name)
    }

    /// Names declared thread-safe but not yet defined, sorted.
    pub fn pending(&self) -> Vec<&'static str> {
        self.pending.iter().copied().collect()
    }

    /// Returns `true` if `name` has a body.
    pub fn is_defined(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Finalizes the class.
    ///
    /// # Errors
    ///
    /// [`DefinitionError::PendingMethods`] if a name declared thread-safe was never
    /// defined.
    pub fn build(self) -> Result<Class<H>, DefinitionError> {
        if !self.pending.is_empty() {
            return Err(DefinitionError::PendingMethods {
                class: self.name,
                methods: self.pending.into_iter().collect(),
            });
        }
        crate::debug!(class = self.name, methods = self.methods.len(), "class built");
        Ok(Class {
            name: self.name,
            methods: self.methods,
        })
    }
}

impl<H> fmt::Debug for ClassBuilder<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassBuilder")
            .field("name", &self.name)
            .field("methods", &sorted_names(&self.methods))
            .field("pending", &self.pending)
            .finish()
    }
}

fn state_of<H>(
    methods: &HashMap<&'static str, Entry<H>>,
    pending: &BTreeSet<&'static str>,
    name: &str,
) -> MethodState {
    match methods.get(name) {
        Some(entry) if entry.synchronized => MethodState::Active,
        Some(_) => MethodState::Unregistered,
        None if pending.contains(name) => MethodState::Pending,
        None => MethodState::Unregistered,
    }
}

fn sorted_names<H>(methods: &HashMap<&'static str, Entry<H>>) -> Vec<&'static str> {
    let mut names: Vec<_> = methods.keys().copied().collect();
    names.sort_unstable();
    names
}

/// A finalized, immutable set of methods on hosts of type `H`.
///
/// `Class` is `Send + Sync`; share it behind a `static` or an `Arc`.
pub struct Class<H> {
    name: &'static str,
    methods: HashMap<&'static str, Entry<H>>,
}

impl<H: Synchronizable + 'static> Class<H> {
    /// Starts defining a class named `name`.
    pub fn builder(name: &'static str) -> ClassBuilder<H> {
        ClassBuilder::new(name)
    }

    /// The class name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The synchronization state of `name`. Never [`MethodState::Pending`].
    pub fn state(&self, name: &str) -> MethodState {
        state_of(&self.methods, &BTreeSet::new(), name)
    }

    /// Returns `true` if `name` is defined and synchronized.
    pub fn is_synchronized(&self, name: &str) -> bool {
        self.state(name) == MethodState::Active
    }

    /// Every defined method name, sorted.
    pub fn method_names(&self) -> Vec<&'static str> {
        sorted_names(&self.methods)
    }

    /// A typed handle to `name`.
    ///
    /// # Errors
    ///
    /// [`MethodError::Undefined`] if no method of that name exists, and
    /// [`MethodError::SignatureMismatch`] if it was defined with other types.
    pub fn method<A: 'static, R: 'static>(&self, name: &str) -> Result<Method<H, A, R>, MethodError> {
        let (&key, entry) =
            self.methods
                .get_key_value(name)
                .ok_or_else(|| MethodError::Undefined {
                    class: self.name,
                    method: name.to_owned(),
                })?;
        let body = entry
            .installed
            .downcast_ref::<Body<H, A, R>>()
            .ok_or_else(|| MethodError::SignatureMismatch {
                class: self.name,
                method: name.to_owned(),
                expected: entry.original.signature().to_string(),
                requested: Signature::of::<A, R>().to_string(),
            })?;
        Ok(Method {
            name: key,
            synchronized: entry.synchronized,
            body: Arc::clone(body),
        })
    }

    /// Calls `name` on `host`.
    ///
    /// # Errors
    ///
    /// See [`method`](Self::method). Errors are reported before the body runs; the
    /// body's own result is returned unchanged.
    pub fn invoke<A: 'static, R: 'static>(
        &self,
        host: &H,
        name: &str,
        args: A,
    ) -> Result<R, MethodError> {
        Ok(self.method::<A, R>(name)?.call(host, args))
    }
}

impl<H> fmt::Debug for Class<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("methods", &sorted_names(&self.methods))
            .finish()
    }
}

/// A typed, cheaply cloneable handle to one method of a [`Class`].
pub struct Method<H, A, R> {
    name: &'static str,
    synchronized: bool,
    body: Body<H, A, R>,
}

impl<H, A, R> Method<H, A, R> {
    /// The method name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` if calls take the host's monitor.
    pub fn is_synchronized(&self) -> bool {
        self.synchronized
    }

    /// Calls the method on `host`.
    pub fn call(&self, host: &H, args: A) -> R {
        (self.body)(host, &Invocation::plain(self.name), args)
    }
}

impl<H, A, R> Clone for Method<H, A, R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            synchronized: self.synchronized,
            body: Arc::clone(&self.body),
        }
    }
}

impl<H, A, R> fmt::Debug for Method<H, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("signature", &Signature::of::<A, R>())
            .field("synchronized", &self.synchronized)
            .finish()
    }
}
