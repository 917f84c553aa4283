/// Implements a trait for [`Synchronized<T>`](crate::Synchronized) by forwarding
/// every method to the target while holding the proxy's lock.
///
/// This is how a proxy becomes call-compatible with its target: the capability
/// set is whatever traits you forward. Methods may take `&self` or `&mut self`;
/// generic methods and trailing commas in parameter lists are not supported.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use threadward::{forward_synchronized, Synchronized};
///
/// pub trait Counter {
///     fn bump(&self, by: u64) -> u64;
///     fn value(&self) -> u64;
/// }
///
/// #[derive(Default)]
/// struct Plain(Cell<u64>);
///
/// impl Counter for Plain {
///     fn bump(&self, by: u64) -> u64 {
///         self.0.set(self.0.get() + by);
///         self.0.get()
///     }
///     fn value(&self) -> u64 {
///         self.0.get()
///     }
/// }
///
/// forward_synchronized! {
///     impl Counter {
///         fn bump(&self, by: u64) -> u64;
///         fn value(&self) -> u64;
///     }
/// }
///
/// let shared = Synchronized::new(Plain::default());
/// std::thread::scope(|s| {
///     for _ in 0..8 {
///         s.spawn(|| shared.bump(1));
///     }
/// });
/// assert_eq!(shared.value(), 8);
/// ```
#[macro_export]
macro_rules! forward_synchronized {
    (impl $tr:path { $($methods:tt)* }) => {
        impl<T: $tr> $tr for $crate::sync::Synchronized<T> {
            $crate::forward_synchronized!(@methods $tr; $($methods)*);
        }
    };

    (@methods $tr:path;) => {};

    (@methods $tr:path;
        fn $m:ident(&self $(, $arg:ident : $ty:ty)*) $(-> $ret:ty)?;
        $($rest:tt)*
    ) => {
        fn $m(&self $(, $arg: $ty)*) $(-> $ret)? {
            let guard = self.lock_target();
            <T as $tr>::$m(&*guard $(, $arg)*)
        }
        $crate::forward_synchronized!(@methods $tr; $($rest)*);
    };

    (@methods $tr:path;
        fn $m:ident(&mut self $(, $arg:ident : $ty:ty)*) $(-> $ret:ty)?;
        $($rest:tt)*
    ) => {
        fn $m(&mut self $(, $arg: $ty)*) $(-> $ret)? {
            let mut guard = self.lock_target();
            <T as $tr>::$m(&mut *guard $(, $arg)*)
        }
        $crate::forward_synchronized!(@methods $tr; $($rest)*);
    };
}
