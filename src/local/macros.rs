/// Declares thread-local attributes and generates a typed accessor pair for each.
///
/// Two forms:
///
/// - `impl Type { ... }` declares per-instance attributes. `Type` must implement
///   [`ThreadLocalHost`](crate::local::ThreadLocalHost); accessors take `&self`.
/// - `static Type { ... }` declares class-level attributes stored in a `static`.
///   It implements [`ClassLocalHost`](crate::local::ClassLocalHost) for `Type`, so it
///   may appear once per type; accessors are associated functions.
///
/// Each attribute is `vis reader, writer [as "key"]: Type [= default | => compute];`
///
/// - The visibility applies to both accessors.
/// - The key defaults to the reader's name. Give an explicit key when the same
///   attribute name is declared at both levels of one type.
/// - `= expr` is a constant default, evaluated on every missing read.
/// - `=> f` is a computed default, called as `f(&host, key)` on every missing read.
///   Class-level computed defaults receive a [`TypeHost`](crate::local::TypeHost).
/// - Readers return `T` when a default is declared and `Option<T>` otherwise.
///
/// Each form also generates a descriptor listing: `thread_local_attributes()` for
/// instance attributes and `class_thread_local_attributes()` for class-level ones.
/// Because of that listing, each form may appear at most once per type: declare
/// all of a type's instance attributes in one `impl` block.
///
/// ```compile_fail
/// use threadward::local::{ThreadLocalHost, ThreadScopedStore};
/// use threadward::thread_locals;
///
/// struct Split {
///     locals: ThreadScopedStore,
/// }
///
/// impl ThreadLocalHost for Split {
///     fn thread_locals(&self) -> &ThreadScopedStore {
///         &self.locals
///     }
/// }
///
/// thread_locals! { impl Split { pub a, set_a: u8; } }
/// // Second listing for the same type: duplicate definition.
/// thread_locals! { impl Split { pub b, set_b: u8; } }
/// ```
///
/// # Example
///
/// ```rust
/// use threadward::local::{ThreadLocalHost, ThreadScopedStore};
/// use threadward::thread_locals;
///
/// #[derive(Default)]
/// struct Worker {
///     locals: ThreadScopedStore,
/// }
///
/// impl ThreadLocalHost for Worker {
///     fn thread_locals(&self) -> &ThreadScopedStore {
///         &self.locals
///     }
/// }
///
/// thread_locals! {
///     impl Worker {
///         pub count, set_count: i32 = 0;
///         pub label, set_label: String => |_: &Worker, key: &str| format!("default {key}");
///         pub(crate) note, set_note: String;
///     }
/// }
///
/// thread_locals! {
///     static Worker {
///         pub mode, set_mode as "count": &'static str = "idle";
///     }
/// }
///
/// let worker = Worker::default();
/// assert_eq!(worker.count(), 0);
/// worker.set_count(5);
/// assert_eq!(worker.count(), 5);
/// assert_eq!(worker.label(), "default label");
/// assert_eq!(worker.note(), None);
///
/// std::thread::scope(|s| {
///     s.spawn(|| assert_eq!(worker.count(), 0));
/// });
///
/// // Same key, different host: the class-level value is independent.
/// assert_eq!(Worker::mode(), "idle");
/// Worker::set_mode("busy");
/// assert_eq!(worker.count(), 5);
/// ```
#[macro_export]
macro_rules! thread_locals {
    (impl $host:ty {
        $(
            $(#[$meta:meta])*
            $vis:vis $get:ident, $set:ident $(as $key:literal)? : $ty:ty
                $(= $default:expr)? $(=> $compute:expr)? ;
        )*
    }) => {
        impl $host {
            $(
                $crate::thread_locals!(@instance
                    $(#[$meta])* $vis $get, $set, $crate::thread_locals!(@key $get $($key)?), $ty;
                    [$($default)?] [$($compute)?]
                );
            )*

            /// Descriptors of this type's per-instance thread-local attributes.
            #[allow(dead_code)]
            pub fn thread_local_attributes() -> ::std::vec::Vec<$crate::local::AttributeDescriptor> {
                ::std::vec![$(
                    $crate::thread_locals!(@attr Self, $ty,
                        $crate::thread_locals!(@key $get $($key)?), stringify!($vis);
                        [$($default)?] [$($compute)?]
                    ).descriptor()
                ),*]
            }
        }
    };

    (static $host:ty {
        $(
            $(#[$meta:meta])*
            $vis:vis $get:ident, $set:ident $(as $key:literal)? : $ty:ty
                $(= $default:expr)? $(=> $compute:expr)? ;
        )*
    }) => {
        impl $crate::local::ClassLocalHost for $host {
            fn class_thread_locals() -> &'static $crate::local::ThreadScopedStore {
                static STORE: $crate::local::ThreadScopedStore = $crate::local::ThreadScopedStore::new();
                &STORE
            }
        }

        impl $host {
            $(
                $crate::thread_locals!(@class
                    $(#[$meta])* $vis $get, $set, $crate::thread_locals!(@key $get $($key)?), $ty;
                    [$($default)?] [$($compute)?]
                );
            )*

            /// Descriptors of this type's class-level thread-local attributes.
            #[allow(dead_code)]
            pub fn class_thread_local_attributes() -> ::std::vec::Vec<$crate::local::AttributeDescriptor> {
                ::std::vec![$(
                    $crate::thread_locals!(@attr $crate::local::TypeHost<Self>, $ty,
                        $crate::thread_locals!(@key $get $($key)?), stringify!($vis);
                        [$($default)?] [$($compute)?]
                    ).descriptor()
                ),*]
            }
        }
    };

    (@key $get:ident) => { stringify!($get) };
    (@key $get:ident $key:literal) => { $key };

    (@attr $host:ty, $ty:ty, $key:expr, $vis:expr; [] []) => {
        $crate::local::Attribute::<$host, $ty>::new($key)
            .with_visibility($crate::local::Visibility::from_tokens($vis))
    };
    (@attr $host:ty, $ty:ty, $key:expr, $vis:expr; [$default:expr] []) => {
        $crate::thread_locals!(@attr $host, $ty, $key, $vis; [] [])
            .with_default(|| -> $ty { $default })
    };
    (@attr $host:ty, $ty:ty, $key:expr, $vis:expr; [$($default:expr)?] [$compute:expr]) => {
        $crate::thread_locals!(@attr $host, $ty, $key, $vis; [$($default)?] [])
            .with_default_fn($compute)
    };

    (@instance $(#[$meta:meta])* $vis:vis $get:ident, $set:ident, $key:expr, $ty:ty; [] []) => {
        $(#[$meta])*
        $vis fn $get(&self) -> ::core::option::Option<$ty> {
            let store = <Self as $crate::local::ThreadLocalHost>::thread_locals(self);
            store.get::<$ty>($key)
        }

        $(#[$meta])*
        $vis fn $set(&self, value: $ty) {
            let store = <Self as $crate::local::ThreadLocalHost>::thread_locals(self);
            store.set::<$ty>($key, value);
        }
    };
    (@instance $(#[$meta:meta])* $vis:vis $get:ident, $set:ident, $key:expr, $ty:ty; [$default:expr] []) => {
        $(#[$meta])*
        $vis fn $get(&self) -> $ty {
            let store = <Self as $crate::local::ThreadLocalHost>::thread_locals(self);
            store.get::<$ty>($key).unwrap_or_else(|| $default)
        }

        $(#[$meta])*
        $vis fn $set(&self, value: $ty) {
            let store = <Self as $crate::local::ThreadLocalHost>::thread_locals(self);
            store.set::<$ty>($key, value);
        }
    };
    (@instance $(#[$meta:meta])* $vis:vis $get:ident, $set:ident, $key:expr, $ty:ty; [$($default:expr)?] [$compute:expr]) => {
        $(#[$meta])*
        $vis fn $get(&self) -> $ty {
            let store = <Self as $crate::local::ThreadLocalHost>::thread_locals(self);
            let compute: fn(&Self, &str) -> $ty = $compute;
            store.get::<$ty>($key).unwrap_or_else(|| compute(self, $key))
        }

        $(#[$meta])*
        $vis fn $set(&self, value: $ty) {
            let store = <Self as $crate::local::ThreadLocalHost>::thread_locals(self);
            store.set::<$ty>($key, value);
        }
    };

    (@class $(#[$meta:meta])* $vis:vis $get:ident, $set:ident, $key:expr, $ty:ty; [] []) => {
        $(#[$meta])*
        $vis fn $get() -> ::core::option::Option<$ty> {
            let store = <Self as $crate::local::ClassLocalHost>::class_thread_locals();
            store.get::<$ty>($key)
        }

        $(#[$meta])*
        $vis fn $set(value: $ty) {
            let store = <Self as $crate::local::ClassLocalHost>::class_thread_locals();
            store.set::<$ty>($key, value);
        }
    };
    (@class $(#[$meta:meta])* $vis:vis $get:ident, $set:ident, $key:expr, $ty:ty; [$default:expr] []) => {
        $(#[$meta])*
        $vis fn $get() -> $ty {
            let store = <Self as $crate::local::ClassLocalHost>::class_thread_locals();
            store.get::<$ty>($key).unwrap_or_else(|| $default)
        }

        $(#[$meta])*
        $vis fn $set(value: $ty) {
            let store = <Self as $crate::local::ClassLocalHost>::class_thread_locals();
            store.set::<$ty>($key, value);
        }
    };
    (@class $(#[$meta:meta])* $vis:vis $get:ident, $set:ident, $key:expr, $ty:ty; [$($default:expr)?] [$compute:expr]) => {
        $(#[$meta])*
        $vis fn $get() -> $ty {
            let store = <Self as $crate::local::ClassLocalHost>::class_thread_locals();
            let compute: fn(&$crate::local::TypeHost<Self>, &str) -> $ty = $compute;
            store
                .get::<$ty>($key)
                .unwrap_or_else(|| compute(&$crate::local::TypeHost::<Self>::new(), $key))
        }

        $(#[$meta])*
        $vis fn $set(value: $ty) {
            let store = <Self as $crate::local::ClassLocalHost>::class_thread_locals();
            store.set::<$ty>($key, value);
        }
    };
}
