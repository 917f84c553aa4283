//! Blocking locks and the synchronized proxy.
//!
//! Everything here is built on [`Lock`], a small non-reentrant mutex that parks
//! contended threads on the platform's address-wait primitive (futex on Linux,
//! `WaitOnAddress` on Windows) and falls back to yielding elsewhere.
//!
//! Unlike `std::sync::Mutex`, a [`Lock`] guards no data and never poisons: a
//! panic that unwinds through a guard simply releases the lock.

pub mod lock;
pub mod proxy;

mod macros;

pub use lock::{Lock, LockGuard};
pub use proxy::{Synchronized, SynchronizedGuard};

use core::sync::atomic::AtomicU32;
#[cfg(not(target_os = "linux"))]
use core::sync::atomic::Ordering;

#[cfg(windows)]
use windows_sys::Win32::System::Threading::{WaitOnAddress, WakeByAddressSingle};

#[cfg(target_os = "linux")]
use libc::{SYS_futex, FUTEX_PRIVATE_FLAG, FUTEX_WAIT, FUTEX_WAKE};

#[cfg(target_os = "linux")]
#[inline]
fn futex_wait(addr: &AtomicU32, expected: u32) {
    // A spurious return is fine: callers re-check the state word in a loop.
    unsafe {
        libc::syscall(
            SYS_futex,
            addr.as_ptr(),
            FUTEX_WAIT | FUTEX_PRIVATE_FLAG,
            expected,
            core::ptr::null::<libc::timespec>(),
        );
    }
}

#[cfg(target_os = "linux")]
#[inline]
fn futex_wake(addr: &AtomicU32, count: i32) {
    unsafe {
        libc::syscall(SYS_futex, addr.as_ptr(), FUTEX_WAKE | FUTEX_PRIVATE_FLAG, count);
    }
}

/// Blocks the current thread while `addr` holds `expected`.
///
/// May return spuriously; callers must re-check the value.
#[inline]
pub fn wait_on_u32(addr: &AtomicU32, expected: u32) {
    #[cfg(target_os = "linux")]
    futex_wait(addr, expected);

    #[cfg(windows)]
    unsafe {
        let expected_ptr = (&expected as *const u32).cast::<core::ffi::c_void>();
        let addr_ptr = addr.as_ptr().cast::<core::ffi::c_void>().cast_const();
        WaitOnAddress(addr_ptr, expected_ptr, core::mem::size_of::<u32>(), u32::MAX);
    }

    #[cfg(not(any(windows, target_os = "linux")))]
    while addr.load(Ordering::Acquire) == expected {
        std::thread::yield_now();
    }
}

/// Wakes one thread blocked in [`wait_on_u32`] on `addr`.
#[inline]
pub fn wake_one_u32(addr: &AtomicU32) {
    #[cfg(target_os = "linux")]
    futex_wake(addr, 1);

    #[cfg(windows)]
    unsafe {
        WakeByAddressSingle(addr.as_ptr().cast::<core::ffi::c_void>().cast_const());
    }

    #[cfg(not(any(windows, target_os = "linux")))]
    let _ = addr;
}
