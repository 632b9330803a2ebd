use core::cell::UnsafeCell;
use core::ops::Deref;

/// A cell that may only be initialized once and exactly once.
pub struct InitCell<T>(UnsafeCell<Option<T>>);

// SAFETY: Single core; the cell is written once during initialization before
// any reader exists, and is immutable afterwards
unsafe impl<T> Sync for InitCell<T> {}

impl<T> InitCell<T> {
    /// Creates a new, empty `InitCell`
    pub const fn new() -> Self {
        Self(UnsafeCell::new(None))
    }

    /// Sets the `InitCell` to the given value
    ///
    /// # Safety
    ///
    /// The `InitCell` must be fully set before anyone attempts to read its
    /// value, and may only be set once.
    ///
    /// # Panics
    ///
    /// Panics if the cell was already set.
    pub unsafe fn set(&self, value: T) {
        // SAFETY: The caller guarantees exclusive access during initialization
        let inner = unsafe { &mut *self.0.get() };
        assert!(inner.is_none(), "`InitCell` must only be set once");
        *inner = Some(value);
    }
}

impl<T> Deref for InitCell<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // SAFETY: Once set, the cell is never mutated again, so shared
        // references are always valid
        unsafe { &*self.0.get() }
            .as_ref()
            .expect("`InitCell` should be initialized before access")
    }
}

/// Interior mutability for state owned by the trap handlers.
///
/// Access masks IRQs for its duration, so a timer tick cannot observe the
/// state mid-update. Together with the CPU masking interrupts on every
/// exception entry, this makes all mutation of the wrapped value effectively
/// serial on a single core.
///
/// Accesses must not nest; every `with` caller is a leaf of the trap path.
#[cfg(target_arch = "arm")]
pub struct TrapCell<T>(UnsafeCell<T>);

// SAFETY: Single core, and every access holds the IRQ mask; see above
#[cfg(target_arch = "arm")]
unsafe impl<T> Sync for TrapCell<T> {}

#[cfg(target_arch = "arm")]
impl<T> TrapCell<T> {
    pub const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }

    /// Runs `work` on the wrapped value with IRQs masked.
    pub fn with<R>(&self, work: impl FnOnce(&mut T) -> R) -> R {
        let _masked = crate::architecture::mode::IrqGuard::new();
        // SAFETY: IRQs are masked and accesses do not nest, so this is the
        // only live reference to the value
        work(unsafe { &mut *self.0.get() })
    }
}
