use num_derive::{FromPrimitive, ToPrimitive};

/// The CPSR mode field values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum ProcessorMode {
    User = 0x10,
    Fiq = 0x11,
    Irq = 0x12,
    Supervisor = 0x13,
    Abort = 0x17,
    Undefined = 0x1B,
    System = 0x1F,
}

/// Represents the privilege level of some execution context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrivilegeLevel {
    /// Unprivileged user mode
    User,
    /// Any of the privileged modes
    Kernel,
}

#[cfg(target_arch = "arm")]
mod hardware {
    use super::{PrivilegeLevel, ProcessorMode};
    use core::arch::asm;

    /// Mask for the CPSR mode field.
    const MODE_MASK: u32 = 0x1F;
    /// The CPSR I bit; set masks IRQs.
    const IRQ_MASK: u32 = 0x80;

    fn cpsr() -> u32 {
        let cpsr;
        // SAFETY: Reading CPSR has no side effects
        unsafe {
            asm!("mrs {}, cpsr", out(reg) cpsr, options(nomem, nostack, preserves_flags));
        }
        cpsr
    }

    /// The privilege of the current execution context.
    pub fn privilege_level() -> PrivilegeLevel {
        if cpsr() & MODE_MASK == ProcessorMode::User as u32 {
            PrivilegeLevel::User
        } else {
            PrivilegeLevel::Kernel
        }
    }

    /// Gives `mode` its banked stack pointer by briefly switching the core
    /// into it and back to SVC.
    ///
    /// # Safety
    ///
    /// Must run privileged with IRQs masked, `stack_top` must be backed
    /// memory reserved for that mode, and nothing may be executing in `mode`
    /// concurrently.
    pub unsafe fn set_mode_stack(mode: ProcessorMode, stack_top: u32) {
        // SAFETY: The whole switch-set-return sequence is one asm block, so
        // the compiler never sees the foreign mode
        unsafe {
            asm!(
                "mrs {scratch}, cpsr",
                "bic {scratch}, {scratch}, {mask}",
                "orr {scratch}, {scratch}, {mode}",
                "msr cpsr_c, {scratch}",
                "mov sp, {stack}",
                "bic {scratch}, {scratch}, {mask}",
                "orr {scratch}, {scratch}, {svc}",
                "msr cpsr_c, {scratch}",
                scratch = out(reg) _,
                mask = in(reg) MODE_MASK,
                mode = in(reg) mode as u32,
                stack = in(reg) stack_top,
                svc = in(reg) ProcessorMode::Supervisor as u32,
                options(nomem, preserves_flags)
            );
        }
    }

    /// Lets IRQs through to the core by clearing the CPSR I bit.
    ///
    /// # Safety
    ///
    /// Trap handling must be fully initialized.
    pub unsafe fn enable_irq() {
        // SAFETY: Only the I bit changes
        unsafe {
            asm!(
                "mrs {scratch}, cpsr",
                "bic {scratch}, {scratch}, {mask}",
                "msr cpsr_c, {scratch}",
                scratch = out(reg) _,
                mask = in(reg) IRQ_MASK,
                options(nomem, nostack, preserves_flags)
            );
        }
    }

    /// Masks IRQs while alive and restores the prior mask state on drop.
    pub struct IrqGuard {
        saved_cpsr: u32,
    }

    impl IrqGuard {
        pub fn new() -> Self {
            let saved_cpsr = cpsr();
            // SAFETY: Only the I bit changes, and the guard restores it
            unsafe {
                asm!(
                    "msr cpsr_c, {masked}",
                    masked = in(reg) saved_cpsr | IRQ_MASK,
                    options(nomem, nostack, preserves_flags)
                );
            }
            Self { saved_cpsr }
        }
    }

    impl Default for IrqGuard {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Drop for IrqGuard {
        fn drop(&mut self) {
            // SAFETY: Restores the exact state captured at construction
            unsafe {
                asm!(
                    "msr cpsr_c, {saved}",
                    saved = in(reg) self.saved_cpsr,
                    options(nomem, nostack, preserves_flags)
                );
            }
        }
    }
}

#[cfg(target_arch = "arm")]
pub use hardware::{enable_irq, privilege_level, set_mode_stack, IrqGuard};
