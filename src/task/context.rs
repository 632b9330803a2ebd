use crate::architecture::mode::ProcessorMode;

/// A task's saved register file.
///
/// The trap entry assembly spills and reloads this by fixed offsets: `regs`
/// at 0x00..0x34, `sp` at 0x34, `lr` at 0x38, `pc` at 0x3C and `cpsr` at
/// 0x40. The layout must therefore stay exactly as declared.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Context {
    /// General-purpose registers r0..=r12
    pub regs: [u32; 13],
    pub sp: u32,
    pub lr: u32,
    pub pc: u32,
    pub cpsr: u32,
}

impl Context {
    pub const ZERO: Self = Self {
        regs: [0; 13],
        sp: 0,
        lr: 0,
        pc: 0,
        cpsr: 0,
    };

    /// A fresh user-mode context: execution starts at `pc` on the stack
    /// topped at `sp`, and falls through to `lr` when the entry function
    /// returns.
    pub fn user(pc: u32, sp: u32, lr: u32) -> Self {
        Self {
            regs: [0; 13],
            sp,
            lr,
            pc,
            cpsr: ProcessorMode::User as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Context;
    use core::mem::{offset_of, size_of};

    // The trap assembly hard-codes these offsets.
    #[test]
    fn layout_matches_trap_assembly() {
        assert_eq!(offset_of!(Context, regs), 0x00);
        assert_eq!(offset_of!(Context, sp), 0x34);
        assert_eq!(offset_of!(Context, lr), 0x38);
        assert_eq!(offset_of!(Context, pc), 0x3C);
        assert_eq!(offset_of!(Context, cpsr), 0x40);
        assert_eq!(size_of::<Context>(), 0x44);
    }

    #[test]
    fn fresh_user_context_starts_unprivileged() {
        let context = Context::user(0x8000, 0x0010_0000, 0x8100);
        assert_eq!(context.cpsr, 0x10);
        assert_eq!(context.pc, 0x8000);
        assert_eq!(context.sp, 0x0010_0000);
        assert_eq!(context.lr, 0x8100);
        assert_eq!(context.regs, [0; 13]);
    }
}
