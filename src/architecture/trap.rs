//! Rust side of the trap paths: the entry assembly, the handlers it calls
//! into, and vector-table installation.

use super::{cp15, vectors};
use crate::syscall::{user, Outcome};
use crate::task::Context;
use crate::{board, kernel, memory, println};
use core::arch::global_asm;
use core::cell::UnsafeCell;

global_asm!(
    include_str!("trap.s"),
    current = sym CURRENT_CONTEXT,
    tick = sym trap_tick,
    syscall = sym trap_syscall,
    abort = sym trap_data_abort,
    undefined = sym trap_undefined,
    svc_stack = sym SVC_STACK_TOP,
    abt_stack = sym ABT_STACK_TOP,
);

extern "C" {
    fn _irq_entry();
    fn _swi_entry();
    fn _data_abort_entry();
    fn _undefined_entry();
    fn _enter_task(context: *mut Context) -> !;
}

/// Stack-top words the entry assembly loads through.
static SVC_STACK_TOP: u32 = board::SVC_STACK;
static ABT_STACK_TOP: u32 = board::ABT_STACK;

/// Where the IRQ entry spills the interrupted register file: the running
/// task's saved context. The scheduler keeps this pointing at `current`.
#[repr(transparent)]
struct CurrentContext(UnsafeCell<*mut Context>);

// SAFETY: Written and read only with IRQs masked (trap entry or TrapCell
// access), on a single core
unsafe impl Sync for CurrentContext {}

static CURRENT_CONTEXT: CurrentContext = CurrentContext(UnsafeCell::new(core::ptr::null_mut()));

fn set_current_context(context: *mut Context) {
    // SAFETY: Callers run with IRQs masked, so the IRQ entry cannot read a
    // half-written pointer (and 32-bit stores are single instructions anyway)
    unsafe {
        *CURRENT_CONTEXT.0.get() = context;
    }
}

/// Writes the vector table at the board's base and, where the base is the
/// high one, flips the CP15 high-vectors bit.
pub fn install_vectors() {
    let handlers = vectors::TrapHandlers {
        undefined: _undefined_entry as usize as u32,
        software_interrupt: _swi_entry as usize as u32,
        data_abort: _data_abort_entry as usize as u32,
        irq: _irq_entry as usize as u32,
    };
    // SAFETY: The board guarantees writable memory behind its vector base,
    // and IRQs are still masked during interrupt-handling setup
    unsafe {
        vectors::install(board::IVT_BASE as *mut u32, &handlers);
    }
    if board::HIGH_VECTORS {
        // SAFETY: The table was just written at the high base
        unsafe {
            cp15::enable_high_vectors();
        }
    }
}

/// Hands the CPU to the task whose saved context is `context`.
///
/// # Safety
///
/// `context` must point at a live task's saved context inside the kernel
/// singleton, and the caller must be done with all borrowed kernel state.
pub unsafe fn enter_task(context: *mut Context) -> ! {
    set_current_context(context);
    // SAFETY: The context stays valid per the caller's guarantee; the asm
    // resets the SVC stack and never returns
    unsafe { _enter_task(context) }
}

/// The timer tick. The entry assembly has already captured the interrupted
/// context; rotate the ring and tell the assembly what to resume.
extern "C" fn trap_tick() -> *mut Context {
    board::timer_acknowledge();
    kernel::with(|k| {
        let slot = k.schedule();
        let context = k.context_ptr(slot);
        set_current_context(context);
        context
    })
}

/// The SWI gateway: dispatch, mirror errno for user-mode readers, and either
/// return a value in r0 or leave for another task entirely.
extern "C" fn trap_syscall(number: u32, data: *const u8) -> u32 {
    let (outcome, next) = kernel::with(|k| {
        // SAFETY: `data` is the caller's r1, which the ABI defines as the
        // argument-struct pointer for this call
        let outcome = unsafe { k.dispatch(number, data, &mut board::Console) };
        user::mirror_errno(k.errno());
        let next = match outcome {
            Outcome::Exited(Some(slot)) => Some(k.context_ptr(slot)),
            _ => None,
        };
        (outcome, next)
    });

    match outcome {
        Outcome::Return(value) => value,
        Outcome::Exited(Some(_)) => {
            let context = next.expect("a switch outcome carries a context");
            // SAFETY: The context points into the kernel singleton, and the
            // closure above has released its borrow
            unsafe { enter_task(context) }
        }
        Outcome::Exited(None) => {
            println!("last task exited, halting");
            board::halt();
        }
        Outcome::Shutdown => board::halt(),
    }
}

/// The data-abort leg: delegate to the MMU engine, then the assembly
/// restarts the faulting instruction.
extern "C" fn trap_data_abort(fault_pc: u32) {
    memory::handle_data_abort(fault_pc);
}

/// Undefined instruction: fatal.
extern "C" fn trap_undefined() -> ! {
    println!("undefined instruction trap");
    board::halt();
}
