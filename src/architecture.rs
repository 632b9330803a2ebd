//! ARM-specific mechanisms: processor modes, CP15 access, the exception
//! vector table and the trap entry paths.

/// CP15 system-control primitives
#[cfg(target_arch = "arm")]
pub mod cp15;
/// Processor modes, privilege, per-mode stacks, IRQ masking
pub mod mode;
/// Trap entry assembly and its Rust glue
#[cfg(target_arch = "arm")]
pub mod trap;
/// Exception vector-table encoding and installation
pub mod vectors;

/// Readies trap handling: writes the vector table at the board's base, gives
/// the IRQ and abort modes their stacks, unmasks the timer and SWI lines at
/// the interrupt controller, and finally lets IRQs through to the core.
#[cfg(target_arch = "arm")]
pub fn init_interrupt_handling() {
    use crate::board;

    trap::install_vectors();
    // SAFETY: The stack bases are reserved for these modes by the board
    // memory map, and nothing is executing in either mode yet
    unsafe {
        mode::set_mode_stack(mode::ProcessorMode::Irq, board::IRQ_STACK);
        mode::set_mode_stack(mode::ProcessorMode::Abort, board::ABT_STACK);
    }
    board::init_interrupt_controller();
    // SAFETY: Handlers, stacks and the controller are in place, so taking an
    // IRQ is well defined from here on
    unsafe {
        mode::enable_irq();
    }
}
