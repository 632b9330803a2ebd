//! The board hardware-abstraction layer.
//!
//! Exactly one board feature must be selected. Each board module exports the
//! same surface: the vector base and stack constants, `DATA_END`, the timer
//! primitives and load value, the interrupt-controller setup, the serial
//! device and the halt primitive.

use crate::kernel::Serial;
use core::fmt;

/// Memory-mapped IO wrapper
pub mod mmio;
pub use mmio::Mmio;

#[cfg(all(feature = "board-qemu", feature = "board-ev3"))]
compile_error!("select exactly one board feature");
#[cfg(not(any(feature = "board-qemu", feature = "board-ev3")))]
compile_error!("select a board feature (board-qemu or board-ev3)");

#[cfg(feature = "board-qemu")]
mod qemu;
#[cfg(feature = "board-qemu")]
pub use qemu::*;

#[cfg(feature = "board-ev3")]
mod ev3;
#[cfg(feature = "board-ev3")]
pub use ev3::*;

/// `fmt::Write` adapter over the board serial device, for code that renders
/// into a writer.
pub struct Console;

impl fmt::Write for Console {
    fn write_str(&mut self, text: &str) -> fmt::Result {
        serial().write_fmt(format_args!("{text}"));
        Ok(())
    }
}
