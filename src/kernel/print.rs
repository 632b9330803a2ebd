/// Writes the given information out to the serial output
#[cfg(target_arch = "arm")]
pub fn _print(args: core::fmt::Arguments) {
    use crate::{board, kernel::Serial};
    board::serial().write_fmt(args);
}

/// Host builds have no serial device; console output only exists on hardware
#[cfg(not(target_arch = "arm"))]
pub fn _print(_args: core::fmt::Arguments) {}

/// Discards the input arguments
pub fn _unused(_args: core::fmt::Arguments) {}

/// Print to serial output
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::kernel::print::_print(format_args!($($arg)*)));
}

/// Print, with a newline, to serial output
#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ({
        $crate::kernel::print::_print(format_args!("{}\n", format_args!($($arg)*)));
    })
}

/// Prints kernel diagnostics, compiled out unless the `verbose` feature is on
#[macro_export]
#[cfg(feature = "verbose")]
macro_rules! log {
    ($($arg:tt)*) => ({
        $crate::kernel::print::_print(format_args!("[kernel] {}\n", format_args!($($arg)*)));
    })
}

/// A no-op logging mechanism
#[macro_export]
#[cfg(not(feature = "verbose"))]
macro_rules! log {
    ($($arg:tt)*) => ({
        $crate::kernel::print::_unused(format_args!($($arg)*));
    })
}
