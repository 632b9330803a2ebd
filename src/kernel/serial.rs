/// A line-oriented serial output device.
pub trait Serial {
    /// Writes the formatted text out on the device.
    fn write_fmt(&self, args: core::fmt::Arguments);
}
