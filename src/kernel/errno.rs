use derive_more::Display;
use num_derive::{FromPrimitive, ToPrimitive};

/// Caller-visible error codes, reported alongside a -1 return value.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum Errno {
    /// A user-mode caller attempted a privileged operation, or a `kill` was
    /// not covered by ancestor/self rights
    #[display(fmt = "permission denied")]
    PermissionDenied = 1,
    /// The task table is full
    #[display(fmt = "too many tasks")]
    TooManyTasks = 2,
    /// The syscall number matches no handler
    #[display(fmt = "invalid syscall number")]
    InvalidSyscall = 3,
}
