//! The syscall surface.
//!
//! The ABI is `r0` = number, `r1` = pointer to a per-call argument struct,
//! `SVC #0`, result back in `r0`. The dispatcher decodes the number, reads
//! the argument struct and returns a [`Outcome`] telling the SWI glue how to
//! leave the trap: with a plain return value, by switching to another task's
//! context, or by halting the machine.

use crate::kernel::errno::Errno;
use crate::kernel::Kernel;
use crate::task::KillError;
use core::fmt::{self, Write};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

/// User-mode call wrappers
#[cfg(target_arch = "arm")]
pub mod user;

/// All syscall numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive)]
pub enum Syscall {
    /// Not a real call; prints a notice
    Zero = 0,
    CreateProcess = 1,
    Exit = 2,
    GetPid = 3,
    GetParentPid = 4,
    Kill = 5,
    IsPredecessor = 6,
    TasksInfo = 42,
    Shutdown = 99,
}

/// Argument struct for [`Syscall::CreateProcess`].
#[repr(C)]
pub struct CreateProcessArgs {
    /// Entry point of the new task
    pub function: u32,
}

/// Argument struct for [`Syscall::Kill`].
#[repr(C)]
pub struct KillArgs {
    pub pid: u32,
}

/// Argument struct for [`Syscall::IsPredecessor`].
#[repr(C)]
pub struct IsPredecessorArgs {
    pub child: u32,
    pub pred: u32,
}

/// What the SWI glue must do after a call was dispatched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Return the value to the caller in r0
    Return(u32),
    /// The caller is gone; resume the given slot, or halt if none is left
    Exited(Option<usize>),
    /// Halt the machine
    Shutdown,
}

/// -1 as the register-sized error marker.
const FAILURE: u32 = -1_i32 as u32;

impl Kernel {
    /// Decodes and runs one syscall.
    ///
    /// # Safety
    ///
    /// For the calls that take arguments, `data` must point to that call's
    /// argument struct. The kernel trusts its user tasks on this; they share
    /// the identity-mapped address space.
    pub unsafe fn dispatch(
        &mut self,
        number: u32,
        data: *const u8,
        console: &mut dyn fmt::Write,
    ) -> Outcome {
        let Some(call) = Syscall::from_u32(number) else {
            self.errno = Some(Errno::InvalidSyscall);
            return Outcome::Return(FAILURE);
        };

        match call {
            Syscall::Zero => {
                let _ = writeln!(console, "this is not a real syscall");
                Outcome::Return(0)
            }
            Syscall::CreateProcess => {
                // SAFETY: The caller passes a `CreateProcessArgs`
                let args = unsafe { data.cast::<CreateProcessArgs>().read() };
                // The trap already runs privileged; the user-mode gate
                // applies to direct `add_task` calls, not to this path
                let result = self.add_task(args.function, crate::architecture::mode::PrivilegeLevel::Kernel);
                Outcome::Return(result.map_or(FAILURE, |pid| pid))
            }
            Syscall::Exit => Outcome::Exited(self.exit_current()),
            Syscall::GetPid => Outcome::Return(self.current_pid()),
            Syscall::GetParentPid => Outcome::Return(self.current_parent_pid()),
            Syscall::Kill => {
                // SAFETY: The caller passes a `KillArgs`
                let args = unsafe { data.cast::<KillArgs>().read() };
                match self.kill(args.pid) {
                    Ok(()) => Outcome::Return(0),
                    Err(KillError::Yourself) => {
                        let _ = writeln!(console, "do not kill() yourself, use exit()");
                        Outcome::Return(FAILURE)
                    }
                    Err(_) => Outcome::Return(FAILURE),
                }
            }
            Syscall::IsPredecessor => {
                // SAFETY: The caller passes an `IsPredecessorArgs`
                let args = unsafe { data.cast::<IsPredecessorArgs>().read() };
                Outcome::Return(u32::from(self.is_descendent_of(args.child, args.pred)))
            }
            Syscall::TasksInfo => {
                let _ = self.write_debug_info(console);
                Outcome::Return(0)
            }
            Syscall::Shutdown => Outcome::Shutdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::architecture::mode::PrivilegeLevel;
    use crate::task::TaskConfig;

    fn booted_kernel() -> Kernel {
        let mut k = Kernel::new(TaskConfig {
            stack_base: 0x0100_0000,
            stack_size: 0x1_0000,
            exit_trampoline: 0,
        });
        k.add_task(0x8000, PrivilegeLevel::Kernel).unwrap();
        k.start();
        k
    }

    fn dispatch(kernel: &mut Kernel, number: u32, data: *const u8) -> Outcome {
        let mut console = String::new();
        // SAFETY: Tests pass pointers to the matching argument structs
        unsafe { kernel.dispatch(number, data, &mut console) }
    }

    #[test]
    fn unknown_numbers_fail_with_invalid_syscall() {
        let mut k = booted_kernel();
        let outcome = dispatch(&mut k, 7, core::ptr::null());
        assert_eq!(outcome, Outcome::Return(FAILURE));
        assert_eq!(k.errno(), Some(Errno::InvalidSyscall));
    }

    #[test]
    fn zero_is_not_a_real_syscall() {
        let mut k = booted_kernel();
        let mut console = String::new();
        // SAFETY: Syscall 0 reads no arguments
        let outcome = unsafe { k.dispatch(0, core::ptr::null(), &mut console) };
        assert_eq!(outcome, Outcome::Return(0));
        assert!(console.contains("not a real syscall"));
    }

    #[test]
    fn create_process_returns_the_new_pid() {
        let mut k = booted_kernel();
        let args = CreateProcessArgs { function: 0x9000 };
        let outcome = dispatch(&mut k, 1, core::ptr::from_ref(&args).cast());
        assert_eq!(outcome, Outcome::Return(2));
        assert_eq!(k.task_count(), 2);
    }

    #[test]
    fn create_process_reports_a_full_table() {
        let mut k = booted_kernel();
        for _ in 1..crate::task::MAX_TASK_NUMBER {
            k.add_task(0x9000, PrivilegeLevel::Kernel).unwrap();
        }
        let args = CreateProcessArgs { function: 0x9000 };
        let outcome = dispatch(&mut k, 1, core::ptr::from_ref(&args).cast());
        assert_eq!(outcome, Outcome::Return(FAILURE));
        assert_eq!(k.errno(), Some(Errno::TooManyTasks));
    }

    #[test]
    fn get_pid_and_parent() {
        let mut k = booted_kernel();
        assert_eq!(dispatch(&mut k, 3, core::ptr::null()), Outcome::Return(1));
        assert_eq!(dispatch(&mut k, 4, core::ptr::null()), Outcome::Return(1));
    }

    #[test]
    fn exit_switches_away_from_the_caller() {
        let mut k = booted_kernel();
        k.add_task(0x9000, PrivilegeLevel::Kernel).unwrap();
        let outcome = dispatch(&mut k, 2, core::ptr::null());
        assert_eq!(outcome, Outcome::Exited(Some(1)));
        assert_eq!(k.current_pid(), 2);
        // Last task out turns off the lights
        let outcome = dispatch(&mut k, 2, core::ptr::null());
        assert_eq!(outcome, Outcome::Exited(None));
    }

    #[test]
    fn kill_of_self_fails_via_the_syscall_too() {
        let mut k = booted_kernel();
        let args = KillArgs { pid: 1 };
        let outcome = dispatch(&mut k, 5, core::ptr::from_ref(&args).cast());
        assert_eq!(outcome, Outcome::Return(FAILURE));
        assert_eq!(k.task_count(), 1);
    }

    #[test]
    fn kill_of_a_child_succeeds() {
        let mut k = booted_kernel();
        k.add_task(0x9000, PrivilegeLevel::Kernel).unwrap();
        let args = KillArgs { pid: 2 };
        let outcome = dispatch(&mut k, 5, core::ptr::from_ref(&args).cast());
        assert_eq!(outcome, Outcome::Return(0));
        assert_eq!(k.task_count(), 1);
    }

    #[test]
    fn is_predecessor_answers_both_ways() {
        let mut k = booted_kernel();
        k.add_task(0x9000, PrivilegeLevel::Kernel).unwrap();
        let args = IsPredecessorArgs { child: 2, pred: 1 };
        assert_eq!(
            dispatch(&mut k, 6, core::ptr::from_ref(&args).cast()),
            Outcome::Return(1)
        );
        let args = IsPredecessorArgs { child: 1, pred: 2 };
        assert_eq!(
            dispatch(&mut k, 6, core::ptr::from_ref(&args).cast()),
            Outcome::Return(0)
        );
    }

    #[test]
    fn tasks_info_writes_to_the_console() {
        let mut k = booted_kernel();
        let mut console = String::new();
        // SAFETY: Syscall 42 reads no arguments
        let outcome = unsafe { k.dispatch(42, core::ptr::null(), &mut console) };
        assert_eq!(outcome, Outcome::Return(0));
        assert!(console.contains("task count: 1"));
    }

    #[test]
    fn shutdown_asks_for_a_halt() {
        let mut k = booted_kernel();
        assert_eq!(dispatch(&mut k, 99, core::ptr::null()), Outcome::Shutdown);
    }
}
