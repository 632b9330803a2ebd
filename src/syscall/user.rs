//! User-mode syscall wrappers.
//!
//! These run in user mode inside tasks; `SVC #0` carries them across the
//! privilege boundary. The kernel preserves r2..r12 across the trap; r0
//! returns the result and r1 is scratch.

use super::{CreateProcessArgs, IsPredecessorArgs, KillArgs, Syscall};
use crate::kernel::errno::Errno;
use core::arch::asm;
use core::sync::atomic::{AtomicU32, Ordering};
use num_traits::{FromPrimitive, ToPrimitive};

/// The error code of the most recent failed call, mirrored here by the SWI
/// glue so user tasks can read it without another trap.
static ERRNO: AtomicU32 = AtomicU32::new(0);

pub fn errno() -> Option<Errno> {
    FromPrimitive::from_u32(ERRNO.load(Ordering::Relaxed))
}

pub(crate) fn mirror_errno(value: Option<Errno>) {
    let code = value.and_then(|errno| ToPrimitive::to_u32(&errno)).unwrap_or(0);
    ERRNO.store(code, Ordering::Relaxed);
}

/// Issues one raw syscall.
pub fn syscall(number: u32, data: *const u8) -> u32 {
    let result;
    // SAFETY: The SVC gateway preserves everything but r0 (result) and r1
    // (scratch), both declared here
    unsafe {
        asm!(
            "svc #0",
            inout("r0") number => result,
            inout("r1") data => _,
        );
    }
    result
}

pub fn create_process(function: extern "C" fn()) -> i32 {
    let args = CreateProcessArgs {
        function: function as usize as u32,
    };
    syscall(
        Syscall::CreateProcess as u32,
        core::ptr::from_ref(&args).cast(),
    ) as i32
}

pub fn exit() -> ! {
    syscall(Syscall::Exit as u32, core::ptr::null());
    unreachable!();
}

pub fn get_pid() -> u32 {
    syscall(Syscall::GetPid as u32, core::ptr::null())
}

pub fn get_parent_pid() -> u32 {
    syscall(Syscall::GetParentPid as u32, core::ptr::null())
}

pub fn kill(target: u32) -> i32 {
    let args = KillArgs { pid: target };
    syscall(Syscall::Kill as u32, core::ptr::from_ref(&args).cast()) as i32
}

pub fn is_predecessor(child: u32, pred: u32) -> bool {
    let args = IsPredecessorArgs { child, pred };
    syscall(
        Syscall::IsPredecessor as u32,
        core::ptr::from_ref(&args).cast(),
    ) != 0
}

pub fn print_tasks_info() -> u32 {
    syscall(Syscall::TasksInfo as u32, core::ptr::null())
}

pub fn shutdown() -> ! {
    syscall(Syscall::Shutdown as u32, core::ptr::null());
    unreachable!();
}
