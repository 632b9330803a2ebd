use crate::architecture::mode::PrivilegeLevel;
use crate::kernel::errno::Errno;
use crate::kernel::Kernel;
use core::fmt::{self, Write};

/// Saved register file
pub mod context;
/// Task records and the fixed table
pub mod table;

pub use context::Context;
pub use table::{Pid, Task, TaskConfig, TaskTable, INIT_PID, MAX_TASK_NUMBER, NO_TASK};

/// Why a `kill` request was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KillError {
    /// Self-termination must go through `exit`
    Yourself,
    /// No live task carries the target pid
    NoSuchTask,
    /// The caller is neither the target nor one of its ancestors
    Denied,
}

impl Kernel {
    /// Creates a user task running `entrypoint` and enqueues it.
    ///
    /// Only privileged callers may do this; the task table is capacity
    /// bounded. Both failures record an errno and surface as -1 at the
    /// syscall boundary.
    pub fn add_task(&mut self, entrypoint: u32, privilege: PrivilegeLevel) -> Result<Pid, Errno> {
        if privilege != PrivilegeLevel::Kernel {
            self.errno = Some(Errno::PermissionDenied);
            return Err(Errno::PermissionDenied);
        }
        if self.tasks.count() >= MAX_TASK_NUMBER {
            self.errno = Some(Errno::TooManyTasks);
            return Err(Errno::TooManyTasks);
        }

        let slot = self
            .tasks
            .first_free_slot()
            .expect("a table below capacity has a free slot");
        let pid = self.tasks.init_slot(slot, entrypoint);
        self.ready.insert(slot);
        Ok(pid)
    }

    /// Tears down the running task: clears its record, hands its children to
    /// init, and picks the next task without re-enqueueing the dying one.
    /// Returns the slot to resume, or `None` when no task is left.
    pub fn exit_current(&mut self) -> Option<usize> {
        let dead = self.tasks.current().pid;
        self.tasks.clear_slot(self.tasks.current_slot());
        self.tasks.reparent_children_of(dead);
        self.schedule_after_exit()
    }

    /// Kills the live task `target`.
    ///
    /// The running task may not kill itself (that is what `exit` is for),
    /// the target must exist, and the caller must be the target or one of
    /// its ancestors. On success the record is cleared, children are handed
    /// to init, and the ready ring is rebuilt without the dead task.
    pub fn kill(&mut self, target: Pid) -> Result<(), KillError> {
        let caller = self.tasks.current().pid;
        if target == caller {
            return Err(KillError::Yourself);
        }
        let slot = self.tasks.slot_of(target).ok_or(KillError::NoSuchTask)?;
        if !self.has_rights(caller, target) {
            self.errno = Some(Errno::PermissionDenied);
            return Err(KillError::Denied);
        }

        self.tasks.clear_slot(slot);
        self.tasks.reparent_children_of(target);
        self.rebuild_ready_queue();
        Ok(())
    }

    /// Kill policy: a caller controls itself and everything descended from
    /// it. Every task descends from init, so init controls all of them.
    fn has_rights(&self, caller: Pid, target: Pid) -> bool {
        caller == target || self.tasks.is_descendent_of(target, caller)
    }

    pub fn is_descendent_of(&self, child: Pid, ancestor: Pid) -> bool {
        self.tasks.is_descendent_of(child, ancestor)
    }

    pub fn current_pid(&self) -> Pid {
        self.tasks.current().pid
    }

    pub fn current_parent_pid(&self) -> Pid {
        self.tasks.current().parent_pid
    }

    pub fn task_count(&self) -> usize {
        self.tasks.count()
    }

    /// Renders the task table and the ready ring, one pid per slot.
    pub fn write_debug_info(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        let current = self.tasks.current();
        writeln!(out, "---------- tasks ----------")?;
        writeln!(
            out,
            "current: pid {} (parent {})",
            current.pid, current.parent_pid
        )?;
        writeln!(out, "task count: {}", self.tasks.count())?;
        for slot in 0..MAX_TASK_NUMBER {
            write!(out, "[{}]", self.tasks.get(slot).pid)?;
            if slot == MAX_TASK_NUMBER / 2 - 1 {
                writeln!(out)?;
            }
        }
        writeln!(out)?;
        writeln!(out, "ready ring: {} waiting", self.ready.len())?;
        writeln!(out, "---------------------------")
    }
}

#[cfg(target_arch = "arm")]
mod trampoline {
    use crate::syscall::user;

    /// The stub a task returns into when its entry function falls off the
    /// end. Runs in user mode, so teardown goes through the ordinary `exit`
    /// privilege transition.
    extern "C" fn task_exit() -> ! {
        user::exit();
        // The exit syscall never returns to the caller
        unreachable!();
    }

    pub fn exit_trampoline_address() -> u32 {
        task_exit as usize as u32
    }
}

#[cfg(target_arch = "arm")]
pub use trampoline::exit_trampoline_address;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Kernel;

    fn kernel() -> Kernel {
        Kernel::new(TaskConfig {
            stack_base: 0x0100_0000,
            stack_size: 0x1_0000,
            exit_trampoline: 0xDEAD_0000,
        })
    }

    fn privileged_add(kernel: &mut Kernel, entry: u32) -> Pid {
        kernel
            .add_task(entry, PrivilegeLevel::Kernel)
            .expect("table has room")
    }

    #[test]
    fn pids_are_monotonic_and_start_at_one() {
        let mut k = kernel();
        assert_eq!(privileged_add(&mut k, 0x8000), 1);
        assert_eq!(privileged_add(&mut k, 0x8000), 2);
        assert_eq!(privileged_add(&mut k, 0x8000), 3);
    }

    #[test]
    fn init_is_its_own_parent() {
        let mut k = kernel();
        privileged_add(&mut k, 0x8000);
        let slot = k.tasks.slot_of(1).unwrap();
        assert_eq!(k.tasks.get(slot).parent_pid, 1);
    }

    #[test]
    fn stacks_descend_by_slot() {
        let mut k = kernel();
        privileged_add(&mut k, 0x8000);
        privileged_add(&mut k, 0x8000);
        let first = k.tasks.slot_of(1).unwrap();
        let second = k.tasks.slot_of(2).unwrap();
        assert_eq!(k.tasks.get(first).context.sp, 0x0100_0000);
        assert_eq!(k.tasks.get(second).context.sp, 0x00FF_0000);
        assert_eq!(k.tasks.get(second).context.lr, 0xDEAD_0000);
        assert_eq!(k.tasks.get(second).context.cpsr, 0x10);
    }

    #[test]
    fn user_mode_callers_are_rejected() {
        let mut k = kernel();
        assert_eq!(
            k.add_task(0x8000, PrivilegeLevel::User),
            Err(Errno::PermissionDenied)
        );
        assert_eq!(k.errno(), Some(Errno::PermissionDenied));
        assert_eq!(k.task_count(), 0);
    }

    #[test]
    fn full_table_is_rejected() {
        let mut k = kernel();
        for _ in 0..MAX_TASK_NUMBER {
            privileged_add(&mut k, 0x8000);
        }
        assert_eq!(
            k.add_task(0x8000, PrivilegeLevel::Kernel),
            Err(Errno::TooManyTasks)
        );
        assert_eq!(k.errno(), Some(Errno::TooManyTasks));
        assert_eq!(k.task_count(), MAX_TASK_NUMBER);
    }

    #[test]
    fn pids_are_never_reused_after_exit() {
        let mut k = kernel();
        privileged_add(&mut k, 0x8000); // pid 1
        privileged_add(&mut k, 0x8000); // pid 2
        k.start();
        let running = k.current_pid();
        assert_eq!(running, 1);
        k.exit_current();
        // The freed slot gets a fresh pid, not a recycled one
        assert_eq!(privileged_add(&mut k, 0x8000), 3);
    }

    #[test]
    fn exit_reparents_children_to_init() {
        let mut k = kernel();
        privileged_add(&mut k, 0x8000); // pid 1
        k.start();
        // init spawns 2, which we then run so it can spawn 3
        privileged_add(&mut k, 0x8000); // pid 2, parent 1
        k.schedule(); // now pid 2 runs
        assert_eq!(k.current_pid(), 2);
        privileged_add(&mut k, 0x8000); // pid 3, parent 2
        k.exit_current(); // pid 2 dies
        let orphan = k.tasks.slot_of(3).unwrap();
        assert_eq!(k.tasks.get(orphan).parent_pid, 1);
        assert!(!k.is_descendent_of(3, 2));
    }

    #[test]
    fn descendent_relation() {
        let mut k = kernel();
        privileged_add(&mut k, 0x8000); // pid 1
        k.start();
        privileged_add(&mut k, 0x8000); // pid 2, parent 1
        k.schedule();
        assert_eq!(k.current_pid(), 2);
        privileged_add(&mut k, 0x8000); // pid 3, parent 2
        k.schedule();
        k.schedule();
        assert_eq!(k.current_pid(), 3);
        privileged_add(&mut k, 0x8000); // pid 4, parent 3

        assert!(k.is_descendent_of(3, 3));
        assert!(k.is_descendent_of(4, 2));
        assert!(k.is_descendent_of(4, 1));
        assert!(!k.is_descendent_of(2, 4));
        assert!(!k.is_descendent_of(2, NO_TASK));
        assert!(!k.is_descendent_of(99, 1));
    }

    #[test]
    fn kill_rules() {
        let mut k = kernel();
        privileged_add(&mut k, 0x8000); // pid 1
        k.start();
        privileged_add(&mut k, 0x8000); // pid 2, parent 1
        k.schedule();
        assert_eq!(k.current_pid(), 2);
        privileged_add(&mut k, 0x8000); // pid 3, parent 2

        // Self-kill is refused and changes nothing
        assert_eq!(k.kill(2), Err(KillError::Yourself));
        assert_eq!(k.task_count(), 3);

        // Unknown pids are refused
        assert_eq!(k.kill(42), Err(KillError::NoSuchTask));

        // A child cannot kill its parent
        k.schedule();
        k.schedule();
        assert_eq!(k.current_pid(), 3);
        assert_eq!(k.kill(2), Err(KillError::Denied));
        assert_eq!(k.errno(), Some(Errno::PermissionDenied));

        // The parent kills its child, and the ring forgets the corpse
        k.schedule();
        assert_eq!(k.current_pid(), 2);
        let victim_slot = k.tasks.slot_of(3).unwrap();
        assert_eq!(k.kill(3), Ok(()));
        assert_eq!(k.task_count(), 2);
        assert!(!k.ready.contains(victim_slot));
        assert_eq!(k.tasks.slot_of(3), None);
    }

    #[test]
    fn kill_reparents_grandchildren() {
        let mut k = kernel();
        privileged_add(&mut k, 0x8000); // pid 1
        k.start();
        privileged_add(&mut k, 0x8000); // pid 2, parent 1
        k.schedule();
        privileged_add(&mut k, 0x8000); // pid 3, parent 2
        k.schedule();
        k.schedule();
        assert_eq!(k.current_pid(), 3);
        privileged_add(&mut k, 0x8000); // pid 4, parent 3

        // Run pid 2 and have it kill its child 3; 4 moves to init
        loop {
            k.schedule();
            if k.current_pid() == 2 {
                break;
            }
        }
        assert_eq!(k.kill(3), Ok(()));
        let orphan = k.tasks.slot_of(4).unwrap();
        assert_eq!(k.tasks.get(orphan).parent_pid, 1);
    }

    #[test]
    fn debug_info_renders() {
        let mut k = kernel();
        privileged_add(&mut k, 0x8000);
        k.start();
        let mut rendered = String::new();
        k.write_debug_info(&mut rendered).unwrap();
        assert!(rendered.contains("current: pid 1 (parent 1)"));
        assert!(rendered.contains("task count: 1"));
    }
}
