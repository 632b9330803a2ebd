//! Round-robin scheduling.
//!
//! Ready tasks wait in a FIFO ring of table slots; the running task is never
//! in the ring. A timer tick rotates the running task to the back of the
//! ring; exits and kills drop it instead.

use crate::kernel::Kernel;
use crate::task::Context;

impl Kernel {
    /// Claims the first task to run. Returns its slot on the first call and
    /// `None` ever after.
    pub fn start(&mut self) -> Option<usize> {
        if self.started {
            return None;
        }
        self.started = true;
        let slot = self.ready.remove().unwrap_or(0);
        self.tasks.set_current(slot);
        Some(slot)
    }

    /// Timer-tick rotation: the running task goes to the back of the ring
    /// and the head becomes current. An empty ring leaves the idle sentinel
    /// (slot 0) as current.
    pub fn schedule(&mut self) -> usize {
        self.ready.insert(self.tasks.current_slot());
        let slot = self.ready.remove().unwrap_or(0);
        self.tasks.set_current(slot);
        slot
    }

    /// Picks the next task after the current one died, without re-enqueueing
    /// it. `None` means nothing is left to run.
    pub fn schedule_after_exit(&mut self) -> Option<usize> {
        let slot = self.ready.remove()?;
        self.tasks.set_current(slot);
        Some(slot)
    }

    /// Rebuilds the ready ring from the table, scanning slots in order. Used
    /// after a kill: the dead task simply no longer appears. The running
    /// task stays out of the ring.
    pub(crate) fn rebuild_ready_queue(&mut self) {
        self.ready.clear();
        let current = self.tasks.current_slot();
        for slot in self.tasks.valid_slots() {
            if slot != current {
                self.ready.insert(slot);
            }
        }
    }

    /// Raw pointer to a slot's saved context, for the trap assembly.
    pub fn context_ptr(&mut self, slot: usize) -> *mut Context {
        core::ptr::from_mut(self.tasks.context_mut(slot))
    }
}

#[cfg(target_arch = "arm")]
mod startup {
    use crate::architecture::{self, trap};
    use crate::{board, kernel, println};

    /// Starts preemptive scheduling and enters the first user task.
    ///
    /// Idempotent: later calls return immediately. The first call never
    /// returns to its caller.
    pub fn start_scheduler() {
        let Some(first) = kernel::with(super::Kernel::start) else {
            return;
        };

        board::timer_stop();
        architecture::init_interrupt_handling();
        board::timer_start(board::TIMER_LOAD_VALUE);

        println!("scheduler: entering pid {}", kernel::with(|k| k.current_pid()));
        let context = kernel::with(|k| k.context_ptr(first));
        // SAFETY: `context` points into the kernel singleton's task table,
        // which outlives the jump; the slot was just claimed by `start`
        unsafe {
            trap::enter_task(context);
        }
    }
}

#[cfg(target_arch = "arm")]
pub use startup::start_scheduler;

#[cfg(test)]
mod tests {
    use crate::architecture::mode::PrivilegeLevel;
    use crate::kernel::Kernel;
    use crate::task::TaskConfig;

    fn kernel_with_tasks(count: usize) -> Kernel {
        let mut k = Kernel::new(TaskConfig {
            stack_base: 0x0100_0000,
            stack_size: 0x1_0000,
            exit_trampoline: 0,
        });
        for _ in 0..count {
            k.add_task(0x8000, PrivilegeLevel::Kernel).unwrap();
        }
        k
    }

    #[test]
    fn start_claims_the_first_task_once() {
        let mut k = kernel_with_tasks(3);
        assert_eq!(k.start(), Some(0));
        assert_eq!(k.current_pid(), 1);
        assert_eq!(k.start(), None);
    }

    #[test]
    fn ticks_rotate_round_robin() {
        let mut k = kernel_with_tasks(3);
        k.start();
        let mut seen = Vec::new();
        for _ in 0..6 {
            k.schedule();
            seen.push(k.current_pid());
        }
        assert_eq!(seen, [2, 3, 1, 2, 3, 1]);
    }

    #[test]
    fn single_task_keeps_running_across_ticks() {
        let mut k = kernel_with_tasks(1);
        k.start();
        for _ in 0..4 {
            k.schedule();
            assert_eq!(k.current_pid(), 1);
        }
    }

    #[test]
    fn exit_drops_the_dying_task_from_rotation() {
        let mut k = kernel_with_tasks(3);
        k.start();
        assert_eq!(k.current_pid(), 1);
        assert_eq!(k.exit_current(), Some(1));
        assert_eq!(k.current_pid(), 2);
        let mut seen = Vec::new();
        for _ in 0..4 {
            k.schedule();
            seen.push(k.current_pid());
        }
        assert_eq!(seen, [3, 2, 3, 2]);
    }

    #[test]
    fn last_exit_leaves_nothing_to_run() {
        let mut k = kernel_with_tasks(1);
        k.start();
        assert_eq!(k.exit_current(), None);
    }

    #[test]
    fn rebuild_preserves_slot_order_and_skips_current() {
        let mut k = kernel_with_tasks(4);
        k.start();
        k.schedule(); // current: pid 2
        assert_eq!(k.current_pid(), 2);
        k.rebuild_ready_queue();
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(k.schedule());
        }
        // Slot order 0, 2, 3 (slot 1 was current), then current rejoins
        assert_eq!(
            seen.iter()
                .map(|&slot| k.tasks.get(slot).pid)
                .collect::<Vec<_>>(),
            [1, 3, 4]
        );
    }
}
