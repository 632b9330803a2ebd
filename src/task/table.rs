use super::context::Context;

/// Capacity of the task table.
pub const MAX_TASK_NUMBER: usize = 16;

/// Task identifier. Strictly positive and monotonic; never reused within a
/// session.
pub type Pid = u32;

/// Reserved "no task" sentinel; never allocated.
pub const NO_TASK: Pid = 0;
/// The first user task. Orphans are reparented to it.
pub const INIT_PID: Pid = 1;

/// Per-board inputs for building task records.
pub struct TaskConfig {
    /// Top of the highest task stack; stacks grow downwards from here
    pub stack_base: u32,
    /// Bytes of stack per task slot
    pub stack_size: u32,
    /// Address of the user-mode stub run when a task's entry returns
    pub exit_trampoline: u32,
}

/// One task record. Context first: the trap assembly addresses the record
/// through a pointer to its context.
#[repr(C)]
pub struct Task {
    pub context: Context,
    pub pid: Pid,
    pub parent_pid: Pid,
    pub valid: bool,
}

impl Task {
    pub const EMPTY: Self = Self {
        context: Context::ZERO,
        pid: NO_TASK,
        parent_pid: NO_TASK,
        valid: false,
    };
}

/// The fixed pool of task records plus the bookkeeping around it.
pub struct TaskTable {
    tasks: [Task; MAX_TASK_NUMBER],
    /// Slot of the running task. Before the scheduler starts this points at
    /// slot 0, which is also the idle sentinel once the last task is gone.
    current: usize,
    count: usize,
    next_pid: Pid,
    config: TaskConfig,
}

impl TaskTable {
    pub fn new(config: TaskConfig) -> Self {
        Self {
            tasks: [Task::EMPTY; MAX_TASK_NUMBER],
            current: 0,
            count: 0,
            next_pid: INIT_PID,
            config,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn current_slot(&self) -> usize {
        self.current
    }

    pub fn set_current(&mut self, slot: usize) {
        self.current = slot;
    }

    pub fn current(&self) -> &Task {
        &self.tasks[self.current]
    }

    pub fn get(&self, slot: usize) -> &Task {
        &self.tasks[slot]
    }

    pub fn context_mut(&mut self, slot: usize) -> &mut Context {
        &mut self.tasks[slot].context
    }

    /// The slot holding the live task `pid`, if any. `NO_TASK` matches
    /// nothing: empty records are not valid.
    pub fn slot_of(&self, pid: Pid) -> Option<usize> {
        self.tasks
            .iter()
            .position(|task| task.valid && task.pid == pid)
    }

    pub fn first_free_slot(&self) -> Option<usize> {
        self.tasks.iter().position(|task| !task.valid)
    }

    /// Builds a fresh user task in `slot` and returns its pid.
    ///
    /// The stack is assigned by slot index, the saved `lr` routes a plain
    /// return from the entry function into the exit trampoline, and the
    /// parent is the running task. The very first pid is its own parent.
    pub fn init_slot(&mut self, slot: usize, entrypoint: u32) -> Pid {
        let stack = self.config.stack_base - self.config.stack_size * slot as u32;
        let pid = self.next_pid;
        self.next_pid += 1;

        let parent_pid = if pid == INIT_PID {
            INIT_PID
        } else {
            self.current().pid
        };

        self.tasks[slot] = Task {
            context: Context::user(entrypoint, stack, self.config.exit_trampoline),
            pid,
            parent_pid,
            valid: true,
        };
        self.count += 1;
        pid
    }

    /// Zeroes the record and drops it from the live count. The pid is not
    /// returned to circulation.
    pub fn clear_slot(&mut self, slot: usize) {
        self.tasks[slot] = Task::EMPTY;
        self.count -= 1;
    }

    /// Hands every child of the dead pid over to init.
    pub fn reparent_children_of(&mut self, dead: Pid) {
        for task in &mut self.tasks {
            if task.valid && task.parent_pid == dead {
                task.parent_pid = INIT_PID;
            }
        }
    }

    /// Whether `ancestor` is reachable from `child` by following parent
    /// links. A pid is its own descendent. Walks stop at init, at the
    /// sentinel, or at a pid that is no longer in the table.
    pub fn is_descendent_of(&self, child: Pid, ancestor: Pid) -> bool {
        if child == ancestor {
            return true;
        }
        let Some(slot) = self.slot_of(child) else {
            return false;
        };
        let mut parent = self.tasks[slot].parent_pid;
        while !(parent == INIT_PID || parent == NO_TASK || parent == ancestor) {
            match self.slot_of(parent) {
                Some(next) => parent = self.tasks[next].parent_pid,
                None => return false,
            }
        }
        parent == ancestor
    }

    /// Slots of all live tasks, in slot order.
    pub fn valid_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| task.valid)
            .map(|(slot, _)| slot)
    }
}
