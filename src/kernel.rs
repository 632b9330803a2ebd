use crate::collections::RingBuffer;
use crate::kernel::errno::Errno;
use crate::task::table::{TaskConfig, TaskTable, MAX_TASK_NUMBER};

/// Caller-visible error codes
pub mod errno;
/// Panic reporting
#[cfg(all(target_arch = "arm", not(test)))]
pub mod panic;
/// Console macros
pub mod print;
/// The serial write seam
pub mod serial;
pub use serial::Serial;

/// Ready tasks, as slots into the task table, excluding the running one.
pub type ReadyQueue = RingBuffer<MAX_TASK_NUMBER>;

/// All mutable kernel state.
///
/// Trap handlers and the boot path are the only callers of its methods; on
/// hardware the single instance lives in a [`TrapCell`](crate::cell::TrapCell)
/// so every access holds the IRQ mask. The methods themselves are ordinary
/// safe code over plain data, which is what makes them host-testable.
pub struct Kernel {
    pub(crate) tasks: TaskTable,
    pub(crate) ready: ReadyQueue,
    pub(crate) started: bool,
    pub(crate) errno: Option<Errno>,
}

impl Kernel {
    pub fn new(config: TaskConfig) -> Self {
        Self {
            tasks: TaskTable::new(config),
            ready: ReadyQueue::new(),
            started: false,
            errno: None,
        }
    }

    /// The most recent caller-visible error code.
    pub fn errno(&self) -> Option<Errno> {
        self.errno
    }
}

#[cfg(target_arch = "arm")]
mod instance {
    use super::Kernel;
    use crate::cell::{InitCell, TrapCell};
    use crate::task::table::TaskConfig;
    use crate::{board, call_once, task};

    static KERNEL: InitCell<TrapCell<Kernel>> = InitCell::new();

    /// Builds the kernel singleton from the board constants.
    pub fn init() {
        call_once!();
        let kernel = Kernel::new(TaskConfig {
            stack_base: board::TASK_STACK_BASE,
            stack_size: board::STACK_SIZE,
            exit_trampoline: task::exit_trampoline_address(),
        });
        // SAFETY: Guarded by `call_once!`, and nothing reads the cell before
        // the boot path runs this
        unsafe {
            KERNEL.set(TrapCell::new(kernel));
        }
    }

    /// Runs `work` on the kernel singleton with IRQs masked.
    pub fn with<R>(work: impl FnOnce(&mut Kernel) -> R) -> R {
        KERNEL.with(work)
    }
}

#[cfg(target_arch = "arm")]
pub use instance::{init, with};
