//! The kernel image: boot, bring-up, and a small user-mode demo workload.
#![cfg_attr(target_arch = "arm", no_std)]
#![cfg_attr(target_arch = "arm", no_main)]

#[cfg(target_arch = "arm")]
mod image {
    use core::arch::global_asm;
    use kestrel::architecture::mode;
    use kestrel::syscall::user;
    use kestrel::{kernel, memory, println, scheduler};

    global_asm!(
        r#"
.section .text._start
.global _start
_start:
    ldr     sp, ={stack}
    ldr     sp, [sp]
    bl      {entry}
1:  b       1b
.ltorg
"#,
        stack = sym BOOT_STACK_TOP,
        entry = sym kernel_entry,
    );

    static BOOT_STACK_TOP: u32 = kestrel::board::SVC_STACK;

    /// Bring-up, in dependency order: the kernel singleton, the first task,
    /// trap handling (so aborts during MMU setup are already caught), the
    /// MMU, and finally the scheduler, which never comes back.
    extern "C" fn kernel_entry() -> ! {
        println!("kestrel starting");

        kernel::init();
        let init_pid = kernel::with(|k| k.add_task(user_init as usize as u32, mode::privilege_level()));
        match init_pid {
            Ok(pid) => println!("init task ready (pid {pid})"),
            Err(error) => panic!("could not create the init task: {error}"),
        }

        kestrel::architecture::init_interrupt_handling();
        memory::init();
        scheduler::start_scheduler();

        unreachable!("the scheduler does not return");
    }

    /// Spins long enough for a couple of timer ticks to land.
    fn busy_wait() {
        for _ in 0..5_000_000 {
            core::hint::spin_loop();
        }
    }

    /// The first user task (pid 1). Spawns the demo workload, later reaps
    /// the counter, then idles forever.
    extern "C" fn user_init() {
        println!("init: pid {}", user::get_pid());
        let counter = user::create_process(task_counter);
        user::create_process(task_quitter);
        user::create_process(task_supervisor);
        user::print_tasks_info();

        for _ in 0..8 {
            busy_wait();
        }
        println!("init: reaping pid {counter}");
        user::kill(counter as u32);
        user::print_tasks_info();
        loop {
            busy_wait();
        }
    }

    /// Counts forever (until init kills it).
    extern "C" fn task_counter() {
        let pid = user::get_pid();
        let mut n = 0_u32;
        loop {
            println!("  counter (pid {pid}): {n}");
            n += 1;
            busy_wait();
        }
    }

    /// Counts a few rounds, then simply returns; the exit trampoline turns
    /// that into a proper exit syscall.
    extern "C" fn task_quitter() {
        let pid = user::get_pid();
        for n in 0..5_u32 {
            println!("  quitter (pid {pid}): {n}");
            busy_wait();
        }
        println!("  quitter (pid {pid}): done");
    }

    /// Spawns the prober, waits out the demo, then shuts the machine down.
    extern "C" fn task_supervisor() {
        let pid = user::get_pid();
        println!("  supervisor: pid {pid}, parent {}", user::get_parent_pid());
        user::create_process(task_prober);
        for _ in 0..24 {
            busy_wait();
        }
        println!("  supervisor: enough for everyone");
        user::print_tasks_info();
        user::shutdown();
    }

    /// Pokes at the process tree, then touches the deliberately unmapped
    /// frame: the first store faults, the kernel maps the page, the store
    /// restarts, and the read-back sees the value.
    extern "C" fn task_prober() {
        let pid = user::get_pid();
        println!("  prober: pid {pid}, parent {}", user::get_parent_pid());
        println!("  prober: descends from init? {}", user::is_predecessor(pid, 1));
        println!("  prober: init from me? {}", user::is_predecessor(1, pid));

        let lazy_cell = 0xAAAA_A000 as *mut u32;
        // SAFETY: The frame is backed on first touch by the demand-mapping
        // abort path; nothing else uses it
        unsafe {
            lazy_cell.write_volatile(pid);
            let read_back = lazy_cell.read_volatile();
            println!("  prober: demand-mapped cell holds {read_back}");
        }
        user::exit();
    }
}

#[cfg(not(target_arch = "arm"))]
fn main() {
    eprintln!("the kernel image only makes sense on the ARM boards; build for one of them");
}
