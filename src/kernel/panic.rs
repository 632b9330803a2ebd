use crate::{board, println};

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    match info.location() {
        Some(location) => println!(
            "KERNEL PANIC at {}:{}: {}",
            location.file(),
            location.line(),
            info.message()
        ),
        None => println!("KERNEL PANIC: {}", info.message()),
    }

    board::halt();
}
