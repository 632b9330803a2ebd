//! QEMU VersatilePB: PL190 vectored interrupt controller, SP804 dual timer,
//! PL011 UART, vector table at the low base.
//!
//! References:
//! <https://developer.arm.com/documentation/dui0224/i/programmer-s-reference>

use super::Mmio;
use crate::cell::TrapCell;
use crate::kernel::Serial;
use core::arch::asm;
use core::fmt::{self, Write};
use tock_registers::{
    interfaces::{Readable, Writeable},
    register_bitfields, register_structs,
    registers::{ReadOnly, ReadWrite, WriteOnly},
};

pub const IVT_BASE: u32 = 0x0000_0000;
pub const HIGH_VECTORS: bool = false;

// Stack tops, all clear of the kernel image and the linker-pinned page
// tables below 0x0081_0000; stacks grow downwards.
pub const SVC_STACK: u32 = 0x0009_0000;
pub const IRQ_STACK: u32 = 0x00A0_0000;
pub const ABT_STACK: u32 = 0x00A1_0000;
pub const TASK_STACK_BASE: u32 = 0x0100_0000;
pub const STACK_SIZE: u32 = 0x0001_0000;

/// End of the identity-mapped region: RAM, the MMIO block at 0x10xx_xxxx
/// and the demand-test frame all sit below it.
pub const DATA_END: u32 = 0xC000_0000;

pub const TIMER_LOAD_VALUE: u32 = 0x2000;

register_bitfields! {u32,
    VIC_ENABLE [
        /// Software interrupt line
        SOFTINT OFFSET(1) NUMBITS(1) [],
        /// Combined Timer 0/1 interrupt
        TIMER01 OFFSET(4) NUMBITS(1) [],
    ],
    TIMER_CONTROL [
        ENABLE OFFSET(7) NUMBITS(1) [],
        /// Periodic (reload from LOAD) rather than free running
        PERIODIC OFFSET(6) NUMBITS(1) [],
        INT_ENABLE OFFSET(5) NUMBITS(1) [],
        /// 32-bit counter rather than 16
        SIZE_32 OFFSET(1) NUMBITS(1) [],
    ],
    UART_FLAG [
        /// Transmit FIFO full
        TXFF OFFSET(5) NUMBITS(1) [],
    ]
}

register_structs! {
    #[allow(non_snake_case)]
    VicRegisterBlock {
        (0x00 => IRQSTATUS: ReadOnly<u32>),
        (0x04 => FIQSTATUS: ReadOnly<u32>),
        (0x08 => RAWINTR: ReadOnly<u32>),
        (0x0C => INTSELECT: ReadWrite<u32>),
        (0x10 => INTENABLE: ReadWrite<u32, VIC_ENABLE::Register>),
        (0x14 => INTENCLEAR: WriteOnly<u32, VIC_ENABLE::Register>),
        (0x18 => @END),
    }
}

register_structs! {
    #[allow(non_snake_case)]
    TimerRegisterBlock {
        (0x00 => LOAD: ReadWrite<u32>),
        (0x04 => VALUE: ReadOnly<u32>),
        (0x08 => CONTROL: ReadWrite<u32, TIMER_CONTROL::Register>),
        (0x0C => INTCLR: WriteOnly<u32>),
        (0x10 => RIS: ReadOnly<u32>),
        (0x14 => MIS: ReadOnly<u32>),
        (0x18 => BGLOAD: ReadWrite<u32>),
        (0x1C => @END),
    }
}

register_structs! {
    #[allow(non_snake_case)]
    UartRegisterBlock {
        (0x00 => DR: ReadWrite<u32>),
        (0x04 => _reserved),
        (0x18 => FR: ReadOnly<u32, UART_FLAG::Register>),
        (0x1C => @END),
    }
}

#[allow(clippy::as_conversions)]
const VIC_ADDRESS: *mut VicRegisterBlock = 0x1014_0000 as *mut VicRegisterBlock;
#[allow(clippy::as_conversions)]
const TIMER_ADDRESS: *mut TimerRegisterBlock = 0x101E_2000 as *mut TimerRegisterBlock;
#[allow(clippy::as_conversions)]
const UART_ADDRESS: *mut UartRegisterBlock = 0x101F_1000 as *mut UartRegisterBlock;

// SAFETY: The addresses are the VersatilePB memory map and used nowhere else
static VIC: Mmio<VicRegisterBlock> = unsafe { Mmio::new(VIC_ADDRESS) };
// SAFETY: As above
static TIMER: Mmio<TimerRegisterBlock> = unsafe { Mmio::new(TIMER_ADDRESS) };

/// Unmasks the timer and software-interrupt lines at the VIC.
pub fn init_interrupt_controller() {
    VIC.INTENABLE
        .write(VIC_ENABLE::TIMER01::SET + VIC_ENABLE::SOFTINT::SET);
}

/// Starts the periodic timer counting down from `load`.
pub fn timer_start(load: u32) {
    TIMER.LOAD.set(load);
    TIMER.CONTROL.write(
        TIMER_CONTROL::ENABLE::SET
            + TIMER_CONTROL::PERIODIC::SET
            + TIMER_CONTROL::INT_ENABLE::SET
            + TIMER_CONTROL::SIZE_32::SET,
    );
}

pub fn timer_stop() {
    TIMER.CONTROL.set(0);
}

/// Drops the pending timer interrupt at the peripheral.
pub fn timer_acknowledge() {
    TIMER.INTCLR.set(1);
}

/// Inner representation of the UART
struct UartInner {
    registers: Mmio<UartRegisterBlock>,
}

impl UartInner {
    fn write_byte(&mut self, byte: u8) {
        while self.registers.FR.is_set(UART_FLAG::TXFF) {
            core::hint::spin_loop();
        }
        self.registers.DR.set(byte.into());
    }
}

impl fmt::Write for UartInner {
    fn write_str(&mut self, text: &str) -> fmt::Result {
        for byte in text.bytes() {
            self.write_byte(byte);
        }
        Ok(())
    }
}

/// The PL011 serial port.
pub struct Uart {
    inner: TrapCell<UartInner>,
}

impl Serial for Uart {
    fn write_fmt(&self, args: fmt::Arguments) {
        self.inner.with(|inner| {
            let _ = inner.write_fmt(args);
        });
    }
}

/// The system-wide UART
static UART: Uart = Uart {
    inner: TrapCell::new(UartInner {
        // SAFETY: The VersatilePB UART0 address, used nowhere else
        registers: unsafe { Mmio::new(UART_ADDRESS) },
    }),
};

/// Gets the system-wide serial connection
pub fn serial() -> &'static impl Serial {
    &UART
}

/// Stops the machine: asks QEMU to exit through the semihosting interface,
/// and failing that parks the core in wait-for-interrupt.
pub fn halt() -> ! {
    // SAFETY: The ReportException/ApplicationExit semihosting call; QEMU
    // intercepts it before it reaches the guest vector table
    unsafe {
        asm!(
            "mov r0, #0x18",
            "mov r1, #0x20000",
            "orr r1, r1, #0x26",
            "svc #0x123456",
            out("r0") _,
            out("r1") _,
            options(nostack)
        );
    }
    loop {
        crate::architecture::cp15::wait_for_interrupt();
    }
}
