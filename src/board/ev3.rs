//! The AM1808-class embedded board: AINTC priority interrupt controller,
//! Timer64P0 (the 3:4 half), 16550-style UART, vector table at the high
//! base.
//!
//! Reference: <https://www.ti.com/lit/ug/spruh82c/spruh82c.pdf>

use super::Mmio;
use crate::cell::TrapCell;
use crate::kernel::Serial;
use core::fmt::{self, Write};
use tock_registers::{
    interfaces::{Readable, Writeable},
    register_bitfields, register_structs,
    registers::{ReadOnly, ReadWrite, WriteOnly},
};

pub const IVT_BASE: u32 = 0xFFFF_0000;
pub const HIGH_VECTORS: bool = true;

pub const SVC_STACK: u32 = 0xC200_0000;
pub const IRQ_STACK: u32 = 0xC300_0000;
pub const ABT_STACK: u32 = 0xC301_0000;
pub const TASK_STACK_BASE: u32 = 0xC380_0000;
pub const STACK_SIZE: u32 = 0x0001_0000;

/// End of the identity-mapped region. DDR RAM at 0xC000_0000, the MMIO
/// blocks, the on-chip RAM behind the high vector base and the demand-test
/// frame all sit below it.
pub const DATA_END: u32 = 0xFFFF_F000;

pub const TIMER_LOAD_VALUE: u32 = 0x0001_0000;

/// The Timer64P0 TINT34 event number at the AINTC.
const TIMER_EVENT: u32 = 22;
/// The interrupt channel the timer event is steered to (2 is the highest
/// priority IRQ channel; 0 and 1 are FIQ).
const TIMER_CHANNEL: u32 = 2;

register_bitfields! {u32,
    GER [
        ENABLE OFFSET(0) NUMBITS(1) [],
    ],
    HIER [
        FIQ OFFSET(0) NUMBITS(1) [],
        IRQ OFFSET(1) NUMBITS(1) [],
    ],
    TCR [
        /// Operating mode of the 3:4 half; 2 = continuous
        ENAMODE34 OFFSET(22) NUMBITS(2) [],
    ],
    TGCR [
        /// Release the 1:2 half from reset
        TIM12RS OFFSET(0) NUMBITS(1) [],
        /// Release the 3:4 half from reset
        TIM34RS OFFSET(1) NUMBITS(1) [],
        /// 1 = dual 32-bit unchained
        TIMMODE OFFSET(2) NUMBITS(2) [],
    ],
    INTCTLSTAT [
        PRDINTEN34 OFFSET(16) NUMBITS(1) [],
        PRDINTSTAT34 OFFSET(17) NUMBITS(1) [],
    ],
    UART_LSR [
        /// Transmit holding register empty
        THRE OFFSET(5) NUMBITS(1) [],
    ]
}

register_structs! {
    #[allow(non_snake_case)]
    AintcRegisterBlock {
        (0x000 => REVID: ReadOnly<u32>),
        (0x004 => CR: ReadWrite<u32>),
        (0x008 => _reserved0),
        (0x010 => GER: ReadWrite<u32, GER::Register>),
        (0x014 => _reserved1),
        (0x034 => HIER: ReadWrite<u32, HIER::Register>),
        (0x038 => _reserved2),
        (0x284 => SECR1: WriteOnly<u32>),
        (0x288 => _reserved3),
        (0x304 => ESR1: ReadWrite<u32>),
        (0x308 => _reserved4),
        (0x414 => CMR5: ReadWrite<u32>),
        (0x418 => @END),
    }
}

register_structs! {
    #[allow(non_snake_case)]
    Timer64RegisterBlock {
        (0x00 => REVID: ReadOnly<u32>),
        (0x04 => EMUMGT: ReadWrite<u32>),
        (0x08 => _reserved0),
        (0x10 => TIM12: ReadWrite<u32>),
        (0x14 => TIM34: ReadWrite<u32>),
        (0x18 => PRD12: ReadWrite<u32>),
        (0x1C => PRD34: ReadWrite<u32>),
        (0x20 => TCR: ReadWrite<u32, TCR::Register>),
        (0x24 => TGCR: ReadWrite<u32, TGCR::Register>),
        (0x28 => _reserved1),
        (0x44 => INTCTLSTAT: ReadWrite<u32, INTCTLSTAT::Register>),
        (0x48 => @END),
    }
}

register_structs! {
    #[allow(non_snake_case)]
    UartRegisterBlock {
        (0x00 => THR: ReadWrite<u32>),
        (0x04 => _reserved0),
        (0x14 => LSR: ReadOnly<u32, UART_LSR::Register>),
        (0x18 => @END),
    }
}

#[allow(clippy::as_conversions)]
const AINTC_ADDRESS: *mut AintcRegisterBlock = 0xFFFE_E000 as *mut AintcRegisterBlock;
#[allow(clippy::as_conversions)]
const TIMER_ADDRESS: *mut Timer64RegisterBlock = 0x01C2_0000 as *mut Timer64RegisterBlock;
#[allow(clippy::as_conversions)]
const UART_ADDRESS: *mut UartRegisterBlock = 0x01D0_C000 as *mut UartRegisterBlock;

// SAFETY: The addresses are the AM1808 memory map and used nowhere else
static AINTC: Mmio<AintcRegisterBlock> = unsafe { Mmio::new(AINTC_ADDRESS) };
// SAFETY: As above
static TIMER: Mmio<Timer64RegisterBlock> = unsafe { Mmio::new(TIMER_ADDRESS) };

/// Brings up the AINTC: drop stale interrupts, steer the timer event onto
/// its IRQ channel, enable the event, the IRQ host line and the controller
/// itself.
pub fn init_interrupt_controller() {
    AINTC.SECR1.set(0xFFFF_FFFF);
    AINTC.CMR5.set(AINTC.CMR5.get() | (TIMER_CHANNEL << ((TIMER_EVENT % 4) * 8)));
    AINTC.ESR1.set(AINTC.ESR1.get() | (1 << TIMER_EVENT));
    AINTC.HIER.write(HIER::IRQ::SET);
    AINTC.GER.write(GER::ENABLE::SET);
}

/// Starts the 3:4 timer half counting up to `load`, interrupting on period
/// match, continuously.
pub fn timer_start(load: u32) {
    TIMER.TGCR.write(TGCR::TIM34RS::SET + TGCR::TIMMODE.val(1));
    TIMER.TIM34.set(0);
    TIMER.PRD34.set(load);
    TIMER.INTCTLSTAT.write(INTCTLSTAT::PRDINTEN34::SET);
    TIMER.TCR.write(TCR::ENAMODE34.val(2));
}

pub fn timer_stop() {
    TIMER.TCR.write(TCR::ENAMODE34.val(0));
}

/// Drops the pending period interrupt at the timer and the AINTC.
pub fn timer_acknowledge() {
    TIMER
        .INTCTLSTAT
        .write(INTCTLSTAT::PRDINTEN34::SET + INTCTLSTAT::PRDINTSTAT34::SET);
    AINTC.SECR1.set(1 << TIMER_EVENT);
}

/// Inner representation of the UART
struct UartInner {
    registers: Mmio<UartRegisterBlock>,
}

impl UartInner {
    fn write_byte(&mut self, byte: u8) {
        while !self.registers.LSR.is_set(UART_LSR::THRE) {
            core::hint::spin_loop();
        }
        self.registers.THR.set(byte.into());
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

/// The 16550-style serial port.
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
        // SAFETY: The board's debug UART address, used nowhere else
        registers: unsafe { Mmio::new(UART_ADDRESS) },
    }),
};

/// Gets the system-wide serial connection
pub fn serial() -> &'static impl Serial {
    &UART
}

/// Stops the machine: no power control here, so park the core.
pub fn halt() -> ! {
    loop {
        crate::architecture::cp15::wait_for_interrupt();
    }
}
