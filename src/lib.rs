// SPDX-License-Identifier: MIT OR Apache-2.0

//! # avr_usart_driver
//!
//! Interrupt-driven low-level driver for the [USART peripheral][usart] of
//! megaAVR microcontrollers (ATmega328P, ATmega32U4, and friends). Easy
//! integration into Rust while providing fine-grained control where needed.
//!
//! The driver configures baud rate and framing, then moves bytes between
//! the peripheral's shift registers and two externally owned byte queues
//! entirely within interrupt context. Higher-level code enqueues and
//! dequeues bytes without ever touching hardware registers or waiting on
//! I/O timing.
//!
//! ## Features
//!
//! - ✅ Divisor selection across both the `/8` (double-speed) and `/16`
//!   clock paths, picking whichever approximates the requested baud rate
//!   more accurately
//! - ✅ Interrupt-driven transmit and receive with no busy-polling
//! - ✅ `no_std`-compatible and allocation-free by design
//! - ✅ Externally owned FIFOs behind narrow traits, one peripheral
//!   instance per register block
//! - ✅ Fully type-safe register model derived directly from the
//!   [datasheet][usart]
//!
//! ## Focus, Scope & Limitations
//!
//! The primary focus is the configuration arithmetic and the
//! interrupt-driven byte pump. The FIFO data structure itself, the
//! interrupt vector table, and global interrupt enablement are the
//! platform's business: the platform provides queues implementing the
//! [`fifo`] traits and an interrupt shim that forwards each vector to the
//! matching handler on [`Usart`].
//!
//! Flow control, recovery from framing errors beyond what the hardware
//! does on its own, and any protocol on top of the raw byte stream are
//! explicitly out of scope.
//!
//! [usart]: https://ww1.microchip.com/downloads/en/DeviceDoc/ATmega48A-PA-88A-PA-168A-PA-328-P-DS-DS40002061B.pdf

#![no_std]
#![deny(
    clippy::all,
    clippy::cargo,
    clippy::nursery,
    clippy::must_use_candidate,
    clippy::missing_safety_doc,
    clippy::undocumented_unsafe_blocks
)]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![deny(rustdoc::all)]

#[cfg(test)]
extern crate std;

pub use crate::backend::{Backend, MmioBackend};
pub use crate::config::{BaudRate, Config};
pub use crate::error::*;
use crate::backend::MmioAddress;
use crate::fifo::{QueueEvents, ReceiveQueue, TransmitQueue};
use crate::spec::registers::{offsets, UCSRA, UCSRB, UCSRC};
use crate::spec::{select_divisor, DivisionFactor, UnachievableBaudRateError};

pub mod fifo;
pub mod spec;

mod backend;
mod config;
mod error;

/// The hardware events a platform interrupt shim forwards to the driver.
///
/// Each value corresponds to one interrupt vector of the peripheral. The
/// shim itself (vector table entries, priority policy, global interrupt
/// enable) is outside this crate's scope.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Interrupt {
    /// A byte arrived in the receive buffer ([`UCSRA::RXC`]).
    ReceiveComplete,
    /// A frame fully left the transmit shift register ([`UCSRA::TXC`]).
    TransmitComplete,
    /// The transmit holding buffer can take another byte ([`UCSRA::UDRE`]).
    DataRegisterEmpty,
}

/// Driver for one USART peripheral instance.
///
/// All reads and writes involving device registers operate on the
/// underlying hardware through the [`Backend`]. The two byte queues are
/// owned externally and only lent to the handlers; see [`fifo`] for the
/// ownership split.
///
/// # Example
///
/// ```rust,no_run
/// use avr_usart_driver::fifo::{QueueEvents, TransmitQueue};
/// use avr_usart_driver::{Config, Usart};
///
/// struct SingleSlot(Option<u8>, QueueEvents);
///
/// impl TransmitQueue for SingleSlot {
///     fn read_one(&mut self) -> Option<u8> {
///         self.0.take()
///     }
///     fn watch(&mut self, mask: QueueEvents) {
///         self.1 = mask;
///     }
/// }
///
/// let mut tx_queue = SingleSlot(None, QueueEvents::empty());
/// // SAFETY: USART0 register block of an ATmega328P; nothing else uses it.
/// let mut usart = unsafe { Usart::new_mmio(0xc0 as *mut u8, Config::default()) }
///     .expect("should be a valid register block");
/// usart.configure(&mut tx_queue).expect("baud rate should be reachable");
/// ```
///
/// # Transmit State Machine
///
/// The transmit path is pull-based and has two states. While **Draining**,
/// every transmit-complete or data-register-empty interrupt pulls the next
/// byte out of the transmit queue into the data register; the byte's own
/// completion re-triggers the pump. When a pull finds the queue empty the
/// pump falls back to **Idle**: no further interrupt fires until the
/// producer writes again, at which point the queue's
/// [`QueueEvents::NEW_DATA`] event reaches
/// [`Usart::on_transmit_queue_event`] and re-raises the transmit-complete
/// condition in hardware.
///
/// An enqueue *during* draining needs no such kick: the pull on the next
/// completion interrupt picks the byte up anyway. The kick is only what
/// revives a fully idle pipe.
#[derive(Debug)]
pub struct Usart<B: Backend> {
    backend: B,
    // The currently active config.
    config: Config,
}

impl Usart<MmioBackend> {
    /// Creates a new [`Usart`] backed by MMIO.
    ///
    /// # Safety
    ///
    /// Callers must ensure that the address is valid, points at the USART
    /// register block, and is safe to use.
    pub unsafe fn new_mmio(
        base_address: *mut u8,
        config: Config,
    ) -> Result<Self, InvalidAddressError> {
        if base_address.is_null() {
            return Err(InvalidAddressError(MmioAddress(base_address)));
        }
        if (base_address as usize).checked_add(offsets::MAX).is_none() {
            return Err(InvalidAddressError(MmioAddress(base_address)));
        }

        let backend = MmioBackend(MmioAddress(base_address));

        Ok(Self { backend, config })
    }
}

impl<B: Backend> Usart<B> {
    /* ----- Configuration -------------------------------------------------- */

    /// Programs the peripheral according to the provided [`Config`] and
    /// registers the driver's interest in the transmit queue's
    /// [`QueueEvents::NEW_DATA`] event.
    ///
    /// The divisor is selected before anything is written: a failing call
    /// leaves prior hardware state and queue registration untouched. On the
    /// success path the peripheral is fully disabled first, so no interrupt
    /// can fire against half-programmed registers.
    ///
    /// Must not be called concurrently with interrupt activity on the same
    /// peripheral instance; the caller ensures no traffic is in flight
    /// during reconfiguration.
    ///
    /// # Errors
    ///
    /// [`UnachievableBaudRateError`] when neither clock-division path can
    /// represent the requested baud rate. The condition is deterministic,
    /// so there is no point in retrying with the same inputs.
    pub fn configure<Q: TransmitQueue>(
        &mut self,
        tx_queue: &mut Q,
    ) -> Result<(), UnachievableBaudRateError> {
        let selection =
            select_divisor(self.config.clock_hz, self.config.baud_rate.to_integer())?;

        // Shut everything down first.
        // SAFETY: We operate on valid register addresses.
        unsafe {
            self.backend.write_register(offsets::UCSRB as u8, 0);
        }

        // Framing bits are independent of the divisor choice.
        let ucsrc = UCSRC::empty()
            .set_operating_mode(self.config.operating_mode)
            .set_parity(self.config.parity)
            .set_stop_bits(self.config.stop_bits)
            .set_character_size_low(self.config.character_size)
            .set_clock_polarity(self.config.clock_polarity);
        // SAFETY: We operate on valid register addresses.
        unsafe {
            self.backend.write_register(offsets::UCSRC as u8, ucsrc.bits());
        }

        // High byte first so the prescaler reloads once, when the low byte
        // lands.
        // SAFETY: We operate on valid register addresses.
        unsafe {
            self.backend
                .write_register(offsets::UBRRH as u8, (selection.ubrr >> 8) as u8);
            self.backend
                .write_register(offsets::UBRRL as u8, (selection.ubrr & 0xff) as u8);
        }

        let ucsra = match selection.factor {
            DivisionFactor::Div8 => UCSRA::U2X,
            DivisionFactor::Div16 => UCSRA::empty(),
        };
        // SAFETY: We operate on valid register addresses.
        unsafe {
            self.backend.write_register(offsets::UCSRA as u8, ucsra.bits());
        }

        let mut ucsrb = UCSRB::empty();
        if self.config.receiver {
            ucsrb |= UCSRB::RXCIE | UCSRB::RXEN;
        }
        if self.config.transmitter {
            ucsrb |= UCSRB::TXCIE | UCSRB::UDRIE | UCSRB::TXEN;
        }
        // The character-size high bit is programmed regardless of the
        // enable flags.
        ucsrb = ucsrb.set_character_size_high(self.config.character_size);
        // SAFETY: We operate on valid register addresses.
        unsafe {
            self.backend.write_register(offsets::UCSRB as u8, ucsrb.bits());
        }

        // From now on a write into an idle transmit queue restarts the
        // pump.
        tx_queue.watch(QueueEvents::NEW_DATA);

        Ok(())
    }

    /* ----- Byte Pump ------------------------------------------------------ */

    /// Handler for the receive-complete interrupt vector.
    ///
    /// Reads exactly one byte from the data register and hands it to the
    /// receive queue. A full queue rejects or drops the byte per its own
    /// policy; this is not escalated as a fault.
    pub fn on_receive_complete<Q: ReceiveQueue>(&mut self, rx_queue: &mut Q) {
        // SAFETY: We operate on valid register addresses.
        let byte = unsafe { self.backend.read_register(offsets::UDR as u8) };
        let _ = rx_queue.write_one(byte);
    }

    /// Handler for the transmit-complete interrupt vector.
    ///
    /// Pulls the next byte, if any, into the data register.
    pub fn on_transmit_complete<Q: TransmitQueue>(&mut self, tx_queue: &mut Q) {
        self.send_next(tx_queue);
    }

    /// Handler for the data-register-empty interrupt vector.
    ///
    /// Pulls the next byte, if any, into the data register.
    pub fn on_data_register_empty<Q: TransmitQueue>(&mut self, tx_queue: &mut Q) {
        self.send_next(tx_queue);
    }

    /// Consumer-side hook for events of the transmit queue.
    ///
    /// The queue implementation must invoke this for every event matching
    /// the mask armed in [`Usart::configure`], synchronously from within
    /// the producer's write. On [`QueueEvents::NEW_DATA`] the
    /// transmit-complete flag is raised in hardware, which re-triggers the
    /// pump if the pipe had gone fully idle. While draining, the extra
    /// flag is absorbed by the pull that is due anyway.
    pub fn on_transmit_queue_event(&mut self, events: QueueEvents) {
        if events.contains(QueueEvents::NEW_DATA) {
            // Kick the transmit-complete interrupt.
            // SAFETY: We operate on valid register addresses.
            unsafe {
                let ucsra = self.backend.read_register(offsets::UCSRA as u8);
                self.backend
                    .write_register(offsets::UCSRA as u8, ucsra | UCSRA::TXC.bits());
            }
        }
    }

    /// Dispatches one hardware event to the matching handler.
    ///
    /// Convenience for platform shims that funnel all three vectors through
    /// one entry point; the individual handlers are equally public for
    /// shims with per-vector entry points.
    pub fn service_interrupt<R: ReceiveQueue, T: TransmitQueue>(
        &mut self,
        interrupt: Interrupt,
        rx_queue: &mut R,
        tx_queue: &mut T,
    ) {
        match interrupt {
            Interrupt::ReceiveComplete => self.on_receive_complete(rx_queue),
            Interrupt::TransmitComplete => self.on_transmit_complete(tx_queue),
            Interrupt::DataRegisterEmpty => self.on_data_register_empty(tx_queue),
        }
    }

    /// Ready to send the next byte: non-blocking pull from the transmit
    /// queue into the data register. An empty queue means the transmit
    /// path goes idle until the next [`QueueEvents::NEW_DATA`] kick.
    fn send_next<Q: TransmitQueue>(&mut self, tx_queue: &mut Q) {
        if let Some(byte) = tx_queue.read_one() {
            // SAFETY: We operate on valid register addresses.
            unsafe {
                self.backend.write_register(offsets::UDR as u8, byte);
            }
        }
    }

    /* ----- Typed Register Getters ----------------------------------------- */

    /// Fetches the current value from the [`UCSRA`] register.
    #[must_use]
    pub fn ucsra(&mut self) -> UCSRA {
        // SAFETY: We operate on valid register addresses.
        let val = unsafe { self.backend.read_register(offsets::UCSRA as u8) };
        // SAFETY: All possible bits are typed.
        unsafe { UCSRA::from_bits(val).unwrap_unchecked() }
    }

    /// Fetches the current value from the [`UCSRB`] register.
    #[must_use]
    pub fn ucsrb(&mut self) -> UCSRB {
        // SAFETY: We operate on valid register addresses.
        let val = unsafe { self.backend.read_register(offsets::UCSRB as u8) };
        // SAFETY: All possible bits are typed.
        unsafe { UCSRB::from_bits(val).unwrap_unchecked() }
    }

    /// Fetches the current value from the [`UCSRC`] register.
    #[must_use]
    pub fn ucsrc(&mut self) -> UCSRC {
        // SAFETY: We operate on valid register addresses.
        let val = unsafe { self.backend.read_register(offsets::UCSRC as u8) };
        // SAFETY: All possible bits are typed.
        unsafe { UCSRC::from_bits(val).unwrap_unchecked() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fifo::QueueFullError;
    use std::collections::VecDeque;
    use std::vec::Vec;

    /// Backend over a plain register array, recording every write in
    /// order.
    struct TestBackend {
        regs: [u8; offsets::MAX],
        writes: Vec<(u8, u8)>,
    }

    impl TestBackend {
        fn new() -> Self {
            Self {
                regs: [0; offsets::MAX],
                writes: Vec::new(),
            }
        }

        /// The bytes that went out through the data register, in order.
        fn data_writes(&self) -> Vec<u8> {
            self.writes
                .iter()
                .filter(|(offset, _)| *offset as usize == offsets::UDR)
                .map(|(_, value)| *value)
                .collect()
        }
    }

    impl Backend for TestBackend {
        unsafe fn read_register(&mut self, offset: u8) -> u8 {
            self.regs[offset as usize]
        }

        unsafe fn write_register(&mut self, offset: u8, value: u8) {
            self.writes.push((offset, value));
            self.regs[offset as usize] = value;
        }
    }

    struct TestTxQueue {
        data: VecDeque<u8>,
        watch_mask: QueueEvents,
    }

    impl TestTxQueue {
        fn new() -> Self {
            Self {
                data: VecDeque::new(),
                watch_mask: QueueEvents::empty(),
            }
        }
    }

    impl TransmitQueue for TestTxQueue {
        fn read_one(&mut self) -> Option<u8> {
            self.data.pop_front()
        }

        fn watch(&mut self, mask: QueueEvents) {
            self.watch_mask = mask;
        }
    }

    struct TestRxQueue {
        data: Vec<u8>,
        capacity: usize,
    }

    impl TestRxQueue {
        fn new(capacity: usize) -> Self {
            Self {
                data: Vec::new(),
                capacity,
            }
        }
    }

    impl ReceiveQueue for TestRxQueue {
        fn write_one(&mut self, byte: u8) -> Result<(), QueueFullError> {
            if self.data.len() == self.capacity {
                return Err(QueueFullError);
            }
            self.data.push(byte);
            Ok(())
        }
    }

    fn test_usart(config: Config) -> Usart<TestBackend> {
        Usart {
            backend: TestBackend::new(),
            config,
        }
    }

    #[test]
    fn test_configure_programs_default_registers() {
        let mut usart = test_usart(Config::default());
        let mut tx_queue = TestTxQueue::new();

        usart.configure(&mut tx_queue).unwrap();

        // The peripheral is disabled before anything else is touched.
        assert_eq!(usart.backend.writes[0], (offsets::UCSRB as u8, 0));

        // 9600 baud at 16 Mhz: /16 path, divisor 104.
        assert_eq!(usart.backend.regs[offsets::UBRRH], 0);
        assert_eq!(usart.backend.regs[offsets::UBRRL], 104);
        assert_eq!(usart.ucsra(), UCSRA::empty());

        // 8N1 asynchronous framing.
        assert_eq!(usart.ucsrc(), UCSRC::UCSZ1 | UCSRC::UCSZ0);

        // Both directions with all three interrupt sources armed.
        assert_eq!(
            usart.ucsrb(),
            UCSRB::RXCIE | UCSRB::RXEN | UCSRB::TXCIE | UCSRB::UDRIE | UCSRB::TXEN
        );

        // The new-data event is registered.
        assert_eq!(tx_queue.watch_mask, QueueEvents::NEW_DATA);
    }

    #[test]
    fn test_configure_selects_double_speed() {
        let mut usart = test_usart(Config {
            baud_rate: BaudRate::Baud57600,
            ..Config::default()
        });
        let mut tx_queue = TestTxQueue::new();

        usart.configure(&mut tx_queue).unwrap();

        // 57600 baud at 16 Mhz is closer on the /8 path (see spec tests).
        assert_eq!(usart.ucsra(), UCSRA::U2X);
        assert_eq!(usart.backend.regs[offsets::UBRRH], 0);
        assert_eq!(usart.backend.regs[offsets::UBRRL], 35);
    }

    #[test]
    fn test_configure_nine_bit_receive_only() {
        use crate::spec::registers::CharacterSize;

        let mut usart = test_usart(Config {
            character_size: CharacterSize::NineBits,
            transmitter: false,
            ..Config::default()
        });
        let mut tx_queue = TestTxQueue::new();

        usart.configure(&mut tx_queue).unwrap();

        // No transmit enables, but the character-size high bit is set
        // regardless.
        assert_eq!(
            usart.ucsrb(),
            UCSRB::RXCIE | UCSRB::RXEN | UCSRB::UCSZ2
        );
        assert_eq!(
            usart.ucsrc(),
            UCSRC::UCSZ1 | UCSRC::UCSZ0
        );
    }

    #[test]
    fn test_configure_failure_has_no_side_effects() {
        let mut usart = test_usart(Config {
            baud_rate: BaudRate::Custom(110),
            ..Config::default()
        });
        let mut tx_queue = TestTxQueue::new();

        let result = usart.configure(&mut tx_queue);

        assert_eq!(
            result,
            Err(UnachievableBaudRateError {
                clock_hz: spec::CLK_FREQUENCY_HZ,
                baud_rate: 110,
            })
        );
        // Not a single register write and no queue registration happened.
        assert!(usart.backend.writes.is_empty());
        assert_eq!(tx_queue.watch_mask, QueueEvents::empty());
    }

    #[test]
    fn test_receive_path_preserves_order() {
        let mut usart = test_usart(Config::default());
        let mut rx_queue = TestRxQueue::new(16);

        for byte in [0x10, 0x20, 0x30, 0x40] {
            usart.backend.regs[offsets::UDR] = byte;
            usart.on_receive_complete(&mut rx_queue);
        }

        assert_eq!(rx_queue.data, [0x10, 0x20, 0x30, 0x40]);
    }

    #[test]
    fn test_receive_overflow_is_not_escalated() {
        let mut usart = test_usart(Config::default());
        let mut rx_queue = TestRxQueue::new(2);

        for byte in [1, 2, 3] {
            usart.backend.regs[offsets::UDR] = byte;
            usart.on_receive_complete(&mut rx_queue);
        }

        // The third byte is rejected by the queue; the driver carries on.
        assert_eq!(rx_queue.data, [1, 2]);
    }

    #[test]
    fn test_transmit_idle_start() {
        let mut usart = test_usart(Config::default());
        let mut tx_queue = TestTxQueue::new();
        usart.configure(&mut tx_queue).unwrap();

        // Producer writes three bytes into the idle queue; the queue
        // delivers a single new-data event for the write that left Idle.
        tx_queue.data.extend([0x41, 0x42, 0x43]);
        usart.on_transmit_queue_event(QueueEvents::NEW_DATA);

        // The kick raised the transmit-complete condition in hardware.
        assert!(usart.ucsra().contains(UCSRA::TXC));

        // Hardware now interrupts once per free transmit slot.
        usart.on_transmit_complete(&mut tx_queue);
        usart.on_data_register_empty(&mut tx_queue);
        usart.on_transmit_complete(&mut tx_queue);
        assert_eq!(usart.backend.data_writes(), [0x41, 0x42, 0x43]);

        // The queue ran dry: further completions pull nothing, the pump is
        // idle again until the next new-data kick.
        usart.on_transmit_complete(&mut tx_queue);
        usart.on_data_register_empty(&mut tx_queue);
        assert_eq!(usart.backend.data_writes(), [0x41, 0x42, 0x43]);
    }

    #[test]
    fn test_transmit_draining_continuation() {
        let mut usart = test_usart(Config::default());
        let mut tx_queue = TestTxQueue::new();
        usart.configure(&mut tx_queue).unwrap();

        tx_queue.data.extend([1, 2]);
        usart.on_transmit_queue_event(QueueEvents::NEW_DATA);
        usart.on_transmit_complete(&mut tx_queue);

        // Enqueue while draining: no further new-data side effect needed,
        // the ordinary pulls on the following completions suffice.
        tx_queue.data.push_back(3);
        usart.on_data_register_empty(&mut tx_queue);
        usart.on_transmit_complete(&mut tx_queue);

        assert_eq!(usart.backend.data_writes(), [1, 2, 3]);
    }

    #[test]
    fn test_kick_preserves_unrelated_flags() {
        let mut usart = test_usart(Config::default());
        usart.backend.regs[offsets::UCSRA] = UCSRA::U2X.bits();

        usart.on_transmit_queue_event(QueueEvents::NEW_DATA);
        assert_eq!(usart.ucsra(), UCSRA::U2X | UCSRA::TXC);

        // Events the driver did not subscribe to are ignored.
        usart.backend.regs[offsets::UCSRA] = 0;
        usart.on_transmit_queue_event(QueueEvents::empty());
        assert_eq!(usart.ucsra(), UCSRA::empty());
    }

    #[test]
    fn test_service_interrupt_dispatch() {
        let mut usart = test_usart(Config::default());
        let mut rx_queue = TestRxQueue::new(16);
        let mut tx_queue = TestTxQueue::new();

        usart.backend.regs[offsets::UDR] = 0x55;
        usart.service_interrupt(Interrupt::ReceiveComplete, &mut rx_queue, &mut tx_queue);
        assert_eq!(rx_queue.data, [0x55]);

        tx_queue.data.extend([0xaa, 0xbb]);
        usart.service_interrupt(Interrupt::DataRegisterEmpty, &mut rx_queue, &mut tx_queue);
        usart.service_interrupt(Interrupt::TransmitComplete, &mut rx_queue, &mut tx_queue);
        assert_eq!(usart.backend.data_writes(), [0xaa, 0xbb]);
    }

    #[test]
    fn test_new_mmio_rejects_null() {
        let result = unsafe { Usart::new_mmio(core::ptr::null_mut(), Config::default()) };
        assert!(result.is_err());
    }
}
