// SPDX-License-Identifier: MIT OR Apache-2.0

//! Abstraction over the register access backend.
//!
//! The megaAVR USART registers live in the extended I/O portion of the data
//! space and are reached with plain volatile loads and stores, so MMIO is
//! the only real backend. The trait seam exists so that tests (and register
//! emulators) can substitute their own backend.
//!
//! Main exports:
//! - [`Backend`]
//! - [`MmioBackend`]

use crate::spec::registers::offsets;
use core::ptr::{read_volatile, write_volatile};

/// Memory-mapped I/O (MMIO) address of the base of a USART register block.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Hash)]
pub struct MmioAddress(pub(crate) *mut u8);

impl MmioAddress {
    /// Adds the offset onto the address.
    fn add_offset(self, offset: u8) -> Self {
        // SAFETY: We ensure on a higher level that the base address is valid
        // and that this will not wrap.
        let address = unsafe { self.0.add(offset as usize) };
        Self(address)
    }
}

fn assert_offset(offset: u8) {
    assert!(
        (offset as usize) < offsets::MAX,
        "the offset should be within the expected range: {offset}, expected: < {}",
        offsets::MAX
    );
}

/// Abstraction over the register access of a USART peripheral.
pub trait Backend {
    /// Reads one byte from the specified register.
    ///
    /// This needs a mutable reference as reads can have side effects on the
    /// device, depending on the register.
    ///
    /// # Arguments
    ///
    /// - `offset`: Offset regarding the base address.
    ///
    /// # Safety
    ///
    /// Callers must ensure that the provided address is valid and safe to
    /// read.
    unsafe fn read_register(&mut self, offset: u8) -> u8;

    /// Writes one byte to the specified register.
    ///
    /// Writes can have side effects on the device, depending on the
    /// register.
    ///
    /// # Arguments
    ///
    /// - `offset`: Offset regarding the base address.
    ///
    /// # Safety
    ///
    /// Callers must ensure that the provided address is valid and safe to
    /// write.
    unsafe fn write_register(&mut self, offset: u8, value: u8);
}

/// MMIO-mapped USART register block.
#[derive(Debug)]
pub struct MmioBackend(pub(crate) MmioAddress /* base address, non-null */);

impl Backend for MmioBackend {
    unsafe fn read_register(&mut self, offset: u8) -> u8 {
        assert_offset(offset);
        let address = self.0.add_offset(offset);

        // SAFETY: The caller ensured that the MMIO address is safe to use.
        unsafe { read_volatile(address.0) }
    }

    unsafe fn write_register(&mut self, offset: u8, value: u8) {
        assert_offset(offset);
        let address = self.0.add_offset(offset);

        // SAFETY: The caller ensured that the MMIO address is safe to use.
        unsafe { write_volatile(address.0, value) }
    }
}
