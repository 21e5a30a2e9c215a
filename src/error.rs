// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors that can happen when working with [`Usart`].
//!
//! The single configuration-time error, [`UnachievableBaudRateError`], lives
//! next to the divisor arithmetic in [`crate::spec`].
//!
//! [`Usart`]: crate::Usart
//! [`UnachievableBaudRateError`]: crate::spec::UnachievableBaudRateError

use crate::backend::MmioAddress;
use core::error::Error;
use core::fmt::Display;

/// The specified base address is invalid because it is either null or does
/// not offer [`offsets::MAX`] subsequent addresses.
///
/// [`offsets::MAX`]: crate::spec::registers::offsets::MAX
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InvalidAddressError(pub(crate) MmioAddress);

impl Display for InvalidAddressError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "invalid register address: {:x?}", self.0)
    }
}

impl Error for InvalidAddressError {}
