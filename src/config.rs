// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for [`Usart`].
//!
//! [`Usart`]: crate::Usart

use core::cmp::Ordering;

use crate::spec::registers::{
    CharacterSize, ClockPolarity, OperatingMode, Parity, StopBits,
};

/// The speed of data transmission, measured in bits per second.
///
/// This type is a convenient and non-ABI compatible abstraction. Use
/// [`select_divisor`] to get the clock-division path and the divisor for
/// the UBRR register.
///
/// [`select_divisor`]: crate::spec::select_divisor
#[allow(missing_docs)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum BaudRate {
    // List of typical baud rates.
    Baud115200,
    Baud57600,
    Baud38400,
    Baud19200,
    #[default]
    Baud9600,
    Baud4800,
    Baud2400,
    Baud1200,
    Custom(u32),
}

impl BaudRate {
    /// Returns the value as corresponding integer.
    #[must_use]
    pub const fn to_integer(self) -> u32 {
        match self {
            Self::Baud115200 => 115_200,
            Self::Baud57600 => 57_600,
            Self::Baud38400 => 38_400,
            Self::Baud19200 => 19_200,
            Self::Baud9600 => 9600,
            Self::Baud4800 => 4800,
            Self::Baud2400 => 2400,
            Self::Baud1200 => 1200,
            Self::Custom(val) => val,
        }
    }

    /// Creates the type from an integer representation of the baud rate.
    #[must_use]
    pub const fn from_integer(value: u32) -> Self {
        match value {
            115_200 => Self::Baud115200,
            57_600 => Self::Baud57600,
            38_400 => Self::Baud38400,
            19_200 => Self::Baud19200,
            9600 => Self::Baud9600,
            4800 => Self::Baud4800,
            2400 => Self::Baud2400,
            1200 => Self::Baud1200,
            baud_rate => Self::Custom(baud_rate),
        }
    }
}

impl PartialOrd for BaudRate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BaudRate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_integer().cmp(&other.to_integer())
    }
}

/// Configuration for [`Usart`].
///
/// Please note that sender and receiver **must agree** on the transmission
/// settings, otherwise you receive garbage.
///
/// The typed fields here are the API-boundary representation of the framing
/// configuration; their packed encoding into the UCSRB/UCSRC registers is a
/// serialization detail handled in [`Usart::configure`].
///
/// [`Usart`]: crate::Usart
/// [`Usart::configure`]: crate::Usart::configure
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Config {
    // Clocking
    /// The undivided peripheral clock frequency.
    pub clock_hz: u32,
    /// The baud rate to use.
    pub baud_rate: BaudRate,

    // Framing
    /// Whether the USART runs clockless, clocked, or as SPI master.
    pub operating_mode: OperatingMode,
    /// Whether parity bits should be used.
    pub parity: Parity,
    /// The number of stop bits per frame.
    pub stop_bits: StopBits,
    /// The number of data bits per frame.
    pub character_size: CharacterSize,
    /// The XCK clock edge relation; ignored by hardware in asynchronous
    /// mode.
    pub clock_polarity: ClockPolarity,

    // Directions
    /// Whether the receiver and its interrupt should be enabled.
    pub receiver: bool,
    /// Whether the transmitter and its interrupts should be enabled.
    pub transmitter: bool,
}

impl Default for Config {
    fn default() -> Self {
        // Default is a 9600 8N1 connection on a 16 Mhz part, both
        // directions active.
        Self {
            clock_hz: crate::spec::CLK_FREQUENCY_HZ,
            baud_rate: BaudRate::Baud9600,

            operating_mode: OperatingMode::Asynchronous,
            parity: Parity::Disabled,
            stop_bits: StopBits::One,
            character_size: CharacterSize::EightBits,
            clock_polarity: ClockPolarity::RisingEdge,

            receiver: true,
            transmitter: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baud_rate_integer_round_trip() {
        assert_eq!(BaudRate::Baud9600.to_integer(), 9600);
        assert_eq!(BaudRate::from_integer(9600), BaudRate::Baud9600);
        assert_eq!(BaudRate::from_integer(31_250), BaudRate::Custom(31_250));
        assert_eq!(BaudRate::Custom(31_250).to_integer(), 31_250);
    }

    #[test]
    fn test_baud_rate_ordering() {
        assert!(BaudRate::Baud1200 < BaudRate::Baud9600);
        assert!(BaudRate::Custom(10_000) > BaudRate::Baud9600);
        assert!(BaudRate::Baud115200 > BaudRate::Baud57600);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.baud_rate, BaudRate::Baud9600);
        assert_eq!(config.character_size, CharacterSize::EightBits);
        assert_eq!(config.parity, Parity::Disabled);
        assert_eq!(config.stop_bits, StopBits::One);
        assert!(config.receiver);
        assert!(config.transmitter);
    }
}
