// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Constants, Register Offsets, Register Bits, and Divisor Arithmetic.
//!
//! Models the raw low-level details of the megaAVR USART as of the
//! [datasheet], and avoids too opinionated abstractions.
//!
//! [datasheet]: https://ww1.microchip.com/downloads/en/DeviceDoc/ATmega48A-PA-88A-PA-168A-PA-328-P-DS-DS40002061B.pdf

pub use crate::spec::errors::*;

/// Typical clock frequency of an externally clocked AVR: 16 Mhz.
pub const CLK_FREQUENCY_HZ: u32 = 16_000_000;

/// The largest value the 12-bit UBRR baud-rate register can hold.
pub const UBRR_MAX: u16 = 0x0fff;

mod errors {
    use core::error::Error;
    use core::fmt::{self, Display, Formatter};

    /// Error that is returned when [`select_divisor`] found no clock-division
    /// path whose divisor register can represent the requested baud rate.
    ///
    /// The condition is deterministic for a given clock and baud rate, so
    /// retrying with the same inputs cannot succeed.
    ///
    /// [`select_divisor`]: crate::spec::select_divisor
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Hash)]
    pub struct UnachievableBaudRateError {
        /// The clock frequency of the peripheral.
        pub clock_hz: u32,
        /// The requested baud rate.
        pub baud_rate: u32,
    }

    impl Display for UnachievableBaudRateError {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            write!(
                f,
                "Baud rate is representable by neither the /8 nor the /16 clock path! clock_hz={}, baud_rate={}",
                self.clock_hz, self.baud_rate
            )
        }
    }

    impl Error for UnachievableBaudRateError {}
}

/// The fixed factor by which the peripheral clock is divided before the
/// divisor in [`registers::offsets::UBRRL`]/[`registers::offsets::UBRRH`]
/// is applied.
///
/// The hardware selects `/8` via the `U2X` bit in [`registers::UCSRA`]
/// ("double speed"); `/16` is the power-on default.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DivisionFactor {
    /// Double-speed operation: eight clock ticks per bit sample window.
    Div8,
    /// Normal-speed operation: sixteen clock ticks per bit sample window.
    #[default]
    Div16,
}

impl DivisionFactor {
    /// Returns the value as corresponding integer.
    #[must_use]
    pub const fn to_integer(self) -> u32 {
        match self {
            Self::Div8 => 8,
            Self::Div16 => 16,
        }
    }
}

/// The outcome of [`select_divisor`]: the clock-division path to program
/// along with the matching UBRR register value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DivisorSelection {
    /// The clock-division path to select.
    pub factor: DivisionFactor,
    /// The divisor to program into the UBRR register. Never zero and never
    /// larger than [`UBRR_MAX`].
    pub ubrr: u16,
}

/// Calculates the UBRR divisor approximating `baud_rate` for a (pre-divided)
/// clock, using nearest-integer rounding rather than truncation.
///
/// Rounding minimizes the steady-state bit-timing error: the computed divisor
/// maps to whichever representable rate is closest to the request.
///
/// # Arguments
/// - `clock_hz`: The peripheral clock **after** applying the
///   [`DivisionFactor`].
/// - `baud_rate`: The requested baud rate. Must not be zero.
#[must_use]
pub const fn ubrr_value(clock_hz: u32, baud_rate: u32) -> u32 {
    (clock_hz + baud_rate / 2) / baud_rate
}

/// Calculates the baud rate the hardware actually produces for a divisor on
/// the given clock-division path.
///
/// # Arguments
/// - `clock_hz`: The undivided peripheral clock, typically
///   [`CLK_FREQUENCY_HZ`].
/// - `factor`: The clock-division path.
/// - `ubrr`: The divisor. Must not be zero.
#[must_use]
pub const fn effective_baud_rate(clock_hz: u32, factor: DivisionFactor, ubrr: u16) -> u32 {
    clock_hz / (factor.to_integer() * ubrr as u32)
}

/// Computes the divisor candidate for one clock-division path.
///
/// Returns `None` when the path cannot represent the rate: a rounded divisor
/// of zero (the rate lies above what the path reaches) or one past the
/// 12-bit register range (the rate lies below it).
const fn divisor_candidate(clock_hz: u32, factor: DivisionFactor, baud_rate: u32) -> Option<u16> {
    let ubrr = ubrr_value(clock_hz / factor.to_integer(), baud_rate);
    if ubrr == 0 || ubrr > UBRR_MAX as u32 {
        None
    } else {
        Some(ubrr as u16)
    }
}

/// Selects the clock-division path and UBRR divisor that best approximate
/// the requested baud rate.
///
/// Both the `/8` and the `/16` path are tried. If only one of them can
/// represent the rate within the divisor register's range, it is taken. If
/// both can, the one with the strictly smaller absolute timing error wins;
/// on a tie the `/16` path is kept, as it samples each bit twice as often.
///
/// # Arguments
/// - `clock_hz`: The undivided peripheral clock, typically
///   [`CLK_FREQUENCY_HZ`].
/// - `baud_rate`: The requested baud rate.
pub fn select_divisor(
    clock_hz: u32,
    baud_rate: u32,
) -> Result<DivisorSelection, UnachievableBaudRateError> {
    if baud_rate == 0 {
        return Err(UnachievableBaudRateError {
            clock_hz,
            baud_rate,
        });
    }

    let div16 = divisor_candidate(clock_hz, DivisionFactor::Div16, baud_rate);
    let div8 = divisor_candidate(clock_hz, DivisionFactor::Div8, baud_rate);

    match (div16, div8) {
        (None, None) => Err(UnachievableBaudRateError {
            clock_hz,
            baud_rate,
        }),
        (Some(ubrr), None) => Ok(DivisorSelection {
            factor: DivisionFactor::Div16,
            ubrr,
        }),
        (None, Some(ubrr)) => Ok(DivisorSelection {
            factor: DivisionFactor::Div8,
            ubrr,
        }),
        (Some(ubrr16), Some(ubrr8)) => {
            let err16 =
                effective_baud_rate(clock_hz, DivisionFactor::Div16, ubrr16).abs_diff(baud_rate);
            let err8 =
                effective_baud_rate(clock_hz, DivisionFactor::Div8, ubrr8).abs_diff(baud_rate);
            if err8 < err16 {
                Ok(DivisorSelection {
                    factor: DivisionFactor::Div8,
                    ubrr: ubrr8,
                })
            } else {
                Ok(DivisorSelection {
                    factor: DivisionFactor::Div16,
                    ubrr: ubrr16,
                })
            }
        }
    }
}

/// Exposes low-level information about the on-chip register layout and
/// provides types that model individual registers.
///
/// The getters and setters in this module operate exclusively on raw bit
/// representations within the local computing context. They are limited to
/// extracting or updating the corresponding fields and do not perform direct
/// hardware access.
pub mod registers {
    use bitflags::bitflags;

    /// Provides the register offset from the base of the USART register
    /// block.
    ///
    /// The block is laid out as in the megaAVR data space, e.g. base `0xc0`
    /// for USART0 on the ATmega328P.
    pub mod offsets {
        /// The maximum register offset, i.e., the size of the register block.
        ///
        /// The maximum index is therefore this value decremented by one.
        pub const MAX: usize = 7;

        /// USART Control and Status Register A (UCSRnA).
        pub const UCSRA: usize = 0;

        /// USART Control and Status Register B (UCSRnB).
        pub const UCSRB: usize = 1;

        /// USART Control and Status Register C (UCSRnC).
        pub const UCSRC: usize = 2;

        /* offset 3 is reserved in the data space */

        /// USART Baud Rate Register, low byte (UBRRnL).
        pub const UBRRL: usize = 4;

        /// USART Baud Rate Register, high byte (UBRRnH).
        ///
        /// Only the low four bits are implemented; the divisor is 12 bits
        /// wide in total.
        pub const UBRRH: usize = 5;

        /// USART I/O Data Register (UDRn).
        ///
        /// Reads access the receive buffer, writes the transmit holding
        /// buffer, effectively acting as **data** register.
        pub const UDR: usize = 6;
    }

    /// Typing of the data register (UDR).
    pub type UDR = u8;

    bitflags! {
        /// Typing of USART Control and Status Register A (UCSRnA).
        ///
        /// Holds the receive/transmit status flags and the double-speed
        /// selector. The three high flags are the peripheral's interrupt
        /// sources.
        ///
        /// This is a **read/write** register, although most bits are set by
        /// hardware and cleared as a side effect of other accesses.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct UCSRA: u8 {
            /// Multi-processor communication mode.
            const MPCM = 1 << 0;
            /// Double-speed operation.
            ///
            /// When set, the baud-rate clock runs at `/8` instead of `/16`
            /// (see [`DivisionFactor`]).
            ///
            /// [`DivisionFactor`]: crate::spec::DivisionFactor
            const U2X = 1 << 1;
            /// Parity Error flag. The next character in the receive buffer
            /// had a parity error when received.
            ///
            /// Valid until the receive buffer is read.
            const UPE = 1 << 2;
            /// Data OverRun flag. A character was lost because the receive
            /// buffer was full when a new start bit was detected.
            ///
            /// Valid until the receive buffer is read.
            const DOR = 1 << 3;
            /// Frame Error flag. The next character in the receive buffer had
            /// a frame error (its first stop bit was zero) when received.
            ///
            /// Valid until the receive buffer is read.
            const FE = 1 << 4;
            /// USART Data Register Empty flag. The transmit holding buffer is
            /// free to accept another byte.
            ///
            /// Source of the data-register-empty interrupt when
            /// [`UCSRB::UDRIE`] is set. Cleared by writing [`offsets::UDR`].
            const UDRE = 1 << 5;
            /// Transmit Complete flag. The entire frame in the transmit shift
            /// register has been shifted out with no new data pending.
            ///
            /// Source of the transmit-complete interrupt when
            /// [`UCSRB::TXCIE`] is set. Writing a one to this bit position
            /// raises the flag and with it the interrupt condition, which is
            /// how an idle transmitter is kicked back into action.
            const TXC = 1 << 6;
            /// Receive Complete flag. Unread data exists in the receive
            /// buffer.
            ///
            /// Source of the receive-complete interrupt when
            /// [`UCSRB::RXCIE`] is set. Cleared by reading [`offsets::UDR`].
            const RXC = 1 << 7;
        }
    }

    bitflags! {
        /// Typing of USART Control and Status Register B (UCSRnB).
        ///
        /// Individually enables the receiver, the transmitter, and each of
        /// the three interrupt sources. A logic "1" in any of the enable bits
        /// enables the corresponding function, a logic "0" disables it.
        ///
        /// This is a **read/write** register.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct UCSRB: u8 {
            /// Transmit data bit 8 in nine-bit frames.
            const TXB8 = 1 << 0;
            /// Receive data bit 8 in nine-bit frames.
            const RXB8 = 1 << 1;
            /// Third (high) bit of [`CharacterSize`]. The low two bits live
            /// in [`UCSRC`].
            const UCSZ2 = 1 << 2;
            /// Enables the transmitter.
            const TXEN = 1 << 3;
            /// Enables the receiver.
            const RXEN = 1 << 4;
            /// Enables the data-register-empty interrupt ([`UCSRA::UDRE`]).
            const UDRIE = 1 << 5;
            /// Enables the transmit-complete interrupt ([`UCSRA::TXC`]).
            const TXCIE = 1 << 6;
            /// Enables the receive-complete interrupt ([`UCSRA::RXC`]).
            const RXCIE = 1 << 7;
        }
    }

    impl UCSRB {
        /// Returns the raw high bit of the split [`CharacterSize`] field.
        #[must_use]
        pub const fn character_size_high_bit(self) -> u8 {
            (self.bits() >> 2) & 0b1
        }

        /// Sets the high bit of the split [`CharacterSize`] field.
        #[must_use]
        pub fn set_character_size_high(self, value: CharacterSize) -> Self {
            self | Self::from_bits_retain(((value.to_raw_bits() >> 2) & 0b1) << 2)
        }
    }

    bitflags! {
        /// Typing of USART Control and Status Register C (UCSRnC).
        ///
        /// Configures the serial frame format: operating mode, parity, stop
        /// bits, the low two bits of the character size, and the clock
        /// polarity for synchronous operation.
        ///
        /// This is a **read/write** register.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct UCSRC: u8 {
            /// Clock polarity for synchronous modes (see [`ClockPolarity`]).
            ///
            /// Must be written zero in asynchronous mode.
            const UCPOL = 1 << 0;
            /// First bit of [`CharacterSize`].
            const UCSZ0 = 1 << 1;
            /// Second bit of [`CharacterSize`].
            const UCSZ1 = 1 << 2;
            /// If cleared, one stop bit is transmitted. If set, two stop bits
            /// are transmitted before the start bit of the next character.
            ///
            /// The receiver ignores this setting.
            const USBS = 1 << 3;
            /// First bit of [`Parity`].
            const UPM0 = 1 << 4;
            /// Second bit of [`Parity`].
            const UPM1 = 1 << 5;
            /// First bit of [`OperatingMode`].
            const UMSEL0 = 1 << 6;
            /// Second bit of [`OperatingMode`].
            const UMSEL1 = 1 << 7;
        }
    }

    impl UCSRC {
        /// Returns the [`OperatingMode`], or `None` for the reserved bit
        /// pattern.
        #[must_use]
        pub const fn operating_mode(self) -> Option<OperatingMode> {
            let bits = (self.bits() >> 6) & 0b11;
            OperatingMode::from_raw_bits(bits)
        }

        /// Sets the [`OperatingMode`].
        #[must_use]
        pub fn set_operating_mode(self, value: OperatingMode) -> Self {
            self | Self::from_bits_retain(value.to_raw_bits() << 6)
        }

        /// Returns the [`Parity`], or `None` for the reserved bit pattern.
        #[must_use]
        pub const fn parity(self) -> Option<Parity> {
            let bits = (self.bits() >> 4) & 0b11;
            Parity::from_raw_bits(bits)
        }

        /// Sets the [`Parity`].
        #[must_use]
        pub fn set_parity(self, value: Parity) -> Self {
            self | Self::from_bits_retain(value.to_raw_bits() << 4)
        }

        /// Returns the [`StopBits`].
        #[must_use]
        pub const fn stop_bits(self) -> StopBits {
            let bits = (self.bits() >> 3) & 0b1;
            StopBits::from_raw_bits(bits)
        }

        /// Sets the [`StopBits`].
        #[must_use]
        pub fn set_stop_bits(self, value: StopBits) -> Self {
            self | Self::from_bits_retain(value.to_raw_bits() << 3)
        }

        /// Returns the raw low two bits of the split [`CharacterSize`]
        /// field.
        #[must_use]
        pub const fn character_size_low_bits(self) -> u8 {
            (self.bits() >> 1) & 0b11
        }

        /// Sets the low two bits of the split [`CharacterSize`] field.
        #[must_use]
        pub fn set_character_size_low(self, value: CharacterSize) -> Self {
            self | Self::from_bits_retain((value.to_raw_bits() & 0b11) << 1)
        }

        /// Returns the [`ClockPolarity`].
        #[must_use]
        pub const fn clock_polarity(self) -> ClockPolarity {
            let bits = self.bits() & 0b1;
            ClockPolarity::from_raw_bits(bits)
        }

        /// Sets the [`ClockPolarity`].
        #[must_use]
        pub fn set_clock_polarity(self, value: ClockPolarity) -> Self {
            self | Self::from_bits_retain(value.to_raw_bits())
        }
    }

    /// Reassembles the [`CharacterSize`] from its halves in [`UCSRB`] and
    /// [`UCSRC`].
    ///
    /// Returns `None` for the reserved bit patterns.
    #[must_use]
    pub const fn character_size(ucsrb: UCSRB, ucsrc: UCSRC) -> Option<CharacterSize> {
        let bits = (ucsrb.character_size_high_bit() << 2) | ucsrc.character_size_low_bits();
        CharacterSize::from_raw_bits(bits)
    }

    /// The operating mode of the USART in [`UCSRC`].
    ///
    /// This type is a convenient and non-ABI compatible abstraction. ABI
    /// compatibility is given via [`OperatingMode::from_raw_bits`] and
    /// [`OperatingMode::to_raw_bits`].
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub enum OperatingMode {
        /// Clockless operation, timing recovered from the start bit.
        ///
        /// This is what is commonly meant by "UART".
        #[default]
        Asynchronous,
        /// Clocked operation over the XCK pin.
        Synchronous,
        /// The USART acts as an SPI master (MSPIM).
        MasterSpi,
    }

    impl OperatingMode {
        /// Translates the raw encoding into the corresponding value.
        ///
        /// Returns `None` for the reserved pattern `0b10`.
        ///
        /// This function operates on the value as-is and does not perform any
        /// shifting of bits.
        #[must_use]
        pub const fn from_raw_bits(bits: u8) -> Option<Self> {
            let bits = bits & 0b11;
            match bits {
                0b00 => Some(Self::Asynchronous),
                0b01 => Some(Self::Synchronous),
                0b11 => Some(Self::MasterSpi),
                _ => None,
            }
        }

        /// Translates the value into the corresponding raw encoding.
        ///
        /// This function operates on the value as-is and does not perform any
        /// shifting of bits.
        #[must_use]
        pub const fn to_raw_bits(self) -> u8 {
            match self {
                Self::Asynchronous => 0b00,
                Self::Synchronous => 0b01,
                Self::MasterSpi => 0b11,
            }
        }
    }

    /// The parity mode for transmission and reception in [`UCSRC`].
    ///
    /// This type is a convenient and non-ABI compatible abstraction. ABI
    /// compatibility is given via [`Parity::from_raw_bits`] and
    /// [`Parity::to_raw_bits`].
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub enum Parity {
        /// No parity bit is transmitted nor expected.
        #[default]
        Disabled,
        /// The number of one bits including the parity bit must be even.
        Even,
        /// The number of one bits including the parity bit must be odd.
        Odd,
    }

    impl Parity {
        /// Translates the raw encoding into the corresponding value.
        ///
        /// Returns `None` for the reserved pattern `0b01`.
        ///
        /// This function operates on the value as-is and does not perform any
        /// shifting of bits.
        #[must_use]
        pub const fn from_raw_bits(bits: u8) -> Option<Self> {
            let bits = bits & 0b11;
            match bits {
                0b00 => Some(Self::Disabled),
                0b10 => Some(Self::Even),
                0b11 => Some(Self::Odd),
                _ => None,
            }
        }

        /// Translates the value into the corresponding raw encoding.
        ///
        /// This function operates on the value as-is and does not perform any
        /// shifting of bits.
        #[must_use]
        pub const fn to_raw_bits(self) -> u8 {
            match self {
                Self::Disabled => 0b00,
                Self::Even => 0b10,
                Self::Odd => 0b11,
            }
        }
    }

    /// The number of stop bits appended to each frame in [`UCSRC`].
    ///
    /// This type is a convenient and non-ABI compatible abstraction. ABI
    /// compatibility is given via [`StopBits::from_raw_bits`] and
    /// [`StopBits::to_raw_bits`].
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub enum StopBits {
        /// One stop bit.
        #[default]
        One,
        /// Two stop bits.
        Two,
    }

    impl StopBits {
        /// Translates the raw encoding into the corresponding value.
        ///
        /// This function operates on the value as-is and does not perform any
        /// shifting of bits.
        #[must_use]
        pub const fn from_raw_bits(bits: u8) -> Self {
            if bits & 0b1 == 0 {
                Self::One
            } else {
                Self::Two
            }
        }

        /// Translates the value into the corresponding raw encoding.
        ///
        /// This function operates on the value as-is and does not perform any
        /// shifting of bits.
        #[must_use]
        pub const fn to_raw_bits(self) -> u8 {
            match self {
                Self::One => 0b0,
                Self::Two => 0b1,
            }
        }
    }

    /// The number of data bits per frame, split across [`UCSRB`] (high bit)
    /// and [`UCSRC`] (low two bits).
    ///
    /// This type is a convenient and non-ABI compatible abstraction. ABI
    /// compatibility is given via [`CharacterSize::from_raw_bits`] and
    /// [`CharacterSize::to_raw_bits`].
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub enum CharacterSize {
        /// Five data bits.
        FiveBits,
        /// Six data bits.
        SixBits,
        /// Seven data bits.
        SevenBits,
        /// Eight data bits.
        ///
        /// This is by far the most common choice.
        #[default]
        EightBits,
        /// Nine data bits.
        ///
        /// The ninth bit travels via `TXB8`/`RXB8` in [`UCSRB`] and is not
        /// handled by the byte pump.
        NineBits,
    }

    impl CharacterSize {
        /// Translates the raw three-bit encoding into the corresponding
        /// value.
        ///
        /// Returns `None` for the reserved patterns `0b100` to `0b110`.
        ///
        /// This function operates on the value as-is and does not perform any
        /// shifting of bits.
        #[must_use]
        pub const fn from_raw_bits(bits: u8) -> Option<Self> {
            let bits = bits & 0b111;
            match bits {
                0b000 => Some(Self::FiveBits),
                0b001 => Some(Self::SixBits),
                0b010 => Some(Self::SevenBits),
                0b011 => Some(Self::EightBits),
                0b111 => Some(Self::NineBits),
                _ => None,
            }
        }

        /// Translates the value into the corresponding raw three-bit
        /// encoding.
        ///
        /// This function operates on the value as-is and does not perform any
        /// shifting of bits.
        #[must_use]
        pub const fn to_raw_bits(self) -> u8 {
            match self {
                Self::FiveBits => 0b000,
                Self::SixBits => 0b001,
                Self::SevenBits => 0b010,
                Self::EightBits => 0b011,
                Self::NineBits => 0b111,
            }
        }
    }

    /// The relation between data change and clock edge in synchronous modes,
    /// configured in [`UCSRC`].
    ///
    /// This type is a convenient and non-ABI compatible abstraction. ABI
    /// compatibility is given via [`ClockPolarity::from_raw_bits`] and
    /// [`ClockPolarity::to_raw_bits`].
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub enum ClockPolarity {
        /// Transmitted data changes on the rising XCK edge, received data is
        /// sampled on the falling edge.
        #[default]
        RisingEdge,
        /// Transmitted data changes on the falling XCK edge, received data is
        /// sampled on the rising edge.
        FallingEdge,
    }

    impl ClockPolarity {
        /// Translates the raw encoding into the corresponding value.
        ///
        /// This function operates on the value as-is and does not perform any
        /// shifting of bits.
        #[must_use]
        pub const fn from_raw_bits(bits: u8) -> Self {
            if bits & 0b1 == 0 {
                Self::RisingEdge
            } else {
                Self::FallingEdge
            }
        }

        /// Translates the value into the corresponding raw encoding.
        ///
        /// This function operates on the value as-is and does not perform any
        /// shifting of bits.
        #[must_use]
        pub const fn to_raw_bits(self) -> u8 {
            match self {
                Self::RisingEdge => 0b0,
                Self::FallingEdge => 0b1,
            }
        }
    }
}
