// SPDX-License-Identifier: MIT OR Apache-2.0

//! The boundary to the externally owned byte queues.
//!
//! The driver never owns a queue. Each queue has exactly one producer and
//! one consumer: the receive queue is written by
//! [`Usart::on_receive_complete`] and read by application code, the transmit
//! queue is written by application code and read by the transmit side of the
//! byte pump. The queue implementation is responsible for its own
//! consistency under that single-producer/single-consumer split; no
//! additional locking is required by this crate.
//!
//! All operations here are non-blocking by contract, as they are called from
//! interrupt context.
//!
//! [`Usart::on_receive_complete`]: crate::Usart::on_receive_complete

use bitflags::bitflags;
use core::error::Error;
use core::fmt::{self, Display, Formatter};

bitflags! {
    /// Consumer-side events a queue can report.
    ///
    /// Events armed via [`TransmitQueue::watch`] must be delivered to
    /// [`Usart::on_transmit_queue_event`] synchronously from within the
    /// producer's write call, exactly once per successful write.
    ///
    /// [`Usart::on_transmit_queue_event`]: crate::Usart::on_transmit_queue_event
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct QueueEvents: u8 {
        /// A byte was written into the queue.
        ///
        /// This is the only event the driver watches: it is what restarts
        /// transmission after the pipe went fully idle.
        const NEW_DATA = 1 << 0;
    }
}

/// The queue rejected a write because it is at capacity.
///
/// Whether an overflowing byte is dropped or the producer retries is the
/// queue owner's policy; the driver never escalates this as a fault.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct QueueFullError;

impl Display for QueueFullError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "the queue is at capacity")
    }
}

impl Error for QueueFullError {}

/// The queue the receive path of the byte pump writes into.
///
/// Implemented by the externally owned receive FIFO; application code reads
/// the other end.
pub trait ReceiveQueue {
    /// Non-blocking enqueue of one byte.
    ///
    /// Must not block or spin; a full queue returns [`QueueFullError`]
    /// immediately.
    fn write_one(&mut self, byte: u8) -> Result<(), QueueFullError>;
}

/// The queue the transmit side of the byte pump pulls from.
///
/// Implemented by the externally owned transmit FIFO; application code
/// writes the other end.
pub trait TransmitQueue {
    /// Non-blocking dequeue of one byte.
    ///
    /// `None` means the queue is empty. That is the expected idle condition
    /// of the transmit path, not an error.
    fn read_one(&mut self) -> Option<u8>;

    /// Arms consumer-side event delivery for the given mask.
    ///
    /// Replaces any previously armed mask. See [`QueueEvents`] for the
    /// delivery contract.
    fn watch(&mut self, mask: QueueEvents);
}
