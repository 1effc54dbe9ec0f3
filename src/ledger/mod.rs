//! Session ledger and its bounded buffers.

mod ledger;
mod ring;
mod timing;

pub use ledger::SessionLedger;
pub use ring::RingBuffer;
pub use timing::MoveTimer;
