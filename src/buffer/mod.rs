mod rx;
mod segment;
mod tx;

pub use segment::Segment;

pub use rx::RxBuffer;
pub use tx::TxBuffer;
