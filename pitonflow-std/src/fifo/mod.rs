//! FIFOs.

mod async_fifo;
mod one_read_one_write;
pub mod tracker;

pub use async_fifo::AsyncFifo;
pub use one_read_one_write::Fifo;
