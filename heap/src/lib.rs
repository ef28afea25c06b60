#![cfg_attr(not(test), no_std)]

extern crate spin;
extern crate system;

pub mod block;
pub mod console;
pub mod error;
pub mod first_fit;
pub mod locked;

pub use block::{BlockState, ALIGN, HEADER_SIZE};
pub use error::HeapError;
pub use first_fit::{BlockInfo, Blocks, FirstFitHeap, HeapPtr};
pub use locked::LockedHeap;
