#![forbid(unsafe_code)]

//! Real-mode plumbing shared by the VBE stack.
//!
//! Everything the firmware sees is expressed in 8086 terms: 16-bit segment:offset pairs, packed
//! far pointers and the DPMI real-mode register structure. This crate keeps that arithmetic in one
//! place so the BIOS model (`vesa-bios`) and the client library (`vesa`) agree on it bit for bit.

pub mod addr;
pub mod memory;
pub mod regs;

pub use addr::{
    far_ptr, far_ptr_to_linear, linear_to_far_ptr, linear_to_offset, linear_to_segment, real_addr,
    MAX_REAL_ADDR,
};
pub use memory::{MemoryBus, PhysicalMemory};
pub use regs::RealModeRegs;
