//! DOS Protected Mode Interface services consumed by the VBE stack.
//!
//! [`RealModeServices`] is the narrow surface the firmware gateway needs (simulate a real-mode
//! interrupt, move bytes through conventional memory). [`Dpmi`] adds the memory-management
//! services used to reach the frame buffer: physical address mapping, LDT descriptors and
//! near-pointer enablement. [`FastPathExecutor`] is the boundary for calling firmware-supplied
//! protected-mode code.
//!
//! [`HostDpmi`] implements all three in-process on top of a sparse [`PhysicalMemory`] and a
//! pluggable [`RealModeBios`], which is how the rest of the workspace is validated without a DOS
//! extender.
//!
//! [`PhysicalMemory`]: vesa_realmode::PhysicalMemory

mod error;
mod host;
mod services;

pub use error::{DpmiError, Result};
pub use host::{HostDpmi, HostDpmiConfig, InterruptRecord, RealModeBios};
pub use services::{
    Dpmi, FastPathExecutor, FastPathRegs, RealModeServices, Selector, TransferBuffer,
};
