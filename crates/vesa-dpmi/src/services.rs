use core::fmt;

use vesa_realmode::{linear_to_offset, linear_to_segment, RealModeRegs};

use crate::Result;

/// An LDT selector handed out by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Selector(pub u16);

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Block of conventional memory used to exchange argument blocks with real-mode firmware.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferBuffer {
    /// Linear address; must be below 1 MiB.
    pub addr: u32,
    pub len: u32,
}

impl TransferBuffer {
    pub fn segment(&self) -> u16 {
        linear_to_segment(self.addr)
    }

    pub fn offset(&self) -> u16 {
        linear_to_offset(self.addr)
    }
}

/// What the firmware gateway needs from the host.
pub trait RealModeServices {
    /// Runs real-mode interrupt `vector` with the given register image and writes the resulting
    /// registers back into `regs`.
    fn simulate_interrupt(&mut self, vector: u8, regs: &mut RealModeRegs) -> Result<()>;

    /// Copies conventional memory at linear `addr` into `buf`.
    fn dos_mem_get(&self, addr: u32, buf: &mut [u8]);

    /// Copies `buf` into conventional memory at linear `addr`.
    fn dos_mem_put(&mut self, addr: u32, buf: &[u8]);

    fn transfer_buffer(&self) -> TransferBuffer;

    fn dos_mem_fill(&mut self, addr: u32, len: usize, value: u8) {
        self.dos_mem_put(addr, &vec![value; len]);
    }
}

/// Memory-management services of a DPMI host.
pub trait Dpmi: RealModeServices {
    /// Maps `size` bytes of physical memory at `physical` into the linear address space and
    /// returns the linear address (DPMI 0800h).
    fn physical_address_mapping(&mut self, physical: u32, size: u32) -> Result<u32>;

    /// Releases a mapping previously returned by [`Dpmi::physical_address_mapping`] (DPMI 0801h).
    ///
    /// Freeing an address that is not currently mapped fails with
    /// [`DpmiError::UnknownMapping`](crate::DpmiError::UnknownMapping).
    fn free_physical_address_mapping(&mut self, linear: u32) -> Result<()>;

    /// Allocates `count` consecutive LDT descriptors and returns the first selector (DPMI 0000h).
    fn allocate_ldt_descriptors(&mut self, count: u16) -> Result<Selector>;

    fn set_segment_base_address(&mut self, selector: Selector, base: u32) -> Result<()>;

    /// Sets the inclusive segment limit: `limit` is the last addressable offset.
    fn set_segment_limit(&mut self, selector: Selector, limit: u32) -> Result<()>;

    fn free_ldt_descriptor(&mut self, selector: Selector) -> Result<()>;

    /// Whether the runtime was started with near-pointer support.
    fn nearptr_supported(&self) -> bool;

    /// Makes the whole linear address space reachable from the data segment. Returns `false` if
    /// the host refuses.
    fn nearptr_enable(&mut self) -> bool;

    fn nearptr_disable(&mut self);

    /// Offset that turns a linear address into a near pointer while near pointers are enabled.
    /// Addition wraps modulo 2^32.
    fn conventional_base(&self) -> u32;
}

/// Register image for a call into protected-mode firmware code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FastPathRegs {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
    pub esi: u32,
    pub edi: u32,
}

/// Calls into a relocatable block of firmware code.
pub trait FastPathExecutor {
    /// Performs a near call to `code[entry..]` with `regs` loaded, then stores the returned
    /// register values back into `regs`.
    ///
    /// # Safety
    ///
    /// `code` must be a protected-mode interface block returned by the adapter firmware,
    /// `entry` must be one of the entry offsets listed in its header, and the caller must have
    /// established whatever I/O and memory access that routine requires.
    unsafe fn call_near(&mut self, code: &[u8], entry: usize, regs: &mut FastPathRegs);
}
