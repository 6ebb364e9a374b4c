//! VESA BIOS Extensions (VBE) mode negotiation and frame buffer mapping.
//!
//! The crate is layered the way a DOS-extended program talks to an SVGA adapter:
//!
//! - [`vbe`] issues INT 10h AX=4Fxxh requests through a DPMI host's real-mode interrupt
//!   simulation and decodes the uniform status word.
//! - [`ModeCatalog`] walks the controller's mode list against a caller predicate.
//! - [`map_physical_memory`] maps the linear frame buffer; [`FlatAccess`] and [`ScopedAccess`]
//!   make the mapping reachable through near pointers or a dedicated LDT selector.
//! - [`FastPathInterface`] copies the VBE 2.0 protected-mode interface out of the video BIOS and
//!   resolves its entry points, which [`set_bank_position`] calls directly.
//! - [`VesaContext`] ties these together into one session.
//!
//! Everything platform-specific sits behind the traits in [`vesa_dpmi`].

pub mod access;
pub mod bank;
pub mod bios_image;
pub mod catalog;
pub mod context;
pub mod error;
pub mod info;
pub mod mapping;
pub mod pmi;
pub mod vbe;
pub mod vga_io;

pub use access::{AccessDescriptor, AccessError, AccessStrategy, FlatAccess, ScopedAccess};
pub use bank::{set_bank_position, set_display_start_address};
#[cfg(target_arch = "x86")]
pub use bank::NativeExecutor;
pub use bios_image::{find_pmid, PmInfoBlock, VideoBiosImage};
pub use catalog::{ModeCatalog, MAX_CATALOG_MODES, MODE_LIST_END};
pub use context::VesaContext;
pub use error::{Error, Result};
pub use info::{
    Capabilities, ColorField, ControllerInfo, CrtcFlags, CrtcInfo, DirectColorAttributes,
    MemoryModel, ModeAttributes, ModeFlags, ModeInfo, StateFlags, WindowAttributes,
};
pub use mapping::{
    map_physical_memory, total_memory_bytes, unmap_physical_memory, MapError, MemoryMapping,
};
pub use pmi::{EntryPoint, FastPathInterface, MemoryRegion, PmiEntry, PmiError, PmiHeader};
pub use vbe::{Controller, PaletteEntry, ScanLineInfo, VbeError, VbeFunction, VbeStatus, Window};
pub use vga_io::{PortIO, VgaIoBase};
