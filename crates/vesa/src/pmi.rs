//! The VBE 2.0 protected-mode interface (function 0Ah).
//!
//! The firmware hands out a relocatable block of 32-bit code whose first words are offsets of
//! its entry points. [`FastPathInterface`] owns a copy of that block; [`EntryPoint`]s borrow it,
//! so none can outlive [`FastPathInterface::destroy`].

use thiserror::Error;
use tracing::debug;
use vesa_dpmi::RealModeServices;

use crate::{vbe, Result};

/// Terminator of both lists in the I/O info table.
const LIST_END: u16 = 0xFFFF;
/// Bank switch, display start, palette data, I/O info.
const HEADER_WORDS: usize = 4;
/// Entry points can't overlap the three mandatory header words.
const MIN_ENTRY_OFFSET: u16 = 6;
/// Nor the I/O info offset, when one is present.
const MIN_ENTRY_OFFSET_WITH_IO_INFO: u16 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PmiError {
    #[error("protected-mode interface is {len} bytes, too short for its header")]
    HeaderTooShort { len: usize },

    #[error("{entry:?} entry offset 0x{offset:04x} is outside the {len}-byte interface block")]
    EntryOutOfBounds {
        entry: PmiEntry,
        offset: u16,
        len: usize,
    },

    #[error("I/O info table at 0x{offset:04x} runs past the end of the interface block")]
    IoInfoTruncated { offset: u16 },

    #[error("cannot allocate {len} bytes for the protected-mode interface")]
    OutOfMemory { len: usize },
}

/// The routines a protected-mode interface exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PmiEntry {
    /// Function 05h equivalent.
    BankSwitch,
    /// Function 07h equivalent.
    DisplayStart,
    /// Function 09h equivalent.
    PaletteData,
}

/// Offsets from the start of the interface block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmiHeader {
    pub bank_switch: u16,
    pub display_start: u16,
    pub palette_data: u16,
    /// Zero when the block carries no I/O info table.
    pub io_info: u16,
}

impl PmiHeader {
    /// Reads and validates the header of `code`.
    pub fn parse(code: &[u8]) -> Result<Self, PmiError> {
        let len = code.len();
        let word = |i: usize| {
            code.get(i * 2..i * 2 + 2)
                .map(|b| u16::from_le_bytes([b[0], b[1]]))
        };
        let (Some(bank_switch), Some(display_start), Some(palette_data)) =
            (word(0), word(1), word(2))
        else {
            return Err(PmiError::HeaderTooShort { len });
        };
        let header = Self {
            bank_switch,
            display_start,
            palette_data,
            io_info: word(HEADER_WORDS - 1).unwrap_or(0),
        };
        let min_offset = if header.io_info != 0 {
            MIN_ENTRY_OFFSET_WITH_IO_INFO
        } else {
            MIN_ENTRY_OFFSET
        };
        for entry in [PmiEntry::BankSwitch, PmiEntry::DisplayStart, PmiEntry::PaletteData] {
            let offset = header.offset(entry);
            if offset < min_offset || usize::from(offset) >= len {
                return Err(PmiError::EntryOutOfBounds { entry, offset, len });
            }
        }
        Ok(header)
    }

    pub fn offset(&self, entry: PmiEntry) -> u16 {
        match entry {
            PmiEntry::BankSwitch => self.bank_switch,
            PmiEntry::DisplayStart => self.display_start,
            PmiEntry::PaletteData => self.palette_data,
        }
    }
}

/// A memory range the interface code touches and the caller must make addressable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    pub physical: u32,
    pub len: u16,
}

fn parse_io_info(code: &[u8], offset: u16) -> Result<(Vec<u16>, Vec<MemoryRegion>), PmiError> {
    let truncated = PmiError::IoInfoTruncated { offset };
    let mut pos = usize::from(offset);
    let word = |at: usize| {
        code.get(at..at + 2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .ok_or_else(|| truncated.clone())
    };

    let mut ports = Vec::new();
    loop {
        let port = word(pos)?;
        pos += 2;
        if port == LIST_END {
            break;
        }
        ports.push(port);
    }

    let mut regions = Vec::new();
    loop {
        if word(pos)? == LIST_END {
            break;
        }
        let raw = code.get(pos..pos + 6).ok_or_else(|| truncated.clone())?;
        regions.push(MemoryRegion {
            physical: u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            len: u16::from_le_bytes([raw[4], raw[5]]),
        });
        pos += 6;
    }
    Ok((ports, regions))
}

/// A resolved routine inside a live [`FastPathInterface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoint<'a> {
    code: &'a [u8],
    offset: u16,
    kind: PmiEntry,
}

impl<'a> EntryPoint<'a> {
    /// The whole interface block the routine lives in.
    pub fn code(&self) -> &'a [u8] {
        self.code
    }

    pub fn offset(&self) -> usize {
        usize::from(self.offset)
    }

    pub fn kind(&self) -> PmiEntry {
        self.kind
    }
}

/// Owned copy of the firmware's protected-mode interface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FastPathInterface {
    code: Option<Vec<u8>>,
    header: Option<PmiHeader>,
    io_ports: Vec<u16>,
    memory_regions: Vec<MemoryRegion>,
}

impl FastPathInterface {
    /// Requests the interface with function 0Ah and takes a private copy of it.
    pub fn load<G: RealModeServices + ?Sized>(gw: &mut G) -> Result<Self> {
        let code = vbe::get_protected_mode_interface(gw)?;
        Ok(Self::from_code(code)?)
    }

    /// Wraps an interface block already copied out of the firmware.
    pub fn from_code(code: Vec<u8>) -> Result<Self, PmiError> {
        let header = PmiHeader::parse(&code)?;
        let (io_ports, memory_regions) = match header.io_info {
            0 => (Vec::new(), Vec::new()),
            offset => parse_io_info(&code, offset)?,
        };
        debug!(
            len = code.len(),
            bank_switch = format_args!("{:#06x}", header.bank_switch),
            display_start = format_args!("{:#06x}", header.display_start),
            palette_data = format_args!("{:#06x}", header.palette_data),
            ports = io_ports.len(),
            "protected-mode interface loaded"
        );
        Ok(Self {
            code: Some(code),
            header: Some(header),
            io_ports,
            memory_regions,
        })
    }

    /// Frees the code block. Later calls are no-ops.
    pub fn destroy(&mut self) {
        if let Some(code) = self.code.take() {
            debug!(len = code.len(), "protected-mode interface released");
        }
        self.header = None;
        self.io_ports.clear();
        self.memory_regions.clear();
    }

    pub fn is_live(&self) -> bool {
        self.code.is_some()
    }

    pub fn header(&self) -> Option<PmiHeader> {
        self.header
    }

    pub fn code(&self) -> Option<&[u8]> {
        self.code.as_deref()
    }

    /// I/O ports the routines access.
    pub fn io_ports(&self) -> &[u16] {
        &self.io_ports
    }

    /// Memory ranges the routines access.
    pub fn memory_regions(&self) -> &[MemoryRegion] {
        &self.memory_regions
    }

    pub fn entry(&self, kind: PmiEntry) -> Option<EntryPoint<'_>> {
        let code = self.code.as_deref()?;
        let header = self.header?;
        Some(EntryPoint {
            code,
            offset: header.offset(kind),
            kind,
        })
    }

    pub fn bank_switch(&self) -> Option<EntryPoint<'_>> {
        self.entry(PmiEntry::BankSwitch)
    }

    pub fn display_start(&self) -> Option<EntryPoint<'_>> {
        self.entry(PmiEntry::DisplayStart)
    }

    pub fn palette_data(&self) -> Option<EntryPoint<'_>> {
        self.entry(PmiEntry::PaletteData)
    }
}
