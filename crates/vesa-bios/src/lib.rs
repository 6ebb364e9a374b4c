#![forbid(unsafe_code)]

//! Reference VESA BIOS Extensions (VBE 3.0) firmware.
//!
//! [`VbeBios`] answers INT 10h AX=4F00h..4F0Bh the way an SVGA adapter BIOS does and plugs into
//! [`vesa_dpmi::HostDpmi`] as its [`RealModeBios`]. During POST it lays out a 32 KiB option ROM
//! at `C000:0000` containing:
//!
//! | offset | contents |
//! |--------|----------|
//! | 0x0000 | `55 AA` option ROM header |
//! | 0x0100 | `PMID` protected-mode info block (when enabled) |
//! | 0x1000 | protected-mode interface table returned by 4F0Ah |
//! | 0x6000 | mode list followed by the OEM/vendor/product/revision strings |
//!
//! Calls made into a copy of the protected-mode table through
//! [`vesa_dpmi::FastPathExecutor`] are routed to [`VbeBios::protected_mode_call`] by header
//! offset, so bank switching through the fast path is observable without executing x86 code.

mod config;
mod int10_vbe;
mod modes;
mod pmi;
mod rom;

use vesa_dpmi::{FastPathRegs, RealModeBios};
use vesa_realmode::{MemoryBus, RealModeRegs};

pub use config::{default_modes, VbeBiosConfig, VbeMode};
pub use pmi::{default_pmi_table, PmiLayout};

/// Physical address of the video option ROM.
pub const VIDEO_ROM_BASE: u32 = 0x000C_0000;
/// Size of the video option ROM image.
pub const VIDEO_ROM_SIZE: usize = 0x8000;
pub const VIDEO_ROM_SEGMENT: u16 = 0xC000;
/// Offset of the `PMID` block within the ROM.
pub const PMID_OFFSET: usize = 0x0100;
/// Offset of the protected-mode interface table within the ROM.
pub const PMI_TABLE_OFFSET: u16 = 0x1000;
/// Offset of the mode list and strings within the ROM.
pub const DATA_AREA_OFFSET: u16 = 0x6000;

const VGA_TEXT_MODE: u16 = 0x0003;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScheduledStart {
    left: u32,
    right: Option<u32>,
}

#[derive(Debug, Clone)]
struct VbeState {
    current_mode: Option<u16>,
    lfb_enabled: bool,
    banks: [u16; 2],
    bytes_per_scan_line: u16,
    logical_width_pixels: u16,
    display_start_x: u16,
    display_start_y: u16,
    /// Byte address set through 4F07h BL=02h or the fast path.
    display_start_address: u32,
    right_eye_address: u32,
    scheduled: Option<ScheduledStart>,
    stereo: bool,
    dac_width_bits: u8,
    /// 256 entries of (blue, green, red, alignment), as exchanged by 4F09h.
    palette: Vec<u8>,
    pixel_clock: u32,
}

impl Default for VbeState {
    fn default() -> Self {
        Self {
            current_mode: None,
            lfb_enabled: false,
            banks: [0; 2],
            bytes_per_scan_line: 0,
            logical_width_pixels: 0,
            display_start_x: 0,
            display_start_y: 0,
            display_start_address: 0,
            right_eye_address: 0,
            scheduled: None,
            stereo: false,
            dac_width_bits: 6,
            palette: vec![0; 256 * 4],
            pixel_clock: 0,
        }
    }
}

/// A call serviced through the protected-mode interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastPathCall {
    BankSwitch { window: u8, bank: u16 },
    DisplayStart { address: u32 },
    PaletteData { start: u16, count: u16 },
}

#[derive(Debug, Clone)]
pub struct VbeBios {
    config: VbeBiosConfig,
    state: VbeState,
    mode_info_queries: Vec<u16>,
    fast_path_calls: Vec<FastPathCall>,
}

impl VbeBios {
    pub fn new(config: VbeBiosConfig) -> Self {
        Self {
            config,
            state: VbeState::default(),
            mode_info_queries: Vec::new(),
            fast_path_calls: Vec::new(),
        }
    }

    pub fn config(&self) -> &VbeBiosConfig {
        &self.config
    }

    /// Mode numbers passed to 4F01h, in call order.
    pub fn mode_info_queries(&self) -> &[u16] {
        &self.mode_info_queries
    }

    pub fn fast_path_calls(&self) -> &[FastPathCall] {
        &self.fast_path_calls
    }

    /// Current mode number without the linear/no-clear flag bits.
    pub fn current_mode(&self) -> Option<u16> {
        self.state.current_mode
    }

    pub fn lfb_enabled(&self) -> bool {
        self.state.lfb_enabled
    }

    /// Position of window A (0) or B (1) in granularity units.
    pub fn bank_position(&self, window: u8) -> Option<u16> {
        self.state.banks.get(usize::from(window)).copied()
    }

    pub fn display_start(&self) -> (u16, u16) {
        (self.state.display_start_x, self.state.display_start_y)
    }

    pub fn display_start_address(&self) -> u32 {
        self.state.display_start_address
    }

    /// Right-eye start address of the last completed stereo flip.
    pub fn right_eye_address(&self) -> u32 {
        self.state.right_eye_address
    }

    pub fn stereo_enabled(&self) -> bool {
        self.state.stereo
    }

    pub fn dac_width(&self) -> u8 {
        self.state.dac_width_bits
    }

    /// Palette entry `index` as (blue, green, red, alignment).
    pub fn palette_entry(&self, index: u8) -> [u8; 4] {
        let i = usize::from(index) * 4;
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.state.palette[i..i + 4]);
        out
    }

    pub fn pixel_clock(&self) -> u32 {
        self.state.pixel_clock
    }

    fn find_mode(&self, id: u16) -> Option<&VbeMode> {
        self.config.modes.iter().find(|m| m.id == id)
    }

    fn total_memory_bytes(&self) -> u32 {
        u32::from(self.config.total_memory_blocks) << 16
    }
}

impl Default for VbeBios {
    fn default() -> Self {
        Self::new(VbeBiosConfig::default())
    }
}

impl RealModeBios for VbeBios {
    fn post(&mut self, memory: &mut dyn MemoryBus) {
        let image = rom::build_video_rom(&self.config);
        memory.write_bytes(VIDEO_ROM_BASE, &image);
        self.state = VbeState {
            current_mode: Some(VGA_TEXT_MODE),
            ..VbeState::default()
        };
    }

    fn handle_interrupt(
        &mut self,
        vector: u8,
        regs: &mut RealModeRegs,
        memory: &mut dyn MemoryBus,
    ) -> bool {
        if vector != 0x10 || regs.ah() != 0x4F {
            return false;
        }
        self.handle_int10_vbe(regs, memory);
        true
    }

    fn protected_mode_call(&mut self, code: &[u8], entry: usize, regs: &mut FastPathRegs) -> bool {
        self.handle_pm_call(code, entry, regs)
    }
}
