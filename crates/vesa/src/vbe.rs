//! Typed wrappers for the VBE functions (INT 10h, AH=4Fh).
//!
//! Every wrapper builds a [`RealModeRegs`] image, routes argument blocks through the host's DOS
//! transfer buffer and runs the request with [`call`], which decodes the uniform status word.

use core::fmt;

use thiserror::Error;
use tracing::{debug, trace, warn};
use vesa_dpmi::{RealModeServices, TransferBuffer};
use vesa_realmode::{far_ptr_to_linear, real_addr, RealModeRegs};

use crate::{
    catalog::ModeCatalog,
    info::{
        ControllerInfo, CrtcInfo, ModeFlags, ModeInfo, StateFlags, CONTROLLER_INFO_LEN,
        CRTC_INFO_LEN, MODE_INFO_LEN, MODE_NUMBER_MASK,
    },
    mapping::total_memory_bytes,
    Error, PmiError, Result,
};

pub const VIDEO_INTERRUPT: u8 = 0x10;
const VBE_FUNCTION_AH: u8 = 0x4F;
const VBE_SUPPORTED_AL: u8 = 0x4F;

/// Longest OEM string read through a far pointer.
const MAX_STRING_LEN: usize = 256;
/// Video state buffers are sized in 64-byte blocks.
const STATE_BLOCK_SIZE: usize = 64;
const PALETTE_ENTRY_SIZE: usize = 4;

const SUB_SET: u8 = 0x00;
const SUB_GET: u8 = 0x01;
const SUB_SCHEDULE: u8 = 0x02;
const SUB_SCHEDULE_STEREO: u8 = 0x03;
const SUB_QUERY_SCHEDULE: u8 = 0x04;
const SUB_ENABLE_STEREO: u8 = 0x05;
const SUB_DISABLE_STEREO: u8 = 0x06;
const SUB_SET_SYNC: u8 = 0x80;
const SUB_SET_SYNC_ALTERNATE: u8 = 0x82;
const SUB_SET_STEREO_SYNC: u8 = 0x83;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VbeFunction {
    GetInfo = 0x00,
    GetModeInfo = 0x01,
    SetMode = 0x02,
    GetMode = 0x03,
    VideoState = 0x04,
    BankSwitch = 0x05,
    ScanLineLength = 0x06,
    DisplayStart = 0x07,
    DacWidth = 0x08,
    DacData = 0x09,
    ProtectedModeInterface = 0x0A,
    PixelClock = 0x0B,
}

impl VbeFunction {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::GetInfo => "VBE_GET_INFO",
            Self::GetModeInfo => "VBE_GET_MODE_INFO",
            Self::SetMode => "VBE_SET_MODE",
            Self::GetMode => "VBE_GET_MODE",
            Self::VideoState => "VBE_VIDEO_STATE",
            Self::BankSwitch => "VBE_BANK_SWITCH",
            Self::ScanLineLength => "VBE_SCAN_LINE_LENGTH",
            Self::DisplayStart => "VBE_DISPLAY_START",
            Self::DacWidth => "VBE_DAC_BITS",
            Self::DacData => "VBE_DAC_DATA",
            Self::ProtectedModeInterface => "VBE_PROTECTED_MODE_INTERFACE",
            Self::PixelClock => "VBE_PIXEL_CLOCK",
        }
    }
}

impl fmt::Display for VbeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Failure classes encoded in AX after a VBE call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VbeStatus {
    /// AL != 4Fh.
    NotSupported,
    /// AH = 01h.
    Failed,
    /// AH = 02h.
    InvalidForHardware,
    /// AH = 03h.
    InvalidForMode,
    /// Any other AH.
    Unknown(u8),
}

impl VbeStatus {
    /// Decodes the AX returned by a VBE function. `None` means success.
    pub fn classify(ax: u16) -> Option<Self> {
        let al = ax as u8;
        let ah = (ax >> 8) as u8;
        if al != VBE_SUPPORTED_AL {
            return Some(Self::NotSupported);
        }
        match ah {
            0x00 => None,
            0x01 => Some(Self::Failed),
            0x02 => Some(Self::InvalidForHardware),
            0x03 => Some(Self::InvalidForMode),
            other => Some(Self::Unknown(other)),
        }
    }
}

impl fmt::Display for VbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSupported => f.write_str("is not supported"),
            Self::Failed => f.write_str("failed to complete"),
            Self::InvalidForHardware => f.write_str("is invalid with the current configuration"),
            Self::InvalidForMode => f.write_str("is invalid in the current video mode"),
            Self::Unknown(ah) => write!(f, "returned unknown status 0x{ah:02x}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("VESA function \"{function}\" {status}")]
pub struct VbeError {
    pub function: VbeFunction,
    pub status: VbeStatus,
}

/// Issues VBE `function` with the given register image and decodes the status.
///
/// AH/AL are filled in here; everything else in `regs` is passed through. On return `regs` holds
/// the firmware's output registers whether or not the call succeeded.
pub fn call<G: RealModeServices + ?Sized>(
    gw: &mut G,
    function: VbeFunction,
    regs: &mut RealModeRegs,
) -> Result<()> {
    regs.set_ah(VBE_FUNCTION_AH);
    regs.set_al(function.code());
    gw.simulate_interrupt(VIDEO_INTERRUPT, regs)?;
    match VbeStatus::classify(regs.ax()) {
        None => {
            trace!(function = function.name(), "VBE call completed");
            Ok(())
        }
        Some(status) => {
            debug!(
                function = function.name(),
                ax = format_args!("{:#06x}", regs.ax()),
                %status,
                "VBE call failed"
            );
            Err(VbeError { function, status }.into())
        }
    }
}

fn transfer_buffer<G: RealModeServices + ?Sized>(gw: &G, required: usize) -> Result<TransferBuffer> {
    let tb = gw.transfer_buffer();
    let available = tb.len as usize;
    if available < required {
        return Err(Error::TransferBufferTooSmall {
            required,
            available,
        });
    }
    Ok(tb)
}

fn point_es_di(regs: &mut RealModeRegs, tb: TransferBuffer) {
    regs.es = tb.segment();
    regs.set_di(tb.offset());
}

fn read_far_string<G: RealModeServices + ?Sized>(gw: &G, ptr: u32) -> Option<String> {
    if ptr == 0 {
        return None;
    }
    let mut buf = [0u8; MAX_STRING_LEN];
    gw.dos_mem_get(far_ptr_to_linear(ptr), &mut buf);
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Some(String::from_utf8_lossy(&buf[..len]).into_owned())
}

/// Function 00h result with its far pointers resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Controller {
    pub info: ControllerInfo,
    pub oem_string: Option<String>,
    pub vendor_name: Option<String>,
    pub product_name: Option<String>,
    pub product_revision: Option<String>,
    pub modes: ModeCatalog,
}

impl Controller {
    pub fn total_memory_bytes(&self) -> u32 {
        total_memory_bytes(self.info.total_memory)
    }
}

/// Function 00h: controller information.
///
/// Requests the VBE 2.0 layout by writing `VBE2` into the block first and rejects the block
/// outright if the firmware did not answer with `VESA`.
pub fn get_controller_info<G: RealModeServices + ?Sized>(gw: &mut G) -> Result<Controller> {
    let tb = transfer_buffer(gw, CONTROLLER_INFO_LEN)?;
    let mut raw = [0u8; CONTROLLER_INFO_LEN];
    raw[..4].copy_from_slice(&ControllerInfo::VBE2_SIGNATURE);
    gw.dos_mem_put(tb.addr, &raw);

    let mut regs = RealModeRegs::default();
    point_es_di(&mut regs, tb);
    call(gw, VbeFunction::GetInfo, &mut regs)?;

    gw.dos_mem_get(tb.addr, &mut raw);
    let info = ControllerInfo::from_bytes(&raw);
    if !info.has_valid_signature() {
        warn!(signature = ?info.signature, "controller info rejected");
        return Err(Error::BadSignature(info.signature));
    }

    let modes = ModeCatalog::read(gw, info.video_mode_ptr);
    debug!(
        version = format_args!("{:#06x}", info.version),
        total_memory = info.total_memory,
        modes = modes.len(),
        "VBE controller found"
    );
    Ok(Controller {
        info,
        oem_string: read_far_string(gw, info.oem_string_ptr),
        vendor_name: read_far_string(gw, info.oem_vendor_name_ptr),
        product_name: read_far_string(gw, info.oem_product_name_ptr),
        product_revision: read_far_string(gw, info.oem_product_rev_ptr),
        modes,
    })
}

/// Function 01h: mode information. The transfer buffer is zeroed first so fields a VBE 1.x BIOS
/// does not write read back as zero.
pub fn get_mode_info<G: RealModeServices + ?Sized>(gw: &mut G, mode: u16) -> Result<ModeInfo> {
    let tb = transfer_buffer(gw, MODE_INFO_LEN)?;
    gw.dos_mem_fill(tb.addr, MODE_INFO_LEN, 0);

    let mut regs = RealModeRegs::default();
    regs.set_cx(mode);
    point_es_di(&mut regs, tb);
    call(gw, VbeFunction::GetModeInfo, &mut regs)?;

    let mut raw = [0u8; MODE_INFO_LEN];
    gw.dos_mem_get(tb.addr, &mut raw);
    Ok(ModeInfo::from_bytes(&raw))
}

/// Function 02h. [`ModeFlags::CRTC`] is set exactly when `crtc` is given.
pub fn set_mode<G: RealModeServices + ?Sized>(
    gw: &mut G,
    mode: u16,
    flags: ModeFlags,
    crtc: Option<&CrtcInfo>,
) -> Result<()> {
    let mut regs = RealModeRegs::default();
    let mut flags = flags - ModeFlags::CRTC;
    if let Some(crtc) = crtc {
        let tb = transfer_buffer(gw, CRTC_INFO_LEN)?;
        gw.dos_mem_put(tb.addr, &crtc.to_bytes());
        point_es_di(&mut regs, tb);
        flags |= ModeFlags::CRTC;
    }
    regs.set_bx((mode & MODE_NUMBER_MASK) | flags.bits());
    call(gw, VbeFunction::SetMode, &mut regs)
}

/// Function 03h: current mode number and the flags it was set with.
pub fn get_current_mode<G: RealModeServices + ?Sized>(gw: &mut G) -> Result<(u16, ModeFlags)> {
    let mut regs = RealModeRegs::default();
    call(gw, VbeFunction::GetMode, &mut regs)?;
    let bx = regs.bx();
    Ok((bx & MODE_NUMBER_MASK, ModeFlags::from_bits_truncate(bx)))
}

/// Function 04h DL=00h: bytes needed to save the selected state components.
pub fn query_state_buffer_size<G: RealModeServices + ?Sized>(
    gw: &mut G,
    flags: StateFlags,
) -> Result<usize> {
    let mut regs = RealModeRegs::default();
    regs.set_dl(0x00);
    regs.set_cx(flags.bits());
    call(gw, VbeFunction::VideoState, &mut regs)?;
    Ok(usize::from(regs.bx()) * STATE_BLOCK_SIZE)
}

/// Function 04h DL=01h: saves state into `buffer`, which should be at least
/// [`query_state_buffer_size`] bytes.
pub fn save_state<G: RealModeServices + ?Sized>(
    gw: &mut G,
    flags: StateFlags,
    buffer: &mut [u8],
) -> Result<()> {
    let tb = transfer_buffer(gw, buffer.len())?;
    gw.dos_mem_fill(tb.addr, buffer.len(), 0);

    let mut regs = RealModeRegs::default();
    regs.set_dl(0x01);
    regs.set_cx(flags.bits());
    regs.es = tb.segment();
    regs.set_bx(tb.offset());
    call(gw, VbeFunction::VideoState, &mut regs)?;
    gw.dos_mem_get(tb.addr, buffer);
    Ok(())
}

/// Function 04h DL=02h: restores state saved by [`save_state`].
pub fn restore_state<G: RealModeServices + ?Sized>(
    gw: &mut G,
    flags: StateFlags,
    buffer: &[u8],
) -> Result<()> {
    let tb = transfer_buffer(gw, buffer.len())?;
    gw.dos_mem_put(tb.addr, buffer);

    let mut regs = RealModeRegs::default();
    regs.set_dl(0x02);
    regs.set_cx(flags.bits());
    regs.es = tb.segment();
    regs.set_bx(tb.offset());
    call(gw, VbeFunction::VideoState, &mut regs)
}

/// Memory window selector for the banked functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Window {
    A = 0,
    B = 1,
}

/// Function 05h BH=00h: moves `window` to `number` (in window granularity units).
///
/// This goes through the real-mode BIOS; [`crate::set_bank_position`] is the fast path.
pub fn set_bank_position<G: RealModeServices + ?Sized>(
    gw: &mut G,
    window: Window,
    number: u16,
) -> Result<()> {
    let mut regs = RealModeRegs::default();
    regs.set_bh(SUB_SET);
    regs.set_bl(window as u8);
    regs.set_dx(number);
    call(gw, VbeFunction::BankSwitch, &mut regs)
}

/// Function 05h BH=01h.
pub fn get_bank_position<G: RealModeServices + ?Sized>(gw: &mut G, window: Window) -> Result<u16> {
    let mut regs = RealModeRegs::default();
    regs.set_bh(SUB_GET);
    regs.set_bl(window as u8);
    call(gw, VbeFunction::BankSwitch, &mut regs)?;
    Ok(regs.dx())
}

/// Logical scan line geometry reported by function 06h.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanLineInfo {
    pub bytes_per_line: u16,
    pub pixels_per_line: u16,
    pub max_lines: u16,
}

fn scan_line_length<G: RealModeServices + ?Sized>(
    gw: &mut G,
    subfunction: u8,
    cx: u16,
) -> Result<ScanLineInfo> {
    let mut regs = RealModeRegs::default();
    regs.set_bl(subfunction);
    regs.set_cx(cx);
    call(gw, VbeFunction::ScanLineLength, &mut regs)?;
    Ok(ScanLineInfo {
        bytes_per_line: regs.bx(),
        pixels_per_line: regs.cx(),
        max_lines: regs.dx(),
    })
}

/// Function 06h BL=00h: sets the logical line length in pixels.
pub fn set_scan_line_length<G: RealModeServices + ?Sized>(
    gw: &mut G,
    pixels: u16,
) -> Result<ScanLineInfo> {
    scan_line_length(gw, 0x00, pixels)
}

/// Function 06h BL=02h: sets the logical line length in bytes.
pub fn set_scan_line_length_bytes<G: RealModeServices + ?Sized>(
    gw: &mut G,
    bytes: u16,
) -> Result<ScanLineInfo> {
    scan_line_length(gw, 0x02, bytes)
}

/// Function 06h BL=01h.
pub fn get_scan_line_length<G: RealModeServices + ?Sized>(gw: &mut G) -> Result<ScanLineInfo> {
    scan_line_length(gw, 0x01, 0)
}

/// Function 06h BL=03h.
pub fn get_max_scan_line_length<G: RealModeServices + ?Sized>(gw: &mut G) -> Result<ScanLineInfo> {
    scan_line_length(gw, 0x03, 0)
}

fn display_start<G: RealModeServices + ?Sized>(
    gw: &mut G,
    subfunction: u8,
    ecx: u32,
    edx: u32,
) -> Result<RealModeRegs> {
    let mut regs = RealModeRegs {
        ecx,
        edx,
        ..RealModeRegs::default()
    };
    regs.set_bx(u16::from(subfunction));
    call(gw, VbeFunction::DisplayStart, &mut regs)?;
    Ok(regs)
}

/// Function 07h BL=00h: first displayed pixel `(x, y)` of the logical screen.
pub fn set_display_start<G: RealModeServices + ?Sized>(gw: &mut G, x: u16, y: u16) -> Result<()> {
    display_start(gw, SUB_SET, u32::from(x), u32::from(y)).map(drop)
}

/// Function 07h BL=80h: as [`set_display_start`], applied during vertical retrace.
pub fn set_display_start_on_sync<G: RealModeServices + ?Sized>(
    gw: &mut G,
    x: u16,
    y: u16,
) -> Result<()> {
    display_start(gw, SUB_SET_SYNC, u32::from(x), u32::from(y)).map(drop)
}

/// Function 07h BL=01h.
pub fn get_display_start<G: RealModeServices + ?Sized>(gw: &mut G) -> Result<(u16, u16)> {
    let regs = display_start(gw, SUB_GET, 0, 0)?;
    Ok((regs.cx(), regs.dx()))
}

/// Function 07h BL=02h: schedules a flip to byte `address` at the next retrace.
pub fn schedule_display_start<G: RealModeServices + ?Sized>(gw: &mut G, address: u32) -> Result<()> {
    display_start(gw, SUB_SCHEDULE, address, 0).map(drop)
}

/// Function 07h BL=03h.
pub fn schedule_stereo_display_start<G: RealModeServices + ?Sized>(
    gw: &mut G,
    left: u32,
    right: u32,
) -> Result<()> {
    display_start(gw, SUB_SCHEDULE_STEREO, left, right).map(drop)
}

/// Function 07h BL=04h: whether the last scheduled flip has happened.
pub fn scheduled_flip_complete<G: RealModeServices + ?Sized>(gw: &mut G) -> Result<bool> {
    let regs = display_start(gw, SUB_QUERY_SCHEDULE, 0, 0)?;
    Ok(regs.cx() != 0)
}

/// Function 07h BL=05h.
pub fn enable_stereo<G: RealModeServices + ?Sized>(gw: &mut G) -> Result<()> {
    display_start(gw, SUB_ENABLE_STEREO, 0, 0).map(drop)
}

/// Function 07h BL=06h.
pub fn disable_stereo<G: RealModeServices + ?Sized>(gw: &mut G) -> Result<()> {
    display_start(gw, SUB_DISABLE_STEREO, 0, 0).map(drop)
}

/// Function 07h BL=82h: byte-addressed display start applied during vertical retrace.
pub fn set_display_start_address_on_sync<G: RealModeServices + ?Sized>(
    gw: &mut G,
    address: u32,
) -> Result<()> {
    display_start(gw, SUB_SET_SYNC_ALTERNATE, address, 0).map(drop)
}

/// Function 07h BL=83h.
pub fn set_stereo_display_start_on_sync<G: RealModeServices + ?Sized>(
    gw: &mut G,
    left: u32,
    right: u32,
) -> Result<()> {
    display_start(gw, SUB_SET_STEREO_SYNC, left, right).map(drop)
}

/// Function 08h BL=00h: requests `bits` per primary and returns the width actually set.
pub fn set_dac_width<G: RealModeServices + ?Sized>(gw: &mut G, bits: u8) -> Result<u8> {
    let mut regs = RealModeRegs::default();
    regs.set_bl(SUB_SET);
    regs.set_bh(bits);
    call(gw, VbeFunction::DacWidth, &mut regs)?;
    Ok(regs.bh())
}

/// Function 08h BL=01h.
pub fn get_dac_width<G: RealModeServices + ?Sized>(gw: &mut G) -> Result<u8> {
    let mut regs = RealModeRegs::default();
    regs.set_bl(SUB_GET);
    call(gw, VbeFunction::DacWidth, &mut regs)?;
    Ok(regs.bh())
}

/// One palette register as exchanged by function 09h.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaletteEntry {
    pub blue: u8,
    pub green: u8,
    pub red: u8,
    pub alignment: u8,
}

impl PaletteEntry {
    pub const fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self {
            blue,
            green,
            red,
            alignment: 0,
        }
    }

    fn to_bytes(self) -> [u8; PALETTE_ENTRY_SIZE] {
        [self.blue, self.green, self.red, self.alignment]
    }

    fn from_bytes(b: &[u8]) -> Self {
        Self {
            blue: b[0],
            green: b[1],
            red: b[2],
            alignment: b[3],
        }
    }
}

/// Function 09h BL=00h (or 80h with `on_sync`): loads `entries` starting at register `start`.
pub fn set_palette<G: RealModeServices + ?Sized>(
    gw: &mut G,
    start: u8,
    entries: &[PaletteEntry],
    on_sync: bool,
) -> Result<()> {
    let len = entries.len() * PALETTE_ENTRY_SIZE;
    let tb = transfer_buffer(gw, len)?;
    let raw: Vec<u8> = entries.iter().flat_map(|e| e.to_bytes()).collect();
    gw.dos_mem_put(tb.addr, &raw);

    let mut regs = RealModeRegs::default();
    regs.set_bl(if on_sync { SUB_SET_SYNC } else { SUB_SET });
    regs.set_cx(entries.len() as u16);
    regs.set_dx(u16::from(start));
    point_es_di(&mut regs, tb);
    call(gw, VbeFunction::DacData, &mut regs)
}

/// Function 09h BL=01h: reads `entries.len()` registers starting at `start`.
pub fn get_palette<G: RealModeServices + ?Sized>(
    gw: &mut G,
    start: u8,
    entries: &mut [PaletteEntry],
) -> Result<()> {
    let len = entries.len() * PALETTE_ENTRY_SIZE;
    let tb = transfer_buffer(gw, len)?;
    gw.dos_mem_fill(tb.addr, len, 0);

    let mut regs = RealModeRegs::default();
    regs.set_bl(SUB_GET);
    regs.set_cx(entries.len() as u16);
    regs.set_dx(u16::from(start));
    point_es_di(&mut regs, tb);
    call(gw, VbeFunction::DacData, &mut regs)?;

    let mut raw = vec![0u8; len];
    gw.dos_mem_get(tb.addr, &mut raw);
    for (entry, bytes) in entries.iter_mut().zip(raw.chunks_exact(PALETTE_ENTRY_SIZE)) {
        *entry = PaletteEntry::from_bytes(bytes);
    }
    Ok(())
}

/// Function 0Ah: copies the protected-mode interface table out of the video BIOS.
pub fn get_protected_mode_interface<G: RealModeServices + ?Sized>(gw: &mut G) -> Result<Vec<u8>> {
    let mut regs = RealModeRegs::default();
    regs.set_bl(0x00);
    call(gw, VbeFunction::ProtectedModeInterface, &mut regs)?;

    let len = usize::from(regs.cx());
    let addr = real_addr(regs.es, regs.di());
    let mut code = Vec::new();
    code.try_reserve_exact(len)
        .map_err(|_| PmiError::OutOfMemory { len })?;
    code.resize(len, 0);
    gw.dos_mem_get(addr, &mut code);
    debug!(
        addr = format_args!("{addr:#07x}"),
        len, "copied protected-mode interface"
    );
    Ok(code)
}

/// Function 0Bh BL=00h: the pixel clock closest to `hz` the hardware can produce for `mode`.
pub fn set_pixel_clock<G: RealModeServices + ?Sized>(gw: &mut G, mode: u16, hz: u32) -> Result<u32> {
    let mut regs = RealModeRegs {
        ecx: hz,
        ..RealModeRegs::default()
    };
    regs.set_bl(SUB_SET);
    regs.set_dx(mode);
    call(gw, VbeFunction::PixelClock, &mut regs)?;
    Ok(regs.ecx)
}

/// Function 0Bh BL=01h: pixel clock of the current mode.
pub fn get_pixel_clock<G: RealModeServices + ?Sized>(gw: &mut G) -> Result<u32> {
    let mut regs = RealModeRegs::default();
    regs.set_bl(SUB_GET);
    call(gw, VbeFunction::PixelClock, &mut regs)?;
    Ok(regs.ecx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use vesa_dpmi::DpmiError;

    /// Answers every interrupt with a fixed AX and records the request registers.
    struct Scripted {
        ax: u16,
        seen: Vec<RealModeRegs>,
    }

    impl RealModeServices for Scripted {
        fn simulate_interrupt(
            &mut self,
            _vector: u8,
            regs: &mut RealModeRegs,
        ) -> vesa_dpmi::Result<()> {
            self.seen.push(*regs);
            regs.set_ax(self.ax);
            Ok(())
        }

        fn dos_mem_get(&self, _addr: u32, buf: &mut [u8]) {
            buf.fill(0);
        }

        fn dos_mem_put(&mut self, _addr: u32, _buf: &[u8]) {}

        fn transfer_buffer(&self) -> TransferBuffer {
            TransferBuffer {
                addr: 0x0002_0000,
                len: 0x200,
            }
        }
    }

    fn scripted(ax: u16) -> Scripted {
        Scripted {
            ax,
            seen: Vec::new(),
        }
    }

    #[test]
    fn status_classification() {
        assert_eq!(VbeStatus::classify(0x004F), None);
        assert_eq!(VbeStatus::classify(0x014F), Some(VbeStatus::Failed));
        assert_eq!(VbeStatus::classify(0x024F), Some(VbeStatus::InvalidForHardware));
        assert_eq!(VbeStatus::classify(0x034F), Some(VbeStatus::InvalidForMode));
        assert_eq!(VbeStatus::classify(0x0401), Some(VbeStatus::NotSupported));
        assert_eq!(VbeStatus::classify(0x0000), Some(VbeStatus::NotSupported));
        assert_eq!(VbeStatus::classify(0x7F4F), Some(VbeStatus::Unknown(0x7F)));
    }

    #[test]
    fn error_messages_name_the_function() {
        let cases = [
            (0x4F01u16, "VESA function \"VBE_GET_MODE_INFO\" is not supported"),
            (0x014F, "VESA function \"VBE_GET_MODE_INFO\" failed to complete"),
            (
                0x024F,
                "VESA function \"VBE_GET_MODE_INFO\" is invalid with the current configuration",
            ),
            (
                0x034F,
                "VESA function \"VBE_GET_MODE_INFO\" is invalid in the current video mode",
            ),
        ];
        for (ax, message) in cases {
            let mut gw = scripted(ax);
            let err = get_mode_info(&mut gw, 0x101).unwrap_err();
            assert_eq!(err.to_string(), message);
        }
    }

    #[test]
    fn call_sets_function_in_ax() {
        let mut gw = scripted(0x004F);
        let mut regs = RealModeRegs::default();
        regs.set_cx(0x1234);
        call(&mut gw, VbeFunction::PixelClock, &mut regs).unwrap();
        assert_eq!(gw.seen[0].ax(), 0x4F0B);
        assert_eq!(gw.seen[0].cx(), 0x1234);
    }

    #[test]
    fn bank_switch_register_layout() {
        let mut gw = scripted(0x004F);
        set_bank_position(&mut gw, Window::B, 9).unwrap();
        let regs = gw.seen[0];
        assert_eq!((regs.bh(), regs.bl(), regs.dx()), (0x00, 0x01, 9));
    }

    #[test]
    fn set_mode_adds_crtc_flag_only_with_block() {
        let mut gw = scripted(0x004F);
        set_mode(&mut gw, 0x4118, ModeFlags::CRTC | ModeFlags::LINEAR_FRAME_BUFFER, None)
            .unwrap();
        assert_eq!(gw.seen[0].bx(), 0x4118);

        set_mode(&mut gw, 0x118, ModeFlags::empty(), Some(&CrtcInfo::default())).unwrap();
        assert_eq!(gw.seen[1].bx(), 0x0918);
        assert_eq!(gw.seen[1].es, 0x2000);
    }

    #[test]
    fn oversized_requests_are_rejected_before_the_call() {
        let mut gw = scripted(0x004F);
        let entries = [PaletteEntry::default(); 256];
        let err = set_palette(&mut gw, 0, &entries, false).unwrap_err();
        assert!(matches!(
            err,
            Error::TransferBufferTooSmall {
                required: 1024,
                available: 0x200
            }
        ));
        assert!(gw.seen.is_empty());
    }

    #[test]
    fn host_failures_propagate() {
        struct Broken;
        impl RealModeServices for Broken {
            fn simulate_interrupt(&mut self, _: u8, _: &mut RealModeRegs) -> vesa_dpmi::Result<()> {
                Err(DpmiError::NearPointersDisabled)
            }
            fn dos_mem_get(&self, _: u32, _: &mut [u8]) {}
            fn dos_mem_put(&mut self, _: u32, _: &[u8]) {}
            fn transfer_buffer(&self) -> TransferBuffer {
                TransferBuffer { addr: 0, len: 0 }
            }
        }
        assert!(matches!(get_dac_width(&mut Broken), Err(Error::Dpmi(_))));
    }

    proptest! {
        #[test]
        fn any_al_other_than_4f_is_not_supported(ah in any::<u8>(), al in any::<u8>()) {
            prop_assume!(al != 0x4F);
            let ax = u16::from_le_bytes([al, ah]);
            prop_assert_eq!(VbeStatus::classify(ax), Some(VbeStatus::NotSupported));
        }
    }
}
