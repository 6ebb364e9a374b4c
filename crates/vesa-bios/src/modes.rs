//! ModeInfoBlock and VbeInfoBlock layouts.

use vesa_realmode::far_ptr;

use crate::{VbeBiosConfig, VbeMode, DATA_AREA_OFFSET, VIDEO_ROM_SEGMENT};

pub(crate) const MODE_INFO_SIZE: usize = 256;
pub(crate) const CONTROLLER_INFO_SIZE: usize = 512;

/// Physical address of the banked window (VGA window A).
const BANK_WINDOW_SEGMENT: u16 = 0xA000;
const TEXT_WINDOW_SEGMENT: u16 = 0xB800;
const BANK_WINDOW_SIZE: u32 = 64 * 1024;
const BANK_GRANULARITY_KB: u16 = 64;

const ATTR_SUPPORTED: u16 = 1 << 0;
const ATTR_EXTENDED_INFO: u16 = 1 << 1;
const ATTR_TTY: u16 = 1 << 2;
const ATTR_COLOR: u16 = 1 << 3;
const ATTR_GRAPHICS: u16 = 1 << 4;
const ATTR_LFB: u16 = 1 << 7;

/// (size, position) for red, green, blue and reserved.
fn color_masks(bpp: u8) -> [(u8, u8); 4] {
    match bpp {
        15 => [(5, 10), (5, 5), (5, 0), (1, 15)],
        16 => [(5, 11), (6, 5), (5, 0), (0, 0)],
        24 => [(8, 16), (8, 8), (8, 0), (0, 0)],
        32 => [(8, 16), (8, 8), (8, 0), (8, 24)],
        _ => [(0, 0); 4],
    }
}

/// Mode list and string placement inside the ROM data area.
pub(crate) struct DataArea {
    pub mode_list: u16,
    pub oem_string: u16,
    pub vendor_name: u16,
    pub product_name: u16,
    pub product_revision: u16,
    pub end: u16,
}

impl DataArea {
    pub fn layout(config: &VbeBiosConfig) -> Self {
        let mode_list = DATA_AREA_OFFSET;
        let mut cursor = mode_list + (config.modes.len() as u16 + 1) * 2;
        let mut place = |s: &str| {
            let at = cursor;
            cursor += s.len() as u16 + 1;
            at
        };
        let oem_string = place(&config.oem_string);
        let vendor_name = place(&config.vendor_name);
        let product_name = place(&config.product_name);
        let product_revision = place(&config.product_revision);
        Self {
            mode_list,
            oem_string,
            vendor_name,
            product_name,
            product_revision,
            end: cursor,
        }
    }
}

/// Builds the 512-byte VbeInfoBlock. The VBE 2.0 string pointers are only filled in when the
/// caller asked for them by writing `VBE2` into the block.
pub(crate) fn controller_info_block(
    config: &VbeBiosConfig,
    vbe2_requested: bool,
) -> [u8; CONTROLLER_INFO_SIZE] {
    let mut out = [0u8; CONTROLLER_INFO_SIZE];
    let area = DataArea::layout(config);
    let ptr = |off: u16| far_ptr(VIDEO_ROM_SEGMENT, off).to_le_bytes();

    out[0..4].copy_from_slice(&config.signature);
    out[4..6].copy_from_slice(&config.version.to_le_bytes());
    out[6..10].copy_from_slice(&ptr(area.oem_string));
    out[10..14].copy_from_slice(&config.capabilities.to_le_bytes());
    out[14..18].copy_from_slice(&ptr(area.mode_list));
    out[18..20].copy_from_slice(&config.total_memory_blocks.to_le_bytes());

    if vbe2_requested {
        out[20..22].copy_from_slice(&config.oem_software_rev.to_le_bytes());
        out[22..26].copy_from_slice(&ptr(area.vendor_name));
        out[26..30].copy_from_slice(&ptr(area.product_name));
        out[30..34].copy_from_slice(&ptr(area.product_revision));
    }
    out
}

/// Builds the 256-byte ModeInfoBlock for `mode`.
pub(crate) fn mode_info_block(mode: &VbeMode, config: &VbeBiosConfig) -> [u8; MODE_INFO_SIZE] {
    let mut out = [0u8; MODE_INFO_SIZE];
    let total = u32::from(config.total_memory_blocks) << 16;
    let frame = mode.frame_bytes();

    let mut attrs = ATTR_EXTENDED_INFO | ATTR_COLOR;
    if frame <= total {
        attrs |= ATTR_SUPPORTED;
    }
    if mode.graphics {
        attrs |= ATTR_GRAPHICS;
        if mode.lfb {
            attrs |= ATTR_LFB;
        }
    } else {
        attrs |= ATTR_TTY;
    }
    out[0..2].copy_from_slice(&attrs.to_le_bytes());

    // Window A: relocatable, readable, writable. Window B absent.
    out[2] = 0x07;
    out[3] = 0x00;
    out[4..6].copy_from_slice(&BANK_GRANULARITY_KB.to_le_bytes());
    out[6..8].copy_from_slice(&BANK_GRANULARITY_KB.to_le_bytes());
    let segment = if mode.graphics {
        BANK_WINDOW_SEGMENT
    } else {
        TEXT_WINDOW_SEGMENT
    };
    out[8..10].copy_from_slice(&segment.to_le_bytes());
    out[10..12].copy_from_slice(&0u16.to_le_bytes());
    // WinFuncPtr left null; callers use 4F05h or the protected-mode interface.

    let stride = mode.bytes_per_scan_line();
    out[16..18].copy_from_slice(&stride.to_le_bytes());
    out[18..20].copy_from_slice(&mode.width.to_le_bytes());
    out[20..22].copy_from_slice(&mode.height.to_le_bytes());
    out[22] = 8; // XCharSize
    out[23] = if mode.graphics { 16 } else { 8 }; // YCharSize
    out[24] = if mode.graphics { 1 } else { 4 }; // planes
    out[25] = mode.bpp;
    out[26] = frame.div_ceil(BANK_WINDOW_SIZE).min(255) as u8;
    out[27] = mode.memory_model();
    out[28] = BANK_GRANULARITY_KB as u8;
    let image_pages = if frame == 0 {
        0
    } else {
        (total / frame).saturating_sub(1).min(255) as u8
    };
    out[29] = image_pages;
    out[30] = 1; // reserved, must be 1

    let masks = color_masks(mode.bpp);
    for (i, (size, pos)) in masks.iter().enumerate() {
        out[31 + i * 2] = *size;
        out[32 + i * 2] = *pos;
    }
    out[39] = if masks[3].0 != 0 { 0x02 } else { 0x00 }; // reserved field usable

    if mode.graphics && mode.lfb {
        out[40..44].copy_from_slice(&config.lfb_base.to_le_bytes());
    }

    // VBE 3.0 linear-mode fields.
    out[50..52].copy_from_slice(&stride.to_le_bytes());
    out[52] = image_pages;
    out[53] = image_pages;
    for (i, (size, pos)) in masks.iter().enumerate() {
        out[54 + i * 2] = *size;
        out[55 + i * 2] = *pos;
    }
    out[62..66].copy_from_slice(&config.max_pixel_clock.to_le_bytes());
    out
}
