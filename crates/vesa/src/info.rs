//! Fixed-layout VBE information blocks.
//!
//! All blocks are little-endian and packed. Decoding keeps reserved and unknown attribute bits so
//! that `from_bytes(to_bytes(x)) == x` for every field this module models.

use bitflags::bitflags;

pub const CONTROLLER_INFO_LEN: usize = 512;
pub const MODE_INFO_LEN: usize = 256;
pub const CRTC_INFO_LEN: usize = 59;

bitflags! {
    /// `ModeInfoBlock.ModeAttributes`.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct ModeAttributes: u16 {
        const SUPPORTED = 1 << 0;
        const EXTENDED_INFO = 1 << 1;
        const TTY_OUTPUT = 1 << 2;
        const COLOR = 1 << 3;
        const GRAPHICS = 1 << 4;
        const NOT_VGA_COMPATIBLE = 1 << 5;
        const NO_WINDOWED_MODE = 1 << 6;
        const LINEAR_FRAME_BUFFER = 1 << 7;
        const DOUBLE_SCAN = 1 << 8;
        const INTERLACED = 1 << 9;
        const TRIPLE_BUFFER = 1 << 10;
        const STEREO = 1 << 11;
        const DUAL_DISPLAY_START = 1 << 12;
    }
}

bitflags! {
    /// `ModeInfoBlock.WinAAttributes` / `WinBAttributes`.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct WindowAttributes: u8 {
        const RELOCATABLE = 1 << 0;
        const READABLE = 1 << 1;
        const WRITABLE = 1 << 2;
    }
}

bitflags! {
    /// `ModeInfoBlock.DirectColorModeInfo`.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct DirectColorAttributes: u8 {
        const RAMP_PROGRAMMABLE = 1 << 0;
        const RESERVED_USABLE = 1 << 1;
    }
}

bitflags! {
    /// `VbeInfoBlock.Capabilities`.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u32 {
        const DAC_SWITCHABLE = 1 << 0;
        const NOT_VGA_COMPATIBLE = 1 << 1;
        const RAMDAC_BLANK = 1 << 2;
        const STEREO = 1 << 3;
        const STEREO_EVC = 1 << 4;
    }
}

bitflags! {
    /// Video state components for function 04h (CX).
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct StateFlags: u16 {
        const HARDWARE = 1 << 0;
        const BIOS_DATA = 1 << 1;
        const DAC = 1 << 2;
        const SVGA = 1 << 3;
    }
}

bitflags! {
    /// Flag bits OR'ed into the mode number for function 02h (BX).
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct ModeFlags: u16 {
        const CRTC = 1 << 11;
        const LINEAR_FRAME_BUFFER = 1 << 14;
        const NO_CLEAR = 1 << 15;
    }
}

bitflags! {
    /// `CRTCInfoBlock.Flags`.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct CrtcFlags: u8 {
        const DOUBLE_SCAN = 1 << 0;
        const INTERLACED = 1 << 1;
        const NEGATIVE_HSYNC = 1 << 2;
        const NEGATIVE_VSYNC = 1 << 3;
    }
}

/// Mode number bits of a 02h/03h mode word.
pub const MODE_NUMBER_MASK: u16 = 0x01FF;

/// `ModeInfoBlock.MemoryModel`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct MemoryModel(pub u8);

impl MemoryModel {
    pub const TEXT: Self = Self(0x00);
    pub const CGA: Self = Self(0x01);
    pub const HERCULES: Self = Self(0x02);
    pub const PLANAR: Self = Self(0x03);
    pub const PACKED_PIXEL: Self = Self(0x04);
    pub const NON_CHAIN_4: Self = Self(0x05);
    pub const DIRECT_COLOR: Self = Self(0x06);
    pub const YUV: Self = Self(0x07);
}

/// Size and position of one colour channel in a direct colour pixel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct ColorField {
    pub size: u8,
    pub position: u8,
}

impl ColorField {
    pub fn mask(self) -> u32 {
        if self.size == 0 || self.size > 32 {
            return 0;
        }
        (u32::MAX >> (32 - u32::from(self.size)))
            .checked_shl(u32::from(self.position))
            .unwrap_or(0)
    }
}

fn le16(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([buf[off], buf[off + 1]])
}

fn le32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

fn put16(buf: &mut [u8], off: usize, v: u16) {
    buf[off..off + 2].copy_from_slice(&v.to_le_bytes());
}

fn put32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

fn read_fields(buf: &[u8], off: usize) -> [ColorField; 4] {
    let mut out = [ColorField::default(); 4];
    for (i, f) in out.iter_mut().enumerate() {
        f.size = buf[off + i * 2];
        f.position = buf[off + i * 2 + 1];
    }
    out
}

fn write_fields(buf: &mut [u8], off: usize, fields: [ColorField; 4]) {
    for (i, f) in fields.iter().enumerate() {
        buf[off + i * 2] = f.size;
        buf[off + i * 2 + 1] = f.position;
    }
}

/// The 512-byte `VbeInfoBlock` returned by function 00h.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControllerInfo {
    pub signature: [u8; 4],
    /// BCD, e.g. `0x0300` for VBE 3.0.
    pub version: u16,
    pub oem_string_ptr: u32,
    pub capabilities: Capabilities,
    pub video_mode_ptr: u32,
    /// Video memory in 64 KiB blocks.
    pub total_memory: u16,
    pub oem_software_rev: u16,
    pub oem_vendor_name_ptr: u32,
    pub oem_product_name_ptr: u32,
    pub oem_product_rev_ptr: u32,
}

impl ControllerInfo {
    pub const SIGNATURE: [u8; 4] = *b"VESA";
    /// Written into the block before the call to request the VBE 2.0 layout.
    pub const VBE2_SIGNATURE: [u8; 4] = *b"VBE2";

    pub fn from_bytes(buf: &[u8; CONTROLLER_INFO_LEN]) -> Self {
        Self {
            signature: [buf[0], buf[1], buf[2], buf[3]],
            version: le16(buf, 4),
            oem_string_ptr: le32(buf, 6),
            capabilities: Capabilities::from_bits_retain(le32(buf, 10)),
            video_mode_ptr: le32(buf, 14),
            total_memory: le16(buf, 18),
            oem_software_rev: le16(buf, 20),
            oem_vendor_name_ptr: le32(buf, 22),
            oem_product_name_ptr: le32(buf, 26),
            oem_product_rev_ptr: le32(buf, 30),
        }
    }

    pub fn to_bytes(&self) -> [u8; CONTROLLER_INFO_LEN] {
        let mut buf = [0u8; CONTROLLER_INFO_LEN];
        buf[0..4].copy_from_slice(&self.signature);
        put16(&mut buf, 4, self.version);
        put32(&mut buf, 6, self.oem_string_ptr);
        put32(&mut buf, 10, self.capabilities.bits());
        put32(&mut buf, 14, self.video_mode_ptr);
        put16(&mut buf, 18, self.total_memory);
        put16(&mut buf, 20, self.oem_software_rev);
        put32(&mut buf, 22, self.oem_vendor_name_ptr);
        put32(&mut buf, 26, self.oem_product_name_ptr);
        put32(&mut buf, 30, self.oem_product_rev_ptr);
        buf
    }

    pub fn has_valid_signature(&self) -> bool {
        self.signature == Self::SIGNATURE
    }

    /// Major and minor version, decoded from BCD.
    pub fn version_parts(&self) -> (u8, u8) {
        let bcd = |b: u8| (b >> 4) * 10 + (b & 0x0F);
        (bcd((self.version >> 8) as u8), bcd(self.version as u8))
    }
}

/// The 256-byte `ModeInfoBlock` returned by function 01h.
///
/// `ModeInfo::default()` is the all-zero block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModeInfo {
    pub attributes: ModeAttributes,
    pub window_a: WindowAttributes,
    pub window_b: WindowAttributes,
    pub window_granularity_kb: u16,
    pub window_size_kb: u16,
    pub window_a_segment: u16,
    pub window_b_segment: u16,
    pub window_func_ptr: u32,
    pub bytes_per_scan_line: u16,

    // VBE 1.2
    pub width: u16,
    pub height: u16,
    pub char_width: u8,
    pub char_height: u8,
    pub planes: u8,
    pub bits_per_pixel: u8,
    pub banks: u8,
    pub memory_model: MemoryModel,
    pub bank_size_kb: u8,
    pub image_pages: u8,
    pub red: ColorField,
    pub green: ColorField,
    pub blue: ColorField,
    pub reserved: ColorField,
    pub direct_color: DirectColorAttributes,

    // VBE 2.0
    pub phys_base_ptr: u32,
    pub off_screen_mem_offset: u32,
    pub off_screen_mem_size_kb: u16,

    // VBE 3.0
    pub linear_bytes_per_scan_line: u16,
    pub bank_image_pages: u8,
    pub linear_image_pages: u8,
    pub linear_red: ColorField,
    pub linear_green: ColorField,
    pub linear_blue: ColorField,
    pub linear_reserved: ColorField,
    pub max_pixel_clock: u32,
}

impl ModeInfo {
    /// Offset of `PhysBasePtr`.
    pub const PHYS_BASE_PTR_OFFSET: usize = 40;

    pub fn from_bytes(buf: &[u8; MODE_INFO_LEN]) -> Self {
        let [red, green, blue, reserved] = read_fields(buf, 31);
        let [linear_red, linear_green, linear_blue, linear_reserved] = read_fields(buf, 54);
        Self {
            attributes: ModeAttributes::from_bits_retain(le16(buf, 0)),
            window_a: WindowAttributes::from_bits_retain(buf[2]),
            window_b: WindowAttributes::from_bits_retain(buf[3]),
            window_granularity_kb: le16(buf, 4),
            window_size_kb: le16(buf, 6),
            window_a_segment: le16(buf, 8),
            window_b_segment: le16(buf, 10),
            window_func_ptr: le32(buf, 12),
            bytes_per_scan_line: le16(buf, 16),
            width: le16(buf, 18),
            height: le16(buf, 20),
            char_width: buf[22],
            char_height: buf[23],
            planes: buf[24],
            bits_per_pixel: buf[25],
            banks: buf[26],
            memory_model: MemoryModel(buf[27]),
            bank_size_kb: buf[28],
            image_pages: buf[29],
            red,
            green,
            blue,
            reserved,
            direct_color: DirectColorAttributes::from_bits_retain(buf[39]),
            phys_base_ptr: le32(buf, Self::PHYS_BASE_PTR_OFFSET),
            off_screen_mem_offset: le32(buf, 44),
            off_screen_mem_size_kb: le16(buf, 48),
            linear_bytes_per_scan_line: le16(buf, 50),
            bank_image_pages: buf[52],
            linear_image_pages: buf[53],
            linear_red,
            linear_green,
            linear_blue,
            linear_reserved,
            max_pixel_clock: le32(buf, 62),
        }
    }

    pub fn to_bytes(&self) -> [u8; MODE_INFO_LEN] {
        let mut buf = [0u8; MODE_INFO_LEN];
        put16(&mut buf, 0, self.attributes.bits());
        buf[2] = self.window_a.bits();
        buf[3] = self.window_b.bits();
        put16(&mut buf, 4, self.window_granularity_kb);
        put16(&mut buf, 6, self.window_size_kb);
        put16(&mut buf, 8, self.window_a_segment);
        put16(&mut buf, 10, self.window_b_segment);
        put32(&mut buf, 12, self.window_func_ptr);
        put16(&mut buf, 16, self.bytes_per_scan_line);
        put16(&mut buf, 18, self.width);
        put16(&mut buf, 20, self.height);
        buf[22] = self.char_width;
        buf[23] = self.char_height;
        buf[24] = self.planes;
        buf[25] = self.bits_per_pixel;
        buf[26] = self.banks;
        buf[27] = self.memory_model.0;
        buf[28] = self.bank_size_kb;
        buf[29] = self.image_pages;
        write_fields(&mut buf, 31, [self.red, self.green, self.blue, self.reserved]);
        buf[39] = self.direct_color.bits();
        put32(&mut buf, Self::PHYS_BASE_PTR_OFFSET, self.phys_base_ptr);
        put32(&mut buf, 44, self.off_screen_mem_offset);
        put16(&mut buf, 48, self.off_screen_mem_size_kb);
        put16(&mut buf, 50, self.linear_bytes_per_scan_line);
        buf[52] = self.bank_image_pages;
        buf[53] = self.linear_image_pages;
        write_fields(
            &mut buf,
            54,
            [
                self.linear_red,
                self.linear_green,
                self.linear_blue,
                self.linear_reserved,
            ],
        );
        put32(&mut buf, 62, self.max_pixel_clock);
        buf
    }

    pub fn is_supported(&self) -> bool {
        self.attributes.contains(ModeAttributes::SUPPORTED)
    }

    pub fn is_graphics(&self) -> bool {
        self.attributes.contains(ModeAttributes::GRAPHICS)
    }

    /// Whether the mode advertises a linear frame buffer at a non-zero physical address.
    pub fn has_linear_frame_buffer(&self) -> bool {
        self.attributes
            .contains(ModeAttributes::LINEAR_FRAME_BUFFER)
            && self.phys_base_ptr != 0
    }

    pub fn bytes_per_pixel(&self) -> u8 {
        self.bits_per_pixel.div_ceil(8)
    }
}

/// The 59-byte `CRTCInfoBlock` passed to function 02h with [`ModeFlags::CRTC`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrtcInfo {
    pub horizontal_total: u16,
    pub horizontal_sync_start: u16,
    pub horizontal_sync_end: u16,
    pub vertical_total: u16,
    pub vertical_sync_start: u16,
    pub vertical_sync_end: u16,
    pub flags: CrtcFlags,
    /// Hz.
    pub pixel_clock: u32,
    /// Units of 0.01 Hz.
    pub refresh_rate: u16,
}

impl CrtcInfo {
    pub fn from_bytes(buf: &[u8; CRTC_INFO_LEN]) -> Self {
        Self {
            horizontal_total: le16(buf, 0),
            horizontal_sync_start: le16(buf, 2),
            horizontal_sync_end: le16(buf, 4),
            vertical_total: le16(buf, 6),
            vertical_sync_start: le16(buf, 8),
            vertical_sync_end: le16(buf, 10),
            flags: CrtcFlags::from_bits_retain(buf[12]),
            pixel_clock: le32(buf, 13),
            refresh_rate: le16(buf, 17),
        }
    }

    pub fn to_bytes(&self) -> [u8; CRTC_INFO_LEN] {
        let mut buf = [0u8; CRTC_INFO_LEN];
        put16(&mut buf, 0, self.horizontal_total);
        put16(&mut buf, 2, self.horizontal_sync_start);
        put16(&mut buf, 4, self.horizontal_sync_end);
        put16(&mut buf, 6, self.vertical_total);
        put16(&mut buf, 8, self.vertical_sync_start);
        put16(&mut buf, 10, self.vertical_sync_end);
        buf[12] = self.flags.bits();
        put32(&mut buf, 13, self.pixel_clock);
        put16(&mut buf, 17, self.refresh_rate);
        buf
    }
}
