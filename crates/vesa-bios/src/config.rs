use crate::pmi::default_pmi_table;

/// One entry of the BIOS mode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VbeMode {
    pub id: u16,
    /// Pixels for graphics modes, character columns for text modes.
    pub width: u16,
    /// Pixels for graphics modes, character rows for text modes.
    pub height: u16,
    pub bpp: u8,
    pub graphics: bool,
    /// Whether the mode can be set with a linear frame buffer.
    pub lfb: bool,
}

impl VbeMode {
    pub const fn graphics(id: u16, width: u16, height: u16, bpp: u8) -> Self {
        Self {
            id,
            width,
            height,
            bpp,
            graphics: true,
            lfb: true,
        }
    }

    pub const fn text(id: u16, columns: u16, rows: u16) -> Self {
        Self {
            id,
            width: columns,
            height: rows,
            bpp: 4,
            graphics: false,
            lfb: false,
        }
    }

    /// Windowed-only variant of this mode.
    pub const fn banked(self) -> Self {
        Self { lfb: false, ..self }
    }

    pub fn bytes_per_pixel(&self) -> u16 {
        u16::from(self.bpp).div_ceil(8)
    }

    pub fn bytes_per_scan_line(&self) -> u16 {
        if self.graphics {
            self.width * self.bytes_per_pixel()
        } else {
            // Character + attribute byte per cell.
            self.width * 2
        }
    }

    /// Bytes needed for one full frame.
    pub fn frame_bytes(&self) -> u32 {
        u32::from(self.bytes_per_scan_line()) * u32::from(self.height)
    }

    pub fn memory_model(&self) -> u8 {
        match (self.graphics, self.bpp) {
            (false, _) => 0x00,
            (true, 0..=8) => 0x04,
            (true, _) => 0x06,
        }
    }
}

/// The mode table installed by [`VbeBiosConfig::default`].
pub fn default_modes() -> Vec<VbeMode> {
    vec![
        VbeMode::graphics(0x101, 640, 480, 8),
        VbeMode::graphics(0x103, 800, 600, 8),
        VbeMode::graphics(0x105, 1024, 768, 8),
        VbeMode::text(0x108, 80, 60),
        VbeMode::graphics(0x111, 640, 480, 16),
        VbeMode::graphics(0x114, 800, 600, 16),
        VbeMode::graphics(0x112, 640, 480, 32),
        VbeMode::graphics(0x115, 800, 600, 32),
        VbeMode::graphics(0x118, 1024, 768, 32),
    ]
}

#[derive(Debug, Clone)]
pub struct VbeBiosConfig {
    /// Modes in the order 4F00h lists them.
    pub modes: Vec<VbeMode>,
    /// Video memory in 64 KiB blocks.
    pub total_memory_blocks: u16,
    /// Physical address of the linear frame buffer.
    pub lfb_base: u32,
    /// BCD VBE version reported by 4F00h.
    pub version: u16,
    /// Signature written back by 4F00h. Anything but `VESA` models a broken BIOS.
    pub signature: [u8; 4],
    /// Raw Capabilities dword.
    pub capabilities: u32,
    pub oem_software_rev: u16,
    pub oem_string: String,
    pub vendor_name: String,
    pub product_name: String,
    pub product_revision: String,
    /// Protected-mode interface table returned by 4F0Ah. `None` makes 4F0Ah unsupported.
    pub protected_mode_interface: Option<Vec<u8>>,
    /// Whether the ROM carries a `PMID` block.
    pub pmid: bool,
    /// Modes for which 4F01h reports failure even though they are listed.
    pub failing_modes: Vec<u16>,
    /// VBE function numbers (AL of the request) the BIOS pretends not to implement.
    pub unsupported_functions: Vec<u8>,
    pub max_pixel_clock: u32,
}

impl Default for VbeBiosConfig {
    fn default() -> Self {
        Self {
            modes: default_modes(),
            total_memory_blocks: 64,
            lfb_base: 0xE000_0000,
            version: 0x0300,
            signature: *b"VESA",
            // DAC switchable to 8 bits.
            capabilities: 0x0000_0001,
            oem_software_rev: 0x0100,
            oem_string: "VESA Reference SVGA BIOS".to_string(),
            vendor_name: "VESA Reference".to_string(),
            product_name: "SVGA Adapter".to_string(),
            product_revision: "Rev 1.0".to_string(),
            protected_mode_interface: Some(default_pmi_table()),
            pmid: true,
            failing_modes: Vec::new(),
            unsupported_functions: Vec::new(),
            max_pixel_clock: 135_000_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_geometry() {
        let m = VbeMode::graphics(0x111, 640, 480, 16);
        assert_eq!(m.bytes_per_pixel(), 2);
        assert_eq!(m.bytes_per_scan_line(), 1280);
        assert_eq!(m.frame_bytes(), 1280 * 480);
        assert_eq!(m.memory_model(), 0x06);

        let t = VbeMode::text(0x108, 80, 60);
        assert_eq!(t.bytes_per_scan_line(), 160);
        assert_eq!(t.memory_model(), 0x00);
        assert!(!t.lfb);

        assert_eq!(VbeMode::graphics(0x101, 640, 480, 8).memory_model(), 0x04);
        assert!(!VbeMode::graphics(0x101, 640, 480, 8).banked().lfb);
    }

    #[test]
    fn default_table_fits_in_default_memory() {
        let config = VbeBiosConfig::default();
        let total = u32::from(config.total_memory_blocks) << 16;
        assert!(config.modes.iter().all(|m| m.frame_bytes() <= total));
    }
}
