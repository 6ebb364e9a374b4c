//! VGA CRTC register base resolution.
//!
//! The CRTC, input status 1 and feature control registers decode at 0x3Dx on colour adapters and
//! 0x3Bx on monochrome ones, selected by bit 0 of the Miscellaneous Output register. The choice
//! is read once into a [`VgaIoBase`] and passed to register access code by value.

use tracing::debug;

/// Port I/O access. `size` is in bytes (1, 2 or 4).
pub trait PortIO {
    fn port_read(&mut self, port: u16, size: usize) -> u32;
    fn port_write(&mut self, port: u16, size: usize, val: u32);
}

/// Miscellaneous Output register, read port.
pub const MISC_OUTPUT_READ: u16 = 0x3CC;
/// Misc output bit 0: CRTC at 0x3Dx instead of 0x3Bx.
const MISC_IO_ADDRESS_SELECT: u8 = 1 << 0;
/// Input status 1 bit 3: vertical retrace in progress.
const STATUS_VERTICAL_RETRACE: u8 = 1 << 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VgaIoBase {
    pub crtc_index: u16,
    pub crtc_data: u16,
    pub input_status_1: u16,
    pub feature_control_write: u16,
}

impl VgaIoBase {
    pub const COLOR: Self = Self {
        crtc_index: 0x3D4,
        crtc_data: 0x3D5,
        input_status_1: 0x3DA,
        feature_control_write: 0x3DA,
    };

    pub const MONO: Self = Self {
        crtc_index: 0x3B4,
        crtc_data: 0x3B5,
        input_status_1: 0x3BA,
        feature_control_write: 0x3BA,
    };

    /// Reads the Miscellaneous Output register and picks the matching register set.
    pub fn detect<P: PortIO + ?Sized>(io: &mut P) -> Self {
        let misc = io.port_read(MISC_OUTPUT_READ, 1) as u8;
        let base = Self::from_misc_output(misc);
        debug!(
            misc = format_args!("{misc:#04x}"),
            color = base.is_color(),
            "VGA I/O base resolved"
        );
        base
    }

    pub fn from_misc_output(misc: u8) -> Self {
        if misc & MISC_IO_ADDRESS_SELECT != 0 {
            Self::COLOR
        } else {
            Self::MONO
        }
    }

    pub fn is_color(&self) -> bool {
        *self == Self::COLOR
    }

    pub fn read_crtc<P: PortIO + ?Sized>(self, io: &mut P, index: u8) -> u8 {
        io.port_write(self.crtc_index, 1, u32::from(index));
        io.port_read(self.crtc_data, 1) as u8
    }

    pub fn write_crtc<P: PortIO + ?Sized>(self, io: &mut P, index: u8, value: u8) {
        io.port_write(self.crtc_index, 1, u32::from(index));
        io.port_write(self.crtc_data, 1, u32::from(value));
    }

    fn in_retrace<P: PortIO + ?Sized>(self, io: &mut P) -> bool {
        io.port_read(self.input_status_1, 1) as u8 & STATUS_VERTICAL_RETRACE != 0
    }

    /// Waits for the start of the next vertical retrace: first lets any retrace in progress
    /// finish, then polls until a new one begins. Each phase gives up after `max_polls` reads.
    /// Returns whether a retrace start was seen.
    pub fn wait_for_retrace<P: PortIO + ?Sized>(self, io: &mut P, max_polls: usize) -> bool {
        let mut polls = 0;
        while self.in_retrace(io) {
            polls += 1;
            if polls >= max_polls {
                return false;
            }
        }
        for _ in 0..max_polls {
            if self.in_retrace(io) {
                return true;
            }
        }
        false
    }
}
