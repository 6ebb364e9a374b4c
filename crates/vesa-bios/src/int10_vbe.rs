use vesa_realmode::{real_addr, MemoryBus, RealModeRegs};

use crate::{
    modes::{controller_info_block, mode_info_block},
    ScheduledStart, VbeBios, VbeState, PMI_TABLE_OFFSET, VIDEO_ROM_SEGMENT,
};

const VBE_SUCCESS: u16 = 0x004F;
const VBE_FAIL: u16 = 0x014F;
const VBE_INVALID_FOR_HARDWARE: u16 = 0x024F;
const VBE_INVALID_FOR_MODE: u16 = 0x034F;

const MODE_NUMBER_MASK: u16 = 0x01FF;
const MODE_FLAG_CRTC: u16 = 1 << 11;
const MODE_FLAG_LFB: u16 = 1 << 14;
const MODE_FLAG_NO_CLEAR: u16 = 1 << 15;

const CRTC_INFO_SIZE: usize = 59;
const CRTC_PIXEL_CLOCK_OFFSET: usize = 13;

/// 4F04h state buffer size in 64-byte blocks.
const STATE_BUFFER_BLOCKS: u16 = 1;
const STATE_MAGIC: [u8; 2] = *b"VS";
const STATE_DAC: u16 = 1 << 2;
const STATE_SVGA: u16 = 1 << 3;

const CAP_DAC_SWITCHABLE: u32 = 1 << 0;
const CAP_STEREO: u32 = 1 << 3;

const PIXEL_CLOCK_STEP: u32 = 250_000;
const MIN_PIXEL_CLOCK: u32 = 12_500_000;

impl VbeBios {
    pub fn handle_int10_vbe(&mut self, regs: &mut RealModeRegs, memory: &mut dyn MemoryBus) {
        let function = regs.al();
        if self.config.unsupported_functions.contains(&function) {
            // AX is left as-is: AL != 4Fh tells the caller the function does not exist.
            return;
        }
        match function {
            0x00 => {
                let dest = real_addr(regs.es, regs.di());
                let mut sig = [0u8; 4];
                memory.read_bytes(dest, &mut sig);
                let block = controller_info_block(&self.config, &sig == b"VBE2");
                memory.write_bytes(dest, &block);
                vbe_success(regs);
            }
            0x01 => {
                let mode = regs.cx() & MODE_NUMBER_MASK;
                self.mode_info_queries.push(mode);
                let dest = real_addr(regs.es, regs.di());
                match self.find_mode(mode) {
                    Some(m) if !self.config.failing_modes.contains(&mode) => {
                        let block = mode_info_block(m, &self.config);
                        memory.write_bytes(dest, &block);
                        vbe_success(regs);
                    }
                    _ => vbe_status(regs, VBE_FAIL),
                }
            }
            0x02 => self.set_mode(regs, memory),
            0x03 => match self.state.current_mode {
                Some(mode) => {
                    let lfb = if self.state.lfb_enabled { MODE_FLAG_LFB } else { 0 };
                    regs.set_bx(mode | lfb);
                    vbe_success(regs);
                }
                None => vbe_status(regs, VBE_INVALID_FOR_MODE),
            },
            0x04 => self.video_state(regs, memory),
            0x05 => {
                // BH: 0 = set, 1 = get. BL: window.
                if self.state.lfb_enabled {
                    vbe_status(regs, VBE_INVALID_FOR_MODE);
                    return;
                }
                let window = regs.bl();
                // Only window A exists.
                if window != 0 {
                    vbe_status(regs, VBE_FAIL);
                    return;
                }
                match regs.bh() {
                    0x00 => {
                        let max_bank = self.config.total_memory_blocks;
                        if regs.dx() >= max_bank {
                            vbe_status(regs, VBE_FAIL);
                            return;
                        }
                        self.state.banks[0] = regs.dx();
                        vbe_success(regs);
                    }
                    0x01 => {
                        regs.set_dx(self.state.banks[0]);
                        vbe_success(regs);
                    }
                    _ => vbe_status(regs, VBE_FAIL),
                }
            }
            0x06 => self.scan_line_length(regs),
            0x07 => self.display_start_request(regs),
            0x08 => self.dac_width_request(regs),
            0x09 => self.palette_data(regs, memory),
            0x0A => match &self.config.protected_mode_interface {
                Some(table) if regs.bl() == 0 => {
                    regs.es = VIDEO_ROM_SEGMENT;
                    regs.set_di(PMI_TABLE_OFFSET);
                    regs.set_cx(table.len() as u16);
                    vbe_success(regs);
                }
                Some(_) => vbe_status(regs, VBE_FAIL),
                // No protected-mode interface: behave like a VBE 1.2 BIOS.
                None => {}
            },
            0x0B => self.pixel_clock_request(regs),
            _ => {}
        }
    }

    fn set_mode(&mut self, regs: &mut RealModeRegs, memory: &mut dyn MemoryBus) {
        let raw = regs.bx();
        let id = raw & MODE_NUMBER_MASK;

        if id < 0x100 {
            // Standard VGA mode.
            self.state = VbeState {
                current_mode: Some(id),
                palette: std::mem::take(&mut self.state.palette),
                ..VbeState::default()
            };
            vbe_success(regs);
            return;
        }

        let Some(mode) = self.find_mode(id).copied() else {
            vbe_status(regs, VBE_FAIL);
            return;
        };
        if mode.frame_bytes() > self.total_memory_bytes() {
            vbe_status(regs, VBE_INVALID_FOR_HARDWARE);
            return;
        }
        let lfb = raw & MODE_FLAG_LFB != 0;
        if lfb && !mode.lfb {
            vbe_status(regs, VBE_FAIL);
            return;
        }

        let pixel_clock = if raw & MODE_FLAG_CRTC != 0 {
            let mut crtc = [0u8; CRTC_INFO_SIZE];
            memory.read_bytes(real_addr(regs.es, regs.di()), &mut crtc);
            let at = CRTC_PIXEL_CLOCK_OFFSET;
            u32::from_le_bytes([crtc[at], crtc[at + 1], crtc[at + 2], crtc[at + 3]])
        } else {
            default_pixel_clock(mode.width)
        };

        // The DAC is reset to 6 bits per primary on every mode set.
        self.state = VbeState {
            current_mode: Some(id),
            lfb_enabled: lfb,
            bytes_per_scan_line: mode.bytes_per_scan_line(),
            logical_width_pixels: mode.width,
            pixel_clock,
            palette: std::mem::take(&mut self.state.palette),
            ..VbeState::default()
        };

        if raw & MODE_FLAG_NO_CLEAR == 0 && mode.graphics {
            memory.fill(self.config.lfb_base, mode.frame_bytes() as usize, 0);
        }
        vbe_success(regs);
    }

    fn video_state(&mut self, regs: &mut RealModeRegs, memory: &mut dyn MemoryBus) {
        let flags = regs.cx();
        let addr = real_addr(regs.es, regs.bx());
        match regs.dl() {
            0x00 => {
                regs.set_bx(STATE_BUFFER_BLOCKS);
                vbe_success(regs);
            }
            0x01 => {
                let mut block = [0u8; 64];
                block[0..2].copy_from_slice(&STATE_MAGIC);
                block[2..4].copy_from_slice(&flags.to_le_bytes());
                if flags & STATE_SVGA != 0 {
                    let s = &self.state;
                    block[4..6].copy_from_slice(&s.current_mode.unwrap_or(0).to_le_bytes());
                    block[6] = u8::from(s.lfb_enabled);
                    block[8..10].copy_from_slice(&s.banks[0].to_le_bytes());
                    block[10..12].copy_from_slice(&s.banks[1].to_le_bytes());
                    block[12..14].copy_from_slice(&s.bytes_per_scan_line.to_le_bytes());
                    block[14..16].copy_from_slice(&s.logical_width_pixels.to_le_bytes());
                    block[16..18].copy_from_slice(&s.display_start_x.to_le_bytes());
                    block[18..20].copy_from_slice(&s.display_start_y.to_le_bytes());
                    block[20..24].copy_from_slice(&s.pixel_clock.to_le_bytes());
                }
                if flags & STATE_DAC != 0 {
                    block[7] = self.state.dac_width_bits;
                }
                memory.write_bytes(addr, &block);
                vbe_success(regs);
            }
            0x02 => {
                let mut block = [0u8; 64];
                memory.read_bytes(addr, &mut block);
                if block[0..2] != STATE_MAGIC {
                    vbe_status(regs, VBE_FAIL);
                    return;
                }
                let saved = u16::from_le_bytes([block[2], block[3]]);
                let word = |i: usize| u16::from_le_bytes([block[i], block[i + 1]]);
                if flags & saved & STATE_SVGA != 0 {
                    let mode = word(4);
                    self.state.current_mode = (mode != 0).then_some(mode);
                    self.state.lfb_enabled = block[6] != 0;
                    self.state.banks = [word(8), word(10)];
                    self.state.bytes_per_scan_line = word(12);
                    self.state.logical_width_pixels = word(14);
                    self.state.display_start_x = word(16);
                    self.state.display_start_y = word(18);
                    self.state.pixel_clock =
                        u32::from_le_bytes([block[20], block[21], block[22], block[23]]);
                }
                if flags & saved & STATE_DAC != 0 {
                    self.state.dac_width_bits = block[7];
                }
                vbe_success(regs);
            }
            _ => vbe_status(regs, VBE_FAIL),
        }
    }

    fn scan_line_length(&mut self, regs: &mut RealModeRegs) {
        let Some(mode) = self
            .state
            .current_mode
            .filter(|&m| m >= 0x100)
            .and_then(|m| self.find_mode(m))
            .copied()
        else {
            vbe_status(regs, VBE_INVALID_FOR_MODE);
            return;
        };
        let bpp = mode.bytes_per_pixel();
        match regs.bl() {
            0x00 => {
                // Set in pixels, clamped to a whole-pixel byte pitch that fits in u16.
                let bpp_u32 = u32::from(bpp);
                let bytes = u32::from(regs.cx()).saturating_mul(bpp_u32);
                let max_aligned = (u32::from(u16::MAX) / bpp_u32) * bpp_u32;
                let bytes = bytes.min(max_aligned) as u16;
                self.state.bytes_per_scan_line = bytes.max(mode.bytes_per_scan_line());
            }
            0x01 => {}
            0x02 => {
                // Set in bytes. Odd byte pitches are kept as given.
                self.state.bytes_per_scan_line = regs.cx().max(mode.bytes_per_scan_line());
            }
            0x03 => {
                let max_bytes = self.state.bytes_per_scan_line.max(mode.bytes_per_scan_line());
                regs.set_bx(max_bytes);
                regs.set_cx(max_bytes / bpp);
                regs.set_dx(self.max_scan_lines(max_bytes));
                vbe_success(regs);
                return;
            }
            _ => {
                vbe_status(regs, VBE_FAIL);
                return;
            }
        }
        self.state.logical_width_pixels = (self.state.bytes_per_scan_line / bpp).max(mode.width);
        regs.set_bx(self.state.bytes_per_scan_line);
        regs.set_cx(self.state.logical_width_pixels);
        regs.set_dx(self.max_scan_lines(self.state.bytes_per_scan_line));
        vbe_success(regs);
    }

    fn max_scan_lines(&self, bytes_per_line: u16) -> u16 {
        let lines = self.total_memory_bytes() / u32::from(bytes_per_line.max(1));
        lines.min(u32::from(u16::MAX)) as u16
    }

    fn display_start_request(&mut self, regs: &mut RealModeRegs) {
        // Bit 7 of BL asks for the change to happen during vertical retrace; retrace timing is
        // not modelled so it is accepted and otherwise ignored.
        match regs.bl() & 0x7F {
            0x00 => {
                self.state.display_start_x = regs.cx();
                self.state.display_start_y = regs.dx();
                let stride = u32::from(self.state.bytes_per_scan_line);
                let bpp = self
                    .state
                    .current_mode
                    .and_then(|m| self.find_mode(m))
                    .map_or(1, |m| u32::from(m.bytes_per_pixel()));
                self.state.display_start_address =
                    u32::from(regs.dx()) * stride + u32::from(regs.cx()) * bpp;
                vbe_success(regs);
            }
            0x01 => {
                regs.set_bh(0);
                regs.set_cx(self.state.display_start_x);
                regs.set_dx(self.state.display_start_y);
                vbe_success(regs);
            }
            0x02 => {
                self.state.scheduled = Some(ScheduledStart {
                    left: regs.ecx,
                    right: None,
                });
                vbe_success(regs);
            }
            0x03 => {
                if !self.state.stereo {
                    vbe_status(regs, VBE_INVALID_FOR_MODE);
                    return;
                }
                self.state.scheduled = Some(ScheduledStart {
                    left: regs.ecx,
                    right: Some(regs.edx),
                });
                vbe_success(regs);
            }
            0x04 => {
                // A scheduled flip completes at the next retrace, which has always happened by
                // the time anyone asks.
                if let Some(s) = self.state.scheduled.take() {
                    self.state.display_start_address = s.left;
                    if let Some(right) = s.right {
                        self.state.right_eye_address = right;
                    }
                }
                regs.set_cx(1);
                vbe_success(regs);
            }
            0x05 => {
                if self.config.capabilities & CAP_STEREO == 0 {
                    vbe_status(regs, VBE_FAIL);
                    return;
                }
                self.state.stereo = true;
                vbe_success(regs);
            }
            0x06 => {
                self.state.stereo = false;
                vbe_success(regs);
            }
            _ => vbe_status(regs, VBE_FAIL),
        }
    }

    fn dac_width_request(&mut self, regs: &mut RealModeRegs) {
        match regs.bl() {
            0x00 => {
                let bits = regs.bh();
                if bits != 6 && bits != 8 {
                    vbe_status(regs, VBE_FAIL);
                    return;
                }
                if bits == 8 && self.config.capabilities & CAP_DAC_SWITCHABLE == 0 {
                    regs.set_bh(6);
                    vbe_status(regs, VBE_INVALID_FOR_HARDWARE);
                    return;
                }
                // Rescale stored entries so colours survive the width change.
                match (self.state.dac_width_bits, bits) {
                    (6, 8) => {
                        for entry in self.state.palette.chunks_exact_mut(4) {
                            for c in &mut entry[..3] {
                                let v6 = *c & 0x3F;
                                *c = (v6 << 2) | (v6 >> 4);
                            }
                        }
                    }
                    (8, 6) => {
                        for entry in self.state.palette.chunks_exact_mut(4) {
                            for c in &mut entry[..3] {
                                *c >>= 2;
                            }
                        }
                    }
                    _ => {}
                }
                self.state.dac_width_bits = bits;
                regs.set_bh(bits);
                vbe_success(regs);
            }
            0x01 => {
                regs.set_bh(self.state.dac_width_bits);
                vbe_success(regs);
            }
            _ => vbe_status(regs, VBE_FAIL),
        }
    }

    fn palette_data(&mut self, regs: &mut RealModeRegs, memory: &mut dyn MemoryBus) {
        let count = usize::from(regs.cx());
        let start = usize::from(regs.dx());
        let addr = real_addr(regs.es, regs.di());
        if start >= 256 || start + count > 256 {
            vbe_status(regs, VBE_FAIL);
            return;
        }
        let range = start * 4..(start + count) * 4;
        // Bit 7 selects "during vertical retrace"; subfunctions 2/3 (secondary palette) are not
        // implemented.
        match regs.bl() & 0x7F {
            0x00 => {
                let mut tmp = vec![0u8; count * 4];
                memory.read_bytes(addr, &mut tmp);
                if self.state.dac_width_bits == 6 {
                    for c in tmp.chunks_exact_mut(4).flat_map(|e| e[..3].iter_mut()) {
                        *c &= 0x3F;
                    }
                }
                self.state.palette[range].copy_from_slice(&tmp);
                vbe_success(regs);
            }
            0x01 => {
                memory.write_bytes(addr, &self.state.palette[range]);
                vbe_success(regs);
            }
            _ => vbe_status(regs, VBE_FAIL),
        }
    }

    fn pixel_clock_request(&mut self, regs: &mut RealModeRegs) {
        match regs.bl() {
            0x00 => {
                let mode = regs.dx() & MODE_NUMBER_MASK;
                if self.find_mode(mode).is_none() {
                    vbe_status(regs, VBE_FAIL);
                    return;
                }
                let requested = regs.ecx.clamp(MIN_PIXEL_CLOCK, self.config.max_pixel_clock);
                let steps = (requested + PIXEL_CLOCK_STEP / 2) / PIXEL_CLOCK_STEP;
                regs.ecx = (steps * PIXEL_CLOCK_STEP).min(self.config.max_pixel_clock);
                vbe_success(regs);
            }
            0x01 => {
                if self.state.current_mode.map_or(true, |m| m < 0x100) {
                    vbe_status(regs, VBE_INVALID_FOR_MODE);
                    return;
                }
                regs.ecx = self.state.pixel_clock;
                vbe_success(regs);
            }
            _ => vbe_status(regs, VBE_FAIL),
        }
    }
}

fn default_pixel_clock(width: u16) -> u32 {
    match width {
        0..=640 => 25_175_000,
        641..=800 => 40_000_000,
        _ => 65_000_000,
    }
}

fn vbe_success(regs: &mut RealModeRegs) {
    vbe_status(regs, VBE_SUCCESS);
}

fn vbe_status(regs: &mut RealModeRegs, ax: u16) {
    regs.set_ax(ax);
    regs.set_cf(ax != VBE_SUCCESS);
}
