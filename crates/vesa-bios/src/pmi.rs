//! VBE 2.0 protected-mode interface table and the handlers behind it.

use vesa_dpmi::FastPathRegs;

use crate::{FastPathCall, VbeBios};

const RET: u8 = 0xC3;

const BANK_SWITCH_ENTRY: u16 = 0x0010;
const DISPLAY_START_ENTRY: u16 = 0x0020;
const PALETTE_ENTRY: u16 = 0x0030;
const IO_INFO: u16 = 0x0008;
const TABLE_LEN: usize = 0x0040;

/// The table shipped in the ROM by default: header, I/O port list (the graphics controller
/// index/data pair), an empty memory list and a `ret` at each entry point.
pub fn default_pmi_table() -> Vec<u8> {
    let mut table = vec![0u8; TABLE_LEN];
    let words = [
        BANK_SWITCH_ENTRY,
        DISPLAY_START_ENTRY,
        PALETTE_ENTRY,
        IO_INFO,
        0x03CE,
        0x03CF,
        0xFFFF,
        0xFFFF,
    ];
    for (i, w) in words.iter().enumerate() {
        table[i * 2..i * 2 + 2].copy_from_slice(&w.to_le_bytes());
    }
    for entry in [BANK_SWITCH_ENTRY, DISPLAY_START_ENTRY, PALETTE_ENTRY] {
        table[usize::from(entry)] = RET;
    }
    table
}

/// Entry offsets read from the first four words of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmiLayout {
    pub bank_switch: u16,
    pub display_start: u16,
    pub palette: u16,
    pub io_info: u16,
}

impl PmiLayout {
    pub fn parse(table: &[u8]) -> Option<Self> {
        let word = |i: usize| {
            table
                .get(i * 2..i * 2 + 2)
                .map(|b| u16::from_le_bytes([b[0], b[1]]))
        };
        Some(Self {
            bank_switch: word(0)?,
            display_start: word(1)?,
            palette: word(2)?,
            io_info: word(3)?,
        })
    }
}

impl VbeBios {
    /// Services a near call into a copy of the protected-mode table.
    ///
    /// Register conventions match the real-mode functions: bank switch takes BL = window and
    /// DX = position, display start takes CX/DX = low/high word of the byte address, palette
    /// data takes ECX = count and EDX = first index.
    pub(crate) fn handle_pm_call(
        &mut self,
        code: &[u8],
        entry: usize,
        regs: &mut FastPathRegs,
    ) -> bool {
        let Some(layout) = PmiLayout::parse(code) else {
            return false;
        };
        let call = if entry == usize::from(layout.bank_switch) {
            let window = regs.ebx as u8;
            let bank = regs.edx as u16;
            if let Some(slot) = self.state.banks.get_mut(usize::from(window)) {
                *slot = bank;
            }
            FastPathCall::BankSwitch { window, bank }
        } else if entry == usize::from(layout.display_start) {
            let address = ((regs.edx & 0xFFFF) << 16) | (regs.ecx & 0xFFFF);
            self.state.display_start_address = address;
            FastPathCall::DisplayStart { address }
        } else if entry == usize::from(layout.palette) {
            FastPathCall::PaletteData {
                start: regs.edx as u16,
                count: regs.ecx as u16,
            }
        } else {
            return false;
        };
        self.fast_path_calls.push(call);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_layout() {
        let table = default_pmi_table();
        let layout = PmiLayout::parse(&table).unwrap();
        assert_eq!(
            layout,
            PmiLayout {
                bank_switch: 0x10,
                display_start: 0x20,
                palette: 0x30,
                io_info: 0x08,
            }
        );
        assert_eq!(table[0x10], RET);
        assert_eq!(&table[0x08..0x10], &[0xCE, 0x03, 0xCF, 0x03, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn pm_bank_switch_moves_window() {
        let mut bios = VbeBios::default();
        let table = default_pmi_table();
        let mut regs = FastPathRegs {
            ebx: 0,
            edx: 7,
            ..FastPathRegs::default()
        };
        assert!(bios.handle_pm_call(&table, 0x10, &mut regs));
        assert_eq!(bios.bank_position(0), Some(7));
        assert_eq!(
            bios.fast_path_calls(),
            &[FastPathCall::BankSwitch { window: 0, bank: 7 }]
        );
        assert!(!bios.handle_pm_call(&table, 0x11, &mut regs));
        assert!(!bios.handle_pm_call(&table[..4], 0x10, &mut regs));
    }
}
