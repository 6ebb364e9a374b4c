use crate::{
    modes::DataArea, VbeBiosConfig, DATA_AREA_OFFSET, PMID_OFFSET, PMI_TABLE_OFFSET,
    VIDEO_ROM_SIZE,
};

pub(crate) const PMID_SIZE: usize = 20;
const PM_ENTRY_OFFSET: u16 = 0x0180;
const PM_INIT_OFFSET: u16 = 0x0181;

/// Build the 32 KiB video option ROM image.
pub(crate) fn build_video_rom(config: &VbeBiosConfig) -> Vec<u8> {
    let mut rom = vec![0u8; VIDEO_ROM_SIZE];

    rom[0] = 0x55;
    rom[1] = 0xAA;
    rom[2] = (VIDEO_ROM_SIZE / 512) as u8;
    rom[3] = 0xCB; // RETF in place of the init vector
    rom[usize::from(PM_ENTRY_OFFSET)] = 0xC3;
    rom[usize::from(PM_INIT_OFFSET)] = 0xCB;

    if config.pmid {
        write_pmid(&mut rom[PMID_OFFSET..PMID_OFFSET + PMID_SIZE]);
    }

    if let Some(table) = &config.protected_mode_interface {
        let start = usize::from(PMI_TABLE_OFFSET);
        let end = (start + table.len()).min(usize::from(DATA_AREA_OFFSET));
        rom[start..end].copy_from_slice(&table[..end - start]);
    }

    let area = DataArea::layout(config);
    let mut cursor = usize::from(area.mode_list);
    for mode in &config.modes {
        rom[cursor..cursor + 2].copy_from_slice(&mode.id.to_le_bytes());
        cursor += 2;
    }
    rom[cursor..cursor + 2].copy_from_slice(&0xFFFFu16.to_le_bytes());

    write_c_string(&mut rom, area.oem_string, &config.oem_string);
    write_c_string(&mut rom, area.vendor_name, &config.vendor_name);
    write_c_string(&mut rom, area.product_name, &config.product_name);
    write_c_string(&mut rom, area.product_revision, &config.product_revision);

    // Whole-image checksum lives in the last byte.
    let sum = rom.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    rom[VIDEO_ROM_SIZE - 1] = 0u8.wrapping_sub(sum);
    rom
}

fn write_pmid(block: &mut [u8]) {
    block.fill(0);
    block[0..4].copy_from_slice(b"PMID");
    block[4..6].copy_from_slice(&PM_ENTRY_OFFSET.to_le_bytes());
    block[6..8].copy_from_slice(&PM_INIT_OFFSET.to_le_bytes());
    // Selector slots (BIOSDataSel, A0000Sel, B0000Sel, B8000Sel, CodeSegSel) are filled in by
    // the protected-mode loader; InProtectMode stays zero.
    let sum = block.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    block[PMID_SIZE - 1] = 0u8.wrapping_sub(sum);
}

fn write_c_string(rom: &mut [u8], offset: u16, s: &str) {
    let start = usize::from(offset);
    let end = start + s.len();
    rom[start..end].copy_from_slice(s.as_bytes());
    rom[end] = 0;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checksum(bytes: &[u8]) -> u8 {
        bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
    }

    #[test]
    fn rom_header_and_checksums() {
        let rom = build_video_rom(&VbeBiosConfig::default());
        assert_eq!(&rom[0..3], &[0x55, 0xAA, 0x40]);
        assert_eq!(checksum(&rom), 0);

        let pmid = &rom[PMID_OFFSET..PMID_OFFSET + PMID_SIZE];
        assert_eq!(&pmid[0..4], b"PMID");
        assert_eq!(checksum(pmid), 0);
    }

    #[test]
    fn mode_list_is_terminated() {
        let config = VbeBiosConfig::default();
        let rom = build_video_rom(&config);
        let start = usize::from(DATA_AREA_OFFSET);
        let words: Vec<u16> = rom[start..]
            .chunks_exact(2)
            .map(|w| u16::from_le_bytes([w[0], w[1]]))
            .take_while(|&w| w != 0xFFFF)
            .collect();
        let ids: Vec<u16> = config.modes.iter().map(|m| m.id).collect();
        assert_eq!(words, ids);
    }

    #[test]
    fn pmid_can_be_left_out() {
        let rom = build_video_rom(&VbeBiosConfig {
            pmid: false,
            ..VbeBiosConfig::default()
        });
        assert!(!rom.windows(4).any(|w| w == b"PMID"));
    }
}
