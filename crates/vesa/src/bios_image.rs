//! Video BIOS image capture and `PMID` block discovery.
//!
//! VBE 3.0 firmware that can run directly in protected mode carries a 20-byte `PMID` block in
//! its option ROM. Locating it needs a private copy of the ROM, since the caller has to patch the
//! selector fields before calling the protected-mode entry point.

use tracing::debug;
use vesa_dpmi::RealModeServices;

use crate::{Error, Result};

/// Physical address of the video option ROM.
pub const VIDEO_BIOS_BASE: u32 = 0x000C_0000;
/// Bytes captured from [`VIDEO_BIOS_BASE`].
pub const VIDEO_BIOS_SIZE: usize = 0x8000;

const PMID_SIGNATURE: [u8; 4] = *b"PMID";
const PMID_LEN: usize = 20;

/// The VBE 3.0 `PMInfoBlock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PmInfoBlock {
    pub entry_point: u16,
    pub pm_initialize: u16,
    pub bios_data_sel: u16,
    pub a0000_sel: u16,
    pub b0000_sel: u16,
    pub b8000_sel: u16,
    pub code_seg_sel: u16,
    pub in_protect_mode: u8,
    pub checksum: u8,
}

impl PmInfoBlock {
    /// Decodes a block if it is signed and its bytes sum to zero.
    pub fn parse(block: &[u8]) -> Option<Self> {
        let block = block.get(..PMID_LEN)?;
        if block[..4] != PMID_SIGNATURE {
            return None;
        }
        if block.iter().fold(0u8, |acc, b| acc.wrapping_add(*b)) != 0 {
            return None;
        }
        let word = |i: usize| u16::from_le_bytes([block[i], block[i + 1]]);
        Some(Self {
            entry_point: word(4),
            pm_initialize: word(6),
            bios_data_sel: word(8),
            a0000_sel: word(10),
            b0000_sel: word(12),
            b8000_sel: word(14),
            code_seg_sel: word(16),
            in_protect_mode: block[18],
            checksum: block[19],
        })
    }
}

/// Offset of the first valid `PMID` block in `image`.
pub fn find_pmid(image: &[u8]) -> Option<(usize, PmInfoBlock)> {
    image
        .windows(PMID_LEN)
        .enumerate()
        .filter(|(_, w)| w[..4] == PMID_SIGNATURE)
        .find_map(|(offset, w)| PmInfoBlock::parse(w).map(|info| (offset, info)))
}

/// A private copy of the video option ROM with its `PMID` block located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoBiosImage {
    image: Vec<u8>,
    pmid_offset: usize,
    info: PmInfoBlock,
}

impl VideoBiosImage {
    /// Copies the ROM out of conventional memory and scans it.
    pub fn load<G: RealModeServices + ?Sized>(gw: &G) -> Result<Self> {
        let mut image = vec![0u8; VIDEO_BIOS_SIZE];
        gw.dos_mem_get(VIDEO_BIOS_BASE, &mut image);
        let image = Self::scan(image).ok_or(Error::PmidNotFound)?;
        debug!(
            pmid_offset = format_args!("{:#06x}", image.pmid_offset),
            entry_point = format_args!("{:#06x}", image.info.entry_point),
            "video BIOS PMID block found"
        );
        Ok(image)
    }

    /// Takes ownership of `image` if it contains a valid `PMID` block.
    pub fn scan(image: Vec<u8>) -> Option<Self> {
        let (pmid_offset, info) = find_pmid(&image)?;
        Some(Self {
            image,
            pmid_offset,
            info,
        })
    }

    pub fn image(&self) -> &[u8] {
        &self.image
    }

    pub fn pmid_offset(&self) -> usize {
        self.pmid_offset
    }

    pub fn info(&self) -> &PmInfoBlock {
        &self.info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_with_pmid(at: usize) -> Vec<u8> {
        let mut image = vec![0u8; 0x400];
        let block = &mut image[at..at + PMID_LEN];
        block[..4].copy_from_slice(b"PMID");
        block[4..6].copy_from_slice(&0x0180u16.to_le_bytes());
        block[6..8].copy_from_slice(&0x0181u16.to_le_bytes());
        let sum = block.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        block[PMID_LEN - 1] = 0u8.wrapping_sub(sum);
        image
    }

    #[test]
    fn finds_checksummed_block() {
        let image = VideoBiosImage::scan(image_with_pmid(0x100)).unwrap();
        assert_eq!(image.pmid_offset(), 0x100);
        assert_eq!(image.info().entry_point, 0x0180);
        assert_eq!(image.info().pm_initialize, 0x0181);
        assert_eq!(image.image().len(), 0x400);
    }

    #[test]
    fn rejects_bad_checksum() {
        let mut image = image_with_pmid(0x100);
        image[0x100 + 8] ^= 0x01;
        assert!(VideoBiosImage::scan(image).is_none());
    }

    #[test]
    fn skips_unsigned_decoy() {
        let mut image = image_with_pmid(0x200);
        image[0x40..0x44].copy_from_slice(b"PMID");
        let (offset, _) = find_pmid(&image).unwrap();
        assert_eq!(offset, 0x200);
    }
}
