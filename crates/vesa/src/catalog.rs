//! The controller's list of supported mode numbers.

use tracing::debug;
use vesa_dpmi::RealModeServices;
use vesa_realmode::far_ptr_to_linear;

use crate::{info::ModeInfo, vbe, Error};

/// Terminates the mode list (-1 as a signed word).
pub const MODE_LIST_END: u16 = 0xFFFF;

/// Upper bound on entries read from firmware memory, for lists missing their terminator.
pub const MAX_CATALOG_MODES: usize = 256;

/// Mode numbers in the order the firmware listed them, sentinel excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeCatalog {
    modes: Vec<u16>,
}

impl ModeCatalog {
    /// Keeps the words before the first [`MODE_LIST_END`].
    pub fn from_words(words: &[u16]) -> Self {
        let modes = words
            .iter()
            .copied()
            .take_while(|&mode| mode != MODE_LIST_END)
            .collect();
        Self { modes }
    }

    /// Reads the list at far pointer `ptr` in conventional memory.
    pub fn read<G: RealModeServices + ?Sized>(gw: &G, ptr: u32) -> Self {
        if ptr == 0 {
            return Self::default();
        }
        let mut raw = [0u8; MAX_CATALOG_MODES * 2];
        gw.dos_mem_get(far_ptr_to_linear(ptr), &mut raw);
        let words: Vec<u16> = raw
            .chunks_exact(2)
            .map(|w| u16::from_le_bytes([w[0], w[1]]))
            .collect();
        Self::from_words(&words)
    }

    pub fn modes(&self) -> &[u16] {
        &self.modes
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.modes.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    /// Returns the first mode, in list order, whose detail record satisfies `predicate`.
    ///
    /// Modes whose detail record cannot be fetched are skipped, whether the firmware refused or
    /// the host call itself failed. Modes after the accepted one are never queried.
    pub fn find<G, P>(&self, gw: &mut G, mut predicate: P) -> Option<(u16, ModeInfo)>
    where
        G: RealModeServices + ?Sized,
        P: FnMut(&ModeInfo) -> bool,
    {
        for mode in self.iter() {
            let info = match vbe::get_mode_info(gw, mode) {
                Ok(info) => info,
                Err(Error::Vbe(err)) => {
                    debug!(
                        mode = format_args!("{mode:#06x}"),
                        status = %err.status,
                        "skipping mode without detail record"
                    );
                    continue;
                }
                Err(err) => {
                    debug!(
                        mode = format_args!("{mode:#06x}"),
                        error = %err,
                        "skipping mode after failed query"
                    );
                    continue;
                }
            };
            if predicate(&info) {
                debug!(mode = format_args!("{mode:#06x}"), "mode accepted");
                return Some((mode, info));
            }
        }
        None
    }
}

impl<'a> IntoIterator for &'a ModeCatalog {
    type Item = u16;
    type IntoIter = core::iter::Copied<core::slice::Iter<'a, u16>>;

    fn into_iter(self) -> Self::IntoIter {
        self.modes.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn stops_at_sentinel() {
        let catalog = ModeCatalog::from_words(&[0x101, 0x103, 0xFFFF, 0x105]);
        assert_eq!(catalog.modes(), &[0x101, 0x103]);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn leading_sentinel_is_empty() {
        assert!(ModeCatalog::from_words(&[0xFFFF, 0x101]).is_empty());
        assert!(ModeCatalog::from_words(&[]).is_empty());
    }

    #[test]
    fn iteration_preserves_order() {
        let catalog = ModeCatalog::from_words(&[0x118, 0x101, 0x115, 0xFFFF]);
        let order: Vec<u16> = (&catalog).into_iter().collect();
        assert_eq!(order, vec![0x118, 0x101, 0x115]);
    }

    proptest! {
        #[test]
        fn catalog_is_the_prefix_before_the_first_sentinel(
            words in proptest::collection::vec(any::<u16>(), 0..64),
        ) {
            let catalog = ModeCatalog::from_words(&words);
            let cut = words.iter().position(|&w| w == MODE_LIST_END).unwrap_or(words.len());
            prop_assert_eq!(catalog.modes(), &words[..cut]);
            prop_assert!(!catalog.modes().contains(&MODE_LIST_END));
        }
    }
}
