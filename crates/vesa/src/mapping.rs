//! Physical-to-linear mapping of the frame buffer.

use thiserror::Error;
use tracing::{debug, warn};
use vesa_dpmi::{Dpmi, DpmiError};

/// VBE reports video memory in 64 KiB blocks.
const MEMORY_BLOCK_SHIFT: u32 = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    #[error("controller reports no video memory")]
    Empty,

    #[error("physical range 0x{physical:08x}+0x{size:x} is already mapped")]
    AlreadyMapped { physical: u32, size: u32 },

    #[error("physical range 0x{physical:08x}+0x{size:x} is beyond addressable limits")]
    OutOfRange { physical: u32, size: u32 },

    #[error("host refused the mapping")]
    Refused(#[source] DpmiError),

    #[error("failed to release mapping at 0x{linear:08x}")]
    Release {
        linear: u32,
        #[source]
        source: DpmiError,
    },
}

/// Bytes of video memory for a controller reporting `blocks` 64 KiB blocks.
pub const fn total_memory_bytes(blocks: u16) -> u32 {
    (blocks as u32) << MEMORY_BLOCK_SHIFT
}

/// A live mapping of physical video memory. Release it with [`MemoryMapping::release`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a mapping must be released with `MemoryMapping::release`"]
pub struct MemoryMapping {
    physical: u32,
    size: u32,
    linear: u32,
}

impl MemoryMapping {
    pub fn physical(&self) -> u32 {
        self.physical
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Linear address of the first mapped byte.
    pub fn linear(&self) -> u32 {
        self.linear
    }

    /// Returns the mapping to the host.
    pub fn release<D: Dpmi + ?Sized>(self, dpmi: &mut D) -> Result<(), MapError> {
        let linear = self.linear;
        dpmi.free_physical_address_mapping(linear).map_err(|source| {
            warn!(linear = format_args!("{linear:#010x}"), %source, "unmap failed");
            MapError::Release { linear, source }
        })?;
        debug!(linear = format_args!("{linear:#010x}"), "frame buffer unmapped");
        Ok(())
    }
}

/// Maps `blocks` × 64 KiB of physical memory starting at `physical`.
pub fn map_physical_memory<D: Dpmi + ?Sized>(
    dpmi: &mut D,
    physical: u32,
    blocks: u16,
) -> Result<MemoryMapping, MapError> {
    let size = total_memory_bytes(blocks);
    if size == 0 {
        return Err(MapError::Empty);
    }
    let linear = dpmi
        .physical_address_mapping(physical, size)
        .map_err(|err| {
            warn!(
                physical = format_args!("{physical:#010x}"),
                size,
                %err,
                "frame buffer mapping failed"
            );
            match err {
                DpmiError::MappingOverlap { .. } => MapError::AlreadyMapped { physical, size },
                DpmiError::MappingOutOfRange { .. } => MapError::OutOfRange { physical, size },
                other => MapError::Refused(other),
            }
        })?;
    debug!(
        physical = format_args!("{physical:#010x}"),
        size,
        linear = format_args!("{linear:#010x}"),
        "frame buffer mapped"
    );
    Ok(MemoryMapping {
        physical,
        size,
        linear,
    })
}

/// Releases `mapping`; equivalent to [`MemoryMapping::release`].
pub fn unmap_physical_memory<D: Dpmi + ?Sized>(
    dpmi: &mut D,
    mapping: MemoryMapping,
) -> Result<(), MapError> {
    mapping.release(dpmi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesa_bios::VbeBios;
    use vesa_dpmi::{HostDpmi, HostDpmiConfig};

    fn host(config: HostDpmiConfig) -> HostDpmi<VbeBios> {
        HostDpmi::new(config, VbeBios::default())
    }

    #[test]
    fn size_is_blocks_times_64k() {
        assert_eq!(total_memory_bytes(4), 262_144);
        assert_eq!(total_memory_bytes(0), 0);
        assert_eq!(total_memory_bytes(u16::MAX), 0xFFFF_0000);
    }

    #[test]
    fn overlapping_map_is_already_mapped() {
        let mut dpmi = host(HostDpmiConfig::default());
        let first = map_physical_memory(&mut dpmi, 0xE000_0000, 4).unwrap();
        let err = map_physical_memory(&mut dpmi, 0xE002_0000, 4).unwrap_err();
        assert_eq!(
            err,
            MapError::AlreadyMapped {
                physical: 0xE002_0000,
                size: 0x4_0000
            }
        );
        first.release(&mut dpmi).unwrap();
    }

    #[test]
    fn failure_causes_are_distinguished() {
        let mut dpmi = host(HostDpmiConfig::default());
        assert_eq!(
            map_physical_memory(&mut dpmi, 0xE000_0000, 0),
            Err(MapError::Empty)
        );
        assert!(matches!(
            map_physical_memory(&mut dpmi, 0xFFFF_0000, 2),
            Err(MapError::OutOfRange { .. })
        ));

        let mut refusing = host(HostDpmiConfig {
            refuse_physical_mappings: true,
            ..HostDpmiConfig::default()
        });
        assert!(matches!(
            map_physical_memory(&mut refusing, 0xE000_0000, 1),
            Err(MapError::Refused(DpmiError::MappingRefused { .. }))
        ));
        assert_eq!(refusing.resident_mappings(), 0);
    }
}
