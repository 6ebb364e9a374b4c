//! Making a mapped frame buffer reachable from ordinary pointers.
//!
//! Two mutually exclusive forms exist. [`FlatAccess`] turns on the host's near-pointer mode so
//! the data segment spans the whole linear address space; it is global and must be turned off
//! again. [`ScopedAccess`] allocates one LDT descriptor covering exactly the mapping. Both own
//! the [`MemoryMapping`] they were built from and hand it back (or release it) on teardown, so
//! the descriptor is always gone before the mapping is.

use thiserror::Error;
use tracing::{debug, warn};
use vesa_dpmi::{Dpmi, DpmiError, Selector};

use crate::mapping::{map_physical_memory, MapError, MemoryMapping};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("host does not support near pointers")]
    NearPointersUnavailable,

    #[error("host refused to enable near pointers")]
    NearPointersRefused,

    #[error("frame buffer descriptor setup failed")]
    Descriptor(#[source] DpmiError),

    #[error(transparent)]
    Map(#[from] MapError),
}

fn roll_back<D: Dpmi + ?Sized>(dpmi: &mut D, mapping: MemoryMapping) {
    if let Err(err) = mapping.release(dpmi) {
        warn!(%err, "rollback of frame buffer mapping failed");
    }
}

/// Near-pointer access to a mapping.
#[derive(Debug)]
#[must_use = "near pointers stay enabled until `FlatAccess::disable` is called"]
pub struct FlatAccess {
    mapping: MemoryMapping,
    address: u32,
}

impl FlatAccess {
    /// Enables near pointers. On failure nothing is enabled and the mapping is handed back.
    pub fn enable<D: Dpmi + ?Sized>(
        dpmi: &mut D,
        mapping: MemoryMapping,
    ) -> Result<Self, (AccessError, MemoryMapping)> {
        if !dpmi.nearptr_supported() {
            debug!("near pointers unsupported by host");
            return Err((AccessError::NearPointersUnavailable, mapping));
        }
        if !dpmi.nearptr_enable() {
            warn!("host refused to enable near pointers");
            return Err((AccessError::NearPointersRefused, mapping));
        }
        let address = mapping.linear().wrapping_add(dpmi.conventional_base());
        debug!(
            linear = format_args!("{:#010x}", mapping.linear()),
            address = format_args!("{address:#010x}"),
            "flat frame buffer access enabled"
        );
        Ok(Self { mapping, address })
    }

    /// Near pointer to the first byte of the frame buffer.
    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn mapping(&self) -> &MemoryMapping {
        &self.mapping
    }

    /// Disables near pointers and returns the still-live mapping.
    pub fn disable<D: Dpmi + ?Sized>(self, dpmi: &mut D) -> MemoryMapping {
        dpmi.nearptr_disable();
        debug!("flat frame buffer access disabled");
        self.mapping
    }

    /// Disables near pointers and unmaps.
    pub fn release<D: Dpmi + ?Sized>(self, dpmi: &mut D) -> Result<(), AccessError> {
        self.disable(dpmi).release(dpmi)?;
        Ok(())
    }
}

/// An LDT descriptor whose base and limit cover exactly one mapping.
#[derive(Debug)]
#[must_use = "the descriptor and mapping leak unless `ScopedAccess::release` is called"]
pub struct ScopedAccess {
    mapping: MemoryMapping,
    selector: Selector,
}

impl ScopedAccess {
    /// Allocates and programs the descriptor. On failure the mapping is released before
    /// returning.
    pub fn acquire<D: Dpmi + ?Sized>(
        dpmi: &mut D,
        mapping: MemoryMapping,
    ) -> Result<Self, AccessError> {
        let selector = match dpmi.allocate_ldt_descriptors(1) {
            Ok(selector) => selector,
            Err(err) => {
                warn!(%err, "no descriptor for frame buffer");
                roll_back(dpmi, mapping);
                return Err(AccessError::Descriptor(err));
            }
        };

        let limit = mapping.size().saturating_sub(1);
        let programmed = dpmi
            .set_segment_base_address(selector, mapping.linear())
            .and_then(|()| dpmi.set_segment_limit(selector, limit));
        if let Err(err) = programmed {
            warn!(%selector, %err, "frame buffer descriptor setup failed");
            if let Err(free_err) = dpmi.free_ldt_descriptor(selector) {
                warn!(%selector, err = %free_err, "descriptor free failed");
            }
            roll_back(dpmi, mapping);
            return Err(AccessError::Descriptor(err));
        }

        debug!(
            %selector,
            base = format_args!("{:#010x}", mapping.linear()),
            limit = format_args!("{limit:#x}"),
            "frame buffer descriptor allocated"
        );
        Ok(Self { mapping, selector })
    }

    pub fn selector(&self) -> Selector {
        self.selector
    }

    /// Last valid offset through [`ScopedAccess::selector`].
    pub fn limit(&self) -> u32 {
        self.mapping.size().saturating_sub(1)
    }

    pub fn mapping(&self) -> &MemoryMapping {
        &self.mapping
    }

    /// Frees the descriptor, then the mapping. Both are attempted even if the first fails.
    pub fn release<D: Dpmi + ?Sized>(self, dpmi: &mut D) -> Result<(), AccessError> {
        let freed = dpmi.free_ldt_descriptor(self.selector);
        if let Err(err) = &freed {
            warn!(selector = %self.selector, %err, "descriptor free failed");
        }
        let unmapped = self.mapping.release(dpmi);
        freed.map_err(AccessError::Descriptor)?;
        unmapped?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessStrategy {
    Flat,
    Scoped,
}

/// The access form a session currently holds.
#[derive(Debug)]
#[must_use = "access must be released with `AccessDescriptor::release`"]
pub enum AccessDescriptor {
    Flat(FlatAccess),
    Scoped(ScopedAccess),
}

impl AccessDescriptor {
    /// Maps `blocks` × 64 KiB at `physical` and makes it reachable using `strategy`. Nothing is
    /// left mapped on failure.
    pub fn establish<D: Dpmi + ?Sized>(
        dpmi: &mut D,
        strategy: AccessStrategy,
        physical: u32,
        blocks: u16,
    ) -> Result<Self, AccessError> {
        let mapping = map_physical_memory(dpmi, physical, blocks)?;
        match strategy {
            AccessStrategy::Flat => match FlatAccess::enable(dpmi, mapping) {
                Ok(flat) => Ok(Self::Flat(flat)),
                Err((err, mapping)) => {
                    roll_back(dpmi, mapping);
                    Err(err)
                }
            },
            AccessStrategy::Scoped => ScopedAccess::acquire(dpmi, mapping).map(Self::Scoped),
        }
    }

    pub fn strategy(&self) -> AccessStrategy {
        match self {
            Self::Flat(_) => AccessStrategy::Flat,
            Self::Scoped(_) => AccessStrategy::Scoped,
        }
    }

    pub fn mapping(&self) -> &MemoryMapping {
        match self {
            Self::Flat(flat) => flat.mapping(),
            Self::Scoped(scoped) => scoped.mapping(),
        }
    }

    pub fn release<D: Dpmi + ?Sized>(self, dpmi: &mut D) -> Result<(), AccessError> {
        match self {
            Self::Flat(flat) => flat.release(dpmi),
            Self::Scoped(scoped) => scoped.release(dpmi),
        }
    }
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
    fn flat_address_is_rebased_linear() {
        let mut dpmi = host(HostDpmiConfig::default());
        let mapping = map_physical_memory(&mut dpmi, 0xE000_0000, 4).unwrap();
        let linear = mapping.linear();
        let flat = FlatAccess::enable(&mut dpmi, mapping).unwrap();
        assert_eq!(flat.address(), linear.wrapping_sub(0x0040_0000));
        assert!(dpmi.nearptr_enabled());
        flat.release(&mut dpmi).unwrap();
        assert!(!dpmi.nearptr_enabled());
        assert_eq!(dpmi.resident_mappings(), 0);
    }

    #[test]
    fn flat_without_capability_returns_mapping() {
        let mut dpmi = host(HostDpmiConfig {
            nearptr_supported: false,
            ..HostDpmiConfig::default()
        });
        let mapping = map_physical_memory(&mut dpmi, 0xE000_0000, 4).unwrap();
        let (err, mapping) = FlatAccess::enable(&mut dpmi, mapping).unwrap_err();
        assert_eq!(err, AccessError::NearPointersUnavailable);
        assert!(!dpmi.nearptr_enabled());
        mapping.release(&mut dpmi).unwrap();
    }

    #[test]
    fn scoped_descriptor_covers_mapping() {
        let mut dpmi = host(HostDpmiConfig::default());
        let mapping = map_physical_memory(&mut dpmi, 0xE000_0000, 4).unwrap();
        let linear = mapping.linear();
        let scoped = ScopedAccess::acquire(&mut dpmi, mapping).unwrap();
        assert_eq!(dpmi.descriptor(scoped.selector()), Some((linear, 0x3_FFFF)));
        assert_eq!(scoped.limit(), 0x3_FFFF);

        scoped.release(&mut dpmi).unwrap();
        assert_eq!(dpmi.allocated_descriptors(), 0);
        assert_eq!(dpmi.resident_mappings(), 0);
    }

    #[test]
    fn establish_flat_failure_unmaps() {
        let mut dpmi = host(HostDpmiConfig {
            nearptr_supported: false,
            ..HostDpmiConfig::default()
        });
        let err =
            AccessDescriptor::establish(&mut dpmi, AccessStrategy::Flat, 0xE000_0000, 4)
                .unwrap_err();
        assert_eq!(err, AccessError::NearPointersUnavailable);
        assert_eq!(dpmi.resident_mappings(), 0);
    }

    #[test]
    fn establish_reports_map_failure() {
        let mut dpmi = host(HostDpmiConfig {
            refuse_physical_mappings: true,
            ..HostDpmiConfig::default()
        });
        let err =
            AccessDescriptor::establish(&mut dpmi, AccessStrategy::Scoped, 0xE000_0000, 4)
                .unwrap_err();
        assert!(matches!(err, AccessError::Map(MapError::Refused(_))));
        assert_eq!(dpmi.allocated_descriptors(), 0);
    }

    #[test]
    fn descriptor_programming_failure_frees_descriptor_and_mapping() {
        let mut dpmi = host(HostDpmiConfig {
            refuse_descriptor_setup: true,
            ..HostDpmiConfig::default()
        });
        let mapping = map_physical_memory(&mut dpmi, 0xE000_0000, 4).unwrap();
        let err = ScopedAccess::acquire(&mut dpmi, mapping).unwrap_err();
        assert!(matches!(
            err,
            AccessError::Descriptor(DpmiError::DescriptorSetupRefused(_))
        ));
        assert_eq!(dpmi.allocated_descriptors(), 0);
        assert_eq!(dpmi.resident_mappings(), 0);

        let err =
            AccessDescriptor::establish(&mut dpmi, AccessStrategy::Scoped, 0xE000_0000, 4)
                .unwrap_err();
        assert!(matches!(err, AccessError::Descriptor(_)));
        assert_eq!(dpmi.allocated_descriptors(), 0);
        assert_eq!(dpmi.resident_mappings(), 0);
    }
}
