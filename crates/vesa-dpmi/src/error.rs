use thiserror::Error;

pub type Result<T> = std::result::Result<T, DpmiError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DpmiError {
    #[error("physical range 0x{physical:08x}+0x{size:x} is outside the mappable address space")]
    MappingOutOfRange { physical: u32, size: u32 },

    #[error(
        "physical range 0x{physical:08x}+0x{size:x} overlaps an existing mapping at 0x{existing:08x}"
    )]
    MappingOverlap {
        physical: u32,
        size: u32,
        existing: u32,
    },

    #[error("host refused to map physical range 0x{physical:08x}+0x{size:x}")]
    MappingRefused { physical: u32, size: u32 },

    #[error("no physical mapping at linear address 0x{0:08x}")]
    UnknownMapping(u32),

    #[error("no free LDT descriptors (requested {requested})")]
    DescriptorsExhausted { requested: u16 },

    #[error("invalid selector 0x{0:04x}")]
    InvalidSelector(u16),

    #[error("host refused to program descriptor 0x{0:04x}")]
    DescriptorSetupRefused(u16),

    #[error("general protection fault: selector 0x{selector:04x} offset 0x{offset:x} exceeds limit 0x{limit:x}")]
    GeneralProtection {
        selector: u16,
        offset: u32,
        limit: u32,
    },

    #[error("page fault at linear address 0x{0:08x}")]
    PageFault(u32),

    #[error("near pointer access is disabled")]
    NearPointersDisabled,
}
