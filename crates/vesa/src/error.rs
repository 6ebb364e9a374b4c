use thiserror::Error;
use vesa_dpmi::DpmiError;

use crate::{AccessError, MapError, PmiError, VbeError};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Vbe(#[from] VbeError),

    #[error("DPMI host error: {0}")]
    Dpmi(#[from] DpmiError),

    #[error("controller info signature {0:?} is not \"VESA\"")]
    BadSignature([u8; 4]),

    #[error(transparent)]
    Map(#[from] MapError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Pmi(#[from] PmiError),

    #[error("a frame buffer access descriptor is already active")]
    AccessAlreadyActive,

    #[error("no frame buffer access descriptor is active")]
    NoActiveAccess,

    #[error("mode 0x{0:04x} has no linear frame buffer")]
    NoLinearFrameBuffer(u16),

    #[error("transfer buffer holds {available} bytes but {required} are needed")]
    TransferBufferTooSmall { required: usize, available: usize },

    #[error("no valid PMID block in the video BIOS image")]
    PmidNotFound,
}
