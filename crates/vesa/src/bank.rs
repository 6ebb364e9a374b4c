//! Direct calls into the protected-mode interface.
//!
//! These bypass INT 10h entirely: no status is read back and nothing is logged, since bank
//! switches sit on the hot path of every banked blit.

use vesa_dpmi::{FastPathExecutor, FastPathRegs};

use crate::{pmi::PmiEntry, vbe::Window, EntryPoint};

const SET_DISPLAY_START: u32 = 0x00;
const SET_DISPLAY_START_ON_RETRACE: u32 = 0x80;

/// Moves `window` to bank `number` through the bank switch entry point.
///
/// # Safety
///
/// `entry` must be the bank switch routine of the adapter's own interface block, the adapter must
/// be in a banked mode, and any I/O ports or memory regions the interface lists must be
/// accessible to the caller.
pub unsafe fn set_bank_position<E: FastPathExecutor + ?Sized>(
    exec: &mut E,
    entry: &EntryPoint<'_>,
    window: Window,
    number: u16,
) {
    debug_assert_eq!(entry.kind(), PmiEntry::BankSwitch);
    let mut regs = FastPathRegs {
        ebx: u32::from(window as u8),
        edx: u32::from(number),
        ..FastPathRegs::default()
    };
    exec.call_near(entry.code(), entry.offset(), &mut regs);
}

/// Sets the display start to byte `address` through the display start entry point, optionally
/// waiting for vertical retrace.
///
/// # Safety
///
/// Same requirements as [`set_bank_position`], for the display start routine.
pub unsafe fn set_display_start_address<E: FastPathExecutor + ?Sized>(
    exec: &mut E,
    entry: &EntryPoint<'_>,
    address: u32,
    on_retrace: bool,
) {
    debug_assert_eq!(entry.kind(), PmiEntry::DisplayStart);
    let mut regs = FastPathRegs {
        ebx: if on_retrace {
            SET_DISPLAY_START_ON_RETRACE
        } else {
            SET_DISPLAY_START
        },
        ecx: address & 0xFFFF,
        edx: address >> 16,
        ..FastPathRegs::default()
    };
    exec.call_near(entry.code(), entry.offset(), &mut regs);
}

/// Executes interface routines in place on a 32-bit x86 host with a flat code segment.
#[cfg(target_arch = "x86")]
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeExecutor;

#[cfg(target_arch = "x86")]
impl FastPathExecutor for NativeExecutor {
    unsafe fn call_near(&mut self, code: &[u8], entry: usize, regs: &mut FastPathRegs) {
        use core::arch::asm;

        let target = code.as_ptr().add(entry);
        // EBX and ESI are reserved by LLVM; EBX is loaded from EAX inside the block.
        asm!(
            "push esi",
            "push ebx",
            "mov ebx, eax",
            "call edi",
            "pop ebx",
            "pop esi",
            inout("eax") regs.ebx => regs.eax,
            inout("ecx") regs.ecx,
            inout("edx") regs.edx,
            inout("edi") target => _,
        );
    }
}
