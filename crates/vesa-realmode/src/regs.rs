/// Carry flag bit in [`RealModeRegs::flags`].
pub const FLAG_CF: u16 = 1 << 0;

/// Register image exchanged with real-mode code (the DPMI "real mode call structure").
///
/// The 32-bit registers are stored whole; the 16- and 8-bit views below read and write the
/// corresponding slices without disturbing the other bits.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RealModeRegs {
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub flags: u16,
    pub es: u16,
    pub ds: u16,
    pub fs: u16,
    pub gs: u16,
    pub ip: u16,
    pub cs: u16,
    pub sp: u16,
    pub ss: u16,
}

macro_rules! word_accessors {
    ($($reg:ident: $get:ident / $set:ident),* $(,)?) => {
        $(
            pub fn $get(&self) -> u16 {
                self.$reg as u16
            }

            pub fn $set(&mut self, value: u16) {
                self.$reg = (self.$reg & 0xFFFF_0000) | value as u32;
            }
        )*
    };
}

macro_rules! byte_accessors {
    ($($reg:ident: $lo:ident / $set_lo:ident, $hi:ident / $set_hi:ident),* $(,)?) => {
        $(
            pub fn $lo(&self) -> u8 {
                self.$reg as u8
            }

            pub fn $set_lo(&mut self, value: u8) {
                self.$reg = (self.$reg & 0xFFFF_FF00) | value as u32;
            }

            pub fn $hi(&self) -> u8 {
                (self.$reg >> 8) as u8
            }

            pub fn $set_hi(&mut self, value: u8) {
                self.$reg = (self.$reg & 0xFFFF_00FF) | ((value as u32) << 8);
            }
        )*
    };
}

impl RealModeRegs {
    word_accessors! {
        eax: ax / set_ax,
        ebx: bx / set_bx,
        ecx: cx / set_cx,
        edx: dx / set_dx,
        esi: si / set_si,
        edi: di / set_di,
    }

    byte_accessors! {
        eax: al / set_al, ah / set_ah,
        ebx: bl / set_bl, bh / set_bh,
        ecx: cl / set_cl, ch / set_ch,
        edx: dl / set_dl, dh / set_dh,
    }

    pub fn cf(&self) -> bool {
        self.flags & FLAG_CF != 0
    }

    pub fn set_cf(&mut self, carry: bool) {
        if carry {
            self.flags |= FLAG_CF;
        } else {
            self.flags &= !FLAG_CF;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_views_preserve_neighbouring_bits() {
        let mut regs = RealModeRegs {
            ebx: 0xDEAD_BEEF,
            ..RealModeRegs::default()
        };
        regs.set_bh(0x12);
        assert_eq!(regs.ebx, 0xDEAD_12EF);
        regs.set_bl(0x34);
        assert_eq!(regs.bx(), 0x1234);
        regs.set_bx(0x4F01);
        assert_eq!(regs.ebx, 0xDEAD_4F01);
        assert_eq!((regs.bh(), regs.bl()), (0x4F, 0x01));
    }

    #[test]
    fn carry_flag_toggles() {
        let mut regs = RealModeRegs::default();
        regs.set_cf(true);
        assert!(regs.cf());
        regs.set_cf(false);
        assert!(!regs.cf());
    }
}
