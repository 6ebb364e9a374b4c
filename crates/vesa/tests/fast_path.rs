use vesa::{
    set_display_start_address, vbe, Error, FastPathInterface, ModeFlags, PmiEntry,
    VbeError, VbeFunction, VbeStatus, VesaContext, VideoBiosImage, Window,
};
use vesa_bios::{
    default_pmi_table, FastPathCall, VbeBios, VbeBiosConfig, PMID_OFFSET, VIDEO_ROM_BASE,
};
use vesa_dpmi::{HostDpmi, HostDpmiConfig};
use vesa_realmode::MemoryBus;

fn host(config: VbeBiosConfig) -> HostDpmi<VbeBios> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    HostDpmi::new(HostDpmiConfig::default(), VbeBios::new(config))
}

fn interface_with_header(len: usize, offsets: [u16; 3]) -> Vec<u8> {
    let mut code = vec![0xC3u8; len];
    for (i, off) in offsets.iter().chain(&[0u16]).enumerate() {
        code[i * 2..i * 2 + 2].copy_from_slice(&off.to_le_bytes());
    }
    code
}

#[test]
fn loaded_interface_is_a_private_copy() {
    let mut dpmi = host(VbeBiosConfig::default());
    let iface = FastPathInterface::load(&mut dpmi).unwrap();
    assert_eq!(iface.code(), Some(default_pmi_table().as_slice()));
    assert_eq!(iface.io_ports(), &[0x03CE, 0x03CF]);
    assert!(iface.memory_regions().is_empty());

    let header = iface.header().unwrap();
    assert_eq!(
        (header.bank_switch, header.display_start, header.palette_data),
        (0x10, 0x20, 0x30)
    );
    let rom_copy = iface.code().unwrap().as_ptr() as usize;
    assert_eq!(iface.bank_switch().unwrap().code().as_ptr() as usize, rom_copy);
}

#[test]
fn entry_points_resolve_to_header_offsets() {
    let mut dpmi = host(VbeBiosConfig {
        protected_mode_interface: Some(interface_with_header(4096, [0x10, 0x40, 0x80])),
        ..VbeBiosConfig::default()
    });
    let iface = FastPathInterface::load(&mut dpmi).unwrap();
    let code = iface.code().unwrap();
    assert_eq!(code.len(), 4096);

    let entries = [
        (iface.bank_switch().unwrap(), PmiEntry::BankSwitch, 0x10),
        (iface.display_start().unwrap(), PmiEntry::DisplayStart, 0x40),
        (iface.palette_data().unwrap(), PmiEntry::PaletteData, 0x80),
    ];
    for (entry, kind, offset) in entries {
        assert_eq!(entry.kind(), kind);
        assert_eq!(entry.offset(), offset);
        assert!(entry.offset() < code.len());
        assert_eq!(entry.code().as_ptr(), code.as_ptr());
    }
}

#[test]
fn missing_interface_is_not_supported() {
    let mut dpmi = host(VbeBiosConfig {
        protected_mode_interface: None,
        ..VbeBiosConfig::default()
    });
    let err = FastPathInterface::load(&mut dpmi).unwrap_err();
    assert!(matches!(
        err,
        Error::Vbe(VbeError {
            function: VbeFunction::ProtectedModeInterface,
            status: VbeStatus::NotSupported,
        })
    ));
    assert_eq!(
        err.to_string(),
        "VESA function \"VBE_PROTECTED_MODE_INTERFACE\" is not supported"
    );
}

#[test]
fn destroying_twice_is_harmless() {
    let mut dpmi = host(VbeBiosConfig::default());
    let mut ctx = VesaContext::open(&mut dpmi).unwrap();
    ctx.load_fast_path(&mut dpmi).unwrap();
    assert!(ctx.fast_path().is_live());

    ctx.destroy_fast_path();
    assert!(!ctx.fast_path().is_live());
    assert!(ctx.fast_path().bank_switch().is_none());
    assert!(ctx.fast_path().display_start().is_none());
    assert!(ctx.fast_path().palette_data().is_none());
    ctx.destroy_fast_path();
    assert!(!ctx.fast_path().is_live());
}

#[test]
fn bank_switch_bypasses_int10() {
    let mut dpmi = host(VbeBiosConfig::default());
    let mut ctx = VesaContext::open(&mut dpmi).unwrap();
    ctx.set_mode(&mut dpmi, 0x101, ModeFlags::empty()).unwrap();
    ctx.load_fast_path(&mut dpmi).unwrap();
    let interrupts = dpmi.interrupts().len();

    unsafe { ctx.set_bank_position(&mut dpmi, Window::A, 3) };

    assert_eq!(dpmi.interrupts().len(), interrupts);
    assert_eq!(dpmi.fast_path_calls(), 1);
    assert_eq!(dpmi.bios().bank_position(0), Some(3));
    assert_eq!(
        dpmi.bios().fast_path_calls(),
        &[FastPathCall::BankSwitch { window: 0, bank: 3 }]
    );
    assert_eq!(vbe::get_bank_position(&mut dpmi, Window::A).unwrap(), 3);
}

#[test]
fn display_start_through_interface() {
    let mut dpmi = host(VbeBiosConfig::default());
    let iface = FastPathInterface::load(&mut dpmi).unwrap();
    let entry = iface.display_start().unwrap();
    unsafe { set_display_start_address(&mut dpmi, &entry, 0x0004_B000, false) };
    assert_eq!(dpmi.bios().display_start_address(), 0x0004_B000);
}

#[test]
#[should_panic(expected = "without a loaded protected-mode interface")]
fn bank_switch_without_interface_panics() {
    let mut dpmi = host(VbeBiosConfig::default());
    let ctx = VesaContext::open(&mut dpmi).unwrap();
    unsafe { ctx.set_bank_position(&mut dpmi, Window::A, 1) };
}

#[test]
fn pmid_block_is_found_in_rom() {
    let mut dpmi = host(VbeBiosConfig::default());
    let mut ctx = VesaContext::open(&mut dpmi).unwrap();
    let image = ctx.load_video_bios_image(&dpmi).unwrap();
    assert_eq!(image.pmid_offset(), PMID_OFFSET);
    assert_eq!(image.info().entry_point, 0x0180);
    assert_eq!(&image.image()[..2], &[0x55, 0xAA]);
    ctx.destroy_video_bios_image();
    assert!(ctx.video_bios_image().is_none());
}

#[test]
fn corrupted_pmid_block_is_rejected() {
    let mut dpmi = host(VbeBiosConfig::default());
    let at = VIDEO_ROM_BASE + PMID_OFFSET as u32 + 4;
    let byte = dpmi.memory().read_u8(at);
    dpmi.memory_mut().write_u8(at, byte ^ 0x40);
    assert!(matches!(
        VideoBiosImage::load(&dpmi),
        Err(Error::PmidNotFound)
    ));

    let mut dpmi = host(VbeBiosConfig {
        pmid: false,
        ..VbeBiosConfig::default()
    });
    let mut ctx = VesaContext::open(&mut dpmi).unwrap();
    assert!(matches!(
        ctx.load_video_bios_image(&dpmi),
        Err(Error::PmidNotFound)
    ));
}
