use vesa::{
    map_physical_memory, total_memory_bytes, unmap_physical_memory, AccessDescriptor,
    AccessError, AccessStrategy, Error, FlatAccess, MapError, ModeFlags, ScopedAccess,
    VesaContext,
};
use vesa_bios::VbeBios;
use vesa_dpmi::{Dpmi, DpmiError, HostDpmi, HostDpmiConfig};
use vesa_realmode::MemoryBus;

const LFB: u32 = 0xE000_0000;

fn host(config: HostDpmiConfig) -> HostDpmi<VbeBios> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    HostDpmi::new(config, VbeBios::default())
}

#[test]
fn four_blocks_is_256_kib() {
    assert_eq!(total_memory_bytes(4), 262_144);
    let mut dpmi = host(HostDpmiConfig::default());
    let mapping = map_physical_memory(&mut dpmi, LFB, 4).unwrap();
    assert_eq!(mapping.size(), 262_144);
    assert_eq!(mapping.physical(), LFB);
    mapping.release(&mut dpmi).unwrap();
}

#[test]
fn unmap_leaves_nothing_resident() {
    let mut dpmi = host(HostDpmiConfig::default());
    let mapping = map_physical_memory(&mut dpmi, LFB, 64).unwrap();
    let linear = mapping.linear();
    assert_eq!(dpmi.resident_mappings(), 1);

    unmap_physical_memory(&mut dpmi, mapping).unwrap();
    assert_eq!(dpmi.resident_mappings(), 0);
    assert_eq!(
        dpmi.free_physical_address_mapping(linear),
        Err(DpmiError::UnknownMapping(linear))
    );

    let again = map_physical_memory(&mut dpmi, LFB, 64).unwrap();
    assert_eq!(dpmi.resident_mappings(), 1);
    again.release(&mut dpmi).unwrap();
}

#[test]
fn scoped_failure_after_mapping_rolls_back() {
    let mut dpmi = host(HostDpmiConfig {
        ldt_descriptors: 0,
        ..HostDpmiConfig::default()
    });
    let mapping = map_physical_memory(&mut dpmi, LFB, 64).unwrap();
    assert_eq!(dpmi.resident_mappings(), 1);

    let err = ScopedAccess::acquire(&mut dpmi, mapping).unwrap_err();
    assert!(matches!(
        err,
        AccessError::Descriptor(DpmiError::DescriptorsExhausted { requested: 1 })
    ));
    assert_eq!(dpmi.resident_mappings(), 0);
    assert_eq!(dpmi.allocated_descriptors(), 0);
}

#[test]
fn descriptor_limit_is_inclusive() {
    let mut dpmi = host(HostDpmiConfig::default());
    let mapping = map_physical_memory(&mut dpmi, LFB, 4).unwrap();
    let size = mapping.size();
    let scoped = ScopedAccess::acquire(&mut dpmi, mapping).unwrap();
    let sel = scoped.selector();

    dpmi.far_poke_u8(sel, 0, 0x11).unwrap();
    dpmi.far_poke_u8(sel, size - 1, 0x5A).unwrap();
    assert_eq!(dpmi.far_peek_u8(sel, size - 1), Ok(0x5A));
    assert_eq!(dpmi.memory().read_u8(LFB), 0x11);
    assert_eq!(dpmi.memory().read_u8(LFB + size - 1), 0x5A);
    assert!(matches!(
        dpmi.far_peek_u8(sel, size),
        Err(DpmiError::GeneralProtection { offset, limit, .. }) if offset == size && limit == size - 1
    ));

    scoped.release(&mut dpmi).unwrap();
    assert_eq!(dpmi.far_peek_u8(sel, 0), Err(DpmiError::InvalidSelector(sel.0)));
}

#[test]
fn flat_access_enable_disable_enable() {
    let mut dpmi = host(HostDpmiConfig::default());
    let mapping = map_physical_memory(&mut dpmi, LFB, 4).unwrap();

    let flat = FlatAccess::enable(&mut dpmi, mapping).unwrap();
    let ptr = flat.address();
    dpmi.near_poke_u8(ptr + 3, 0xA5).unwrap();
    assert_eq!(dpmi.memory().read_u8(LFB + 3), 0xA5);

    let mapping = flat.disable(&mut dpmi);
    assert!(!dpmi.nearptr_enabled());
    assert_eq!(dpmi.near_peek_u8(ptr), Err(DpmiError::NearPointersDisabled));

    let flat = FlatAccess::enable(&mut dpmi, mapping).unwrap();
    assert_eq!(flat.address(), ptr);
    assert_eq!(dpmi.near_peek_u8(ptr + 3), Ok(0xA5));
    flat.release(&mut dpmi).unwrap();
    assert_eq!(dpmi.resident_mappings(), 0);
}

#[test]
fn flat_access_without_capability_enables_nothing() {
    let mut dpmi = host(HostDpmiConfig {
        nearptr_supported: false,
        ..HostDpmiConfig::default()
    });
    let err = AccessDescriptor::establish(&mut dpmi, AccessStrategy::Flat, LFB, 4).unwrap_err();
    assert_eq!(err, AccessError::NearPointersUnavailable);
    assert!(!dpmi.nearptr_enabled());
    assert_eq!(dpmi.resident_mappings(), 0);
}

#[test]
fn session_holds_one_access_at_a_time() {
    let mut dpmi = host(HostDpmiConfig::default());
    let mut ctx = VesaContext::open(&mut dpmi).unwrap();
    ctx.set_mode(
        &mut dpmi,
        0x112,
        ModeFlags::LINEAR_FRAME_BUFFER | ModeFlags::NO_CLEAR,
    )
    .unwrap();
    assert_eq!(ctx.current_mode(), Some(0x112));
    assert!(dpmi.bios().lfb_enabled());

    let access = ctx.acquire_access(&mut dpmi, AccessStrategy::Flat).unwrap();
    assert_eq!(access.strategy(), AccessStrategy::Flat);
    assert_eq!(access.mapping().size(), 4 << 20);
    assert!(matches!(
        ctx.acquire_access(&mut dpmi, AccessStrategy::Scoped),
        Err(Error::AccessAlreadyActive)
    ));
    assert!(matches!(
        ctx.acquire_access(&mut dpmi, AccessStrategy::Flat),
        Err(Error::AccessAlreadyActive)
    ));
    assert_eq!(dpmi.resident_mappings(), 1);

    ctx.release_access(&mut dpmi).unwrap();
    assert!(!dpmi.nearptr_enabled());
    assert_eq!(dpmi.resident_mappings(), 0);
    assert!(matches!(ctx.release_access(&mut dpmi), Err(Error::NoActiveAccess)));

    let access = ctx.acquire_access(&mut dpmi, AccessStrategy::Scoped).unwrap();
    let AccessDescriptor::Scoped(scoped) = access else {
        panic!("expected scoped access");
    };
    assert_eq!(scoped.limit(), (4 << 20) - 1);
    ctx.release_access(&mut dpmi).unwrap();
    assert_eq!(dpmi.allocated_descriptors(), 0);
}

#[test]
fn session_rejects_mode_without_linear_frame_buffer() {
    let mut dpmi = host(HostDpmiConfig::default());
    let mut ctx = VesaContext::open(&mut dpmi).unwrap();
    ctx.set_mode(&mut dpmi, 0x108, ModeFlags::empty()).unwrap();
    assert!(matches!(
        ctx.acquire_access(&mut dpmi, AccessStrategy::Scoped),
        Err(Error::NoLinearFrameBuffer(0x108))
    ));
    assert_eq!(dpmi.resident_mappings(), 0);
}

#[test]
fn missing_frame_buffer_names_the_searched_mode() {
    let mut dpmi = host(HostDpmiConfig::default());
    let mut ctx = VesaContext::open(&mut dpmi).unwrap();
    let mode = ctx.enumerate_modes(&mut dpmi, |info| !info.has_linear_frame_buffer());
    assert_eq!(mode, Some(0x108));
    assert_eq!(ctx.current_mode(), None);
    assert!(matches!(
        ctx.acquire_access(&mut dpmi, AccessStrategy::Flat),
        Err(Error::NoLinearFrameBuffer(0x108))
    ));
    assert_eq!(dpmi.resident_mappings(), 0);
}

#[test]
fn map_unmap_cycles_do_not_exhaust_address_space() {
    let mut dpmi = host(HostDpmiConfig::default());
    for _ in 0..1024 {
        let mapping = map_physical_memory(&mut dpmi, LFB, 64).unwrap();
        assert_eq!(dpmi.resident_mappings(), 1);
        mapping.release(&mut dpmi).unwrap();
    }
    assert_eq!(dpmi.resident_mappings(), 0);
}

#[test]
fn refused_mapping_surfaces_as_map_error() {
    let mut dpmi = host(HostDpmiConfig {
        refuse_physical_mappings: true,
        ..HostDpmiConfig::default()
    });
    let mut ctx = VesaContext::open(&mut dpmi).unwrap();
    ctx.enumerate_modes(&mut dpmi, |info| info.bits_per_pixel == 32)
        .unwrap();
    let err = ctx.acquire_access(&mut dpmi, AccessStrategy::Scoped).unwrap_err();
    assert!(matches!(
        err,
        Error::Access(AccessError::Map(MapError::Refused(_)))
    ));
    assert!(ctx.access().is_none());
}
