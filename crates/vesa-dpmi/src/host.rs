use std::collections::BTreeMap;

use tracing::{debug, trace, warn};
use vesa_realmode::{MemoryBus, PhysicalMemory, RealModeRegs};

use crate::{
    Dpmi, DpmiError, FastPathExecutor, FastPathRegs, RealModeServices, Result, Selector,
    TransferBuffer,
};

/// Linear addresses below this are identity-mapped to conventional memory (plus the HMA).
const CONVENTIONAL_LIMIT: u32 = 0x0011_0000;
/// DPMI 0800h only maps memory above 1 MiB.
const MIN_MAPPABLE_PHYSICAL: u32 = 0x0010_0000;
const LINEAR_ALIGN: u32 = 0x1000;
/// First LDT index handed out; selectors are `(index << 3) | TI | RPL3`.
const FIRST_LDT_INDEX: u16 = 0x14;

/// Real-mode firmware plugged into a [`HostDpmi`].
pub trait RealModeBios {
    /// Called once when the host is created to lay out ROM and data areas.
    fn post(&mut self, memory: &mut dyn MemoryBus);

    /// Services interrupt `vector`. Returns `false` if the BIOS has no handler for it, in which
    /// case the registers must be left untouched.
    fn handle_interrupt(
        &mut self,
        vector: u8,
        regs: &mut RealModeRegs,
        memory: &mut dyn MemoryBus,
    ) -> bool;

    /// Services a near call into a copy of the BIOS's protected-mode interface block. Returns
    /// `false` if `entry` is not one of its routines.
    fn protected_mode_call(&mut self, code: &[u8], entry: usize, regs: &mut FastPathRegs) -> bool {
        let _ = (code, entry, regs);
        false
    }
}

#[derive(Clone, Debug)]
pub struct HostDpmiConfig {
    pub transfer_buffer: TransferBuffer,
    /// Mirrors the runtime's "near pointers allowed" startup flag.
    pub nearptr_supported: bool,
    /// Linear base of the program's data segment; near pointers are `linear - ds_base`.
    pub ds_base: u32,
    /// Number of LDT descriptors available to the program.
    pub ldt_descriptors: usize,
    /// Linear address at which physical mappings start being placed.
    pub linear_window_base: u32,
    /// Refuse every physical mapping request, as hosts without 0800h support do.
    pub refuse_physical_mappings: bool,
    /// Fail DPMI 0007h/0008h on otherwise valid selectors.
    pub refuse_descriptor_setup: bool,
}

impl Default for HostDpmiConfig {
    fn default() -> Self {
        Self {
            transfer_buffer: TransferBuffer {
                addr: 0x0002_0000,
                len: 0x4000,
            },
            nearptr_supported: true,
            ds_base: 0x0040_0000,
            ldt_descriptors: 16,
            linear_window_base: 0x8000_0000,
            refuse_physical_mappings: false,
            refuse_descriptor_setup: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PhysicalMapping {
    physical: u32,
    size: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Descriptor {
    base: u32,
    limit: u32,
}

/// One serviced real-mode interrupt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterruptRecord {
    pub vector: u8,
    /// AX on entry.
    pub ax: u16,
}

/// In-process DPMI host.
///
/// Conventional memory is identity-mapped, physical mappings are placed first-fit in a linear
/// window above `linear_window_base`, and descriptors live in a bounded table. Accessors such as
/// [`HostDpmi::far_peek_u8`] go through the same translation a program would, so limit and
/// lifetime mistakes surface as [`DpmiError`]s instead of silent corruption.
pub struct HostDpmi<B> {
    config: HostDpmiConfig,
    memory: PhysicalMemory,
    bios: B,
    mappings: BTreeMap<u32, PhysicalMapping>,
    descriptors: BTreeMap<u16, Descriptor>,
    nearptr_enabled: bool,
    interrupts: Vec<InterruptRecord>,
    fast_path_calls: usize,
}

impl<B: RealModeBios> HostDpmi<B> {
    pub fn new(config: HostDpmiConfig, mut bios: B) -> Self {
        let mut memory = PhysicalMemory::new();
        bios.post(&mut memory);
        Self {
            config,
            memory,
            bios,
            mappings: BTreeMap::new(),
            descriptors: BTreeMap::new(),
            nearptr_enabled: false,
            interrupts: Vec::new(),
            fast_path_calls: 0,
        }
    }
}

impl<B> HostDpmi<B> {
    pub fn config(&self) -> &HostDpmiConfig {
        &self.config
    }

    pub fn bios(&self) -> &B {
        &self.bios
    }

    pub fn bios_mut(&mut self) -> &mut B {
        &mut self.bios
    }

    pub fn memory(&self) -> &PhysicalMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut PhysicalMemory {
        &mut self.memory
    }

    pub fn resident_mappings(&self) -> usize {
        self.mappings.len()
    }

    pub fn allocated_descriptors(&self) -> usize {
        self.descriptors.len()
    }

    /// `(base, limit)` of an allocated descriptor.
    pub fn descriptor(&self, selector: Selector) -> Option<(u32, u32)> {
        self.descriptors
            .get(&selector.0)
            .map(|d| (d.base, d.limit))
    }

    pub fn nearptr_enabled(&self) -> bool {
        self.nearptr_enabled
    }

    pub fn interrupts(&self) -> &[InterruptRecord] {
        &self.interrupts
    }

    pub fn fast_path_calls(&self) -> usize {
        self.fast_path_calls
    }

    /// Translates a linear address to physical, as the paging unit would.
    pub fn translate(&self, linear: u32) -> Result<u32> {
        if linear < CONVENTIONAL_LIMIT {
            return Ok(linear);
        }
        let (&start, m) = self
            .mappings
            .range(..=linear)
            .next_back()
            .ok_or(DpmiError::PageFault(linear))?;
        let delta = linear - start;
        if delta < m.size {
            Ok(m.physical + delta)
        } else {
            Err(DpmiError::PageFault(linear))
        }
    }

    fn far_linear(&self, selector: Selector, offset: u32) -> Result<u32> {
        let d = self
            .descriptors
            .get(&selector.0)
            .ok_or(DpmiError::InvalidSelector(selector.0))?;
        if offset > d.limit {
            return Err(DpmiError::GeneralProtection {
                selector: selector.0,
                offset,
                limit: d.limit,
            });
        }
        Ok(d.base.wrapping_add(offset))
    }

    /// Reads a byte through `selector:offset`.
    pub fn far_peek_u8(&self, selector: Selector, offset: u32) -> Result<u8> {
        let phys = self.translate(self.far_linear(selector, offset)?)?;
        Ok(self.memory.read_u8(phys))
    }

    /// Writes a byte through `selector:offset`.
    pub fn far_poke_u8(&mut self, selector: Selector, offset: u32, value: u8) -> Result<()> {
        let phys = self.translate(self.far_linear(selector, offset)?)?;
        self.memory.write_u8(phys, value);
        Ok(())
    }

    fn near_linear(&self, addr: u32) -> Result<u32> {
        if !self.nearptr_enabled {
            return Err(DpmiError::NearPointersDisabled);
        }
        Ok(addr.wrapping_add(self.config.ds_base))
    }

    /// Reads a byte through a near pointer. Requires near pointers to be enabled.
    pub fn near_peek_u8(&self, addr: u32) -> Result<u8> {
        let phys = self.translate(self.near_linear(addr)?)?;
        Ok(self.memory.read_u8(phys))
    }

    /// Writes a byte through a near pointer. Requires near pointers to be enabled.
    pub fn near_poke_u8(&mut self, addr: u32, value: u8) -> Result<()> {
        let phys = self.translate(self.near_linear(addr)?)?;
        self.memory.write_u8(phys, value);
        Ok(())
    }
}

impl<B: RealModeBios> RealModeServices for HostDpmi<B> {
    fn simulate_interrupt(&mut self, vector: u8, regs: &mut RealModeRegs) -> Result<()> {
        self.interrupts.push(InterruptRecord {
            vector,
            ax: regs.ax(),
        });
        if !self.bios.handle_interrupt(vector, regs, &mut self.memory) {
            trace!(vector, ax = regs.ax(), "no BIOS handler; registers unchanged");
        }
        Ok(())
    }

    fn dos_mem_get(&self, addr: u32, buf: &mut [u8]) {
        self.memory.read_bytes(addr, buf);
    }

    fn dos_mem_put(&mut self, addr: u32, buf: &[u8]) {
        self.memory.write_bytes(addr, buf);
    }

    fn transfer_buffer(&self) -> TransferBuffer {
        self.config.transfer_buffer
    }
}

impl<B: RealModeBios> Dpmi for HostDpmi<B> {
    fn physical_address_mapping(&mut self, physical: u32, size: u32) -> Result<u32> {
        let end = u64::from(physical) + u64::from(size);
        if size == 0 || physical < MIN_MAPPABLE_PHYSICAL || end > 1 << 32 {
            return Err(DpmiError::MappingOutOfRange { physical, size });
        }
        if self.config.refuse_physical_mappings {
            return Err(DpmiError::MappingRefused { physical, size });
        }
        if let Some(existing) = self.mappings.values().find(|m| {
            let m_end = u64::from(m.physical) + u64::from(m.size);
            u64::from(physical) < m_end && u64::from(m.physical) < end
        }) {
            return Err(DpmiError::MappingOverlap {
                physical,
                size,
                existing: existing.physical,
            });
        }

        let linear = self
            .free_linear_range(size)
            .ok_or(DpmiError::MappingRefused { physical, size })?;
        self.mappings
            .insert(linear, PhysicalMapping { physical, size });
        debug!(
            physical = format_args!("{physical:#010x}"),
            size,
            linear = format_args!("{linear:#010x}"),
            "mapped physical range"
        );
        Ok(linear)
    }

    fn free_physical_address_mapping(&mut self, linear: u32) -> Result<()> {
        match self.mappings.remove(&linear) {
            Some(m) => {
                debug!(
                    physical = format_args!("{:#010x}", m.physical),
                    linear = format_args!("{linear:#010x}"),
                    "unmapped physical range"
                );
                Ok(())
            }
            None => {
                warn!(linear = format_args!("{linear:#010x}"), "free of unknown mapping");
                Err(DpmiError::UnknownMapping(linear))
            }
        }
    }

    fn allocate_ldt_descriptors(&mut self, count: u16) -> Result<Selector> {
        let count_usize = usize::from(count);
        if count == 0 || self.descriptors.len() + count_usize > self.config.ldt_descriptors {
            return Err(DpmiError::DescriptorsExhausted { requested: count });
        }
        // Find `count` consecutive free indices.
        let limit = FIRST_LDT_INDEX as usize + self.config.ldt_descriptors;
        let mut start = FIRST_LDT_INDEX as usize;
        while start + count_usize <= limit {
            let clash = (start..start + count_usize)
                .find(|&i| self.descriptors.contains_key(&selector_for(i as u16)));
            match clash {
                Some(i) => start = i + 1,
                None => {
                    for i in start..start + count_usize {
                        self.descriptors
                            .insert(selector_for(i as u16), Descriptor::default());
                    }
                    let first = Selector(selector_for(start as u16));
                    debug!(selector = %first, count, "allocated LDT descriptors");
                    return Ok(first);
                }
            }
        }
        Err(DpmiError::DescriptorsExhausted { requested: count })
    }

    fn set_segment_base_address(&mut self, selector: Selector, base: u32) -> Result<()> {
        self.check_descriptor_setup(selector)?;
        let d = self
            .descriptors
            .get_mut(&selector.0)
            .ok_or(DpmiError::InvalidSelector(selector.0))?;
        d.base = base;
        Ok(())
    }

    fn set_segment_limit(&mut self, selector: Selector, limit: u32) -> Result<()> {
        self.check_descriptor_setup(selector)?;
        let d = self
            .descriptors
            .get_mut(&selector.0)
            .ok_or(DpmiError::InvalidSelector(selector.0))?;
        d.limit = limit;
        Ok(())
    }

    fn free_ldt_descriptor(&mut self, selector: Selector) -> Result<()> {
        if self.descriptors.remove(&selector.0).is_none() {
            return Err(DpmiError::InvalidSelector(selector.0));
        }
        debug!(selector = %selector, "freed LDT descriptor");
        Ok(())
    }

    fn nearptr_supported(&self) -> bool {
        self.config.nearptr_supported
    }

    fn nearptr_enable(&mut self) -> bool {
        if !self.config.nearptr_supported {
            return false;
        }
        self.nearptr_enabled = true;
        true
    }

    fn nearptr_disable(&mut self) {
        self.nearptr_enabled = false;
    }

    fn conventional_base(&self) -> u32 {
        0u32.wrapping_sub(self.config.ds_base)
    }
}

impl<B: RealModeBios> FastPathExecutor for HostDpmi<B> {
    unsafe fn call_near(&mut self, code: &[u8], entry: usize, regs: &mut FastPathRegs) {
        self.fast_path_calls += 1;
        if !self.bios.protected_mode_call(code, entry, regs) {
            warn!(entry, len = code.len(), "fast-path call to unrecognised entry point");
        }
    }
}

impl<B> HostDpmi<B> {
    /// Lowest aligned linear address in the window with `size` bytes free.
    fn free_linear_range(&self, size: u32) -> Option<u32> {
        let span = align_up(u64::from(size));
        let mut candidate = u64::from(self.config.linear_window_base);
        for (&linear, m) in &self.mappings {
            if candidate + span <= u64::from(linear) {
                break;
            }
            candidate = candidate.max(align_up(u64::from(linear) + u64::from(m.size)));
        }
        if candidate + span > 1 << 32 {
            return None;
        }
        u32::try_from(candidate).ok()
    }

    fn check_descriptor_setup(&self, selector: Selector) -> Result<()> {
        if self.config.refuse_descriptor_setup && self.descriptors.contains_key(&selector.0) {
            return Err(DpmiError::DescriptorSetupRefused(selector.0));
        }
        Ok(())
    }
}

fn align_up(value: u64) -> u64 {
    let align = u64::from(LINEAR_ALIGN);
    (value + align - 1) & !(align - 1)
}

fn selector_for(index: u16) -> u16 {
    (index << 3) | 0b111
}
