//! One VBE session: the controller that was found, the mode last negotiated, and the resources
//! acquired for it.

use tracing::{debug, warn};
use vesa_dpmi::{Dpmi, FastPathExecutor, RealModeServices};

use crate::{
    access::{AccessDescriptor, AccessStrategy},
    bank,
    bios_image::VideoBiosImage,
    catalog::ModeCatalog,
    info::{ModeFlags, ModeInfo, MODE_NUMBER_MASK},
    pmi::FastPathInterface,
    vbe::{self, Controller, Window},
    Error, Result,
};

#[derive(Debug)]
pub struct VesaContext {
    controller: Controller,
    /// Detail record of the last mode accepted or set; all zero after a failed search.
    mode_info: ModeInfo,
    /// Mode number `mode_info` describes.
    retained_mode: Option<u16>,
    current_mode: Option<u16>,
    access: Option<AccessDescriptor>,
    fast_path: FastPathInterface,
    bios_image: Option<VideoBiosImage>,
}

impl VesaContext {
    /// Queries the controller and opens a session on it.
    pub fn open<G: RealModeServices + ?Sized>(gw: &mut G) -> Result<Self> {
        let controller = vbe::get_controller_info(gw)?;
        Ok(Self {
            controller,
            mode_info: ModeInfo::default(),
            retained_mode: None,
            current_mode: None,
            access: None,
            fast_path: FastPathInterface::default(),
            bios_image: None,
        })
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn catalog(&self) -> &ModeCatalog {
        &self.controller.modes
    }

    pub fn mode_info(&self) -> &ModeInfo {
        &self.mode_info
    }

    /// Mode number whose detail record is retained, from either a search or a mode set.
    pub fn retained_mode(&self) -> Option<u16> {
        self.retained_mode
    }

    /// Mode number passed to the last successful [`VesaContext::set_mode`].
    pub fn current_mode(&self) -> Option<u16> {
        self.current_mode
    }

    /// Returns the first catalog mode accepted by `predicate` and keeps its detail record.
    /// When nothing matches the record is zeroed.
    pub fn enumerate_modes<G, P>(&mut self, gw: &mut G, predicate: P) -> Option<u16>
    where
        G: RealModeServices + ?Sized,
        P: FnMut(&ModeInfo) -> bool,
    {
        self.mode_info = ModeInfo::default();
        self.retained_mode = None;
        let Some((mode, info)) = self.controller.modes.find(gw, predicate) else {
            debug!(modes = self.controller.modes.len(), "no mode accepted");
            return None;
        };
        self.mode_info = info;
        self.retained_mode = Some(mode);
        Some(mode)
    }

    /// Sets `mode` and refreshes the retained detail record from it.
    pub fn set_mode<G: RealModeServices + ?Sized>(
        &mut self,
        gw: &mut G,
        mode: u16,
        flags: ModeFlags,
    ) -> Result<()> {
        vbe::set_mode(gw, mode, flags, None)?;
        let number = mode & MODE_NUMBER_MASK;
        self.current_mode = Some(number);
        self.retained_mode = Some(number);
        self.mode_info = ModeInfo::default();
        match vbe::get_mode_info(gw, number) {
            Ok(info) => self.mode_info = info,
            // Standard VGA modes have no VBE detail record.
            Err(Error::Vbe(_)) => {}
            Err(err) => return Err(err),
        }
        Ok(())
    }

    /// Maps the retained mode's linear frame buffer, sized to the controller's total memory,
    /// and makes it addressable with `strategy`.
    pub fn acquire_access<D: Dpmi + ?Sized>(
        &mut self,
        dpmi: &mut D,
        strategy: AccessStrategy,
    ) -> Result<&AccessDescriptor> {
        if self.access.is_some() {
            return Err(Error::AccessAlreadyActive);
        }
        if !self.mode_info.has_linear_frame_buffer() {
            return Err(Error::NoLinearFrameBuffer(self.retained_mode.unwrap_or(0)));
        }
        let access = AccessDescriptor::establish(
            dpmi,
            strategy,
            self.mode_info.phys_base_ptr,
            self.controller.info.total_memory,
        )?;
        Ok(&*self.access.insert(access))
    }

    pub fn access(&self) -> Option<&AccessDescriptor> {
        self.access.as_ref()
    }

    pub fn release_access<D: Dpmi + ?Sized>(&mut self, dpmi: &mut D) -> Result<()> {
        let access = self.access.take().ok_or(Error::NoActiveAccess)?;
        access.release(dpmi)?;
        Ok(())
    }

    /// Loads (or reloads) the protected-mode interface.
    pub fn load_fast_path<G: RealModeServices + ?Sized>(
        &mut self,
        gw: &mut G,
    ) -> Result<&FastPathInterface> {
        self.fast_path.destroy();
        self.fast_path = FastPathInterface::load(gw)?;
        Ok(&self.fast_path)
    }

    pub fn destroy_fast_path(&mut self) {
        self.fast_path.destroy();
    }

    pub fn fast_path(&self) -> &FastPathInterface {
        &self.fast_path
    }

    /// Moves `window` through the loaded interface's bank switch routine.
    ///
    /// # Panics
    ///
    /// If no protected-mode interface is loaded.
    ///
    /// # Safety
    ///
    /// See [`bank::set_bank_position`].
    pub unsafe fn set_bank_position<E: FastPathExecutor + ?Sized>(
        &self,
        exec: &mut E,
        window: Window,
        number: u16,
    ) {
        let Some(entry) = self.fast_path.bank_switch() else {
            panic!("bank switch requested without a loaded protected-mode interface");
        };
        bank::set_bank_position(exec, &entry, window, number);
    }

    pub fn load_video_bios_image<G: RealModeServices + ?Sized>(
        &mut self,
        gw: &G,
    ) -> Result<&VideoBiosImage> {
        let image = VideoBiosImage::load(gw)?;
        Ok(&*self.bios_image.insert(image))
    }

    pub fn destroy_video_bios_image(&mut self) {
        self.bios_image = None;
    }

    pub fn video_bios_image(&self) -> Option<&VideoBiosImage> {
        self.bios_image.as_ref()
    }
}

impl Drop for VesaContext {
    fn drop(&mut self) {
        if let Some(access) = &self.access {
            warn!(
                strategy = ?access.strategy(),
                linear = format_args!("{:#010x}", access.mapping().linear()),
                "session dropped with frame buffer access still held"
            );
        }
    }
}
