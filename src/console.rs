//! Host driver: turns source text or a cartridge image into a running VM and
//! drives it frame by frame.

use thiserror::Error;

use crate::bytecode::compile::compile;
use crate::bytecode::compile_error::CompileError;
use crate::bytecode::ir::{Chunk, ChunkError};
use crate::frontend::{ParserError, parse_source};
use crate::runtime::host::Host;
use crate::runtime::runtime_error::Fault;
use crate::runtime::vm::{Reload, Vm, VmConfig};

/// Why a cartridge could not be loaded. The previously loaded cartridge
/// keeps running.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("syntax error: {0}")]
    Parse(#[from] ParserError),
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
    #[error("bad cartridge image: {0}")]
    Image(#[from] ChunkError),
}

/// Entry points called once per frame, in order.
pub const FRAME_ENTRY_POINTS: [&str; 2] = ["update", "draw"];

pub struct Console<H: Host> {
    vm: Vm,
    host: H,
    /// Last cartridge that compiled (or decoded) successfully.
    cartridge: Option<Chunk>,
    reload: Reload,
    frame: u64,
}

impl<H: Host> Console<H> {
    pub fn new(host: H) -> Self {
        Self::with_config(host, VmConfig::default())
    }

    pub fn with_config(host: H, config: VmConfig) -> Self {
        Self {
            vm: Vm::with_config(config),
            host,
            cartridge: None,
            reload: Reload::Cold,
            frame: 0,
        }
    }

    /// Global handling for subsequent loads.
    pub fn set_reload(&mut self, reload: Reload) {
        self.reload = reload;
    }

    /// Compiles `source`, loads it and runs its top-level code.
    ///
    /// On error nothing changes: the VM keeps the previous cartridge.
    pub fn load_source(&mut self, source: &str) -> Result<(), LoadError> {
        let program = parse_source(source)?;
        let chunk = compile(&program)?;
        self.install(chunk);
        Ok(())
    }

    /// Like `load_source`, from an image made by [`Chunk::to_image`].
    pub fn load_image(&mut self, image: &[u8]) -> Result<(), LoadError> {
        let chunk = Chunk::from_image(image)?;
        self.install(chunk);
        Ok(())
    }

    /// Reloads the last good cartridge, e.g. after a fault.
    /// Returns false when nothing has been loaded yet.
    pub fn restart(&mut self, reload: Reload) -> bool {
        let Some(chunk) = self.cartridge.clone() else {
            return false;
        };
        self.start(chunk, reload);
        true
    }

    fn install(&mut self, chunk: Chunk) {
        self.cartridge = Some(chunk.clone());
        self.start(chunk, self.reload);
    }

    fn start(&mut self, chunk: Chunk, reload: Reload) {
        self.vm.load(chunk, reload);
        self.frame = 0;
        self.vm.boot(&mut self.host);
        if let Some(fault) = self.vm.fault() {
            log::warn!("cartridge failed during boot: {}", fault);
        }
    }

    /// Runs one frame: `update` then `draw`. Stops at the first fault and
    /// returns it; a faulted console does nothing until reloaded.
    pub fn tick(&mut self) -> Option<&Fault> {
        if self.vm.fault().is_some() || self.cartridge.is_none() {
            return self.vm.fault();
        }

        for entry in FRAME_ENTRY_POINTS {
            self.vm.call_function(entry, &mut self.host);
            if self.vm.fault().is_some() {
                log::warn!("frame {}: {} faulted", self.frame, entry);
                return self.vm.fault();
            }
        }

        self.frame += 1;
        log::trace!("frame {} done, {} cycles", self.frame, self.vm.cycles());
        None
    }

    pub fn fault(&self) -> Option<&Fault> {
        self.vm.fault()
    }

    /// Frames completed since the cartridge was (re)loaded.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn cartridge(&self) -> Option<&Chunk> {
        self.cartridge.as_ref()
    }

    pub fn vm(&self) -> &Vm {
        &self.vm
    }

    pub fn vm_mut(&mut self) -> &mut Vm {
        &mut self.vm
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }
}
