//! Bring-up and shutdown of the per-core executive firmware.
//!
//! The boot sequence is linear: load the image, lay out and allocate
//! its segments in the target domain, allocate the runtime services,
//! relocate with the service addresses bound to the firmware's
//! imports, download, start the core and poll the handshake word until
//! it reports ready or the deadline passes. Every step that can fail
//! happens before the core leaves reset, except the handshake itself.

use std::thread;
use std::time::{Duration, Instant};

use nmf_elf::{
    Component, ComponentKind, RelocType, SegmentArena, SegmentMapping, SymbolResolution,
    SymbolResolver, EM_MMDSP,
};
use nmf_memory::{DomainId, DomainManager, MemHandle, MemKind, Sharing};

use crate::dsp::DspCore;
use crate::{BootError, Result};

/// Value of the handshake word once the executive scheduler runs.
/// Segments are zero-filled at load, so any nonzero sentinel is
/// unambiguous.
pub const BOOT_FLAG_READY: u32 = 1;

/// Imported symbols the engine binds to service memory.
pub const SYM_STACK_BASE: &str = "rtos_stack_base";
pub const SYM_STACK_TOP: &str = "rtos_stack_top";
pub const SYM_PANIC_AREA: &str = "rtos_panic_area";
pub const SYM_TRACE_BUFFER: &str = "rtos_trace_buffer";
pub const SYM_TRACE_BUFFER_END: &str = "rtos_trace_buffer_end";

/// Bring-up policy knobs.
#[derive(Debug, Clone, Copy)]
pub struct ExecutiveParams {
    /// Executive stack depth, in 24-bit words.
    pub stack_words: u32,
    /// Panic-dump area size, in 24-bit words.
    pub panic_words: u32,
    /// Trace ring size, in 24-bit words.
    pub trace_words: u32,
    /// Handshake deadline.
    pub boot_timeout: Duration,
    /// Delay between handshake polls.
    pub poll_interval: Duration,
}

impl Default for ExecutiveParams {
    fn default() -> Self {
        Self {
            stack_words: 1024,
            panic_words: 64,
            trace_words: 256,
            boot_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(1),
        }
    }
}

/// Live executive on one core: the allocations backing it, returned by
/// [`ExecutiveEngine::boot`] and consumed by
/// [`ExecutiveEngine::shutdown`].
#[derive(Debug)]
pub struct ExecutiveState {
    domain: DomainId,
    segments: Vec<MemHandle>,
    stack: MemHandle,
    panic_area: MemHandle,
    trace: MemHandle,
}

impl ExecutiveState {
    pub fn domain(&self) -> DomainId {
        self.domain
    }

    /// Word address of the trace ring, for the host-side trace reader.
    pub fn trace_buffer(&self) -> u32 {
        self.trace.word_address()
    }

    /// Word address of the panic-dump area, read after a DSP panic.
    pub fn panic_area(&self) -> u32 {
        self.panic_area.word_address()
    }
}

/// Binds the well-known service imports; anything else in the firmware
/// is a link error.
struct ServiceResolver {
    bindings: [(&'static str, u32); 5],
}

impl SymbolResolver for ServiceResolver {
    fn resolve(&mut self, _rtype: RelocType, name: &str, _site_addr: u32) -> SymbolResolution {
        match self.bindings.iter().find(|(n, _)| *n == name) {
            Some(&(_, addr)) => SymbolResolution::Resolved(addr),
            None => SymbolResolution::Unresolved,
        }
    }
}

/// The bring-up sequencer. Stateless apart from its parameters; all
/// per-core state lives in the [`ExecutiveState`] it hands back.
pub struct ExecutiveEngine {
    params: ExecutiveParams,
}

impl ExecutiveEngine {
    pub fn new(params: ExecutiveParams) -> Self {
        Self { params }
    }

    /// Boot the executive firmware `image` on `core`, allocating out of
    /// `domain`.
    ///
    /// On any failure, including a handshake timeout, the core is put
    /// back into reset and everything allocated so far is freed.
    pub fn boot(
        &self,
        core: &mut dyn DspCore,
        mgr: &mut DomainManager,
        domain: DomainId,
        image: &[u8],
    ) -> Result<ExecutiveState> {
        let mut handles: Vec<MemHandle> = Vec::new();
        match self.boot_inner(core, mgr, domain, image, &mut handles) {
            Ok(state) => Ok(state),
            Err(err) => {
                for handle in handles.drain(..).rev() {
                    // Unwind must run to completion; a stale handle here
                    // would be a bug, not a recoverable condition.
                    let freed = mgr.free(handle, true);
                    debug_assert!(freed.is_ok());
                }
                Err(err)
            }
        }
    }

    fn boot_inner(
        &self,
        core: &mut dyn DspCore,
        mgr: &mut DomainManager,
        domain: DomainId,
        image: &[u8],
        handles: &mut Vec<MemHandle>,
    ) -> Result<ExecutiveState> {
        let mut component = Component::load(image, EM_MMDSP)?;
        if component.kind() == ComponentKind::Component {
            return Err(BootError::NotAFirmware);
        }
        component.compute_segments()?;

        let reqs = component.segment_requirements();
        let mut segments = Vec::with_capacity(reqs.len());
        let mut buffers = Vec::with_capacity(reqs.len());
        for req in &reqs {
            let handle = mgr.alloc(domain, req.region.kind, req.words, req.align_words, true)?;
            handles.push(handle);
            segments.push(handle);
            buffers.push(vec![0u8; req.host_bytes]);
        }

        let mut arena = SegmentArena::new();
        for ((req, handle), buf) in reqs.iter().zip(&segments).zip(buffers.iter_mut()) {
            arena.insert(
                req.region.id,
                SegmentMapping {
                    host: buf,
                    target_addr: handle.word_address(),
                },
            );
        }
        // Firmware is globally shared: one pass covers every region.
        component.load_segment(Sharing::Sharable, &mut arena)?;

        let stack = mgr.alloc(domain, MemKind::XramPriv24, self.params.stack_words, 1, true)?;
        handles.push(stack);
        let panic_area = mgr.alloc(domain, MemKind::SdramPriv24, self.params.panic_words, 1, true)?;
        handles.push(panic_area);
        let trace = mgr.alloc(domain, MemKind::SdramExt24, self.params.trace_words, 1, true)?;
        handles.push(trace);

        let mut resolver = ServiceResolver {
            bindings: [
                (SYM_STACK_BASE, stack.word_address()),
                (SYM_STACK_TOP, stack.word_address() + self.params.stack_words),
                (SYM_PANIC_AREA, panic_area.word_address()),
                (SYM_TRACE_BUFFER, trace.word_address()),
                (
                    SYM_TRACE_BUFFER_END,
                    trace.word_address() + self.params.trace_words,
                ),
            ],
        };
        component.relocate_segments(Sharing::Sharable, &mut arena, &mut resolver)?;
        drop(arena);

        for ((req, handle), buf) in reqs.iter().zip(&segments).zip(&buffers) {
            core.write_segment(req.region.kind, handle.word_address(), buf);
            log::debug!(
                "downloaded {} segment: {} words at {:#x}",
                req.region.name,
                req.words,
                handle.word_address()
            );
        }

        mgr.component_bound(domain)?;
        core.start();

        let deadline = Instant::now() + self.params.boot_timeout;
        loop {
            if core.read_boot_flag() == BOOT_FLAG_READY {
                break;
            }
            if Instant::now() >= deadline {
                core.stop();
                let _ = mgr.component_unbound(domain);
                log::warn!(
                    "executive handshake timed out after {:?} (domain {})",
                    self.params.boot_timeout,
                    domain.raw()
                );
                return Err(BootError::Timeout(self.params.boot_timeout));
            }
            thread::sleep(self.params.poll_interval);
        }
        log::info!("executive up (domain {})", domain.raw());

        handles.clear();
        Ok(ExecutiveState {
            domain,
            segments,
            stack,
            panic_area,
            trace,
        })
    }

    /// Stop the core and release everything the boot allocated.
    pub fn shutdown(
        &self,
        state: ExecutiveState,
        core: &mut dyn DspCore,
        mgr: &mut DomainManager,
    ) -> Result<()> {
        core.stop();
        mgr.component_unbound(state.domain)?;
        for handle in [state.trace, state.panic_area, state.stack]
            .into_iter()
            .chain(state.segments.into_iter().rev())
        {
            mgr.free(handle, true)?;
        }
        Ok(())
    }
}
