//! Executive-engine bring-up for MMDSP cores.
//!
//! # Purpose
//! Every DSP core runs a resident "executive" firmware: the DSP-side
//! scheduler against which all other components execute. This crate
//! loads that firmware into a memory domain, allocates and wires its
//! runtime services (stack, panic-dump area, trace buffer) through the
//! firmware's imported symbols, downloads the relocated segments,
//! starts the core and waits for the boot handshake with an explicit
//! deadline.
//!
//! # Architecture
//! - `dsp`: the [`DspCore`] hardware seam injected by the platform
//!   layer.
//! - `engine`: the [`ExecutiveEngine`] bring-up/shutdown sequence and
//!   the per-core [`ExecutiveState`] it returns.
//!
//! Failure anywhere in the sequence unwinds completely: every
//! allocation made so far is powered down and freed before the error is
//! returned.

pub mod dsp;
pub mod engine;

pub use dsp::DspCore;
pub use engine::{ExecutiveEngine, ExecutiveParams, ExecutiveState, BOOT_FLAG_READY};

use std::time::Duration;

use thiserror::Error;

use nmf_elf::ElfError;
use nmf_memory::MemoryError;

/// Bring-up errors.
#[derive(Debug, Error)]
pub enum BootError {
    #[error("image is not an executive firmware")]
    NotAFirmware,

    #[error(transparent)]
    Elf(#[from] ElfError),

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error("core did not publish the boot handshake within {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = core::result::Result<T, BootError>;
