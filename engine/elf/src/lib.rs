//! ELF loader and relocator for MMDSP component images.
//!
//! # Purpose
//! Components for the DSP side ship as big-endian ELF objects compiled
//! for the MMDSP core, with data sections packed in target word
//! encodings (64-bit code words, 24-bit and padded 16-bit data words)
//! and a custom relocation type set. This crate parses such an image,
//! computes the layout of its sections inside per-memory-region
//! segments, materializes the sections into caller-allocated target
//! memory, and applies relocations against internal and external
//! symbols.
//!
//! # Architecture
//! - `pack`: byte-order and word-packing primitives, plus the burst
//!   copy/zero path to target memory.
//! - `reader`: big-endian ELF structure extraction, parameterized over
//!   the ELF class.
//! - `mapping`: the section-name grammar mapping sections to memory
//!   regions.
//! - `relocation`: the MMDSP relocation-recipe table and the
//!   external-symbol resolver seam.
//! - `loader`: the [`Component`](loader::Component) lifecycle: load,
//!   layout, segment materialization, relocation.
//!
//! # Error handling
//! Malformed input always fails the whole load and unwinds completely;
//! an unmapped section or an intentionally inert external symbol is not
//! an error. Internal invariant violations (an impossible region
//! purpose/word-size combination reaching the copy dispatch) panic
//! instead of producing silently wrong target memory.

pub mod loader;
pub mod mapping;
pub mod pack;
pub mod reader;
pub mod relocation;

#[cfg(feature = "fixtures")]
pub mod fixtures;

pub use loader::{
    Component, ComponentKind, SegmentArena, SegmentMapping, SegmentRequirement, EM_MMDSP,
    MAGIC_COMPONENT, MAGIC_FIRMWARE, MAGIC_SINGLETON, NMF_SEGMENT_SECTION,
};
pub use relocation::{RelocType, SymbolResolution, SymbolResolver};

use thiserror::Error;

/// Loader errors. Everything here is either malformed input, a
/// resource-exhaustion report from the resolver, or a caller sequencing
/// mistake; partial loads never survive an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ElfError {
    #[error("not an ELF image")]
    BadMagic,

    #[error("unsupported ELF class {0}")]
    UnsupportedClass(u8),

    #[error("image is not big-endian")]
    BadEncoding,

    #[error("wrong machine type {found:#x}, expected {expected:#x}")]
    WrongMachine { found: u16, expected: u16 },

    #[error("truncated or malformed image: {0}")]
    Truncated(&'static str),

    #[error("mandatory nmf_segment section missing")]
    MissingNmfSegment,

    #[error("unrecognized component magic {0:#x}")]
    BadComponentMagic(u32),

    #[error("common symbol `{0}` is not supported")]
    CommonSymbol(String),

    #[error("relocation type {0} not supported")]
    UnsupportedRelocation(u32),

    #[error("unresolved external symbol `{0}`")]
    UnresolvedSymbol(String),

    #[error("section `{0}` has no loaded segment")]
    SectionNotLoaded(String),

    #[error("section data falls outside its segment")]
    SegmentOverflow,

    #[error("inconsistent layout: section `{0}` disagrees with its segment base")]
    InconsistentLayout(String),

    #[error("relocation value out of range for its field")]
    RelocationOverflow,

    #[error("out of memory while resolving symbols")]
    NoMoreMemory,
}

pub type Result<T> = core::result::Result<T, ElfError>;
