//! Memory services for the NMF component manager.
//!
//! # Purpose
//! This crate owns everything the component manager knows about target
//! memory: the static table of MMDSP memory-region classes, the per-region
//! chunk allocators, and the domain layer that scopes allocations to one
//! DSP core and time-shares ESRAM between mutually-exclusive users
//! ("scratch" domains).
//!
//! # Architecture
//! - `region`: immutable descriptors for each memory-region class (word
//!   sizes, sharing mode, purpose). Pure lookup data.
//! - `chunk`: an ordered free-list allocator over one `[base, base+size)`
//!   byte range. One instance per physical pool and per scratch child.
//! - `domain`: the [`DomainManager`] context object holding the domain
//!   table and the per-core pools. All mutation goes through it; there is
//!   no process-global state.
//!
//! # Concurrency
//! The manager is a single-writer structure. Callers are expected to hold
//! one coarse lock around any load/relocate/unload sequence; nothing in
//! here takes locks of its own.

pub mod chunk;
pub mod domain;
pub mod region;

pub use chunk::{AllocStatus, ChunkAllocator};
pub use domain::{
    BankPower, CoreMemoryConfig, DomainAddresses, DomainId, DomainManager, DomainSpec, MemHandle,
    NoPower, PoolSpec, SegRange, MAX_CORE_NB, MAX_USER_DOMAIN_NB, RESERVED_DOMAIN_NB,
};
pub use region::{
    region_by_id, serialize_memories, InstanceProperty, MemKind, MemPurpose, RegionDescriptor,
    Sharing, NB_REGIONS,
};

use thiserror::Error;

/// Errors surfaced by the memory and domain layer.
///
/// These map one-to-one onto the component manager's caller-visible error
/// taxonomy: protocol misuse is rejected synchronously with no state
/// change, and exhaustion is a normal, recoverable result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// A caller argument was rejected before any state change.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// A domain specification is self-inconsistent or out of range.
    #[error("invalid domain definition: {0}")]
    InvalidDomainDefinition(&'static str),

    /// The domain handle does not refer to a live domain.
    #[error("invalid domain handle {0}")]
    InvalidDomainHandle(u8),

    /// The operation is not legal in the domain's current state.
    #[error("illegal domain operation: {0}")]
    IllegalDomainOperation(&'static str),

    /// The underlying allocator could not satisfy the request.
    #[error("out of memory: {requested} bytes requested from {kind:?}")]
    NoMoreMemory { kind: MemKind, requested: u32 },

    /// The memory handle does not describe a live allocation.
    #[error("invalid memory handle")]
    InvalidHandle,
}

pub type Result<T> = core::result::Result<T, MemoryError>;
