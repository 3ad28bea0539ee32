//! Domain layer: allocation scopes bound to one DSP core.
//!
//! A domain confines a client's allocations to declared windows of the
//! core's ESRAM/SDRAM pools. Scratch domains time-share one ESRAM window
//! between mutually-exclusive users: sibling children under one parent
//! overlap freely, and the parent carries a single reservation in the
//! global ESRAM allocator that always equals the union of the live
//! children's ranges.
//!
//! # State machine
//! `Free -> Normal -> ScratchParent` (implicitly, on the first scratch
//! child) and back to `Normal` when the last child is destroyed. A
//! `ScratchParent` is never destroyed directly; it dies only by reverting
//! first.
//!
//! All state lives in a [`DomainManager`] owned by the caller. There are
//! no process-wide tables.

use std::collections::BTreeMap;

use crate::chunk::{AllocStatus, ChunkAllocator};
use crate::region::MemKind;
use crate::{MemoryError, Result};

/// Size of the domain table.
pub const MAX_USER_DOMAIN_NB: usize = 64;

/// The first slots are permanently bound to the internal cores and are
/// never handed to users.
pub const RESERVED_DOMAIN_NB: usize = 4;

/// Upper bound on configurable DSP cores.
pub const MAX_CORE_NB: usize = 4;

/// Opaque domain handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DomainId(u8);

impl DomainId {
    pub fn raw(self) -> u8 {
        self.0
    }
}

/// Half-open byte range `[offset, offset + size)` inside one pool's
/// address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegRange {
    pub offset: u32,
    pub size: u32,
}

impl SegRange {
    pub fn new(offset: u32, size: u32) -> Self {
        Self { offset, size }
    }

    pub fn end(&self) -> u32 {
        self.offset + self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Whole-range containment (empty ranges are contained nowhere).
    pub fn contains(&self, other: &SegRange) -> bool {
        !other.is_empty() && self.offset <= other.offset && other.end() <= self.end()
    }
}

/// Domain definition: owning core plus the four segment windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct DomainSpec {
    pub core: u8,
    pub esram_code: SegRange,
    pub esram_data: SegRange,
    pub sdram_code: SegRange,
    pub sdram_data: SegRange,
}

/// One physical pool: base byte address and size.
///
/// Bases must be aligned to the widest word size placed in the pool
/// (8 bytes for code pools, 4 for data pools) so that handle word
/// addresses divide out evenly.
#[derive(Debug, Clone, Copy)]
pub struct PoolSpec {
    pub base: u32,
    pub size: u32,
}

/// Per-core pool configuration.
#[derive(Debug, Clone, Copy)]
pub struct CoreMemoryConfig {
    pub xram: PoolSpec,
    pub yram: PoolSpec,
    pub sdram_code: PoolSpec,
    pub sdram_data: PoolSpec,
    pub esram_code: PoolSpec,
    pub esram_data: PoolSpec,
}

/// Physical bank power control, injected by the platform layer.
///
/// Ordering contract: a bank is powered on only after the backing
/// allocation succeeded, and powered off before the chunk is released.
pub trait BankPower {
    fn bank_on(&mut self, core: u8, kind: MemKind, offset: u32, bytes: u32);
    fn bank_off(&mut self, core: u8, kind: MemKind, offset: u32, bytes: u32);
}

/// Default power implementation for platforms without switchable banks.
#[derive(Debug, Default)]
pub struct NoPower;

impl BankPower for NoPower {
    fn bank_on(&mut self, _core: u8, _kind: MemKind, _offset: u32, _bytes: u32) {}
    fn bank_off(&mut self, _core: u8, _kind: MemKind, _offset: u32, _bytes: u32) {}
}

/// Allocator-issued token for one allocated chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemHandle {
    core: u8,
    domain: u8,
    kind: MemKind,
    offset: u32,
    bytes: u32,
}

impl MemHandle {
    pub fn core(&self) -> u8 {
        self.core
    }

    pub fn kind(&self) -> MemKind {
        self.kind
    }

    /// Absolute byte address of the chunk start.
    pub fn byte_address(&self) -> u32 {
        self.offset
    }

    pub fn bytes(&self) -> u32 {
        self.bytes
    }

    /// Target word address of the chunk start.
    pub fn word_address(&self) -> u32 {
        self.offset / self.kind.descriptor().mem_ent_size
    }
}

/// Absolute segment addresses of one domain, for callers that program DMA
/// or hand addresses to the DSP side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainAddresses {
    pub esram_code: SegRange,
    pub esram_data: SegRange,
    pub sdram_code: SegRange,
    pub sdram_data: SegRange,
}

enum PoolClass {
    Xram,
    Yram,
    SdramCode,
    SdramData,
    EsramCode,
    EsramData,
}

fn pool_class(kind: MemKind) -> PoolClass {
    match kind {
        MemKind::SdramCode | MemKind::LockedCode => PoolClass::SdramCode,
        MemKind::InternalXram24 | MemKind::XramPriv24 => PoolClass::Xram,
        MemKind::InternalYram24 | MemKind::YramPriv24 => PoolClass::Yram,
        MemKind::SdramExt24 | MemKind::SdramExt16 | MemKind::SdramPriv24 => PoolClass::SdramData,
        MemKind::EsramExt24 | MemKind::EsramExt16 | MemKind::EsramPriv24 => PoolClass::EsramData,
        MemKind::EsramCode => PoolClass::EsramCode,
    }
}

fn is_esram_data(kind: MemKind) -> bool {
    matches!(
        kind,
        MemKind::EsramExt24 | MemKind::EsramExt16 | MemKind::EsramPriv24
    )
}

struct CorePools {
    config: CoreMemoryConfig,
    xram: ChunkAllocator,
    yram: ChunkAllocator,
    sdram_code: ChunkAllocator,
    sdram_data: ChunkAllocator,
    esram_code: ChunkAllocator,
    esram_data: ChunkAllocator,
}

impl CorePools {
    fn new(config: CoreMemoryConfig) -> Self {
        Self {
            config,
            xram: ChunkAllocator::new(config.xram.base, config.xram.size),
            yram: ChunkAllocator::new(config.yram.base, config.yram.size),
            sdram_code: ChunkAllocator::new(config.sdram_code.base, config.sdram_code.size),
            sdram_data: ChunkAllocator::new(config.sdram_data.base, config.sdram_data.size),
            esram_code: ChunkAllocator::new(config.esram_code.base, config.esram_code.size),
            esram_data: ChunkAllocator::new(config.esram_data.base, config.esram_data.size),
        }
    }

    fn for_kind(&mut self, kind: MemKind) -> &mut ChunkAllocator {
        match pool_class(kind) {
            PoolClass::Xram => &mut self.xram,
            PoolClass::Yram => &mut self.yram,
            PoolClass::SdramCode => &mut self.sdram_code,
            PoolClass::SdramData => &mut self.sdram_data,
            PoolClass::EsramCode => &mut self.esram_code,
            PoolClass::EsramData => &mut self.esram_data,
        }
    }

    fn for_kind_ref(&self, kind: MemKind) -> &ChunkAllocator {
        match pool_class(kind) {
            PoolClass::Xram => &self.xram,
            PoolClass::Yram => &self.yram,
            PoolClass::SdramCode => &self.sdram_code,
            PoolClass::SdramData => &self.sdram_data,
            PoolClass::EsramCode => &self.esram_code,
            PoolClass::EsramData => &self.esram_data,
        }
    }
}

enum DomainKind {
    Normal,
    ScratchParent {
        /// Start offset of the single reservation in the core's ESRAM
        /// data allocator; its extent always equals `union`.
        reservation: u32,
        union: SegRange,
        /// Live children keyed by domain slot index.
        children: BTreeMap<u8, SegRange>,
    },
    ScratchChild {
        parent: u8,
        /// Private sub-allocator covering exactly this child's ESRAM
        /// data range.
        sub: ChunkAllocator,
    },
}

struct DomainDesc {
    /// Owning client; `INTERNAL_CLIENT` marks the reserved core slots,
    /// which refuse destruction.
    client: u32,
    spec: DomainSpec,
    /// Scratch children for parents; zero otherwise.
    refcount: u32,
    /// Components currently instantiated against this domain.
    instances: u32,
    kind: DomainKind,
}

enum DomainSlot {
    Free,
    Used(DomainDesc),
}

/// Union of all live children's ranges; `None` when there are none.
fn children_union(children: &BTreeMap<u8, SegRange>) -> Option<SegRange> {
    let mut it = children.values();
    let first = *it.next()?;
    let (lo, hi) = it.fold((first.offset, first.end()), |(lo, hi), r| {
        (lo.min(r.offset), hi.max(r.end()))
    });
    Some(SegRange::new(lo, hi - lo))
}

/// Client id of the internal reserved domains.
const INTERNAL_CLIENT: u32 = u32::MAX;

/// The domain table plus the per-core physical allocators.
pub struct DomainManager {
    cores: Vec<CorePools>,
    domains: Vec<DomainSlot>,
    power: Box<dyn BankPower>,
}

impl DomainManager {
    /// Build a manager for the given cores with no bank power control.
    pub fn new(configs: Vec<CoreMemoryConfig>) -> Self {
        Self::with_power(configs, Box::new(NoPower))
    }

    /// Build a manager with an injected [`BankPower`] implementation.
    ///
    /// # Panics
    /// Panics when no core is configured or more than [`MAX_CORE_NB`]
    /// are; this is a construction-time configuration error.
    pub fn with_power(configs: Vec<CoreMemoryConfig>, power: Box<dyn BankPower>) -> Self {
        assert!(
            !configs.is_empty() && configs.len() <= MAX_CORE_NB,
            "core count out of range"
        );
        let mut domains: Vec<DomainSlot> = Vec::with_capacity(MAX_USER_DOMAIN_NB);
        // The reserved slots stand for the internal cores themselves and
        // get unrestricted windows over their core's pools.
        for i in 0..RESERVED_DOMAIN_NB {
            let core = i.min(configs.len() - 1);
            let cfg = &configs[core];
            let full = |p: PoolSpec| SegRange::new(p.base, p.size);
            domains.push(DomainSlot::Used(DomainDesc {
                client: INTERNAL_CLIENT,
                spec: DomainSpec {
                    core: core as u8,
                    esram_code: full(cfg.esram_code),
                    esram_data: full(cfg.esram_data),
                    sdram_code: full(cfg.sdram_code),
                    sdram_data: full(cfg.sdram_data),
                },
                refcount: 0,
                instances: 0,
                kind: DomainKind::Normal,
            }));
        }
        for _ in RESERVED_DOMAIN_NB..MAX_USER_DOMAIN_NB {
            domains.push(DomainSlot::Free);
        }
        let cores = configs.into_iter().map(CorePools::new).collect();
        Self {
            cores,
            domains,
            power,
        }
    }

    /// Handle of the reserved domain of `core`.
    pub fn core_domain(&self, core: u8) -> DomainId {
        debug_assert!((core as usize) < self.cores.len());
        DomainId(core)
    }

    fn desc(&self, id: DomainId) -> Result<&DomainDesc> {
        match self.domains.get(id.0 as usize) {
            Some(DomainSlot::Used(desc)) => Ok(desc),
            _ => Err(MemoryError::InvalidDomainHandle(id.0)),
        }
    }

    fn desc_mut(&mut self, id: DomainId) -> Result<&mut DomainDesc> {
        match self.domains.get_mut(id.0 as usize) {
            Some(DomainSlot::Used(desc)) => Ok(desc),
            _ => Err(MemoryError::InvalidDomainHandle(id.0)),
        }
    }

    fn validate_spec(&self, spec: &DomainSpec) -> Result<()> {
        let Some(core) = self.cores.get(spec.core as usize) else {
            return Err(MemoryError::InvalidDomainDefinition("core id out of range"));
        };
        let inside = |seg: &SegRange, pool: &PoolSpec| {
            seg.is_empty() || (pool.base <= seg.offset && seg.end() <= pool.base + pool.size)
        };
        let cfg = &core.config;
        if !inside(&spec.esram_code, &cfg.esram_code)
            || !inside(&spec.esram_data, &cfg.esram_data)
            || !inside(&spec.sdram_code, &cfg.sdram_code)
            || !inside(&spec.sdram_data, &cfg.sdram_data)
        {
            return Err(MemoryError::InvalidDomainDefinition(
                "segment outside its pool",
            ));
        }
        Ok(())
    }

    fn claim_slot(&mut self, desc: DomainDesc) -> Result<DomainId> {
        for (idx, slot) in self.domains.iter_mut().enumerate().skip(RESERVED_DOMAIN_NB) {
            if matches!(slot, DomainSlot::Free) {
                *slot = DomainSlot::Used(desc);
                return Ok(DomainId(idx as u8));
            }
        }
        Err(MemoryError::IllegalDomainOperation("domain table full"))
    }

    /// Create a normal domain for `client`.
    pub fn create_domain(&mut self, client: u32, spec: DomainSpec) -> Result<DomainId> {
        if client == 0 {
            return Err(MemoryError::InvalidParameter("client id is zero"));
        }
        if client == INTERNAL_CLIENT {
            return Err(MemoryError::InvalidParameter("client id is reserved"));
        }
        self.validate_spec(&spec)?;
        self.claim_slot(DomainDesc {
            client,
            spec,
            refcount: 0,
            instances: 0,
            kind: DomainKind::Normal,
        })
    }

    /// Create a scratch child under `parent`.
    ///
    /// The child's ESRAM data range must lie entirely inside the parent's.
    /// On the first child the parent becomes a scratch parent and a
    /// reservation for the child's range is taken in the core's ESRAM
    /// allocator; later children grow that reservation to the union of
    /// all live children. A reservation failure rolls the child back.
    pub fn create_domain_scratch(
        &mut self,
        client: u32,
        parent: DomainId,
        spec: DomainSpec,
    ) -> Result<DomainId> {
        if client == 0 {
            return Err(MemoryError::InvalidParameter("client id is zero"));
        }
        if client == INTERNAL_CLIENT {
            return Err(MemoryError::InvalidParameter("client id is reserved"));
        }
        self.validate_spec(&spec)?;

        let parent_desc = self.desc(parent)?;
        if matches!(parent_desc.kind, DomainKind::ScratchChild { .. }) {
            return Err(MemoryError::IllegalDomainOperation(
                "scratch domains cannot nest",
            ));
        }
        if parent_desc.spec.core != spec.core {
            return Err(MemoryError::InvalidDomainDefinition(
                "scratch child on a different core than its parent",
            ));
        }
        if !parent_desc.spec.esram_data.contains(&spec.esram_data) {
            return Err(MemoryError::InvalidDomainDefinition(
                "scratch range not contained in parent esram data range",
            ));
        }

        let child_range = spec.esram_data;
        let child = self.claim_slot(DomainDesc {
            client,
            spec,
            refcount: 0,
            instances: 0,
            kind: DomainKind::ScratchChild {
                parent: parent.0,
                sub: ChunkAllocator::new(child_range.offset, child_range.size),
            },
        })?;

        if let Err(e) = self.attach_scratch_child(parent, child, child_range) {
            self.domains[child.0 as usize] = DomainSlot::Free;
            return Err(e);
        }
        Ok(child)
    }

    fn attach_scratch_child(
        &mut self,
        parent: DomainId,
        child: DomainId,
        range: SegRange,
    ) -> Result<()> {
        let core = self.desc(parent)?.spec.core as usize;
        // Split borrow: the reservation lives in the core pools, the
        // bookkeeping in the domain slot.
        let parent_desc = match self.domains.get_mut(parent.0 as usize) {
            Some(DomainSlot::Used(desc)) => desc,
            _ => return Err(MemoryError::InvalidDomainHandle(parent.0)),
        };
        let esram = &mut self.cores[core].esram_data;

        match &mut parent_desc.kind {
            DomainKind::Normal => {
                if !esram.alloc_at(range.offset, range.size) {
                    log::warn!(
                        "scratch reservation failed: [{:#x}, {:#x}) esram status {:?}",
                        range.offset,
                        range.end(),
                        esram.status()
                    );
                    return Err(MemoryError::NoMoreMemory {
                        kind: MemKind::EsramExt24,
                        requested: range.size,
                    });
                }
                let mut children = BTreeMap::new();
                children.insert(child.0, range);
                parent_desc.kind = DomainKind::ScratchParent {
                    reservation: range.offset,
                    union: range,
                    children,
                };
                parent_desc.refcount = 1;
                Ok(())
            }
            DomainKind::ScratchParent {
                reservation,
                union,
                children,
            } => {
                children.insert(child.0, range);
                let new_union = children_union(children).unwrap_or_default();
                if new_union != *union {
                    if !esram.resize(*reservation, new_union.offset, new_union.size) {
                        log::warn!(
                            "scratch reservation grow failed: [{:#x}, {:#x}) esram status {:?}",
                            new_union.offset,
                            new_union.end(),
                            esram.status()
                        );
                        children.remove(&child.0);
                        return Err(MemoryError::NoMoreMemory {
                            kind: MemKind::EsramExt24,
                            requested: new_union.size,
                        });
                    }
                    *reservation = new_union.offset;
                    *union = new_union;
                }
                parent_desc.refcount += 1;
                Ok(())
            }
            DomainKind::ScratchChild { .. } => {
                Err(MemoryError::IllegalDomainOperation("scratch domains cannot nest"))
            }
        }
    }

    /// Destroy a domain.
    ///
    /// Refused while the domain still has instantiated components, a
    /// nonzero refcount, is a scratch parent, or (for a scratch child)
    /// still shows live allocations in its sub-allocator. A refused
    /// destroy mutates nothing.
    pub fn destroy_domain(&mut self, id: DomainId) -> Result<()> {
        let desc = self.desc(id)?;
        if desc.client == INTERNAL_CLIENT {
            return Err(MemoryError::IllegalDomainOperation(
                "reserved core domains cannot be destroyed",
            ));
        }
        if desc.instances != 0 {
            return Err(MemoryError::IllegalDomainOperation(
                "components still instantiated against domain",
            ));
        }
        if desc.refcount != 0 {
            return Err(MemoryError::IllegalDomainOperation(
                "domain still referenced",
            ));
        }
        if matches!(desc.kind, DomainKind::ScratchParent { .. }) {
            return Err(MemoryError::IllegalDomainOperation(
                "scratch parent dies only via its last child",
            ));
        }
        if let DomainKind::ScratchChild { sub, .. } = &desc.kind {
            if sub.used_bytes() != 0 {
                return Err(MemoryError::IllegalDomainOperation(
                    "scratch allocations still live",
                ));
            }
        }

        let parent = match &desc.kind {
            DomainKind::ScratchChild { parent, .. } => Some(*parent),
            _ => None,
        };
        if let Some(parent_idx) = parent {
            self.detach_scratch_child(parent_idx, id.0)?;
        }
        self.domains[id.0 as usize] = DomainSlot::Free;
        Ok(())
    }

    fn detach_scratch_child(&mut self, parent_idx: u8, child_idx: u8) -> Result<()> {
        let core = self.desc(DomainId(parent_idx))?.spec.core as usize;
        let parent_desc = match self.domains.get_mut(parent_idx as usize) {
            Some(DomainSlot::Used(desc)) => desc,
            _ => return Err(MemoryError::InvalidDomainHandle(parent_idx)),
        };
        let esram = &mut self.cores[core].esram_data;

        let DomainKind::ScratchParent {
            reservation,
            union,
            children,
        } = &mut parent_desc.kind
        else {
            return Err(MemoryError::IllegalDomainOperation(
                "child's parent is not a scratch parent",
            ));
        };

        children.remove(&child_idx);
        parent_desc.refcount -= 1;
        match children_union(children) {
            None => {
                // Last child: drop the reservation, revert to normal.
                esram.free(*reservation);
                parent_desc.kind = DomainKind::Normal;
            }
            Some(new_union) => {
                if new_union != *union {
                    // Shrinking to a subset of the old reservation
                    // cannot fail.
                    let ok = esram.resize(*reservation, new_union.offset, new_union.size);
                    debug_assert!(ok, "scratch reservation shrink failed");
                    *reservation = new_union.offset;
                    *union = new_union;
                }
            }
        }
        Ok(())
    }

    /// Allocate `words` target words of `kind` memory on behalf of a
    /// domain. `align_words` is a power-of-two word alignment (0 means
    /// natural word alignment). The bank is powered on only after the
    /// allocation succeeded.
    pub fn alloc(
        &mut self,
        id: DomainId,
        kind: MemKind,
        words: u32,
        align_words: u32,
        power_on: bool,
    ) -> Result<MemHandle> {
        if words == 0 {
            return Err(MemoryError::InvalidParameter("zero-length allocation"));
        }
        let region = kind.descriptor();
        let bytes = region.words_to_bytes(words);
        let align = region.words_to_bytes(align_words.max(1)).max(region.align);

        let desc = self.desc(id)?;
        let core = desc.spec.core;
        let window = match pool_class(kind) {
            PoolClass::Xram | PoolClass::Yram => None,
            PoolClass::EsramCode => Some(desc.spec.esram_code),
            PoolClass::EsramData => Some(desc.spec.esram_data),
            PoolClass::SdramCode => Some(desc.spec.sdram_code),
            PoolClass::SdramData => Some(desc.spec.sdram_data),
        };
        let scratch = matches!(desc.kind, DomainKind::ScratchChild { .. }) && is_esram_data(kind);

        let offset = if scratch {
            let Some(DomainSlot::Used(desc)) = self.domains.get_mut(id.0 as usize) else {
                unreachable!()
            };
            let DomainKind::ScratchChild { sub, .. } = &mut desc.kind else {
                unreachable!()
            };
            let offset = sub.alloc(bytes, align);
            if offset.is_none() {
                log::warn!(
                    "scratch alloc failed: {} bytes of {:?}, status {:?}",
                    bytes,
                    kind,
                    sub.status()
                );
            }
            offset
        } else {
            let pool = self.cores[core as usize].for_kind(kind);
            let offset = match window {
                Some(w) if w.is_empty() => None,
                Some(w) => pool.alloc_in(bytes, align, w.offset, w.end()),
                None => pool.alloc(bytes, align),
            };
            if offset.is_none() {
                log::warn!(
                    "alloc failed: {} bytes of {:?} in domain {} (window {:?}), status {:?}",
                    bytes,
                    kind,
                    id.0,
                    window,
                    pool.status()
                );
            }
            offset
        };

        let offset = offset.ok_or(MemoryError::NoMoreMemory {
            kind,
            requested: bytes,
        })?;
        if power_on {
            self.power.bank_on(core, kind, offset, bytes);
        }
        Ok(MemHandle {
            core,
            domain: id.0,
            kind,
            offset,
            bytes,
        })
    }

    /// Release an allocation. With `power_off`, the backing bank is
    /// switched off before the chunk is returned to the allocator.
    pub fn free(&mut self, handle: MemHandle, power_off: bool) -> Result<()> {
        // Validate before touching power state.
        let scratch_child = match self.domains.get(handle.domain as usize) {
            Some(DomainSlot::Used(desc)) => {
                matches!(desc.kind, DomainKind::ScratchChild { .. }) && is_esram_data(handle.kind)
            }
            _ => false,
        };
        let live = if scratch_child {
            let Some(DomainSlot::Used(desc)) = self.domains.get(handle.domain as usize) else {
                unreachable!()
            };
            let DomainKind::ScratchChild { sub, .. } = &desc.kind else {
                unreachable!()
            };
            sub.is_allocated(handle.offset)
        } else {
            self.cores[handle.core as usize]
                .for_kind_ref(handle.kind)
                .is_allocated(handle.offset)
        };
        if !live {
            return Err(MemoryError::InvalidHandle);
        }

        if power_off {
            self.power
                .bank_off(handle.core, handle.kind, handle.offset, handle.bytes);
        }
        let freed = if scratch_child {
            let Some(DomainSlot::Used(desc)) = self.domains.get_mut(handle.domain as usize) else {
                unreachable!()
            };
            let DomainKind::ScratchChild { sub, .. } = &mut desc.kind else {
                unreachable!()
            };
            sub.free(handle.offset)
        } else {
            self.cores[handle.core as usize]
                .for_kind(handle.kind)
                .free(handle.offset)
        };
        debug_assert!(freed);
        Ok(())
    }

    /// Occupancy of the physical pool backing `kind` on `core`.
    pub fn allocator_status(&self, core: u8, kind: MemKind) -> Result<AllocStatus> {
        let pools = self
            .cores
            .get(core as usize)
            .ok_or(MemoryError::InvalidParameter("core id out of range"))?;
        Ok(pools.for_kind_ref(kind).status())
    }

    /// Absolute segment addresses of a domain.
    pub fn domain_abs_addresses(&self, id: DomainId) -> Result<DomainAddresses> {
        let desc = self.desc(id)?;
        Ok(DomainAddresses {
            esram_code: desc.spec.esram_code,
            esram_data: desc.spec.esram_data,
            sdram_code: desc.spec.sdram_code,
            sdram_data: desc.spec.sdram_data,
        })
    }

    /// Record that a component has been instantiated against `id`.
    pub fn component_bound(&mut self, id: DomainId) -> Result<()> {
        self.desc_mut(id)?.instances += 1;
        Ok(())
    }

    /// Record that a component instantiated against `id` went away.
    pub fn component_unbound(&mut self, id: DomainId) -> Result<()> {
        let desc = self.desc_mut(id)?;
        if desc.instances == 0 {
            return Err(MemoryError::IllegalDomainOperation(
                "no component bound to domain",
            ));
        }
        desc.instances -= 1;
        Ok(())
    }

    /// Domain reference count (scratch children for a parent).
    pub fn refcount(&self, id: DomainId) -> Result<u32> {
        Ok(self.desc(id)?.refcount)
    }
}
