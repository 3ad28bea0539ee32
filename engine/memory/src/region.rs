//! MMDSP memory-region classes.
//!
//! The target DSP sees several distinct memories: internal X/Y RAM
//! (24-bit data words), external SDRAM and embedded ESRAM (code, 24-bit
//! data and 16-bit data views), plus a locked/cacheable code region.
//! Each class is described once, at compile time, by a
//! [`RegionDescriptor`]; the loader and the domain allocator only ever
//! look the descriptors up, never mutate them.

use static_assertions::const_assert_eq;

/// What a region holds. Drives the section-copy dispatch in the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemPurpose {
    Code,
    Data,
}

/// Whether one loaded image of a section may be shared by all component
/// instances, or each instance gets its own copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sharing {
    Sharable,
    Private,
}

/// How a component is being loaded. Selects the private region variants
/// for banks that have one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceProperty {
    /// Per-instance component: private data banks get the private variant.
    MultiInstance,
    /// Singleton or firmware: one shared image for everybody.
    Singleton,
}

/// Memory-region class. The discriminant is the region id and indexes
/// [`REGIONS`] directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MemKind {
    SdramCode = 0,
    InternalXram24 = 1,
    InternalYram24 = 2,
    SdramExt24 = 3,
    SdramExt16 = 4,
    EsramExt24 = 5,
    EsramExt16 = 6,
    EsramCode = 7,
    XramPriv24 = 8,
    YramPriv24 = 9,
    SdramPriv24 = 10,
    EsramPriv24 = 11,
    LockedCode = 12,
}

/// Number of region classes; region ids are `0..NB_REGIONS`.
pub const NB_REGIONS: usize = 13;

/// Immutable description of one memory-region class.
#[derive(Debug)]
pub struct RegionDescriptor {
    /// Region id, equal to this entry's index in [`REGIONS`].
    pub id: u8,
    pub kind: MemKind,
    /// Target base address contribution; 0 for relative/allocated regions.
    pub base: u32,
    /// Minimum alignment, in bytes, of anything placed in this region.
    pub align: u32,
    pub sharing: Sharing,
    pub purpose: MemPurpose,
    /// On-disk bytes per target word (packed ELF encoding).
    pub file_ent_size: u32,
    /// In-memory bytes per target word once unpacked to host words.
    pub mem_ent_size: u32,
    /// Human-readable name, used in diagnostics.
    pub name: &'static str,
}

impl RegionDescriptor {
    /// Decoded (host) byte count for `file_bytes` of packed section data.
    pub fn true_data_size(&self, file_bytes: u64) -> u64 {
        (file_bytes / self.file_ent_size as u64) * self.mem_ent_size as u64
    }

    /// Packed file/target byte count to whole target words.
    pub fn bytes_to_words(&self, file_bytes: u64) -> u64 {
        file_bytes / self.file_ent_size as u64
    }

    /// Target word count to in-memory byte count.
    pub fn words_to_bytes(&self, words: u32) -> u32 {
        words * self.mem_ent_size
    }
}

/// The region table. Code regions use 64-bit big-endian words (8 bytes on
/// disk and in memory); 24-bit data banks pack three bytes per word on
/// disk and expand to four in memory; 16-bit banks carry one pad byte per
/// data byte on disk and collapse to two bytes in memory.
pub static REGIONS: [RegionDescriptor; NB_REGIONS] = [
    RegionDescriptor { id: 0, kind: MemKind::SdramCode, base: 0, align: 8, sharing: Sharing::Sharable, purpose: MemPurpose::Code, file_ent_size: 8, mem_ent_size: 8, name: "sdram code" },
    RegionDescriptor { id: 1, kind: MemKind::InternalXram24, base: 0, align: 4, sharing: Sharing::Sharable, purpose: MemPurpose::Data, file_ent_size: 3, mem_ent_size: 4, name: "xram24" },
    RegionDescriptor { id: 2, kind: MemKind::InternalYram24, base: 0, align: 4, sharing: Sharing::Sharable, purpose: MemPurpose::Data, file_ent_size: 3, mem_ent_size: 4, name: "yram24" },
    RegionDescriptor { id: 3, kind: MemKind::SdramExt24, base: 0, align: 4, sharing: Sharing::Sharable, purpose: MemPurpose::Data, file_ent_size: 3, mem_ent_size: 4, name: "sdram ext24" },
    RegionDescriptor { id: 4, kind: MemKind::SdramExt16, base: 0, align: 2, sharing: Sharing::Sharable, purpose: MemPurpose::Data, file_ent_size: 4, mem_ent_size: 2, name: "sdram ext16" },
    RegionDescriptor { id: 5, kind: MemKind::EsramExt24, base: 0, align: 4, sharing: Sharing::Sharable, purpose: MemPurpose::Data, file_ent_size: 3, mem_ent_size: 4, name: "esram ext24" },
    RegionDescriptor { id: 6, kind: MemKind::EsramExt16, base: 0, align: 2, sharing: Sharing::Sharable, purpose: MemPurpose::Data, file_ent_size: 4, mem_ent_size: 2, name: "esram ext16" },
    RegionDescriptor { id: 7, kind: MemKind::EsramCode, base: 0, align: 8, sharing: Sharing::Sharable, purpose: MemPurpose::Code, file_ent_size: 8, mem_ent_size: 8, name: "esram code" },
    RegionDescriptor { id: 8, kind: MemKind::XramPriv24, base: 0, align: 4, sharing: Sharing::Private, purpose: MemPurpose::Data, file_ent_size: 3, mem_ent_size: 4, name: "xram24 private" },
    RegionDescriptor { id: 9, kind: MemKind::YramPriv24, base: 0, align: 4, sharing: Sharing::Private, purpose: MemPurpose::Data, file_ent_size: 3, mem_ent_size: 4, name: "yram24 private" },
    RegionDescriptor { id: 10, kind: MemKind::SdramPriv24, base: 0, align: 4, sharing: Sharing::Private, purpose: MemPurpose::Data, file_ent_size: 3, mem_ent_size: 4, name: "sdram ext24 private" },
    RegionDescriptor { id: 11, kind: MemKind::EsramPriv24, base: 0, align: 4, sharing: Sharing::Private, purpose: MemPurpose::Data, file_ent_size: 3, mem_ent_size: 4, name: "esram ext24 private" },
    RegionDescriptor { id: 12, kind: MemKind::LockedCode, base: 0, align: 8, sharing: Sharing::Sharable, purpose: MemPurpose::Code, file_ent_size: 8, mem_ent_size: 8, name: "locked code" },
];

const_assert_eq!(NB_REGIONS, 13);

/// Direct lookup by region id. Infallible for valid ids.
pub fn region_by_id(id: u8) -> &'static RegionDescriptor {
    &REGIONS[id as usize]
}

impl MemKind {
    pub fn descriptor(self) -> &'static RegionDescriptor {
        region_by_id(self as u8)
    }
}

/// Canonical code segment and canonical "this" (private data) segment for
/// a component being loaded with the given instance property.
///
/// A per-instance component keeps its instance state in private X-RAM; a
/// singleton's state is still private to the singleton but lives in
/// private SDRAM, where a single shared copy is cheap.
pub fn serialize_memories(
    property: InstanceProperty,
) -> (&'static RegionDescriptor, &'static RegionDescriptor) {
    let code = region_by_id(MemKind::SdramCode as u8);
    let this = match property {
        InstanceProperty::MultiInstance => region_by_id(MemKind::XramPriv24 as u8),
        InstanceProperty::Singleton => region_by_id(MemKind::SdramPriv24 as u8),
    };
    (code, this)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_ids_match_table_index() {
        for (idx, region) in REGIONS.iter().enumerate() {
            assert_eq!(region.id as usize, idx);
            assert_eq!(region.kind as usize, idx);
        }
    }

    #[test]
    fn test_true_data_size_24bit() {
        let xram = region_by_id(MemKind::InternalXram24 as u8);
        // 12 packed bytes = 4 words = 16 host bytes.
        assert_eq!(xram.true_data_size(12), 16);
        assert_eq!(xram.bytes_to_words(12), 4);
    }

    #[test]
    fn test_true_data_size_16bit_and_code() {
        let ext16 = region_by_id(MemKind::SdramExt16 as u8);
        assert_eq!(ext16.true_data_size(8), 4);

        let code = region_by_id(MemKind::SdramCode as u8);
        assert_eq!(code.true_data_size(24), 24);
    }

    #[test]
    fn test_serialize_memories_selects_this_segment() {
        let (code, this) = serialize_memories(InstanceProperty::MultiInstance);
        assert_eq!(code.kind, MemKind::SdramCode);
        assert_eq!(this.kind, MemKind::XramPriv24);

        let (_, this) = serialize_memories(InstanceProperty::Singleton);
        assert_eq!(this.kind, MemKind::SdramPriv24);
    }
}
