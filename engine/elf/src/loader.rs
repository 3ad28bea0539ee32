//! Component lifecycle: parse, layout, materialization, relocation.
//!
//! A [`Component`] owns everything decoded from one ELF image. Loading
//! never touches target memory; layout (`compute_segments`) assigns
//! every mapped section an offset inside its region's segment; the
//! caller then allocates one block per region and hands the mappings in
//! through a [`SegmentArena`] for `load_segment` and
//! `relocate_segments`. Dropping the component releases every decoded
//! buffer and relocation table, on success and on every error path
//! alike.

use std::collections::HashMap;
use std::ops::Range;

use nmf_memory::{region_by_id, InstanceProperty, MemPurpose, RegionDescriptor, Sharing, NB_REGIONS};

use crate::mapping::region_for_section;
use crate::pack;
use crate::reader::{
    self, Ehdr, Elf32, Elf64, ElfClass, SectionFlags, Shdr, EI_CLASS, EI_DATA, ELFCLASS32,
    ELFCLASS64, ELFDATA2MSB, ELF_MAGIC, ET_EXEC, SHN_ABS, SHN_COMMON, SHN_UNDEF, SHT_PROGBITS,
    SHT_RELA, SHT_SYMTAB,
};
use crate::relocation::{read_operand, write_operand, RelocType, SymbolResolution, SymbolResolver};
use crate::{ElfError, Result};

/// `e_machine` value of MMDSP objects.
pub const EM_MMDSP: u16 = 0xa00d;

/// Name of the mandatory component-header section.
pub const NMF_SEGMENT_SECTION: &str = "nmf_segment";

/// Per-instance component.
pub const MAGIC_COMPONENT: u32 = u32::from_be_bytes(*b"NMFC");
/// Shared singleton component.
pub const MAGIC_SINGLETON: u32 = u32::from_be_bytes(*b"NMFS");
/// Firmware (shared, loaded at core bring-up).
pub const MAGIC_FIRMWARE: u32 = u32::from_be_bytes(*b"NMFF");

/// Component classification from the `nmf_segment` magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    Component,
    Singleton,
    Firmware,
}

impl ComponentKind {
    fn from_magic(magic: u32) -> Result<Self> {
        match magic {
            MAGIC_COMPONENT => Ok(Self::Component),
            MAGIC_SINGLETON => Ok(Self::Singleton),
            MAGIC_FIRMWARE => Ok(Self::Firmware),
            other => Err(ElfError::BadComponentMagic(other)),
        }
    }

    pub fn instance_property(self) -> InstanceProperty {
        match self {
            Self::Component => InstanceProperty::MultiInstance,
            Self::Singleton | Self::Firmware => InstanceProperty::Singleton,
        }
    }
}

/// Symbol classification of one relocation entry.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SymRef {
    /// Symbol value is already an absolute target address.
    Absolute,
    /// External symbol; name kept (leading underscore stripped) for late
    /// resolution.
    Undefined(String),
    /// Symbol defined in the given section of this image.
    Section(u16),
}

/// Decoded relocation-with-addend entry.
#[derive(Debug, Clone)]
struct RelocEntry {
    rtype: RelocType,
    /// Site offset within the owning section, in target words.
    offset: u64,
    addend: i64,
    sym: SymRef,
    sym_value: u64,
}

/// One ELF section plus everything the loader derived from it.
#[derive(Debug)]
pub struct Section {
    name: String,
    sh_type: u32,
    flags: SectionFlags,
    /// Raw (packed) file size; for NOBITS, the packed memory size.
    size: u64,
    addralign: u64,
    addr: u64,
    file_range: Option<Range<usize>>,
    /// Resolved memory-region id; `None` for sections outside the
    /// naming grammar.
    region: Option<u8>,
    /// Decoded size in host bytes once unpacked to native words.
    true_data_size: usize,
    decoded: Option<Vec<u8>>,
    /// Packed-byte offset inside the region segment; assigned once by
    /// `compute_segments`.
    seg_offset: Option<u64>,
    relocs: Vec<RelocEntry>,
}

impl Section {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn region_id(&self) -> Option<u8> {
        self.region
    }

    pub fn true_data_size(&self) -> usize {
        self.true_data_size
    }

    pub fn decoded(&self) -> Option<&[u8]> {
        self.decoded.as_deref()
    }

    /// Offset inside the region segment, in target words.
    pub fn seg_offset_words(&self) -> Option<u64> {
        let region = region_by_id(self.region?);
        Some(self.seg_offset? / region.file_ent_size as u64)
    }

    fn loadable(&self) -> bool {
        self.flags.contains(SectionFlags::ALLOC)
            && (self.sh_type == SHT_PROGBITS || self.sh_type == reader::SHT_NOBITS)
            && self.size > 0
    }
}

/// Per-region running totals and, in executable images, the implied
/// base word address.
#[derive(Debug, Clone, Copy, Default)]
struct SegmentAccum {
    /// Sum of packed section bytes placed so far (padding included).
    sum_size: u64,
    /// Largest word alignment requested by any section.
    max_align: u64,
    /// Executable images only: region base fixed by the first section.
    base: Option<u64>,
}

/// What the caller must allocate for one region segment.
#[derive(Debug, Clone, Copy)]
pub struct SegmentRequirement {
    pub region: &'static RegionDescriptor,
    /// Segment length in target words.
    pub words: u32,
    /// Host-side decoded length in bytes.
    pub host_bytes: usize,
    /// Required base alignment, in target words.
    pub align_words: u32,
}

/// Caller-provided view of one allocated region segment.
pub struct SegmentMapping<'a> {
    /// Host window over the segment (decoded-word layout).
    pub host: &'a mut [u8],
    /// Target word address of the segment base.
    pub target_addr: u32,
}

/// The set of allocated segments for one load, indexed by region id.
#[derive(Default)]
pub struct SegmentArena<'a> {
    slots: Vec<Option<SegmentMapping<'a>>>,
}

impl<'a> SegmentArena<'a> {
    pub fn new() -> Self {
        Self {
            slots: (0..NB_REGIONS).map(|_| None).collect(),
        }
    }

    pub fn insert(&mut self, region_id: u8, mapping: SegmentMapping<'a>) {
        if self.slots.is_empty() {
            self.slots = (0..NB_REGIONS).map(|_| None).collect();
        }
        self.slots[region_id as usize] = Some(mapping);
    }

    pub fn target_addr(&self, region_id: u8) -> Option<u32> {
        self.slots
            .get(region_id as usize)?
            .as_ref()
            .map(|m| m.target_addr)
    }

    fn get_mut(&mut self, region_id: u8) -> Option<&mut SegmentMapping<'a>> {
        self.slots.get_mut(region_id as usize)?.as_mut()
    }
}

/// Special-case record for descriptor-field relocations: the RELA table
/// whose target is the `nmf_segment` section itself.
#[derive(Debug, Clone, Copy)]
struct DescriptorReloc {
    offset: u64,
    sym_section: u16,
}

/// A fully parsed component image.
#[derive(Debug)]
pub struct Component {
    kind: ComponentKind,
    /// Position-fixed (ET_EXEC) image: declared virtual addresses are
    /// authoritative.
    linked: bool,
    sections: Vec<Section>,
    segments: [SegmentAccum; NB_REGIONS],
    descriptor_relocs: Vec<DescriptorReloc>,
    laid_out: bool,
}

impl Component {
    /// Parse an ELF image into a component descriptor.
    ///
    /// The machine type is validated before anything is decoded or
    /// allocated. All decoded buffers are owned by the returned value;
    /// any error leaves nothing behind.
    pub fn load(image: &[u8], expected_machine: u16) -> Result<Self> {
        if image.len() < 6 || image[..4] != ELF_MAGIC {
            return Err(ElfError::BadMagic);
        }
        if image[EI_DATA] != ELFDATA2MSB {
            return Err(ElfError::BadEncoding);
        }
        match image[EI_CLASS] {
            ELFCLASS64 => Self::load_class::<Elf64>(image, expected_machine),
            ELFCLASS32 => Self::load_class::<Elf32>(image, expected_machine),
            class => Err(ElfError::UnsupportedClass(class)),
        }
    }

    fn load_class<C: ElfClass>(image: &[u8], expected_machine: u16) -> Result<Self> {
        let ehdr = C::ehdr(image)?;
        if ehdr.e_machine != expected_machine {
            return Err(ElfError::WrongMachine {
                found: ehdr.e_machine,
                expected: expected_machine,
            });
        }
        if ehdr.e_shentsize as usize != C::SHDR_LEN {
            return Err(ElfError::Truncated("unexpected section header size"));
        }

        let shdrs = Self::read_shdrs::<C>(image, &ehdr)?;
        let shstrtab = section_bytes(image, shdrs.get(ehdr.e_shstrndx as usize))?;

        // First pass: names, region mapping and the component header.
        let names: Vec<&str> = shdrs
            .iter()
            .map(|sh| reader::str_at(shstrtab, sh.name))
            .collect::<Result<_>>()?;

        let nmf_index = names
            .iter()
            .position(|&n| n == NMF_SEGMENT_SECTION)
            .ok_or(ElfError::MissingNmfSegment)?;
        let nmf_data = section_bytes(image, shdrs.get(nmf_index))?;
        let magic = reader::read_u32(nmf_data, 0)
            .map_err(|_| ElfError::Truncated("nmf_segment header"))?;
        let kind = ComponentKind::from_magic(magic)?;
        let property = kind.instance_property();

        let mut sections: Vec<Section> = Vec::with_capacity(shdrs.len());
        for (sh, name) in shdrs.iter().zip(&names) {
            let region = region_for_section(name, property);
            // Header fields are untrusted; size and offset arithmetic
            // stays checked so a crafted image fails as Truncated
            // instead of overflowing.
            let true_data_size = match region {
                Some(r) => r
                    .bytes_to_words(sh.size)
                    .checked_mul(r.mem_ent_size as u64)
                    .and_then(|b| usize::try_from(b).ok())
                    .ok_or(ElfError::Truncated("section size"))?,
                None => 0,
            };
            let file_range = if sh.sh_type != reader::SHT_NOBITS && sh.size > 0 {
                let end = sh
                    .offset
                    .checked_add(sh.size)
                    .ok_or(ElfError::Truncated("section file range"))?;
                Some(sh.offset as usize..end as usize)
            } else {
                None
            };
            sections.push(Section {
                name: (*name).to_owned(),
                sh_type: sh.sh_type,
                flags: sh.flags,
                size: sh.size,
                addralign: sh.addralign,
                addr: sh.addr,
                file_range,
                region: region.map(|r| r.id),
                true_data_size,
                decoded: None,
                seg_offset: None,
                relocs: Vec::new(),
            });
        }

        // Second pass: decode mapped PROGBITS+ALLOC payloads to host
        // words.
        for section in &mut sections {
            let Some(region_id) = section.region else {
                continue;
            };
            if section.sh_type != SHT_PROGBITS || !section.flags.contains(SectionFlags::ALLOC) {
                continue;
            }
            if section.size == 0 {
                continue;
            }
            let region = region_by_id(region_id);
            if section.size % region.file_ent_size as u64 != 0 {
                return Err(ElfError::Truncated("section size not word-aligned"));
            }
            let src = image
                .get(section.file_range.clone().unwrap_or_default())
                .ok_or(ElfError::Truncated("section data"))?;
            let mut buf = vec![0u8; section.true_data_size];
            // The copy dispatch is closed over the region table; any
            // other combination means the table and the toolchain have
            // diverged.
            match (region.purpose, region.file_ent_size, region.mem_ent_size) {
                (MemPurpose::Code, 8, 8) => pack::copy_code64(&mut buf, src),
                (MemPurpose::Data, 3, 4) => pack::unpack24(&mut buf, src),
                (MemPurpose::Data, 4, 2) => pack::unpack16(&mut buf, src),
                (purpose, file_ent, mem_ent) => {
                    unreachable!("no copy routine for {purpose:?} {file_ent}/{mem_ent}")
                }
            }
            section.decoded = Some(buf);
        }

        // Third pass: decode relocation tables.
        let mut descriptor_relocs = Vec::new();
        for (idx, sh) in shdrs.iter().enumerate() {
            if sh.sh_type != SHT_RELA || sh.size == 0 {
                continue;
            }
            let target = sh.info as usize;
            if target >= sections.len() {
                return Err(ElfError::Truncated("relocation target index"));
            }
            let for_descriptor = target == nmf_index;
            if sections[target].region.is_none() && !for_descriptor {
                // Relocations against a section that is never loaded are
                // not even decoded.
                log::debug!(
                    "skipping relocations of `{}`: unmapped target `{}`",
                    names[idx],
                    sections[target].name
                );
                continue;
            }

            let symtab_idx = sh.link as usize;
            let symtab_sh = shdrs
                .get(symtab_idx)
                .filter(|s| s.sh_type == SHT_SYMTAB)
                .ok_or(ElfError::Truncated("relocation symbol table"))?;
            let symtab = section_bytes(image, Some(symtab_sh))?;
            let strtab = section_bytes(image, shdrs.get(symtab_sh.link as usize))?;

            if sh.size % C::RELA_LEN as u64 != 0 {
                return Err(ElfError::Truncated("relocation table size"));
            }
            let base = sh.offset as usize;
            let count = (sh.size / C::RELA_LEN as u64) as usize;
            for i in 0..count {
                let off = base
                    .checked_add(i * C::RELA_LEN)
                    .ok_or(ElfError::Truncated("relocation table"))?;
                let rela = C::rela(image, off)?;
                let sym_off = rela.sym as usize * C::SYM_LEN;
                let sym = C::sym(symtab, sym_off)?;

                if for_descriptor {
                    descriptor_relocs.push(DescriptorReloc {
                        offset: rela.offset,
                        sym_section: sym.shndx,
                    });
                    continue;
                }

                let rtype = RelocType::from_code(rela.rtype)
                    .ok_or(ElfError::UnsupportedRelocation(rela.rtype))?;
                let sym_ref = match sym.shndx {
                    SHN_COMMON => {
                        let name = reader::str_at(strtab, sym.name)?;
                        return Err(ElfError::CommonSymbol(name.to_owned()));
                    }
                    SHN_UNDEF => {
                        let name = reader::str_at(strtab, sym.name)?;
                        SymRef::Undefined(name.strip_prefix('_').unwrap_or(name).to_owned())
                    }
                    SHN_ABS => SymRef::Absolute,
                    shndx => SymRef::Section(shndx),
                };
                sections[target].relocs.push(RelocEntry {
                    rtype,
                    offset: rela.offset,
                    addend: rela.addend,
                    sym: sym_ref,
                    sym_value: sym.value,
                });
            }
        }

        Ok(Self {
            kind,
            linked: ehdr.e_type == ET_EXEC,
            sections,
            segments: [SegmentAccum::default(); NB_REGIONS],
            descriptor_relocs,
            laid_out: false,
        })
    }

    fn read_shdrs<C: ElfClass>(image: &[u8], ehdr: &Ehdr) -> Result<Vec<Shdr>> {
        let mut shdrs = Vec::with_capacity(ehdr.e_shnum as usize);
        for i in 0..ehdr.e_shnum as usize {
            let off = (ehdr.e_shoff as usize)
                .checked_add(i * C::SHDR_LEN)
                .ok_or(ElfError::Truncated("section header table"))?;
            shdrs.push(C::shdr(image, off)?);
        }
        Ok(shdrs)
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    pub fn section_by_name(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Assign every mapped loadable section its offset inside its
    /// region segment.
    ///
    /// Relocatable images pack sections first-come under their word
    /// alignment. Position-fixed images instead use the declared
    /// virtual addresses: the first section of a region fixes the
    /// region base, and every later section must agree with it. A
    /// disagreement means the loader's and the toolchain's layout
    /// assumptions have diverged, and the load fails.
    pub fn compute_segments(&mut self) -> Result<()> {
        for idx in 0..self.sections.len() {
            let section = &self.sections[idx];
            let Some(region_id) = section.region else {
                continue;
            };
            if !section.loadable() {
                continue;
            }
            let region = region_by_id(region_id);
            if section.size % region.file_ent_size as u64 != 0 {
                return Err(ElfError::Truncated("section size not word-aligned"));
            }
            let align_words = section.addralign.max(1);
            let seg = &mut self.segments[region_id as usize];

            let sum_words = seg.sum_size / region.file_ent_size as u64;
            let off_words = sum_words
                .div_ceil(align_words)
                .checked_mul(align_words)
                .ok_or(ElfError::SegmentOverflow)?;
            seg.sum_size = off_words
                .checked_mul(region.file_ent_size as u64)
                .ok_or(ElfError::SegmentOverflow)?;
            seg.max_align = seg.max_align.max(align_words);

            if self.linked {
                match seg.base {
                    None => {
                        let base = self.sections[idx].addr.checked_sub(off_words).ok_or_else(
                            || ElfError::InconsistentLayout(self.sections[idx].name.clone()),
                        )?;
                        seg.base = Some(base);
                    }
                    Some(base) => {
                        if base.checked_add(off_words) != Some(self.sections[idx].addr) {
                            return Err(ElfError::InconsistentLayout(
                                self.sections[idx].name.clone(),
                            ));
                        }
                    }
                }
            }

            let seg_sum = seg.sum_size;
            let size = self.sections[idx].size;
            self.sections[idx].seg_offset = Some(seg_sum);
            self.segments[region_id as usize].sum_size = seg_sum
                .checked_add(size)
                .ok_or(ElfError::SegmentOverflow)?;
        }
        self.laid_out = true;
        Ok(())
    }

    /// Raw packed byte count accumulated in one region segment.
    pub fn segment_sum_bytes(&self, region_id: u8) -> u64 {
        self.segments[region_id as usize].sum_size
    }

    /// Segments the caller must allocate before `load_segment`.
    pub fn segment_requirements(&self) -> Vec<SegmentRequirement> {
        debug_assert!(self.laid_out);
        self.segments
            .iter()
            .enumerate()
            .filter(|(_, seg)| seg.sum_size > 0)
            .map(|(id, seg)| {
                let region = region_by_id(id as u8);
                let words = region.bytes_to_words(seg.sum_size) as u32;
                SegmentRequirement {
                    region,
                    words,
                    host_bytes: words as usize * region.mem_ent_size as usize,
                    align_words: seg.max_align.max(1) as u32,
                }
            })
            .collect()
    }

    /// Memory region holding the descriptor field at `offset` words
    /// into the `nmf_segment` header, resolved through the descriptor's
    /// own relocation table.
    pub fn relocation_memory_of(&self, offset: u64) -> Option<&'static RegionDescriptor> {
        let entry = self
            .descriptor_relocs
            .iter()
            .find(|r| r.offset == offset)?;
        let section = self.sections.get(entry.sym_section as usize)?;
        section.region.map(region_by_id)
    }

    /// Whether a region's sharing mode participates in a load/relocate
    /// pass requesting `property`. A singleton's private data is, by
    /// construction, globally shared: all its regions match a sharable
    /// pass.
    fn matches_property(&self, sharing: Sharing, property: Sharing) -> bool {
        if self.kind != ComponentKind::Component && property == Sharing::Sharable {
            return true;
        }
        sharing == property
    }

    /// Copy every matching section into its allocated segment; NOBITS
    /// ranges are zeroed instead.
    pub fn load_segment(&self, property: Sharing, arena: &mut SegmentArena<'_>) -> Result<()> {
        debug_assert!(self.laid_out, "compute_segments must run first");
        for section in &self.sections {
            let (Some(region_id), Some(seg_offset)) = (section.region, section.seg_offset) else {
                continue;
            };
            let region = region_by_id(region_id);
            if !self.matches_property(region.sharing, property) {
                continue;
            }
            let mapping = arena
                .get_mut(region_id)
                .ok_or_else(|| ElfError::SectionNotLoaded(section.name.clone()))?;
            let host_off = (seg_offset / region.file_ent_size as u64)
                .checked_mul(region.mem_ent_size as u64)
                .and_then(|b| usize::try_from(b).ok())
                .ok_or(ElfError::SegmentOverflow)?;
            let host_end = host_off
                .checked_add(section.true_data_size)
                .ok_or(ElfError::SegmentOverflow)?;
            let dst = mapping
                .host
                .get_mut(host_off..host_end)
                .ok_or(ElfError::SegmentOverflow)?;
            match &section.decoded {
                Some(buf) => pack::burst_copy(dst, buf),
                None => pack::burst_zero(dst),
            }
            log::trace!(
                "loaded `{}` into {} at word {:#x} ({} bytes)",
                section.name,
                region.name,
                mapping.target_addr as u64 + seg_offset / region.file_ent_size as u64,
                section.true_data_size,
            );
        }
        Ok(())
    }

    /// Apply every relocation of every matching section.
    ///
    /// External symbols go through `resolver`; `Inert` skips one
    /// relocation, `OutOfMemory` and `Unresolved` abort the whole call.
    /// When several relocations share one operand word, the read side
    /// of the read-modify-write comes from the pristine decoded bytes,
    /// cached per site address for the duration of this call.
    pub fn relocate_segments(
        &self,
        property: Sharing,
        arena: &mut SegmentArena<'_>,
        resolver: &mut dyn SymbolResolver,
    ) -> Result<()> {
        debug_assert!(self.laid_out, "compute_segments must run first");
        let mut pristine: HashMap<u64, u64> = HashMap::new();

        for section in &self.sections {
            if section.relocs.is_empty() {
                continue;
            }
            let (Some(region_id), Some(seg_offset)) = (section.region, section.seg_offset) else {
                continue;
            };
            let region = region_by_id(region_id);
            if !self.matches_property(region.sharing, property) {
                continue;
            }
            let section_words = seg_offset / region.file_ent_size as u64;
            let section_base = arena
                .target_addr(region_id)
                .ok_or_else(|| ElfError::SectionNotLoaded(section.name.clone()))?
                as u64
                + section_words;

            for reloc in &section.relocs {
                let site_words = section_base
                    .checked_add(reloc.offset)
                    .ok_or(ElfError::SegmentOverflow)?;
                let resolved = match &reloc.sym {
                    SymRef::Absolute => reloc.sym_value,
                    SymRef::Section(shndx) => self.internal_symbol(arena, *shndx, reloc)?,
                    SymRef::Undefined(name) => {
                        match resolver.resolve(reloc.rtype, name, site_words as u32) {
                            SymbolResolution::Resolved(addr) => addr as u64,
                            SymbolResolution::Inert => continue,
                            SymbolResolution::Unresolved => {
                                log::warn!(
                                    "unresolved symbol `{name}` ({:?} at word {site_words:#x})",
                                    reloc.rtype
                                );
                                return Err(ElfError::UnresolvedSymbol(name.clone()));
                            }
                            SymbolResolution::OutOfMemory => return Err(ElfError::NoMoreMemory),
                        }
                    }
                };
                let addr = resolved.wrapping_add(reloc.addend as u64);
                let recipe = reloc.rtype.recipe();
                if recipe.overflows(addr) {
                    return Err(ElfError::RelocationOverflow);
                }

                let host_off = section_words
                    .checked_add(reloc.offset)
                    .and_then(|w| w.checked_mul(region.mem_ent_size as u64))
                    .and_then(|b| usize::try_from(b).ok())
                    .ok_or(ElfError::SegmentOverflow)?;
                let host_end = host_off
                    .checked_add(recipe.width)
                    .ok_or(ElfError::SegmentOverflow)?;
                let mapping = arena
                    .get_mut(region_id)
                    .ok_or_else(|| ElfError::SectionNotLoaded(section.name.clone()))?;
                let site = mapping
                    .host
                    .get_mut(host_off..host_end)
                    .ok_or(ElfError::SegmentOverflow)?;
                let current = read_operand(site, recipe.width);

                let pristine_value = match pristine.get(&site_words) {
                    Some(&value) => value,
                    None => {
                        let value = match &section.decoded {
                            Some(buf) => {
                                let off = reloc
                                    .offset
                                    .checked_mul(region.mem_ent_size as u64)
                                    .and_then(|b| usize::try_from(b).ok())
                                    .ok_or(ElfError::SegmentOverflow)?;
                                let end = off
                                    .checked_add(recipe.width)
                                    .ok_or(ElfError::SegmentOverflow)?;
                                read_operand(
                                    buf.get(off..end).ok_or(ElfError::SegmentOverflow)?,
                                    recipe.width,
                                )
                            }
                            // NOBITS: pristine contents are the zeroed
                            // target bytes.
                            None => current,
                        };
                        pristine.insert(site_words, value);
                        value
                    }
                };

                let new = recipe.apply(pristine_value, current, addr);
                write_operand(site, recipe.width, new);
                log::trace!(
                    "relocated {:?} at word {site_words:#x}: {current:#x} -> {new:#x}",
                    reloc.rtype
                );
            }
        }
        Ok(())
    }

    /// Resolve a symbol defined in section `shndx` of this image to an
    /// absolute target word address.
    fn internal_symbol(
        &self,
        arena: &SegmentArena<'_>,
        shndx: u16,
        reloc: &RelocEntry,
    ) -> Result<u64> {
        let target = self
            .sections
            .get(shndx as usize)
            .ok_or(ElfError::Truncated("relocation symbol section"))?;
        let (Some(region_id), Some(seg_offset)) = (target.region, target.seg_offset) else {
            return Err(ElfError::SectionNotLoaded(target.name.clone()));
        };
        let region = region_by_id(region_id);
        let base = arena
            .target_addr(region_id)
            .ok_or_else(|| ElfError::SectionNotLoaded(target.name.clone()))?;
        let section_addr = base as u64 + seg_offset / region.file_ent_size as u64;
        // Out-of-range results are caught by the recipe overflow check.
        Ok(section_addr.wrapping_add(reloc.sym_value))
    }
}

/// File bytes of one section header, bounds-checked against the image.
/// The end offset is computed checked: `sh_offset` and `sh_size` are
/// untrusted and may be crafted to wrap.
fn section_bytes<'a>(image: &'a [u8], shdr: Option<&Shdr>) -> Result<&'a [u8]> {
    let shdr = shdr.ok_or(ElfError::Truncated("section index"))?;
    if shdr.sh_type == reader::SHT_NOBITS {
        return Ok(&[]);
    }
    let end = shdr
        .offset
        .checked_add(shdr.size)
        .ok_or(ElfError::Truncated("section data"))?;
    image
        .get(shdr.offset as usize..end as usize)
        .ok_or(ElfError::Truncated("section data"))
}
