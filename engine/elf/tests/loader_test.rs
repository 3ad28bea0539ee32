//! End-to-end loader tests over synthetic big-endian images.

use nmf_elf::fixtures::ImageBuilder;
use nmf_elf::loader::SegmentRequirement;
use nmf_elf::reader::{SHN_COMMON, SHN_UNDEF};
use nmf_elf::{
    Component, ComponentKind, ElfError, RelocType, SegmentArena, SegmentMapping, SymbolResolution,
    SymbolResolver, EM_MMDSP, MAGIC_SINGLETON,
};
use nmf_memory::{MemKind, Sharing};

/// Pack host 24-bit values into the 3-bytes-per-word file encoding.
fn pack24_file(words: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(words.len() * 3);
    for w in words {
        out.extend_from_slice(&[(w >> 16) as u8, (w >> 8) as u8, *w as u8]);
    }
    out
}

/// Allocate one host buffer per required segment and map everything
/// into an arena at synthetic target addresses spaced 0x1000 words
/// apart.
fn map_segments<'a>(
    reqs: &[SegmentRequirement],
    buffers: &'a mut Vec<Vec<u8>>,
) -> (SegmentArena<'a>, Vec<(u8, u32)>) {
    buffers.clear();
    for req in reqs {
        buffers.push(vec![0u8; req.host_bytes]);
    }
    let mut arena = SegmentArena::new();
    let mut bases = Vec::new();
    for (i, (req, buf)) in reqs.iter().zip(buffers.iter_mut()).enumerate() {
        let target_addr = 0x1000 * (i as u32 + 1);
        bases.push((req.region.id, target_addr));
        arena.insert(
            req.region.id,
            SegmentMapping {
                host: buf,
                target_addr,
            },
        );
    }
    (arena, bases)
}

/// Route `log` output through the test harness for `RUST_LOG` runs.
fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct MapResolver(Vec<(&'static str, SymbolResolution)>);

impl SymbolResolver for MapResolver {
    fn resolve(&mut self, _rtype: RelocType, name: &str, _site: u32) -> SymbolResolution {
        self.0
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, r)| *r)
            .unwrap_or(SymbolResolution::Unresolved)
    }
}

#[test]
fn test_layout_of_packed_data_section() {
    let mut b = ImageBuilder::new();
    b.component_header();
    b.progbits("mem1.1", 1, &pack24_file(&[1, 2, 3, 4]));
    b.unmapped(".debug_foo", &[0xde, 0xad]);
    let image = b.build();

    let mut comp = Component::load(&image, EM_MMDSP).unwrap();
    assert_eq!(comp.kind(), ComponentKind::Component);
    comp.compute_segments().unwrap();

    let sect = comp.section_by_name("mem1.1").unwrap();
    // 12 packed bytes of 3-byte words unpack to 16 host bytes.
    assert_eq!(sect.true_data_size(), 16);
    assert_eq!(sect.seg_offset_words(), Some(0));
    // A per-instance component maps bank 1 to the private xram region.
    assert_eq!(sect.region_id(), Some(MemKind::XramPriv24 as u8));
    assert_eq!(comp.segment_sum_bytes(MemKind::XramPriv24 as u8), 12);

    // Sections outside the grammar are carried but never decoded or
    // placed.
    let debug = comp.section_by_name(".debug_foo").unwrap();
    assert_eq!(debug.region_id(), None);
    assert!(debug.decoded().is_none());
    assert_eq!(debug.seg_offset_words(), None);
}

#[test]
fn test_singleton_maps_shared_bank() {
    let mut b = ImageBuilder::new();
    b.nmf_header(MAGIC_SINGLETON, &[]);
    b.progbits("mem1.1", 1, &pack24_file(&[7]));
    let image = b.build();

    let comp = Component::load(&image, EM_MMDSP).unwrap();
    assert_eq!(comp.kind(), ComponentKind::Singleton);
    let sect = comp.section_by_name("mem1.1").unwrap();
    assert_eq!(sect.region_id(), Some(MemKind::InternalXram24 as u8));
}

#[test]
fn test_wrong_machine_is_rejected_up_front() {
    let mut b = ImageBuilder::new().machine(0x1234);
    b.component_header();
    b.progbits("mem1.1", 1, &pack24_file(&[1]));
    let image = b.build();

    let err = Component::load(&image, EM_MMDSP).unwrap_err();
    assert_eq!(
        err,
        ElfError::WrongMachine {
            found: 0x1234,
            expected: EM_MMDSP
        }
    );
}

#[test]
fn test_missing_component_header() {
    let mut b = ImageBuilder::new();
    b.progbits("mem1.1", 1, &pack24_file(&[1]));
    let image = b.build();
    assert_eq!(
        Component::load(&image, EM_MMDSP).unwrap_err(),
        ElfError::MissingNmfSegment
    );
}

#[test]
fn test_common_symbols_are_rejected() {
    let mut b = ImageBuilder::new();
    b.component_header();
    let data = b.progbits("mem1.1", 1, &pack24_file(&[0]));
    let sym = b.symbol("shared_buf", 4, SHN_COMMON);
    b.rela(data, 0, 3, sym, 0);
    let image = b.build();

    assert_eq!(
        Component::load(&image, EM_MMDSP).unwrap_err(),
        ElfError::CommonSymbol("shared_buf".to_owned())
    );
}

#[test]
fn test_layout_is_deterministic() {
    let mut b = ImageBuilder::new();
    b.component_header();
    b.progbits("mem1.1", 1, &pack24_file(&[1, 2]));
    b.progbits("mem1.2", 4, &pack24_file(&[3, 4, 5]));
    b.progbits("mem10", 1, &[0u8; 16]);
    let image = b.build();

    let offsets = |image: &[u8]| -> Vec<Option<u64>> {
        let mut comp = Component::load(image, EM_MMDSP).unwrap();
        comp.compute_segments().unwrap();
        comp.sections().map(|s| s.seg_offset_words()).collect()
    };
    assert_eq!(offsets(&image), offsets(&image));

    // Alignment: mem1.2 requested 4-word alignment and follows 2 words
    // of mem1.1 in the same private-xram segment.
    let mut comp = Component::load(&image, EM_MMDSP).unwrap();
    comp.compute_segments().unwrap();
    assert_eq!(
        comp.section_by_name("mem1.2").unwrap().seg_offset_words(),
        Some(4)
    );
    // 4 words of padding-included offset plus 3 words of payload.
    assert_eq!(comp.segment_sum_bytes(MemKind::XramPriv24 as u8), 21);
}

#[test]
fn test_executable_layout_consistency() {
    let mut b = ImageBuilder::new().executable();
    b.nmf_header(MAGIC_SINGLETON, &[]);
    let s1 = b.progbits("mem1.1", 1, &pack24_file(&[1, 2]));
    let s2 = b.progbits("mem1.2", 1, &pack24_file(&[3]));
    b.set_addr(s1, 0x400);
    b.set_addr(s2, 0x402);
    let image = b.build();
    let mut comp = Component::load(&image, EM_MMDSP).unwrap();
    comp.compute_segments().unwrap();

    // Disagreeing virtual address for the second section of the region.
    let mut b = ImageBuilder::new().executable();
    b.nmf_header(MAGIC_SINGLETON, &[]);
    let s1 = b.progbits("mem1.1", 1, &pack24_file(&[1, 2]));
    let s2 = b.progbits("mem1.2", 1, &pack24_file(&[3]));
    b.set_addr(s1, 0x400);
    b.set_addr(s2, 0x500);
    let image = b.build();
    let mut comp = Component::load(&image, EM_MMDSP).unwrap();
    assert_eq!(
        comp.compute_segments().unwrap_err(),
        ElfError::InconsistentLayout("mem1.2".to_owned())
    );
}

#[test]
fn test_wrapping_section_offset_is_rejected() {
    init_logs();
    let mut b = ImageBuilder::new();
    b.component_header();
    b.progbits("mem1.1", 1, &pack24_file(&[1]));
    let mut image = b.build();

    // Corrupt the section-name string table header so its file offset
    // plus its size wraps around the u64 range.
    let e_shoff = u64::from_be_bytes(image[40..48].try_into().unwrap()) as usize;
    let shstrndx = u16::from_be_bytes(image[62..64].try_into().unwrap()) as usize;
    let sh = e_shoff + shstrndx * 64;
    image[sh + 24..sh + 32].copy_from_slice(&u64::MAX.to_be_bytes());

    assert!(matches!(
        Component::load(&image, EM_MMDSP),
        Err(ElfError::Truncated(_))
    ));
}

#[test]
fn test_wrapping_relocation_offset_is_rejected() {
    init_logs();
    let mut b = ImageBuilder::new();
    b.nmf_header(MAGIC_SINGLETON, &[]);
    let data = b.progbits("mem1.1", 1, &pack24_file(&[0]));
    let abs = b.abs_symbol("rom_entry", 0x100);
    b.rela(data, u64::MAX, 3, abs, 0);
    let image = b.build();

    let mut comp = Component::load(&image, EM_MMDSP).unwrap();
    comp.compute_segments().unwrap();
    let reqs = comp.segment_requirements();
    let mut buffers = Vec::new();
    let (mut arena, _) = map_segments(&reqs, &mut buffers);
    comp.load_segment(Sharing::Sharable, &mut arena).unwrap();

    let mut resolver = MapResolver(Vec::new());
    let err = comp
        .relocate_segments(Sharing::Sharable, &mut arena, &mut resolver)
        .unwrap_err();
    assert_eq!(err, ElfError::SegmentOverflow);
}

#[test]
fn test_load_and_relocate_round_trip() {
    init_logs();
    let mut b = ImageBuilder::new();
    b.nmf_header(MAGIC_SINGLETON, &[]);
    // Word 0: Abs24 against an absolute symbol. Word 1: Imm16 against
    // an external, with a pristine low field of 0x10.
    let data = b.progbits("mem1.1", 1, &pack24_file(&[0, 0x10]));
    let other = b.progbits("mem2.1", 1, &pack24_file(&[0]));
    let abs = b.abs_symbol("rom_entry", 0x100);
    let ext = b.symbol("ext_fn", 0, SHN_UNDEF);
    let internal = b.symbol("peer", 0, data);
    b.rela(data, 0, 3, abs, 2);
    b.rela(data, 1, 4, ext, 0);
    b.rela(other, 0, 3, internal, 0);
    let image = b.build();

    let mut comp = Component::load(&image, EM_MMDSP).unwrap();
    comp.compute_segments().unwrap();
    let reqs = comp.segment_requirements();
    let mut buffers = Vec::new();
    let (mut arena, bases) = map_segments(&reqs, &mut buffers);

    comp.load_segment(Sharing::Sharable, &mut arena).unwrap();
    let mut resolver = MapResolver(vec![("ext_fn", SymbolResolution::Resolved(0x200))]);
    comp.relocate_segments(Sharing::Sharable, &mut arena, &mut resolver)
        .unwrap();

    let xram = bases
        .iter()
        .find(|(id, _)| *id == MemKind::InternalXram24 as u8)
        .unwrap();
    let yram_base = bases
        .iter()
        .find(|(id, _)| *id == MemKind::InternalYram24 as u8)
        .unwrap()
        .1;
    assert!(xram.1 != yram_base);

    let word = |buf: &[u8], i: usize| u32::from_ne_bytes(buf[i * 4..i * 4 + 4].try_into().unwrap());
    let xram_buf = &buffers[reqs
        .iter()
        .position(|r| r.region.id == MemKind::InternalXram24 as u8)
        .unwrap()];
    // Absolute symbol 0x100 plus addend 2.
    assert_eq!(word(xram_buf, 0), 0x102);
    // Pristine field 0x10 plus the resolved external address.
    assert_eq!(word(xram_buf, 1), 0x210);

    let yram_buf = &buffers[reqs
        .iter()
        .position(|r| r.region.id == MemKind::InternalYram24 as u8)
        .unwrap()];
    // Internal symbol: word address of mem1.1's segment base.
    assert_eq!(word(yram_buf, 0), xram.1 & 0x00ff_ffff);
}

#[test]
fn test_inert_symbol_leaves_site_untouched() {
    init_logs();
    let mut b = ImageBuilder::new();
    b.nmf_header(MAGIC_SINGLETON, &[]);
    let data = b.progbits("mem1.1", 1, &pack24_file(&[0x00ab_cdef]));
    let ext = b.symbol("optional_hook", 0, SHN_UNDEF);
    b.rela(data, 0, 3, ext, 0);
    let image = b.build();

    let mut comp = Component::load(&image, EM_MMDSP).unwrap();
    comp.compute_segments().unwrap();
    let reqs = comp.segment_requirements();
    let mut buffers = Vec::new();
    let (mut arena, _) = map_segments(&reqs, &mut buffers);
    comp.load_segment(Sharing::Sharable, &mut arena).unwrap();

    let mut resolver = MapResolver(vec![("optional_hook", SymbolResolution::Inert)]);
    comp.relocate_segments(Sharing::Sharable, &mut arena, &mut resolver)
        .unwrap();
    assert_eq!(
        u32::from_ne_bytes(buffers[0][0..4].try_into().unwrap()),
        0x00ab_cdef
    );
}

#[test]
fn test_resolver_failures_abort_the_call() {
    init_logs();
    let build = || {
        let mut b = ImageBuilder::new();
        b.nmf_header(MAGIC_SINGLETON, &[]);
        let data = b.progbits("mem1.1", 1, &pack24_file(&[0]));
        let ext = b.symbol("missing", 0, SHN_UNDEF);
        b.rela(data, 0, 4, ext, 0);
        b.build()
    };

    for (resolution, expected) in [
        (
            SymbolResolution::Unresolved,
            ElfError::UnresolvedSymbol("missing".to_owned()),
        ),
        (SymbolResolution::OutOfMemory, ElfError::NoMoreMemory),
    ] {
        let image = build();
        let mut comp = Component::load(&image, EM_MMDSP).unwrap();
        comp.compute_segments().unwrap();
        let reqs = comp.segment_requirements();
        let mut buffers = Vec::new();
        let (mut arena, _) = map_segments(&reqs, &mut buffers);
        comp.load_segment(Sharing::Sharable, &mut arena).unwrap();
        let mut resolver = MapResolver(vec![("missing", resolution)]);
        let err = comp
            .relocate_segments(Sharing::Sharable, &mut arena, &mut resolver)
            .unwrap_err();
        assert_eq!(err, expected);
    }
}

#[test]
fn test_nobits_sections_are_zero_filled() {
    let mut b = ImageBuilder::new();
    b.nmf_header(MAGIC_SINGLETON, &[]);
    b.progbits("mem1.1", 1, &pack24_file(&[0xffffff]));
    b.nobits("mem1.2", 1, 6); // two 24-bit words
    let image = b.build();

    let mut comp = Component::load(&image, EM_MMDSP).unwrap();
    comp.compute_segments().unwrap();
    let reqs = comp.segment_requirements();
    assert_eq!(reqs.len(), 1);

    // Dirty the host window first so the zero fill is observable.
    let mut buf = vec![0xaau8; reqs[0].host_bytes];
    let mut arena = SegmentArena::new();
    arena.insert(
        reqs[0].region.id,
        SegmentMapping {
            host: &mut buf,
            target_addr: 0x1000,
        },
    );
    comp.load_segment(Sharing::Sharable, &mut arena).unwrap();

    let words: Vec<u32> = (0..3)
        .map(|i| u32::from_ne_bytes(buf[i * 4..i * 4 + 4].try_into().unwrap()))
        .collect();
    assert_eq!(words, vec![0x00ff_ffff, 0, 0]);
}

#[test]
fn test_relocations_on_unmapped_targets_are_skipped() {
    init_logs();
    let mut b = ImageBuilder::new();
    b.nmf_header(MAGIC_SINGLETON, &[]);
    b.progbits("mem1.1", 1, &pack24_file(&[0]));
    let debug = b.unmapped(".debug_line", &[0u8; 8]);
    let ext = b.symbol("dbg", 0, SHN_UNDEF);
    b.rela(debug, 0, 3, ext, 0);
    let image = b.build();

    // The external symbol of the debug relocation never reaches the
    // resolver, so a load with no resolutions at all still succeeds.
    let mut comp = Component::load(&image, EM_MMDSP).unwrap();
    comp.compute_segments().unwrap();
    let reqs = comp.segment_requirements();
    let mut buffers = Vec::new();
    let (mut arena, _) = map_segments(&reqs, &mut buffers);
    comp.load_segment(Sharing::Sharable, &mut arena).unwrap();
    let mut resolver = MapResolver(Vec::new());
    comp.relocate_segments(Sharing::Sharable, &mut arena, &mut resolver)
        .unwrap();
}

#[test]
fn test_descriptor_field_region_lookup() {
    let mut b = ImageBuilder::new();
    let hdr = b.nmf_header(MAGIC_SINGLETON, &[0, 0]);
    let code = b.progbits("mem10", 1, &[0u8; 8]);
    let sym = b.symbol("method_entry", 0, code);
    b.rela(hdr, 1, 3, sym, 0);
    let image = b.build();

    let comp = Component::load(&image, EM_MMDSP).unwrap();
    let region = comp.relocation_memory_of(1).unwrap();
    assert_eq!(region.kind, MemKind::SdramCode);
    assert!(comp.relocation_memory_of(7).is_none());
}
