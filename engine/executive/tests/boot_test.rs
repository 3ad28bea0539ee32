//! Executive bring-up against a mock DSP core.

use std::time::Duration;

use nmf_elf::fixtures::ImageBuilder;
use nmf_elf::reader::SHN_UNDEF;
use nmf_elf::{MAGIC_COMPONENT, MAGIC_FIRMWARE};
use nmf_executive::engine::{ExecutiveParams, SYM_STACK_TOP};
use nmf_executive::{BootError, DspCore, ExecutiveEngine, BOOT_FLAG_READY};
use nmf_memory::{CoreMemoryConfig, DomainManager, MemKind, PoolSpec};

struct MockCore {
    /// Handshake polls to absorb before reporting ready; `None` never
    /// reports ready.
    ready_after: Option<u32>,
    polls: u32,
    started: bool,
    stopped: bool,
    writes: Vec<(MemKind, u32, Vec<u8>)>,
}

impl MockCore {
    fn new(ready_after: Option<u32>) -> Self {
        Self {
            ready_after,
            polls: 0,
            started: false,
            stopped: false,
            writes: Vec::new(),
        }
    }
}

impl DspCore for MockCore {
    fn write_segment(&mut self, kind: MemKind, word_addr: u32, bytes: &[u8]) {
        self.writes.push((kind, word_addr, bytes.to_vec()));
    }

    fn start(&mut self) {
        self.started = true;
    }

    fn stop(&mut self) {
        self.stopped = true;
    }

    fn read_boot_flag(&mut self) -> u32 {
        if !self.started {
            return 0;
        }
        self.polls += 1;
        match self.ready_after {
            Some(n) if self.polls > n => BOOT_FLAG_READY,
            _ => 0,
        }
    }
}

fn manager() -> DomainManager {
    let _ = env_logger::builder().is_test(true).try_init();
    DomainManager::new(vec![CoreMemoryConfig {
        xram: PoolSpec { base: 0, size: 0x4000 },
        yram: PoolSpec { base: 0x4000, size: 0x4000 },
        sdram_code: PoolSpec { base: 0x10_0000, size: 0x1_0000 },
        sdram_data: PoolSpec { base: 0x20_0000, size: 0x1_0000 },
        esram_code: PoolSpec { base: 0x30_0000, size: 0x8000 },
        esram_data: PoolSpec { base: 0x31_0000, size: 0x8000 },
    }])
}

/// Minimal firmware: one code word, one data word whose sole relocation
/// takes the stack-top service address.
fn firmware_image() -> Vec<u8> {
    let mut b = ImageBuilder::new();
    b.nmf_header(MAGIC_FIRMWARE, &[]);
    b.progbits("mem10", 1, &[0u8; 8]);
    let data = b.progbits("mem1.1", 1, &[0, 0, 0]);
    let sym = b.symbol(SYM_STACK_TOP, 0, SHN_UNDEF);
    b.rela(data, 0, 3, sym, 0);
    b.build()
}

fn params() -> ExecutiveParams {
    ExecutiveParams {
        stack_words: 16,
        panic_words: 8,
        trace_words: 8,
        boot_timeout: Duration::from_millis(50),
        poll_interval: Duration::from_millis(1),
    }
}

#[test]
fn test_boot_reaches_handshake() {
    let mut mgr = manager();
    let mut core = MockCore::new(Some(3));
    let engine = ExecutiveEngine::new(params());
    let domain = mgr.core_domain(0);

    let state = engine
        .boot(&mut core, &mut mgr, domain, &firmware_image())
        .unwrap();
    assert!(core.started);
    assert!(!core.stopped);
    assert_eq!(core.writes.len(), 2);

    // The data segment lands at xram word 0 and its relocation carries
    // the stack-top address: one data word of segment, then the stack.
    let (kind, addr, bytes) = core
        .writes
        .iter()
        .find(|(k, _, _)| *k == MemKind::InternalXram24)
        .unwrap();
    assert_eq!((*kind, *addr), (MemKind::InternalXram24, 0));
    let stack_top = 1 + params().stack_words;
    assert_eq!(
        u32::from_ne_bytes(bytes[0..4].try_into().unwrap()),
        stack_top
    );

    assert_ne!(state.trace_buffer(), state.panic_area());

    engine.shutdown(state, &mut core, &mut mgr).unwrap();
    assert!(core.stopped);
    for kind in [MemKind::SdramCode, MemKind::InternalXram24, MemKind::SdramExt24] {
        assert_eq!(mgr.allocator_status(0, kind).unwrap().used, 0);
    }
}

#[test]
fn test_boot_timeout_unwinds() {
    let mut mgr = manager();
    let mut core = MockCore::new(None);
    let engine = ExecutiveEngine::new(params());
    let domain = mgr.core_domain(0);

    let err = engine
        .boot(&mut core, &mut mgr, domain, &firmware_image())
        .unwrap_err();
    assert!(matches!(err, BootError::Timeout(_)));
    assert!(core.started);
    assert!(core.stopped);
    // Everything allocated during the attempt is back in the pools.
    for kind in [
        MemKind::SdramCode,
        MemKind::InternalXram24,
        MemKind::SdramPriv24,
        MemKind::SdramExt24,
    ] {
        assert_eq!(mgr.allocator_status(0, kind).unwrap().used, 0);
    }
}

#[test]
fn test_per_instance_component_is_not_a_firmware() {
    let mut mgr = manager();
    let mut core = MockCore::new(Some(0));
    let engine = ExecutiveEngine::new(params());
    let domain = mgr.core_domain(0);

    let mut b = ImageBuilder::new();
    b.nmf_header(MAGIC_COMPONENT, &[]);
    b.progbits("mem10", 1, &[0u8; 8]);
    let err = engine
        .boot(&mut core, &mut mgr, domain, &b.build())
        .unwrap_err();
    assert!(matches!(err, BootError::NotAFirmware));
    assert!(!core.started);
}
