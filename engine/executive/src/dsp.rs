//! Hardware seam for one MMDSP core.

use nmf_memory::MemKind;

/// Platform-injected access to one DSP core.
///
/// The engine never touches registers or target memory directly; it
/// hands fully relocated segment images to `write_segment` and drives
/// reset through `start`/`stop`. `read_boot_flag` is the shared-memory
/// word the executive writes once its scheduler is running; target
/// memory is zeroed at load, so the flag reads 0 until then.
pub trait DspCore {
    /// Copy a relocated host window into target memory of `kind` at the
    /// given word address.
    fn write_segment(&mut self, kind: MemKind, word_addr: u32, bytes: &[u8]);

    /// Release the core from reset.
    fn start(&mut self);

    /// Put the core back into reset.
    fn stop(&mut self);

    /// Read the boot-handshake word.
    fn read_boot_flag(&mut self) -> u32;
}
