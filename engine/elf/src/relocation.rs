//! MMDSP relocation types and bit-field recipes.
//!
//! The instruction set encodes immediates in (sometimes split) bit
//! fields of 32- or 64-bit operand words. Each relocation type carries
//! one recipe: shift the resolved address right, place it at a bit
//! position, and merge it into the operand under a destination mask,
//! composing with the pristine source bits under the source mask:
//!
//! `new = (cur & !dst) | (((pristine & src) + (addr >> rshift << bitpos)) & dst)`
//!
//! The pristine value comes from the decoded file bytes, never from
//! already-relocated target memory; the loader caches it once per
//! distinct site address so adjacent relocations sharing one operand
//! word compose correctly.

/// The closed set of relocation types the MMDSP toolchain emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelocType {
    /// 16-bit immediate split into bits 8..24 of a 64-bit operand.
    Imm16Split,
    /// 4-bit immediate (address bits 16..20) at bits 4..8 of a 64-bit
    /// operand.
    Imm4Split,
    /// 24-bit absolute address in a 32-bit operand.
    Abs24,
    /// Plain 16-bit immediate in a 32-bit operand.
    Imm16,
}

/// Bit-field insertion recipe for one relocation type.
#[derive(Debug, Clone, Copy)]
pub struct Recipe {
    pub right_shift: u32,
    pub bit_pos: u32,
    pub src_mask: u64,
    pub dst_mask: u64,
    /// Operand width in bytes: 4 or 8.
    pub width: usize,
    /// Whether out-of-range values are a hard error for this type.
    pub checked: bool,
}

impl RelocType {
    /// Decode the raw ELF relocation type code.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Imm16Split),
            2 => Some(Self::Imm4Split),
            3 => Some(Self::Abs24),
            4 => Some(Self::Imm16),
            _ => None,
        }
    }

    pub fn recipe(self) -> &'static Recipe {
        match self {
            Self::Imm16Split => &Recipe {
                right_shift: 0,
                bit_pos: 8,
                src_mask: 0x0000_0000_00ff_ff00,
                dst_mask: 0x0000_0000_00ff_ff00,
                width: 8,
                checked: false,
            },
            Self::Imm4Split => &Recipe {
                right_shift: 16,
                bit_pos: 4,
                src_mask: 0x0000_0000_0000_00f0,
                dst_mask: 0x0000_0000_0000_00f0,
                width: 8,
                checked: false,
            },
            Self::Abs24 => &Recipe {
                right_shift: 0,
                bit_pos: 0,
                src_mask: 0x00ff_ffff,
                dst_mask: 0x00ff_ffff,
                width: 4,
                checked: false,
            },
            Self::Imm16 => &Recipe {
                right_shift: 0,
                bit_pos: 0,
                src_mask: 0x0000_ffff,
                dst_mask: 0x0000_ffff,
                width: 4,
                checked: false,
            },
        }
    }
}

impl Recipe {
    /// Merge `addr` into an operand. `pristine` supplies the read side
    /// of the read-modify-write, `current` the bits outside the field.
    pub fn apply(&self, pristine: u64, current: u64, addr: u64) -> u64 {
        let inserted = (addr >> self.right_shift).wrapping_shl(self.bit_pos);
        (current & !self.dst_mask) | (((pristine & self.src_mask).wrapping_add(inserted)) & self.dst_mask)
    }

    /// For checked types: does `addr` fall outside the field?
    pub fn overflows(&self, addr: u64) -> bool {
        self.checked && ((addr >> self.right_shift).wrapping_shl(self.bit_pos) & !self.dst_mask) != 0
    }
}

/// Read an operand word of `width` bytes in host order.
pub fn read_operand(bytes: &[u8], width: usize) -> u64 {
    match width {
        4 => u32::from_ne_bytes(bytes[..4].try_into().unwrap()) as u64,
        8 => u64::from_ne_bytes(bytes[..8].try_into().unwrap()),
        _ => unreachable!("operand width {width}"),
    }
}

/// Write an operand word of `width` bytes in host order.
pub fn write_operand(bytes: &mut [u8], width: usize, value: u64) {
    match width {
        4 => bytes[..4].copy_from_slice(&(value as u32).to_ne_bytes()),
        8 => bytes[..8].copy_from_slice(&value.to_ne_bytes()),
        _ => unreachable!("operand width {width}"),
    }
}

/// Outcome of resolving an undefined (external) symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolResolution {
    /// The symbol's absolute target address.
    Resolved(u32),
    /// Nobody provides this symbol: the load fails.
    Unresolved,
    /// The resolver ran out of memory materializing the symbol.
    OutOfMemory,
    /// Deliberately inert: skip this relocation and keep going.
    Inert,
}

/// External-symbol resolver injected by the caller.
pub trait SymbolResolver {
    fn resolve(&mut self, rtype: RelocType, name: &str, site_addr: u32) -> SymbolResolution;
}
