//! Big-endian ELF structure reader.
//!
//! Component images are standard ELF objects whose multi-byte fields are
//! big-endian regardless of host order. The reader is parameterized over
//! an [`ElfClass`] so the 32- and 64-bit layouts share one code path; the
//! class in use is picked at load time from the ident byte, never by
//! compiling the source twice.

use bitflags::bitflags;
use static_assertions::const_assert_eq;

use crate::{ElfError, Result};

pub const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

pub const EI_CLASS: usize = 4;
pub const EI_DATA: usize = 5;
pub const ELFCLASS32: u8 = 1;
pub const ELFCLASS64: u8 = 2;
pub const ELFDATA2MSB: u8 = 2;

/// Fully linked (position-fixed) image.
pub const ET_EXEC: u16 = 2;

pub const SHT_PROGBITS: u32 = 1;
pub const SHT_SYMTAB: u32 = 2;
pub const SHT_STRTAB: u32 = 3;
pub const SHT_RELA: u32 = 4;
pub const SHT_NOBITS: u32 = 8;

pub const SHN_UNDEF: u16 = 0;
pub const SHN_ABS: u16 = 0xfff1;
pub const SHN_COMMON: u16 = 0xfff2;

bitflags! {
    /// Section header flags (the subset the loader cares about).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SectionFlags: u64 {
        const WRITE = 0x1;
        const ALLOC = 0x2;
        const EXECINSTR = 0x4;
    }
}

/// Class-independent view of the ELF header fields the loader uses.
#[derive(Debug, Clone, Copy)]
pub struct Ehdr {
    pub e_type: u16,
    pub e_machine: u16,
    pub e_shoff: u64,
    pub e_shentsize: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}

/// Class-independent section header.
#[derive(Debug, Clone, Copy)]
pub struct Shdr {
    pub name: u32,
    pub sh_type: u32,
    pub flags: SectionFlags,
    pub addr: u64,
    pub offset: u64,
    pub size: u64,
    pub link: u32,
    pub info: u32,
    pub addralign: u64,
}

/// Class-independent symbol-table entry.
#[derive(Debug, Clone, Copy)]
pub struct Sym {
    pub name: u32,
    pub value: u64,
    pub shndx: u16,
}

/// Class-independent relocation-with-addend entry.
#[derive(Debug, Clone, Copy)]
pub struct Rela {
    pub offset: u64,
    pub sym: u32,
    pub rtype: u32,
    pub addend: i64,
}

// Offsets come straight from header fields, so even the range
// arithmetic must be checked: a crafted offset near the type maximum
// is a Truncated error, never an overflow.

pub(crate) fn read_u16(data: &[u8], off: usize) -> Result<u16> {
    off.checked_add(2)
        .and_then(|end| data.get(off..end))
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or(ElfError::Truncated("half-word field"))
}

pub(crate) fn read_u32(data: &[u8], off: usize) -> Result<u32> {
    off.checked_add(4)
        .and_then(|end| data.get(off..end))
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(ElfError::Truncated("word field"))
}

pub(crate) fn read_u64(data: &[u8], off: usize) -> Result<u64> {
    off.checked_add(8)
        .and_then(|end| data.get(off..end))
        .map(|b| u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
        .ok_or(ElfError::Truncated("extended-word field"))
}

/// One supported ELF class: field extraction for the structures the
/// loader touches.
pub trait ElfClass {
    const CLASS: u8;
    const EHDR_LEN: usize;
    const SHDR_LEN: usize;
    const SYM_LEN: usize;
    const RELA_LEN: usize;

    fn ehdr(data: &[u8]) -> Result<Ehdr>;
    fn shdr(data: &[u8], off: usize) -> Result<Shdr>;
    fn sym(data: &[u8], off: usize) -> Result<Sym>;
    fn rela(data: &[u8], off: usize) -> Result<Rela>;
}

/// 64-bit layouts; the class the MMDSP toolchain emits.
pub enum Elf64 {}

impl ElfClass for Elf64 {
    const CLASS: u8 = ELFCLASS64;
    const EHDR_LEN: usize = 64;
    const SHDR_LEN: usize = 64;
    const SYM_LEN: usize = 24;
    const RELA_LEN: usize = 24;

    fn ehdr(data: &[u8]) -> Result<Ehdr> {
        Ok(Ehdr {
            e_type: read_u16(data, 16)?,
            e_machine: read_u16(data, 18)?,
            e_shoff: read_u64(data, 40)?,
            e_shentsize: read_u16(data, 58)?,
            e_shnum: read_u16(data, 60)?,
            e_shstrndx: read_u16(data, 62)?,
        })
    }

    fn shdr(data: &[u8], off: usize) -> Result<Shdr> {
        Ok(Shdr {
            name: read_u32(data, off)?,
            sh_type: read_u32(data, off + 4)?,
            flags: SectionFlags::from_bits_retain(read_u64(data, off + 8)?),
            addr: read_u64(data, off + 16)?,
            offset: read_u64(data, off + 24)?,
            size: read_u64(data, off + 32)?,
            link: read_u32(data, off + 40)?,
            info: read_u32(data, off + 44)?,
            addralign: read_u64(data, off + 48)?,
        })
    }

    fn sym(data: &[u8], off: usize) -> Result<Sym> {
        Ok(Sym {
            name: read_u32(data, off)?,
            shndx: read_u16(data, off + 6)?,
            value: read_u64(data, off + 8)?,
        })
    }

    fn rela(data: &[u8], off: usize) -> Result<Rela> {
        let info = read_u64(data, off + 8)?;
        Ok(Rela {
            offset: read_u64(data, off)?,
            sym: (info >> 32) as u32,
            rtype: info as u32,
            addend: read_u64(data, off + 16)? as i64,
        })
    }
}

/// 32-bit layouts, parsed through the same generic path.
pub enum Elf32 {}

impl ElfClass for Elf32 {
    const CLASS: u8 = ELFCLASS32;
    const EHDR_LEN: usize = 52;
    const SHDR_LEN: usize = 40;
    const SYM_LEN: usize = 16;
    const RELA_LEN: usize = 12;

    fn ehdr(data: &[u8]) -> Result<Ehdr> {
        Ok(Ehdr {
            e_type: read_u16(data, 16)?,
            e_machine: read_u16(data, 18)?,
            e_shoff: read_u32(data, 32)? as u64,
            e_shentsize: read_u16(data, 46)?,
            e_shnum: read_u16(data, 48)?,
            e_shstrndx: read_u16(data, 50)?,
        })
    }

    fn shdr(data: &[u8], off: usize) -> Result<Shdr> {
        Ok(Shdr {
            name: read_u32(data, off)?,
            sh_type: read_u32(data, off + 4)?,
            flags: SectionFlags::from_bits_retain(read_u32(data, off + 8)? as u64),
            addr: read_u32(data, off + 12)? as u64,
            offset: read_u32(data, off + 16)? as u64,
            size: read_u32(data, off + 20)? as u64,
            link: read_u32(data, off + 24)?,
            info: read_u32(data, off + 28)?,
            addralign: read_u32(data, off + 32)? as u64,
        })
    }

    fn sym(data: &[u8], off: usize) -> Result<Sym> {
        Ok(Sym {
            name: read_u32(data, off)?,
            value: read_u32(data, off + 4)? as u64,
            shndx: read_u16(data, off + 14)?,
        })
    }

    fn rela(data: &[u8], off: usize) -> Result<Rela> {
        let info = read_u32(data, off + 4)?;
        Ok(Rela {
            offset: read_u32(data, off)? as u64,
            sym: info >> 8,
            rtype: info & 0xff,
            addend: read_u32(data, off + 8)? as i32 as i64,
        })
    }
}

const_assert_eq!(<Elf64 as ElfClass>::SHDR_LEN, 64);
const_assert_eq!(<Elf32 as ElfClass>::SHDR_LEN, 40);

/// NUL-terminated string lookup in a string-table blob.
pub(crate) fn str_at(strtab: &[u8], index: u32) -> Result<&str> {
    let start = index as usize;
    let tail = strtab
        .get(start..)
        .ok_or(ElfError::Truncated("string table index"))?;
    let end = tail
        .iter()
        .position(|&b| b == 0)
        .ok_or(ElfError::Truncated("unterminated string"))?;
    core::str::from_utf8(&tail[..end]).map_err(|_| ElfError::Truncated("non-utf8 name"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_helpers_are_big_endian() {
        let data = [0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0];
        assert_eq!(read_u16(&data, 0).unwrap(), 0x1234);
        assert_eq!(read_u32(&data, 0).unwrap(), 0x12345678);
        assert_eq!(read_u64(&data, 0).unwrap(), 0x123456789abcdef0);
        assert!(matches!(read_u32(&data, 6), Err(ElfError::Truncated(_))));
    }

    #[test]
    fn test_rela_field_split() {
        // r_offset = 0x10, r_info = (sym 3, type 2), r_addend = -1.
        let mut raw = Vec::new();
        raw.extend_from_slice(&0x10u64.to_be_bytes());
        raw.extend_from_slice(&(((3u64) << 32) | 2).to_be_bytes());
        raw.extend_from_slice(&(-1i64).to_be_bytes());
        let r = <Elf64 as ElfClass>::rela(&raw, 0).unwrap();
        assert_eq!((r.offset, r.sym, r.rtype, r.addend), (0x10, 3, 2, -1));
    }

    #[test]
    fn test_elf32_header_extraction() {
        let mut raw = vec![0u8; <Elf32 as ElfClass>::EHDR_LEN];
        raw[16..18].copy_from_slice(&ET_EXEC.to_be_bytes());
        raw[18..20].copy_from_slice(&0xa00du16.to_be_bytes());
        raw[32..36].copy_from_slice(&0x60u32.to_be_bytes());
        raw[46..48].copy_from_slice(&40u16.to_be_bytes());
        raw[48..50].copy_from_slice(&5u16.to_be_bytes());
        raw[50..52].copy_from_slice(&4u16.to_be_bytes());

        let e = <Elf32 as ElfClass>::ehdr(&raw).unwrap();
        assert_eq!(e.e_type, ET_EXEC);
        assert_eq!(e.e_machine, 0xa00d);
        assert_eq!(e.e_shoff, 0x60);
        assert_eq!(e.e_shentsize, 40);
        assert_eq!((e.e_shnum, e.e_shstrndx), (5, 4));
    }

    #[test]
    fn test_elf32_section_and_symbol_extraction() {
        let mut sh = vec![0u8; <Elf32 as ElfClass>::SHDR_LEN];
        sh[0..4].copy_from_slice(&7u32.to_be_bytes());
        sh[4..8].copy_from_slice(&SHT_PROGBITS.to_be_bytes());
        sh[8..12].copy_from_slice(&2u32.to_be_bytes());
        sh[12..16].copy_from_slice(&0x400u32.to_be_bytes());
        sh[16..20].copy_from_slice(&0x80u32.to_be_bytes());
        sh[20..24].copy_from_slice(&0x0cu32.to_be_bytes());
        sh[24..28].copy_from_slice(&3u32.to_be_bytes());
        sh[28..32].copy_from_slice(&1u32.to_be_bytes());
        sh[32..36].copy_from_slice(&4u32.to_be_bytes());

        let s = <Elf32 as ElfClass>::shdr(&sh, 0).unwrap();
        assert_eq!(s.name, 7);
        assert_eq!(s.sh_type, SHT_PROGBITS);
        assert!(s.flags.contains(SectionFlags::ALLOC));
        assert_eq!((s.addr, s.offset, s.size), (0x400, 0x80, 0x0c));
        assert_eq!((s.link, s.info, s.addralign), (3, 1, 4));
        assert!(matches!(
            <Elf32 as ElfClass>::shdr(&sh, 1),
            Err(ElfError::Truncated(_))
        ));

        let mut sym = vec![0u8; <Elf32 as ElfClass>::SYM_LEN];
        sym[0..4].copy_from_slice(&5u32.to_be_bytes());
        sym[4..8].copy_from_slice(&0x1234u32.to_be_bytes());
        sym[14..16].copy_from_slice(&2u16.to_be_bytes());
        let s = <Elf32 as ElfClass>::sym(&sym, 0).unwrap();
        assert_eq!((s.name, s.value, s.shndx), (5, 0x1234, 2));
    }

    #[test]
    fn test_elf32_rela_field_split() {
        // r_info packs the symbol index above the low type byte, and the
        // 32-bit addend is sign-extended.
        let mut raw = vec![0u8; <Elf32 as ElfClass>::RELA_LEN];
        raw[0..4].copy_from_slice(&0x10u32.to_be_bytes());
        raw[4..8].copy_from_slice(&(((7u32) << 8) | 3).to_be_bytes());
        raw[8..12].copy_from_slice(&(-2i32).to_be_bytes());
        let r = <Elf32 as ElfClass>::rela(&raw, 0).unwrap();
        assert_eq!((r.offset, r.sym, r.rtype, r.addend), (0x10, 7, 3, -2));
    }

    #[test]
    fn test_str_at() {
        let tab = b"\0alpha\0_beta\0";
        assert_eq!(str_at(tab, 1).unwrap(), "alpha");
        assert_eq!(str_at(tab, 7).unwrap(), "_beta");
        assert!(str_at(tab, 100).is_err());
    }
}
