//! Synthetic big-endian ELF images for tests.
//!
//! [`ImageBuilder`] assembles a minimal but well-formed ELF64 object
//! byte by byte, so tests control every field the loader looks at
//! without depending on a cross toolchain. Gated behind the `fixtures`
//! feature; production code never links this.

use crate::loader::{EM_MMDSP, MAGIC_COMPONENT, NMF_SEGMENT_SECTION};
use crate::reader::{SHN_ABS, SHT_NOBITS, SHT_PROGBITS, SHT_RELA, SHT_STRTAB, SHT_SYMTAB};

const EHDR_LEN: usize = 64;
const SHDR_LEN: usize = 64;
const SYM_LEN: usize = 24;
const RELA_LEN: usize = 24;

struct BuildSection {
    name: String,
    sh_type: u32,
    flags: u64,
    addr: u64,
    addralign: u64,
    data: Vec<u8>,
    /// NOBITS memory size (no file payload).
    nobits_size: u64,
    relas: Vec<BuildRela>,
}

struct BuildRela {
    offset: u64,
    sym: u32,
    rtype: u32,
    addend: i64,
}

struct BuildSym {
    name: String,
    value: u64,
    shndx: u16,
}

/// Builds an ELF64 big-endian image for the loader tests.
///
/// User sections get indices starting at 1 (index 0 is the null
/// section); the symbol/string/relocation/shstrtab sections are appended
/// after them at build time, so the indices handed back by `progbits`
/// and friends stay valid in relocation targets and symbol `shndx`
/// fields.
pub struct ImageBuilder {
    machine: u16,
    e_type: u16,
    sections: Vec<BuildSection>,
    symbols: Vec<BuildSym>,
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self {
            machine: EM_MMDSP,
            e_type: 1, // ET_REL
            sections: Vec::new(),
            symbols: Vec::new(),
        }
    }

    pub fn machine(mut self, machine: u16) -> Self {
        self.machine = machine;
        self
    }

    /// Mark the image position-fixed (ET_EXEC).
    pub fn executable(mut self) -> Self {
        self.e_type = 2;
        self
    }

    /// Add the mandatory component header with the given magic and
    /// optional trailing descriptor words.
    pub fn nmf_header(&mut self, magic: u32, descriptor_words: &[u32]) -> u16 {
        let mut data = magic.to_be_bytes().to_vec();
        for word in descriptor_words {
            data.extend_from_slice(&word.to_be_bytes());
        }
        self.add_section(BuildSection {
            name: NMF_SEGMENT_SECTION.to_owned(),
            sh_type: SHT_PROGBITS,
            flags: 0,
            addr: 0,
            addralign: 1,
            data,
            nobits_size: 0,
            relas: Vec::new(),
        })
    }

    /// Default component header: `MAGIC_COMPONENT`, no descriptor.
    pub fn component_header(&mut self) -> u16 {
        self.nmf_header(MAGIC_COMPONENT, &[])
    }

    /// Add an allocatable PROGBITS section with raw (packed) payload.
    pub fn progbits(&mut self, name: &str, addralign: u64, data: &[u8]) -> u16 {
        self.add_section(BuildSection {
            name: name.to_owned(),
            sh_type: SHT_PROGBITS,
            flags: 0x2, // SHF_ALLOC
            addr: 0,
            addralign,
            data: data.to_vec(),
            nobits_size: 0,
            relas: Vec::new(),
        })
    }

    /// Add an allocatable NOBITS (zero-initialized) section.
    pub fn nobits(&mut self, name: &str, addralign: u64, size: u64) -> u16 {
        self.add_section(BuildSection {
            name: name.to_owned(),
            sh_type: SHT_NOBITS,
            flags: 0x2,
            addr: 0,
            addralign,
            data: Vec::new(),
            nobits_size: size,
            relas: Vec::new(),
        })
    }

    /// Add a non-allocatable section (debug info, notes and such).
    pub fn unmapped(&mut self, name: &str, data: &[u8]) -> u16 {
        self.add_section(BuildSection {
            name: name.to_owned(),
            sh_type: SHT_PROGBITS,
            flags: 0,
            addr: 0,
            addralign: 1,
            data: data.to_vec(),
            nobits_size: 0,
            relas: Vec::new(),
        })
    }

    /// Set the declared virtual address of a section (for ET_EXEC
    /// images).
    pub fn set_addr(&mut self, section: u16, addr: u64) {
        self.sections[section as usize - 1].addr = addr;
    }

    /// Define a symbol; returns its symbol-table index. `shndx` is a
    /// section index from this builder, or `SHN_UNDEF`/`SHN_ABS`/
    /// `SHN_COMMON`.
    pub fn symbol(&mut self, name: &str, value: u64, shndx: u16) -> u32 {
        self.symbols.push(BuildSym {
            name: name.to_owned(),
            value,
            shndx,
        });
        self.symbols.len() as u32
    }

    /// Shorthand for an absolute-address symbol.
    pub fn abs_symbol(&mut self, name: &str, addr: u64) -> u32 {
        self.symbol(name, addr, SHN_ABS)
    }

    /// Attach a relocation-with-addend to `target`'s table.
    pub fn rela(&mut self, target: u16, offset: u64, rtype: u32, sym: u32, addend: i64) {
        self.sections[target as usize - 1].relas.push(BuildRela {
            offset,
            sym,
            rtype,
            addend,
        });
    }

    fn add_section(&mut self, section: BuildSection) -> u16 {
        self.sections.push(section);
        self.sections.len() as u16
    }

    /// Assemble the final image.
    pub fn build(&self) -> Vec<u8> {
        // Symbol string table (entry 0 is the empty string).
        let mut strtab = vec![0u8];
        let mut sym_name_offs = Vec::with_capacity(self.symbols.len());
        for sym in &self.symbols {
            sym_name_offs.push(strtab.len() as u32);
            strtab.extend_from_slice(sym.name.as_bytes());
            strtab.push(0);
        }

        let mut symtab = vec![0u8; SYM_LEN]; // null symbol
        for (sym, &name_off) in self.symbols.iter().zip(&sym_name_offs) {
            let mut entry = [0u8; SYM_LEN];
            entry[0..4].copy_from_slice(&name_off.to_be_bytes());
            entry[6..8].copy_from_slice(&sym.shndx.to_be_bytes());
            entry[8..16].copy_from_slice(&sym.value.to_be_bytes());
            symtab.extend_from_slice(&entry);
        }

        // Final section list: null, user sections, symtab, strtab, one
        // RELA section per user section carrying relocations, shstrtab.
        let user_count = self.sections.len();
        let symtab_idx = 1 + user_count as u32;
        let strtab_idx = symtab_idx + 1;
        let rela_targets: Vec<usize> = (0..user_count)
            .filter(|&i| !self.sections[i].relas.is_empty())
            .collect();
        let shnum = 1 + user_count + 2 + rela_targets.len() + 1;
        let shstrndx = (shnum - 1) as u16;

        struct OutSection {
            name: String,
            sh_type: u32,
            flags: u64,
            addr: u64,
            size: u64,
            link: u32,
            info: u32,
            addralign: u64,
            entsize: u64,
            data: Vec<u8>,
        }

        let mut out: Vec<OutSection> = Vec::with_capacity(shnum);
        out.push(OutSection {
            name: String::new(),
            sh_type: 0,
            flags: 0,
            addr: 0,
            size: 0,
            link: 0,
            info: 0,
            addralign: 0,
            entsize: 0,
            data: Vec::new(),
        });
        for section in &self.sections {
            out.push(OutSection {
                name: section.name.clone(),
                sh_type: section.sh_type,
                flags: section.flags,
                addr: section.addr,
                size: if section.sh_type == SHT_NOBITS {
                    section.nobits_size
                } else {
                    section.data.len() as u64
                },
                link: 0,
                info: 0,
                addralign: section.addralign,
                entsize: 0,
                data: section.data.clone(),
            });
        }
        out.push(OutSection {
            name: ".symtab".to_owned(),
            sh_type: SHT_SYMTAB,
            flags: 0,
            addr: 0,
            size: symtab.len() as u64,
            link: strtab_idx,
            info: 1,
            addralign: 8,
            entsize: SYM_LEN as u64,
            data: symtab,
        });
        out.push(OutSection {
            name: ".strtab".to_owned(),
            sh_type: SHT_STRTAB,
            flags: 0,
            addr: 0,
            size: strtab.len() as u64,
            link: 0,
            info: 0,
            addralign: 1,
            entsize: 0,
            data: strtab,
        });
        for &target in &rela_targets {
            let mut data = Vec::new();
            for rela in &self.sections[target].relas {
                data.extend_from_slice(&rela.offset.to_be_bytes());
                let info = ((rela.sym as u64) << 32) | rela.rtype as u64;
                data.extend_from_slice(&info.to_be_bytes());
                data.extend_from_slice(&rela.addend.to_be_bytes());
            }
            out.push(OutSection {
                name: format!(".rela.{}", self.sections[target].name),
                sh_type: SHT_RELA,
                flags: 0,
                addr: 0,
                size: data.len() as u64,
                link: symtab_idx,
                info: (target + 1) as u32,
                addralign: 8,
                entsize: RELA_LEN as u64,
                data,
            });
        }

        let mut shstrtab = vec![0u8];
        let mut sh_name_offs = Vec::with_capacity(out.len() + 1);
        for section in &out {
            if section.name.is_empty() {
                sh_name_offs.push(0);
            } else {
                sh_name_offs.push(shstrtab.len() as u32);
                shstrtab.extend_from_slice(section.name.as_bytes());
                shstrtab.push(0);
            }
        }
        sh_name_offs.push(shstrtab.len() as u32);
        shstrtab.extend_from_slice(b".shstrtab\0");
        out.push(OutSection {
            name: ".shstrtab".to_owned(),
            sh_type: SHT_STRTAB,
            flags: 0,
            addr: 0,
            size: 0, // patched below once length is final
            link: 0,
            info: 0,
            addralign: 1,
            entsize: 0,
            data: shstrtab,
        });
        let last = out.len() - 1;
        out[last].size = out[last].data.len() as u64;

        // Lay payloads out after the header, 8-aligned, then headers.
        let mut offsets = Vec::with_capacity(out.len());
        let mut cursor = EHDR_LEN;
        for section in &out {
            cursor = (cursor + 7) & !7;
            offsets.push(cursor);
            cursor += section.data.len();
        }
        let e_shoff = ((cursor + 7) & !7) as u64;

        let total = e_shoff as usize + out.len() * SHDR_LEN;
        let mut image = vec![0u8; total];

        image[0..4].copy_from_slice(&[0x7f, b'E', b'L', b'F']);
        image[4] = 2; // ELFCLASS64
        image[5] = 2; // ELFDATA2MSB
        image[6] = 1; // EV_CURRENT
        image[16..18].copy_from_slice(&self.e_type.to_be_bytes());
        image[18..20].copy_from_slice(&self.machine.to_be_bytes());
        image[20..24].copy_from_slice(&1u32.to_be_bytes());
        image[40..48].copy_from_slice(&e_shoff.to_be_bytes());
        image[52..54].copy_from_slice(&(EHDR_LEN as u16).to_be_bytes());
        image[58..60].copy_from_slice(&(SHDR_LEN as u16).to_be_bytes());
        image[60..62].copy_from_slice(&(out.len() as u16).to_be_bytes());
        image[62..64].copy_from_slice(&shstrndx.to_be_bytes());

        for (i, section) in out.iter().enumerate() {
            image[offsets[i]..offsets[i] + section.data.len()].copy_from_slice(&section.data);

            let sh = e_shoff as usize + i * SHDR_LEN;
            let file_off = if section.sh_type == SHT_NOBITS {
                0u64
            } else {
                offsets[i] as u64
            };
            image[sh..sh + 4].copy_from_slice(&sh_name_offs[i].to_be_bytes());
            image[sh + 4..sh + 8].copy_from_slice(&section.sh_type.to_be_bytes());
            image[sh + 8..sh + 16].copy_from_slice(&section.flags.to_be_bytes());
            image[sh + 16..sh + 24].copy_from_slice(&section.addr.to_be_bytes());
            image[sh + 24..sh + 32].copy_from_slice(&file_off.to_be_bytes());
            image[sh + 32..sh + 40].copy_from_slice(&section.size.to_be_bytes());
            image[sh + 40..sh + 44].copy_from_slice(&section.link.to_be_bytes());
            image[sh + 44..sh + 48].copy_from_slice(&section.info.to_be_bytes());
            image[sh + 48..sh + 56].copy_from_slice(&section.addralign.to_be_bytes());
            image[sh + 56..sh + 64].copy_from_slice(&section.entsize.to_be_bytes());
        }

        image
    }
}

impl Default for ImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}
