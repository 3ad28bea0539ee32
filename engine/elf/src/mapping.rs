//! Section-name to memory-region mapping.
//!
//! Loadable sections follow a constrained naming grammar:
//!
//! - `mem<N>.<M>`: data bank `N` (0..9), per-bank sub-selector `M`
//!   (1..4);
//! - `mem1.stack`: the stack carve-out of bank 1;
//! - `mem10`: program memory (bank 10);
//! - `.locked`: the locked/cacheable code region.
//!
//! Anything else is not a target memory section: it stays in the image
//! for symbol/debug purposes but is never loaded.

use nmf_memory::{region_by_id, InstanceProperty, MemKind, RegionDescriptor};

/// Shared and (optional) private region variant of one data bank.
fn bank_regions(bank: u32) -> Option<(MemKind, Option<MemKind>)> {
    match bank {
        1 => Some((MemKind::InternalXram24, Some(MemKind::XramPriv24))),
        2 => Some((MemKind::InternalYram24, Some(MemKind::YramPriv24))),
        3 => Some((MemKind::SdramExt24, Some(MemKind::SdramPriv24))),
        4 => Some((MemKind::SdramExt16, None)),
        5 => Some((MemKind::EsramExt24, Some(MemKind::EsramPriv24))),
        6 => Some((MemKind::EsramExt16, None)),
        _ => None,
    }
}

/// Resolve a section name against the grammar, selecting the private
/// bank variant for multi-instance loads. Returns `None` for names
/// outside the grammar.
pub fn region_for_section(
    name: &str,
    property: InstanceProperty,
) -> Option<&'static RegionDescriptor> {
    if name == ".locked" {
        return Some(region_by_id(MemKind::LockedCode as u8));
    }
    let rest = name.strip_prefix("mem")?;
    if rest == "10" {
        return Some(region_by_id(MemKind::SdramCode as u8));
    }
    let (bank, sub) = rest.split_once('.')?;
    let bank: u32 = bank.parse().ok()?;
    if bank > 9 {
        return None;
    }
    if sub == "stack" {
        // The stack carve-out exists only in bank 1 and is always
        // per-instance.
        return (bank == 1).then(|| region_by_id(MemKind::XramPriv24 as u8));
    }
    let sub: u32 = sub.parse().ok()?;
    if !(1..=4).contains(&sub) {
        return None;
    }
    let (shared, private) = bank_regions(bank)?;
    let kind = match (property, private) {
        (InstanceProperty::MultiInstance, Some(private)) => private,
        _ => shared,
    };
    Some(region_by_id(kind as u8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_bank_selection() {
        let shared = region_for_section("mem1.1", InstanceProperty::Singleton).unwrap();
        assert_eq!(shared.kind, MemKind::InternalXram24);

        let private = region_for_section("mem1.1", InstanceProperty::MultiInstance).unwrap();
        assert_eq!(private.kind, MemKind::XramPriv24);

        // Bank 4 has no private variant.
        let b4 = region_for_section("mem4.2", InstanceProperty::MultiInstance).unwrap();
        assert_eq!(b4.kind, MemKind::SdramExt16);
    }

    #[test]
    fn test_code_regions() {
        let prog = region_for_section("mem10", InstanceProperty::Singleton).unwrap();
        assert_eq!(prog.kind, MemKind::SdramCode);

        let locked = region_for_section(".locked", InstanceProperty::Singleton).unwrap();
        assert_eq!(locked.kind, MemKind::LockedCode);
    }

    #[test]
    fn test_stack_carveout() {
        let stack = region_for_section("mem1.stack", InstanceProperty::Singleton).unwrap();
        assert_eq!(stack.kind, MemKind::XramPriv24);
        assert!(region_for_section("mem2.stack", InstanceProperty::Singleton).is_none());
    }

    #[test]
    fn test_names_outside_grammar() {
        for name in [
            ".debug_info",
            ".symtab",
            "mem1",
            "mem1.5",
            "mem1.0",
            "mem7.1",
            "mem11",
            "mem",
            "memx.1",
            "nmf_segment",
        ] {
            assert!(
                region_for_section(name, InstanceProperty::MultiInstance).is_none(),
                "{name} should not map"
            );
        }
    }
}
