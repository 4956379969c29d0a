//! Per-pass tension selection.

use core_bed::Pass;
use core_code::tension;

/// Tension band for one pass.
///
/// The widest relocation any stitch performs sets the base band; heavily
/// cabled passes loosen further so crossing loops have slack to travel.
pub fn tension_for(pass: &Pass) -> u8 {
    let mut max_delta: usize = 0;
    let mut cross_legs: usize = 0;
    for stitch in &pass.sequence {
        let Some(action) = pass.action_of(*stitch) else {
            continue;
        };
        for target in &action.targets {
            max_delta = max_delta.max(target.index.abs_diff(action.source.index));
        }
        if action.pairing.is_some() {
            cross_legs += 1;
        }
    }
    let cross_num = cross_legs / 2;

    let mut t = match max_delta {
        0 => tension::NORMAL,
        1..=2 => 6,
        3..=4 => 7,
        _ => 8,
    };
    if cross_num > 4 {
        t += cross_num.div_ceil(5) as u8;
    }
    t
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_bed::{Action, ActionKind, Needle, Pairing, PassKind, StitchId};

    fn pass_with(deltas: &[usize], crosses: usize) -> Pass {
        let mut pass = Pass::new(PassKind::Transfers);
        let mut id = 0u32;
        for d in deltas {
            let s = StitchId(id);
            id += 1;
            pass.sequence.push(s);
            let mut a = Action::new(ActionKind::None, Needle::front(10));
            a.targets.push(Needle::front(10 + d));
            pass.actions.insert(s, a);
        }
        for _ in 0..crosses {
            for leg in 0..2 {
                let s = StitchId(id);
                id += 1;
                pass.sequence.push(s);
                let mut a = Action::new(ActionKind::None, Needle::front(20));
                a.pairing = Some(Pairing { partner: StitchId(0), above: leg == 0 });
                pass.actions.insert(s, a);
            }
        }
        pass
    }

    #[test]
    fn bands_by_max_delta() {
        assert_eq!(tension_for(&pass_with(&[0], 0)), 5);
        assert_eq!(tension_for(&pass_with(&[1, 2], 0)), 6);
        assert_eq!(tension_for(&pass_with(&[3], 0)), 7);
        assert_eq!(tension_for(&pass_with(&[2, 4], 0)), 7);
        assert_eq!(tension_for(&pass_with(&[7], 0)), 8);
    }

    #[test]
    fn cables_loosen_past_four_pairs() {
        assert_eq!(tension_for(&pass_with(&[0], 4)), 5);
        assert_eq!(tension_for(&pass_with(&[0], 5)), 6);
        assert_eq!(tension_for(&pass_with(&[0], 10)), 7);
    }
}
