//! Shared builders for end-to-end compiles: hand-traced programs shaped
//! like the tracing front end's output.

use core_bed::{Action, ActionKind, Needle, Pass, PassKind, StitchId, TimeBed};

pub fn cast_on_bed(width: usize, circular: bool) -> TimeBed {
    let mut bed = TimeBed::new(0, width);
    bed.circular = circular;
    let mut pass = Pass::new(PassKind::CastOn);
    pass.yarn_starts = true;
    let mut id = 0u32;
    for i in 0..width {
        let s = StitchId(id);
        id += 1;
        pass.sequence.push(s);
        bed.assign(s, Needle::front(i));
    }
    if circular {
        for i in (0..width).rev() {
            let s = StitchId(id);
            id += 1;
            pass.sequence.push(s);
            bed.assign(s, Needle::back(i));
        }
    }
    bed.passes.push(pass);
    bed
}

/// One flat knit row, carrier order alternating with `rightward`.
pub fn knit_row(time: usize, width: usize, rightward: bool) -> TimeBed {
    let mut bed = TimeBed::new(time, width);
    let mut pass = Pass::new(PassKind::Actions);
    let indices: Vec<usize> = if rightward {
        (0..width).collect()
    } else {
        (0..width).rev().collect()
    };
    for i in indices {
        let s = StitchId((time as u32) * 1000 + i as u32);
        pass.sequence.push(s);
        pass.actions.insert(s, Action::new(ActionKind::Knit, Needle::front(i)));
    }
    bed.passes.push(pass);
    bed
}

/// One circular round: front stitches left-to-right, then back stitches
/// right-to-left.
pub fn round(time: usize, width: usize) -> TimeBed {
    let mut bed = TimeBed::new(time, width);
    let mut pass = Pass::new(PassKind::Actions);
    for i in 0..width {
        let s = StitchId((time as u32) * 1000 + i as u32);
        pass.sequence.push(s);
        pass.actions.insert(s, Action::new(ActionKind::Knit, Needle::front(i)));
    }
    for i in (0..width).rev() {
        let s = StitchId((time as u32) * 1000 + 500 + i as u32);
        pass.sequence.push(s);
        pass.actions.insert(s, Action::new(ActionKind::Knit, Needle::back(i)));
    }
    bed.passes.push(pass);
    bed
}

pub fn cast_off_bed(time: usize, width: usize, circular: bool) -> TimeBed {
    let mut bed = TimeBed::new(time, width);
    let mut pass = Pass::new(PassKind::CastOff);
    pass.yarn_ends = true;
    let mut id = 80_000u32;
    for i in 0..width {
        let s = StitchId(id);
        id += 1;
        pass.sequence.push(s);
        bed.assign(s, Needle::front(i));
    }
    if circular {
        for i in (0..width).rev() {
            let s = StitchId(id);
            id += 1;
            pass.sequence.push(s);
            bed.assign(s, Needle::back(i));
        }
    }
    bed.passes.push(pass);
    bed
}
