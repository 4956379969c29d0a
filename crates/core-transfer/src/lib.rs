//! Transfer planner: partition a requested needle permutation into ordered,
//! conflict-free sub-passes and emit them through the caster.
//!
//! Planning is pure (`plan`); emission (`emit`) drives the caster and owns
//! the occupancy bookkeeping for the whole permutation. Four steps:
//!
//! 1. Partition entries by source side, dropping no-ops.
//! 2. Order across sides: an entry landing on a needle the other side still
//!    has to vacate forces that side first; contradictory demands are a
//!    constraint loop and fail the compile; mixed-but-acyclic demands peel
//!    the constrained stitches (with their cable partners) into pre-passes.
//! 3. Within a group, sliders (same-side move against an occupied opposing
//!    needle) never share a sub-pass with bed-switching transfers; the
//!    switches split into a preceding sub-group.
//! 4. Each sub-group becomes one knit-cancel line: link-process for
//!    stationary entries, restack codes, ordinal-alternating cross codes,
//!    transfer codes; L13 carries the group's transfer type.

use core_bed::{BedState, CompileError, Needle, Pairing, StitchId};
use core_caster::Caster;
use core_code::{Instr, OptionKey, Side, cross_code, transfer_code, transfer_type};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// One stitch's requested relocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferEntry {
    pub stitch: StitchId,
    pub source: Needle,
    pub target: Option<Needle>,
    pub pairing: Option<Pairing>,
    pub restack: bool,
}

impl TransferEntry {
    pub fn relocate(stitch: StitchId, source: Needle, target: Needle) -> Self {
        TransferEntry { stitch, source, target: Some(target), pairing: None, restack: false }
    }

    fn is_noop(&self) -> bool {
        match self.target {
            None => !self.restack,
            Some(t) => t == self.source && !self.restack && self.pairing.is_none(),
        }
    }

    fn crosses_beds(&self) -> bool {
        self.target.is_some_and(|t| t.side != self.source.side)
    }
}

/// One planned sub-pass: a single knit-cancel raster line.
#[derive(Debug, Clone)]
pub struct SubPass {
    pub side: Side,
    pub sliders: bool,
    pub instrs: Vec<Instr>,
    pub needles: Vec<Needle>,
    pub sources: Vec<Needle>,
    pub targets: Vec<Needle>,
}

struct Group {
    side: Side,
    entries: Vec<TransferEntry>,
}

/// Plan the permutation into ordered sub-passes. `bed` is consulted for the
/// slider criterion only; occupancy is not modified here.
pub fn plan(entries: &[TransferEntry], bed: &BedState) -> Result<Vec<SubPass>, CompileError> {
    // Step 1: side partition.
    let mut front = Group { side: Side::Front, entries: Vec::new() };
    let mut back = Group { side: Side::Back, entries: Vec::new() };
    let mut seen_sources: HashSet<Needle> = HashSet::new();
    for e in entries {
        if e.is_noop() {
            continue;
        }
        if !seen_sources.insert(e.source) {
            return Err(CompileError::DoubleSource { index: e.source.index });
        }
        match e.source.side {
            Side::Front => front.entries.push(*e),
            Side::Back => back.entries.push(*e),
        }
    }

    // Step 2: cross-side ordering.
    let mut groups = order_sides(front, back)?;

    // Step 3: slider / bed-switch conflict.
    let mut subs: Vec<SubPass> = Vec::new();
    for group in groups.iter_mut() {
        if group.entries.is_empty() {
            continue;
        }
        group.entries.sort_by_key(|e| e.source.index);
        let needs_sliders = group
            .entries
            .iter()
            .any(|e| !e.crosses_beds() && !e.restack && bed.other_side(e.source));
        let has_switches = group.entries.iter().any(TransferEntry::crosses_beds);
        if needs_sliders && has_switches {
            let (switches, rest): (Vec<_>, Vec<_>) =
                group.entries.iter().partition(|e| e.crosses_beds());
            subs.push(assemble(group.side, false, &switches.into_iter().copied().collect::<Vec<_>>())?);
            subs.push(assemble(group.side, true, &rest.into_iter().copied().collect::<Vec<_>>())?);
        } else {
            subs.push(assemble(group.side, needs_sliders, &group.entries)?);
        }
    }
    debug!(sub_passes = subs.len(), "transfer plan ready");
    Ok(subs)
}

/// Resolve the inter-side ordering constraints into a processing order.
fn order_sides(front: Group, back: Group) -> Result<Vec<Group>, CompileError> {
    // An entry landing on a source the other group must still vacate means
    // that other entry moves first.
    let front_sources: HashSet<usize> = front.entries.iter().map(|e| e.source.index).collect();
    let back_sources: HashSet<usize> = back.entries.iter().map(|e| e.source.index).collect();

    // Needles that must move early, per side.
    let mut early_front: HashSet<usize> = HashSet::new();
    let mut early_back: HashSet<usize> = HashSet::new();
    // Needles whose entries must wait.
    let mut late_front: HashSet<usize> = HashSet::new();
    let mut late_back: HashSet<usize> = HashSet::new();

    for e in front.entries.iter().filter(|e| e.crosses_beds()) {
        let t = e.target.expect("cross-bed entry has a target").index;
        if back_sources.contains(&t) {
            early_back.insert(t);
            late_front.insert(e.source.index);
        }
    }
    for e in back.entries.iter().filter(|e| e.crosses_beds()) {
        let t = e.target.expect("cross-bed entry has a target").index;
        if front_sources.contains(&t) {
            early_front.insert(t);
            late_back.insert(e.source.index);
        }
    }

    if let Some(&n) = early_front.intersection(&late_front).next() {
        return Err(CompileError::TransferConstraintLoop { a: n, b: n });
    }
    if let Some(&n) = early_back.intersection(&late_back).next() {
        return Err(CompileError::TransferConstraintLoop { a: n, b: n });
    }

    match (early_front.is_empty(), early_back.is_empty()) {
        // No constraints: keep the natural front-then-back order.
        (true, true) => Ok(vec![front, back]),
        // All constraints name one first side: whole-group reorder.
        (false, true) => Ok(vec![front, back]),
        (true, false) => Ok(vec![back, front]),
        // Mixed but acyclic: peel the early stitches into pre-passes.
        (false, false) => {
            let (front_pre, front_main) = peel(front, &early_front);
            let (back_pre, back_main) = peel(back, &early_back);
            trace!(
                front_pre = front_pre.entries.len(),
                back_pre = back_pre.entries.len(),
                "constrained pre-passes extracted"
            );
            Ok(vec![front_pre, back_pre, front_main, back_main])
        },
    }
}

/// Split `group` into (early needles + their cable partners, the rest).
fn peel(group: Group, early: &HashSet<usize>) -> (Group, Group) {
    let mut pulled: HashSet<StitchId> = group
        .entries
        .iter()
        .filter(|e| early.contains(&e.source.index))
        .map(|e| e.stitch)
        .collect();
    // Cable-paired partners move together.
    let partners: HashSet<StitchId> = group
        .entries
        .iter()
        .filter(|e| pulled.contains(&e.stitch))
        .filter_map(|e| e.pairing.map(|p| p.partner))
        .collect();
    pulled.extend(partners);

    let (pre, main): (Vec<_>, Vec<_>) =
        group.entries.into_iter().partition(|e| pulled.contains(&e.stitch));
    (
        Group { side: group.side, entries: pre },
        Group { side: group.side, entries: main },
    )
}

/// Assemble one sub-pass's instruction block.
fn assemble(side: Side, sliders: bool, entries: &[TransferEntry]) -> Result<SubPass, CompileError> {
    let mut instrs = Vec::with_capacity(entries.len());
    let mut needles = Vec::with_capacity(entries.len());
    let mut sources = Vec::new();
    let mut targets = Vec::new();
    let mut ordinal = 0u32;
    let mut open_pairs: HashMap<StitchId, usize> = HashMap::new();

    for e in entries {
        let code = if e.restack {
            if e.target.is_some_and(|t| t != e.source) {
                return Err(CompileError::RestackWithMove { index: e.source.index });
            }
            match side {
                Side::Front => Instr::FRONT_RESTACK,
                Side::Back => Instr::BACK_RESTACK,
            }
        } else if let Some(pairing) = e.pairing {
            if e.crosses_beds() {
                return Err(CompileError::CrossAcrossSides { index: e.source.index });
            }
            if open_pairs.remove(&e.stitch).is_some() {
                // Second leg closes the pair; the next pair alternates codes.
                let code = cross_code(pairing.above, ordinal);
                ordinal += 1;
                code
            } else {
                open_pairs.insert(pairing.partner, e.source.index);
                cross_code(pairing.above, ordinal)
            }
        } else if let Some(target) = e.target {
            transfer_code(e.source.index, e.source.side, target.index, target.side, false)?
        } else {
            Instr::LINK_PROCESS
        };

        instrs.push(code);
        needles.push(e.source);
        if let Some(target) = e.target {
            sources.push(e.source);
            targets.push(target);
        }
    }

    if let Some((_, index)) = open_pairs.into_iter().next() {
        return Err(CompileError::CableAcrossPasses { index });
    }

    Ok(SubPass { side, sliders, instrs, needles, sources, targets })
}

/// Plan and emit the permutation: one knit-cancel line per sub-pass, with
/// L13 set to the group's transfer type, emitted under `locally` so the
/// carrier's committed position survives. Occupancy is rewritten as
/// clear-all-sources then set-all-targets per sub-pass.
pub fn emit(caster: &mut Caster<'_>, entries: &[TransferEntry]) -> Result<(), CompileError> {
    let subs = plan(entries, caster.bed())?;
    for sub in &subs {
        let l13 = transfer_type(sub.side, sub.sliders, false);
        caster.locally(|c| {
            c.add_line_option(OptionKey::L13, l13);
            c.instr_block(&sub.instrs, &sub.needles, true)?;
            Ok(())
        })?;
        for n in &sub.sources {
            caster.bed_mut().set(n.side, n.index, false);
        }
        for n in &sub.targets {
            caster.bed_mut().set(n.side, n.index, true);
        }
    }
    Ok(())
}
