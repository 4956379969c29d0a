//! Pass compiler: walk the time-indexed beds and drive the caster.
//!
//! For each bed and each of its passes the compiler sets the bed options
//! and tension, decides per-stitch sub-casting, and dispatches to the
//! cast-on/off engines, the transfer planner, or caster primitives. Every
//! pass leaves the caster's buffer empty.

mod tension;

pub use tension::tension_for;

use core_bed::{ActionKind, CompileError, Needle, Pass, PassKind, TimeBed};
use core_cast::{CastOffKind, CastOnKind, CastOnRequest, cast_off, cast_on, partial_cast_on};
use core_caster::{CastMode, Caster, ScopeCtx};
use core_code::{
    Direction, LineOptions, OptionKey, direction_between, presser, tension as tension_values,
    transfer_type,
};
use core_raster::{NeedlePosition, Raster};
use core_transfer::TransferEntry;
use tracing::{debug, info_span, warn};

/// Everything the back end needs besides the beds themselves.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub carrier: u8,
    pub cast_on: CastOnKind,
    pub cast_off: CastOffKind,
    pub use_dscs: bool,
    pub needle_pos: NeedlePosition,
    pub max_needles: u16,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            carrier: 1,
            cast_on: CastOnKind::default(),
            cast_off: CastOffKind::default(),
            use_dscs: false,
            needle_pos: NeedlePosition::default(),
            max_needles: 540,
        }
    }
}

/// Compile a traced program into a finished raster.
pub fn compile(beds: &[TimeBed], opts: &CompileOptions) -> Result<Raster, CompileError> {
    let width = beds.iter().map(|b| b.width).max().unwrap_or(0);
    let mut raster = Raster::new(width, opts.max_needles);
    raster.preamble();
    {
        let mut caster = Caster::new(&mut raster, opts.carrier);
        caster.mode(CastMode::LINK_PROCESS);
        if opts.use_dscs {
            caster.dscs_start();
        }
        for (t, bed) in beds.iter().enumerate() {
            let span = info_span!("bed", time = t);
            let _enter = span.enter();
            for pass in &bed.passes {
                compile_pass(&mut caster, beds, t, bed, pass, opts)?;
                caster.flush(None, None)?;
            }
        }
        caster.flush(None, None)?;
    }
    raster.set_line_directions(Direction::Right)?;
    raster.set_carrier_positions()?;
    raster.postamble(opts.needle_pos)?;
    debug!(lines = raster.height(), "compile finished");
    Ok(raster)
}

fn compile_pass(
    caster: &mut Caster<'_>,
    beds: &[TimeBed],
    t: usize,
    bed: &TimeBed,
    pass: &Pass,
    opts: &CompileOptions,
) -> Result<(), CompileError> {
    match pass.kind {
        PassKind::CastOn => {
            let needles = bed.needles_of(&pass.sequence);
            let cover = precast_cover(beds, bed, opts.cast_on);
            caster.set_options(LineOptions::new());
            let mut tight = LineOptions::new();
            tight.set(OptionKey::R6, tension_values::TIGHT_START);
            let ctx = ScopeCtx::new().merge(tight);
            caster.with_scope(&ctx, |caster| {
                let req = CastOnRequest {
                    needles: &needles,
                    circular: bed.circular,
                    kind: opts.cast_on,
                    starting: pass.yarn_starts,
                    cover: &cover,
                };
                cast_on(caster, &req)?;
                caster.flush(None, None)?;
                Ok(())
            })?;
            for n in &needles {
                caster.bed_mut().set(n.side, n.index, true);
            }
            Ok(())
        },
        PassKind::CastOff => {
            let needles = bed.needles_of(&pass.sequence);
            caster.set_options(LineOptions::new());
            if pass.yarn_ends && opts.use_dscs {
                // The stop toggle rides on the first cast-off line.
                caster.dscs_stop();
            }
            let mut tight = LineOptions::new();
            tight.set(OptionKey::R6, tension_values::TIGHT_END);
            let ctx = ScopeCtx::new().merge(tight);
            caster.with_scope(&ctx, |caster| {
                cast_off(caster, &needles, opts.cast_off, pass.yarn_ends)?;
                caster.flush(None, None)?;
                Ok(())
            })?;
            if pass.yarn_ends && t + 1 < beds.len() {
                clearing_passes(caster, &needles)?;
            }
            Ok(())
        },
        PassKind::Actions => {
            caster.set_options(bed_options(beds, t, bed, pass));
            compile_actions(caster, bed, pass)
        },
        PassKind::Transfers => {
            caster.set_options(bed_options(beds, t, bed, pass));
            let mut entries = Vec::with_capacity(pass.sequence.len());
            for stitch in &pass.sequence {
                let Some(action) = pass.action_of(*stitch) else {
                    continue;
                };
                entries.push(TransferEntry {
                    stitch: *stitch,
                    source: action.source,
                    target: action.target(),
                    pairing: action.pairing,
                    restack: action.restack,
                });
            }
            core_transfer::emit(caster, &entries)
        },
    }
}

/// Standing options for an actions/transfer pass: R1 repeats when both
/// neighbor beds belong to the same shape, R11 under short rows, and the
/// pass tension.
fn bed_options(beds: &[TimeBed], t: usize, bed: &TimeBed, pass: &Pass) -> LineOptions {
    let mut opts = LineOptions::new();
    let same_shape = t > 0
        && t + 1 < beds.len()
        && beds[t - 1].group == bed.group
        && beds[t + 1].group == bed.group;
    opts.set(OptionKey::R1, if same_shape { bed.expansion } else { 0 });
    opts.set(OptionKey::R11, if bed.shortrow { presser::SHORTROW } else { presser::OFF });
    opts.set(OptionKey::R6, tension_for(pass));
    opts
}

/// Three empty-carrier passes over freshly cast-off needles, so the fabric
/// drops clear before the next block starts.
fn clearing_passes(caster: &mut Caster<'_>, needles: &[Needle]) -> Result<(), CompileError> {
    for _ in 0..3 {
        for n in needles {
            caster.move_to(n.index, Some(n.side), None)?.miss()?;
        }
        caster.flush(None, None)?;
    }
    Ok(())
}

/// Union of occupied needles across all beds sharing the group, used as the
/// precast catch surface. Only computed when the cast-on kind needs it.
fn precast_cover(beds: &[TimeBed], bed: &TimeBed, kind: CastOnKind) -> Vec<Needle> {
    if !matches!(kind, CastOnKind::Precast) {
        return Vec::new();
    }
    let mut cover: Vec<Needle> = Vec::new();
    for other in beds.iter().filter(|b| b.group == bed.group) {
        for n in other.occupied_needles() {
            if !cover.contains(&n) {
                cover.push(n);
            }
        }
    }
    cover.sort_by_key(|n| (n.index, n.side));
    cover
}

fn compile_actions(
    caster: &mut Caster<'_>,
    bed: &TimeBed,
    pass: &Pass,
) -> Result<(), CompileError> {
    // Sub-sequence into casted/casting runs by live occupancy.
    let mut i = 0;
    while i < pass.sequence.len() {
        let run_start = i;
        let casting = is_casting(caster, bed, pass, pass.sequence[i]);
        while i < pass.sequence.len() && is_casting(caster, bed, pass, pass.sequence[i]) == casting
        {
            i += 1;
        }
        let run = &pass.sequence[run_start..i];

        if casting && pass.safe_cast {
            let fresh: Vec<Needle> = run
                .iter()
                .filter(|s| {
                    !matches!(
                        pass.action_of(**s).map(|a| a.kind),
                        Some(ActionKind::Miss) | Some(ActionKind::SplitMiss)
                    )
                })
                .filter_map(|s| pass.action_of(*s).map(|a| a.source))
                .collect();
            if fresh.len() >= 2 {
                partial_cast_on(caster, &fresh)?;
            }
        }

        for (k, stitch) in run.iter().enumerate() {
            let Some(action) = pass.action_of(*stitch) else {
                warn!(%stitch, "stitch without action in pass; skipped");
                continue;
            };
            if matches!(action.kind, ActionKind::None) {
                continue;
            }
            let source = action.source;

            // Direction from the next stitch when it shares a side.
            let dir = run
                .get(k + 1)
                .or_else(|| pass.sequence.get(i))
                .and_then(|s| pass.action_of(*s))
                .map(|next| next.source)
                .filter(|next| next.side == source.side)
                .map(|next| direction_between(source.index, next.index))
                .filter(|d| !d.is_transfer());
            caster.move_to(source.index, Some(source.side), dir)?;
            caster.add_line_option(
                OptionKey::L13,
                transfer_type(source.side, false, false),
            );

            match action.kind {
                ActionKind::Knit => {
                    caster.pknit(action.reverse)?;
                },
                ActionKind::Tuck => {
                    caster.ptuck(action.reverse)?;
                },
                ActionKind::Miss | ActionKind::SplitMiss => {
                    caster.miss()?;
                },
                ActionKind::FbKnit => {
                    caster.fbknit()?;
                },
                ActionKind::Split => {
                    let target = action
                        .increase
                        .map(|inc| inc.target)
                        .or_else(|| action.target())
                        .unwrap_or_else(|| source.across());
                    caster.split_into(target.index)?;
                },
                ActionKind::Kickback => {
                    caster.kbknit()?;
                },
                ActionKind::None => unreachable!("filtered above"),
            }
        }
    }
    Ok(())
}

fn is_casting(
    caster: &Caster<'_>,
    bed: &TimeBed,
    pass: &Pass,
    stitch: core_bed::StitchId,
) -> bool {
    let source = pass
        .action_of(stitch)
        .map(|a| a.source)
        .or_else(|| bed.needle_of(stitch));
    match source {
        Some(n) => !caster.bed().occupied(n),
        None => false,
    }
}
