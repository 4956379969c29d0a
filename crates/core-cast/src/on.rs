//! Cast-on: catching a yarn on empty needles.

use crate::near_tucks;
use core_bed::{CompileError, Needle};
use core_caster::Caster;
use core_code::Direction;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CastOnKind {
    /// Two-pass alternating tuck ramp (flat), or two parity rounds
    /// (circular).
    #[default]
    Interlock,
    /// Kickback ramp. The ramp proper is approximated by the tuck ramp and
    /// logged, matching the inherited stub behavior.
    Kickback,
    /// Near tucks only.
    Tuck,
    /// Catch on the whole group cover, knit it closed twice, then walk back
    /// to the requested needles.
    Precast,
    None,
}

#[derive(Debug, Clone)]
pub struct CastOnRequest<'a> {
    /// Needles to cast, in carrier order.
    pub needles: &'a [Needle],
    /// Course circularity of the owning group.
    pub circular: bool,
    pub kind: CastOnKind,
    /// First use of the yarn: issue a manual insert.
    pub starting: bool,
    /// Union of same-group occupations, required for `Precast`.
    pub cover: &'a [Needle],
}

/// Cast a yarn onto `req.needles`.
///
/// Fewer than two needles is a silent no-op (beyond the manual insert):
/// there is nothing to anchor a catch between.
pub fn cast_on(caster: &mut Caster<'_>, req: &CastOnRequest<'_>) -> Result<(), CompileError> {
    if req.starting {
        caster.insert_yarn();
    }
    if req.needles.len() < 2 {
        debug!(count = req.needles.len(), "cast-on skipped: nothing to catch");
        return Ok(());
    }
    match req.kind {
        CastOnKind::Interlock if req.circular => circular_interlock(caster, req.needles),
        CastOnKind::Interlock => flat_interlock(caster, req.needles),
        CastOnKind::Kickback => {
            if req.circular {
                let last = req.needles.len() - 1;
                near_tucks(caster, req.needles[last - 1], req.needles[last])?;
            } else {
                near_tucks(caster, req.needles[0], req.needles[1])?;
            }
            warn!("kickback ramp is not modeled; approximating with a tuck ramp");
            caster.flush(None, None)?;
            Ok(())
        },
        CastOnKind::Tuck => {
            near_tucks(caster, req.needles[0], req.needles[1])?;
            caster.flush(None, None)?;
            Ok(())
        },
        CastOnKind::Precast => precast(caster, req),
        CastOnKind::None => Ok(()),
    }
}

/// Near tucks plus a forward pass over every other remaining needle, then a
/// return pass over the skipped ones. Two lines total.
fn flat_interlock(caster: &mut Caster<'_>, needles: &[Needle]) -> Result<(), CompileError> {
    near_tucks(caster, needles[0], needles[1])?;
    for i in (3..needles.len()).step_by(2) {
        let n = needles[i];
        caster.move_to(n.index, Some(n.side), None)?.tuck()?;
    }
    caster.turn()?;
    for i in (2..needles.len()).step_by(2).rev() {
        let n = needles[i];
        caster.move_to(n.index, Some(n.side), None)?.tuck()?;
    }
    caster.flush(None, None)?;
    Ok(())
}

/// Two alternating parity rounds over the whole ring.
fn circular_interlock(caster: &mut Caster<'_>, needles: &[Needle]) -> Result<(), CompileError> {
    for i in (0..needles.len()).step_by(2) {
        let n = needles[i];
        caster.move_to(n.index, Some(n.side), None)?.tuck()?;
    }
    caster.turn()?;
    for i in (1..needles.len()).step_by(2).rev() {
        let n = needles[i];
        caster.move_to(n.index, Some(n.side), None)?.tuck()?;
    }
    caster.flush(None, None)?;
    Ok(())
}

/// Catch on the group cover, close it with two knit rounds, walk back.
fn precast(caster: &mut Caster<'_>, req: &CastOnRequest<'_>) -> Result<(), CompileError> {
    let mut cover: Vec<Needle> = req.cover.to_vec();
    if cover.len() < 2 {
        debug!("precast cover too small; falling back to near tucks");
        near_tucks(caster, req.needles[0], req.needles[1])?;
        caster.flush(None, None)?;
        return Ok(());
    }
    cover.sort_by_key(|n| (n.index, n.side));
    if caster.dir() == Direction::Left {
        cover.reverse();
    }

    let fronts: Vec<Needle> = cover.iter().copied().filter(|n| n.side.is_front()).collect();
    if fronts.len() >= 2 {
        near_tucks(caster, fronts[0], fronts[1])?;
        for n in fronts.iter().skip(2) {
            caster.move_to(n.index, Some(n.side), None)?.tuck()?;
        }
    } else {
        near_tucks(caster, cover[0], cover[1])?;
    }
    caster.turn()?;

    // Two closed rounds over the whole cover anchor the base.
    for round in 0..2 {
        let pass: Box<dyn Iterator<Item = &Needle> + '_> = if round % 2 == 0 {
            Box::new(cover.iter().rev())
        } else {
            Box::new(cover.iter())
        };
        for n in pass {
            caster.move_to(n.index, Some(n.side), None)?.knit()?;
        }
        caster.turn()?;
    }

    let first = req.needles[0];
    caster.move_to(first.index, Some(first.side), None)?;
    Ok(())
}

/// Interlock ramp over a sub-sequence only, used when an action pass runs
/// into a casting run mid-fabric. Refuses needles that already hold loops.
pub fn partial_cast_on(caster: &mut Caster<'_>, needles: &[Needle]) -> Result<(), CompileError> {
    for n in needles {
        if caster.bed().occupied(*n) {
            return Err(CompileError::AlreadyCast { index: n.index });
        }
    }
    if needles.len() < 2 {
        // A single fresh needle is caught by the action's own stitch.
        return Ok(());
    }
    for i in (0..needles.len()).step_by(2) {
        let n = needles[i];
        caster.move_to(n.index, Some(n.side), None)?.tuck()?;
    }
    caster.turn()?;
    for i in (1..needles.len()).step_by(2).rev() {
        let n = needles[i];
        caster.move_to(n.index, Some(n.side), None)?.tuck()?;
    }
    caster.flush(None, None)?;
    Ok(())
}
