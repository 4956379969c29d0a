//! Cast-off: securing loops before the yarn leaves the piece.

use core_bed::{CompileError, Needle};
use core_caster::Caster;
use core_code::{Direction, direction_between};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CastOffKind {
    /// Knit-and-move along the course.
    #[default]
    Direct,
    /// Same walk, stitches worked on the reverse face.
    Reverse,
    /// Knit-and-move with a holding tuck at the freed needle behind.
    Pickup,
    /// Leave loops live; just park or remove the yarn.
    None,
}

/// Cast off `needles` one by one, then knit a tail on the last pair.
/// With `ending` the yarn is removed manually on the tail's final knit.
pub fn cast_off(
    caster: &mut Caster<'_>,
    needles: &[Needle],
    kind: CastOffKind,
    ending: bool,
) -> Result<(), CompileError> {
    if matches!(kind, CastOffKind::None) {
        if ending {
            if caster.dir() != Direction::Right {
                caster.turn()?;
            }
            caster.tuck()?;
            caster.remove_yarn();
            caster.flush(None, None)?;
        }
        return Ok(());
    }
    if needles.is_empty() {
        return Ok(());
    }

    let mut last_dir = caster.dir();
    for i in 0..needles.len().saturating_sub(1) {
        let cur = needles[i];
        let next = needles[i + 1];
        let dir = match direction_between(cur.index, next.index) {
            Direction::Transfer => last_dir,
            d => d,
        };
        if caster.dir() != dir {
            caster.turn()?;
        }
        last_dir = dir;

        if matches!(kind, CastOffKind::Pickup) && i > 0 {
            let hold = needles[i - 1];
            if caster.bed().occupied(hold) {
                return Err(CompileError::HoldingOccupied { index: hold.index });
            }
            caster.move_to(hold.index, Some(hold.side), None)?.tuck()?;
        }

        caster.move_to(cur.index, Some(cur.side), None)?;
        match kind {
            CastOffKind::Reverse => caster.pknit(true)?,
            _ => caster.knit()?,
        };
        caster.flush(None, None)?;
        caster.move_to_needle(next)?;
        caster.flush(None, None)?;
    }

    tail(caster, needles, ending)?;
    debug!(count = needles.len(), ?kind, "cast-off complete");
    Ok(())
}

/// Four extra knits alternating between the last two needles so the final
/// loop cannot unravel, removing the yarn on the last one when ending.
fn tail(caster: &mut Caster<'_>, needles: &[Needle], ending: bool) -> Result<(), CompileError> {
    let last = *needles.last().expect("cast-off needles checked non-empty");
    let prev = if needles.len() >= 2 { needles[needles.len() - 2] } else { last };
    for k in 0..4 {
        let n = if k % 2 == 0 { last } else { prev };
        caster.move_to(n.index, Some(n.side), None)?;
        caster.knit()?;
        if ending && k == 3 {
            caster.remove_yarn();
        }
        caster.flush(None, None)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_code::{Instr, OptionKey, Side, carriage, yarn};
    use core_raster::Raster;

    fn cast_needles(c: &mut Caster<'_>, n: usize) {
        for i in 0..n {
            c.bed_mut().set(Side::Front, i, true);
        }
    }

    #[test]
    fn direct_cast_off_walks_and_tails() {
        let mut r = Raster::new(6, 540);
        {
            let mut c = Caster::new(&mut r, 1);
            cast_needles(&mut c, 4);
            let needles: Vec<Needle> = (0..4).map(Needle::front).collect();
            cast_off(&mut c, &needles, CastOffKind::Direct, true).unwrap();
        }
        // 3 knit lines + 3 transfer lines + 4 tail knits.
        assert_eq!(r.height(), 10);
        // Transfers interleave as knit-cancel lines.
        assert_eq!(r.get_line_option(1, OptionKey::R5), Some(carriage::TRANSFER));
        // Yarn removed on the very last line.
        assert_eq!(r.get_line_option(9, OptionKey::R15), Some(yarn::REMOVE));
        assert_eq!(r.get_line_option(8, OptionKey::R15), None);
    }

    #[test]
    fn reverse_cast_off_purls() {
        let mut r = Raster::new(6, 540);
        {
            let mut c = Caster::new(&mut r, 1);
            cast_needles(&mut c, 3);
            let needles: Vec<Needle> = (0..3).map(Needle::front).collect();
            cast_off(&mut c, &needles, CastOffKind::Reverse, false).unwrap();
        }
        assert_eq!(r.content(0, 0).unwrap(), Instr::BACK_KNIT);
    }

    #[test]
    fn pickup_holds_behind() {
        let mut r = Raster::new(6, 540);
        {
            let mut c = Caster::new(&mut r, 1);
            cast_needles(&mut c, 3);
            let needles: Vec<Needle> = (0..3).map(Needle::front).collect();
            cast_off(&mut c, &needles, CastOffKind::Pickup, false).unwrap();
        }
        // Second knit line holds needle 0 with a tuck while knitting 1.
        let mut found = false;
        for line in 0..r.height() {
            if r.content(line, 0).unwrap() == Instr::FRONT_TUCK
                && r.content(line, 1).unwrap() == Instr::FRONT_KNIT
            {
                found = true;
            }
        }
        assert!(found, "holding tuck missing");
    }

    #[test]
    fn none_with_ending_parks_right() {
        let mut r = Raster::new(6, 540);
        {
            let mut c = Caster::new(&mut r, 1);
            c.set_dir(Direction::Left);
            c.move_to(2, None, None).unwrap();
            cast_off(&mut c, &[], CastOffKind::None, true).unwrap();
        }
        assert_eq!(r.height(), 1);
        assert_eq!(r.get_line_option(0, OptionKey::R15), Some(yarn::REMOVE));
        // The single parking line runs rightward; R5 records the forced
        // reversal against the expected direction.
        assert_eq!(r.get_line_option(0, OptionKey::R5), None);
    }
}
