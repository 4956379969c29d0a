//! Pure encoders: needle pair → transfer code, cross pair helpers, and the
//! direction-between relation. No state; every failure is a typed
//! `CodeError` so callers can attach the offending stitch.

use crate::{Direction, Instr, Side};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodeError {
    #[error("transfer distance {delta} exceeds the machine limit of 7 (needles {src} -> {trg})")]
    TransferTooFar { src: usize, trg: usize, delta: i64 },

    #[error("split distance {delta} exceeds the machine limit of 2 (needles {src} -> {trg})")]
    SplitTooFar { src: usize, trg: usize, delta: i64 },

    #[error("knit-after transfer requires a plain bed switch (needle {src})")]
    InvalidKnitAfter { src: usize },

    #[error("transfer from needle {index} onto itself")]
    IdentityTransfer { index: usize },

    #[error("invalid option symbol {symbol}")]
    InvalidOption { symbol: String },
}

/// Direction the carrier must travel to get from needle `i0` to `i1`;
/// `Transfer` when the needles coincide.
pub fn direction_between(i0: usize, i1: usize) -> Direction {
    match i1.cmp(&i0) {
        std::cmp::Ordering::Greater => Direction::Right,
        std::cmp::Ordering::Less => Direction::Left,
        std::cmp::Ordering::Equal => Direction::Transfer,
    }
}

/// Encode one loop relocation as a raster instruction.
///
/// Dispatches across the four transfer families:
/// * same-bed move (shift 1..=7 left or right),
/// * bed switch without shift,
/// * bed switch with shift (|delta| <= 7),
/// * switch-then-knit (`knit_after`, which requires a plain bed switch).
pub fn transfer_code(
    i_src: usize,
    side_src: Side,
    i_trg: usize,
    side_trg: Side,
    knit_after: bool,
) -> Result<Instr, CodeError> {
    let delta = i_trg as i64 - i_src as i64;
    if delta.abs() > 7 {
        return Err(CodeError::TransferTooFar { src: i_src, trg: i_trg, delta });
    }

    if knit_after {
        if delta != 0 || side_src == side_trg {
            return Err(CodeError::InvalidKnitAfter { src: i_src });
        }
        return Ok(match side_src {
            Side::Front => Instr::TO_BACK_KNIT,
            Side::Back => Instr::TO_FRONT_KNIT,
        });
    }

    if side_src == side_trg {
        if delta == 0 {
            return Err(CodeError::IdentityTransfer { index: i_src });
        }
        let dir = direction_between(i_src, i_trg);
        // Checked above: 1 <= |delta| <= 7.
        return Ok(Instr::move_code(side_src, dir, delta.unsigned_abs() as u8)
            .expect("move distance validated"));
    }

    Ok(Instr::switch_code(side_src, delta as i8).expect("switch distance validated"))
}

/// Encode a split with a shifted landing needle, |delta| <= 2.
pub fn split_shift_code(i_src: usize, side: Side, i_trg: usize) -> Result<Instr, CodeError> {
    let delta = i_trg as i64 - i_src as i64;
    if delta.abs() > 2 {
        return Err(CodeError::SplitTooFar { src: i_src, trg: i_trg, delta });
    }
    Instr::split_code(side, delta as i8)
        .ok_or(CodeError::SplitTooFar { src: i_src, trg: i_trg, delta })
}

/// Cross code for one cable leg. `above` picks the leg crossing in front of
/// the other; `ordinal` is the running pair number within the line, so that
/// adjacent pairs alternate between the primary and `_SECOND` code pairs and
/// stay distinguishable for the joint-fill scan.
pub fn cross_code(above: bool, ordinal: u32) -> Instr {
    match (ordinal % 2 == 0, above) {
        (true, true) => Instr::CROSS_ABOVE,
        (true, false) => Instr::CROSS_BELOW,
        (false, true) => Instr::CROSS_ABOVE_SECOND,
        (false, false) => Instr::CROSS_BELOW_SECOND,
    }
}

/// The code that closes a cross pair opened by `code`, if `code` opens one.
pub fn cross_complement(code: Instr) -> Option<Instr> {
    match code {
        Instr::CROSS_BELOW => Some(Instr::CROSS_ABOVE),
        Instr::CROSS_ABOVE => Some(Instr::CROSS_BELOW),
        Instr::CROSS_BELOW_SECOND => Some(Instr::CROSS_ABOVE_SECOND),
        Instr::CROSS_ABOVE_SECOND => Some(Instr::CROSS_BELOW_SECOND),
        Instr::CROSS_NEUTRAL => Some(Instr::CROSS_NEUTRAL),
        Instr::CROSS_SPLIT => Some(Instr::CROSS_SPLIT),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bed_moves() {
        assert_eq!(
            transfer_code(10, Side::Front, 13, Side::Front, false),
            Ok(Instr(73))
        );
        assert_eq!(
            transfer_code(10, Side::Back, 9, Side::Back, false),
            Ok(Instr(81))
        );
        assert!(matches!(
            transfer_code(10, Side::Front, 10, Side::Front, false),
            Err(CodeError::IdentityTransfer { index: 10 })
        ));
    }

    #[test]
    fn bed_switches() {
        assert_eq!(
            transfer_code(5, Side::Front, 5, Side::Back, false),
            Ok(Instr::TO_BACK)
        );
        assert_eq!(
            transfer_code(5, Side::Back, 8, Side::Front, false),
            Ok(Instr(46))
        );
        assert_eq!(
            transfer_code(5, Side::Front, 2, Side::Back, false),
            Ok(Instr(24))
        );
    }

    #[test]
    fn distance_limit() {
        let err = transfer_code(0, Side::Front, 8, Side::Front, false).unwrap_err();
        assert!(matches!(err, CodeError::TransferTooFar { delta: 8, .. }));
        let err = transfer_code(20, Side::Front, 12, Side::Back, false).unwrap_err();
        assert!(matches!(err, CodeError::TransferTooFar { delta: -8, .. }));
    }

    #[test]
    fn knit_after_requires_plain_switch() {
        assert_eq!(
            transfer_code(3, Side::Front, 3, Side::Back, true),
            Ok(Instr::TO_BACK_KNIT)
        );
        assert!(transfer_code(3, Side::Front, 4, Side::Back, true).is_err());
        assert!(transfer_code(3, Side::Front, 3, Side::Front, true).is_err());
    }

    #[test]
    fn cross_ordinal_alternation() {
        assert_eq!(cross_code(false, 0), Instr::CROSS_BELOW);
        assert_eq!(cross_code(true, 0), Instr::CROSS_ABOVE);
        assert_eq!(cross_code(false, 1), Instr::CROSS_BELOW_SECOND);
        assert_eq!(cross_code(true, 1), Instr::CROSS_ABOVE_SECOND);
        assert_eq!(cross_code(false, 2), Instr::CROSS_BELOW);
    }

    #[test]
    fn complements_pair_up() {
        assert_eq!(cross_complement(Instr::CROSS_BELOW), Some(Instr::CROSS_ABOVE));
        assert_eq!(
            cross_complement(Instr::CROSS_ABOVE_SECOND),
            Some(Instr::CROSS_BELOW_SECOND)
        );
        assert_eq!(cross_complement(Instr::CROSS_NEUTRAL), Some(Instr::CROSS_NEUTRAL));
        assert_eq!(cross_complement(Instr::FRONT_KNIT), None);
    }

    #[test]
    fn split_shifts() {
        assert_eq!(split_shift_code(7, Side::Front, 9), Ok(Instr(112)));
        assert_eq!(split_shift_code(7, Side::Back, 7), Ok(Instr::BACK_SPLIT));
        assert!(split_shift_code(7, Side::Front, 10).is_err());
    }
}
