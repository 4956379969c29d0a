//! End-to-end: 20-wide cylinder, 10 rounds, kickback cast-on, pickup
//! cast-off.

mod common;

use core_cast::{CastOffKind, CastOnKind};
use core_code::{Direction, OptionKey, tension};
use core_passes::{CompileOptions, compile};

fn build() -> core_raster::Raster {
    let mut beds = vec![common::cast_on_bed(20, true)];
    for r in 0..10 {
        beds.push(common::round(r + 1, 20));
    }
    beds.push(common::cast_off_bed(11, 20, true));
    let opts = CompileOptions {
        cast_on: CastOnKind::Kickback,
        cast_off: CastOffKind::Pickup,
        ..Default::default()
    };
    compile(&beds, &opts).unwrap()
}

#[test]
fn rounds_emit_front_then_back_passes() {
    let raster = build();
    // Kickback ramp is a single tuck line; rounds follow, two lines each.
    let first_round_line = 1;
    for r in 0..10 {
        let front = first_round_line + 2 * r;
        let back = front + 1;
        assert_eq!(
            raster.content(front, 0).unwrap(),
            core_code::Instr::FRONT_KNIT,
            "round {r} front pass"
        );
        assert_eq!(
            raster.content(back, 0).unwrap(),
            core_code::Instr::BACK_KNIT,
            "round {r} back pass"
        );
    }
}

#[test]
fn every_line_carries_the_carrier() {
    let raster = build();
    for line in 0..raster.height() {
        assert_eq!(
            raster.get_line_option(line, OptionKey::R3),
            Some(1),
            "line {line}"
        );
    }
}

#[test]
fn tension_tight_at_the_edges_normal_between() {
    let raster = build();
    // Cast-on line.
    assert_eq!(
        raster.get_line_option(0, OptionKey::R6),
        Some(tension::TIGHT_START)
    );
    // All round lines knit at normal tension.
    for r in 0..20 {
        assert_eq!(
            raster.get_line_option(1 + r, OptionKey::R6),
            Some(tension::NORMAL),
            "round line {r}"
        );
    }
    // Cast-off lines are tight the other way.
    assert_eq!(
        raster.get_line_option(21, OptionKey::R6),
        Some(tension::TIGHT_END)
    );
    let last = raster.height() - 1;
    assert_eq!(
        raster.get_line_option(last, OptionKey::R6),
        Some(tension::TIGHT_END)
    );
}

#[test]
fn round_passes_alternate_direction() {
    let raster = build();
    for r in 0..10usize {
        let front = 1 + 2 * r;
        let back = front + 1;
        let fd = raster.line_direction(front).unwrap();
        let bd = raster.line_direction(back).unwrap();
        assert_ne!(fd, Direction::Transfer);
        assert_eq!(bd, fd.flip(), "round {r} returns the carriage");
    }
}
