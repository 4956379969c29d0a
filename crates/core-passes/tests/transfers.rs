//! End-to-end transfer scenarios: cables, slider conflicts, and the
//! unsatisfiable swap.

mod common;

use core_bed::{Action, ActionKind, CompileError, Needle, Pairing, Pass, PassKind, StitchId, TimeBed};
use core_code::{Direction, Instr, OptionKey, Side, transfer_type};
use core_passes::{CompileOptions, compile};

fn transfer_bed(time: usize, width: usize, actions: Vec<(u32, Action)>) -> TimeBed {
    let mut bed = TimeBed::new(time, width);
    let mut pass = Pass::new(PassKind::Transfers);
    for (id, action) in actions {
        pass.sequence.push(StitchId(id));
        pass.actions.insert(StitchId(id), action);
    }
    bed.passes.push(pass);
    bed
}

fn relocation(source: Needle, target: Needle) -> Action {
    let mut a = Action::new(ActionKind::None, source);
    a.targets.push(target);
    a
}

fn cross_leg(source: Needle, target: Needle, partner: u32, above: bool) -> Action {
    let mut a = relocation(source, target);
    a.pairing = Some(Pairing { partner: StitchId(partner), above });
    a
}

/// Scenario: one move with delta 3 plus a cross pair. A single sub-pass,
/// loosened tension, ordinal-0 cross codes, and a joint between the legs.
#[test]
fn shifted_move_with_cable() {
    let mut beds = vec![common::cast_on_bed(12, false), common::knit_row(1, 12, true)];
    beds.push(transfer_bed(2, 12, vec![
        (100, relocation(Needle::front(2), Needle::front(5))),
        (101, cross_leg(Needle::front(7), Needle::front(9), 102, false)),
        (102, cross_leg(Needle::front(9), Needle::front(7), 101, true)),
    ]));
    beds.push(common::knit_row(3, 12, false));
    let raster = compile(&beds, &CompileOptions::default()).unwrap();

    // Exactly one knit-cancel line between the two knit rows.
    let transfer_lines: Vec<usize> = (0..raster.height())
        .filter(|l| raster.line_direction(*l) == Some(Direction::Transfer))
        .collect();
    assert_eq!(transfer_lines.len(), 1, "planner must emit one sub-pass");
    let line = transfer_lines[0];

    assert_eq!(raster.get_line_option(line, OptionKey::R6), Some(7));
    assert_eq!(raster.content(line, 7).unwrap(), Instr::CROSS_BELOW);
    assert_eq!(raster.content(line, 9).unwrap(), Instr::CROSS_ABOVE);
    assert_eq!(
        raster.content(line, 8).unwrap(),
        Instr::CROSS_JOINT,
        "the cell between the legs becomes the joint code"
    );
    assert_eq!(
        raster.content(line, 2).unwrap().move_params(),
        Some((Side::Front, Direction::Right, 3))
    );
}

/// Scenario: a same-bed move needing sliders plus a bed switch in one
/// request splits into two sub-passes, switches first.
#[test]
fn slider_conflict_splits_sub_passes() {
    let mut beds = vec![common::cast_on_bed(12, false), common::round(1, 12)];
    beds.push(transfer_bed(2, 12, vec![
        // Same-bed move while b2 holds a loop: sliders.
        (100, relocation(Needle::front(2), Needle::front(4))),
        // And a bed switch in the same request.
        (101, relocation(Needle::front(7), Needle::back(7))),
    ]));
    let raster = compile(&beds, &CompileOptions::default()).unwrap();

    let transfer_lines: Vec<usize> = (0..raster.height())
        .filter(|l| raster.line_direction(*l) == Some(Direction::Transfer))
        .collect();
    assert_eq!(transfer_lines.len(), 2);
    let (first, second) = (transfer_lines[0], transfer_lines[1]);
    // Bed switch first, slider move second; L13 tells the machine.
    assert!(raster.content(first, 7).unwrap().switch_params().is_some());
    assert_eq!(
        raster.get_line_option(first, OptionKey::L13),
        Some(transfer_type(Side::Front, false, false))
    );
    assert!(raster.content(second, 2).unwrap().move_params().is_some());
    assert_eq!(
        raster.get_line_option(second, OptionKey::L13),
        Some(transfer_type(Side::Front, true, false))
    );
}

/// Scenario: needle 5 front and needle 5 back swap beds simultaneously.
/// The constraint loop is unsatisfiable and the compile fails.
#[test]
fn simultaneous_swap_fails() {
    let mut beds = vec![common::cast_on_bed(12, false), common::round(1, 12)];
    beds.push(transfer_bed(2, 12, vec![
        (100, relocation(Needle::front(5), Needle::back(5))),
        (101, relocation(Needle::back(5), Needle::front(5))),
    ]));
    let err = compile(&beds, &CompileOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        CompileError::TransferConstraintLoop { a: 5, .. }
    ));
    assert_eq!(err.kind(), core_bed::ErrorKind::Structural);
}
