//! Cast-on and cast-off engines.
//!
//! Both engines are pure composition: they sequence caster primitives
//! (tucks, knits, moves, flushes) into the on-ramps that catch a fresh yarn
//! on empty needles and the tail-offs that secure loops before the yarn
//! leaves. Nothing here writes to the raster directly.
//!
//! These started life inside the pass compiler; they were extracted once the
//! partial cast-on (mid-fabric widening) needed to reuse the ramp logic
//! without dragging the pass dispatch table along. The split keeps one rule
//! intact: engines own *sequencing*, the caster owns *emission*.

mod off;
mod on;

pub use off::{CastOffKind, cast_off};
pub use on::{CastOnKind, CastOnRequest, cast_on, partial_cast_on};

use core_bed::Needle;
use core_caster::Caster;
use core_code::direction_between;

/// Two tucks at `a` then `b`, swapped when the carrier currently travels
/// against the direction between them. The shared entry point of every
/// on-ramp: the first catch of a new yarn needs two adjacent anchors.
pub(crate) fn near_tucks(
    caster: &mut Caster<'_>,
    a: Needle,
    b: Needle,
) -> Result<(), core_bed::CompileError> {
    let between = direction_between(a.index, b.index);
    let (first, second) = if caster.dir() == between { (a, b) } else { (b, a) };
    caster.move_to(first.index, Some(first.side), None)?.tuck()?;
    caster.move_to(second.index, Some(second.side), None)?.tuck()?;
    Ok(())
}
