//! The yarn caster: a cooperative state machine that turns stitch-level
//! operations into raster lines.
//!
//! The caster owns the per-line accumulation buffer and the live bed
//! occupancy. Operations are chain-returning; anything that can violate a
//! machine constraint returns a typed `CompileError` instead of panicking.
//!
//! Invariants:
//! * A line never mixes yarn-forming codes with transfer codes; emitting a
//!   mismatched class flushes first. Flushed transfer lines never flip the
//!   carrier direction.
//! * Bed occupancy is updated at emission time (unless IGNORE_BED), so the
//!   link-process fill at flush reflects real loops.
//! * `flush` is the only path that commits to the raster, and it leaves the
//!   buffer empty.

mod scope;

pub use scope::ScopeCtx;

use core_bed::{BedState, CompileError, Needle};
use core_code::{
    Direction, Instr, LineOptions, OptionKey, Side, carriage, dscs, split_shift_code,
    transfer_code, transfer_type, yarn,
};
use core_raster::Raster;
use tracing::trace;

bitflags::bitflags! {
    /// Caster mode bits; `unmode` clears bits instead of setting them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CastMode: u8 {
        /// Navigation skips needles whose bed state is empty.
        const SKIP_EMPTY = 1 << 0;
        /// Do not wrap from the left bed end onto the other side.
        const MIRROR_LEFT = 1 << 1;
        /// Do not wrap from the right bed end onto the other side.
        const MIRROR_RIGHT = 1 << 2;
        /// Fill every occupied needle with link-process at flush, not just
        /// the span interior.
        const LINK_PROCESS = 1 << 3;
        /// Primitives advance to the next needle after emitting.
        const AUTO_MOVE = 1 << 4;
        /// Emit without touching bed occupancy.
        const IGNORE_BED = 1 << 5;
    }
}

/// Stitch primitive selector; resolved against the working side at emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StitchKind {
    Knit,
    FbKnit,
    KbKnit,
    Miss,
    Tuck,
    Split,
}

/// Class of the codes currently buffered in the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineClass {
    Yarn,
    Transfer,
}

pub struct Caster<'r> {
    raster: &'r mut Raster,
    bed: BedState,
    left: usize,
    right: usize,
    current: usize,
    side: Side,
    dir: Direction,
    carrier: u8,
    /// Standing options repeated on every flushed line until changed.
    options: LineOptions,
    /// One-shot options merged into the next flush only.
    line_extra: LineOptions,
    line: Vec<Instr>,
    class: Option<LineClass>,
    mode: CastMode,
    knitting: bool,
    last: Option<Needle>,
    start: Option<Needle>,
    dscs_state: u8,
}

impl<'r> Caster<'r> {
    pub fn new(raster: &'r mut Raster, carrier: u8) -> Self {
        let width = raster.width();
        Caster {
            bed: BedState::new(width),
            left: 0,
            right: width.saturating_sub(1),
            current: 0,
            side: Side::Front,
            dir: Direction::Right,
            carrier,
            options: LineOptions::new(),
            line_extra: LineOptions::new(),
            line: vec![Instr::EMPTY; width],
            class: None,
            mode: CastMode::empty(),
            knitting: false,
            last: None,
            start: None,
            dscs_state: dscs::OFF,
            raster,
        }
    }

    // -- accessors --------------------------------------------------------

    pub fn needle(&self) -> Needle {
        Needle { index: self.current, side: self.side }
    }

    pub fn dir(&self) -> Direction {
        self.dir
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn carrier(&self) -> u8 {
        self.carrier
    }

    pub fn bed(&self) -> &BedState {
        &self.bed
    }

    pub fn bed_mut(&mut self) -> &mut BedState {
        &mut self.bed
    }

    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    pub fn raster_mut(&mut self) -> &mut Raster {
        self.raster
    }

    pub fn is_knitting(&self) -> bool {
        self.knitting
    }

    pub fn has_buffered(&self) -> bool {
        self.line.iter().any(|c| !c.is_empty())
    }

    // -- configuration ----------------------------------------------------

    pub fn mode(&mut self, flags: CastMode) -> &mut Self {
        self.mode |= flags;
        self
    }

    pub fn unmode(&mut self, flags: CastMode) -> &mut Self {
        self.mode -= flags;
        self
    }

    pub fn set_dir(&mut self, dir: Direction) -> &mut Self {
        debug_assert!(!dir.is_transfer(), "carrier direction is left or right");
        self.dir = dir;
        self
    }

    /// Replace the standing per-line options.
    pub fn set_options(&mut self, options: LineOptions) -> &mut Self {
        self.options = options;
        self
    }

    /// Merge into the standing per-line options.
    pub fn add_options(&mut self, options: &LineOptions) -> &mut Self {
        self.options.merge(options);
        self
    }

    /// Merge a one-shot option into the next flushed line only.
    pub fn add_line_option(&mut self, key: OptionKey, value: u8) -> &mut Self {
        self.line_extra.set(key, value);
        self
    }

    /// Working extent of the piece on the bed.
    pub fn set_extent(&mut self, left: usize, right: usize) -> &mut Self {
        self.left = left;
        self.right = right.max(left);
        self
    }

    /// Manual yarn handling (R15) on the next line; starting a yarn also
    /// resets the knitting flag.
    pub fn insert_yarn(&mut self) -> &mut Self {
        self.line_extra.set(OptionKey::R15, yarn::INSERT);
        self.knitting = false;
        self
    }

    pub fn remove_yarn(&mut self) -> &mut Self {
        self.line_extra.set(OptionKey::R15, yarn::REMOVE);
        self
    }

    /// DSCS state machine on L9: start flips 0 -> 1, stop flips 1 -> 0,
    /// absolute states >= 2 are written through.
    pub fn dscs_start(&mut self) -> &mut Self {
        if self.dscs_state == dscs::OFF {
            self.dscs_state = dscs::ON;
            self.line_extra.set(OptionKey::L9, dscs::ON);
        }
        self
    }

    pub fn dscs_stop(&mut self) -> &mut Self {
        if self.dscs_state == dscs::ON {
            self.dscs_state = dscs::OFF;
            self.line_extra.set(OptionKey::L9, dscs::OFF);
        }
        self
    }

    pub fn dscs_set(&mut self, state: u8) -> &mut Self {
        debug_assert!(state >= 2, "absolute DSCS states start at 2");
        self.dscs_state = state;
        self.line_extra.set(OptionKey::L9, state);
        self
    }

    // -- navigation -------------------------------------------------------

    fn step_once(&mut self, backwards: bool) {
        let dir = if backwards { self.dir.flip() } else { self.dir };
        match dir {
            Direction::Right if self.current >= self.right => {
                if !self.mode.contains(CastMode::MIRROR_RIGHT) {
                    self.side = self.side.flip();
                    self.dir = self.dir.flip();
                }
            },
            Direction::Left if self.current <= self.left => {
                if !self.mode.contains(CastMode::MIRROR_LEFT) {
                    self.side = self.side.flip();
                    self.dir = self.dir.flip();
                }
            },
            Direction::Right => self.current += 1,
            Direction::Left => self.current -= 1,
            Direction::Transfer => {},
        }
    }

    /// Advance `steps` needles along the travel direction (`backwards`
    /// reverses). Wraps onto the other bed at the extent ends unless the
    /// matching MIRROR flag is set; SKIP_EMPTY keeps stepping over
    /// unoccupied needles.
    pub fn next(&mut self, steps: usize, backwards: bool) -> &mut Self {
        for _ in 0..steps {
            self.step_once(backwards);
            if self.mode.contains(CastMode::SKIP_EMPTY) {
                // Bounded sweep: one full tour of both beds at most.
                let mut guard = 2 * (self.right - self.left + 1);
                while guard > 0 && !self.bed.occupied(self.needle()) {
                    self.step_once(backwards);
                    guard -= 1;
                }
            }
        }
        self
    }

    pub fn prev(&mut self, steps: usize) -> &mut Self {
        self.next(steps, true)
    }

    /// Reposition the working needle. A side change with buffered data
    /// commits the buffer first; a direction mismatch over more than one
    /// needle turns the carrier (flushing any pending line).
    pub fn move_to(
        &mut self,
        index: usize,
        side: Option<Side>,
        dir: Option<Direction>,
    ) -> Result<&mut Self, CompileError> {
        let side = side.unwrap_or(self.side);
        if side != self.side && self.has_buffered() {
            self.flush(None, None)?;
        }
        if let Some(dir) = dir {
            if dir != self.dir && !dir.is_transfer() {
                let delta = index.abs_diff(self.current);
                if delta > 1 {
                    self.turn()?;
                }
                self.dir = dir;
            }
        }
        self.current = index;
        self.side = side;
        Ok(self)
    }

    /// Commit any pending line and reverse the carrier.
    pub fn turn(&mut self) -> Result<&mut Self, CompileError> {
        if self.has_buffered() {
            self.flush(None, None)?;
        } else {
            self.dir = self.dir.flip();
        }
        Ok(self)
    }

    // -- emission core ----------------------------------------------------

    fn class_of(code: Instr) -> LineClass {
        if code.move_params().is_some() || code.switch_params().is_some() {
            LineClass::Transfer
        } else {
            LineClass::Yarn
        }
    }

    fn emit_at(&mut self, index: usize, code: Instr) -> Result<(), CompileError> {
        let class = Self::class_of(code);
        if !self.line.get(index).copied().unwrap_or(Instr::EMPTY).is_empty()
            || self.class.is_some_and(|c| c != class)
        {
            self.flush(None, None)?;
        }
        if index >= self.line.len() {
            return Err(CompileError::OutOfBounds { x: index, y: self.raster.height() });
        }
        self.line[index] = code;
        self.class = Some(class);
        if !self.mode.contains(CastMode::IGNORE_BED) {
            self.bed.apply(index, code);
        }
        if class == LineClass::Yarn && code.anchors_carrier() {
            self.knitting = true;
        }
        let at = Needle { index, side: self.side };
        self.start.get_or_insert(at);
        self.last = Some(at);
        Ok(())
    }

    fn cast(&mut self, kind: StitchKind, reverse: bool) -> Result<&mut Self, CompileError> {
        let side = if reverse { self.side.flip() } else { self.side };
        let code = match (kind, side) {
            (StitchKind::Knit, Side::Front) => Instr::FRONT_KNIT,
            (StitchKind::Knit, Side::Back) => Instr::BACK_KNIT,
            (StitchKind::FbKnit, _) => Instr::BOTH_KNIT,
            (StitchKind::KbKnit, Side::Front) => Instr::FRONT_KNIT_MISS,
            (StitchKind::KbKnit, Side::Back) => Instr::BACK_KNIT_MISS,
            (StitchKind::Miss, Side::Front) => Instr::FRONT_MISS,
            (StitchKind::Miss, Side::Back) => Instr::BACK_MISS,
            (StitchKind::Tuck, Side::Front) => Instr::FRONT_TUCK,
            (StitchKind::Tuck, Side::Back) => Instr::BACK_TUCK,
            (StitchKind::Split, Side::Front) => Instr::FRONT_SPLIT,
            (StitchKind::Split, Side::Back) => Instr::BACK_SPLIT,
        };
        self.emit_at(self.current, code)?;
        if self.mode.contains(CastMode::AUTO_MOVE) {
            self.next(1, false);
        }
        Ok(self)
    }

    // -- primitives -------------------------------------------------------

    pub fn knit(&mut self) -> Result<&mut Self, CompileError> {
        self.cast(StitchKind::Knit, false)
    }

    pub fn purl(&mut self) -> Result<&mut Self, CompileError> {
        self.cast(StitchKind::Knit, true)
    }

    /// Knit, optionally on the reverse face.
    pub fn pknit(&mut self, reverse: bool) -> Result<&mut Self, CompileError> {
        self.cast(StitchKind::Knit, reverse)
    }

    pub fn fbknit(&mut self) -> Result<&mut Self, CompileError> {
        self.cast(StitchKind::FbKnit, false)
    }

    pub fn kbknit(&mut self) -> Result<&mut Self, CompileError> {
        self.cast(StitchKind::KbKnit, false)
    }

    pub fn miss(&mut self) -> Result<&mut Self, CompileError> {
        self.cast(StitchKind::Miss, false)
    }

    pub fn tuck(&mut self) -> Result<&mut Self, CompileError> {
        self.cast(StitchKind::Tuck, false)
    }

    pub fn ptuck(&mut self, reverse: bool) -> Result<&mut Self, CompileError> {
        self.cast(StitchKind::Tuck, reverse)
    }

    pub fn split(&mut self) -> Result<&mut Self, CompileError> {
        self.cast(StitchKind::Split, false)
    }

    /// Split with the held loop landing on a shifted opposite needle.
    pub fn split_into(&mut self, target_index: usize) -> Result<&mut Self, CompileError> {
        let code = split_shift_code(self.current, self.side, target_index)?;
        self.emit_at(self.current, code)?;
        if self.mode.contains(CastMode::AUTO_MOVE) {
            self.next(1, false);
        }
        Ok(self)
    }

    // -- transfers --------------------------------------------------------

    /// Move the loop at the working needle to `target`. Same-side moves that
    /// face an occupied opposing needle request sliders through L13. When
    /// the yarn is not knitting yet the pending line is committed as a
    /// knit-cancel pass, preserving the carrier direction.
    pub fn move_to_needle(&mut self, target: Needle) -> Result<&mut Self, CompileError> {
        let src = self.needle();
        let code = transfer_code(src.index, src.side, target.index, target.side, false)?;
        let needs_sliders = src.side == target.side && self.bed.other_side(src);
        // emit_at may flush a pending yarn line first; the slider request
        // must land on the transfer line, so it is recorded after.
        self.emit_at(src.index, code)?;
        if needs_sliders {
            self.line_extra
                .set(OptionKey::L13, transfer_type(src.side, true, false));
        }
        self.current = target.index;
        self.side = target.side;
        Ok(self)
    }

    pub fn move_by(&mut self, delta: i64) -> Result<&mut Self, CompileError> {
        let index = self.current as i64 + delta;
        if index < 0 {
            return Err(CompileError::OutOfBounds { x: 0, y: self.raster.height() });
        }
        let target = Needle { index: index as usize, side: self.side };
        self.move_to_needle(target)
    }

    /// Same-index bed switch.
    pub fn transfer(&mut self) -> Result<&mut Self, CompileError> {
        let target = self.needle().across();
        self.move_to_needle(target)
    }

    /// Write a prepared block of codes at the given needles as one line.
    ///
    /// Occupancy is *not* applied here: block callers (the transfer
    /// planner) own the clear-sources-then-set-targets bookkeeping, since
    /// restack and cross codes would double-count through per-code effects.
    pub fn instr_block(
        &mut self,
        instrs: &[Instr],
        needles: &[Needle],
        as_transfer: bool,
    ) -> Result<&mut Self, CompileError> {
        debug_assert_eq!(instrs.len(), needles.len());
        if self.has_buffered() {
            self.flush(None, None)?;
        }
        for (code, needle) in instrs.iter().zip(needles) {
            let cell = self
                .line
                .get_mut(needle.index)
                .ok_or(CompileError::OutOfBounds { x: needle.index, y: 0 })?;
            if !cell.is_empty() {
                return Err(CompileError::DoubleSource { index: needle.index });
            }
            *cell = *code;
        }
        self.class = Some(if as_transfer { LineClass::Transfer } else { LineClass::Yarn });
        if let Some(far) = match self.dir {
            Direction::Left => needles.iter().map(|n| n.index).min(),
            _ => needles.iter().map(|n| n.index).max(),
        } {
            self.current = far;
        }
        let dir = if as_transfer { Some(Direction::Transfer) } else { None };
        self.flush(None, dir)?;
        Ok(self)
    }

    // -- flush ------------------------------------------------------------

    /// Commit the buffered line to the raster.
    ///
    /// Fills the interior span with link-process, extends the fill to every
    /// occupied needle under LINK_PROCESS mode, resolves cross pairs into
    /// joint codes, resolves R5 against the raster's expected direction,
    /// stamps R3, then commits and resets. Returns `false` when the buffer
    /// held nothing.
    pub fn flush(
        &mut self,
        extra: Option<&LineOptions>,
        dir: Option<Direction>,
    ) -> Result<bool, CompileError> {
        let span = {
            let mut lo = None;
            let mut hi = None;
            for (i, code) in self.line.iter().enumerate() {
                if !code.is_empty() {
                    lo.get_or_insert(i);
                    hi = Some(i);
                }
            }
            lo.zip(hi)
        };
        let Some((lo, hi)) = span else {
            return Ok(false);
        };

        for i in lo..=hi {
            if self.line[i].is_empty() {
                self.line[i] = Instr::LINK_PROCESS;
            }
        }
        if self.mode.contains(CastMode::LINK_PROCESS) {
            for i in 0..self.line.len() {
                if self.line[i].is_empty() && self.bed.any(i) {
                    self.line[i] = Instr::LINK_PROCESS;
                }
            }
        }
        self.fill_cross_joints(lo, hi)?;

        let dir = dir.unwrap_or(match self.class {
            Some(LineClass::Transfer) => Direction::Transfer,
            _ => self.dir,
        });

        let mut opts = self.options.clone();
        opts.merge(&self.line_extra);
        if let Some(extra) = extra {
            opts.merge(extra);
        }

        if dir.is_transfer() {
            match opts.get(OptionKey::R5) {
                None => {
                    opts.set(OptionKey::R5, carriage::TRANSFER);
                },
                Some(v) if v == carriage::TRANSFER || v == carriage::TRANSFER_ALT => {},
                Some(v) => {
                    return Err(CompileError::OptionConflict {
                        key: OptionKey::R5.to_string(),
                        prev: v,
                        next: carriage::TRANSFER,
                    });
                },
            }
        } else if dir != self.raster.expected_direction() && opts.get(OptionKey::R5).is_none() {
            opts.set(OptionKey::R5, carriage::MOVE);
        }

        match opts.get(OptionKey::R3) {
            None => {
                opts.set(OptionKey::R3, self.carrier);
            },
            Some(v) if v == self.carrier => {},
            Some(v) => {
                return Err(CompileError::OptionConflict {
                    key: OptionKey::R3.to_string(),
                    prev: v,
                    next: self.carrier,
                });
            },
        }

        let line = self.raster.commit(&self.line, &opts)?;
        trace!(line, ?dir, lo, hi, "flush");

        self.line.fill(Instr::EMPTY);
        self.line_extra.clear();
        self.class = None;
        self.start = None;
        if !dir.is_transfer() {
            self.dir = dir.flip();
        }
        Ok(true)
    }

    /// Scan the committed span for cross pairs and overwrite the cells a
    /// pair straddles with the joint code.
    fn fill_cross_joints(&mut self, lo: usize, hi: usize) -> Result<(), CompileError> {
        let mut open: Option<(usize, Instr)> = None;
        let mut joints: Vec<usize> = Vec::new();
        for i in lo..=hi {
            let code = self.line[i];
            match open {
                Some((_, opened)) => {
                    if code.is_empty() || code.is_link_process() {
                        joints.push(i);
                    } else if Some(code) == core_code::cross_complement(opened) {
                        for j in joints.drain(..) {
                            self.line[j] = Instr::CROSS_JOINT;
                        }
                        open = None;
                    } else if code.is_cross() {
                        // A fresh pair opens; the old one closes jointless.
                        joints.clear();
                        open = Some((i, code));
                    } else {
                        joints.clear();
                        open = None;
                    }
                },
                None if code.is_cross() => {
                    open = Some((i, code));
                    joints.clear();
                },
                None => {},
            }
        }
        if let Some((at, opened)) = open {
            // Self-complementing participants may stand alone.
            if core_code::cross_complement(opened) != Some(opened) {
                return Err(CompileError::UnpairedCross { index: at });
            }
        }
        Ok(())
    }
}
