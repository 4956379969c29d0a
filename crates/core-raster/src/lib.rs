//! Raster store: the 2D instruction grid plus margin option bars.
//!
//! The raster is the single mutable output surface of a compile. The caster
//! streams content lines into it; after the last pass three sweeps finalize
//! the margins (option values are already in place as lines commit):
//! direction cells, then carrier-position markers, then the fixed
//! preamble/postamble furniture.
//!
//! Cell geometry (one line, `full_width` cells):
//!
//! ```text
//! | L20 .. L1 | spacing | dir |  content (width cells)  | dir | spacing | R1 .. R20 |
//! 0           40..51     52   55                    55+w  w+57 ...                 fw
//! ```
//!
//! Invariants:
//! * Content lines are committed whole; no partial line ever lands here.
//! * An option identifier cell is written at most once per line; value cells
//!   may be rewritten only when the caller asks to replace.
//! * Direction cells store the *inverted* logical direction (on-disk
//!   convention); transfer lines store the knit-cancel code 1.
//! * Exactly two carrier-position markers per non-transfer line, zero on
//!   transfer lines.
//! * Bottom margin rows host the three preamble lines; top margin rows host
//!   the five clearing lines, the end bar, and the needle-position cells.

mod dat;

pub use dat::{decode, palette};

use core_bed::CompileError;
use core_code::{Direction, Instr, LineOptions, MarginSide, OptionKey, carriage};
use tracing::debug;

/// Margin geometry, fixed by the target machine format.
pub const LEFT_MARGIN: usize = 55;
pub const RIGHT_MARGIN: usize = 55;
pub const BOTTOM_MARGIN: usize = 5;
pub const TOP_MARGIN: usize = 8;

/// Identifier-cell anchors for the option bars, measured from each edge.
const LEFT_OPTION_BASE: usize = 48;
const RIGHT_OPTION_BASE_FROM_RIGHT: usize = 49;
/// Direction cells sit between the option bars and the content region.
const LEFT_DIR_X: usize = 52;
const RIGHT_DIR_X_FROM_RIGHT: usize = 53;

/// How the machine learns where the piece sits on the bed: explicitly from
/// the left needle, or deferred to the controller (`Right` writes the zero
/// sentinel, see `postamble`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NeedlePosition {
    #[default]
    Left,
    Right,
    At(u16),
}

#[derive(Debug, Clone)]
pub struct Raster {
    width: usize,
    /// Machine order: row 0 is the bottom margin's lowest row; content rows
    /// follow the bottom margin; postamble appends the top margin.
    rows: Vec<Vec<u8>>,
    /// Content lines committed so far.
    height: usize,
    /// Direction the next committed non-transfer line is expected to run.
    expected: Direction,
    /// Needle count of the target machine (needle-position encoding).
    max_needles: u16,
    closed: bool,
}

impl Raster {
    pub fn new(width: usize, max_needles: u16) -> Self {
        let full_width = width + LEFT_MARGIN + RIGHT_MARGIN;
        let rows = vec![vec![0u8; full_width]; BOTTOM_MARGIN];
        Raster {
            width,
            rows,
            height: 0,
            expected: Direction::Right,
            max_needles,
            closed: false,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn full_width(&self) -> usize {
        self.width + LEFT_MARGIN + RIGHT_MARGIN
    }

    pub fn full_height(&self) -> usize {
        self.rows.len().max(self.height + BOTTOM_MARGIN + TOP_MARGIN)
    }

    /// Direction the next non-transfer line will be assigned by the final
    /// sweep; the caster compares its own direction against this at flush.
    pub fn expected_direction(&self) -> Direction {
        self.expected
    }

    fn row_of_line(&self, line: usize) -> usize {
        BOTTOM_MARGIN + line
    }

    fn right_dir_x(&self) -> usize {
        self.full_width() - RIGHT_DIR_X_FROM_RIGHT
    }

    fn option_x(&self, key: OptionKey) -> usize {
        match key.side() {
            MarginSide::Left => LEFT_OPTION_BASE - 2 * key.number() as usize,
            MarginSide::Right => {
                self.full_width() - RIGHT_OPTION_BASE_FROM_RIGHT + 2 * key.number() as usize
            },
        }
    }

    fn cell(&self, x: usize, y: usize) -> Result<u8, CompileError> {
        self.rows
            .get(y)
            .and_then(|r| r.get(x))
            .copied()
            .ok_or(CompileError::OutOfBounds { x, y })
    }

    fn cell_mut(&mut self, x: usize, y: usize) -> Result<&mut u8, CompileError> {
        self.rows
            .get_mut(y)
            .and_then(|r| r.get_mut(x))
            .ok_or(CompileError::OutOfBounds { x, y })
    }

    /// Append an empty content line and return its index.
    pub fn new_line(&mut self) -> usize {
        let full_width = self.full_width();
        self.rows.push(vec![0u8; full_width]);
        self.height += 1;
        self.height - 1
    }

    /// Drop the most recent content line.
    pub fn remove_line(&mut self) {
        if self.height > 0 {
            self.rows.pop();
            self.height -= 1;
        }
    }

    /// Commit one full content line: instruction cells plus its options.
    ///
    /// Updates the expected-direction state from the line's R5 so later
    /// flushes see where the carriage will be.
    pub fn commit(
        &mut self,
        cells: &[Instr],
        options: &LineOptions,
    ) -> Result<usize, CompileError> {
        debug_assert_eq!(cells.len(), self.width, "content line width mismatch");
        let line = self.new_line();
        let row = self.row_of_line(line);
        for (i, code) in cells.iter().enumerate() {
            *self.cell_mut(LEFT_MARGIN + i, row)? = code.0;
        }
        self.set_line_options(line, options, true)?;
        match options.get(OptionKey::R5) {
            Some(v) if v == carriage::TRANSFER || v == carriage::TRANSFER_ALT => {},
            Some(v) if v == carriage::MOVE => {
                // The carriage reverses for this line; alternation resumes
                // from the reversed direction, which lands back on the old
                // expectation for the next line.
            },
            Some(v) if v == carriage::LEFT => self.expected = Direction::Left.flip(),
            Some(v) if v == carriage::RIGHT => self.expected = Direction::Right.flip(),
            _ => self.expected = self.expected.flip(),
        }
        Ok(line)
    }

    pub fn content(&self, line: usize, i: usize) -> Result<Instr, CompileError> {
        let row = self.row_of_line(line);
        self.cell(LEFT_MARGIN + i, row).map(Instr)
    }

    /// Write one option onto a committed line. The identifier cell is only
    /// ever written once; the value cell is overwritten when `replace`.
    pub fn set_line_option(
        &mut self,
        line: usize,
        key: OptionKey,
        value: u8,
        replace: bool,
    ) -> Result<(), CompileError> {
        let row = self.row_of_line(line);
        let x = self.option_x(key);
        let ident = self.cell(x, row)?;
        if ident == 0 {
            *self.cell_mut(x, row)? = key.number();
            *self.cell_mut(x + 1, row)? = value;
        } else if replace {
            *self.cell_mut(x + 1, row)? = value;
        }
        Ok(())
    }

    pub fn get_line_option(&self, line: usize, key: OptionKey) -> Option<u8> {
        let row = self.row_of_line(line);
        let x = self.option_x(key);
        match self.cell(x, row) {
            Ok(ident) if ident == key.number() => self.cell(x + 1, row).ok(),
            _ => None,
        }
    }

    pub fn set_line_options(
        &mut self,
        line: usize,
        options: &LineOptions,
        replace: bool,
    ) -> Result<(), CompileError> {
        for (key, value) in options.iter() {
            self.set_line_option(line, key, value, replace)?;
        }
        Ok(())
    }

    fn write_direction_cells(&mut self, row: usize, dir: Direction) -> Result<(), CompileError> {
        // On-disk convention stores the inverse of the logical direction.
        let code = dir.flip().code();
        *self.cell_mut(LEFT_DIR_X, row)? = code;
        let rx = self.right_dir_x();
        *self.cell_mut(rx, row)? = code;
        Ok(())
    }

    pub fn set_line_direction(&mut self, line: usize, dir: Direction) -> Result<(), CompileError> {
        let row = self.row_of_line(line);
        self.write_direction_cells(row, dir)
    }

    /// Read back the logical direction of a line from its direction cells.
    pub fn line_direction(&self, line: usize) -> Option<Direction> {
        let row = self.row_of_line(line);
        match self.cell(LEFT_DIR_X, row).ok()? {
            1 => Some(Direction::Transfer),
            6 => Some(Direction::Right), // inverted on disk
            7 => Some(Direction::Left),
            _ => None,
        }
    }

    /// Sweep all content lines and assign direction cells from the R5 state
    /// machine: 1/11 keep the carriage parked (transfer), 2 flips the
    /// running direction, 6/7 force an independent direction, anything else
    /// continues the alternation. Every non-transfer line flips the running
    /// direction for its successor.
    pub fn set_line_directions(&mut self, initial: Direction) -> Result<(), CompileError> {
        let mut cur = initial;
        for line in 0..self.height {
            let dir = match self.get_line_option(line, OptionKey::R5) {
                Some(v) if v == carriage::TRANSFER || v == carriage::TRANSFER_ALT => {
                    Direction::Transfer
                },
                Some(v) if v == carriage::MOVE => {
                    cur = cur.flip();
                    cur
                },
                Some(v) if v == carriage::LEFT => {
                    cur = Direction::Left;
                    cur
                },
                Some(v) if v == carriage::RIGHT => {
                    cur = Direction::Right;
                    cur
                },
                _ => cur,
            };
            self.set_line_direction(line, dir)?;
            if !dir.is_transfer() {
                cur = cur.flip();
            }
        }
        Ok(())
    }

    /// Sweep all content lines and bracket each non-transfer line's
    /// instruction span with the carrier-position marker (code 13). Must run
    /// after `set_line_directions`.
    pub fn set_carrier_positions(&mut self) -> Result<(), CompileError> {
        for line in 0..self.height {
            if matches!(self.line_direction(line), Some(Direction::Transfer)) {
                continue;
            }
            let row = self.row_of_line(line);
            let mut lo = None;
            let mut hi = None;
            for i in 0..self.width {
                let code = Instr(self.cell(LEFT_MARGIN + i, row)?);
                if code.anchors_carrier() {
                    lo.get_or_insert(i);
                    hi = Some(i);
                }
            }
            if let (Some(lo), Some(hi)) = (lo, hi) {
                *self.cell_mut(LEFT_MARGIN + lo - 1, row)? = Instr::CARRIER_POS.0;
                *self.cell_mut(LEFT_MARGIN + hi + 1, row)? = Instr::CARRIER_POS.0;
            }
        }
        Ok(())
    }

    fn furniture_row(&mut self, row: usize, code: Instr, dir: Direction) {
        for i in 0..self.width {
            self.rows[row][LEFT_MARGIN + i] = code.0;
        }
        let _ = self.write_direction_cells(row, dir);
    }

    /// The three fixed bed-clearing lines below the content region.
    pub fn preamble(&mut self) {
        let base = BOTTOM_MARGIN - 3;
        self.furniture_row(base, Instr::MISS_RIGHT, Direction::Right);
        self.furniture_row(base + 1, Instr::FRONT_KNIT_MISS, Direction::Left);
        self.furniture_row(base + 2, Instr::BACK_KNIT_MISS, Direction::Right);
    }

    /// Top-margin furniture: five bed-clearing lines, the end bar, and the
    /// two needle-position cells.
    ///
    /// The needle-position value is `max_needles - 20 - width`, stored as
    /// units-modulo-100 then hundreds. With `NeedlePosition::Right` both
    /// cells stay 0: downstream tooling reads the zero pair as
    /// "controller-chosen position".
    pub fn postamble(&mut self, needle_pos: NeedlePosition) -> Result<(), CompileError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let full_width = self.full_width();
        let clearing = [
            (Instr::FRONT_KNIT_MISS, Direction::Left),
            (Instr::BACK_KNIT_MISS, Direction::Right),
            (Instr::FRONT_KNIT_MISS, Direction::Left),
            (Instr::BACK_KNIT_MISS, Direction::Right),
            (Instr::MISS_RIGHT, Direction::Right),
        ];
        for (code, dir) in clearing {
            self.rows.push(vec![0u8; full_width]);
            let row = self.rows.len() - 1;
            self.furniture_row(row, code, dir);
        }

        // End bar.
        self.rows.push(vec![0u8; full_width]);
        let row = self.rows.len() - 1;
        for i in 0..self.width {
            self.rows[row][LEFT_MARGIN + i] = Instr::FRONT_KNIT.0;
        }

        // Needle position.
        self.rows.push(vec![0u8; full_width]);
        let row = self.rows.len() - 1;
        let value = match needle_pos {
            NeedlePosition::Left => {
                (self.max_needles as i32 - 20 - self.width as i32).max(0) as u16
            },
            NeedlePosition::At(n) => n,
            NeedlePosition::Right => 0,
        };
        self.rows[row][LEFT_MARGIN] = (value % 100) as u8;
        self.rows[row][LEFT_MARGIN + 1] = (value / 100) as u8;

        // Spare top row keeps the margin at its full height.
        self.rows.push(vec![0u8; full_width]);
        debug!(
            height = self.height,
            full_height = self.rows.len(),
            "raster closed"
        );
        Ok(())
    }

    /// Rows in emission order (image top-down); machine order is bottom-up.
    pub fn emission_rows(&self) -> impl Iterator<Item = &[u8]> {
        self.rows.iter().rev().map(|r| r.as_slice())
    }

    /// Encode the finished raster as the palette-indexed binary.
    pub fn to_buffer(&self) -> Result<Vec<u8>, CompileError> {
        dat::encode(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_code::{LineOptions, OptionKey};

    fn line_of(width: usize, at: usize, code: Instr) -> Vec<Instr> {
        let mut cells = vec![Instr::EMPTY; width];
        cells[at] = code;
        cells
    }

    #[test]
    fn option_cells_hold_identifier_and_value() {
        let mut raster = Raster::new(10, 540);
        let mut opts = LineOptions::new();
        opts.set(OptionKey::R6, 5);
        opts.set(OptionKey::L13, 31);
        raster.commit(&line_of(10, 0, Instr::FRONT_KNIT), &opts).unwrap();
        assert_eq!(raster.get_line_option(0, OptionKey::R6), Some(5));
        assert_eq!(raster.get_line_option(0, OptionKey::L13), Some(31));
        assert_eq!(raster.get_line_option(0, OptionKey::R1), None);
    }

    #[test]
    fn identifier_written_once_value_replaceable() {
        let mut raster = Raster::new(4, 540);
        raster.commit(&line_of(4, 0, Instr::FRONT_KNIT), &LineOptions::new()).unwrap();
        raster.set_line_option(0, OptionKey::R6, 5, false).unwrap();
        raster.set_line_option(0, OptionKey::R6, 9, false).unwrap();
        assert_eq!(raster.get_line_option(0, OptionKey::R6), Some(5));
        raster.set_line_option(0, OptionKey::R6, 9, true).unwrap();
        assert_eq!(raster.get_line_option(0, OptionKey::R6), Some(9));
    }

    #[test]
    fn directions_alternate_and_honor_overrides() {
        let mut raster = Raster::new(4, 540);
        let plain = LineOptions::new();
        let mut transfer = LineOptions::new();
        transfer.set(OptionKey::R5, carriage::TRANSFER);
        let mut forced_left = LineOptions::new();
        forced_left.set(OptionKey::R5, carriage::LEFT);

        for opts in [&plain, &plain, &transfer, &plain, &forced_left, &plain] {
            raster.commit(&line_of(4, 1, Instr::FRONT_KNIT), opts).unwrap();
        }
        raster.set_line_directions(Direction::Right).unwrap();

        let dirs: Vec<_> = (0..6).map(|l| raster.line_direction(l).unwrap()).collect();
        assert_eq!(
            dirs,
            vec![
                Direction::Right,
                Direction::Left,
                Direction::Transfer,
                Direction::Right,
                Direction::Left, // forced
                Direction::Right,
            ]
        );
    }

    #[test]
    fn carrier_markers_bracket_span() {
        let mut raster = Raster::new(10, 540);
        let mut cells = vec![Instr::EMPTY; 10];
        cells[3] = Instr::FRONT_KNIT;
        cells[4] = Instr::LINK_PROCESS;
        cells[6] = Instr::FRONT_KNIT;
        raster.commit(&cells, &LineOptions::new()).unwrap();
        raster.set_line_directions(Direction::Right).unwrap();
        raster.set_carrier_positions().unwrap();
        assert_eq!(raster.content(0, 2).unwrap(), Instr::CARRIER_POS);
        assert_eq!(raster.content(0, 7).unwrap(), Instr::CARRIER_POS);
        // Link process never extends the span.
        assert_eq!(raster.content(0, 4).unwrap(), Instr::LINK_PROCESS);
    }

    #[test]
    fn transfer_lines_get_no_markers() {
        let mut raster = Raster::new(6, 540);
        let mut opts = LineOptions::new();
        opts.set(OptionKey::R5, carriage::TRANSFER);
        raster.commit(&line_of(6, 2, Instr::TO_BACK), &opts).unwrap();
        raster.set_line_directions(Direction::Right).unwrap();
        raster.set_carrier_positions().unwrap();
        for i in 0..6 {
            assert_ne!(raster.content(0, i).unwrap(), Instr::CARRIER_POS);
        }
    }

    #[test]
    fn expected_direction_tracks_commits() {
        let mut raster = Raster::new(4, 540);
        assert_eq!(raster.expected_direction(), Direction::Right);
        raster.commit(&line_of(4, 0, Instr::FRONT_KNIT), &LineOptions::new()).unwrap();
        assert_eq!(raster.expected_direction(), Direction::Left);
        let mut transfer = LineOptions::new();
        transfer.set(OptionKey::R5, carriage::TRANSFER);
        raster.commit(&line_of(4, 0, Instr::TO_BACK), &transfer).unwrap();
        assert_eq!(raster.expected_direction(), Direction::Left);
    }

    #[test]
    fn preamble_and_postamble_fill_margins() {
        let mut raster = Raster::new(8, 540);
        raster.preamble();
        raster.commit(&line_of(8, 0, Instr::FRONT_KNIT), &LineOptions::new()).unwrap();
        raster.postamble(NeedlePosition::Left).unwrap();
        assert_eq!(raster.full_height(), 1 + BOTTOM_MARGIN + TOP_MARGIN);
        // Needle position: 540 - 20 - 8 = 512 -> units 12, hundreds 5.
        let rows: Vec<_> = raster.emission_rows().collect();
        let pos_row = rows[1]; // one spare row above it
        assert_eq!(pos_row[LEFT_MARGIN], 12);
        assert_eq!(pos_row[LEFT_MARGIN + 1], 5);
    }
}
