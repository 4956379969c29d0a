//! Palette-indexed binary encoding of a finished raster.
//!
//! Layout: little-endian header at 0 (x-min, y-min, x-max, y-max as u16,
//! magic 1000 at offsets 8 and 16), a 256-entry RGB palette at 0x200, and
//! run-length data as (index, length) byte pairs from 0x600. Rows are
//! encoded independently, image top-down, runs capped at 255.

use crate::Raster;
use core_bed::CompileError;

const PALETTE_OFFSET: usize = 0x200;
const DATA_OFFSET: usize = 0x600;
const MAGIC: u16 = 1000;

/// The fixed display palette. Known instruction families get distinctive
/// colors (matching the controller's editor rendering); everything else
/// falls back to a gray ramp so unexpected bytes stay visible.
pub fn palette() -> [[u8; 3]; 256] {
    let mut table = [[0u8; 3]; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        let g = 255 - i as u8;
        *entry = [g, g, g];
    }
    table[0] = [255, 255, 255];
    table[1] = [230, 80, 80]; // front knit
    table[2] = [80, 160, 80]; // back knit
    table[3] = [200, 120, 60];
    table[11] = [240, 150, 150]; // tucks
    table[12] = [150, 210, 150];
    table[13] = [250, 220, 60]; // carrier position
    table[16] = [210, 210, 230]; // miss
    table[51] = [190, 60, 60];
    table[52] = [60, 130, 60];
    table[99] = [200, 200, 200]; // link process
    table[150] = [160, 90, 200]; // cross joint
    table[216] = [90, 120, 220];
    table[217] = [120, 150, 240];
    table
}

fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset] = (value & 0xff) as u8;
    buf[offset + 1] = (value >> 8) as u8;
}

fn read_u16(buf: &[u8], offset: usize) -> u16 {
    buf[offset] as u16 | (buf[offset + 1] as u16) << 8
}

pub(crate) fn encode(raster: &Raster) -> Result<Vec<u8>, CompileError> {
    let full_width = raster.full_width();
    let full_height = raster.full_height();
    let mut buf = vec![0u8; DATA_OFFSET];

    put_u16(&mut buf, 0, 0);
    put_u16(&mut buf, 2, 0);
    put_u16(&mut buf, 4, (full_width - 1) as u16);
    put_u16(&mut buf, 6, (full_height - 1) as u16);
    put_u16(&mut buf, 8, MAGIC);
    put_u16(&mut buf, 16, MAGIC);

    for (i, rgb) in palette().iter().enumerate() {
        buf[PALETTE_OFFSET + 3 * i..PALETTE_OFFSET + 3 * i + 3].copy_from_slice(rgb);
    }

    for row in raster.emission_rows() {
        let mut i = 0;
        while i < row.len() {
            let byte = row[i];
            let mut run = 1usize;
            while i + run < row.len() && row[i + run] == byte && run < 255 {
                run += 1;
            }
            buf.push(byte);
            buf.push(run as u8);
            i += run;
        }
    }
    Ok(buf)
}

/// Decode an encoded buffer back into (full_width, rows top-down). Used by
/// tests and by the round-trip validation of freshly written files.
pub fn decode(buf: &[u8]) -> Result<(usize, Vec<Vec<u8>>), CompileError> {
    if buf.len() < DATA_OFFSET {
        return Err(CompileError::MalformedProgram { reason: "dat buffer too short".into() });
    }
    if read_u16(buf, 8) != MAGIC || read_u16(buf, 16) != MAGIC {
        return Err(CompileError::MalformedProgram { reason: "dat magic mismatch".into() });
    }
    let full_width = read_u16(buf, 4) as usize + 1;
    let full_height = read_u16(buf, 6) as usize + 1;

    let mut rows = Vec::with_capacity(full_height);
    let mut row = Vec::with_capacity(full_width);
    let mut i = DATA_OFFSET;
    while i + 1 < buf.len() && rows.len() < full_height {
        let byte = buf[i];
        let len = buf[i + 1] as usize;
        if len == 0 || row.len() + len > full_width {
            return Err(CompileError::RunTooLong { len, width: full_width });
        }
        row.extend(std::iter::repeat_n(byte, len));
        if row.len() == full_width {
            rows.push(std::mem::take(&mut row));
        }
        i += 2;
    }
    if rows.len() != full_height || !row.is_empty() {
        return Err(CompileError::MalformedProgram { reason: "dat data truncated".into() });
    }
    Ok((full_width, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NeedlePosition;
    use core_code::{Instr, LineOptions};

    fn sample_raster() -> Raster {
        let mut raster = Raster::new(10, 540);
        raster.preamble();
        for l in 0..4 {
            let mut cells = vec![Instr::EMPTY; 10];
            for i in 0..10 {
                cells[i] = if (i + l) % 2 == 0 { Instr::FRONT_KNIT } else { Instr::BACK_KNIT };
            }
            raster.commit(&cells, &LineOptions::new()).unwrap();
        }
        raster.postamble(NeedlePosition::Left).unwrap();
        raster
    }

    #[test]
    fn header_fields() {
        let raster = sample_raster();
        let buf = raster.to_buffer().unwrap();
        assert_eq!(read_u16(&buf, 0), 0);
        assert_eq!(read_u16(&buf, 2), 0);
        assert_eq!(read_u16(&buf, 4) as usize, raster.full_width() - 1);
        assert_eq!(read_u16(&buf, 6) as usize, raster.full_height() - 1);
        assert_eq!(read_u16(&buf, 8), 1000);
        assert_eq!(read_u16(&buf, 16), 1000);
    }

    #[test]
    fn palette_block_in_place() {
        let buf = sample_raster().to_buffer().unwrap();
        let pal = palette();
        assert_eq!(&buf[PALETTE_OFFSET..PALETTE_OFFSET + 3], &pal[0]);
        assert_eq!(
            &buf[PALETTE_OFFSET + 3 * 99..PALETTE_OFFSET + 3 * 99 + 3],
            &pal[99]
        );
    }

    #[test]
    fn runs_break_at_row_boundaries() {
        let raster = sample_raster();
        let buf = raster.to_buffer().unwrap();
        let (_, rows) = decode(&buf).unwrap();
        // Sum of decoded lengths per row equals full width exactly; decode
        // rejects any run spilling over, so reaching here proves breakage.
        assert_eq!(rows.len(), raster.full_height());
        for row in &rows {
            assert_eq!(row.len(), raster.full_width());
        }
    }

    #[test]
    fn encode_decode_round_trip() {
        let raster = sample_raster();
        let buf = raster.to_buffer().unwrap();
        let (width, rows) = decode(&buf).unwrap();
        assert_eq!(width, raster.full_width());
        let original: Vec<Vec<u8>> = raster.emission_rows().map(|r| r.to_vec()).collect();
        assert_eq!(rows, original);
    }
}
