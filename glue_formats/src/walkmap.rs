use std::io::{Cursor, Read};

use anyhow::{Context, Result, ensure};
use byteorder::{LittleEndian, ReadBytesExt};
use serde::Serialize;

/// Coarse walkability grid for one room. A cell value of 0 is blocked; any
/// other value is walkable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalkMap {
    width: u16,
    height: u16,
    cells: Vec<u8>,
}

impl WalkMap {
    pub fn new(width: u16, height: u16, cells: Vec<u8>) -> Result<Self> {
        ensure!(width > 0 && height > 0, "walk map must not be empty");
        ensure!(
            cells.len() == width as usize * height as usize,
            "walk map {width}x{height} expects {} cells, got {}",
            width as usize * height as usize,
            cells.len()
        );
        Ok(WalkMap {
            width,
            height,
            cells,
        })
    }

    pub fn filled(width: u16, height: u16, value: u8) -> Self {
        WalkMap {
            width,
            height,
            cells: vec![value; width as usize * height as usize],
        }
    }

    /// Builds a map from ASCII rows: `.` is walkable (1), `#` is blocked,
    /// digits give an explicit cell value.
    pub fn from_rows(rows: &[&str]) -> Result<Self> {
        ensure!(!rows.is_empty(), "walk map needs at least one row");
        let width = rows[0].chars().count();
        let mut cells = Vec::with_capacity(width * rows.len());
        for (y, row) in rows.iter().enumerate() {
            ensure!(
                row.chars().count() == width,
                "row {y} has {} columns, expected {width}",
                row.chars().count()
            );
            for ch in row.chars() {
                let value = match ch {
                    '#' => 0,
                    '.' => 1,
                    digit if digit.is_ascii_digit() => digit as u8 - b'0',
                    other => anyhow::bail!("unexpected walk map glyph {other:?} in row {y}"),
                };
                cells.push(value);
            }
        }
        let width = u16::try_from(width).context("walk map too wide")?;
        let height = u16::try_from(rows.len()).context("walk map too tall")?;
        WalkMap::new(width, height, cells)
    }

    /// Decodes the on-disk layout: little-endian `u16` width and height
    /// followed by one byte per cell in row-major order.
    pub fn parse(input: &[u8]) -> Result<Self> {
        let mut reader = Cursor::new(input);
        let width = reader
            .read_u16::<LittleEndian>()
            .context("walk map truncated before width")?;
        let height = reader
            .read_u16::<LittleEndian>()
            .context("walk map truncated before height")?;
        let expected = width as usize * height as usize;
        let mut cells = Vec::with_capacity(expected);
        reader
            .read_to_end(&mut cells)
            .context("reading walk map cells")?;
        ensure!(
            cells.len() >= expected,
            "walk map truncated: {width}x{height} needs {expected} cells, found {}",
            cells.len()
        );
        cells.truncate(expected);
        WalkMap::new(width, height, cells)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.cells.len());
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(&self.cells);
        out
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn get(&self, x: u16, y: u16) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn set(&mut self, x: u16, y: u16, value: u8) {
        if x < self.width && y < self.height {
            let index = y as usize * self.width as usize + x as usize;
            self.cells[index] = value;
        }
    }

    pub fn walkable_count(&self) -> usize {
        self.cells.iter().filter(|&&value| value != 0).count()
    }

    pub fn render_ascii(&self) -> String {
        let mut out = String::with_capacity((self.width as usize + 1) * self.height as usize);
        for row in self.cells.chunks(self.width as usize) {
            for &value in row {
                out.push(match value {
                    0 => '#',
                    1 => '.',
                    2..=9 => (b'0' + value) as char,
                    _ => '+',
                });
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_header_and_cells() {
        let mut data = Vec::new();
        data.extend_from_slice(&3u16.to_le_bytes());
        data.extend_from_slice(&2u16.to_le_bytes());
        data.extend_from_slice(&[1, 0, 1, 1, 1, 0]);
        let map = WalkMap::parse(&data).unwrap();
        assert_eq!((map.width(), map.height()), (3, 2));
        assert_eq!(map.get(1, 0), Some(0));
        assert_eq!(map.get(2, 1), Some(0));
        assert_eq!(map.get(3, 0), None);
        assert_eq!(map.walkable_count(), 4);
        assert_eq!(map.to_bytes(), data);
    }

    #[test]
    fn rejects_truncated_payload() {
        let mut data = Vec::new();
        data.extend_from_slice(&4u16.to_le_bytes());
        data.extend_from_slice(&4u16.to_le_bytes());
        data.extend_from_slice(&[1; 10]);
        assert!(WalkMap::parse(&data).is_err());
        assert!(WalkMap::parse(&[1]).is_err());
    }

    #[test]
    fn ascii_rows_round_trip_through_render() {
        let map = WalkMap::from_rows(&["..#", "#3."]).unwrap();
        assert_eq!(map.get(1, 1), Some(3));
        assert_eq!(map.render_ascii(), "..#\n#3.\n");
        assert!(WalkMap::from_rows(&["..", "."]).is_err());
    }
}
