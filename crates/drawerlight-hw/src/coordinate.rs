//! Drawer coordinates.
//!
//! A coordinate names one drawer slot by 1-based row and column. The string
//! form `"row-col"` (e.g. `"3-2"`) is what the web UI and the data file use.

use crate::{Error, Result, COLS, DRAWER_COUNT, ROWS};
use std::str::FromStr;

/// One drawer slot in the cabinet grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coordinate {
    row: u8,
    col: u8,
}

impl Coordinate {
    /// Creates a coordinate, rejecting positions outside the cabinet.
    pub fn new(row: u8, col: u8) -> Result<Self> {
        if !(1..=ROWS).contains(&row) || !(1..=COLS).contains(&col) {
            return Err(Error::InvalidCoordinate(format!("{}-{}", row, col)));
        }
        Ok(Self { row, col })
    }

    /// Returns the 1-based row.
    pub fn row(&self) -> u8 {
        self.row
    }

    /// Returns the 1-based column.
    pub fn col(&self) -> u8 {
        self.col
    }

    /// Row-major index in `0..DRAWER_COUNT`.
    pub fn index(&self) -> usize {
        (self.row as usize - 1) * COLS as usize + (self.col as usize - 1)
    }

    /// Inverse of [`Coordinate::index`].
    pub fn from_index(index: usize) -> Option<Self> {
        if index >= DRAWER_COUNT {
            return None;
        }
        Some(Self {
            row: (index / COLS as usize) as u8 + 1,
            col: (index % COLS as usize) as u8 + 1,
        })
    }

    /// Iterates every coordinate in row-major order.
    pub fn all() -> impl Iterator<Item = Coordinate> {
        (0..DRAWER_COUNT).filter_map(Coordinate::from_index)
    }
}

impl FromStr for Coordinate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidCoordinate(s.to_string());
        let (row, col) = s.trim().split_once('-').ok_or_else(invalid)?;
        let row: u8 = row.parse().map_err(|_| invalid())?;
        let col: u8 = col.parse().map_err(|_| invalid())?;
        Coordinate::new(row, col).map_err(|_| invalid())
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.row, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        let c: Coordinate = "3-2".parse().unwrap();
        assert_eq!((c.row(), c.col()), (3, 2));
        assert_eq!(c.to_string(), "3-2");
        assert!("0-1".parse::<Coordinate>().is_err());
        assert!("9-1".parse::<Coordinate>().is_err());
        assert!("1-5".parse::<Coordinate>().is_err());
        assert!("all".parse::<Coordinate>().is_err());
        assert!("1-".parse::<Coordinate>().is_err());
    }

    #[test]
    fn test_index_round_trip() {
        for (i, c) in Coordinate::all().enumerate() {
            assert_eq!(c.index(), i);
            assert_eq!(Coordinate::from_index(i), Some(c));
        }
        assert_eq!(Coordinate::all().count(), 32);
        assert_eq!(Coordinate::from_index(32), None);
    }

    #[test]
    fn test_row_major_order() {
        let ids: Vec<String> = Coordinate::all().take(5).map(|c| c.to_string()).collect();
        assert_eq!(ids, ["1-1", "1-2", "1-3", "1-4", "2-1"]);
    }
}
