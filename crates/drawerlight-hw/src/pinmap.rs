//! Coordinate to GPIO channel assignment.

use std::collections::HashSet;

use crate::{Coordinate, COLS, DRAWER_COUNT, LED_ROWS};

/// Immutable assignment of drawer coordinates to output channels.
///
/// Channels are handed out in row-major order over rows `1..=LED_ROWS`.
/// Row 8 never receives a channel, and a short catalog leaves the tail
/// unassigned rather than failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinMap {
    channels: [Option<u32>; DRAWER_COUNT],
}

impl PinMap {
    /// Builds the map from an ordered channel catalog.
    pub fn build(catalog: &[u32]) -> Self {
        let mut channels = [None; DRAWER_COUNT];
        let mut used = HashSet::new();
        let mut next = catalog.iter().copied().filter(|ch| used.insert(*ch));

        for row in 1..=LED_ROWS {
            for col in 1..=COLS {
                let Some(channel) = next.next() else {
                    return Self { channels };
                };
                if let Ok(coord) = Coordinate::new(row, col) {
                    channels[coord.index()] = Some(channel);
                }
            }
        }

        Self { channels }
    }

    /// Returns the channel driving `coord`, if any.
    pub fn channel(&self, coord: Coordinate) -> Option<u32> {
        self.channels[coord.index()]
    }

    /// Iterates assigned `(coordinate, channel)` pairs in row-major order.
    pub fn assigned(&self) -> impl Iterator<Item = (Coordinate, u32)> + '_ {
        Coordinate::all().filter_map(|c| self.channel(c).map(|ch| (c, ch)))
    }

    /// Number of coordinates with a line.
    pub fn assigned_count(&self) -> usize {
        self.channels.iter().filter(|c| c.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DEFAULT_CHANNELS, ROWS};

    #[test]
    fn test_default_catalog_is_bijective() {
        let map = PinMap::build(&DEFAULT_CHANNELS);
        assert_eq!(map.assigned_count(), 28);

        let mut seen = HashSet::new();
        for coord in Coordinate::all().filter(|c| c.row() <= LED_ROWS) {
            let ch = map.channel(coord).expect("rows 1-7 must have a line");
            assert!(seen.insert(ch), "channel {} assigned twice", ch);
        }
    }

    #[test]
    fn test_row_eight_unassigned() {
        let long: Vec<u32> = (0..64).collect();
        let map = PinMap::build(&long);
        for col in 1..=COLS {
            assert_eq!(map.channel(Coordinate::new(ROWS, col).unwrap()), None);
        }
        assert_eq!(map.assigned_count(), 28);
    }

    #[test]
    fn test_row_major_assignment() {
        let map = PinMap::build(&DEFAULT_CHANNELS);
        assert_eq!(map.channel("1-1".parse().unwrap()), Some(2));
        assert_eq!(map.channel("1-4".parse().unwrap()), Some(14));
        assert_eq!(map.channel("2-1".parse().unwrap()), Some(15));
        assert_eq!(map.channel("7-4".parse().unwrap()), Some(0));
    }

    #[test]
    fn test_short_catalog_leaves_tail_unassigned() {
        let map = PinMap::build(&[5, 6, 7, 8, 9]);
        assert_eq!(map.assigned_count(), 5);
        assert_eq!(map.channel("2-1".parse().unwrap()), Some(9));
        assert_eq!(map.channel("2-2".parse().unwrap()), None);
        assert_eq!(PinMap::build(&[]).assigned_count(), 0);
    }

    #[test]
    fn test_duplicate_channels_skipped() {
        let map = PinMap::build(&[4, 4, 5]);
        assert_eq!(map.channel("1-1".parse().unwrap()), Some(4));
        assert_eq!(map.channel("1-2".parse().unwrap()), Some(5));
        assert_eq!(map.assigned_count(), 2);
    }
}
