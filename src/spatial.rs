//! Spatial pressure grids
//!
//! Projects the 12 channel values onto two 2D grids (seat and backrest) for
//! heat-map rendering. Sensors sit at fixed normalized coordinates in
//! `[-1, 1]²`; each one stamps a 3x3 block around its cell.

use serde::Serialize;

use crate::config::{DEFAULT_GRID_SCALE_Y, MIN_GRID_SCALE_Y};
use crate::types::{TimestampedReading, CHANNEL_COUNT, CHANNEL_NAMES};

/// Normalized `(x, y)` position of every channel, indexed like the row
pub const SENSOR_POSITIONS: [(f64, f64); CHANNEL_COUNT] = [
    (0.3, 0.35),
    (-0.3, 0.35),
    (0.3, -0.35),
    (-0.3, -0.35),
    (0.35, 0.6),
    (-0.35, 0.6),
    (0.35, 0.0),
    (-0.35, 0.0),
    (0.6, -0.5),
    (-0.6, -0.5),
    (0.45, -0.8),
    (-0.45, -0.8),
];

/// Width of the zero-valued frame around each grid
const BORDER: usize = 2;

/// One grid; `None` marks a cell no sensor reaches
pub type Grid = Vec<Vec<Option<f64>>>;

/// Physical zone a channel belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    Backrest,
    Seat,
}

impl Zone {
    /// Channels 0..4 are in the backrest, the rest in the seat
    pub fn of(channel: usize) -> Self {
        if channel < 4 {
            Zone::Backrest
        } else {
            Zone::Seat
        }
    }
}

/// Where a channel lands on its grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SensorPoint {
    pub channel: &'static str,
    pub row: usize,
    pub col: usize,
    pub zone: Zone,
}

/// Seat and backrest grids for one reading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpatialGrid {
    pub seat: Grid,
    pub backrest: Grid,
}

/// Left-minus-right pressure difference of one sensor pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AsymmetryBand {
    pub label: &'static str,
    pub left: u16,
    pub right: u16,
    pub difference: i32,
}

/// Sensor pairs in display order (top of the seat first)
const BANDS: [(&str, usize, usize); 6] = [
    ("F seat top", 10, 11),
    ("E seat top-mid", 8, 9),
    ("D seat bottom-mid", 6, 7),
    ("C seat bottom", 4, 5),
    ("B backrest top", 2, 3),
    ("A backrest bottom", 0, 1),
];

/// Left/right differences for the six sensor bands
pub fn pressure_asymmetry(reading: &TimestampedReading) -> Vec<AsymmetryBand> {
    BANDS
        .iter()
        .map(|&(label, left, right)| {
            let (l, r) = (reading.channels[left], reading.channels[right]);
            AsymmetryBand {
                label,
                left: l,
                right: r,
                difference: i32::from(l) - i32::from(r),
            }
        })
        .collect()
}

/// Maps channel values onto seat and backrest grids
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialMapper {
    scale_y: f64,
    scale_x: f64,
    height: usize,
    width: usize,
}

impl Default for SpatialMapper {
    fn default() -> Self {
        Self::new(DEFAULT_GRID_SCALE_Y)
    }
}

impl SpatialMapper {
    /// Build a mapper whose grids are `round(2 * scale_y + 1)` rows high.
    ///
    /// Rounding is half-to-even throughout, so `scale_y = 25` yields a
    /// horizontal scale of 18 and a 51 x 37 grid. Scales below 2 are raised
    /// to 2; a non-finite scale falls back to the default.
    pub fn new(scale_y: f64) -> Self {
        let scale_y = if scale_y.is_finite() {
            scale_y.max(MIN_GRID_SCALE_Y)
        } else {
            DEFAULT_GRID_SCALE_Y
        };
        let scale_x = (scale_y * 7.0 / 10.0).round_ties_even();
        Self {
            scale_y,
            scale_x,
            height: (2.0 * scale_y + 1.0).round_ties_even() as usize,
            width: (2.0 * scale_x + 1.0) as usize,
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Grid cell `(row, col)` of a channel
    pub fn cell(&self, channel: usize) -> (usize, usize) {
        let (x, y) = SENSOR_POSITIONS[channel];
        let row = (y * self.scale_y + self.scale_y).round_ties_even().max(0.0) as usize;
        let col = (x * self.scale_x + self.scale_x).round_ties_even().max(0.0) as usize;
        (row, col)
    }

    /// Sensor annotations for a rendered grid
    pub fn points(&self) -> Vec<SensorPoint> {
        (0..CHANNEL_COUNT)
            .map(|c| {
                let (row, col) = self.cell(c);
                SensorPoint {
                    channel: CHANNEL_NAMES[c],
                    row,
                    col,
                    zone: Zone::of(c),
                }
            })
            .collect()
    }

    pub fn generate_grid(&self, reading: &TimestampedReading) -> SpatialGrid {
        self.generate_grid_from_values(&reading.values_f64())
    }

    pub fn generate_grid_from_values(&self, values: &[f64; CHANNEL_COUNT]) -> SpatialGrid {
        let mut seat = self.empty_grid();
        let mut backrest = self.empty_grid();

        for (channel, &value) in values.iter().enumerate() {
            let grid = match Zone::of(channel) {
                Zone::Backrest => &mut backrest,
                Zone::Seat => &mut seat,
            };
            self.stamp(grid, self.cell(channel), value);
        }

        SpatialGrid { seat, backrest }
    }

    fn empty_grid(&self) -> Grid {
        (0..self.height)
            .map(|r| {
                (0..self.width)
                    .map(|c| {
                        let edge = r < BORDER
                            || c < BORDER
                            || r + BORDER >= self.height
                            || c + BORDER >= self.width;
                        edge.then_some(0.0)
                    })
                    .collect()
            })
            .collect()
    }

    fn stamp(&self, grid: &mut Grid, (row, col): (usize, usize), value: f64) {
        let rows = row.saturating_sub(1)..=(row + 1).min(self.height.saturating_sub(1));
        for r in rows {
            let cols = col.saturating_sub(1)..=(col + 1).min(self.width.saturating_sub(1));
            for c in cols {
                let cell = &mut grid[r][c];
                *cell = Some(value.max(cell.unwrap_or(0.0)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn in_block(cell: (usize, usize), r: usize, c: usize) -> bool {
        r.abs_diff(cell.0) <= 1 && c.abs_diff(cell.1) <= 1
    }

    #[test]
    fn test_default_shape() {
        let mapper = SpatialMapper::default();
        assert_eq!((mapper.height(), mapper.width()), (51, 37));

        let grid = mapper.generate_grid_from_values(&[0.0; CHANNEL_COUNT]);
        assert_eq!(grid.seat.len(), 51);
        assert!(grid.seat.iter().all(|row| row.len() == 37));
        assert_eq!(grid.backrest.len(), 51);
    }

    #[test]
    fn test_half_to_even_cells() {
        let mapper = SpatialMapper::default();
        // y = -0.5 lands exactly on 12.5
        assert_eq!(mapper.cell(8).0, 12);
        assert_eq!(mapper.cell(9).0, 12);
        assert_eq!(mapper.cell(10), (5, 26));
        assert_eq!(mapper.cell(6), (25, 24));
    }

    #[test]
    fn test_uniform_value_stamps() {
        let mapper = SpatialMapper::default();
        let grid = mapper.generate_grid_from_values(&[7.0; CHANNEL_COUNT]);

        for (zone, cells) in [
            (&grid.backrest, (0..4).map(|c| mapper.cell(c)).collect::<Vec<_>>()),
            (&grid.seat, (4..12).map(|c| mapper.cell(c)).collect::<Vec<_>>()),
        ] {
            for r in 0..mapper.height() {
                for c in 0..mapper.width() {
                    let expected = if cells.iter().any(|&cell| in_block(cell, r, c)) {
                        Some(7.0)
                    } else if r < 2 || c < 2 || r >= mapper.height() - 2 || c >= mapper.width() - 2
                    {
                        Some(0.0)
                    } else {
                        None
                    };
                    assert_eq!(zone[r][c], expected, "cell ({}, {})", r, c);
                }
            }
        }
    }

    #[test]
    fn test_overlapping_stamps_keep_maximum() {
        // scale 5 puts p08 at (2, 6) and p10 at (1, 6)
        let mapper = SpatialMapper::new(5.0);
        assert_eq!(mapper.cell(8), (2, 6));
        assert_eq!(mapper.cell(10), (1, 6));

        let mut values = [0.0; CHANNEL_COUNT];
        values[8] = 100.0;
        values[10] = 300.0;
        let grid = mapper.generate_grid_from_values(&values);

        assert_eq!(grid.seat[2][6], Some(300.0));
        assert_eq!(grid.seat[3][6], Some(100.0));
        assert_eq!(grid.seat[0][6], Some(300.0));
    }

    #[test]
    fn test_degenerate_scales_are_clamped() {
        for scale in [-4.0, 0.0, 0.5] {
            let mapper = SpatialMapper::new(scale);
            assert_eq!((mapper.height(), mapper.width()), (5, 3));
            let grid = mapper.generate_grid_from_values(&[10.0; CHANNEL_COUNT]);
            assert_eq!(grid.seat.len(), 5);
            assert!(grid.seat.iter().flatten().any(|v| *v == Some(10.0)));
        }
        assert_eq!(SpatialMapper::new(f64::NAN), SpatialMapper::default());
    }

    #[test]
    fn test_points_match_cells() {
        let mapper = SpatialMapper::default();
        let points = mapper.points();
        assert_eq!(points.len(), CHANNEL_COUNT);
        assert_eq!(
            points[10],
            SensorPoint {
                channel: "p10",
                row: 5,
                col: 26,
                zone: Zone::Seat,
            }
        );
        assert_eq!(points[0].zone, Zone::Backrest);
        assert!(points
            .iter()
            .all(|p| p.row < mapper.height() && p.col < mapper.width()));
    }

    #[test]
    fn test_zone_split() {
        assert_eq!(Zone::of(3), Zone::Backrest);
        assert_eq!(Zone::of(4), Zone::Seat);

        let mut values = [0.0; CHANNEL_COUNT];
        values[0] = 50.0;
        let grid = SpatialMapper::default().generate_grid_from_values(&values);
        let (r, c) = SpatialMapper::default().cell(0);
        assert_eq!(grid.backrest[r][c], Some(50.0));
        assert_eq!(grid.seat[r][c], None);
    }

    #[test]
    fn test_pressure_asymmetry_order() {
        let mut channels = [1000u16; CHANNEL_COUNT];
        channels[10] = 1500;
        channels[1] = 1200;
        let reading =
            TimestampedReading::new(Utc.timestamp_opt(0, 0).unwrap(), channels).unwrap();

        let bands = pressure_asymmetry(&reading);
        let labels: Vec<_> = bands.iter().map(|b| b.label).collect();
        assert_eq!(
            labels,
            vec![
                "F seat top",
                "E seat top-mid",
                "D seat bottom-mid",
                "C seat bottom",
                "B backrest top",
                "A backrest bottom"
            ]
        );
        assert_eq!(bands[0].difference, 500);
        assert_eq!(bands[5].difference, -200);
        assert_eq!(bands[2].difference, 0);
    }
}
