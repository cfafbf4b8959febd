use bitvec::prelude::*;

use super::error::PositionConsistencyError;

/// Decimal places probe positions are rounded to before grouping
pub const POSITION_DECIMALS: i32 = 1;

/// The spatial layout of a probe sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepKind {
    /// One position only
    Scalar,
    /// Varies along x only
    LinearX,
    /// Varies along y only
    LinearY,
    /// Varies along both x and y
    Areal,
}

/// Shots grouped by their (rounded) probe position.
///
/// `grid[ix][iy]` lists the shot indices recorded at `(x_axis[ix], y_axis[iy])`
/// in processing order.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionIndex {
    pub x_axis: Vec<f64>,
    pub y_axis: Vec<f64>,
    pub grid: Vec<Vec<Vec<usize>>>,
    /// Rounded (x, y) of every shot, indexed by shot
    pub shot_positions: Vec<(f64, f64)>,
}

/// Round to `decimals` places, halves going to the even neighbour
pub fn round_position(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    // Adding 0.0 folds -0.0 onto 0.0 so both land in the same bin
    (value * factor).round_ties_even() / factor + 0.0
}

/// Indices that order the shots by their recorded shot number
pub fn shot_order(shot_numbers: &[u32]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..shot_numbers.len()).collect();
    order.sort_by_key(|i| shot_numbers[*i]);
    order
}

fn unique_sorted(values: &[f64]) -> Vec<f64> {
    let mut unique = values.to_vec();
    unique.sort_by(|a, b| a.total_cmp(b));
    unique.dedup_by(|a, b| a.total_cmp(b).is_eq());
    unique
}

fn bin_of(axis: &[f64], value: f64) -> usize {
    axis.binary_search_by(|probe| probe.total_cmp(&value))
        .unwrap_or_else(|i| i)
}

/// Group shots by unique rounded (x, y) position.
///
/// Shots are visited in `shot_order`, so the shots within a cell follow it.
/// Degenerate layouts are reported but not rejected here.
pub fn categorize(
    x_raw: &[f64],
    y_raw: &[f64],
    shot_order: &[usize],
) -> Result<PositionIndex, PositionConsistencyError> {
    if x_raw.len() != y_raw.len() || x_raw.len() != shot_order.len() {
        return Err(PositionConsistencyError::LengthMismatch {
            x: x_raw.len(),
            y: y_raw.len(),
            order: shot_order.len(),
        });
    }

    let shot_positions: Vec<(f64, f64)> = x_raw
        .iter()
        .zip(y_raw.iter())
        .map(|(x, y)| {
            (
                round_position(*x, POSITION_DECIMALS),
                round_position(*y, POSITION_DECIMALS),
            )
        })
        .collect();
    let x_round: Vec<f64> = shot_positions.iter().map(|p| p.0).collect();
    let y_round: Vec<f64> = shot_positions.iter().map(|p| p.1).collect();
    let x_axis = unique_sorted(&x_round);
    let y_axis = unique_sorted(&y_round);

    let mut visited = bitvec![0; shot_order.len()];
    let mut grid = vec![vec![Vec::new(); y_axis.len()]; x_axis.len()];
    for shot in shot_order.iter().copied() {
        if shot >= visited.len() || visited[shot] {
            return Err(PositionConsistencyError::InvalidShotOrder(shot));
        }
        visited.set(shot, true);
        let (x, y) = shot_positions[shot];
        grid[bin_of(&x_axis, x)][bin_of(&y_axis, y)].push(shot);
    }

    let index = PositionIndex {
        x_axis,
        y_axis,
        grid,
        shot_positions,
    };
    match index.sweep_kind() {
        SweepKind::Scalar => {
            spdlog::warn!("Only one position value. No spatial profiles can be made")
        }
        SweepKind::LinearY => {
            spdlog::info!("Only one unique x value. Will create linear profiles along y")
        }
        SweepKind::LinearX => {
            spdlog::info!("Only one unique y value. Will create linear profiles along x")
        }
        SweepKind::Areal => spdlog::info!(
            "Areal sweep with {} x positions and {} y positions",
            index.x_axis.len(),
            index.y_axis.len()
        ),
    }
    Ok(index)
}

impl PositionIndex {
    pub fn shot_count(&self) -> usize {
        self.shot_positions.len()
    }

    /// Number of cells holding at least one shot
    pub fn position_count(&self) -> usize {
        self.grid
            .iter()
            .flat_map(|column| column.iter())
            .filter(|cell| !cell.is_empty())
            .count()
    }

    pub fn sweep_kind(&self) -> SweepKind {
        match (self.x_axis.len() > 1, self.y_axis.len() > 1) {
            (false, false) => SweepKind::Scalar,
            (true, false) => SweepKind::LinearX,
            (false, true) => SweepKind::LinearY,
            (true, true) => SweepKind::Areal,
        }
    }

    /// Every shot index in the grid, cell by cell
    pub fn flatten(&self) -> Vec<usize> {
        self.grid
            .iter()
            .flat_map(|column| column.iter())
            .flat_map(|cell| cell.iter().copied())
            .collect()
    }

    /// Check that the sweep is a full rectangular grid with the same number of shots at every
    /// position, and that every shot sits in the cell of its own position.
    ///
    /// Returns the number of shots per position.
    pub fn shots_per_position(&self) -> Result<usize, PositionConsistencyError> {
        let shots = self.shot_count();
        let positions = self.position_count();
        if positions == 0 || shots % positions != 0 {
            return Err(PositionConsistencyError::UnevenShots { shots, positions });
        }
        let expected = shots / positions;

        let mut seen = bitvec![0; shots];
        for (ix, column) in self.grid.iter().enumerate() {
            for (iy, cell) in column.iter().enumerate() {
                let (x, y) = (self.x_axis[ix], self.y_axis[iy]);
                if cell.len() != expected {
                    return Err(PositionConsistencyError::CellCount {
                        x,
                        y,
                        found: cell.len(),
                        expected,
                    });
                }
                for shot in cell.iter().copied() {
                    let (shot_x, shot_y) = self.shot_positions[shot];
                    if shot_x != x || shot_y != y || seen[shot] {
                        return Err(PositionConsistencyError::NonUniformPosition {
                            shot,
                            shot_x,
                            shot_y,
                            x,
                            y,
                        });
                    }
                    seen.set(shot, true);
                }
            }
        }
        Ok(expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_positions() {
        let x = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let y = [0.0; 6];
        let order: Vec<usize> = (0..6).collect();
        let index = categorize(&x, &y, &order).unwrap();
        assert_eq!(index.grid.len(), 2);
        assert_eq!(index.grid[0].len(), 1);
        assert_eq!(index.grid[0][0], vec![0, 1, 2]);
        assert_eq!(index.grid[1][0], vec![3, 4, 5]);
        assert_eq!(index.x_axis, vec![0.0, 1.0]);
        assert_eq!(index.sweep_kind(), SweepKind::LinearX);
        assert_eq!(index.shots_per_position(), Ok(3));
    }

    #[test]
    fn test_rounding_merges_near_positions() {
        let x = [-10.02, -9.98, 5.04, 4.96];
        let y = [0.01, -0.01, 0.0, 0.04];
        let index = categorize(&x, &y, &shot_order(&[1, 2, 3, 4])).unwrap();
        assert_eq!(index.x_axis, vec![-10.0, 5.0]);
        assert_eq!(index.y_axis, vec![0.0]);
        assert_eq!(index.grid[0][0], vec![0, 1]);
    }

    #[test]
    fn test_rounding_halves_to_even() {
        let x = [0.25, 0.25, 1.25, 1.25];
        let index = categorize(&x, &[0.0; 4], &[0, 1, 2, 3]).unwrap();
        assert_eq!(index.x_axis, vec![0.2, 1.2]);
        assert_eq!(index.shot_positions[2], (1.2, 0.0));
        assert_eq!(round_position(-0.25, 1), -0.2);
    }

    #[test]
    fn test_misplaced_shot_rejected() {
        let mut index = PositionIndex {
            x_axis: vec![0.0, 1.0],
            y_axis: vec![0.0],
            grid: vec![vec![vec![0, 1]], vec![vec![2, 3]]],
            shot_positions: vec![(0.0, 0.0), (1.0, 0.0), (0.0, 0.0), (1.0, 0.0)],
        };
        assert_eq!(
            index.shots_per_position(),
            Err(PositionConsistencyError::NonUniformPosition {
                shot: 1,
                shot_x: 1.0,
                shot_y: 0.0,
                x: 0.0,
                y: 0.0,
            })
        );

        // Shot 0 listed twice
        index.grid = vec![vec![vec![0, 0]], vec![vec![1, 3]]];
        index.shot_positions = vec![(0.0, 0.0), (1.0, 0.0), (1.0, 0.0), (1.0, 0.0)];
        assert_eq!(
            index.shots_per_position(),
            Err(PositionConsistencyError::NonUniformPosition {
                shot: 0,
                shot_x: 0.0,
                shot_y: 0.0,
                x: 0.0,
                y: 0.0,
            })
        );
    }

    #[test]
    fn test_flatten_recovers_every_shot() {
        let x: Vec<f64> = (0..24).map(|i| (i % 4) as f64 * 1.5).collect();
        let y: Vec<f64> = (0..24).map(|i| ((i / 4) % 3) as f64 - 1.0).collect();
        let numbers: Vec<u32> = (0..24).map(|i| (37 * i + 11) % 24).collect();
        let index = categorize(&x, &y, &shot_order(&numbers)).unwrap();
        let mut shots = index.flatten();
        assert_eq!(shots.len(), 24);
        shots.sort();
        assert_eq!(shots, (0..24).collect::<Vec<_>>());
        assert_eq!(index.sweep_kind(), SweepKind::Areal);
    }

    #[test]
    fn test_cells_follow_shot_order() {
        let x = [0.0, 0.0, 0.0];
        let y = [0.0, 0.0, 0.0];
        let index = categorize(&x, &y, &shot_order(&[30, 10, 20])).unwrap();
        assert_eq!(index.grid[0][0], vec![1, 2, 0]);
        assert_eq!(index.sweep_kind(), SweepKind::Scalar);
    }

    #[test]
    fn test_uneven_shots_rejected() {
        for (shots, positions) in [(7usize, 2usize), (5, 3), (10, 4)] {
            let x: Vec<f64> = (0..shots).map(|i| (i % positions) as f64).collect();
            let y = vec![0.0; shots];
            let order: Vec<usize> = (0..shots).collect();
            let index = categorize(&x, &y, &order).unwrap();
            assert_eq!(
                index.shots_per_position(),
                Err(PositionConsistencyError::UnevenShots { shots, positions })
            );
        }
    }

    #[test]
    fn test_incomplete_grid_rejected() {
        // Three of four grid cells visited
        let x = [0.0, 0.0, 1.0, 1.0, 0.0, 0.0];
        let y = [0.0, 0.0, 0.0, 0.0, 1.0, 1.0];
        let index = categorize(&x, &y, &[0, 1, 2, 3, 4, 5]).unwrap();
        assert!(matches!(
            index.shots_per_position(),
            Err(PositionConsistencyError::CellCount { found: 0, .. })
        ));
    }

    #[test]
    fn test_bad_inputs_rejected() {
        assert!(matches!(
            categorize(&[0.0, 1.0], &[0.0], &[0, 1]),
            Err(PositionConsistencyError::LengthMismatch { .. })
        ));
        assert_eq!(
            categorize(&[0.0, 1.0], &[0.0, 0.0], &[1, 1]),
            Err(PositionConsistencyError::InvalidShotOrder(1))
        );
    }
}
