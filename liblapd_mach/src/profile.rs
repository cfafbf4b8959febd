use std::fmt::Display;

use super::error::{DimensionError, ProfileError};
use super::labeled::LabeledArray;
use super::steady_state::{select_fixed, SteadyStateWindow};

/// The spatial axis a linear sweep runs along
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialDimension {
    X,
    Y,
}

impl SpatialDimension {
    pub fn name(&self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
        }
    }
}

impl Display for SpatialDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn dim_size(field: &LabeledArray, dim: &str) -> Result<usize, DimensionError> {
    field
        .size(dim)
        .ok_or_else(|| DimensionError::MissingDimension(dim.to_string()))
}

/// The spatial axes of field with more than one position
pub fn spatial_dimensions(field: &LabeledArray) -> Result<Vec<SpatialDimension>, DimensionError> {
    let mut dims = Vec::new();
    for dim in [SpatialDimension::X, SpatialDimension::Y] {
        if dim_size(field, dim.name())? > 1 {
            dims.push(dim);
        }
    }
    Ok(dims)
}

/// Reduce a field from a linear sweep to its single spatial axis.
///
/// Fails for a fixed-position (0-D) sweep, an areal (2-D) sweep, or a field with
/// a single time sample.
pub fn extract(field: &LabeledArray) -> Result<(SpatialDimension, LabeledArray), DimensionError> {
    let x = dim_size(field, "x")?;
    let y = dim_size(field, "y")?;
    let dim = match spatial_dimensions(field)?.as_slice() {
        [] => return Err(DimensionError::NoSpatialExtent),
        [dim] => *dim,
        _ => return Err(DimensionError::Areal { x, y }),
    };
    let time = dim_size(field, "time")?;
    if time <= 1 {
        return Err(DimensionError::SingleTimeSample(time));
    }
    let trivial = match dim {
        SpatialDimension::X => "y",
        SpatialDimension::Y => "x",
    };
    let profile = field
        .squeeze(trivial)
        .map_err(|_| DimensionError::MissingDimension(trivial.to_string()))?;
    Ok((dim, profile))
}

/// Linear profile of field averaged over the steady-state window
pub fn linear_profile(
    field: &LabeledArray,
    window: &SteadyStateWindow,
) -> Result<(SpatialDimension, LabeledArray), ProfileError> {
    let (dim, profile) = extract(field)?;
    let averaged = select_fixed(&profile, window, true)?;
    spdlog::info!(
        "Extracted {} profile of {} over {} ms to {} ms",
        dim,
        field.name(),
        window.start_ms,
        window.end_ms
    );
    Ok((dim, averaged))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labeled::Coordinate;
    use ndarray::{ArrayD, IxDyn};

    fn field(nx: usize, ny: usize, nt: usize) -> LabeledArray {
        let data = ArrayD::from_shape_fn(IxDyn(&[nx, ny, nt]), |idx| {
            (idx[0] * 100 + idx[1] * 10 + idx[2]) as f64
        });
        LabeledArray::new(
            "Parallel velocity",
            data,
            vec![
                Coordinate::new("x", (0..nx).map(|i| i as f64 - 2.0).collect()),
                Coordinate::new("y", (0..ny).map(|i| i as f64).collect()),
                Coordinate::new("time", (0..nt).map(|i| i as f64).collect()),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_extract_rejects_fixed_position() {
        assert_eq!(
            extract(&field(1, 1, 4)).unwrap_err(),
            DimensionError::NoSpatialExtent
        );
    }

    #[test]
    fn test_extract_rejects_areal() {
        assert_eq!(
            extract(&field(5, 5, 4)).unwrap_err(),
            DimensionError::Areal { x: 5, y: 5 }
        );
    }

    #[test]
    fn test_extract_linear() {
        let (dim, profile) = extract(&field(5, 1, 4)).unwrap();
        assert_eq!(dim, SpatialDimension::X);
        assert_eq!(profile.dims(), vec!["x", "time"]);

        let (dim, profile) = extract(&field(1, 3, 4)).unwrap();
        assert_eq!(dim, SpatialDimension::Y);
        assert_eq!(profile.dims(), vec!["y", "time"]);
    }

    #[test]
    fn test_extract_rejects_single_time() {
        assert_eq!(
            extract(&field(5, 1, 1)).unwrap_err(),
            DimensionError::SingleTimeSample(1)
        );
    }

    #[test]
    fn test_linear_profile_averages_window() {
        let window = SteadyStateWindow::new(1.0, 2.0).unwrap();
        let (dim, profile) = linear_profile(&field(5, 1, 4), &window).unwrap();
        assert_eq!(dim, SpatialDimension::X);
        assert_eq!(profile.dims(), vec!["x"]);
        assert_eq!(profile.data()[[3]], 301.5);
    }
}
