use ndarray::{Array1, ArrayD, ArrayView1, ArrayViewMutD, Axis, Zip};
use ndarray_stats::errors::QuantileError;
use ndarray_stats::interpolate::Linear;
use ndarray_stats::QuantileExt;
use noisy_float::types::N64;

use super::error::LabelError;

/// Two coordinate values closer than this are the same label
pub const COORDINATE_TOLERANCE: f64 = 1.0e-6;

/// The labels of a single axis of a [`LabeledArray`]
#[derive(Debug, Clone, PartialEq)]
pub struct Coordinate {
    pub dim: String,
    pub values: Vec<f64>,
    pub units: Option<String>,
}

impl Coordinate {
    pub fn new(dim: &str, values: Vec<f64>) -> Self {
        Self {
            dim: dim.to_string(),
            values,
            units: None,
        }
    }

    pub fn with_units(mut self, units: &str) -> Self {
        self.units = Some(units.to_string());
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Index of the label equal (within tolerance) to value
    pub fn position(&self, value: f64) -> Option<usize> {
        self.values
            .iter()
            .position(|v| (v - value).abs() <= COORDINATE_TOLERANCE)
    }

    fn matches(&self, other: &Coordinate) -> bool {
        self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(other.values.iter())
                .all(|(a, b)| (a - b).abs() <= COORDINATE_TOLERANCE || (a.is_nan() && b.is_nan()))
    }

    fn take(&self, indices: &[usize]) -> Self {
        Self {
            dim: self.dim.clone(),
            values: indices.iter().map(|i| self.values[*i]).collect(),
            units: self.units.clone(),
        }
    }
}

/// A non-index coordinate riding along one dimension, like `z` along `port`
#[derive(Debug, Clone, PartialEq)]
pub struct AuxCoordinate {
    pub name: String,
    pub dim: String,
    pub values: Vec<f64>,
    pub units: Option<String>,
}

/// An n-dimensional f64 array whose axes are named and labeled.
///
/// Operations address axes by name, never by position. Binary operations
/// broadcast by name: the result carries every dimension of `self` in order,
/// followed by the dimensions only `other` has. Reductions skip NaN, which is
/// how unreliable samples are flagged throughout the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledArray {
    name: String,
    data: ArrayD<f64>,
    coords: Vec<Coordinate>,
    aux_coords: Vec<AuxCoordinate>,
    units: Option<String>,
}

impl LabeledArray {
    /// Create a labeled array. There must be exactly one coordinate per axis, in axis order.
    pub fn new(name: &str, data: ArrayD<f64>, coords: Vec<Coordinate>) -> Result<Self, LabelError> {
        if coords.len() != data.ndim() {
            return Err(LabelError::CoordinateCount {
                coords: coords.len(),
                ndim: data.ndim(),
            });
        }
        for (axis, coord) in coords.iter().enumerate() {
            let expected = data.len_of(Axis(axis));
            if coord.len() != expected {
                return Err(LabelError::CoordinateLength {
                    dim: coord.dim.clone(),
                    expected,
                    found: coord.len(),
                });
            }
            if coords[..axis].iter().any(|c| c.dim == coord.dim) {
                return Err(LabelError::DuplicateDimension(coord.dim.clone()));
            }
        }
        Ok(Self {
            name: name.to_string(),
            data,
            coords,
            aux_coords: Vec::new(),
            units: None,
        })
    }

    pub fn with_units(mut self, units: &str) -> Self {
        self.units = Some(units.to_string());
        self
    }

    pub fn set_units(&mut self, units: Option<String>) {
        self.units = units;
    }

    pub fn renamed(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn data_mut(&mut self) -> ArrayViewMutD<'_, f64> {
        self.data.view_mut()
    }

    pub fn coords(&self) -> &[Coordinate] {
        &self.coords
    }

    pub fn aux_coords(&self) -> &[AuxCoordinate] {
        &self.aux_coords
    }

    pub fn dims(&self) -> Vec<&str> {
        self.coords.iter().map(|c| c.dim.as_str()).collect()
    }

    pub fn has_dim(&self, dim: &str) -> bool {
        self.coords.iter().any(|c| c.dim == dim)
    }

    pub fn axis_of(&self, dim: &str) -> Result<usize, LabelError> {
        self.coords
            .iter()
            .position(|c| c.dim == dim)
            .ok_or_else(|| LabelError::MissingDimension(dim.to_string()))
    }

    /// Length of the named dimension, None if the array has no such dimension
    pub fn size(&self, dim: &str) -> Option<usize> {
        self.coords.iter().find(|c| c.dim == dim).map(|c| c.len())
    }

    pub fn coord(&self, dim: &str) -> Result<&Coordinate, LabelError> {
        Ok(&self.coords[self.axis_of(dim)?])
    }

    pub fn aux_coord(&self, name: &str) -> Option<&AuxCoordinate> {
        self.aux_coords.iter().find(|a| a.name == name)
    }

    /// Attach (or replace) an auxiliary coordinate along an existing dimension
    pub fn assign_aux_coord(mut self, aux: AuxCoordinate) -> Result<Self, LabelError> {
        let expected = self.coord(&aux.dim)?.len();
        if aux.values.len() != expected {
            return Err(LabelError::CoordinateLength {
                dim: aux.name,
                expected,
                found: aux.values.len(),
            });
        }
        self.aux_coords.retain(|a| a.name != aux.name);
        self.aux_coords.push(aux);
        Ok(self)
    }

    /// Replace the labels of an existing dimension
    pub fn relabel(mut self, dim: &str, values: Vec<f64>) -> Result<Self, LabelError> {
        let axis = self.axis_of(dim)?;
        let expected = self.coords[axis].len();
        if values.len() != expected {
            return Err(LabelError::CoordinateLength {
                dim: dim.to_string(),
                expected,
                found: values.len(),
            });
        }
        self.coords[axis].values = values;
        Ok(self)
    }

    /// Select a single position along dim, dropping the dimension
    pub fn isel(&self, dim: &str, index: usize) -> Result<Self, LabelError> {
        let axis = self.axis_of(dim)?;
        let len = self.data.len_of(Axis(axis));
        if index >= len {
            return Err(LabelError::IndexOutOfBounds {
                dim: dim.to_string(),
                index,
                len,
            });
        }
        let data = self.data.index_axis(Axis(axis), index).to_owned();
        let mut coords = self.coords.clone();
        coords.remove(axis);
        Ok(Self {
            name: self.name.clone(),
            data,
            coords,
            aux_coords: self
                .aux_coords
                .iter()
                .filter(|a| a.dim != dim)
                .cloned()
                .collect(),
            units: self.units.clone(),
        })
    }

    /// Select the position whose label equals value, dropping the dimension
    pub fn sel(&self, dim: &str, value: f64) -> Result<Self, LabelError> {
        let index = self
            .coord(dim)?
            .position(value)
            .ok_or_else(|| LabelError::MissingCoordinate {
                dim: dim.to_string(),
                value,
            })?;
        self.isel(dim, index)
    }

    /// Keep the given positions along dim, in the given order
    pub fn take(&self, dim: &str, indices: &[usize]) -> Result<Self, LabelError> {
        let axis = self.axis_of(dim)?;
        let len = self.data.len_of(Axis(axis));
        if let Some(bad) = indices.iter().find(|i| **i >= len) {
            return Err(LabelError::IndexOutOfBounds {
                dim: dim.to_string(),
                index: *bad,
                len,
            });
        }
        let data = self.data.select(Axis(axis), indices);
        let mut coords = self.coords.clone();
        coords[axis] = coords[axis].take(indices);
        let aux_coords = self
            .aux_coords
            .iter()
            .map(|a| {
                if a.dim == dim {
                    AuxCoordinate {
                        values: indices.iter().map(|i| a.values[*i]).collect(),
                        ..a.clone()
                    }
                } else {
                    a.clone()
                }
            })
            .collect();
        Ok(Self {
            name: self.name.clone(),
            data,
            coords,
            aux_coords,
            units: self.units.clone(),
        })
    }

    /// Keep the positions along dim whose label satisfies keep
    pub fn filter<F>(&self, dim: &str, keep: F) -> Result<Self, LabelError>
    where
        F: Fn(f64) -> bool,
    {
        let indices: Vec<usize> = self
            .coord(dim)?
            .values
            .iter()
            .enumerate()
            .filter(|(_, v)| keep(**v))
            .map(|(i, _)| i)
            .collect();
        self.take(dim, &indices)
    }

    /// Drop a dimension of length one
    pub fn squeeze(&self, dim: &str) -> Result<Self, LabelError> {
        let len = self.coord(dim)?.len();
        if len != 1 {
            return Err(LabelError::NotSqueezable {
                dim: dim.to_string(),
                len,
            });
        }
        self.isel(dim, 0)
    }

    /// NaN-skipping mean along dim
    pub fn mean(&self, dim: &str) -> Result<Self, LabelError> {
        self.reduce_axis(dim, |lane| nan_mean(lane.iter().copied()))
    }

    /// NaN-skipping mean along each of dims in turn
    pub fn mean_over(&self, dims: &[&str]) -> Result<Self, LabelError> {
        let mut reduced = self.clone();
        for dim in dims {
            reduced = reduced.mean(dim)?;
        }
        Ok(reduced)
    }

    /// NaN-skipping quantile along dim, linearly interpolated between order statistics
    pub fn quantile(&self, dim: &str, q: f64) -> Result<Self, LabelError> {
        let axis = self.axis_of(dim)?;
        let q = N64::try_new(q).ok_or(LabelError::InvalidQuantile(q))?;
        let mut data = self.data.clone();
        let quantiles = data
            .quantile_axis_skipnan_mut(Axis(axis), q, &Linear)
            .map_err(|e| match e {
                QuantileError::EmptyInput => LabelError::EmptyDimension(dim.to_string()),
                QuantileError::InvalidQuantile(q) => LabelError::InvalidQuantile(q.raw()),
            })?;
        Ok(self.reduced(axis, dim, quantiles))
    }

    fn reduce_axis<F>(&self, dim: &str, reducer: F) -> Result<Self, LabelError>
    where
        F: Fn(ArrayView1<f64>) -> f64,
    {
        let axis = self.axis_of(dim)?;
        let data = self.data.map_axis(Axis(axis), reducer);
        Ok(self.reduced(axis, dim, data))
    }

    /// Rebuild the labels around data that lost the axis at position axis
    fn reduced(&self, axis: usize, dim: &str, data: ArrayD<f64>) -> Self {
        let mut coords = self.coords.clone();
        coords.remove(axis);
        Self {
            name: self.name.clone(),
            data,
            coords,
            aux_coords: self
                .aux_coords
                .iter()
                .filter(|a| a.dim != dim)
                .cloned()
                .collect(),
            units: self.units.clone(),
        }
    }

    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        Self {
            data: self.data.mapv(f),
            ..self.clone()
        }
    }

    /// Replace every value failing keep with NaN
    pub fn mask<F>(&self, keep: F) -> Self
    where
        F: Fn(f64) -> bool,
    {
        self.map(|v| if keep(v) { v } else { f64::NAN })
    }

    /// Elementwise binary operation, broadcasting by dimension name.
    ///
    /// Shared dimensions must carry the same labels.
    pub fn combine<F>(&self, other: &LabeledArray, f: F) -> Result<Self, LabelError>
    where
        F: Fn(f64, f64) -> f64,
    {
        let mut coords = self.coords.clone();
        for coord in other.coords.iter() {
            match self.coords.iter().find(|c| c.dim == coord.dim) {
                Some(own) if !own.matches(coord) => {
                    return Err(LabelError::CoordinateMismatch(coord.dim.clone()))
                }
                Some(_) => (),
                None => coords.push(coord.clone()),
            }
        }
        let shape: Vec<usize> = coords.iter().map(|c| c.len()).collect();

        let mut lhs = self.data.view();
        while lhs.ndim() < coords.len() {
            let ndim = lhs.ndim();
            lhs = lhs.insert_axis(Axis(ndim));
        }

        let order: Vec<usize> = coords
            .iter()
            .filter_map(|c| other.coords.iter().position(|o| o.dim == c.dim))
            .collect();
        let mut rhs = other.data.view().permuted_axes(order);
        for (axis, coord) in coords.iter().enumerate() {
            if !other.has_dim(&coord.dim) {
                rhs = rhs.insert_axis(Axis(axis));
            }
        }

        let mismatch = || LabelError::CoordinateMismatch(format!("{:?}", self.dims()));
        let lhs_full = lhs.broadcast(shape.as_slice()).ok_or_else(mismatch)?;
        let rhs_full = rhs.broadcast(shape.as_slice()).ok_or_else(mismatch)?;
        let data = Zip::from(&lhs_full)
            .and(&rhs_full)
            .map_collect(|&a, &b| f(a, b));

        let mut aux_coords = self.aux_coords.clone();
        for aux in other.aux_coords.iter() {
            if !aux_coords.iter().any(|a| a.name == aux.name) {
                aux_coords.push(aux.clone());
            }
        }

        Ok(Self {
            name: self.name.clone(),
            data,
            coords,
            aux_coords,
            units: self.units.clone(),
        })
    }
}

/// Mean of the non-NaN values, NaN when there are none
pub fn nan_mean(values: impl IntoIterator<Item = f64>) -> f64 {
    values
        .into_iter()
        .filter(|v| !v.is_nan())
        .collect::<Array1<f64>>()
        .mean()
        .unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn grid() -> LabeledArray {
        // x: 2, time: 3
        let data = ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![1.0, 2.0, 3.0, 4.0, f64::NAN, 6.0])
            .unwrap();
        LabeledArray::new(
            "grid",
            data,
            vec![
                Coordinate::new("x", vec![-1.0, 1.0]).with_units("cm"),
                Coordinate::new("time", vec![0.0, 0.5, 1.0]).with_units("ms"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_bad_coordinates() {
        let data = ArrayD::zeros(IxDyn(&[2, 3]));
        let result = LabeledArray::new("bad", data, vec![Coordinate::new("x", vec![0.0, 1.0])]);
        assert_eq!(
            result.unwrap_err(),
            LabelError::CoordinateCount { coords: 1, ndim: 2 }
        );
    }

    #[test]
    fn test_mean_skips_nan() {
        let mean = grid().mean("time").unwrap();
        assert_eq!(mean.dims(), vec!["x"]);
        assert_eq!(mean.data()[[0]], 2.0);
        assert_eq!(mean.data()[[1]], 5.0);
    }

    #[test]
    fn test_sel_and_filter() {
        let field = grid();
        let row = field.sel("x", 1.0).unwrap();
        assert_eq!(row.data()[[2]], 6.0);
        let late = field.filter("time", |t| t >= 0.5).unwrap();
        assert_eq!(late.size("time"), Some(2));
        assert_eq!(late.coord("time").unwrap().values, vec![0.5, 1.0]);
        assert!(field.sel("x", 3.0).is_err());
    }

    #[test]
    fn test_quantile_interpolates() {
        let data = ArrayD::from_shape_vec(IxDyn(&[5]), vec![4.0, 1.0, 3.0, 2.0, 5.0]).unwrap();
        let field =
            LabeledArray::new("q", data, vec![Coordinate::new("time", vec![0.0; 5])]).unwrap();
        let quartile = field.quantile("time", 0.25).unwrap();
        assert_eq!(quartile.data()[IxDyn(&[])], 2.0);
    }

    #[test]
    fn test_quantile_skips_nan() {
        let data = ArrayD::from_shape_vec(
            IxDyn(&[2, 4]),
            vec![f64::NAN, 1.0, 3.0, 2.0, f64::NAN, f64::NAN, f64::NAN, f64::NAN],
        )
        .unwrap();
        let field = LabeledArray::new(
            "q",
            data,
            vec![
                Coordinate::new("x", vec![0.0, 1.0]),
                Coordinate::new("time", vec![0.0, 1.0, 2.0, 3.0]),
            ],
        )
        .unwrap();
        let median = field.quantile("time", 0.5).unwrap();
        assert_eq!(median.data()[[0]], 2.0);
        assert!(median.data()[[1]].is_nan());
        assert_eq!(
            field.quantile("time", 1.5),
            Err(LabelError::InvalidQuantile(1.5))
        );
        let empty = LabeledArray::new(
            "q",
            ArrayD::zeros(IxDyn(&[2, 0])),
            vec![
                Coordinate::new("x", vec![0.0, 1.0]),
                Coordinate::new("time", Vec::new()),
            ],
        )
        .unwrap();
        assert_eq!(
            empty.quantile("time", 0.25),
            Err(LabelError::EmptyDimension(String::from("time")))
        );
    }

    #[test]
    fn test_nan_mean() {
        assert_eq!(nan_mean(vec![1.0, f64::NAN, 2.0]), 1.5);
        assert!(nan_mean(vec![f64::NAN]).is_nan());
        assert!(nan_mean(Vec::new()).is_nan());
    }

    #[test]
    fn test_combine_broadcasts_by_name() {
        let field = grid();
        let scale = LabeledArray::new(
            "scale",
            ArrayD::from_shape_vec(IxDyn(&[2]), vec![10.0, 100.0]).unwrap(),
            vec![Coordinate::new("x", vec![-1.0, 1.0])],
        )
        .unwrap();
        let product = field.combine(&scale, |a, b| a * b).unwrap();
        assert_eq!(product.dims(), vec!["x", "time"]);
        assert_eq!(product.data()[[0, 2]], 30.0);
        assert_eq!(product.data()[[1, 0]], 400.0);

        let shifted = LabeledArray::new(
            "shifted",
            ArrayD::zeros(IxDyn(&[2])),
            vec![Coordinate::new("x", vec![0.0, 1.0])],
        )
        .unwrap();
        assert!(field.combine(&shifted, |a, b| a + b).is_err());
    }

    #[test]
    fn test_combine_appends_new_dimensions() {
        let field = grid();
        let ports = LabeledArray::new(
            "ports",
            ArrayD::from_shape_vec(IxDyn(&[3, 2]), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap(),
            vec![
                Coordinate::new("time", vec![0.0, 0.5, 1.0]),
                Coordinate::new("port", vec![27.0, 35.0]),
            ],
        )
        .unwrap();
        let sum = field.combine(&ports, |a, b| a + b).unwrap();
        assert_eq!(sum.dims(), vec!["x", "time", "port"]);
        // x = 1, time = 2, port = 35
        assert_eq!(sum.data()[[1, 2, 1]], 6.0 + 6.0);
    }
}
