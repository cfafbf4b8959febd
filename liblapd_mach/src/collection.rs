use super::error::{LabelError, ReductionError};
use super::labeled::LabeledArray;
use super::metadata::{Metadata, MetadataKey, MetadataValue};

pub const PARALLEL_MACH: &str = "Parallel Mach number";
pub const PERPENDICULAR_MACH: &str = "Perpendicular Mach number";
pub const PERPENDICULAR_MACH_FORE: &str = "Perpendicular Mach number (fore)";
pub const PERPENDICULAR_MACH_AFT: &str = "Perpendicular Mach number (aft)";
pub const PARALLEL_VELOCITY: &str = "Parallel velocity";
pub const PERPENDICULAR_VELOCITY: &str = "Perpendicular velocity";

/// The named Mach number and velocity fields of one reduction run, with provenance.
///
/// Fields keep their insertion order. After construction only the metadata
/// and per-field DC offsets may change.
#[derive(Debug, Clone, PartialEq)]
pub struct VelocityResultCollection {
    name: String,
    fields: Vec<LabeledArray>,
    metadata: Metadata,
}

impl VelocityResultCollection {
    pub fn new(name: &str, fields: Vec<LabeledArray>) -> Self {
        Self {
            name: name.to_string(),
            fields,
            metadata: Metadata::new(),
        }
    }

    pub fn renamed(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field(&self, name: &str) -> Option<&LabeledArray> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn fields(&self) -> &[LabeledArray] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name()).collect()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn attach_metadata(&mut self, key: MetadataKey, value: MetadataValue) {
        self.metadata.insert(key, value);
    }

    pub fn extend_metadata(&mut self, metadata: &Metadata) {
        self.metadata.extend(metadata);
    }

    /// Subtract a constant DC offset from one field
    pub fn subtract_dc_offset(&mut self, field: &str, offset: f64) -> Result<(), ReductionError> {
        let target = self
            .fields
            .iter_mut()
            .find(|f| f.name() == field)
            .ok_or_else(|| ReductionError::MissingField(field.to_string()))?;
        target.data_mut().mapv_inplace(|v| v - offset);
        Ok(())
    }

    /// Flip the sign of every field
    pub(crate) fn negated(self) -> Self {
        Self {
            fields: self.fields.iter().map(|f| f.map(|v| -v)).collect(),
            ..self
        }
    }

    /// Restrict every field to a single port, keeping the metadata
    pub fn select_port(&self, port: f64) -> Result<Self, LabelError> {
        let fields = self
            .fields
            .iter()
            .map(|f| f.sel("port", port))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: format!("{} (port {})", self.name, port),
            fields,
            metadata: self.metadata.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labeled::Coordinate;
    use ndarray::{ArrayD, IxDyn};

    fn collection() -> VelocityResultCollection {
        let data = ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let coords = vec![
            Coordinate::new("port", vec![27.0, 35.0]),
            Coordinate::new("x", vec![0.0, 1.0]),
        ];
        let mach = LabeledArray::new(PARALLEL_MACH, data.clone(), coords.clone()).unwrap();
        let velocity = LabeledArray::new(PARALLEL_VELOCITY, data * 100.0, coords)
            .unwrap()
            .with_units("cm/s");
        VelocityResultCollection::new("run", vec![mach, velocity])
    }

    #[test]
    fn test_negated() {
        let flipped = collection().negated();
        assert_eq!(flipped.field(PARALLEL_MACH).unwrap().data()[[1, 0]], -3.0);
        assert_eq!(
            flipped.field(PARALLEL_VELOCITY).unwrap().units(),
            Some("cm/s")
        );
    }

    #[test]
    fn test_subtract_dc_offset() {
        let mut results = collection();
        results.subtract_dc_offset(PARALLEL_VELOCITY, 50.0).unwrap();
        assert_eq!(results.field(PARALLEL_VELOCITY).unwrap().data()[[0, 0]], 50.0);
        assert_eq!(results.field(PARALLEL_MACH).unwrap().data()[[0, 0]], 1.0);
        assert_eq!(
            results.subtract_dc_offset(PERPENDICULAR_VELOCITY, 1.0),
            Err(ReductionError::MissingField(String::from(
                PERPENDICULAR_VELOCITY
            )))
        );
    }

    #[test]
    fn test_select_port_keeps_metadata() {
        let mut results = collection();
        results.attach_metadata(
            MetadataKey::SteadyStateTimes,
            MetadataValue::Interval(1.0, 2.0),
        );
        let port = results.select_port(35.0).unwrap();
        assert_eq!(port.field(PARALLEL_MACH).unwrap().dims(), vec!["x"]);
        assert_eq!(port.field(PARALLEL_MACH).unwrap().data()[[1]], 4.0);
        assert_eq!(port.metadata().steady_state_times(), Some((1.0, 2.0)));
        assert!(results.select_port(30.0).is_err());
    }
}
