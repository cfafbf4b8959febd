use ndarray::{ArrayD, Axis};

use super::error::ShapeError;

/// One probe face's compressed samples, (shots, samples) or (positions, shots, samples)
#[derive(Debug, Clone, PartialEq)]
pub struct RawChannelRecord {
    pub data: ArrayD<f64>,
}

/// Per-shot scale and offset for a RawChannelRecord. Shaped like the raw data minus its sample axis.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationRecord {
    pub scale: ArrayD<f64>,
    pub offset: ArrayD<f64>,
}

impl RawChannelRecord {
    /// Decompress the record with its calibration
    pub fn decode(&self, calibration: &CalibrationRecord) -> Result<ArrayD<f64>, ShapeError> {
        decompress(&self.data, &calibration.scale, &calibration.offset)
    }
}

/// Convert raw digitizer samples to physical units.
///
/// `scale` and `offset` describe every dimension of `raw` except the innermost
/// sample axis; they are broadcast along it and applied as `raw * scale + offset`.
pub fn decompress(
    raw: &ArrayD<f64>,
    scale: &ArrayD<f64>,
    offset: &ArrayD<f64>,
) -> Result<ArrayD<f64>, ShapeError> {
    if !matches!(raw.ndim(), 2 | 3) {
        return Err(ShapeError::UnsupportedRank(raw.ndim()));
    }
    if scale.shape() != offset.shape() {
        return Err(ShapeError::ScaleOffsetMismatch {
            scale: scale.shape().to_vec(),
            offset: offset.shape().to_vec(),
        });
    }
    let sample_axis = raw.ndim() - 1;
    if &raw.shape()[..sample_axis] != scale.shape() {
        return Err(ShapeError::RawCalibrationMismatch {
            raw: raw.shape().to_vec(),
            calibration: scale.shape().to_vec(),
        });
    }

    let scale = scale.view().insert_axis(Axis(sample_axis));
    let offset = offset.view().insert_axis(Axis(sample_axis));
    let mut physical = raw.clone();
    physical.zip_mut_with(&scale, |sample, s| *sample *= *s);
    physical.zip_mut_with(&offset, |sample, o| *sample += *o);
    Ok(physical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn array(shape: &[usize], values: Vec<f64>) -> ArrayD<f64> {
        ArrayD::from_shape_vec(IxDyn(shape), values).unwrap()
    }

    #[test]
    fn test_two_faces_three_shots() {
        let raw = array(&[2, 3, 4], (0..24).map(|v| v as f64).collect());
        let scale = array(&[2, 3], vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
        let offset = ArrayD::zeros(IxDyn(&[2, 3]));
        let physical = decompress(&raw, &scale, &offset).unwrap();
        for sample in 0..4 {
            assert_eq!(physical[[0, 0, sample]], raw[[0, 0, sample]]);
            for shot in 0..3 {
                assert_eq!(physical[[1, shot, sample]], 2.0 * raw[[1, shot, sample]]);
            }
        }
    }

    #[test]
    fn test_affine_exact() {
        let raw = array(&[3, 5], (0..15).map(|v| v as f64 * 0.37 - 2.0).collect());
        let scale = array(&[3], vec![0.5, -1.25, 3.0]);
        let offset = array(&[3], vec![1.0, 0.125, -7.5]);
        let physical = decompress(&raw, &scale, &offset).unwrap();
        for shot in 0..3 {
            for sample in 0..5 {
                assert_eq!(
                    physical[[shot, sample]],
                    raw[[shot, sample]] * scale[[shot]] + offset[[shot]]
                );
            }
        }
    }

    #[test]
    fn test_rejects_bad_rank() {
        let raw = array(&[4], vec![0.0; 4]);
        let scale = array(&[], vec![1.0]);
        assert_eq!(
            decompress(&raw, &scale, &scale),
            Err(ShapeError::UnsupportedRank(1))
        );
        let raw = ArrayD::zeros(IxDyn(&[1, 1, 1, 2]));
        let scale = ArrayD::zeros(IxDyn(&[1, 1, 1]));
        assert_eq!(
            decompress(&raw, &scale, &scale),
            Err(ShapeError::UnsupportedRank(4))
        );
    }

    #[test]
    fn test_rejects_mismatched_calibration() {
        let raw = ArrayD::zeros(IxDyn(&[3, 4]));
        let scale = ArrayD::ones(IxDyn(&[3]));
        let offset = ArrayD::zeros(IxDyn(&[2]));
        assert!(matches!(
            decompress(&raw, &scale, &offset),
            Err(ShapeError::ScaleOffsetMismatch { .. })
        ));

        let scale = ArrayD::ones(IxDyn(&[4]));
        let offset = ArrayD::zeros(IxDyn(&[4]));
        assert_eq!(
            decompress(&raw, &scale, &offset),
            Err(ShapeError::RawCalibrationMismatch {
                raw: vec![3, 4],
                calibration: vec![4],
            })
        );
    }
}
