use std::collections::BTreeMap;

use ndarray::{s, Array6, ArrayD, Axis};

use super::error::{AssemblyError, LabelError, PositionConsistencyError};
use super::labeled::{AuxCoordinate, Coordinate, LabeledArray};
use super::lookup::AxialLookup;
use super::position::PositionIndex;

/// Dimension order of a Mach current field
pub const CURRENT_DIMS: [&str; 6] = ["port", "face", "x", "y", "shot", "time"];
pub const MIN_FACE: u8 = 1;
pub const MAX_FACE: u8 = 6;

/// The decoded signals of one Mach probe, keyed by face number.
///
/// Each face holds (shots, samples) or (positions, shots, samples) in the
/// digitizer's flat shot order.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeRecording {
    pub port: u32,
    pub faces: BTreeMap<u8, ArrayD<f64>>,
}

/// Probe face signals laid out over {port, face, x, y, shot, time}
#[derive(Debug, Clone, PartialEq)]
pub struct MachCurrentField {
    field: LabeledArray,
}

impl MachCurrentField {
    /// Wrap a labeled array, checking the dimension order and face labels
    pub fn from_labeled(field: LabeledArray) -> Result<Self, AssemblyError> {
        let dims = field.dims();
        if dims != CURRENT_DIMS {
            let error = match CURRENT_DIMS.iter().find(|d| !dims.contains(*d)) {
                Some(missing) => LabelError::MissingDimension(missing.to_string()),
                None => LabelError::CoordinateMismatch(format!("{dims:?}")),
            };
            return Err(AssemblyError::Label(error));
        }
        for face in field.coord("face")?.values.iter() {
            let number = *face as u8;
            if face.fract() != 0.0 || !(MIN_FACE..=MAX_FACE).contains(&number) {
                return Err(AssemblyError::InvalidFace(number));
            }
        }
        Ok(Self { field })
    }

    pub fn as_labeled(&self) -> &LabeledArray {
        &self.field
    }

    pub fn into_labeled(self) -> LabeledArray {
        self.field
    }

    pub fn faces(&self) -> Vec<u8> {
        self.field
            .coords()
            .iter()
            .find(|c| c.dim == "face")
            .map(|c| c.values.iter().map(|f| *f as u8).collect())
            .unwrap_or_default()
    }

    pub fn has_face(&self, face: u8) -> bool {
        self.faces().contains(&face)
    }

    pub fn ports(&self) -> Vec<f64> {
        self.field
            .coords()
            .first()
            .map(|c| c.values.clone())
            .unwrap_or_default()
    }

    /// The signal of one face, with the face dimension dropped
    pub fn face(&self, face: u8) -> Result<LabeledArray, LabelError> {
        Ok(self
            .field
            .sel("face", face as f64)?
            .renamed(&format!("Face {face}")))
    }
}

/// Lay the per-face signals of every probe onto the position grid.
///
/// Shots at a position fill the `shot` axis in the order the grid lists them.
/// A face recorded on one probe but not another is NaN on the probe missing it.
pub fn assemble(
    probes: &[ProbeRecording],
    index: &PositionIndex,
    sample_interval_ms: f64,
    axial: &dyn AxialLookup,
) -> Result<MachCurrentField, AssemblyError> {
    let shots_per_position = index.shots_per_position()?;

    let mut faces: Vec<u8> = probes
        .iter()
        .flat_map(|probe| probe.faces.keys().copied())
        .collect();
    faces.sort();
    faces.dedup();
    if let Some(bad) = faces
        .iter()
        .find(|f| !(MIN_FACE..=MAX_FACE).contains(*f))
    {
        return Err(AssemblyError::InvalidFace(*bad));
    }

    let n_frames = probes
        .iter()
        .flat_map(|probe| probe.faces.values())
        .next()
        .and_then(|data| data.shape().last().copied())
        .ok_or(AssemblyError::NoProbes)?;

    let mut data = Array6::<f64>::from_elem(
        (
            probes.len(),
            faces.len(),
            index.x_axis.len(),
            index.y_axis.len(),
            shots_per_position,
            n_frames,
        ),
        f64::NAN,
    );

    for (p, probe) in probes.iter().enumerate() {
        for (face, signal) in probe.faces.iter() {
            let f = faces
                .iter()
                .position(|v| v == face)
                .ok_or(AssemblyError::InvalidFace(*face))?;
            if !matches!(signal.ndim(), 2 | 3) {
                return Err(AssemblyError::FaceShape {
                    face: *face,
                    shape: signal.shape().to_vec(),
                });
            }
            let samples = signal.shape()[signal.ndim() - 1];
            if samples != n_frames {
                return Err(AssemblyError::SampleCount {
                    face: *face,
                    found: samples,
                    expected: n_frames,
                });
            }
            let shots = signal.len() / samples.max(1);
            if shots != index.shot_count() {
                return Err(PositionConsistencyError::ShotCount {
                    found: shots,
                    expected: index.shot_count(),
                }
                .into());
            }
            let flat = signal
                .to_shape((shots, samples))
                .map_err(|_| AssemblyError::FaceShape {
                    face: *face,
                    shape: signal.shape().to_vec(),
                })?;

            for (ix, column) in index.grid.iter().enumerate() {
                for (iy, cell) in column.iter().enumerate() {
                    for (slot, shot) in cell.iter().enumerate() {
                        data.slice_mut(s![p, f, ix, iy, slot, ..])
                            .assign(&flat.index_axis(Axis(0), *shot));
                    }
                }
            }
        }
    }

    let ports: Vec<f64> = probes.iter().map(|probe| probe.port as f64).collect();
    let port_z: Vec<f64> = probes
        .iter()
        .map(|probe| axial.port_to_z(probe.port))
        .collect();
    let coords = vec![
        Coordinate::new("port", ports),
        Coordinate::new("face", faces.iter().map(|f| *f as f64).collect()),
        Coordinate::new("x", index.x_axis.clone()).with_units("cm"),
        Coordinate::new("y", index.y_axis.clone()).with_units("cm"),
        Coordinate::new(
            "shot",
            (1..=shots_per_position).map(|s| s as f64).collect(),
        ),
        Coordinate::new(
            "time",
            (0..n_frames)
                .map(|t| t as f64 * sample_interval_ms)
                .collect(),
        )
        .with_units("ms"),
    ];
    let field = LabeledArray::new("Isat", data.into_dyn(), coords)?.assign_aux_coord(
        AuxCoordinate {
            name: String::from("z"),
            dim: String::from("port"),
            values: port_z,
            units: Some(String::from("cm")),
        },
    )?;

    spdlog::info!(
        "Assembled Mach current field with {} port(s), faces {:?}, {} x {} positions, {} shots per position and {} samples",
        probes.len(),
        faces,
        index.x_axis.len(),
        index.y_axis.len(),
        shots_per_position,
        n_frames
    );

    MachCurrentField::from_labeled(field)
}

/// Convert probe face voltages to currents by dividing out each face's shunt resistance [Ohm].
///
/// `resistances` maps port -> face -> resistance. Faces with no recorded data may be omitted.
pub fn to_current(
    field: MachCurrentField,
    resistances: &BTreeMap<u32, BTreeMap<u8, f64>>,
) -> Result<MachCurrentField, AssemblyError> {
    let ports = field.ports();
    let faces = field.faces();
    let mut labeled = field.into_labeled();
    {
        let mut data = labeled.data_mut();
        for (p, port) in ports.iter().enumerate() {
            let port = *port as u32;
            let mut probe_data = data.index_axis_mut(Axis(0), p);
            for (f, face) in faces.iter().enumerate() {
                let mut face_data = probe_data.index_axis_mut(Axis(0), f);
                match resistances.get(&port).and_then(|r| r.get(face)) {
                    Some(resistance) => face_data.mapv_inplace(|v| v / resistance),
                    None if face_data.iter().all(|v| v.is_nan()) => (),
                    None => return Err(AssemblyError::MissingResistance { port, face: *face }),
                }
            }
        }
    }
    labeled.set_units(Some(String::from("A")));
    MachCurrentField::from_labeled(labeled)
}

/// Subtract each trace's DC level and drop non-physical currents.
///
/// The DC level is the `quantile` of the last `tail_samples` samples of every
/// trace. After subtraction, currents at or below zero become NaN.
pub fn remove_dc_offset(
    field: &MachCurrentField,
    tail_samples: usize,
    quantile: f64,
) -> Result<MachCurrentField, AssemblyError> {
    let labeled = field.as_labeled();
    let n_frames = labeled.size("time").unwrap_or(0);
    let start = n_frames.saturating_sub(tail_samples);
    let tail: Vec<usize> = (start..n_frames).collect();
    let offsets = labeled.take("time", &tail)?.quantile("time", quantile)?;
    let shifted = labeled.combine(&offsets, |v, offset| v - offset)?;
    let cleaned = shifted.mask(|v| v > 0.0);
    let dropped = cleaned.data().iter().filter(|v| v.is_nan()).count();
    if dropped > 0 {
        spdlog::info!(
            "{} of {} current samples are non-positive after DC offset removal and were set to NaN",
            dropped,
            cleaned.data().len()
        );
    }
    MachCurrentField::from_labeled(cleaned)
}
