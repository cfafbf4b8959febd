//! Mach numbers and flow velocities from opposing-face ion saturation currents.
//!
//! Probe faces, looking down on the octagonal probe head:
//!
//! ```text
//!                  ________
//!      |         /          \
//! fore |    3  /              \  4
//!      |      |                |
//! cath |   2  |                |  5
//!      |      |                |
//! aft  |    1  \              /  6
//!      |         \__________/
//! ```
//!
//! Faces 2 and 5 face toward and away from the cathode. Faces 3/6 and 4/1 are
//! the fore and aft diagonal pairs used for the perpendicular Mach number.
use std::f64::consts::FRAC_PI_4;

use super::assembler::MachCurrentField;
use super::collection::{
    VelocityResultCollection, PARALLEL_MACH, PARALLEL_VELOCITY, PERPENDICULAR_MACH,
    PERPENDICULAR_MACH_AFT, PERPENDICULAR_MACH_FORE, PERPENDICULAR_VELOCITY,
};
use super::error::{PortAlignmentError, ReductionError};
use super::labeled::LabeledArray;
use super::lookup::IonMassLookup;

/// Magnetization factor from Hutchinson's derivation including diamagnetic drift
pub const MAGNETIZATION_FACTOR: f64 = 0.5;
/// Angle the fore faces make with the magnetic field [rad]
pub const ALPHA_FORE: f64 = FRAC_PI_4;
/// Angle the aft faces make with the magnetic field [rad]
pub const ALPHA_AFT: f64 = FRAC_PI_4;
/// Largest allowed distance between a Mach port and its electron temperature port
pub const PORT_TOLERANCE: f64 = 5.0;
/// Elementary charge [C], i.e. joules per electronvolt
pub const ELEMENTARY_CHARGE: f64 = 1.602176634e-19;

const TEMPERATURE_DIMS: [&str; 3] = ["port", "x", "y"];

/// sqrt(1 eV / 1 kg) expressed in cm/s
pub fn velocity_unit_cm_per_s() -> f64 {
    ELEMENTARY_CHARGE.sqrt() * 100.0
}

/// Magnetization-scaled log ratio of two face currents; NaN unless both are positive
pub fn log_ratio(numerator: f64, denominator: f64) -> f64 {
    if numerator > 0.0 && denominator > 0.0 {
        MAGNETIZATION_FACTOR * (numerator.ln() - denominator.ln())
    } else {
        f64::NAN
    }
}

fn face_pair(
    current: &MachCurrentField,
    numerator: u8,
    denominator: u8,
) -> Result<LabeledArray, ReductionError> {
    for face in [numerator, denominator] {
        if !current.has_face(face) {
            return Err(ReductionError::MissingFace(face));
        }
    }
    let mut ratio = current
        .face(numerator)?
        .combine(&current.face(denominator)?, log_ratio)?;
    ratio.set_units(None);
    Ok(ratio)
}

/// Parallel Mach number, `0.5 ln(I5 / I2)`
pub fn parallel_mach_number(current: &MachCurrentField) -> Result<LabeledArray, ReductionError> {
    Ok(face_pair(current, 5, 2)?.renamed(PARALLEL_MACH))
}

/// Perpendicular Mach number estimates from the fore and aft face pairs
#[derive(Debug, Clone, PartialEq)]
pub struct PerpendicularMach {
    pub fore: LabeledArray,
    pub aft: LabeledArray,
    pub mean: LabeledArray,
}

/// Perpendicular Mach numbers, or None when any of faces 1, 3, 4, 6 is absent
pub fn perpendicular_mach_numbers(
    current: &MachCurrentField,
    parallel: &LabeledArray,
) -> Result<Option<PerpendicularMach>, ReductionError> {
    if ![1, 3, 4, 6].iter().all(|face| current.has_face(*face)) {
        return Ok(None);
    }
    let correction_fore = face_pair(current, 6, 3)?;
    let correction_aft = face_pair(current, 4, 1)?;

    let fore = parallel
        .combine(&correction_fore, |mach, correction| {
            (mach - correction) * ALPHA_FORE.cos()
        })?
        .renamed(PERPENDICULAR_MACH_FORE);
    let aft = parallel
        .combine(&correction_aft, |mach, correction| {
            (mach - correction) * ALPHA_AFT.cos()
        })?
        .renamed(PERPENDICULAR_MACH_AFT);
    let mean = fore
        .combine(&aft, |a, b| (a + b) / 2.0)?
        .renamed(PERPENDICULAR_MACH);
    Ok(Some(PerpendicularMach { fore, aft, mean }))
}

/// Reindex the temperature's ports onto the Mach ports by nearest match.
///
/// A temperature field without a port dimension applies to every port as is.
pub fn align_ports(
    temperature: &LabeledArray,
    ports: &[f64],
    tolerance: f64,
) -> Result<LabeledArray, ReductionError> {
    if !temperature.has_dim("port") {
        return Ok(temperature.clone());
    }
    let available = temperature.coord("port")?.values.clone();
    let mut indices = Vec::with_capacity(ports.len());
    for port in ports.iter() {
        let (nearest, distance) = available
            .iter()
            .enumerate()
            .map(|(i, p)| (i, (p - port).abs()))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .ok_or(PortAlignmentError::NoPorts(*port))?;
        if distance > tolerance {
            return Err(PortAlignmentError::OutsideTolerance {
                mach_port: *port,
                nearest: available[nearest],
                tolerance,
            }
            .into());
        }
        indices.push(nearest);
    }
    Ok(temperature
        .take("port", &indices)?
        .relabel("port", ports.to_vec())?)
}

/// Reduce a Mach current field to Mach numbers and velocities.
///
/// `temperature` is the steady-state electron temperature [eV] over some of
/// {port, x, y}; `ion_mass` is in kg. Undefined logarithms come out as NaN.
/// Every field of the returned collection is negated, so positive values point
/// away from the cathode-facing reference.
pub fn reduce(
    current: &MachCurrentField,
    temperature: &LabeledArray,
    ion_mass: f64,
) -> Result<VelocityResultCollection, ReductionError> {
    reduce_aligned(current, temperature, ion_mass, PORT_TOLERANCE)
}

/// [`reduce`] with an explicit port alignment tolerance
pub fn reduce_aligned(
    current: &MachCurrentField,
    temperature: &LabeledArray,
    ion_mass: f64,
    port_tolerance: f64,
) -> Result<VelocityResultCollection, ReductionError> {
    if !(ion_mass > 0.0) {
        return Err(ReductionError::InvalidIonMass(ion_mass));
    }
    if let Some(dim) = temperature
        .dims()
        .into_iter()
        .find(|d| !TEMPERATURE_DIMS.contains(d))
    {
        return Err(ReductionError::TemperatureDimension(dim.to_string()));
    }
    let temperature = align_ports(temperature, &current.ports(), port_tolerance)?;
    let unit = velocity_unit_cm_per_s();
    let sound_speed = temperature.map(|te| (te / ion_mass).sqrt() * unit);

    let to_velocity = |mach: &LabeledArray, name: &str| -> Result<LabeledArray, ReductionError> {
        Ok(mach
            .combine(&sound_speed, |m, c| m * c)?
            .renamed(name)
            .with_units("cm/s"))
    };

    let parallel = parallel_mach_number(current)?;
    let parallel_velocity = to_velocity(&parallel, PARALLEL_VELOCITY)?;
    let mut fields = vec![parallel.clone()];
    let mut velocities = vec![parallel_velocity];

    match perpendicular_mach_numbers(current, &parallel)? {
        Some(perpendicular) => {
            velocities.push(to_velocity(&perpendicular.mean, PERPENDICULAR_VELOCITY)?);
            fields.push(perpendicular.mean);
            fields.push(perpendicular.fore);
            fields.push(perpendicular.aft);
        }
        None => spdlog::info!(
            "Faces 1, 3, 4 and 6 are not all present; omitting perpendicular Mach number"
        ),
    }
    fields.append(&mut velocities);

    Ok(VelocityResultCollection::new(current.as_labeled().name(), fields).negated())
}

/// [`reduce`] with the ion mass resolved from a species name such as `He-4+`
pub fn reduce_species(
    current: &MachCurrentField,
    temperature: &LabeledArray,
    species: &str,
    lookup: &dyn IonMassLookup,
) -> Result<VelocityResultCollection, ReductionError> {
    let ion_mass = lookup
        .ion_mass(species)
        .ok_or_else(|| ReductionError::UnknownSpecies(species.to_string()))?;
    reduce(current, temperature, ion_mass)
}
