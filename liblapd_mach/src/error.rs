use std::path::PathBuf;
use thiserror::Error;

use super::worker_status::WorkerStatus;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LabelError {
    #[error("Labeled array has no dimension named {0:?}")]
    MissingDimension(String),
    #[error("Labeled array has {coords} coordinates but its data has {ndim} dimensions")]
    CoordinateCount { coords: usize, ndim: usize },
    #[error("Coordinate {dim:?} has {found} values but the axis has length {expected}")]
    CoordinateLength {
        dim: String,
        expected: usize,
        found: usize,
    },
    #[error("Coordinate {dim:?} has no value {value}")]
    MissingCoordinate { dim: String, value: f64 },
    #[error("Index {index} is out of bounds for dimension {dim:?} of length {len}")]
    IndexOutOfBounds { dim: String, index: usize, len: usize },
    #[error("Dimension {dim:?} has length {len} and cannot be squeezed")]
    NotSqueezable { dim: String, len: usize },
    #[error("Arrays disagree on coordinate {0:?} and cannot be combined")]
    CoordinateMismatch(String),
    #[error("Dimension {0:?} appears more than once")]
    DuplicateDimension(String),
    #[error("Dimension {0:?} is empty and cannot be reduced")]
    EmptyDimension(String),
    #[error("Quantile {0} is outside [0, 1]")]
    InvalidQuantile(f64),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShapeError {
    #[error("Decoding failed: raw data has rank {0}; only rank 2 or 3 is supported")]
    UnsupportedRank(usize),
    #[error("Decoding failed: scale shape {scale:?} does not match offset shape {offset:?}")]
    ScaleOffsetMismatch {
        scale: Vec<usize>,
        offset: Vec<usize>,
    },
    #[error("Decoding failed: raw shape {raw:?} cannot be broadcast against calibration shape {calibration:?}")]
    RawCalibrationMismatch {
        raw: Vec<usize>,
        calibration: Vec<usize>,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PositionConsistencyError {
    #[error("Assembly failed: got {x} x values, {y} y values and {order} shot order entries")]
    LengthMismatch { x: usize, y: usize, order: usize },
    #[error("Assembly failed: shot order entry {0} is repeated or out of range")]
    InvalidShotOrder(usize),
    #[error("Assembly failed: {shots} Mach measurements do not evenly divide into {positions} unique positions")]
    UnevenShots { shots: usize, positions: usize },
    #[error("Assembly failed: position cell ({x}, {y}) holds {found} shots; expected {expected}")]
    CellCount {
        x: f64,
        y: f64,
        found: usize,
        expected: usize,
    },
    #[error("Assembly failed: shot {shot} at ({shot_x}, {shot_y}) was grouped into position ({x}, {y})")]
    NonUniformPosition {
        shot: usize,
        shot_x: f64,
        shot_y: f64,
        x: f64,
        y: f64,
    },
    #[error("Assembly failed: probe face data holds {found} shots but the position index holds {expected}")]
    ShotCount { found: usize, expected: usize },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssemblyError {
    #[error("{0}")]
    Position(#[from] PositionConsistencyError),
    #[error("{0}")]
    Shape(#[from] ShapeError),
    #[error("Assembly failed due to labeled array error: {0}")]
    Label(#[from] LabelError),
    #[error("Assembly failed: no probe recordings were given")]
    NoProbes,
    #[error("Assembly failed: face {0} is not a Mach probe face (expected 1 through 6)")]
    InvalidFace(u8),
    #[error("Assembly failed: face {face} data has shape {shape:?}; expected (shots, samples) or (positions, shots, samples)")]
    FaceShape { face: u8, shape: Vec<usize> },
    #[error("Assembly failed: face {face} has {found} samples per shot; expected {expected}")]
    SampleCount {
        face: u8,
        found: usize,
        expected: usize,
    },
    #[error("Assembly failed: no shunt resistance given for port {port} face {face}")]
    MissingResistance { port: u32, face: u8 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PortAlignmentError {
    #[error("Reduction failed: electron temperature has no ports to align against Mach port {0}")]
    NoPorts(f64),
    #[error("Reduction failed: nearest electron temperature port to Mach port {mach_port} is {nearest}, outside tolerance {tolerance}")]
    OutsideTolerance {
        mach_port: f64,
        nearest: f64,
        tolerance: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReductionError {
    #[error("{0}")]
    PortAlignment(#[from] PortAlignmentError),
    #[error("Reduction failed due to labeled array error: {0}")]
    Label(#[from] LabelError),
    #[error("Reduction failed: Mach current field is missing face {0}")]
    MissingFace(u8),
    #[error("Reduction failed: unknown ion species {0:?}")]
    UnknownSpecies(String),
    #[error("Reduction failed: ion mass {0} kg is not positive")]
    InvalidIonMass(f64),
    #[error("Reduction failed: electron temperature dimension {0:?} is not one of port, x, y")]
    TemperatureDimension(String),
    #[error("Reduction failed: result collection has no field named {0:?}")]
    MissingField(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SteadyStateError {
    #[error("Steady state detection failed due to labeled array error: {0}")]
    Label(#[from] LabelError),
    #[error("Steady state detection failed: no density samples lie within the core radius {0}")]
    EmptyCore(f64),
    #[error("Steady state detection failed: the core-averaged density never rises above zero")]
    NoPlateau,
    #[error("Steady state window [{start}, {end}] is empty or reversed")]
    InvalidWindow { start: f64, end: f64 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DimensionError {
    #[error("Profiling failed: data has no spatial dimension (x and y both have size 1); one-dimensional data is needed for linear profiles")]
    NoSpatialExtent,
    #[error("Profiling failed: linear profiles are not defined for areal data (x size {x}, y size {y})")]
    Areal { x: usize, y: usize },
    #[error("Profiling failed: time axis has {0} sample(s); more than one is needed to average")]
    SingleTimeSample(usize),
    #[error("Profiling failed: data has no {0:?} dimension")]
    MissingDimension(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProfileError {
    #[error("{0}")]
    Dimension(#[from] DimensionError),
    #[error("Profiling failed due to labeled array error: {0}")]
    Label(#[from] LabelError),
    #[error("{0}")]
    SteadyState(#[from] SteadyStateError),
}

#[derive(Debug, Error)]
pub enum LapdFileError {
    #[error("Could not open LAPD file because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("LAPD file read failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
    #[error("LAPD file read failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("LAPD file group {group:?} has no dataset at listing index {index} (found {found})")]
    MissingListing {
        group: String,
        index: usize,
        found: usize,
    },
}

#[derive(Debug, Error)]
pub enum HDF5WriterError {
    #[error("HDF5Writer failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
    #[error("HDF5Writer failed due to string conversion error: {0}")]
    StringError(#[from] hdf5::types::StringError),
    #[error("HDF5Writer failed due to labeled array error: {0}")]
    Label(#[from] LabelError),
    #[error("HDF5Writer failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("HDF5Writer failed due to YAML error: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("HDF5 dataset {0:?} has no dimension labels")]
    MissingDims(String),
    #[error("Could not read results because file {0:?} does not exist")]
    BadFilePath(PathBuf),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to LAPD file error: {0}")]
    LapdFile(#[from] LapdFileError),
    #[error("Processor failed due to labeled array error: {0}")]
    Label(#[from] LabelError),
    #[error("Processor failed during decoding: {0}")]
    Shape(#[from] ShapeError),
    #[error("Processor failed during assembly: {0}")]
    Position(#[from] PositionConsistencyError),
    #[error("Processor failed during assembly: {0}")]
    Assembly(#[from] AssemblyError),
    #[error("Processor failed during reduction: {0}")]
    Reduction(#[from] ReductionError),
    #[error("Processor failed during steady state selection: {0}")]
    SteadyState(#[from] SteadyStateError),
    #[error("Processor failed during profiling: {0}")]
    Profile(#[from] ProfileError),
    #[error("Processor failed due to HDF5Writer error: {0}")]
    HDFError(#[from] HDF5WriterError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
