use hdf5::{File, Group, H5Type};
use ndarray::{ArrayD, IxDyn};
use std::path::{Path, PathBuf};

use super::decompress::{CalibrationRecord, RawChannelRecord};
use super::error::LapdFileError;
use super::labeled::nan_mean;
use super::metadata::{Metadata, MetadataKey, MetadataValue};

pub const SIS_CRATE_GROUP: &str = "Raw data + config/SIS crate";
pub const MOTION_GROUP: &str = "Raw data + config/6K Compumotor";
pub const GAS_PRESSURE_SUMMARY: &str = "MSI/Gas pressure/Gas pressure summary";
pub const MAGNETIC_FIELD_SUMMARY: &str = "MSI/Magnetic field/Magnetic field summary";
pub const DISCHARGE_SUMMARY: &str = "MSI/Discharge/Discharge summary";

/// One row of an SIS crate channel header. Other header fields are not read.
#[derive(H5Type, Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct ChannelHeader {
    #[hdf5(rename = "Scale")]
    pub scale: f64,
    #[hdf5(rename = "Offset")]
    pub offset: f64,
}

/// One row of a 6K Compumotor motion list
#[derive(H5Type, Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct MotionEntry {
    #[hdf5(rename = "Shot number")]
    pub shot_number: u32,
    pub x: f64,
    pub y: f64,
}

#[derive(H5Type, Debug, Clone, Copy)]
#[repr(C)]
struct GasPressureEntry {
    #[hdf5(rename = "Fill pressure")]
    fill_pressure: f64,
}

#[derive(H5Type, Debug, Clone, Copy)]
#[repr(C)]
struct MagneticFieldEntry {
    #[hdf5(rename = "Peak magnetic field")]
    peak_field: f64,
}

#[derive(H5Type, Debug, Clone, Copy)]
#[repr(C)]
struct DischargeEntry {
    #[hdf5(rename = "Peak current")]
    peak_current: f64,
}

/// Probe positions and shot numbers in recording order
#[derive(Debug, Clone, PartialEq)]
pub struct MotionList {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub shot_numbers: Vec<u32>,
}

/// Read-only handle on a raw LAPD HDF5 file
#[derive(Debug)]
pub struct LapdFile {
    file_handle: File,
    path: PathBuf,
}

impl LapdFile {
    pub fn open(path: &Path) -> Result<Self, LapdFileError> {
        if !path.exists() {
            return Err(LapdFileError::BadFilePath(path.to_path_buf()));
        }
        let size_bytes = path.metadata()?.len();
        let file_handle = File::open(path)?;
        spdlog::info!(
            "Opened LAPD file {} ({})",
            path.to_string_lossy(),
            human_bytes::human_bytes(size_bytes as f64)
        );
        Ok(Self {
            file_handle,
            path: path.to_path_buf(),
        })
    }

    /// The run name is the file name without its extension
    pub fn run_name(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Full paths of every dataset under group, at any depth, sorted
    pub fn list_datasets(&self, group: &str) -> Result<Vec<String>, LapdFileError> {
        let mut paths = Vec::new();
        collect_datasets(&self.file_handle.group(group)?, &mut paths)?;
        paths.sort();
        Ok(paths)
    }

    /// Read a digitizer channel and its calibration header
    pub fn read_channel(
        &self,
        data_path: &str,
        header_path: &str,
    ) -> Result<(RawChannelRecord, CalibrationRecord), LapdFileError> {
        let data = self.file_handle.dataset(data_path)?.read_dyn::<f64>()?;
        let header = self.file_handle.dataset(header_path)?;
        let shape = header.shape();
        let rows = header.read_raw::<ChannelHeader>()?;
        let scale = ArrayD::from_shape_vec(
            IxDyn(&shape),
            rows.iter().map(|row| row.scale).collect(),
        )
        .map_err(|e| hdf5::Error::from(e.to_string()))?;
        let offset = ArrayD::from_shape_vec(
            IxDyn(&shape),
            rows.iter().map(|row| row.offset).collect(),
        )
        .map_err(|e| hdf5::Error::from(e.to_string()))?;
        Ok((RawChannelRecord { data }, CalibrationRecord { scale, offset }))
    }

    /// Read the channel of one Mach probe face.
    ///
    /// The SIS crate listing holds each face's data at `listing_offset + 2 * (face - 1)`
    /// with its header directly after it.
    pub fn read_face(
        &self,
        listing_offset: usize,
        face: u8,
    ) -> Result<(RawChannelRecord, CalibrationRecord), LapdFileError> {
        let listing = self.list_datasets(SIS_CRATE_GROUP)?;
        let index = listing_offset + 2 * (face.max(1) as usize - 1);
        if index + 1 >= listing.len() {
            return Err(LapdFileError::MissingListing {
                group: SIS_CRATE_GROUP.to_string(),
                index: index + 1,
                found: listing.len(),
            });
        }
        spdlog::info!("Reading face {} from {}", face, listing[index]);
        self.read_channel(&listing[index], &listing[index + 1])
    }

    /// Read the motion list at the given position of the 6K Compumotor listing
    pub fn read_motion_list(&self, index: usize) -> Result<MotionList, LapdFileError> {
        let listing = self.list_datasets(MOTION_GROUP)?;
        let path = listing.get(index).ok_or(LapdFileError::MissingListing {
            group: MOTION_GROUP.to_string(),
            index,
            found: listing.len(),
        })?;
        let entries = self.file_handle.dataset(path)?.read_raw::<MotionEntry>()?;
        Ok(MotionList {
            x: entries.iter().map(|e| e.x).collect(),
            y: entries.iter().map(|e| e.y).collect(),
            shot_numbers: entries.iter().map(|e| e.shot_number).collect(),
        })
    }

    /// Shot-averaged machine state from the MSI summaries. Missing summaries are skipped.
    pub fn read_experimental_params(&self) -> Result<Metadata, LapdFileError> {
        let mut metadata = Metadata::new();
        if let Some(values) = self.read_summary::<GasPressureEntry>(GAS_PRESSURE_SUMMARY)? {
            let mean = nan_mean(values.iter().map(|v| v.fill_pressure));
            metadata.insert(MetadataKey::FillPressure, MetadataValue::Number(mean));
        }
        if let Some(values) = self.read_summary::<MagneticFieldEntry>(MAGNETIC_FIELD_SUMMARY)? {
            let mean = nan_mean(values.iter().map(|v| v.peak_field));
            metadata.insert(MetadataKey::PeakField, MetadataValue::Number(mean));
        }
        if let Some(values) = self.read_summary::<DischargeEntry>(DISCHARGE_SUMMARY)? {
            let mean = nan_mean(values.iter().map(|v| v.peak_current));
            metadata.insert(MetadataKey::Discharge, MetadataValue::Number(mean));
        }
        Ok(metadata)
    }

    fn read_summary<T: H5Type>(&self, path: &str) -> Result<Option<Vec<T>>, LapdFileError> {
        if !link_exists(&self.file_handle, path) {
            spdlog::warn!("LAPD file {} has no {} dataset", self.run_name(), path);
            return Ok(None);
        }
        Ok(Some(self.file_handle.dataset(path)?.read_raw::<T>()?))
    }
}

fn collect_datasets(group: &Group, paths: &mut Vec<String>) -> Result<(), LapdFileError> {
    for dataset in group.datasets()? {
        paths.push(dataset.name());
    }
    for subgroup in group.groups()? {
        collect_datasets(&subgroup, paths)?;
    }
    Ok(())
}

/// Check every level of path so a missing intermediate group reads as absent
fn link_exists(group: &Group, path: &str) -> bool {
    let mut prefix = String::new();
    for part in path.split('/').filter(|p| !p.is_empty()) {
        if !prefix.is_empty() {
            prefix.push('/');
        }
        prefix.push_str(part);
        if !group.link_exists(&prefix) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn write_fixture(path: &Path) {
        let file = File::create(path).unwrap();
        let raw_group = file.create_group("Raw data + config").unwrap();
        let sis = raw_group.create_group("SIS crate").unwrap();
        // Two filler channels so face data starts at listing index 2
        for name in ["A filler", "A filler headers"] {
            sis.new_dataset_builder()
                .with_data(&[0i16; 3])
                .create(name)
                .unwrap();
        }
        for face in 1..=2 {
            let raw = Array2::from_shape_fn((3, 4), |(shot, t)| (face * 100 + shot * 10 + t) as i16);
            sis.new_dataset_builder()
                .with_data(&raw)
                .create(format!("Face {face}").as_str())
                .unwrap();
            let headers: Vec<ChannelHeader> = (0..3)
                .map(|shot| ChannelHeader {
                    scale: 0.5,
                    offset: shot as f64,
                })
                .collect();
            sis.new_dataset_builder()
                .with_data(&headers)
                .create(format!("Face {face} headers").as_str())
                .unwrap();
        }

        let motion = raw_group.create_group("6K Compumotor").unwrap();
        for name in ["Motion list a", "Motion list b"] {
            motion
                .new_dataset_builder()
                .with_data(&[0u8])
                .create(name)
                .unwrap();
        }
        let entries: Vec<MotionEntry> = [(2, 1.0, 0.0), (1, 0.0, 0.0), (3, 1.0, 0.0)]
            .iter()
            .map(|(shot_number, x, y)| MotionEntry {
                shot_number: *shot_number,
                x: *x,
                y: *y,
            })
            .collect();
        motion
            .new_dataset_builder()
            .with_data(&entries)
            .create("Motion list c")
            .unwrap();

        let fill: Vec<GasPressureEntry> = [0.25, 0.75]
            .iter()
            .map(|p| GasPressureEntry { fill_pressure: *p })
            .collect();
        file.create_group("MSI")
            .unwrap()
            .create_group("Gas pressure")
            .unwrap()
            .new_dataset_builder()
            .with_data(&fill)
            .create("Gas pressure summary")
            .unwrap();
    }

    #[test]
    fn test_read_lapd_file() {
        let path = std::env::temp_dir().join("lapd_mach_test_03_run.hdf5");
        write_fixture(&path);
        let lapd = LapdFile::open(&path).unwrap();
        assert_eq!(lapd.run_name(), "lapd_mach_test_03_run");

        let listing = lapd.list_datasets(SIS_CRATE_GROUP).unwrap();
        assert_eq!(listing.len(), 6);

        let (raw, calibration) = lapd.read_face(2, 2).unwrap();
        assert_eq!(raw.data.shape(), &[3, 4]);
        assert_eq!(raw.data[[1, 3]], 213.0);
        assert_eq!(calibration.offset.as_slice().unwrap(), &[0.0, 1.0, 2.0]);
        let decoded = raw.decode(&calibration).unwrap();
        assert_eq!(decoded[[1, 3]], 213.0 * 0.5 + 1.0);
        assert!(matches!(
            lapd.read_face(2, 3),
            Err(LapdFileError::MissingListing { .. })
        ));

        let motion = lapd.read_motion_list(2).unwrap();
        assert_eq!(motion.shot_numbers, vec![2, 1, 3]);
        assert_eq!(motion.x, vec![1.0, 0.0, 1.0]);

        let params = lapd.read_experimental_params().unwrap();
        assert_eq!(
            params.get(&MetadataKey::FillPressure),
            Some(&MetadataValue::Number(0.5))
        );
        assert_eq!(params.get(&MetadataKey::PeakField), None);

        drop(lapd);
        std::fs::remove_file(&path).unwrap();
    }
}
