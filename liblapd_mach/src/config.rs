use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::error::ConfigError;
use super::steady_state::SteadyStateWindow;
use super::velocity::PORT_TOLERANCE;

const RAW_EXTENSIONS: [&str; 2] = ["hdf5", "h5"];

/// Wiring of one probe face: its number and the shunt resistance it is read across
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceConfig {
    pub face: u8,
    pub resistance: f64,
}

/// One Mach probe: the port it is mounted in and where its faces sit in the SIS crate listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub port: u32,
    pub listing_offset: usize,
    pub faces: Vec<FaceConfig>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            port: 27,
            listing_offset: 12,
            faces: vec![
                FaceConfig {
                    face: 2,
                    resistance: 14.9,
                },
                FaceConfig {
                    face: 5,
                    resistance: 15.0,
                },
            ],
        }
    }
}

/// Reduction settings: where the raw, Langmuir and result files live, and how the probes are wired.
/// Read from and written to YAML with serde_yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub hdf_path: PathBuf,
    pub langmuir_path: PathBuf,
    pub langmuir_group: String,
    pub output_path: PathBuf,
    pub save_results: bool,
    pub ion: String,
    pub core_radius_cm: f64,
    pub steady_state_ms: Option<SteadyStateWindow>,
    pub sample_interval_ms: f64,
    pub dc_offset_samples: usize,
    pub dc_offset_quantile: f64,
    pub port_tolerance: f64,
    pub motion_list_index: usize,
    pub probes: Vec<ProbeConfig>,
}

impl Default for Config {
    /// Generate a new Config object. Paths will be empty/invalid
    fn default() -> Self {
        Self {
            hdf_path: PathBuf::from("None"),
            langmuir_path: PathBuf::from("None"),
            langmuir_group: String::from("/"),
            output_path: PathBuf::from("None"),
            save_results: true,
            ion: String::from("He-4+"),
            core_radius_cm: 26.0,
            steady_state_ms: None,
            sample_interval_ms: 1.0e-5,
            dc_offset_samples: 2000,
            dc_offset_quantile: 0.25,
            port_tolerance: PORT_TOLERANCE,
            motion_list_index: 2,
            probes: vec![ProbeConfig::default()],
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Write the configuration to a YAML file
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        std::fs::write(config_path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// The raw LAPD files to process. `hdf_path` is either one file or a directory of them
    pub fn get_raw_files(&self) -> Result<Vec<PathBuf>, ConfigError> {
        if !self.hdf_path.exists() {
            return Err(ConfigError::BadFilePath(self.hdf_path.clone()));
        }
        if self.hdf_path.is_file() {
            return Ok(vec![self.hdf_path.clone()]);
        }
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.hdf_path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .map(|ext| RAW_EXTENSIONS.contains(&ext.to_string_lossy().as_ref()))
                        .unwrap_or(false)
            })
            .collect();
        files.sort();
        Ok(files)
    }

    /// Path of the Langmuir result file matching a run, if it exists
    pub fn get_langmuir_file(&self, run_name: &str) -> Option<PathBuf> {
        let path = self.langmuir_path.join(format!("{run_name}.h5"));
        if path.exists() {
            Some(path)
        } else {
            None
        }
    }

    /// Get the path to the output hdf5 file, checking that its directory exists
    pub fn get_output_file(&self) -> Result<PathBuf, ConfigError> {
        let parent = self
            .output_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        if parent.exists() {
            Ok(self.output_path.clone())
        } else {
            Err(ConfigError::BadFilePath(parent.to_path_buf()))
        }
    }

    /// Shunt resistances as port -> face -> resistance
    pub fn resistances(&self) -> BTreeMap<u32, BTreeMap<u8, f64>> {
        self.probes
            .iter()
            .map(|probe| {
                (
                    probe.port,
                    probe
                        .faces
                        .iter()
                        .map(|face| (face.face, face.resistance))
                        .collect(),
                )
            })
            .collect()
    }
}
