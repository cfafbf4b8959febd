use std::collections::BTreeMap;
use std::path::Path;
use std::sync::mpsc::Sender;

use super::assembler::{assemble, remove_dc_offset, to_current, ProbeRecording};
use super::collection::VelocityResultCollection;
use super::config::Config;
use super::error::{ProcessorError, ReductionError};
use super::hdf_writer::{read_labeled, HDFWriter};
use super::labeled::LabeledArray;
use super::lapd_file::LapdFile;
use super::lookup::{AxialLookup, IonMassLookup, IonTable, LapdPorts};
use super::metadata::{Metadata, MetadataKey, MetadataValue};
use super::position::{categorize, shot_order, PositionIndex};
use super::steady_state::{select_fixed, SteadyStateWindow, WindowSource};
use super::velocity::reduce_aligned;
use super::worker_status::{Stage, WorkerStatus};

const DENSITY_NAME: &str = "n_e";
const TEMPERATURE_NAME: &str = "T_e";

/// Everything needed from a raw LAPD file, read in one pass
#[derive(Debug, Clone)]
pub struct RawRun {
    pub run_name: String,
    pub probes: Vec<ProbeRecording>,
    pub index: PositionIndex,
    pub experiment: Metadata,
}

/// Read and decode every configured probe face, the motion list and the MSI summaries.
///
/// The file handle is dropped before returning.
pub fn read_raw_run(config: &Config, path: &Path) -> Result<RawRun, ProcessorError> {
    let lapd = LapdFile::open(path)?;
    let mut probes = Vec::with_capacity(config.probes.len());
    for probe in config.probes.iter() {
        let mut faces = BTreeMap::new();
        for face in probe.faces.iter() {
            let (raw, calibration) = lapd.read_face(probe.listing_offset, face.face)?;
            faces.insert(face.face, raw.decode(&calibration)?);
        }
        probes.push(ProbeRecording {
            port: probe.port,
            faces,
        });
    }
    let motion = lapd.read_motion_list(config.motion_list_index)?;
    let order = shot_order(&motion.shot_numbers);
    let index = categorize(&motion.x, &motion.y, &order)?;
    let experiment = lapd.read_experimental_params()?;
    Ok(RawRun {
        run_name: lapd.run_name(),
        probes,
        index,
        experiment,
    })
}

/// Steady-state electron temperature over {port, x, y}
pub fn electron_temperature_profile(
    temperature: &LabeledArray,
    window: &SteadyStateWindow,
) -> Result<LabeledArray, ProcessorError> {
    let averaged = if temperature.has_dim("time") {
        select_fixed(temperature, window, true)?
    } else {
        temperature.clone()
    };
    let extra: Vec<String> = averaged
        .dims()
        .into_iter()
        .filter(|d| !matches!(*d, "port" | "x" | "y"))
        .map(String::from)
        .collect();
    let extra: Vec<&str> = extra.iter().map(String::as_str).collect();
    Ok(averaged.mean_over(&extra)?)
}

/// Run the full reduction on one raw file.
///
/// Returns None when the run has no matching Langmuir file.
pub fn process_file(
    config: &Config,
    path: &Path,
    axial: &dyn AxialLookup,
    ions: &dyn IonMassLookup,
    tx: &Sender<WorkerStatus>,
    file_index: usize,
) -> Result<Option<VelocityResultCollection>, ProcessorError> {
    let run_name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let Some(langmuir_path) = config.get_langmuir_file(&run_name) else {
        spdlog::warn!(
            "No Langmuir dataset for run {} in {}, skipping...",
            run_name,
            config.langmuir_path.to_string_lossy()
        );
        return Ok(None);
    };
    let ion_mass = ions
        .ion_mass(&config.ion)
        .ok_or_else(|| ReductionError::UnknownSpecies(config.ion.clone()))?;

    tx.send(WorkerStatus::new(0.0, &run_name, file_index, Stage::Reading))?;
    let density = read_labeled(&langmuir_path, &config.langmuir_group, DENSITY_NAME)?;
    let temperature = read_labeled(&langmuir_path, &config.langmuir_group, TEMPERATURE_NAME)?;
    let window = match config.steady_state_ms {
        Some(window) => WindowSource::Fixed(window),
        None => WindowSource::Auto {
            density: &density,
            core_radius: config.core_radius_cm,
        },
    }
    .resolve()?;
    let temperature = electron_temperature_profile(&temperature, &window)?;

    let raw = read_raw_run(config, path)?;
    tx.send(WorkerStatus::new(0.5, &run_name, file_index, Stage::Reducing))?;

    let current = assemble(&raw.probes, &raw.index, config.sample_interval_ms, axial)?;
    let current = to_current(current, &config.resistances())?;
    let current = remove_dc_offset(
        &current,
        config.dc_offset_samples,
        config.dc_offset_quantile,
    )?;
    let mut collection = reduce_aligned(&current, &temperature, ion_mass, config.port_tolerance)?
        .renamed(&raw.run_name);
    collection.attach_metadata(
        MetadataKey::RunName,
        MetadataValue::Text(raw.run_name.clone()),
    );
    collection.attach_metadata(
        MetadataKey::SteadyStateTimes,
        MetadataValue::Interval(window.start_ms, window.end_ms),
    );
    collection.extend_metadata(&raw.experiment);

    if config.save_results {
        tx.send(WorkerStatus::new(0.9, &run_name, file_index, Stage::Writing))?;
        let mut writer = HDFWriter::open(&config.get_output_file()?)?;
        writer.write_collection(&collection)?;
        writer.write_run_info(&collection)?;
        writer.close()?;
    }
    tx.send(WorkerStatus::new(1.0, &run_name, file_index, Stage::Done))?;
    Ok(Some(collection))
}

/// The function to be called by a separate thread (typically the CLI).
/// Processes every raw file the config points at, in order
pub fn process(config: Config, tx: Sender<WorkerStatus>) -> Result<(), ProcessorError> {
    let axial = LapdPorts::default();
    let ions = IonTable::default();
    let files = config.get_raw_files()?;
    spdlog::info!("Found {} raw file(s) to process", files.len());
    let mut skipped = 0;
    for (file_index, path) in files.iter().enumerate() {
        spdlog::info!("Processing {}...", path.to_string_lossy());
        match process_file(&config, path, &axial, &ions, &tx, file_index)? {
            Some(collection) => spdlog::info!(
                "Finished {} with fields {:?}",
                collection.name(),
                collection.field_names()
            ),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        spdlog::warn!("{} of {} file(s) were skipped", skipped, files.len());
    }
    Ok(())
}
