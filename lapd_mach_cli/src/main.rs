//! # lapd_mach_cli
//!
//! Part of the lapd_mach crate family.
//!
//! Command line application reducing LAPD Mach probe data to flow velocities.
//!
//! ## Use
//!
//! ```bash
//! lapd_mach_cli new -p config.yml     # write a template configuration
//! lapd_mach_cli -p config.yml         # reduce every raw file the configuration points at
//! lapd_mach_cli profile -p results.h5 # print steady-state linear profiles of saved results
//! ```
use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use liblapd_mach::config::Config;
use liblapd_mach::error::{ProcessorError, ProfileError};
use liblapd_mach::hdf_writer::{list_collections, read_collection};
use liblapd_mach::process::process;
use liblapd_mach::profile::{linear_profile, spatial_dimensions};
use liblapd_mach::steady_state::SteadyStateWindow;

fn make_template_config(path: &Path) {
    match Config::default().write_config_file(path) {
        Ok(()) => log::info!("Done."),
        Err(e) => log::error!("Could not write template config: {e}"),
    }
}

/// Print the steady-state linear profile of every field of every saved run
fn print_profiles(results_path: &Path) -> Result<(), ProcessorError> {
    for name in list_collections(results_path)? {
        let collection = read_collection(results_path, &name)?;
        let Some((start, end)) = collection.metadata().steady_state_times() else {
            log::warn!("Run {name} has no steady state times, skipping...");
            continue;
        };
        let window = SteadyStateWindow::new(start, end)?;
        log::info!("Run {name}: steady state {start} ms to {end} ms");
        for (key, value) in collection.metadata().iter() {
            log::info!("  {key}: {value}");
        }
        let ports = collection
            .fields()
            .first()
            .and_then(|f| f.coord("port").ok())
            .map(|c| c.values.clone())
            .unwrap_or_default();
        for port in ports {
            let selected = collection.select_port(port)?;
            for field in selected.fields() {
                let averaged = field.mean("shot")?;
                let dims = spatial_dimensions(&averaged).map_err(ProfileError::from)?;
                if dims.len() != 1 {
                    log::warn!(
                        "{} (port {port}) is not a linear sweep ({} spatial dimensions), skipping...",
                        field.name(),
                        dims.len()
                    );
                    continue;
                }
                let (dim, profile) = linear_profile(&averaged, &window)?;
                let positions = &profile.coord(dim.name())?.values;
                let units = profile.units().unwrap_or("");
                log::info!("  {} (port {port}) along {dim}:", field.name());
                for (position, value) in positions.iter().zip(profile.data().iter()) {
                    log::info!("    {dim} = {position:>6.1} cm: {value:.4} {units}");
                }
            }
        }
    }
    Ok(())
}

fn main() {
    // Create a cli
    let matches = Command::new("lapd_mach_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .subcommand(
            Command::new("profile").about("Print steady-state linear profiles from a result file"),
        )
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .global(true)
                .help("Path to the file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    LogWrapper::new(pb_manager.clone(), logger)
        .try_init()
        .expect("Could not create logging/progress!");

    // Library messages go to a log file
    let file_sink = Arc::new(
        spdlog::sink::FileSink::builder()
            .path(PathBuf::from("./lapd_mach.log"))
            .formatter(spdlog::formatter::PatternFormatter::new(
                spdlog::formatter::pattern!(
                    "[{date_short} {time_short}] - [thread: {tid}] - [{^{level}}] - {payload}{eol}"
                ),
            ))
            .truncate(true)
            .build()
            .expect("Could not create log file!"),
    );
    let file_logger = Arc::new(
        spdlog::Logger::builder()
            .flush_level_filter(spdlog::LevelFilter::All)
            .sink(file_sink)
            .build()
            .expect("Could not create file logger!"),
    );
    spdlog::set_default_logger(file_logger);

    // Parse the cli
    let Some(path) = matches.get_one::<String>("path").map(PathBuf::from) else {
        log::error!("A path is required; pass one with -p");
        return;
    };

    match matches.subcommand() {
        Some(("new", _)) => {
            log::info!("Making a template config at {}...", path.to_string_lossy());
            make_template_config(&path);
            return;
        }
        Some(("profile", _)) => {
            log::info!("Reading results from {}...", path.to_string_lossy());
            if let Err(e) = print_profiles(&path) {
                log::error!("Profiling failed with error: {e}");
            }
            return;
        }
        _ => (),
    }

    // Load our config
    log::info!("Loading config from {}...", path.to_string_lossy());
    let config = match Config::read_config_file(&path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    log::info!("Config successfully loaded.");
    log::info!("Raw HDF5 Path: {}", config.hdf_path.to_string_lossy());
    log::info!("Langmuir Path: {}", config.langmuir_path.to_string_lossy());
    log::info!("Output Path: {}", config.output_path.to_string_lossy());
    log::info!("Ion: {}", config.ion);
    match &config.steady_state_ms {
        Some(window) => log::info!(
            "Steady state: {} ms to {} ms",
            window.start_ms,
            window.end_ms
        ),
        None => log::info!(
            "Steady state: detected from density within {} cm of the axis",
            config.core_radius_cm
        ),
    }
    for probe in config.probes.iter() {
        log::info!(
            "Probe at port {} with faces {:?}",
            probe.port,
            probe.faces.iter().map(|f| f.face).collect::<Vec<u8>>()
        );
    }

    // Setup the progress bar
    let pb = pb_manager.add(ProgressBar::new(100));
    if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {percent}% {msg}") {
        pb.set_style(style);
    }
    let (tx, rx) = channel();
    // Spawn the task!
    let handle = std::thread::spawn(move || process(config, tx));

    loop {
        match rx.recv_timeout(Duration::from_secs(1)) {
            Ok(status) => {
                pb.set_position((status.progress * 100.0) as u64);
                pb.set_message(format!(
                    "file {}: {} ({})",
                    status.file_index + 1,
                    status.run_name,
                    status.stage.message()
                ));
            }
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if handle.is_finished() {
            break;
        }
    }

    match handle.join() {
        Ok(result) => match result {
            Ok(_) => log::info!("Successfully reduced data!"),
            Err(e) => log::error!("Reduction failed with error: {e}"),
        },
        Err(_) => log::error!("Failed to join reduction task!"),
    }

    pb.finish();

    log::info!("Done.");
}
