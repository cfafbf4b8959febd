//! # liblapd_mach
//!
//! liblapd_mach reduces Mach probe recordings from the Large Plasma Device (LAPD) to
//! ion flow velocities, written in Rust. It reads the per-face ion saturation signals
//! of one or more six-faced Mach probes from a raw LAPD HDF5 file, lays them out over
//! {port, face, x, y, shot, time}, and turns opposing-face current ratios into parallel
//! and perpendicular Mach numbers and velocities in cm/s. Electron temperatures (and
//! the density used to find the steady-state window) come from a matching Langmuir
//! probe result file.
//!
//! ## HDF5
//!
//! HDF5 must be installed. Typically this will be installed using a package manager
//! (homebrew, apt, etc), and the Rust libraries will auto detect the location of the HDF
//! install. If it lives in a custom location, write the following snippet into the file
//! `.cargo/config.toml` in the repository:
//!
//! ```toml
//! [env]
//! HDF5_DIR="/path/to/my/hdf5/install/"
//!
//! [build]
//! rustflags="-C link-args=-Wl,-rpath,/path/to/my/hdf5/install/lib"
//! ```
//!
//! ## Configuration
//!
//! A configuration is a YAML file; `lapd_mach_cli new -p config.yml` writes a template:
//!
//! ```yml
//! hdf_path: None
//! langmuir_path: None
//! langmuir_group: /
//! output_path: None
//! save_results: true
//! ion: He-4+
//! core_radius_cm: 26.0
//! steady_state_ms: null
//! sample_interval_ms: 1.0e-5
//! dc_offset_samples: 2000
//! dc_offset_quantile: 0.25
//! port_tolerance: 5.0
//! motion_list_index: 2
//! probes:
//! - port: 27
//!   listing_offset: 12
//!   faces:
//!   - face: 2
//!     resistance: 14.9
//!   - face: 5
//!     resistance: 15.0
//! ```
//!
//! - `hdf_path`: a raw LAPD file, or a directory of them (`.hdf5`/`.h5`)
//! - `langmuir_path`: directory holding `<run name>.h5` Langmuir results with `n_e` and `T_e`
//! - `steady_state_ms`: fixed `{start_ms, end_ms}` window; when `null` it is detected from
//! the density within `core_radius_cm` of the machine axis
//! - `probes`: per probe, its port, the SIS crate listing index of its face 1 channel, and
//! the shunt resistance of every recorded face
//!
//! ## Output
//!
//! ```text
//! results.h5
//! <run name> - version, variables, Run name, Steady state times, Fill pressure, Peak field, Discharge
//! |---- coords
//! |    |---- port, x, y, shot, time(dset) - units
//! |---- aux_coords
//! |    |---- z(dset) - dim, units
//! |---- Parallel Mach number(dset) - dims
//! |---- Perpendicular Mach number(dset) - dims
//! |---- Perpendicular Mach number (fore)(dset) - dims
//! |---- Perpendicular Mach number (aft)(dset) - dims
//! |---- Parallel velocity(dset) - dims, units
//! |---- Perpendicular velocity(dset) - dims, units
//! ```
//!
//! The perpendicular fields are present only when faces 1, 3, 4 and 6 were recorded.
pub mod assembler;
pub mod collection;
pub mod config;
pub mod decompress;
pub mod error;
pub mod hdf_writer;
pub mod labeled;
pub mod lapd_file;
pub mod lookup;
pub mod metadata;
pub mod position;
pub mod process;
pub mod profile;
pub mod steady_state;
pub mod velocity;
pub mod worker_status;
