use hdf5::types::{TypeDescriptor, VarLenUnicode};
use hdf5::{File, Group};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::collection::VelocityResultCollection;
use super::error::HDF5WriterError;
use super::labeled::{AuxCoordinate, Coordinate, LabeledArray};
use super::metadata::{Metadata, MetadataKey, MetadataValue};

const COORDS_NAME: &str = "coords";
const AUX_COORDS_NAME: &str = "aux_coords";
const VERSION_ATTR: &str = "version";
const VARIABLES_ATTR: &str = "variables";
const DIMS_ATTR: &str = "dims";
const DIM_ATTR: &str = "dim";
const UNITS_ATTR: &str = "units";
const DIM_SEPARATOR: char = ',';
const VARIABLE_SEPARATOR: char = ';';
/// This is the version of the output format
const FORMAT_VERSION: &str = "1.0";

/// A simple struct which wraps around the hdf5-rust library.
///
/// Opens an HDF5 file for writing result collections, appending to the file
/// if it already exists.
#[derive(Debug)]
pub struct HDFWriter {
    file_handle: File,
    path: PathBuf,
    written: Vec<String>,
}
// Structure
// <collection> - version, variables, <metadata label>...
// |---- coords
// |    |---- <dim>(dset) - units
// |---- aux_coords
// |    |---- <name>(dset) - dim, units
// |---- <variable>(dset) - dims, units

fn to_unicode(value: &str) -> Result<VarLenUnicode, HDF5WriterError> {
    Ok(VarLenUnicode::from_str(value)?)
}

fn write_string_attr(
    location: &hdf5::Location,
    name: &str,
    value: &str,
) -> Result<(), HDF5WriterError> {
    location
        .new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&to_unicode(value)?)?;
    Ok(())
}

fn read_string_attr(location: &hdf5::Location, name: &str) -> Option<String> {
    match location.attr(name) {
        Ok(attr) => attr
            .read_scalar::<VarLenUnicode>()
            .ok()
            .map(|v| v.to_string()),
        Err(_) => None,
    }
}

impl HDFWriter {
    /// Open the file at path for appending, or create it
    pub fn open(path: &Path) -> Result<Self, HDF5WriterError> {
        let file_handle = if path.exists() {
            spdlog::info!("Appending results to {}", path.to_string_lossy());
            File::append(path)?
        } else {
            spdlog::info!("Creating result file {}", path.to_string_lossy());
            File::create(path)?
        };
        Ok(Self {
            file_handle,
            path: path.to_path_buf(),
            written: Vec::new(),
        })
    }

    /// Create the group for a collection, replacing any group already at that path
    fn fresh_group(&self, name: &str) -> Result<Group, HDF5WriterError> {
        if self.file_handle.link_exists(name) {
            spdlog::warn!(
                "Replacing existing group {} in {}",
                name,
                self.path.to_string_lossy()
            );
            self.file_handle.unlink(name)?;
        }
        let group = self.file_handle.create_group(name)?;
        group.create_group(COORDS_NAME)?;
        group.create_group(AUX_COORDS_NAME)?;
        let version = format!("{}:{}", env!("CARGO_PKG_NAME"), FORMAT_VERSION);
        write_string_attr(&group, VERSION_ATTR, &version)?;
        Ok(group)
    }

    /// Write every field and the metadata of a collection under a group named for it
    pub fn write_collection(
        &mut self,
        collection: &VelocityResultCollection,
    ) -> Result<(), HDF5WriterError> {
        self.write_fields(collection.name(), collection.fields())?;
        write_metadata(&self.file_handle.group(collection.name())?, collection.metadata())?;
        Ok(())
    }

    /// Write labeled arrays sharing coordinates as the variables of one group
    pub fn write_fields(&mut self, group: &str, fields: &[LabeledArray]) -> Result<(), HDF5WriterError> {
        let group_handle = self.fresh_group(group)?;
        for field in fields {
            write_variable(&group_handle, field)?;
        }
        let names: Vec<&str> = fields.iter().map(|f| f.name()).collect();
        write_string_attr(
            &group_handle,
            VARIABLES_ATTR,
            &names.join(&VARIABLE_SEPARATOR.to_string()),
        )?;
        self.written.push(group.to_string());
        Ok(())
    }

    /// Write the metadata of a collection in a YAML file next to the result file
    pub fn write_run_info(
        &self,
        collection: &VelocityResultCollection,
    ) -> Result<PathBuf, HDF5WriterError> {
        let parent = self.path.parent().unwrap_or(Path::new("."));
        let info_path = parent.join(format!("{}.yml", collection.name()));
        let info: BTreeMap<String, String> = collection
            .metadata()
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        let mut info_file = std::fs::File::create(&info_path)?;
        info_file.write_all(serde_yaml::to_string(&info)?.as_bytes())?;
        Ok(info_path)
    }

    /// Flush and close the file, consuming the writer
    pub fn close(self) -> Result<(), HDF5WriterError> {
        self.file_handle.flush()?;
        spdlog::info!(
            "{} group(s) written to {}: {:?}",
            self.written.len(),
            self.path.to_string_lossy(),
            self.written
        );
        Ok(())
    }
}

fn write_variable(group: &Group, field: &LabeledArray) -> Result<(), HDF5WriterError> {
    let coords = group.group(COORDS_NAME)?;
    for coord in field.coords() {
        if coords.link_exists(&coord.dim) {
            continue;
        }
        let dset = coords
            .new_dataset_builder()
            .with_data(&coord.values)
            .create(coord.dim.as_str())?;
        if let Some(units) = &coord.units {
            write_string_attr(&dset, UNITS_ATTR, units)?;
        }
    }
    let aux_coords = group.group(AUX_COORDS_NAME)?;
    for aux in field.aux_coords() {
        if aux_coords.link_exists(&aux.name) {
            continue;
        }
        let dset = aux_coords
            .new_dataset_builder()
            .with_data(&aux.values)
            .create(aux.name.as_str())?;
        write_string_attr(&dset, DIM_ATTR, &aux.dim)?;
        if let Some(units) = &aux.units {
            write_string_attr(&dset, UNITS_ATTR, units)?;
        }
    }

    let dset = group
        .new_dataset_builder()
        .with_data(field.data())
        .create(field.name())?;
    write_string_attr(
        &dset,
        DIMS_ATTR,
        &field.dims().join(&DIM_SEPARATOR.to_string()),
    )?;
    if let Some(units) = field.units() {
        write_string_attr(&dset, UNITS_ATTR, units)?;
    }
    Ok(())
}

fn write_metadata(group: &Group, metadata: &Metadata) -> Result<(), HDF5WriterError> {
    for (key, value) in metadata.iter() {
        let label = key.label();
        match value {
            MetadataValue::Text(text) => write_string_attr(group, label, text)?,
            MetadataValue::Number(number) => {
                group
                    .new_attr::<f64>()
                    .create(label)?
                    .write_scalar(number)?;
            }
            MetadataValue::Interval(start, end) => {
                group
                    .new_attr_builder()
                    .with_data(&[*start, *end])
                    .create(label)?;
            }
        }
    }
    Ok(())
}

fn read_metadata(group: &Group) -> Result<Metadata, HDF5WriterError> {
    let mut metadata = Metadata::new();
    for name in group.attr_names()? {
        if name == VERSION_ATTR || name == VARIABLES_ATTR {
            continue;
        }
        let attr = group.attr(&name)?;
        let value = match attr.dtype()?.to_descriptor()? {
            TypeDescriptor::VarLenUnicode | TypeDescriptor::VarLenAscii => {
                MetadataValue::Text(attr.read_scalar::<VarLenUnicode>()?.to_string())
            }
            TypeDescriptor::Float(_) if attr.ndim() == 0 => {
                MetadataValue::Number(attr.read_scalar::<f64>()?)
            }
            TypeDescriptor::Float(_) => match attr.read_raw::<f64>()?.as_slice() {
                [start, end] => MetadataValue::Interval(*start, *end),
                _ => {
                    spdlog::warn!("Skipping metadata attribute {} with unexpected shape", name);
                    continue;
                }
            },
            _ => {
                spdlog::warn!("Skipping metadata attribute {} with unsupported type", name);
                continue;
            }
        };
        metadata.insert(MetadataKey::from_label(&name), value);
    }
    Ok(metadata)
}

fn read_variable(group: &Group, variable: &str) -> Result<LabeledArray, HDF5WriterError> {
    let dset = group.dataset(variable)?;
    let dims = read_string_attr(&dset, DIMS_ATTR)
        .ok_or_else(|| HDF5WriterError::MissingDims(variable.to_string()))?;
    let dims: Vec<&str> = dims.split(DIM_SEPARATOR).filter(|d| !d.is_empty()).collect();
    let data = dset.read_dyn::<f64>()?;

    let coords_group = group.group(COORDS_NAME).ok();
    let mut coords = Vec::with_capacity(dims.len());
    for (axis, dim) in dims.iter().enumerate() {
        let stored = coords_group
            .as_ref()
            .and_then(|g| g.dataset(dim).ok());
        let coord = match stored {
            Some(coord_dset) => {
                let coord = Coordinate::new(dim, coord_dset.read_raw::<f64>()?);
                match read_string_attr(&coord_dset, UNITS_ATTR) {
                    Some(units) => coord.with_units(&units),
                    None => coord,
                }
            }
            None => {
                let len = data.shape().get(axis).copied().unwrap_or(0);
                spdlog::warn!(
                    "Variable {} has no coordinate for {}; using sample indices",
                    variable,
                    dim
                );
                Coordinate::new(dim, (0..len).map(|i| i as f64).collect())
            }
        };
        coords.push(coord);
    }

    let mut field = LabeledArray::new(variable, data, coords)?;
    if let Some(units) = read_string_attr(&dset, UNITS_ATTR) {
        field = field.with_units(&units);
    }
    if let Ok(aux_group) = group.group(AUX_COORDS_NAME) {
        for aux_dset in aux_group.datasets()? {
            let Some(dim) = read_string_attr(&aux_dset, DIM_ATTR) else {
                continue;
            };
            if !dims.contains(&dim.as_str()) {
                continue;
            }
            let name = aux_dset.name();
            let name = name.rsplit('/').next().unwrap_or_default().to_string();
            field = field.assign_aux_coord(AuxCoordinate {
                name,
                dim,
                values: aux_dset.read_raw::<f64>()?,
                units: read_string_attr(&aux_dset, UNITS_ATTR),
            })?;
        }
    }
    Ok(field)
}

fn open_existing(path: &Path) -> Result<File, HDF5WriterError> {
    if !path.exists() {
        return Err(HDF5WriterError::BadFilePath(path.to_path_buf()));
    }
    Ok(File::open(path)?)
}

/// Read one variable of a group written by [`HDFWriter`]
pub fn read_labeled(path: &Path, group: &str, variable: &str) -> Result<LabeledArray, HDF5WriterError> {
    let file = open_existing(path)?;
    read_variable(&file.group(group)?, variable)
}

/// Read back a collection written by [`HDFWriter::write_collection`]
pub fn read_collection(path: &Path, name: &str) -> Result<VelocityResultCollection, HDF5WriterError> {
    let file = open_existing(path)?;
    let group = file.group(name)?;
    let variables = read_string_attr(&group, VARIABLES_ATTR).unwrap_or_default();
    let fields = variables
        .split(VARIABLE_SEPARATOR)
        .filter(|v| !v.is_empty())
        .map(|v| read_variable(&group, v))
        .collect::<Result<Vec<_>, _>>()?;
    let mut collection = VelocityResultCollection::new(name, fields);
    collection.extend_metadata(&read_metadata(&group)?);
    Ok(collection)
}

/// Names of the collections stored in a result file
pub fn list_collections(path: &Path) -> Result<Vec<String>, HDF5WriterError> {
    let file = open_existing(path)?;
    let mut names: Vec<String> = file
        .groups()?
        .iter()
        .filter(|g| g.attr(VARIABLES_ATTR).is_ok())
        .map(|g| g.name().trim_start_matches('/').to_string())
        .collect();
    names.sort();
    Ok(names)
}
