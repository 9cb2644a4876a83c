use std::fs::FileType;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;

use crate::token::ObjectType;
use crate::{FpgaError, FpgaResult};

lazy_static! {
    static ref DEVICE_FILE_PATTERN: Regex =
        Regex::new(r"^intel-fpga-(?P<kind>fme|port)\.(?P<index>\d+)$").unwrap();
}

/// Returns the device file name of an object, e.g. `intel-fpga-port.0`.
pub(crate) fn file_name(object_type: ObjectType, index: u8) -> String {
    match object_type {
        ObjectType::Device => format!("intel-fpga-fme.{index}"),
        ObjectType::Accelerator => format!("intel-fpga-port.{index}"),
    }
}

pub(crate) fn path<P: AsRef<Path>>(base_path: P, object_type: ObjectType, index: u8) -> PathBuf {
    base_path.as_ref().join(file_name(object_type, index))
}

pub(crate) fn is_character_device(file_type: FileType) -> bool {
    // allow just a file too for unit testing
    if cfg!(test) {
        file_type.is_file()
    } else {
        file_type.is_char_device()
    }
}

/// Splits a device file name into its object type and index.
pub(crate) fn parse_file_name<S: AsRef<str>>(filename: S) -> FpgaResult<(ObjectType, u8)> {
    let name = filename.as_ref();
    let matches = DEVICE_FILE_PATTERN
        .captures(name)
        .ok_or_else(|| FpgaError::parse_error(name, "not an FPGA device file"))?;

    let object_type = match &matches["kind"] {
        "fme" => ObjectType::Device,
        _ => ObjectType::Accelerator,
    };
    let index = matches["index"]
        .parse::<u8>()
        .map_err(|e| FpgaError::parse_error(name, e))?;

    Ok((object_type, index))
}

/// Returns the index of a port device file such as `intel-fpga-port.3`.
pub(crate) fn parse_port_index<S: AsRef<str>>(filename: S) -> FpgaResult<u8> {
    let name = filename.as_ref();
    match parse_file_name(name)? {
        (ObjectType::Accelerator, index) => Ok(index),
        (ObjectType::Device, _) => Err(FpgaError::parse_error(name, "not a port device file")),
    }
}
