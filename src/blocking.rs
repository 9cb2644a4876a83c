//! A set of synchronous APIs. This requires the optional blocking feature to be enabled.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::devfs::{self, is_character_device};
use crate::sysfs::fpga;
use crate::{env, Filter, FpgaError, FpgaResult, ObjectType, Token};

/// List all accelerator ports in the system.
pub fn list_ports() -> FpgaResult<Vec<Token>> {
    enumerate(&Filter::accelerator())
}

/// Return the FPGA objects matching `filter`, ordered by index.
pub fn enumerate(filter: &Filter) -> FpgaResult<Vec<Token>> {
    enumerate_with(filter, &env::get_dev_fs("/dev"), &env::get_sys_fs("/sys"))
}

/// Return a specific accelerator port if it exists.
///
/// # Arguments
///
/// * `idx` - An index number of the port (e.g., 0, 1)
pub fn get_port(idx: u8) -> FpgaResult<Token> {
    get_port_with(idx, &env::get_dev_fs("/dev"), &env::get_sys_fs("/sys"))
}

pub(crate) fn enumerate_with(filter: &Filter, devfs: &str, sysfs: &str) -> FpgaResult<Vec<Token>> {
    let mut tokens: Vec<Token> = list_dev_files(devfs)?
        .into_iter()
        .filter_map(|(object_type, index, path)| recognize_token(object_type, index, path, sysfs))
        .filter(|t| filter.matches(t))
        .collect();
    tokens.sort();
    Ok(tokens)
}

pub(crate) fn get_port_with(idx: u8, devfs: &str, sysfs: &str) -> FpgaResult<Token> {
    let path = devfs::path(devfs, ObjectType::Accelerator, idx);
    let meta = match fs::metadata(&path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(FpgaError::not_found(path.display()))
        }
        Err(e) => return Err(e.into()),
    };
    if !is_character_device(meta.file_type()) {
        return Err(FpgaError::invalid_param(format!(
            "{} is not a valid device file",
            path.display()
        )));
    }

    recognize_token(ObjectType::Accelerator, idx, path.clone(), sysfs)
        .ok_or_else(|| FpgaError::not_found(path.display()))
}

fn list_dev_files<P: AsRef<Path>>(devfs: P) -> io::Result<Vec<(ObjectType, u8, PathBuf)>> {
    let read_dir = match fs::read_dir(devfs) {
        Ok(rd) => rd,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(e),
    };

    let mut dev_files = Vec::new();
    for entry in read_dir {
        let entry = entry?;
        if !is_character_device(entry.file_type()?) {
            continue;
        }
        let filename = entry.file_name().to_string_lossy().to_string();
        if let Ok((object_type, index)) = devfs::parse_file_name(&filename) {
            dev_files.push((object_type, index, entry.path()));
        }
    }
    Ok(dev_files)
}

fn recognize_token(
    object_type: ObjectType,
    index: u8,
    dev_path: PathBuf,
    sysfs: &str,
) -> Option<Token> {
    let sysfs_path = fpga::path(sysfs, object_type, index);
    if !sysfs_path.is_dir() {
        return None;
    }

    let (afu_id, dev_num) = fpga::read_token_attrs(&sysfs_path, object_type);

    debug!("found {} at {}", object_type, dev_path.display());
    Some(Token::new(
        object_type,
        index,
        dev_path,
        sysfs_path,
        afu_id,
        dev_num,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVFS: &str = "test_data/test-0/dev";
    const SYSFS: &str = "test_data/test-0/sys";

    #[test]
    fn test_enumerate() -> FpgaResult<()> {
        let ports = enumerate_with(&Filter::accelerator(), DEVFS, SYSFS)?;
        let names: Vec<String> = ports.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["intel-fpga-port.0", "intel-fpga-port.1"]);
        assert_eq!(ports[0].afu_id(), Some("d8424dc4a4a3c413f89e433683f9040b"));

        let all = enumerate_with(&Filter::any(), DEVFS, SYSFS)?;
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].dev_num(), Some((247, 0)));

        assert!(enumerate_with(&Filter::any(), "test_data/no-such-dir", SYSFS)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_get_port() -> FpgaResult<()> {
        let port = get_port_with(0, DEVFS, SYSFS)?;
        assert_eq!(port.dev_num(), Some((246, 0)));

        assert!(matches!(
            get_port_with(2, DEVFS, SYSFS),
            Err(FpgaError::NotFound { .. })
        ));
        assert!(matches!(
            get_port_with(3, DEVFS, SYSFS),
            Err(FpgaError::NotFound { .. })
        ));
        Ok(())
    }
}
