use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::devfs::{self, is_character_device};
use crate::error::FpgaResult;
use crate::sysfs::fpga;
use crate::token::{Filter, ObjectType, Token};
use crate::FpgaError;

/// Allow to specify arbitrary sysfs, devfs paths for unit testing
pub(crate) async fn list_tokens_with(devfs: &str, sysfs: &str) -> FpgaResult<Vec<Token>> {
    let mut tokens = Vec::new();
    for (object_type, index, dev_path) in list_dev_files(devfs).await? {
        if let Some(token) = recognize_token(object_type, index, dev_path, sysfs).await {
            tokens.push(token);
        }
    }

    tokens.sort();
    Ok(tokens)
}

pub(crate) async fn list_ports_with(devfs: &str, sysfs: &str) -> FpgaResult<Vec<Token>> {
    enumerate_with(&Filter::accelerator(), devfs, sysfs).await
}

pub(crate) async fn enumerate_with(
    filter: &Filter,
    devfs: &str,
    sysfs: &str,
) -> FpgaResult<Vec<Token>> {
    let tokens = list_tokens_with(devfs, sysfs).await?;
    Ok(tokens.into_iter().filter(|t| filter.matches(t)).collect())
}

pub(crate) async fn get_port_with(index: u8, devfs: &str, sysfs: &str) -> FpgaResult<Token> {
    let dev_path = devfs::path(devfs, ObjectType::Accelerator, index);
    match fs::metadata(&dev_path).await {
        Ok(meta) if is_character_device(meta.file_type()) => {}
        Ok(_) => {
            return Err(FpgaError::invalid_param(format!(
                "{} is not a valid device file",
                dev_path.display()
            )))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(FpgaError::not_found(dev_path.display()))
        }
        Err(e) => return Err(e.into()),
    }

    recognize_token(ObjectType::Accelerator, index, dev_path.clone(), sysfs)
        .await
        .ok_or_else(|| FpgaError::not_found(dev_path.display()))
}

pub(crate) async fn get_port_by_name_with(
    name: &str,
    devfs: &str,
    sysfs: &str,
) -> FpgaResult<Token> {
    get_port_with(devfs::parse_port_index(name)?, devfs, sysfs).await
}

/// List FPGA device files in the devfs directory.
async fn list_dev_files<P: AsRef<Path>>(devfs: P) -> io::Result<Vec<(ObjectType, u8, PathBuf)>> {
    let mut dev_files = Vec::new();
    let mut read_dir = match fs::read_dir(devfs).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(dev_files),
        Err(e) => return Err(e),
    };
    while let Some(entry) = read_dir.next_entry().await? {
        if !is_character_device(entry.file_type().await?) {
            continue;
        }
        let filename = entry.file_name().to_string_lossy().to_string();
        if let Ok((object_type, index)) = devfs::parse_file_name(&filename) {
            dev_files.push((object_type, index, entry.path()));
        }
    }
    Ok(dev_files)
}

/// Builds a token if the driver exposes the object in sysfs.
async fn recognize_token(
    object_type: ObjectType,
    index: u8,
    dev_path: PathBuf,
    sysfs: &str,
) -> Option<Token> {
    let sysfs_path = fpga::path(sysfs, object_type, index);
    if !fs::metadata(&sysfs_path).await.ok()?.is_dir() {
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
