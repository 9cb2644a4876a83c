pub(crate) mod fpga {
    use std::fs;
    use std::io;
    use std::path::{Path, PathBuf};

    use crate::token::ObjectType;

    pub mod file {
        pub const AFU_ID: &str = "afu_id";
        pub const DEV: &str = "dev";
    }

    /// Returns the sysfs directory of an object, e.g.
    /// `/sys/class/fpga/intel-fpga-dev.0/intel-fpga-port.0`.
    pub(crate) fn path<P: AsRef<Path>>(sysfs: P, object_type: ObjectType, idx: u8) -> PathBuf {
        sysfs.as_ref().join(format!(
            "class/fpga/intel-fpga-dev.{idx}/{}",
            crate::devfs::file_name(object_type, idx)
        ))
    }

    pub(crate) fn read_attr<P: AsRef<Path>, F: AsRef<Path>>(
        root: P,
        file: F,
    ) -> io::Result<String> {
        let path = root.as_ref().join(file);
        fs::read_to_string(path).map(|s| s.trim_end().to_string())
    }

    /// Reads what a token records about an object: the AFU id of a port and
    /// the device number. Missing or malformed attributes yield `None`.
    pub(crate) fn read_token_attrs<P: AsRef<Path>>(
        root: P,
        object_type: ObjectType,
    ) -> (Option<String>, Option<(u32, u32)>) {
        let root = root.as_ref();
        let afu_id = match object_type {
            ObjectType::Accelerator => read_attr(root, file::AFU_ID).ok().and_then(parse_afu_id),
            ObjectType::Device => None,
        };
        let dev_num = read_attr(root, file::DEV).ok().and_then(parse_dev_num);
        (afu_id, dev_num)
    }

    /// Parses the `major:minor` contents of a `dev` attribute.
    pub(crate) fn parse_dev_num<S: AsRef<str>>(contents: S) -> Option<(u32, u32)> {
        let (major, minor) = contents.as_ref().trim().split_once(':')?;
        Some((major.parse().ok()?, minor.parse().ok()?))
    }

    /// Normalizes the `afu_id` attribute: 32 hex digits, lowercase.
    pub(crate) fn parse_afu_id<S: AsRef<str>>(contents: S) -> Option<String> {
        let id = contents.as_ref().trim().to_ascii_lowercase().replace('-', "");
        if id.len() == 32 && id.chars().all(|c| c.is_ascii_hexdigit()) {
            Some(id)
        } else {
            None
        }
    }
}
