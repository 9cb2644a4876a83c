use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use nom::branch::alt;
use nom::bytes::complete::{tag, take_while_m_n};
use nom::character::complete::digit1;
use nom::combinator::{all_consuming, map, map_res, opt};
use nom::sequence::{pair, preceded};
use strum_macros::{AsRefStr, EnumString};

use crate::{devfs, FpgaError};

/// Kind of FPGA object a [`Token`] refers to.
#[derive(AsRefStr, EnumString, Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[strum(serialize_all = "lowercase")]
pub enum ObjectType {
    /// The FPGA management engine of a card.
    Device,
    /// An accelerator port, where AFUs and umsgs live.
    Accelerator,
}

impl Display for ObjectType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

/// Identifies an FPGA object found in the system. Open it with
/// [`Handle::open`][crate::Handle::open].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Token {
    index: u8,
    object_type: ObjectType,
    dev_path: PathBuf,
    sysfs_path: PathBuf,
    afu_id: Option<String>,
    dev_num: Option<(u32, u32)>,
}

impl Token {
    pub(crate) fn new(
        object_type: ObjectType,
        index: u8,
        dev_path: PathBuf,
        sysfs_path: PathBuf,
        afu_id: Option<String>,
        dev_num: Option<(u32, u32)>,
    ) -> Self {
        Self {
            index,
            object_type,
            dev_path,
            sysfs_path,
            afu_id,
            dev_num,
        }
    }

    /// Returns the instance number (e.g., 0 for /dev/intel-fpga-port.0).
    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    /// Returns the device file name, e.g. `intel-fpga-port.0`.
    pub fn name(&self) -> String {
        devfs::file_name(self.object_type, self.index)
    }

    pub fn dev_path(&self) -> &Path {
        &self.dev_path
    }

    pub fn sysfs_path(&self) -> &Path {
        &self.sysfs_path
    }

    /// Returns the id of the AFU loaded behind an accelerator port.
    pub fn afu_id(&self) -> Option<&str> {
        self.afu_id.as_deref()
    }

    /// Returns the `major:minor` device number.
    pub fn dev_num(&self) -> Option<(u32, u32)> {
        self.dev_num
    }

    pub fn is_accelerator(&self) -> bool {
        self.object_type == ObjectType::Accelerator
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Ord for Token {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index
            .cmp(&other.index)
            .then(self.object_type.cmp(&other.object_type))
    }
}

impl PartialOrd for Token {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Describes which tokens [`enumerate`][crate::enumerate] should return.
///
/// # Examples
/// ```rust
/// use fpga_port::Filter;
///
/// // every object
/// Filter::any();
///
/// // the accelerator port 0
/// Filter::accelerator().index(0);
///
/// // the textual form, e.g. read from an environment variable
/// let filter: Filter = "accelerator:0".parse().unwrap();
/// assert_eq!(filter, Filter::accelerator().index(0));
///
/// // an AFU id follows a slash
/// let filter: Filter = "accelerator/d8424dc4a4a3c413f89e433683f9040b".parse().unwrap();
/// assert_eq!(filter, Filter::accelerator().afu_id("d8424dc4a4a3c413f89e433683f9040b"));
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Filter {
    object_type: Option<ObjectType>,
    index: Option<u8>,
    afu_id: Option<String>,
}

impl Filter {
    /// Matches every object.
    pub fn any() -> Self {
        Self::default()
    }

    /// Matches accelerator ports.
    pub fn accelerator() -> Self {
        Self {
            object_type: Some(ObjectType::Accelerator),
            ..Default::default()
        }
    }

    /// Matches management engines.
    pub fn device() -> Self {
        Self {
            object_type: Some(ObjectType::Device),
            ..Default::default()
        }
    }

    pub fn index(mut self, index: u8) -> Self {
        self.index = Some(index);
        self
    }

    /// Restricts to ports whose AFU id matches, ignoring case and dashes.
    pub fn afu_id<S: AsRef<str>>(mut self, afu_id: S) -> Self {
        self.afu_id = Some(afu_id.as_ref().to_ascii_lowercase().replace('-', ""));
        self
    }

    /// Narrows the filter to accelerator ports. A filter that selects
    /// management engines is rejected.
    pub(crate) fn ports_only(mut self) -> Result<Self, FpgaError> {
        if self.object_type == Some(ObjectType::Device) {
            return Err(FpgaError::invalid_param(format!(
                "{self} does not select accelerator ports"
            )));
        }
        self.object_type = Some(ObjectType::Accelerator);
        Ok(self)
    }

    pub fn matches(&self, token: &Token) -> bool {
        self.object_type.map_or(true, |t| t == token.object_type)
            && self.index.map_or(true, |i| i == token.index)
            && self
                .afu_id
                .as_deref()
                .map_or(true, |id| token.afu_id() == Some(id))
    }
}

impl FromStr for Filter {
    type Err = FpgaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        fn index<'a>() -> impl FnMut(&'a str) -> nom::IResult<&'a str, u8, ()> {
            map_res(digit1, |s: &str| s.parse::<u8>())
        }
        fn object_type<'a>() -> impl FnMut(&'a str) -> nom::IResult<&'a str, ObjectType, ()> {
            map_res(alt((tag("accelerator"), tag("device"))), |s: &str| {
                s.parse::<ObjectType>()
            })
        }

        fn afu_id<'a>() -> impl FnMut(&'a str) -> nom::IResult<&'a str, &'a str, ()> {
            take_while_m_n(32, 32, |c: char| c.is_ascii_hexdigit())
        }

        // "*", "3", "accelerator" or "accelerator:3", then an optional "/<afu id>"
        let selector = alt((
            map(tag("*"), |_| Filter::any()),
            map(index(), |i| Filter::any().index(i)),
            map(
                pair(object_type(), opt(preceded(tag(":"), index()))),
                |(object_type, index)| Filter {
                    object_type: Some(object_type),
                    index,
                    afu_id: None,
                },
            ),
        ));
        let parsed = all_consuming(pair(selector, opt(preceded(tag("/"), afu_id()))))(s.trim());

        parsed
            .map(|(_, (filter, afu))| match afu {
                Some(id) => filter.afu_id(id),
                None => filter,
            })
            .map_err(|e: nom::Err<()>| FpgaError::parse_error(s, e))
    }
}

impl Display for Filter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match (self.object_type, self.index) {
            (None, None) => write!(f, "*"),
            (None, Some(index)) => write!(f, "{index}"),
            (Some(object_type), None) => write!(f, "{object_type}"),
            (Some(object_type), Some(index)) => write!(f, "{object_type}:{index}"),
        }?;
        match &self.afu_id {
            Some(id) => write!(f, "/{id}"),
            None => Ok(()),
        }
    }
}
