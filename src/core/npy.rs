//! Minimal reader and writer for NumPy `.npy` files.
//!
//! Only C-ordered little-endian arrays of `f64`, `f32` and `i64` are
//! supported, which covers everything the training framework consumes.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

const MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Header plus magic/version/length prefix is aligned to this many bytes.
const HEADER_ALIGN: usize = 64;

/// Errors that can occur while encoding or decoding `.npy` data.
#[derive(Error, Debug)]
pub enum NpyError {
    #[error("IO error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not a .npy file (bad magic)")]
    BadMagic,

    #[error("unsupported .npy version {0}.{1}")]
    UnsupportedVersion(u8, u8),

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("unsupported dtype '{0}'")]
    UnsupportedDtype(String),

    #[error("fortran-ordered arrays are not supported")]
    FortranOrder,

    #[error("payload holds {actual} bytes, shape {shape:?} needs {expected}")]
    PayloadSize {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    #[error("shape {shape:?} does not match {len} elements")]
    ShapeMismatch { shape: Vec<usize>, len: usize },
}

/// Result type for `.npy` operations.
pub type Result<T> = std::result::Result<T, NpyError>;

/// Element storage of an array.
#[derive(Debug, Clone, PartialEq)]
pub enum NpyData {
    F64(Vec<f64>),
    F32(Vec<f32>),
    I64(Vec<i64>),
}

impl NpyData {
    fn descr(&self) -> &'static str {
        match self {
            NpyData::F64(_) => "<f8",
            NpyData::F32(_) => "<f4",
            NpyData::I64(_) => "<i8",
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            NpyData::F64(v) => v.len(),
            NpyData::F32(v) => v.len(),
            NpyData::I64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An n-dimensional array in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    pub shape: Vec<usize>,
    pub data: NpyData,
}

impl NpyArray {
    /// Build an array, checking the shape against the element count.
    pub fn new(shape: Vec<usize>, data: NpyData) -> Result<Self> {
        if element_count(&shape) != Some(data.len()) {
            return Err(NpyError::ShapeMismatch {
                shape,
                len: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// Elements converted to `f64`.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match &self.data {
            NpyData::F64(v) => v.clone(),
            NpyData::F32(v) => v.iter().map(|&x| x as f64).collect(),
            NpyData::I64(v) => v.iter().map(|&x| x as f64).collect(),
        }
    }

    /// Elements converted to `f32`.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        match &self.data {
            NpyData::F64(v) => v.iter().map(|&x| x as f32).collect(),
            NpyData::F32(v) => v.clone(),
            NpyData::I64(v) => v.iter().map(|&x| x as f32).collect(),
        }
    }

    /// Elements converted to `i64` (floats are truncated).
    pub fn to_i64_vec(&self) -> Vec<i64> {
        match &self.data {
            NpyData::F64(v) => v.iter().map(|&x| x as i64).collect(),
            NpyData::F32(v) => v.iter().map(|&x| x as i64).collect(),
            NpyData::I64(v) => v.clone(),
        }
    }
}

fn header_text(array: &NpyArray) -> String {
    let shape = match array.shape.as_slice() {
        [single] => format!("({},)", single),
        dims => format!(
            "({})",
            dims.iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    };
    let mut header = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}",
        array.data.descr(),
        shape
    );

    // magic(6) + version(2) + header length(2) + header + newline
    let unpadded = MAGIC.len() + 4 + header.len() + 1;
    let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    header.extend(std::iter::repeat(' ').take(padding));
    header.push('\n');
    header
}

/// Encode an array into `.npy` v1.0 bytes.
pub fn encode(array: &NpyArray) -> Vec<u8> {
    let header = header_text(array);
    let elem_size = match array.data {
        NpyData::F64(_) | NpyData::I64(_) => 8,
        NpyData::F32(_) => 4,
    };

    let mut out = Vec::with_capacity(MAGIC.len() + 4 + header.len() + array.data.len() * elem_size);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());

    match &array.data {
        NpyData::F64(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
        NpyData::F32(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
        NpyData::I64(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
    }
    out
}

/// Value following `'key':` in a header dict literal.
fn header_value<'a>(header: &'a str, key: &str) -> Result<&'a str> {
    let needle = format!("'{}':", key);
    let start = header
        .find(&needle)
        .map(|i| i + needle.len())
        .ok_or_else(|| NpyError::MalformedHeader(format!("missing key '{}'", key)))?;
    Ok(header[start..].trim_start())
}

fn parse_shape(header: &str) -> Result<Vec<usize>> {
    let value = header_value(header, "shape")?;
    let open = value
        .strip_prefix('(')
        .ok_or_else(|| NpyError::MalformedHeader("shape is not a tuple".to_string()))?;
    let close = open
        .find(')')
        .ok_or_else(|| NpyError::MalformedHeader("unterminated shape tuple".to_string()))?;

    open[..close]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| NpyError::MalformedHeader(format!("bad dimension '{}'", s)))
        })
        .collect()
}

fn parse_descr(header: &str) -> Result<String> {
    let value = header_value(header, "descr")?;
    let quote = value
        .chars()
        .next()
        .filter(|c| *c == '\'' || *c == '"')
        .ok_or_else(|| NpyError::MalformedHeader("descr is not a string".to_string()))?;
    let rest = &value[1..];
    let end = rest
        .find(quote)
        .ok_or_else(|| NpyError::MalformedHeader("unterminated descr".to_string()))?;
    Ok(rest[..end].to_string())
}

/// Product of the dimensions, or `None` if it overflows.
fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

/// Decode `.npy` bytes.
pub fn decode(bytes: &[u8]) -> Result<NpyArray> {
    if bytes.len() < MAGIC.len() + 2 || &bytes[..MAGIC.len()] != MAGIC {
        return Err(NpyError::BadMagic);
    }
    let (major, minor) = (bytes[6], bytes[7]);
    let (header_len, header_start) = match major {
        1 => {
            let raw = bytes
                .get(8..10)
                .ok_or_else(|| NpyError::MalformedHeader("truncated length".to_string()))?;
            (u16::from_le_bytes([raw[0], raw[1]]) as usize, 10)
        }
        2 | 3 => {
            let raw = bytes
                .get(8..12)
                .ok_or_else(|| NpyError::MalformedHeader("truncated length".to_string()))?;
            (u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize, 12)
        }
        _ => return Err(NpyError::UnsupportedVersion(major, minor)),
    };

    let header_bytes = bytes
        .get(header_start..header_start + header_len)
        .ok_or_else(|| NpyError::MalformedHeader("truncated header".to_string()))?;
    let header = std::str::from_utf8(header_bytes)
        .map_err(|_| NpyError::MalformedHeader("header is not text".to_string()))?;

    if header_value(header, "fortran_order")?.starts_with("True") {
        return Err(NpyError::FortranOrder);
    }
    let descr = parse_descr(header)?;
    let shape = parse_shape(header)?;
    let payload = &bytes[header_start + header_len..];

    let elem_size = match descr.as_str() {
        "<f8" | "<i8" => 8,
        "<f4" => 4,
        other => return Err(NpyError::UnsupportedDtype(other.to_string())),
    };
    let expected = element_count(&shape)
        .and_then(|count| count.checked_mul(elem_size))
        .ok_or_else(|| NpyError::MalformedHeader(format!("shape {:?} is too large", shape)))?;
    if payload.len() != expected {
        return Err(NpyError::PayloadSize {
            shape,
            expected,
            actual: payload.len(),
        });
    }

    let data = match descr.as_str() {
        "<f8" => NpyData::F64(
            payload
                .chunks_exact(8)
                .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect(),
        ),
        "<i8" => NpyData::I64(
            payload
                .chunks_exact(8)
                .map(|c| i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect(),
        ),
        _ => NpyData::F32(
            payload
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
    };

    Ok(NpyArray { shape, data })
}

/// Write an array to a `.npy` file, creating parent directories.
pub fn write_npy(path: &Path, array: &NpyArray) -> Result<()> {
    let io_err = |source| NpyError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }

    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::with_capacity(1024 * 1024, file);
    writer.write_all(&encode(array)).map_err(io_err)?;
    writer.flush().map_err(io_err)?;
    Ok(())
}

/// Read a `.npy` file.
pub fn read_npy(path: &Path) -> Result<NpyArray> {
    let io_err = |source| NpyError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut bytes = Vec::new();
    File::open(path)
        .and_then(|mut f| f.read_to_end(&mut bytes))
        .map_err(io_err)?;
    decode(&bytes)
}
