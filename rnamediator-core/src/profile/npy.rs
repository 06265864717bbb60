//! Minimal reader and writer for NumPy `.npy` files holding `f8` arrays.
//!
//! Only C-ordered little-endian `<f8` (and `<f4` on read) arrays are supported,
//! which is all the window result files ever contain.

use std::io::{Read, Write};

use crate::types::{MediatorError, Result};

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const ALIGNMENT: usize = 64;

/// Flat array data together with its shape.
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

fn malformed(detail: impl Into<String>) -> MediatorError {
    MediatorError::MalformedProfileFormat(detail.into())
}

/// Text following `'key':` in a header dictionary literal.
fn header_field<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let quoted = format!("'{key}'");
    let rest = &header[header.find(&quoted)? + quoted.len()..];
    Some(rest.trim_start().strip_prefix(':')?.trim_start())
}

fn shape_literal(shape: &[usize]) -> String {
    match shape {
        [single] => format!("({single},)"),
        dims => format!(
            "({})",
            dims.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// Writes `array` in NPY format version 1.0.
///
/// # Errors
///
/// Returns [`MediatorError::MalformedProfileFormat`] if the data length does not
/// match the shape, or an I/O error from the writer.
pub fn write_npy<W: Write>(writer: &mut W, array: &NpyArray) -> Result<()> {
    let expected: usize = array.shape.iter().product();
    if expected != array.data.len() {
        return Err(malformed(format!(
            "shape {:?} needs {expected} values, got {}",
            array.shape,
            array.data.len()
        )));
    }

    let mut header = format!(
        "{{'descr': '<f8', 'fortran_order': False, 'shape': {}, }}",
        shape_literal(&array.shape)
    );
    // magic + version + u16 length + header + trailing newline
    let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
    let padding = (ALIGNMENT - unpadded % ALIGNMENT) % ALIGNMENT;
    header.push_str(&" ".repeat(padding));
    header.push('\n');

    let header_len = u16::try_from(header.len())
        .map_err(|_| malformed("NPY header exceeds version 1.0 limits"))?;

    writer.write_all(MAGIC)?;
    writer.write_all(&[1, 0])?;
    writer.write_all(&header_len.to_le_bytes())?;
    writer.write_all(header.as_bytes())?;
    for value in &array.data {
        writer.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

/// Reads an NPY file of versions 1.0 to 3.0.
///
/// # Errors
///
/// Returns [`MediatorError::MalformedProfileFormat`] for anything but C-ordered
/// little-endian float arrays.
pub fn read_npy<R: Read>(reader: &mut R) -> Result<NpyArray> {
    let mut preamble = [0u8; 8];
    reader.read_exact(&mut preamble)?;
    if &preamble[..6] != MAGIC {
        return Err(malformed("missing NPY magic string"));
    }

    let header_len = match preamble[6] {
        1 => {
            let mut len = [0u8; 2];
            reader.read_exact(&mut len)?;
            usize::from(u16::from_le_bytes(len))
        }
        2 | 3 => {
            let mut len = [0u8; 4];
            reader.read_exact(&mut len)?;
            u32::from_le_bytes(len) as usize
        }
        v => return Err(malformed(format!("unsupported NPY version {v}"))),
    };

    let mut header = vec![0u8; header_len];
    reader.read_exact(&mut header)?;
    let header = String::from_utf8_lossy(&header);

    let descr = header_field(&header, "descr")
        .and_then(|v| v.strip_prefix('\''))
        .and_then(|v| v.split('\'').next())
        .ok_or_else(|| malformed("NPY header without descr"))?
        .to_string();
    if header_field(&header, "fortran_order").is_some_and(|v| v.starts_with("True")) {
        return Err(malformed("Fortran ordered arrays are not supported"));
    }
    let dims = header_field(&header, "shape")
        .and_then(|v| v.strip_prefix('('))
        .and_then(|v| v.split(')').next())
        .ok_or_else(|| malformed("NPY header without shape"))?;
    let shape: Vec<usize> = dims
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| malformed(format!("invalid dimension '{s}'")))
        })
        .collect::<Result<_>>()?;

    let count: usize = shape.iter().product();
    let data = match descr.as_str() {
        "<f8" => {
            let mut raw = vec![0u8; count * 8];
            reader.read_exact(&mut raw)?;
            raw.chunks_exact(8)
                .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
                .collect()
        }
        "<f4" => {
            let mut raw = vec![0u8; count * 4];
            reader.read_exact(&mut raw)?;
            raw.chunks_exact(4)
                .map(|b| f64::from(f32::from_le_bytes([b[0], b[1], b[2], b[3]])))
                .collect()
        }
        other => return Err(malformed(format!("unsupported dtype '{other}'"))),
    };

    Ok(NpyArray { shape, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_is_aligned() {
        let array = NpyArray {
            shape: vec![3, 1, 2],
            data: vec![0.0, 0.5, 1.0, f64::NAN, 0.25, 0.75],
        };
        let mut buf = Vec::new();
        write_npy(&mut buf, &array).unwrap();

        let header_len = u16::from_le_bytes([buf[8], buf[9]]) as usize;
        assert_eq!((10 + header_len) % ALIGNMENT, 0);
        assert_eq!(buf.len(), 10 + header_len + 6 * 8);
        let header = std::str::from_utf8(&buf[10..10 + header_len]).unwrap();
        assert!(header.contains("'shape': (3, 1, 2)"));
        assert!(header.ends_with('\n'));
    }

    #[test]
    fn test_read_keeps_nan() {
        let array = NpyArray {
            shape: vec![2, 2],
            data: vec![0.1, f64::NAN, 0.3, 0.4],
        };
        let mut buf = Vec::new();
        write_npy(&mut buf, &array).unwrap();
        let back = read_npy(&mut buf.as_slice()).unwrap();
        assert_eq!(back.shape, vec![2, 2]);
        assert!(back.data[1].is_nan());
        assert!((back.data[2] - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_one_dimensional_shape_literal() {
        assert_eq!(shape_literal(&[4]), "(4,)");
        assert_eq!(shape_literal(&[4, 1, 3]), "(4, 1, 3)");
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let array = NpyArray {
            shape: vec![2, 2],
            data: vec![0.1],
        };
        assert!(write_npy(&mut Vec::new(), &array).is_err());
    }

    #[test]
    fn test_header_field_lookup() {
        let header = "{'descr': '<f8', 'fortran_order': False, 'shape': (5, 1, 3), }";
        assert!(header_field(header, "descr").unwrap().starts_with("'<f8'"));
        assert!(header_field(header, "shape").unwrap().starts_with("(5, 1, 3)"));
        assert!(header_field(header, "missing").is_none());
    }

    #[test]
    fn test_bad_magic() {
        let bytes = b"NOTNUMPYFILE".to_vec();
        assert!(matches!(
            read_npy(&mut bytes.as_slice()),
            Err(MediatorError::MalformedProfileFormat(_))
        ));
    }
}
