//! STL reader (binary and ASCII).

use crate::{Mesh, MeshError, Triangle};
use nalgebra::Point3;

const HEADER_LEN: usize = 80;
const RECORD_LEN: usize = 50;

/// Parse an STL file from its raw bytes.
///
/// Binary files are recognized by their exact size (`84 + 50 * n`); anything
/// else starting with `solid` is read as ASCII. Stored facet normals are
/// ignored.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(len = bytes.len())))]
pub fn parse_stl(bytes: &[u8]) -> Result<Mesh, MeshError> {
    if let Some(count) = binary_triangle_count(bytes) {
        return Ok(parse_binary(bytes, count));
    }
    if bytes.trim_ascii_start().starts_with(b"solid") {
        return parse_ascii(&String::from_utf8_lossy(bytes));
    }
    Err(MeshError::malformed(
        0,
        "neither a binary STL (size mismatch) nor an ASCII STL",
    ))
}

fn binary_triangle_count(bytes: &[u8]) -> Option<usize> {
    let raw = bytes.get(HEADER_LEN..HEADER_LEN + 4)?;
    let count = u32::from_le_bytes(raw.try_into().ok()?) as usize;
    let expected = count.checked_mul(RECORD_LEN)?.checked_add(HEADER_LEN + 4)?;
    (expected == bytes.len()).then_some(count)
}

fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn parse_binary(bytes: &[u8], count: usize) -> Mesh {
    let records = &bytes[HEADER_LEN + 4..];
    let triangles = records
        .chunks_exact(RECORD_LEN)
        .take(count)
        .map(|rec| {
            // 12 bytes of normal, then three vertices, then a u16 attribute.
            let v = |i: usize| {
                let o = 12 + 12 * i;
                Point3::new(read_f32(rec, o), read_f32(rec, o + 4), read_f32(rec, o + 8))
            };
            [v(0), v(1), v(2)]
        })
        .collect();
    Mesh::new(triangles)
}

fn parse_ascii(text: &str) -> Result<Mesh, MeshError> {
    let mut triangles: Vec<Triangle> = Vec::new();
    let mut pending: Vec<Point3<f32>> = Vec::with_capacity(3);

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("vertex") => {
                let coords: Vec<f32> = tokens
                    .map(str::parse::<f32>)
                    .collect::<Result<_, _>>()
                    .map_err(|e| MeshError::malformed(line_no, format!("bad vertex: {e}")))?;
                let [x, y, z] = coords[..] else {
                    return Err(MeshError::malformed(
                        line_no,
                        format!("vertex needs 3 coordinates, got {}", coords.len()),
                    ));
                };
                pending.push(Point3::new(x, y, z));
            }
            Some("facet") => pending.clear(),
            Some("endfacet") => {
                let [a, b, c] = pending[..] else {
                    return Err(MeshError::malformed(
                        line_no,
                        format!("facet has {} vertices, expected 3", pending.len()),
                    ));
                };
                triangles.push([a, b, c]);
                pending.clear();
            }
            _ => {}
        }
    }

    Ok(Mesh::new(triangles))
}
