//! Wavefront OBJ geometry reader.
//!
//! Only `v` and `f` records matter here; texture coordinates, normals,
//! groups and material statements are skipped.

use crate::{Mesh, MeshError, Triangle};
use nalgebra::Point3;

/// Parse OBJ text into triangles.
///
/// Faces with more than three vertices are fan-triangulated. Vertex
/// references may be `i`, `i/t`, `i//n` or `i/t/n`, and negative indices
/// count back from the last vertex defined so far.
pub fn parse_obj(text: &str) -> Result<Mesh, MeshError> {
    let mut positions: Vec<Point3<f32>> = Vec::new();
    let mut triangles: Vec<Triangle> = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.split('#').next().unwrap_or_default();
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("v") => {
                let coords = tokens
                    .take(3)
                    .map(str::parse::<f32>)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| MeshError::malformed(line_no, format!("bad vertex: {e}")))?;
                let [x, y, z] = coords[..] else {
                    return Err(MeshError::malformed(line_no, "vertex needs 3 coordinates"));
                };
                positions.push(Point3::new(x, y, z));
            }
            Some("f") => {
                let corners = tokens
                    .map(|t| resolve_index(t, positions.len(), line_no))
                    .collect::<Result<Vec<_>, _>>()?;
                if corners.len() < 3 {
                    return Err(MeshError::malformed(
                        line_no,
                        format!("face needs at least 3 vertices, got {}", corners.len()),
                    ));
                }
                let p = |i: usize| positions[corners[i]];
                for k in 1..corners.len() - 1 {
                    triangles.push([p(0), p(k), p(k + 1)]);
                }
            }
            _ => {}
        }
    }

    Ok(Mesh::new(triangles))
}

fn resolve_index(token: &str, defined: usize, line_no: usize) -> Result<usize, MeshError> {
    let head = token.split('/').next().unwrap_or_default();
    let raw: i64 = head
        .parse()
        .map_err(|_| MeshError::malformed(line_no, format!("bad vertex reference '{token}'")))?;
    let resolved = match raw {
        0 => None,
        r if r > 0 => usize::try_from(r - 1).ok(),
        r => (defined as i64 + r).try_into().ok(),
    };
    resolved.filter(|&i| i < defined).ok_or_else(|| {
        MeshError::malformed(
            line_no,
            format!("vertex reference {raw} out of range ({defined} vertices)"),
        )
    })
}
