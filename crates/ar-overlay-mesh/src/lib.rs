//! Triangle meshes for AR overlays.
//!
//! Loads STL (binary and ASCII) and Wavefront OBJ geometry into a flat
//! triangle list, and normalizes it to a known extent so it can be scaled
//! onto a marker. Materials and textures are left to the renderer.

mod obj;
mod stl;

pub use obj::parse_obj;
pub use stl::parse_stl;

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::{fs, io, path::Path};

/// Three vertices, counter-clockwise when seen from the front face.
pub type Triangle = [Point3<f32>; 3];

#[derive(thiserror::Error, Debug)]
pub enum MeshError {
    #[error("mesh file '{path}' not found")]
    NotFound { path: String },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("malformed mesh at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("unsupported mesh format '{path}' (expected .stl or .obj)")]
    UnsupportedFormat { path: String },
}

impl MeshError {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            line,
            reason: reason.into(),
        }
    }
}

/// Loader options.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshLoadOptions {
    /// Swap Y and Z on load, for assets authored Z-up.
    pub swap_yz: bool,
    /// Rescale to this largest extent (centered on the origin) after loading.
    pub normalize_extent: Option<f32>,
}

/// Flat triangle soup.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn new(triangles: Vec<Triangle>) -> Self {
        Self { triangles }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Axis-aligned bounds `(min, max)`; `None` for an empty mesh.
    pub fn bounds(&self) -> Option<(Point3<f32>, Point3<f32>)> {
        let mut vertices = self.triangles.iter().flatten();
        let first = *vertices.next()?;
        Some(vertices.fold((first, first), |(lo, hi), v| {
            (lo.inf(v), hi.sup(v))
        }))
    }

    /// Center the bounding box on the origin and scale so its largest side
    /// equals `extent`.
    ///
    /// A mesh with zero extent is only centered.
    pub fn normalized(&self, extent: f32) -> Self {
        let Some((lo, hi)) = self.bounds() else {
            return self.clone();
        };
        let size = hi - lo;
        let center = lo + size * 0.5;
        let largest = size.max();
        let scale = if largest > f32::EPSILON {
            extent / largest
        } else {
            1.0
        };
        self.map_vertices(|v| Point3::from((v - center) * scale))
    }

    /// Exchange the Y and Z coordinate of every vertex.
    ///
    /// Also swaps winding so front faces stay front-facing.
    pub fn swap_yz(&self) -> Self {
        let triangles = self
            .triangles
            .iter()
            .map(|t| {
                let s = |p: &Point3<f32>| Point3::new(p.x, p.z, p.y);
                [s(&t[0]), s(&t[2]), s(&t[1])]
            })
            .collect();
        Self { triangles }
    }

    fn map_vertices(&self, f: impl Fn(Point3<f32>) -> Point3<f32>) -> Self {
        let triangles = self.triangles.iter().map(|t| t.map(&f)).collect();
        Self { triangles }
    }

    /// Per-triangle unit normals (zero for degenerate triangles).
    pub fn face_normals(&self) -> Vec<Vector3<f32>> {
        self.triangles
            .iter()
            .map(|t| {
                let n = (t[1] - t[0]).cross(&(t[2] - t[0]));
                n.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::zeros)
            })
            .collect()
    }
}

/// Load a mesh, dispatching on the file extension.
pub fn load_mesh(path: impl AsRef<Path>, options: &MeshLoadOptions) -> Result<Mesh, MeshError> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let read = |p: &Path| {
        fs::read(p).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => MeshError::NotFound {
                path: p.display().to_string(),
            },
            _ => MeshError::Io(err),
        })
    };

    let mut mesh = match ext.as_deref() {
        Some("stl") => parse_stl(&read(path)?)?,
        Some("obj") => {
            let bytes = read(path)?;
            parse_obj(&String::from_utf8_lossy(&bytes))?
        }
        _ => {
            return Err(MeshError::UnsupportedFormat {
                path: path.display().to_string(),
            })
        }
    };

    if mesh.is_empty() {
        log::warn!("mesh '{}' has no triangles", path.display());
    }
    if options.swap_yz {
        mesh = mesh.swap_yz();
    }
    if let Some(extent) = options.normalize_extent {
        mesh = mesh.normalized(extent);
    }
    log::debug!(
        "loaded mesh '{}' ({} triangles)",
        path.display(),
        mesh.triangles.len()
    );
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn tri(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> Triangle {
        [Point3::from(a), Point3::from(b), Point3::from(c)]
    }

    #[test]
    fn normalized_fits_extent_and_centers() {
        let mesh = Mesh::new(vec![
            tri([0.0, 0.0, 0.0], [4.0, 0.0, 0.0], [0.0, 2.0, 0.0]),
            tri([4.0, 2.0, 1.0], [4.0, 0.0, 0.0], [0.0, 2.0, 0.0]),
        ]);
        let n = mesh.normalized(1.0);
        let (lo, hi) = n.bounds().expect("bounds");
        assert_abs_diff_eq!(lo.x, -0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(hi.x, 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(hi.y, 0.25, epsilon = 1e-6);
        assert_abs_diff_eq!(lo.z, -0.125, epsilon = 1e-6);
    }

    #[test]
    fn degenerate_mesh_is_only_centered() {
        let mesh = Mesh::new(vec![[Point3::new(1.0, 1.0, 1.0); 3]]);
        let n = mesh.normalized(3.0);
        assert_eq!(n.triangles[0][0], Point3::origin());
    }

    #[test]
    fn swap_yz_keeps_front_faces() {
        let mesh = Mesh::new(vec![tri([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0])]);
        let before = mesh.face_normals()[0];
        let after = mesh.swap_yz().face_normals()[0];
        assert_abs_diff_eq!(before, Vector3::z(), epsilon = 1e-6);
        assert_abs_diff_eq!(after, Vector3::y(), epsilon = 1e-6);
    }

    #[test]
    fn load_reports_missing_and_unknown_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = load_mesh(dir.path().join("model.stl"), &MeshLoadOptions::default());
        assert!(matches!(missing, Err(MeshError::NotFound { .. })));

        let ply = dir.path().join("model.ply");
        fs::write(&ply, "ply").expect("write");
        assert!(matches!(
            load_mesh(&ply, &MeshLoadOptions::default()),
            Err(MeshError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn load_applies_options() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tri.obj");
        fs::write(&path, "v 0 0 0\nv 2 0 0\nv 0 0 4\nf 1 2 3\n").expect("write");
        let opts = MeshLoadOptions {
            swap_yz: true,
            normalize_extent: Some(1.0),
        };
        let mesh = load_mesh(&path, &opts).expect("load");
        let (lo, hi) = mesh.bounds().expect("bounds");
        assert_abs_diff_eq!(hi.y - lo.y, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(hi.z - lo.z, 0.0, epsilon = 1e-6);
    }
}
