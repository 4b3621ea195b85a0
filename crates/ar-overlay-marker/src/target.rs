use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Corners of a square marker of side `length`, centered on the origin in the
/// `z = 0` plane.
///
/// Order is top-left, top-right, bottom-right, bottom-left, matching the
/// corner order marker detectors report.
pub fn square_marker_object_points(length: f64) -> [Point3<f64>; 4] {
    let h = length * 0.5;
    [
        Point3::new(-h, h, 0.0),
        Point3::new(h, h, 0.0),
        Point3::new(h, -h, 0.0),
        Point3::new(-h, -h, 0.0),
    ]
}

/// Inner corners of a chessboard, row by row with `x` varying fastest.
///
/// The first corner is the origin; `square_size` sets the metric scale.
pub fn chessboard_object_points(
    inner_cols: usize,
    inner_rows: usize,
    square_size: f64,
) -> Vec<Point3<f64>> {
    (0..inner_rows)
        .flat_map(|j| {
            (0..inner_cols)
                .map(move |i| Point3::new(i as f64 * square_size, j as f64 * square_size, 0.0))
        })
        .collect()
}

/// Physical reference whose detected corners feed the pose solver.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanarTarget {
    /// Square fiducial (ArUco-style); `length` is the printed side in meters.
    SquareMarker { length: f64 },
    /// Chessboard with `inner_cols × inner_rows` inner corners.
    Chessboard {
        inner_cols: usize,
        inner_rows: usize,
        square_size: f64,
    },
}

impl Default for PlanarTarget {
    fn default() -> Self {
        Self::SquareMarker { length: 0.06 }
    }
}

impl PlanarTarget {
    /// Metric corner positions, in detector corner order.
    pub fn object_points(&self) -> Vec<Point3<f64>> {
        match *self {
            Self::SquareMarker { length } => square_marker_object_points(length).to_vec(),
            Self::Chessboard {
                inner_cols,
                inner_rows,
                square_size,
            } => chessboard_object_points(inner_cols, inner_rows, square_size),
        }
    }

    /// Number of corners a complete detection of this target carries.
    pub fn corner_count(&self) -> usize {
        match *self {
            Self::SquareMarker { .. } => 4,
            Self::Chessboard {
                inner_cols,
                inner_rows,
                ..
            } => inner_cols * inner_rows,
        }
    }
}
