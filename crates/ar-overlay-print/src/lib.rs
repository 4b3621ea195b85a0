//! Printable chessboard charts for camera calibration.
//!
//! A chart is described by its inner-corner grid and square size in pixels,
//! rendered to an 8-bit grayscale raster and written as PNG. Charts can also
//! be saved as JSON next to the image so the calibration step knows which
//! grid to look for.

use ar_overlay_core::GrayImage;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

const WHITE: u8 = 255;
const BLACK: u8 = 0;

#[derive(thiserror::Error, Debug)]
pub enum ChartError {
    #[error("chart needs at least one inner corner per axis and a non-zero square size")]
    InvalidLayout,
    #[error("chart of {width}x{height} px is too large")]
    TooLarge { width: u64, height: u64 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Png(#[from] png::EncodingError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Chessboard layout in inner corners.
///
/// A `9 × 6` inner-corner chart has `10 × 7` squares. The top-left square
/// is white.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChessboardChart {
    pub inner_cols: u32,
    pub inner_rows: u32,
    pub square_px: u32,
}

impl Default for ChessboardChart {
    fn default() -> Self {
        Self {
            inner_cols: 9,
            inner_rows: 6,
            square_px: 100,
        }
    }
}

impl ChessboardChart {
    pub fn squares(&self) -> (u32, u32) {
        (self.inner_cols + 1, self.inner_rows + 1)
    }

    /// Image size in pixels.
    pub fn dimensions(&self) -> Result<(u32, u32), ChartError> {
        if self.inner_cols == 0 || self.inner_rows == 0 || self.square_px == 0 {
            return Err(ChartError::InvalidLayout);
        }
        let (cols, rows) = self.squares();
        let width = cols as u64 * self.square_px as u64;
        let height = rows as u64 * self.square_px as u64;
        match (u32::try_from(width), u32::try_from(height)) {
            (Ok(w), Ok(h)) if (w as u64) * (h as u64) <= isize::MAX as u64 => Ok((w, h)),
            _ => Err(ChartError::TooLarge { width, height }),
        }
    }

    /// Rasterize the chart.
    pub fn render(&self) -> Result<GrayImage, ChartError> {
        let (width, height) = self.dimensions()?;
        let (cols, rows) = self.squares();
        let s = self.square_px as usize;
        let mut img = GrayImage::filled(width as usize, height as usize, WHITE);
        for row in 0..rows as usize {
            for col in 0..cols as usize {
                if (row + col) % 2 == 1 {
                    img.fill_rect(col * s, row * s, (col + 1) * s, (row + 1) * s, BLACK);
                }
            }
        }
        Ok(img)
    }

    /// Render and write the chart as an 8-bit grayscale PNG.
    pub fn write_png(&self, path: impl AsRef<Path>) -> Result<(u32, u32), ChartError> {
        let img = self.render()?;
        write_gray_png(path.as_ref(), &img)?;
        log::info!(
            "wrote {}x{} chart ({}x{} inner corners) to '{}'",
            img.width,
            img.height,
            self.inner_cols,
            self.inner_rows,
            path.as_ref().display()
        );
        Ok((img.width as u32, img.height as u32))
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ChartError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ChartError> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }
}

/// Encode a grayscale raster as PNG.
pub fn write_gray_png(path: &Path, img: &GrayImage) -> Result<(), ChartError> {
    let width = u32::try_from(img.width).map_err(|_| ChartError::TooLarge {
        width: img.width as u64,
        height: img.height as u64,
    })?;
    let height = u32::try_from(img.height).map_err(|_| ChartError::TooLarge {
        width: img.width as u64,
        height: img.height as u64,
    })?;
    let file = File::create(path)?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(png::ColorType::Grayscale);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&img.data)?;
    writer.finish()?;
    Ok(())
}
