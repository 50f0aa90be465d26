//! Gradient saliency maps rendered as JET heatmaps over the source image.

pub mod colormap;
pub mod postprocess;

use std::path::Path;

use image::{Rgb, RgbImage};
use tracing::debug;

use crate::config::SaliencyConfig;
use crate::error::{BrainScanError, Result};
use crate::math::Tensor;
use crate::network::Network;

use postprocess::{circular_mask, gaussian_blur, normalize_masked, resize_plane, threshold_below_percentile};

/// Processed saliency intensities and the blended overlay, both at the
/// resolution of the image the map was computed for.
#[derive(Debug, Clone)]
pub struct SaliencyMap {
    pub width: u32,
    pub height: u32,
    /// Row-major intensities in [0, 1].
    pub intensity: Vec<f32>,
    pub overlay: RgbImage,
}

impl SaliencyMap {
    pub fn save_png(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        self.overlay.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }

    pub fn png_bytes(&self) -> Result<Vec<u8>> {
        let mut out = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(self.overlay.clone()).write_to(&mut out, image::ImageOutputFormat::Png)?;
        Ok(out.into_inner())
    }
}

/// |∂p_class/∂x| reduced by max over channels, as an `H × W` plane.
pub fn gradient_plane(network: &mut Network, input: &Tensor, class: usize) -> Result<Vec<f32>> {
    let grad = network.class_score_gradient(input, class)?;
    let shape = grad.shape;
    let plane_len = shape.height * shape.width;
    let mut plane = vec![0.0f32; plane_len];
    for c in 0..shape.channels {
        for (i, v) in plane.iter_mut().enumerate() {
            *v = v.max(grad.data[c * plane_len + i].abs() as f32);
        }
    }
    Ok(plane)
}

/// Runs the full saliency pipeline for `class` and blends the heatmap onto
/// `display`, which must be the image `input` was made from.
pub fn compute_saliency(
    network: &mut Network,
    input: &Tensor,
    class: usize,
    display: &RgbImage,
    config: &SaliencyConfig,
) -> Result<SaliencyMap> {
    if !(0.0..=1.0).contains(&config.heatmap_alpha) {
        return Err(BrainScanError::Config(format!(
            "heatmap_alpha must be in [0, 1], got {}",
            config.heatmap_alpha
        )));
    }
    let (width, height) = display.dimensions();
    let raw = gradient_plane(network, input, class)?;
    let mut plane = resize_plane(&raw, input.shape.width as u32, input.shape.height as u32, width, height)?;

    let mask = circular_mask(width, height, config.mask_margin);
    normalize_masked(&mut plane, &mask);
    threshold_below_percentile(&mut plane, &mask, config.threshold_percentile);
    let plane = gaussian_blur(&plane, width, height, config.blur_kernel, config.blur_sigma)?;
    let intensity: Vec<f32> = plane.into_iter().map(|v| v.clamp(0.0, 1.0)).collect();

    let overlay = blend(&intensity, display, config.heatmap_alpha);
    debug!(
        "saliency for class {} at {}x{}, {} masked pixels",
        class,
        width,
        height,
        mask.iter().filter(|m| **m).count()
    );
    Ok(SaliencyMap { width, height, intensity, overlay })
}

/// `alpha * jet(intensity) + (1 - alpha) * display`, truncated to u8.
fn blend(intensity: &[f32], display: &RgbImage, alpha: f64) -> RgbImage {
    let width = display.width();
    RgbImage::from_fn(width, display.height(), |x, y| {
        let level = (intensity[(y * width + x) as usize] * 255.0) as u8;
        let heat = colormap::jet_u8(level);
        let src = display.get_pixel(x, y).0;
        let mix = |i: usize| (alpha * heat[i] as f64 + (1.0 - alpha) * src[i] as f64).clamp(0.0, 255.0) as u8;
        Rgb([mix(0), mix(1), mix(2)])
    })
}
