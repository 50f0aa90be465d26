//! Post-processing of a single-channel saliency plane: resizing, circular
//! masking, normalization, percentile thresholding and Gaussian smoothing.
//!
//! Planes are row-major `Vec<f32>` of `width * height` values.

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma};

use crate::error::{BrainScanError, Result};

/// Bilinear resize. Values are rescaled into [0, 1] around the resize and
/// restored afterwards, since the image crate clamps float pixels to that
/// range.
pub fn resize_plane(plane: &[f32], width: u32, height: u32, new_width: u32, new_height: u32) -> Result<Vec<f32>> {
    let peak = plane.iter().cloned().fold(0.0f32, f32::max);
    let scale = if peak > 0.0 { peak } else { 1.0 };
    let scaled: Vec<f32> = plane.iter().map(|v| v / scale).collect();
    let buffer: ImageBuffer<Luma<f32>, Vec<f32>> = ImageBuffer::from_raw(width, height, scaled)
        .ok_or_else(|| BrainScanError::Shape(format!("plane does not hold {}x{} values", width, height)))?;
    let resized = imageops::resize(&buffer, new_width, new_height, FilterType::Triangle);
    Ok(resized.into_raw().into_iter().map(|v| v * scale).collect())
}

/// Disc centered at `(width / 2, height / 2)` (integer division) with radius
/// `min(cx, cy) - margin`. Boundary pixels are inside.
pub fn circular_mask(width: u32, height: u32, margin: f64) -> Vec<bool> {
    let cx = (width / 2) as f64;
    let cy = (height / 2) as f64;
    let radius = cx.min(cy) - margin;
    let r2 = if radius > 0.0 { radius * radius } else { -1.0 };
    let mut mask = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            mask.push(dx * dx + dy * dy <= r2);
        }
    }
    mask
}

/// Zeroes everything outside `mask` and min-max normalizes the values inside
/// it. If all masked values are equal they are left unscaled.
pub fn normalize_masked(plane: &mut [f32], mask: &[bool]) {
    let mut lo = f32::INFINITY;
    let mut hi = f32::NEG_INFINITY;
    for (v, &inside) in plane.iter_mut().zip(mask) {
        if inside {
            lo = lo.min(*v);
            hi = hi.max(*v);
        } else {
            *v = 0.0;
        }
    }
    if hi > lo {
        for (v, &inside) in plane.iter_mut().zip(mask) {
            if inside {
                *v = (*v - lo) / (hi - lo);
            }
        }
    }
}

/// Percentile with linear interpolation between closest ranks.
pub fn percentile(values: &[f32], q: f64) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = (rank - lower as f64) as f32;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Zeroes every value below the `q`-th percentile of the masked values.
pub fn threshold_below_percentile(plane: &mut [f32], mask: &[bool], q: f64) {
    let masked: Vec<f32> = plane.iter().zip(mask).filter(|&(_, &m)| m).map(|(&v, _)| v).collect();
    if let Some(threshold) = percentile(&masked, q) {
        plane.iter_mut().filter(|v| **v < threshold).for_each(|v| *v = 0.0);
    }
}

/// Normalized 1-D Gaussian weights. A non-positive sigma is derived from the
/// kernel size as `0.3 * ((size - 1) * 0.5 - 1) + 0.8`.
pub fn gaussian_kernel(size: usize, sigma: f64) -> Vec<f32> {
    let sigma = if sigma > 0.0 { sigma } else { 0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8 };
    let half = (size / 2) as f64;
    let weights: Vec<f64> = (0..size)
        .map(|i| {
            let d = i as f64 - half;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.into_iter().map(|w| (w / sum) as f32).collect()
}

/// Mirror index without repeating the edge pixel (`dcb|abcd|cba`).
fn reflect_101(i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let mut i = i.rem_euclid(period);
    if i >= len as isize {
        i = period - i;
    }
    i as usize
}

/// Separable Gaussian blur with a `size × size` kernel.
pub fn gaussian_blur(plane: &[f32], width: u32, height: u32, size: usize, sigma: f64) -> Result<Vec<f32>> {
    if size % 2 == 0 {
        return Err(BrainScanError::Config(format!("blur kernel size must be odd, got {}", size)));
    }
    let (w, h) = (width as usize, height as usize);
    let kernel = gaussian_kernel(size, sigma);
    let half = (size / 2) as isize;

    let mut horizontal = vec![0.0f32; w * h];
    for y in 0..h {
        for x in 0..w {
            horizontal[y * w + x] = kernel
                .iter()
                .enumerate()
                .map(|(k, weight)| weight * plane[y * w + reflect_101(x as isize + k as isize - half, w)])
                .sum();
        }
    }
    let mut out = vec![0.0f32; w * h];
    for y in 0..h {
        for x in 0..w {
            out[y * w + x] = kernel
                .iter()
                .enumerate()
                .map(|(k, weight)| weight * horizontal[reflect_101(y as isize + k as isize - half, h) * w + x])
                .sum();
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_is_a_centered_disc_shrunk_by_margin() {
        let mask = circular_mask(40, 40, 10.0);
        // radius 10 around (20, 20)
        assert!(mask[20 * 40 + 20]);
        assert!(mask[20 * 40 + 30]);
        assert!(!mask[20 * 40 + 31]);
        assert!(!mask[0]);
        assert_eq!(mask.len(), 1600);
    }

    #[test]
    fn tiny_images_get_an_empty_mask() {
        assert!(circular_mask(8, 8, 10.0).iter().all(|m| !m));
    }

    #[test]
    fn normalization_only_touches_the_mask() {
        let mut plane = vec![5.0, 2.0, 4.0, 9.0];
        normalize_masked(&mut plane, &[false, true, true, true]);
        assert_eq!(plane[0], 0.0);
        assert_eq!(plane[1], 0.0);
        assert!((plane[2] - 2.0 / 7.0).abs() < 1e-6);
        assert_eq!(plane[3], 1.0);
    }

    #[test]
    fn constant_mask_region_is_not_rescaled() {
        let mut plane = vec![3.0, 3.0];
        normalize_masked(&mut plane, &[true, true]);
        assert_eq!(plane, vec![3.0, 3.0]);
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let v: Vec<f32> = (0..=10).map(|i| i as f32).collect();
        assert_eq!(percentile(&v, 8.0), Some(0.8));
        assert_eq!(percentile(&v, 50.0), Some(5.0));
        assert_eq!(percentile(&[], 8.0), None);
    }

    #[test]
    fn values_below_threshold_are_zeroed() {
        let mut plane: Vec<f32> = (1..=10).map(|i| i as f32 / 10.0).collect();
        let mask = vec![true; 10];
        threshold_below_percentile(&mut plane, &mask, 25.0);
        // 25th percentile of 0.1..1.0 is 0.325
        assert_eq!(&plane[..3], &[0.0, 0.0, 0.0]);
        assert!((plane[3] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn kernel_sums_to_one_and_derived_sigma_matches_size() {
        let k = gaussian_kernel(11, 0.0);
        assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        let explicit = gaussian_kernel(11, 2.0);
        for (a, b) in k.iter().zip(&explicit) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn blur_preserves_constant_planes_and_spreads_impulses() {
        let flat = vec![0.5f32; 49];
        let out = gaussian_blur(&flat, 7, 7, 5, 1.0).unwrap();
        assert!(out.iter().all(|v| (v - 0.5).abs() < 1e-5));

        let mut impulse = vec![0.0f32; 49];
        impulse[24] = 1.0;
        let out = gaussian_blur(&impulse, 7, 7, 5, 1.0).unwrap();
        assert!(out[24] < 1.0 && out[23] > 0.0);
        assert!(gaussian_blur(&impulse, 7, 7, 4, 1.0).is_err());
    }

    #[test]
    fn resize_keeps_value_scale() {
        let plane = vec![4.0f32; 4];
        let out = resize_plane(&plane, 2, 2, 6, 6).unwrap();
        assert_eq!(out.len(), 36);
        assert!(out.iter().all(|v| (v - 4.0).abs() < 1e-4));
    }
}
