use std::path::Path;

use image::imageops::FilterType;
use image::DynamicImage;

use crate::error::{BrainScanError, Result};
use crate::math::{Shape, Tensor};

/// Decodes images and converts them to model input tensors.
///
/// Images are resized exactly (aspect ratio is not kept) with
/// nearest-neighbour sampling, converted to RGB and laid out channel-major
/// with values rescaled to [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLoader {
    pub size: u32,
}

impl ImageLoader {
    pub fn new(size: usize) -> Self {
        ImageLoader { size: size as u32 }
    }

    /// Loader matching a model's declared input shape.
    pub fn for_shape(shape: Shape) -> Result<Self> {
        if shape.channels != 3 || shape.height != shape.width {
            return Err(BrainScanError::Shape(format!(
                "image inputs must be square RGB, model declares {}",
                shape
            )));
        }
        Ok(ImageLoader::new(shape.width))
    }

    pub fn shape(&self) -> Shape {
        Shape::rgb(self.size as usize)
    }

    pub fn open(path: &Path) -> Result<DynamicImage> {
        image::open(path).map_err(|e| BrainScanError::ImageLoad(path.to_path_buf(), e.to_string()))
    }

    pub fn load(&self, path: &Path) -> Result<Tensor> {
        let image = ImageLoader::open(path)?;
        self.to_tensor(&image)
    }

    pub fn to_tensor(&self, image: &DynamicImage) -> Result<Tensor> {
        let resized = image.resize_exact(self.size, self.size, FilterType::Nearest).to_rgb8();
        let plane = (self.size * self.size) as usize;
        let mut data = vec![0.0; 3 * plane];
        for (i, pixel) in resized.pixels().enumerate() {
            for c in 0..3 {
                data[c * plane + i] = pixel.0[c] as f64 / 255.0;
            }
        }
        Tensor::from_vec(self.shape(), data)
    }
}
