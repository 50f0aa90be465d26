use crate::dataset::indexer::Sample;
use crate::dataset::loader::ImageLoader;
use crate::error::Result;
use crate::math::Tensor;

/// Random-access labeled inputs for training and evaluation.
pub trait SampleSource {
    fn len(&self) -> usize;

    /// Input tensor and class index of sample `index`.
    fn get(&self, index: usize) -> Result<(Tensor, usize)>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Samples decoded from disk on demand.
#[derive(Debug, Clone)]
pub struct ImageSet {
    pub samples: Vec<Sample>,
    pub loader: ImageLoader,
}

impl ImageSet {
    pub fn new(samples: Vec<Sample>, loader: ImageLoader) -> Self {
        ImageSet { samples, loader }
    }
}

impl SampleSource for ImageSet {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn get(&self, index: usize) -> Result<(Tensor, usize)> {
        let sample = &self.samples[index];
        Ok((self.loader.load(&sample.path)?, sample.label.index()))
    }
}

/// Preloaded tensors.
impl SampleSource for [(Tensor, usize)] {
    fn len(&self) -> usize {
        <[(Tensor, usize)]>::len(self)
    }

    fn get(&self, index: usize) -> Result<(Tensor, usize)> {
        Ok(self[index].clone())
    }
}
