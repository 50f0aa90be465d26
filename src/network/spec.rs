use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::activation::ActivationFunction;
use crate::dataset::ClassLabel;
use crate::math::Shape;

/// Filter counts of the reference from-scratch CNN.
pub const CUSTOM_CNN_FILTERS: [usize; 4] = [512, 256, 128, 64];

/// Describes one stage of a network before any weights exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSpec {
    /// Feature layers of a previously trained artifact, global-max pooled.
    /// Only valid as the first layer.
    Backbone {
        artifact: PathBuf,
        /// Keep updating the pretrained weights (fine-tuning).
        #[serde(default = "default_trainable")]
        trainable: bool,
    },
    Conv2d {
        filters: usize,
        kernel: usize,
        activation: ActivationFunction,
    },
    MaxPool2d {
        size: usize,
    },
    GlobalMaxPool,
    Dropout {
        rate: f64,
    },
    Flatten,
    Dense {
        units: usize,
        activation: ActivationFunction,
        #[serde(default)]
        l2: f64,
    },
}

fn default_trainable() -> bool {
    true
}

/// A fully serializable description of a classifier: input shape, ordered
/// layers (input → output) and the class names of the output units.
///
/// `ArchitectureSpec` is stored inside every model artifact so the trained
/// weights can always be traced back to the configuration that made them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureSpec {
    /// Human-readable name used as the model file stem.
    pub name: String,
    pub input: Shape,
    pub layers: Vec<LayerSpec>,
    pub classes: Vec<String>,
}

impl ArchitectureSpec {
    /// Four conv/pool blocks trained from scratch:
    /// `conv(f0) pool | conv(f1) pool drop | conv(f2) pool drop | conv(f3) pool`
    /// followed by `flatten dense(256, l2 0.01) drop dense(4, softmax)`.
    pub fn custom_cnn(name: impl Into<String>, image_size: usize, filters: [usize; 4]) -> Self {
        let conv = |filters| LayerSpec::Conv2d { filters, kernel: 3, activation: ActivationFunction::ReLU };
        let pool = || LayerSpec::MaxPool2d { size: 2 };
        ArchitectureSpec {
            name: name.into(),
            input: Shape::rgb(image_size),
            layers: vec![
                conv(filters[0]),
                pool(),
                conv(filters[1]),
                pool(),
                LayerSpec::Dropout { rate: 0.25 },
                conv(filters[2]),
                pool(),
                LayerSpec::Dropout { rate: 0.25 },
                conv(filters[3]),
                pool(),
                LayerSpec::Flatten,
                LayerSpec::Dense { units: 256, activation: ActivationFunction::ReLU, l2: 0.01 },
                LayerSpec::Dropout { rate: 0.35 },
                LayerSpec::Dense { units: ClassLabel::COUNT, activation: ActivationFunction::Softmax, l2: 0.0 },
            ],
            classes: ClassLabel::class_names(),
        }
    }

    /// Classification head on top of a pretrained backbone:
    /// `backbone(max pooled) flatten drop(0.3) dense(128) drop(0.25) dense(4, softmax)`.
    pub fn transfer(name: impl Into<String>, image_size: usize, backbone: impl Into<PathBuf>) -> Self {
        ArchitectureSpec {
            name: name.into(),
            input: Shape::rgb(image_size),
            layers: vec![
                LayerSpec::Backbone { artifact: backbone.into(), trainable: true },
                LayerSpec::Flatten,
                LayerSpec::Dropout { rate: 0.3 },
                LayerSpec::Dense { units: 128, activation: ActivationFunction::ReLU, l2: 0.0 },
                LayerSpec::Dropout { rate: 0.25 },
                LayerSpec::Dense { units: ClassLabel::COUNT, activation: ActivationFunction::Softmax, l2: 0.0 },
            ],
            classes: ClassLabel::class_names(),
        }
    }
}
