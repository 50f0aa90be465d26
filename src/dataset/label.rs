use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BrainScanError;

/// The four MRI classes, in the alphabetical directory order of the public
/// dataset. The discriminant is the output unit index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassLabel {
    Glioma,
    Meningioma,
    NoTumor,
    Pituitary,
}

impl ClassLabel {
    pub const COUNT: usize = 4;

    pub const ALL: [ClassLabel; ClassLabel::COUNT] = [
        ClassLabel::Glioma,
        ClassLabel::Meningioma,
        ClassLabel::NoTumor,
        ClassLabel::Pituitary,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<ClassLabel> {
        ClassLabel::ALL.get(index).copied()
    }

    /// Snake-case name stored in model artifacts.
    pub fn name(self) -> &'static str {
        match self {
            ClassLabel::Glioma => "glioma",
            ClassLabel::Meningioma => "meningioma",
            ClassLabel::NoTumor => "no_tumor",
            ClassLabel::Pituitary => "pituitary",
        }
    }

    /// Title-case name shown to users and used in the explanation prompt.
    pub fn display_name(self) -> &'static str {
        match self {
            ClassLabel::Glioma => "Glioma",
            ClassLabel::Meningioma => "Meningioma",
            ClassLabel::NoTumor => "No Tumor",
            ClassLabel::Pituitary => "Pituitary",
        }
    }

    pub fn class_names() -> Vec<String> {
        ClassLabel::ALL.iter().map(|c| c.name().to_string()).collect()
    }
}

impl FromStr for ClassLabel {
    type Err = BrainScanError;

    /// Accepts directory names as they appear in the dataset (`notumor`)
    /// as well as `no_tumor` and `no tumor`, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !matches!(c, '_' | ' ' | '-'))
            .collect();
        match normalized.as_str() {
            "glioma" => Ok(ClassLabel::Glioma),
            "meningioma" => Ok(ClassLabel::Meningioma),
            "notumor" => Ok(ClassLabel::NoTumor),
            "pituitary" => Ok(ClassLabel::Pituitary),
            _ => Err(BrainScanError::Dataset(format!("unknown class '{}'", s))),
        }
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dataset_directory_names() {
        assert_eq!("glioma".parse::<ClassLabel>().unwrap(), ClassLabel::Glioma);
        assert_eq!("notumor".parse::<ClassLabel>().unwrap(), ClassLabel::NoTumor);
        assert_eq!("No Tumor".parse::<ClassLabel>().unwrap(), ClassLabel::NoTumor);
        assert_eq!("no_tumor".parse::<ClassLabel>().unwrap(), ClassLabel::NoTumor);
        assert_eq!("Pituitary".parse::<ClassLabel>().unwrap(), ClassLabel::Pituitary);
        assert!("tumor".parse::<ClassLabel>().is_err());
    }

    #[test]
    fn index_round_trips_through_all() {
        for (i, label) in ClassLabel::ALL.iter().enumerate() {
            assert_eq!(label.index(), i);
            assert_eq!(ClassLabel::from_index(i), Some(*label));
        }
        assert_eq!(ClassLabel::from_index(4), None);
    }
}
