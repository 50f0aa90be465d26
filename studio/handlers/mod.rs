pub mod analyze;
pub mod home;
pub mod saliency;
