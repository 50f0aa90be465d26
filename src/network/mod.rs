pub mod network;
pub mod spec;

pub use network::Network;
pub use spec::{ArchitectureSpec, LayerSpec, CUSTOM_CNN_FILTERS};
