pub mod adamax;

pub use adamax::Adamax;
