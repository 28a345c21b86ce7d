//! Physical storage layouts

pub mod columnar;

pub use columnar::Column;
