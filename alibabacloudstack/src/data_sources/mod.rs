//! Data source implementations

pub mod nas;

pub use nas::NasProtocolsDataSource;
