pub mod data_source_protocols;

pub use data_source_protocols::NasProtocolsDataSource;
