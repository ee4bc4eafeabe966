pub mod resource_db_instance;

pub use resource_db_instance::DbInstanceResource;
