//! Quick BI organization users

pub mod resource_user;

pub use resource_user::UserResource;
