pub mod authz;
pub mod book;
pub mod query;
pub mod stats;
pub mod validation;
