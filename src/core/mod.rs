pub mod errors;
pub mod settings;
pub mod store;
