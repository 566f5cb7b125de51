//! Statement module containing the statement store and transaction importer

pub mod importer;
pub mod store;

pub use importer::*;
pub use store::*;
