pub mod registry;
pub mod repository;
pub mod xml_repository;
