pub mod connection;
pub mod mapper;
pub mod migrations;
pub mod repository;
pub mod summary;
