pub mod dynamodb_repository;
pub mod models;
