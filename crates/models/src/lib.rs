pub mod book;
pub mod db;
pub mod user;
