pub mod auth;
pub mod cache;
pub mod db;
pub mod ratelimit;
pub mod tenant;
