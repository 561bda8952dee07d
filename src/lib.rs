/*
 * Responsibility
 * - crate の module 宣言 (binary と integration test から使う)
 */
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod repos;
pub mod services;
pub mod state;
