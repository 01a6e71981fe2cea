#[macro_use]
extern crate diesel;
#[macro_use]
extern crate diesel_migrations;

pub mod configuration;
pub mod connections;
pub mod db;
pub mod delivery;
pub mod discord;
pub mod domain;
pub mod error;
pub mod feeds;
pub mod models;
pub mod schema;
pub mod startup;
pub mod telemetry;
pub mod verifier;
