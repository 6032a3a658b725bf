#[macro_use]
extern crate rocket;

pub mod api;
pub mod common;
pub mod config;
pub mod database;
pub mod grant;
pub mod models;
pub mod storage;
pub mod workflow;
