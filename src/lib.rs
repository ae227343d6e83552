pub mod configuration;
pub mod controller;
pub mod deception;
pub mod decoys;
pub mod error_handling;
pub mod events;
pub mod geoip;
pub mod network;
pub mod session_management;
pub mod storage;
pub mod web_interface;
