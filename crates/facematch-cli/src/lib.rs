pub mod cli;
pub mod commands;
pub mod compare;
pub mod config;
pub mod detect;
pub mod doctor;
pub mod errors;
pub mod output;
