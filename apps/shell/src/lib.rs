#![cfg_attr(not(test), no_std)]

extern crate heap;
extern crate system;

pub mod command;
pub mod config;
pub mod line_reader;
pub mod shell;

pub use config::ShellConfig;
pub use shell::Shell;
