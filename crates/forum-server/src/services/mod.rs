//! Background services for forum-server

pub mod archival;

pub use archival::ArchivalSweeper;
