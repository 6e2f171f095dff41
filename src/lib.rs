//! toshokan - anime media library classifier and organizer
//!
//! Scans a directory of loosely named video files, infers series, season,
//! episode and language from filename conventions, confirms each guess
//! against the Jikan metadata API, and moves confirmed files into a
//! canonical `Series/Season N/Series - SxxExx [LANG].ext` library layout.

pub mod cli;
pub mod commands;
pub mod config;
pub mod services;
