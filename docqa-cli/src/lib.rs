//! Command-line front end for docqa.
//!
//! Indexes the files named on the command line into a fresh session, then
//! answers one question (`--question`) or reads questions interactively.

pub mod app;
pub mod args;
pub mod files;
pub mod providers;

pub use app::{Output, open_session, render_report, run};
pub use args::{Backend, Cli};
