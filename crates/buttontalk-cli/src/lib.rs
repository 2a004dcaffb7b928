//! Command-line front end for buttontalk.
//!
//! The binary is the composition root: it loads settings, picks the
//! language-model provider and wires console stand-ins for the microphone,
//! speaker and display into a [`buttontalk_voice::SessionController`].
//! Turns are driven by typed text instead of a push-to-talk button.

#![deny(unused_crate_dependencies)]

// Used by main.rs
use dotenvy as _;
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod console;
pub mod error;
pub mod handlers;
pub mod parser;

pub use bootstrap::{CliContext, bootstrap, load_settings};
pub use commands::Commands;
pub use error::CliError;
pub use parser::Cli;
