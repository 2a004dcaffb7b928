//! Subcommand definitions.

use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one turn with PROMPT as the transcript and speak the reply
    Ask {
        /// What you would have said into the microphone
        prompt: String,
    },

    /// Interactive session: every line you type is one turn
    Chat,

    /// Print the effective settings as JSON
    Config,
}
