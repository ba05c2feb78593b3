pub mod console;
pub mod prompts;

pub use prompts::{
    parse_confirmation, Confirmation, Prompter, ScriptedPrompter, TerminalPrompter, GPU_CHOICES,
};
