//! The command sink abstraction units are submitted to.

use crate::error::Result;

/// Anything that accepts and executes command text.
///
/// Submissions are blocking; implementations enforce their own timeout.
pub trait CommandSink {
    /// Execute one command. An `Err` marks the unit as failed.
    fn submit(&mut self, command: &str) -> Result<()>;

    /// Check that the sink is reachable before the run starts.
    fn probe(&mut self) -> Result<()> {
        Ok(())
    }

    /// Short description for logs (never includes credentials).
    fn describe(&self) -> String;
}

impl<S: CommandSink + ?Sized> CommandSink for Box<S> {
    fn submit(&mut self, command: &str) -> Result<()> {
        (**self).submit(command)
    }

    fn probe(&mut self) -> Result<()> {
        (**self).probe()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// A sink that accepts every command without executing it.
///
/// Used for dry runs; records what would have been submitted.
#[derive(Debug, Default)]
pub struct NullCommandSink {
    submitted: Vec<String>,
}

impl NullCommandSink {
    /// Create an empty null sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands accepted so far, in submission order.
    pub fn submitted(&self) -> &[String] {
        &self.submitted
    }
}

impl CommandSink for NullCommandSink {
    fn submit(&mut self, command: &str) -> Result<()> {
        let preview: String = command.chars().take(50).collect();
        log::debug!("Simulating execution; command={}", preview.replace('\n', " "));
        self.submitted.push(command.to_string());
        Ok(())
    }

    fn describe(&self) -> String {
        "null (dry run)".to_string()
    }
}
