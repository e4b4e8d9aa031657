//! Per-command delivery flags.

use std::fmt;

/// Controls whether a store command waits for the server's reply.
///
/// The cache passes flags through to the backend untouched; it is up to the
/// backend to honour them. [`InMemoryBackend`](crate::backend::InMemoryBackend)
/// always completes synchronously.
///
/// # Example
///
/// ```
/// use hashset_cache::CommandFlags;
///
/// assert_eq!(CommandFlags::default(), CommandFlags::None);
/// assert!(CommandFlags::FireAndForget.is_fire_and_forget());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CommandFlags {
    /// Wait for the reply and return the real result.
    #[default]
    None,

    /// Send the command and return immediately.
    ///
    /// The returned value is the type's neutral value (`false`, `0`, `None`,
    /// empty) and says nothing about the outcome. Errors are logged, not returned.
    FireAndForget,
}

impl CommandFlags {
    /// True if the caller does not wait for the reply.
    pub fn is_fire_and_forget(&self) -> bool {
        matches!(self, CommandFlags::FireAndForget)
    }
}

impl fmt::Display for CommandFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandFlags::None => write!(f, "None"),
            CommandFlags::FireAndForget => write!(f, "FireAndForget"),
        }
    }
}
