//! Error classification for exit codes

use hammer_core::{Codex32Error, CoreError};
use thiserror::Error;

/// Exit code for failures.
pub const EXIT_FAILURE: u8 = 1;

/// Exit code for bad input, matching clap's own usage errors.
pub const EXIT_USAGE: u8 = 2;

/// Invalid flags or input detected after argument parsing.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct UsageError(pub String);

impl UsageError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Exit code for `err`: user input errors anywhere in the chain exit with
/// [`EXIT_USAGE`], everything else with [`EXIT_FAILURE`].
pub fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if cause.is::<UsageError>() || cause.is::<Codex32Error>() {
            return EXIT_USAGE;
        }
        if let Some(e) = cause.downcast_ref::<CoreError>() {
            match e {
                CoreError::Codex32(_)
                | CoreError::Mnemonic(_)
                | CoreError::InvalidPath(_)
                | CoreError::Descriptor(_) => return EXIT_USAGE,
                _ => {}
            }
        }
    }
    EXIT_FAILURE
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn classifies_errors() {
        let err = anyhow::Error::new(UsageError::new("bad flag"));
        assert_eq!(exit_code(&err), EXIT_USAGE);

        let err: anyhow::Error = Err::<(), _>(CoreError::Codex32(Codex32Error::InvalidChecksum))
            .context("parsing share")
            .unwrap_err();
        assert_eq!(exit_code(&err), EXIT_USAGE);

        let err = anyhow::Error::new(CoreError::Cbor("truncated".into()));
        assert_eq!(exit_code(&err), EXIT_FAILURE);

        let err = anyhow::anyhow!("serial port vanished");
        assert_eq!(exit_code(&err), EXIT_FAILURE);
    }
}
