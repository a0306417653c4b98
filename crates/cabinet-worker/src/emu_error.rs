//! Exit codes the emulator reports when it terminates.

use std::fmt;
use std::process::ExitStatus;

/// Emulator exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum EmuError {
    #[default]
    None,
    FailedValidity,
    MissingFiles,
    FatalError,
    Device,
    NoSuchGame,
    InvalidConfig,
    IdentNonRoms,
    IdentPartial,
    IdentNone,
    /// Exit code outside the emulator's documented range.
    Invalid,
    /// Terminated by a signal.
    Killed,
}

impl EmuError {
    /// Map a process exit code; `None` means the process did not exit
    /// normally.
    pub fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            None => Self::Killed,
            Some(0) => Self::None,
            Some(1) => Self::FailedValidity,
            Some(2) => Self::MissingFiles,
            Some(3) => Self::FatalError,
            Some(4) => Self::Device,
            Some(5) => Self::NoSuchGame,
            Some(6) => Self::InvalidConfig,
            Some(7) => Self::IdentNonRoms,
            Some(8) => Self::IdentPartial,
            Some(9) => Self::IdentNone,
            Some(_) => Self::Invalid,
        }
    }

    pub fn from_status(status: ExitStatus) -> Self {
        Self::from_exit_code(status.code())
    }

    pub fn code(self) -> u32 {
        match self {
            Self::None => 0,
            Self::FailedValidity => 1,
            Self::MissingFiles => 2,
            Self::FatalError => 3,
            Self::Device => 4,
            Self::NoSuchGame => 5,
            Self::InvalidConfig => 6,
            Self::IdentNonRoms => 7,
            Self::IdentPartial => 8,
            Self::IdentNone => 9,
            Self::Invalid => 1000,
            Self::Killed => 1001,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::None
    }
}

impl fmt::Display for EmuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::None => "no error",
            Self::FailedValidity => "failed validity checks",
            Self::MissingFiles => "missing files",
            Self::FatalError => "fatal error",
            Self::Device => "device initialization error",
            Self::NoSuchGame => "no such machine",
            Self::InvalidConfig => "invalid configuration",
            Self::IdentNonRoms => "identified all non-ROM files",
            Self::IdentPartial => "identified some files but not all",
            Self::IdentNone => "identified no files",
            Self::Invalid => "invalid exit code",
            Self::Killed => "killed",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(EmuError::from_exit_code(Some(0)), EmuError::None);
        assert_eq!(EmuError::from_exit_code(Some(2)), EmuError::MissingFiles);
        assert_eq!(EmuError::from_exit_code(Some(9)), EmuError::IdentNone);
        assert_eq!(EmuError::from_exit_code(Some(42)), EmuError::Invalid);
        assert_eq!(EmuError::from_exit_code(Some(-1)), EmuError::Invalid);
        assert_eq!(EmuError::from_exit_code(None), EmuError::Killed);

        for code in 0..10 {
            assert_eq!(EmuError::from_exit_code(Some(code)).code(), code as u32);
        }
        assert_eq!(EmuError::Killed.code(), 1001);
        assert!(EmuError::None.is_success());
    }
}
