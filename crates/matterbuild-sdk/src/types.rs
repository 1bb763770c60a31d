//! Core types for matterbuild-sdk.
//!
//! - [`BuildError`] - Error type for every builder, runner and toolchain operation
//! - [`BuildProfile`] - Debug or release build variant
//! - [`BuildOutputs`] - Mapping from artifact label to expected path

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Mapping from a human-readable artifact label to the path the build
/// is expected to produce it at.
///
/// Produced fresh on every call to
/// [`Builder::build_outputs`](crate::builders::Builder::build_outputs); the
/// paths are not checked for existence.
pub type BuildOutputs = BTreeMap<String, PathBuf>;

/// Error types for matterbuild-sdk build operations.
///
/// Every failure is fatal to the build that raised it; nothing in this crate
/// retries.
///
/// # Example
///
/// ```
/// use matterbuild_sdk::BuildError;
/// use matterbuild_sdk::builders::android::AndroidBoard;
///
/// match "riscv".parse::<AndroidBoard>() {
///     Err(BuildError::UnknownTarget { kind, name }) => {
///         assert_eq!(kind, "android board");
///         assert_eq!(name, "riscv");
///     }
///     other => panic!("unexpected: {:?}", other),
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A board, app or profile name is outside its closed set.
    #[error("unrecognized target: unknown {kind} '{name}'")]
    UnknownTarget {
        /// What was being resolved (e.g. "android board").
        kind: &'static str,
        /// The rejected name.
        name: String,
    },

    /// A required environment variable is not set.
    #[error("environment variable {name} missing, {purpose}")]
    MissingEnv {
        /// Variable name.
        name: String,
        /// What the variable is needed for.
        purpose: String,
    },

    /// None of several candidate tool locations is executable.
    #[error("none of {} is executable by the current user", format_paths(.candidates))]
    NoExecutableCandidate {
        /// Every location that was checked.
        candidates: Vec<PathBuf>,
    },

    /// A directory that must be written to lacks the write permission.
    #[error("'{}' is NOT writable by the current user ({purpose})", path.display())]
    NotWritable {
        /// The directory that was checked.
        path: PathBuf,
        /// Why write access is needed.
        purpose: String,
    },

    /// The SDK toolchain description could not be used.
    #[error("toolchain error: {0}")]
    Toolchain(String),

    /// The requested combination of options is not supported.
    #[error("configuration error: {0}")]
    Config(String),

    /// An external command could not be started or exited unsuccessfully.
    #[error("{title} failed.\n\nCommand: {command}\n\n{detail}")]
    Command {
        /// Human-readable step title.
        title: String,
        /// The shell-rendered command line.
        command: String,
        /// Exit status or spawn error.
        detail: String,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}. Check file paths and permissions")]
    Io(#[from] std::io::Error),
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("'{}'", p.display()))
        .collect::<Vec<_>>()
        .join(" and ")
}

/// Build profile controlling optimization and debug info.
///
/// # Example
///
/// ```
/// use matterbuild_sdk::BuildProfile;
///
/// assert_eq!(BuildProfile::default(), BuildProfile::Debug);
/// assert_eq!(BuildProfile::Release.as_str(), "release");
/// assert_eq!("debug".parse::<BuildProfile>().unwrap(), BuildProfile::Debug);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BuildProfile {
    /// Debug build with symbols kept.
    #[default]
    Debug,
    /// Optimized build; shared libraries are stripped afterwards.
    Release,
}

impl BuildProfile {
    /// Returns the string representation of the profile.
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildProfile::Debug => "debug",
            BuildProfile::Release => "release",
        }
    }

    /// Whether this is the debug profile.
    pub fn is_debug(&self) -> bool {
        matches!(self, BuildProfile::Debug)
    }
}

impl std::str::FromStr for BuildProfile {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(BuildProfile::Debug),
            "release" => Ok(BuildProfile::Release),
            other => Err(BuildError::UnknownTarget {
                kind: "build profile",
                name: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for BuildProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_round_trip_names() {
        for profile in [BuildProfile::Debug, BuildProfile::Release] {
            assert_eq!(profile.as_str().parse::<BuildProfile>().unwrap(), profile);
        }
    }

    #[test]
    fn test_profile_unknown_name() {
        let err = "fast".parse::<BuildProfile>().unwrap_err();
        assert!(err.to_string().contains("unrecognized target"));
        assert!(err.to_string().contains("fast"));
    }

    #[test]
    fn test_no_executable_candidate_lists_all_paths() {
        let err = BuildError::NoExecutableCandidate {
            candidates: vec![PathBuf::from("/a/sdkmanager"), PathBuf::from("/b/sdkmanager")],
        };
        let msg = err.to_string();
        assert!(msg.contains("'/a/sdkmanager' and '/b/sdkmanager'"));
    }
}
