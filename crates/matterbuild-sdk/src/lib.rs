//! Matter example build SDK
//!
//! `matterbuild-sdk` drives the external toolchains (`gn`, `ninja`, Gradle,
//! `sdkmanager`, `llvm-strip`) that cross-compile Matter example apps for
//! three target families, and talks to the test accessory server used by
//! YAML test runs.
//!
//! # Architecture
//!
//! - **Builders**: one per target family, each following
//!   `generate()` -> `build()` -> `build_outputs()`
//! - **Runner**: every side effect goes through a [`runner::Runner`], so a
//!   build can be executed for real or recorded as a dry run
//! - **GN**: argument serialization and the shared `gn gen` / `ninja` steps
//! - **Toolchain**: Yocto SDK discovery for i.MX
//! - **Bridge**: XML-RPC client for the accessory server
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use matterbuild_sdk::builders::{Builder, ImxBuilder};
//! use matterbuild_sdk::builders::imx::ImxApp;
//! use matterbuild_sdk::runner::PrintOnlyRunner;
//!
//! let runner = Arc::new(PrintOnlyRunner::with_output(std::io::stdout()));
//! let builder = ImxBuilder::new("/src/connectedhomeip", runner, ImxApp::Light, true);
//! builder.generate()?;
//! builder.build()?;
//! # Ok::<(), matterbuild_sdk::BuildError>(())
//! ```

pub mod bridge;
pub mod builders;
pub mod env;
pub mod gn;
pub mod runner;
pub mod toolchain;
pub mod types;

pub use builders::Builder;
pub use types::{BuildError, BuildOutputs, BuildProfile};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
