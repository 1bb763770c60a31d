//! Build adapters for the supported target families.
//!
//! Each builder composes one board, one app and one profile with a source
//! root and a [`Runner`]. The lifecycle is always the same:
//!
//! 1. [`Builder::generate`] - produce build configuration (`gn gen`)
//! 2. [`Builder::build`] - run the native (and for Android, Gradle) build
//! 3. [`Builder::build_outputs`] - report where artifacts are expected
//!
//! ## Builders
//!
//! | Builder | Family | Output |
//! |---------|--------|--------|
//! | [`AndroidBuilder`] | Android | APK, JNI `.so` libraries and jars |
//! | [`BouffalolabBuilder`] | Bouffalo Lab BL602/BL702 | `.out` firmware image and map |
//! | [`ImxBuilder`] | NXP i.MX (Yocto SDK) | Linux executable and map |
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use matterbuild_sdk::builders::{AndroidBuilder, Builder};
//! use matterbuild_sdk::builders::android::{AndroidApp, AndroidBoard};
//! use matterbuild_sdk::runner::ShellRunner;
//! use matterbuild_sdk::BuildProfile;
//!
//! let runner = Arc::new(ShellRunner::new().current_dir("/src/connectedhomeip"));
//! let builder = AndroidBuilder::new(
//!     "/src/connectedhomeip",
//!     runner,
//!     AndroidBoard::Arm64,
//!     AndroidApp::ChipTool,
//!     BuildProfile::Release,
//! );
//! builder.generate()?;
//! builder.build()?;
//! for (label, path) in builder.build_outputs()? {
//!     println!("{label}: {}", path.display());
//! }
//! # Ok::<(), matterbuild_sdk::BuildError>(())
//! ```

pub mod android;
pub mod bouffalolab;
pub mod imx;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::runner::Runner;
use crate::types::{BuildError, BuildOutputs};

pub use android::AndroidBuilder;
pub use bouffalolab::BouffalolabBuilder;
pub use imx::ImxBuilder;

/// Default directory, relative to the source root, that output directories
/// are created in.
pub const DEFAULT_OUTPUT_PREFIX: &str = "out";

/// State every builder carries: where the sources are, who executes
/// commands, and where output goes.
#[derive(Clone)]
pub struct BuilderBase {
    root: PathBuf,
    runner: Arc<dyn Runner>,
    identifier: String,
    output_dir: PathBuf,
}

impl BuilderBase {
    /// Creates a base whose output directory is `<root>/out/<identifier>`.
    pub fn new(
        root: impl Into<PathBuf>,
        runner: Arc<dyn Runner>,
        identifier: impl Into<String>,
    ) -> Self {
        let root = root.into();
        let identifier = identifier.into();
        let output_dir = root.join(DEFAULT_OUTPUT_PREFIX).join(&identifier);
        Self {
            root,
            runner,
            identifier,
            output_dir,
        }
    }

    /// Places the output directory at `<prefix>/<identifier>`.
    pub fn output_prefix(mut self, prefix: impl AsRef<Path>) -> Self {
        self.output_dir = prefix.as_ref().join(&self.identifier);
        self
    }

    /// Places the output directory at exactly `dir`.
    pub fn output_dir_at(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn runner(&self) -> &dyn Runner {
        self.runner.as_ref()
    }

    pub fn dry_run(&self) -> bool {
        self.runner.dry_run()
    }

    /// Funnels a command through the runner.
    pub fn execute(&self, cmd: &[String], title: Option<&str>) -> Result<(), BuildError> {
        self.runner.run(cmd, title)
    }
}

impl std::fmt::Debug for BuilderBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuilderBase")
            .field("root", &self.root)
            .field("identifier", &self.identifier)
            .field("output_dir", &self.output_dir)
            .field("dry_run", &self.runner.dry_run())
            .finish()
    }
}

/// Common lifecycle of every build adapter.
pub trait Builder {
    fn base(&self) -> &BuilderBase;

    /// Produces build configuration files. Skipped when the output
    /// directory already exists.
    fn generate(&self) -> Result<(), BuildError>;

    /// Runs the build against the generated output directory.
    fn build(&self) -> Result<(), BuildError>;

    /// Expected artifacts, keyed by label. Paths are not checked for
    /// existence.
    fn build_outputs(&self) -> Result<BuildOutputs, BuildError>;

    fn identifier(&self) -> &str {
        self.base().identifier()
    }

    fn output_dir(&self) -> &Path {
        self.base().output_dir()
    }

    /// Copies every build output into `target_dir`, named by its label.
    ///
    /// Labels may contain `/`; intermediate directories are created.
    /// Does nothing on a dry-run runner.
    fn copy_artifacts(&self, target_dir: &Path) -> Result<(), BuildError> {
        if self.base().dry_run() {
            tracing::info!(
                "Dry run: not copying artifacts of {} into {}",
                self.identifier(),
                target_dir.display()
            );
            return Ok(());
        }

        for (label, source) in self.build_outputs()? {
            let target = target_dir.join(&label);
            tracing::info!("Copying {} into {}", source.display(), label);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(&source, &target).map_err(|e| {
                BuildError::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "failed to copy {} to {}: {}",
                        source.display(),
                        target.display(),
                        e
                    ),
                ))
            })?;
        }
        Ok(())
    }
}
