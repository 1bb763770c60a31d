//! Android build automation
//!
//! Builds the JNI libraries with GN + Ninja, stages them (and the Java
//! archives GN produces) into the Gradle project of the selected app, then
//! runs the Gradle wrapper to produce the APK.
//!
//! Android Studio boards (`androidstudio-*`) instead generate an IDE project
//! and let Gradle drive the native build from source.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::builders::{Builder, BuilderBase};
use crate::env;
use crate::gn::GnArgs;
use crate::runner::Runner;
use crate::types::{BuildError, BuildOutputs, BuildProfile};

const NDK_HOME_VAR: &str = "ANDROID_NDK_HOME";
const SDK_HOME_VAR: &str = "ANDROID_HOME";

/// Android target CPU, optionally as an Android Studio (IDE) project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AndroidBoard {
    Arm,
    Arm64,
    X64,
    X86,
    AndroidStudioArm,
    AndroidStudioArm64,
    AndroidStudioX64,
    AndroidStudioX86,
}

impl AndroidBoard {
    pub const ALL: [AndroidBoard; 8] = [
        AndroidBoard::Arm,
        AndroidBoard::Arm64,
        AndroidBoard::X64,
        AndroidBoard::X86,
        AndroidBoard::AndroidStudioArm,
        AndroidBoard::AndroidStudioArm64,
        AndroidBoard::AndroidStudioX64,
        AndroidBoard::AndroidStudioX86,
    ];

    /// Name used on the command line and in build identifiers.
    pub fn as_str(&self) -> &'static str {
        match self {
            AndroidBoard::Arm => "arm",
            AndroidBoard::Arm64 => "arm64",
            AndroidBoard::X64 => "x64",
            AndroidBoard::X86 => "x86",
            AndroidBoard::AndroidStudioArm => "androidstudio-arm",
            AndroidBoard::AndroidStudioArm64 => "androidstudio-arm64",
            AndroidBoard::AndroidStudioX64 => "androidstudio-x64",
            AndroidBoard::AndroidStudioX86 => "androidstudio-x86",
        }
    }

    /// GN `target_cpu`.
    pub fn target_cpu_name(&self) -> &'static str {
        match self {
            AndroidBoard::Arm | AndroidBoard::AndroidStudioArm => "arm",
            AndroidBoard::Arm64 | AndroidBoard::AndroidStudioArm64 => "arm64",
            AndroidBoard::X64 | AndroidBoard::AndroidStudioX64 => "x64",
            AndroidBoard::X86 | AndroidBoard::AndroidStudioX86 => "x86",
        }
    }

    /// Android ABI directory name under `jniLibs/`.
    pub fn abi_name(&self) -> &'static str {
        match self.target_cpu_name() {
            "arm" => "armeabi-v7a",
            "arm64" => "arm64-v8a",
            "x64" => "x86_64",
            _ => "x86",
        }
    }

    /// Whether this board generates an Android Studio project.
    pub fn is_ide(&self) -> bool {
        matches!(
            self,
            AndroidBoard::AndroidStudioArm
                | AndroidBoard::AndroidStudioArm64
                | AndroidBoard::AndroidStudioX64
                | AndroidBoard::AndroidStudioX86
        )
    }
}

impl FromStr for AndroidBoard {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AndroidBoard::ALL
            .into_iter()
            .find(|board| board.as_str() == s)
            .ok_or_else(|| BuildError::UnknownTarget {
                kind: "android board",
                name: s.to_string(),
            })
    }
}

/// Android application to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AndroidApp {
    ChipTool,
    ChipTest,
    TvServer,
    TvCastingApp,
    /// Listed so it can be named, but has no Android app layout; every
    /// operation that needs an app name rejects it.
    JavaMatterController,
}

impl AndroidApp {
    pub const ALL: [AndroidApp; 5] = [
        AndroidApp::ChipTool,
        AndroidApp::ChipTest,
        AndroidApp::TvServer,
        AndroidApp::TvCastingApp,
        AndroidApp::JavaMatterController,
    ];

    /// Name used on the command line and in build identifiers.
    pub fn as_str(&self) -> &'static str {
        match self {
            AndroidApp::ChipTool => "chip-tool",
            AndroidApp::ChipTest => "chip-test",
            AndroidApp::TvServer => "tv-server",
            AndroidApp::TvCastingApp => "tv-casting-app",
            AndroidApp::JavaMatterController => "java-matter-controller",
        }
    }

    /// Directory under `examples/android/` and prefix of output labels.
    pub fn app_name(&self) -> Result<&'static str, BuildError> {
        match self {
            AndroidApp::ChipTool => Ok("CHIPTool"),
            AndroidApp::ChipTest => Ok("CHIPTest"),
            AndroidApp::TvServer => Ok("tv-server"),
            AndroidApp::TvCastingApp => Ok("tv-casting"),
            AndroidApp::JavaMatterController => Err(BuildError::UnknownTarget {
                kind: "android app",
                name: self.as_str().to_string(),
            }),
        }
    }

    /// App-specific GN argument overrides.
    pub fn app_gn_args(&self) -> GnArgs {
        let mut args = GnArgs::new();
        if matches!(self, AndroidApp::TvServer | AndroidApp::TvCastingApp) {
            args.insert("chip_config_network_layer_ble", false);
        }
        args
    }

    /// Directory under `examples/` for apps that live outside
    /// `examples/android/`.
    pub fn example_name(&self) -> Option<&'static str> {
        match self {
            AndroidApp::TvServer => Some("tv-app"),
            AndroidApp::TvCastingApp => Some("tv-casting-app"),
            _ => None,
        }
    }

    /// Gradle modules built one at a time.
    pub fn modules(&self) -> Option<&'static [&'static str]> {
        match self {
            AndroidApp::TvServer => Some(&["platform-app", "content-app"]),
            _ => None,
        }
    }
}

impl FromStr for AndroidApp {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AndroidApp::ALL
            .into_iter()
            .find(|app| app.as_str() == s)
            .ok_or_else(|| BuildError::UnknownTarget {
                kind: "android app",
                name: s.to_string(),
            })
    }
}

/// Native libraries and jars copied into a Gradle project before it builds.
struct Staging {
    jnilibs_dir: PathBuf,
    libs_dir: PathBuf,
    libs: &'static [&'static str],
    /// (destination name, source path relative to `<out>/lib`)
    jars: &'static [(&'static str, &'static str)],
}

const SRC_ANDROID_LIBS: &[&str] = &[
    "libSetupPayloadParser.so",
    "libCHIPController.so",
    "libc++_shared.so",
];

const SRC_ANDROID_JARS: &[(&str, &str)] = &[
    ("CHIPController.jar", "src/controller/java/CHIPController.jar"),
    (
        "SetupPayloadParser.jar",
        "src/setup_payload/java/SetupPayloadParser.jar",
    ),
    ("AndroidPlatform.jar", "src/platform/android/AndroidPlatform.jar"),
];

const TV_CASTING_LIBS: &[&str] = &["libc++_shared.so", "libTvCastingApp.so"];

const TV_CASTING_JARS: &[(&str, &str)] = &[
    (
        "AndroidPlatform.jar",
        "third_party/connectedhomeip/src/platform/android/AndroidPlatform.jar",
    ),
    (
        "CHIPAppServer.jar",
        "third_party/connectedhomeip/src/app/server/java/CHIPAppServer.jar",
    ),
    ("TvCastingApp.jar", "TvCastingApp.jar"),
];

const TV_APP_LIBS: &[&str] = &["libSetupPayloadParser.so", "libc++_shared.so", "libTvApp.so"];

const TV_APP_JARS: &[(&str, &str)] = &[
    (
        "SetupPayloadParser.jar",
        "third_party/connectedhomeip/src/setup_payload/java/SetupPayloadParser.jar",
    ),
    (
        "AndroidPlatform.jar",
        "third_party/connectedhomeip/src/platform/android/AndroidPlatform.jar",
    ),
    (
        "CHIPAppServer.jar",
        "third_party/connectedhomeip/src/app/server/java/CHIPAppServer.jar",
    ),
    ("TvApp.jar", "TvApp.jar"),
];

/// Android builder that handles the complete build pipeline
#[derive(Debug, Clone)]
pub struct AndroidBuilder {
    base: BuilderBase,
    board: AndroidBoard,
    app: AndroidApp,
    profile: BuildProfile,
}

impl AndroidBuilder {
    /// Creates a new Android builder
    ///
    /// # Arguments
    ///
    /// * `root` - Root of the source checkout
    /// * `runner` - Executes (or records) every command
    /// * `board` / `app` / `profile` - What to build
    pub fn new(
        root: impl Into<PathBuf>,
        runner: Arc<dyn Runner>,
        board: AndroidBoard,
        app: AndroidApp,
        profile: BuildProfile,
    ) -> Self {
        let mut identifier = format!("android-{}-{}", board.as_str(), app.as_str());
        if !profile.is_debug() {
            identifier.push_str("-release");
        }
        Self {
            base: BuilderBase::new(root, runner, identifier),
            board,
            app,
            profile,
        }
    }

    /// Places the output directory under `prefix`.
    pub fn output_prefix(mut self, prefix: impl AsRef<std::path::Path>) -> Self {
        self.base = self.base.output_prefix(prefix);
        self
    }

    pub fn board(&self) -> AndroidBoard {
        self.board
    }

    pub fn app(&self) -> AndroidApp {
        self.app
    }

    pub fn profile(&self) -> BuildProfile {
        self.profile
    }

    fn root_str(&self) -> String {
        self.base.root().display().to_string()
    }

    fn out_str(&self) -> String {
        self.base.output_dir().display().to_string()
    }

    /// `(legacy, cmdline-tools/latest)` sdkmanager locations.
    fn sdk_managers(android_home: &str) -> (PathBuf, PathBuf) {
        let home = PathBuf::from(android_home);
        (
            home.join("tools").join("bin").join("sdkmanager"),
            home.join("cmdline-tools")
                .join("latest")
                .join("bin")
                .join("sdkmanager"),
        )
    }

    /// Verifies the NDK/SDK variables and that SDK licenses can be accepted.
    ///
    /// - `ANDROID_NDK_HOME` and `ANDROID_HOME` must be set
    /// - an executable `sdkmanager` must exist under `tools/bin` or
    ///   `cmdline-tools/latest/bin`
    /// - `$ANDROID_HOME/licenses` must be writable, or `$ANDROID_HOME`
    ///   itself when the licenses folder does not exist yet
    pub fn validate_build_environment(&self) -> Result<(), BuildError> {
        for name in [NDK_HOME_VAR, SDK_HOME_VAR] {
            env::require_var(name, "cannot build android libraries")?;
        }
        let android_home = env::require_var(SDK_HOME_VAR, "cannot build android libraries")?;

        let (sdk_manager, new_sdk_manager) = Self::sdk_managers(&android_home);
        if !env::is_executable_file(&sdk_manager) && !env::is_executable_file(&new_sdk_manager) {
            return Err(BuildError::NoExecutableCandidate {
                candidates: vec![sdk_manager, new_sdk_manager],
            });
        }

        let android_home = PathBuf::from(android_home);
        let licenses = android_home.join("licenses");
        if !licenses.exists() {
            env::ensure_writable(
                &android_home,
                "needed to create licenses folder for accept",
            )?;
        } else {
            env::ensure_writable(&licenses, "needed to accept licenses")?;
        }
        Ok(())
    }

    /// GN arguments for the JNI build.
    pub fn gn_args(&self) -> Result<GnArgs, BuildError> {
        let mut args = GnArgs::new();
        args.insert("target_os", "android");
        args.insert("target_cpu", self.board.target_cpu_name());
        args.insert(
            "android_ndk_root",
            env::require_var(NDK_HOME_VAR, "cannot build android libraries")?,
        );
        args.insert(
            "android_sdk_root",
            env::require_var(SDK_HOME_VAR, "cannot build android libraries")?,
        );
        if !self.profile.is_debug() {
            args.insert("is_debug", false);
        }
        args.extend(self.app.app_gn_args());
        Ok(args)
    }

    fn accept_licenses(&self) -> Result<(), BuildError> {
        let android_home = env::require_var(SDK_HOME_VAR, "cannot accept SDK licenses")?;
        let (sdk_manager, new_sdk_manager) = Self::sdk_managers(&android_home);

        let (manager, title) = if env::is_executable_file(&new_sdk_manager) {
            (new_sdk_manager, "Accepting NDK licenses @ cmdline-tools")
        } else {
            (sdk_manager, "Accepting NDK licenses @ tools")
        };
        self.base.execute(
            &[
                "bash".to_string(),
                "-c".to_string(),
                format!("yes | {} --licenses >/dev/null", manager.display()),
            ],
            Some(title),
        )
    }

    fn staging(&self) -> Result<Staging, BuildError> {
        let abi = self.board.abi_name();
        let staging = match self.app.example_name() {
            None => {
                let app_dir = self
                    .base
                    .root()
                    .join("examples/android")
                    .join(self.app.app_name()?);
                Staging {
                    jnilibs_dir: app_dir.join("app/libs/jniLibs").join(abi),
                    libs_dir: app_dir.join("app/libs"),
                    libs: SRC_ANDROID_LIBS,
                    jars: SRC_ANDROID_JARS,
                }
            }
            Some(example) => {
                let app_dir = self.base.root().join("examples").join(example).join("android/App");
                let (libs, jars) = match self.app {
                    AndroidApp::TvCastingApp => (TV_CASTING_LIBS, TV_CASTING_JARS),
                    _ => (TV_APP_LIBS, TV_APP_JARS),
                };
                Staging {
                    jnilibs_dir: app_dir.join("app/libs/jniLibs").join(abi),
                    libs_dir: app_dir.join("app/libs"),
                    libs,
                    jars,
                }
            }
        };
        Ok(staging)
    }

    /// Copies native libraries and jars into the Gradle project.
    ///
    /// Copies go through the runner (as `mkdir`/`cp`) so a dry run lists
    /// them too.
    fn copy_to_app(&self, staging: &Staging) -> Result<(), BuildError> {
        let out = self.base.output_dir();
        self.base.execute(
            &[
                "mkdir".to_string(),
                "-p".to_string(),
                staging.jnilibs_dir.display().to_string(),
            ],
            Some(&format!("Prepare Native libs {}", self.base.identifier())),
        )?;

        for lib in staging.libs {
            let src = out.join("lib").join("jni").join(self.board.abi_name()).join(lib);
            self.base.execute(
                &[
                    "cp".to_string(),
                    src.display().to_string(),
                    staging.jnilibs_dir.join(lib).display().to_string(),
                ],
                None,
            )?;
        }

        for (jar, source) in staging.jars {
            self.base.execute(
                &[
                    "cp".to_string(),
                    out.join("lib").join(source).display().to_string(),
                    staging.libs_dir.join(jar).display().to_string(),
                ],
                None,
            )?;
        }
        Ok(())
    }

    fn gradlew_build_src_android(&self) -> Result<(), BuildError> {
        let app_dir = format!("{}/examples/android/{}", self.root_str(), self.app.app_name()?);
        let out = self.out_str();
        self.base.execute(
            &[
                format!("{}/gradlew", app_dir),
                "-p".to_string(),
                app_dir.clone(),
                format!("-PmatterBuildSrcDir={}", out),
                "-PmatterSdkSourceBuild=false".to_string(),
                format!("-PbuildDir={}", out),
                "assembleDebug".to_string(),
            ],
            Some(&format!("Building APP {}", self.base.identifier())),
        )
    }

    fn gradlew_build_example_android(&self, example: &str) -> Result<(), BuildError> {
        let app_dir = format!("{}/examples/{}/android/App", self.root_str(), example);
        let out = self.out_str();
        let command = |build_dir: String, task: String| {
            vec![
                format!("{}/gradlew", app_dir),
                "-p".to_string(),
                format!("{}/", app_dir),
                format!("-PmatterBuildSrcDir={}", out),
                "-PmatterSdkSourceBuild=false".to_string(),
                format!("-PbuildDir={}", build_dir),
                task,
            ]
        };

        match self.app.modules() {
            Some(modules) => {
                for module in modules {
                    self.base.execute(
                        &command(format!("{}/{}", out, module), format!(":{}:assembleDebug", module)),
                        Some(&format!(
                            "Building Example {}, module {}",
                            self.base.identifier(),
                            module
                        )),
                    )?;
                }
                Ok(())
            }
            None => self.base.execute(
                &command(out.clone(), "assembleDebug".to_string()),
                Some(&format!("Building Example {}", self.base.identifier())),
            ),
        }
    }

    fn gradlew_build_ide(&self) -> Result<(), BuildError> {
        let app_dir = format!("{}/examples/android/{}", self.root_str(), self.app.app_name()?);
        self.base.execute(
            &[
                format!("{}/gradlew", app_dir),
                "-p".to_string(),
                app_dir.clone(),
                format!("-PmatterBuildSrcDir={}", self.out_str()),
                "-PmatterSdkSourceBuild=true".to_string(),
                format!("-PmatterSourceBuildAbiFilters={}", self.board.abi_name()),
                "assembleDebug".to_string(),
            ],
            Some(&format!("Building APP {}", self.base.identifier())),
        )
    }

    /// Runs `llvm-strip -s` on every shared library in the JNI output.
    fn strip_symbols(&self) -> Result<(), BuildError> {
        let libs_dir = self
            .base
            .output_dir()
            .join("lib")
            .join("jni")
            .join(self.board.abi_name());

        let entries = match std::fs::read_dir(&libs_dir) {
            Ok(entries) => entries,
            Err(e) if self.base.dry_run() => {
                tracing::warn!(
                    "Dry run: cannot list {} ({}), skipping symbol stripping",
                    libs_dir.display(),
                    e
                );
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let mut libs: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".so"))
            .collect();
        libs.sort();

        for lib in libs {
            self.base.execute(
                &[
                    "llvm-strip".to_string(),
                    "-s".to_string(),
                    libs_dir.join(&lib).display().to_string(),
                ],
                Some(&format!("Stripping symbols from {}", lib)),
            )?;
        }
        Ok(())
    }
}

impl Builder for AndroidBuilder {
    fn base(&self) -> &BuilderBase {
        &self.base
    }

    fn generate(&self) -> Result<(), BuildError> {
        self.base.execute(
            &[
                "python3".to_string(),
                "third_party/android_deps/set_up_android_deps.py".to_string(),
            ],
            Some("Setting up Android deps through Gradle"),
        )?;
        self.base.execute(
            &["third_party/java_deps/set_up_java_deps.sh".to_string()],
            Some("Setting up Java deps"),
        )?;

        if self.base.output_dir().exists() {
            tracing::info!(
                "Output directory {} already exists, skipping generation",
                self.base.output_dir().display()
            );
            return Ok(());
        }

        if !self.base.dry_run() {
            self.validate_build_environment()?;
        }

        let mut gn_gen = vec![
            "gn".to_string(),
            "gen".to_string(),
            "--check".to_string(),
            "--fail-on-unused-args".to_string(),
            self.out_str(),
            self.gn_args()?.to_flag(),
        ];
        if let Some(example) = self.app.example_name() {
            gn_gen.push(format!("--root={}/examples/{}/android/", self.root_str(), example));
        }
        if self.board.is_ide() {
            gn_gen.push("--ide=json".to_string());
            gn_gen.push("--json-ide-script=//scripts/examples/gn_to_cmakelists.py".to_string());
        }
        self.base.execute(
            &gn_gen,
            Some(&format!("Generating {}", self.base.identifier())),
        )?;

        self.accept_licenses()
    }

    fn build(&self) -> Result<(), BuildError> {
        if self.board.is_ide() {
            return self.gradlew_build_ide();
        }

        self.base.execute(
            &["ninja".to_string(), "-C".to_string(), self.out_str()],
            Some(&format!("Building JNI {}", self.base.identifier())),
        )?;

        let staging = self.staging()?;
        self.copy_to_app(&staging)?;
        match self.app.example_name() {
            None => self.gradlew_build_src_android()?,
            Some(example) => self.gradlew_build_example_android(example)?,
        }

        if !self.profile.is_debug() {
            self.strip_symbols()?;
        }
        Ok(())
    }

    fn build_outputs(&self) -> Result<BuildOutputs, BuildError> {
        let app_name = self.app.app_name()?;
        let out = self.base.output_dir();
        let mut outputs = BuildOutputs::new();

        if self.board.is_ide() {
            outputs.insert(
                format!("{}-debug.apk", app_name),
                self.base
                    .root()
                    .join("examples/android")
                    .join(app_name)
                    .join("app/build/outputs/apk/debug/app-debug.apk"),
            );
            return Ok(outputs);
        }

        if self.app.example_name().is_some() {
            if self.app == AndroidApp::TvServer {
                for module in ["platform-app", "content-app"] {
                    outputs.insert(
                        format!("tv-sever-{}-debug.apk", module),
                        out.join(module)
                            .join("outputs/apk/debug")
                            .join(format!("{}-debug.apk", module)),
                    );
                }
            } else {
                outputs.insert(
                    format!("{}app-debug.apk", app_name),
                    out.join("outputs/apk/debug/app-debug.apk"),
                );
            }
            return Ok(outputs);
        }

        outputs.insert(
            format!("{}app-debug.apk", app_name),
            out.join("outputs/apk/debug/app-debug.apk"),
        );
        for (jar, source) in SRC_ANDROID_JARS {
            outputs.insert(jar.to_string(), out.join("lib").join(source));
        }
        let abi = self.board.abi_name();
        for lib in SRC_ANDROID_LIBS {
            outputs.insert(
                format!("jni/{}/{}", abi, lib),
                out.join("lib").join("jni").join(abi).join(lib),
            );
        }
        Ok(outputs)
    }
}
