//! NXP i.MX Linux example builds against a Yocto SDK.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use walkdir::WalkDir;

use crate::builders::{Builder, BuilderBase, DEFAULT_OUTPUT_PREFIX};
use crate::gn::{self, string_arg};
use crate::runner::Runner;
use crate::toolchain::SdkToolchain;
use crate::types::{BuildError, BuildOutputs};

const TARGET_CFLAGS: &str = r#"target_cflags=[ "-DCHIP_DEVICE_CONFIG_WIFI_STATION_IF_NAME=\"mlan0\"", "-DCHIP_DEVICE_CONFIG_LINUX_DHCPC_CMD=\"udhcpc -b -i %s \"" ]"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImxApp {
    ChipTool,
    Light,
    Thermostat,
    AllClusters,
    AllClustersMinimal,
    OtaProvider,
}

impl ImxApp {
    pub const ALL: [ImxApp; 6] = [
        ImxApp::ChipTool,
        ImxApp::Light,
        ImxApp::Thermostat,
        ImxApp::AllClusters,
        ImxApp::AllClustersMinimal,
        ImxApp::OtaProvider,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImxApp::ChipTool => "chip-tool",
            ImxApp::Light => "light",
            ImxApp::Thermostat => "thermostat",
            ImxApp::AllClusters => "all-clusters",
            ImxApp::AllClustersMinimal => "all-clusters-minimal",
            ImxApp::OtaProvider => "ota-provider",
        }
    }

    /// Path under `examples/` holding the GN project.
    pub fn example_path(&self) -> &'static str {
        match self {
            ImxApp::ChipTool => "chip-tool",
            ImxApp::Light => "lighting-app/linux",
            ImxApp::Thermostat => "thermostat/linux",
            ImxApp::AllClusters => "all-clusters-app/linux",
            ImxApp::AllClustersMinimal => "all-clusters-minimal-app/linux",
            ImxApp::OtaProvider => "ota-provider-app/linux",
        }
    }

    /// Executable name; a `.map` file with the same stem is also produced.
    pub fn binary_name(&self) -> &'static str {
        match self {
            ImxApp::ChipTool => "chip-tool",
            ImxApp::Light => "chip-lighting-app",
            ImxApp::Thermostat => "thermostat-app",
            ImxApp::AllClusters => "chip-all-clusters-app",
            ImxApp::AllClustersMinimal => "chip-all-clusters-minimal-app",
            ImxApp::OtaProvider => "chip-ota-provider-app",
        }
    }

    pub fn output_names(&self) -> [String; 2] {
        let binary = self.binary_name();
        [binary.to_string(), format!("{}.map", binary)]
    }
}

impl FromStr for ImxApp {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImxApp::ALL
            .into_iter()
            .find(|app| app.as_str() == s)
            .ok_or_else(|| BuildError::UnknownTarget {
                kind: "imx app",
                name: s.to_string(),
            })
    }
}

#[derive(Debug, Clone)]
pub struct ImxBuilder {
    base: BuilderBase,
    app: ImxApp,
    release: bool,
}

impl ImxBuilder {
    pub fn new(root: impl Into<PathBuf>, runner: Arc<dyn Runner>, app: ImxApp, release: bool) -> Self {
        let root = root.into();
        let mut identifier = format!("imx-{}", app.as_str());
        if release {
            identifier.push_str("-release");
        }
        let app_root = root.join("examples").join(app.example_path());
        let output_dir = root.join(DEFAULT_OUTPUT_PREFIX).join(&identifier);
        Self {
            base: BuilderBase::new(app_root, runner, identifier).output_dir_at(output_dir),
            app,
            release,
        }
    }

    /// Places the output directory under `prefix`.
    pub fn output_prefix(mut self, prefix: impl AsRef<Path>) -> Self {
        self.base = self.base.output_prefix(prefix);
        self
    }

    pub fn app(&self) -> ImxApp {
        self.app
    }

    pub fn is_release(&self) -> bool {
        self.release
    }

    /// GN argument lines for the toolchain discovered from `$IMX_SDK_ROOT`.
    pub fn gn_args(&self) -> Result<Vec<String>, BuildError> {
        let toolchain = SdkToolchain::from_env()?;
        Ok(self.gn_args_for(&toolchain))
    }

    /// GN argument lines for an explicit toolchain.
    pub fn gn_args_for(&self, toolchain: &SdkToolchain) -> Vec<String> {
        let tool_dir = toolchain.tool_dir();
        let mut args = vec![
            "treat_warnings_as_errors=false".to_string(),
            string_arg("target_os", "linux"),
            string_arg("target_cpu", &toolchain.target_cpu),
            string_arg("arm_arch", &toolchain.arm_arch),
            "import(\"//build_overrides/build.gni\")".to_string(),
            "custom_toolchain=\"${build_root}/toolchain/custom\"".to_string(),
            string_arg("sysroot", &toolchain.sysroot),
            TARGET_CFLAGS.to_string(),
            string_arg("target_cc", format!("{}/{}", tool_dir, toolchain.cc)),
            string_arg("target_cxx", format!("{}/{}", tool_dir, toolchain.cxx)),
            string_arg(
                "target_ar",
                format!("{}/{}-ar", tool_dir, toolchain.cross_compile),
            ),
        ];

        if self.release {
            args.push("is_debug=false".to_string());
        } else {
            args.push("optimize_debug=true".to_string());
        }
        args
    }
}

impl Builder for ImxBuilder {
    fn base(&self) -> &BuilderBase {
        &self.base
    }

    fn generate(&self) -> Result<(), BuildError> {
        gn::generate_with(&self.base, || self.gn_args())
    }

    fn build(&self) -> Result<(), BuildError> {
        gn::build(&self.base)
    }

    /// Output names that exist as directories expand to the files beneath
    /// them, keyed by file name.
    fn build_outputs(&self) -> Result<BuildOutputs, BuildError> {
        let mut outputs = BuildOutputs::new();
        for name in self.app.output_names() {
            let path = self.base.output_dir().join(&name);
            if path.is_dir() {
                for entry in WalkDir::new(&path)
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                {
                    outputs.insert(
                        entry.file_name().to_string_lossy().into_owned(),
                        entry.path().to_path_buf(),
                    );
                }
            } else {
                outputs.insert(name, path);
            }
        }
        Ok(outputs)
    }
}
