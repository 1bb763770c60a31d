//! Bouffalo Lab (BL602 / BL702) firmware builds.
//!
//! The chip family is picked from the module type; the GN project lives at
//! `examples/<app>/bouffalolab/<chip>` and produces a single `.out` image.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::builders::{Builder, BuilderBase, DEFAULT_OUTPUT_PREFIX};
use crate::gn::{self, string_arg};
use crate::runner::Runner;
use crate::types::{BuildError, BuildOutputs};

const SDK_ROOT_VAR: &str = "BOUFFALOLAB_SDK_ROOT";

/// Bouffalo Lab development board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BouffalolabBoard {
    Bl602IotMatterV1,
    Bl602IotDvk3s,
    Bl602NightLight,
    XtZb6DevKit,
    #[default]
    Bl706IotDvk,
    Bl706NightLight,
}

impl BouffalolabBoard {
    pub const ALL: [BouffalolabBoard; 6] = [
        BouffalolabBoard::Bl602IotMatterV1,
        BouffalolabBoard::Bl602IotDvk3s,
        BouffalolabBoard::Bl602NightLight,
        BouffalolabBoard::XtZb6DevKit,
        BouffalolabBoard::Bl706IotDvk,
        BouffalolabBoard::Bl706NightLight,
    ];

    /// Value of the GN `board` argument, also used on the command line.
    pub fn gn_arg_name(&self) -> &'static str {
        match self {
            BouffalolabBoard::Bl602IotMatterV1 => "BL602-IoT-Matter-V1",
            BouffalolabBoard::Bl602IotDvk3s => "BL602-IOT-DVK-3S",
            BouffalolabBoard::Bl602NightLight => "BL602-NIGHT-LIGHT",
            BouffalolabBoard::XtZb6DevKit => "XT-ZB6-DevKit",
            BouffalolabBoard::Bl706IotDvk => "BL706-IoT-DVK",
            BouffalolabBoard::Bl706NightLight => "BL706-NIGHT-LIGHT",
        }
    }
}

impl FromStr for BouffalolabBoard {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BouffalolabBoard::ALL
            .into_iter()
            .find(|board| board.gn_arg_name() == s)
            .ok_or_else(|| BuildError::UnknownTarget {
                kind: "bouffalolab board",
                name: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BouffalolabApp {
    #[default]
    Light,
}

impl BouffalolabApp {
    pub const ALL: [BouffalolabApp; 1] = [BouffalolabApp::Light];

    pub fn as_str(&self) -> &'static str {
        match self {
            BouffalolabApp::Light => "light",
        }
    }

    /// Directory under `examples/`.
    pub fn example_name(&self) -> &'static str {
        match self {
            BouffalolabApp::Light => "lighting-app",
        }
    }

    /// Firmware image name without extension.
    pub fn app_name_prefix(&self, chip: BouffalolabChip) -> String {
        match self {
            BouffalolabApp::Light => format!("chip-{}-lighting-example", chip.as_str()),
        }
    }

    pub fn flash_bundle_name(&self) -> &'static str {
        match self {
            BouffalolabApp::Light => "lighting_app.flashbundle.txt",
        }
    }
}

impl FromStr for BouffalolabApp {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BouffalolabApp::ALL
            .into_iter()
            .find(|app| app.as_str() == s)
            .ok_or_else(|| BuildError::UnknownTarget {
                kind: "bouffalolab app",
                name: s.to_string(),
            })
    }
}

/// Chip family, derived from the module type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BouffalolabChip {
    Bl602,
    Bl702,
}

impl BouffalolabChip {
    /// `bl702` for any module type containing `BL70`, `bl602` otherwise.
    pub fn from_module_type(module_type: &str) -> Self {
        if module_type.contains("BL70") {
            BouffalolabChip::Bl702
        } else {
            BouffalolabChip::Bl602
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BouffalolabChip::Bl602 => "bl602",
            BouffalolabChip::Bl702 => "bl702",
        }
    }
}

/// Build options with their defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BouffalolabOptions {
    pub app: BouffalolabApp,
    pub board: BouffalolabBoard,
    pub module_type: String,
    pub baudrate: u32,
    pub enable_rpcs: bool,
    pub enable_shell: bool,
    /// USB CDC console; BL702 only.
    pub enable_cdc: bool,
}

impl Default for BouffalolabOptions {
    fn default() -> Self {
        Self {
            app: BouffalolabApp::default(),
            board: BouffalolabBoard::default(),
            module_type: "BL706C-22".to_string(),
            baudrate: 2_000_000,
            enable_rpcs: false,
            enable_shell: false,
            enable_cdc: false,
        }
    }
}

/// Builds Bouffalo Lab firmware with GN and Ninja.
#[derive(Debug, Clone)]
pub struct BouffalolabBuilder {
    base: BuilderBase,
    options: BouffalolabOptions,
    chip: BouffalolabChip,
    gn_args: Vec<String>,
}

impl BouffalolabBuilder {
    /// Resolves the chip and GN arguments for `options`.
    ///
    /// Fails when `BOUFFALOLAB_SDK_ROOT` is unset (after logging how to
    /// install the SDK) or when CDC is requested on a BL602.
    pub fn new(
        root: impl Into<PathBuf>,
        runner: Arc<dyn Runner>,
        options: BouffalolabOptions,
    ) -> Result<Self, BuildError> {
        let root = root.into();
        let chip = BouffalolabChip::from_module_type(&options.module_type);
        let gn_args = Self::compute_gn_args(&root, &options, chip)?;

        let identifier = format!(
            "bouffalolab-{}-{}",
            options.board.gn_arg_name(),
            options.app.as_str()
        );
        let app_root = root
            .join("examples")
            .join(options.app.example_name())
            .join("bouffalolab")
            .join(chip.as_str());
        let output_dir = root.join(DEFAULT_OUTPUT_PREFIX).join(&identifier);
        let base = BuilderBase::new(app_root, runner, identifier).output_dir_at(output_dir);

        Ok(Self {
            base,
            options,
            chip,
            gn_args,
        })
    }

    /// Places the output directory under `prefix`.
    pub fn output_prefix(mut self, prefix: impl AsRef<Path>) -> Self {
        self.base = self.base.output_prefix(prefix);
        self
    }

    pub fn chip(&self) -> BouffalolabChip {
        self.chip
    }

    pub fn options(&self) -> &BouffalolabOptions {
        &self.options
    }

    /// GN argument lines, in the order they are passed to `gn gen`.
    pub fn gn_args(&self) -> &[String] {
        &self.gn_args
    }

    fn compute_gn_args(
        root: &Path,
        options: &BouffalolabOptions,
        chip: BouffalolabChip,
    ) -> Result<Vec<String>, BuildError> {
        let toolchain = root.join("config").join("bouffalolab").join("toolchain");
        let mut args = vec![
            format!("custom_toolchain=\"{}:riscv_gcc\"", toolchain.display()),
            string_arg("board", options.board.gn_arg_name()),
            string_arg("baudrate", options.baudrate),
        ];

        if chip == BouffalolabChip::Bl702 {
            args.push(string_arg("module_type", &options.module_type));
        }

        if options.enable_cdc {
            if chip != BouffalolabChip::Bl702 {
                return Err(BuildError::Config(format!(
                    "Chip {} does NOT support USB CDC",
                    chip.as_str()
                )));
            }
            args.push("enable_cdc_module=true".to_string());
        }

        if options.enable_rpcs {
            args.push("import(\"//with_pw_rpc.gni\")".to_string());
        } else if options.enable_shell {
            args.push("chip_build_libshell=true".to_string());
        }

        let sdk_root = std::env::var(SDK_ROOT_VAR).map_err(|_| {
            tracing::error!("Please make sure Bouffalo Lab SDK installs as below:");
            tracing::error!("\tcd third_party/bouffalolab/repo");
            tracing::error!("\tsudo bash scripts/setup.sh");
            tracing::error!("Please make sure {} exports before building as below:", SDK_ROOT_VAR);
            tracing::error!("\texport {}=/opt/bouffalolab_sdk", SDK_ROOT_VAR);
            BuildError::MissingEnv {
                name: SDK_ROOT_VAR.to_string(),
                purpose: "cannot build bouffalolab firmware".to_string(),
            }
        })?;
        args.push(string_arg("bouffalolab_sdk_root", sdk_root));

        Ok(args)
    }
}

impl Builder for BouffalolabBuilder {
    fn base(&self) -> &BuilderBase {
        &self.base
    }

    fn generate(&self) -> Result<(), BuildError> {
        gn::generate(&self.base, &self.gn_args)
    }

    fn build(&self) -> Result<(), BuildError> {
        gn::build(&self.base)
    }

    fn build_outputs(&self) -> Result<BuildOutputs, BuildError> {
        let prefix = self.options.app.app_name_prefix(self.chip);
        let mut outputs = BuildOutputs::new();
        for name in [format!("{}.out", prefix), format!("{}.out.map", prefix)] {
            let path = self.base.output_dir().join(&name);
            outputs.insert(name, path);
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::PrintOnlyRunner;
    use serial_test::serial;

    fn with_sdk<R>(f: impl FnOnce() -> R) -> R {
        temp_env::with_var(SDK_ROOT_VAR, Some("/opt/bouffalolab_sdk"), f)
    }

    #[test]
    fn test_board_names_round_trip() {
        for board in BouffalolabBoard::ALL {
            assert_eq!(board.gn_arg_name().parse::<BouffalolabBoard>().unwrap(), board);
        }
        assert_eq!(BouffalolabBoard::default(), BouffalolabBoard::Bl706IotDvk);
        assert!("BL808-DVK".parse::<BouffalolabBoard>().is_err());
    }

    #[test]
    fn test_app_tables() {
        let app = BouffalolabApp::Light;
        assert_eq!(app.example_name(), "lighting-app");
        assert_eq!(
            app.app_name_prefix(BouffalolabChip::Bl602),
            "chip-bl602-lighting-example"
        );
        assert_eq!(app.flash_bundle_name(), "lighting_app.flashbundle.txt");
        assert!("lock".parse::<BouffalolabApp>().is_err());
    }

    #[test]
    fn test_chip_from_module_type() {
        assert_eq!(BouffalolabChip::from_module_type("BL706C-22"), BouffalolabChip::Bl702);
        assert_eq!(BouffalolabChip::from_module_type("BL704L"), BouffalolabChip::Bl702);
        assert_eq!(BouffalolabChip::from_module_type("BL602"), BouffalolabChip::Bl602);
    }

    #[test]
    #[serial]
    fn test_default_bl702_args() {
        let builder = with_sdk(|| {
            BouffalolabBuilder::new(
                "/src",
                Arc::new(PrintOnlyRunner::new()),
                BouffalolabOptions::default(),
            )
        })
        .unwrap();

        assert_eq!(builder.chip(), BouffalolabChip::Bl702);
        assert_eq!(
            builder.gn_args(),
            &[
                "custom_toolchain=\"/src/config/bouffalolab/toolchain:riscv_gcc\"",
                "board=\"BL706-IoT-DVK\"",
                "baudrate=\"2000000\"",
                "module_type=\"BL706C-22\"",
                "bouffalolab_sdk_root=\"/opt/bouffalolab_sdk\"",
            ]
        );
        assert_eq!(builder.identifier(), "bouffalolab-BL706-IoT-DVK-light");
        assert_eq!(
            builder.base().root(),
            Path::new("/src/examples/lighting-app/bouffalolab/bl702")
        );
        assert_eq!(
            builder.output_dir(),
            Path::new("/src/out/bouffalolab-BL706-IoT-DVK-light")
        );
    }

    #[test]
    #[serial]
    fn test_bl602_rpcs_win_over_shell() {
        let options = BouffalolabOptions {
            board: BouffalolabBoard::Bl602IotMatterV1,
            module_type: "BL602".to_string(),
            baudrate: 115_200,
            enable_rpcs: true,
            enable_shell: true,
            ..Default::default()
        };
        let builder =
            with_sdk(|| BouffalolabBuilder::new("/src", Arc::new(PrintOnlyRunner::new()), options))
                .unwrap();

        let args = builder.gn_args();
        assert!(!args.iter().any(|a| a.starts_with("module_type=")));
        assert!(args.contains(&"baudrate=\"115200\"".to_string()));
        assert!(args.contains(&"import(\"//with_pw_rpc.gni\")".to_string()));
        assert!(!args.contains(&"chip_build_libshell=true".to_string()));
    }

    #[test]
    #[serial]
    fn test_shell_and_cdc_on_bl702() {
        let options = BouffalolabOptions {
            enable_shell: true,
            enable_cdc: true,
            ..Default::default()
        };
        let builder =
            with_sdk(|| BouffalolabBuilder::new("/src", Arc::new(PrintOnlyRunner::new()), options))
                .unwrap();
        let args = builder.gn_args();
        assert!(args.contains(&"enable_cdc_module=true".to_string()));
        assert!(args.contains(&"chip_build_libshell=true".to_string()));
    }

    #[test]
    #[serial]
    fn test_cdc_rejected_on_bl602() {
        let options = BouffalolabOptions {
            module_type: "BL602".to_string(),
            enable_cdc: true,
            ..Default::default()
        };
        let err =
            with_sdk(|| BouffalolabBuilder::new("/src", Arc::new(PrintOnlyRunner::new()), options))
                .unwrap_err();
        assert!(err.to_string().contains("bl602 does NOT support USB CDC"));
    }

    #[test]
    #[serial]
    fn test_missing_sdk_root() {
        let err = temp_env::with_var_unset(SDK_ROOT_VAR, || {
            BouffalolabBuilder::new(
                "/src",
                Arc::new(PrintOnlyRunner::new()),
                BouffalolabOptions::default(),
            )
        })
        .unwrap_err();
        assert!(
            matches!(err, BuildError::MissingEnv { ref name, .. } if name == "BOUFFALOLAB_SDK_ROOT")
        );
    }

    #[test]
    #[serial]
    fn test_build_outputs() {
        let options = BouffalolabOptions {
            board: BouffalolabBoard::Bl602NightLight,
            module_type: "BL602".to_string(),
            ..Default::default()
        };
        let builder =
            with_sdk(|| BouffalolabBuilder::new("/src", Arc::new(PrintOnlyRunner::new()), options))
                .unwrap();
        let outputs = builder.build_outputs().unwrap();

        let out = Path::new("/src/out/bouffalolab-BL602-NIGHT-LIGHT-light");
        assert_eq!(outputs.len(), 2);
        assert_eq!(
            outputs["chip-bl602-lighting-example.out"],
            out.join("chip-bl602-lighting-example.out")
        );
        assert_eq!(
            outputs["chip-bl602-lighting-example.out.map"],
            out.join("chip-bl602-lighting-example.out.map")
        );
    }

    #[test]
    #[serial]
    fn test_generate_and_build_commands() {
        let runner = Arc::new(PrintOnlyRunner::new());
        let builder = with_sdk(|| {
            BouffalolabBuilder::new("/src", runner.clone(), BouffalolabOptions::default())
        })
        .unwrap()
        .output_prefix("/nonexistent/out");

        builder.generate().unwrap();
        builder.build().unwrap();

        let commands = runner.commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(
            commands[0].args[5],
            "--root=/src/examples/lighting-app/bouffalolab/bl702"
        );
        assert!(commands[0].args[6].starts_with("--args=custom_toolchain="));
        assert_eq!(commands[0].args[7], "/nonexistent/out/bouffalolab-BL706-IoT-DVK-light");
        assert_eq!(
            commands[1].args,
            vec!["ninja", "-C", "/nonexistent/out/bouffalolab-BL706-IoT-DVK-light"]
        );
        assert_eq!(
            commands[1].title.as_deref(),
            Some("Building bouffalolab-BL706-IoT-DVK-light")
        );
    }
}
