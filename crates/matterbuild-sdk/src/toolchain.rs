//! Yocto SDK toolchain discovery for i.MX builds.
//!
//! A Yocto SDK installs an `environment-setup-<target>` shell script at its
//! root. The script is scanned (not executed) for the handful of exports a
//! GN cross build needs.

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::types::BuildError;

/// Environment variable naming the SDK installation root.
pub const SDK_ROOT_VAR: &str = "IMX_SDK_ROOT";

const SETUP_SCRIPT_PREFIX: &str = "environment-setup-";

const EXPORT_PATTERN: &str = r"^\s*export\s+(SDKTARGETSYSROOT|CC|CXX|ARCH|CROSS_COMPILE)=(.*)";

/// Cross toolchain settings extracted from the SDK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkToolchain {
    /// SDK root the toolchain was discovered in.
    pub sdk_root: PathBuf,
    /// GN `target_cpu` (`arm64` or `arm`).
    pub target_cpu: String,
    /// GN `arm_arch` derived from the CPU.
    pub arm_arch: String,
    pub sysroot: String,
    /// Toolchain triple, e.g. `aarch64-poky-linux`.
    pub cross_compile: String,
    pub cc: String,
    pub cxx: String,
}

impl SdkToolchain {
    /// Discovers the toolchain under `$IMX_SDK_ROOT`.
    pub fn from_env() -> Result<Self, BuildError> {
        let sdk_root = std::env::var(SDK_ROOT_VAR).map_err(|_| BuildError::MissingEnv {
            name: SDK_ROOT_VAR.to_string(),
            purpose: "cannot locate the i.MX SDK toolchain".to_string(),
        })?;
        Self::discover(Path::new(&sdk_root))
    }

    /// Scans the first `environment-setup-*` script in `sdk_root`.
    ///
    /// When `sdk_root` cannot be listed and is literally `IMX_SDK_ROOT` (the
    /// placeholder CI sets), defaults for a Cortex-A53 aarch64 SDK are used.
    pub fn discover(sdk_root: &Path) -> Result<Self, BuildError> {
        let entries = match std::fs::read_dir(sdk_root) {
            Ok(entries) => entries,
            Err(_) if sdk_root == Path::new(SDK_ROOT_VAR) => {
                tracing::warn!("{} is a placeholder, using default toolchain settings", SDK_ROOT_VAR);
                return Ok(Self::ci_defaults(sdk_root));
            }
            Err(_) => {
                return Err(BuildError::Toolchain(format!(
                    "the value of env {} is not a valid path.",
                    SDK_ROOT_VAR
                )));
            }
        };

        let mut scripts: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(SETUP_SCRIPT_PREFIX))
            .collect();
        scripts.sort();
        let script = scripts.into_iter().next().ok_or_else(|| {
            BuildError::Toolchain(format!(
                "The SDK environment setup script is not found, make sure the env {} is correctly set.",
                SDK_ROOT_VAR
            ))
        })?;

        let path = sdk_root.join(&script);
        tracing::debug!("Reading SDK environment from {}", path.display());
        let contents = std::fs::read_to_string(&path)?;
        Self::parse(sdk_root, &contents)
    }

    /// Extracts the toolchain from the text of an environment setup script.
    ///
    /// # Example
    ///
    /// ```
    /// use std::path::Path;
    /// use matterbuild_sdk::toolchain::SdkToolchain;
    ///
    /// let script = r#"
    /// export SDKTARGETSYSROOT=/opt/sdk/sysroots/armv7at2hf-neon-poky-linux-gnueabi
    /// export CC="arm-poky-linux-gnueabi-gcc --sysroot=$SDKTARGETSYSROOT"
    /// export CXX="arm-poky-linux-gnueabi-g++ --sysroot=$SDKTARGETSYSROOT"
    /// export ARCH=arm
    /// export CROSS_COMPILE=arm-poky-linux-gnueabi-
    /// "#;
    /// let toolchain = SdkToolchain::parse(Path::new("/opt/sdk"), script).unwrap();
    /// assert_eq!(toolchain.arm_arch, "armv7ve");
    /// assert_eq!(toolchain.cross_compile, "arm-poky-linux-gnueabi");
    /// assert_eq!(
    ///     toolchain.cc,
    ///     "arm-poky-linux-gnueabi-gcc --sysroot=/opt/sdk/sysroots/armv7at2hf-neon-poky-linux-gnueabi"
    /// );
    /// ```
    pub fn parse(sdk_root: &Path, script: &str) -> Result<Self, BuildError> {
        let export_re = Regex::new(EXPORT_PATTERN)
            .map_err(|e| BuildError::Toolchain(format!("Invalid export pattern: {}", e)))?;

        let mut sysroot = None;
        let mut cc = None;
        let mut cxx = None;
        let mut target_cpu = None;
        let mut arm_arch = None;
        let mut cross_compile = None;

        for line in script.lines() {
            let Some(caps) = export_re.captures(line) else {
                continue;
            };
            let value = first_word(&caps[2]);
            match &caps[1] {
                "SDKTARGETSYSROOT" => sysroot = Some(value),
                "CC" => cc = Some(value),
                "CXX" => cxx = Some(value),
                "ARCH" => {
                    arm_arch = Some(match value.as_str() {
                        "arm64" => "armv8-a",
                        "arm" => "armv7ve",
                        _ => {
                            return Err(BuildError::Toolchain(
                                "ARCH should be arm64 or arm in the SDK environment setup script."
                                    .to_string(),
                            ));
                        }
                    });
                    target_cpu = Some(value);
                }
                "CROSS_COMPILE" => {
                    let mut triple = value;
                    triple.pop();
                    cross_compile = Some(triple);
                }
                _ => {}
            }
        }

        let sysroot = sysroot.ok_or_else(|| {
            BuildError::Toolchain(
                "SDKTARGETSYSROOT is not found in the SDK environment setup script.".to_string(),
            )
        })?;
        let (Some(cc), Some(cxx)) = (cc, cxx) else {
            return Err(BuildError::Toolchain(
                "CC and/or CXX are not found in the SDK environment setup script.".to_string(),
            ));
        };
        let (Some(target_cpu), Some(arm_arch), Some(cross_compile)) =
            (target_cpu, arm_arch, cross_compile)
        else {
            return Err(BuildError::Toolchain(
                "ARCH and/or CROSS_COMPILE are not found in the SDK environment setup script."
                    .to_string(),
            ));
        };

        Ok(Self {
            sdk_root: sdk_root.to_path_buf(),
            cc: cc.replace("$SDKTARGETSYSROOT", &sysroot),
            cxx: cxx.replace("$SDKTARGETSYSROOT", &sysroot),
            target_cpu,
            arm_arch: arm_arch.to_string(),
            sysroot,
            cross_compile,
        })
    }

    fn ci_defaults(sdk_root: &Path) -> Self {
        Self {
            sdk_root: sdk_root.to_path_buf(),
            target_cpu: "arm64".to_string(),
            arm_arch: "armv8-a".to_string(),
            sysroot: sdk_root
                .join("sysroots/cortexa53-crypto-poky-linux")
                .display()
                .to_string(),
            cross_compile: "aarch64-poky-linux".to_string(),
            cc: "aarch64-poky-linux-gcc".to_string(),
            cxx: "aarch64-poky-linux-g++".to_string(),
        }
    }

    /// Directory holding the cross tools on the build host.
    pub fn tool_dir(&self) -> String {
        format!(
            "{}/sysroots/x86_64-pokysdk-linux/usr/bin/{}",
            self.sdk_root.display(),
            self.cross_compile
        )
    }
}

/// First shell word of an assignment value, or the raw value when it does
/// not split cleanly. A quoted value is one word, flags included.
fn first_word(value: &str) -> String {
    shlex::split(value)
        .and_then(|words| words.into_iter().next())
        .unwrap_or_else(|| value.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const AARCH64_SCRIPT: &str = r#"
# Check for LD_LIBRARY_PATH being set
export SDKTARGETSYSROOT=/opt/fsl-imx-xwayland/5.15/sysroots/armv8a-poky-linux
export PATH="/opt/fsl-imx-xwayland/5.15/sysroots/x86_64-pokysdk-linux/usr/bin:$PATH"
export CC="aarch64-poky-linux-gcc  -mcpu=cortex-a53 -march=armv8-a+crc+crypto --sysroot=$SDKTARGETSYSROOT"
export CXX="aarch64-poky-linux-g++  -mcpu=cortex-a53 -march=armv8-a+crc+crypto --sysroot=$SDKTARGETSYSROOT"
export CROSS_COMPILE=aarch64-poky-linux-
  export ARCH=arm64
"#;

    #[test]
    fn test_parse_aarch64_script() {
        let sdk = Path::new("/opt/fsl-imx-xwayland/5.15");
        let toolchain = SdkToolchain::parse(sdk, AARCH64_SCRIPT).unwrap();

        assert_eq!(toolchain.target_cpu, "arm64");
        assert_eq!(toolchain.arm_arch, "armv8-a");
        assert_eq!(
            toolchain.sysroot,
            "/opt/fsl-imx-xwayland/5.15/sysroots/armv8a-poky-linux"
        );
        assert_eq!(toolchain.cross_compile, "aarch64-poky-linux");
        assert_eq!(
            toolchain.cc,
            "aarch64-poky-linux-gcc  -mcpu=cortex-a53 -march=armv8-a+crc+crypto \
             --sysroot=/opt/fsl-imx-xwayland/5.15/sysroots/armv8a-poky-linux"
        );
        assert_eq!(
            toolchain.cxx,
            "aarch64-poky-linux-g++  -mcpu=cortex-a53 -march=armv8-a+crc+crypto \
             --sysroot=/opt/fsl-imx-xwayland/5.15/sysroots/armv8a-poky-linux"
        );
        assert_eq!(
            toolchain.tool_dir(),
            "/opt/fsl-imx-xwayland/5.15/sysroots/x86_64-pokysdk-linux/usr/bin/aarch64-poky-linux"
        );
    }

    #[test]
    fn test_sysroot_substituted_in_compiler() {
        let script = "export SDKTARGETSYSROOT=/sys/root\n\
                      export CC=$SDKTARGETSYSROOT/bin/gcc\n\
                      export CXX=$SDKTARGETSYSROOT/bin/g++\n\
                      export ARCH=arm\n\
                      export CROSS_COMPILE=arm-poky-linux-gnueabi-\n";
        let toolchain = SdkToolchain::parse(Path::new("/sdk"), script).unwrap();
        assert_eq!(toolchain.cc, "/sys/root/bin/gcc");
        assert_eq!(toolchain.cxx, "/sys/root/bin/g++");
        assert_eq!(toolchain.arm_arch, "armv7ve");
    }

    #[test]
    fn test_unquoted_value_keeps_first_word() {
        let script = "export SDKTARGETSYSROOT=/sys/root\n\
                      export CC=gcc -O2\n\
                      export CXX=\"g++ -O2\"\n\
                      export ARCH=arm64\n\
                      export CROSS_COMPILE=aarch64-poky-linux-\n";
        let toolchain = SdkToolchain::parse(Path::new("/sdk"), script).unwrap();
        assert_eq!(toolchain.cc, "gcc");
        assert_eq!(toolchain.cxx, "g++ -O2");
    }

    #[test]
    fn test_unsupported_arch() {
        let script = "export ARCH=x86_64\n";
        let err = SdkToolchain::parse(Path::new("/sdk"), script).unwrap_err();
        assert!(err.to_string().contains("ARCH should be arm64 or arm"));
    }

    #[test]
    fn test_missing_fields_are_named() {
        let err = SdkToolchain::parse(Path::new("/sdk"), "export ARCH=arm64\n").unwrap_err();
        assert!(err.to_string().contains("SDKTARGETSYSROOT is not found"));

        let err = SdkToolchain::parse(
            Path::new("/sdk"),
            "export SDKTARGETSYSROOT=/s\nexport CC=gcc\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("CC and/or CXX"));

        let err = SdkToolchain::parse(
            Path::new("/sdk"),
            "export SDKTARGETSYSROOT=/s\nexport CC=gcc\nexport CXX=g++\nexport ARCH=arm64\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("ARCH and/or CROSS_COMPILE"));
    }

    #[test]
    fn test_discover_reads_setup_script() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("site-config-armv8a"), "").unwrap();
        std::fs::write(
            temp.path().join("environment-setup-armv8a-poky-linux"),
            AARCH64_SCRIPT,
        )
        .unwrap();

        let toolchain = SdkToolchain::discover(temp.path()).unwrap();
        assert_eq!(toolchain.sdk_root, temp.path());
        assert_eq!(toolchain.cross_compile, "aarch64-poky-linux");
    }

    #[test]
    fn test_discover_without_script() {
        let temp = TempDir::new().unwrap();
        let err = SdkToolchain::discover(temp.path()).unwrap_err();
        assert!(err.to_string().contains("setup script is not found"));
    }

    #[test]
    fn test_discover_ci_placeholder() {
        let toolchain = SdkToolchain::discover(Path::new("IMX_SDK_ROOT")).unwrap();
        assert_eq!(toolchain.target_cpu, "arm64");
        assert_eq!(toolchain.sysroot, "IMX_SDK_ROOT/sysroots/cortexa53-crypto-poky-linux");
        assert_eq!(toolchain.cc, "aarch64-poky-linux-gcc");
    }

    #[test]
    fn test_discover_invalid_path() {
        let err = SdkToolchain::discover(Path::new("/nonexistent/imx-sdk")).unwrap_err();
        assert!(err.to_string().contains("not a valid path"));
    }
}
