//! CLI smoke tests for matterbuild.
//!
//! Build commands run with `--dry-run` so no external tool is needed; the
//! printed shell script is checked instead.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the matterbuild binary.
fn matterbuild_cmd() -> Command {
    cargo_bin_cmd!("matterbuild")
}

/// A workspace that stops config discovery at its own root.
fn workspace() -> TempDir {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir(temp.path().join(".git")).unwrap();
    temp
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
    matterbuild_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
    matterbuild_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("matterbuild"));
}

#[test]
fn subcommand_help_works() {
    for cmd in &["targets", "android", "bouffalolab", "imx", "bridge"] {
        matterbuild_cmd()
            .arg(cmd)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Usage"));
    }
}

#[test]
fn targets_lists_every_family() {
    let temp = workspace();
    matterbuild_cmd()
        .current_dir(temp.path())
        .arg("targets")
        .assert()
        .success()
        .stdout(predicate::str::contains("androidstudio-arm64"))
        .stdout(predicate::str::contains("BL706-IoT-DVK"))
        .stdout(predicate::str::contains("all-clusters-minimal"))
        .stdout(predicate::str::contains("factoryReset"));
}

// =============================================================================
// android
// =============================================================================

#[test]
fn android_dry_run_prints_script() {
    let temp = workspace();
    matterbuild_cmd()
        .current_dir(temp.path())
        .env("ANDROID_NDK_HOME", "/opt/android/ndk")
        .env("ANDROID_HOME", "/opt/android/sdk")
        .args(["android", "--board", "arm64", "--app", "chip-tool", "--dry-run"])
        .arg("--root")
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("# Setting up Android deps through Gradle"))
        .stdout(predicate::str::contains("# Generating android-arm64-chip-tool"))
        .stdout(predicate::str::contains("gn gen --check --fail-on-unused-args"))
        .stdout(predicate::str::contains("# Building JNI android-arm64-chip-tool"))
        .stdout(predicate::str::contains("examples/android/CHIPTool/gradlew"));

    assert!(!temp.path().join("out").exists());
}

#[test]
fn android_skip_build_only_generates() {
    let temp = workspace();
    matterbuild_cmd()
        .current_dir(temp.path())
        .env("ANDROID_NDK_HOME", "/opt/android/ndk")
        .env("ANDROID_HOME", "/opt/android/sdk")
        .args([
            "android",
            "--board",
            "x64",
            "--app",
            "tv-casting-app",
            "--dry-run",
            "--skip-build",
        ])
        .arg("--root")
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("gn gen"))
        .stdout(predicate::str::contains("ninja").not());
}

#[test]
fn android_unknown_board_fails() {
    matterbuild_cmd()
        .args(["android", "--board", "mips", "--app", "chip-tool"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized target"));
}

#[test]
fn android_java_matter_controller_is_rejected() {
    let temp = workspace();
    matterbuild_cmd()
        .current_dir(temp.path())
        .env("ANDROID_NDK_HOME", "/opt/android/ndk")
        .env("ANDROID_HOME", "/opt/android/sdk")
        .args([
            "android",
            "--board",
            "arm",
            "--app",
            "java-matter-controller",
            "--dry-run",
        ])
        .arg("--root")
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized target"));
}

// =============================================================================
// bouffalolab
// =============================================================================

#[test]
fn bouffalolab_requires_sdk_root() {
    let temp = workspace();
    matterbuild_cmd()
        .current_dir(temp.path())
        .env_remove("BOUFFALOLAB_SDK_ROOT")
        .args(["bouffalolab", "--dry-run"])
        .arg("--root")
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("BOUFFALOLAB_SDK_ROOT"));
}

#[test]
fn bouffalolab_dry_run() {
    let temp = workspace();
    matterbuild_cmd()
        .current_dir(temp.path())
        .env("BOUFFALOLAB_SDK_ROOT", "/opt/bouffalolab_sdk")
        .args([
            "bouffalolab",
            "--board",
            "BL602-IoT-Matter-V1",
            "--module-type",
            "BL602",
            "--enable-shell",
            "--dry-run",
        ])
        .arg("--root")
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("examples/lighting-app/bouffalolab/bl602"))
        .stdout(predicate::str::contains("chip_build_libshell=true"))
        .stdout(predicate::str::contains("# Building bouffalolab-BL602-IoT-Matter-V1-light"));
}

#[test]
fn bouffalolab_cdc_on_bl602_fails() {
    let temp = workspace();
    matterbuild_cmd()
        .current_dir(temp.path())
        .env("BOUFFALOLAB_SDK_ROOT", "/opt/bouffalolab_sdk")
        .args(["bouffalolab", "--module-type", "BL602", "--enable-cdc", "--dry-run"])
        .arg("--root")
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("does NOT support USB CDC"));
}

// =============================================================================
// imx
// =============================================================================

#[test]
fn imx_dry_run_writes_script_file() {
    let temp = workspace();
    let script = temp.path().join("plan.sh");
    matterbuild_cmd()
        .current_dir(temp.path())
        .env("IMX_SDK_ROOT", "IMX_SDK_ROOT")
        .args(["imx", "--app", "light", "--release", "--dry-run"])
        .arg("--root")
        .arg(temp.path())
        .arg("--dry-run-output")
        .arg(&script)
        .assert()
        .success();

    let contents = std::fs::read_to_string(&script).unwrap();
    assert!(contents.contains("# Generating imx-light-release"));
    assert!(contents.contains("is_debug=false"));
    assert!(contents.contains("# Building imx-light-release"));
}

#[test]
fn imx_uses_output_prefix_from_config() {
    let temp = workspace();
    std::fs::write(
        temp.path().join("matterbuild.toml"),
        "[build]\noutput_prefix = \"custom-out\"\n",
    )
    .unwrap();

    matterbuild_cmd()
        .current_dir(temp.path())
        .env("IMX_SDK_ROOT", "IMX_SDK_ROOT")
        .args(["imx", "--app", "thermostat", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom-out/imx-thermostat"))
        .stdout(predicate::str::contains("examples/thermostat/linux"));
}

// =============================================================================
// bridge
// =============================================================================

#[test]
fn bridge_unknown_key_fails_before_connecting() {
    let temp = workspace();
    matterbuild_cmd()
        .current_dir(temp.path())
        .args(["bridge", "start", "--param", "vendorId=65521"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("key not recognized"));
}

#[test]
fn bridge_unknown_operation_fails() {
    matterbuild_cmd()
        .args(["bridge", "shutdown"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown bridge operation"));
}
