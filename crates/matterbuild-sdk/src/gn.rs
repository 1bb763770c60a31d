//! GN argument construction and the shared `gn gen` / `ninja` steps.
//!
//! Two argument styles exist:
//!
//! - [`GnArgs`] is a flat, ordered key/value set (booleans render as the
//!   literal words `true`/`false`, strings are quoted). The Android builder
//!   uses it.
//! - Plain argument lines (`Vec<String>`) for builders whose arguments
//!   include GN statements such as `import("//with_pw_rpc.gni")`. Those go
//!   through [`generate`] and [`build`].

use std::fmt;

use crate::builders::BuilderBase;
use crate::types::BuildError;

/// A single GN argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GnValue {
    Bool(bool),
    Str(String),
}

impl From<bool> for GnValue {
    fn from(value: bool) -> Self {
        GnValue::Bool(value)
    }
}

impl From<&str> for GnValue {
    fn from(value: &str) -> Self {
        GnValue::Str(value.to_string())
    }
}

impl From<String> for GnValue {
    fn from(value: String) -> Self {
        GnValue::Str(value)
    }
}

impl fmt::Display for GnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GnValue::Bool(true) => f.write_str("true"),
            GnValue::Bool(false) => f.write_str("false"),
            GnValue::Str(s) => {
                let quoted =
                    shlex::try_quote(s).unwrap_or(std::borrow::Cow::Borrowed(s.as_str()));
                write!(f, "\"{}\"", quoted)
            }
        }
    }
}

/// Ordered GN key/value arguments. Inserting an existing key replaces its
/// value in place.
///
/// # Example
///
/// ```
/// use matterbuild_sdk::gn::GnArgs;
///
/// let mut args = GnArgs::new();
/// args.insert("target_os", "android");
/// args.insert("is_debug", false);
/// assert_eq!(args.to_flag(), "--args=target_os=\"android\" is_debug=false ");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GnArgs {
    entries: Vec<(String, GnValue)>,
}

impl GnArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<GnValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Merges `other` into `self`; keys from `other` win.
    pub fn extend(&mut self, other: GnArgs) {
        for (key, value) in other.entries {
            self.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&GnValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders `key=value ` for every entry, in insertion order.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(key, value)| format!("{}={} ", key, value))
            .collect()
    }

    /// The `--args=...` flag passed to `gn gen`.
    pub fn to_flag(&self) -> String {
        format!("--args={}", self.render())
    }
}

/// Formats a quoted string assignment line, `key="value"`.
pub fn string_arg(key: &str, value: impl fmt::Display) -> String {
    format!("{}=\"{}\"", key, value)
}

/// The `gn gen` command line for a project rooted at `base.root()`.
pub fn gen_command(base: &BuilderBase, args: &[String]) -> Vec<String> {
    let mut cmd = vec![
        "gn".to_string(),
        "gen".to_string(),
        "--check".to_string(),
        "--fail-on-unused-args".to_string(),
        "--export-compile-commands".to_string(),
        format!("--root={}", base.root().display()),
    ];
    if !args.is_empty() {
        cmd.push(format!("--args={}", args.join(" ")));
    }
    cmd.push(base.output_dir().display().to_string());
    cmd
}

/// Runs `gn gen` unless the output directory already exists.
///
/// An existing output directory is treated as already generated; no
/// staleness check is made.
pub fn generate(base: &BuilderBase, args: &[String]) -> Result<(), BuildError> {
    generate_with(base, || Ok(args.to_vec()))
}

/// Like [`generate`], but only computes the arguments when generation will
/// actually run.
pub fn generate_with<F>(base: &BuilderBase, args: F) -> Result<(), BuildError>
where
    F: FnOnce() -> Result<Vec<String>, BuildError>,
{
    if base.output_dir().exists() {
        tracing::info!(
            "Output directory {} already exists, skipping generation",
            base.output_dir().display()
        );
        return Ok(());
    }
    let cmd = gen_command(base, &args()?);
    base.execute(&cmd, Some(&format!("Generating {}", base.identifier())))
}

/// Runs `ninja -C <output_dir>`.
pub fn build(base: &BuilderBase) -> Result<(), BuildError> {
    base.execute(
        &[
            "ninja".to_string(),
            "-C".to_string(),
            base.output_dir().display().to_string(),
        ],
        Some(&format!("Building {}", base.identifier())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::PrintOnlyRunner;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_bool_serialization() {
        let mut args = GnArgs::new();
        args.insert("chip_config_network_layer_ble", false);
        args.insert("is_debug", true);
        assert_eq!(args.render(), "chip_config_network_layer_ble=false is_debug=true ");
    }

    #[test]
    fn test_string_is_quoted() {
        let mut args = GnArgs::new();
        args.insert("android_ndk_root", "/opt/ndk");
        assert_eq!(args.render(), "android_ndk_root=\"/opt/ndk\" ");
    }

    #[test]
    fn test_string_with_spaces_is_shell_quoted() {
        let value = GnValue::Str("/opt/my sdk".to_string()).to_string();
        assert!(value.starts_with('"') && value.ends_with('"'));
        let inner = &value[1..value.len() - 1];
        assert_ne!(inner, "/opt/my sdk");
        assert_eq!(shlex::split(inner).unwrap(), vec!["/opt/my sdk"]);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut args = GnArgs::new();
        args.insert("a", "1");
        args.insert("b", true);
        args.insert("a", "2");
        assert_eq!(args.render(), "a=\"2\" b=true ");
    }

    #[test]
    fn test_extend_overrides() {
        let mut base = GnArgs::new();
        base.insert("target_os", "android");
        base.insert("chip_config_network_layer_ble", true);
        let mut overrides = GnArgs::new();
        overrides.insert("chip_config_network_layer_ble", false);
        base.extend(overrides);
        assert_eq!(
            base.get("chip_config_network_layer_ble"),
            Some(&GnValue::Bool(false))
        );
        assert_eq!(base.get("target_os"), Some(&GnValue::Str("android".into())));
    }

    #[test]
    fn test_empty_flag() {
        assert_eq!(GnArgs::new().to_flag(), "--args=");
    }

    #[test]
    fn test_gen_command_layout() {
        let runner = Arc::new(PrintOnlyRunner::new());
        let base = BuilderBase::new("/src/app", runner, "demo").output_dir_at("/out/demo");
        let cmd = gen_command(&base, &["board=\"X\"".to_string(), "baud=\"1\"".to_string()]);
        assert_eq!(
            cmd,
            vec![
                "gn",
                "gen",
                "--check",
                "--fail-on-unused-args",
                "--export-compile-commands",
                "--root=/src/app",
                "--args=board=\"X\" baud=\"1\"",
                "/out/demo",
            ]
        );
    }

    #[test]
    fn test_generate_skips_existing_output() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(PrintOnlyRunner::new());
        let base = BuilderBase::new("/src/app", runner.clone(), "demo").output_dir_at(temp.path());

        generate(&base, &[]).unwrap();
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn test_generate_and_build_when_absent() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("demo");
        let runner = Arc::new(PrintOnlyRunner::new());
        let base = BuilderBase::new("/src/app", runner.clone(), "demo").output_dir_at(&out);

        generate(&base, &[]).unwrap();
        build(&base).unwrap();

        let commands = runner.commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].title.as_deref(), Some("Generating demo"));
        assert!(!commands[0].args.iter().any(|a| a.starts_with("--args=")));
        assert_eq!(
            commands[1].args,
            vec!["ninja".to_string(), "-C".to_string(), out.display().to_string()]
        );
    }
}
