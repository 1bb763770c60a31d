//! Host environment checks shared by the builders.
//!
//! Permission checks go through access(2), so they answer for the user
//! running the build rather than for whoever owns the path.

use std::path::Path;

use crate::types::BuildError;

/// Reads a required environment variable.
///
/// `purpose` completes the sentence "environment variable X missing, ..." in
/// the error message.
pub fn require_var(name: &str, purpose: &str) -> Result<String, BuildError> {
    std::env::var(name).map_err(|_| BuildError::MissingEnv {
        name: name.to_string(),
        purpose: purpose.to_string(),
    })
}

/// Whether `path` is a regular file the current user may execute.
pub fn is_executable_file(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => access(path, Permission::Execute),
        _ => false,
    }
}

/// Whether `path` exists and the current user may write to it.
pub fn is_writable(path: &Path) -> bool {
    access(path, Permission::Write)
}

#[derive(Debug, Clone, Copy)]
enum Permission {
    Write,
    Execute,
}

/// Asks the kernel, for the real uid/gid of this process.
#[cfg(unix)]
fn access(path: &Path, permission: Permission) -> bool {
    use rustix::fs::Access;

    let mode = match permission {
        Permission::Write => Access::WRITE_OK,
        Permission::Execute => Access::EXEC_OK,
    };
    rustix::fs::access(path, mode).is_ok()
}

#[cfg(not(unix))]
fn access(path: &Path, permission: Permission) -> bool {
    match (std::fs::metadata(path), permission) {
        (Ok(meta), Permission::Write) => !meta.permissions().readonly(),
        (Ok(_), Permission::Execute) => true,
        (Err(_), _) => false,
    }
}

/// Fails unless `path` is writable.
pub fn ensure_writable(path: &Path, purpose: &str) -> Result<(), BuildError> {
    if is_writable(path) {
        Ok(())
    } else {
        Err(BuildError::NotWritable {
            path: path.to_path_buf(),
            purpose: purpose.to_string(),
        })
    }
}
