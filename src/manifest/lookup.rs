use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::error::{BridgeError, Result};
use crate::manifest::paths::{manifest_candidates, Scope};

/// A Firefox native messaging host manifest, as read from disk.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NativeManifest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub allowed_extensions: Vec<String>,
}

/// A manifest that passed validation, plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedManifest {
    pub manifest_path: PathBuf,
    pub scope: Scope,
    pub manifest: NativeManifest,
    /// Executable to launch, already resolved against the manifest directory where needed.
    pub executable: PathBuf,
}

/// Host names are dot-separated runs of ASCII word characters (`^\w+(\.\w+)*$`).
pub fn validate_app_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|part| {
            !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

/// Find the first usable manifest for `app_id` that lets `extension_id` connect.
///
/// User registrations are tried before system ones. Unreadable or invalid manifests
/// are skipped (with a warning) the way the browser skips them; if nothing usable is
/// found the app is [`BridgeError::ChannelUnavailable`].
pub fn find_manifest(app_id: &str, extension_id: &str) -> Result<LocatedManifest> {
    if !validate_app_name(app_id) {
        return Err(BridgeError::unavailable(app_id, "invalid native application name"));
    }

    let mut last_problem = None;
    for scope in Scope::SEARCH_ORDER {
        for path in manifest_candidates(app_id, scope) {
            let raw = match fs::read_to_string(&path) {
                Ok(raw) => raw,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "unreadable native manifest"
                    );
                    last_problem = Some(format!("{}: {e}", path.display()));
                    continue;
                }
            };
            match check_manifest(app_id, extension_id, &path, &raw) {
                Ok((manifest, executable)) => {
                    tracing::debug!(path = %path.display(), ?scope, "using native manifest");
                    return Ok(LocatedManifest {
                        manifest_path: path,
                        scope,
                        manifest,
                        executable,
                    });
                }
                Err(problem) => {
                    tracing::warn!(path = %path.display(), %problem, "rejected native manifest");
                    last_problem = Some(format!("{}: {problem}", path.display()));
                }
            }
        }
    }

    Err(BridgeError::unavailable(
        app_id,
        last_problem.unwrap_or_else(|| "no native manifest found".to_string()),
    ))
}

/// Validate one manifest's content. Returns the manifest and its resolved executable.
pub fn check_manifest(
    app_id: &str,
    extension_id: &str,
    manifest_path: &Path,
    raw: &str,
) -> std::result::Result<(NativeManifest, PathBuf), String> {
    let manifest: NativeManifest =
        serde_json::from_str(raw).map_err(|e| format!("invalid manifest JSON: {e}"))?;

    if manifest.name != app_id {
        return Err(format!(
            "manifest name {:?} does not match {app_id:?}",
            manifest.name
        ));
    }
    if manifest.kind != "stdio" {
        return Err(format!("unsupported manifest type {:?}", manifest.kind));
    }
    if !manifest.allowed_extensions.iter().any(|id| id == extension_id) {
        return Err(format!("{extension_id} is not in allowed_extensions"));
    }

    let executable = resolve_executable(manifest_path, &manifest.path)?;
    Ok((manifest, executable))
}

#[cfg(windows)]
fn resolve_executable(manifest_path: &Path, exe: &Path) -> std::result::Result<PathBuf, String> {
    if exe.is_absolute() {
        return Ok(exe.to_path_buf());
    }
    manifest_path
        .parent()
        .map(|dir| dir.join(exe))
        .ok_or_else(|| format!("cannot resolve {exe:?} relative to the manifest"))
}

#[cfg(not(windows))]
fn resolve_executable(_manifest_path: &Path, exe: &Path) -> std::result::Result<PathBuf, String> {
    if exe.is_absolute() {
        Ok(exe.to_path_buf())
    } else {
        Err(format!("manifest path {exe:?} must be absolute"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const EXT: &str = "firefoxpwa@filips.si";

    fn manifest_json(name: &str, kind: &str, path: &str, allowed: &[&str]) -> String {
        json!({
            "name": name,
            "description": "test host",
            "path": path,
            "type": kind,
            "allowed_extensions": allowed,
        })
        .to_string()
    }

    #[test]
    fn app_name_rules() {
        assert!(validate_app_name("firefoxpwa"));
        assert!(validate_app_name("com.example.native_host"));
        assert!(!validate_app_name(""));
        assert!(!validate_app_name(".leading"));
        assert!(!validate_app_name("trailing."));
        assert!(!validate_app_name("double..dot"));
        assert!(!validate_app_name("has-dash"));
        assert!(!validate_app_name("../escape"));
    }

    #[cfg(unix)]
    #[test]
    fn accepts_valid_manifest() {
        let raw = manifest_json("firefoxpwa", "stdio", "/usr/bin/firefoxpwa-connector", &[EXT]);
        let (m, exe) = check_manifest("firefoxpwa", EXT, Path::new("/tmp/firefoxpwa.json"), &raw)
            .expect("valid");
        assert_eq!(m.name, "firefoxpwa");
        assert_eq!(exe, PathBuf::from("/usr/bin/firefoxpwa-connector"));
    }

    #[test]
    fn rejects_foreign_extension() {
        let raw = manifest_json("firefoxpwa", "stdio", "/bin/true", &["other@example.org"]);
        let err = check_manifest("firefoxpwa", EXT, Path::new("/tmp/m.json"), &raw).unwrap_err();
        assert!(err.contains("allowed_extensions"), "{err}");
    }

    #[test]
    fn rejects_name_mismatch_and_wrong_type() {
        let raw = manifest_json("other", "stdio", "/bin/true", &[EXT]);
        assert!(check_manifest("firefoxpwa", EXT, Path::new("/tmp/m.json"), &raw).is_err());

        let raw = manifest_json("firefoxpwa", "pkcs11", "/bin/true", &[EXT]);
        assert!(check_manifest("firefoxpwa", EXT, Path::new("/tmp/m.json"), &raw).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn rejects_relative_executable_on_unix() {
        let raw = manifest_json("firefoxpwa", "stdio", "bin/connector", &[EXT]);
        let err = check_manifest("firefoxpwa", EXT, Path::new("/tmp/m.json"), &raw).unwrap_err();
        assert!(err.contains("absolute"), "{err}");
    }

    #[test]
    fn invalid_name_is_unavailable_without_touching_disk() {
        let err = find_manifest("not/a/name", EXT).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ChannelUnavailable);
    }
}
