//! Native host manifest discovery (read side only; installing hosts is the host's job).

pub mod lookup;
pub mod paths;

#[cfg(all(windows, feature = "windows-registry"))]
pub mod winreg;

pub use lookup::{check_manifest, find_manifest, validate_app_name, LocatedManifest, NativeManifest};
pub use paths::Scope;
