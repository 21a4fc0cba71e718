use std::path::PathBuf;

/// Where a native host manifest was registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    User,
    System,
}

impl Scope {
    /// Lookup order: the user's own registration wins over a system-wide one.
    pub const SEARCH_ORDER: [Scope; 2] = [Scope::User, Scope::System];
}

#[cfg(unix)]
fn unix_home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}

pub fn firefox_user_manifest(name: &str) -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        unix_home_dir().map(|home| {
            home.join("Library/Application Support/Mozilla/NativeMessagingHosts")
                .join(format!("{name}.json"))
        })
    }
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        unix_home_dir().map(|home| {
            home.join(".mozilla/native-messaging-hosts")
                .join(format!("{name}.json"))
        })
    }
    #[cfg(windows)]
    {
        let _ = name;
        None
    }
}

pub fn firefox_system_manifests(name: &str) -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        vec![PathBuf::from(format!(
            "/Library/Application Support/Mozilla/NativeMessagingHosts/{name}.json"
        ))]
    }
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        vec![
            PathBuf::from(format!("/usr/lib/mozilla/native-messaging-hosts/{name}.json")),
            PathBuf::from(format!("/usr/lib64/mozilla/native-messaging-hosts/{name}.json")),
        ]
    }
    #[cfg(windows)]
    {
        let _ = name;
        Vec::new()
    }
}

/// Registry key (under HKCU or HKLM) whose default value is the manifest path.
pub fn firefox_winreg_path(name: &str) -> String {
    format!(r"Software\Mozilla\NativeMessagingHosts\{name}")
}

/// Manifest files to try for `name` in `scope`, in order.
pub fn manifest_candidates(name: &str, scope: Scope) -> Vec<PathBuf> {
    #[cfg(all(windows, feature = "windows-registry"))]
    {
        let key = firefox_winreg_path(name);
        match crate::manifest::winreg::read_manifest_path_from_reg(scope, &key) {
            Ok(found) => found.into_iter().collect(),
            Err(err) => {
                tracing::warn!(key = %key, ?scope, error = %err, "registry lookup failed");
                Vec::new()
            }
        }
    }
    #[cfg(not(all(windows, feature = "windows-registry")))]
    {
        match scope {
            Scope::User => firefox_user_manifest(name).into_iter().collect(),
            Scope::System => firefox_system_manifests(name),
        }
    }
}
