//! # Discovery
//!
//! Finds each browser's history database under the current user's home directory.
//! Only macOS and Linux layouts are known; anything else resolves to absent.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::parsers::browser::Browser;
use crate::pipeline::{SourceLocation, SourcePlan};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Linux,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Other
        }
    }
}

/// Locate `browser`'s database for the running user.
pub fn resolve(browser: Browser) -> SourceLocation {
    match dirs::home_dir() {
        Some(home) => resolve_in(browser, &home, Platform::current()),
        None => {
            debug!("no home directory; {} treated as absent", browser.key());
            SourceLocation::Absent
        }
    }
}

/// Build a plan covering every browser in `enabled`.
pub fn plan(enabled: &[Browser]) -> SourcePlan {
    enabled.iter().map(|b| (*b, resolve(*b))).collect()
}

pub fn resolve_in(browser: Browser, home: &Path, platform: Platform) -> SourceLocation {
    let found = match (platform, browser) {
        (Platform::Other, _) => None,
        (Platform::Linux, Browser::Safari) => None,
        (Platform::MacOs, Browser::Safari) => {
            safari_candidates(home).into_iter().find(|p| is_readable(p))
        }
        (_, Browser::Firefox) => {
            let root = match platform {
                Platform::MacOs => home.join("Library/Application Support/Firefox/Profiles"),
                _ => home.join(".mozilla/firefox"),
            };
            find_profile(&root, |name| name.to_lowercase().contains("default"))
        }
        (_, Browser::LibreWolf) => {
            let root = match platform {
                Platform::MacOs => home.join("Library/Application Support/LibreWolf/Profiles"),
                _ => home.join(".librewolf"),
            };
            find_profile(&root, |name| name.to_lowercase().contains("default"))
        }
        (_, Browser::TorBrowser) => tor_roots(home, platform)
            .iter()
            .find(|root| root.is_dir())
            .and_then(|root| find_profile(root, |name| name.ends_with(".default"))),
        (_, chromium_like) => chromium_path(chromium_like, home, platform).filter(|p| p.is_file()),
    };
    match found {
        Some(path) => SourceLocation::Found(path),
        None => SourceLocation::Absent,
    }
}

fn chromium_path(browser: Browser, home: &Path, platform: Platform) -> Option<PathBuf> {
    let rel = match (platform, browser) {
        (Platform::MacOs, Browser::Chrome) => {
            "Library/Application Support/Google/Chrome/Default/History"
        }
        (Platform::MacOs, Browser::Brave) => {
            "Library/Application Support/BraveSoftware/Brave-Browser/Default/History"
        }
        (Platform::MacOs, Browser::Opera) => {
            "Library/Application Support/com.operasoftware.Opera/History"
        }
        (Platform::MacOs, Browser::Edge) => {
            "Library/Application Support/Microsoft Edge/Default/History"
        }
        (Platform::MacOs, Browser::Vivaldi) => {
            "Library/Application Support/Vivaldi/Default/History"
        }
        (Platform::MacOs, Browser::Chromium) => {
            "Library/Application Support/Chromium/Default/History"
        }
        (Platform::Linux, Browser::Chrome) => ".config/google-chrome/Default/History",
        (Platform::Linux, Browser::Brave) => ".config/BraveSoftware/Brave-Browser/Default/History",
        (Platform::Linux, Browser::Opera) => ".config/opera/History",
        (Platform::Linux, Browser::Edge) => ".config/microsoft-edge/Default/History",
        (Platform::Linux, Browser::Vivaldi) => ".config/vivaldi/Default/History",
        (Platform::Linux, Browser::Chromium) => ".config/chromium/Default/History",
        _ => return None,
    };
    Some(home.join(rel))
}

fn safari_candidates(home: &Path) -> Vec<PathBuf> {
    [
        "Library/Safari/History.db",
        "Library/Safari/History.sqlite",
        "Library/Safari/UserData/History.db",
        "Library/Containers/com.apple.Safari/Data/Library/Safari/History.db",
    ]
    .iter()
    .map(|rel| home.join(rel))
    .collect()
}

fn tor_roots(home: &Path, platform: Platform) -> Vec<PathBuf> {
    let primary = match platform {
        Platform::MacOs => home.join("Library/Application Support/TorBrowser-Data/Browser"),
        _ => home.join(".tor-browser/app/Browser/TorBrowser/Data/Browser"),
    };
    vec![
        primary,
        home.join("Desktop/tor-browser_en-US/Browser/TorBrowser/Data/Browser"),
    ]
}

/// First profile directory (by name) accepted by `matches` that holds `places.sqlite`.
fn find_profile(root: &Path, matches: impl Fn(&str) -> bool) -> Option<PathBuf> {
    let entries = fs::read_dir(root).ok()?;
    let mut profiles: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .filter(|p| p.file_name().and_then(|n| n.to_str()).is_some_and(&matches))
        .collect();
    profiles.sort();
    profiles
        .into_iter()
        .map(|p| p.join("places.sqlite"))
        .find(|p| p.is_file())
}

fn is_readable(path: &Path) -> bool {
    fs::File::open(path).is_ok()
}
