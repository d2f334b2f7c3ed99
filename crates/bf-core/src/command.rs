//! Browser command-line construction.
//!
//! Pure mapping from profile attributes to an ordered argv. No I/O, no
//! shared state; safe to call concurrently for different profiles. Two
//! builds from identical inputs are byte-for-byte identical: the argv is
//! the wire contract with the spawned executable and must stay stable for
//! a given attribute set.

use bf_common::LaunchAttributes;
use std::path::Path;

/// Fixed isolation/stability flags appended to every command line, in
/// this exact order.
const BASELINE_FLAGS: &[&str] = &[
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-sync",
    "--disable-default-apps",
    "--disable-extensions",
    "--disable-component-update",
    "--disable-background-networking",
    "--disable-features=VizDisplayCompositor",
    "--disable-ipc-flooding-protection",
    "--max_old_space_size=4096",
    "--disable-renderer-backgrounding",
];

/// An attribute that was present on the profile but has no command-line
/// equivalent. Deliberate policy, not a defect: the caller surfaces these
/// so the user knows an in-browser agent (e.g. an extension) is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkippedAttribute {
    /// Platform hint; conveyed through the user agent instead.
    Platform,
    /// Canvas fingerprint spoofing.
    CanvasFingerprint,
    /// Font fingerprint spoofing.
    FontFingerprint,
}

impl SkippedAttribute {
    pub fn reason(&self) -> &'static str {
        match self {
            SkippedAttribute::Platform => {
                "platform is primarily influenced by the user agent; no dedicated flag exists"
            }
            SkippedAttribute::CanvasFingerprint => {
                "canvas spoofing cannot be applied via command-line arguments; an extension is required"
            }
            SkippedAttribute::FontFingerprint => {
                "font spoofing cannot be applied via command-line arguments; an extension is required"
            }
        }
    }
}

impl std::fmt::Display for SkippedAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkippedAttribute::Platform => write!(f, "platform"),
            SkippedAttribute::CanvasFingerprint => write!(f, "canvas_fingerprint"),
            SkippedAttribute::FontFingerprint => write!(f, "font_fingerprint"),
        }
    }
}

/// Result of command construction.
#[derive(Debug, Clone)]
pub struct BuiltCommand {
    /// Ordered argv; element 0 is the executable path.
    pub argv: Vec<String>,
    /// Attributes present on the profile but not translated to flags.
    pub skipped: Vec<SkippedAttribute>,
}

impl BuiltCommand {
    /// The full command line as a single display string (for logging).
    pub fn display(&self) -> String {
        self.argv.join(" ")
    }
}

/// Build the command line for one profile launch.
///
/// `executable` must already be resolved (profile override or configured
/// default); `data_dir` is the sandbox directory from
/// [`crate::sandbox::prepare`].
pub fn build(executable: &Path, attrs: &LaunchAttributes, data_dir: &Path) -> BuiltCommand {
    let mut argv = Vec::with_capacity(24);
    let mut skipped = Vec::new();

    argv.push(executable.display().to_string());
    argv.push(format!("--user-data-dir={}", data_dir.display()));

    if let Some(ua) = non_empty(&attrs.user_agent) {
        argv.push(format!("--user-agent={ua}"));
    }

    // Primary tag only: "en-US,en;q=0.9" -> "en-US"
    if let Some(language) = non_empty(&attrs.language) {
        let primary = language.split(',').next().unwrap_or(language);
        argv.push(format!("--lang={primary}"));
    }

    if attrs.platform.as_deref().is_some_and(|p| !p.is_empty()) {
        skipped.push(SkippedAttribute::Platform);
    }

    if let Some(tz) = non_empty(&attrs.timezone) {
        argv.push(format!("--force-timezone={tz}"));
    }

    // "1920x1080" -> "--window-size=1920,1080"; malformed values are
    // skipped rather than passed through broken
    if let Some(resolution) = non_empty(&attrs.resolution) {
        if let Some((w, h)) = parse_resolution(resolution) {
            argv.push(format!("--window-size={w},{h}"));
        }
    }

    if attrs.canvas.as_ref().is_some_and(|c| c.spoof) {
        skipped.push(SkippedAttribute::CanvasFingerprint);
    }
    if attrs.font.as_ref().is_some_and(|f| f.spoof) {
        skipped.push(SkippedAttribute::FontFingerprint);
    }

    if !attrs.webrtc.ip_handling_policy.is_empty() {
        argv.push(format!(
            "--webrtc-ip-handling-policy={}",
            attrs.webrtc.ip_handling_policy
        ));
    }
    // Only when explicitly disabled; enabled is the browser default
    if !attrs.webrtc.enabled {
        argv.push("--disable-webrtc".to_string());
    }

    if let Some(proxy) = attrs.proxy.as_ref().filter(|p| p.enabled) {
        if let Some(uri) = proxy.server_uri() {
            argv.push(format!("--proxy-server={uri}"));
        }
    }

    argv.extend(BASELINE_FLAGS.iter().map(|flag| flag.to_string()));

    BuiltCommand { argv, skipped }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn parse_resolution(resolution: &str) -> Option<(u32, u32)> {
    let (w, h) = resolution.split_once('x')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}
