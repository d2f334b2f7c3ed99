//! Browser profile data model.
//!
//! These records cross the boundary with the persistence collaborator as
//! plain serde JSON. Every field except `id` is optional or defaulted; the
//! orchestrator treats attribute values as opaque strings and only decides
//! whether each one is translatable to a command-line flag.

use crate::id::ProfileId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// WebRTC behavior for a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebRtcSettings {
    pub enabled: bool,
    /// Chromium IP handling policy string, passed through verbatim.
    pub ip_handling_policy: String,
}

impl Default for WebRtcSettings {
    fn default() -> Self {
        WebRtcSettings {
            enabled: true,
            ip_handling_policy: "default_public_interface_only".to_string(),
        }
    }
}

/// Proxy scheme for outbound browser traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyScheme {
    /// No proxy; produces no command-line flag.
    #[default]
    Direct,
    Http,
    Socks4,
    Socks5,
}

impl ProxyScheme {
    /// URI scheme token as the browser expects it.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyScheme::Direct => "direct",
            ProxyScheme::Http => "http",
            ProxyScheme::Socks4 => "socks4",
            ProxyScheme::Socks5 => "socks5",
        }
    }
}

/// Proxy descriptor for a profile.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    pub scheme: ProxyScheme,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub enabled: bool,
}

impl ProxySettings {
    /// Whether the descriptor can be turned into a proxy-server URI.
    pub fn is_valid(&self) -> bool {
        if self.scheme == ProxyScheme::Direct {
            return true;
        }
        !self.host.trim().is_empty() && self.port > 0
    }

    /// Assemble the proxy-server URI: `scheme://[user[:pass]@]host:port`.
    ///
    /// Returns `None` for direct connections and invalid descriptors.
    pub fn server_uri(&self) -> Option<String> {
        if self.scheme == ProxyScheme::Direct || !self.is_valid() {
            return None;
        }
        let mut uri = format!("{}://", self.scheme.as_str());
        if let Some(user) = self.username.as_deref().filter(|u| !u.is_empty()) {
            uri.push_str(user);
            if let Some(pass) = self.password.as_deref() {
                uri.push(':');
                uri.push_str(pass);
            }
            uri.push('@');
        }
        uri.push_str(&format!("{}:{}", self.host, self.port));
        Some(uri)
    }
}

/// Canvas fingerprint spoofing settings.
///
/// Not expressible as a command-line flag; requires an in-browser agent.
/// The command builder reports this as an untranslated attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasSettings {
    pub spoof: bool,
    pub noise: f64,
}

impl Default for CanvasSettings {
    fn default() -> Self {
        CanvasSettings {
            spoof: true,
            noise: 0.0,
        }
    }
}

/// Font fingerprint spoofing settings. Same caveat as [`CanvasSettings`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSettings {
    pub spoof: bool,
    pub fonts: Vec<String>,
}

impl Default for FontSettings {
    fn default() -> Self {
        FontSettings {
            spoof: true,
            fonts: Vec::new(),
        }
    }
}

/// A named, persisted bundle of browser-launch attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserProfile {
    pub id: ProfileId,
    pub name: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Platform hint. Primarily conveyed via the user agent; never a flag.
    #[serde(default)]
    pub platform: Option<String>,
    /// Comma-separated language tags; the first one becomes `--lang`.
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    /// Screen geometry as "WxH", e.g. "1920x1080".
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub webrtc: WebRtcSettings,
    #[serde(default)]
    pub proxy: Option<ProxySettings>,
    #[serde(default)]
    pub canvas: Option<CanvasSettings>,
    #[serde(default)]
    pub font: Option<FontSettings>,
    /// Per-profile executable override; wins over the configured default.
    #[serde(default)]
    pub browser_executable_path: Option<PathBuf>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub last_used: DateTime<Utc>,
}

impl BrowserProfile {
    /// Create a fresh profile with a generated id.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        BrowserProfile {
            id: ProfileId::generate(),
            name: name.into(),
            user_agent: None,
            platform: None,
            language: None,
            timezone: None,
            resolution: None,
            webrtc: WebRtcSettings::default(),
            proxy: None,
            canvas: None,
            font: None,
            browser_executable_path: None,
            notes: None,
            created_at: now,
            last_used: now,
        }
    }
}

/// Immutable snapshot of the launch-relevant subset of a profile.
///
/// Taken once at the top of a launch call so that concurrent mutation of
/// the profile by the caller cannot affect an in-flight launch.
#[derive(Debug, Clone)]
pub struct LaunchAttributes {
    pub executable_override: Option<PathBuf>,
    pub user_agent: Option<String>,
    pub platform: Option<String>,
    pub language: Option<String>,
    pub timezone: Option<String>,
    pub resolution: Option<String>,
    pub webrtc: WebRtcSettings,
    pub proxy: Option<ProxySettings>,
    pub canvas: Option<CanvasSettings>,
    pub font: Option<FontSettings>,
}

impl From<&BrowserProfile> for LaunchAttributes {
    fn from(profile: &BrowserProfile) -> Self {
        LaunchAttributes {
            executable_override: profile.browser_executable_path.clone(),
            user_agent: profile.user_agent.clone(),
            platform: profile.platform.clone(),
            language: profile.language.clone(),
            timezone: profile.timezone.clone(),
            resolution: profile.resolution.clone(),
            webrtc: profile.webrtc.clone(),
            proxy: profile.proxy.clone(),
            canvas: profile.canvas.clone(),
            font: profile.font.clone(),
        }
    }
}

impl LaunchAttributes {
    /// An all-empty attribute set (configured defaults only).
    pub fn empty() -> Self {
        LaunchAttributes {
            executable_override: None,
            user_agent: None,
            platform: None,
            language: None,
            timezone: None,
            resolution: None,
            webrtc: WebRtcSettings::default(),
            proxy: None,
            canvas: None,
            font: None,
        }
    }
}
