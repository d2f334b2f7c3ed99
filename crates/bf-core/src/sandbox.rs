//! Per-profile working-directory sandbox.
//!
//! Every profile gets exactly one directory under the base data root. The
//! directory persists across stop/restart (cookies and browser state live
//! there) and is only deleted by explicit external action.
//!
//! Profile ids come from an external collaborator and must be treated as
//! hostile: ids containing path separators, traversal segments, or shell
//! metacharacters must never resolve outside the base root.

use bf_common::{Error, ProfileId, Result};
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Characters that are unsafe in a directory name on at least one
/// supported filesystem. Matches the set the profile store has always
/// sanitized.
fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[/\\:*?"<>|]"#).expect("static regex"))
}

/// Sanitize a profile id into a single safe path component.
///
/// Path separators, wildcards, and quote characters are replaced with `_`.
/// The result is trimmed; an id that is empty after sanitization is
/// rejected by [`prepare`].
pub fn sanitize_profile_id(profile_id: &ProfileId) -> String {
    unsafe_chars()
        .replace_all(profile_id.as_str(), "_")
        .trim()
        .to_string()
}

/// Lexically normalize a path, resolving `.` and `..` without touching the
/// filesystem (the target may not exist yet). Returns `None` if a `..`
/// would climb above the path's start.
fn normalize_lexically(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            other => out.push(other),
        }
    }
    Some(out)
}

/// Resolve and create the working directory for a profile.
///
/// The resolved path is guaranteed to be a strict descendant of
/// `base_root`; anything else fails with [`Error::SandboxViolation`].
/// Calling twice for the same id is a no-op on the second call.
pub fn prepare(base_root: &Path, profile_id: &ProfileId) -> Result<PathBuf> {
    if !profile_id.is_valid() {
        return Err(Error::InvalidProfile(
            "profile id cannot be empty".to_string(),
        ));
    }

    let sanitized = sanitize_profile_id(profile_id);
    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        // Ids like ".." sanitize to pure-dot names that still traverse
        return Err(Error::SandboxViolation {
            profile_id: profile_id.to_string(),
            path: sanitized,
        });
    }

    let base = if base_root.is_absolute() {
        base_root.to_path_buf()
    } else {
        std::env::current_dir()?.join(base_root)
    };
    let base = normalize_lexically(&base).ok_or_else(|| Error::SandboxViolation {
        profile_id: profile_id.to_string(),
        path: base_root.display().to_string(),
    })?;

    let candidate = base.join(&sanitized);
    let resolved = normalize_lexically(&candidate).filter(|p| p.starts_with(&base) && *p != base);

    let dir = match resolved {
        Some(dir) => dir,
        None => {
            warn!(
                profile_id = %profile_id,
                candidate = %candidate.display(),
                "profile id resolved outside the base data directory"
            );
            return Err(Error::SandboxViolation {
                profile_id: profile_id.to_string(),
                path: candidate.display().to_string(),
            });
        }
    };

    std::fs::create_dir_all(&dir)?;
    debug!(profile_id = %profile_id, dir = %dir.display(), "profile directory ready");
    Ok(dir)
}
