//! Path convention: `<environment>/<app>/.../<file>` relative to the config root.

/// Segments extracted from a relative configuration path.
///
/// Missing segments are left empty rather than treated as errors, so partially
/// structured trees are tolerated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathInfo {
    pub environment: String,
    pub app_name: String,
    pub file_name: String,
    pub config_name: String,
}

impl PathInfo {
    /// Parse a path relative to the config root. Leading separators are trimmed
    /// and both `/` and `\` separate segments.
    pub fn parse(relative_path: &str) -> Self {
        let trimmed = relative_path.trim_start_matches(['/', '\\']);
        let segments: Vec<&str> = trimmed
            .split(['/', '\\'])
            .filter(|s| !s.is_empty())
            .collect();

        let mut info = PathInfo::default();
        if let Some(env) = segments.first() {
            info.environment = env.to_string();
        }
        if let Some(app) = segments.get(1) {
            info.app_name = app.to_string();
        }
        if segments.len() >= 3 {
            if let Some(last) = segments.last() {
                info.file_name = last.to_string();
                info.config_name = strip_extension(last).to_string();
            }
        }
        info
    }

    /// Strip `root` (if present) from `path` before parsing it.
    pub fn parse_under(root: &str, path: &str) -> Self {
        let relative = path.strip_prefix(root).unwrap_or(path);
        Self::parse(relative)
    }
}

/// File name without its extension. A leading dot does not start an extension.
pub fn strip_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    }
}

/// Lowercased extension of `file_name`, if it has one.
pub fn extension_of(file_name: &str) -> Option<String> {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < file_name.len() => {
            Some(file_name[idx + 1..].to_lowercase())
        }
        _ => None,
    }
}
