//! Canonical metadata record for one discovered configuration file.
//!
//! Identity (`data_id`, `group`) and the content hash are pure functions of the
//! relative path and the raw bytes, so rebuilding a record from the same file
//! always yields the same identity.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::contract::DEFAULT_GROUP;
use crate::path_info::{extension_of, PathInfo};
use crate::scanner::ScannedFile;

/// Content types accepted by the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigType {
    Yaml,
    Properties,
    Json,
    Xml,
    Html,
    Text,
}

impl ConfigType {
    /// Map a (case-insensitive) file type tag to a store type. Unknown tags are text.
    pub fn from_type(tag: &str) -> Self {
        match tag.to_lowercase().as_str() {
            "yml" | "yaml" => ConfigType::Yaml,
            "properties" => ConfigType::Properties,
            "json" => ConfigType::Json,
            "xml" => ConfigType::Xml,
            "html" => ConfigType::Html,
            _ => ConfigType::Text,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigType::Yaml => "yaml",
            ConfigType::Properties => "properties",
            ConfigType::Json => "json",
            ConfigType::Xml => "xml",
            ConfigType::Html => "html",
            ConfigType::Text => "text",
        }
    }
}

fn is_recognized(ext: &str) -> bool {
    matches!(
        ext,
        "yml" | "yaml" | "properties" | "json" | "xml" | "html" | "txt" | "text"
    )
}

/// One configuration entry, ready to be reconciled against the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMetadata {
    pub data_id: String,
    pub group: String,
    /// Remote namespace; mirrors the environment.
    pub namespace: String,
    pub environment: String,
    pub app_name: String,
    pub file_name: String,
    pub config_name: String,
    #[serde(rename = "type")]
    pub file_type: String,
    pub description: String,
    #[serde(serialize_with = "serialize_lossy")]
    pub content: Vec<u8>,
    pub content_hash: String,
    pub file_path: String,
    pub last_modified: DateTime<Utc>,
}

fn serialize_lossy<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(bytes))
}

impl ConfigMetadata {
    /// Build a record from a parsed path and the file's raw content.
    ///
    /// `disk_name` is the file's own name; it decides the type tag even when the
    /// path is too shallow to yield a `file_name`.
    pub fn build(
        path: &PathInfo,
        disk_name: &str,
        file_path: &str,
        content: Vec<u8>,
        last_modified: DateTime<Utc>,
    ) -> Self {
        let file_type = extension_of(disk_name)
            .filter(|ext| is_recognized(ext))
            .unwrap_or_else(|| "txt".to_string());

        ConfigMetadata {
            data_id: data_id_for(path),
            group: group_for(path),
            namespace: path.environment.clone(),
            environment: path.environment.clone(),
            app_name: path.app_name.clone(),
            file_name: path.file_name.clone(),
            config_name: path.config_name.clone(),
            file_type,
            description: description_for(path),
            content_hash: content_hash(&content),
            content,
            file_path: file_path.to_string(),
            last_modified,
        }
    }

    /// Build a record from a scanner result.
    pub fn from_scanned(file: &ScannedFile) -> Self {
        let info = PathInfo::parse(&file.relative_path);
        let disk_name = file
            .relative_path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default();
        Self::build(
            &info,
            disk_name,
            &file.relative_path,
            file.content.clone(),
            file.modified,
        )
    }

    pub fn config_type(&self) -> ConfigType {
        ConfigType::from_type(&self.file_type)
    }

    /// Content as UTF-8 text, replacing invalid sequences.
    pub fn content_text(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }

    /// Group to publish under; never empty.
    pub fn effective_group(&self) -> &str {
        if self.group.is_empty() {
            DEFAULT_GROUP
        } else {
            &self.group
        }
    }
}

/// `app-file` when both are known, else the file name, else `unknown`.
pub fn data_id_for(path: &PathInfo) -> String {
    if !path.app_name.is_empty() && !path.file_name.is_empty() {
        format!("{}-{}", path.app_name, path.file_name)
    } else if !path.file_name.is_empty() {
        path.file_name.clone()
    } else {
        "unknown".to_string()
    }
}

pub fn group_for(path: &PathInfo) -> String {
    if path.app_name.is_empty() {
        DEFAULT_GROUP.to_string()
    } else {
        format!("{}_GROUP", path.app_name.to_uppercase())
    }
}

fn description_for(path: &PathInfo) -> String {
    let or_unknown = |s: &str| {
        if s.is_empty() {
            "unknown".to_string()
        } else {
            s.to_string()
        }
    };
    format!(
        "Synced config file - app: {}, environment: {}, config: {}",
        or_unknown(&path.app_name),
        or_unknown(&path.environment),
        or_unknown(&path.config_name)
    )
}

/// Hex SHA-256 of the raw bytes.
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(path: &str, content: &[u8]) -> ConfigMetadata {
        let info = PathInfo::parse(path);
        let disk_name = path.rsplit('/').next().unwrap();
        ConfigMetadata::build(&info, disk_name, path, content.to_vec(), Utc::now())
    }

    #[test]
    fn derives_identity_from_convention() {
        let m = build("dev/user-service/application.yml", b"a: 1");
        assert_eq!(m.environment, "dev");
        assert_eq!(m.app_name, "user-service");
        assert_eq!(m.file_name, "application.yml");
        assert_eq!(m.data_id, "user-service-application.yml");
        assert_eq!(m.group, "USER-SERVICE_GROUP");
        assert_eq!(m.namespace, "dev");
        assert_eq!(m.file_type, "yml");
        assert_eq!(m.config_type(), ConfigType::Yaml);
        assert_eq!(m.file_path, "dev/user-service/application.yml");
    }

    #[test]
    fn identity_is_idempotent() {
        let a = build("prod/billing/app.properties", b"x=1\n");
        let b = build("prod/billing/app.properties", b"x=1\n");
        assert_eq!(a.data_id, b.data_id);
        assert_eq!(a.group, b.group);
        assert_eq!(a.content_hash, b.content_hash);
    }

    #[test]
    fn hash_follows_content() {
        let a = build("dev/app/a.json", b"{}");
        let b = build("dev/app/a.json", b"{ }");
        assert_ne!(a.content_hash, b.content_hash);
        assert_eq!(a.content_hash.len(), 64);
    }

    #[test]
    fn shallow_paths_fall_back() {
        let m = build("dev/application.yml", b"");
        assert_eq!(m.data_id, "unknown");
        assert_eq!(m.group, "APPLICATION.YML_GROUP");
        assert_eq!(m.file_type, "yml");

        let m = build("application.yml", b"");
        assert_eq!(m.data_id, "unknown");
        assert_eq!(m.group, "DEFAULT_GROUP");
        assert_eq!(
            m.description,
            "Synced config file - app: unknown, environment: application.yml, config: unknown"
        );
    }

    #[test]
    fn file_type_defaults_to_txt() {
        assert_eq!(build("dev/app/Makefile", b"").file_type, "txt");
        assert_eq!(build("dev/app/data.toml", b"").file_type, "txt");
        assert_eq!(build("dev/app/Config.JSON", b"").file_type, "json");
        assert_eq!(build("dev/app/data.toml", b"").config_type(), ConfigType::Text);
    }

    #[test]
    fn type_mapping() {
        assert_eq!(ConfigType::from_type("YAML"), ConfigType::Yaml);
        assert_eq!(ConfigType::from_type("yml"), ConfigType::Yaml);
        assert_eq!(ConfigType::from_type("properties"), ConfigType::Properties);
        assert_eq!(ConfigType::from_type("xml"), ConfigType::Xml);
        assert_eq!(ConfigType::from_type("html"), ConfigType::Html);
        assert_eq!(ConfigType::from_type("txt"), ConfigType::Text);
        assert_eq!(ConfigType::from_type("text"), ConfigType::Text);
        assert_eq!(ConfigType::from_type("ini"), ConfigType::Text);
        assert_eq!(ConfigType::Json.as_str(), "json");
    }

    #[test]
    fn serialises_content_as_text() {
        let m = build("dev/app/a.yml", b"k: v");
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["dataId"], "app-a.yml");
        assert_eq!(json["type"], "yml");
        assert_eq!(json["content"], "k: v");
    }
}
