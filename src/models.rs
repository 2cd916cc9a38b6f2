use serde::{Deserialize, Serialize};

/// Job status as reported by `/api/cloud_backup/status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StatusReport {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub last_run: Option<String>,
    #[serde(default)]
    pub next_run: Option<String>,
    #[serde(default)]
    pub last_run_duration: Option<String>,
}

/// Current configuration as returned by `GET /api/cloud_backup/config`.
///
/// Only non-sensitive values are exposed; the stored MEGA password never is.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConfigSnapshot {
    pub cloud_mode: String,
    pub mega_email: String,
    pub mega_folder: String,
    pub rclone_dir: String,
    pub bandwidth_limit: String,
    pub backup_cloud_time: String,
    pub rclone_config: String,
}

impl ConfigSnapshot {
    pub fn mode(&self) -> BackupMode {
        if self.cloud_mode == "mega" {
            BackupMode::Mega
        } else {
            BackupMode::Advanced
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupMode {
    Mega,
    Advanced,
}

/// Payload of `POST /api/cloud_backup/config`.
///
/// Tagged by `cloud_mode`, so exactly one mode's fields are ever sent.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "cloud_mode", rename_all = "lowercase")]
pub enum BackupConfig {
    Mega {
        mega_email: String,
        /// Present only when the user typed a new password.
        #[serde(skip_serializing_if = "Option::is_none")]
        mega_password: Option<String>,
        mega_folder: String,
    },
    Advanced {
        rclone_config: String,
        remote_name: String,
    },
}

impl BackupConfig {
    pub fn mode(&self) -> BackupMode {
        match self {
            BackupConfig::Mega { .. } => BackupMode::Mega,
            BackupConfig::Advanced { .. } => BackupMode::Advanced,
        }
    }
}

/// Payload of `POST /api/cloud_backup/schedule`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScheduleConfig {
    pub backup_cloud_time: String,
    pub bandwidth_limit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MegaCredentials {
    pub email: String,
    pub password: String,
}

/// Body of `/api/cloud_backup/mega/list_folders`.
///
/// Missing credentials are sent as `null`; the backend then uses the
/// credentials it has stored.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ListFoldersRequest {
    pub path: String,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl ListFoldersRequest {
    pub fn new(path: &str, credentials: Option<MegaCredentials>) -> Self {
        let (email, password) = match credentials {
            Some(c) => (Some(c.email), Some(c.password)),
            None => (None, None),
        };
        Self {
            path: path.to_string(),
            email,
            password,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FolderListing {
    pub path: String,
    pub parent: String,
    #[serde(default)]
    pub folders: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CreateFolderRequest {
    pub folder_name: String,
    pub path: String,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Body of `/api/setup/mega/save`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MegaSetupRequest {
    pub email: String,
    pub password: String,
    pub folder: String,
}

/// Body of `/api/setup/rclone`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RcloneSetupRequest {
    pub config: String,
    pub remote_name: String,
}
