use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::error::ApiError;
use crate::models::{
    BackupConfig, ConfigSnapshot, CreateFolderRequest, FolderListing, ListFoldersRequest,
    MegaCredentials, MegaSetupRequest, RcloneSetupRequest, ScheduleConfig, StatusReport,
};

/// Operations the appliance exposes to the cloud backup page and setup wizard.
///
/// Components are generic over this trait so they can run against the real
/// HTTP client or an in-memory stand-in.
#[allow(async_fn_in_trait)]
pub trait CloudBackupApi {
    async fn status(&self) -> Result<StatusReport, ApiError>;
    async fn config(&self) -> Result<ConfigSnapshot, ApiError>;
    async fn save_config(&self, config: &BackupConfig) -> Result<(), ApiError>;
    async fn save_schedule(&self, schedule: &ScheduleConfig) -> Result<(), ApiError>;
    async fn run_backup(&self) -> Result<(), ApiError>;
    async fn validate_mega(&self, credentials: &MegaCredentials) -> Result<(), ApiError>;
    async fn list_folders(&self, request: &ListFoldersRequest) -> Result<FolderListing, ApiError>;
    async fn create_folder(&self, request: &CreateFolderRequest) -> Result<(), ApiError>;
    async fn setup_mega_connect(
        &self,
        credentials: &MegaCredentials,
    ) -> Result<Vec<String>, ApiError>;
    async fn setup_mega_save(&self, request: &MegaSetupRequest) -> Result<(), ApiError>;
    async fn setup_rclone(&self, request: &RcloneSetupRequest) -> Result<(), ApiError>;
    async fn task_logs(&self, task: &str, lines: u32) -> Result<String, ApiError>;
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, ApiError> {
        let mut builder = Client::builder().cookie_store(true);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        // Url::join drops the last segment unless the base ends with a slash
        let mut base = base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base)?;

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path)?)
    }

    /// Opens an authenticated session; the session cookie is kept by the client.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let url = self.endpoint("login")?;
        let response = self
            .client
            .post(url.clone())
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }

        // A rejected login renders the login page again instead of redirecting
        if response.url().path() == url.path() {
            return Err(ApiError::LoginFailed(username.to_string()));
        }

        tracing::info!("Logged in to {} as {}", self.base_url, username);
        Ok(())
    }

    async fn get_json(&self, path: &str, fallback: &str) -> Result<Value, ApiError> {
        let url = self.endpoint(path)?;
        tracing::debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        unwrap_envelope(status, &body, fallback)
    }

    async fn post_json<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        fallback: &str,
    ) -> Result<Value, ApiError> {
        let url = self.endpoint(path)?;
        tracing::debug!("POST {}", url);
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        let body = response.text().await?;
        unwrap_envelope(status, &body, fallback)
    }
}

/// Checks the `{success, error}` envelope every JSON endpoint answers with.
pub(crate) fn unwrap_envelope(
    status: http::StatusCode,
    body: &str,
    fallback: &str,
) -> Result<Value, ApiError> {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) if !status.is_success() => return Err(ApiError::Status(status)),
        Err(e) => return Err(e.into()),
    };

    if value.get("success").and_then(Value::as_bool) == Some(true) {
        return Ok(value);
    }

    let message = value
        .get("error")
        .and_then(Value::as_str)
        .filter(|msg| !msg.is_empty())
        .unwrap_or(fallback);
    tracing::warn!("Backend rejected request ({}): {}", status, message);
    Err(ApiError::Rejected(message.to_string()))
}

fn field<T: DeserializeOwned>(value: &mut Value, key: &str) -> Result<T, ApiError> {
    Ok(serde_json::from_value(value.get_mut(key).map(Value::take).unwrap_or_default())?)
}

impl CloudBackupApi for ApiClient {
    async fn status(&self) -> Result<StatusReport, ApiError> {
        let mut value = self
            .get_json("api/cloud_backup/status", "Failed to load status")
            .await?;
        field(&mut value, "status")
    }

    async fn config(&self) -> Result<ConfigSnapshot, ApiError> {
        let mut value = self
            .get_json("api/cloud_backup/config", "Failed to load settings")
            .await?;
        field(&mut value, "config")
    }

    async fn save_config(&self, config: &BackupConfig) -> Result<(), ApiError> {
        self.post_json("api/cloud_backup/config", config, "Failed to save settings")
            .await?;
        Ok(())
    }

    async fn save_schedule(&self, schedule: &ScheduleConfig) -> Result<(), ApiError> {
        self.post_json("api/cloud_backup/schedule", schedule, "Failed to save schedule")
            .await?;
        Ok(())
    }

    async fn run_backup(&self) -> Result<(), ApiError> {
        self.post_json("api/cloud_backup/run", &serde_json::json!({}), "Could not start backup.")
            .await?;
        Ok(())
    }

    async fn validate_mega(&self, credentials: &MegaCredentials) -> Result<(), ApiError> {
        self.post_json(
            "api/cloud_backup/mega/validate",
            credentials,
            "Could not validate credentials.",
        )
        .await?;
        Ok(())
    }

    async fn list_folders(&self, request: &ListFoldersRequest) -> Result<FolderListing, ApiError> {
        let value = self
            .post_json("api/cloud_backup/mega/list_folders", request, "Could not load folders.")
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn create_folder(&self, request: &CreateFolderRequest) -> Result<(), ApiError> {
        self.post_json("api/cloud_backup/mega/create_folder", request, "Failed to create folder.")
            .await?;
        Ok(())
    }

    async fn setup_mega_connect(
        &self,
        credentials: &MegaCredentials,
    ) -> Result<Vec<String>, ApiError> {
        let mut value = self
            .post_json("api/setup/mega/connect", credentials, "Failed to connect to MEGA.")
            .await?;
        field(&mut value, "folders")
    }

    async fn setup_mega_save(&self, request: &MegaSetupRequest) -> Result<(), ApiError> {
        self.post_json("api/setup/mega/save", request, "Failed to save MEGA config.")
            .await?;
        Ok(())
    }

    async fn setup_rclone(&self, request: &RcloneSetupRequest) -> Result<(), ApiError> {
        self.post_json("api/setup/rclone", request, "Failed to save rclone config.")
            .await?;
        Ok(())
    }

    async fn task_logs(&self, task: &str, lines: u32) -> Result<String, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(["task", task, "logs"]);
        url.query_pairs_mut().append_pair("lines", &lines.to_string());

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }
        Ok(response.text().await?)
    }
}

#[cfg(test)]
pub mod testing {
    //! In-memory backend that records every call it receives.

    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Status,
        Config,
        SaveConfig(BackupConfig),
        SaveSchedule(ScheduleConfig),
        RunBackup,
        Validate(MegaCredentials),
        ListFolders(ListFoldersRequest),
        CreateFolder(CreateFolderRequest),
        SetupConnect(MegaCredentials),
        SetupMegaSave(MegaSetupRequest),
        SetupRclone(RcloneSetupRequest),
        TaskLogs(String, u32),
    }

    /// Failures are queued per operation name and consumed one per call.
    #[derive(Default)]
    pub struct FakeApi {
        pub calls: RefCell<Vec<Call>>,
        pub status: RefCell<StatusReport>,
        pub config: RefCell<ConfigSnapshot>,
        pub folders: RefCell<HashMap<String, Vec<String>>>,
        pub logs: RefCell<VecDeque<String>>,
        failures: RefCell<HashMap<&'static str, VecDeque<String>>>,
    }

    impl FakeApi {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_folders(self, path: &str, folders: &[&str]) -> Self {
            self.folders.borrow_mut().insert(
                path.to_string(),
                folders.iter().map(|f| f.to_string()).collect(),
            );
            self
        }

        pub fn fail(&self, op: &'static str, message: &str) {
            self.failures
                .borrow_mut()
                .entry(op)
                .or_default()
                .push_back(message.to_string());
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }

        fn record(&self, op: &'static str, call: Call) -> Result<(), ApiError> {
            self.calls.borrow_mut().push(call);
            match self.failures.borrow_mut().get_mut(op).and_then(VecDeque::pop_front) {
                Some(message) => Err(ApiError::Rejected(message)),
                None => Ok(()),
            }
        }
    }

    pub fn parent_of(path: &str) -> String {
        let trimmed = path.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(0) | None => "/".to_string(),
            Some(idx) => trimmed[..idx].to_string(),
        }
    }

    impl CloudBackupApi for FakeApi {
        async fn status(&self) -> Result<StatusReport, ApiError> {
            self.record("status", Call::Status)?;
            Ok(self.status.borrow().clone())
        }

        async fn config(&self) -> Result<ConfigSnapshot, ApiError> {
            self.record("config", Call::Config)?;
            Ok(self.config.borrow().clone())
        }

        async fn save_config(&self, config: &BackupConfig) -> Result<(), ApiError> {
            self.record("save_config", Call::SaveConfig(config.clone()))
        }

        async fn save_schedule(&self, schedule: &ScheduleConfig) -> Result<(), ApiError> {
            self.record("save_schedule", Call::SaveSchedule(schedule.clone()))?;
            let mut config = self.config.borrow_mut();
            config.backup_cloud_time = schedule.backup_cloud_time.clone();
            config.bandwidth_limit = schedule.bandwidth_limit.clone();
            Ok(())
        }

        async fn run_backup(&self) -> Result<(), ApiError> {
            self.record("run_backup", Call::RunBackup)
        }

        async fn validate_mega(&self, credentials: &MegaCredentials) -> Result<(), ApiError> {
            self.record("validate", Call::Validate(credentials.clone()))
        }

        async fn list_folders(&self, request: &ListFoldersRequest) -> Result<FolderListing, ApiError> {
            self.record("list_folders", Call::ListFolders(request.clone()))?;
            let folders = self.folders.borrow().get(&request.path).cloned().unwrap_or_default();
            Ok(FolderListing {
                path: request.path.clone(),
                parent: parent_of(&request.path),
                folders,
            })
        }

        async fn create_folder(&self, request: &CreateFolderRequest) -> Result<(), ApiError> {
            self.record("create_folder", Call::CreateFolder(request.clone()))?;
            self.folders
                .borrow_mut()
                .entry(request.path.clone())
                .or_default()
                .push(request.folder_name.clone());
            Ok(())
        }

        async fn setup_mega_connect(
            &self,
            credentials: &MegaCredentials,
        ) -> Result<Vec<String>, ApiError> {
            self.record("setup_connect", Call::SetupConnect(credentials.clone()))?;
            Ok(self.folders.borrow().get("/").cloned().unwrap_or_default())
        }

        async fn setup_mega_save(&self, request: &MegaSetupRequest) -> Result<(), ApiError> {
            self.record("setup_mega_save", Call::SetupMegaSave(request.clone()))
        }

        async fn setup_rclone(&self, request: &RcloneSetupRequest) -> Result<(), ApiError> {
            self.record("setup_rclone", Call::SetupRclone(request.clone()))
        }

        async fn task_logs(&self, task: &str, lines: u32) -> Result<String, ApiError> {
            self.record("task_logs", Call::TaskLogs(task.to_string(), lines))?;
            Ok(self.logs.borrow_mut().pop_front().unwrap_or_default())
        }
    }
}
