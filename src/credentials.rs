//! Cloud backup configuration form.
//!
//! The MEGA credentials are validated once against the backend and then
//! locked. While locked, the password field only shows a placeholder and the
//! stored secret is never sent again unless the user unlocks the form and
//! types a new one.

use regex::Regex;
use std::sync::LazyLock;

use crate::api::CloudBackupApi;
use crate::error::{FieldName, FormError};
use crate::form::{Banner, Field};
use crate::models::{BackupConfig, BackupMode, ConfigSnapshot, MegaCredentials};
use crate::navigator::CredentialSupplier;

/// Shown in the password field in place of an accepted secret.
pub const PASSWORD_SENTINEL: &str = "********";

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern"));

// e.g. `myremote:` or `myremote:/backups`
static REMOTE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9_-]+:(?:/[^\s]*)?$").expect("valid remote name pattern")
});

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value.trim())
}

pub fn is_valid_remote_name(value: &str) -> bool {
    REMOTE_NAME_RE.is_match(value.trim())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    Editable,
    Validating,
    Locked,
}

/// Credentials captured when the folder picker was opened.
#[derive(Debug, Clone)]
pub struct FormCredentials(Option<MegaCredentials>);

impl CredentialSupplier for FormCredentials {
    fn credentials(&self) -> Option<MegaCredentials> {
        self.0.clone()
    }
}

#[derive(Debug, Clone)]
pub struct CredentialForm {
    state: CredentialState,
    mode: BackupMode,
    pub email: Field,
    pub password: Field,
    pub folder: Field,
    pub rclone_config: Field,
    pub remote_name: Field,
    /// Warns that changing the folder starts a fresh backup location.
    pub folder_warning: bool,
    /// Outcome of the last credential validation.
    pub credential_status: Option<Banner>,
    /// Outcome of the last load or save of the whole form.
    pub banner: Option<Banner>,
    saving: bool,
}

impl Default for CredentialForm {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialForm {
    pub fn new() -> Self {
        let mut form = Self {
            state: CredentialState::Editable,
            mode: BackupMode::Mega,
            email: Field::default(),
            password: Field::default(),
            folder: Field::default(),
            rclone_config: Field::default(),
            remote_name: Field::default(),
            folder_warning: false,
            credential_status: None,
            banner: None,
            saving: false,
        };
        form.set_mode(BackupMode::Mega);
        form.unlock();
        form
    }

    pub fn state(&self) -> CredentialState {
        self.state
    }

    pub fn mode(&self) -> BackupMode {
        self.mode
    }

    #[cfg(test)]
    pub fn is_saving(&self) -> bool {
        self.saving
    }

    /// The folder picker may only be opened with accepted credentials.
    pub fn browse_enabled(&self) -> bool {
        self.state == CredentialState::Locked
    }

    fn lock(&mut self, show_status: bool) {
        self.state = CredentialState::Locked;
        self.email.read_only = true;
        self.email.disabled = true;
        self.password.disabled = true;
        self.password.set(PASSWORD_SENTINEL);
        self.password.clear_invalid();
        if show_status {
            self.credential_status = Some(Banner::Success(
                "Connection successful. You are signed in.".to_string(),
            ));
        }
    }

    fn unlock(&mut self) {
        self.state = CredentialState::Editable;
        self.email.read_only = false;
        self.email.disabled = false;
        self.password.disabled = false;
        self.password.clear();
        self.credential_status = None;
    }

    /// Unlocks the credentials for editing and forgets the chosen folder.
    pub fn change_credentials(&mut self) -> Result<(), FormError> {
        if self.state != CredentialState::Locked {
            return Err(FormError::NotAllowed("credentials are not locked"));
        }
        self.unlock();
        self.folder.clear();
        tracing::debug!("MEGA credentials unlocked for editing");
        Ok(())
    }

    /// Switches the visible field group.
    ///
    /// Leaving a populated MEGA configuration suggests the equivalent rclone
    /// remote for advanced mode; nothing is saved.
    pub fn set_mode(&mut self, mode: BackupMode) {
        let leaving_mega = self.mode == BackupMode::Mega && mode == BackupMode::Advanced;
        self.mode = mode;
        let mega = mode == BackupMode::Mega;
        self.email.hidden = !mega;
        self.password.hidden = !mega;
        self.folder.hidden = !mega;
        self.rclone_config.hidden = mega;
        self.remote_name.hidden = mega;

        if leaving_mega && !self.email.is_blank() && !self.folder.is_blank() {
            self.remote_name.set(format!("mega:{}", self.folder.trimmed()));
        }
    }

    /// Checks the credentials with the backend and locks them on success.
    pub async fn validate<A: CloudBackupApi>(&mut self, api: &A) -> Result<(), FormError> {
        if self.state != CredentialState::Editable {
            return Err(FormError::NotAllowed("credentials are already validated"));
        }

        let email = self.email.trimmed().to_string();
        if !self.email.check(is_valid_email(&email)) {
            return Err(FormError::Invalid(vec![FieldName::Email]));
        }
        let password = self.password.value.clone();
        if !self.password.check(!password.is_empty()) {
            return Err(FormError::Invalid(vec![FieldName::Password]));
        }

        self.state = CredentialState::Validating;
        let result = api.validate_mega(&MegaCredentials { email, password }).await;

        match result {
            Ok(()) => {
                tracing::info!("MEGA credentials accepted for {}", self.email.trimmed());
                self.lock(true);
                Ok(())
            }
            Err(e) => {
                let message = e.user_message("Could not validate credentials.");
                tracing::warn!("MEGA credential validation failed: {}", message);
                self.state = CredentialState::Editable;
                self.credential_status = Some(Banner::Danger(message.clone()));
                Err(FormError::Remote(message))
            }
        }
    }

    /// Populates the form from the backend's current configuration.
    pub fn fill(&mut self, config: &ConfigSnapshot) {
        self.rclone_config.set(config.rclone_config.as_str());

        match config.mode() {
            BackupMode::Mega => {
                self.set_mode(BackupMode::Mega);
                self.email.set(config.mega_email.as_str());
                self.password.clear();
                self.folder.set(config.mega_folder.as_str());
                self.folder_warning = !config.mega_folder.is_empty();
                if !config.mega_email.is_empty() && !config.mega_folder.is_empty() {
                    self.lock(true);
                } else {
                    self.unlock();
                }
            }
            BackupMode::Advanced => {
                self.set_mode(BackupMode::Advanced);
                self.remote_name.set(config.rclone_dir.as_str());
                self.unlock();
            }
        }
    }

    pub async fn load<A: CloudBackupApi>(&mut self, api: &A) {
        self.banner = None;
        match api.config().await {
            Ok(config) => self.fill(&config),
            Err(e) => {
                tracing::warn!("Failed to load backup settings: {}", e);
                self.banner = Some(Banner::Danger(
                    e.user_message("Could not load backup settings."),
                ));
            }
        }
    }

    /// Password to send with a save, if the user typed a new one.
    fn changed_password(&self) -> Option<String> {
        let value = &self.password.value;
        (!value.is_empty() && value != PASSWORD_SENTINEL).then(|| value.clone())
    }

    /// Validates the visible fields and builds the payload for the active mode.
    pub fn submission(&mut self) -> Result<BackupConfig, FormError> {
        let mut invalid = Vec::new();

        let config = match self.mode {
            BackupMode::Mega => {
                let email = self.email.trimmed().to_string();
                if !self.email.check(is_valid_email(&email)) {
                    invalid.push(FieldName::Email);
                }
                self.password.clear_invalid();
                let folder = self.folder.trimmed().to_string();
                if !self.folder.check(!folder.is_empty()) {
                    invalid.push(FieldName::Folder);
                }
                BackupConfig::Mega {
                    mega_email: email,
                    mega_password: self.changed_password(),
                    mega_folder: folder,
                }
            }
            BackupMode::Advanced => {
                let rclone_config = self.rclone_config.trimmed().to_string();
                if !self.rclone_config.check(!rclone_config.is_empty()) {
                    invalid.push(FieldName::RcloneConfig);
                }
                let remote_name = self.remote_name.trimmed().to_string();
                if !self.remote_name.check(is_valid_remote_name(&remote_name)) {
                    invalid.push(FieldName::RemoteName);
                }
                BackupConfig::Advanced {
                    rclone_config,
                    remote_name,
                }
            }
        };

        if invalid.is_empty() {
            Ok(config)
        } else {
            Err(FormError::Invalid(invalid))
        }
    }

    /// Saves the form. The credential state is left as it was: only a
    /// validation call may lock the credentials.
    pub async fn submit<A: CloudBackupApi>(&mut self, api: &A) -> Result<(), FormError> {
        self.banner = None;
        self.saving = true;
        let result = self.submit_inner(api).await;
        self.saving = false;
        result
    }

    async fn submit_inner<A: CloudBackupApi>(&mut self, api: &A) -> Result<(), FormError> {
        let config = self.submission()?;

        match api.save_config(&config).await {
            Ok(()) => {
                tracing::info!("Saved cloud backup settings ({:?} mode)", config.mode());
                self.banner = Some(Banner::Success(
                    "Cloud backup settings saved successfully!".to_string(),
                ));
                Ok(())
            }
            Err(e) => {
                let message = e.user_message("Could not save backup settings.");
                self.banner = Some(Banner::Danger(message.clone()));
                Err(FormError::Remote(message))
            }
        }
    }

    /// Credentials for the folder picker.
    ///
    /// While locked the real password is unknown to the client, so the
    /// backend is asked to use its stored credentials.
    pub fn credential_supplier(&self) -> FormCredentials {
        if self.password.value == PASSWORD_SENTINEL {
            return FormCredentials(None);
        }
        FormCredentials(Some(MegaCredentials {
            email: self.email.trimmed().to_string(),
            password: self.password.value.clone(),
        }))
    }

    /// Writes a folder chosen in the picker back into the form.
    pub fn apply_selection(&mut self, path: &str) {
        self.folder.set(path);
        self.folder.clear_invalid();
        self.folder_warning = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{Call, FakeApi};

    fn mega_snapshot() -> ConfigSnapshot {
        ConfigSnapshot {
            cloud_mode: "mega".into(),
            mega_email: "me@example.com".into(),
            mega_folder: "/Backups".into(),
            rclone_dir: "mega:/Backups".into(),
            ..ConfigSnapshot::default()
        }
    }

    #[test]
    fn test_remote_name_pattern() {
        assert!(is_valid_remote_name("myremote:"));
        assert!(is_valid_remote_name("myremote:/backups"));
        assert!(!is_valid_remote_name("myremote"));
        assert!(!is_valid_remote_name("my remote:"));
        assert!(!is_valid_remote_name("myremote:/my backups"));
    }

    #[test]
    fn test_email_pattern() {
        assert!(is_valid_email(" me@example.com "));
        assert!(!is_valid_email("me@example"));
        assert!(!is_valid_email("me @example.com"));
    }

    #[tokio::test]
    async fn test_empty_password_never_hits_backend() {
        let api = FakeApi::new();
        let mut form = CredentialForm::new();
        form.email.set("me@example.com");

        let err = form.validate(&api).await.unwrap_err();
        assert!(matches!(err, FormError::Invalid(ref f) if f == &[FieldName::Password]));
        assert!(form.password.invalid);
        assert_eq!(api.call_count(), 0);
        assert_eq!(form.state(), CredentialState::Editable);
    }

    #[tokio::test]
    async fn test_bad_email_never_hits_backend() {
        let api = FakeApi::new();
        let mut form = CredentialForm::new();
        form.email.set("not-an-email");
        form.password.set("secret");

        assert!(form.validate(&api).await.is_err());
        assert!(form.email.invalid);
        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test]
    async fn test_successful_validation_locks_form() {
        let api = FakeApi::new();
        let mut form = CredentialForm::new();
        form.email.set(" me@example.com ");
        form.password.set("secret");
        assert!(!form.browse_enabled());

        form.validate(&api).await.unwrap();

        assert_eq!(
            api.calls(),
            vec![Call::Validate(MegaCredentials {
                email: "me@example.com".into(),
                password: "secret".into(),
            })]
        );
        assert_eq!(form.state(), CredentialState::Locked);
        assert_eq!(form.password.value, PASSWORD_SENTINEL);
        assert!(form.password.disabled);
        assert!(!form.email.is_editable());
        assert!(form.browse_enabled());
        assert!(matches!(form.credential_status, Some(Banner::Success(_))));
    }

    #[tokio::test]
    async fn test_rejected_validation_stays_editable() {
        let api = FakeApi::new();
        api.fail("validate", "Failed to connect to MEGA. Check credentials.");
        let mut form = CredentialForm::new();
        form.email.set("me@example.com");
        form.password.set("wrong");

        let err = form.validate(&api).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to connect to MEGA. Check credentials.");
        assert_eq!(form.state(), CredentialState::Editable);
        assert_eq!(
            form.credential_status,
            Some(Banner::Danger("Failed to connect to MEGA. Check credentials.".into()))
        );
        assert!(!form.browse_enabled());
    }

    #[tokio::test]
    async fn test_locked_submit_omits_password() {
        let api = FakeApi::new();
        let mut form = CredentialForm::new();
        form.fill(&mega_snapshot());
        assert_eq!(form.state(), CredentialState::Locked);

        form.submit(&api).await.unwrap();

        assert_eq!(
            api.calls(),
            vec![Call::SaveConfig(BackupConfig::Mega {
                mega_email: "me@example.com".into(),
                mega_password: None,
                mega_folder: "/Backups".into(),
            })]
        );
        assert!(!form.is_saving());
        assert_eq!(form.state(), CredentialState::Locked);
        assert_eq!(
            form.banner,
            Some(Banner::Success("Cloud backup settings saved successfully!".into()))
        );
    }

    #[tokio::test]
    async fn test_changed_password_is_sent() {
        let api = FakeApi::new();
        let mut form = CredentialForm::new();
        form.fill(&mega_snapshot());
        form.change_credentials().unwrap();
        assert!(form.folder.value.is_empty());
        assert!(!form.browse_enabled());

        form.password.set("new-secret");
        form.apply_selection("/Other");
        form.submit(&api).await.unwrap();

        assert!(matches!(
            &api.calls()[0],
            Call::SaveConfig(BackupConfig::Mega { mega_password: Some(p), mega_folder, .. })
                if p == "new-secret" && mega_folder == "/Other"
        ));
        assert_eq!(form.state(), CredentialState::Editable);
        assert_eq!(form.password.value, "new-secret");
    }

    #[tokio::test]
    async fn test_unvalidated_save_stays_editable() {
        let api = FakeApi::new();
        let mut form = CredentialForm::new();
        form.set_mode(BackupMode::Mega);
        form.email.set("me@example.com");
        form.password.set("never-validated");
        form.apply_selection("/Backups");

        form.submit(&api).await.unwrap();

        assert_eq!(api.call_count(), 1);
        assert!(matches!(api.calls()[0], Call::SaveConfig(_)));
        assert_eq!(form.state(), CredentialState::Editable);
        assert_eq!(form.password.value, "never-validated");
        assert!(!form.browse_enabled());
        assert_eq!(form.credential_status, None);
    }

    #[tokio::test]
    async fn test_invalid_advanced_submission_sends_nothing() {
        let api = FakeApi::new();
        let mut form = CredentialForm::new();
        form.set_mode(BackupMode::Advanced);
        form.rclone_config.set("[s3]\ntype = s3\n");
        form.remote_name.set("s3");

        let err = form.submit(&api).await.unwrap_err();
        assert!(matches!(err, FormError::Invalid(ref f) if f == &[FieldName::RemoteName]));
        assert!(form.remote_name.invalid);
        assert!(!form.is_saving());
        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_save_shows_error_and_unblocks() {
        let api = FakeApi::new();
        api.fail("save_config", "Failed to write rclone config.");
        let mut form = CredentialForm::new();
        form.set_mode(BackupMode::Advanced);
        form.rclone_config.set("[s3]\ntype = s3\n");
        form.remote_name.set("s3:/bucket");

        assert!(form.submit(&api).await.is_err());
        assert!(!form.is_saving());
        assert_eq!(
            form.banner,
            Some(Banner::Danger("Failed to write rclone config.".into()))
        );
    }

    #[test]
    fn test_switching_to_advanced_suggests_remote() {
        let mut form = CredentialForm::new();
        form.fill(&mega_snapshot());
        form.set_mode(BackupMode::Advanced);

        assert_eq!(form.remote_name.value, "mega:/Backups");
        assert!(form.email.hidden);
        assert!(!form.remote_name.hidden);
    }

    #[test]
    fn test_fill_without_folder_unlocks() {
        let mut form = CredentialForm::new();
        form.fill(&ConfigSnapshot {
            cloud_mode: "mega".into(),
            mega_email: "me@example.com".into(),
            ..ConfigSnapshot::default()
        });
        assert_eq!(form.state(), CredentialState::Editable);
        assert!(!form.folder_warning);
    }

    #[test]
    fn test_locked_supplier_defers_to_stored_credentials() {
        let mut form = CredentialForm::new();
        form.fill(&mega_snapshot());
        assert_eq!(form.credential_supplier().credentials(), None);

        form.change_credentials().unwrap();
        form.password.set("typed");
        assert_eq!(
            form.credential_supplier().credentials(),
            Some(MegaCredentials {
                email: "me@example.com".into(),
                password: "typed".into(),
            })
        );
    }

    #[test]
    fn test_change_requires_locked_state() {
        let mut form = CredentialForm::new();
        assert!(form.change_credentials().is_err());
    }
}
