//! Backup destination step of the first-run setup wizard.
//!
//! Unlike the settings page, the wizard never stores credentials until the
//! whole step is saved, so it always sends what the user typed.

use crate::api::CloudBackupApi;
use crate::error::{FieldName, FormError};
use crate::form::Field;
use crate::models::{BackupMode, MegaCredentials, MegaSetupRequest, RcloneSetupRequest};
use crate::navigator::{CredentialSupplier, ROOT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Advance,
}

#[derive(Debug, Clone)]
pub struct WizardCredentials(MegaCredentials);

impl CredentialSupplier for WizardCredentials {
    fn credentials(&self) -> Option<MegaCredentials> {
        Some(self.0.clone())
    }
}

#[derive(Debug, Clone)]
pub struct BackupStep {
    pub mode: BackupMode,
    pub email: Field,
    pub password: Field,
    pub folder: Field,
    pub rclone_config: Field,
    pub remote_name: Field,
    pub connected: bool,
    pub folder_warning: bool,
    pub error: Option<String>,
    busy: bool,
}

impl BackupStep {
    pub fn new(mode: BackupMode) -> Self {
        Self {
            mode,
            email: Field::default(),
            password: Field::default(),
            folder: Field::default(),
            rclone_config: Field::default(),
            remote_name: Field::default(),
            connected: false,
            folder_warning: false,
            error: None,
            busy: false,
        }
    }

    #[cfg(test)]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Whether the step's save action is enabled.
    pub fn can_save(&self) -> bool {
        match self.mode {
            BackupMode::Mega => self.connected && !self.folder.is_blank(),
            BackupMode::Advanced => !self.rclone_config.is_blank() && !self.remote_name.is_blank(),
        }
    }

    fn credentials(&self) -> MegaCredentials {
        MegaCredentials {
            email: self.email.trimmed().to_string(),
            password: self.password.value.clone(),
        }
    }

    pub fn credential_supplier(&self) -> WizardCredentials {
        WizardCredentials(self.credentials())
    }

    pub fn apply_selection(&mut self, path: &str) {
        self.folder.set(path);
        self.folder_warning = true;
    }

    /// Signs in to MEGA and reveals the folder selection.
    pub async fn connect<A: CloudBackupApi>(&mut self, api: &A) -> Result<(), FormError> {
        if self.email.is_blank() || self.password.value.is_empty() {
            self.email.mark_invalid();
            self.password.mark_invalid();
            return Err(FormError::Invalid(vec![FieldName::Email, FieldName::Password]));
        }
        self.email.clear_invalid();
        self.password.clear_invalid();

        self.busy = true;
        let result = api.setup_mega_connect(&self.credentials()).await;
        self.busy = false;

        match result {
            Ok(folders) => {
                tracing::info!("Connected to MEGA ({} top-level folders)", folders.len());
                self.connected = true;
                self.folder.set(ROOT);
                Ok(())
            }
            Err(e) => {
                let message = e.user_message("Failed to connect to MEGA.");
                self.error = Some(message.clone());
                Err(FormError::Remote(message))
            }
        }
    }

    /// Saves the active mode's configuration; on success the wizard moves on.
    pub async fn save<A: CloudBackupApi>(&mut self, api: &A) -> Result<StepOutcome, FormError> {
        self.error = None;
        self.validate()?;

        self.busy = true;
        let (result, fallback) = match self.mode {
            BackupMode::Mega => {
                let request = MegaSetupRequest {
                    email: self.email.trimmed().to_string(),
                    password: self.password.value.clone(),
                    folder: self.folder.value.clone(),
                };
                (api.setup_mega_save(&request).await, "Failed to save MEGA config.")
            }
            BackupMode::Advanced => {
                let request = RcloneSetupRequest {
                    config: self.rclone_config.trimmed().to_string(),
                    remote_name: self.remote_name.trimmed().to_string(),
                };
                (api.setup_rclone(&request).await, "Failed to save rclone config.")
            }
        };
        self.busy = false;

        match result {
            Ok(()) => Ok(StepOutcome::Advance),
            Err(e) => {
                let message = e.user_message(fallback);
                self.error = Some(message.clone());
                Err(FormError::Remote(message))
            }
        }
    }

    fn validate(&mut self) -> Result<(), FormError> {
        let mut invalid = Vec::new();
        match self.mode {
            BackupMode::Mega => {
                if !self.email.check(!self.email.is_blank()) {
                    invalid.push(FieldName::Email);
                }
                if !self.password.check(!self.password.value.is_empty()) {
                    invalid.push(FieldName::Password);
                }
                if !self.folder.check(!self.folder.value.is_empty()) {
                    invalid.push(FieldName::Folder);
                }
            }
            BackupMode::Advanced => {
                if !self.rclone_config.check(!self.rclone_config.is_blank()) {
                    invalid.push(FieldName::RcloneConfig);
                }
                if !self.remote_name.check(!self.remote_name.is_blank()) {
                    invalid.push(FieldName::RemoteName);
                }
            }
        }
        if invalid.is_empty() {
            Ok(())
        } else {
            Err(FormError::Invalid(invalid))
        }
    }
}
