use chrono::{NaiveTime, Timelike};

use crate::api::CloudBackupApi;
use crate::error::{FieldName, FormError};
use crate::form::{Banner, Field};
use crate::models::{ScheduleConfig, StatusReport};

const PLACEHOLDER: &str = "-";

/// Status of the cloud backup job.
///
/// Unknown labels are kept verbatim so newer backends still render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLabel {
    Success,
    Failure,
    Running,
    Missing,
    NotRunYet,
    Error,
    Other(String),
}

impl StatusLabel {
    pub fn parse(label: &str) -> Self {
        match label {
            "Success" => StatusLabel::Success,
            "Failure" => StatusLabel::Failure,
            "Running" => StatusLabel::Running,
            "Missing" => StatusLabel::Missing,
            "Not Run Yet" => StatusLabel::NotRunYet,
            "Error" => StatusLabel::Error,
            other => StatusLabel::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Danger,
    Info,
    Warning,
    Secondary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Badge {
    Loading,
    Label {
        tone: Tone,
        icon: Option<&'static str>,
        text: String,
    },
}

pub fn render_badge(label: &StatusLabel) -> Badge {
    let (tone, icon, text) = match label {
        StatusLabel::Success => (Tone::Success, Some("circle-check"), "Success"),
        StatusLabel::Failure => (Tone::Danger, Some("circle-xmark"), "Failure"),
        StatusLabel::Running => (Tone::Info, Some("spinner"), "Running"),
        StatusLabel::Missing => (Tone::Warning, Some("circle-exclamation"), "Missing"),
        StatusLabel::NotRunYet => (Tone::Secondary, Some("clock"), "Not Run Yet"),
        StatusLabel::Error => (Tone::Danger, Some("triangle-exclamation"), "Error"),
        StatusLabel::Other(raw) => {
            return Badge::Label {
                tone: Tone::Warning,
                icon: None,
                text: raw.clone(),
            }
        }
    };
    Badge::Label {
        tone,
        icon,
        text: text.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusPanel {
    pub badge: Badge,
    pub last_run: String,
    pub next_run: String,
    pub last_duration: String,
    pub error: Option<String>,
}

impl Default for StatusPanel {
    fn default() -> Self {
        Self {
            badge: Badge::Loading,
            last_run: PLACEHOLDER.to_string(),
            next_run: PLACEHOLDER.to_string(),
            last_duration: PLACEHOLDER.to_string(),
            error: None,
        }
    }
}

fn or_placeholder(value: Option<String>) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

impl StatusPanel {
    pub async fn load_status<A: CloudBackupApi>(&mut self, api: &A) {
        *self = Self::default();
        match api.status().await {
            Ok(report) => self.apply(report),
            Err(e) => {
                tracing::warn!("Failed to load backup status: {}", e);
                self.badge = render_badge(&StatusLabel::Error);
                self.error = Some(e.user_message("Could not load backup status."));
            }
        }
    }

    fn apply(&mut self, report: StatusReport) {
        self.badge = render_badge(&StatusLabel::parse(&report.status));
        self.last_run = or_placeholder(report.last_run);
        self.next_run = or_placeholder(report.next_run);
        self.last_duration = or_placeholder(report.last_run_duration);
    }

    /// Starts a backup right away and refreshes the status.
    pub async fn run_backup<A: CloudBackupApi>(&mut self, api: &A) -> Result<(), FormError> {
        if let Err(e) = api.run_backup().await {
            let message = e.user_message("Could not start backup.");
            self.error = Some(message.clone());
            return Err(FormError::Remote(message));
        }
        tracing::info!("Cloud backup started");
        self.load_status(api).await;
        Ok(())
    }
}

/// Normalises a time of day to zero-padded `HH:MM`.
///
/// Accepts unpadded input such as `9:5`; returns `None` for anything that is
/// not a valid time.
pub fn normalize_time(value: &str) -> Option<String> {
    let (hours, minutes) = value.trim().split_once(':')?;
    let hours: u32 = hours.trim().parse().ok()?;
    let minutes: u32 = minutes.trim().parse().ok()?;
    let time = NaiveTime::from_hms_opt(hours, minutes, 0)?;
    Some(format!("{:02}:{:02}", time.hour(), time.minute()))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleForm {
    pub time: Field,
    pub bandwidth_limit: Field,
    pub error: Option<String>,
    pub success: Option<Banner>,
    saving: bool,
}

impl ScheduleForm {
    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn fill(&mut self, time: &str, bandwidth_limit: &str) {
        // Stored values from older setups may lack padding
        let time = normalize_time(time).unwrap_or_else(|| time.to_string());
        self.time.set(time);
        self.bandwidth_limit.set(bandwidth_limit);
    }

    pub async fn load<A: CloudBackupApi>(&mut self, api: &A) {
        self.error = None;
        self.success = None;
        match api.config().await {
            Ok(config) => self.fill(&config.backup_cloud_time, &config.bandwidth_limit),
            Err(e) => {
                tracing::warn!("Failed to load schedule: {}", e);
                self.error = Some(e.user_message("Could not load schedule."));
            }
        }
    }

    /// Saves the schedule, then reloads it and the job status (next run changes).
    pub async fn save<A: CloudBackupApi>(
        &mut self,
        api: &A,
        status: &mut StatusPanel,
    ) -> Result<(), FormError> {
        self.error = None;
        self.success = None;
        self.saving = true;
        let result = self.save_inner(api, status).await;
        self.saving = false;
        result
    }

    async fn save_inner<A: CloudBackupApi>(
        &mut self,
        api: &A,
        status: &mut StatusPanel,
    ) -> Result<(), FormError> {
        let time = match normalize_time(&self.time.value) {
            Some(time) if !self.time.is_blank() => time,
            _ => {
                self.time.mark_invalid();
                return Err(FormError::Invalid(vec![FieldName::BackupTime]));
            }
        };
        self.time.clear_invalid();
        self.time.set(time.as_str());

        let schedule = ScheduleConfig {
            backup_cloud_time: time,
            bandwidth_limit: self.bandwidth_limit.trimmed().to_string(),
        };

        if let Err(e) = api.save_schedule(&schedule).await {
            let message = e.user_message("Could not save schedule.");
            self.error = Some(message.clone());
            return Err(FormError::Remote(message));
        }
        tracing::info!("Saved backup schedule {}", schedule.backup_cloud_time);

        self.load(api).await;
        self.success = Some(Banner::Success("Schedule saved successfully!".to_string()));
        status.load_status(api).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{Call, FakeApi};

    #[test]
    fn test_known_labels_render_fixed_badges() {
        for label in ["Success", "Failure", "Running", "Missing", "Not Run Yet", "Error"] {
            let first = render_badge(&StatusLabel::parse(label));
            let second = render_badge(&StatusLabel::parse(label));
            assert_eq!(first, second);
            assert!(matches!(&first, Badge::Label { text, icon: Some(_), .. } if text == label));
        }
    }

    #[test]
    fn test_unknown_label_renders_verbatim_warning() {
        let badge = render_badge(&StatusLabel::parse("Retrieval Error"));
        assert_eq!(
            badge,
            Badge::Label {
                tone: Tone::Warning,
                icon: None,
                text: "Retrieval Error".into(),
            }
        );
    }

    #[test]
    fn test_normalize_time() {
        assert_eq!(normalize_time("9:5").as_deref(), Some("09:05"));
        assert_eq!(normalize_time("23:59").as_deref(), Some("23:59"));
        assert_eq!(normalize_time("24:00"), None);
        assert_eq!(normalize_time("noon"), None);
        assert_eq!(normalize_time(""), None);
    }

    #[tokio::test]
    async fn test_load_status_fills_panel() {
        let api = FakeApi::new();
        *api.status.borrow_mut() = StatusReport {
            status: "Success".into(),
            last_run: Some("2026-10-18 03:00".into()),
            next_run: Some("2026-10-19 03:00".into()),
            last_run_duration: None,
        };
        let mut panel = StatusPanel::default();
        panel.load_status(&api).await;

        assert_eq!(panel.badge, render_badge(&StatusLabel::Success));
        assert_eq!(panel.last_run, "2026-10-18 03:00");
        assert_eq!(panel.last_duration, "-");
        assert_eq!(panel.error, None);
    }

    #[tokio::test]
    async fn test_failed_status_shows_error_badge() {
        let api = FakeApi::new();
        api.fail("status", "Cloud backup task not found.");
        let mut panel = StatusPanel::default();
        panel.load_status(&api).await;

        assert_eq!(panel.badge, render_badge(&StatusLabel::Error));
        assert_eq!(panel.error.as_deref(), Some("Cloud backup task not found."));
    }

    #[tokio::test]
    async fn test_empty_time_aborts_save() {
        let api = FakeApi::new();
        let mut form = ScheduleForm::default();
        let mut panel = StatusPanel::default();

        let err = form.save(&api, &mut panel).await.unwrap_err();
        assert!(matches!(err, FormError::Invalid(_)));
        assert!(form.time.invalid);
        assert!(!form.is_saving());
        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test]
    async fn test_save_pads_time_and_refreshes() {
        let api = FakeApi::new();
        let mut form = ScheduleForm::default();
        let mut panel = StatusPanel::default();
        form.time.set("9:5");
        form.bandwidth_limit.set(" 10M ");

        form.save(&api, &mut panel).await.unwrap();

        assert_eq!(
            api.calls(),
            vec![
                Call::SaveSchedule(ScheduleConfig {
                    backup_cloud_time: "09:05".into(),
                    bandwidth_limit: "10M".into(),
                }),
                Call::Config,
                Call::Status,
            ]
        );
        assert_eq!(form.time.value, "09:05");
        assert!(form.success.is_some());
    }

    #[tokio::test]
    async fn test_failed_save_keeps_values() {
        let api = FakeApi::new();
        api.fail("save_schedule", "Failed to update systemd timers: denied");
        let mut form = ScheduleForm::default();
        let mut panel = StatusPanel::default();
        form.time.set("03:00");

        assert!(form.save(&api, &mut panel).await.is_err());
        assert_eq!(form.error.as_deref(), Some("Failed to update systemd timers: denied"));
        assert!(!form.is_saving());
        assert_eq!(api.call_count(), 1);
    }

    #[tokio::test]
    async fn test_run_backup_refreshes_status() {
        let api = FakeApi::new();
        api.status.borrow_mut().status = "Running".into();
        let mut panel = StatusPanel::default();

        panel.run_backup(&api).await.unwrap();
        assert_eq!(api.calls(), vec![Call::RunBackup, Call::Status]);
        assert_eq!(panel.badge, render_badge(&StatusLabel::Running));
    }
}
