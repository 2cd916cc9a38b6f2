use crate::api::CloudBackupApi;
use crate::credentials::CredentialForm;
use crate::status::{ScheduleForm, StatusPanel};

/// Everything shown on the cloud backup page.
#[derive(Debug, Clone, Default)]
pub struct CloudBackupPage {
    pub status: StatusPanel,
    pub form: CredentialForm,
    pub schedule: ScheduleForm,
}

impl CloudBackupPage {
    pub async fn load<A: CloudBackupApi>(api: &A) -> Self {
        let mut page = Self::default();
        page.refresh(api).await;
        page
    }

    /// Loads status, configuration and schedule independently of each other.
    pub async fn refresh<A: CloudBackupApi>(&mut self, api: &A) {
        let Self {
            status,
            form,
            schedule,
        } = self;
        tokio::join!(status.load_status(api), form.load(api), schedule.load(api));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::FakeApi;
    use crate::credentials::CredentialState;
    use crate::form::Banner;
    use crate::models::ConfigSnapshot;
    use crate::status::{render_badge, StatusLabel};

    #[tokio::test]
    async fn test_page_load_fills_every_section() {
        let api = FakeApi::new();
        api.status.borrow_mut().status = "Not Run Yet".into();
        *api.config.borrow_mut() = ConfigSnapshot {
            cloud_mode: "mega".into(),
            mega_email: "me@example.com".into(),
            mega_folder: "/Backups".into(),
            backup_cloud_time: "3:0".into(),
            bandwidth_limit: "5M".into(),
            ..ConfigSnapshot::default()
        };

        let page = CloudBackupPage::load(&api).await;

        assert_eq!(page.status.badge, render_badge(&StatusLabel::NotRunYet));
        assert_eq!(page.form.state(), CredentialState::Locked);
        assert_eq!(page.schedule.time.value, "03:00");
        assert_eq!(page.schedule.bandwidth_limit.value, "5M");
    }

    #[tokio::test]
    async fn test_status_failure_does_not_block_config() {
        let api = FakeApi::new();
        api.fail("status", "Could not get backup status.");
        api.config.borrow_mut().cloud_mode = "advanced".into();
        api.config.borrow_mut().rclone_dir = "s3:/bucket".into();

        let page = CloudBackupPage::load(&api).await;

        assert!(page.status.error.is_some());
        assert_eq!(page.form.remote_name.value, "s3:/bucket");
        assert!(!matches!(page.form.banner, Some(Banner::Danger(_))));
    }
}
