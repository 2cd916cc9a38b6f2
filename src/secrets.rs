use anyhow::{Context, Result};
use secret_service::EncryptionType;
use secret_service::SecretService;
use std::collections::HashMap;

use crate::config::Profile;

const APPLICATION: &str = "cloudbackup-ctl";

/// Appliance profiles and login passwords kept in the desktop keyring.
pub struct SecretStore {
    service: SecretService<'static>,
}

fn attributes<'a>(kind: &'a str, profile: Option<&'a str>) -> HashMap<&'a str, &'a str> {
    let mut attributes = HashMap::new();
    attributes.insert("application", APPLICATION);
    attributes.insert("type", kind);
    if let Some(name) = profile {
        attributes.insert("profile", name);
    }
    attributes
}

impl SecretStore {
    pub async fn new() -> Result<Self> {
        let service = SecretService::connect(EncryptionType::Dh)
            .await
            .context("Failed to connect to Secret Service")?;

        Ok(Self { service })
    }

    async fn store(&self, kind: &str, name: &str, secret: &[u8]) -> Result<()> {
        let collection = self
            .service
            .get_default_collection()
            .await
            .context("Failed to get default collection")?;

        collection
            .create_item(
                &format!("{} {}: {}", APPLICATION, kind, name),
                attributes(kind, Some(name)),
                secret,
                true, // replace existing
                "text/plain",
            )
            .await
            .with_context(|| format!("Failed to store {}", kind))?;

        Ok(())
    }

    async fn load(&self, kind: &str, name: &str) -> Result<String> {
        let collection = self
            .service
            .get_default_collection()
            .await
            .context("Failed to get default collection")?;

        let items = collection
            .search_items(attributes(kind, Some(name)))
            .await
            .with_context(|| format!("Failed to search for {}", kind))?;

        let item = items
            .first()
            .with_context(|| format!("No {} stored for profile '{}'", kind, name))?;

        let secret = item.get_secret().await.context("Failed to get secret")?;
        Ok(String::from_utf8(secret)?)
    }

    pub async fn store_profile(&self, profile: &Profile) -> Result<()> {
        let json = serde_json::to_string(profile)?;
        self.store("profile", &profile.name, json.as_bytes()).await
    }

    pub async fn load_profile(&self, name: &str) -> Result<Profile> {
        let json = self.load("profile", name).await?;
        Ok(serde_json::from_str(&json)?)
    }

    pub async fn store_password(&self, name: &str, password: &str) -> Result<()> {
        self.store("password", name, password.as_bytes()).await
    }

    pub async fn load_password(&self, name: &str) -> Result<String> {
        self.load("password", name).await
    }

    pub async fn list_profiles(&self) -> Result<Vec<String>> {
        let collection = self
            .service
            .get_default_collection()
            .await
            .context("Failed to get default collection")?;

        let items = collection
            .search_items(attributes("profile", None))
            .await
            .context("Failed to search for profiles")?;

        let mut names = Vec::new();
        for item in items {
            let attrs = item
                .get_attributes()
                .await
                .context("Failed to get attributes")?;
            if let Some(name) = attrs.get("profile") {
                names.push(name.clone());
            }
        }
        names.sort();

        Ok(names)
    }
}
