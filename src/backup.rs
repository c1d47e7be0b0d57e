// Copyright 2023 Remi Bernotavicius

use crate::repository::Repository;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const BACKUP_VERSION: &str = "1.0";

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode backup: {0}")]
    Encode(serde_json::Error),
    #[error("backup file is not valid JSON: {0}")]
    Malformed(serde_json::Error),
    #[error("backup file has no data")]
    MissingData,
    #[error("backup data could not be read: {0}")]
    Decode(serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backup {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl Backup {
    pub fn new(repository: &Repository, timestamp: DateTime<Utc>) -> Result<Self, BackupError> {
        Ok(Self {
            version: BACKUP_VERSION.into(),
            timestamp: Some(timestamp),
            data: Some(repository.to_document().map_err(BackupError::Encode)?),
        })
    }

    pub fn file_name(&self) -> String {
        let stamp = self
            .timestamp
            .map(|t| t.format("%Y-%m-%dT%H-%M-%S").to_string())
            .unwrap_or_default();
        format!("烘焙成本管理系統備份_{stamp}.json")
    }

    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf, BackupError> {
        let path = dir.as_ref().join(self.file_name());
        let contents = serde_json::to_string_pretty(self).map_err(BackupError::Encode)?;
        std::fs::write(&path, contents).map_err(|source| BackupError::Io {
            path: path.clone(),
            source,
        })?;
        log::info!("wrote backup to {path:?}");
        Ok(path)
    }

    pub fn read_path(path: impl AsRef<Path>) -> Result<Self, BackupError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| BackupError::Io {
            path: path.into(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(BackupError::Malformed)
    }

    /// Replaces every collection present in the backup. The repository is unchanged on error.
    pub fn restore_into(self, repository: &mut Repository) -> Result<(), BackupError> {
        let data = self.data.ok_or(BackupError::MissingData)?;
        repository.restore(data).map_err(BackupError::Decode)?;
        log::info!(
            "restored backup version {:?} taken at {:?}",
            self.version,
            self.timestamp
        );
        Ok(())
    }
}

#[cfg(test)]
use crate::repository::{EntityKind, IngredientInput};

#[cfg(test)]
fn timestamp() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-03-05T14:07:09Z")
        .unwrap()
        .with_timezone(&Utc)
}

#[test]
fn file_name_uses_timestamp() {
    let backup = Backup::new(&Repository::new(), timestamp()).unwrap();
    assert_eq!(
        backup.file_name(),
        "烘焙成本管理系統備份_2024-03-05T14-07-09.json"
    );
}

#[test]
fn backup_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut repository = Repository::new();
    repository.seed_samples_if_empty();

    let path = Backup::new(&repository, timestamp())
        .unwrap()
        .write_to_dir(dir.path())
        .unwrap();
    let backup = Backup::read_path(&path).unwrap();
    assert_eq!(backup.version, "1.0");
    assert_eq!(backup.timestamp, Some(timestamp()));

    let mut restored = Repository::new();
    restored
        .add_ingredient(IngredientInput {
            name: "可可粉".into(),
            category: None,
            unit: crate::database::models::IngredientUnit::Kilogram,
            price: 300.0,
        })
        .unwrap();
    backup.restore_into(&mut restored).unwrap();
    assert_eq!(restored, repository);
}

#[test]
fn old_backups_restore() {
    let text = r#"{
        "version": "1.0",
        "timestamp": "2023-11-02T08:30:00.000Z",
        "data": {
            "ingredients": [{ "id": 1, "name": "麵粉", "category": "粉類", "unit": "公斤", "price": "35" }],
            "products": [{
                "id": 1, "name": "餅乾禮盒", "sellingPrice": 250,
                "recipes": [],
                "packaging": { "packagingId": 2, "quantity": 1 }
            }]
        }
    }"#;
    let backup: Backup = serde_json::from_str(text).unwrap();
    let mut repository = Repository::new();
    repository.seed_samples_if_empty();
    backup.restore_into(&mut repository).unwrap();

    assert_eq!(repository.len(EntityKind::Ingredients), 1);
    assert_eq!(repository.ingredients()[0].price, 35.0);
    assert_eq!(repository.products()[0].packaging_lines.len(), 1);
    assert_eq!(repository.len(EntityKind::Packaging), 3);
}

#[test]
fn bad_backups_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut repository = Repository::new();
    repository.seed_samples_if_empty();
    let before = repository.clone();

    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(
        Backup::read_path(&path),
        Err(BackupError::Malformed(_))
    ));

    let no_data: Backup = serde_json::from_str(r#"{ "version": "1.0" }"#).unwrap();
    assert!(matches!(
        no_data.restore_into(&mut repository),
        Err(BackupError::MissingData)
    ));

    let bad_data: Backup =
        serde_json::from_str(r#"{ "data": { "recipes": [{ "name": "no id" }] } }"#).unwrap();
    assert!(matches!(
        bad_data.restore_into(&mut repository),
        Err(BackupError::Decode(_))
    ));
    assert_eq!(repository, before);
}
