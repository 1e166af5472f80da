use chrono::Utc;
use std::fs::{self, File};
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::tempdir;

use config_sync_core::backup::BackupManager;
use config_sync_core::config::SyncConfig;
use config_sync_core::contract::BackupStore;
use config_sync_core::metadata::ConfigMetadata;
use config_sync_core::path_info::PathInfo;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

fn write_aged(path: &Path, age: Duration) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, "old content").unwrap();
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - age).unwrap();
}

fn manager(backup_path: &Path, enabled: bool) -> BackupManager {
    BackupManager::new(&SyncConfig {
        backup_path: backup_path.to_path_buf(),
        backup_enabled: enabled,
        ..SyncConfig::default()
    })
}

fn metadata() -> ConfigMetadata {
    let path = "dev/user-service/application.yml";
    ConfigMetadata::build(
        &PathInfo::parse(path),
        "application.yml",
        path,
        b"a: 2".to_vec(),
        Utc::now(),
    )
}

#[test]
fn test_cleanup_deletes_only_expired_bak_files() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("backup");
    let fresh = root.join("dev/app/dev_app_x_20240101_000000.bak");
    let stale = root.join("dev/app/dev_app_x_20230101_000000.bak");
    let stale_other = root.join("dev/app/notes.txt");
    write_aged(&fresh, DAY);
    write_aged(&stale, DAY * 10);
    write_aged(&stale_other, DAY * 10);

    let deleted = manager(&root, true).cleanup_expired_backups(7);

    assert_eq!(deleted, 1);
    assert!(fresh.exists());
    assert!(!stale.exists());
    assert!(stale_other.exists(), "non-.bak files are never touched");
}

#[test]
fn test_cleanup_prunes_directories_left_empty() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("backup");
    write_aged(&root.join("prod/svc/prod_svc_a_1.bak"), DAY * 30);
    write_aged(&root.join("prod/svc/prod_svc_b_1.bak"), DAY * 30);
    write_aged(&root.join("dev/app/dev_app_c_1.bak"), DAY);

    let deleted = manager(&root, true).cleanup_expired_backups(7);

    assert_eq!(deleted, 2);
    assert!(!root.join("prod/svc").exists());
    assert!(!root.join("prod").exists());
    assert!(root.join("dev/app/dev_app_c_1.bak").exists());
    assert!(root.exists(), "the backup root itself is kept");
}

#[test]
fn test_cleanup_on_missing_or_file_root_is_empty_result() {
    let dir = tempdir().unwrap();
    assert_eq!(manager(&dir.path().join("missing"), true).cleanup_expired_backups(7), 0);

    let file_root = dir.path().join("not-a-dir");
    fs::write(&file_root, "x").unwrap();
    assert_eq!(manager(&file_root, true).cleanup_expired_backups(7), 0);
}

#[test]
fn test_disabled_manager_is_a_no_op() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("backup");
    let stale = root.join("dev/app/dev_app_x_1.bak");
    write_aged(&stale, DAY * 10);

    let backups = manager(&root, false);
    assert_eq!(backups.cleanup_expired_backups(7), 0);
    assert!(stale.exists());

    backups.backup_config(&metadata(), "a: 1");
    assert!(!root.join("dev/user-service").exists());
}

#[test]
fn test_backup_writes_timestamped_snapshot() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("backup");

    manager(&root, true).backup_config(&metadata(), "a: 1");

    let app_dir = root.join("dev").join("user-service");
    let files: Vec<_> = fs::read_dir(&app_dir).unwrap().map(|e| e.unwrap().path()).collect();
    assert_eq!(files.len(), 1);
    let name = files[0].file_name().unwrap().to_string_lossy().into_owned();
    let stamp = name
        .strip_prefix("dev_user-service_user-service-application.yml_")
        .and_then(|rest| rest.strip_suffix(".bak"))
        .expect("backup name follows the layout");
    assert_eq!(stamp.len(), "yyyyMMdd_HHmmss".len());
    assert_eq!(stamp.as_bytes()[8], b'_');
    assert!(stamp.chars().filter(|c| *c != '_').all(|c| c.is_ascii_digit()));
    assert_eq!(fs::read_to_string(&files[0]).unwrap(), "a: 1");
}

#[test]
fn test_backup_io_failure_is_swallowed() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("backup");
    fs::write(&blocker, "a file where the backup root should be").unwrap();

    manager(&blocker, true).backup_config(&metadata(), "a: 1");

    assert!(blocker.is_file());
}

#[test]
fn test_backup_file_path_layout() {
    let backups = manager(Path::new("backup"), true);
    let path = backups.backup_file_path(&metadata(), "20250102_030405");
    assert_eq!(
        path,
        Path::new("backup/dev/user-service/dev_user-service_user-service-application.yml_20250102_030405.bak")
    );
}
