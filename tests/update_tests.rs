//! Self-Update Integrity Tests
//!
//! Digest comparison between an installed artifact and a published copy,
//! served through `file://` URLs so no network is needed.

use std::fs;
use std::path::Path;

use sbot_deploy::update::{
    ArtifactDigest, FileFetcher, UpdateCheck, UpdateChecker, UpdateError, UpdateStatus,
};
use tempfile::TempDir;

fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

fn leftover_temp_files(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(".tmp"))
        .collect()
}

// =============================================================================
// Test 1: identical and differing artifacts
// =============================================================================

#[test]
fn test_identical_bytes_any_metadata() {
    let install = TempDir::new().unwrap();
    let mirror = TempDir::new().unwrap();
    let local = install.path().join("sbot");
    let remote = mirror.path().join("sbot");
    let payloads: [&[u8]; 3] = [b"", b"#!/bin/sh\nexit 0\n", &[0u8, 255, 1, 254, 10, 13]];

    for payload in payloads {
        fs::write(&local, payload).unwrap();
        fs::write(&remote, payload).unwrap();

        match UpdateChecker::new(FileFetcher).check(&file_url(&remote), &local) {
            UpdateStatus::UpToDate { digest } => {
                assert_eq!(digest, ArtifactDigest::of_bytes(payload));
            }
            other => panic!("expected UpToDate, got {:?}", other),
        }
    }
    assert!(leftover_temp_files(install.path()).is_empty());
}

#[test]
fn test_single_byte_difference() {
    let install = TempDir::new().unwrap();
    let mirror = TempDir::new().unwrap();
    let local = install.path().join("sbot");
    let remote = mirror.path().join("sbot");
    let mut bytes = vec![7u8; 4096];
    fs::write(&local, &bytes).unwrap();
    bytes[4095] = 8;
    fs::write(&remote, &bytes).unwrap();

    match UpdateChecker::new(FileFetcher).check(&file_url(&remote), &local) {
        UpdateStatus::UpdateAvailable { local, remote } => {
            assert_ne!(local, remote);
            assert_eq!(local.as_str().len(), 64);
            assert_eq!(remote.as_str().len(), 64);
        }
        other => panic!("expected UpdateAvailable, got {:?}", other),
    }
    assert!(leftover_temp_files(install.path()).is_empty());
}

// =============================================================================
// Test 2: apply replaces content, keeps permissions
// =============================================================================

#[test]
fn test_apply_takes_remote_digest() {
    let install = TempDir::new().unwrap();
    let mirror = TempDir::new().unwrap();
    let local = install.path().join("sbot");
    let remote = mirror.path().join("sbot");
    fs::write(&local, b"aaa").unwrap();
    fs::write(&remote, b"bbb").unwrap();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&local, fs::Permissions::from_mode(0o750)).unwrap();
    }

    let staged = match UpdateChecker::new(FileFetcher)
        .stage(&file_url(&remote), &local)
        .unwrap()
    {
        UpdateCheck::Available(staged) => staged,
        UpdateCheck::UpToDate(_) => panic!("expected an update"),
    };
    assert_eq!(staged.local_digest(), &ArtifactDigest::of_bytes(b"aaa"));
    assert_eq!(staged.remote_digest(), &ArtifactDigest::of_bytes(b"bbb"));

    let applied = staged.apply().unwrap();

    assert_eq!(applied.previous, ArtifactDigest::of_bytes(b"aaa"));
    assert_eq!(applied.current, ArtifactDigest::of_bytes(b"bbb"));
    assert_eq!(fs::read(&local).unwrap(), b"bbb");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&local).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o750);
    }
    assert!(leftover_temp_files(install.path()).is_empty());
}

#[test]
fn test_dropped_stage_leaves_artifact_alone() {
    let install = TempDir::new().unwrap();
    let mirror = TempDir::new().unwrap();
    let local = install.path().join("sbot");
    let remote = mirror.path().join("sbot");
    fs::write(&local, b"v1").unwrap();
    fs::write(&remote, b"v2").unwrap();

    let check = UpdateChecker::new(FileFetcher)
        .stage(&file_url(&remote), &local)
        .unwrap();
    assert!(matches!(check, UpdateCheck::Available(_)));
    drop(check);

    assert_eq!(fs::read(&local).unwrap(), b"v1");
    assert!(leftover_temp_files(install.path()).is_empty());
}

// =============================================================================
// Test 3: failures are reported as status
// =============================================================================

#[test]
fn test_unreachable_remote() {
    let install = TempDir::new().unwrap();
    let local = install.path().join("sbot");
    fs::write(&local, b"v1").unwrap();

    let status = UpdateChecker::new(FileFetcher)
        .check("file:///nonexistent/mirror/sbot", &local);

    assert!(matches!(status, UpdateStatus::Error(UpdateError::Fetch(_))));
    assert_eq!(status.to_json()["status"], "error");
    assert!(leftover_temp_files(install.path()).is_empty());
}

#[test]
fn test_not_installed_yet() {
    let install = TempDir::new().unwrap();
    let mirror = TempDir::new().unwrap();
    let remote = mirror.path().join("sbot");
    fs::write(&remote, b"v1").unwrap();

    let status =
        UpdateChecker::new(FileFetcher).check(&file_url(&remote), &install.path().join("sbot"));

    assert!(matches!(
        status,
        UpdateStatus::Error(UpdateError::LocalArtifactMissing(_))
    ));
    assert!(leftover_temp_files(install.path()).is_empty());
}

// =============================================================================
// Test 4: read-only install directory
// =============================================================================

#[cfg(unix)]
#[test]
fn test_check_in_read_only_install_dir() {
    use std::os::unix::fs::PermissionsExt;

    // Root ignores directory permissions
    if nix::unistd::geteuid().is_root() {
        return;
    }
    let install = TempDir::new().unwrap();
    let mirror = TempDir::new().unwrap();
    let local = install.path().join("sbot");
    let remote = mirror.path().join("sbot");
    fs::write(&local, b"v1").unwrap();
    fs::write(&remote, b"v2").unwrap();
    fs::set_permissions(install.path(), fs::Permissions::from_mode(0o555)).unwrap();

    let available = UpdateChecker::new(FileFetcher).check(&file_url(&remote), &local);
    fs::write(&remote, b"v1").unwrap();
    let current = UpdateChecker::new(FileFetcher).check(&file_url(&remote), &local);
    fs::set_permissions(install.path(), fs::Permissions::from_mode(0o755)).unwrap();

    assert!(
        matches!(available, UpdateStatus::UpdateAvailable { .. }),
        "got {:?}",
        available
    );
    assert!(matches!(current, UpdateStatus::UpToDate { .. }), "got {:?}", current);
    assert!(leftover_temp_files(install.path()).is_empty());
}
