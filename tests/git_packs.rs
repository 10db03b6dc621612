//! Reads packs written by a real `git` when one is installed

use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::fixture::{FileWriteStr, PathChild};
use common::{pack_dir, text};
use packed_odb::{Object, ObjectId, Pack, PackSet};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::path::{Path, PathBuf};

mod common;

fn git_available() -> bool {
    std::process::Command::new("git")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new("git");
    cmd.current_dir(dir)
        .args(args)
        .env("GIT_AUTHOR_NAME", "Pack Reader")
        .env("GIT_AUTHOR_EMAIL", "reader@example.com")
        .env("GIT_COMMITTER_NAME", "Pack Reader")
        .env("GIT_COMMITTER_EMAIL", "reader@example.com")
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env("HOME", dir);
    cmd
}

fn git_stdout(dir: &Path, args: &[&str]) -> Vec<u8> {
    git(dir, args).assert().success().get_output().stdout.clone()
}

fn pack_indexes(repository: &Path) -> Vec<PathBuf> {
    let mut indexes = std::fs::read_dir(repository.join(".git/objects/pack"))
        .expect("Failed to list packs")
        .map(|entry| entry.expect("Failed to read entry").path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "idx"))
        .collect::<Vec<_>>();
    indexes.sort();
    indexes
}

/// A repository whose history makes `git repack` emit delta chains
fn repository_with_history(dir: &TempDir, text: &str) {
    git(dir.path(), &["init", "--quiet"]).assert().success();

    let mut content = text.to_string();
    for revision in 0..12 {
        content.push_str(&format!("\nrevision {revision}: {}", common::words()));
        dir.child("notes.txt").write_str(&content).expect("Failed to write file");
        dir.child("lib.txt")
            .write_str(&content.replace(' ', "_"))
            .expect("Failed to write file");

        git(dir.path(), &["add", "."]).assert().success();
        git(dir.path(), &["commit", "--quiet", "-m", &format!("revision {revision}")])
            .assert()
            .success();
    }

    git(dir.path(), &["repack", "-adf", "--depth=50", "--window=50"]).assert().success();
}

#[rstest]
fn every_object_in_a_git_pack_reads_back(pack_dir: TempDir, text: String) -> anyhow::Result<()> {
    if !git_available() {
        eprintln!("git not found, skipping");
        return Ok(());
    }
    repository_with_history(&pack_dir, &text);

    let indexes = pack_indexes(pack_dir.path());
    assert!(!indexes.is_empty());

    let mut deltas = 0;
    for index_path in &indexes {
        let pack = Pack::open(index_path)?;
        pack.verify()?;

        for position in 0..pack.index().entry_count()? {
            let oid = pack.index().read_identifier(position)?;
            if pack.open_object(&oid)?.is_delta() {
                deltas += 1;
            }

            let object = pack.read_verified(&oid, &())?;
            let expected_type = git_stdout(pack_dir.path(), &["cat-file", "-t", &oid.to_string()]);
            assert_eq!(
                String::from_utf8_lossy(&expected_type).trim(),
                object.object_type().as_str()
            );
        }
    }
    assert!(deltas > 0, "repack produced no deltas");

    Ok(())
}

#[rstest]
fn pack_set_matches_git_cat_file(pack_dir: TempDir, text: String) -> anyhow::Result<()> {
    if !git_available() {
        eprintln!("git not found, skipping");
        return Ok(());
    }
    repository_with_history(&pack_dir, &text);

    let set = PackSet::open(pack_indexes(pack_dir.path()))?;
    let head = String::from_utf8(git_stdout(pack_dir.path(), &["rev-parse", "HEAD:notes.txt"]))?;
    let oid: ObjectId = head.trim().parse()?;

    let object = set.read_object(&oid)?;
    let expected = git_stdout(pack_dir.path(), &["cat-file", "blob", head.trim()]);
    assert_eq!(object.content().as_ref(), expected.as_slice());

    Ok(())
}
