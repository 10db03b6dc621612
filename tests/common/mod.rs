#![allow(dead_code)]

pub mod pack_builder;

use assert_fs::TempDir;
use fake::Fake;
use fake::faker::lorem::en::{Paragraph, Words};
use rstest::fixture;

#[fixture]
pub fn pack_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

/// A few lines of random prose, long enough to be worth delta-compressing
#[fixture]
pub fn text() -> String {
    (0..4)
        .map(|_| Paragraph(3..6).fake::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn words() -> String {
    Words(3..8).fake::<Vec<String>>().join(" ")
}
