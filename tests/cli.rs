use assert_cmd::prelude::*;
use image::GenericImageView;
use predicates::prelude::*;
use std::process::Command;
use tempfile::tempdir;

fn tilebrot() -> Command {
    Command::cargo_bin("tilebrot").unwrap()
}

#[test]
fn renders_a_png_of_the_requested_size() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("set.png");
    tilebrot()
        .args(&["render", "-s", "96x64", "-i", "60", "--tile-size", "32", "-o"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("96x64, 6/6 tiles"));

    let picture = image::open(&path).unwrap();
    assert_eq!(picture.dimensions(), (96, 64));
    // The middle of the default view is inside the set.
    let middle = picture.get_pixel(48, 32);
    assert_eq!(middle.0, [0, 0, 0, 255]);
}

#[test]
fn renders_julia_sets() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("julia.png");
    tilebrot()
        .args(&["render", "-s", "64x64", "-j", "-0.8,0.156", "-q", "low", "-o"])
        .arg(&path)
        .assert()
        .success();
    assert!(path.exists());
}

#[test]
fn renders_presets() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("spiral.png");
    tilebrot()
        .args(&["render", "-s", "80x80", "-p", "spiral", "-t", "1", "-o"])
        .arg(&path)
        .assert()
        .success();
    assert!(path.exists());
}

#[test]
fn unknown_presets_are_an_error() {
    let dir = tempdir().unwrap();
    tilebrot()
        .args(&["render", "-s", "16x16", "-p", "atlantis", "-o"])
        .arg(dir.path().join("nowhere.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown preset: atlantis"));
}

#[test]
fn iteration_count_is_bounded() {
    tilebrot()
        .args(&["render", "-o", "never.png", "-i", "5000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Iteration count must be between 50 and 500"));
}

#[test]
fn zero_sized_canvases_are_refused() {
    tilebrot()
        .args(&["render", "-o", "never.png", "-s", "0x64"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("both sides above zero"));
}

#[test]
fn malformed_centers_are_refused() {
    tilebrot()
        .args(&["render", "-o", "never.png", "-c", "-0.5;0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not parse center as RE,IM"));
}

#[test]
fn lists_presets() {
    tilebrot()
        .arg("presets")
        .assert()
        .success()
        .stdout(predicate::str::contains("seahorse"))
        .stdout(predicate::str::contains("Feathery Edge"));
}

#[test]
fn tours_every_preset() {
    let dir = tempdir().unwrap();
    tilebrot()
        .args(&["tour", "-s", "32x24", "-i", "50", "-d"])
        .arg(dir.path())
        .assert()
        .success();
    for key in &["full", "seahorse", "spiral", "elephant", "minibrots", "tentacles", "feather"] {
        assert!(dir.path().join(format!("{}.png", key)).exists(), "{} missing", key);
    }
}
