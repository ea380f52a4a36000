use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use vx_core::Grid;
use vx_image::raw::{read_volume, write_volume};
use vx_image::{DataType, Volume};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_vx-cli"))
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

fn write_input(dir: &Path, name: &str, data: Vec<f64>) -> String {
    let path = dir.join(name);
    let grid = Grid::new(vec![data.len()]).unwrap();
    write_volume(&path, &Volume::new(grid, data).unwrap(), DataType::F32, false).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn version_smoke() {
    let out = run(&["version"]);
    assert!(out.status.success(), "version should succeed");
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("voxstat "), "unexpected stdout: {}", stdout);
}

#[test]
fn onesample_writes_maps_and_summary() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_input(dir.path(), "a.img", vec![1.0, 0.0]);
    let b = write_input(dir.path(), "b.img", vec![2.0, 0.0]);
    let c = write_input(dir.path(), "c.img", vec![3.0, 0.0]);
    let out_dir = dir.path().join("group");
    let out_dir_s = out_dir.to_string_lossy().into_owned();

    let out = run(&["onesample", "-i", &a, "-i", &b, "-i", &c, "--path", &out_dir_s]);
    assert!(
        out.status.success(),
        "onesample should succeed, stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("stdout should be JSON");
    assert_eq!(v["summary"]["n_positions"], 2);
    assert_eq!(v["summary"]["n_images"], 3);
    assert_eq!(v["summary"]["which"], "mean");
    // Position 1 has zero spread around zero: sd = 0, t = 0/0.
    assert_eq!(v["summary"]["n_degenerate"], 1);
    assert_eq!(v["outputs"].as_array().unwrap().len(), 3);

    let effect = read_volume(out_dir.join("effect.img")).unwrap();
    assert_eq!(effect.data(), &[2.0, 0.0]);
    let sd = read_volume(out_dir.join("sd.img")).unwrap();
    assert!((sd.data()[0] - 1.0).abs() < 1e-6);
    let t = read_volume(out_dir.join("t.img")).unwrap();
    assert!((t.data()[0] - 12f64.sqrt()).abs() < 1e-5);
    assert!(t.data()[1].is_nan());
}

#[test]
fn onesample_refuses_to_overwrite_without_clobber() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_input(dir.path(), "a.img", vec![1.0]);
    let b = write_input(dir.path(), "b.img", vec![4.0]);
    let out_dir = dir.path().join("group").to_string_lossy().into_owned();
    let args = [
        "onesample",
        "-i",
        a.as_str(),
        "-i",
        b.as_str(),
        "--path",
        out_dir.as_str(),
        "--which",
        "varatio",
    ];

    assert!(run(&args).status.success());
    let again = run(&args);
    assert!(!again.status.success(), "second run without --clobber must fail");
    let stderr = String::from_utf8_lossy(&again.stderr);
    assert!(stderr.contains("exists"), "unexpected stderr: {}", stderr);

    let mut with_clobber = args.to_vec();
    with_clobber.push("--clobber");
    assert!(run(&with_clobber).status.success());
}

#[test]
fn onesample_weighted_with_summary_file() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_input(dir.path(), "a.img", vec![1.0]);
    let b = write_input(dir.path(), "b.img", vec![3.0]);
    let wa = write_input(dir.path(), "wa.img", vec![3.0]);
    let wb = write_input(dir.path(), "wb.img", vec![1.0]);
    let out_dir = dir.path().join("group");
    let summary = dir.path().join("summary.json");

    let out = run(&[
        "onesample",
        "-i",
        &a,
        "-i",
        &b,
        "-w",
        &wa,
        "-w",
        &wb,
        "--weight-kind",
        "weight",
        "--no-t",
        "--no-sd",
        "--path",
        out_dir.to_string_lossy().as_ref(),
        "--output",
        summary.to_string_lossy().as_ref(),
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));

    let v: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&summary).unwrap()).unwrap();
    assert_eq!(v["summary"]["weighted"], true);
    assert_eq!(v["summary"]["statistics"], serde_json::json!(["mean"]));
    assert_eq!(read_volume(out_dir.join("effect.img")).unwrap().data(), &[1.5]);
}

#[test]
fn onesample_rejects_weight_count_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_input(dir.path(), "a.img", vec![1.0]);
    let b = write_input(dir.path(), "b.img", vec![3.0]);
    let out_dir = dir.path().join("group").to_string_lossy().into_owned();

    let out = run(&["onesample", "-i", &a, "-i", &b, "-w", &a, "--path", &out_dir]);
    assert!(!out.status.success());
    assert!(!dir.path().join("group").exists(), "no outputs on configuration failure");
}

#[test]
fn onesample_choice_flags_accept_listed_values_only() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_input(dir.path(), "a.img", vec![1.0]);
    let b = write_input(dir.path(), "b.img", vec![3.0]);
    let wa = write_input(dir.path(), "wa.img", vec![1.0]);
    let wb = write_input(dir.path(), "wb.img", vec![1.0]);
    let out_dir = dir.path().join("group").to_string_lossy().into_owned();

    let out = run(&["onesample", "-i", &a, "-i", &b, "--which", "t", "--path", &out_dir]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("mean") && stderr.contains("varatio"), "stderr={stderr}");

    let out = run(&["onesample", "-i", &a, "-i", &b, "--dtype", "i16", "--path", &out_dir]);
    assert!(!out.status.success());
    assert!(!dir.path().join("group").exists());

    let out = run(&[
        "onesample", "-i", &a, "-i", &b, "-w", &wa, "-w", &wb, "--weight-kind", "sd", "--dtype",
        "f64", "--path", &out_dir,
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(read_volume(dir.path().join("group/effect.img")).unwrap().data(), &[2.0]);
}
