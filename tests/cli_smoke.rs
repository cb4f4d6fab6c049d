use std::path::PathBuf;

fn exe() -> PathBuf {
    std::env::var_os("CARGO_BIN_EXE_verticut")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let mut p = PathBuf::from("target").join("debug");
            p.push(if cfg!(windows) {
                "verticut.exe"
            } else {
                "verticut"
            });
            p
        })
}

#[test]
fn cli_frame_writes_vertical_png() {
    let dir = tempfile::tempdir().unwrap();
    let in_path = dir.path().join("still.png");
    let out_path = dir.path().join("preview").join("out.png");
    let cfg_path = dir.path().join("cfg.json");

    let img = image::RgbImage::from_fn(192, 108, |x, y| {
        image::Rgb([(x % 256) as u8, (y * 2 % 256) as u8, 128])
    });
    img.save(&in_path).unwrap();
    std::fs::write(&cfg_path, r#"{"geometry": {"width": 90, "blur_kernel": 5}}"#).unwrap();

    let status = std::process::Command::new(exe())
        .arg("frame")
        .arg("--in")
        .arg(&in_path)
        .arg("--out")
        .arg(&out_path)
        .arg("--config")
        .arg(&cfg_path)
        .status()
        .unwrap();

    assert!(status.success());
    assert_eq!(image::image_dimensions(&out_path).unwrap(), (90, 160));
}

#[test]
fn cli_convert_missing_source_exits_with_failure() {
    let dir = tempfile::tempdir().unwrap();
    let output = std::process::Command::new(exe())
        .arg("convert")
        .arg("--in")
        .arg(dir.path().join("missing.mp4"))
        .arg("--out")
        .arg(dir.path().join("short.mp4"))
        .arg("--no-clipboard")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cannot open source video"), "stderr: {stderr}");
    assert!(!dir.path().join("short.mp4").exists());
}
