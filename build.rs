use std::env;
use std::path::{Path, PathBuf};

/// Bundled FFmpeg location used when `FFMPEG_DIR` is not set.
const DEFAULT_FFMPEG_DIR: &str = "third_party/ffmpeg";

fn main() {
    println!("cargo:rerun-if-env-changed=FFMPEG_DIR");
    println!("cargo:rerun-if-env-changed=CARGO_CFG_TARGET_OS");

    // Build scripts run on the host; the target OS only comes through the environment.
    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows") {
        return;
    }

    let ffmpeg_bin = env::var_os("FFMPEG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_FFMPEG_DIR))
        .join("bin");
    println!("cargo:rerun-if-changed={}", ffmpeg_bin.display());

    // Copy the FFmpeg DLLs next to the produced binary and point the linker at them.
    let Ok(out_dir) = env::var("OUT_DIR") else {
        println!("cargo:warning=OUT_DIR not set, skipping FFmpeg DLL copy");
        return;
    };
    // OUT_DIR is target/<profile>/build/<crate>/out
    let Some(target_dir) = Path::new(&out_dir).ancestors().nth(3) else {
        println!("cargo:warning=cannot resolve target dir from {}", out_dir);
        return;
    };

    if !ffmpeg_bin.exists() {
        println!(
            "cargo:warning=FFmpeg DLLs not found at {}",
            ffmpeg_bin.display()
        );
        return;
    }

    let entries = std::fs::read_dir(&ffmpeg_bin)
        .map(|dir| dir.filter_map(Result::ok).collect::<Vec<_>>())
        .unwrap_or_default();

    for entry in entries {
        let path = entry.path();
        if !is_required_ffmpeg_dll(&path) {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        let dest = target_dir.join(file_name);
        if !dest.exists() || file_modified(&path) > file_modified(&dest) {
            match std::fs::copy(&path, &dest) {
                Ok(_) => println!("cargo:warning=Copied {} to output dir", path.display()),
                Err(e) => println!(
                    "cargo:warning=Failed to copy {} to {}: {}",
                    path.display(),
                    dest.display(),
                    e
                ),
            }
        }
    }
    println!("cargo:rustc-link-search=native={}", ffmpeg_bin.display());
}

fn file_modified(path: &Path) -> std::time::SystemTime {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
}

/// Only the libraries the decode + scale path links against.
fn is_required_ffmpeg_dll(path: &Path) -> bool {
    const REQUIRED_DLL_PREFIXES: &[&str] = &["avcodec-", "avutil-", "swscale-"];

    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };

    let lower = file_name.to_ascii_lowercase();
    lower.ends_with(".dll") && REQUIRED_DLL_PREFIXES.iter().any(|prefix| lower.starts_with(prefix))
}
