use std::path::PathBuf;

use comfypod_core::launch::LaunchCommand;
use comfypod_core::manifest::ImageManifest;

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

#[test]
fn parse_real_image_manifest_json() {
    let manifest_path = repo_root().join("image-manifest.json");
    let bytes = std::fs::read(&manifest_path)
        .unwrap_or_else(|e| panic!("read {} failed: {e}", manifest_path.display()));
    let manifest: ImageManifest = serde_json::from_slice(&bytes)
        .unwrap_or_else(|e| panic!("parse {} failed: {e}", manifest_path.display()));

    assert_eq!(manifest.app_name, "ComfyUI");
    assert_eq!(manifest.app_root, "/ComfyUI");
    assert_eq!(manifest.manifest_file_name, "requirements.txt");
    assert!(!manifest.installer.program.trim().is_empty());
    assert!(
        manifest
            .layout
            .model_subdirs
            .iter()
            .any(|s| s == "checkpoints"),
        "checkpoints model dir must be scaffolded"
    );

    let cmd = LaunchCommand::from_manifest(&manifest);
    for flag in [
        "--listen",
        "--port",
        "--enable-cors-header",
        "--max-upload-size",
        "--output-directory",
        "--temp-directory",
    ] {
        assert!(cmd.args.iter().any(|a| a == flag), "missing launch flag {flag}");
    }
    assert_eq!(cmd.env.len(), 3, "only the three passthrough variables are expected");
}
