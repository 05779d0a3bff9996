use std::fs;
use std::process::Command;

use tempfile::tempdir;

const PARAMS: &str = "\
x: 5.5
y: 5.0
z: 7.0
flux: 60.0
radius: 2.0
inclination: 45.0
pa: 120.0
turnover_radius: 0.8
maximum_velocity: 110.0
velocity_dispersion: 30.0
";

const CONFIG: &str = "\
sampler:
  max_iterations: 300
  min_acceptance_rate: 0
instrument:
  preset: muse-wfm
  psf:
    type: gaussian
    fwhm: 0.6
selection:
  method: map
seed_policy:
  master_seed: 11
";

fn kinefit_sim() -> Command {
    Command::new(env!("CARGO_BIN_EXE_kinefit-sim"))
}

#[test]
fn synth_then_fit_writes_all_artifacts() {
    let dir = tempdir().unwrap();
    let params = dir.path().join("params.yaml");
    let config = dir.path().join("fit.yaml");
    let cube = dir.path().join("cube.json");
    let out = dir.path().join("run");
    fs::write(&params, PARAMS).unwrap();
    fs::write(&config, CONFIG).unwrap();

    let status = kinefit_sim()
        .args(["synth", "--nz", "14", "--ny", "11", "--nx", "11", "--noise", "0.01"])
        .arg("--params")
        .arg(&params)
        .arg("--config")
        .arg(&config)
        .arg("--out")
        .arg(&cube)
        .status()
        .unwrap();
    assert!(status.success());

    let document: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&cube).unwrap()).unwrap();
    assert_eq!(document["data"]["dim"], serde_json::json!([14, 11, 11]));
    assert!(document["variance"].is_object());
    assert_eq!(document["parameters"]["flux"], serde_json::json!(60.0));

    let output = kinefit_sim()
        .arg("fit")
        .arg("--cube")
        .arg(&cube)
        .arg("--config")
        .arg(&config)
        .arg("--out")
        .arg(&out)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("maximum_velocity"));
    assert!(stdout.contains("(true 110.0000)"));

    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join("manifest.json")).unwrap()).unwrap();
    assert_eq!(manifest["master_seed"], serde_json::json!(11));
    assert_eq!(manifest["result_file"], serde_json::json!("result.json"));
    assert_eq!(
        manifest["provenance"]["config_hash"].as_str().map(str::len),
        Some(64)
    );
    let result: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join("result.json")).unwrap()).unwrap();
    assert_eq!(result["model"], serde_json::json!("disk"));
    assert_eq!(result["best"]["method"], serde_json::json!("map"));
    assert!(out.join("model_cube.json").exists());
}

#[test]
fn synth_rejects_partial_parameters() {
    let dir = tempdir().unwrap();
    let params = dir.path().join("params.yaml");
    fs::write(&params, "x: 1.0\ny: 2.0\n").unwrap();
    let status = kinefit_sim()
        .arg("synth")
        .arg("--params")
        .arg(&params)
        .arg("--out")
        .arg(dir.path().join("cube.json"))
        .status()
        .unwrap();
    assert!(!status.success());
}
