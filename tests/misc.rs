use std::{collections::HashSet, fs, path::Path};

use handsign::config::{Config, ModelVariant};

/// Returns the file paths listed in the first column of the 3rdparty README table.
fn attributed_files() -> HashSet<String> {
    let file = fs::read_to_string(Path::new(env!("CARGO_MANIFEST_DIR")).join("3rdparty/README.md"))
        .unwrap();

    let mut present = HashSet::new();
    let mut in_table = false;
    for line in file.lines() {
        if in_table {
            if line.starts_with('|') {
                let rest = &line[line.find('`').unwrap() + 1..];
                let path = &rest[..rest.find('`').unwrap()];
                present.insert(path.to_string());
            } else {
                break;
            }
        } else if line.starts_with("|---") {
            in_table = true;
        }
    }
    present
}

#[test]
fn thirdparty_attribution() {
    let mut present = attributed_files();
    for variant in [ModelVariant::Lite, ModelVariant::Full] {
        for file in [variant.palm_detection_file(), variant.hand_landmark_file()] {
            let path = format!("onnx/{file}");
            if !present.remove(&path) {
                panic!("model `{path}` is not attributed in readme");
            }
        }
    }

    assert!(
        present.is_empty(),
        "3rdparty readme lists files that are never loaded: {:?}",
        present
    );
}

#[test]
fn default_model_dir_is_3rdparty() {
    let config = Config::default();
    assert_eq!(
        config.model_dir(),
        Path::new(env!("CARGO_MANIFEST_DIR")).join("3rdparty/onnx")
    );
}
