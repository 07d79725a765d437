//! Integration tests for the Dockerfile model and fact extractors, run over
//! the files in testdata/.

use std::path::PathBuf;

use dockaudit::dockerfile::{
    detect_curl_pipe_sh, discover, external_base_images, extract_package_installs, final_user,
    has_healthcheck, load_build_files, BuildFileModel, BuildFileTarget, FactSheet, LoadOptions,
    PackageManager,
};

fn testdata_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

fn load(rel: &str) -> BuildFileModel {
    BuildFileModel::parse_file(testdata_path().join(rel)).expect("should parse fixture")
}

#[test]
fn test_discover_skips_dependency_dirs() {
    let target = BuildFileTarget::resolve(testdata_path()).expect("testdata exists");
    let mut found: Vec<String> = discover(&target, &[])
        .iter()
        .map(|p| {
            p.strip_prefix(target.root())
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    found.sort();
    assert_eq!(
        found,
        vec![
            "Dockerfile",
            "services/api/api.dockerfile",
            "services/worker/Dockerfile.prod",
        ]
    );
}

#[test]
fn test_extra_ignores() {
    let target = BuildFileTarget::resolve(testdata_path()).unwrap();
    let found = discover(&target, &["services".to_string()]);
    assert_eq!(found.len(), 1);
    assert!(found[0].ends_with("Dockerfile"));
}

#[test]
fn test_root_dockerfile_facts() {
    let model = load("Dockerfile");
    assert_eq!(model.base_images(), &["ubuntu:18.04".to_string()]);
    assert_eq!(final_user(&model).as_deref(), Some("root"));
    assert!(!has_healthcheck(&model));
    assert_eq!(model.env().get("API_KEY").map(String::as_str), Some("abcd1234"));

    let sheet = FactSheet::collect(&model);
    assert_eq!(sheet.exposed_ports, vec![22, 2375]);

    let installs = extract_package_installs(&model);
    let names: Vec<&str> = installs.iter().map(|p| p.package.as_str()).collect();
    assert_eq!(names, vec!["openssl", "curl"]);
    assert!(installs
        .iter()
        .all(|p| p.manager == PackageManager::Apt && !p.version_pinned && p.line == 2));
}

#[test]
fn test_multi_stage_facts() {
    let model = load("services/api/api.dockerfile");
    assert_eq!(
        model.base_images(),
        &["node:20-alpine".to_string(), "node:20-alpine".to_string()]
    );
    assert_eq!(final_user(&model).as_deref(), Some("node"));
    assert!(has_healthcheck(&model));
    assert_eq!(
        model
            .labels()
            .get("org.opencontainers.image.source")
            .map(String::as_str),
        Some("https://github.com/example/api")
    );

    let curl: Vec<usize> = detect_curl_pipe_sh(&model).iter().map(|i| i.line).collect();
    assert_eq!(curl, vec![12]);

    // `npm ci` and `npm run` install nothing by name
    assert!(extract_package_installs(&model).is_empty());
}

#[test]
fn test_continuation_and_digest() {
    let model = load("services/worker/Dockerfile.prod");
    assert_eq!(model.labels().len(), 2);
    assert_eq!(
        model
            .labels()
            .get("org.opencontainers.image.revision")
            .map(String::as_str),
        Some("0123abc")
    );

    let bases = external_base_images(&model);
    assert_eq!(bases.len(), 1);
    assert_eq!(bases[0].short_name(), "python");
    assert_eq!(bases[0].tag.as_deref(), Some("3.12-slim"));
    assert!(bases[0].digest.as_deref().unwrap().starts_with("sha256:"));

    // LABEL spans lines 2-3 and is reported at its first line
    let label_line = model
        .instructions()
        .iter()
        .find(|i| i.kind == "LABEL")
        .map(|i| i.line);
    assert_eq!(label_line, Some(2));
    assert_eq!(final_user(&model).as_deref(), Some("10001"));
}

#[test]
fn test_load_build_files_order_is_stable() {
    let target = BuildFileTarget::resolve(testdata_path()).unwrap();
    let options = LoadOptions {
        jobs: 2,
        ..Default::default()
    };
    let first: Vec<PathBuf> = load_build_files(&target, &options)
        .iter()
        .map(|m| m.path().to_path_buf())
        .collect();
    let second: Vec<PathBuf> = load_build_files(&target, &LoadOptions::default())
        .iter()
        .map(|m| m.path().to_path_buf())
        .collect();
    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
}
