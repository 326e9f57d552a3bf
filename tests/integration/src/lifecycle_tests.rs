//! Multi-revision deployment lifecycles across the workspace crates
//!
//! Each test walks a destination through several deployments the way an
//! operator would: deploy, edit by hand, upgrade, revert.

use std::collections::BTreeSet;
use std::fs;

use bundle_core::{
    DeployDifferences, Deployer, DeploymentData, DeploymentProperties, DeploymentsMetadata, FileHashcodeMap,
    PathPattern, TemplateEngine,
};
use bundle_fs::checksum::compute_content_checksum;
use bundle_test_utils::TestDeployment;
use pretty_assertions::assert_eq;

fn props(id: i32, version: &str) -> DeploymentProperties {
    DeploymentProperties::new(id, "shop", version).with_description(format!("release {version}"))
}

fn release(scenario: &TestDeployment, id: i32, version: &str, zip: &str) -> DeploymentData {
    DeploymentData::builder(props(id, version), scenario.source(), scenario.destination())
        .zip(zip)
        .zip_realize_pattern(zip, PathPattern::new("conf/.*\\.properties").unwrap())
        .raw_file("start.sh", "bin/start.sh")
        .template_engine(TemplateEngine::default().with_token("http.port", "8080"))
        .ignore_pattern(PathPattern::new("logs|work").unwrap())
        .build()
        .unwrap()
}

fn deploy(data: DeploymentData) -> (FileHashcodeMap, DeployDifferences) {
    let mut diff = DeployDifferences::new();
    let map = Deployer::new(data).unwrap().deploy(&mut diff).unwrap();
    assert!(diff.errors().is_empty(), "deployment errors: {:?}", diff.errors());
    (map, diff)
}

#[test]
fn test_upgrade_then_revert_keeps_operator_changes() {
    let scenario = TestDeployment::new();
    scenario.write_source("start.sh", "#!/bin/sh\nexec shop\n");
    scenario.zip(
        "shop-1.0.zip",
        &[
            ("conf/", ""),
            ("conf/shop.properties", "port=@@http.port@@\nthreads=4\n"),
            ("lib/", ""),
            ("lib/shop.jar", "jar 1.0"),
            ("lib/legacy.jar", "legacy"),
        ],
    );
    scenario.zip(
        "shop-1.1.zip",
        &[
            ("conf/", ""),
            ("conf/shop.properties", "port=@@http.port@@\nthreads=8\n"),
            ("lib/", ""),
            ("lib/shop.jar", "jar 1.1"),
        ],
    );

    // 1.0 goes in and the token is realized
    let (map, _) = deploy(release(&scenario, 1, "1.0", "shop-1.0.zip"));
    scenario.assert_file_content("conf/shop.properties", "port=8080\nthreads=4\n");
    assert_eq!(
        map.get("conf/shop.properties"),
        Some(compute_content_checksum("port=8080\nthreads=4\n").as_str())
    );

    // The operator tunes the config and the app writes logs
    scenario.write_dest("conf/shop.properties", "port=9090\nthreads=4\n");
    scenario.write_dest("logs/shop.log", "started");

    // 1.1 changes the config too, so the tuned copy is backed up
    let (_, diff) = deploy(release(&scenario, 2, "1.1", "shop-1.1.zip"));
    scenario.assert_file_content("conf/shop.properties", "port=8080\nthreads=8\n");
    scenario.assert_file_content(".deployments/2/backup/conf/shop.properties", "port=9090\nthreads=4\n");
    scenario.assert_file_not_exists("lib/legacy.jar");
    scenario.assert_file_content("logs/shop.log", "started");
    assert!(diff.ignored().contains("logs"));
    assert!(diff.deleted().contains("lib/legacy.jar"));
    assert_eq!(diff.backed_up().len(), 1);

    // Reverting to 1.0 brings back the old jar and the tuned config
    let deployer = Deployer::new(release(&scenario, 3, "1.0", "shop-1.0.zip")).unwrap();
    let mut diff = DeployDifferences::new();
    let map = deployer
        .redeploy_and_restore_backup_files(&mut diff, false, false)
        .unwrap();

    scenario.assert_file_content("lib/legacy.jar", "legacy");
    scenario.assert_file_content("lib/shop.jar", "jar 1.0");
    scenario.assert_file_content("conf/shop.properties", "port=9090\nthreads=4\n");
    scenario.assert_file_content("logs/shop.log", "started");
    assert_eq!(
        map.get("conf/shop.properties"),
        Some(compute_content_checksum("port=9090\nthreads=4\n").as_str())
    );

    let metadata = deployer.metadata();
    let current = metadata.current_deployment_properties().unwrap();
    assert_eq!(current, props(3, "1.0"));
    assert_eq!(metadata.current_deployment_file_hashcodes().unwrap(), map);
    assert_eq!(
        metadata.previous_deployment_properties(3).unwrap(),
        Some(props(2, "1.1"))
    );
    assert_eq!(
        metadata.previous_deployment_properties(2).unwrap(),
        Some(props(1, "1.0"))
    );
}

#[test]
fn test_redeploying_the_same_release_is_idempotent() {
    let scenario = TestDeployment::new();
    scenario.write_source("start.sh", "#!/bin/sh\n");
    scenario.zip("shop.zip", &[("conf/shop.properties", "port=@@http.port@@"), ("lib/shop.jar", "jar")]);

    let (first, _) = deploy(release(&scenario, 1, "1.0", "shop.zip"));
    let (second, diff) = deploy(release(&scenario, 1, "1.0", "shop.zip"));
    let (third, _) = deploy(release(&scenario, 1, "1.0", "shop.zip"));

    assert_eq!(first, second);
    assert_eq!(second, third);
    // Realized entries are rewritten on every run, nothing else moves
    assert!(diff.added().is_empty() && diff.changed().is_empty() && diff.deleted().is_empty());
    assert!(diff.backed_up().is_empty());
    assert_eq!(diff.realized().len(), 1);
    assert!(!scenario.dest_path(".deployments/1/backup").exists());
}

#[test]
fn test_differences_serialize_for_reporting() {
    let scenario = TestDeployment::new();
    scenario.write_source("start.sh", "#!/bin/sh\n");
    scenario.zip("shop.zip", &[("conf/shop.properties", "port=@@http.port@@")]);
    scenario.write_dest("old.txt", "old");

    let (_, diff) = deploy(release(&scenario, 1, "1.0", "shop.zip"));
    let json = serde_json::to_value(&diff).unwrap();

    assert_eq!(json["added"], serde_json::json!(["bin/start.sh", "conf/shop.properties"]));
    assert_eq!(json["deleted"], serde_json::json!(["old.txt"]));
    assert_eq!(json["realized"]["conf/shop.properties"], "port=8080");
    assert_eq!(json["cleaned"], false);
}

#[test]
fn test_deploying_over_an_adopted_directory() {
    let scenario = TestDeployment::new();
    scenario.write_dest("lib/shop.jar", "hand installed");
    scenario.write_dest("lib/extra.jar", "extra");

    let metadata = DeploymentsMetadata::new(scenario.destination());
    let mut ignored = BTreeSet::new();
    metadata
        .snapshot_live_deployment(&props(1, "0.9"), None, &mut ignored)
        .unwrap();

    scenario.write_source("start.sh", "#!/bin/sh\n");
    scenario.zip("shop.zip", &[("lib/shop.jar", "jar 1.0")]);
    let (map, diff) = deploy(release(&scenario, 2, "1.0", "shop.zip"));

    // Adopted files are managed: unchanged ones go without a backup
    scenario.assert_file_not_exists("lib/extra.jar");
    scenario.assert_file_content("lib/shop.jar", "jar 1.0");
    assert!(diff.deleted().contains("lib/extra.jar"));
    assert!(diff.changed().contains("lib/shop.jar"));
    assert!(diff.backed_up().is_empty());
    assert_eq!(
        map.keys().collect::<Vec<_>>(),
        vec!["bin/start.sh", "lib/shop.jar"]
    );
    assert_eq!(fs::read_dir(scenario.destination().join("lib")).unwrap().count(), 1);
}
