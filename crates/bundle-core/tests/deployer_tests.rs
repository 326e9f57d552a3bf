//! End-to-end tests for the deployer against real directories

use std::fs;
use std::path::PathBuf;

use bundle_core::{
    DeployDifferences, Deployer, DeploymentData, DeploymentProperties, DestinationComplianceMode, Error,
    FileHashcodeMap, PathPattern, TemplateEngine,
};
use bundle_fs::checksum::compute_content_checksum;
use bundle_test_utils::TestDeployment;
use pretty_assertions::assert_eq;
use rstest::rstest;

fn props(id: i32) -> DeploymentProperties {
    DeploymentProperties::new(id, "app", format!("1.0.{id}"))
}

fn zip_data(scenario: &TestDeployment, id: i32, zip: &str) -> DeploymentData {
    DeploymentData::builder(props(id), scenario.source(), scenario.destination())
        .zip(zip)
        .build()
        .unwrap()
}

fn run(data: DeploymentData) -> (FileHashcodeMap, DeployDifferences) {
    let mut diff = DeployDifferences::new();
    let map = Deployer::new(data).unwrap().deploy(&mut diff).unwrap();
    (map, diff)
}

/// Deploys revision 1 of a two-file bundle and returns its scenario.
fn deployed_v1() -> TestDeployment {
    let scenario = TestDeployment::new();
    scenario.zip("v1.zip", &[("dir/", ""), ("dir/a.txt", "a1"), ("b.txt", "b1")]);
    run(zip_data(&scenario, 1, "v1.zip"));
    scenario
}

mod initial_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_initial_deployment_extracts_and_records_metadata() {
        let scenario = TestDeployment::new();
        scenario.zip("v1.zip", &[("dir/", ""), ("dir/a.txt", "a1"), ("b.txt", "b1")]);

        let (map, diff) = run(zip_data(&scenario, 1, "v1.zip"));

        scenario.assert_file_content("dir/a.txt", "a1");
        scenario.assert_file_content("b.txt", "b1");
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("b.txt"), Some(compute_content_checksum("b1").as_str()));
        assert_eq!(
            diff.added().iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["b.txt", "dir/a.txt"]
        );

        let deployer = Deployer::new(zip_data(&scenario, 1, "v1.zip")).unwrap();
        let metadata = deployer.metadata();
        assert!(metadata.is_managed());
        assert_eq!(metadata.current_deployment_properties().unwrap(), props(1));
        assert_eq!(metadata.current_deployment_file_hashcodes().unwrap(), map);
    }

    #[test]
    fn test_initial_deployment_creates_missing_destination() {
        let scenario = TestDeployment::new();
        scenario.zip("v1.zip", &[("b.txt", "b1")]);
        let destination = scenario.root().join("fresh/app");

        let data = DeploymentData::builder(props(1), scenario.source(), &destination)
            .zip("v1.zip")
            .build()
            .unwrap();
        run(data);

        assert_eq!(fs::read_to_string(destination.join("b.txt")).unwrap(), "b1");
        assert!(destination.join(".deployments/current-deployment.properties").is_file());
    }

    #[test]
    fn test_full_compliance_backs_up_and_removes_existing_content() {
        let scenario = TestDeployment::new();
        scenario.zip("v1.zip", &[("dir/", ""), ("dir/a.txt", "a1")]);
        scenario.write_dest("stray.txt", "mine");
        scenario.write_dest("dir/old.txt", "old");

        let (_, diff) = run(zip_data(&scenario, 1, "v1.zip"));

        scenario.assert_file_not_exists("stray.txt");
        scenario.assert_file_not_exists("dir/old.txt");
        scenario.assert_file_content(".deployments/1/backup/stray.txt", "mine");
        scenario.assert_file_content(".deployments/1/backup/dir/old.txt", "old");
        assert!(diff.backed_up().contains_key("stray.txt"));
        assert!(diff.deleted().contains("dir/old.txt"));
    }

    #[test]
    fn test_files_and_directories_compliance_only_purges_managed_subdirectories() {
        let scenario = TestDeployment::new();
        scenario.zip("v1.zip", &[("dir/", ""), ("dir/a.txt", "a1"), ("b.txt", "b1")]);
        scenario.write_dest("stray.txt", "mine");
        scenario.write_dest("dir/old.txt", "old");
        scenario.write_dest("other/keep.txt", "keep");

        let properties = props(1).with_compliance(DestinationComplianceMode::FilesAndDirectories);
        let data = DeploymentData::builder(properties, scenario.source(), scenario.destination())
            .zip("v1.zip")
            .build()
            .unwrap();
        let (_, diff) = run(data);

        scenario.assert_file_content("stray.txt", "mine");
        scenario.assert_file_content("other/keep.txt", "keep");
        scenario.assert_file_not_exists("dir/old.txt");
        scenario.assert_file_content(".deployments/1/backup/dir/old.txt", "old");
        assert_eq!(diff.backed_up().len(), 1);
    }
}

mod update_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unchanged_redeploy_records_no_differences() {
        let scenario = deployed_v1();

        let (map, diff) = run(zip_data(&scenario, 2, "v1.zip"));

        assert!(diff.is_empty(), "unexpected differences: {diff}");
        assert_eq!(map.len(), 2);
        scenario.assert_file_content("b.txt", "b1");
    }

    #[test]
    fn test_manual_change_is_preserved_when_bundle_file_did_not_change() {
        let scenario = deployed_v1();
        scenario.write_dest("b.txt", "manual");

        let (map, diff) = run(zip_data(&scenario, 2, "v1.zip"));

        scenario.assert_file_content("b.txt", "manual");
        assert_eq!(map.get("b.txt"), Some(compute_content_checksum("b1").as_str()));
        assert!(diff.backed_up().is_empty());
        assert!(diff.changed().is_empty());
    }

    #[test]
    fn test_manual_change_is_backed_up_once_when_bundle_file_changed() {
        let scenario = deployed_v1();
        scenario.write_dest("b.txt", "manual");
        scenario.zip("v2.zip", &[("dir/", ""), ("dir/a.txt", "a1"), ("b.txt", "b2")]);

        let (map, diff) = run(zip_data(&scenario, 2, "v2.zip"));

        scenario.assert_file_content("b.txt", "b2");
        scenario.assert_file_content(".deployments/2/backup/b.txt", "manual");
        assert_eq!(diff.backed_up().len(), 1);
        assert!(diff.changed().contains("b.txt"));
        assert_eq!(map.get("b.txt"), Some(compute_content_checksum("b2").as_str()));
    }

    #[test]
    fn test_bundle_change_updates_without_backup() {
        let scenario = deployed_v1();
        scenario.zip("v2.zip", &[("dir/", ""), ("dir/a.txt", "a1"), ("b.txt", "b2")]);

        let (_, diff) = run(zip_data(&scenario, 2, "v2.zip"));

        scenario.assert_file_content("b.txt", "b2");
        assert!(diff.backed_up().is_empty());
        assert_eq!(diff.changed().iter().collect::<Vec<_>>(), vec!["b.txt"]);
    }

    #[test]
    fn test_files_and_directories_dropped_from_bundle_are_removed() {
        let scenario = deployed_v1();
        scenario.zip("v2.zip", &[("b.txt", "b1")]);

        let (map, diff) = run(zip_data(&scenario, 2, "v2.zip"));

        scenario.assert_file_not_exists("dir/a.txt");
        scenario.assert_file_not_exists("dir");
        assert!(diff.deleted().contains("dir/a.txt"));
        assert!(diff.deleted().contains("dir"));
        assert!(diff.backed_up().is_empty());
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b.txt"]);
    }

    #[test]
    fn test_modified_file_dropped_from_bundle_is_backed_up_and_removed() {
        let scenario = deployed_v1();
        scenario.write_dest("dir/a.txt", "manual");
        scenario.zip("v2.zip", &[("b.txt", "b1")]);

        let (_, diff) = run(zip_data(&scenario, 2, "v2.zip"));

        scenario.assert_file_not_exists("dir/a.txt");
        scenario.assert_file_content(".deployments/2/backup/dir/a.txt", "manual");
        assert!(diff.backed_up().contains_key("dir/a.txt"));
        assert!(diff.deleted().contains("dir/a.txt"));
    }

    #[test]
    fn test_new_bundle_file_installs_when_nothing_is_there() {
        let scenario = deployed_v1();
        scenario.zip("v2.zip", &[("dir/", ""), ("dir/a.txt", "a1"), ("b.txt", "b1"), ("c.txt", "c2")]);

        let (_, diff) = run(zip_data(&scenario, 2, "v2.zip"));

        scenario.assert_file_content("c.txt", "c2");
        assert_eq!(diff.added().iter().collect::<Vec<_>>(), vec!["c.txt"]);
        assert!(diff.backed_up().is_empty());
    }

    #[test]
    fn test_new_bundle_file_backs_up_unmanaged_occupant() {
        let scenario = deployed_v1();
        scenario.write_dest("c.txt", "mine");
        scenario.zip("v2.zip", &[("dir/", ""), ("dir/a.txt", "a1"), ("b.txt", "b1"), ("c.txt", "c2")]);

        let (_, diff) = run(zip_data(&scenario, 2, "v2.zip"));

        scenario.assert_file_content("c.txt", "c2");
        scenario.assert_file_content(".deployments/2/backup/c.txt", "mine");
        assert!(diff.changed().contains("c.txt"));
        assert!(diff.added().is_empty());
    }

    #[test]
    fn test_full_compliance_removes_unmanaged_files_on_update() {
        let scenario = deployed_v1();
        scenario.write_dest("stray.txt", "mine");

        let (_, diff) = run(zip_data(&scenario, 2, "v1.zip"));

        scenario.assert_file_not_exists("stray.txt");
        scenario.assert_file_content(".deployments/2/backup/stray.txt", "mine");
        assert!(diff.deleted().contains("stray.txt"));
    }

    #[test]
    fn test_files_and_directories_compliance_leaves_unrelated_top_level_names() {
        let scenario = TestDeployment::new();
        scenario.zip("v1.zip", &[("dir/", ""), ("dir/a.txt", "a1")]);
        let data = |id| {
            let properties = props(id).with_compliance(DestinationComplianceMode::FilesAndDirectories);
            DeploymentData::builder(properties, scenario.source(), scenario.destination())
                .zip("v1.zip")
                .build()
                .unwrap()
        };
        run(data(1));
        scenario.write_dest("stray.txt", "mine");
        scenario.write_dest("dir/extra.txt", "extra");

        let (_, diff) = run(data(2));

        scenario.assert_file_content("stray.txt", "mine");
        scenario.assert_file_not_exists("dir/extra.txt");
        scenario.assert_file_content(".deployments/2/backup/dir/extra.txt", "extra");
        assert!(!diff.deleted().contains("stray.txt"));
    }
}

mod dry_run_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_dry_run_reports_the_same_as_a_real_run_without_side_effects() {
        let scenario = deployed_v1();
        scenario.write_dest("b.txt", "manual");
        scenario.write_dest("stray.txt", "mine");
        scenario.zip("v2.zip", &[("b.txt", "b2"), ("c.txt", "c2")]);
        let before = scenario.tree();

        let mut dry_diff = DeployDifferences::new();
        let dry_map = Deployer::new(zip_data(&scenario, 2, "v2.zip"))
            .unwrap()
            .dry_run(&mut dry_diff)
            .unwrap();

        assert_eq!(scenario.tree(), before);

        let (map, diff) = run(zip_data(&scenario, 2, "v2.zip"));
        assert_eq!(dry_map, map);
        assert_eq!(dry_diff, diff);
    }

    #[test]
    fn test_dry_run_of_initial_deployment_touches_nothing() {
        let scenario = TestDeployment::new();
        scenario.zip("v1.zip", &[("dir/", ""), ("dir/a.txt", "a1")]);
        scenario.write_dest("stray.txt", "mine");
        let before = scenario.tree();

        let mut diff = DeployDifferences::new();
        let map = Deployer::new(zip_data(&scenario, 1, "v1.zip"))
            .unwrap()
            .dry_run(&mut diff)
            .unwrap();

        assert_eq!(scenario.tree(), before);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["dir/a.txt"]);
        assert!(diff.added().contains("dir/a.txt"));
        assert!(diff.backed_up().contains_key("stray.txt"));
    }

    /// Dry-run `data`, check nothing on disk moved, then run it for real
    /// and check both runs reported the same thing.
    fn assert_dry_run_matches_real_run(scenario: &TestDeployment, data: impl Fn() -> DeploymentData) -> DeployDifferences {
        let before = scenario.tree();

        let mut dry_diff = DeployDifferences::new();
        let dry_map = Deployer::new(data()).unwrap().dry_run(&mut dry_diff).unwrap();
        assert_eq!(scenario.tree(), before);

        let (map, diff) = run(data());
        assert_eq!(dry_map, map);
        assert_eq!(dry_diff, diff);
        diff
    }

    #[test]
    fn test_dry_run_matches_real_run_for_preserved_manual_change() {
        let scenario = deployed_v1();
        scenario.write_dest("b.txt", "manual");

        let diff = assert_dry_run_matches_real_run(&scenario, || zip_data(&scenario, 2, "v1.zip"));

        scenario.assert_file_content("b.txt", "manual");
        assert!(diff.backed_up().is_empty());
        assert!(!diff.was_cleaned());
    }

    #[test]
    fn test_dry_run_matches_real_run_for_clean_over_manual_change() {
        let scenario = deployed_v1();
        scenario.write_dest("b.txt", "manual");
        scenario.zip("v2.zip", &[("dir/", ""), ("dir/a.txt", "a1"), ("b.txt", "b2")]);
        let data = || {
            DeploymentData::builder(props(2), scenario.source(), scenario.destination())
                .zip("v2.zip")
                .clean(true)
                .build()
                .unwrap()
        };

        let diff = assert_dry_run_matches_real_run(&scenario, data);

        scenario.assert_file_content("b.txt", "b2");
        assert!(diff.changed().contains("b.txt"));
        assert!(diff.backed_up().contains_key("b.txt"));
        assert!(diff.was_cleaned());
    }

    #[test]
    fn test_dry_run_matches_real_run_for_clean_over_unmanaged_file() {
        let scenario = deployed_v1();
        scenario.write_dest("stray.txt", "mine");
        let data = || {
            DeploymentData::builder(props(2), scenario.source(), scenario.destination())
                .zip("v1.zip")
                .clean(true)
                .build()
                .unwrap()
        };

        let diff = assert_dry_run_matches_real_run(&scenario, data);

        scenario.assert_file_not_exists("stray.txt");
        scenario.assert_file_content(".deployments/2/backup/stray.txt", "mine");
        assert!(diff.deleted().contains("stray.txt"));
        assert!(diff.backed_up().contains_key("stray.txt"));
    }
}

mod clean_and_ignore_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn data(scenario: &TestDeployment, id: i32, clean: bool) -> DeploymentData {
        DeploymentData::builder(props(id), scenario.source(), scenario.destination())
            .zip("v1.zip")
            .ignore_pattern(PathPattern::new("logs").unwrap())
            .clean(clean)
            .build()
            .unwrap()
    }

    #[test]
    fn test_ignored_paths_are_reported_and_left_alone() {
        let scenario = deployed_v1();
        scenario.write_dest("logs/app.log", "log line");

        let (map, diff) = run(data(&scenario, 2, false));

        scenario.assert_file_content("logs/app.log", "log line");
        assert!(diff.ignored().contains("logs"));
        assert!(!map.contains_key("logs/app.log"));
        assert!(!diff.was_cleaned());
    }

    #[test]
    fn test_clean_keeps_ignored_content_and_redeploys() {
        let scenario = deployed_v1();
        scenario.write_dest("logs/app.log", "log line");
        scenario.write_dest("b.txt", "manual");
        scenario.write_dest("stray.txt", "mine");

        let (_, diff) = run(data(&scenario, 2, true));

        scenario.assert_file_content("logs/app.log", "log line");
        assert!(diff.ignored().contains("logs"));
        scenario.assert_file_content("b.txt", "b1");
        scenario.assert_file_content(".deployments/2/backup/b.txt", "manual");
        scenario.assert_file_not_exists("stray.txt");
        scenario.assert_file_content("dir/a.txt", "a1");
        assert!(diff.was_cleaned());
        assert!(diff.errors().is_empty(), "errors: {:?}", diff.errors());
    }

    #[test]
    fn test_clean_empties_a_directory_around_a_nested_ignored_path() {
        let scenario = deployed_v1();
        scenario.write_dest("dir/cache/entry.bin", "cached");
        scenario.write_dest("dir/scratch.txt", "scratch");
        let data = DeploymentData::builder(props(2), scenario.source(), scenario.destination())
            .zip("v1.zip")
            .ignore_pattern(PathPattern::new("dir/cache").unwrap())
            .clean(true)
            .build()
            .unwrap();

        let (map, diff) = run(data);

        scenario.assert_file_content("dir/cache/entry.bin", "cached");
        scenario.assert_file_not_exists("dir/scratch.txt");
        scenario.assert_file_content("dir/a.txt", "a1");
        assert!(diff.ignored().contains("dir/cache"));
        assert!(!map.contains_key("dir/cache/entry.bin"));
    }
}

mod raw_file_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_relative_raw_file_is_copied_into_place() {
        let scenario = TestDeployment::new();
        scenario.write_source("config/app.properties", "port=80");

        let data = DeploymentData::builder(props(1), scenario.source(), scenario.destination())
            .raw_file("config/app.properties", "conf/app.properties")
            .build()
            .unwrap();
        let (map, _) = run(data);

        scenario.assert_file_content("conf/app.properties", "port=80");
        assert_eq!(
            map.get("conf/app.properties"),
            Some(compute_content_checksum("port=80").as_str())
        );
    }

    #[test]
    fn test_realized_raw_file_is_expanded_and_recorded() {
        let scenario = TestDeployment::new();
        scenario.write_source("app.conf", "listen=@@port@@ host=@@unknown@@");

        let data = DeploymentData::builder(props(1), scenario.source(), scenario.destination())
            .raw_file("app.conf", "app.conf")
            .realize_raw_file("app.conf")
            .template_engine(TemplateEngine::default().with_token("port", "8080"))
            .build()
            .unwrap();
        let (map, diff) = run(data);

        let expected = "listen=8080 host=@@unknown@@";
        scenario.assert_file_content("app.conf", expected);
        assert_eq!(diff.realized().get("app.conf").map(String::as_str), Some(expected));
        assert_eq!(map.get("app.conf"), Some(compute_content_checksum(expected).as_str()));
    }

    #[test]
    fn test_realized_archive_entries_match_pattern_only() {
        let scenario = TestDeployment::new();
        scenario.zip("v1.zip", &[("conf/app.conf", "port=@@port@@"), ("README", "@@port@@")]);

        let data = DeploymentData::builder(props(1), scenario.source(), scenario.destination())
            .zip("v1.zip")
            .zip_realize_pattern("v1.zip", PathPattern::new("conf/.*").unwrap())
            .template_engine(TemplateEngine::default().with_token("port", "9090"))
            .build()
            .unwrap();
        let (_, diff) = run(data);

        scenario.assert_file_content("conf/app.conf", "port=9090");
        scenario.assert_file_content("README", "@@port@@");
        assert_eq!(diff.realized().len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_external_raw_file_is_backed_up_outside_the_destination_tree() {
        let scenario = TestDeployment::new();
        let external = scenario.root().join("etc/app.conf");
        scenario.write_source("app.conf", "v1");
        let data = |id: i32| {
            DeploymentData::builder(props(id), scenario.source(), scenario.destination())
                .raw_file("app.conf", &external)
                .build()
                .unwrap()
        };

        run(data(1));
        assert_eq!(fs::read_to_string(&external).unwrap(), "v1");

        fs::write(&external, "manual").unwrap();
        scenario.write_source("app.conf", "v2");
        let (map, diff) = run(data(2));

        assert_eq!(fs::read_to_string(&external).unwrap(), "v2");
        let (key, backup) = diff.backed_up().iter().next().unwrap();
        assert!(key.starts_with('/'), "external key should be absolute: {key}");
        assert!(backup.contains("/.deployments/2/ext-backup/"), "got {backup}");
        assert_eq!(fs::read_to_string(backup).unwrap(), "manual");
        assert!(map.contains_key(key));
    }

    #[cfg(unix)]
    #[rstest]
    #[case::escaping_relative(false)]
    #[case::absolute(true)]
    fn test_external_raw_file_is_restored_on_revert(#[case] absolute: bool) {
        let scenario = TestDeployment::new();
        let external = scenario.root().join("outside/app.conf");
        let target = if absolute {
            external.clone()
        } else {
            PathBuf::from("../outside/app.conf")
        };
        let data = |id: i32| {
            DeploymentData::builder(props(id), scenario.source(), scenario.destination())
                .raw_file("app.conf", &target)
                .build()
                .unwrap()
        };

        scenario.write_source("app.conf", "v1");
        let (map, _) = run(data(1));
        assert_eq!(fs::read_to_string(&external).unwrap(), "v1");
        let key = map.keys().next().unwrap().to_string();
        assert!(key.starts_with('/') && key.ends_with("/outside/app.conf"), "got {key}");
        scenario.assert_file_not_exists("outside");

        fs::write(&external, "manual").unwrap();
        scenario.write_source("app.conf", "v2");
        let (_, diff) = run(data(2));
        assert_eq!(fs::read_to_string(&external).unwrap(), "v2");
        assert!(diff.backed_up()[&key].contains("/.deployments/2/ext-backup/"));

        scenario.write_source("app.conf", "v1");
        let deployer = Deployer::new(data(3)).unwrap();
        let mut diff = DeployDifferences::new();
        let map = deployer
            .redeploy_and_restore_backup_files(&mut diff, false, false)
            .unwrap();

        assert_eq!(fs::read_to_string(&external).unwrap(), "manual");
        assert!(diff.restored().contains_key(&key));
        assert_eq!(map.get(&key), Some(compute_content_checksum("manual").as_str()));
    }
}

mod compressed_archive_tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use bundle_fs::checksum::compute_file_checksum;

    #[test]
    fn test_compressed_archive_is_copied_as_is() {
        let scenario = TestDeployment::new();
        let zip = scenario.zip("lib/app.zip", &[("a.txt", "a")]);

        let data = DeploymentData::builder(props(1), scenario.source(), scenario.destination())
            .compressed_zip("lib/app.zip", None)
            .build()
            .unwrap();
        let (map, _) = run(data);

        scenario.assert_file_exists("lib/app.zip");
        scenario.assert_file_not_exists("a.txt");
        let hashcode = compute_file_checksum(&zip).unwrap();
        assert_eq!(map.get("lib/app.zip"), Some(hashcode.as_str()));
    }

    #[test]
    fn test_compressed_archive_goes_into_requested_directory() {
        let scenario = TestDeployment::new();
        scenario.zip("app.zip", &[("a.txt", "a")]);

        let data = DeploymentData::builder(props(1), scenario.source(), scenario.destination())
            .compressed_zip("app.zip", Some("deploy".into()))
            .build()
            .unwrap();
        let (map, _) = run(data);

        scenario.assert_file_exists("deploy/app.zip");
        assert!(map.contains_key("deploy/app.zip"));
    }

    #[test]
    fn test_realized_compressed_archive_is_recorded() {
        let scenario = TestDeployment::new();
        scenario.zip("app.zip", &[("conf/", ""), ("conf/app.conf", "port=@@port@@"), ("lib.jar", "jar")]);
        let data = || {
            DeploymentData::builder(props(1), scenario.source(), scenario.destination())
                .compressed_zip("app.zip", None)
                .zip_realize_pattern("app.zip", PathPattern::new("conf/.*").unwrap())
                .template_engine(TemplateEngine::default().with_token("port", "8080"))
                .build()
                .unwrap()
        };

        let mut dry_diff = DeployDifferences::new();
        Deployer::new(data()).unwrap().dry_run(&mut dry_diff).unwrap();
        let (map, diff) = run(data());

        assert_eq!(diff.realized()["app.zip"], "conf/app.conf");
        assert_eq!(dry_diff.realized(), diff.realized());
        let installed = compute_file_checksum(&scenario.dest_path("app.zip")).unwrap();
        assert_eq!(map.get("app.zip"), Some(installed.as_str()));
        scenario.assert_file_not_exists("conf/app.conf");
    }
}

mod partial_failure_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_failed_raw_file_is_recorded_and_deployment_completes() {
        let scenario = TestDeployment::new();
        scenario.zip("v1.zip", &[("dir/", ""), ("dir/a.txt", "a1")]);
        scenario.write_source("app.conf", "port=80");
        let data = |id: i32, with_raw: bool| {
            let properties = props(id).with_compliance(DestinationComplianceMode::FilesAndDirectories);
            let mut builder = DeploymentData::builder(properties, scenario.source(), scenario.destination()).zip("v1.zip");
            if with_raw {
                builder = builder.raw_file("app.conf", "blocked/app.conf");
            }
            builder.build().unwrap()
        };
        run(data(1, false));
        // A plain file where the raw file needs a directory
        scenario.write_dest("blocked", "occupant");

        let deployer = Deployer::new(data(2, true)).unwrap();
        let mut diff = DeployDifferences::new();
        let map = deployer.deploy(&mut diff).unwrap();

        assert!(diff.errors().contains_key("blocked/app.conf"), "errors: {:?}", diff.errors());
        assert!(!map.contains_key("blocked/app.conf"));
        scenario.assert_file_content("blocked", "occupant");
        scenario.assert_file_content("dir/a.txt", "a1");

        let metadata = deployer.metadata();
        assert_eq!(metadata.current_deployment_properties().unwrap().deployment_id, 2);
        assert_eq!(metadata.current_deployment_file_hashcodes().unwrap(), map);
    }

    #[cfg(unix)]
    #[test]
    fn test_unremovable_content_is_recorded_and_clean_deployment_completes() {
        use std::os::unix::fs::PermissionsExt;

        let scenario = deployed_v1();
        scenario.write_dest("locked/inner.txt", "stuck");
        let locked = scenario.dest_path("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();
        let writable = locked.join("writable");
        if fs::write(&writable, "").is_ok() {
            // Privileged users ignore directory permissions
            fs::remove_file(&writable).unwrap();
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }
        scenario.zip("v2.zip", &[("b.txt", "b1"), ("c.txt", "c2")]);
        let data = DeploymentData::builder(props(2), scenario.source(), scenario.destination())
            .zip("v2.zip")
            .clean(true)
            .build()
            .unwrap();

        let deployer = Deployer::new(data).unwrap();
        let mut diff = DeployDifferences::new();
        let result = deployer.deploy(&mut diff);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let map = result.unwrap();
        assert!(
            diff.errors().keys().any(|key| key.starts_with("locked")),
            "errors: {:?}",
            diff.errors()
        );
        scenario.assert_file_content("c.txt", "c2");
        assert!(map.contains_key("c.txt"));
        assert!(diff.was_cleaned());
        assert_eq!(
            deployer.metadata().current_deployment_properties().unwrap().deployment_id,
            2
        );
    }
}

mod revert_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_revert_restores_files_backed_up_by_current_deployment() {
        let scenario = deployed_v1();
        scenario.write_dest("b.txt", "manual");
        scenario.zip("v2.zip", &[("dir/", ""), ("dir/a.txt", "a1"), ("b.txt", "b2")]);
        run(zip_data(&scenario, 2, "v2.zip"));
        scenario.assert_file_content("b.txt", "b2");

        let deployer = Deployer::new(zip_data(&scenario, 3, "v1.zip")).unwrap();
        let mut diff = DeployDifferences::new();
        let map = deployer
            .redeploy_and_restore_backup_files(&mut diff, false, false)
            .unwrap();

        scenario.assert_file_content("b.txt", "manual");
        assert!(diff.restored().contains_key("b.txt"));
        assert_eq!(map.get("b.txt"), Some(compute_content_checksum("manual").as_str()));

        let metadata = deployer.metadata();
        assert_eq!(metadata.current_deployment_properties().unwrap().deployment_id, 3);
        assert_eq!(metadata.deployment_file_hashcodes(3).unwrap(), map);
    }

    #[test]
    fn test_revert_dry_run_reports_restores_without_writing() {
        let scenario = deployed_v1();
        scenario.write_dest("b.txt", "manual");
        scenario.zip("v2.zip", &[("dir/", ""), ("dir/a.txt", "a1"), ("b.txt", "b2")]);
        run(zip_data(&scenario, 2, "v2.zip"));
        let before = scenario.tree();

        let mut diff = DeployDifferences::new();
        Deployer::new(zip_data(&scenario, 3, "v1.zip"))
            .unwrap()
            .redeploy_and_restore_backup_files(&mut diff, false, true)
            .unwrap();

        assert_eq!(scenario.tree(), before);
        assert!(diff.restored().contains_key("b.txt"));
    }

    #[test]
    fn test_revert_of_unmanaged_destination_is_an_initial_deployment() {
        let scenario = TestDeployment::new();
        scenario.zip("v1.zip", &[("b.txt", "b1")]);

        let deployer = Deployer::new(zip_data(&scenario, 1, "v1.zip")).unwrap();
        let mut diff = DeployDifferences::new();
        deployer
            .redeploy_and_restore_backup_files(&mut diff, false, false)
            .unwrap();

        scenario.assert_file_content("b.txt", "b1");
        assert!(diff.restored().is_empty());
        assert!(deployer.is_destination_directory_managed());
    }
}

mod history_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_previous_deployment_is_tracked_per_revision() {
        let scenario = deployed_v1();
        run(zip_data(&scenario, 2, "v1.zip"));

        let deployer = Deployer::new(zip_data(&scenario, 2, "v1.zip")).unwrap();
        let metadata = deployer.metadata();
        assert_eq!(metadata.previous_deployment_properties(1).unwrap(), None);
        assert_eq!(
            metadata.previous_deployment_properties(2).unwrap().map(|p| p.deployment_id),
            Some(1)
        );

        // Redeploying the same revision keeps the original predecessor
        run(zip_data(&scenario, 2, "v1.zip"));
        assert_eq!(
            metadata.previous_deployment_properties(2).unwrap().map(|p| p.deployment_id),
            Some(1)
        );
    }
}

mod disk_usage_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_estimate_counts_archive_entries_and_raw_files() {
        let scenario = TestDeployment::new();
        scenario.zip("v1.zip", &[("dir/", ""), ("dir/a.txt", "12345"), ("b.txt", "123")]);
        scenario.write_source("raw.txt", "1234567");

        let data = DeploymentData::builder(props(1), scenario.source(), scenario.destination())
            .zip("v1.zip")
            .raw_file("raw.txt", "raw.txt")
            .build()
            .unwrap();
        let usage = Deployer::new(data).unwrap().estimate_disk_usage().unwrap();

        assert_eq!(usage.disk_usage, 15);
        assert_eq!(usage.file_count, 3);
        assert!(usage.fits());
    }

    #[test]
    fn test_deployment_larger_than_the_partition_is_refused() {
        let scenario = TestDeployment::new();
        let huge = scenario.source().join("huge.bin");
        let file = fs::File::create(&huge).unwrap();
        if file.set_len(1 << 42).is_err() {
            return;
        }

        let data = DeploymentData::builder(props(1), scenario.source(), scenario.destination())
            .raw_file("huge.bin", "huge.bin")
            .build()
            .unwrap();
        let deployer = Deployer::new(data).unwrap();
        if deployer.estimate_disk_usage().unwrap().fits() {
            return;
        }

        let mut diff = DeployDifferences::new();
        let result = deployer.deploy(&mut diff);
        assert!(matches!(result, Err(Error::InsufficientDiskSpace { .. })), "got {result:?}");
        scenario.assert_file_not_exists("huge.bin");
    }
}
