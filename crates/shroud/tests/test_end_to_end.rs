#![allow(clippy::disallowed_methods)]

use std::fs;

use shroud::{
    Orchestrator, RunOptions,
    config::{Config, PROJECT_CONFIG_FILE},
    mapping::simple_name,
    matcher::MatchPolicy,
    names::{RandomIdentifiers, is_opaque_identifier},
};
use tempfile::TempDir;

const MANIFEST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android"
    package="com.example.app">
    <application android:label="Example">
        <activity android:name=".MainActivity">
            <intent-filter>
                <action android:name="android.intent.action.MAIN" />
            </intent-filter>
        </activity>
    </application>
</manifest>
"#;

const MAIN_ACTIVITY: &str = "\
package com.example.app;

public class MainActivity extends Activity {
    private static final String TAG = \"MainActivity\";
}
";

/// A project laid out the way Android Studio creates it
fn android_project() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let main = temp_dir.path().join("app/src/main");
    let package_dir = main.join("java/com/example/app");
    fs::create_dir_all(&package_dir).unwrap();
    fs::write(main.join("AndroidManifest.xml"), MANIFEST).unwrap();
    fs::write(package_dir.join("MainActivity.java"), MAIN_ACTIVITY).unwrap();
    temp_dir
}

#[test]
fn test_activity_is_renamed_everywhere() {
    let project = android_project();
    let config = Config::load_from(project.path(), None, None).unwrap();

    let report = Orchestrator::new(config, project.path())
        .run(&mut RandomIdentifiers::default(), RunOptions::default())
        .unwrap();
    assert!(report.is_success());

    let opaque = report
        .mapping
        .get("com.example.app.MainActivity")
        .expect("MainActivity should be mapped")
        .to_owned();
    let opaque_simple = simple_name(&opaque);
    assert!(opaque.starts_with("com.example.app."));
    assert!(is_opaque_identifier(opaque_simple));

    let manifest = fs::read_to_string(project.path().join("app/src/main/AndroidManifest.xml")).unwrap();
    assert!(manifest.contains(&format!("android:name=\"{opaque}\"")));
    assert!(manifest.contains("android.intent.action.MAIN"));

    let package_dir = project.path().join("app/src/main/java/com/example/app");
    assert!(!package_dir.join("MainActivity.java").exists());
    let renamed = package_dir.join(format!("{opaque_simple}.java"));
    let source = fs::read_to_string(&renamed).unwrap();
    assert!(source.contains(&format!("public class {opaque_simple} extends Activity")));
    assert!(!source.contains("MainActivity"));

    assert!(project.path().join(".shroud/mapping.toml").is_file());
}

#[test]
fn test_second_run_changes_nothing() {
    let project = android_project();
    let config = Config::load_from(project.path(), None, None).unwrap();
    let orchestrator = Orchestrator::new(config, project.path());

    let first = orchestrator
        .run(&mut RandomIdentifiers::default(), RunOptions::default())
        .unwrap();
    let second = orchestrator
        .run(&mut RandomIdentifiers::default(), RunOptions::default())
        .unwrap();

    assert!(second.is_success());
    assert!(!second.resumed);
    assert_eq!(second.mapping, first.mapping);
    assert!(second.rewritten.is_empty());
    assert!(second.renamed.is_empty());
    assert_eq!(second.unchanged, 1);
}

#[test]
fn test_project_config_is_honored() {
    let project = android_project();
    fs::write(
        project.path().join(PROJECT_CONFIG_FILE),
        "match-policy = \"substring\"\ncomponents = [\"service\"]\n",
    )
    .unwrap();

    let config = Config::load_from(project.path(), None, None).unwrap();
    assert_eq!(config.match_policy, MatchPolicy::Substring);

    let report = Orchestrator::new(config, project.path())
        .run(&mut RandomIdentifiers::default(), RunOptions::default())
        .unwrap();

    // only services are renamed and the project declares none
    assert!(report.mapping.is_empty());
    assert!(
        project
            .path()
            .join("app/src/main/java/com/example/app/MainActivity.java")
            .exists()
    );
}
