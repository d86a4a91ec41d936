//! Tests for manifest scanning and rewriting

use std::collections::VecDeque;

use pretty_assertions::assert_eq;

use super::*;
use crate::names::{RandomIdentifiers, is_opaque_identifier};

/// Hands out a fixed list of identifiers
struct Scripted(VecDeque<&'static str>);

impl IdentifierSource for Scripted {
    fn next_identifier(&mut self) -> Result<String> {
        Ok(self.0.pop_front().unwrap_or("zz").to_owned())
    }
}

fn scripted(names: &[&'static str]) -> Scripted {
    Scripted(names.iter().copied().collect())
}

const MANIFEST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android"
    package="com.example.app">
    <!-- location permissions -->
    <uses-permission android:name="android.permission.ACCESS_FINE_LOCATION" />
    <application android:label="@string/app_name">
        <activity android:name=".MainActivity">
            <intent-filter>
                <action android:name="android.intent.action.MAIN" />
            </intent-filter>
        </activity>
        <activity android:name=".tasks.TasksActivity" />
        <service android:name="com.example.app.data.GeofenceIntentService" />
        <receiver android:name="BootReceiver" android:exported="false" />
        <provider android:name=".data.TaskProvider" android:authorities="com.example.app" />
    </application>
</manifest>
"#;

fn document(source: &str) -> ManifestDocument {
    ManifestDocument::parse(Path::new("AndroidManifest.xml"), source).unwrap()
}

#[test]
fn test_components_are_resolved_against_package() {
    let doc = document(MANIFEST);
    assert_eq!(doc.package(), Some("com.example.app"));

    let names: Vec<_> = doc
        .components(&ComponentKind::ALL)
        .unwrap()
        .into_iter()
        .map(|c| (c.kind, c.qualified_name))
        .collect();
    assert_eq!(
        names,
        vec![
            (ComponentKind::Activity, "com.example.app.MainActivity".to_owned()),
            (ComponentKind::Activity, "com.example.app.tasks.TasksActivity".to_owned()),
            (
                ComponentKind::Service,
                "com.example.app.data.GeofenceIntentService".to_owned()
            ),
            (ComponentKind::Receiver, "com.example.app.BootReceiver".to_owned()),
            (ComponentKind::Provider, "com.example.app.data.TaskProvider".to_owned()),
        ]
    );
}

#[test]
fn test_scan_builds_one_entry_per_component() {
    let scanner = ManifestScanner::default();
    let outcome = scanner
        .scan_document(document(MANIFEST), &mut RandomIdentifiers::default())
        .unwrap();

    assert_eq!(outcome.mapping.len(), 5);
    for (original, opaque) in outcome.mapping.iter() {
        assert_eq!(package_of(original), package_of(opaque));
        assert!(is_opaque_identifier(simple_name(opaque)), "{opaque}");
    }
}

#[test]
fn test_scan_rewrites_names_in_place() {
    let scanner = ManifestScanner::default();
    let outcome = scanner
        .scan_document(
            document(MANIFEST),
            &mut scripted(&["a1", "b2", "c3", "d4", "e5"]),
        )
        .unwrap();

    assert_eq!(
        outcome.mapping.get("com.example.app.MainActivity"),
        Some("com.example.app.a1")
    );
    assert_eq!(
        outcome.mapping.get("com.example.app.tasks.TasksActivity"),
        Some("com.example.app.tasks.b2")
    );

    let rendered = String::from_utf8(outcome.document.render().unwrap()).unwrap();
    assert!(rendered.contains(r#"android:name="com.example.app.a1""#));
    assert!(rendered.contains(r#"android:name="com.example.app.tasks.b2""#));
    assert!(rendered.contains(r#"android:name="com.example.app.data.c3""#));
    assert!(rendered.contains(r#"android:name="com.example.app.d4""#));
    assert!(rendered.contains(r#"android:name="com.example.app.data.e5""#));
    // untouched attributes and unrelated elements survive
    assert!(rendered.contains(r#"android:exported="false""#));
    assert!(rendered.contains(r#"android:authorities="com.example.app""#));
    assert!(rendered.contains("android.intent.action.MAIN"));
    assert!(rendered.contains("android.permission.ACCESS_FINE_LOCATION"));
    assert!(rendered.contains("<!-- location permissions -->"));
    assert!(!rendered.contains("MainActivity"));
}

#[test]
fn test_rendered_manifest_round_trips() {
    let scanner = ManifestScanner::default();
    let outcome = scanner
        .scan_document(document(MANIFEST), &mut RandomIdentifiers::default())
        .unwrap();
    let rendered = String::from_utf8(outcome.document.render().unwrap()).unwrap();

    let reparsed = document(&rendered);
    let names: Vec<_> = reparsed
        .components(&ComponentKind::ALL)
        .unwrap()
        .into_iter()
        .map(|c| c.qualified_name)
        .collect();
    assert_eq!(names.len(), 5);
    for name in &names {
        assert!(outcome.mapping.is_opaque(name), "{name} is not opaque");
        assert!(!outcome.mapping.contains(name));
    }
}

#[test]
fn test_apply_is_noop_on_rewritten_manifest() {
    let scanner = ManifestScanner::default();
    let outcome = scanner
        .scan_document(document(MANIFEST), &mut RandomIdentifiers::default())
        .unwrap();
    let rendered = String::from_utf8(outcome.document.render().unwrap()).unwrap();

    let mut reparsed = document(&rendered);
    let rewritten = reparsed.apply(&outcome.mapping, &ComponentKind::ALL).unwrap();
    assert_eq!(rewritten, 0);
}

#[test]
fn test_only_recognized_kinds_are_mapped() {
    let scanner = ManifestScanner::new(vec![ComponentKind::Service]);
    let outcome = scanner
        .scan_document(document(MANIFEST), &mut scripted(&["s1"]))
        .unwrap();
    assert_eq!(outcome.mapping.len(), 1);
    assert_eq!(
        outcome.mapping.get("com.example.app.data.GeofenceIntentService"),
        Some("com.example.app.data.s1")
    );
    let rendered = String::from_utf8(outcome.document.render().unwrap()).unwrap();
    assert!(rendered.contains(r#"android:name=".MainActivity""#));
}

#[test]
fn test_duplicate_declaration_reuses_name() {
    let source = r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android" package="a.b">
    <application>
        <activity android:name=".Main" />
        <activity android:name="a.b.Main" />
    </application>
</manifest>"#;
    let outcome = ManifestScanner::default()
        .scan_document(document(source), &mut scripted(&["x1", "x2"]))
        .unwrap();
    assert_eq!(outcome.mapping.len(), 1);
    let rendered = String::from_utf8(outcome.document.render().unwrap()).unwrap();
    assert_eq!(rendered.matches(r#"android:name="a.b.x1""#).count(), 2);
}

#[test]
fn test_collision_is_kept_as_generated() {
    let source = r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android" package="a.b">
    <application>
        <activity android:name=".One" />
        <activity android:name=".Two" />
    </application>
</manifest>"#;
    let outcome = ManifestScanner::default()
        .scan_document(document(source), &mut scripted(&["same", "same"]))
        .unwrap();
    assert_eq!(outcome.mapping.get("a.b.One"), Some("a.b.same"));
    assert_eq!(outcome.mapping.get("a.b.Two"), Some("a.b.same"));
}

#[test]
fn test_render_adds_declaration_when_missing() {
    let doc = document(r#"<manifest package="a.b"><application/></manifest>"#);
    let rendered = String::from_utf8(doc.render().unwrap()).unwrap();
    assert!(rendered.starts_with("<?xml"));
    assert!(rendered.ends_with('\n'));
}

#[test]
fn test_relative_name_without_package_fails() {
    let doc = document(
        r#"<manifest><application><activity name=".Main"/></application></manifest>"#,
    );
    let err = doc.components(&ComponentKind::ALL).unwrap_err();
    assert!(matches!(err, ObfuscateError::ManifestParse { .. }));
}

#[test]
fn test_component_without_name_fails() {
    let doc = document(r#"<manifest package="a.b"><application><service/></application></manifest>"#);
    let err = ManifestScanner::default()
        .scan_document(doc, &mut scripted(&[]))
        .unwrap_err();
    assert!(matches!(err, ObfuscateError::ManifestParse { .. }));
}

#[test]
fn test_malformed_manifest_fails() {
    let err = ManifestDocument::parse(
        Path::new("AndroidManifest.xml"),
        "<manifest package=\"a.b\"><application></manifest>",
    )
    .unwrap_err();
    assert!(err.is_manifest_error());

    let err = ManifestDocument::parse(Path::new("AndroidManifest.xml"), "not xml").unwrap_err();
    assert!(err.is_manifest_error());

    let err = ManifestDocument::parse(
        Path::new("AndroidManifest.xml"),
        "<manifest package=\"a.b\"><application>",
    )
    .unwrap_err();
    assert!(err.is_manifest_error());
}

#[test]
fn test_missing_manifest_fails_without_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("AndroidManifest.xml");
    let err = ManifestScanner::default()
        .scan(&path, &mut RandomIdentifiers::default())
        .unwrap_err();
    assert!(matches!(err, ObfuscateError::ManifestParse { .. }));
    assert!(!path.exists());
}

#[test]
fn test_write_replaces_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("AndroidManifest.xml");
    std::fs::write(&path, MANIFEST).unwrap();

    let outcome = ManifestScanner::default()
        .scan(&path, &mut scripted(&["a1", "b2", "c3", "d4", "e5"]))
        .unwrap();
    // scanning alone leaves the file as it was
    assert_eq!(std::fs::read_to_string(&path).unwrap(), MANIFEST);

    outcome.document.write().unwrap();
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains(r#"android:name="com.example.app.a1""#));
    assert!(!written.contains(".MainActivity"));
}

#[test]
fn test_activity_alias_target_follows_rename() {
    let source = r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android" package="a.b">
    <application>
        <activity android:name=".Main" />
        <activity-alias android:name=".Launcher" android:targetActivity=".Main" />
        <activity-alias android:name=".Other" android:targetActivity="c.d.External" />
    </application>
</manifest>"#;
    let outcome = ManifestScanner::default()
        .scan_document(document(source), &mut scripted(&["x1"]))
        .unwrap();

    assert_eq!(outcome.mapping.len(), 1);
    assert!(outcome.document.is_modified());
    let rendered = String::from_utf8(outcome.document.render().unwrap()).unwrap();
    assert!(rendered.contains(r#"android:targetActivity="a.b.x1""#));
    // the alias's own name is not a class
    assert!(rendered.contains(r#"android:name=".Launcher""#));
    assert!(rendered.contains(r#"android:targetActivity="c.d.External""#));
}

#[test]
fn test_rescan_keeps_earlier_names() {
    let first = ManifestScanner::default()
        .scan_document(document(MANIFEST), &mut scripted(&["a1", "b2", "c3", "d4", "e5"]))
        .unwrap();
    let rendered = String::from_utf8(first.document.render().unwrap()).unwrap();

    let second = ManifestScanner::default()
        .scan_document_extending(document(&rendered), &mut scripted(&[]), &first.mapping)
        .unwrap();

    assert_eq!(second.mapping, first.mapping);
    assert!(!second.document.is_modified());
}
