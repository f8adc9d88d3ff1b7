use std::fs;
use std::path::Path;

use serde_json::Value;
use tagscene_core::document::{Background, Circle, Document, Entity, Label, Rectangle};
use tagscene_core::geometry::Point2;
use tagscene_io::{
    IoError, JsonProjectFormat, ProjectLoader, ProjectSaver, RestoreOptions, probe_background,
};
use tempfile::tempdir;

fn write_png(path: &Path, width: u32, height: u32) {
    image::RgbImage::new(width, height)
        .save(path)
        .expect("write png");
}

fn sample_document() -> Document {
    let mut document = Document::new();
    document.add_entity(Entity::Circle(Circle::new("A", Point2::new(100.0, 120.0))));
    document.add_entity(Entity::Label(Label::primary("A", 1, Point2::new(140.0, 100.0))));
    document.add_entity(Entity::Label2(Label::secondary(
        "A",
        2,
        Point2::new(140.0, 140.0),
    )));
    document.add_entity(Entity::Rectangle(Rectangle::new(
        "A",
        3,
        "door frame",
        Point2::new(10.5, 20.25),
        64.0,
        32.0,
    )));
    document
}

fn summary(document: &Document) -> Vec<(String, String, f64, f64)> {
    document
        .entities()
        .map(|(_, entity)| {
            let position = entity.position();
            (
                entity.kind().to_string(),
                entity.id().to_string(),
                position.x(),
                position.y(),
            )
        })
        .collect()
}

#[test]
fn project_round_trips_through_file() {
    let dir = tempdir().unwrap();
    let background_path = dir.path().join("scan.png");
    write_png(&background_path, 64, 48);

    let mut document = sample_document();
    document.set_background(probe_background(&background_path).unwrap());

    let project_path = dir.path().join("scene.json");
    let format = JsonProjectFormat::new();
    format.save(&document, &project_path).unwrap();

    let raw: Value = serde_json::from_str(&fs::read_to_string(&project_path).unwrap()).unwrap();
    let items = raw["items"].as_array().unwrap();
    assert_eq!(items.len(), 4);
    assert_eq!(items[2]["type"], "LABEL2");
    assert_eq!(items[2]["id"], "A.2**");
    assert_eq!(items[3]["rect_id"], "3");
    assert_eq!(items[3]["w"], 64.0);
    assert!(raw["background_image"].as_str().unwrap().ends_with("scan.png"));

    let project = format.load(&project_path).unwrap();
    let restored = project
        .build_document(Document::new(), &RestoreOptions::default(), |raw| {
            probe_background(Path::new(raw)).ok()
        })
        .unwrap();

    assert_eq!(summary(&restored), summary(&document));
    match restored.entities().last().map(|(_, entity)| entity) {
        Some(Entity::Rectangle(rect)) => {
            assert_eq!(rect.sub_id, 3);
            assert_eq!(rect.text, "door frame");
            assert!((rect.width - 64.0).abs() < 1e-9);
            assert!((rect.height - 32.0).abs() < 1e-9);
        }
        other => panic!("unexpected entity {other:?}"),
    }
    assert_eq!(restored.scene_bounds().width(), 64.0);
    assert_eq!(restored.scene_bounds().height(), 48.0);
}

#[test]
fn legacy_rectangle_fields_are_accepted() {
    let dir = tempdir().unwrap();
    let project_path = dir.path().join("legacy.json");
    fs::write(
        &project_path,
        r#"{
            "background_image": null,
            "items": [
                {"type": "CIRCLE", "x": 1, "y": 2, "id": "7"},
                {"type": "RECTANGLE", "x": 3, "y": 4, "id": "7", "rect_id": 12, "rect_text": "gate"}
            ]
        }"#,
    )
    .unwrap();

    let options = RestoreOptions {
        fallback_rectangle_width: 80.0,
        fallback_rectangle_height: 40.0,
    };
    let restored = JsonProjectFormat::new()
        .load(&project_path)
        .unwrap()
        .build_document(Document::new(), &options, |_| None)
        .unwrap();
    match restored.entities().nth(1).map(|(_, entity)| entity) {
        Some(Entity::Rectangle(rect)) => {
            assert_eq!(rect.compound_key(), "7.12.gate");
            assert_eq!(rect.width, 80.0);
            assert_eq!(rect.height, 40.0);
        }
        other => panic!("unexpected entity {other:?}"),
    }
    assert_eq!(restored.background(), &Background::Default);
}

#[test]
fn missing_background_falls_back_to_default() {
    let dir = tempdir().unwrap();
    let project_path = dir.path().join("scene.json");
    fs::write(
        &project_path,
        r#"{"background_image": "gone.png", "items": []}"#,
    )
    .unwrap();

    let project = JsonProjectFormat::new().load(&project_path).unwrap();
    let restored = project
        .build_document(Document::new(), &RestoreOptions::default(), |raw| {
            probe_background(&dir.path().join(raw)).ok()
        })
        .unwrap();
    assert_eq!(restored.background(), &Background::Default);
    assert_eq!(restored.scene_bounds().width(), 1000.0);
}

#[test]
fn unknown_item_type_fails_to_parse() {
    let dir = tempdir().unwrap();
    let project_path = dir.path().join("scene.json");
    fs::write(
        &project_path,
        r#"{"items": [{"type": "TRIANGLE", "x": 0, "y": 0, "id": "T"}]}"#,
    )
    .unwrap();
    let err = JsonProjectFormat::new().load(&project_path).unwrap_err();
    assert!(matches!(err, IoError::ParseError { .. }), "{err}");
}

#[test]
fn corrupt_and_missing_files_are_reported() {
    let dir = tempdir().unwrap();
    let corrupt = dir.path().join("corrupt.json");
    fs::write(&corrupt, "{ not json").unwrap();
    let format = JsonProjectFormat::new();
    assert!(matches!(
        format.load(&corrupt).unwrap_err(),
        IoError::ParseError { .. }
    ));
    assert!(matches!(
        format.load(&dir.path().join("absent.json")).unwrap_err(),
        IoError::ReadError { .. }
    ));
}

#[test]
fn unwritable_path_is_reported() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("missing-dir").join("scene.json");
    let err = JsonProjectFormat::new()
        .save(&sample_document(), &target)
        .unwrap_err();
    assert!(matches!(err, IoError::WriteError { .. }));
}

#[test]
fn probing_a_non_image_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    fs::write(&path, "plain text").unwrap();
    assert!(probe_background(&path).is_err());
}
