use std::fs;

use kestrel_blocks::config::{RuntimeConfig, RuntimeConfigOverrides};
use kestrel_blocks::harness::{load_fixture, run_fixture, HarnessFixture, InputAction};
use kestrel_blocks::value::Value;
use kestrel_blocks::{Runtime, SceneDescription};
use tempfile::tempdir;

const LEVEL_ONE: &str = r#"{
    "name": "level1",
    "variables": [
        { "id": "score", "name": "score", "type": "integer", "scope": "global" },
        { "id": "hp", "name": "hp", "type": "integer", "scope": "local", "default": 3 }
    ],
    "costumes": [ { "id": "hero_idle", "name": "idle", "width": 32, "height": 32 } ],
    "sounds": [ { "id": "beep", "name": "beep" } ],
    "entities": [
        {
            "id": "hero",
            "costumes": ["hero_idle"],
            "program": [
                {
                    "type": "when_game_starts",
                    "statements": { "DO": [
                        { "type": "change_variable", "fields": { "VARIABLE": "score", "DELTA": 5 } },
                        { "type": "log", "fields": { "MESSAGE": "ready" } }
                    ] }
                },
                {
                    "type": "when_message_received",
                    "fields": { "MESSAGE": "advance" },
                    "statements": { "DO": [
                        { "type": "play_sound_until_done", "fields": { "SOUND": "beep" } },
                        { "type": "switch_scene", "fields": { "SCENE": "level2" } }
                    ] }
                }
            ]
        },
        { "id": "orphaned", "program": [ { "type": "move_steps", "fields": { "STEPS": 100 } } ] }
    ]
}"#;

const LEVEL_TWO: &str = r#"{
    "name": "level2",
    "entities": [
        {
            "id": "boss",
            "x": 100,
            "program": [
                {
                    "type": "when_game_starts",
                    "statements": { "DO": [ { "type": "log", "fields": { "MESSAGE": "boss ready" } } ] }
                }
            ]
        }
    ]
}"#;

fn level(source: &str) -> SceneDescription {
    SceneDescription::from_json(source).expect("scene JSON")
}

#[test]
fn load_scene_registers_entities_and_runs_start_scripts() {
    let mut rt = Runtime::new(RuntimeConfig::default());
    rt.load_scene(&level(LEVEL_ONE)).expect("load");
    rt.start();
    assert_eq!(rt.variable("hero", "score"), Value::Number(5.0));
    assert_eq!(rt.variable("hero", "hp"), Value::Number(3.0));
    assert!(rt.log_entries().iter().any(|entry| entry.message == "hero: ready"));
    assert_eq!(rt.entity_snapshot("hero").and_then(|s| s.costume).as_deref(), Some("hero_idle"));
    assert!(rt.catalog("orphaned").is_some_and(|catalog| catalog.is_empty()));
}

#[test]
fn sound_waits_end_on_the_completion_signal() {
    let mut rt = Runtime::new(RuntimeConfig::default());
    rt.load_scene(&level(LEVEL_ONE)).expect("load");
    rt.start();
    rt.broadcast("advance");
    rt.update();
    let requests = rt.take_playback_requests();
    assert_eq!(requests.len(), 1);
    for _ in 0..30 {
        rt.update();
    }
    assert!(rt.pending_scene_switch().is_none());

    assert!(rt.complete_signal(requests[0].handle));
    rt.update();
    assert_eq!(rt.pending_scene_switch(), Some("level2"));
}

#[test]
fn switching_scenes_keeps_globals_and_replaces_entities() {
    let mut rt = Runtime::new(RuntimeConfig::default());
    rt.load_scene(&level(LEVEL_ONE)).expect("load");
    rt.start();
    rt.load_scene(&level(LEVEL_TWO)).expect("switch");
    assert!(!rt.is_running());
    rt.start();
    assert!(rt.entity_snapshot("hero").is_none());
    assert_eq!(rt.entity_snapshot("boss").map(|s| s.x), Some(100.0));
    assert_eq!(rt.variable("boss", "score"), Value::Number(5.0));
    assert!(rt.clone_entity("hero").is_err());
}

#[test]
fn config_file_fills_defaults_and_accepts_overrides() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("runtime.json");
    fs::write(&path, r#"{ "canvas": { "width": 640 }, "clone_limit": 5 }"#).expect("write config");

    let mut config = RuntimeConfig::load(&path).expect("load config");
    assert_eq!(config.canvas.width, 640.0);
    assert_eq!(config.canvas.height, 360.0);
    assert_eq!(config.clone_limit, 5);
    assert!(config.physics.ground);

    let overrides = RuntimeConfigOverrides { height: Some(480.0), seed: Some(9), ..Default::default() };
    config.apply_overrides(&overrides);
    assert_eq!(config.canvas.height, 480.0);
    assert_eq!(config.random_seed, Some(9));
    assert_eq!(overrides.applied_fields(), vec!["height", "seed"]);

    let missing = RuntimeConfig::load_or_default(dir.path().join("missing.json"));
    assert_eq!(missing, RuntimeConfig::default());
}

#[test]
fn harness_fixture_follows_scene_switches() {
    let mut fixture = HarnessFixture::with_scene(level(LEVEL_ONE), 4)
        .input(1, InputAction::Broadcast { message: "advance".into() })
        .input(3, InputAction::CompleteSound { handle: 1 });
    fixture.scenes.insert("level2".into(), level(LEVEL_TWO));

    let output = run_fixture(&fixture).expect("run fixture");
    assert_eq!(output.scene, "level1");
    assert!(output.startup.iter().any(|line| line.contains("hero: ready")));
    assert_eq!(output.results.len(), 4);
    assert_eq!(output.results[1].sounds, vec!["hero beep #1".to_string()]);
    assert!(output.results[2].scene_switch.is_none());
    assert_eq!(output.results[3].scene_switch.as_deref(), Some("level2"));
    assert!(output.results[3].logs.iter().any(|line| line.contains("boss: boss ready")));
    let ids: Vec<&str> = output.final_entities.iter().map(|snapshot| snapshot.id.as_str()).collect();
    assert_eq!(ids, vec!["boss"]);
}

#[test]
fn harness_fixture_from_disk_is_deterministic() {
    let dir = tempdir().expect("temp dir");
    fs::write(dir.path().join("level1.json"), LEVEL_ONE).expect("write scene");
    let fixture_path = dir.path().join("fixture.json");
    fs::write(
        &fixture_path,
        r#"{
            "scene_path": "level1.json",
            "steps": 3,
            "seed": 42,
            "inputs": [
                { "step": 0, "kind": "pointer_down", "x": 240, "y": 180 },
                { "step": 1, "kind": "pointer_up" }
            ]
        }"#,
    )
    .expect("write fixture");

    let fixture = load_fixture(&fixture_path).expect("load fixture");
    assert_eq!(fixture.scene_path.as_deref(), Some(dir.path().join("level1.json").as_path()));
    let first = run_fixture(&fixture).expect("first run");
    let second = run_fixture(&fixture).expect("second run");
    assert_eq!(first, second);
    assert_eq!(first.results[0].clicked.as_deref(), Some("orphaned"));
}
