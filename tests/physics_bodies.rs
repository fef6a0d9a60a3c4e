use glam::Vec2;
use kestrel_blocks::config::RuntimeConfig;
use kestrel_blocks::scene::BodyConfig;
use kestrel_blocks::stage::EntitySpawn;
use kestrel_blocks::Runtime;

fn running_with(spawns: Vec<EntitySpawn>) -> Runtime {
    let mut rt = Runtime::new(RuntimeConfig::default());
    for spawn in spawns {
        rt.register_entity(spawn).expect("register");
    }
    rt.start();
    rt
}

#[test]
fn bodies_fall_under_world_gravity() {
    let mut rt = running_with(vec![
        EntitySpawn::new("crate").at(0.0, 100.0).with_body(BodyConfig::default()),
        EntitySpawn::new("sign").at(100.0, 100.0),
    ]);
    for _ in 0..20 {
        rt.update();
    }
    let fallen = rt.entity_position("crate").expect("crate");
    assert!(fallen.y < 90.0, "{fallen:?}");
    assert_eq!(rt.entity_position("sign"), Some(Vec2::new(100.0, 100.0)));
    assert!(rt.entity_snapshot("crate").is_some_and(|snapshot| snapshot.has_body));
}

#[test]
fn zero_gravity_scale_keeps_a_body_floating() {
    let mut rt = running_with(vec![EntitySpawn::new("balloon")
        .at(0.0, 50.0)
        .with_body(BodyConfig { gravity_scale: 0.0, ..BodyConfig::default() })]);
    for _ in 0..20 {
        rt.update();
    }
    let position = rt.entity_position("balloon").expect("balloon");
    assert!((position.y - 50.0).abs() < 0.5, "{position:?}");
}

#[test]
fn velocity_is_expressed_in_user_space() {
    let mut rt = running_with(vec![EntitySpawn::new("rocket")
        .with_body(BodyConfig { gravity_scale: 0.0, ..BodyConfig::default() })]);
    assert!(rt.set_velocity("rocket", Vec2::new(0.0, 60.0)));
    for _ in 0..30 {
        rt.update();
    }
    let position = rt.entity_position("rocket").expect("rocket");
    assert!(position.y > 20.0, "{position:?}");
    let velocity = rt.user_velocity("rocket").expect("velocity");
    assert!(velocity.y > 0.0, "{velocity:?}");
}

#[test]
fn enabling_physics_later_creates_a_body_once() {
    let mut rt = running_with(vec![EntitySpawn::new("hero")]);
    assert!(!rt.set_velocity("hero", Vec2::X));
    assert!(rt.enable_physics("hero"));
    assert!(rt.entity_snapshot("hero").is_some_and(|snapshot| snapshot.has_body));
    assert!(rt.set_gravity_scale("hero", 0.5));
}

#[test]
fn colliding_bodies_report_contact_events() {
    use kestrel_blocks::events::GameEvent;

    let floating = BodyConfig { gravity_scale: 0.0, ..BodyConfig::default() };
    let mut rt = running_with(vec![
        EntitySpawn::new("puck").at(-60.0, 0.0).with_body(floating),
        EntitySpawn::new("wall").at(60.0, 0.0).with_body(floating),
    ]);
    assert!(rt.set_velocity("puck", Vec2::new(300.0, 0.0)));
    let mut events = Vec::new();
    for _ in 0..60 {
        rt.update();
        events.extend(rt.drain_events());
    }
    let started = GameEvent::BodyContact { a: "puck".into(), b: "wall".into(), started: true };
    assert!(events.contains(&started), "{events:?}");
}
