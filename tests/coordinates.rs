use glam::Vec2;
use kestrel_blocks::config::RuntimeConfig;
use kestrel_blocks::stage::{CanvasSpace, EntitySpawn};
use kestrel_blocks::Runtime;
use proptest::prelude::*;

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() <= 1e-4 * (1.0 + b.abs())
}

proptest! {
    #[test]
    fn engine_user_round_trip(
        x in -10_000.0f32..10_000.0,
        y in -10_000.0f32..10_000.0,
        width in 1.0f32..4096.0,
        height in 1.0f32..4096.0,
    ) {
        let canvas = CanvasSpace::new(width, height);
        let point = Vec2::new(x, y);
        let there_and_back = canvas.user_to_engine(canvas.engine_to_user(point));
        prop_assert!(close(there_and_back.x, x), "{there_and_back:?} vs {point:?}");
        prop_assert!(close(there_and_back.y, y), "{there_and_back:?} vs {point:?}");
        let back_and_there = canvas.engine_to_user(canvas.user_to_engine(point));
        prop_assert!(close(back_and_there.x, x) && close(back_and_there.y, y));
    }

    #[test]
    fn user_rotation_stays_in_half_open_range(degrees in -1_000.0f32..1_000.0) {
        let user = CanvasSpace::engine_rotation_to_user(CanvasSpace::user_rotation_to_engine(degrees));
        prop_assert!(user > -180.0 - 1e-3 && user <= 180.0 + 1e-3, "{user}");
        let wrapped = (degrees - user).rem_euclid(360.0);
        prop_assert!(wrapped < 1e-2 || wrapped > 360.0 - 1e-2, "{degrees} -> {user}");
    }
}

#[test]
fn canvas_center_is_user_origin() {
    let canvas = CanvasSpace::new(480.0, 360.0);
    assert_eq!(canvas.user_to_engine(Vec2::ZERO), Vec2::new(240.0, 180.0));
    assert_eq!(canvas.engine_to_user(Vec2::ZERO), Vec2::new(-240.0, 180.0));
}

#[test]
fn resizing_the_canvas_keeps_user_positions() {
    let mut rt = Runtime::new(RuntimeConfig::default());
    rt.register_entity(EntitySpawn::new("hero").at(25.0, -40.0)).expect("register");
    assert!(rt.set_canvas_size(800.0, 600.0));
    let position = rt.entity_position("hero").expect("position");
    assert!((position - Vec2::new(25.0, -40.0)).length() < 1e-3, "{position:?}");
    assert_eq!(rt.user_to_engine(Vec2::ZERO), Vec2::new(400.0, 300.0));
}

#[test]
fn movement_follows_user_direction() {
    let mut rt = Runtime::new(RuntimeConfig::default());
    rt.register_entity(EntitySpawn::new("hero")).expect("register");
    rt.move_steps("hero", 10.0);
    let right = rt.entity_position("hero").expect("position");
    assert!((right - Vec2::new(10.0, 0.0)).length() < 1e-3, "{right:?}");

    rt.point_in_direction("hero", 90.0);
    rt.move_steps("hero", 10.0);
    let up = rt.entity_position("hero").expect("position");
    assert!((up - Vec2::new(10.0, 10.0)).length() < 1e-3, "{up:?}");
    assert!((rt.entity_direction("hero").expect("direction") - 90.0).abs() < 1e-3);
}
