use glam::Vec2;
use kestrel_blocks::blocks::{BlockNode, BlockProgram};
use kestrel_blocks::compiler::{compile_program, BODY_SLOT};
use kestrel_blocks::config::RuntimeConfig;
use kestrel_blocks::events::GameEvent;
use kestrel_blocks::runtime_log::LogKind;
use kestrel_blocks::stage::EntitySpawn;
use kestrel_blocks::value::Value;
use kestrel_blocks::variables::{VariableDefinition, VariableScope, VariableType};
use kestrel_blocks::Runtime;

fn runtime() -> Runtime {
    let mut rt = Runtime::new(RuntimeConfig { random_seed: Some(3), ..RuntimeConfig::default() });
    rt.define_variables([
        VariableDefinition::new("count", "count", VariableType::Float, VariableScope::Global),
        VariableDefinition::new("seen", "seen", VariableType::Float, VariableScope::Global),
        VariableDefinition::new("i", "i", VariableType::Integer, VariableScope::Local),
    ]);
    rt
}

fn number(value: f64) -> BlockNode {
    BlockNode::new("number").field("NUM", value)
}

fn hat(kind: &str, body: Vec<BlockNode>) -> BlockNode {
    BlockNode::new(kind).statement(BODY_SLOT, body)
}

fn bump(variable: &str) -> BlockNode {
    BlockNode::new("change_variable").field("VARIABLE", variable).input("DELTA", number(1.0))
}

fn add(rt: &mut Runtime, spawn: EntitySpawn, scripts: Vec<BlockNode>) {
    let id = spawn.id.clone();
    rt.register_entity(spawn).expect("register entity");
    let compiled = compile_program(&BlockProgram::new(scripts));
    assert!(compiled.diagnostics.is_empty(), "{:?}", compiled.diagnostics);
    rt.register_behaviors(&id, &compiled).expect("register behaviors");
}

fn count(rt: &Runtime) -> f64 {
    rt.variable("any", "count").as_number()
}

#[test]
fn orphan_blocks_never_run() {
    let program = BlockProgram::new(vec![BlockNode::new("move_steps").field("STEPS", 50.0)]);
    let compiled = compile_program(&program);
    assert!(compiled.is_empty());

    let mut rt = runtime();
    rt.register_entity(EntitySpawn::new("hero")).expect("register");
    rt.register_behaviors("hero", &compiled).expect("behaviors");
    rt.start();
    for _ in 0..5 {
        rt.update();
    }
    assert_eq!(rt.entity_position("hero"), Some(Vec2::ZERO));
}

#[test]
fn wait_suspends_until_the_deadline() {
    let mut rt = runtime();
    add(
        &mut rt,
        EntitySpawn::new("hero"),
        vec![hat(
            "when_game_starts",
            vec![bump("count"), BlockNode::new("wait_seconds").input("SECS", number(0.5)), bump("count")],
        )],
    );
    rt.start();
    assert_eq!(count(&rt), 1.0);
    for _ in 0..10 {
        rt.update();
    }
    assert_eq!(count(&rt), 1.0);
    for _ in 0..30 {
        rt.update();
    }
    assert_eq!(count(&rt), 2.0);
}

#[test]
fn repeat_yields_between_iterations() {
    let mut rt = runtime();
    add(
        &mut rt,
        EntitySpawn::new("hero"),
        vec![hat(
            "when_game_starts",
            vec![BlockNode::new("repeat").input("TIMES", number(3.0)).statement(BODY_SLOT, vec![bump("count")])],
        )],
    );
    rt.start();
    assert_eq!(count(&rt), 1.0);
    rt.update();
    assert_eq!(count(&rt), 2.0);
    for _ in 0..5 {
        rt.update();
    }
    assert_eq!(count(&rt), 3.0);
    assert_eq!(rt.active_task_count(), 0);
}

#[test]
fn for_each_counts_from_one() {
    let mut rt = runtime();
    let body = vec![BlockNode::new("change_variable")
        .field("VARIABLE", "count")
        .input("DELTA", BlockNode::new("get_variable").field("VARIABLE", "i"))];
    add(
        &mut rt,
        EntitySpawn::new("hero"),
        vec![hat(
            "when_game_starts",
            vec![BlockNode::new("for_each")
                .field("VARIABLE", "i")
                .input("COUNT", number(3.0))
                .statement(BODY_SLOT, body)],
        )],
    );
    rt.start();
    for _ in 0..5 {
        rt.update();
    }
    assert_eq!(count(&rt), 6.0);
    assert_eq!(rt.variable("hero", "i"), Value::Number(3.0));
}

#[test]
fn messages_broadcast_in_a_frame_arrive_on_the_next() {
    let mut rt = runtime();
    add(
        &mut rt,
        EntitySpawn::new("sender"),
        vec![hat("every_frame", vec![bump("count"), BlockNode::new("broadcast").field("MESSAGE", "ping")])],
    );
    add(
        &mut rt,
        EntitySpawn::new("listener"),
        vec![BlockNode::new("when_message_received").field("MESSAGE", "ping").statement(
            BODY_SLOT,
            vec![BlockNode::new("set_variable")
                .field("VARIABLE", "seen")
                .input("VALUE", BlockNode::new("get_variable").field("VARIABLE", "count"))],
        )],
    );
    rt.start();
    rt.update();
    assert_eq!(count(&rt), 1.0);
    assert_eq!(rt.variable("listener", "seen"), Value::Number(0.0));
    rt.update();
    assert_eq!(rt.variable("listener", "seen"), Value::Number(2.0));
    assert!(rt
        .drain_events()
        .iter()
        .any(|event| matches!(event, GameEvent::MessageDelivered { message, handlers: 1 } if message == "ping")));
}

#[test]
fn key_presses_trigger_matching_hats_immediately() {
    let mut rt = runtime();
    add(
        &mut rt,
        EntitySpawn::new("hero"),
        vec![
            BlockNode::new("when_key_pressed").field("KEY", "space").statement(BODY_SLOT, vec![bump("count")]),
            BlockNode::new("when_key_pressed").field("KEY", "any").statement(BODY_SLOT, vec![bump("seen")]),
        ],
    );
    assert!(rt.key_down("space"));
    assert_eq!(count(&rt), 0.0);

    rt.start();
    assert!(rt.key_down("space"));
    assert_eq!(count(&rt), 1.0);
    assert!(rt.key_down("a"));
    assert_eq!(count(&rt), 1.0);
    assert_eq!(rt.variable("hero", "seen"), Value::Number(2.0));
    assert!(!rt.key_down("not a key"));
}

#[test]
fn wait_until_resumes_once_the_condition_holds() {
    let mut rt = runtime();
    add(
        &mut rt,
        EntitySpawn::new("hero"),
        vec![hat(
            "when_game_starts",
            vec![
                BlockNode::new("wait_until").input("CONDITION", BlockNode::new("key_down").field("KEY", "space")),
                bump("count"),
            ],
        )],
    );
    rt.start();
    rt.update();
    rt.update();
    assert_eq!(count(&rt), 0.0);
    rt.key_down("space");
    rt.update();
    assert_eq!(count(&rt), 1.0);
}

#[test]
fn clicks_go_to_the_topmost_entity_only() {
    let mut rt = runtime();
    let clicked = |name: &str| {
        vec![hat(
            "when_clicked",
            vec![BlockNode::new("set_variable").field("VARIABLE", "seen").input(
                "VALUE",
                BlockNode::new("number").field("NUM", if name == "top" { 2.0 } else { 1.0 }),
            )],
        )]
    };
    add(&mut rt, EntitySpawn::new("bottom"), clicked("bottom"));
    let mut top = EntitySpawn::new("top");
    top.depth = 5;
    add(&mut rt, top, clicked("top"));
    rt.start();

    let center = rt.user_to_engine(Vec2::ZERO);
    assert_eq!(rt.pointer_down(center).as_deref(), Some("top"));
    assert_eq!(rt.variable("top", "seen"), Value::Number(2.0));
    rt.pointer_up();
    assert_eq!(rt.pointer_down(Vec2::new(1.0, 1.0)), None);
}

#[test]
fn a_failing_action_does_not_stop_other_entities() {
    let mut rt = runtime();
    add(
        &mut rt,
        EntitySpawn::new("broken"),
        vec![hat(
            "when_game_starts",
            vec![
                BlockNode::new("set_velocity").input("VX", number(5.0)).input("VY", number(0.0)),
                bump("seen"),
            ],
        )],
    );
    add(&mut rt, EntitySpawn::new("healthy"), vec![hat("when_game_starts", vec![bump("count")])]);
    rt.start();
    assert_eq!(count(&rt), 1.0);
    assert_eq!(rt.variable("broken", "seen"), Value::Number(0.0));
    assert!(rt.log().count(LogKind::Error) >= 1);
}

#[test]
fn stop_all_halts_parked_scripts() {
    let mut rt = runtime();
    add(
        &mut rt,
        EntitySpawn::new("hero"),
        vec![hat(
            "when_game_starts",
            vec![BlockNode::new("wait_seconds").input("SECS", number(0.1)), bump("count")],
        )],
    );
    rt.start();
    assert_eq!(rt.active_task_count(), 1);
    rt.stop_all();
    assert!(!rt.is_running());
    for _ in 0..20 {
        rt.update();
    }
    assert_eq!(count(&rt), 0.0);
    assert_eq!(rt.active_task_count(), 0);
}

#[test]
fn glide_reaches_its_target() {
    let mut rt = runtime();
    add(
        &mut rt,
        EntitySpawn::new("hero"),
        vec![hat(
            "when_game_starts",
            vec![BlockNode::new("glide_to_xy")
                .input("SECS", number(0.25))
                .input("X", number(100.0))
                .input("Y", number(-40.0))],
        )],
    );
    rt.start();
    for _ in 0..5 {
        rt.update();
    }
    let midway = rt.entity_position("hero").expect("position");
    assert!(midway.x > 0.0 && midway.x < 100.0, "{midway:?}");
    for _ in 0..30 {
        rt.update();
    }
    let done = rt.entity_position("hero").expect("position");
    assert!((done - Vec2::new(100.0, -40.0)).length() < 1e-3, "{done:?}");
}

#[test]
fn huge_or_non_finite_transforms_do_not_stall_the_loop() {
    let mut rt = runtime();
    add(
        &mut rt,
        EntitySpawn::new("spinner"),
        vec![hat(
            "when_game_starts",
            vec![
                BlockNode::new("point_direction").input("DIRECTION", number(1e12)),
                BlockNode::new("turn_degrees").input("DEGREES", number(15.0)),
                bump("count"),
                BlockNode::new("point_direction").input("DIRECTION", number(1e300)),
                BlockNode::new("set_x").input("X", number(1e300)),
                bump("count"),
            ],
        )],
    );
    rt.start();
    rt.update();
    assert_eq!(count(&rt), 2.0);
    let direction = rt.entity_direction("spinner").expect("direction");
    assert!(direction.is_finite() && direction > -180.0 && direction <= 180.0, "{direction}");
    assert_eq!(rt.entity_position("spinner"), Some(Vec2::ZERO));
    assert_eq!(rt.log().count(LogKind::Error), 2);
}

#[test]
fn random_ranges_wider_than_f64_do_not_panic() {
    let mut rt = runtime();
    let wide = BlockNode::new("random_range").input("FROM", number(-1.7e308)).input("TO", number(1.7e308));
    add(
        &mut rt,
        EntitySpawn::new("dice"),
        vec![hat(
            "when_game_starts",
            vec![
                BlockNode::new("set_variable").field("VARIABLE", "seen").input("VALUE", wide),
                bump("count"),
            ],
        )],
    );
    rt.start();
    assert_eq!(count(&rt), 1.0);
    let seen = rt.variable("dice", "seen").as_number();
    assert!(seen.is_finite() && seen.abs() <= 1.7e308, "{seen}");
}

#[test]
fn the_log_keeps_only_the_newest_entries() {
    let mut rt = runtime();
    add(
        &mut rt,
        EntitySpawn::new("ticker"),
        vec![hat("every_frame", vec![BlockNode::new("log").field("MESSAGE", "tick")])],
    );
    rt.start();
    for _ in 0..250 {
        rt.update();
    }
    let entries = rt.log_entries();
    assert_eq!(entries.len(), 200);
    assert_eq!(entries.last().map(|entry| entry.message.as_str()), Some("ticker: tick"));
    assert!(entries.iter().all(|entry| entry.time > 0.0));
}
