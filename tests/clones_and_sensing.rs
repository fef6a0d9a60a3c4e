use glam::Vec2;
use kestrel_blocks::blocks::{BlockNode, BlockProgram};
use kestrel_blocks::compiler::{compile_program, BODY_SLOT};
use kestrel_blocks::config::RuntimeConfig;
use kestrel_blocks::events::GameEvent;
use kestrel_blocks::runtime::CLONE_SEPARATOR;
use kestrel_blocks::scene::CostumeDefinition;
use kestrel_blocks::stage::EntitySpawn;
use kestrel_blocks::value::Value;
use kestrel_blocks::variables::{VariableDefinition, VariableScope, VariableType};
use kestrel_blocks::Runtime;

fn runtime(clone_limit: usize) -> Runtime {
    let mut rt = Runtime::new(RuntimeConfig { clone_limit, random_seed: Some(11), ..RuntimeConfig::default() });
    rt.define_variables([
        VariableDefinition::new("hits_a", "hits_a", VariableType::Integer, VariableScope::Global),
        VariableDefinition::new("hits_b", "hits_b", VariableType::Integer, VariableScope::Global),
        VariableDefinition::new("hp", "hp", VariableType::Integer, VariableScope::Local).with_default(5.0),
    ]);
    rt
}

fn bump(variable: &str) -> BlockNode {
    BlockNode::new("change_variable").field("VARIABLE", variable).input("DELTA", BlockNode::new("number").field("NUM", 1.0))
}

fn register(rt: &mut Runtime, spawn: EntitySpawn, scripts: Vec<BlockNode>) {
    let id = spawn.id.clone();
    rt.register_entity(spawn).expect("register entity");
    rt.register_behaviors(&id, &compile_program(&BlockProgram::new(scripts))).expect("register behaviors");
}

#[test]
fn clone_from_template_after_original_is_deleted() {
    let mut rt = runtime(10);
    let costumes = vec![CostumeDefinition::new("idle", 32.0, 48.0), CostumeDefinition::new("run", 32.0, 48.0)];
    rt.register_entity(EntitySpawn::new("enemy").at(40.0, 10.0).with_costumes(costumes)).expect("register");
    rt.save_template("enemy").expect("template");
    assert!(rt.delete_entity("enemy"));
    assert!(rt.entity_snapshot("enemy").is_none());

    let id = rt.clone_entity("enemy").expect("clone from template");
    assert!(id.starts_with(&format!("enemy{CLONE_SEPARATOR}")));
    let snapshot = rt.entity_snapshot(&id).expect("live clone");
    assert_eq!(snapshot.costume.as_deref(), Some("idle"));
    assert_eq!(snapshot.original.as_deref(), Some("enemy"));
    assert_eq!((snapshot.x, snapshot.y), (40.0, 10.0));
    assert!(rt.is_clone(&id));
}

#[test]
fn clone_ceiling_is_exact() {
    let limit = 4;
    let mut rt = runtime(limit);
    rt.register_entity(EntitySpawn::new("seed")).expect("register");
    rt.save_template("seed").expect("template");

    let clones: Vec<String> = (0..limit).map(|_| rt.clone_entity("seed").expect("within ceiling")).collect();
    assert_eq!(rt.live_clone_count(), limit);
    assert!(rt.clone_entity("seed").is_err());
    assert!(rt
        .drain_events()
        .iter()
        .any(|event| matches!(event, GameEvent::CloneRejected { live_clones, .. } if *live_clones == limit)));

    assert!(rt.delete_entity(&clones[0]));
    assert!(rt.clone_entity(&clones[1]).is_ok());
    assert_eq!(rt.live_clone_count(), limit);
}

#[test]
fn clones_get_their_own_copy_of_locals() {
    let mut rt = runtime(10);
    rt.register_entity(EntitySpawn::new("hero")).expect("register");
    rt.save_template("hero").expect("template");
    assert_eq!(rt.variable("hero", "hp"), Value::Number(5.0));
    rt.set_variable("hero", "hp", &Value::Number(3.0));

    let clone = rt.clone_entity("hero").expect("clone");
    assert_eq!(rt.variable(&clone, "hp"), Value::Number(3.0));
    rt.change_variable(&clone, "hp", -1.0);
    assert_eq!(rt.variable(&clone, "hp"), Value::Number(2.0));
    assert_eq!(rt.variable("hero", "hp"), Value::Number(3.0));
}

#[test]
fn local_defaults_and_integer_truncation() {
    let mut rt = runtime(10);
    rt.register_entity(EntitySpawn::new("hero")).expect("register");
    assert_eq!(rt.variable("hero", "hp"), Value::Number(5.0));
    assert!(rt.set_variable("hero", "hp", &Value::Number(2.7)));
    assert_eq!(rt.variable("hero", "hp"), Value::Number(2.0));
    assert!(rt.set_variable("hero", "hp", &Value::Number(-2.7)));
    assert_eq!(rt.variable("hero", "hp"), Value::Number(-2.0));
    assert_eq!(rt.variable("hero", "missing"), Value::Number(0.0));
}

#[test]
fn clones_run_start_and_clone_start_scripts() {
    let mut rt = runtime(10);
    register(
        &mut rt,
        EntitySpawn::new("spawner"),
        vec![
            BlockNode::new("when_clone_starts").statement(BODY_SLOT, vec![bump("hits_a")]),
            BlockNode::new("when_key_pressed")
                .field("KEY", "c")
                .statement(BODY_SLOT, vec![BlockNode::new("create_clone")]),
        ],
    );
    rt.save_template("spawner").expect("template");
    rt.start();
    assert_eq!(rt.variable("spawner", "hits_a"), Value::Number(0.0));
    rt.key_down("c");
    assert_eq!(rt.live_clone_count(), 1);
    assert_eq!(rt.variable("spawner", "hits_a"), Value::Number(1.0));
}

#[test]
fn touching_pairs_fire_once_per_frame() {
    let mut rt = runtime(10);
    register(
        &mut rt,
        EntitySpawn::new("a"),
        vec![
            BlockNode::new("when_touching").field("TARGET", "b").statement(BODY_SLOT, vec![bump("hits_a")]),
            BlockNode::new("when_touching").field("TARGET", "b").statement(BODY_SLOT, vec![bump("hits_a")]),
        ],
    );
    register(
        &mut rt,
        EntitySpawn::new("b").at(10.0, 0.0),
        vec![BlockNode::new("when_touching").field("TARGET", "a").statement(BODY_SLOT, vec![bump("hits_b")])],
    );
    rt.start();
    rt.update();
    assert_eq!(rt.variable("a", "hits_a"), Value::Number(2.0));
    assert_eq!(rt.variable("b", "hits_b"), Value::Number(1.0));
    let started = rt.drain_events().into_iter().filter(|event| matches!(event, GameEvent::TouchingStarted { .. })).count();
    assert_eq!(started, 1);

    rt.update();
    assert_eq!(rt.variable("a", "hits_a"), Value::Number(4.0));
    assert_eq!(rt.variable("b", "hits_b"), Value::Number(2.0));
    assert!(!rt.drain_events().iter().any(|event| matches!(event, GameEvent::TouchingStarted { .. })));
}

#[test]
fn separated_or_hidden_entities_do_not_touch() {
    let mut rt = runtime(10);
    register(
        &mut rt,
        EntitySpawn::new("a"),
        vec![BlockNode::new("when_touching").field("TARGET", "b").statement(BODY_SLOT, vec![bump("hits_a")])],
    );
    register(&mut rt, EntitySpawn::new("b").at(200.0, 0.0), Vec::new());
    rt.start();
    rt.update();
    assert_eq!(rt.variable("a", "hits_a"), Value::Number(0.0));

    rt.go_to("b", Some(0.0), Some(0.0));
    rt.set_visible("b", false);
    rt.update();
    assert_eq!(rt.variable("a", "hits_a"), Value::Number(0.0));

    rt.set_visible("b", true);
    rt.update();
    assert_eq!(rt.variable("a", "hits_a"), Value::Number(1.0));
}

#[test]
fn attach_then_detach_restores_world_placement() {
    let mut rt = runtime(10);
    rt.register_entity(EntitySpawn::new("parent").at(-30.0, 10.0)).expect("register parent");
    rt.register_entity(EntitySpawn::new("child").at(50.0, 20.0)).expect("register child");
    rt.point_in_direction("parent", 45.0);
    rt.set_scale("parent", 1.5);
    rt.point_in_direction("child", 30.0);
    rt.set_scale("child", 2.0);
    let before = rt.entity_snapshot("child").expect("child");

    rt.attach_to("child", "parent").expect("attach");
    let attached = rt.entity_snapshot("child").expect("child");
    assert_eq!(attached.parent.as_deref(), Some("parent"));
    assert!((attached.x - before.x).abs() < 1e-3 && (attached.y - before.y).abs() < 1e-3);

    assert!(rt.detach("child"));
    let after = rt.entity_snapshot("child").expect("child");
    assert!(after.parent.is_none());
    assert!((after.x - before.x).abs() < 1e-3, "{} vs {}", after.x, before.x);
    assert!((after.y - before.y).abs() < 1e-3, "{} vs {}", after.y, before.y);
    assert!((after.rotation - before.rotation).abs() < 1e-3, "{} vs {}", after.rotation, before.rotation);
    assert!((after.scale[0] - before.scale[0]).abs() < 1e-4);
    assert!((after.scale[1] - before.scale[1]).abs() < 1e-4);
}

#[test]
fn attached_children_follow_their_parent() {
    let mut rt = runtime(10);
    rt.register_entity(EntitySpawn::new("ship")).expect("register");
    rt.register_entity(EntitySpawn::new("turret").at(0.0, 20.0)).expect("register");
    rt.attach_to("turret", "ship").expect("attach");
    rt.change_position("ship", Vec2::new(15.0, 0.0));
    let turret = rt.entity_position("turret").expect("turret");
    assert!((turret - Vec2::new(15.0, 20.0)).length() < 1e-3, "{turret:?}");
    assert!(rt.attach_to("ship", "turret").is_err());
}

#[test]
fn remapped_programs_sense_their_new_targets() {
    use kestrel_blocks::blocks::{remap_references, RemapTables};

    let mut program = BlockProgram::new(vec![BlockNode::new("when_touching")
        .field("TARGET", "hero")
        .statement(BODY_SLOT, vec![bump("hits_a")])]);
    let tables = RemapTables::new().entity("hero", "knight").variable("hits_a", "hits_b");
    assert_eq!(remap_references(&mut program, &tables), 2);

    let mut rt = runtime(10);
    rt.register_entity(EntitySpawn::new("orc")).expect("register");
    rt.register_behaviors("orc", &compile_program(&program)).expect("behaviors");
    rt.register_entity(EntitySpawn::new("knight").at(5.0, 0.0)).expect("register");
    rt.start();
    rt.update();
    assert_eq!(rt.variable("orc", "hits_b"), Value::Number(1.0));
    assert_eq!(rt.variable("orc", "hits_a"), Value::Number(0.0));
}

#[test]
fn failed_clone_requests_are_logged() {
    use kestrel_blocks::runtime_log::LogKind;

    let mut rt = runtime(10);
    register(
        &mut rt,
        EntitySpawn::new("summoner"),
        vec![BlockNode::new("when_game_starts").statement(
            BODY_SLOT,
            vec![BlockNode::new("create_clone").field("TARGET", "ghost"), bump("hits_a")],
        )],
    );
    rt.start();
    assert_eq!(rt.variable("summoner", "hits_a"), Value::Number(1.0));
    let errors: Vec<String> = rt
        .log_entries()
        .into_iter()
        .filter(|entry| entry.kind == LogKind::Error)
        .map(|entry| entry.message)
        .collect();
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(errors[0].contains("ghost"), "{errors:?}");

    let mut tight = runtime(0);
    tight.register_entity(EntitySpawn::new("seed")).expect("register");
    tight.save_template("seed").expect("template");
    assert!(tight.clone_entity("seed").is_err());
    assert_eq!(tight.log().count(LogKind::Error), 1);
}

#[test]
fn clones_made_mid_run_loop_from_the_next_frame() {
    let mut rt = runtime(10);
    register(
        &mut rt,
        EntitySpawn::new("spawner"),
        vec![
            BlockNode::new("every_frame").statement(BODY_SLOT, vec![bump("hits_a")]),
            BlockNode::new("when_clone_starts").statement(
                BODY_SLOT,
                vec![BlockNode::new("forever").statement(BODY_SLOT, vec![bump("hits_b")])],
            ),
            BlockNode::new("when_key_pressed")
                .field("KEY", "c")
                .statement(BODY_SLOT, vec![BlockNode::new("create_clone")]),
        ],
    );
    rt.save_template("spawner").expect("template");
    rt.start();
    rt.update();
    assert_eq!(rt.variable("spawner", "hits_a"), Value::Number(1.0));

    rt.key_down("c");
    assert_eq!(rt.live_clone_count(), 1);
    assert_eq!(rt.variable("spawner", "hits_b"), Value::Number(0.0));
    rt.update();
    assert_eq!(rt.variable("spawner", "hits_a"), Value::Number(3.0));
    assert_eq!(rt.variable("spawner", "hits_b"), Value::Number(1.0));
    rt.update();
    assert_eq!(rt.variable("spawner", "hits_a"), Value::Number(5.0));
    assert_eq!(rt.variable("spawner", "hits_b"), Value::Number(2.0));
}
