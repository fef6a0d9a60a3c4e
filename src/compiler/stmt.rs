use super::{Action, Behavior, Body, Compiler, ExecContext, Flow, Stmt, Suspension, Trigger, BODY_SLOT, ELSE_SLOT};
use crate::blocks::{BlockKind, BlockNode, MYSELF_TOKEN};
use crate::runtime::Runtime;
use crate::value::Value;
use anyhow::{anyhow, Result};
use glam::Vec2;
use std::rc::Rc;

fn action<F>(run: F) -> Stmt
where
    F: Fn(&mut Runtime, &ExecContext) -> Result<Flow> + 'static,
{
    let action: Action = Rc::new(run);
    Stmt::Action(action)
}

/// Action that reports a soft failure to the runtime log and carries on.
fn soft(rt: &Runtime, ctx: &ExecContext, ok: bool, block: &'static str, detail: impl FnOnce() -> String) -> Result<Flow> {
    if !ok {
        rt.log_error(format!("{block} ({}): {}", ctx.entity, detail()));
    }
    Ok(Flow::Continue)
}

impl Compiler {
    pub(crate) fn body(&mut self, nodes: &[BlockNode], path: &str) -> Body {
        let mut statements = Vec::with_capacity(nodes.len());
        let mut capped = false;
        for (index, node) in nodes.iter().enumerate() {
            let path = format!("{path}/{index}");
            if capped {
                self.diagnose(&path, node, "unreachable after forever");
                continue;
            }
            if let Some(statement) = self.statement(node, &path) {
                statements.push(statement);
            }
            capped = node.kind == BlockKind::Forever.name();
        }
        statements.into()
    }

    fn statement(&mut self, node: &BlockNode, path: &str) -> Option<Stmt> {
        let Some(kind) = BlockKind::parse(&node.kind) else {
            self.diagnose(path, node, "unknown block type");
            return None;
        };
        if kind.is_hat() {
            self.diagnose(path, node, "event block nested inside a script");
            return None;
        }
        if kind.is_expression() {
            self.diagnose(path, node, "value block used as a statement");
            return None;
        }
        let statement = match kind {
            // ---------- motion ----------
            BlockKind::MoveSteps => {
                let steps = self.number(node, "STEPS", path);
                action(move |rt, ctx| {
                    let steps = steps(rt, ctx).as_number() as f32;
                    rt.move_steps(&ctx.entity, steps);
                    Ok(Flow::Continue)
                })
            }
            BlockKind::TurnDegrees => {
                let degrees = self.number(node, "DEGREES", path);
                action(move |rt, ctx| {
                    let degrees = degrees(rt, ctx).as_number() as f32;
                    rt.turn(&ctx.entity, degrees);
                    Ok(Flow::Continue)
                })
            }
            BlockKind::GoToXy => {
                let x = self.number(node, "X", path);
                let y = self.number(node, "Y", path);
                action(move |rt, ctx| {
                    let target = Vec2::new(x(rt, ctx).as_number() as f32, y(rt, ctx).as_number() as f32);
                    rt.go_to(&ctx.entity, Some(target.x), Some(target.y));
                    Ok(Flow::Continue)
                })
            }
            BlockKind::ChangeX | BlockKind::ChangeY => {
                let horizontal = kind == BlockKind::ChangeX;
                let delta = self.number(node, if horizontal { "DX" } else { "DY" }, path);
                action(move |rt, ctx| {
                    let amount = delta(rt, ctx).as_number() as f32;
                    let offset = if horizontal { Vec2::new(amount, 0.0) } else { Vec2::new(0.0, amount) };
                    rt.change_position(&ctx.entity, offset);
                    Ok(Flow::Continue)
                })
            }
            BlockKind::SetX | BlockKind::SetY => {
                let horizontal = kind == BlockKind::SetX;
                let coordinate = self.number(node, if horizontal { "X" } else { "Y" }, path);
                action(move |rt, ctx| {
                    let value = coordinate(rt, ctx).as_number() as f32;
                    let ok = if horizontal {
                        rt.go_to(&ctx.entity, Some(value), None)
                    } else {
                        rt.go_to(&ctx.entity, None, Some(value))
                    };
                    soft(rt, ctx, ok, if horizontal { "set x" } else { "set y" }, || format!("cannot move to {value}"))
                })
            }
            BlockKind::PointDirection => {
                let direction = self.number(node, "DIRECTION", path);
                action(move |rt, ctx| {
                    let degrees = direction(rt, ctx).as_number() as f32;
                    let ok = rt.point_in_direction(&ctx.entity, degrees);
                    soft(rt, ctx, ok, "point in direction", || format!("cannot face {degrees}"))
                })
            }
            BlockKind::PointTowards | BlockKind::GoToTarget => {
                let target = self.value(node, "TARGET", path, Value::Null);
                let towards = kind == BlockKind::PointTowards;
                action(move |rt, ctx| {
                    let target = target(rt, ctx).as_text();
                    let ok = if towards { rt.point_towards(&ctx.entity, &target) } else { rt.go_to_target(&ctx.entity, &target) };
                    let block = if towards { "point towards" } else { "go to" };
                    soft(rt, ctx, ok, block, || format!("target '{target}' not found"))
                })
            }
            BlockKind::GlideToXy => {
                let seconds = self.number(node, "SECS", path);
                let x = self.number(node, "X", path);
                let y = self.number(node, "Y", path);
                action(move |rt, ctx| {
                    let duration = seconds(rt, ctx).as_number();
                    let target = Vec2::new(x(rt, ctx).as_number() as f32, y(rt, ctx).as_number() as f32);
                    Ok(match rt.begin_glide(&ctx.entity, duration, target) {
                        Some(glide) => Flow::Suspend(Suspension::Glide(glide)),
                        None => Flow::Continue,
                    })
                })
            }
            // ---------- physics ----------
            BlockKind::EnablePhysics => action(|rt, ctx| {
                rt.enable_physics(&ctx.entity);
                Ok(Flow::Continue)
            }),
            BlockKind::SetVelocity => {
                let vx = self.number(node, "VX", path);
                let vy = self.number(node, "VY", path);
                action(move |rt, ctx| {
                    let velocity = Vec2::new(vx(rt, ctx).as_number() as f32, vy(rt, ctx).as_number() as f32);
                    if rt.set_velocity(&ctx.entity, velocity) {
                        Ok(Flow::Continue)
                    } else {
                        Err(anyhow!("'{}' has no physics body", ctx.entity))
                    }
                })
            }
            BlockKind::SetGravityScale => {
                let scale = self.number(node, "SCALE", path);
                action(move |rt, ctx| {
                    let scale = scale(rt, ctx).as_number() as f32;
                    if rt.set_gravity_scale(&ctx.entity, scale) {
                        Ok(Flow::Continue)
                    } else {
                        Err(anyhow!("'{}' has no physics body", ctx.entity))
                    }
                })
            }
            // ---------- looks ----------
            BlockKind::Show | BlockKind::Hide => {
                let visible = kind == BlockKind::Show;
                action(move |rt, ctx| {
                    rt.set_visible(&ctx.entity, visible);
                    Ok(Flow::Continue)
                })
            }
            BlockKind::SwitchCostume => {
                let costume = self.value(node, "COSTUME", path, Value::Null);
                action(move |rt, ctx| {
                    let key = costume(rt, ctx).as_text();
                    let ok = rt.switch_costume(&ctx.entity, &key);
                    soft(rt, ctx, ok, "switch costume", || format!("unknown costume '{key}'"))
                })
            }
            BlockKind::NextCostume => action(|rt, ctx| {
                rt.next_costume(&ctx.entity);
                Ok(Flow::Continue)
            }),
            BlockKind::SetScale | BlockKind::ChangeScale => {
                let absolute = kind == BlockKind::SetScale;
                let amount = if absolute {
                    self.value(node, "SCALE", path, Value::Number(1.0))
                } else {
                    self.number(node, "DELTA", path)
                };
                action(move |rt, ctx| {
                    let amount = amount(rt, ctx).as_number() as f32;
                    if absolute {
                        rt.set_scale(&ctx.entity, amount);
                    } else {
                        rt.change_scale(&ctx.entity, amount);
                    }
                    Ok(Flow::Continue)
                })
            }
            BlockKind::SetDepth => {
                let depth = self.number(node, "DEPTH", path);
                action(move |rt, ctx| {
                    let depth = depth(rt, ctx).as_number().round() as i32;
                    rt.set_depth(&ctx.entity, depth);
                    Ok(Flow::Continue)
                })
            }
            // ---------- sound ----------
            BlockKind::PlaySound | BlockKind::PlaySoundUntilDone => {
                let sound = self.value(node, "SOUND", path, Value::Null);
                let wait = kind == BlockKind::PlaySoundUntilDone;
                action(move |rt, ctx| {
                    let key = sound(rt, ctx).as_text();
                    match rt.play_sound(&ctx.entity, &key) {
                        Some(handle) if wait => Ok(Flow::Suspend(Suspension::Sound(handle))),
                        Some(_) => Ok(Flow::Continue),
                        None => soft(rt, ctx, false, "play sound", || format!("unknown sound '{key}'")),
                    }
                })
            }
            BlockKind::StopAllSounds => action(|rt, _| {
                rt.stop_all_sounds();
                Ok(Flow::Continue)
            }),
            // ---------- control ----------
            BlockKind::WaitSeconds => {
                let seconds = self.number(node, "SECS", path);
                action(move |rt, ctx| {
                    let seconds = seconds(rt, ctx).as_number();
                    if seconds > 0.0 {
                        Ok(Flow::Suspend(Suspension::Until(rt.now() + seconds)))
                    } else {
                        Ok(Flow::Suspend(Suspension::NextTick))
                    }
                })
            }
            BlockKind::WaitUntil => Stmt::WaitUntil(self.value(node, "CONDITION", path, Value::Bool(false))),
            BlockKind::Repeat => Stmt::Repeat {
                times: self.value(node, "TIMES", path, Value::Number(10.0)),
                body: self.body(node.statement_body(BODY_SLOT), &format!("{path}/{BODY_SLOT}")),
            },
            BlockKind::RepeatUntil => Stmt::RepeatUntil {
                condition: self.value(node, "CONDITION", path, Value::Bool(false)),
                body: self.body(node.statement_body(BODY_SLOT), &format!("{path}/{BODY_SLOT}")),
            },
            BlockKind::ForEach => {
                let variable = node.field_text("VARIABLE").unwrap_or_default();
                if variable.trim().is_empty() {
                    self.diagnose(path, node, "no loop variable selected");
                    return None;
                }
                Stmt::ForEach {
                    variable,
                    count: self.value(node, "COUNT", path, Value::Number(10.0)),
                    body: self.body(node.statement_body(BODY_SLOT), &format!("{path}/{BODY_SLOT}")),
                }
            }
            BlockKind::If | BlockKind::IfElse => {
                let condition = self.value(node, "CONDITION", path, Value::Bool(false));
                let then = self.body(node.statement_body(BODY_SLOT), &format!("{path}/{BODY_SLOT}"));
                let otherwise = (kind == BlockKind::IfElse)
                    .then(|| self.body(node.statement_body(ELSE_SLOT), &format!("{path}/{ELSE_SLOT}")));
                Stmt::If { condition, then, otherwise }
            }
            BlockKind::Forever => {
                let body = self.body(node.statement_body(BODY_SLOT), &format!("{path}/{BODY_SLOT}"));
                let behavior = Rc::new(Behavior::new(Trigger::Forever, body));
                action(move |rt, ctx| {
                    rt.register_forever(&ctx.entity, Rc::clone(&behavior));
                    Ok(Flow::Stop)
                })
            }
            BlockKind::StopAll => action(|rt, _| {
                rt.stop_all();
                Ok(Flow::Stop)
            }),
            BlockKind::StopSelf => action(|rt, ctx| {
                rt.stop_entity(&ctx.entity);
                Ok(Flow::Stop)
            }),
            BlockKind::CreateClone => {
                let target = self.value(node, "TARGET", path, Value::text(MYSELF_TOKEN));
                action(move |rt, ctx| {
                    let raw = target(rt, ctx).as_text();
                    let source = if raw.is_empty() || raw == MYSELF_TOKEN { ctx.entity.clone() } else { raw };
                    // `clone_entity` logs its own failures; the script keeps going.
                    if rt.clone_entity(&source).is_err() {
                        log::debug!("{}: create clone of '{source}' skipped", ctx.entity);
                    }
                    Ok(Flow::Continue)
                })
            }
            BlockKind::DeleteSelf => action(|rt, ctx| {
                rt.delete_entity(&ctx.entity);
                Ok(Flow::Stop)
            }),
            BlockKind::Broadcast => {
                let message = self.value(node, "MESSAGE", path, Value::Null);
                action(move |rt, ctx| {
                    let message = message(rt, ctx).as_text();
                    let ok = !message.trim().is_empty();
                    if ok {
                        rt.broadcast(&message);
                    }
                    soft(rt, ctx, ok, "broadcast", || "empty message name".to_string())
                })
            }
            BlockKind::AttachTo => {
                let target = self.value(node, "TARGET", path, Value::Null);
                action(move |rt, ctx| {
                    let parent = target(rt, ctx).as_text();
                    rt.attach_to(&ctx.entity, &parent)?;
                    Ok(Flow::Continue)
                })
            }
            BlockKind::Detach => action(|rt, ctx| {
                rt.detach(&ctx.entity);
                Ok(Flow::Continue)
            }),
            BlockKind::SwitchScene => {
                let scene = self.value(node, "SCENE", path, Value::Null);
                action(move |rt, ctx| {
                    let scene = scene(rt, ctx).as_text();
                    let ok = !scene.trim().is_empty();
                    if ok {
                        rt.request_scene_switch(&scene);
                    }
                    soft(rt, ctx, ok, "switch scene", || "no scene selected".to_string())
                })
            }
            BlockKind::ResetTimer => action(|rt, _| {
                rt.reset_timer();
                Ok(Flow::Continue)
            }),
            // ---------- variables ----------
            BlockKind::SetVariable | BlockKind::ChangeVariable => {
                let key = node.field_text("VARIABLE").unwrap_or_default();
                if key.trim().is_empty() {
                    self.diagnose(path, node, "no variable selected");
                    return None;
                }
                if kind == BlockKind::SetVariable {
                    let value = self.value(node, "VALUE", path, Value::Number(0.0));
                    action(move |rt, ctx| {
                        let value = value(rt, ctx);
                        let ok = rt.set_variable(&ctx.entity, &key, &value);
                        soft(rt, ctx, ok, "set variable", || format!("unknown variable '{key}'"))
                    })
                } else {
                    let delta = self.value(node, "DELTA", path, Value::Number(1.0));
                    action(move |rt, ctx| {
                        let delta = delta(rt, ctx).as_number();
                        let ok = rt.change_variable(&ctx.entity, &key, delta);
                        soft(rt, ctx, ok, "change variable", || format!("unknown variable '{key}'"))
                    })
                }
            }
            BlockKind::Log => {
                let message = self.value(node, "MESSAGE", path, Value::text(""));
                action(move |rt, ctx| {
                    let message = message(rt, ctx).as_text();
                    rt.log_user(&ctx.entity, &message);
                    Ok(Flow::Continue)
                })
            }
            _ => {
                self.diagnose(path, node, "block cannot be used as a statement");
                return None;
            }
        };
        Some(statement)
    }
}
