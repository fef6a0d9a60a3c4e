use super::{Compiler, Expr};
use crate::blocks::{BlockKind, BlockNode, SensingTarget};
use crate::input::KeyCode;
use crate::value::Value;
use std::cmp::Ordering;
use std::rc::Rc;

pub(crate) fn constant(value: Value) -> Expr {
    Rc::new(move |_, _| value.clone())
}

#[derive(Debug, Clone, Copy)]
enum MathOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Min,
    Max,
}

impl MathOp {
    fn parse(raw: &str) -> Option<Self> {
        Some(match raw.trim().to_ascii_lowercase().as_str() {
            "add" | "+" => Self::Add,
            "sub" | "-" => Self::Sub,
            "mul" | "*" => Self::Mul,
            "div" | "/" => Self::Div,
            "mod" | "%" => Self::Mod,
            "pow" | "^" => Self::Pow,
            "min" => Self::Min,
            "max" => Self::Max,
            _ => return None,
        })
    }

    fn apply(self, a: f64, b: f64) -> f64 {
        let result = match self {
            Self::Add => a + b,
            Self::Sub => a - b,
            Self::Mul => a * b,
            Self::Div => a / b,
            // Floored: the result takes the divisor's sign.
            Self::Mod => a - b * (a / b).floor(),
            Self::Pow => a.powf(b),
            Self::Min => a.min(b),
            Self::Max => a.max(b),
        };
        if result.is_finite() {
            result
        } else {
            0.0
        }
    }
}

fn math_fn(name: &str) -> Option<fn(f64) -> f64> {
    let function: fn(f64) -> f64 = match name.trim().to_ascii_lowercase().as_str() {
        "abs" => f64::abs,
        "floor" => f64::floor,
        "ceil" | "ceiling" => f64::ceil,
        "round" => f64::round,
        "sqrt" => f64::sqrt,
        "sin" => |x: f64| x.to_radians().sin(),
        "cos" => |x: f64| x.to_radians().cos(),
        "tan" => |x: f64| x.to_radians().tan(),
        "ln" => f64::ln,
        "log10" | "log" => f64::log10,
        "neg" => |x: f64| -x,
        _ => return None,
    };
    Some(function)
}

fn comparison(raw: &str) -> Option<fn(Ordering) -> bool> {
    let test: fn(Ordering) -> bool = match raw.trim().to_ascii_lowercase().as_str() {
        "eq" | "=" | "==" => Ordering::is_eq,
        "neq" | "!=" => Ordering::is_ne,
        "lt" | "<" => Ordering::is_lt,
        "lte" | "<=" => Ordering::is_le,
        "gt" | ">" => Ordering::is_gt,
        "gte" | ">=" => Ordering::is_ge,
        _ => return None,
    };
    Some(test)
}

/// Literal numbers written without a fractional part pick whole random numbers.
fn looks_integral(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.fract() == 0.0,
        Value::Text(text) => !text.contains('.') && text.trim().parse::<f64>().is_ok(),
        Value::Bool(_) | Value::Null => true,
    }
}

impl Compiler {
    /// Expression for the `name` slot: the connected block when present, else the
    /// literal field of the same name, else `fallback`.
    pub(crate) fn value(&mut self, node: &BlockNode, name: &str, path: &str, fallback: Value) -> Expr {
        if let Some(input) = node.inputs.get(name) {
            return self.expr(input, &format!("{path}/{name}"));
        }
        constant(node.fields.get(name).cloned().unwrap_or(fallback))
    }

    pub(crate) fn number(&mut self, node: &BlockNode, name: &str, path: &str) -> Expr {
        self.value(node, name, path, Value::Number(0.0))
    }

    pub(crate) fn expr(&mut self, node: &BlockNode, path: &str) -> Expr {
        let Some(kind) = BlockKind::parse(&node.kind) else {
            self.diagnose(path, node, "unknown block type");
            return constant(Value::Null);
        };
        if !kind.is_expression() {
            self.diagnose(path, node, "statement or hat block used as a value");
            return constant(Value::Null);
        }
        match kind {
            BlockKind::Number => {
                let value = node.fields.get("NUM").map(Value::as_number).unwrap_or(0.0);
                constant(Value::Number(value))
            }
            BlockKind::Text => constant(Value::Text(node.field_text("TEXT").unwrap_or_default())),
            BlockKind::Boolean => constant(Value::Bool(node.fields.get("BOOL").is_some_and(Value::as_bool))),
            BlockKind::MathOp => {
                let raw = node.field_text("OP").unwrap_or_default();
                let Some(op) = MathOp::parse(&raw) else {
                    self.diagnose(path, node, format!("unknown math operator '{raw}'"));
                    return constant(Value::Number(0.0));
                };
                let a = self.number(node, "A", path);
                let b = self.number(node, "B", path);
                Rc::new(move |rt, ctx| {
                    let (x, y) = (a(rt, ctx).as_number(), b(rt, ctx).as_number());
                    Value::Number(op.apply(x, y))
                })
            }
            BlockKind::MathFn => {
                let raw = node.field_text("FN").unwrap_or_default();
                let Some(function) = math_fn(&raw) else {
                    self.diagnose(path, node, format!("unknown math function '{raw}'"));
                    return constant(Value::Number(0.0));
                };
                let x = self.number(node, "X", path);
                Rc::new(move |rt, ctx| {
                    let result = function(x(rt, ctx).as_number());
                    Value::Number(if result.is_finite() { result } else { 0.0 })
                })
            }
            BlockKind::RandomRange => {
                let integral = ["FROM", "TO"]
                    .iter()
                    .all(|slot| !node.inputs.contains_key(*slot) && node.fields.get(*slot).map_or(true, looks_integral));
                let from = self.number(node, "FROM", path);
                let to = self.number(node, "TO", path);
                Rc::new(move |rt, ctx| {
                    let (low, high) = (from(rt, ctx).as_number(), to(rt, ctx).as_number());
                    Value::Number(rt.random_between(low, high, integral))
                })
            }
            BlockKind::Compare => {
                let raw = node.field_text("OP").unwrap_or_default();
                let Some(test) = comparison(&raw) else {
                    self.diagnose(path, node, format!("unknown comparison '{raw}'"));
                    return constant(Value::Bool(false));
                };
                let a = self.value(node, "A", path, Value::Null);
                let b = self.value(node, "B", path, Value::Null);
                Rc::new(move |rt, ctx| {
                    let (x, y) = (a(rt, ctx), b(rt, ctx));
                    Value::Bool(test(x.compare(&y)))
                })
            }
            BlockKind::LogicOp => {
                let raw = node.field_text("OP").unwrap_or_default().to_ascii_lowercase();
                let a = self.value(node, "A", path, Value::Bool(false));
                let b = self.value(node, "B", path, Value::Bool(false));
                match raw.as_str() {
                    "and" => Rc::new(move |rt, ctx| Value::Bool(a(rt, ctx).as_bool() && b(rt, ctx).as_bool())),
                    "or" => Rc::new(move |rt, ctx| Value::Bool(a(rt, ctx).as_bool() || b(rt, ctx).as_bool())),
                    _ => {
                        self.diagnose(path, node, format!("unknown logic operator '{raw}'"));
                        constant(Value::Bool(false))
                    }
                }
            }
            BlockKind::LogicNot => {
                let x = self.value(node, "X", path, Value::Bool(false));
                Rc::new(move |rt, ctx| Value::Bool(!x(rt, ctx).as_bool()))
            }
            BlockKind::Join => {
                let a = self.value(node, "A", path, Value::text(""));
                let b = self.value(node, "B", path, Value::text(""));
                Rc::new(move |rt, ctx| {
                    let mut joined = a(rt, ctx).as_text();
                    joined.push_str(&b(rt, ctx).as_text());
                    Value::Text(joined)
                })
            }
            BlockKind::TextLength => {
                let text = self.value(node, "TEXT", path, Value::text(""));
                Rc::new(move |rt, ctx| Value::Number(text(rt, ctx).as_text().chars().count() as f64))
            }
            BlockKind::GetVariable => {
                let key = node.field_text("VARIABLE").unwrap_or_default();
                if key.trim().is_empty() {
                    self.diagnose(path, node, "no variable selected");
                    return constant(Value::Number(0.0));
                }
                Rc::new(move |rt, ctx| rt.variable(&ctx.entity, &key))
            }
            BlockKind::Touching => match self.sensing_target(node, "TARGET", path) {
                Some(target) => Rc::new(move |rt, ctx| Value::Bool(rt.sense_touching(&ctx.entity, &target))),
                None => constant(Value::Bool(false)),
            },
            BlockKind::DistanceTo => match self.sensing_target(node, "TARGET", path) {
                Some(target) => Rc::new(move |rt, ctx| {
                    rt.sense_distance(&ctx.entity, &target).map(|d| Value::Number(d as f64)).unwrap_or_default()
                }),
                None => constant(Value::Null),
            },
            BlockKind::KeyDown => {
                let raw = node.field_text("KEY").unwrap_or_default();
                match KeyCode::parse(&raw) {
                    Some(key) => Rc::new(move |rt, _| Value::Bool(rt.is_key_held(&key))),
                    None => {
                        self.diagnose(path, node, format!("unknown key '{raw}'"));
                        constant(Value::Bool(false))
                    }
                }
            }
            BlockKind::GetTouchingObject => {
                let filter = node.field_text("FILTER").and_then(|raw| SensingTarget::parse(&raw));
                Rc::new(move |rt, ctx| {
                    rt.touching_object(&ctx.entity, filter.as_ref()).map(Value::Text).unwrap_or_default()
                })
            }
            BlockKind::PointerX => Rc::new(|rt, _| Value::Number(rt.pointer_position().x as f64)),
            BlockKind::PointerY => Rc::new(|rt, _| Value::Number(rt.pointer_position().y as f64)),
            BlockKind::PointerDown => Rc::new(|rt, _| Value::Bool(rt.is_pointer_pressed())),
            BlockKind::MyX => Rc::new(|rt, ctx| {
                rt.entity_position(&ctx.entity).map(|p| Value::Number(p.x as f64)).unwrap_or_default()
            }),
            BlockKind::MyY => Rc::new(|rt, ctx| {
                rt.entity_position(&ctx.entity).map(|p| Value::Number(p.y as f64)).unwrap_or_default()
            }),
            BlockKind::MyDirection => Rc::new(|rt, ctx| {
                rt.entity_direction(&ctx.entity).map(|d| Value::Number(d as f64)).unwrap_or_default()
            }),
            BlockKind::MyCostume => Rc::new(|rt, ctx| {
                rt.entity_costume(&ctx.entity).map(|index| Value::Number(index as f64 + 1.0)).unwrap_or_default()
            }),
            BlockKind::MyScale => Rc::new(|rt, ctx| {
                rt.entity_scale(&ctx.entity).map(|s| Value::Number(s as f64)).unwrap_or_default()
            }),
            BlockKind::Timer => Rc::new(|rt, _| Value::Number(rt.timer())),
            BlockKind::IsOnGround => Rc::new(|rt, ctx| Value::Bool(rt.is_on_ground(&ctx.entity))),
            BlockKind::MyId => Rc::new(|_, ctx| Value::Text(ctx.entity.clone())),
            BlockKind::IsClone => Rc::new(|rt, ctx| Value::Bool(rt.is_clone(&ctx.entity))),
            _ => {
                self.diagnose(path, node, "block cannot be used as a value");
                constant(Value::Null)
            }
        }
    }

    pub(crate) fn sensing_target(&mut self, node: &BlockNode, field: &str, path: &str) -> Option<SensingTarget> {
        let raw = node.field_text(field).unwrap_or_default();
        let target = SensingTarget::parse(&raw);
        if target.is_none() {
            self.diagnose(path, node, "no target selected");
        }
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floored_modulo_follows_divisor_sign() {
        assert_eq!(MathOp::Mod.apply(-1.0, 5.0), 4.0);
        assert_eq!(MathOp::Mod.apply(7.0, -5.0), -3.0);
        assert_eq!(MathOp::Div.apply(1.0, 0.0), 0.0);
    }

    #[test]
    fn operators_accept_symbols_and_names() {
        assert!(matches!(MathOp::parse("+"), Some(MathOp::Add)));
        assert!(matches!(MathOp::parse("MAX"), Some(MathOp::Max)));
        assert!(MathOp::parse("xor").is_none());
        assert!(comparison("gte").is_some_and(|test| test(Ordering::Equal)));
        assert!(comparison("<").is_some_and(|test| !test(Ordering::Greater)));
    }

    #[test]
    fn trig_uses_degrees() {
        let sin = math_fn("sin").expect("sin");
        assert!((sin(90.0) - 1.0).abs() < 1e-12);
        assert!(math_fn("cbrt").is_none());
    }

    #[test]
    fn integral_literals() {
        assert!(looks_integral(&Value::Number(3.0)));
        assert!(looks_integral(&Value::text("10")));
        assert!(!looks_integral(&Value::text("1.0")));
        assert!(!looks_integral(&Value::Number(0.5)));
    }
}
