//! Every block type the compiler understands, and which of their fields hold
//! dropdown references to other project objects.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockShape {
    /// Event trigger anchoring a statement body.
    Hat,
    Statement,
    /// Value-producing block usable in an input slot.
    Expression,
}

macro_rules! block_kinds {
    ($($variant:ident => $name:literal, $shape:ident;)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum BlockKind {
            $($variant,)*
        }

        impl BlockKind {
            pub const ALL: &'static [BlockKind] = &[$(BlockKind::$variant,)*];

            pub fn parse(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(BlockKind::$variant),)*
                    _ => None,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(BlockKind::$variant => $name,)*
                }
            }

            pub fn shape(self) -> BlockShape {
                match self {
                    $(BlockKind::$variant => BlockShape::$shape,)*
                }
            }
        }
    };
}

block_kinds! {
    WhenGameStarts => "when_game_starts", Hat;
    WhenKeyPressed => "when_key_pressed", Hat;
    WhenClicked => "when_clicked", Hat;
    WhenTouching => "when_touching", Hat;
    WhenMessageReceived => "when_message_received", Hat;
    EveryFrame => "every_frame", Hat;
    WhenCloneStarts => "when_clone_starts", Hat;

    MoveSteps => "move_steps", Statement;
    TurnDegrees => "turn_degrees", Statement;
    GoToXy => "go_to_xy", Statement;
    ChangeX => "change_x", Statement;
    ChangeY => "change_y", Statement;
    SetX => "set_x", Statement;
    SetY => "set_y", Statement;
    PointDirection => "point_direction", Statement;
    PointTowards => "point_towards", Statement;
    GlideToXy => "glide_to_xy", Statement;
    GoToTarget => "go_to_target", Statement;
    EnablePhysics => "enable_physics", Statement;
    SetVelocity => "set_velocity", Statement;
    SetGravityScale => "set_gravity_scale", Statement;
    Show => "show", Statement;
    Hide => "hide", Statement;
    SwitchCostume => "switch_costume", Statement;
    NextCostume => "next_costume", Statement;
    SetScale => "set_scale", Statement;
    ChangeScale => "change_scale", Statement;
    SetDepth => "set_depth", Statement;
    PlaySound => "play_sound", Statement;
    PlaySoundUntilDone => "play_sound_until_done", Statement;
    StopAllSounds => "stop_all_sounds", Statement;
    WaitSeconds => "wait_seconds", Statement;
    WaitUntil => "wait_until", Statement;
    Repeat => "repeat", Statement;
    RepeatUntil => "repeat_until", Statement;
    ForEach => "for_each", Statement;
    If => "if", Statement;
    IfElse => "if_else", Statement;
    Forever => "forever", Statement;
    StopAll => "stop_all", Statement;
    StopSelf => "stop_self", Statement;
    CreateClone => "create_clone", Statement;
    DeleteSelf => "delete_self", Statement;
    Broadcast => "broadcast", Statement;
    AttachTo => "attach_to", Statement;
    Detach => "detach", Statement;
    SwitchScene => "switch_scene", Statement;
    ResetTimer => "reset_timer", Statement;
    SetVariable => "set_variable", Statement;
    ChangeVariable => "change_variable", Statement;
    Log => "log", Statement;

    Number => "number", Expression;
    Text => "text", Expression;
    Boolean => "boolean", Expression;
    MathOp => "math_op", Expression;
    MathFn => "math_fn", Expression;
    RandomRange => "random_range", Expression;
    Compare => "compare", Expression;
    LogicOp => "logic_op", Expression;
    LogicNot => "logic_not", Expression;
    Join => "join", Expression;
    TextLength => "text_length", Expression;
    GetVariable => "get_variable", Expression;
    Touching => "touching", Expression;
    DistanceTo => "distance_to", Expression;
    KeyDown => "key_down", Expression;
    PointerX => "pointer_x", Expression;
    PointerY => "pointer_y", Expression;
    PointerDown => "pointer_down", Expression;
    GetTouchingObject => "get_touching_object", Expression;
    MyX => "my_x", Expression;
    MyY => "my_y", Expression;
    MyDirection => "my_direction", Expression;
    MyCostume => "my_costume", Expression;
    MyScale => "my_scale", Expression;
    Timer => "timer", Expression;
    IsOnGround => "is_on_ground", Expression;
    MyId => "my_id", Expression;
    IsClone => "is_clone", Expression;
}

impl BlockKind {
    pub fn is_hat(self) -> bool {
        self.shape() == BlockShape::Hat
    }

    pub fn is_expression(self) -> bool {
        self.shape() == BlockShape::Expression
    }

    pub fn is_hat_name(name: &str) -> bool {
        Self::parse(name).is_some_and(Self::is_hat)
    }
}

/// What a dropdown reference field points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// A concrete entity id (or `_myself_` / `_pointer_` where the block allows it).
    Entity,
    /// A sensing token: entity id, `component:<id>`, or a reserved world token.
    SensingTarget,
    Variable,
    Sound,
    Costume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceField {
    pub block: BlockKind,
    pub field: &'static str,
    pub kind: ReferenceKind,
}

const fn reference(block: BlockKind, field: &'static str, kind: ReferenceKind) -> ReferenceField {
    ReferenceField { block, field, kind }
}

const REFERENCE_FIELDS: &[ReferenceField] = &[
    reference(BlockKind::WhenTouching, "TARGET", ReferenceKind::SensingTarget),
    reference(BlockKind::GoToTarget, "TARGET", ReferenceKind::Entity),
    reference(BlockKind::PointTowards, "TARGET", ReferenceKind::Entity),
    reference(BlockKind::SwitchCostume, "COSTUME", ReferenceKind::Costume),
    reference(BlockKind::PlaySound, "SOUND", ReferenceKind::Sound),
    reference(BlockKind::PlaySoundUntilDone, "SOUND", ReferenceKind::Sound),
    reference(BlockKind::CreateClone, "TARGET", ReferenceKind::Entity),
    reference(BlockKind::AttachTo, "TARGET", ReferenceKind::Entity),
    reference(BlockKind::ForEach, "VARIABLE", ReferenceKind::Variable),
    reference(BlockKind::SetVariable, "VARIABLE", ReferenceKind::Variable),
    reference(BlockKind::ChangeVariable, "VARIABLE", ReferenceKind::Variable),
    reference(BlockKind::GetVariable, "VARIABLE", ReferenceKind::Variable),
    reference(BlockKind::Touching, "TARGET", ReferenceKind::SensingTarget),
    reference(BlockKind::DistanceTo, "TARGET", ReferenceKind::SensingTarget),
    reference(BlockKind::GetTouchingObject, "FILTER", ReferenceKind::SensingTarget),
];

/// Every dropdown-bearing block type with its reference field, for pre-play validation.
pub fn reference_fields() -> &'static [ReferenceField] {
    REFERENCE_FIELDS
}

pub fn reference_field(block: BlockKind) -> Option<&'static ReferenceField> {
    REFERENCE_FIELDS.iter().find(|entry| entry.block == block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_parse() {
        for kind in BlockKind::ALL {
            assert_eq!(BlockKind::parse(kind.name()), Some(*kind));
        }
        assert_eq!(BlockKind::parse("teleport_to_moon"), None);
    }

    #[test]
    fn every_reference_field_belongs_to_a_non_hat_or_touch_hat() {
        assert!(reference_fields().iter().all(|entry| !entry.block.is_hat() || entry.block == BlockKind::WhenTouching));
        assert_eq!(reference_field(BlockKind::PlaySound).map(|entry| entry.kind), Some(ReferenceKind::Sound));
        assert!(reference_field(BlockKind::MoveSteps).is_none());
    }

    #[test]
    fn hats_are_recognised_by_name() {
        assert!(BlockKind::is_hat_name("when_clicked"));
        assert!(!BlockKind::is_hat_name("move_steps"));
        assert!(!BlockKind::is_hat_name("unknown"));
    }
}
