use std::fmt;

pub const EDGE_TOKEN: &str = "_edge_";
pub const GROUND_TOKEN: &str = "_ground_";
pub const POINTER_TOKEN: &str = "_pointer_";
/// Older programs spell the pointer token this way.
pub const MOUSE_TOKEN: &str = "_mouse_";
pub const MY_CLONES_TOKEN: &str = "_my_clones_";
pub const MYSELF_TOKEN: &str = "_myself_";
pub const COMPONENT_PREFIX: &str = "component:";

/// Resolved form of a touching/distance dropdown value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SensingTarget {
    Entity(String),
    /// Any live instance carrying the given reusable component.
    ComponentGroup(String),
    Edge,
    Ground,
    Pointer,
    /// Live entities sharing the sensing entity's template lineage.
    MyClones,
}

impl SensingTarget {
    /// Parses a dropdown literal. Empty values resolve to nothing.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        match raw {
            "" => None,
            EDGE_TOKEN => Some(Self::Edge),
            GROUND_TOKEN => Some(Self::Ground),
            POINTER_TOKEN | MOUSE_TOKEN => Some(Self::Pointer),
            MY_CLONES_TOKEN => Some(Self::MyClones),
            _ => match raw.strip_prefix(COMPONENT_PREFIX) {
                Some("") => None,
                Some(component) => Some(Self::ComponentGroup(component.to_string())),
                None => Some(Self::Entity(raw.to_string())),
            },
        }
    }

    pub fn token(&self) -> String {
        match self {
            Self::Entity(id) => id.clone(),
            Self::ComponentGroup(component) => format!("{COMPONENT_PREFIX}{component}"),
            Self::Edge => EDGE_TOKEN.to_string(),
            Self::Ground => GROUND_TOKEN.to_string(),
            Self::Pointer => POINTER_TOKEN.to_string(),
            Self::MyClones => MY_CLONES_TOKEN.to_string(),
        }
    }

    /// True for targets that name another entity or group rather than the world.
    pub fn is_entity_like(&self) -> bool {
        matches!(self, Self::Entity(_) | Self::ComponentGroup(_) | Self::MyClones)
    }
}

impl fmt::Display for SensingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

/// Reserved tokens are never remapped.
pub fn is_reserved_token(raw: &str) -> bool {
    matches!(
        raw.trim(),
        "" | EDGE_TOKEN | GROUND_TOKEN | POINTER_TOKEN | MOUSE_TOKEN | MY_CLONES_TOKEN | MYSELF_TOKEN
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reserved_tokens_and_wildcards() {
        assert_eq!(SensingTarget::parse("_edge_"), Some(SensingTarget::Edge));
        assert_eq!(SensingTarget::parse("_mouse_"), Some(SensingTarget::Pointer));
        assert_eq!(SensingTarget::parse("component:coin"), Some(SensingTarget::ComponentGroup("coin".into())));
        assert_eq!(SensingTarget::parse("player"), Some(SensingTarget::Entity("player".into())));
        assert_eq!(SensingTarget::parse("  "), None);
        assert_eq!(SensingTarget::parse("component:"), None);
    }

    #[test]
    fn token_round_trips() {
        for raw in ["_edge_", "_ground_", "_pointer_", "_my_clones_", "component:c1", "hero"] {
            let parsed = SensingTarget::parse(raw).expect("token parses");
            assert_eq!(parsed.token(), raw);
        }
    }
}
