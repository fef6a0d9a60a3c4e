use glam::Vec2;
use std::collections::HashSet;
use std::fmt;

/// Normalized key identity shared by key hats, the `key_down` query and host events.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Named(NamedKeyCode),
    Character(String),
    /// Matches every key; only meaningful on the hat side.
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKeyCode {
    Space,
    Enter,
    Escape,
    Shift,
    Control,
    Up,
    Down,
    Left,
    Right,
}

impl NamedKeyCode {
    fn from_str(value: &str) -> Option<Self> {
        match value {
            "space" | " " | "spacebar" => Some(Self::Space),
            "enter" | "return" => Some(Self::Enter),
            "escape" | "esc" => Some(Self::Escape),
            "shift" | "left_shift" | "right_shift" | "shiftleft" | "shiftright" => Some(Self::Shift),
            "ctrl" | "control" | "left_ctrl" | "right_ctrl" | "controlleft" | "controlright" => {
                Some(Self::Control)
            }
            "up" | "arrowup" | "up arrow" | "up_arrow" => Some(Self::Up),
            "down" | "arrowdown" | "down arrow" | "down_arrow" => Some(Self::Down),
            "left" | "arrowleft" | "left arrow" | "left_arrow" => Some(Self::Left),
            "right" | "arrowright" | "right arrow" | "right_arrow" => Some(Self::Right),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Space => "space",
            Self::Enter => "enter",
            Self::Escape => "escape",
            Self::Shift => "shift",
            Self::Control => "control",
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl KeyCode {
    /// Accepts block dropdown values ("space", "up arrow", "a", "any") as well as host
    /// key names ("ArrowUp", "KeyA", " ").
    pub fn parse(raw: &str) -> Option<Self> {
        if raw == " " {
            return Some(Self::Named(NamedKeyCode::Space));
        }
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return None;
        }
        if normalized == "any" {
            return Some(Self::Any);
        }
        if let Some(named) = NamedKeyCode::from_str(&normalized) {
            return Some(Self::Named(named));
        }
        let stripped = normalized
            .strip_prefix("key")
            .or_else(|| normalized.strip_prefix("digit"))
            .filter(|rest| rest.chars().count() == 1)
            .unwrap_or(normalized.as_str());
        if stripped.chars().count() == 1 {
            return Some(Self::Character(stripped.to_string()));
        }
        None
    }

    /// Hat-side matching: `Any` accepts every pressed key.
    pub fn accepts(&self, pressed: &KeyCode) -> bool {
        matches!(self, KeyCode::Any) || self == pressed
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyCode::Named(named) => f.write_str(named.label()),
            KeyCode::Character(ch) => f.write_str(ch),
            KeyCode::Any => f.write_str("any"),
        }
    }
}

/// Held keys and pointer state. Pointer coordinates are stored in engine space
/// (canvas pixels, top-left origin).
#[derive(Debug, Default, Clone)]
pub struct InputState {
    held: HashSet<KeyCode>,
    pointer: Vec2,
    pointer_pressed: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the key was not already held.
    pub fn press(&mut self, key: KeyCode) -> bool {
        self.held.insert(key)
    }

    pub fn release(&mut self, key: &KeyCode) {
        self.held.remove(key);
    }

    pub fn is_held(&self, key: &KeyCode) -> bool {
        match key {
            KeyCode::Any => !self.held.is_empty(),
            other => self.held.contains(other),
        }
    }

    pub fn set_pointer(&mut self, position: Vec2) {
        self.pointer = position;
    }

    pub fn pointer(&self) -> Vec2 {
        self.pointer
    }

    pub fn set_pointer_pressed(&mut self, pressed: bool) {
        self.pointer_pressed = pressed;
    }

    pub fn pointer_pressed(&self) -> bool {
        self.pointer_pressed
    }

    pub fn clear(&mut self) {
        self.held.clear();
        self.pointer_pressed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_and_dropdown_names_agree() {
        assert_eq!(KeyCode::parse("ArrowUp"), KeyCode::parse("up arrow"));
        assert_eq!(KeyCode::parse(" "), Some(KeyCode::Named(NamedKeyCode::Space)));
        assert_eq!(KeyCode::parse("KeyA"), Some(KeyCode::Character("a".into())));
        assert_eq!(KeyCode::parse("A"), Some(KeyCode::Character("a".into())));
    }

    #[test]
    fn any_key_matches_everything() {
        let any = KeyCode::parse("any").expect("any parses");
        assert!(any.accepts(&KeyCode::Character("z".into())));
        let mut input = InputState::new();
        assert!(!input.is_held(&any));
        input.press(KeyCode::Character("z".into()));
        assert!(input.is_held(&any));
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert_eq!(KeyCode::parse(""), None);
        assert_eq!(KeyCode::parse("hyperdrive"), None);
    }
}
