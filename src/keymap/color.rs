//! Key colors

use std::fmt;

/// 24-bit RGB pixel value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color(pub u32);

impl Color {
    pub const WHITE: Color = Color(0x606060);
    pub const BLUE: Color = Color(0x000020);
    pub const GREEN: Color = Color(0x002000);
    pub const RED: Color = Color(0x200000);
    pub const ORANGE: Color = Color(0x701E02);
    pub const PURPLE: Color = Color(0x800080);
    pub const YELLOW: Color = Color(0x808000);
    pub const TEAL: Color = Color(0x004040);
    /// Shift lock indicator; not selectable from a keymap file
    pub const OFFWHITE: Color = Color(0xA47474);

    const NAMED: [(&'static str, Color); 8] = [
        ("red", Color::RED),
        ("green", Color::GREEN),
        ("blue", Color::BLUE),
        ("purple", Color::PURPLE),
        ("yellow", Color::YELLOW),
        ("orange", Color::ORANGE),
        ("white", Color::WHITE),
        ("teal", Color::TEAL),
    ];

    /// Resolve a keymap color name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Color> {
        let name = name.trim();
        Self::NAMED
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, c)| *c)
    }

    pub fn name(self) -> Option<&'static str> {
        Self::NAMED.iter().find(|(_, c)| *c == self).map(|(n, _)| *n)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "#{:06X}", self.0),
        }
    }
}
