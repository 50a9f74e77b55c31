//! Command tables
//!
//! Static name → code mappings for every message family a device profile
//! understands. Tables are built once per protocol and shared for the
//! lifetime of the process.

pub mod ketron;
pub mod notes;
pub mod yamaha;

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Message family selected by the leading digit of a binding string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// Pedal-style SysEx (Ketron) or section SysEx (Yamaha)
    Pedal,
    /// Tab-style SysEx
    Tab,
    /// User macro defined in the keymap file
    Macro,
    /// Control Change, sent 127 then 0
    Cc,
    /// Note On then Note Off
    Note,
}

impl Family {
    /// Parse the single-digit family prefix (`0`..`4`)
    pub fn from_digit(digit: &str) -> Option<Self> {
        match digit.trim() {
            "0" => Some(Family::Pedal),
            "1" => Some(Family::Tab),
            "2" => Some(Family::Macro),
            "3" => Some(Family::Cc),
            "4" => Some(Family::Note),
            _ => None,
        }
    }

    pub fn digit(self) -> u8 {
        match self {
            Family::Pedal => 0,
            Family::Tab => 1,
            Family::Macro => 2,
            Family::Cc => 3,
            Family::Note => 4,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Family::Pedal => "pedal",
            Family::Tab => "tab",
            Family::Macro => "macro",
            Family::Cc => "cc",
            Family::Note => "note",
        };
        f.write_str(name)
    }
}

/// Immutable name → code table for one family
#[derive(Debug, Clone, Default)]
pub struct CommandTable {
    codes: HashMap<String, u16>,
}

impl CommandTable {
    /// Build a table; the first occurrence of a duplicated name wins
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, u16)>,
        S: Into<String>,
    {
        let mut codes = HashMap::new();
        for (name, code) in entries {
            codes.entry(name.into()).or_insert(code);
        }
        Self { codes }
    }

    /// Look up a command code. `None` means unknown; `Some(0)` is a real code.
    pub fn lookup(&self, name: &str) -> Option<u16> {
        self.codes.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.codes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Command names in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.codes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Every table a protocol offers, indexed by family
#[derive(Debug)]
pub struct CommandSet {
    pedal: CommandTable,
    tab: CommandTable,
    cc: CommandTable,
    note: CommandTable,
}

/// General-purpose CCs available on every profile
const GENERAL_CC: &[(&str, u16)] = &[
    ("VOLUME", 7),
    ("PAN", 10),
    ("EXPRESSION", 11),
    ("SUSTAIN", 64),
];

static KETRON: OnceLock<CommandSet> = OnceLock::new();
static YAMAHA: OnceLock<CommandSet> = OnceLock::new();

impl CommandSet {
    /// Ketron EVM / EVM Plus tables
    pub fn ketron() -> &'static CommandSet {
        KETRON.get_or_init(|| CommandSet {
            pedal: CommandTable::from_entries(ketron::PEDAL.iter().copied()),
            tab: CommandTable::from_entries(ketron::TAB.iter().copied()),
            cc: CommandTable::from_entries(
                ketron::SLIDER_CC.iter().chain(GENERAL_CC.iter()).copied(),
            ),
            note: CommandTable::from_entries(notes::entries()),
        })
    }

    /// Yamaha Genos tables (no tab family)
    pub fn yamaha() -> &'static CommandSet {
        YAMAHA.get_or_init(|| CommandSet {
            pedal: CommandTable::from_entries(yamaha::SECTION.iter().copied()),
            tab: CommandTable::default(),
            cc: CommandTable::from_entries(GENERAL_CC.iter().copied()),
            note: CommandTable::from_entries(notes::entries()),
        })
    }

    /// Table for a family. Macros live in the keymap, not here.
    pub fn table(&self, family: Family) -> Option<&CommandTable> {
        match family {
            Family::Pedal => Some(&self.pedal),
            Family::Tab => Some(&self.tab),
            Family::Cc => Some(&self.cc),
            Family::Note => Some(&self.note),
            Family::Macro => None,
        }
    }

    pub fn lookup(&self, family: Family, name: &str) -> Option<u16> {
        self.table(family).and_then(|t| t.lookup(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_digits() {
        for family in [
            Family::Pedal,
            Family::Tab,
            Family::Macro,
            Family::Cc,
            Family::Note,
        ] {
            let digit = family.digit().to_string();
            assert_eq!(Family::from_digit(&digit), Some(family));
        }
        assert_eq!(Family::from_digit("5"), None);
        assert_eq!(Family::from_digit("x"), None);
        assert_eq!(Family::from_digit(""), None);
    }

    #[test]
    fn test_code_zero_is_distinct_from_missing() {
        let set = CommandSet::ketron();
        assert_eq!(set.lookup(Family::Pedal, "Sustain"), Some(0));
        assert_eq!(set.lookup(Family::Tab, "DIAL_DOWN"), Some(0));
        assert_eq!(set.lookup(Family::Pedal, "No Such Pedal"), None);
    }

    #[test]
    fn test_ketron_tables_have_unique_names() {
        let set = CommandSet::ketron();
        assert_eq!(set.table(Family::Pedal).map(|t| t.len()), Some(ketron::PEDAL.len()));
        assert_eq!(set.table(Family::Tab).map(|t| t.len()), Some(ketron::TAB.len()));
    }

    #[test]
    fn test_ketron_lookups() {
        let set = CommandSet::ketron();
        assert_eq!(set.lookup(Family::Pedal, "Start/Stop"), Some(0x12));
        assert_eq!(set.lookup(Family::Pedal, "Arr.Off"), Some(0x94));
        assert_eq!(set.lookup(Family::Tab, "ROTOR_FAST"), Some(0x61));
        assert_eq!(set.lookup(Family::Cc, "LOWERS"), Some(0x6C));
        assert_eq!(set.lookup(Family::Cc, "EXPRESSION"), Some(11));
        assert_eq!(set.lookup(Family::Note, "C4"), Some(60));
        assert_eq!(set.lookup(Family::Macro, "PLUGGED"), None);
    }

    #[test]
    fn test_yamaha_lookups() {
        let set = CommandSet::yamaha();
        assert_eq!(set.lookup(Family::Pedal, "Main A"), Some(0x08));
        assert_eq!(set.lookup(Family::Pedal, "Ending 4"), Some(0x23));
        assert_eq!(set.lookup(Family::Pedal, "Arr.A"), None);
        assert!(set.table(Family::Tab).is_some_and(|t| t.is_empty()));
    }
}
