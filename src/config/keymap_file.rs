//! Keymap file parser
//!
//! Line-oriented remapping file:
//!
//! ```text
//! # comment
//! key00=1:VARIATION:blue
//! mac00=PLUGGED:[1:FILL,0:Drum Mute]
//! var00=EncStep:4
//! ```
//!
//! Key lines are assigned in order: the first 12 go to the base layer, the
//! next 12 to the shift layer. The numeric suffix is a label only. Any
//! problem anywhere rejects the whole file.

use std::path::Path;
use tracing::{debug, warn};

use crate::commands::{CommandSet, Family};
use crate::error::KeymapError;
use crate::keymap::{parse_step, BindingFault, Color, Layer, RawKeymap, RawMacro, KEY_COUNT};

/// Key lines accepted per file (base + shift)
pub const MAX_KEY_LINES: usize = KEY_COUNT * 2;

/// Diagnostics logged individually before summarising the rest
pub const MAX_REPORTED: usize = 5;

/// One `keyNN=` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLine {
    pub line: usize,
    pub layer: Layer,
    pub index: usize,
    pub family: Family,
    pub command: String,
    pub color: Color,
}

impl KeyLine {
    /// Raw `"<digit>:<name>"` form stored in the keymap
    pub fn binding_string(&self) -> String {
        format!("{}:{}", self.family.digit(), self.command)
    }
}

/// One `macNN=` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroLine {
    pub line: usize,
    pub name: String,
    pub steps: Vec<String>,
}

/// Engine options set by `varNN=` lines; `None` keeps the current value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineVars {
    /// `EncQuad`
    pub quad_enabled: Option<bool>,
    /// `EncStep`: 2, 4 or 8
    pub step: Option<u8>,
    /// `EncFwd`
    pub forward: Option<bool>,
    /// `EncGrad`
    pub graduated: Option<bool>,
}

/// A fully validated keymap file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeymapFile {
    pub keys: Vec<KeyLine>,
    pub macros: Vec<MacroLine>,
    pub vars: EngineVars,
}

impl KeymapFile {
    /// Parse and validate file contents against a profile's tables
    pub fn parse(text: &str, commands: &CommandSet) -> Result<Self, Vec<KeymapError>> {
        let mut parser = Parser {
            commands,
            file: KeymapFile::default(),
            errors: Vec::new(),
            key_lines: 0,
        };

        for (idx, raw) in text.lines().enumerate() {
            parser.line(idx + 1, raw);
        }

        if parser.errors.is_empty() {
            debug!(
                "Keymap parsed: {} keys, {} macros",
                parser.file.keys.len(),
                parser.file.macros.len()
            );
            Ok(parser.file)
        } else {
            Err(parser.errors)
        }
    }

    /// Read and parse a keymap file
    pub async fn load(path: &Path, commands: &CommandSet) -> Result<Self, Vec<KeymapError>> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            vec![KeymapError::Io {
                path: path.to_path_buf(),
                message: e.to_string(),
            }]
        })?;
        Self::parse(&text, commands)
    }

    /// Apply this file on top of `current`.
    ///
    /// Listed keys replace their slot on the assigned layer; macros are
    /// replaced wholesale when the file defines any. Macro references are
    /// checked against the resulting macro set.
    pub fn overlay(&self, current: &RawKeymap) -> Result<RawKeymap, Vec<KeymapError>> {
        let mut next = current.clone();

        if !self.macros.is_empty() {
            next.macros = self
                .macros
                .iter()
                .map(|m| RawMacro {
                    name: m.name.clone(),
                    steps: m.steps.clone(),
                })
                .collect();
        }

        let missing: Vec<KeymapError> = self
            .keys
            .iter()
            .filter(|k| k.family == Family::Macro && !next.has_macro(&k.command))
            .map(|k| KeymapError::UnknownMacro {
                line: k.line,
                name: k.command.clone(),
            })
            .collect();
        if !missing.is_empty() {
            return Err(missing);
        }

        for key in &self.keys {
            let layer = next.layer_mut(key.layer);
            layer.keys[key.index] = key.binding_string();
            layer.colors[key.index] = key.color;
        }

        Ok(next)
    }
}

/// Log diagnostics, capped at [`MAX_REPORTED`]
pub fn report(errors: &[KeymapError]) {
    warn!("Keymap rejected with {} error(s):", errors.len());
    for error in errors.iter().take(MAX_REPORTED) {
        warn!("  {}", error);
    }
    if errors.len() > MAX_REPORTED {
        warn!("  ... and {} more", errors.len() - MAX_REPORTED);
    }
}

struct Parser<'a> {
    commands: &'a CommandSet,
    file: KeymapFile,
    errors: Vec<KeymapError>,
    key_lines: usize,
}

impl Parser<'_> {
    fn line(&mut self, line: usize, raw: &str) {
        let text = raw.trim();
        if text.is_empty() || text.starts_with('#') {
            return;
        }

        let result = if let Some(rest) = text.strip_prefix("key") {
            self.key_line(line, text, rest)
        } else if let Some(rest) = text.strip_prefix("mac") {
            self.macro_line(line, text, rest)
        } else if let Some(rest) = text.strip_prefix("var") {
            self.var_line(line, text, rest)
        } else {
            Err(KeymapError::UnknownEntry {
                line,
                text: text.to_string(),
            })
        };

        if let Err(e) = result {
            self.errors.push(e);
        }
    }

    fn key_line(&mut self, line: usize, text: &str, rest: &str) -> Result<(), KeymapError> {
        let malformed = || KeymapError::Malformed {
            line,
            kind: "key",
            text: text.to_string(),
        };

        // Position is taken even by a bad line so later lines keep their slots
        let slot = self.key_lines;
        self.key_lines += 1;

        let value = assignment(rest).ok_or_else(malformed)?;
        let (digit, rest) = value.split_once(':').ok_or_else(malformed)?;
        let (command, color) = rest.rsplit_once(':').ok_or_else(malformed)?;
        let command = command.trim();
        if command.is_empty() {
            return Err(malformed());
        }

        let family = Family::from_digit(digit).ok_or_else(|| KeymapError::BadFamily {
            line,
            family: digit.trim().to_string(),
        })?;
        if family != Family::Macro && self.commands.lookup(family, command).is_none() {
            return Err(KeymapError::UnknownCommand {
                line,
                family,
                name: command.to_string(),
            });
        }

        let color = Color::from_name(color).ok_or_else(|| KeymapError::UnknownColor {
            line,
            name: color.trim().to_string(),
        })?;

        if slot >= MAX_KEY_LINES {
            return Err(KeymapError::TooManyKeys {
                line,
                max: MAX_KEY_LINES,
            });
        }
        let (layer, index) = if slot < KEY_COUNT {
            (Layer::Base, slot)
        } else {
            (Layer::Shift, slot - KEY_COUNT)
        };

        self.file.keys.push(KeyLine {
            line,
            layer,
            index,
            family,
            command: command.to_string(),
            color,
        });
        Ok(())
    }

    fn macro_line(&mut self, line: usize, text: &str, rest: &str) -> Result<(), KeymapError> {
        let malformed = || KeymapError::Malformed {
            line,
            kind: "macro",
            text: text.to_string(),
        };

        let value = assignment(rest).ok_or_else(malformed)?;
        let (name, list) = value.split_once(":[").ok_or_else(malformed)?;
        let list = list.trim_end().strip_suffix(']').ok_or_else(malformed)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(malformed());
        }

        let mut steps = Vec::new();
        for step in list.split(',').map(str::trim) {
            if step.is_empty() {
                return Err(malformed());
            }
            parse_step(step, self.commands).map_err(|fault| match fault {
                BindingFault::UnknownFamily(family) => KeymapError::BadFamily { line, family },
                BindingFault::UnknownCommand(family) => KeymapError::UnknownCommand {
                    line,
                    family,
                    name: step.split_once(':').map(|(_, n)| n).unwrap_or(step).to_string(),
                },
                BindingFault::NestedMacro | BindingFault::UnknownMacro => {
                    KeymapError::NestedMacro {
                        line,
                        step: step.to_string(),
                    }
                }
                BindingFault::Malformed => malformed(),
            })?;
            steps.push(step.to_string());
        }

        let entry = MacroLine {
            line,
            name: name.to_string(),
            steps,
        };
        match self.file.macros.iter_mut().find(|m| m.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.file.macros.push(entry),
        }
        Ok(())
    }

    fn var_line(&mut self, line: usize, text: &str, rest: &str) -> Result<(), KeymapError> {
        let value = assignment(rest).ok_or_else(|| KeymapError::Malformed {
            line,
            kind: "variable",
            text: text.to_string(),
        })?;
        let (name, raw) = value.split_once(':').ok_or_else(|| KeymapError::Malformed {
            line,
            kind: "variable",
            text: text.to_string(),
        })?;
        let (name, raw) = (name.trim(), raw.trim());

        let bad = || KeymapError::BadVariable {
            line,
            name: name.to_string(),
            value: raw.to_string(),
        };
        let vars = &mut self.file.vars;

        match name {
            "EncQuad" => vars.quad_enabled = Some(parse_bool(raw).ok_or_else(bad)?),
            "EncFwd" => vars.forward = Some(parse_bool(raw).ok_or_else(bad)?),
            "EncGrad" => vars.graduated = Some(parse_bool(raw).ok_or_else(bad)?),
            "EncStep" => match raw.parse::<u8>() {
                Ok(step @ (2 | 4 | 8)) => vars.step = Some(step),
                _ => return Err(bad()),
            },
            _ => {
                return Err(KeymapError::UnknownVariable {
                    line,
                    name: name.to_string(),
                })
            }
        }
        debug!("Keymap variable {} = {}", name, raw);
        Ok(())
    }
}

/// `NN=<value>` after the line prefix; returns `<value>`
fn assignment(rest: &str) -> Option<&str> {
    let (tag, value) = rest.split_once('=')?;
    let tag = tag.trim();
    if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(value.trim())
}

fn parse_bool(raw: &str) -> Option<bool> {
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{DeviceProfile, ProfileKind};

    fn ketron() -> &'static CommandSet {
        CommandSet::ketron()
    }

    fn defaults() -> RawKeymap {
        DeviceProfile::for_kind(ProfileKind::EvmPlus).default_keymap()
    }

    #[test]
    fn test_key_line() {
        let file = KeymapFile::parse("key00=0:Start/Stop:red\n", ketron()).unwrap();
        assert_eq!(
            file.keys,
            vec![KeyLine {
                line: 1,
                layer: Layer::Base,
                index: 0,
                family: Family::Pedal,
                command: "Start/Stop".into(),
                color: Color::RED,
            }]
        );
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let text = "# header\n\n   \n  # indented comment\nkey00=1:VARIATION:blue\n";
        let file = KeymapFile::parse(text, ketron()).unwrap();
        assert_eq!(file.keys.len(), 1);
        assert_eq!(file.keys[0].line, 5);
    }

    #[test]
    fn test_sequential_layer_assignment() {
        let mut text = String::new();
        for i in 0..14 {
            text.push_str(&format!("key{:02}=0:Arr.A:blue\n", 99 - i));
        }
        let file = KeymapFile::parse(&text, ketron()).unwrap();
        assert_eq!(file.keys[11].layer, Layer::Base);
        assert_eq!(file.keys[11].index, 11);
        assert_eq!(file.keys[12].layer, Layer::Shift);
        assert_eq!(file.keys[12].index, 0);
        assert_eq!(file.keys[13].index, 1);
    }

    #[test]
    fn test_too_many_keys() {
        let text = "key00=0:Arr.A:blue\n".repeat(25);
        let errors = KeymapFile::parse(&text, ketron()).unwrap_err();
        assert_eq!(errors, vec![KeymapError::TooManyKeys { line: 25, max: 24 }]);
    }

    #[test]
    fn test_garbage_key_line() {
        let errors = KeymapFile::parse("key00=garbage", ketron()).unwrap_err();
        assert!(matches!(errors[0], KeymapError::Malformed { line: 1, kind: "key", .. }));
    }

    #[test]
    fn test_key_errors() {
        let text = "\
key00=7:Arr.A:blue
key01=0:Arr.Z:blue
key02=0:Arr.A:magenta
key03=1:Arr.A:blue
";
        let errors = KeymapFile::parse(text, ketron()).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert_eq!(errors[0], KeymapError::BadFamily { line: 1, family: "7".into() });
        assert!(matches!(errors[1], KeymapError::UnknownCommand { line: 2, family: Family::Pedal, .. }));
        assert_eq!(errors[2], KeymapError::UnknownColor { line: 3, name: "magenta".into() });
        assert!(matches!(errors[3], KeymapError::UnknownCommand { line: 4, family: Family::Tab, .. }));
    }

    #[test]
    fn test_unknown_prefix() {
        let errors = KeymapFile::parse("knob00=1:Arr.A", ketron()).unwrap_err();
        assert!(matches!(errors[0], KeymapError::UnknownEntry { line: 1, .. }));
    }

    #[test]
    fn test_macro_line() {
        let file = KeymapFile::parse("mac00=PLUGGED:[1:FILL, 0:Sostenuto]", ketron()).unwrap();
        assert_eq!(file.macros[0].name, "PLUGGED");
        assert_eq!(file.macros[0].steps, vec!["1:FILL", "0:Sostenuto"]);
    }

    #[test]
    fn test_macro_errors() {
        let text = "\
mac00=NOLIST
mac01=X:[1:FILL
mac02=Y:[0:Nope]
mac03=Z:[2:PLUGGED]
mac04=W:[]
";
        let errors = KeymapFile::parse(text, ketron()).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(matches!(errors[0], KeymapError::Malformed { kind: "macro", .. }));
        assert!(matches!(errors[1], KeymapError::Malformed { kind: "macro", .. }));
        assert!(matches!(
            &errors[2],
            KeymapError::UnknownCommand { line: 3, name, .. } if name == "Nope"
        ));
        assert!(matches!(errors[3], KeymapError::NestedMacro { line: 4, .. }));
        assert!(matches!(errors[4], KeymapError::Malformed { line: 5, .. }));
    }

    #[test]
    fn test_vars() {
        let text = "var00=EncQuad:False\nvar01=EncStep:4\nvar02=EncFwd:true\nvar03=EncGrad:True\n";
        let file = KeymapFile::parse(text, ketron()).unwrap();
        assert_eq!(
            file.vars,
            EngineVars {
                quad_enabled: Some(false),
                step: Some(4),
                forward: Some(true),
                graduated: Some(true),
            }
        );
    }

    #[test]
    fn test_var_errors() {
        let text = "var00=EncStep:5\nvar01=EncQuad:yes\nvar02=Speed:1\nvar03=EncFwd\n";
        let errors = KeymapFile::parse(text, ketron()).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(matches!(errors[0], KeymapError::BadVariable { line: 1, .. }));
        assert!(matches!(errors[1], KeymapError::BadVariable { line: 2, .. }));
        assert!(matches!(errors[2], KeymapError::UnknownVariable { line: 3, .. }));
        assert!(matches!(errors[3], KeymapError::Malformed { line: 4, .. }));
    }

    #[test]
    fn test_overlay_partial_layer() {
        let file = KeymapFile::parse("key00=0:Start/Stop:red\n", ketron()).unwrap();
        let current = defaults();
        let next = file.overlay(&current).unwrap();

        assert_eq!(next.base.keys[0], "0:Start/Stop");
        assert_eq!(next.base.colors[0], Color::RED);
        assert_eq!(next.base.keys[1], current.base.keys[1]);
        assert_eq!(next.shift, current.shift);
        assert_eq!(next.macros, current.macros);
    }

    #[test]
    fn test_overlay_macro_reference_checked_after_parse() {
        // Key refers to a macro defined further down
        let text = "key00=2:MINE:green\nmac00=MINE:[1:FILL]\n";
        let file = KeymapFile::parse(text, ketron()).unwrap();
        let next = file.overlay(&defaults()).unwrap();
        assert_eq!(next.macros.len(), 1);
        assert_eq!(next.base.keys[0], "2:MINE");
    }

    #[test]
    fn test_overlay_rejects_unknown_macro() {
        let text = "key00=2:PLUGGED:green\nmac00=MINE:[1:FILL]\n";
        let file = KeymapFile::parse(text, ketron()).unwrap();
        let errors = file.overlay(&defaults()).unwrap_err();
        assert_eq!(errors, vec![KeymapError::UnknownMacro { line: 1, name: "PLUGGED".into() }]);
    }

    #[test]
    fn test_overlay_keeps_default_macros_when_none_defined() {
        let file = KeymapFile::parse("key00=2:PLUGGED:green\n", ketron()).unwrap();
        assert!(file.overlay(&defaults()).is_ok());
    }
}
