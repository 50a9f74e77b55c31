//! Key lookup cache
//!
//! Raw bindings are stored as `"<family-digit>:<command-name>"` strings per
//! key and layer. `rebuild()` resolves every string once against the
//! command tables into a tagged [`Binding`], so a key press is a plain
//! array index. A rebuild produces a fresh snapshot that replaces the old
//! one in a single assignment.

pub mod color;

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::commands::{CommandSet, Family};
use crate::engine::shift::ShiftState;

pub use color::Color;

/// Number of keys on the pad
pub const KEY_COUNT: usize = 12;

/// Logical key that doubles as the shift modifier
pub const SHIFT_KEY: usize = 0;

/// Logical key that plays the connectivity test tune when held
pub const TUNE_KEY: usize = 11;

/// Key layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    Base,
    Shift,
}

impl Layer {
    pub fn index(self) -> usize {
        match self {
            Layer::Base => 0,
            Layer::Shift => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Layer::Base => "Base",
            Layer::Shift => "Shift",
        }
    }
}

/// A resolved table command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub family: Family,
    pub name: String,
    pub code: u16,
}

/// What a key does when pressed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Binding {
    /// Unbound, unresolvable, or out of range
    #[default]
    NoOp,
    Command(Command),
    /// Named macro; steps are looked up at fire time
    Macro(String),
}

impl Binding {
    pub fn is_noop(&self) -> bool {
        matches!(self, Binding::NoOp)
    }

    pub fn family(&self) -> Option<Family> {
        match self {
            Binding::NoOp => None,
            Binding::Command(cmd) => Some(cmd.family),
            Binding::Macro(_) => Some(Family::Macro),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Binding::NoOp => "",
            Binding::Command(cmd) => &cmd.name,
            Binding::Macro(name) => name,
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            Binding::Command(cmd) => cmd.code,
            _ => 0,
        }
    }
}

static NOOP: Binding = Binding::NoOp;

/// One layer of raw binding strings and colors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLayer {
    pub keys: [String; KEY_COUNT],
    pub colors: [Color; KEY_COUNT],
}

impl RawLayer {
    pub fn new(keys: [&str; KEY_COUNT], colors: [Color; KEY_COUNT]) -> Self {
        Self {
            keys: keys.map(str::to_string),
            colors,
        }
    }

    /// Layer with every key unbound
    pub fn empty() -> Self {
        Self {
            keys: std::array::from_fn(|_| String::new()),
            colors: [Color::WHITE; KEY_COUNT],
        }
    }
}

/// Named macro as raw step strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMacro {
    pub name: String,
    pub steps: Vec<String>,
}

/// Unresolved keymap: both layers plus the macro list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawKeymap {
    pub base: RawLayer,
    pub shift: RawLayer,
    pub macros: Vec<RawMacro>,
}

impl RawKeymap {
    pub fn layer(&self, layer: Layer) -> &RawLayer {
        match layer {
            Layer::Base => &self.base,
            Layer::Shift => &self.shift,
        }
    }

    pub fn layer_mut(&mut self, layer: Layer) -> &mut RawLayer {
        match layer {
            Layer::Base => &mut self.base,
            Layer::Shift => &mut self.shift,
        }
    }

    pub fn has_macro(&self, name: &str) -> bool {
        self.macros.iter().any(|m| m.name == name)
    }
}

/// Fully resolved keymap snapshot
#[derive(Debug, Clone)]
pub struct ResolvedKeymap {
    bindings: [[Binding; KEY_COUNT]; 2],
    colors: [[Color; KEY_COUNT]; 2],
    macros: HashMap<String, Vec<Command>>,
}

/// Why a raw string resolved to a no-op
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingFault {
    Malformed,
    UnknownFamily(String),
    UnknownCommand(Family),
    UnknownMacro,
    NestedMacro,
}

/// Parse a `"<digit>:<name>"` string into a binding.
///
/// An empty string is a deliberate no-op, not a fault.
pub fn parse_binding(
    raw: &str,
    commands: &CommandSet,
    macro_exists: impl Fn(&str) -> bool,
) -> Result<Binding, BindingFault> {
    if raw.trim().is_empty() {
        return Ok(Binding::NoOp);
    }
    let (digit, name) = raw.split_once(':').ok_or(BindingFault::Malformed)?;
    if name.is_empty() {
        return Err(BindingFault::Malformed);
    }
    let family =
        Family::from_digit(digit).ok_or_else(|| BindingFault::UnknownFamily(digit.to_string()))?;

    match family {
        Family::Macro => {
            if macro_exists(name) {
                Ok(Binding::Macro(name.to_string()))
            } else {
                Err(BindingFault::UnknownMacro)
            }
        }
        _ => commands
            .lookup(family, name)
            .map(|code| {
                Binding::Command(Command {
                    family,
                    name: name.to_string(),
                    code,
                })
            })
            .ok_or(BindingFault::UnknownCommand(family)),
    }
}

/// Parse one macro step; steps may not reference other macros
pub fn parse_step(raw: &str, commands: &CommandSet) -> Result<Command, BindingFault> {
    match parse_binding(raw, commands, |_| false) {
        Ok(Binding::Command(cmd)) => Ok(cmd),
        Ok(_) => Err(BindingFault::Malformed),
        Err(BindingFault::UnknownMacro) => Err(BindingFault::NestedMacro),
        Err(e) => Err(e),
    }
}

/// Precomputed per-layer key bindings
pub struct KeyLookupCache {
    commands: &'static CommandSet,
    raw: RawKeymap,
    resolved: Arc<ResolvedKeymap>,
}

impl KeyLookupCache {
    /// Build the cache and resolve the initial keymap
    pub fn new(commands: &'static CommandSet, raw: RawKeymap) -> Self {
        let (resolved, faults) = Self::resolve_all(commands, &raw);
        report_faults(&faults);
        let resolved = Arc::new(resolved);
        Self {
            commands,
            raw,
            resolved,
        }
    }

    pub fn commands(&self) -> &'static CommandSet {
        self.commands
    }

    pub fn raw(&self) -> &RawKeymap {
        &self.raw
    }

    /// Swap in a new raw keymap and rebuild.
    ///
    /// Each fallback is warned about here, once per installed keymap.
    pub fn replace(&mut self, raw: RawKeymap) -> usize {
        self.raw = raw;
        let faults = self.resolve_cached();
        report_faults(&faults);
        faults.len()
    }

    /// Recompute every cached binding from the raw strings.
    ///
    /// Returns the number of entries that fell back to a no-op.
    pub fn rebuild(&mut self) -> usize {
        let faults = self.resolve_cached();
        debug!("Key cache rebuilt ({} fallbacks)", faults.len());
        faults.len()
    }

    fn resolve_cached(&mut self) -> Vec<String> {
        let (resolved, faults) = Self::resolve_all(self.commands, &self.raw);
        self.resolved = Arc::new(resolved);
        faults
    }

    /// Current snapshot, stable across later rebuilds
    pub fn snapshot(&self) -> Arc<ResolvedKeymap> {
        Arc::clone(&self.resolved)
    }

    /// Binding for a key under the given shift state; never fails
    pub fn resolve(&self, key: usize, shift: ShiftState) -> &Binding {
        self.resolve_layer(key, shift.layer())
    }

    pub fn resolve_layer(&self, key: usize, layer: Layer) -> &Binding {
        match self.resolved.bindings[layer.index()].get(key) {
            Some(binding) => binding,
            None => {
                warn!("Key index {} out of range, ignoring", key);
                &NOOP
            }
        }
    }

    pub fn color(&self, key: usize, layer: Layer) -> Color {
        self.resolved.colors[layer.index()]
            .get(key)
            .copied()
            .unwrap_or_default()
    }

    /// Resolved steps of a macro
    pub fn macro_steps(&self, name: &str) -> Option<&[Command]> {
        self.resolved.macros.get(name).map(Vec::as_slice)
    }

    /// Resolve every binding; the second value describes each fallback
    fn resolve_all(commands: &CommandSet, raw: &RawKeymap) -> (ResolvedKeymap, Vec<String>) {
        let mut faults = Vec::new();

        let mut macros = HashMap::with_capacity(raw.macros.len());
        for m in &raw.macros {
            let mut steps = Vec::with_capacity(m.steps.len());
            for step in &m.steps {
                match parse_step(step, commands) {
                    Ok(cmd) => steps.push(cmd),
                    Err(fault) => {
                        faults.push(format!("Macro {}: skipping step '{}' ({:?})", m.name, step, fault));
                    }
                }
            }
            macros.insert(m.name.clone(), steps);
        }

        let mut resolve_layer = |layer: Layer| -> [Binding; KEY_COUNT] {
            let keys = &raw.layer(layer).keys;
            std::array::from_fn(|i| {
                match parse_binding(&keys[i], commands, |name| macros.contains_key(name)) {
                    Ok(binding) => binding,
                    Err(fault) => {
                        faults.push(format!(
                            "{} key {}: '{}' unusable ({:?}), using no-op",
                            layer.label(),
                            i,
                            keys[i],
                            fault
                        ));
                        Binding::NoOp
                    }
                }
            })
        };

        let bindings = [resolve_layer(Layer::Base), resolve_layer(Layer::Shift)];
        let colors = [raw.base.colors, raw.shift.colors];

        (
            ResolvedKeymap {
                bindings,
                colors,
                macros,
            },
            faults,
        )
    }
}

fn report_faults(faults: &[String]) {
    for fault in faults {
        warn!("{}", fault);
    }
}

impl ResolvedKeymap {
    pub fn binding(&self, key: usize, layer: Layer) -> Option<&Binding> {
        self.bindings[layer.index()].get(key)
    }
}
