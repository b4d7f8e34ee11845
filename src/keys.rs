//! Key-sequence parsing and lowering to virtual-key events.
//!
//! A sequence string is tokenized on single spaces. Each token is either an
//! empty string (a ~0.5 s pause), a single printable character, a named key
//! from the fixed table below, or a bracket-delimited modifier combination
//! like `{CTRL+C}`. The target application polls input at a coarse rate, so
//! every lowered event is followed by a small delay.

use std::time::Duration;

use crate::errors::AutomationError;

/// Delay after a plain key tap.
const TAP_DELAY: Duration = Duration::from_millis(50);
/// Delay between the press/release steps of a modifier combination.
const CHORD_DELAY: Duration = Duration::from_millis(100);
/// Pause produced by an empty token.
const PAUSE_DELAY: Duration = Duration::from_millis(500);

/// One synthetic keyboard step, consumed in order by the input driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Press(u16),
    Release(u16),
    Delay(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum KeyToken {
    /// Empty token: settle pause.
    Pause,
    /// Press and release a single key.
    Tap(u16),
    /// Modifiers pressed in order, final key tapped, modifiers released in
    /// reverse order.
    Chord(Vec<u16>),
}

/// An immutable, parsed key sequence, consumed left to right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySequence {
    tokens: Vec<KeyToken>,
}

impl KeySequence {
    /// Parse a sequence string. Any unrecognized token is an
    /// [`AutomationError::InvalidKey`]; malformed sequences are configuration
    /// errors and must not reach the target window half-typed.
    pub fn parse(sequence: &str) -> Result<Self, AutomationError> {
        let mut tokens = Vec::new();
        for raw in sequence.split(' ') {
            let token = raw.trim().to_ascii_uppercase();
            if token.is_empty() {
                tokens.push(KeyToken::Pause);
            } else if let Some(inner) = token
                .strip_prefix('{')
                .and_then(|t| t.strip_suffix('}'))
            {
                tokens.push(KeyToken::Chord(parse_combination(inner)?));
            } else {
                tokens.push(KeyToken::Tap(virtual_key(&token)?));
            }
        }
        Ok(Self { tokens })
    }

    /// Lower the sequence into the exact ordered press/release/delay steps
    /// the backend must emit.
    pub fn actions(&self) -> Vec<KeyAction> {
        let mut actions = Vec::new();
        for token in &self.tokens {
            match token {
                KeyToken::Pause => actions.push(KeyAction::Delay(PAUSE_DELAY)),
                KeyToken::Tap(vk) => {
                    actions.push(KeyAction::Press(*vk));
                    actions.push(KeyAction::Release(*vk));
                    actions.push(KeyAction::Delay(TAP_DELAY));
                }
                KeyToken::Chord(vks) => {
                    let (last, modifiers) = vks.split_last().expect("chord is never empty");
                    for vk in modifiers {
                        actions.push(KeyAction::Press(*vk));
                        actions.push(KeyAction::Delay(CHORD_DELAY));
                    }
                    actions.push(KeyAction::Press(*last));
                    actions.push(KeyAction::Delay(CHORD_DELAY));
                    actions.push(KeyAction::Release(*last));
                    for vk in modifiers.iter().rev() {
                        actions.push(KeyAction::Release(*vk));
                        actions.push(KeyAction::Delay(CHORD_DELAY));
                    }
                }
            }
        }
        actions
    }
}

/// Parse the inside of a `{A+B+C}` combination. `\PLUS` escapes a literal
/// plus sign as the final key.
fn parse_combination(inner: &str) -> Result<Vec<u16>, AutomationError> {
    let parts: Vec<String> = inner
        .split('+')
        .map(|p| p.trim().replace("\\PLUS", "+"))
        .collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(AutomationError::InvalidKey(format!(
            "empty key in combination {{{inner}}}"
        )));
    }
    parts.iter().map(|p| virtual_key(p)).collect()
}

/// Resolve an upper-cased token to its Windows virtual-key code.
fn virtual_key(token: &str) -> Result<u16, AutomationError> {
    let mut chars = token.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        // Single printable character: VK codes for A-Z/0-9 equal the ASCII
        // upper-case code point.
        if ch.is_ascii_graphic() {
            return Ok(ch.to_ascii_uppercase() as u16);
        }
        return Err(AutomationError::InvalidKey(format!(
            "unsupported character key: {token:?}"
        )));
    }
    named_key(token)
        .ok_or_else(|| AutomationError::InvalidKey(format!("unknown key name: {token:?}")))
}

/// The fixed key-name table. Names the target application's documented
/// shortcuts actually use, nothing speculative.
fn named_key(name: &str) -> Option<u16> {
    let vk = match name {
        "F1" => 0x70,
        "F2" => 0x71,
        "F3" => 0x72,
        "F4" => 0x73,
        "F5" => 0x74,
        "F6" => 0x75,
        "F7" => 0x76,
        "F8" => 0x77,
        "F9" => 0x78,
        "F10" => 0x79,
        "F11" => 0x7A,
        "F12" => 0x7B,
        "ENTER" | "RETURN" => 0x0D,
        "TAB" => 0x09,
        "ESC" | "ESCAPE" => 0x1B,
        "SPACE" => 0x20,
        "BACKSPACE" => 0x08,
        "CTRL" | "CONTROL" => 0x11,
        "SHIFT" => 0x10,
        "ALT" => 0x12,
        "WIN" => 0x5B,
        "UP" => 0x26,
        "DOWN" => 0x28,
        "LEFT" => 0x25,
        "RIGHT" => 0x27,
        "HOME" => 0x24,
        "END" => 0x23,
        "PAGEUP" => 0x21,
        "PAGEDOWN" => 0x22,
        "INSERT" => 0x2D,
        "DELETE" => 0x2E,
        _ => return None,
    };
    Some(vk)
}
