//! Spintax expansion: `{a|b|c}` picks one alternative at random.
//!
//! Groups are resolved leftmost-first until none remain. A group body may not
//! contain braces; anything that is not a well-formed group (unbalanced
//! braces, `{}`) is copied through verbatim.

use std::ops::RangeInclusive;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct SpintaxExpander {
    rng: Mutex<StdRng>,
}

impl SpintaxExpander {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn expand(&self, template: &str) -> String {
        let mut rng = self.rng.lock();
        expand_with(&mut *rng, template)
    }
}

impl Default for SpintaxExpander {
    fn default() -> Self {
        Self::new()
    }
}

/// Expands `template` using the supplied RNG.
pub fn expand_with<R: Rng + ?Sized>(rng: &mut R, template: &str) -> String {
    let mut text = template.to_string();
    while let Some(group) = find_group(&text) {
        let body = &text[group.start() + 1..*group.end()];
        let choices: Vec<&str> = body.split('|').collect();
        let pick = choices[rng.gen_range(0..choices.len())].to_string();
        text.replace_range(group, &pick);
    }
    text
}

/// Whether `template` still contains at least one expandable group.
pub fn has_groups(template: &str) -> bool {
    find_group(template).is_some()
}

/// Byte range of the leftmost `{...}` with a non-empty, brace-free body.
fn find_group(text: &str) -> Option<RangeInclusive<usize>> {
    let mut open = None;
    for (i, c) in text.char_indices() {
        match c {
            '{' => open = Some(i),
            '}' => match open.take() {
                Some(start) if i > start + 1 => return Some(start..=i),
                _ => {}
            },
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_group() {
        let expander = SpintaxExpander::seeded(11);
        for _ in 0..50 {
            let out = expander.expand("Hi {there|friend}!");
            assert!(out == "Hi there!" || out == "Hi friend!", "got {}", out);
        }
    }

    #[test]
    fn test_no_groups_unchanged() {
        let expander = SpintaxExpander::seeded(1);
        assert_eq!(expander.expand("No groups here"), "No groups here");
        assert!(!has_groups("No groups here"));
    }

    #[test]
    fn test_groups_resolve_independently() {
        let expander = SpintaxExpander::seeded(5);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            let out = expander.expand("{A|B} and {C|D}");
            assert!(
                ["A and C", "A and D", "B and C", "B and D"].contains(&out.as_str()),
                "got {}",
                out
            );
            seen.insert(out);
        }
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_single_alternative_strips_braces() {
        let expander = SpintaxExpander::seeded(2);
        assert_eq!(expander.expand("Hello {world}"), "Hello world");
    }

    #[test]
    fn test_malformed_input_is_permissive() {
        let expander = SpintaxExpander::seeded(9);
        assert_eq!(expander.expand("Broken {a|b"), "Broken {a|b");
        assert_eq!(expander.expand("Stray } brace"), "Stray } brace");
        assert_eq!(expander.expand("Empty {} group"), "Empty {} group");

        let out = expander.expand("{x|x} then {oops");
        assert_eq!(out, "x then {oops");
    }

    #[test]
    fn test_inner_group_resolves_first() {
        let expander = SpintaxExpander::seeded(4);
        for _ in 0..50 {
            let out = expander.expand("{a|{b|c}}");
            assert!(["a", "b", "c"].contains(&out.as_str()), "got {}", out);
        }
    }

    #[test]
    fn test_empty_alternatives() {
        let expander = SpintaxExpander::seeded(8);
        assert_eq!(expander.expand("x{|}y"), "xy");
    }

    #[test]
    fn test_multibyte_text() {
        let expander = SpintaxExpander::seeded(6);
        let out = expander.expand("¡{Hola|Olá}! 👋");
        assert!(out == "¡Hola! 👋" || out == "¡Olá! 👋");
    }
}
