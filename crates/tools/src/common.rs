//! Formatting and normalisation helpers shared by the tools.

use chrono::{DateTime, Local};
use std::sync::Arc;

/// Customer help line quoted in tool outputs.
pub const HELP_LINE: &str = "01 8000 112 115";

/// Source of "now" for tools that stamp dates.
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Local::now)
}

/// Group digits with `.` the way Colombian peso amounts are written.
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out
}

const COMBINING_DIACRITICS: std::ops::RangeInclusive<char> = '\u{300}'..='\u{36f}';

/// Lowercase and strip Spanish diacritics, precomposed or decomposed.
pub fn fold_accents(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .chars()
        .filter(|c| !COMBINING_DIACRITICS.contains(c))
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

/// First letter uppercase, rest untouched.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_grouping() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1_000), "1.000");
        assert_eq!(thousands(5_833_333), "5.833.333");
        assert_eq!(thousands(1_152_000), "1.152.000");
    }

    #[test]
    fn accent_folding() {
        assert_eq!(fold_accents("  Tuluá "), "tulua");
        assert_eq!(fold_accents("IBAGUÉ"), "ibague");
        assert_eq!(fold_accents("poste_dañado"), "poste_danado");
        assert_eq!(fold_accents("Tulua\u{301}"), "tulua");
        assert_eq!(fold_accents("poste_dan\u{303}ado"), "poste_danado");
    }

    #[test]
    fn capitalization() {
        assert_eq!(capitalize("octubre"), "Octubre");
        assert_eq!(capitalize("ENERO"), "Enero");
        assert_eq!(capitalize(""), "");
    }
}
