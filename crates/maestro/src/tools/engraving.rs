//! Minimal single-staff SVG engraving for generated sheet music

use std::fmt::Write;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::errors::{AgentError, AgentResult};

const LINE_GAP: f64 = 10.0;
const HALF_GAP: f64 = LINE_GAP / 2.0;
const NOTE_SPACING: f64 = 36.0;
const STAFF_LEFT: f64 = 20.0;
const FIRST_NOTE: f64 = 80.0;
const TITLE_SPACE: f64 = 50.0;
const MARGIN: f64 = 30.0;
const STEM: f64 = 35.0;
pub const MAX_NOTES: usize = 256;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Clef {
    #[default]
    Treble,
    Bass,
}

impl Clef {
    /// Diatonic step of the bottom staff line (E4 or G2)
    fn bottom_line(self) -> i32 {
        match self {
            Clef::Treble => 2 + 7 * 4,
            Clef::Bass => 4 + 7 * 2,
        }
    }

    fn glyph(self) -> &'static str {
        match self {
            Clef::Treble => "\u{1D11E}",
            Clef::Bass => "\u{1D122}",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Written {
    /// Diatonic step counted from C0, `None` for a rest
    step: Option<i32>,
    accidental: Option<char>,
    /// 1 whole, 2 half, 4 quarter, 8 eighth, 16 sixteenth
    denominator: u32,
}

/// `c4`, `f#5/8`, `bb3/2`, `r/4`. Octave defaults to 4, duration to a quarter.
fn parse_written(token: &str) -> AgentResult<Written> {
    let invalid = |why: &str| AgentError::InvalidParameters(format!("Bad note '{}': {}", token, why));
    let (pitch, duration) = match token.split_once('/') {
        Some((pitch, duration)) => (pitch, Some(duration)),
        None => (token, None),
    };
    let denominator = match duration {
        None => 4,
        Some(d) => d
            .parse::<u32>()
            .ok()
            .filter(|d| matches!(d, 1 | 2 | 4 | 8 | 16))
            .ok_or_else(|| invalid("duration must be 1, 2, 4, 8 or 16"))?,
    };

    let pitch = pitch.trim().to_lowercase();
    if pitch == "r" || pitch == "rest" {
        return Ok(Written {
            step: None,
            accidental: None,
            denominator,
        });
    }

    let mut chars = pitch.chars();
    let letter = chars.next().ok_or_else(|| invalid("empty"))?;
    let index = "cdefgab"
        .find(letter)
        .ok_or_else(|| invalid("pitch must start with a letter from a to g"))? as i32;
    let rest = chars.as_str();
    let accidental = match rest.chars().next() {
        Some('#') => Some('#'),
        Some('b') => Some('b'),
        _ => None,
    };
    let octave = &rest[accidental.map_or(0, |_| 1)..];
    let octave = if octave.is_empty() {
        4
    } else {
        octave
            .parse::<i32>()
            .ok()
            .filter(|o| (0..=8).contains(o))
            .ok_or_else(|| invalid("octave must be 0 to 8"))?
    };

    Ok(Written {
        step: Some(index + 7 * octave),
        accidental,
        denominator,
    })
}

fn escape(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '&' => "&amp;".to_string(),
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '"' => "&quot;".to_string(),
            '\'' => "&apos;".to_string(),
            c => c.to_string(),
        })
        .collect()
}

/// Engrave `notes` on one staff and return the SVG document
pub fn engrave(title: &str, notes: &[String], clef: Clef) -> AgentResult<String> {
    if notes.is_empty() {
        return Err(AgentError::InvalidParameters("No notes to engrave".into()));
    }
    if notes.len() > MAX_NOTES {
        return Err(AgentError::InvalidParameters(format!(
            "At most {} notes fit on a generated score",
            MAX_NOTES
        )));
    }
    let written = notes
        .iter()
        .map(|n| parse_written(n))
        .collect::<AgentResult<Vec<_>>>()?;

    let bottom = clef.bottom_line();
    let top = bottom + 8;
    let highest = written.iter().filter_map(|w| w.step).max().unwrap_or(top);
    let lowest = written.iter().filter_map(|w| w.step).min().unwrap_or(bottom);
    let above = (highest - top).max(0) as f64 * HALF_GAP + STEM;
    let below = (bottom - lowest).max(0) as f64 * HALF_GAP + STEM;

    let staff_top = TITLE_SPACE + above;
    let staff_bottom = staff_top + 4.0 * LINE_GAP;
    let width = FIRST_NOTE + written.len() as f64 * NOTE_SPACING + MARGIN;
    let height = staff_bottom + below + MARGIN;
    let staff_right = width - MARGIN / 2.0;
    let y_of = |step: i32| staff_bottom - (step - bottom) as f64 * HALF_GAP;

    let mut svg = String::new();
    // writing to a String cannot fail
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    );
    let _ = writeln!(svg, "<title>{}</title>", escape(title));
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="28" font-family="serif" font-size="18" text-anchor="middle">{}</text>"#,
        width / 2.0,
        escape(title)
    );
    for line in 0..5 {
        let y = staff_top + line as f64 * LINE_GAP;
        let _ = writeln!(
            svg,
            r#"<line class="staff" x1="{}" y1="{y}" x2="{}" y2="{y}" stroke="black"/>"#,
            STAFF_LEFT, staff_right
        );
    }
    let clef_y = match clef {
        Clef::Treble => staff_bottom + LINE_GAP * 0.6,
        Clef::Bass => staff_top + LINE_GAP * 2.8,
    };
    let _ = writeln!(
        svg,
        r#"<text class="clef" x="{}" y="{}" font-size="{}">{}</text>"#,
        STAFF_LEFT + 4.0,
        clef_y,
        LINE_GAP * 4.2,
        clef.glyph()
    );

    // measure length in sixteenths
    let mut filled = 0;
    for (i, note) in written.iter().enumerate() {
        let x = FIRST_NOTE + i as f64 * NOTE_SPACING;
        match note.step {
            None => {
                let glyph = match note.denominator {
                    1 => "\u{1D13B}",
                    2 => "\u{1D13C}",
                    4 => "\u{1D13D}",
                    8 => "\u{1D13E}",
                    _ => "\u{1D13F}",
                };
                let _ = writeln!(
                    svg,
                    r#"<text class="rest" x="{}" y="{}" font-size="{}">{}</text>"#,
                    x - HALF_GAP,
                    staff_top + 2.5 * LINE_GAP,
                    LINE_GAP * 3.0,
                    glyph
                );
            }
            Some(step) => {
                let y = y_of(step);
                let mut ledger = bottom - 2;
                while ledger >= step {
                    write_ledger(&mut svg, x, y_of(ledger));
                    ledger -= 2;
                }
                let mut ledger = top + 2;
                while ledger <= step {
                    write_ledger(&mut svg, x, y_of(ledger));
                    ledger += 2;
                }

                if let Some(accidental) = note.accidental {
                    let glyph = if accidental == '#' { "\u{266F}" } else { "\u{266D}" };
                    let _ = writeln!(
                        svg,
                        r#"<text class="accidental" x="{}" y="{}" font-size="{}">{}</text>"#,
                        x - 18.0,
                        y + 4.0,
                        LINE_GAP * 1.6,
                        glyph
                    );
                }

                let hollow = note.denominator <= 2;
                let _ = writeln!(
                    svg,
                    r#"<ellipse class="head" cx="{x}" cy="{y}" rx="6" ry="4.5" transform="rotate(-20 {x} {y})" fill="{}" stroke="black"/>"#,
                    if hollow { "none" } else { "black" }
                );

                if note.denominator > 1 {
                    let stem_down = step >= bottom + 4;
                    let (stem_x, tip) = if stem_down {
                        (x - 5.5, y + STEM)
                    } else {
                        (x + 5.5, y - STEM)
                    };
                    let _ = writeln!(
                        svg,
                        r#"<line class="stem" x1="{stem_x}" y1="{y}" x2="{stem_x}" y2="{tip}" stroke="black"/>"#
                    );
                    let flags = match note.denominator {
                        8 => 1,
                        16 => 2,
                        _ => 0,
                    };
                    for flag in 0..flags {
                        let offset = flag as f64 * 8.0;
                        let (start, end) = if stem_down {
                            (tip - offset, tip - offset - 14.0)
                        } else {
                            (tip + offset, tip + offset + 14.0)
                        };
                        let _ = writeln!(
                            svg,
                            r#"<path class="flag" d="M {stem_x} {start} q 10 4 8 {}" fill="none" stroke="black"/>"#,
                            end - start
                        );
                    }
                }
            }
        }

        filled += 16 / note.denominator;
        if filled >= 16 && i + 1 < written.len() {
            filled -= 16;
            let bar_x = x + NOTE_SPACING / 2.0;
            let _ = writeln!(
                svg,
                r#"<line class="bar" x1="{bar_x}" y1="{staff_top}" x2="{bar_x}" y2="{staff_bottom}" stroke="black"/>"#
            );
        }
    }

    let _ = writeln!(
        svg,
        r#"<line class="bar" x1="{staff_right}" y1="{staff_top}" x2="{staff_right}" y2="{staff_bottom}" stroke="black" stroke-width="3"/>"#
    );
    svg.push_str("</svg>\n");
    Ok(svg)
}

fn write_ledger(svg: &mut String, x: f64, y: f64) {
    let _ = writeln!(
        svg,
        r#"<line class="ledger" x1="{}" y1="{y}" x2="{}" y2="{y}" stroke="black"/>"#,
        x - 10.0,
        x + 10.0
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notes(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn count(svg: &str, class: &str) -> usize {
        svg.matches(&format!(r#"class="{}""#, class)).count()
    }

    #[test]
    fn test_parse_written() {
        assert_eq!(
            parse_written("f#5/8").unwrap(),
            Written {
                step: Some(3 + 35),
                accidental: Some('#'),
                denominator: 8
            }
        );
        assert_eq!(parse_written("Bb").unwrap().step, Some(6 + 28));
        assert_eq!(parse_written("r/2").unwrap().step, None);
        for bad in ["h4", "c4/3", "c9", "c#x", ""] {
            assert!(parse_written(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_engrave_treble() {
        let svg = engrave(
            "Scale <1> & more",
            &notes(&["c4", "d4", "e4", "f4", "g4/2", "a5/8", "r/8", "c6/1"]),
            Clef::Treble,
        )
        .unwrap();

        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("<title>Scale &lt;1&gt; &amp; more</title>"));
        assert_eq!(count(&svg, "staff"), 5);
        assert_eq!(count(&svg, "head"), 7);
        assert_eq!(count(&svg, "rest"), 1);
        // c4 takes one ledger below; a5 one above; c6 two above
        assert_eq!(count(&svg, "ledger"), 4);
        // the whole note has no stem
        assert_eq!(count(&svg, "stem"), 6);
        assert_eq!(count(&svg, "flag"), 1);
        assert_eq!(svg.matches(r#"fill="none" stroke="black"/>"#).count(), 3);
        // one bar after the first four quarters, then the closing bar
        assert_eq!(count(&svg, "bar"), 2);
    }

    #[test]
    fn test_engrave_bass_and_errors() {
        let svg = engrave("Low", &notes(&["g2", "e2"]), Clef::Bass).unwrap();
        assert_eq!(count(&svg, "ledger"), 1);
        assert!(svg.contains('\u{1D122}'));

        assert!(engrave("Empty", &[], Clef::Treble).is_err());
        assert!(engrave("Bad", &notes(&["c4", "q"]), Clef::Treble).is_err());
    }
}
