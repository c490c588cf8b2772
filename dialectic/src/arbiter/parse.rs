//! Verdict parsing.
//!
//! Tolerates markdown emphasis, heading and bullet marks, key case, and
//! the `WINNER` / `ENDORSEMENT` / `RATIONALE` spellings models drift to.
//! Never defaults: if the endorsed role or the answer cannot be identified
//! unambiguously the result is `ArbitrationParse` with the raw text.

use std::sync::LazyLock;

use regex::Regex;

use super::{ArbitrationInput, Verdict};
use crate::answer::extract_boxed;
use crate::error::DialecticError;
use crate::role::Role;

static KEY_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(endorsed(?:[ _]+role)?|endorsement|winner|final[ _]+answer|justification|rationale)\s*[*_]*\s*[:\-–—]\s*(.*)$",
    )
    .expect("KEY_LINE_RE regex should compile")
});

static NONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(none|neither|nobody|no\s+(?:role|trace|argument))\b")
        .expect("NONE_RE regex should compile")
});

static NONE_LEAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(none|neither|nobody|no\s+(?:role|trace|argument))\b")
        .expect("NONE_LEAD_RE regex should compile")
});

static ABSENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(no\s+(?:output|argument|answer|reasoning)|absent|unavailable|failed|missing|empty|did\s+not\s+(?:produce|respond|answer)|produced\s+nothing)\b",
    )
    .expect("ABSENCE_RE regex should compile")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    Endorsed,
    Answer,
    Justification,
}

impl Key {
    fn from_label(label: &str) -> Self {
        let label = label.to_ascii_lowercase();
        if label.starts_with("endorse") || label == "winner" {
            Self::Endorsed
        } else if label.starts_with("final") {
            Self::Answer
        } else {
            Self::Justification
        }
    }
}

/// A keyed line and the unkeyed lines that follow it.
///
/// Answer sections keep only the key line in `text`; the lines after it
/// go to `trailing` and count as reasoning.
#[derive(Debug)]
struct Section {
    key: Key,
    line: usize,
    text: String,
    trailing: String,
}

fn strip_decorations(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_whitespace() || matches!(c, '#' | '*' | '>' | '-' | '_' | '`'))
}

fn sections(raw: &str) -> Vec<Section> {
    let mut out: Vec<Section> = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let stripped = line
            .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '#' | '*' | '>' | '-' | '`'));
        if let Some(caps) = KEY_LINE_RE.captures(stripped) {
            out.push(Section {
                key: Key::from_label(&caps[1]),
                line: idx,
                text: strip_decorations(&caps[2]).to_string(),
                trailing: String::new(),
            });
        } else if let Some(current) = out.last_mut() {
            let sink = match current.key {
                Key::Answer => &mut current.trailing,
                _ => &mut current.text,
            };
            sink.push('\n');
            sink.push_str(line);
        }
    }
    for section in &mut out {
        section.text = section.text.trim().to_string();
        section.trailing = section.trailing.trim().to_string();
    }
    out
}

fn last(sections: &[Section], key: Key) -> Option<&Section> {
    sections.iter().rev().find(|s| s.key == key)
}

fn parse_endorsement(
    value: &str,
    raw: &str,
    input: &ArbitrationInput,
) -> Result<Option<Role>, DialecticError> {
    let roles = Role::parse_mentions(value);

    if NONE_LEAD_RE.is_match(value) {
        if roles.is_empty() {
            return Ok(None);
        }
        let named: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
        return Err(DialecticError::parse(
            format!(
                "endorsement declares none but also names {}: {value:?}",
                named.join(", ")
            ),
            raw,
        ));
    }

    match roles.as_slice() {
        [role] => {
            if !input.is_available(*role) {
                return Err(DialecticError::parse(
                    format!("endorses {role}, which produced no argument"),
                    raw,
                ));
            }
            Ok(Some(*role))
        }
        [] if NONE_RE.is_match(value) => Ok(None),
        [] => Err(DialecticError::parse(
            format!("unrecognized endorsement: {value:?}"),
            raw,
        )),
        many => Err(DialecticError::parse(
            format!(
                "ambiguous endorsement names {} roles: {value:?}",
                many.len()
            ),
            raw,
        )),
    }
}

fn parse_answer(section: &Section) -> Option<String> {
    if let Some(boxed) = extract_boxed(&section.text) {
        return Some(boxed);
    }
    let text = strip_decorations(&section.text);
    if !text.is_empty() && !text.contains("\\boxed{") {
        return Some(text.to_string());
    }
    // Box split across lines, or the value on the line after the key.
    let joined = format!("{}\n{}", section.text, section.trailing);
    extract_boxed(&joined).or_else(|| {
        section
            .trailing
            .lines()
            .map(strip_decorations)
            .find(|l| !l.is_empty())
            .filter(|_| text.is_empty())
            .map(str::to_string)
    })
}

/// Reject a justification that argues from a role with no output.
///
/// A sentence naming an absent role is accepted only if it also states
/// the absence ("produced no argument", "failed", ...).
fn check_absent_citations(
    justification: &str,
    raw: &str,
    input: &ArbitrationInput,
) -> Result<(), DialecticError> {
    let absent = input.absent_roles();
    if absent.is_empty() {
        return Ok(());
    }
    for sentence in justification.split(['.', '!', '?', ';', '\n']) {
        let cited = Role::parse_mentions(sentence)
            .into_iter()
            .find(|role| absent.contains(role));
        if let Some(role) = cited {
            if !ABSENCE_RE.is_match(sentence) {
                return Err(DialecticError::parse(
                    format!(
                        "justification cites {role}, which produced no argument: {:?}",
                        sentence.trim()
                    ),
                    raw,
                ));
            }
        }
    }
    Ok(())
}

/// Parse raw arbiter output into a [`Verdict`].
pub fn parse_verdict(raw: &str, input: &ArbitrationInput) -> Result<Verdict, DialecticError> {
    if raw.trim().is_empty() {
        return Err(DialecticError::parse("arbitration output is empty", raw));
    }

    let sections = sections(raw);

    let endorsement = last(&sections, Key::Endorsed)
        .ok_or_else(|| DialecticError::parse("no endorsed role line found", raw))?;
    let endorsed_role = parse_endorsement(&endorsement.text, raw, input)?;

    let answer_section = last(&sections, Key::Answer);
    let answer = answer_section
        .and_then(parse_answer)
        .or_else(|| extract_boxed(raw))
        .ok_or_else(|| DialecticError::parse("no final answer found", raw))?;

    let justification = match last(&sections, Key::Justification) {
        Some(s) if !s.text.is_empty() => s.text.clone(),
        _ => {
            // Fall back to the reasoning around the verdict lines.
            let first_key_line = sections.first().map(|s| s.line).unwrap_or(0);
            let preceding = raw
                .lines()
                .take(first_key_line)
                .collect::<Vec<_>>()
                .join("\n");
            let following = answer_section.map(|s| s.trailing.as_str()).unwrap_or("");
            [preceding.trim(), following]
                .into_iter()
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join("\n\n")
        }
    };
    if justification.is_empty() {
        return Err(DialecticError::parse("no justification found", raw));
    }
    check_absent_citations(&justification, raw, input)?;

    Ok(Verdict::new(endorsed_role, answer, justification))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::Problem;
    use crate::trace::{Trace, TraceFailure};

    fn input_with(absent: &[Role]) -> ArbitrationInput {
        let traces: Vec<Trace> = Role::ALL
            .iter()
            .map(|role| {
                let t = Trace::pending(*role, "p");
                if absent.contains(role) {
                    t.fail(TraceFailure::Degenerate, 1)
                } else {
                    t.complete(format!("{role} argument"), 1)
                }
            })
            .collect();
        ArbitrationInput::from_traces(&Problem::new("P").unwrap(), &traces).unwrap()
    }

    fn full() -> ArbitrationInput {
        input_with(&[])
    }

    #[test]
    fn test_canonical_format() {
        let raw = "Reasoning...\n\
ENDORSED ROLE: Logician\n\
FINAL ANSWER: \\boxed{1/2}\n\
JUSTIFICATION: The reveal was accidental, so it carries no information.";
        let v = parse_verdict(raw, &full()).unwrap();
        assert_eq!(v.endorsed_role(), Some(Role::Logician));
        assert_eq!(v.answer(), "1/2");
        assert!(v.justification().starts_with("The reveal was accidental"));
    }

    #[test]
    fn test_markdown_and_case_variation() {
        let raw = "## Verdict\n\
**Endorsed role:** *Contrarian* (Trace 3)\n\
- **final answer** — $\\boxed{\\frac{1}{2}}$\n\
**Justification**: Accident removes the host's filtering.\n\
It stays 50/50.";
        let v = parse_verdict(raw, &full()).unwrap();
        assert_eq!(v.endorsed_role(), Some(Role::Contrarian));
        assert_eq!(v.answer(), "\\frac{1}{2}");
        assert!(v.justification().contains("filtering"));
        assert!(v.justification().contains("It stays 50/50."));
    }

    #[test]
    fn test_winner_and_rationale_spellings() {
        let raw = "WINNER: Trace 2\nRATIONALE: Only the logician checked intent.\n\\boxed{1/2}";
        let v = parse_verdict(raw, &full()).unwrap();
        assert_eq!(v.endorsed_role(), Some(Role::Logician));
        assert_eq!(v.answer(), "1/2");
    }

    #[test]
    fn test_explicit_none_endorsement() {
        let raw = "ENDORSED ROLE: None\n\
FINAL ANSWER: \\boxed{undetermined}\n\
JUSTIFICATION: No argument survives the necessity test.";
        let v = parse_verdict(raw, &full()).unwrap();
        assert_eq!(v.endorsed_role(), None);
        assert_eq!(v.answer(), "undetermined");
    }

    #[test]
    fn test_none_naming_a_role_is_parse_failure() {
        let raw = "ENDORSED ROLE: None (the Believer's argument is only plausible)\n\
FINAL ANSWER: \\boxed{undetermined}\n\
JUSTIFICATION: No argument is necessitated.";
        let err = parse_verdict(raw, &full()).unwrap_err();
        assert!(matches!(err, DialecticError::ArbitrationParse { .. }));
        assert!(err.to_string().contains("declares none"));
        assert_eq!(err.raw_output(), Some(raw));
    }

    #[test]
    fn test_neither_without_roles_is_none() {
        let raw = "ENDORSED ROLE: **Neither**\nFINAL ANSWER: \\boxed{undetermined}\nJUSTIFICATION: x";
        let v = parse_verdict(raw, &full()).unwrap();
        assert_eq!(v.endorsed_role(), None);
    }

    #[test]
    fn test_prose_after_answer_line_goes_to_justification() {
        let raw = "Reasoning here.\n\
ENDORSED ROLE: Logician\n\
FINAL ANSWER: 1/2\n\
The accident means the host did not filter doors.";
        let v = parse_verdict(raw, &full()).unwrap();
        assert_eq!(v.answer(), "1/2");
        assert!(v.justification().starts_with("Reasoning here."));
        assert!(v.justification().contains("the host did not filter doors"));
    }

    #[test]
    fn test_answer_on_line_after_key() {
        let raw = "ENDORSED ROLE: Logician\nFINAL ANSWER:\n\\boxed{1/2}\nJUSTIFICATION: accident.";
        let v = parse_verdict(raw, &full()).unwrap();
        assert_eq!(v.answer(), "1/2");
        assert_eq!(v.justification(), "accident.");
    }

    #[test]
    fn test_justification_arguing_from_absent_role_is_parse_failure() {
        let raw = "ENDORSED ROLE: Contrarian\n\
FINAL ANSWER: \\boxed{1/2}\n\
JUSTIFICATION: As the Logician's causal check shows, the reveal was accidental.";
        let err = parse_verdict(raw, &input_with(&[Role::Logician])).unwrap_err();
        assert!(err.to_string().contains("justification cites logician"));
    }

    #[test]
    fn test_justification_may_note_absent_role() {
        let raw = "ENDORSED ROLE: Contrarian\n\
FINAL ANSWER: \\boxed{1/2}\n\
JUSTIFICATION: The Logician produced no argument. The Contrarian shows the reveal carries no information.";
        let v = parse_verdict(raw, &input_with(&[Role::Logician])).unwrap();
        assert_eq!(v.endorsed_role(), Some(Role::Contrarian));
    }

    #[test]
    fn test_last_occurrence_wins() {
        let raw = "ENDORSED ROLE: Believer\nFINAL ANSWER: \\boxed{2/3}\n\
On reflection the reveal was accidental.\n\
ENDORSED ROLE: Logician\nFINAL ANSWER: \\boxed{1/2}\nJUSTIFICATION: accident.";
        let v = parse_verdict(raw, &full()).unwrap();
        assert_eq!(v.endorsed_role(), Some(Role::Logician));
        assert_eq!(v.answer(), "1/2");
    }

    #[test]
    fn test_justification_falls_back_to_preceding_reasoning() {
        let raw = "The host did not choose the door.\nENDORSED ROLE: Logician\nFINAL ANSWER: 1/2";
        let v = parse_verdict(raw, &full()).unwrap();
        assert_eq!(v.answer(), "1/2");
        assert_eq!(v.justification(), "The host did not choose the door.");
    }

    #[test]
    fn test_no_role_label_is_parse_failure() {
        let raw = "Switching is probably fine. The probability is about \\boxed{1/2}.";
        let err = parse_verdict(raw, &full()).unwrap_err();
        assert!(matches!(err, DialecticError::ArbitrationParse { .. }));
        assert_eq!(err.raw_output(), Some(raw));
    }

    #[test]
    fn test_ambiguous_endorsement_is_parse_failure() {
        let raw = "ENDORSED ROLE: Logician and Contrarian\nFINAL ANSWER: \\boxed{1/2}\nJUSTIFICATION: x";
        let err = parse_verdict(raw, &full()).unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
    }

    #[test]
    fn test_unrecognized_endorsement_is_parse_failure() {
        let raw = "ENDORSED ROLE: the second one\nFINAL ANSWER: \\boxed{1/2}\nJUSTIFICATION: x";
        assert!(parse_verdict(raw, &full()).is_err());
    }

    #[test]
    fn test_endorsing_absent_role_is_parse_failure() {
        let raw = "ENDORSED ROLE: Logician\nFINAL ANSWER: \\boxed{1/2}\nJUSTIFICATION: x";
        let err = parse_verdict(raw, &input_with(&[Role::Logician])).unwrap_err();
        assert!(err.to_string().contains("produced no argument"));
    }

    #[test]
    fn test_missing_answer_is_parse_failure() {
        let raw = "ENDORSED ROLE: Logician\nJUSTIFICATION: accident.";
        let err = parse_verdict(raw, &full()).unwrap_err();
        assert!(err.to_string().contains("no final answer"));
    }

    #[test]
    fn test_empty_output_is_parse_failure() {
        assert!(parse_verdict("  \n ", &full()).is_err());
    }

    #[test]
    fn test_parse_is_deterministic() {
        let raw = "ENDORSED ROLE: Contrarian\nFINAL ANSWER: \\boxed{1/2}\nJUSTIFICATION: x";
        assert_eq!(
            parse_verdict(raw, &full()).unwrap(),
            parse_verdict(raw, &full()).unwrap()
        );
    }
}
