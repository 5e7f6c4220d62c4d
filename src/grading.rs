//! Answer grading and scoring
//!
//! This module grades a submitted answer against a question's answer
//! definition and converts the resulting correctness multiplier into
//! points. Grading is pure: every device computes the same grade for the
//! same submission, so scores never depend on which device did the math.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    constants::scoring,
    quiz::{QuestionKind, SliderConfig, TypeAnswerConfig},
};

/// A submitted answer for a single question
///
/// The payload variant must match the question kind; a mismatched payload
/// grades as wrong rather than erroring, since the room cannot trust
/// clients to send well-formed submissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Submission {
    /// Selected option index for a choice question
    Index(usize),
    /// Truth value for a true/false question
    Boolean(bool),
    /// Selected value for a slider question
    Number(f64),
    /// Typed text for a free-text question
    Text(String),
    /// Ordering for an order question, as indices into the item list
    Sequence(Vec<usize>),
    /// Chosen (left, right) pairs for a matching question
    Pairs(Vec<(String, String)>),
    /// Sentinel recorded when the deadline passes without a submission
    NoAnswer,
}

/// The graded correctness of a submission
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Grade {
    /// Correctness multiplier in `[0, 1]`; `1` is fully correct
    pub multiplier: f64,
    /// Whether a fuzzy text match was accepted as "close enough"
    pub close_enough: bool,
}

impl Grade {
    /// A fully correct grade
    pub fn full() -> Self {
        Self {
            multiplier: 1.0,
            close_enough: false,
        }
    }

    /// A wrong (zero credit) grade
    pub fn wrong() -> Self {
        Self {
            multiplier: 0.0,
            close_enough: false,
        }
    }

    /// Returns `true` if the submission earned any credit
    pub fn is_correct(&self) -> bool {
        self.multiplier > 0.0
    }
}

/// Grades a submission against a question's answer definition
pub fn grade(kind: &QuestionKind, submission: &Submission) -> Grade {
    match (kind, submission) {
        (_, Submission::NoAnswer) => Grade::wrong(),
        (QuestionKind::Choice(c), Submission::Index(i)) => {
            if c.options.get(*i).is_some_and(|o| o.correct) {
                Grade::full()
            } else {
                Grade::wrong()
            }
        }
        (QuestionKind::TrueFalse(t), Submission::Boolean(b)) => {
            if t.answer == *b {
                Grade::full()
            } else {
                Grade::wrong()
            }
        }
        (QuestionKind::Slider(s), Submission::Number(n)) => grade_slider(s, *n),
        (QuestionKind::TypeAnswer(t), Submission::Text(text)) => grade_text(t, text),
        (QuestionKind::Order(o), Submission::Sequence(seq)) => {
            if seq.len() == o.items.len() && seq.iter().copied().eq(0..o.items.len()) {
                Grade::full()
            } else {
                Grade::wrong()
            }
        }
        (QuestionKind::Matching(m), Submission::Pairs(pairs)) => {
            let expected: HashMap<&str, &str> = m
                .pairs
                .iter()
                .map(|(l, r)| (l.as_str(), r.as_str()))
                .collect();
            let submitted: HashMap<&str, &str> = pairs
                .iter()
                .map(|(l, r)| (l.as_str(), r.as_str()))
                .collect();
            if expected == submitted {
                Grade::full()
            } else {
                Grade::wrong()
            }
        }
        // Payload does not match the question kind
        _ => Grade::wrong(),
    }
}

/// Grades a slider submission by proximity to the correct value
///
/// Within [`scoring::SLIDER_FULL_CREDIT_BAND`] of the range the answer is
/// fully correct; beyond that the multiplier falls linearly, reaching zero
/// at [`scoring::SLIDER_PARTIAL_CREDIT_BAND`] of the range.
fn grade_slider(config: &SliderConfig, value: f64) -> Grade {
    let range = config.max - config.min;
    if !range.is_finite() || range <= 0.0 {
        // Degenerate range: only the exact value counts
        return if value == config.answer {
            Grade::full()
        } else {
            Grade::wrong()
        };
    }

    let distance = (value - config.answer).abs();
    if distance <= scoring::SLIDER_FULL_CREDIT_BAND * range {
        Grade::full()
    } else {
        let multiplier = 1.0 - distance / (scoring::SLIDER_PARTIAL_CREDIT_BAND * range);
        if multiplier > 0.0 {
            Grade {
                multiplier,
                close_enough: false,
            }
        } else {
            Grade::wrong()
        }
    }
}

/// Grades a text submission with edit-distance tolerance
///
/// Distance 0 to any accepted answer earns full credit; distances up to
/// [`scoring::FUZZY_MAX_DISTANCE`] earn a reduced multiplier and set the
/// close-enough flag; anything farther is wrong.
fn grade_text(config: &TypeAnswerConfig, text: &str) -> Grade {
    let submitted = clean_answer(text, config.case_sensitive);

    let best = config
        .accepted
        .iter()
        .map(|accepted| edit_distance(&submitted, &clean_answer(accepted, config.case_sensitive)))
        .min();

    match best {
        Some(0) => Grade::full(),
        Some(d) if d <= scoring::FUZZY_MAX_DISTANCE => Grade {
            multiplier: 1.0 - scoring::FUZZY_DISTANCE_PENALTY * d as f64,
            close_enough: true,
        },
        _ => Grade::wrong(),
    }
}

/// Normalizes a text answer before comparison
///
/// # Returns
///
/// The trimmed answer, lowercased unless matching is case-sensitive
fn clean_answer(answer: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        answer.trim().to_string()
    } else {
        answer.trim().to_lowercase()
    }
}

/// Computes the Levenshtein edit distance between two strings
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }

    // Single-row dynamic programming over the b dimension
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = diagonal + usize::from(ca != cb);
            diagonal = row[j + 1];
            row[j + 1] = substitution.min(row[j] + 1).min(row[j + 1] + 1);
        }
    }
    row[b.len()]
}

/// Converts a grade into points for a round
///
/// A correct answer earns `500 * multiplier` base points plus a time bonus
/// of up to another `500 * multiplier`, scaled by the fraction of the time
/// limit left when the answer arrived. Wrong answers earn exactly zero
/// regardless of timing.
pub fn award_points(grade: Grade, time_taken: Duration, time_limit: Duration) -> u64 {
    if grade.multiplier <= 0.0 {
        return 0;
    }

    let base = scoring::BASE_POINTS * grade.multiplier;
    let remaining_fraction = if time_limit.is_zero() {
        0.0
    } else {
        ((time_limit.as_secs_f64() - time_taken.as_secs_f64()) / time_limit.as_secs_f64()).max(0.0)
    };
    let bonus = remaining_fraction * scoring::TIME_BONUS * grade.multiplier;

    (base + bonus).floor() as u64
}
