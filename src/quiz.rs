//! Quiz content model
//!
//! This module defines the externally supplied quiz content consumed by the
//! session core: an ordered list of question definitions, each with a
//! prompt, a time limit, optional media and explanation text, and a typed
//! answer definition. The content is read-only to this crate; the quiz
//! editor that produces it lives elsewhere.

use std::time::Duration;

use garde::Validate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::constants;

/// Validation result type used by the custom duration validators
type ValidationResult = garde::Result;

/// Validates that a question time limit falls within the allowed bounds
fn validate_time_limit(val: &Duration, _ctx: &()) -> ValidationResult {
    let bounds = constants::quiz::MIN_TIME_LIMIT..=constants::quiz::MAX_TIME_LIMIT;
    if bounds.contains(&val.as_secs()) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "time limit is outside of bounds [{},{}]",
            constants::quiz::MIN_TIME_LIMIT,
            constants::quiz::MAX_TIME_LIMIT,
        )))
    }
}

/// A media reference that can accompany a question
///
/// The session core never fetches media; it only forwards the reference to
/// clients, which resolve it against whatever storage the application uses.
#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub enum Media {
    /// An image stored by the application's media service
    Image {
        /// Opaque reference to the image
        #[garde(length(max = constants::media::MAX_REFERENCE_LENGTH))]
        reference: String,
        /// Alternative text for accessibility and display fallbacks
        #[garde(length(max = constants::media::MAX_ALT_LENGTH))]
        alt: String,
    },
}

/// A complete quiz: title plus the ordered list of questions
#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct Quiz {
    /// The quiz title (display only, unused by the session logic)
    #[garde(length(max = constants::quiz::MAX_TITLE_LENGTH))]
    title: String,

    /// The questions in play order
    #[garde(length(max = constants::quiz::MAX_QUESTION_COUNT), dive)]
    pub questions: Vec<QuestionConfig>,
}

impl Quiz {
    /// Creates a quiz from a title and question list
    pub fn new(title: impl Into<String>, questions: Vec<QuestionConfig>) -> Self {
        Self {
            title: title.into(),
            questions,
        }
    }

    /// Returns the quiz title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the number of questions
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Returns `true` if the quiz has no questions
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Returns the question at `index`, if any
    pub fn question(&self, index: usize) -> Option<&QuestionConfig> {
        self.questions.get(index)
    }
}

/// A single question definition
#[serde_with::serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuestionConfig {
    /// The prompt text shown to every device
    #[garde(length(chars, max = constants::quiz::MAX_PROMPT_LENGTH))]
    prompt: String,
    /// Optional media shown alongside the prompt
    #[garde(dive)]
    media: Option<Media>,
    /// Optional explanation revealed with the results
    #[garde(skip)]
    explanation: Option<String>,
    /// Time players have to answer once the question opens
    #[garde(custom(validate_time_limit))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    time_limit: Duration,
    /// The typed answer definition
    #[garde(dive)]
    pub kind: QuestionKind,
}

impl QuestionConfig {
    /// Creates a question definition
    pub fn new(
        prompt: impl Into<String>,
        time_limit: Duration,
        kind: QuestionKind,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            media: None,
            explanation: None,
            time_limit,
            kind,
        }
    }

    /// Attaches an explanation revealed with the results
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    /// Attaches a media reference shown alongside the prompt
    pub fn with_media(mut self, media: Media) -> Self {
        self.media = Some(media);
        self
    }

    /// Returns the prompt text
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Returns the optional media reference
    pub fn media(&self) -> Option<&Media> {
        self.media.as_ref()
    }

    /// Returns the optional explanation
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    /// Returns the answering time limit
    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }
}

/// A single option of a choice question
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChoiceOption {
    /// Whether selecting this option is correct
    #[garde(skip)]
    pub correct: bool,
    /// The option text
    #[garde(length(max = constants::quiz::MAX_ANSWER_LENGTH))]
    pub text: String,
}

/// Configuration for a single-choice question
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChoiceConfig {
    /// The selectable options
    #[garde(length(max = constants::quiz::MAX_OPTION_COUNT), dive)]
    pub options: Vec<ChoiceOption>,
}

/// Configuration for a true/false question
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct TrueFalseConfig {
    /// The correct truth value
    #[garde(skip)]
    pub answer: bool,
}

/// Configuration for a slider (numeric range) question
///
/// Grading treats `max - min` as the answer range; answers within a small
/// band of the correct value earn full credit and nearby answers earn
/// partial credit proportional to proximity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct SliderConfig {
    /// Lower bound of the selectable range
    #[garde(skip)]
    pub min: f64,
    /// Upper bound of the selectable range
    #[garde(skip)]
    pub max: f64,
    /// The correct value
    #[garde(skip)]
    pub answer: f64,
}

/// Configuration for a free-text question with fuzzy matching
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TypeAnswerConfig {
    /// Accepted text answers; a submission is graded against each
    #[garde(
        length(max = constants::quiz::MAX_ACCEPTED_ANSWERS),
        inner(length(chars, max = constants::quiz::MAX_ANSWER_LENGTH))
    )]
    pub accepted: Vec<String>,
    /// Whether matching should be case-sensitive
    #[garde(skip)]
    #[serde(default)]
    pub case_sensitive: bool,
}

/// Configuration for an ordering question
///
/// Items are stored in their correct order; presentation shuffling is a
/// rendering concern and a submission is the player's ordering expressed as
/// indices into this list.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OrderConfig {
    /// The items in correct order
    #[garde(
        length(max = constants::quiz::MAX_ITEM_COUNT),
        inner(length(chars, max = constants::quiz::MAX_ANSWER_LENGTH))
    )]
    pub items: Vec<String>,
}

/// Configuration for a matching question (set of pairs)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MatchingConfig {
    /// The correct (left, right) pairs
    #[garde(length(max = constants::quiz::MAX_PAIR_COUNT))]
    pub pairs: Vec<(String, String)>,
}

/// The typed answer definition of a question
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub enum QuestionKind {
    /// Pick one option out of several
    Choice(#[garde(dive)] ChoiceConfig),
    /// Decide whether a statement is true or false
    TrueFalse(#[garde(dive)] TrueFalseConfig),
    /// Pick a value on a numeric range
    Slider(#[garde(dive)] SliderConfig),
    /// Type a free-text answer
    TypeAnswer(#[garde(dive)] TypeAnswerConfig),
    /// Arrange items into the correct sequence
    Order(#[garde(dive)] OrderConfig),
    /// Match every left item with its right partner
    Matching(#[garde(dive)] MatchingConfig),
}

/// A player-safe projection of a question's answer definition
///
/// This is what gets broadcast when a question opens: enough to render the
/// input controls, with nothing that gives away the correct answer.
#[derive(Debug, Clone, Serialize)]
pub enum QuestionView {
    /// Option texts of a choice question
    Choice {
        /// The selectable option texts
        options: Vec<String>,
    },
    /// A true/false toggle
    TrueFalse,
    /// Slider bounds
    Slider {
        /// Lower bound of the selectable range
        min: f64,
        /// Upper bound of the selectable range
        max: f64,
    },
    /// A free-text input
    TypeAnswer,
    /// The items to arrange
    Order {
        /// The items, in stored order
        items: Vec<String>,
    },
    /// The two columns to pair up
    Matching {
        /// Left-hand items
        left: Vec<String>,
        /// Right-hand items
        right: Vec<String>,
    },
}

/// The revealed correct answer of a question, broadcast with the results
#[derive(Debug, Clone, Serialize)]
pub enum CorrectAnswer {
    /// Indices of the correct options
    Choice(Vec<usize>),
    /// The correct truth value
    TrueFalse(bool),
    /// The correct slider value
    Slider(f64),
    /// The accepted text answers
    TypeAnswer(Vec<String>),
    /// The items in correct order
    Order(Vec<String>),
    /// The correct pairs
    Matching(Vec<(String, String)>),
}

impl QuestionKind {
    /// Returns the player-safe view used to render input controls
    pub fn view(&self) -> QuestionView {
        match self {
            Self::Choice(c) => QuestionView::Choice {
                options: c.options.iter().map(|o| o.text.clone()).collect_vec(),
            },
            Self::TrueFalse(_) => QuestionView::TrueFalse,
            Self::Slider(s) => QuestionView::Slider {
                min: s.min,
                max: s.max,
            },
            Self::TypeAnswer(_) => QuestionView::TypeAnswer,
            Self::Order(o) => QuestionView::Order {
                items: o.items.clone(),
            },
            Self::Matching(m) => QuestionView::Matching {
                left: m.pairs.iter().map(|(l, _)| l.clone()).collect_vec(),
                right: m.pairs.iter().map(|(_, r)| r.clone()).collect_vec(),
            },
        }
    }

    /// Returns the correct answer revealed with the results
    pub fn correct_answer(&self) -> CorrectAnswer {
        match self {
            Self::Choice(c) => CorrectAnswer::Choice(
                c.options
                    .iter()
                    .enumerate()
                    .filter(|(_, o)| o.correct)
                    .map(|(i, _)| i)
                    .collect_vec(),
            ),
            Self::TrueFalse(t) => CorrectAnswer::TrueFalse(t.answer),
            Self::Slider(s) => CorrectAnswer::Slider(s.answer),
            Self::TypeAnswer(t) => CorrectAnswer::TypeAnswer(t.accepted.clone()),
            Self::Order(o) => CorrectAnswer::Order(o.items.clone()),
            Self::Matching(m) => CorrectAnswer::Matching(m.pairs.clone()),
        }
    }
}
