//! Configuration constants for the quizroom session core
//!
//! This module contains the limits and scoring parameters used throughout
//! the session core to validate externally supplied quiz content and to
//! keep round scoring consistent across devices.

/// Quiz content constants
pub mod quiz {
    /// Maximum number of questions allowed in a single quiz
    pub const MAX_QUESTION_COUNT: usize = 100;
    /// Maximum length of a quiz title in characters
    pub const MAX_TITLE_LENGTH: usize = 200;
    /// Maximum length of a question prompt in characters
    pub const MAX_PROMPT_LENGTH: usize = 200;
    /// Minimum time limit in seconds for answering a question
    pub const MIN_TIME_LIMIT: u64 = 5;
    /// Maximum time limit in seconds for answering a question
    pub const MAX_TIME_LIMIT: u64 = 240;
    /// Maximum number of options in a single-choice question
    pub const MAX_OPTION_COUNT: usize = 8;
    /// Maximum number of accepted answers for a free-text question
    pub const MAX_ACCEPTED_ANSWERS: usize = 16;
    /// Maximum number of items in an ordering question
    pub const MAX_ITEM_COUNT: usize = 8;
    /// Maximum number of pairs in a matching question
    pub const MAX_PAIR_COUNT: usize = 8;
    /// Maximum length of an option, item, or accepted answer in characters
    pub const MAX_ANSWER_LENGTH: usize = 200;
}

/// Room and roster constants
pub mod room {
    /// Maximum number of participants allowed in a single room
    pub const MAX_PLAYER_COUNT: usize = 1000;
    /// Maximum length of a participant display name in characters
    pub const MAX_NAME_LENGTH: usize = 30;
}

/// Scoring constants shared by every question type
pub mod scoring {
    /// Points awarded for a fully correct answer before the time bonus
    pub const BASE_POINTS: f64 = 500.0;
    /// Maximum additional points awarded for answering instantly
    pub const TIME_BONUS: f64 = 500.0;
    /// Largest edit distance still treated as a close-enough text answer
    pub const FUZZY_MAX_DISTANCE: usize = 2;
    /// Multiplier reduction applied per unit of edit distance
    pub const FUZZY_DISTANCE_PENALTY: f64 = 0.25;
    /// Fraction of the slider range within which an answer earns full credit
    pub const SLIDER_FULL_CREDIT_BAND: f64 = 0.05;
    /// Fraction of the slider range beyond which an answer earns nothing
    pub const SLIDER_PARTIAL_CREDIT_BAND: f64 = 0.5;
}

/// Media reference constants
pub mod media {
    /// Maximum length of a media reference in characters
    pub const MAX_REFERENCE_LENGTH: usize = 200;
    /// Maximum length of alt text for accessibility
    pub const MAX_ALT_LENGTH: usize = 200;
}
