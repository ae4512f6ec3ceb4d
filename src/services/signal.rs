/// Watch-signal model
///
/// Pure functions turning a single watch record (plus optional feedback) into
/// a scalar preference signal, and a timestamp into a temporal decay weight.
/// No state, no I/O; everything downstream of the profiler builds on these.
use chrono::{DateTime, Utc};

use crate::models::{FeedbackPolarity, WatchRecord};

// Signal weights. All contributions are additive; clamping happens much
// later, at scoring time.
pub const COMPLETION_FULL_BONUS: f64 = 5.0; // watched >= 85%
pub const COMPLETION_PARTIAL_BONUS: f64 = 2.0; // watched 40-84%
pub const COMPLETION_ABANDONED_PENALTY: f64 = -3.0; // abandoned below 20%
pub const REWATCH_BONUS: f64 = 4.0; // watched more than once
pub const RATING_HIGH_BONUS: f64 = 3.0; // user rating >= 8
pub const RATING_LOW_PENALTY: f64 = -2.0; // user rating <= 4
pub const FEEDBACK_UP_BONUS: f64 = 3.0;
pub const FEEDBACK_DOWN_PENALTY: f64 = -4.0;
pub const FEEDBACK_DISMISS_PENALTY: f64 = -1.0;

/// Half-life of a watch signal, in days
pub const DECAY_HALF_LIFE_DAYS: f64 = 90.0;

/// Decay assigned to records with no usable timestamp
pub const MISSING_TIMESTAMP_DECAY: f64 = 0.5;

/// Signal strength for a single watch event, before decay
pub fn compute_signal(record: &WatchRecord, feedback: Option<FeedbackPolarity>) -> f64 {
    let mut signal = 0.0;
    let completion = record.completion_pct;

    if completion >= 85.0 {
        signal += COMPLETION_FULL_BONUS;
    } else if completion >= 40.0 {
        signal += COMPLETION_PARTIAL_BONUS;
    } else if completion < 20.0 && completion > 0.0 {
        signal += COMPLETION_ABANDONED_PENALTY;
    }

    if record.watch_count > 1 {
        signal += REWATCH_BONUS;
    }

    if let Some(rating) = record.user_rating {
        if rating >= 8.0 {
            signal += RATING_HIGH_BONUS;
        } else if rating <= 4.0 {
            signal += RATING_LOW_PENALTY;
        }
    }

    match feedback {
        Some(FeedbackPolarity::Up) => signal += FEEDBACK_UP_BONUS,
        Some(FeedbackPolarity::Down) => signal += FEEDBACK_DOWN_PENALTY,
        Some(FeedbackPolarity::Dismiss) => signal += FEEDBACK_DISMISS_PENALTY,
        None => {}
    }

    signal
}

/// Exponential temporal decay with a 90-day half-life
///
/// A watch from today weighs 1.0, one from 90 days ago 0.5, 180 days 0.25.
/// Records with no timestamp get a fixed half weight. Always in (0, 1].
pub fn temporal_decay(watched_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(watched_at) = watched_at else {
        return MISSING_TIMESTAMP_DECAY;
    };

    let days_ago = (now - watched_at).num_days().max(0) as f64;
    (-std::f64::consts::LN_2 * days_ago / DECAY_HALF_LIFE_DAYS).exp()
}
