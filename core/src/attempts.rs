use rand::Rng;
use rand::seq::IndexedRandom;
use runlab_protocol::AttemptsLeft;
use runlab_protocol::RevealMask;

use crate::config::Messages;

/// Why the withheld content of an exercise got revealed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevealTrigger {
    Success,
    AttemptsExhausted,
}

/// Attempt counter of one exercise.
///
/// Counted failures decrement the counter. The withheld content is revealed
/// once, on the first success or when the counter reaches zero, and only if
/// the exercise has something to reveal. After that every outcome is
/// ignored until [`AttemptTracker::restart`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttemptTracker {
    initial: AttemptsLeft,
    attempts: AttemptsLeft,
    mask: RevealMask,
    revealed: bool,
}

impl AttemptTracker {
    pub fn new(attempts: AttemptsLeft, mask: RevealMask) -> Self {
        Self {
            initial: attempts,
            attempts,
            mask,
            revealed: false,
        }
    }

    pub fn attempts_left(&self) -> AttemptsLeft {
        self.attempts
    }

    pub fn mask(&self) -> RevealMask {
        self.mask
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    pub fn record_outcome(&mut self, success: bool, counts_attempt: bool) -> Option<RevealTrigger> {
        if self.revealed {
            return None;
        }
        if !success && counts_attempt {
            self.attempts = self.attempts.decremented();
        }
        if self.mask.is_empty() {
            return None;
        }
        let trigger = if success {
            RevealTrigger::Success
        } else if self.attempts.is_exhausted() {
            RevealTrigger::AttemptsExhausted
        } else {
            return None;
        };
        self.revealed = true;
        Some(trigger)
    }

    /// What [`AttemptTracker::record_outcome`] would return for this
    /// outcome, without recording it.
    pub fn peek_outcome(&self, success: bool, counts_attempt: bool) -> Option<RevealTrigger> {
        self.clone().record_outcome(success, counts_attempt)
    }

    pub fn restart(&mut self) {
        self.attempts = self.initial;
        self.revealed = false;
    }
}

/// Sentence announcing what just became readable, or an empty string when
/// the exercise reveals nothing.
pub fn compose_reveal_message(
    mask: RevealMask,
    trigger: RevealTrigger,
    messages: &Messages,
) -> String {
    if mask.is_empty() {
        return String::new();
    }
    let success = trigger == RevealTrigger::Success;

    let mut sentence: Vec<String> = Vec::new();
    if mask.has_solution() {
        sentence.push(messages.reveal_corr.clone());
    }
    if mask.has_solution() && mask.has_remarks() {
        sentence.push(messages.reveal_join.clone());
    }
    if mask.has_remarks() {
        sentence.push(messages.reveal_rem.clone());
    }

    let head = if success {
        format!("\n{}", messages.success_tail)
    } else {
        if let Some(first) = sentence.first_mut() {
            *first = capitalize(first);
        }
        let tail = if mask.has_remarks() {
            &messages.fail_tail_plural
        } else {
            &messages.fail_tail
        };
        sentence.push(tail.clone());
        messages.fail_head.clone()
    };

    let mut parts = vec![head];
    parts.extend(sentence);
    format!("{}.", parts.join(" ").trim_end())
}

/// Celebration shown when every test passed, followed by the reveal
/// sentence when there is one.
pub fn success_message<R: Rng + ?Sized>(
    mask: RevealMask,
    messages: &Messages,
    rng: &mut R,
) -> String {
    let emoji = messages
        .success_emojis
        .choose(rng)
        .map(String::as_str)
        .unwrap_or_default();
    let info = compose_reveal_message(mask, RevealTrigger::Success, messages);
    format!(
        "{} {emoji} {}{info}",
        messages.success_head, messages.success_head_extra
    )
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
