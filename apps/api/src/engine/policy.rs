//! Topic progression policy.
//!
//! Decides which (topic, difficulty) a user should work on next. Four
//! rules, first applicable wins; exactly one fires per invocation.

use std::collections::HashSet;

use crate::models::mastery::TopicMasteryRow;
use crate::models::problem::{Difficulty, Topic};
use crate::models::user::SkillLevel;

/// Introduction order for topics the user has never touched. Intentionally
/// shorter than the full topic set: sorting and searching are reached
/// through weak-topic reinforcement only.
pub const INTRO_ORDER: [Topic; 8] = [
    Topic::Arrays,
    Topic::Strings,
    Topic::Stack,
    Topic::Queue,
    Topic::LinkedList,
    Topic::Trees,
    Topic::Graphs,
    Topic::DynamicProgramming,
];

/// Everything the policy needs, loaded up front so the decision itself
/// is a pure function.
#[derive(Debug, Clone)]
pub struct PolicySnapshot {
    /// Whether the user has any progress record at all, in any topic.
    pub has_any_progress: bool,
    pub skill_level: SkillLevel,
    /// Mastery rows in store order. Rule 2 breaks ties by keeping the
    /// first-encountered row, so this order is part of the contract.
    pub masteries: Vec<TopicMasteryRow>,
    /// Topics with at least one progress record.
    pub attempted_topics: HashSet<Topic>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextFocus {
    /// None means "any topic" — the selector ignores the topic filter.
    pub topic: Option<Topic>,
    pub difficulty: Difficulty,
}

pub fn next_focus(snapshot: &PolicySnapshot) -> NextFocus {
    // Rule 1: brand-new user, regardless of any stray mastery rows.
    if !snapshot.has_any_progress {
        return NextFocus {
            topic: Some(Topic::Arrays),
            difficulty: Difficulty::Easy,
        };
    }

    // Rule 2: reinforce the weakest topic below 70. Strict < keeps the
    // first-encountered row on ties.
    let mut weakest: Option<&TopicMasteryRow> = None;
    for mastery in snapshot.masteries.iter().filter(|m| m.mastery_level < 70) {
        if weakest.map_or(true, |w| mastery.mastery_level < w.mastery_level) {
            weakest = Some(mastery);
        }
    }
    if let Some(weakest) = weakest {
        let difficulty = if weakest.mastery_level < 30 {
            Difficulty::Easy
        } else if weakest.mastery_level < 60 {
            Difficulty::Medium
        } else {
            Difficulty::Hard
        };
        return NextFocus {
            topic: Some(weakest.topic),
            difficulty,
        };
    }

    // Rule 3: introduce the first entirely untouched topic, in canonical
    // order. Asymmetric with rule 2 on purpose: low mastery alone does not
    // qualify here — only zero progress records does.
    for topic in INTRO_ORDER {
        let mastered = snapshot
            .masteries
            .iter()
            .find(|m| m.topic == topic)
            .is_some_and(|m| m.mastery_level >= 50);
        if mastered {
            continue;
        }
        if !snapshot.attempted_topics.contains(&topic) {
            return NextFocus {
                topic: Some(topic),
                difficulty: Difficulty::Easy,
            };
        }
    }

    // Rule 4: nothing to reinforce or introduce.
    NextFocus {
        topic: None,
        difficulty: if snapshot.skill_level == SkillLevel::Beginner {
            Difficulty::Easy
        } else {
            Difficulty::Medium
        },
    }
}
