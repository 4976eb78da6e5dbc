//! Conflict detection and resolution.
//!
//! A conflict exists when a file already carries a non-zero rating or a
//! non-empty description that differs from what the database says. The
//! evaluator never decides a conflict on its own: under
//! [`ResolutionPolicy::Ask`] the answer comes from a [`ConflictPrompt`], and
//! once the operator picks "skip all" the returned policy stays
//! [`ResolutionPolicy::SkipAllRemaining`] for the rest of the run.

use crate::config::MigrationDefaults;
use crate::events::{EventSink, MigrationEvent};
use crate::models::{ExifSnapshot, MatchedPhoto, MetadataUpdate, PhotoMeta};
use crate::tool::MetadataTool;
use serde::Serialize;
use std::collections::VecDeque;

/// Run-scoped rule for handling conflicts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPolicy {
    #[default]
    Ask,
    SkipAllRemaining,
}

/// Operator answer to a disclosed conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictAnswer {
    Overwrite,
    Keep,
    SkipAllRemaining,
}

/// Existing vs incoming values for a conflicting file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub existing: ExifSnapshot,
    pub incoming_rating: i32,
    pub incoming_description: String,
    pub rating_differs: bool,
    pub description_differs: bool,
}

/// Source of answers for conflicts under [`ResolutionPolicy::Ask`].
pub trait ConflictPrompt {
    fn ask(&mut self, photo: &MatchedPhoto, conflict: &Conflict) -> ConflictAnswer;
}

/// Answers every conflict the same way.
#[derive(Debug, Clone, Copy)]
pub struct FixedPrompt(pub ConflictAnswer);

impl ConflictPrompt for FixedPrompt {
    fn ask(&mut self, _photo: &MatchedPhoto, _conflict: &Conflict) -> ConflictAnswer {
        self.0
    }
}

/// Replays queued answers, then falls back to a default.
#[derive(Debug, Clone)]
pub struct ScriptedPrompt {
    answers: VecDeque<ConflictAnswer>,
    fallback: ConflictAnswer,
    asked: usize,
}

impl ScriptedPrompt {
    pub fn new(answers: impl IntoIterator<Item = ConflictAnswer>, fallback: ConflictAnswer) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            fallback,
            asked: 0,
        }
    }

    /// How many times the prompt was consulted.
    pub fn asked(&self) -> usize {
        self.asked
    }
}

impl ConflictPrompt for ScriptedPrompt {
    fn ask(&mut self, _photo: &MatchedPhoto, _conflict: &Conflict) -> ConflictAnswer {
        self.asked += 1;
        self.answers.pop_front().unwrap_or(self.fallback)
    }
}

/// What to do with one matched photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Write the (possibly empty) update.
    Proceed(MetadataUpdate),
    /// Keep the existing metadata for this file only.
    Keep,
    /// Skipped because "skip all remaining" is in effect.
    SkippedByPolicy,
}

/// How a conflict was settled, for the audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub conflict: Conflict,
    pub answer: ConflictAnswer,
    pub prompted: bool,
}

/// Result of evaluating one photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub snapshot: ExifSnapshot,
    pub decision: Decision,
    /// Policy to carry into the next photo.
    pub policy: ResolutionPolicy,
    pub resolution: Option<Resolution>,
}

/// Compares embedded metadata with incoming values and decides an action.
#[derive(Debug, Clone, Copy)]
pub struct ConflictEvaluator {
    favorite_rating: i32,
}

impl Default for ConflictEvaluator {
    fn default() -> Self {
        Self::new(MigrationDefaults::FAVORITE_RATING as i32)
    }
}

impl ConflictEvaluator {
    pub fn new(favorite_rating: i32) -> Self {
        Self { favorite_rating }
    }

    /// Rating the database implies: the favorite rating or zero.
    pub fn incoming_rating(&self, meta: &PhotoMeta) -> i32 {
        if meta.favorite {
            self.favorite_rating
        } else {
            0
        }
    }

    pub fn detect(&self, snapshot: &ExifSnapshot, meta: &PhotoMeta) -> Option<Conflict> {
        let incoming_rating = self.incoming_rating(meta);
        let existing_rating = snapshot.rating_or_zero();
        let existing_description = snapshot.description_or_empty();

        let rating_differs = existing_rating != 0 && existing_rating != incoming_rating;
        let description_differs =
            !existing_description.is_empty() && existing_description != meta.description;

        (rating_differs || description_differs).then(|| Conflict {
            existing: snapshot.clone(),
            incoming_rating,
            incoming_description: meta.description.clone(),
            rating_differs,
            description_differs,
        })
    }

    /// Fields that must change for the file to carry the incoming values.
    ///
    /// Empty when the file already matches.
    pub fn plan_update(&self, snapshot: &ExifSnapshot, meta: &PhotoMeta) -> MetadataUpdate {
        let incoming_rating = self.incoming_rating(meta);
        let rating = if meta.favorite {
            (snapshot.rating != Some(incoming_rating)).then_some(incoming_rating)
        } else {
            (snapshot.rating_or_zero() != 0).then_some(0)
        };

        let existing_description = snapshot.description_or_empty();
        let description =
            (existing_description != meta.description).then(|| meta.description.clone());

        MetadataUpdate {
            rating,
            description,
        }
    }

    /// Decide given a snapshot, the current policy and a source of answers.
    ///
    /// `answer` is only called when there is a conflict and the policy is
    /// [`ResolutionPolicy::Ask`].
    pub fn decide(
        &self,
        snapshot: ExifSnapshot,
        meta: &PhotoMeta,
        policy: ResolutionPolicy,
        answer: impl FnOnce(&Conflict) -> ConflictAnswer,
    ) -> Evaluation {
        let Some(conflict) = self.detect(&snapshot, meta) else {
            let update = self.plan_update(&snapshot, meta);
            return Evaluation {
                snapshot,
                decision: Decision::Proceed(update),
                policy,
                resolution: None,
            };
        };

        if policy == ResolutionPolicy::SkipAllRemaining {
            return Evaluation {
                snapshot,
                decision: Decision::SkippedByPolicy,
                policy,
                resolution: Some(Resolution {
                    conflict,
                    answer: ConflictAnswer::SkipAllRemaining,
                    prompted: false,
                }),
            };
        }

        let chosen = answer(&conflict);
        let (decision, policy) = match chosen {
            ConflictAnswer::Overwrite => (
                Decision::Proceed(self.plan_update(&snapshot, meta)),
                policy,
            ),
            ConflictAnswer::Keep => (Decision::Keep, policy),
            ConflictAnswer::SkipAllRemaining => (
                Decision::SkippedByPolicy,
                ResolutionPolicy::SkipAllRemaining,
            ),
        };

        Evaluation {
            snapshot,
            decision,
            policy,
            resolution: Some(Resolution {
                conflict,
                answer: chosen,
                prompted: true,
            }),
        }
    }

    /// Read the file's metadata and decide what to do with it.
    ///
    /// A failed read counts as "no existing metadata".
    pub fn evaluate(
        &self,
        photo: &MatchedPhoto,
        tool: &dyn MetadataTool,
        policy: ResolutionPolicy,
        prompt: &mut dyn ConflictPrompt,
        sink: &dyn EventSink,
    ) -> Evaluation {
        let snapshot = match tool.read(&photo.file.absolute_path) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                sink.emit(&MigrationEvent::SnapshotUnavailable {
                    relative_path: photo.file.relative_path.clone(),
                    reason: e.to_string(),
                });
                ExifSnapshot::default()
            }
        };

        let evaluation = self.decide(snapshot, &photo.meta, policy, |conflict| {
            sink.emit(&MigrationEvent::ConflictDisclosed {
                relative_path: photo.file.relative_path.clone(),
                existing: conflict.existing.clone(),
                incoming_rating: conflict.incoming_rating,
                incoming_description: conflict.incoming_description.clone(),
            });
            prompt.ask(photo, conflict)
        });

        if let Some(resolution) = &evaluation.resolution {
            sink.emit(&MigrationEvent::ConflictResolved {
                relative_path: photo.file.relative_path.clone(),
                answer: resolution.answer,
                prompted: resolution.prompted,
            });
        }

        evaluation
    }
}
