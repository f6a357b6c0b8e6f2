// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Replay protection for challenges.

use dashmap::{DashMap, mapref::entry::Entry};
use serde::{Deserialize, Serialize};

use crate::{ChallengeId, StakeAmount, WorkerIdentity};

/// The outcome of an adjudicated challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// The adjudicated (capsule, fragment) pair.
    pub challenge_id: ChallengeId,
    /// The identity backing the worker that produced the fragment.
    pub worker: WorkerIdentity,
    /// Whether the fragment was a correct re-encryption of the capsule.
    pub cfrag_correct: bool,
    /// The amount slashed from the worker; zero if the fragment was correct.
    pub penalty: StakeAmount,
}

impl Verdict {
    /// Returns true if the worker was slashed.
    pub fn slashed(&self) -> bool {
        self.penalty > 0
    }
}

/// Error returned when a challenge has already been adjudicated.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
#[error("challenge {0} has already been adjudicated")]
pub struct AlreadyAdjudicated(pub ChallengeId);

/// The state of a challenge ID with an entry in the ledger.
#[derive(Debug, Clone)]
enum ChallengeState {
    /// A submission holds the ID and is running its commit.
    InFlight,
    /// The challenge has been adjudicated.
    Adjudicated(Verdict),
}

/// The set of adjudicated challenges and their verdicts.
///
/// Each challenge ID transitions at most once from unseen to adjudicated, even under concurrent
/// submissions. An ID is reserved while its commit runs; no map lock is held during the commit, so
/// challenges for other IDs proceed independently and the commit may call back into the ledger.
#[derive(Debug, Default)]
pub struct ChallengeLedger {
    challenges: DashMap<ChallengeId, ChallengeState>,
}

impl ChallengeLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the challenge has been adjudicated.
    ///
    /// A challenge whose commit is still in flight is not adjudicated yet.
    pub fn is_adjudicated(&self, challenge_id: &ChallengeId) -> bool {
        self.verdict(challenge_id).is_some()
    }

    /// Returns the recorded verdict of the challenge, if any.
    pub fn verdict(&self, challenge_id: &ChallengeId) -> Option<Verdict> {
        match self.challenges.get(challenge_id)?.value() {
            ChallengeState::Adjudicated(verdict) => Some(verdict.clone()),
            ChallengeState::InFlight => None,
        }
    }

    /// Records `verdict` unless its challenge is already adjudicated or in flight.
    ///
    /// Returns true if the verdict was recorded. Marking a challenge twice leaves the first
    /// verdict in place.
    pub fn mark_adjudicated(&self, verdict: Verdict) -> bool {
        match self.challenges.entry(verdict.challenge_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(ChallengeState::Adjudicated(verdict));
                true
            }
        }
    }

    /// Adjudicates a challenge exactly once.
    ///
    /// Fails with [`AlreadyAdjudicated`] if the challenge has a verdict or another call for it is
    /// in flight. Otherwise reserves the challenge, runs `commit` without holding any lock, and
    /// records the returned verdict. If `commit` fails or panics, the reservation is released and
    /// the challenge can be submitted again.
    pub fn adjudicate<E, F>(&self, challenge_id: ChallengeId, commit: F) -> Result<Verdict, E>
    where
        F: FnOnce() -> Result<Verdict, E>,
        E: From<AlreadyAdjudicated>,
    {
        let reservation = self.reserve(challenge_id)?;
        let verdict = commit()?;
        debug_assert_eq!(verdict.challenge_id, challenge_id);
        reservation.complete(verdict.clone());
        Ok(verdict)
    }

    fn reserve(&self, challenge_id: ChallengeId) -> Result<Reservation<'_>, AlreadyAdjudicated> {
        match self.challenges.entry(challenge_id) {
            Entry::Occupied(_) => Err(AlreadyAdjudicated(challenge_id)),
            Entry::Vacant(vacant) => {
                vacant.insert(ChallengeState::InFlight);
                Ok(Reservation {
                    ledger: self,
                    challenge_id,
                    completed: false,
                })
            }
        }
    }

    /// Returns the number of adjudicated challenges.
    pub fn len(&self) -> usize {
        self.challenges
            .iter()
            .filter(|entry| matches!(entry.value(), ChallengeState::Adjudicated(_)))
            .count()
    }

    /// Returns true if no challenge has been adjudicated.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An in-flight challenge ID, released on drop unless completed.
#[derive(Debug)]
struct Reservation<'a> {
    ledger: &'a ChallengeLedger,
    challenge_id: ChallengeId,
    completed: bool,
}

impl Reservation<'_> {
    fn complete(mut self, verdict: Verdict) {
        self.ledger
            .challenges
            .insert(self.challenge_id, ChallengeState::Adjudicated(verdict));
        self.completed = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.ledger.challenges.remove_if(&self.challenge_id, |_, state| {
                matches!(state, ChallengeState::InFlight)
            });
        }
    }
}
