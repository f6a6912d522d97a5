//! Encounter lifecycle: gates whether `record` calls do anything, and what
//! kind of recording (if any) is in progress.
//!
//! Modeled as an explicit state machine rather than a couple of booleans,
//! because the transition rules — in particular, what happens when a start
//! call arrives while something is already active — are exactly the part of
//! this module that is easy to get subtly wrong (§4.6, §9).

use chrono::{DateTime, Utc};
use tracing::debug;

/// Typed payload for a raid-encounter start (§6: "raid-encounter start/end
/// with id, name, difficulty, group size, success").
#[derive(Debug, Clone, PartialEq)]
pub struct RaidInfo {
    pub encounter_id: u64,
    pub name: String,
    pub difficulty: String,
    pub group_size: u32,
}

/// Typed payload for a mythic-plus (timed dungeon) start (§6: "dungeon
/// start/completion/reset with map id").
#[derive(Debug, Clone, PartialEq)]
pub struct MythicPlusInfo {
    pub map_id: u64,
}

/// Which kind of encounter is active, carrying the typed payload supplied at
/// start. A manual encounter (explicit test start/stop) carries nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum EncounterKind {
    Raid(RaidInfo),
    MythicPlus(MythicPlusInfo),
    Manual,
}

/// Which of the three kinds is active, without the payload — used wherever
/// only the discriminant matters (gating, diagnostics, stop routing).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncounterVariant {
    Raid,
    MythicPlus,
    Manual,
}

impl EncounterKind {
    #[must_use]
    pub const fn variant(&self) -> EncounterVariant {
        match self {
            Self::Raid(_) => EncounterVariant::Raid,
            Self::MythicPlus(_) => EncounterVariant::MythicPlus,
            Self::Manual => EncounterVariant::Manual,
        }
    }
}

/// Metadata closed out when an encounter ends; embedded into the snapshot
/// (§6).
#[derive(Debug, Clone, PartialEq)]
pub struct EncounterMetadata {
    pub kind: EncounterKind,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Present for raid/mythicplus completions; absent for manual stops.
    pub success: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
enum State {
    Idle,
    Active { kind: EncounterKind, start_time: DateTime<Utc> },
    Closing(EncounterVariant),
}

/// Outcome of a `start_*` call.
#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    /// No encounter was active; recording begins.
    Started,
    /// An encounter (of any kind) was already active; this call is ignored
    /// and the existing encounter continues uninterrupted.
    ///
    /// This is the resolved form of the "dungeon takes precedence" open
    /// question (§9): preemption would silently discard an unfinished,
    /// unsnapshotted recording, so a start call while anything is active is
    /// always a no-op rather than a teardown, regardless of which two kinds
    /// are involved.
    IgnoredAlreadyActive(EncounterVariant),
}

/// Outcome of a `stop_*` call.
#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    /// The active encounter of this variant was closed; its metadata is
    /// handed back for the orchestrator to build a snapshot from.
    Closed(EncounterMetadata),
    /// Nothing was active, or the active encounter was a different variant;
    /// there is nothing to stop.
    Ignored,
}

/// Encounter lifecycle state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct EncounterLifecycle {
    state: State,
}

impl Default for EncounterLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl EncounterLifecycle {
    #[must_use]
    pub const fn new() -> Self {
        Self { state: State::Idle }
    }

    /// `true` while any encounter is active — the gate `record` checks
    /// before touching the registry (§4.6).
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.state, State::Active { .. })
    }

    #[must_use]
    pub fn active_variant(&self) -> Option<EncounterVariant> {
        match &self.state {
            State::Active { kind, .. } => Some(kind.variant()),
            _ => None,
        }
    }

    fn start(&mut self, kind: EncounterKind, now: DateTime<Utc>) -> StartOutcome {
        match &self.state {
            State::Idle => {
                let variant = kind.variant();
                self.state = State::Active { kind, start_time: now };
                debug!(?variant, "encounter started");
                StartOutcome::Started
            }
            State::Active { kind: active, .. } => {
                let active_variant = active.variant();
                debug!(attempted = ?kind.variant(), active = ?active_variant, "encounter start ignored, already active");
                StartOutcome::IgnoredAlreadyActive(active_variant)
            }
            State::Closing(closing_variant) => {
                debug!(attempted = ?kind.variant(), closing = ?closing_variant, "encounter start ignored, snapshot still closing");
                StartOutcome::IgnoredAlreadyActive(*closing_variant)
            }
        }
    }

    pub fn start_raid(&mut self, info: RaidInfo, now: DateTime<Utc>) -> StartOutcome {
        self.start(EncounterKind::Raid(info), now)
    }

    pub fn start_mythicplus(&mut self, info: MythicPlusInfo, now: DateTime<Utc>) -> StartOutcome {
        self.start(EncounterKind::MythicPlus(info), now)
    }

    pub fn start_manual(&mut self, now: DateTime<Utc>) -> StartOutcome {
        self.start(EncounterKind::Manual, now)
    }

    /// Stops the active encounter if its variant matches `variant`.
    /// Stopping a variant that is not active (including "nothing is
    /// active") is ignored.
    pub fn stop(&mut self, variant: EncounterVariant, now: DateTime<Utc>, success: Option<bool>) -> StopOutcome {
        match &self.state {
            State::Active { kind, start_time } if kind.variant() == variant => {
                let metadata = EncounterMetadata {
                    kind: kind.clone(),
                    start_time: *start_time,
                    end_time: now,
                    success,
                };
                self.state = State::Closing(variant);
                debug!(?variant, "encounter stopped, snapshot pending");
                StopOutcome::Closed(metadata)
            }
            _ => {
                debug!(?variant, "encounter stop ignored");
                StopOutcome::Ignored
            }
        }
    }

    /// Called by the orchestrator once it has built and queued the snapshot
    /// for a closing encounter, returning the lifecycle to `Idle` so a new
    /// encounter can start.
    pub fn finish_close(&mut self) {
        self.state = State::Idle;
    }
}
