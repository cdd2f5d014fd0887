//! Which topics and actions a learner's tier allows, and the credit redemption that upgrades it.
//!
//! Every check runs against a tier-normalized state: a paid tier whose expiry has passed is treated
//! as free, and the normalized state is handed back so the caller can keep it.

use chrono::{DateTime, Utc};
use content_utils::Topic;
use serde::{Deserialize, Serialize};

use crate::config::{EngineConfig, saturating_add};
use crate::mastery::{MasteryEvent, MasteryState, Tier};
use crate::selector::SessionTopic;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    /// Start a session or look at the current card.
    Open,
    /// Move past the current card.
    Advance,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DenialReason {
    TierRequired { required: Tier },
    DailyCapReached { cap: u32 },
}

/// What the presentation layer should do about a denial.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub enum Remedy {
    /// Hard lock: send the learner to the upgrade screen.
    Upgrade,
    /// The current card stays visible; only moving on is blocked.
    SoftLock,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct Denial {
    pub reason: DenialReason,
    pub remedy: Remedy,
}

impl std::fmt::Display for Denial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.reason {
            DenialReason::TierRequired { required } => {
                write!(f, "requires the {required:?} tier")
            }
            DenialReason::DailyCapReached { cap } => {
                write!(f, "daily limit of {cap} cards reached")
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(tag = "access", rename_all = "camelCase")]
pub enum Access {
    Allow,
    Deny(Denial),
}

impl Access {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Access::Allow)
    }
}

/// A decision together with the normalized state it was made against.
#[derive(Clone, Debug, PartialEq)]
pub struct Checked {
    pub state: MasteryState,
    pub access: Access,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntitlementError {
    #[error("not enough credits: have {available}, need {required}")]
    InsufficientCredits { available: u32, required: u32 },
    #[error("a higher tier is already active")]
    AlreadyHigherTier,
    #[error("requires the {required:?} tier")]
    TierRequired { required: Tier },
}

pub fn required_tier(topic: Topic) -> Tier {
    match topic {
        Topic::Vocabulary | Topic::Analogies => Tier::Free,
        Topic::Quantitative | Topic::English => Tier::Plus,
    }
}

/// The event that drops a lapsed tier, if the tier at `now` has lapsed.
pub fn normalization_event(state: &MasteryState, now: DateTime<Utc>) -> Option<MasteryEvent> {
    state.tier_lapsed(now).then_some(MasteryEvent::TierNormalized)
}

/// Drops a lapsed paid tier and the settings only it allowed. Idempotent.
pub fn normalize_tier(state: MasteryState, now: DateTime<Utc>) -> MasteryState {
    match normalization_event(&state, now) {
        Some(event) => {
            log::info!("{:?} tier expired, back to free", state.tier);
            state.apply_at(now, event)
        }
        None => state,
    }
}

pub fn check_access(
    state: MasteryState,
    topic: SessionTopic,
    action: Action,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Checked {
    let state = normalize_tier(state, now);
    let access = evaluate(&state, topic, action, now, config);
    if let Access::Deny(denial) = &access {
        log::info!("Denied {action:?} on {topic:?}: {denial}");
    }
    Checked { state, access }
}

fn evaluate(
    state: &MasteryState,
    topic: SessionTopic,
    action: Action,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Access {
    if let Some(topic) = topic.fixed_topic() {
        let required = required_tier(topic);
        if state.tier < required {
            return Access::Deny(Denial {
                reason: DenialReason::TierRequired { required },
                remedy: Remedy::Upgrade,
            });
        }
    }

    if state.tier == Tier::Free && action == Action::Advance && topic.is_swipe() {
        let cap = config.free_daily_swipe_cap;
        if state.swipes_on(config.calendar_date(now)) >= cap {
            return Access::Deny(Denial {
                reason: DenialReason::DailyCapReached { cap },
                remedy: Remedy::SoftLock,
            });
        }
    }

    Access::Allow
}

/// The event a redemption would append. `state` must already be normalized.
pub fn plan_redeem(
    state: &MasteryState,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Result<MasteryEvent, EntitlementError> {
    let permanent_plus = state.tier == Tier::Plus && state.tier_expiry.is_none();
    if state.tier == Tier::Pro || permanent_plus {
        return Err(EntitlementError::AlreadyHigherTier);
    }
    if state.credits < config.redeem_cost {
        return Err(EntitlementError::InsufficientCredits {
            available: state.credits,
            required: config.redeem_cost,
        });
    }
    // A redemption during an active window restarts it from now.
    Ok(MasteryEvent::CreditsRedeemed {
        cost: config.redeem_cost,
        expiry: saturating_add(now, config.redeem_window()),
    })
}

/// Trades credits for a temporary Plus tier. On error the caller's state is untouched.
pub fn redeem(
    state: &MasteryState,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Result<MasteryState, EntitlementError> {
    let state = normalize_tier(state.clone(), now);
    let event = plan_redeem(&state, now, config)?;
    Ok(state.apply_at(now, event))
}

/// Applies a tier confirmed by the payment collaborator.
pub fn grant_tier(
    state: MasteryState,
    tier: Tier,
    expiry: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> MasteryState {
    state.apply_at(now, MasteryEvent::TierGranted { tier, expiry })
}

pub fn plan_auto_explain(
    state: &MasteryState,
    enabled: bool,
) -> Result<MasteryEvent, EntitlementError> {
    if enabled && state.tier == Tier::Free {
        return Err(EntitlementError::TierRequired {
            required: Tier::Plus,
        });
    }
    Ok(MasteryEvent::AutoExplainSet { enabled })
}

pub fn set_auto_explain(
    state: &MasteryState,
    enabled: bool,
    now: DateTime<Utc>,
) -> Result<MasteryState, EntitlementError> {
    let state = normalize_tier(state.clone(), now);
    let event = plan_auto_explain(&state, enabled)?;
    Ok(state.apply_at(now, event))
}
