//! Strongly typed payloads stored in JSON columns.
//!
//! Each variant carries exactly the fields its reader needs, so the writer
//! (catalog seeding, purchase engine) and the reader (scheduler handlers) cannot
//! drift apart on an untyped map.

use chrono::{DateTime, Utc};
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

/// What buying a catalog item grants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemEffect {
    /// Unlimited use of `action` for `duration_secs` after purchase
    TimedUnlimitedAction {
        /// Capability name the chat adapter checks, e.g. `"stickers"`
        action: String,
        /// How long the privilege lasts
        duration_secs: i64,
    },
    /// A single request forwarded to the admins
    OneShotRequest {
        /// What the buyer is asking for
        request: String,
    },
    /// A message posted to the buyer's channel after `delay_secs`
    Broadcast {
        /// Delay between purchase and posting
        delay_secs: i64,
    },
}

impl ItemEffect {
    /// Short name of the effect type for listings and logs
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::TimedUnlimitedAction { .. } => "timed_unlimited_action",
            Self::OneShotRequest { .. } => "one_shot_request",
            Self::Broadcast { .. } => "broadcast",
        }
    }
}

/// Parameters needed to re-derive the effect a purchase granted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PurchaseEffect {
    /// `action` is unlimited between `starts_at` and `ends_at`
    TimedUnlimitedAction {
        /// Capability name
        action: String,
        /// Start of the activation window
        starts_at: DateTime<Utc>,
        /// End of the activation window
        ends_at: DateTime<Utc>,
    },
    /// The request text that was submitted
    OneShotRequest {
        /// Submitted request
        request: String,
    },
    /// A broadcast queued for `fire_at`
    Broadcast {
        /// Message to post
        message: String,
        /// When it is due
        fire_at: DateTime<Utc>,
    },
}

/// Work a scheduled task performs when it fires.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskData {
    /// End the timed privilege granted by `purchase_id`
    ExpireEffect {
        /// Purchase whose effect ends
        purchase_id: i64,
        /// Capability that stops being unlimited
        action: String,
    },
    /// Post `message` on behalf of the buyer of `purchase_id`
    DelayedBroadcast {
        /// Purchase that paid for the broadcast
        purchase_id: i64,
        /// Message to post
        message: String,
    },
}

impl TaskData {
    /// Task type column value matching this payload
    #[must_use]
    pub const fn task_type(&self) -> super::scheduled_task::TaskType {
        match self {
            Self::ExpireEffect { .. } => super::scheduled_task::TaskType::ExpireEffect,
            Self::DelayedBroadcast { .. } => super::scheduled_task::TaskType::DelayedBroadcast,
        }
    }

    /// Purchase the task belongs to
    #[must_use]
    pub const fn purchase_id(&self) -> i64 {
        match self {
            Self::ExpireEffect { purchase_id, .. } | Self::DelayedBroadcast { purchase_id, .. } => {
                *purchase_id
            }
        }
    }
}
