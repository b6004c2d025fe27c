use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use uuid::Uuid;

use tastebud_shared::errors::{AppError, ErrorCode};

use crate::models::Friendship;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendshipStatus {
    Pending,
    Accepted,
    Rejected,
}

impl FriendshipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    /// The only transitions a recipient can make.
    pub fn respond(self, accepted: bool) -> Result<Self, AppError> {
        match self {
            Self::Pending if accepted => Ok(Self::Accepted),
            Self::Pending => Ok(Self::Rejected),
            other => Err(AppError::new(
                ErrorCode::FriendshipNotPending,
                format!("friend request is already {other}"),
            )),
        }
    }
}

impl fmt::Display for FriendshipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FriendshipStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("unknown friendship status: {s}")),
        }
    }
}

pub fn status_of(friendship: &Friendship) -> Result<FriendshipStatus, AppError> {
    friendship
        .status
        .parse()
        .map_err(|e: String| AppError::internal(e))
}

/// What sending a request to someone should do, given the rows that already
/// exist in each direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPlan {
    /// No prior row: insert a pending request.
    Create,
    /// Our earlier request was rejected: put it back to pending.
    Reopen(Uuid),
    /// They already asked us: accept their request.
    AcceptReverse(Uuid),
}

pub fn plan_request(
    outgoing: Option<&Friendship>,
    incoming: Option<&Friendship>,
) -> Result<RequestPlan, AppError> {
    if let Some(incoming) = incoming {
        match status_of(incoming)? {
            FriendshipStatus::Pending => return Ok(RequestPlan::AcceptReverse(incoming.id)),
            FriendshipStatus::Accepted => {
                return Err(AppError::new(ErrorCode::FriendshipExists, "you are already friends"));
            }
            // Their rejected request doesn't block ours.
            FriendshipStatus::Rejected => {}
        }
    }

    match outgoing {
        None => Ok(RequestPlan::Create),
        Some(row) => match status_of(row)? {
            FriendshipStatus::Rejected => Ok(RequestPlan::Reopen(row.id)),
            FriendshipStatus::Pending => Err(AppError::new(
                ErrorCode::FriendshipExists,
                "friend request already sent",
            )),
            FriendshipStatus::Accepted => {
                Err(AppError::new(ErrorCode::FriendshipExists, "you are already friends"))
            }
        },
    }
}

pub fn other_party(friendship: &Friendship, me: Uuid) -> Option<Uuid> {
    if friendship.requester_id == me {
        Some(friendship.recipient_id)
    } else if friendship.recipient_id == me {
        Some(friendship.requester_id)
    } else {
        None
    }
}
