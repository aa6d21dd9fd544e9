//! Room join authorization
//!
//! A `user:` room is only joinable by that user. Every other kind requires
//! current membership in the referenced entity, looked up through the
//! directory at the moment of the join.

use thiserror::Error;

use crate::backend::store::{Membership, StoreError};
use crate::shared::ids::{ConversationId, ProjectId, TeamId, UserId};
use crate::shared::room::{RoomKind, RoomRef};

#[derive(Debug, Error)]
pub enum JoinDenied {
    #[error("not permitted to join this room")]
    NotPermitted,

    #[error("membership lookup failed: {0}")]
    Lookup(#[from] StoreError),
}

pub async fn authorize_join(
    membership: &dyn Membership,
    user: UserId,
    room: &RoomRef,
) -> Result<(), JoinDenied> {
    let permitted = match room.kind {
        RoomKind::User => room.id == user.as_uuid(),
        RoomKind::Team => membership.is_team_member(TeamId(room.id), user).await?,
        RoomKind::Project => membership.is_project_member(ProjectId(room.id), user).await?,
        RoomKind::Conversation => {
            membership
                .is_conversation_member(ConversationId(room.id), user)
                .await?
        }
    };

    if permitted {
        Ok(())
    } else {
        Err(JoinDenied::NotPermitted)
    }
}
