//! Target rooms for each event variant
//!
//! | Event | Rooms |
//! |---|---|
//! | team created | creator's `user:` room |
//! | team updated | `team:<id>` |
//! | member added / removed | `team:<id>` and the member's `user:` room |
//! | team deleted | `team:<id>` |
//! | project created / updated / deleted | `team:<team_id>` |
//! | task created / updated / deleted | `project:<project_id>` |
//! | message sent | `conversation:<id>` and every member's `user:` room |

use crate::shared::event::ServerEvent;
use crate::shared::room::RoomRef;

pub fn target_rooms(event: &ServerEvent) -> Vec<RoomRef> {
    match event {
        ServerEvent::TeamCreated { team } => vec![RoomRef::user(team.created_by)],
        ServerEvent::TeamUpdated { team } => vec![RoomRef::team(team.id)],
        ServerEvent::MemberAdded { team, member } | ServerEvent::MemberRemoved { team, member } => {
            vec![RoomRef::team(team.id), RoomRef::user(*member)]
        }
        ServerEvent::TeamDeleted { team_id } => vec![RoomRef::team(*team_id)],
        ServerEvent::ProjectCreated { project } | ServerEvent::ProjectUpdated { project } => {
            vec![RoomRef::team(project.team_id)]
        }
        ServerEvent::ProjectDeleted { team_id, .. } => vec![RoomRef::team(*team_id)],
        ServerEvent::TaskCreated { task } | ServerEvent::TaskUpdated { task } => {
            vec![RoomRef::project(task.project_id)]
        }
        ServerEvent::TaskDeleted { project_id, .. } => vec![RoomRef::project(*project_id)],
        ServerEvent::MessageSent { message, conversation } => {
            let mut rooms = vec![RoomRef::conversation(message.conversation_id)];
            rooms.extend(conversation.members.iter().map(|member| RoomRef::user(member.id)));
            rooms
        }
    }
}
