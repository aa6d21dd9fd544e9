//! Property-based tests for room authorization

use std::sync::Arc;

use proptest::prelude::*;
use teamsync::backend::realtime::{JoinOutcome, RoomTopology};
use teamsync::backend::store::{Directory, MemoryDirectory};
use teamsync::shared::RoomRef;
use tokio::sync::mpsc;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_unauthorized_join_has_no_effect(membership in prop::collection::vec(any::<bool>(), 1..8)) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let directory = Arc::new(MemoryDirectory::new());
            let owner = directory.create_user("Owner", "owner@example.com", "hash").await.unwrap().summary.id;
            let guest = directory.create_user("Guest", "guest@example.com", "hash").await.unwrap().summary.id;
            let topology = RoomTopology::new(directory.clone());

            let mut rooms = Vec::new();
            for (i, &member) in membership.iter().enumerate() {
                let team = directory.create_team(&format!("team {}", i), owner).await.unwrap();
                if member {
                    directory.add_member(team.id, guest).await.unwrap();
                }
                rooms.push((RoomRef::team(team.id), member));
            }

            let (tx, mut rx) = mpsc::channel(64);
            let session = topology.register(guest, tx).await;
            for (room, member) in &rooms {
                let expected = if *member { JoinOutcome::Joined } else { JoinOutcome::Denied };
                assert_eq!(topology.join(&session, *room).await, expected);
            }

            for (i, (room, _)) in rooms.iter().enumerate() {
                topology.broadcast(&[*room], Arc::from(i.to_string())).await;
            }

            let mut received = Vec::new();
            while let Ok(payload) = rx.try_recv() {
                received.push(payload.to_string());
            }
            let expected: Vec<String> = rooms
                .iter()
                .enumerate()
                .filter(|(_, (_, member))| *member)
                .map(|(i, _)| i.to_string())
                .collect();
            assert_eq!(received, expected);
        });
    }
}
