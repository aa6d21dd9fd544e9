//! Property-based tests for the reconciliation engine

use std::collections::HashSet;

use chrono::Utc;
use proptest::prelude::*;
use teamsync::client::ReconciliationEngine;
use teamsync::shared::{Project, ProjectId, ServerEvent, Task, TaskId, TaskStatus, Team, TeamId, UserId, UserSummary};

const PROJECTS: usize = 4;
const TASKS: usize = 6;

#[derive(Debug, Clone, Copy)]
enum Op {
    CreateProject(usize),
    RenameProject(usize),
    DeleteProject(usize),
    CreateTask(usize),
    MoveTask(usize),
    DeleteTask(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..PROJECTS).prop_map(Op::CreateProject),
        (0..PROJECTS).prop_map(Op::RenameProject),
        (0..PROJECTS).prop_map(Op::DeleteProject),
        (0..TASKS).prop_map(Op::CreateTask),
        (0..TASKS).prop_map(Op::MoveTask),
        (0..TASKS).prop_map(Op::DeleteTask),
    ]
}

struct World {
    team_id: TeamId,
    projects: Vec<Project>,
    tasks: Vec<Task>,
}

impl World {
    fn new() -> Self {
        let team_id = TeamId::new();
        let projects: Vec<Project> = (0..PROJECTS)
            .map(|i| Project {
                id: ProjectId::new(),
                name: format!("project {}", i),
                description: None,
                team_id,
                created_at: Utc::now(),
            })
            .collect();
        // Task i belongs to project i % PROJECTS
        let tasks = (0..TASKS)
            .map(|i| Task {
                id: TaskId::new(),
                title: format!("task {}", i),
                description: None,
                status: TaskStatus::Todo,
                project_id: projects[i % PROJECTS].id,
                assignees: vec![],
                due_date: None,
                created_at: Utc::now(),
            })
            .collect();
        Self { team_id, projects, tasks }
    }

    fn event(&self, op: Op) -> ServerEvent {
        match op {
            Op::CreateProject(i) => ServerEvent::ProjectCreated { project: self.projects[i].clone() },
            Op::RenameProject(i) => {
                let mut project = self.projects[i].clone();
                project.name.push_str(" (renamed)");
                ServerEvent::ProjectUpdated { project }
            }
            Op::DeleteProject(i) => ServerEvent::ProjectDeleted {
                project_id: self.projects[i].id,
                team_id: self.team_id,
            },
            Op::CreateTask(i) => ServerEvent::TaskCreated { task: self.tasks[i].clone() },
            Op::MoveTask(i) => {
                let mut task = self.tasks[i].clone();
                task.status = TaskStatus::Doing;
                ServerEvent::TaskUpdated { task }
            }
            Op::DeleteTask(i) => ServerEvent::TaskDeleted {
                task_id: self.tasks[i].id,
                project_id: self.tasks[i].project_id,
                team_id: self.team_id,
            },
        }
    }
}

proptest! {
    #[test]
    fn test_cache_holds_each_live_entity_once(ops in prop::collection::vec(op(), 0..60)) {
        let world = World::new();
        let mut engine = ReconciliationEngine::new(UserId::new());

        // Every event is delivered twice in a row as well
        for op in &ops {
            let event = world.event(*op);
            engine.apply(&event);
            engine.apply(&event);
        }

        let created_projects: HashSet<usize> = ops.iter().filter_map(|op| match op { Op::CreateProject(i) => Some(*i), _ => None }).collect();
        let deleted_projects: HashSet<usize> = ops.iter().filter_map(|op| match op { Op::DeleteProject(i) => Some(*i), _ => None }).collect();
        let created_tasks: HashSet<usize> = ops.iter().filter_map(|op| match op { Op::CreateTask(i) => Some(*i), _ => None }).collect();
        let deleted_tasks: HashSet<usize> = ops.iter().filter_map(|op| match op { Op::DeleteTask(i) => Some(*i), _ => None }).collect();

        let live_projects: HashSet<ProjectId> = created_projects
            .difference(&deleted_projects)
            .map(|i| world.projects[*i].id)
            .collect();
        let live_tasks: HashSet<TaskId> = created_tasks
            .iter()
            .filter(|i| !deleted_tasks.contains(*i) && !deleted_projects.contains(&(**i % PROJECTS)))
            .map(|i| world.tasks[*i].id)
            .collect();

        prop_assert_eq!(engine.projects().len(), live_projects.len());
        prop_assert_eq!(engine.projects().keys().collect::<HashSet<_>>(), live_projects);
        prop_assert_eq!(engine.tasks().len(), live_tasks.len());
        prop_assert_eq!(engine.tasks().keys().collect::<HashSet<_>>(), live_tasks);
    }

    #[test]
    fn test_reordering_converges(ops in prop::collection::vec(op(), 0..40), seed in any::<u64>()) {
        let world = World::new();
        let mut forward = ReconciliationEngine::new(UserId::new());
        let mut shuffled = ReconciliationEngine::new(UserId::new());

        for op in &ops {
            forward.apply(&world.event(*op));
        }

        // Deterministic permutation driven by `seed`
        let mut order: Vec<usize> = (0..ops.len()).collect();
        let mut state = seed | 1;
        for i in (1..order.len()).rev() {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            order.swap(i, (state % (i as u64 + 1)) as usize);
        }
        for i in order {
            shuffled.apply(&world.event(ops[i]));
        }

        // Membership converges; field values may differ by which update came last
        prop_assert_eq!(
            forward.projects().keys().collect::<HashSet<_>>(),
            shuffled.projects().keys().collect::<HashSet<_>>()
        );
        prop_assert_eq!(
            forward.tasks().keys().collect::<HashSet<_>>(),
            shuffled.tasks().keys().collect::<HashSet<_>>()
        );
    }

    #[test]
    fn test_team_delete_leaves_no_descendants(project_count in 1usize..5, tasks_per_project in 0usize..5) {
        let me = UserSummary {
            id: UserId::new(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            avatar_url: None,
        };
        let team = Team {
            id: TeamId::new(),
            name: "Foo".to_string(),
            members: vec![me.clone()],
            created_by: me.id,
            created_at: Utc::now(),
        };
        let mut engine = ReconciliationEngine::new(me.id);
        engine.load_teams(vec![team.clone()]);

        let mut events = Vec::new();
        for p in 0..project_count {
            let project = Project {
                id: ProjectId::new(),
                name: format!("project {}", p),
                description: None,
                team_id: team.id,
                created_at: Utc::now(),
            };
            for t in 0..tasks_per_project {
                events.push(ServerEvent::TaskCreated {
                    task: Task {
                        id: TaskId::new(),
                        title: format!("task {}", t),
                        description: None,
                        status: TaskStatus::Todo,
                        project_id: project.id,
                        assignees: vec![],
                        due_date: None,
                        created_at: Utc::now(),
                    },
                });
            }
            events.push(ServerEvent::ProjectCreated { project });
        }
        for event in &events {
            engine.apply(event);
        }

        let (ticket, _) = engine.select_team(team.id);
        let focused: Vec<Project> = engine.projects().iter().cloned().collect();
        prop_assert!(engine.apply_projects_snapshot(&ticket, focused));

        engine.apply(&ServerEvent::TeamDeleted { team_id: team.id });
        // Late duplicates of the original creates
        for event in &events {
            engine.apply(event);
        }

        prop_assert!(engine.teams().is_empty());
        prop_assert!(engine.projects().iter().all(|p| p.team_id != team.id));
        prop_assert!(engine.focused_projects().is_empty());
        prop_assert!(engine.tasks().is_empty());
        prop_assert!(engine.focused_tasks().is_empty());
    }
}
