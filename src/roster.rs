// Membership rules enforced before the store's raw team mutations.
//
// The store appends and filters members without checking anything; every
// caller that changes a roster goes through here first.

use thiserror::Error;

use crate::catalog;
use crate::error::StoreError;
use crate::store::models::{CharacterChoice, Team, TeamMember, TeamRole, MAX_TEAM_SIZE};
use crate::store::Store;

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("The chosen team was invalid.")]
    UnknownTeam,

    #[error("This team is already at maximum capacity ({0}/{MAX_TEAM_SIZE})")]
    TeamFull(usize),

    #[error("This member has not registered for the event.")]
    NotRegistered,

    #[error("This member is already in a team. ({0})")]
    AlreadyOnTeam(String),

    #[error("The member is not in a team.")]
    NotOnTeam,

    #[error("The team leader can not be removed. Please delete the team, or change the team's leader instead.")]
    LeaderProtected,

    #[error("You are already registered.")]
    AlreadyRegistered,

    #[error("That character or skin does not exist.")]
    UnknownCharacter,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Validate a character choice against the catalog.
pub fn check_choice(character_id: &str, skin_id: &str) -> Result<CharacterChoice, RosterError> {
    catalog::resolve_choice(character_id, skin_id)
        .map(|(c, s)| CharacterChoice {
            character_id: c.id.to_string(),
            skin_id: s.id.to_string(),
        })
        .ok_or(RosterError::UnknownCharacter)
}

/// Preconditions for opening a registration prompt.
pub fn check_can_register(store: &Store, user_id: &str) -> Result<(), RosterError> {
    if store.is_registered(user_id)? {
        return Err(RosterError::AlreadyRegistered);
    }
    Ok(())
}

pub fn register(
    store: &Store,
    user_id: &str,
    username: &str,
    choice: CharacterChoice,
) -> Result<(), RosterError> {
    let choice = check_choice(&choice.character_id, &choice.skin_id)?;
    check_can_register(store, user_id)?;
    store.register(user_id, username, choice)?;
    Ok(())
}

/// A registered, unassigned user as a new member with the given role.
fn eligible_member(
    store: &Store,
    user_id: &str,
    role: TeamRole,
) -> Result<TeamMember, RosterError> {
    let snapshot = store.snapshot()?;
    let user = snapshot
        .registered_users
        .get(user_id)
        .filter(|u| u.registered)
        .ok_or(RosterError::NotRegistered)?;
    if let Some(team) = snapshot.team_containing(user_id) {
        return Err(RosterError::AlreadyOnTeam(team.name.clone()));
    }
    Ok(TeamMember::from_registration(user, role))
}

/// Leader entry for a team that is about to be created.
pub fn prepare_leader(store: &Store, leader_id: &str) -> Result<TeamMember, RosterError> {
    eligible_member(store, leader_id, TeamRole::Leader)
}

/// Create a team after re-checking the leader, which may have changed while a
/// confirmation was pending.
pub fn create_team(store: &Store, leader_id: &str, name: &str) -> Result<Team, RosterError> {
    let leader = prepare_leader(store, leader_id)?;
    Ok(store.create_team(leader, name)?)
}

/// Add `user_id` to `team_id`, checking in order: team exists, has room,
/// user registered, user unassigned.
pub fn add_member(store: &Store, team_id: &str, user_id: &str) -> Result<Team, RosterError> {
    let team = store.team(team_id)?.ok_or(RosterError::UnknownTeam)?;
    if team.members.len() >= MAX_TEAM_SIZE {
        return Err(RosterError::TeamFull(team.members.len()));
    }
    let member = eligible_member(store, user_id, TeamRole::Member)?;
    Ok(store.add_member(team_id, member)?)
}

/// Remove a non-leader from whichever team holds them.
pub fn remove_member(store: &Store, user_id: &str) -> Result<Team, RosterError> {
    let team = store
        .find_team_containing(user_id)?
        .ok_or(RosterError::NotOnTeam)?;
    if team.member(user_id).is_some_and(TeamMember::is_leader) {
        return Err(RosterError::LeaderProtected);
    }
    Ok(store.remove_member(user_id)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        for id in ["a", "b", "c", "d", "e"] {
            register(&store, id, id, check_choice("guardian", "wayfarer").unwrap()).unwrap();
        }
        (dir, store)
    }

    #[test]
    fn test_register_validates_catalog_and_duplicates() {
        let (_dir, store) = setup();
        let bad = CharacterChoice {
            character_id: "guardian".into(),
            skin_id: "abysswalker".into(),
        };
        assert!(matches!(
            register(&store, "z", "z", bad),
            Err(RosterError::UnknownCharacter)
        ));
        assert!(matches!(
            register(&store, "a", "a", check_choice("wylder", "default").unwrap()),
            Err(RosterError::AlreadyRegistered)
        ));
    }

    #[test]
    fn test_capacity_enforced() {
        let (_dir, store) = setup();
        let team = create_team(&store, "a", "Alpha").unwrap();
        add_member(&store, &team.id, "b").unwrap();
        add_member(&store, &team.id, "c").unwrap();
        assert!(matches!(
            add_member(&store, &team.id, "d"),
            Err(RosterError::TeamFull(3))
        ));
        assert_eq!(store.team(&team.id).unwrap().unwrap().members.len(), 3);
    }

    #[test]
    fn test_duplicate_membership_rejected() {
        let (_dir, store) = setup();
        let alpha = create_team(&store, "a", "Alpha").unwrap();
        let beta = create_team(&store, "d", "Beta").unwrap();
        add_member(&store, &alpha.id, "b").unwrap();
        match add_member(&store, &beta.id, "b") {
            Err(RosterError::AlreadyOnTeam(name)) => assert_eq!(name, "Alpha"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            create_team(&store, "a", "Gamma"),
            Err(RosterError::AlreadyOnTeam(_))
        ));
    }

    #[test]
    fn test_unregistered_and_unknown_team() {
        let (_dir, store) = setup();
        assert!(matches!(
            create_team(&store, "ghost", "Alpha"),
            Err(RosterError::NotRegistered)
        ));
        let team = create_team(&store, "a", "Alpha").unwrap();
        assert!(matches!(
            add_member(&store, &team.id, "ghost"),
            Err(RosterError::NotRegistered)
        ));
        assert!(matches!(
            add_member(&store, "nope", "b"),
            Err(RosterError::UnknownTeam)
        ));
    }

    #[test]
    fn test_leader_protection() {
        let (_dir, store) = setup();
        let team = create_team(&store, "a", "Alpha").unwrap();
        add_member(&store, &team.id, "b").unwrap();
        assert!(matches!(
            remove_member(&store, "a"),
            Err(RosterError::LeaderProtected)
        ));
        assert!(matches!(remove_member(&store, "e"), Err(RosterError::NotOnTeam)));
        let team = remove_member(&store, "b").unwrap();
        assert_eq!(team.members.len(), 1);
    }

    #[test]
    fn test_invariants_hold_after_mixed_operations() {
        let (_dir, store) = setup();
        let alpha = create_team(&store, "a", "Alpha").unwrap();
        let beta = create_team(&store, "b", "Beta").unwrap();
        let ops: Vec<Box<dyn Fn() -> Result<Team, RosterError>>> = vec![
            Box::new(|| add_member(&store, &alpha.id, "c")),
            Box::new(|| add_member(&store, &beta.id, "c")),
            Box::new(|| add_member(&store, &alpha.id, "b")),
            Box::new(|| remove_member(&store, "c")),
            Box::new(|| add_member(&store, &beta.id, "c")),
            Box::new(|| add_member(&store, &beta.id, "d")),
            Box::new(|| add_member(&store, &beta.id, "e")),
            Box::new(|| remove_member(&store, "b")),
        ];
        for op in ops {
            let _ = op();
        }
        let agg = store.snapshot().unwrap();
        let mut seen = std::collections::HashSet::new();
        for team in agg.teams.values() {
            assert!(team.members.len() <= MAX_TEAM_SIZE);
            assert_eq!(team.members.iter().filter(|m| m.is_leader()).count(), 1);
            for m in &team.members {
                assert!(seen.insert(m.id.clone()), "{} on two teams", m.id);
            }
        }
    }
}
