use std::collections::BTreeSet;

use checkin_bot::grouping::partitioner::partition;
use checkin_bot::models::participation::ParticipantPool;
use checkin_bot::models::workspace::IncompatiblePair;
use checkin_bot::AppError;

fn users(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|id| (*id).to_owned()).collect()
}

fn pairs(list: &[(&str, &str)]) -> BTreeSet<IncompatiblePair> {
    list.iter()
        .map(|(a, b)| IncompatiblePair::new(*a, *b).unwrap())
        .collect()
}

#[test]
fn incompatible_pair_forces_a_second_group() {
    let pool = ParticipantPool {
        daily: users(&["A", "B", "C"]),
        weekly: users(&["D"]),
    };
    let groups = partition(&pool, &pairs(&[("A", "D")]), &["M".to_owned()], 11).unwrap();

    assert_eq!(groups.len(), 2);
    let a = groups.iter().position(|g| g.contains("A")).unwrap();
    let d = groups.iter().position(|g| g.contains("D")).unwrap();
    assert_ne!(a, d);
    assert!(groups.iter().all(|g| g.admin == "M"));
    let placed: BTreeSet<&String> = groups.iter().flat_map(|g| &g.members).collect();
    assert_eq!(placed.len(), 4);
}

#[test]
fn every_participant_is_placed_exactly_once() {
    let daily: Vec<String> = (0..30).map(|i| format!("D{i:02}")).collect();
    let weekly: Vec<String> = (0..7).map(|i| format!("W{i:02}")).collect();
    let pool = ParticipantPool {
        daily: daily.iter().cloned().collect(),
        weekly: weekly.iter().cloned().collect(),
    };
    let groups = partition(&pool, &BTreeSet::new(), &["M".to_owned()], 11).unwrap();

    assert_eq!(groups.len(), 3);
    let mut seen = BTreeSet::new();
    for group in &groups {
        for member in &group.members {
            assert!(seen.insert(member.clone()), "{member} placed twice");
        }
    }
    assert_eq!(seen.len(), 37);
}

#[test]
fn group_sizes_differ_by_at_most_one() {
    let pool = ParticipantPool {
        daily: (0..25).map(|i| format!("U{i:02}")).collect(),
        weekly: BTreeSet::new(),
    };
    let groups = partition(&pool, &BTreeSet::new(), &["M".to_owned()], 11).unwrap();
    let sizes: Vec<usize> = groups.iter().map(|g| g.members.len()).collect();
    let (min, max) = (sizes.iter().min().unwrap(), sizes.iter().max().unwrap());
    assert!(max - min <= 1, "sizes {sizes:?}");
}

#[test]
fn daily_posters_spread_across_groups() {
    let pool = ParticipantPool {
        daily: users(&["D1", "D2", "D3", "D4"]),
        weekly: (0..18).map(|i| format!("W{i:02}")).collect(),
    };
    let groups = partition(&pool, &BTreeSet::new(), &["M".to_owned()], 11).unwrap();
    assert_eq!(groups.len(), 2);
    for group in &groups {
        let daily = group.members.iter().filter(|m| m.starts_with('D')).count();
        assert_eq!(daily, 2);
    }
}

#[test]
fn admins_rotate_across_groups() {
    let pool = ParticipantPool {
        daily: (0..33).map(|i| format!("U{i:02}")).collect(),
        weekly: BTreeSet::new(),
    };
    let admins = vec!["M1".to_owned(), "M2".to_owned()];
    let groups = partition(&pool, &BTreeSet::new(), &admins, 11).unwrap();
    let assigned: Vec<&str> = groups.iter().map(|g| g.admin.as_str()).collect();
    assert_eq!(assigned, vec!["M1", "M2", "M1"]);
}

#[test]
fn pairs_with_an_absent_user_are_ignored() {
    let pool = ParticipantPool {
        daily: users(&["A", "B"]),
        weekly: BTreeSet::new(),
    };
    let groups = partition(&pool, &pairs(&[("A", "Z")]), &["M".to_owned()], 11).unwrap();
    assert_eq!(groups.len(), 1);
}

#[test]
fn no_admins_is_a_configuration_error() {
    let err = partition(&ParticipantPool::default(), &BTreeSet::new(), &[], 11).unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
}
