use hosttrack::events::projector::{ApplyOutcome, WorkingCache, apply};
use hosttrack::events::{Action, Event, Row};
use serde_json::json;

fn row(v: serde_json::Value) -> Row {
    v.as_object().cloned().unwrap()
}

fn project(cache: &mut WorkingCache, events: Vec<Event>) -> Vec<ApplyOutcome> {
    events
        .into_iter()
        .map(|ev| {
            let set = cache
                .entry_or_load(&ev.entity_label, &ev.query_name, |_, _| Ok(Vec::new()))
                .unwrap();
            apply(set, &ev.action, ev.row)
        })
        .collect()
}

#[test]
fn pairs_are_projected_independently() {
    let shared = row(json!({"name": "cron", "pid": "1"}));
    let mut cache = WorkingCache::new();
    let outcomes = project(
        &mut cache,
        vec![
            Event::simple("web-1", "processes", Action::Added, shared.clone(), 1),
            Event::simple("web-2", "processes", Action::Added, shared.clone(), 2),
            Event::simple("web-1", "crontab", Action::Added, shared.clone(), 3),
            Event::simple("web-1", "processes", Action::Removed, shared.clone(), 4),
        ],
    );
    assert_eq!(
        outcomes,
        vec![
            ApplyOutcome::Appended,
            ApplyOutcome::Appended,
            ApplyOutcome::Appended,
            ApplyOutcome::Removed
        ]
    );
    assert!(cache.get("web-1", "processes").unwrap().is_empty());
    assert_eq!(cache.get("web-2", "processes").unwrap().count(&shared), 1);
    assert_eq!(cache.get("web-1", "crontab").unwrap().count(&shared), 1);
    assert_eq!(cache.len(), 3);
}

#[test]
fn unknown_action_still_seeds_the_pair() {
    let mut cache = WorkingCache::new();
    let outcomes = project(
        &mut cache,
        vec![Event::simple(
            "web-1",
            "processes",
            Action::parse("snapshot"),
            row(json!({"pid": "1"})),
            1,
        )],
    );
    assert_eq!(outcomes, vec![ApplyOutcome::Ignored("snapshot".to_string())]);
    assert!(cache.get("web-1", "processes").unwrap().is_empty());
    assert_eq!(
        Action::parse("snapshot"),
        Action::Unknown("snapshot".to_string())
    );
}
