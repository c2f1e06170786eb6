#![forbid(unsafe_code)]

use std::collections::HashSet;

use proptest::prelude::*;
use todui::task::model::{Priority, Task};
use todui::task::view::{StatusFilter, TaskCounts, derive_view};

fn arb_tasks() -> impl Strategy<Value = Vec<Task>> {
    prop::collection::vec(
        ("[a-zA-Z ]{1,12}", "[a-zA-Z ]{0,12}", any::<bool>()),
        0..20,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (title, description, completed))| {
                make_task(i64::try_from(i).unwrap() + 1, title, description, completed)
            })
            .collect()
    })
}

fn make_task(id: i64, title: String, description: String, completed: bool) -> Task {
    Task {
        id,
        user_id: None,
        title,
        description,
        completed,
        priority: Priority::Medium,
        due_date: None,
        category: None,
        created_at: String::new(),
        updated_at: String::new(),
    }
}

/// Straightforward restatement of the search rule, kept apart from the
/// library code it checks.
fn should_match(task: &Task, query: &str) -> bool {
    let q = query.trim().to_lowercase();
    q.is_empty()
        || task.title.to_lowercase().contains(&q)
        || task.description.to_lowercase().contains(&q)
}

fn should_pass_filter(task: &Task, filter: StatusFilter) -> bool {
    match filter {
        StatusFilter::All => true,
        StatusFilter::Active => !task.completed,
        StatusFilter::Completed => task.completed,
    }
}

fn arb_filter() -> impl Strategy<Value = StatusFilter> {
    prop_oneof![
        Just(StatusFilter::All),
        Just(StatusFilter::Active),
        Just(StatusFilter::Completed),
    ]
}

fn ids(tasks: &[&Task]) -> Vec<i64> {
    tasks.iter().map(|t| t.id).collect()
}

proptest! {
    #[test]
    fn blank_query_and_all_is_identity(tasks in arb_tasks(), blank in "[ \t]{0,3}") {
        let view = derive_view(&tasks, &blank, StatusFilter::All);
        let all: Vec<i64> = tasks.iter().map(|t| t.id).collect();
        prop_assert_eq!(ids(&view.visible), all);
    }

    #[test]
    fn visible_is_ordered_subset_matching_query_and_filter(
        tasks in arb_tasks(),
        query in "[ ]{0,2}[a-zA-Z ]{0,3}[ ]{0,2}",
        filter in arb_filter(),
    ) {
        let view = derive_view(&tasks, &query, filter);
        let expected: Vec<i64> = tasks
            .iter()
            .filter(|t| should_match(t, &query) && should_pass_filter(t, filter))
            .map(|t| t.id)
            .collect();
        prop_assert_eq!(ids(&view.visible), expected);
    }

    #[test]
    fn active_and_completed_partition_all(tasks in arb_tasks(), query in "[a-zA-Z]{0,2}") {
        let all: HashSet<i64> = ids(&derive_view(&tasks, &query, StatusFilter::All).visible)
            .into_iter()
            .collect();
        let active: HashSet<i64> = ids(&derive_view(&tasks, &query, StatusFilter::Active).visible)
            .into_iter()
            .collect();
        let completed: HashSet<i64> =
            ids(&derive_view(&tasks, &query, StatusFilter::Completed).visible)
                .into_iter()
                .collect();

        prop_assert!(active.is_disjoint(&completed));
        let union: HashSet<i64> = active.union(&completed).copied().collect();
        prop_assert_eq!(union, all);
    }

    #[test]
    fn counts_ignore_query_and_filter(
        tasks in arb_tasks(),
        query in "[a-zA-Z ]{0,3}",
        filter in arb_filter(),
    ) {
        let view = derive_view(&tasks, &query, filter);
        prop_assert_eq!(view.counts, TaskCounts::of(&tasks));
        prop_assert_eq!(view.counts.all, tasks.len());
        prop_assert_eq!(view.counts.active + view.counts.completed, view.counts.all);
        prop_assert!(view.visible.len() <= view.counts.get(filter));
    }

    #[test]
    fn query_is_case_insensitive(tasks in arb_tasks(), query in "[a-z]{1,3}") {
        let lower = derive_view(&tasks, &query, StatusFilter::All);
        let upper = derive_view(&tasks, &query.to_uppercase(), StatusFilter::All);
        prop_assert_eq!(ids(&lower.visible), ids(&upper.visible));
    }

    #[test]
    fn derivation_is_deterministic(
        tasks in arb_tasks(),
        query in "[a-zA-Z ]{0,3}",
        filter in arb_filter(),
    ) {
        let a = derive_view(&tasks, &query, filter);
        let b = derive_view(&tasks, &query, filter);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn finds_query_present_only_in_description(
        tasks in arb_tasks(),
        digits in "[0-9]{2,8}",
        start in 0usize..2,
        padding in "[ ]{0,2}",
        completed in any::<bool>(),
    ) {
        // Generated titles and descriptions never contain digits.
        let mut tasks = tasks;
        let target = i64::try_from(tasks.len()).unwrap() + 1;
        tasks.push(make_task(target, "Errand".to_owned(), format!("call {digits}"), completed));

        let needle = &digits[start..];
        let query = format!("{padding}{needle}{padding}");
        let view = derive_view(&tasks, &query, StatusFilter::All);
        prop_assert_eq!(ids(&view.visible), vec![target]);

        let hidden = if completed { StatusFilter::Active } else { StatusFilter::Completed };
        prop_assert!(derive_view(&tasks, &query, hidden).visible.is_empty());
    }
}
