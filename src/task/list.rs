#![forbid(unsafe_code)]

use crate::api::TaskApi;
use crate::error::TodoError;
use crate::task::model::{NewTask, Task, TaskUpdate};
use crate::task::view::{self, StatusFilter, TaskView};

/// Local cache of the server's task list, newest first.
///
/// Only server responses change it. `revision` increases on every change so
/// views can tell when they are stale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskList {
    tasks: Vec<Task>,
    revision: u64,
}

impl TaskList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: i64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    #[must_use]
    pub fn view(&self, query: &str, filter: StatusFilter) -> TaskView<'_> {
        view::derive_view(&self.tasks, query, filter)
    }

    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
        self.revision += 1;
    }

    pub fn insert_created(&mut self, task: Task) {
        self.tasks.insert(0, task);
        self.revision += 1;
    }

    /// Replaces the task with the same id. Returns false if none matched.
    pub fn apply_updated(&mut self, task: Task) -> bool {
        let Some(slot) = self.tasks.iter_mut().find(|t| t.id == task.id) else {
            return false;
        };
        *slot = task;
        self.revision += 1;
        true
    }

    pub fn remove(&mut self, id: i64) -> Option<Task> {
        let idx = self.tasks.iter().position(|t| t.id == id)?;
        self.revision += 1;
        Some(self.tasks.remove(idx))
    }
}

/// Proof that the user confirmed deleting a specific task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmedDelete(i64);

impl ConfirmedDelete {
    #[must_use]
    pub fn new(task_id: i64) -> Self {
        Self(task_id)
    }

    #[must_use]
    pub fn task_id(self) -> i64 {
        self.0
    }
}

/// Owns the task list for one user and routes every mutation through the API.
/// A failed call leaves the list exactly as it was.
#[derive(Debug)]
pub struct TaskController<A> {
    api: A,
    user_id: String,
    list: TaskList,
}

impl<A: TaskApi> TaskController<A> {
    pub fn new(api: A, user_id: impl Into<String>) -> Self {
        Self {
            api,
            user_id: user_id.into(),
            list: TaskList::new(),
        }
    }

    #[must_use]
    pub fn list(&self) -> &TaskList {
        &self.list
    }

    #[must_use]
    pub fn api(&self) -> &A {
        &self.api
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub async fn load(&mut self) -> Result<(), TodoError> {
        let tasks = self.api.get_tasks(&self.user_id).await?;
        tracing::debug!(count = tasks.len(), "loaded tasks");
        self.list.replace_all(tasks);
        Ok(())
    }

    pub async fn create(&mut self, new: NewTask) -> Result<&Task, TodoError> {
        let new = new.validate()?;
        let task = self.api.create_task(&self.user_id, &new).await?;
        tracing::info!(task_id = task.id, "task created");
        self.list.insert_created(task);
        Ok(&self.list.tasks()[0])
    }

    pub async fn update(&mut self, id: i64, fields: TaskUpdate) -> Result<&Task, TodoError> {
        self.ensure_known(id)?;
        let fields = fields.validate()?;
        let task = self.api.update_task(&self.user_id, id, &fields).await?;
        tracing::info!(task_id = id, "task updated");
        self.apply(task)
    }

    pub async fn toggle(&mut self, id: i64) -> Result<&Task, TodoError> {
        self.ensure_known(id)?;
        let task = self.api.toggle_complete(&self.user_id, id).await?;
        tracing::info!(task_id = id, completed = task.completed, "task toggled");
        self.apply(task)
    }

    pub async fn delete(&mut self, confirmed: ConfirmedDelete) -> Result<Task, TodoError> {
        let id = confirmed.task_id();
        self.ensure_known(id)?;
        self.api.delete_task(&self.user_id, id).await?;
        tracing::info!(task_id = id, "task deleted");
        self.list.remove(id).ok_or(TodoError::TaskNotFound(id))
    }

    fn ensure_known(&self, id: i64) -> Result<(), TodoError> {
        if self.list.get(id).is_none() {
            return Err(TodoError::TaskNotFound(id));
        }
        Ok(())
    }

    fn apply(&mut self, task: Task) -> Result<&Task, TodoError> {
        let id = task.id;
        if !self.list.apply_updated(task) {
            return Err(TodoError::TaskNotFound(id));
        }
        self.list.get(id).ok_or(TodoError::TaskNotFound(id))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::task::model::Priority;

    /// In-memory stand-in for the task service.
    #[derive(Debug, Default)]
    pub(crate) struct FakeApi {
        pub(crate) tasks: Mutex<Vec<Task>>,
        pub(crate) fail_with: Mutex<Option<String>>,
        next_id: Mutex<i64>,
    }

    impl FakeApi {
        pub(crate) fn with_tasks(tasks: Vec<Task>) -> Self {
            let next = tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1;
            Self {
                tasks: Mutex::new(tasks),
                fail_with: Mutex::new(None),
                next_id: Mutex::new(next),
            }
        }

        pub(crate) fn fail(&self, msg: &str) {
            *self.fail_with.lock().unwrap() = Some(msg.to_owned());
        }

        fn check(&self) -> Result<(), TodoError> {
            match self.fail_with.lock().unwrap().clone() {
                Some(message) => Err(TodoError::Api {
                    status: 500,
                    message,
                }),
                None => Ok(()),
            }
        }
    }

    pub(crate) fn task(id: i64, title: &str, completed: bool) -> Task {
        Task {
            id,
            user_id: Some("usr_1".to_owned()),
            title: title.to_owned(),
            description: String::new(),
            completed,
            priority: Priority::Medium,
            due_date: None,
            category: None,
            created_at: "2025-01-01T00:00:00Z".to_owned(),
            updated_at: "2025-01-01T00:00:00Z".to_owned(),
        }
    }

    impl TaskApi for FakeApi {
        async fn get_tasks(&self, _user_id: &str) -> Result<Vec<Task>, TodoError> {
            self.check()?;
            Ok(self.tasks.lock().unwrap().clone())
        }

        async fn create_task(&self, _user_id: &str, new: &NewTask) -> Result<Task, TodoError> {
            self.check()?;
            let mut next = self.next_id.lock().unwrap();
            let mut t = task(*next, &new.title, false);
            *next += 1;
            t.description.clone_from(&new.description);
            t.priority = new.priority.unwrap_or_default();
            t.due_date.clone_from(&new.due_date);
            t.category.clone_from(&new.category);
            self.tasks.lock().unwrap().insert(0, t.clone());
            Ok(t)
        }

        async fn update_task(
            &self,
            _user_id: &str,
            task_id: i64,
            fields: &TaskUpdate,
        ) -> Result<Task, TodoError> {
            self.check()?;
            let mut tasks = self.tasks.lock().unwrap();
            let t = tasks
                .iter_mut()
                .find(|t| t.id == task_id)
                .ok_or(TodoError::TaskNotFound(task_id))?;
            if let Some(title) = &fields.title {
                t.title.clone_from(title);
            }
            if let Some(desc) = &fields.description {
                t.description.clone_from(desc);
            }
            if let Some(p) = fields.priority {
                t.priority = p;
            }
            if let Some(due) = &fields.due_date {
                t.due_date.clone_from(due);
            }
            if let Some(cat) = &fields.category {
                t.category.clone_from(cat);
            }
            t.updated_at = "2025-01-02T00:00:00Z".to_owned();
            Ok(t.clone())
        }

        async fn toggle_complete(&self, _user_id: &str, task_id: i64) -> Result<Task, TodoError> {
            self.check()?;
            let mut tasks = self.tasks.lock().unwrap();
            let t = tasks
                .iter_mut()
                .find(|t| t.id == task_id)
                .ok_or(TodoError::TaskNotFound(task_id))?;
            t.completed = !t.completed;
            Ok(t.clone())
        }

        async fn delete_task(&self, _user_id: &str, task_id: i64) -> Result<(), TodoError> {
            self.check()?;
            self.tasks.lock().unwrap().retain(|t| t.id != task_id);
            Ok(())
        }
    }

    async fn loaded(tasks: Vec<Task>) -> TaskController<FakeApi> {
        let mut c = TaskController::new(FakeApi::with_tasks(tasks), "usr_1");
        c.load().await.unwrap();
        c
    }

    #[tokio::test]
    async fn create_prepends_server_representation() {
        let mut c = loaded(vec![task(1, "Walk dog", true)]).await;
        let rev = c.list().revision();

        let created = c.create(NewTask::new("  Buy milk ")).await.unwrap();
        assert_eq!(created.id, 2);
        assert_eq!(created.title, "Buy milk");

        let titles: Vec<_> = c.list().tasks().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Buy milk", "Walk dog"]);
        assert!(c.list().revision() > rev);
    }

    #[tokio::test]
    async fn invalid_create_never_reaches_the_api() {
        let mut c = loaded(vec![]).await;
        let err = c.create(NewTask::new("   ")).await.unwrap_err();
        assert!(matches!(err, TodoError::Validation(_)));
        assert!(c.api.tasks.lock().unwrap().is_empty());
        assert!(c.list().is_empty());
    }

    #[tokio::test]
    async fn toggle_replaces_in_place() {
        let mut c = loaded(vec![task(2, "b", false), task(1, "a", false)]).await;
        let t = c.toggle(1).await.unwrap();
        assert!(t.completed);
        assert_eq!(c.list().tasks()[1].id, 1);
        assert!(c.list().tasks()[1].completed);
    }

    #[tokio::test]
    async fn failed_calls_leave_list_unchanged() {
        let mut c = loaded(vec![task(1, "a", false)]).await;
        let before = c.list().clone();
        c.api.fail("Failed to update task");

        let err = c.toggle(1).await.unwrap_err();
        assert_eq!(err.user_message(), "Failed to update task");
        assert!(c.create(NewTask::new("x")).await.is_err());
        assert!(c.delete(ConfirmedDelete::new(1)).await.is_err());
        assert!(c.load().await.is_err());

        assert_eq!(c.list(), &before);
    }

    #[tokio::test]
    async fn delete_removes_after_ack() {
        let mut c = loaded(vec![task(2, "b", false), task(1, "a", true)]).await;
        let removed = c.delete(ConfirmedDelete::new(2)).await.unwrap();
        assert_eq!(removed.title, "b");
        assert_eq!(c.list().len(), 1);
        assert!(c.list().get(2).is_none());
    }

    #[tokio::test]
    async fn unknown_ids_are_rejected_locally() {
        let mut c = loaded(vec![task(1, "a", false)]).await;
        assert!(matches!(c.toggle(42).await, Err(TodoError::TaskNotFound(42))));
        let upd = TaskUpdate {
            title: Some("x".to_owned()),
            ..TaskUpdate::default()
        };
        assert!(matches!(
            c.update(42, upd).await,
            Err(TodoError::TaskNotFound(42))
        ));
    }

    #[tokio::test]
    async fn update_applies_returned_fields() {
        let mut c = loaded(vec![task(1, "a", false)]).await;
        let upd = TaskUpdate {
            title: Some("renamed".to_owned()),
            priority: Some(Priority::High),
            ..TaskUpdate::default()
        };
        let t = c.update(1, upd).await.unwrap();
        assert_eq!(t.title, "renamed");
        assert_eq!(t.priority, Priority::High);
        assert_eq!(t.updated_at, "2025-01-02T00:00:00Z");
    }

    #[test]
    fn view_counts_ignore_query() {
        let mut list = TaskList::new();
        list.replace_all(vec![task(2, "Buy milk", false), task(1, "Walk dog", true)]);
        let v = list.view("milk", StatusFilter::All);
        assert_eq!(v.visible.len(), 1);
        assert_eq!(v.counts.all, 2);
    }
}
