#![forbid(unsafe_code)]

pub mod http;

use std::future::Future;

use crate::error::TodoError;
use crate::task::model::{NewTask, Task, TaskUpdate};

/// Request/response access to a user's tasks on the remote service.
///
/// Every call either returns the server's representation or fails with a
/// human-readable message. Nothing is retried.
pub trait TaskApi {
    fn get_tasks(&self, user_id: &str) -> impl Future<Output = Result<Vec<Task>, TodoError>> + Send;

    fn create_task(
        &self,
        user_id: &str,
        new: &NewTask,
    ) -> impl Future<Output = Result<Task, TodoError>> + Send;

    fn update_task(
        &self,
        user_id: &str,
        task_id: i64,
        fields: &TaskUpdate,
    ) -> impl Future<Output = Result<Task, TodoError>> + Send;

    fn toggle_complete(
        &self,
        user_id: &str,
        task_id: i64,
    ) -> impl Future<Output = Result<Task, TodoError>> + Send;

    fn delete_task(
        &self,
        user_id: &str,
        task_id: i64,
    ) -> impl Future<Output = Result<(), TodoError>> + Send;
}
