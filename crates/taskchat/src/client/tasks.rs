//! Task endpoints.

use super::{ApiCall, ApiClient, Result};
use crate::api::{Ack, CreateTaskRequest, SingleTask, TaskPage, TaskPatch, TaskQuery, TaskReply};

impl ApiClient {
    pub async fn list_tasks(&self, query: &TaskQuery) -> Result<TaskPage> {
        self.authed(ApiCall::get("/tasks").query_pairs(query.to_pairs()))
            .await
    }

    pub async fn get_task(&self, task_id: &str) -> Result<SingleTask> {
        self.authed(ApiCall::get("/task").query("id", task_id)).await
    }

    pub async fn create_task(&self, request: &CreateTaskRequest) -> Result<TaskReply> {
        self.authed(ApiCall::post("/tasks/create").json(request)?)
            .await
    }

    /// Apply a sparse update; unset patch fields are left untouched server-side.
    pub async fn update_task(&self, task_id: &str, patch: &TaskPatch) -> Result<TaskReply> {
        let call = ApiCall::patch("/tasks/update")
            .query("id", task_id)
            .json(patch)?;
        self.authed(call).await
    }

    pub async fn delete_task(&self, task_id: &str) -> Result<Ack> {
        self.authed(ApiCall::delete("/tasks/delete").query("id", task_id))
            .await
    }
}
