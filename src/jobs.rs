// This file is part of the terraform-provider-citrix project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Polling of asynchronous orchestration jobs

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::client::{ApiError, ApiPath, CitrixClient, JobHandle, Method};

const MINUTE: Duration = Duration::from_secs(60);

/// Status reported by `GET /Jobs/{id}`
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum JobStatus {
    #[default]
    NotStarted,
    InProgress,
    Complete,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Complete | JobStatus::Failed | JobStatus::Canceled
        )
    }
}

/// Job as returned by the orchestration API
#[derive(Clone, PartialEq, Eq, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub error_string: String,
    pub overall_progress_percent: i64,
}

/// How often and for how long a job is polled
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct JobBudget {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl JobBudget {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

    pub const fn minutes(minutes: u64) -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            max_wait: Duration::from_secs(minutes * MINUTE.as_secs()),
        }
    }

    pub const HYPERVISOR: JobBudget = JobBudget::minutes(10);
    pub const RESOURCE_POOL: JobBudget = JobBudget::minutes(10);
    pub const CATALOG_CREATE: JobBudget = JobBudget::minutes(120);
    pub const CATALOG_DELETE: JobBudget = JobBudget::minutes(60);
    pub const MACHINE_ADD: JobBudget = JobBudget::minutes(60);
    pub const MACHINE_REMOVE: JobBudget = JobBudget::minutes(60);
}

#[derive(Error, Clone, PartialEq, Eq, Debug)]
pub enum JobError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("job {job_id} failed: {message}")]
    Failed { job_id: String, message: String },

    #[error("job {job_id} did not complete within {waited:?}")]
    TimedOut { job_id: String, waited: Duration },

    #[error("waiting for job {job_id} was cancelled")]
    Cancelled { job_id: String },
}

impl JobError {
    /// Transaction id of the request that failed, if any
    pub fn transaction_id(&self) -> &str {
        match self {
            JobError::Api(err) => err.transaction_id(),
            _ => "",
        }
    }
}

/// Poll `job` until it reaches a terminal state
///
/// Returns [`JobError::TimedOut`] once `budget.max_wait` is exhausted and
/// [`JobError::Cancelled`] as soon as the client is cancelled, without any
/// further request.
pub async fn wait_for_job(
    client: &CitrixClient,
    job: &JobHandle,
    budget: JobBudget,
) -> Result<Job, JobError> {
    let cancel = client.cancellation();
    let started = Instant::now();
    let deadline = started + budget.max_wait;
    let path = ApiPath::orchestration().segment("Jobs").segment(&job.id);

    loop {
        if cancel.is_cancelled() {
            warn!(job_id = job.id.as_str(), "job polling cancelled");
            return Err(JobError::Cancelled {
                job_id: job.id.clone(),
            });
        }

        let status: Job = client.get(&path).await?;
        debug!(
            job_id = job.id.as_str(),
            status = ?status.status,
            progress = status.overall_progress_percent,
            "polled job"
        );
        match status.status {
            JobStatus::Complete => {
                info!(job_id = job.id.as_str(), "job complete");
                return Ok(status);
            }
            JobStatus::Failed | JobStatus::Canceled => {
                let message = if status.error_string.is_empty() {
                    format!("job ended with status {:?}", status.status)
                } else {
                    status.error_string
                };
                return Err(JobError::Failed {
                    job_id: job.id.clone(),
                    message,
                });
            }
            _ => (),
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(JobError::TimedOut {
                job_id: job.id.clone(),
                waited: now - started,
            });
        }
        let wake_up = (now + budget.interval).min(deadline);
        tokio::select! {
            _ = cancel.cancelled() => (),
            _ = tokio::time::sleep_until(wake_up) => (),
        }
    }
}

/// Submit an asynchronous request and wait for its job, if any
pub async fn submit_and_wait<B: Serialize + Sync>(
    client: &CitrixClient,
    method: Method,
    path: &ApiPath,
    body: Option<&B>,
    budget: JobBudget,
) -> Result<Option<Job>, JobError> {
    match client.submit_async(method, path, body).await? {
        Some(job) => wait_for_job(client, &job, budget).await.map(Some),
        None => Ok(None),
    }
}
