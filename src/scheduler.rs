use tokio_cron_scheduler::{Job, JobScheduler};

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::error::LadderResult;
use crate::service::{Ladder, Reply};

pub struct Scheduler {
    scheduler: JobScheduler,
    ladder: Arc<Ladder>,
}

pub enum JobProcess<'schedule> {
    WarmIdentities,
    RefreshRanking(&'schedule str),
}

impl Scheduler {
    pub async fn new(ladder: Arc<Ladder>) -> LadderResult<Self> {
        let scheduler = JobScheduler::new().await?;
        Ok(Scheduler { scheduler, ladder })
    }

    pub async fn add_job(&self, job_process: JobProcess<'_>) -> LadderResult<uuid::Uuid> {
        let job = match job_process {
            JobProcess::WarmIdentities => warm_identities_job(self.ladder.clone())?,
            JobProcess::RefreshRanking(schedule) => {
                refresh_ranking_job(schedule, self.ladder.clone())?
            }
        };
        Ok(self.scheduler.add(job).await?)
    }

    pub async fn start(&self) -> LadderResult<()> {
        Ok(self.scheduler.start().await?)
    }

    pub async fn shutdown(&mut self) -> LadderResult<()> {
        Ok(self.scheduler.shutdown().await?)
    }
}

//////////////////
// Jobs definition
//////////////////

fn warm_identities_job(ladder: Arc<Ladder>) -> LadderResult<Job> {
    let job = Job::new_one_shot_async(Duration::from_secs(0), move |_uuid, _l| {
        let ladder = ladder.clone();
        Box::pin(async move {
            ladder.warm_identities().await;
        })
    })?;
    Ok(job)
}

fn refresh_ranking_job(schedule: &str, ladder: Arc<Ladder>) -> LadderResult<Job> {
    let job = Job::new_async(schedule, move |uuid, mut l| {
        let ladder = ladder.clone();
        Box::pin(async move {
            match ladder.ranking().await {
                Reply::Data(snapshot) => info!(
                    "Ranking refreshed, {} players as of {}.",
                    snapshot.players.len(),
                    snapshot.generated_at
                ),
                Reply::Error { error } => error!("Could not refresh ranking. {error}"),
            }

            // Query the next execution time for this job
            let next_tick = l.next_tick_for_job(uuid).await;
            match next_tick {
                Ok(Some(ts)) => info!("Next ranking refresh at {:?}", ts),
                _ => error!("Could not get next tick for ranking refresh job"),
            }
        })
    })?;
    Ok(job)
}
