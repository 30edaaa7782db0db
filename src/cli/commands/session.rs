//! Session snapshot CLI commands.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::cli::output::{output, table, truncate, CommandOutput};
use crate::domain::models::{Config, JudgmentSource, Session, TurnJudgment};
use crate::domain::ports::{Snapshot, SnapshotStore};
use crate::infrastructure::database::{DatabaseConnection, SqliteSnapshotStore};
use crate::services::SnapshotService;

#[derive(Args, Debug)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionCommands,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// Show the stored snapshot of a session, fresh or not
    Show {
        /// Session ID
        id: Uuid,
    },
    /// Delete every snapshot past the staleness horizon
    Purge,
    /// Delete the snapshot of one session
    Discard {
        /// Session ID
        id: Uuid,
    },
}

#[derive(Debug, Serialize)]
pub struct SessionDetail {
    pub session: Session,
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    /// Within the horizon and readable by `resume`
    pub resumable: bool,
}

impl SessionDetail {
    fn new(snapshot: Snapshot, resumable: bool) -> Self {
        Self {
            version: snapshot.version,
            saved_at: snapshot.saved_at,
            session: snapshot.session,
            resumable,
        }
    }
}

fn judgment_cell(judgment: Option<&TurnJudgment>) -> String {
    let Some(judgment) = judgment else {
        return "-".to_string();
    };
    let value = match judgment {
        TurnJudgment::Intent { label, .. } => label.to_string(),
        TurnJudgment::Trait { name, score, .. } => format!("{name}={score}"),
    };
    match judgment.source() {
        JudgmentSource::Capability => value,
        JudgmentSource::Fallback => format!("{value} (fallback)"),
    }
}

impl CommandOutput for SessionDetail {
    fn to_human(&self) -> String {
        let s = &self.session;
        let mut lines = vec![
            format!("Session:   {}", s.id),
            format!("Game:      {}", s.game_id),
            format!(
                "Progress:  {}/{} turn(s){}",
                s.steps.len(),
                s.total_turns,
                if s.completed { ", completed" } else { "" }
            ),
            format!(
                "Saved at:  {} (v{}{})",
                self.saved_at.format("%Y-%m-%d %H:%M:%S UTC"),
                self.version,
                if self.resumable { "" } else { ", not resumable" }
            ),
        ];
        if let Some(participant) = &s.participant_id {
            lines.push(format!("Participant: {participant}"));
        }
        if let Some(result) = &s.result {
            lines.push(format!("Result:    {} - {}", result.name, result.description));
        }

        if !s.steps.is_empty() {
            let mut t = table(["Step", "Question", "Response", "Judgment", "Time (ms)"]);
            for step in &s.steps {
                t.add_row(vec![
                    step.step_number.to_string(),
                    truncate(&step.question, 36),
                    truncate(&step.user_response, 36),
                    judgment_cell(step.judgment.as_ref()),
                    step.response_time_ms.to_string(),
                ]);
            }
            lines.push(t.to_string());
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct ActionOutput {
    pub success: bool,
    pub message: String,
}

impl CommandOutput for ActionOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }
}

pub async fn execute(args: SessionArgs, config: &Config, json_mode: bool) -> Result<()> {
    let db = DatabaseConnection::from_config(&config.database)
        .await
        .context("Failed to open snapshot database")?;
    db.migrate().await?;

    let store = Arc::new(SqliteSnapshotStore::new(db.pool().clone()));
    let service = SnapshotService::new(store.clone(), config.snapshot.horizon_hours)?;

    let result = run(args, &*store, &service, json_mode).await;
    db.close().await;
    result
}

async fn run(
    args: SessionArgs,
    store: &dyn SnapshotStore,
    service: &SnapshotService,
    json_mode: bool,
) -> Result<()> {
    match args.command {
        SessionCommands::Show { id } => {
            let snapshot = store
                .get(id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("No snapshot for session {id}"))?;
            let resumable = service.load(id).await?.is_some();
            output(&SessionDetail::new(snapshot, resumable), json_mode);
        }
        SessionCommands::Purge => {
            let removed = service.purge_stale().await?;
            output(
                &ActionOutput {
                    success: true,
                    message: format!("Purged {removed} stale snapshot(s)"),
                },
                json_mode,
            );
        }
        SessionCommands::Discard { id } => {
            let existed = service.discard(id).await?;
            output(
                &ActionOutput {
                    success: existed,
                    message: if existed {
                        format!("Discarded snapshot for session {id}")
                    } else {
                        format!("No snapshot for session {id}")
                    },
                },
                json_mode,
            );
        }
    }
    Ok(())
}
