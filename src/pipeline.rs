use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::warn;

use crate::error::{MigrateError, SourceError};
use crate::runlog::RunLogger;
use crate::sink::{WriteOutcome, WriteSink};
use crate::source::DocumentSource;
use crate::transform::{chat, crm, options};

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct EntityCounts {
    pub inserted: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Structured result of one run: per-entity outcome counts plus any phase
/// or collection reads that could not complete. The run log stays the
/// line-by-line audit trail; this is the machine-readable view.
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub entities: BTreeMap<String, EntityCounts>,
    pub phase_errors: Vec<String>,
}

impl RunSummary {
    pub fn clean(&self) -> bool {
        self.phase_errors.is_empty() && self.entities.values().all(|c| c.failed == 0)
    }

    pub fn counts(&self, entity: &str) -> EntityCounts {
        self.entities.get(entity).copied().unwrap_or_default()
    }

    pub fn total_failed(&self) -> u64 {
        self.entities.values().map(|c| c.failed).sum()
    }

    fn tally(&mut self, entity: &str, outcome: &WriteOutcome) {
        let counts = self.entities.entry(entity.to_string()).or_default();
        match outcome {
            WriteOutcome::Inserted => counts.inserted += 1,
            WriteOutcome::Skipped => counts.skipped += 1,
            WriteOutcome::Failed(_) => counts.failed += 1,
        }
    }
}

/// Drives the fixed phase sequence. Later phases assume earlier phases'
/// rows exist for their foreign references, so execution is strictly
/// sequential; hierarchical entities recurse per parent, and a child walk
/// only starts after the parent's write outcome has been logged.
pub struct Pipeline<'a, S: DocumentSource> {
    source: &'a S,
    sink: WriteSink<'a>,
    log: &'a RunLogger,
    cancel: &'a AtomicBool,
}

impl<'a, S: DocumentSource> Pipeline<'a, S> {
    pub fn new(
        source: &'a S,
        pool: &'a SqlitePool,
        log: &'a RunLogger,
        cancel: &'a AtomicBool,
    ) -> Self {
        Self {
            source,
            sink: WriteSink::new(pool),
            log,
            cancel,
        }
    }

    pub async fn run(&self) -> Result<RunSummary, MigrateError> {
        let mut summary = RunSummary::default();

        if let Err(err) = self.migrate_users(&mut summary).await {
            self.phase_error(&mut summary, "users", err)?;
        }
        if let Err(err) = self.migrate_option_collections(&mut summary).await {
            self.phase_error(&mut summary, "option collections", err)?;
        }
        if let Err(err) = self.migrate_channels(&mut summary).await {
            self.phase_error(&mut summary, "channels", err)?;
        }
        if let Err(err) = self.migrate_students(&mut summary).await {
            self.phase_error(&mut summary, "students", err)?;
        }
        if let Err(err) = self.migrate_classes_and_courses(&mut summary).await {
            self.phase_error(&mut summary, "classes and courses", err)?;
        }
        if let Err(err) = self.migrate_enrollments(&mut summary).await {
            self.phase_error(&mut summary, "enrollments", err)?;
        }
        if let Err(err) = self.migrate_payments(&mut summary).await {
            self.phase_error(&mut summary, "payments", err)?;
        }
        if let Err(err) = self.migrate_notifications(&mut summary).await {
            self.phase_error(&mut summary, "notifications", err)?;
        }

        Ok(summary)
    }

    async fn migrate_users(&self, summary: &mut RunSummary) -> Result<(), MigrateError> {
        self.log.log("phase users: start");
        for doc in &self.source.documents(&["users"])? {
            self.check_cancel()?;
            let record = chat::profile(doc);
            let outcome = self
                .sink
                .insert_unless_exists("profiles", "id", &record.id, &record)
                .await;
            self.record(summary, "profiles", &doc.id, outcome);
        }
        Ok(())
    }

    async fn migrate_option_collections(
        &self,
        summary: &mut RunSummary,
    ) -> Result<(), MigrateError> {
        self.log.log("phase option collections: start");
        for (collection, table) in options::OPTION_COLLECTIONS {
            let docs = match self.source.documents(&[collection]) {
                Ok(docs) => docs,
                Err(err) => {
                    self.collection_error(summary, table, &err);
                    continue;
                }
            };
            for doc in &docs {
                self.check_cancel()?;
                let outcome = if *table == "cities" {
                    self.sink.upsert(table, &options::city(doc)).await
                } else {
                    self.sink.upsert(table, &options::option_value(doc)).await
                };
                self.record(summary, table, &doc.id, outcome);
            }
        }
        Ok(())
    }

    async fn migrate_channels(&self, summary: &mut RunSummary) -> Result<(), MigrateError> {
        self.log.log("phase channels: start");
        for doc in &self.source.documents(&["channels"])? {
            self.check_cancel()?;
            let record = chat::channel(doc);
            let outcome = self.sink.upsert("channels", &record).await;
            let parent_ok = !outcome.is_failed();
            self.record(summary, "channels", &doc.id, outcome);
            if !parent_ok {
                // No child writes under a parent that never landed.
                continue;
            }
            self.migrate_channel_messages(summary, &doc.id).await?;
            self.migrate_channel_reactions(summary, &doc.id).await?;
            self.migrate_channel_tasks(summary, &doc.id).await?;
        }
        Ok(())
    }

    async fn migrate_channel_messages(
        &self,
        summary: &mut RunSummary,
        channel_id: &str,
    ) -> Result<(), MigrateError> {
        let path = ["channels", channel_id, "messages"];
        let docs = match self.source.documents(&path) {
            Ok(docs) => docs,
            Err(err) => {
                self.collection_error(summary, &format!("messages of {channel_id}"), &err);
                return Ok(());
            }
        };
        for doc in &docs {
            self.check_cancel()?;
            let record = chat::message(doc, channel_id);
            let outcome = self.sink.upsert("messages", &record).await;
            let parent_ok = !outcome.is_failed();
            self.record(summary, "messages", &doc.id, outcome);
            if parent_ok {
                self.migrate_message_replies(summary, channel_id, &doc.id)
                    .await?;
            }
        }
        Ok(())
    }

    async fn migrate_message_replies(
        &self,
        summary: &mut RunSummary,
        channel_id: &str,
        message_id: &str,
    ) -> Result<(), MigrateError> {
        let path = ["channels", channel_id, "messages", message_id, "replies"];
        let docs = match self.source.documents(&path) {
            Ok(docs) => docs,
            Err(err) => {
                self.collection_error(summary, &format!("replies of {message_id}"), &err);
                return Ok(());
            }
        };
        for doc in &docs {
            self.check_cancel()?;
            let record = chat::reply(doc, message_id);
            let outcome = self.sink.upsert("replies", &record).await;
            self.record(summary, "replies", &doc.id, outcome);
        }
        Ok(())
    }

    async fn migrate_channel_reactions(
        &self,
        summary: &mut RunSummary,
        channel_id: &str,
    ) -> Result<(), MigrateError> {
        let path = ["channels", channel_id, "reactions"];
        let docs = match self.source.documents(&path) {
            Ok(docs) => docs,
            Err(err) => {
                self.collection_error(summary, &format!("reactions of {channel_id}"), &err);
                return Ok(());
            }
        };
        for doc in &docs {
            self.check_cancel()?;
            let record = chat::reaction(doc, channel_id);
            let outcome = self.sink.upsert("reactions", &record).await;
            self.record(summary, "reactions", &doc.id, outcome);
        }
        Ok(())
    }

    async fn migrate_channel_tasks(
        &self,
        summary: &mut RunSummary,
        channel_id: &str,
    ) -> Result<(), MigrateError> {
        let path = ["channels", channel_id, "tasks"];
        let docs = match self.source.documents(&path) {
            Ok(docs) => docs,
            Err(err) => {
                self.collection_error(summary, &format!("tasks of {channel_id}"), &err);
                return Ok(());
            }
        };
        for doc in &docs {
            self.check_cancel()?;
            let record = chat::task(doc, channel_id);
            let outcome = self.sink.upsert("tasks", &record).await;
            self.record(summary, "tasks", &doc.id, outcome);
        }
        Ok(())
    }

    async fn migrate_students(&self, summary: &mut RunSummary) -> Result<(), MigrateError> {
        self.log.log("phase students: start");
        for doc in &self.source.documents(&["students"])? {
            self.check_cancel()?;
            let record = crm::student(doc);
            let outcome = self.sink.upsert("students", &record).await;
            self.record(summary, "students", &doc.id, outcome);
        }
        Ok(())
    }

    async fn migrate_classes_and_courses(
        &self,
        summary: &mut RunSummary,
    ) -> Result<(), MigrateError> {
        self.log.log("phase classes and courses: start");
        // Courses first; classes may reference them.
        for doc in &self.source.documents(&["courses"])? {
            self.check_cancel()?;
            let record = crm::course(doc);
            let outcome = self.sink.upsert("courses", &record).await;
            self.record(summary, "courses", &doc.id, outcome);
        }
        for doc in &self.source.documents(&["classes"])? {
            self.check_cancel()?;
            let record = crm::class(doc);
            let outcome = self.sink.upsert("classes", &record).await;
            self.record(summary, "classes", &doc.id, outcome);
        }
        Ok(())
    }

    async fn migrate_enrollments(&self, summary: &mut RunSummary) -> Result<(), MigrateError> {
        self.log.log("phase enrollments: start");
        for doc in &self.source.documents(&["enrollments"])? {
            self.check_cancel()?;
            let record = crm::enrollment(doc);
            let outcome = self.sink.upsert("enrollments", &record).await;
            self.record(summary, "enrollments", &doc.id, outcome);
        }
        Ok(())
    }

    async fn migrate_payments(&self, summary: &mut RunSummary) -> Result<(), MigrateError> {
        self.log.log("phase payments: start");
        for doc in &self.source.documents(&["payments"])? {
            self.check_cancel()?;
            let record = crm::payment(doc);
            let outcome = self.sink.upsert("payments", &record).await;
            self.record(summary, "payments", &doc.id, outcome);
        }
        Ok(())
    }

    async fn migrate_notifications(&self, summary: &mut RunSummary) -> Result<(), MigrateError> {
        self.log.log("phase notifications: start");
        for doc in &self.source.documents(&["notifications"])? {
            self.check_cancel()?;
            let record = chat::notification(doc);
            let outcome = self.sink.upsert("notifications", &record).await;
            self.record(summary, "notifications", &doc.id, outcome);
        }
        Ok(())
    }

    fn record(&self, summary: &mut RunSummary, entity: &str, id: &str, outcome: WriteOutcome) {
        self.log.log(&format!("{entity} {id}: {}", outcome.describe()));
        if let WriteOutcome::Failed(reason) = &outcome {
            warn!(
                target: "classport",
                entity,
                id,
                reason = reason.as_str(),
                "record write failed"
            );
        }
        summary.tally(entity, &outcome);
    }

    fn collection_error(&self, summary: &mut RunSummary, scope: &str, err: &SourceError) {
        self.log.log(&format!("{scope}: collection unreadable: {err}"));
        warn!(target: "classport", scope, error = %err, "collection read failed");
        summary.phase_errors.push(format!("{scope}: {err}"));
    }

    /// Unreadable collections end the phase, not the run. Cancellation is
    /// the one error that must surface past the phase loop.
    fn phase_error(
        &self,
        summary: &mut RunSummary,
        phase: &str,
        err: MigrateError,
    ) -> Result<(), MigrateError> {
        if matches!(err, MigrateError::Cancelled) {
            return Err(err);
        }
        self.log.log(&format!("phase {phase} aborted: {err}"));
        warn!(target: "classport", phase, error = %err, "phase aborted");
        summary.phase_errors.push(format!("{phase}: {err}"));
        Ok(())
    }

    fn check_cancel(&self) -> Result<(), MigrateError> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(MigrateError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_tally_and_clean() {
        let mut summary = RunSummary::default();
        summary.tally("channels", &WriteOutcome::Inserted);
        summary.tally("channels", &WriteOutcome::Failed("boom".into()));
        summary.tally("profiles", &WriteOutcome::Skipped);

        assert_eq!(summary.counts("channels").inserted, 1);
        assert_eq!(summary.counts("channels").failed, 1);
        assert_eq!(summary.counts("profiles").skipped, 1);
        assert_eq!(summary.total_failed(), 1);
        assert!(!summary.clean());
    }

    #[test]
    fn empty_summary_is_clean() {
        assert!(RunSummary::default().clean());
    }
}
