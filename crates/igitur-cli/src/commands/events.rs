//! Event media download commands

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tracing::info;

use igitur_core::domain::newtypes::EventId;
use igitur_core::domain::report::SyncReport;
use igitur_gaudeam::GaudeamEventSource;
use igitur_sync::{EventMediaGrouper, EventSyncReport};

use super::{local_path, Context};
use crate::output::{print_report, report_json};

async fn grouper(ctx: &Context) -> Result<EventMediaGrouper> {
    let (_, client) = ctx.connect().await?;
    let events = Arc::new(GaudeamEventSource::new(client.clone()));
    Ok(EventMediaGrouper::new(events, ctx.engine(client)))
}

#[derive(Debug, Args)]
pub struct DownloadEventMediaCommand {
    /// Id of the event
    pub event_id: EventId,

    /// Existing local directory; one subfolder per uploader is created
    pub dest: PathBuf,
}

impl DownloadEventMediaCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let dest = local_path(&self.dest)?;
        let grouper = grouper(ctx).await?;

        info!(event = %self.event_id, dest = %dest, "Starting event media download");
        let report = grouper.download_event(&self.event_id, &dest).await?;

        let fmt = ctx.formatter();
        if ctx.is_json() {
            fmt.print_json(&report_json(&report));
        } else {
            print_report(&*fmt, &format!("Event {}", self.event_id), &report);
        }
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct DownloadEventMediaLastDaysCommand {
    /// Size of the window in days, counted back from now
    /// [default: `events.default_days` of the config]
    pub days: Option<u32>,

    /// Existing local directory; one subfolder per event is created
    pub dest: PathBuf,
}

fn event_json(result: &EventSyncReport) -> serde_json::Value {
    serde_json::json!({
        "event_id": result.event.id.as_str(),
        "title": result.event.title,
        "start": result.event.start,
        "folder": result.folder,
        "error": result.error,
        "report": report_json(&result.report),
    })
}

impl DownloadEventMediaLastDaysCommand {
    pub fn window_days(&self, ctx: &Context) -> u32 {
        self.days.unwrap_or(ctx.config.events.default_days)
    }

    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let dest = local_path(&self.dest)?;
        let days = self.window_days(ctx);
        let grouper = grouper(ctx).await?;

        info!(days, dest = %dest, "Starting event window download");
        let results = grouper.download_events_in_window(days, &dest).await?;

        let mut total = SyncReport::new();
        for result in &results {
            total.merge(result.report.clone());
        }

        let fmt = ctx.formatter();
        if ctx.is_json() {
            fmt.print_json(&serde_json::json!({
                "days": days,
                "events": results.iter().map(event_json).collect::<Vec<_>>(),
                "total": report_json(&total),
            }));
            return Ok(());
        }

        if results.is_empty() {
            fmt.success(&format!("No events in the last {days} days"));
            return Ok(());
        }
        for result in &results {
            let label = result
                .folder
                .clone()
                .unwrap_or_else(|| format!("{} (event {})", result.event.title, result.event.id));
            match &result.error {
                Some(error) => fmt.warn(&format!("{label}: {error}")),
                None => print_report(&*fmt, &label, &result.report),
            }
        }
        fmt.info(&format!("Total: {}", total.summary()));
        Ok(())
    }
}
