//! Tasks overview bundle — counts of overdue/due-today/open tasks plus the
//! most pressing items.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use steward_cache::{CacheOptions, DomainCache};
use steward_core::{
    AppContext, BundleBuilder, BundleError, ContextBundle, Domain, Task, TaskSource, bundle_names,
};

use crate::bundles::finish;
use crate::clock;

pub(crate) const CACHE_KEY: &str = "tasks:open";

pub struct TasksBundle {
    source: Arc<dyn TaskSource>,
    cache: Arc<DomainCache>,
    ttl: Duration,
    max_items: usize,
}

impl TasksBundle {
    pub fn new(
        source: Arc<dyn TaskSource>,
        cache: Arc<DomainCache>,
        ttl: Duration,
        max_items: usize,
    ) -> Self {
        Self {
            source,
            cache,
            ttl,
            max_items,
        }
    }

    fn render(&self, ctx: &AppContext, tasks: &[Task]) -> String {
        let tz = clock::user_timezone(ctx);
        let today = clock::local_today(ctx);
        let is_overdue = |due: &DateTime<Utc>| *due < ctx.now;

        let open: Vec<&Task> = tasks.iter().filter(|t| !t.completed).collect();
        let overdue = open
            .iter()
            .filter(|t| t.due_at.as_ref().is_some_and(is_overdue))
            .count();
        let due_today = open
            .iter()
            .filter(|t| {
                t.due_at.as_ref().is_some_and(|due| {
                    !is_overdue(due) && due.with_timezone(&tz).date_naive() == today
                })
            })
            .count();

        let mut out = String::from("## Tasks Overview\n");
        if open.is_empty() {
            out.push_str("No open tasks.");
            return out;
        }
        out.push_str(&format!("Overdue: {overdue}\n"));
        out.push_str(&format!("Due today: {due_today}\n"));
        out.push_str(&format!("Open: {}\n", open.len()));

        // Dated tasks first (earliest due first), undated after, stable by title.
        let mut ranked = open;
        ranked.sort_by(|a, b| match (&a.due_at, &b.due_at) {
            (Some(x), Some(y)) => x.cmp(y).then_with(|| a.title.cmp(&b.title)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.title.cmp(&b.title),
        });

        out.push_str("Top tasks:");
        for task in ranked.iter().take(self.max_items) {
            let line = match &task.due_at {
                Some(due) if is_overdue(due) => format!(
                    "\n- {} (overdue, was due {})",
                    task.title,
                    due.with_timezone(&tz).format("%b %-d")
                ),
                Some(due) => format!(
                    "\n- {} (due {})",
                    task.title,
                    due.with_timezone(&tz).format("%b %-d %-I:%M %p")
                ),
                None => format!("\n- {}", task.title),
            };
            out.push_str(&line);
        }
        out
    }
}

#[async_trait]
impl BundleBuilder for TasksBundle {
    fn name(&self) -> &str {
        bundle_names::TASKS
    }
    async fn build(
        &self,
        ctx: &AppContext,
        max_tokens: usize,
    ) -> Result<ContextBundle, BundleError> {
        let tasks = self
            .cache
            .get_or_compute(CACHE_KEY, CacheOptions::tagged(self.ttl, Domain::Tasks), || {
                self.source.open_tasks()
            })
            .await?;
        Ok(finish(self.name(), self.render(ctx, &tasks), max_tokens))
    }
}
