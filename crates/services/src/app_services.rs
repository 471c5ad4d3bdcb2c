use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::error::AppServicesError;
use crate::sessions::{ExamClockSource, ExamRules, SessionEngine, TimerConfig};

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    engine: Arc<SessionEngine>,
    timer_config: TimerConfig,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        rules: ExamRules,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(storage, clock, rules))
    }

    #[must_use]
    pub fn in_memory(clock: Clock, rules: ExamRules) -> Self {
        Self::from_storage(Storage::in_memory(), clock, rules)
    }

    #[must_use]
    pub fn from_storage(storage: Storage, clock: Clock, rules: ExamRules) -> Self {
        let engine = Arc::new(SessionEngine::from_storage(clock, &storage).with_rules(rules));
        Self {
            storage,
            engine,
            timer_config: TimerConfig::default(),
        }
    }

    #[must_use]
    pub fn with_timer_config(mut self, timer_config: TimerConfig) -> Self {
        self.timer_config = timer_config;
        self
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn engine(&self) -> Arc<SessionEngine> {
        Arc::clone(&self.engine)
    }

    /// The engine as the timer's time source.
    #[must_use]
    pub fn clock_source(&self) -> Arc<dyn ExamClockSource> {
        self.engine()
    }

    #[must_use]
    pub fn timer_config(&self) -> TimerConfig {
        self.timer_config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::TopicName;
    use exam_core::time::fixed_clock;
    use storage::repository::TopicRepository;

    #[tokio::test]
    async fn engine_and_storage_share_one_backend() {
        let services = AppServices::in_memory(fixed_clock(), ExamRules::default());
        let name = TopicName::new("Road signs").unwrap();
        services.storage().topics.upsert_topic(&name).await.unwrap();

        let topics = services.engine().list_topics().await.unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].topic.name(), &name);
        assert_eq!(topics[0].question_count, 0);
    }
}
