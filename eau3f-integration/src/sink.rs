//! Logging sensor sink.

use async_trait::async_trait;
use eau3f_core::{CoreError, SensorSink, SensorState, StatisticMetadata, StatisticPoint};
use tracing::info;

/// Sink that only logs what it would publish.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl SensorSink for LogSink {
    async fn publish_state(&self, state: &SensorState) -> Result<(), CoreError> {
        info!(
            entity_id = %state.entity_id,
            state = %state.state,
            attributes = %serde_json::Value::Object(state.attributes.clone()),
            "State"
        );
        Ok(())
    }

    async fn import_statistics(
        &self,
        metadata: &StatisticMetadata,
        points: &[StatisticPoint],
    ) -> Result<(), CoreError> {
        let first = points.first().map(|p| p.start.to_rfc3339()).unwrap_or_default();
        let last = points.last().map(|p| p.start.to_rfc3339()).unwrap_or_default();
        info!(
            statistic_id = %metadata.statistic_id,
            count = points.len(),
            first = %first,
            last = %last,
            "Statistics"
        );
        Ok(())
    }
}
