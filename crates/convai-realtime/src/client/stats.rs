/// Traffic counters for one connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Stats {
    events_received: u64,
    events_sent: u64,
    audio_chunks_received: u64,
    pings_answered: u64,
}

impl Stats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_received(&mut self, event: &crate::types::ServerEvent) {
        self.events_received += 1;
        match event {
            crate::types::ServerEvent::Audio { .. } => self.audio_chunks_received += 1,
            _ => {}
        }
    }

    /// A pong was queued for a ping.
    pub(crate) fn record_pong(&mut self) {
        self.pings_answered += 1;
    }

    pub(crate) fn record_sent(&mut self) {
        self.events_sent += 1;
    }

    pub fn events_received(&self) -> u64 {
        self.events_received
    }

    pub fn events_sent(&self) -> u64 {
        self.events_sent
    }

    pub fn audio_chunks_received(&self) -> u64 {
        self.audio_chunks_received
    }

    pub fn pings_answered(&self) -> u64 {
        self.pings_answered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ServerEvent;

    #[test]
    fn pings_count_once_a_pong_is_queued() {
        let ping: ServerEvent =
            serde_json::from_str(r#"{"type":"ping","ping_event":{"event_id":1}}"#).unwrap();
        let mut stats = Stats::new();
        stats.record_received(&ping);
        assert_eq!(stats.events_received(), 1);
        assert_eq!(stats.pings_answered(), 0);

        stats.record_pong();
        assert_eq!(stats.pings_answered(), 1);
    }
}
