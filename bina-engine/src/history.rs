use serde::{Deserialize, Serialize};

use crate::mastery::Tier;
use crate::mock_exam::MockExamResult;
use crate::session::SessionResult;

/// One archived exam or session, in the shape the history screen and cloud storage expect.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: String,
    /// Milliseconds since the epoch.
    pub date: i64,
    pub score: u32,
    pub total: u32,
    /// Label shown next to the score, e.g. the session topic.
    pub details: String,
}

impl From<&SessionResult> for HistoryRecord {
    fn from(result: &SessionResult) -> Self {
        let date = result.timestamp.timestamp_millis();
        Self {
            id: format!("session-{date}"),
            date,
            score: result.correct_count as u32,
            total: result.total as u32,
            details: result.category.clone(),
        }
    }
}

impl From<&MockExamResult> for HistoryRecord {
    fn from(result: &MockExamResult) -> Self {
        let date = result.timestamp.timestamp_millis();
        Self {
            id: format!("simulation-{date}"),
            date,
            score: result.scaled_score,
            total: result.total as u32,
            details: result.details.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub record: HistoryRecord,
    /// Shown blurred, behind the upgrade prompt.
    pub locked: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct History {
    records: Vec<HistoryRecord>,
}

impl History {
    pub fn push(&mut self, record: HistoryRecord) {
        log::debug!("Archiving {} ({}/{})", record.details, record.score, record.total);
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn newest_first(&self) -> Vec<&HistoryRecord> {
        let mut records: Vec<&HistoryRecord> = self.records.iter().collect();
        // the sort is stable: among equal dates, the latest pushed comes first
        records.reverse();
        records.sort_by_key(|record| std::cmp::Reverse(record.date));
        records
    }

    /// Newest first. On the free tier only the newest record is readable.
    pub fn entries(&self, tier: Tier) -> Vec<HistoryEntry> {
        self.newest_first()
            .into_iter()
            .enumerate()
            .map(|(index, record)| HistoryEntry {
                record: record.clone(),
                locked: tier == Tier::Free && index > 0,
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(date: i64, score: u32) -> HistoryRecord {
        HistoryRecord {
            id: format!("session-{date}"),
            date,
            score,
            total: 20,
            details: "מרתון".to_string(),
        }
    }

    #[test]
    fn test_newest_first() {
        let mut history = History::default();
        history.push(record(100, 1));
        history.push(record(300, 3));
        history.push(record(200, 2));
        let scores: Vec<u32> = history.newest_first().iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![3, 2, 1]);
    }

    #[test]
    fn test_free_tier_sees_only_the_newest() {
        let mut history = History::default();
        history.push(record(100, 1));
        history.push(record(200, 2));

        let free = history.entries(Tier::Free);
        assert!(!free[0].locked);
        assert_eq!(free[0].record.score, 2);
        assert!(free[1].locked);

        assert!(history.entries(Tier::Plus).iter().all(|entry| !entry.locked));
    }

    #[test]
    fn test_json_is_a_plain_array() {
        let mut history = History::default();
        history.push(record(100, 1));
        let json: serde_json::Value = serde_json::from_str(&history.to_json().unwrap()).unwrap();
        assert_eq!(json[0]["date"], 100);
        assert_eq!(History::from_json(&history.to_json().unwrap()).unwrap(), history);
    }
}
