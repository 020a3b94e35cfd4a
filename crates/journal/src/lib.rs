use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use common::{Error, Result, SettledTrade, TradeSink};

pub const HEADER: [&str; 7] = [
    "entry_time",
    "direction",
    "entry_price",
    "exit_price",
    "result",
    "pnl",
    "diagnostic",
];

/// Append-only CSV log with one row per settled trade. The header is written
/// only when the file is new or empty.
pub struct TradeJournal {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl TradeJournal {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let is_new = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_new {
            writer.write_record(HEADER).map_err(journal_error)?;
            writer.flush()?;
            info!(path = %path.display(), "Created trade journal");
        }
        Ok(Self { path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TradeSink for TradeJournal {
    fn record(&mut self, trade: &SettledTrade) -> Result<()> {
        self.writer
            .write_record([
                trade.entry_time.format("%Y-%m-%d %H:%M:%S").to_string(),
                trade.direction.to_string(),
                trade.entry_price.to_string(),
                trade.exit_price.to_string(),
                trade.result.to_string(),
                format!("{:.2}", trade.pnl),
                trade.diagnostic.to_string(),
            ])
            .map_err(journal_error)?;
        self.writer.flush()?;
        debug!(id = %trade.id, path = %self.path.display(), "Trade journaled");
        Ok(())
    }
}

fn journal_error(e: csv::Error) -> Error {
    Error::Journal(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use common::{DiagnosticCategory, Direction, TradeResult};

    fn trade(result: TradeResult) -> SettledTrade {
        let t = Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap();
        SettledTrade {
            id: uuid::Uuid::new_v4(),
            direction: Direction::Up,
            entry_index: Some(12),
            entry_time: t,
            entry_price: 100.5,
            exit_time: t,
            exit_price: 101.0,
            result,
            pnl: if result == TradeResult::Win { 0.85 } else { -1.0 },
            diagnostic: if result == TradeResult::Win {
                DiagnosticCategory::Reverted
            } else {
                DiagnosticCategory::Drifted
            },
        }
    }

    #[test]
    fn new_file_gets_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.csv");
        {
            let mut journal = TradeJournal::open(&path).unwrap();
            journal.record(&trade(TradeResult::Win)).unwrap();
        }
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], HEADER.join(","));
        assert_eq!(lines[1], "2024-06-01 09:30:00,UP,100.5,101,WIN,0.85,reverted");
    }

    #[test]
    fn reopening_appends_without_second_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.csv");
        TradeJournal::open(&path).unwrap().record(&trade(TradeResult::Win)).unwrap();
        TradeJournal::open(&path).unwrap().record(&trade(TradeResult::Loss)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(content.matches("entry_time").count(), 1);
        assert!(lines[2].ends_with("LOSS,-1.00,drifted"));
    }

    #[test]
    fn unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("trades.csv");
        assert!(TradeJournal::open(path).is_err());
    }
}
