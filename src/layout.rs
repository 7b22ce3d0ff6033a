//! Date-keyed naming for data snapshots and run outputs.
//!
//! Every artifact of a run is grouped by the calendar day of the record's `ts`
//! (epoch milliseconds, interpreted in UTC):
//!
//! ```text
//! base_dir/
//! ├── data/
//! │   ├── today.json                   # "current" local file
//! │   └── 03-07-2024/today.json        # dated snapshot
//! └── output/
//!     └── 03-07-2024/
//!         ├── ArweaveToday-2024-07-03-raw.txt
//!         ├── ArweaveToday-2024-07-03.txt
//!         ├── ArweaveToday-2024-07-03.wav
//!         └── topic_1_video_transcript.txt
//! ```
//!
//! Timestamps chrono cannot represent fall back to the Unix epoch instead of
//! failing the run.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Folder name format for dated snapshots and output directories.
pub const DATE_FOLDER_FORMAT: &str = "%d-%m-%Y";

/// Name of the record file inside `data/` and each dated snapshot folder.
pub const RECORD_FILENAME: &str = "today.json";

fn datetime(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts).unwrap_or(DateTime::UNIX_EPOCH)
}

/// Day-month-year folder key, e.g. `03-07-2024`.
pub fn date_folder(ts: i64) -> String {
    datetime(ts).format(DATE_FOLDER_FORMAT).to_string()
}

/// Long date used inside the script, e.g. `July 03, 2024`.
pub fn formatted_date(ts: i64) -> String {
    datetime(ts).format("%B %d, %Y").to_string()
}

/// Year-month-day stamp used inside file names, e.g. `2024-07-03`.
pub fn datestamp(ts: i64) -> String {
    datetime(ts).format("%Y-%m-%d").to_string()
}

/// `{base}-{datestamp}.{ext}`; a missing leading dot on `ext` is added.
pub fn output_filename(base: &str, datestamp: &str, ext: &str) -> String {
    if ext.starts_with('.') {
        format!("{base}-{datestamp}{ext}")
    } else {
        format!("{base}-{datestamp}.{ext}")
    }
}

pub fn data_dir(base_dir: &Path) -> PathBuf {
    base_dir.join("data")
}

pub fn output_dir(base_dir: &Path, date_folder: &str) -> PathBuf {
    base_dir.join("output").join(date_folder)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TS: i64 = 1_720_000_000_000; // 2024-07-03T09:46:40Z

    #[test]
    fn test_date_keys() {
        assert_eq!(date_folder(TS), "03-07-2024");
        assert_eq!(formatted_date(TS), "July 03, 2024");
        assert_eq!(datestamp(TS), "2024-07-03");
    }

    #[test]
    fn test_same_day_same_keys() {
        let end_of_day = 1_720_051_199_000; // 2024-07-03T23:59:59Z
        let next_day = end_of_day + 1_000;
        assert_eq!(date_folder(TS), date_folder(end_of_day));
        assert_eq!(datestamp(TS), datestamp(end_of_day));
        assert_ne!(date_folder(end_of_day), date_folder(next_day));
        assert_ne!(datestamp(end_of_day), datestamp(next_day));
    }

    #[test]
    fn test_keys_are_stable() {
        assert_eq!(date_folder(TS), date_folder(TS));
        assert_eq!(formatted_date(TS), formatted_date(TS));
    }

    #[test]
    fn test_degenerate_timestamps_do_not_panic() {
        assert_eq!(date_folder(0), "01-01-1970");
        assert_eq!(datestamp(-86_400_000), "1969-12-31");
        assert_eq!(datestamp(i64::MAX), "1970-01-01");
        assert_eq!(formatted_date(i64::MIN), "January 01, 1970");
    }

    #[test]
    fn test_output_filename() {
        assert_eq!(
            output_filename("ArweaveToday", "2024-07-03", "txt"),
            "ArweaveToday-2024-07-03.txt"
        );
        assert_eq!(
            output_filename("ArweaveToday", "2024-07-03", ".wav"),
            "ArweaveToday-2024-07-03.wav"
        );
        assert_eq!(
            output_filename("ArweaveToday", "2024-07-03-raw", "txt"),
            "ArweaveToday-2024-07-03-raw.txt"
        );
    }

    #[test]
    fn test_dirs() {
        let base = Path::new("/srv/podcast");
        assert_eq!(data_dir(base), PathBuf::from("/srv/podcast/data"));
        assert_eq!(
            output_dir(base, "03-07-2024"),
            PathBuf::from("/srv/podcast/output/03-07-2024")
        );
    }
}
