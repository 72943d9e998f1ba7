//! NDJSON (Newline Delimited JSON) replay of recorded live chat responses.
//!
//! Each line is a [`ResponseEntry`] as written by
//! [`super::RawResponseRecorder`]. Replayed messages keep the channel ID
//! identity and the send time of the original live chat.

use super::chat_import::{ImportFormat, ImportReport};
use crate::api::innertube::get_live_chat::ResponseEntry;
use std::io::BufRead;

/// Replay a recording into chat messages.
///
/// Lines that are not valid response entries are skipped and counted; only
/// I/O failures abort the replay.
pub fn replay_recording<R: BufRead>(reader: R) -> Result<ImportReport, std::io::Error> {
    let mut report = ImportReport::new(ImportFormat::Ndjson);

    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;

        // Skip empty lines
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<ResponseEntry>(&line) {
            Ok(entry) => report.messages.extend(entry.response.chat_messages()),
            Err(e) => {
                tracing::debug!(line = line_number + 1, error = %e, "⏭️ Skipping invalid NDJSON line");
                report.skipped += 1;
            }
        }
    }

    Ok(report)
}
