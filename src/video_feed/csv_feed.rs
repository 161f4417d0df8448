// Feeds recorded as CSV annotation files, one row per frame:
//
//   frame,labels
//   0,car:0.91;truck:0.47
//   1,
//   2,car:0.88;fire truck:0.62
//
// Frame numbers must strictly increase down the file; a row that goes backwards
// is a decode error.

use super::{window_frames, Detection, Frame, FrameSource, FrameStream};
use crate::error::SourceError;
use serde::Deserialize;
use std::fs::File;
use std::ops::Range;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct FeedRow {
    frame: u64,
    #[serde(default)]
    labels: String,
}

/// Resolves a video id to `<feed_dir>/<video_id>.csv`.
#[derive(Debug, Clone)]
pub struct CsvFeedLibrary {
    feed_dir: PathBuf,
    fps: f64,
}

impl CsvFeedLibrary {
    pub fn new(feed_dir: impl Into<PathBuf>, fps: f64) -> Self {
        Self {
            feed_dir: feed_dir.into(),
            fps,
        }
    }

    pub fn feed_path(&self, video_id: &str) -> PathBuf {
        if Path::new(video_id).extension().is_some_and(|ext| ext == "csv") {
            self.feed_dir.join(video_id)
        } else {
            self.feed_dir.join(format!("{}.csv", video_id))
        }
    }
}

impl FrameSource for CsvFeedLibrary {
    fn open(
        &self,
        video_id: &str,
        start_offset_secs: f64,
        duration_secs: f64,
    ) -> Result<FrameStream, SourceError> {
        let path = self.feed_path(video_id);
        if !path.exists() {
            return Err(SourceError::Unavailable {
                video_id: video_id.to_string(),
                reason: format!("file not found: {}", path.display()),
            });
        }
        let reader = csv::Reader::from_path(&path).map_err(|e| SourceError::Unavailable {
            video_id: video_id.to_string(),
            reason: e.to_string(),
        })?;
        log::debug!(
            "Opened feed {} at {:.1}s for {:.1}s",
            path.display(),
            start_offset_secs,
            duration_secs
        );

        Ok(Box::new(CsvFrameStream {
            video_id: video_id.to_string(),
            rows: reader.into_deserialize(),
            range: window_frames(start_offset_secs, duration_secs, self.fps),
            fps: self.fps,
            last_frame: None,
            done: false,
        }))
    }
}

struct CsvFrameStream {
    video_id: String,
    rows: csv::DeserializeRecordsIntoIter<File, FeedRow>,
    range: Range<u64>,
    fps: f64,
    last_frame: Option<u64>,
    done: bool,
}

impl CsvFrameStream {
    fn decode_error(&mut self, frame: u64, reason: String) -> SourceError {
        self.done = true;
        SourceError::Decode {
            video_id: self.video_id.clone(),
            frame,
            reason,
        }
    }
}

impl Iterator for CsvFrameStream {
    type Item = Result<Frame, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let row = match self.rows.next() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(e)) => {
                    let frame = self.last_frame.map_or(0, |f| f + 1);
                    return Some(Err(self.decode_error(frame, e.to_string())));
                }
                Some(Ok(row)) => row,
            };
            if let Some(prev) = self.last_frame {
                if row.frame <= prev {
                    let reason =
                        format!("frame {} follows frame {}, rows out of order", row.frame, prev);
                    return Some(Err(self.decode_error(row.frame, reason)));
                }
            }
            self.last_frame = Some(row.frame);

            // Rows past the window are still read so ordering is checked to the end.
            if !self.range.contains(&row.frame) {
                continue;
            }
            return Some(match parse_labels(&row.labels) {
                Ok(objects) => Ok(Frame {
                    index: row.frame,
                    timestamp_secs: row.frame as f64 / self.fps,
                    objects,
                }),
                Err(reason) => Err(self.decode_error(row.frame, reason)),
            });
        }
    }
}

/// Parses `label:confidence;label:confidence`. A label without a confidence counts
/// as certain.
pub fn parse_labels(field: &str) -> Result<Vec<Detection>, String> {
    let mut objects = Vec::new();
    for entry in field.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let detection = match entry.rsplit_once(':') {
            Some((label, confidence)) => {
                let confidence: f32 = confidence
                    .trim()
                    .parse()
                    .map_err(|_| format!("bad confidence in '{}'", entry))?;
                if !(0.0..=1.0).contains(&confidence) {
                    return Err(format!("confidence out of range in '{}'", entry));
                }
                Detection::new(label.trim(), confidence)
            }
            None => Detection::new(entry, 1.0),
        };
        objects.push(detection);
    }
    Ok(objects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_feed(dir: &Path, name: &str, body: &str) {
        let mut file = File::create(dir.join(name)).unwrap();
        file.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn parse_labels_reads_confidences() {
        let objects = parse_labels("car:0.9; fire truck:0.4;bus").unwrap();
        assert_eq!(
            objects,
            vec![
                Detection::new("car", 0.9),
                Detection::new("fire truck", 0.4),
                Detection::new("bus", 1.0),
            ]
        );
        assert!(parse_labels("").unwrap().is_empty());
        assert!(parse_labels("car:abc").is_err());
        assert!(parse_labels("car:1.5").is_err());
    }

    #[test]
    fn open_reads_requested_window() {
        let dir = tempfile::tempdir().unwrap();
        let mut body = String::from("frame,labels\n");
        for i in 0..40 {
            body.push_str(&format!("{},car:0.8\n", i));
        }
        write_feed(dir.path(), "north.csv", &body);

        let library = CsvFeedLibrary::new(dir.path(), 10.0);
        let frames: Vec<Frame> = library
            .open("north", 1.0, 2.0)
            .unwrap()
            .map(|f| f.unwrap())
            .collect();
        assert_eq!(frames.len(), 20);
        assert_eq!(frames[0].index, 10);
        assert_eq!(frames[0].timestamp_secs, 1.0);
        assert_eq!(frames[19].index, 29);
    }

    #[test]
    fn missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let library = CsvFeedLibrary::new(dir.path(), 25.0);
        assert!(matches!(
            library.open("rush", 0.0, 10.0),
            Err(SourceError::Unavailable { .. })
        ));
    }

    #[test]
    fn malformed_row_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        write_feed(dir.path(), "south.csv", "frame,labels\n0,car:0.7\n1,car:oops\n2,bus:0.9\n");
        let library = CsvFeedLibrary::new(dir.path(), 25.0);
        let items: Vec<_> = library.open("south.csv", 0.0, 1.0).unwrap().collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(SourceError::Decode { frame: 1, .. })));
    }

    #[test]
    fn rows_out_of_order_are_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        write_feed(
            dir.path(),
            "east.csv",
            "frame,labels\n0,car:0.9\n1,car:0.9\n50,car:0.9\n2,car:0.9\n",
        );
        let library = CsvFeedLibrary::new(dir.path(), 10.0);
        let items: Vec<_> = library.open("east", 0.0, 1.0).unwrap().collect();
        assert_eq!(items.len(), 3);
        assert!(items[0].is_ok() && items[1].is_ok());
        assert!(matches!(items[2], Err(SourceError::Decode { frame: 2, .. })));

        write_feed(dir.path(), "west.csv", "frame,labels\n0,car:0.9\n0,bus:0.9\n");
        let items: Vec<_> = library.open("west", 0.0, 1.0).unwrap().collect();
        assert!(matches!(items.last(), Some(Err(SourceError::Decode { frame: 0, .. }))));
    }
}
