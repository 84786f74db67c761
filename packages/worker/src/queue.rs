//! Tile coordinate queues.

use std::io::BufRead;

use osm_tiles_tile::{TileCoord, TileCoordParseError};

/// Errors reading from or acknowledging on a queue.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// A message body is not a `z/x/y` coordinate.
    #[error("invalid coordinate '{body}': {source}")]
    Coord {
        /// Raw message body
        body: String,
        /// Parse failure
        source: TileCoordParseError,
    },
    /// The queue's transport failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A message could not be acknowledged.
    #[error("failed to acknowledge message {handle}: {message}")]
    Ack {
        /// Handle of the message
        handle: String,
        /// What went wrong
        message: String,
    },
}

/// A tile coordinate waiting to be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub coord: TileCoord,
    /// Opaque handle passed back to [`Queue::job_done`].
    pub handle: String,
    /// When the message was enqueued, in milliseconds since the Unix epoch.
    pub sent_timestamp: Option<u64>,
}

impl QueueMessage {
    /// Parses a `z/x/y` message body.
    ///
    /// # Errors
    ///
    /// * If `body` is not a valid tile coordinate
    pub fn parse(
        body: &str,
        handle: impl Into<String>,
        sent_timestamp: Option<u64>,
    ) -> Result<Self, QueueError> {
        let coord = body.trim().parse().map_err(|source| QueueError::Coord {
            body: body.to_string(),
            source,
        })?;
        Ok(Self {
            coord,
            handle: handle.into(),
            sent_timestamp,
        })
    }
}

/// Source of tile coordinates to process.
pub trait Queue {
    /// Reads up to `max_to_read` messages. May return fewer, or none.
    ///
    /// # Errors
    ///
    /// * If the queue cannot be read
    fn read(&mut self, max_to_read: usize) -> Result<Vec<QueueMessage>, QueueError>;

    /// Marks a message as processed so it is not delivered again.
    ///
    /// # Errors
    ///
    /// * If the acknowledgement fails
    fn job_done(&mut self, handle: &str) -> Result<(), QueueError>;

    /// Whether the queue will never return messages again.
    fn is_exhausted(&self) -> bool {
        false
    }
}

/// A queue over newline-separated `z/x/y` coordinates, such as stdin.
///
/// Blank lines are skipped. Lines that are not coordinates are logged and
/// skipped without affecting the rest of the batch. Handles are 1-based
/// line numbers.
pub struct LineQueue<R> {
    reader: R,
    line_number: usize,
    exhausted: bool,
}

impl<R: BufRead> LineQueue<R> {
    pub const fn new(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
            exhausted: false,
        }
    }
}

impl<R: BufRead> Queue for LineQueue<R> {
    fn read(&mut self, max_to_read: usize) -> Result<Vec<QueueMessage>, QueueError> {
        let mut messages = Vec::with_capacity(max_to_read);
        let mut line = String::new();

        while messages.len() < max_to_read && !self.exhausted {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                self.exhausted = true;
                break;
            }
            self.line_number += 1;
            if line.trim().is_empty() {
                continue;
            }
            match QueueMessage::parse(&line, self.line_number.to_string(), None) {
                Ok(msg) => messages.push(msg),
                Err(e) => log::error!("Skipping line {}: {e}", self.line_number),
            }
        }

        Ok(messages)
    }

    fn job_done(&mut self, handle: &str) -> Result<(), QueueError> {
        log::debug!("Acknowledged line {handle}");
        Ok(())
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_in_batches_and_skips_blank_lines() {
        let mut queue = LineQueue::new(Cursor::new("10/1/2\n\n11/3/4\n12/5/6\n"));

        let first = queue.read(2).unwrap();
        assert_eq!(
            first.iter().map(|m| m.coord).collect::<Vec<_>>(),
            vec![TileCoord::new(10, 1, 2), TileCoord::new(11, 3, 4)]
        );
        assert_eq!(first[1].handle, "3");
        assert!(!queue.is_exhausted());

        let second = queue.read(2).unwrap();
        assert_eq!(second.len(), 1);
        assert!(queue.is_exhausted());
        assert!(queue.read(2).unwrap().is_empty());
    }

    #[test]
    fn invalid_line_does_not_drop_batch() {
        let mut queue = LineQueue::new(Cursor::new("10/1/2\nnot-a-tile\n11/3/4\n"));

        let batch = queue.read(2).unwrap();
        assert_eq!(
            batch.iter().map(|m| m.coord).collect::<Vec<_>>(),
            vec![TileCoord::new(10, 1, 2), TileCoord::new(11, 3, 4)]
        );
        assert_eq!(batch[1].handle, "3");
        assert!(queue.read(2).unwrap().is_empty());
        assert!(queue.is_exhausted());
    }

    #[test]
    fn only_invalid_lines_yield_empty_batch() {
        let mut queue = LineQueue::new(Cursor::new("10/1\n"));
        assert!(queue.read(1).unwrap().is_empty());
        assert!(queue.is_exhausted());
    }

    #[test]
    fn parse_rejects_malformed_body() {
        assert!(matches!(
            QueueMessage::parse("10/1", "h", None),
            Err(QueueError::Coord { .. })
        ));
        let msg = QueueMessage::parse(" 3/1/2\n", "h", Some(7)).unwrap();
        assert_eq!(msg.coord, TileCoord::new(3, 1, 2));
        assert_eq!(msg.sent_timestamp, Some(7));
    }
}
