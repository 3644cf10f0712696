use async_trait::async_trait;
use futures_util::stream::{self, Stream};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};

use crate::error::FeedError;
use crate::feed::events::PushMessage;

/// Transport seam. Implementations deliver snapshot and update messages
/// in receipt order; `None` ends the feed.
#[async_trait]
pub trait PushSource: Send {
    async fn next_message(&mut self) -> Result<Option<PushMessage>, FeedError>;
}

/// Replays push messages from JSON lines. Blank lines and `#` comments
/// are skipped.
pub struct JsonlSource<R> {
    lines: Lines<BufReader<R>>,
    line_no: usize,
}

impl<R: AsyncRead + Unpin + Send> JsonlSource<R> {
    pub fn new(reader: R) -> Self {
        Self { lines: BufReader::new(reader).lines(), line_no: 0 }
    }
}

impl JsonlSource<tokio::fs::File> {
    pub async fn open(path: &str) -> Result<Self, FeedError> {
        Ok(Self::new(tokio::fs::File::open(path).await?))
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> PushSource for JsonlSource<R> {
    async fn next_message(&mut self) -> Result<Option<PushMessage>, FeedError> {
        while let Some(line) = self.lines.next_line().await? {
            self.line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            return serde_json::from_str(trimmed)
                .map(Some)
                .map_err(|source| FeedError::Parse { line: self.line_no, source });
        }
        Ok(None)
    }
}

/// Adapt a source into a stream. Parse errors are yielded and the stream
/// continues; IO errors end it.
pub fn into_stream(source: Box<dyn PushSource>) -> impl Stream<Item = Result<PushMessage, FeedError>> + Send {
    stream::unfold(Some(source), |state| async move {
        let mut source = state?;
        match source.next_message().await {
            Ok(Some(msg)) => Some((Ok(msg), Some(source))),
            Ok(None) => None,
            Err(err @ FeedError::Parse { .. }) => Some((Err(err), Some(source))),
            Err(err) => Some((Err(err), None)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::events::PushKind;
    use futures_util::StreamExt;

    const FEED: &str = r#"
# orders feed
{"source": "orders", "kind": "snapshot", "records": [{"_id": 1, "qty": 5}]}
{"source": "orders", "records": [{"_id": 2, "qty": 7}]}
not json
{"source": "orders", "records": [{"_id": 1}]}
"#;

    #[tokio::test]
    async fn test_reads_messages_and_reports_bad_lines() {
        let mut src = JsonlSource::new(FEED.as_bytes());
        let first = src.next_message().await.unwrap().unwrap();
        assert_eq!(first.kind, PushKind::Snapshot);
        let second = src.next_message().await.unwrap().unwrap();
        assert_eq!(second.kind, PushKind::Update);
        match src.next_message().await {
            Err(FeedError::Parse { line, .. }) => assert_eq!(line, 5),
            other => panic!("expected parse error, got {:?}", other.map(|m| m.is_some())),
        }
        assert!(src.next_message().await.unwrap().is_some());
        assert!(src.next_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stream_skips_past_parse_errors() {
        let stream = into_stream(Box::new(JsonlSource::new(FEED.as_bytes())));
        let items: Vec<_> = stream.collect().await;
        assert_eq!(items.len(), 4);
        assert_eq!(items.iter().filter(|r| r.is_err()).count(), 1);
    }
}
