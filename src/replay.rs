//! Replay of memoized streams
//!
//! A stream-producing callable is run once per refresh. Its stream is moved
//! into a [`ReplayBuffer`] that records every item as it is pulled; callers
//! read through their own [`ReplayCursor`], which serves recorded items first
//! and pulls from the live stream only past the end of the buffer.
//!
//! The buffer is append-only. Recorded items are read under a short lock
//! that is never held across an await, so replaying cursors are not held up
//! by a cursor waiting on the live stream. Pulls from the live stream are
//! serialized by a separate lock.

use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Where a cursor currently reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayPhase {
    /// At the end of the buffer, the next item comes from the live stream
    Buffering,
    /// Behind the end of the buffer, the next item is replayed
    ReplayingThenBuffering,
    /// Stream finished and every item has been read
    Exhausted,
}

impl fmt::Display for ReplayPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayPhase::Buffering => write!(f, "buffering"),
            ReplayPhase::ReplayingThenBuffering => write!(f, "replaying"),
            ReplayPhase::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Shared record of a stream's items
pub struct ReplayBuffer<T> {
    items: RwLock<Vec<T>>,
    /// `None` once the source has ended
    source: Mutex<Option<BoxStream<'static, T>>>,
    exhausted: AtomicBool,
}

impl<T> ReplayBuffer<T>
where
    T: Clone + Send + 'static,
{
    /// Buffer a live stream lazily
    pub fn new<S>(source: S) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
    {
        Self {
            items: RwLock::new(Vec::new()),
            source: Mutex::new(Some(source.boxed())),
            exhausted: AtomicBool::new(false),
        }
    }

    /// Buffer that already holds every item
    pub fn from_items(items: Vec<T>) -> Self {
        Self {
            items: RwLock::new(items),
            source: Mutex::new(None),
            exhausted: AtomicBool::new(true),
        }
    }

    /// Drain a stream completely before anyone reads it
    pub async fn precalculate<S>(source: S) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
    {
        Self::from_items(source.collect().await)
    }

    /// Open a cursor at the first item
    pub fn cursor(self: &Arc<Self>) -> ReplayCursor<T> {
        ReplayCursor {
            buffer: Arc::clone(self),
            position: 0,
        }
    }

    /// Number of items recorded so far
    pub async fn buffered(&self) -> usize {
        self.items.read().await.len()
    }

    /// Whether the source stream has ended
    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::Acquire)
    }

    async fn recorded(&self, position: usize) -> Option<T> {
        self.items.read().await.get(position).cloned()
    }

    /// Item at `position`, pulling from the source as far as needed
    async fn item_at(&self, position: usize) -> Option<T> {
        if let Some(item) = self.recorded(position).await {
            return Some(item);
        }

        let mut source = self.source.lock().await;
        loop {
            // another cursor may have pulled it while we waited
            if let Some(item) = self.recorded(position).await {
                return Some(item);
            }
            let stream = source.as_mut()?;
            match stream.next().await {
                Some(item) => self.items.write().await.push(item),
                None => {
                    *source = None;
                    self.exhausted.store(true, Ordering::Release);
                    return None;
                }
            }
        }
    }

    async fn snapshot(&self) -> (usize, bool) {
        (self.buffered().await, self.is_exhausted())
    }
}

/// One reader's position in a [`ReplayBuffer`]
pub struct ReplayCursor<T> {
    buffer: Arc<ReplayBuffer<T>>,
    position: usize,
}

impl<T> ReplayCursor<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Next item, or `None` at the end of the stream.
    ///
    /// Reaching the end rewinds the cursor, so the following call starts a
    /// fresh pass from the first item.
    pub async fn next(&mut self) -> Option<T> {
        match self.buffer.item_at(self.position).await {
            Some(item) => {
                self.position += 1;
                Some(item)
            }
            None => {
                self.position = 0;
                None
            }
        }
    }

    /// Restart from the first item
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn buffer(&self) -> &Arc<ReplayBuffer<T>> {
        &self.buffer
    }

    pub async fn phase(&self) -> ReplayPhase {
        let (buffered, exhausted) = self.buffer.snapshot().await;
        if self.position < buffered {
            ReplayPhase::ReplayingThenBuffering
        } else if exhausted {
            ReplayPhase::Exhausted
        } else {
            ReplayPhase::Buffering
        }
    }

    /// Read the rest of the current pass
    pub async fn collect_all(&mut self) -> Vec<T> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await {
            items.push(item);
        }
        items
    }

    /// Consume the cursor as a stream covering the rest of the current pass
    pub fn into_stream(self) -> impl Stream<Item = T> + Send {
        stream::unfold(self, |mut cursor| async move {
            let item = cursor.next().await?;
            Some((item, cursor))
        })
    }
}

impl<T> Clone for ReplayCursor<T> {
    fn clone(&self) -> Self {
        Self {
            buffer: Arc::clone(&self.buffer),
            position: self.position,
        }
    }
}

impl<T> fmt::Debug for ReplayCursor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayCursor")
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counted(items: Vec<u32>, pulls: Arc<AtomicUsize>) -> impl Stream<Item = u32> + Send {
        stream::iter(items).inspect(move |_| {
            pulls.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn test_replay_serves_same_sequence() {
        let pulls = Arc::new(AtomicUsize::new(0));
        let buffer = Arc::new(ReplayBuffer::new(counted(vec![1, 2, 3], pulls.clone())));

        let mut first = buffer.cursor();
        assert_eq!(first.collect_all().await, vec![1, 2, 3]);

        let mut second = buffer.cursor();
        assert_eq!(second.collect_all().await, vec![1, 2, 3]);

        assert_eq!(pulls.load(Ordering::SeqCst), 3);
        assert!(buffer.is_exhausted());
    }

    #[tokio::test]
    async fn test_partial_read_then_resume() {
        let pulls = Arc::new(AtomicUsize::new(0));
        let buffer = Arc::new(ReplayBuffer::new(counted(vec![10, 20, 30], pulls.clone())));

        let mut first = buffer.cursor();
        assert_eq!(first.next().await, Some(10));
        assert_eq!(buffer.buffered().await, 1);

        // a second reader replays 10, then pulls 20 and 30 live
        let mut second = buffer.cursor();
        assert_eq!(second.phase().await, ReplayPhase::ReplayingThenBuffering);
        assert_eq!(second.collect_all().await, vec![10, 20, 30]);

        // the first reader continues from its own position
        assert_eq!(first.collect_all().await, vec![20, 30]);
        assert_eq!(pulls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cursor_restarts_after_exhaustion() {
        let buffer = Arc::new(ReplayBuffer::new(stream::iter(vec!['a', 'b'])));
        let mut cursor = buffer.cursor();

        assert_eq!(cursor.next().await, Some('a'));
        assert_eq!(cursor.next().await, Some('b'));
        assert_eq!(cursor.phase().await, ReplayPhase::Buffering);
        assert_eq!(cursor.next().await, None);
        assert_eq!(cursor.position(), 0);

        assert_eq!(cursor.next().await, Some('a'));
        assert_eq!(cursor.next().await, Some('b'));
        assert_eq!(cursor.next().await, None);
    }

    #[tokio::test]
    async fn test_phases() {
        let buffer = Arc::new(ReplayBuffer::new(stream::iter(vec![1u8])));
        let mut cursor = buffer.cursor();

        assert_eq!(cursor.phase().await, ReplayPhase::Buffering);
        cursor.next().await;
        assert_eq!(cursor.phase().await, ReplayPhase::Buffering);
        cursor.next().await;
        // rewound onto the recorded item
        assert_eq!(cursor.phase().await, ReplayPhase::ReplayingThenBuffering);
        cursor.next().await;
        assert_eq!(cursor.phase().await, ReplayPhase::Exhausted);
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let buffer = Arc::new(ReplayBuffer::new(stream::iter(Vec::<u8>::new())));
        let mut cursor = buffer.cursor();

        assert_eq!(cursor.next().await, None);
        assert_eq!(cursor.phase().await, ReplayPhase::Exhausted);
        assert!(cursor.collect_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_precalculate_drains_source() {
        let pulls = Arc::new(AtomicUsize::new(0));
        let buffer = Arc::new(ReplayBuffer::precalculate(counted(vec![1, 2], pulls.clone())).await);

        assert_eq!(pulls.load(Ordering::SeqCst), 2);
        assert!(buffer.is_exhausted());
        assert_eq!(buffer.cursor().collect_all().await, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_into_stream() {
        let buffer = Arc::new(ReplayBuffer::from_items(vec![5, 6, 7]));
        let mut cursor = buffer.cursor();
        cursor.next().await;

        let rest: Vec<i32> = cursor.into_stream().collect().await;
        assert_eq!(rest, vec![6, 7]);
    }

    #[tokio::test]
    async fn test_rewind_and_clone() {
        let buffer = Arc::new(ReplayBuffer::from_items(vec!["x", "y"]));
        let mut cursor = buffer.cursor();
        cursor.next().await;

        let mut copy = cursor.clone();
        assert_eq!(copy.next().await, Some("y"));

        cursor.rewind();
        assert_eq!(cursor.next().await, Some("x"));
    }

    #[tokio::test]
    async fn test_concurrent_readers() {
        let buffer = Arc::new(ReplayBuffer::new(stream::iter(0..100u32)));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let mut cursor = buffer.cursor();
                tokio::spawn(async move { cursor.collect_all().await })
            })
            .collect();

        for handle in handles {
            let items = handle.await.unwrap();
            assert_eq!(items, (0..100).collect::<Vec<_>>());
        }
        assert_eq!(buffer.buffered().await, 100);
    }

    #[tokio::test]
    async fn test_buffered_items_served_while_source_stalls() {
        let source = stream::iter(vec![1u32]).chain(stream::pending());
        let buffer = Arc::new(ReplayBuffer::new(source));

        let mut waiting = buffer.cursor();
        assert_eq!(waiting.next().await, Some(1));
        let stalled = tokio::spawn(async move { waiting.next().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!stalled.is_finished());

        let mut replay = buffer.cursor();
        let first = tokio::time::timeout(Duration::from_millis(500), replay.next()).await;
        assert_eq!(first.unwrap(), Some(1));
        assert_eq!(replay.phase().await, ReplayPhase::Buffering);
        assert!(!buffer.is_exhausted());

        stalled.abort();
    }
}
