use crate::error::BulkLoadError;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::SinkExt;
use std::pin::Pin;
use tokio_postgres::CopyInSink;
use tracing::warn;

/// Destination for encoded COPY rows. The production impl wraps the
/// driver's copy-in sink; tests substitute an in-memory sink so the
/// session's abort discipline can be exercised without a server.
#[async_trait]
pub trait RowSink: Send {
    async fn send(&mut self, row: Bytes) -> Result<(), BulkLoadError>;

    /// Complete the copy and return the server-side row count.
    async fn finish(&mut self) -> Result<u64, BulkLoadError>;

    /// Abort the copy. Must be safe to call at most once, after which the
    /// underlying connection is usable again.
    async fn abort(&mut self);
}

pub struct PgRowSink {
    inner: Option<Pin<Box<CopyInSink<Bytes>>>>,
}

impl PgRowSink {
    pub fn new(sink: CopyInSink<Bytes>) -> Self {
        Self {
            inner: Some(Box::pin(sink)),
        }
    }
}

#[async_trait]
impl RowSink for PgRowSink {
    async fn send(&mut self, row: Bytes) -> Result<(), BulkLoadError> {
        let sink = self.inner.as_mut().ok_or(BulkLoadError::SessionClosed)?;
        sink.as_mut().send(row).await?;
        Ok(())
    }

    async fn finish(&mut self) -> Result<u64, BulkLoadError> {
        let mut sink = self.inner.take().ok_or(BulkLoadError::SessionClosed)?;
        let count = sink.as_mut().finish().await?;
        Ok(count)
    }

    async fn abort(&mut self) {
        // Dropping an unfinished copy-in sink sends CopyFail, which is the
        // explicit abort on the wire; the connection stays usable.
        self.inner.take();
    }
}

/// Lifecycle of one streaming bulk load. Open is the only state that
/// accepts rows; any failure transitions to Aborted before the error
/// propagates, so the connection never leaks an open copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Committed,
    Aborted,
}

pub struct CopySession<S> {
    sink: S,
    state: SessionState,
}

impl<S: RowSink> CopySession<S> {
    pub fn new(sink: S) -> Self {
        CopySession {
            sink,
            state: SessionState::Open,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub async fn write(&mut self, row: Bytes) -> Result<(), BulkLoadError> {
        if self.state != SessionState::Open {
            return Err(BulkLoadError::SessionClosed);
        }
        match self.sink.send(row).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.abort_now().await;
                Err(err)
            }
        }
    }

    pub async fn commit(&mut self) -> Result<u64, BulkLoadError> {
        if self.state != SessionState::Open {
            return Err(BulkLoadError::SessionClosed);
        }
        match self.sink.finish().await {
            Ok(count) => {
                self.state = SessionState::Committed;
                Ok(count)
            }
            Err(err) => {
                self.state = SessionState::Aborted;
                warn!(%err, "copy session failed to commit, aborted");
                Err(err)
            }
        }
    }

    pub async fn abort(&mut self) {
        if self.state == SessionState::Open {
            self.abort_now().await;
        }
    }

    async fn abort_now(&mut self) {
        self.state = SessionState::Aborted;
        self.sink.abort().await;
        warn!("copy session aborted");
    }

    #[cfg(test)]
    pub(crate) fn sink(&self) -> &S {
        &self.sink
    }
}

/// Drive a session over a stream of pre-encoded rows: write all, commit on
/// clean completion, abort on the first failure. Every exit path leaves the
/// session in a terminal state.
pub async fn load_rows<S, I>(
    session: &mut CopySession<S>,
    rows: I,
) -> Result<u64, BulkLoadError>
where
    S: RowSink,
    I: IntoIterator<Item = Result<Bytes, BulkLoadError>>,
{
    for row in rows {
        match row {
            Ok(bytes) => session.write(bytes).await?,
            Err(err) => {
                session.abort().await;
                return Err(err);
            }
        }
    }
    session.commit().await
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::io;

    /// In-memory sink that can be told to fail after N accepted rows.
    #[derive(Default)]
    pub struct VecSink {
        pub rows: Vec<Bytes>,
        pub fail_after: Option<usize>,
        pub finished: bool,
        pub aborted: bool,
    }

    impl VecSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_after(rows: usize) -> Self {
            VecSink {
                fail_after: Some(rows),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl RowSink for VecSink {
        async fn send(&mut self, row: Bytes) -> Result<(), BulkLoadError> {
            if self.fail_after == Some(self.rows.len()) {
                return Err(BulkLoadError::Io(io::Error::other("synthetic send failure")));
            }
            self.rows.push(row);
            Ok(())
        }

        async fn finish(&mut self) -> Result<u64, BulkLoadError> {
            self.finished = true;
            Ok(self.rows.len() as u64)
        }

        async fn abort(&mut self) {
            self.aborted = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::VecSink;
    use super::*;

    fn row(text: &str) -> Result<Bytes, BulkLoadError> {
        Ok(Bytes::from(text.to_string()))
    }

    #[tokio::test]
    async fn clean_run_commits_with_row_count() {
        let mut session = CopySession::new(VecSink::new());
        let count = load_rows(&mut session, vec![row("a\n"), row("b\n"), row("c\n")])
            .await
            .unwrap();

        assert_eq!(count, 3);
        assert_eq!(session.state(), SessionState::Committed);
        assert!(session.sink().finished);
        assert!(!session.sink().aborted);
    }

    #[tokio::test]
    async fn send_failure_aborts_before_propagating() {
        let mut session = CopySession::new(VecSink::failing_after(1));
        let err = load_rows(&mut session, vec![row("a\n"), row("b\n")])
            .await
            .unwrap_err();

        assert!(matches!(err, BulkLoadError::Io(_)));
        assert_eq!(session.state(), SessionState::Aborted);
        assert!(session.sink().aborted);
        assert!(!session.sink().finished);
    }

    #[tokio::test]
    async fn upstream_row_error_aborts_the_session() {
        let mut session = CopySession::new(VecSink::new());
        let rows = vec![
            row("a\n"),
            Err(BulkLoadError::Io(std::io::Error::other("bad row"))),
            row("c\n"),
        ];
        let err = load_rows(&mut session, rows).await.unwrap_err();

        assert!(matches!(err, BulkLoadError::Io(_)));
        assert_eq!(session.state(), SessionState::Aborted);
        assert!(session.sink().aborted);
        assert_eq!(session.sink().rows.len(), 1);
    }

    #[tokio::test]
    async fn terminal_sessions_reject_writes() {
        let mut session = CopySession::new(VecSink::new());
        session.commit().await.unwrap();

        let err = session.write(Bytes::from_static(b"x\n")).await.unwrap_err();
        assert!(matches!(err, BulkLoadError::SessionClosed));
    }
}
