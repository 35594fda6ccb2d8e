use thiserror::Error;

/// Row serialization failures, local to building one COPY row.
#[derive(Debug, Error, PartialEq)]
pub enum SerializeError {
    /// The record has no value for the column and the table model carries
    /// no descriptor for it either; emitting null here would hide a schema
    /// mismatch, so it is an error instead.
    #[error("no value or column descriptor for column: {column}")]
    MissingColumn { column: String },
}

/// All errors coming from a streaming bulk load. Every mid-stream failure
/// is preceded by a session abort, so the connection stays usable.
#[derive(Debug, Error)]
pub enum BulkLoadError {
    /// Driver-level failure while opening, feeding or finishing the copy.
    #[error("database error: {0}")]
    Db(#[from] tokio_postgres::Error),

    /// A record could not be serialized into a COPY row.
    #[error("serialization error: {0}")]
    Serialize(#[from] SerializeError),

    /// I/O failure while streaming a source file into the session.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A row was written to a session that is no longer open.
    #[error("copy session is not open")]
    SessionClosed,
}

/// Errors happening during connection setup.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("TLS setup failed: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("connection failed: {0}")]
    Connect(#[from] tokio_postgres::Error),
}
