use crate::{
    error::BulkLoadError,
    postgres::{
        encoder::PgValueEncoder,
        serializer::{raw_row, serialize_row},
        session::{CopySession, PgRowSink, RowSink, load_rows},
    },
};
use bytes::Bytes;
use chrono::Utc;
use model::{core::value::Value, records::record::Record, schema::table::TableModel};
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_postgres::Client;
use tracing::debug;

const COL_ID: &str = "id";
const COL_CREATED_AT: &str = "created_at";
const COL_UPDATED_AT: &str = "updated_at";

/// Columns the writer never takes from the caller: the identity column is
/// sequence-generated and the audit pair is injected by the writer itself.
const IDENTITY_COLUMNS: [&str; 3] = [COL_ID, COL_CREATED_AT, COL_UPDATED_AT];

/// One recognized `WITH (...)` option of a COPY directive.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyOption {
    pub key: String,
    pub value: Option<String>,
}

impl CopyOption {
    pub fn new(key: impl Into<String>, value: Option<&str>) -> Self {
        CopyOption {
            key: key.into(),
            value: value.map(str::to_string),
        }
    }
}

/// Options matching the row encoder: CSV fields, `\N` null marker.
pub fn csv_copy_options() -> Vec<CopyOption> {
    vec![
        CopyOption::new("FORMAT", Some("csv")),
        CopyOption::new("NULL", Some("'\\N'")),
    ]
}

/// Destination of a raw load: table, optional schema qualifier, explicit
/// column list. The column list may be empty for file loads that cover
/// every table column.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyTarget {
    pub table: String,
    pub schema: Option<String>,
    pub columns: Vec<String>,
}

impl CopyTarget {
    pub fn new(table: impl Into<String>, columns: &[&str]) -> Self {
        CopyTarget {
            table: table.into(),
            schema: None,
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

pub(crate) fn quote_ident(name: &str) -> String {
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('"');
    for ch in name.chars() {
        if ch == '"' {
            quoted.push('"');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

fn qualified_table(schema: Option<&str>, table: &str) -> String {
    match schema {
        Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(table)),
        None => quote_ident(table),
    }
}

/// Render the session-initiation directive:
/// `COPY <table> (<columns>) FROM STDIN [WITH (<options>)]`.
fn copy_statement(
    table: &str,
    schema: Option<&str>,
    columns: &[String],
    options: &[CopyOption],
) -> String {
    let mut sql = String::from("COPY ");
    sql.push_str(&qualified_table(schema, table));

    if !columns.is_empty() {
        sql.push_str(" (");
        let cols: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
        sql.push_str(&cols.join(", "));
        sql.push(')');
    }

    sql.push_str(" FROM STDIN");

    if !options.is_empty() {
        sql.push_str(" WITH (");
        for (i, option) in options.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&option.key);
            if let Some(value) = &option.value {
                sql.push(' ');
                sql.push_str(value);
            }
        }
        sql.push(')');
    }

    sql
}

/// Attribute names the caller supplies values for: the model's columns
/// minus identity and audit columns.
fn content_columns(model: &TableModel) -> Vec<String> {
    model
        .attribute_names()
        .into_iter()
        .filter(|name| !IDENTITY_COLUMNS.contains(&name.as_str()))
        .collect()
}

fn encode_csv_line(values: &[Value], encoder: &PgValueEncoder) -> Bytes {
    let mut line = String::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        line.push_str(&encoder.encode_value(value));
    }
    line.push('\n');
    Bytes::from(line)
}

fn encode_record_rows<'a>(
    columns: &'a [String],
    records: &'a [Record],
    model: &'a TableModel,
    times: &'a [Value],
    encoder: &'a PgValueEncoder,
) -> impl Iterator<Item = Result<Bytes, BulkLoadError>> + 'a {
    records.iter().map(move |record| {
        let mut values = serialize_row(columns, record, model)?;
        values.extend(times.iter().cloned());
        Ok(encode_csv_line(&values, encoder))
    })
}

fn encode_raw_rows<'a>(
    columns: &'a [String],
    records: &'a [Record],
    encoder: &'a PgValueEncoder,
) -> impl Iterator<Item = Result<Bytes, BulkLoadError>> + 'a {
    records
        .iter()
        .map(move |record| Ok(encode_csv_line(&raw_row(columns, record), encoder)))
}

/// Feed a reader's lines into the session byte-for-byte, terminators
/// included; a final line without a newline is sent as-is. Same abort
/// discipline as the record paths.
async fn stream_verbatim_rows<S, R>(
    session: &mut CopySession<S>,
    mut reader: R,
) -> Result<u64, BulkLoadError>
where
    S: RowSink,
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => session.write(Bytes::copy_from_slice(&buf)).await?,
            Err(err) => {
                session.abort().await;
                return Err(err.into());
            }
        }
    }
    session.commit().await
}

fn next_sequence_value(last_value: i64, is_called: bool) -> i64 {
    if is_called { last_value + 1 } else { last_value }
}

/// Streaming bulk-load writer over one client. Session-opening methods
/// take `&mut self`, so at most one copy session is ever open per
/// connection; concurrent loads need distinct connections.
///
/// ```compile_fail
/// # use connectors::postgres::copy::{CopyTarget, CopyWriter};
/// # use model::{records::record::Record, schema::table::TableModel};
/// fn two_sessions_on_one_writer(
///     writer: &mut CopyWriter<'_>,
///     model: &TableModel,
///     records: &[Record],
///     target: &CopyTarget,
/// ) {
///     let first = writer.insert_with_copy(model, records, false);
///     let second = writer.raw_insert_with_copy(records, target);
///     let _ = (first, second);
/// }
/// ```
pub struct CopyWriter<'a> {
    client: &'a mut Client,
}

impl<'a> CopyWriter<'a> {
    pub fn new(client: &'a mut Client) -> Self {
        CopyWriter { client }
    }

    /// Bulk-load records into the model's table. The column list is the
    /// model's attributes minus identity/audit columns; with `timestamps`
    /// set, `created_at`/`updated_at` are appended and every row gets the
    /// same current-time value for both, so one batch shares one timestamp.
    pub async fn insert_with_copy(
        &mut self,
        model: &TableModel,
        records: &[Record],
        timestamps: bool,
    ) -> Result<u64, BulkLoadError> {
        let columns = content_columns(model);

        let mut statement_columns = columns.clone();
        let times: Vec<Value> = if timestamps {
            statement_columns.push(COL_CREATED_AT.to_string());
            statement_columns.push(COL_UPDATED_AT.to_string());
            let now = Value::Timestamp(Utc::now());
            vec![now.clone(), now]
        } else {
            Vec::new()
        };

        let statement = copy_statement(
            &model.table_name,
            None,
            &statement_columns,
            &csv_copy_options(),
        );
        debug!("COPY statement: {}", statement);

        let sink = self.client.copy_in(&statement).await?;
        let mut session = CopySession::new(PgRowSink::new(sink));

        let encoder = PgValueEncoder::new();
        let rows = encode_record_rows(&columns, records, model, &times, &encoder);
        load_rows(&mut session, rows).await
    }

    /// Bulk-load records into an explicit table/column target. No defaults
    /// and no timestamp injection; unresolved columns become null.
    pub async fn raw_insert_with_copy(
        &mut self,
        records: &[Record],
        target: &CopyTarget,
    ) -> Result<u64, BulkLoadError> {
        let statement = copy_statement(
            &target.table,
            target.schema.as_deref(),
            &target.columns,
            &csv_copy_options(),
        );
        debug!("COPY statement: {}", statement);

        let sink = self.client.copy_in(&statement).await?;
        let mut session = CopySession::new(PgRowSink::new(sink));

        let encoder = PgValueEncoder::new();
        let rows = encode_raw_rows(&target.columns, records, &encoder);
        load_rows(&mut session, rows).await
    }

    /// Stream a file's lines verbatim as COPY rows, terminators included,
    /// without per-row parsing. The caller's options clause must match the
    /// file's format.
    pub async fn copy_from_file(
        &mut self,
        path: &Path,
        target: &CopyTarget,
        options: &[CopyOption],
    ) -> Result<u64, BulkLoadError> {
        let statement = copy_statement(
            &target.table,
            target.schema.as_deref(),
            &target.columns,
            options,
        );
        debug!("COPY statement: {}", statement);

        // Open the file before the session so a bad path never leaves a
        // copy to clean up.
        let file = tokio::fs::File::open(path).await?;
        let sink = self.client.copy_in(&statement).await?;
        let mut session = CopySession::new(PgRowSink::new(sink));

        stream_verbatim_rows(&mut session, BufReader::new(file)).await
    }

    /// Value the next identity-generating insert on `table` would receive,
    /// read from the table's id sequence. Advisory only: another writer can
    /// consume the sequence between this read and the insert.
    pub async fn next_insert_id(&self, table: &str) -> Result<i64, BulkLoadError> {
        let sequence = format!("{table}_id_seq");
        let query = format!(
            "SELECT last_value, is_called FROM {}",
            quote_ident(&sequence)
        );

        let row = self.client.query_one(&query, &[]).await?;
        let last_value: i64 = row.try_get("last_value")?;
        let is_called: bool = row.try_get("is_called")?;
        Ok(next_sequence_value(last_value, is_called))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postgres::session::{SessionState, testing::VecSink};
    use model::schema::table::ColumnModel;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn statement_quotes_and_qualifies() {
        let sql = copy_statement(
            "users",
            Some("public"),
            &columns(&["id", "name"]),
            &csv_copy_options(),
        );
        assert_eq!(
            sql,
            r#"COPY "public"."users" ("id", "name") FROM STDIN WITH (FORMAT csv, NULL '\N')"#
        );
    }

    #[test]
    fn statement_omits_empty_column_list_and_options() {
        let sql = copy_statement("events", None, &[], &[]);
        assert_eq!(sql, r#"COPY "events" FROM STDIN"#);
    }

    #[test]
    fn content_columns_exclude_identity_and_audit() {
        let model = TableModel::new("widgets")
            .column(ColumnModel::new("id"))
            .column(ColumnModel::new("name"))
            .column(ColumnModel::new("created_at"))
            .column(ColumnModel::new("updated_at"))
            .column(ColumnModel::new("price"));

        assert_eq!(content_columns(&model), columns(&["name", "price"]));
    }

    #[tokio::test]
    async fn widgets_scenario_transmits_two_rows_and_commits() {
        let model = TableModel::new("widgets")
            .column(ColumnModel::new("name"))
            .column(ColumnModel::new("price"));
        let records: Vec<Record> = vec![
            [("name", Value::from("a")), ("price", Value::Int(1))]
                .into_iter()
                .collect(),
            [("name", Value::from("b")), ("price", Value::Int(2))]
                .into_iter()
                .collect(),
        ];

        let encoder = PgValueEncoder::new();
        let cols = columns(&["name", "price"]);
        let rows = encode_record_rows(&cols, &records, &model, &[], &encoder);

        let mut session = CopySession::new(VecSink::new());
        let count = load_rows(&mut session, rows).await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(session.state(), SessionState::Committed);
        assert_eq!(session.sink().rows[0].as_ref(), b"\"a\",1\n");
        assert_eq!(session.sink().rows[1].as_ref(), b"\"b\",2\n");
    }

    #[tokio::test]
    async fn all_rows_share_one_timestamp_pair() {
        let model = TableModel::new("widgets").column(ColumnModel::new("name"));
        let records: Vec<Record> = vec![
            [("name", Value::from("a"))].into_iter().collect(),
            [("name", Value::from("b"))].into_iter().collect(),
        ];

        let now = Value::Timestamp(Utc::now());
        let times = vec![now.clone(), now];
        let encoder = PgValueEncoder::new();
        let cols = columns(&["name"]);
        let encoded: Vec<Bytes> = encode_record_rows(&cols, &records, &model, &times, &encoder)
            .collect::<Result<_, _>>()
            .unwrap();

        let suffix_of = |row: &Bytes| {
            let text = String::from_utf8(row.to_vec()).unwrap();
            text.splitn(2, ',').nth(1).unwrap().to_string()
        };
        assert_eq!(suffix_of(&encoded[0]), suffix_of(&encoded[1]));

        let fields = String::from_utf8(encoded[0].to_vec()).unwrap();
        assert_eq!(fields.trim_end().split(',').count(), 3);
    }

    #[tokio::test]
    async fn raw_rows_null_out_unresolved_columns() {
        let records: Vec<Record> = vec![[("name", Value::from("a"))].into_iter().collect()];
        let encoder = PgValueEncoder::new();
        let cols = columns(&["name", "price"]);
        let encoded: Vec<Bytes> = encode_raw_rows(&cols, &records, &encoder)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(encoded[0].as_ref(), b"\"a\",\\N\n");
    }

    #[tokio::test]
    async fn serializer_failure_aborts_the_session() {
        // Model knows nothing about "ghost", so row two fails and the
        // session must end aborted with only row one transmitted.
        let model = TableModel::new("widgets").column(ColumnModel::new("name"));
        let records: Vec<Record> = vec![
            [("name", Value::from("a")), ("ghost", Value::from("x"))]
                .into_iter()
                .collect(),
            [("name", Value::from("b"))].into_iter().collect(),
        ];

        let encoder = PgValueEncoder::new();
        let cols = columns(&["name", "ghost"]);
        let rows = encode_record_rows(&cols, &records, &model, &[], &encoder);

        let mut session = CopySession::new(VecSink::new());
        let err = load_rows(&mut session, rows).await.unwrap_err();

        assert!(matches!(err, BulkLoadError::Serialize(_)));
        assert_eq!(session.state(), SessionState::Aborted);
        assert!(session.sink().aborted);
        assert_eq!(session.sink().rows.len(), 1);
    }

    #[tokio::test]
    async fn file_rows_keep_their_terminators() {
        // CRLF endings pass through untouched and a final line with no
        // newline is not given one.
        let data: &[u8] = b"a,1\r\nb,2";
        let mut session = CopySession::new(VecSink::new());
        let count = stream_verbatim_rows(&mut session, BufReader::new(data))
            .await
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(session.state(), SessionState::Committed);
        assert_eq!(session.sink().rows[0].as_ref(), b"a,1\r\n");
        assert_eq!(session.sink().rows[1].as_ref(), b"b,2");
    }

    #[test]
    fn sequence_value_accounts_for_is_called() {
        assert_eq!(next_sequence_value(41, true), 42);
        assert_eq!(next_sequence_value(1, false), 1);
    }
}
