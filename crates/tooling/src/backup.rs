use crate::{
    error::BackupError,
    format::DumpFormat,
    process::{LineSink, run_action},
};
use config::ConnectionParams;
use std::path::{Path, PathBuf};

/// Settings for one database dump.
#[derive(Debug, Clone)]
pub struct DumpOptions {
    pub format: DumpFormat,
    /// Restrict the dump to one schema.
    pub schema: Option<String>,
    /// Subfolder under the backup root.
    pub folder: Option<String>,
}

impl Default for DumpOptions {
    fn default() -> Self {
        DumpOptions {
            format: DumpFormat::Custom,
            schema: None,
            folder: None,
        }
    }
}

/// Dump the configured database with pg_dump into
/// `<root>[/<folder>]/<file_name>.<suffix>` and return the written path.
pub async fn dump_database(
    params: &ConnectionParams,
    backup_root: &Path,
    file_name: &str,
    options: &DumpOptions,
    sink: &dyn LineSink,
) -> Result<PathBuf, BackupError> {
    let backup_dir = backup_directory(backup_root, options.folder.as_deref())?;
    let file_path = backup_dir.join(format!("{file_name}.{}", options.format.suffix()));

    let argv = dump_argv(params, options, &file_path);
    run_action("pg_dump", &password_env(params), &argv, sink).await?;
    Ok(file_path)
}

/// Restore a dump file with pg_restore; the format is derived from the
/// file's suffix.
pub async fn restore_database(
    params: &ConnectionParams,
    backup_root: &Path,
    folder: Option<&str>,
    file_name: &str,
    sink: &dyn LineSink,
) -> Result<(), BackupError> {
    let backup_dir = backup_directory(backup_root, folder)?;
    let file_path = backup_dir.join(file_name);

    let argv = restore_argv(params, file_name, &file_path)?;
    run_action("pg_restore", &password_env(params), &argv, sink).await?;
    Ok(())
}

/// Export one table to CSV (with header) through psql's `\copy`.
pub async fn export_table_csv(
    params: &ConnectionParams,
    table: &str,
    csv_path: &Path,
    sink: &dyn LineSink,
) -> Result<(), BackupError> {
    let argv = export_argv(params, table, csv_path);
    run_action("copy", &password_env(params), &argv, sink).await?;
    Ok(())
}

/// Resolve the backup directory. The directory must already exist; this
/// layer never creates it.
pub fn backup_directory(root: &Path, folder: Option<&str>) -> Result<PathBuf, BackupError> {
    let dir = match folder {
        Some(folder) => root.join(folder),
        None => root.to_path_buf(),
    };
    if !dir.is_dir() {
        return Err(BackupError::MissingBackupDir(dir));
    }
    Ok(dir)
}

fn password_env(params: &ConnectionParams) -> Vec<(String, String)> {
    vec![("PGPASSWORD".to_string(), params.password.clone())]
}

fn dump_argv(params: &ConnectionParams, options: &DumpOptions, file_path: &Path) -> Vec<String> {
    let mut argv = vec![
        "pg_dump".to_string(),
        format!("--format={}", options.format.code()),
    ];
    if let Some(schema) = &options.schema {
        argv.push(format!("--schema={schema}"));
    }
    argv.extend([
        format!("--host={}", params.host),
        format!("--port={}", params.port),
        format!("--dbname={}", params.database),
        format!("--username={}", params.username),
        "--no-owner".to_string(),
        format!("--file={}", file_path.display()),
    ]);
    argv
}

fn restore_argv(
    params: &ConnectionParams,
    file_name: &str,
    file_path: &Path,
) -> Result<Vec<String>, BackupError> {
    let format = DumpFormat::from_filename(file_name)
        .ok_or_else(|| BackupError::UnknownFormat(file_name.to_string()))?;

    Ok(vec![
        "pg_restore".to_string(),
        format!("--format={}", format.code()),
        format!("--host={}", params.host),
        format!("--port={}", params.port),
        format!("--dbname={}", params.database),
        format!("--username={}", params.username),
        file_path.display().to_string(),
    ])
}

fn export_argv(params: &ConnectionParams, table: &str, csv_path: &Path) -> Vec<String> {
    let copy_command = format!(
        "\\copy {table} TO '{}' ENCODING 'UTF8' CSV HEADER;",
        csv_path.display()
    );

    vec![
        "psql".to_string(),
        "-c".to_string(),
        copy_command,
        format!("--host={}", params.host),
        format!("--port={}", params.port),
        format!("--dbname={}", params.database),
        format!("--username={}", params.username),
    ]
}
