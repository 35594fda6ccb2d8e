/// The closed set of pg_dump output formats and their file suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpFormat {
    Custom,
    Plain,
    Directory,
    Tar,
}

impl DumpFormat {
    pub const ALL: [DumpFormat; 4] = [
        DumpFormat::Custom,
        DumpFormat::Plain,
        DumpFormat::Directory,
        DumpFormat::Tar,
    ];

    /// The single-letter format code passed to the dump/restore utilities.
    pub fn code(&self) -> &'static str {
        match self {
            DumpFormat::Custom => "c",
            DumpFormat::Plain => "p",
            DumpFormat::Directory => "d",
            DumpFormat::Tar => "t",
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            DumpFormat::Custom => "dump",
            DumpFormat::Plain => "sql",
            DumpFormat::Directory => "dir",
            DumpFormat::Tar => "tar",
        }
    }

    /// Unrecognized codes yield `None`, never an error; callers decide
    /// whether that is fatal.
    pub fn from_code(code: &str) -> Option<DumpFormat> {
        match code {
            "c" => Some(DumpFormat::Custom),
            "p" => Some(DumpFormat::Plain),
            "d" => Some(DumpFormat::Directory),
            "t" => Some(DumpFormat::Tar),
            _ => None,
        }
    }

    /// Derive the format from a dump file's suffix.
    pub fn from_filename(file_name: &str) -> Option<DumpFormat> {
        let suffix = file_name.rsplit_once('.').map(|(_, ext)| ext)?;
        DumpFormat::ALL
            .into_iter()
            .find(|format| format.suffix() == suffix)
    }
}
