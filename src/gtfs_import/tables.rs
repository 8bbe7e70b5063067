use ahash::AHashMap;
use std::collections::BTreeMap;
use std::io;

/// One GTFS text file as raw header-keyed rows.
///
/// The typed `gtfs_structures::Gtfs` drops columns it doesn't know about,
/// which includes every vendor extension column, so the importer reads
/// field values from these rows instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GtfsTable {
    pub file_name: String,
    headers: Vec<String>,
    column_index: AHashMap<String, usize>,
    records: Vec<Vec<String>>,
}

impl GtfsTable {
    pub fn new(file_name: &str, headers: Vec<String>, records: Vec<Vec<String>>) -> Self {
        let headers: Vec<String> = headers
            .into_iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let column_index = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), i))
            .collect();

        GtfsTable {
            file_name: file_name.to_string(),
            headers,
            column_index,
            records,
        }
    }

    pub fn from_reader<R: io::Read>(file_name: &str, reader: R) -> Result<Self, csv::Error> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader
            .headers()?
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<String>>();

        let mut records = vec![];

        for record in csv_reader.records() {
            let record = record?;

            if record.iter().all(|field| field.is_empty()) {
                continue;
            }

            records.push(record.iter().map(|field| field.to_string()).collect());
        }

        Ok(GtfsTable::new(file_name, headers, records))
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows are numbered from 1, matching how validators report them.
    pub fn rows(&self) -> impl Iterator<Item = GtfsRow<'_>> {
        self.records
            .iter()
            .enumerate()
            .map(move |(i, values)| GtfsRow {
                index: i + 1,
                table: self,
                values,
            })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GtfsRow<'a> {
    pub index: usize,
    table: &'a GtfsTable,
    values: &'a [String],
}

impl<'a> GtfsRow<'a> {
    /// `None` for an unknown column, a short row or an empty cell. GTFS
    /// treats all three the same way.
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let position = *self.table.column_index.get(column)?;

        self.values
            .get(position)
            .map(|value| value.as_str())
            .filter(|value| !value.is_empty())
    }

    pub fn file_name(&self) -> &'a str {
        self.table.file_name.as_str()
    }
}

/// All `*.txt` files of a dataset keyed by file name, e.g. `routes.txt`.
#[derive(Debug, Clone, Default)]
pub struct GtfsTables {
    tables: BTreeMap<String, GtfsTable>,
}

impl GtfsTables {
    pub fn new() -> Self {
        GtfsTables::default()
    }

    pub fn insert(&mut self, table: GtfsTable) {
        self.tables.insert(table.file_name.clone(), table);
    }

    pub fn get(&self, file_name: &str) -> Option<&GtfsTable> {
        self.tables.get(file_name)
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.tables.contains_key(file_name)
    }

    /// Rows of a table, or nothing when the file is absent.
    pub fn rows<'a>(&'a self, file_name: &str) -> impl Iterator<Item = GtfsRow<'a>> {
        self.tables
            .get(file_name)
            .into_iter()
            .flat_map(|table| table.rows())
    }

    pub fn row_count(&self, file_name: &str) -> usize {
        self.tables.get(file_name).map_or(0, |table| table.len())
    }
}
