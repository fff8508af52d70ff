// fptrap/src/symbols/line_table.rs

//! Flattened DWARF line tables.
//!
//! Every line-program row of an object file is copied into one sorted array at
//! load time. Lookups are a binary search over that array and never allocate.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::PathBuf;

use object::{Object, ObjectSection};

use crate::trap::{SourceLocation, SymbolError};

/// File index marking the end of a contiguous sequence.
const END_OF_SEQUENCE: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Row {
    address: u64,
    file: u32,
    line: u32,
}

impl Row {
    fn is_end(&self) -> bool {
        self.file == END_OF_SEQUENCE
    }
}

/// Address-to-line mapping for one module, in link-time addresses.
#[derive(Debug, Default)]
pub struct LineTable {
    rows: Vec<Row>,
    files: Vec<String>,
}

impl LineTable {
    /// Whether `data` carries a non-empty `.debug_line` section.
    pub fn has_line_info(data: &[u8]) -> Result<bool, SymbolError> {
        let file = object::File::parse(data)?;
        Ok(file
            .section_by_name(".debug_line")
            .is_some_and(|section| section.size() > 0))
    }

    /// Builds the table from an ELF image containing DWARF.
    pub fn from_object(data: &[u8]) -> Result<Self, SymbolError> {
        let file = object::File::parse(data)?;
        let endian = if file.is_little_endian() {
            gimli::RunTimeEndian::Little
        } else {
            gimli::RunTimeEndian::Big
        };

        let load_section = |id: gimli::SectionId| -> Result<Cow<[u8]>, gimli::Error> {
            Ok(match file.section_by_name(id.name()) {
                Some(section) => section
                    .uncompressed_data()
                    .unwrap_or(Cow::Borrowed(&[][..])),
                None => Cow::Borrowed(&[][..]),
            })
        };
        let sections = gimli::Dwarf::load(&load_section)?;
        let borrow_section: &dyn for<'a> Fn(
            &'a Cow<[u8]>,
        ) -> gimli::EndianSlice<'a, gimli::RunTimeEndian> =
            &|section| gimli::EndianSlice::new(section, endian);
        let dwarf = sections.borrow(&borrow_section);

        let mut builder = Builder::default();
        let mut units = dwarf.units();
        while let Some(header) = units.next()? {
            let unit = dwarf.unit(header)?;
            let Some(program) = unit.line_program.clone() else {
                continue;
            };
            let comp_dir = unit
                .comp_dir
                .as_ref()
                .map(|dir| PathBuf::from(dir.to_string_lossy().into_owned()))
                .unwrap_or_default();

            // Unit-local file index -> interned file id.
            let mut unit_files: HashMap<u64, u32> = HashMap::new();
            let mut sequence: Vec<Row> = Vec::new();
            let mut rows = program.rows();
            while let Some((header, row)) = rows.next_row()? {
                if row.end_sequence() {
                    builder.push_sequence(&mut sequence, row.address());
                    continue;
                }
                let line = row.line().map_or(0, |line| line.get()) as u32;
                let file_index = row.file_index();
                let file = match unit_files.get(&file_index) {
                    Some(&id) => id,
                    None => {
                        let mut path = comp_dir.clone();
                        if let Some(entry) = row.file(header) {
                            if entry.directory_index() != 0 {
                                if let Some(dir) = entry.directory(header) {
                                    path.push(dwarf.attr_string(&unit, dir)?.to_string_lossy().as_ref());
                                }
                            }
                            path.push(
                                dwarf
                                    .attr_string(&unit, entry.path_name())?
                                    .to_string_lossy()
                                    .as_ref(),
                            );
                        }
                        let id = builder.intern(path.to_string_lossy().into_owned());
                        unit_files.insert(file_index, id);
                        id
                    }
                };
                sequence.push(Row {
                    address: row.address(),
                    file,
                    line,
                });
            }
        }

        Ok(builder.finish())
    }

    /// Finds the row covering `address` (link-time address).
    pub fn lookup(&self, address: u64) -> Option<SourceLocation<'_>> {
        let next = self.rows.partition_point(|row| row.address <= address);
        let row = self.rows.get(next.checked_sub(1)?)?;
        if row.is_end() || row.line == 0 {
            return None;
        }
        let file = self.files.get(row.file as usize)?;
        Some(SourceLocation::new(file, row.line))
    }

    /// Number of address rows, sequence terminators included.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[cfg(test)]
    fn from_sequences(files: &[&str], sequences: &[(&[(u64, u32, u32)], u64)]) -> Self {
        let mut builder = Builder::default();
        for name in files {
            builder.intern(name.to_string());
        }
        for (rows, end) in sequences {
            let mut sequence = rows
                .iter()
                .map(|&(address, file, line)| Row { address, file, line })
                .collect();
            builder.push_sequence(&mut sequence, *end);
        }
        builder.finish()
    }
}

#[derive(Default)]
struct Builder {
    rows: Vec<Row>,
    files: Vec<String>,
    file_ids: HashMap<String, u32>,
}

impl Builder {
    fn intern(&mut self, path: String) -> u32 {
        if let Some(&id) = self.file_ids.get(&path) {
            return id;
        }
        let id = self.files.len() as u32;
        self.files.push(path.clone());
        self.file_ids.insert(path, id);
        id
    }

    /// Commits a finished sequence. Sequences starting at address 0 belong to
    /// code the linker discarded and would shadow real rows, so they are dropped.
    fn push_sequence(&mut self, sequence: &mut Vec<Row>, end: u64) {
        let starts_at_zero = sequence.first().map_or(true, |row| row.address == 0);
        if !starts_at_zero {
            self.rows.append(sequence);
            self.rows.push(Row {
                address: end,
                file: END_OF_SEQUENCE,
                line: 0,
            });
        }
        sequence.clear();
    }

    fn finish(mut self) -> LineTable {
        // At equal addresses a terminator sorts before the row that starts the
        // next sequence, so the lookup lands on the real row.
        self.rows.sort_by_key(|row| (row.address, !row.is_end()));
        LineTable {
            rows: self.rows,
            files: self.files,
        }
    }
}
