// fptrap/src/symbols/mod.rs

//! # Location Resolver
//!
//! Maps absolute instruction addresses to `file:line` using DWARF line tables
//! that are read and flattened once, when the library attaches. After that
//! the tables are only read, so concurrent faults on different threads can
//! resolve without synchronization.

mod line_table;
mod modules;

pub use self::line_table::LineTable;
pub use self::modules::{debug_object, loaded_modules, LoadedModule};

use crate::config::SymbolScope;
use crate::trap::{LocationResolver, SourceLocation};

struct IndexedModule {
    module: LoadedModule,
    table: Option<LineTable>,
}

/// Line tables for the modules mapped at attach time.
#[derive(Default)]
pub struct Symbolizer {
    modules: Vec<IndexedModule>,
}

impl Symbolizer {
    /// A resolver that never resolves anything.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Indexes the currently loaded modules selected by `scope`. Modules
    /// whose object file exceeds `max_bytes` are kept but left unindexed.
    pub fn load(scope: SymbolScope, max_bytes: u64) -> Self {
        if scope == SymbolScope::None {
            return Self::empty();
        }

        let own_code = Symbolizer::load as *const () as usize as u64;
        let mut modules = Vec::new();
        for module in loaded_modules() {
            if module.contains(own_code) && !module.is_main {
                continue;
            }
            if scope == SymbolScope::Main && !module.is_main {
                continue;
            }
            let table = Self::index(&module, max_bytes);
            modules.push(IndexedModule { module, table });
        }

        let indexed = modules.iter().filter(|m| m.table.is_some()).count();
        tracing::debug!(modules = modules.len(), indexed, "line tables loaded");
        Self { modules }
    }

    fn index(module: &LoadedModule, max_bytes: u64) -> Option<LineTable> {
        let data = match debug_object(&module.path, max_bytes) {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(module = %module.path.display(), "no line information");
                return None;
            }
            Err(e) => {
                tracing::debug!(module = %module.path.display(), error = %e, "cannot read debug information");
                return None;
            }
        };
        match LineTable::from_object(&data) {
            Ok(table) if !table.is_empty() => {
                tracing::debug!(module = %module.path.display(), rows = table.len(), "indexed line table");
                Some(table)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(module = %module.path.display(), error = %e, "failed to index line table");
                None
            }
        }
    }

    /// Translates `address` to a module-relative offset and looks it up.
    pub fn resolve(&self, address: usize) -> Option<SourceLocation<'_>> {
        let address = address as u64;
        let indexed = self.modules.iter().find(|m| m.module.contains(address))?;
        let table = indexed.table.as_ref()?;
        table.lookup(address.wrapping_sub(indexed.module.bias))
    }

    /// Number of modules with a usable line table.
    pub fn indexed_modules(&self) -> usize {
        self.modules.iter().filter(|m| m.table.is_some()).count()
    }
}

impl LocationResolver for Symbolizer {
    fn resolve(&self, address: usize) -> Option<SourceLocation<'_>> {
        Symbolizer::resolve(self, address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[inline(never)]
    fn marker() -> u32 {
        std::hint::black_box(7)
    }

    #[test]
    fn resolves_own_test_code() {
        let symbolizer = Symbolizer::load(SymbolScope::Main, u64::MAX);
        if symbolizer.indexed_modules() == 0 {
            // Built without debug information.
            return;
        }
        let location = symbolizer
            .resolve(marker as usize)
            .expect("test binary has line info for its own functions");
        assert!(location.file.ends_with(".rs"), "{location}");
        assert!(location.line > 0);
    }

    #[test]
    fn address_outside_every_module_is_unresolved() {
        let symbolizer = Symbolizer::load(SymbolScope::Main, u64::MAX);
        assert_eq!(symbolizer.resolve(0x10), None);
        assert_eq!(symbolizer.resolve(usize::MAX - 16), None);
    }

    #[test]
    fn none_scope_indexes_nothing() {
        let symbolizer = Symbolizer::load(SymbolScope::None, u64::MAX);
        assert_eq!(symbolizer.indexed_modules(), 0);
        assert_eq!(symbolizer.resolve(marker as usize), None);
    }
}
