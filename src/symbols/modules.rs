// fptrap/src/symbols/modules.rs

//! Loaded-module discovery and debug-file lookup.

use std::ffi::{CStr, OsStr};
use std::ops::Range;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use object::Object;

use super::line_table::LineTable;
use crate::trap::SymbolError;

const DEBUG_ROOT: &str = "/usr/lib/debug";

/// An ELF object mapped into this process.
#[derive(Debug, Clone)]
pub struct LoadedModule {
    pub path: PathBuf,
    /// Difference between runtime and link-time addresses.
    pub bias: u64,
    /// Runtime address ranges of the executable segments.
    pub exec_ranges: Vec<Range<u64>>,
    pub is_main: bool,
}

impl LoadedModule {
    pub fn contains(&self, address: u64) -> bool {
        self.exec_ranges.iter().any(|range| range.contains(&address))
    }
}

/// Lists the modules currently mapped, main executable first.
///
/// # Returns
///
/// One entry per file-backed `dl_iterate_phdr` object, with its load bias
/// and runtime code ranges. Not async-signal-safe.
pub fn loaded_modules() -> Vec<LoadedModule> {
    let mut modules: Vec<LoadedModule> = Vec::new();
    unsafe {
        libc::dl_iterate_phdr(
            Some(collect_module),
            &mut modules as *mut Vec<LoadedModule> as *mut libc::c_void,
        );
    }
    modules
}

/// # Safety
///
/// Only for use as the `dl_iterate_phdr` callback in [`loaded_modules`];
/// `data` must point to a live `Vec<LoadedModule>`.
unsafe extern "C" fn collect_module(
    info: *mut libc::dl_phdr_info,
    _size: libc::size_t,
    data: *mut libc::c_void,
) -> libc::c_int {
    let modules = &mut *(data as *mut Vec<LoadedModule>);
    let info = &*info;

    // The first entry is always the main program and has an empty name.
    let is_main = modules.is_empty();
    let name = if info.dlpi_name.is_null() {
        &[][..]
    } else {
        CStr::from_ptr(info.dlpi_name).to_bytes()
    };
    let path = if !name.is_empty() {
        PathBuf::from(OsStr::from_bytes(name))
    } else if is_main {
        std::fs::read_link("/proc/self/exe").unwrap_or_else(|_| PathBuf::from("/proc/self/exe"))
    } else {
        // vDSO and other anonymous objects carry no debug info.
        return 0;
    };

    let bias = info.dlpi_addr as u64;
    let phdrs = if info.dlpi_phdr.is_null() {
        &[][..]
    } else {
        std::slice::from_raw_parts(info.dlpi_phdr, info.dlpi_phnum as usize)
    };
    let exec_ranges = phdrs
        .iter()
        .filter(|ph| ph.p_type == libc::PT_LOAD && ph.p_flags & libc::PF_X != 0)
        .map(|ph| {
            let start = bias.wrapping_add(ph.p_vaddr as u64);
            start..start.wrapping_add(ph.p_memsz as u64)
        })
        .collect();

    modules.push(LoadedModule {
        path,
        bias,
        exec_ranges,
        is_main,
    });
    0
}

/// Reads the object file holding line information for `module`: the module
/// itself, or a separate debug file found via build-id or `.gnu_debuglink`.
///
/// # Arguments
///
/// * `path` - The module's file on disk.
/// * `max_bytes` - Candidates larger than this are skipped unread.
///
/// # Returns
///
/// `Ok(None)` when no candidate has a `.debug_line` section.
pub fn debug_object(path: &Path, max_bytes: u64) -> Result<Option<Vec<u8>>, SymbolError> {
    let Some(data) = read_limited(path, max_bytes)? else {
        return Ok(None);
    };
    if LineTable::has_line_info(&data)? {
        return Ok(Some(data));
    }

    for candidate in separate_debug_candidates(path, &data)? {
        match read_limited(&candidate, max_bytes) {
            Ok(Some(debug)) if LineTable::has_line_info(&debug).unwrap_or(false) => {
                tracing::debug!(module = %path.display(), debug_file = %candidate.display(), "using separate debug file");
                return Ok(Some(debug));
            }
            _ => continue,
        }
    }
    Ok(None)
}

fn separate_debug_candidates(path: &Path, data: &[u8]) -> Result<Vec<PathBuf>, SymbolError> {
    let file = object::File::parse(data)?;
    let mut candidates = Vec::new();

    if let Ok(Some(build_id)) = file.build_id() {
        if let Some(candidate) = build_id_path(build_id) {
            candidates.push(candidate);
        }
    }

    if let Ok(Some((name, _crc))) = file.gnu_debuglink() {
        let name = Path::new(OsStr::from_bytes(name));
        let dir = path.parent().unwrap_or_else(|| Path::new("/"));
        candidates.push(dir.join(name));
        candidates.push(dir.join(".debug").join(name));
        let relative = dir.strip_prefix("/").unwrap_or(dir);
        candidates.push(Path::new(DEBUG_ROOT).join(relative).join(name));
    }

    Ok(candidates)
}

/// `/usr/lib/debug/.build-id/ab/cdef....debug`
fn build_id_path(build_id: &[u8]) -> Option<PathBuf> {
    let (first, rest) = build_id.split_first()?;
    if rest.is_empty() {
        return None;
    }
    let rest: String = rest.iter().map(|b| format!("{b:02x}")).collect();
    Some(
        Path::new(DEBUG_ROOT)
            .join(".build-id")
            .join(format!("{first:02x}"))
            .join(format!("{rest}.debug")),
    )
}

fn read_limited(path: &Path, max_bytes: u64) -> Result<Option<Vec<u8>>, SymbolError> {
    let io_err = |source| SymbolError::Io {
        path: path.to_path_buf(),
        source,
    };
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(e)),
    };
    if metadata.len() > max_bytes {
        tracing::debug!(module = %path.display(), size = metadata.len(), "skipping oversized object");
        return Ok(None);
    }
    std::fs::read(path).map(Some).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_program_comes_first() {
        let modules = loaded_modules();
        let main = modules.first().expect("main program is always listed");
        assert!(main.is_main);
        assert!(!main.exec_ranges.is_empty());
        assert_eq!(modules.iter().filter(|m| m.is_main).count(), 1);
    }

    #[test]
    fn main_program_contains_its_own_code() {
        let here = main_program_contains_its_own_code as usize as u64;
        let owner = loaded_modules()
            .into_iter()
            .find(|m| m.contains(here))
            .expect("test code is mapped");
        assert!(owner.is_main);
    }

    #[test]
    fn build_id_layout() {
        let path = build_id_path(&[0xab, 0xcd, 0xef, 0x01]).unwrap();
        assert_eq!(path, PathBuf::from("/usr/lib/debug/.build-id/ab/cdef01.debug"));
        assert_eq!(build_id_path(&[0xab]), None);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let result = debug_object(Path::new("/nonexistent/fptrap/module.so"), u64::MAX);
        assert!(matches!(result, Ok(None)));
    }
}
