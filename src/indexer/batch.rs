use crate::config::read_var;
use crate::indexer::extract::{CallerRef, ExtractedFile};
use crate::indexer::parser::Language;

/// Configuration for batch writing operations
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum number of files to collect before flushing (default: 100)
    pub batch_size: usize,
    /// Maximum number of buffered symbols before flushing (default: 50 000)
    pub max_buffered_symbols: usize,
    /// Batches with at least this many files run in bulk mode (default: 8)
    pub bulk_threshold: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        let mut config = Self {
            batch_size: 100,
            max_buffered_symbols: 50_000,
            bulk_threshold: 8,
        };
        read_var("SYMGRAPH_BATCH_SIZE", &mut config.batch_size);
        read_var("SYMGRAPH_MAX_BUFFERED_SYMBOLS", &mut config.max_buffered_symbols);
        read_var("SYMGRAPH_BULK_THRESHOLD", &mut config.bulk_threshold);
        config.batch_size = config.batch_size.max(1);
        config.max_buffered_symbols = config.max_buffered_symbols.max(1);
        config
    }
}

/// An extracted file waiting for its symbols to be written.
#[derive(Debug, Clone)]
pub struct BufferedFile {
    pub file: ExtractedFile,
    pub language: Language,
    pub fingerprint: String,
    /// Batch-global provisional index of this file's first symbol.
    pub offset: usize,
}

/// Collects extracted files and decides when to flush them.
///
/// Every file added is rebased so its provisional caller ids index into
/// one batch-wide symbol sequence. The sequence keeps growing across
/// flushes; only the pending buffer is reset by [`BatchWriter::take`].
pub struct BatchWriter {
    pending: Vec<BufferedFile>,
    config: BatchConfig,
    buffered_symbols: usize,
    next_offset: usize,
}

impl BatchWriter {
    pub fn new(config: BatchConfig) -> Self {
        Self {
            pending: Vec::new(),
            config,
            buffered_symbols: 0,
            next_offset: 0,
        }
    }

    /// Rebases `file` behind everything added so far and buffers it.
    pub fn add(&mut self, mut file: ExtractedFile, language: Language, fingerprint: String) {
        let offset = self.next_offset;
        file.rebase(offset);
        self.next_offset += file.symbols.len();
        self.buffered_symbols += file.symbols.len();
        self.pending.push(BufferedFile {
            file,
            language,
            fingerprint,
            offset,
        });
    }

    pub fn should_flush(&self) -> bool {
        if self.pending.is_empty() {
            return false;
        }
        self.pending.len() >= self.config.batch_size
            || self.buffered_symbols >= self.config.max_buffered_symbols
    }

    pub fn take(&mut self) -> Vec<BufferedFile> {
        self.buffered_symbols = 0;
        std::mem::take(&mut self.pending)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Batch-global provisional index → row id, filled in as flushes land.
#[derive(Debug, Default)]
pub struct ProvisionalMap {
    ids: Vec<Option<i64>>,
}

impl ProvisionalMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, offset: usize, row_ids: &[i64]) {
        let end = offset + row_ids.len();
        if self.ids.len() < end {
            self.ids.resize(end, None);
        }
        for (slot, id) in self.ids[offset..end].iter_mut().zip(row_ids) {
            *slot = Some(*id);
        }
    }

    pub fn get(&self, provisional: usize) -> Option<i64> {
        self.ids.get(provisional).copied().flatten()
    }

    /// Persisted when the slot was assigned, unchanged otherwise.
    pub fn translate(&self, caller: CallerRef) -> CallerRef {
        match caller {
            CallerRef::Provisional(local) => self
                .get(local)
                .map(CallerRef::Persisted)
                .unwrap_or(caller),
            persisted => persisted,
        }
    }
}
