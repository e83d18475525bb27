// Page-based I/O layer between the B+ tree and the filesystem.
//
// The pager reads and writes fixed-size pages and keeps every page touched
// during the connection's lifetime in an in-memory cache. Pages are never
// evicted: the tree hands out positions into cached page images, so an image
// must stay put until the connection closes. The cache is capped instead,
// and running past the cap is a fatal condition.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{DbError, Result};
use crate::node::PAGE_SIZE;

/// Hard ceiling on the number of cached pages (and therefore on database
/// size: the file can never outgrow what the cache can hold).
pub const MAX_PAGES: u32 = 100;

/// A single cached database page.
pub struct Page {
    /// Raw page image, always `PAGE_SIZE` bytes.
    pub data: Vec<u8>,
    /// Whether this page has been modified since it was loaded.
    pub dirty: bool,
}

impl Page {
    fn new() -> Self {
        Self {
            data: vec![0u8; PAGE_SIZE],
            dirty: false,
        }
    }
}

/// The pager owns the database file and the page cache.
pub struct Pager {
    file: File,
    /// Number of pages in the database, counting pages that have been
    /// allocated but not yet flushed.
    num_pages: u32,
    /// Cached page images, keyed by page number (0-based).
    pages: HashMap<u32, Page>,
}

impl Pager {
    /// Open a database file, creating it if absent. The file length must be
    /// an exact multiple of the page size.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let file_len = file.metadata()?.len();
        if file_len % PAGE_SIZE as u64 != 0 {
            return Err(DbError::Corrupt(format!(
                "database file length {file_len} is not a multiple of the page size"
            )));
        }

        Ok(Self {
            file,
            num_pages: (file_len / PAGE_SIZE as u64) as u32,
            pages: HashMap::new(),
        })
    }

    /// Number of pages in the database.
    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    /// Page number a new allocation will receive. Allocation is append-only;
    /// pages are never freed.
    pub fn unused_page_num(&self) -> u32 {
        self.num_pages
    }

    /// Fetch a page for reading.
    pub fn get_page(&mut self, page_num: u32) -> Result<&Page> {
        self.ensure_cached(page_num)?;
        Ok(self.pages.get(&page_num).unwrap())
    }

    /// Fetch a page for writing (marks it dirty). Requesting the first page
    /// past the end of the database allocates it, zero-filled.
    pub fn get_page_mut(&mut self, page_num: u32) -> Result<&mut Page> {
        self.ensure_cached(page_num)?;
        let page = self.pages.get_mut(&page_num).unwrap();
        page.dirty = true;
        Ok(page)
    }

    fn ensure_cached(&mut self, page_num: u32) -> Result<()> {
        if page_num >= MAX_PAGES {
            return Err(DbError::PageOutOfBounds(page_num, MAX_PAGES));
        }
        if self.pages.contains_key(&page_num) {
            return Ok(());
        }

        let mut page = Page::new();
        if page_num < self.num_pages {
            self.file
                .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
            self.file.read_exact(&mut page.data)?;
        } else {
            // Fresh allocation: the image stays zeroed and the file grows
            // when the page is flushed.
            self.num_pages = page_num + 1;
        }
        self.pages.insert(page_num, page);
        Ok(())
    }

    /// Write the cached image of one page back to disk.
    pub fn flush_page(&mut self, page_num: u32) -> Result<()> {
        if let Some(page) = self.pages.get_mut(&page_num) {
            self.file
                .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
            self.file.write_all(&page.data)?;
            page.dirty = false;
        }
        Ok(())
    }

    /// Write all dirty pages to disk and sync the file.
    pub fn flush_all(&mut self) -> Result<()> {
        let mut dirty: Vec<u32> = self
            .pages
            .iter()
            .filter(|(_, p)| p.dirty)
            .map(|(&n, _)| n)
            .collect();
        dirty.sort_unstable();

        for page_num in dirty {
            self.flush_page(page_num)?;
        }
        self.file.sync_all()?;
        Ok(())
    }
}
