// Disk-resident B+ tree.
//
// The tree stores unique u32 keys with inline row payloads in the leaves.
// Parent and child links are page numbers, never references; the pager is
// the single owner of page buffers, and node writes that touch two pages at
// once work on cloned images that are written back afterwards.

use std::io::Write;
use std::path::Path;

use crate::error::{DbError, Result};
use crate::node::{self, NodeType, LEAF_NODE_LEFT_SPLIT_COUNT, LEAF_NODE_MAX_CELLS, PAGE_SIZE};
use crate::pager::Pager;
use crate::row::Row;

/// A database connection: the pager plus the tree rooted at page 0.
///
/// The root never moves. When it splits, its old body is copied out to a
/// freshly allocated page and page 0 is rewritten as the new internal root,
/// so reopening the file always finds the tree at the same place.
pub struct Table {
    pager: Pager,
    root_page_num: u32,
}

/// A position within the tree: a leaf page plus a cell index in it.
#[derive(Debug, Clone, Copy)]
pub struct Cursor {
    pub page_num: u32,
    pub cell_num: usize,
    pub end_of_table: bool,
}

impl Table {
    /// Open a database file. An empty file gets page 0 initialized as an
    /// empty leaf root.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Table> {
        let mut pager = Pager::open(path)?;
        if pager.num_pages() == 0 {
            let root = pager.get_page_mut(0)?;
            node::initialize_leaf_node(&mut root.data);
            node::set_is_root(&mut root.data, true);
        }
        Ok(Table {
            pager,
            root_page_num: 0,
        })
    }

    /// Insert a row under `key`. Fails with `DbError::DuplicateKey`, leaving
    /// the tree untouched, if the key is already present.
    pub fn insert(&mut self, key: u32, row: &Row) -> Result<()> {
        let cursor = self.find(key)?;

        let page = self.pager.get_page(cursor.page_num)?;
        let num_cells = node::leaf_node_num_cells(&page.data) as usize;
        if cursor.cell_num < num_cells && node::leaf_node_key(&page.data, cursor.cell_num) == key {
            return Err(DbError::DuplicateKey);
        }

        self.leaf_node_insert(&cursor, key, row)
    }

    /// Collect every row in ascending key order.
    pub fn select_all(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        let mut cursor = self.cursor_start()?;
        while !cursor.end_of_table {
            rows.push(cursor.row(self)?);
            cursor.advance(self)?;
        }
        Ok(rows)
    }

    /// Flush every cached page to disk.
    pub fn close(&mut self) -> Result<()> {
        self.pager.flush_all()
    }

    /// Position a cursor at the first cell of the leftmost leaf.
    pub fn cursor_start(&mut self) -> Result<Cursor> {
        let mut page_num = self.root_page_num;
        loop {
            let page = self.pager.get_page(page_num)?;
            match node::node_type(&page.data)? {
                NodeType::Leaf => {
                    let num_cells = node::leaf_node_num_cells(&page.data);
                    return Ok(Cursor {
                        page_num,
                        cell_num: 0,
                        end_of_table: num_cells == 0,
                    });
                }
                NodeType::Internal => page_num = node::internal_node_child(&page.data, 0),
            }
        }
    }

    /// Position a cursor at `key`, or at the slot where `key` would be
    /// inserted. The cursor is an insertion point, not an iterator start.
    pub fn find(&mut self, key: u32) -> Result<Cursor> {
        let mut page_num = self.root_page_num;
        loop {
            let page = self.pager.get_page(page_num)?;
            match node::node_type(&page.data)? {
                NodeType::Leaf => {
                    return Ok(Cursor {
                        page_num,
                        cell_num: node::leaf_node_find(&page.data, key),
                        end_of_table: false,
                    });
                }
                NodeType::Internal => {
                    let child_index = node::internal_node_find_child(&page.data, key);
                    page_num = node::internal_node_child(&page.data, child_index);
                }
            }
        }
    }

    /// Pre-order dump of the tree structure.
    pub fn print_tree<W: Write>(&mut self, out: &mut W) -> Result<()> {
        self.print_node(self.root_page_num, 0, out)
    }

    fn print_node<W: Write>(&mut self, page_num: u32, level: usize, out: &mut W) -> Result<()> {
        let data = self.pager.get_page(page_num)?.data.clone();
        let pad = "  ".repeat(level);
        match node::node_type(&data)? {
            NodeType::Leaf => {
                let num_cells = node::leaf_node_num_cells(&data) as usize;
                writeln!(out, "{pad}leaf (size {num_cells})")?;
                for i in 0..num_cells {
                    writeln!(out, "{pad}  - {i} : {}", node::leaf_node_key(&data, i))?;
                }
            }
            NodeType::Internal => {
                let num_keys = node::internal_node_num_keys(&data) as usize;
                writeln!(out, "{pad}- internal (size {num_keys})")?;
                for i in 0..num_keys {
                    writeln!(out, "{pad}  - key {}", node::internal_node_key(&data, i))?;
                    self.print_node(node::internal_node_child(&data, i), level + 1, out)?;
                }
                self.print_node(node::internal_node_right_child(&data), level + 1, out)?;
            }
        }
        Ok(())
    }

    fn leaf_node_insert(&mut self, cursor: &Cursor, key: u32, row: &Row) -> Result<()> {
        let page = self.pager.get_page_mut(cursor.page_num)?;
        let num_cells = node::leaf_node_num_cells(&page.data) as usize;
        if num_cells >= LEAF_NODE_MAX_CELLS {
            return self.leaf_node_split_and_insert(cursor, key, row);
        }

        // Shift cells right to open the slot at the insertion point.
        for i in ((cursor.cell_num + 1)..=num_cells).rev() {
            node::move_leaf_node_cell(&mut page.data, i - 1, i);
        }
        node::set_leaf_node_num_cells(&mut page.data, (num_cells + 1) as u32);
        node::set_leaf_node_key(&mut page.data, cursor.cell_num, key);
        row.serialize(node::leaf_node_value_mut(&mut page.data, cursor.cell_num));
        Ok(())
    }

    /// Split a full leaf around the incoming cell: the lower seven of the
    /// fourteen virtual cells stay in place, the upper seven move to a new
    /// right sibling, and the separator propagates to the parent.
    fn leaf_node_split_and_insert(&mut self, cursor: &Cursor, key: u32, row: &Row) -> Result<()> {
        let new_page_num = self.pager.unused_page_num();
        let old_data = self.pager.get_page(cursor.page_num)?.data.clone();
        let old_max = node::node_max_key(&old_data)?;
        let parent_page_num = node::node_parent(&old_data);
        let was_root = node::is_root(&old_data);

        let mut left = old_data.clone();
        let mut right = vec![0u8; PAGE_SIZE];
        node::initialize_leaf_node(&mut right);
        node::set_node_parent(&mut right, parent_page_num);

        for i in (0..=LEAF_NODE_MAX_CELLS).rev() {
            let dest = if i >= LEAF_NODE_LEFT_SPLIT_COUNT {
                &mut right
            } else {
                &mut left
            };
            let index_within = i % LEAF_NODE_LEFT_SPLIT_COUNT;
            if i == cursor.cell_num {
                node::set_leaf_node_key(dest, index_within, key);
                row.serialize(node::leaf_node_value_mut(dest, index_within));
            } else if i > cursor.cell_num {
                node::copy_leaf_node_cell(&old_data, i - 1, dest, index_within);
            } else {
                node::copy_leaf_node_cell(&old_data, i, dest, index_within);
            }
        }
        node::set_leaf_node_num_cells(&mut left, LEAF_NODE_LEFT_SPLIT_COUNT as u32);
        node::set_leaf_node_num_cells(&mut right, node::LEAF_NODE_RIGHT_SPLIT_COUNT as u32);

        self.pager.get_page_mut(cursor.page_num)?.data = left;
        self.pager.get_page_mut(new_page_num)?.data = right;

        if was_root {
            self.create_new_root(new_page_num)
        } else {
            let new_left_max = node::node_max_key(&self.pager.get_page(cursor.page_num)?.data)?;
            self.update_internal_node_key(parent_page_num, old_max, new_left_max)?;
            self.internal_node_insert(parent_page_num, new_page_num)
        }
    }

    /// Turn the root into an internal node over two children. The old root
    /// body moves to a fresh page so the root page number stays stable.
    fn create_new_root(&mut self, right_child_page_num: u32) -> Result<()> {
        let left_child_page_num = self.pager.unused_page_num();
        let old_root = self.pager.get_page(self.root_page_num)?.data.clone();

        let mut left = old_root;
        node::set_is_root(&mut left, false);
        node::set_node_parent(&mut left, self.root_page_num);
        let left_max = node::node_max_key(&left)?;

        let mut root = vec![0u8; PAGE_SIZE];
        node::initialize_internal_node(&mut root);
        node::set_is_root(&mut root, true);
        node::set_internal_node_num_keys(&mut root, 1);
        node::set_internal_node_child(&mut root, 0, left_child_page_num);
        node::set_internal_node_key(&mut root, 0, left_max);
        node::set_internal_node_right_child(&mut root, right_child_page_num);

        self.pager.get_page_mut(left_child_page_num)?.data = left;
        self.pager.get_page_mut(self.root_page_num)?.data = root;

        let right = self.pager.get_page_mut(right_child_page_num)?;
        node::set_node_parent(&mut right.data, self.root_page_num);
        Ok(())
    }

    /// Replace a stale separator after the left half of a split shrank. No
    /// update is needed when the split node was the right child: its old
    /// maximum was never a separator.
    fn update_internal_node_key(&mut self, page_num: u32, old_key: u32, new_key: u32) -> Result<()> {
        let page = self.pager.get_page_mut(page_num)?;
        let num_keys = node::internal_node_num_keys(&page.data) as usize;
        let old_child_index = node::internal_node_find_child(&page.data, old_key);
        if old_child_index < num_keys {
            node::set_internal_node_key(&mut page.data, old_child_index, new_key);
        }
        Ok(())
    }

    /// Add a freshly split-off child to its parent, keyed by the child's
    /// maximum. Splitting the parent itself is not implemented; the page
    /// cache cap is reached long before an internal node can fill.
    fn internal_node_insert(&mut self, parent_page_num: u32, child_page_num: u32) -> Result<()> {
        let child_max_key = node::node_max_key(&self.pager.get_page(child_page_num)?.data)?;

        let parent = self.pager.get_page(parent_page_num)?;
        let index = node::internal_node_find_child(&parent.data, child_max_key);
        let original_num_keys = node::internal_node_num_keys(&parent.data) as usize;
        let right_child_page_num = node::internal_node_right_child(&parent.data);

        if original_num_keys >= node::INTERNAL_NODE_MAX_CELLS {
            return Err(DbError::InternalNodeSplit);
        }

        let right_child_max =
            node::node_max_key(&self.pager.get_page(right_child_page_num)?.data)?;

        let parent = self.pager.get_page_mut(parent_page_num)?;
        node::set_internal_node_num_keys(&mut parent.data, (original_num_keys + 1) as u32);
        if child_max_key > right_child_max {
            // The new child holds the largest keys: it becomes the right
            // child and the old right child gets a regular cell.
            node::set_internal_node_child(&mut parent.data, original_num_keys, right_child_page_num);
            node::set_internal_node_key(&mut parent.data, original_num_keys, right_child_max);
            node::set_internal_node_right_child(&mut parent.data, child_page_num);
        } else {
            for i in ((index + 1)..=original_num_keys).rev() {
                node::move_internal_node_cell(&mut parent.data, i - 1, i);
            }
            node::set_internal_node_child(&mut parent.data, index, child_page_num);
            node::set_internal_node_key(&mut parent.data, index, child_max_key);
        }
        Ok(())
    }

    /// Leftmost leaf of the subtree rooted at `page_num`.
    fn leftmost_leaf(&mut self, mut page_num: u32) -> Result<u32> {
        loop {
            let page = self.pager.get_page(page_num)?;
            match node::node_type(&page.data)? {
                NodeType::Leaf => return Ok(page_num),
                NodeType::Internal => page_num = node::internal_node_child(&page.data, 0),
            }
        }
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        // Errors on the drop path have nowhere to go; `close` reports them.
        let _ = self.pager.flush_all();
    }
}

impl Cursor {
    /// Materialize the row under the cursor.
    pub fn row(&self, table: &mut Table) -> Result<Row> {
        let page = table.pager.get_page(self.page_num)?;
        Ok(Row::deserialize(node::leaf_node_value(
            &page.data,
            self.cell_num,
        )))
    }

    /// Key of the cell under the cursor.
    pub fn key(&self, table: &mut Table) -> Result<u32> {
        let page = table.pager.get_page(self.page_num)?;
        Ok(node::leaf_node_key(&page.data, self.cell_num))
    }

    /// Step to the next cell in key order. Leaves carry no sibling pointer,
    /// so at the end of a leaf the cursor climbs parent links until an
    /// ancestor has a subtree to the right, then descends to its leftmost
    /// leaf.
    pub fn advance(&mut self, table: &mut Table) -> Result<()> {
        let page = table.pager.get_page(self.page_num)?;
        let num_cells = node::leaf_node_num_cells(&page.data) as usize;
        self.cell_num += 1;
        if self.cell_num < num_cells {
            return Ok(());
        }

        let mut child_page_num = self.page_num;
        loop {
            let child = table.pager.get_page(child_page_num)?;
            if node::is_root(&child.data) {
                self.end_of_table = true;
                return Ok(());
            }
            let parent_page_num = node::node_parent(&child.data);

            let parent = table.pager.get_page(parent_page_num)?;
            let num_keys = node::internal_node_num_keys(&parent.data) as usize;
            let child_index = node::internal_node_child_index(&parent.data, child_page_num)?;
            if child_index < num_keys {
                let sibling = node::internal_node_child(&parent.data, child_index + 1);
                self.page_num = table.leftmost_leaf(sibling)?;
                self.cell_num = 0;
                return Ok(());
            }
            // Already the right child at this level; keep climbing.
            child_page_num = parent_page_num;
        }
    }
}
