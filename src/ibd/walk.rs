use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use log::{debug, error, warn};
use serde_json::Value;

use crate::errors::{IbdError, Result};
use crate::ibd::page::{
    page_lsn_consistent, page_type, FilPageHeader, IndexPageHeader, PageTypes, FIL_NULL,
    FIL_PAGE_NEXT, PAGE_DIR, PAGE_DIR_SLOT_SIZE, PAGE_NEW_INFIMUM, PAGE_NEW_SUPREMUM_END,
};
use crate::ibd::record::{
    rec_next_offs, rec_status, Record, RecordStatus, REC_OFF_NEXT, REC_OFFS_DROP,
    REC_OFFS_EXTERNAL, REC_OFFS_MASK,
};
use crate::ibd::sdi::{self, validate_document, SdiDocument, BTR_EXTERN_LEN};
use crate::ibd::tabspace::Tablespace;
use crate::meta::def::{IndexDef, TableDef};
use crate::meta::mgr;
use crate::sdi::record::SdiObject;
use crate::util;

/// Space accounting of the records on one or more pages, split into leaf
/// and non-leaf sides.
#[derive(Debug, Default, Clone)]
pub struct PageStats {
    pub n_recs_non_leaf: u32,
    pub n_recs_leaf: u32,
    pub headers_len_non_leaf: u32,
    pub headers_len_leaf: u32,
    pub recs_len_non_leaf: u32,
    pub recs_len_leaf: u32,
    pub n_deleted_recs_non_leaf: u32,
    pub n_deleted_recs_leaf: u32,
    pub deleted_recs_len_non_leaf: u32,
    pub deleted_recs_len_leaf: u32,
    pub n_contain_dropped_cols_recs_non_leaf: u32,
    pub n_contain_dropped_cols_recs_leaf: u32,
    pub dropped_cols_len_non_leaf: u32,
    pub dropped_cols_len_leaf: u32,
    pub innodb_internal_used_non_leaf: u32,
    pub innodb_internal_used_leaf: u32,
    pub free_non_leaf: u32,
    pub free_leaf: u32,
}

impl PageStats {
    pub fn add(&mut self, other: &PageStats) {
        self.n_recs_non_leaf += other.n_recs_non_leaf;
        self.n_recs_leaf += other.n_recs_leaf;
        self.headers_len_non_leaf += other.headers_len_non_leaf;
        self.headers_len_leaf += other.headers_len_leaf;
        self.recs_len_non_leaf += other.recs_len_non_leaf;
        self.recs_len_leaf += other.recs_len_leaf;
        self.n_deleted_recs_non_leaf += other.n_deleted_recs_non_leaf;
        self.n_deleted_recs_leaf += other.n_deleted_recs_leaf;
        self.deleted_recs_len_non_leaf += other.deleted_recs_len_non_leaf;
        self.deleted_recs_len_leaf += other.deleted_recs_len_leaf;
        self.n_contain_dropped_cols_recs_non_leaf += other.n_contain_dropped_cols_recs_non_leaf;
        self.n_contain_dropped_cols_recs_leaf += other.n_contain_dropped_cols_recs_leaf;
        self.dropped_cols_len_non_leaf += other.dropped_cols_len_non_leaf;
        self.dropped_cols_len_leaf += other.dropped_cols_len_leaf;
        self.innodb_internal_used_non_leaf += other.innodb_internal_used_non_leaf;
        self.innodb_internal_used_leaf += other.innodb_internal_used_leaf;
        self.free_non_leaf += other.free_non_leaf;
        self.free_leaf += other.free_leaf;
    }
}

#[derive(Debug, Default, Clone)]
pub struct IndexStats {
    pub n_levels: u32,
    pub n_pages_non_leaf: u32,
    pub n_pages_leaf: u32,
    pub recs: PageStats,
}

/// One decoded field of a record, ready for rendering.
#[derive(Debug, Clone)]
pub struct FieldReport {
    pub name: String,
    pub utf8_type: String,
    pub field_type: String,
    pub se_type: String,
    pub len: u32,
    pub word: u32,
    pub bytes: Option<Bytes>,
    pub ext_len: Option<u32>,
    pub node_ptr: bool,
}

#[derive(Debug, Clone)]
pub struct RecordReport {
    pub row_no: u32,
    pub pos: usize,
    pub deleted: bool,
    pub header_len: u32,
    pub body_len: u32,
    pub header_bytes: Bytes,
    pub fields: Vec<FieldReport>,
}

#[derive(Debug)]
pub struct PageReport {
    pub page_no: u32,
    pub fil: FilPageHeader,
    pub hdr: IndexPageHeader,
    pub schema: String,
    pub table: String,
    pub index: String,
    pub row_format: String,
    pub leaf: bool,
    pub stats: PageStats,
    pub records: Vec<RecordReport>,
}

#[derive(Debug)]
pub struct IndexReport {
    pub index_name: String,
    pub index_id: u64,
    pub schema: String,
    pub table: String,
    pub root_page_no: u32,
    pub n_fields: u32,
    pub leftmost_pages: Vec<u32>,
    pub stats: IndexStats,
    pub physical_size: usize,
}

/// An inspection session: the open tablespace plus every table and index
/// recovered from its SDI, keyed by their engine-assigned ids.
#[derive(Debug)]
pub struct Inspector {
    pub space: Tablespace,
    pub documents: Vec<SdiDocument>,
    pub all_tables: Vec<Arc<TableDef>>,
    pub tables: BTreeMap<u64, Arc<TableDef>>,
    pub indexes: BTreeMap<u64, (Arc<TableDef>, usize)>,
}

impl Inspector {
    pub fn load(input: PathBuf) -> Result<Inspector> {
        let space = Tablespace::open(input)?;
        let documents = sdi::load_documents(&space)?;

        let mut loaded = Vec::new();
        for doc in &documents {
            let value: Value = serde_json::from_str(&doc.json).map_err(|e| {
                IbdError::CorruptSdi(format!("JSON parse error in SDI {}: {}", doc.sdi_id, e))
            })?;
            if !validate_document(&value) {
                return Err(IbdError::CorruptSdi(format!(
                    "SDI document {} has an invalid shape",
                    doc.sdi_id
                )));
            }
            if value.get("dd_object_type").and_then(Value::as_str) != Some("Table") {
                continue;
            }
            let obj: SdiObject = serde_json::from_value(value).map_err(|e| {
                IbdError::CorruptSdi(format!("SDI document {} mismatch: {}", doc.sdi_id, e))
            })?;
            match mgr::load_table(&obj) {
                Ok(table) => loaded.push(table),
                Err(e) => {
                    warn!(
                        "failed to recover table {} from SDI, skipping it: {}",
                        obj.dd_object.name, e
                    );
                }
            }
        }

        let mut inspector = Inspector {
            space,
            documents,
            all_tables: Vec::new(),
            tables: BTreeMap::new(),
            indexes: BTreeMap::new(),
        };
        for table in loaded {
            inspector.add_table(Arc::new(table));
        }
        Ok(inspector)
    }

    fn add_table(&mut self, table: Arc<TableDef>) {
        self.all_tables.push(table.clone());
        if !table.is_supported() {
            warn!(
                "skipping loading table '{}.{}', reason: '{}'",
                table.schema_ref,
                table.tab_name,
                table.unsupported_reason()
            );
            return;
        }
        self.tables.insert(table.ib_id, table.clone());
        for (i, idx) in table.idx_defs.iter().enumerate() {
            if !idx.is_supported() {
                warn!(
                    "skipping loading index '{}' of table '{}.{}', reason: '{}'",
                    idx.idx_name,
                    table.schema_ref,
                    table.tab_name,
                    idx.unsupported_reason()
                );
                continue;
            }
            self.indexes.insert(idx.ib_id, (table.clone(), i));
        }
    }

    pub fn get_index(&self, index_id: u64) -> Option<(&Arc<TableDef>, &IndexDef)> {
        self.indexes
            .get(&index_id)
            .map(|(table, i)| (table, &table.idx_defs[*i]))
    }

    /// Decode one INDEX page, fold its accounting into `aggr`, and return
    /// the structured report. Record detail is collected only on demand.
    pub fn parse_page(
        &self,
        page_no: u32,
        aggr: Option<&mut PageStats>,
        collect_records: bool,
    ) -> Result<PageReport> {
        let buf = self.space.read_page(page_no)?;
        if !page_lsn_consistent(&buf, self.space.logical_size) {
            return Err(IbdError::CorruptPage {
                page_no,
                reason: "the LSN on the page is inconsistent".into(),
            });
        }
        if page_type(&buf) != PageTypes::INDEX {
            return Err(IbdError::UnsupportedObject(format!(
                "page {} is a {} page, only INDEX pages can be parsed",
                page_no,
                page_type(&buf)
            )));
        }

        let fil = FilPageHeader::new(&buf);
        if fil.page_no != page_no {
            return Err(IbdError::CorruptPage {
                page_no,
                reason: "page number in the FIL header does not match".into(),
            });
        }
        let hdr = IndexPageHeader::new(&buf);

        let (table, index) = self.get_index(hdr.index_id).ok_or_else(|| {
            IbdError::UnsupportedObject(format!(
                "unable to find index {} in the loaded indexes",
                hdr.index_id
            ))
        })?;
        let table = table.as_ref();
        if !table.is_rec_parsing_supported() || !index.is_supported() {
            return Err(IbdError::UnsupportedObject(format!(
                "records of index {} cannot be parsed: {}{}",
                index.idx_name,
                table.unsupported_reason(),
                index.unsupported_reason()
            )));
        }

        let leaf = hdr.is_leaf();
        let mut stats = PageStats::default();
        let mut records = Vec::new();

        if hdr.n_recs > 0 {
            let mut rec_pos = Some(first_user_rec(&buf, self.space.physical_size, page_no)?);
            let mut row_no = 0u32;
            while let Some(pos) = rec_pos {
                row_no += 1;
                let mut rec = Record::new(&buf, pos, table, index);
                rec.compute_offsets()?;
                let report = Self::account_record(&rec, table, index, leaf, row_no, &mut stats);
                if collect_records {
                    records.push(report);
                }
                rec_pos = next_user_rec(&buf, pos, self.space.physical_size, page_no)?;
            }
            if row_no != hdr.n_recs as u32 {
                warn!(
                    "page {} declares {} records but {} were walked",
                    page_no, hdr.n_recs, row_no
                );
            }
        }

        let internal_used = PAGE_NEW_SUPREMUM_END as u32
            + if leaf {
                stats.headers_len_leaf
            } else {
                stats.headers_len_non_leaf
            }
            + hdr.n_dir_slots as u32 * PAGE_DIR_SLOT_SIZE as u32
            + 8;
        let free = hdr.garbage as u32 + self.space.logical_size as u32
            - PAGE_DIR as u32
            - hdr.n_dir_slots as u32 * PAGE_DIR_SLOT_SIZE as u32
            - hdr.heap_top as u32;
        if leaf {
            stats.innodb_internal_used_leaf = internal_used;
            stats.free_leaf = free;
        } else {
            stats.innodb_internal_used_non_leaf = internal_used;
            stats.free_non_leaf = free;
        }

        if let Some(aggr) = aggr {
            aggr.add(&stats);
        }

        Ok(PageReport {
            page_no,
            fil,
            hdr,
            schema: table.schema_ref.clone(),
            table: table.tab_name.clone(),
            index: index.idx_name.clone(),
            row_format: format!("{:?}", table.row_format),
            leaf,
            stats,
            records,
        })
    }

    fn account_record(
        rec: &Record,
        table: &TableDef,
        index: &IndexDef,
        leaf: bool,
        row_no: u32,
        stats: &mut PageStats,
    ) -> RecordReport {
        let header_len = rec.header_len();
        let body_len = rec.body_len();
        let deleted = rec.is_deleted();
        let n_fields = rec.n_fields();

        if !deleted {
            if leaf {
                stats.n_recs_leaf += 1;
                stats.headers_len_leaf += header_len;
                stats.recs_len_leaf += body_len;
            } else {
                stats.n_recs_non_leaf += 1;
                stats.headers_len_non_leaf += header_len;
                stats.recs_len_non_leaf += body_len;
            }
        } else if leaf {
            stats.n_deleted_recs_leaf += 1;
            stats.deleted_recs_len_leaf += header_len + body_len;
        } else {
            stats.n_deleted_recs_non_leaf += 1;
            stats.deleted_recs_len_non_leaf += header_len + body_len;
        }

        let mut fields = Vec::with_capacity(n_fields);
        let mut start_pos = 0u32;
        let mut dropped_column_counted = false;
        for i in 0..n_fields {
            let word = rec.field_word(i);
            let end_pos = word & REC_OFFS_MASK;
            let len = end_pos - start_pos;
            let node_ptr = !leaf && i == n_fields - 1;

            let (name, utf8_type, field_type, se_type, col_dropped) = if node_ptr {
                (
                    "*NODE_PTR(Child page no)".to_string(),
                    String::new(),
                    String::new(),
                    String::new(),
                    false,
                )
            } else {
                let col = &table.col_defs[index.physical_field(i).column_opx];
                (
                    col.col_name.clone(),
                    col.utf8_def.clone(),
                    col.field_type().to_string(),
                    col.mtype.to_string(),
                    col.is_instant_dropped(),
                )
            };

            // rows that still materialise bytes for a since-dropped column
            if col_dropped && !deleted && (word & REC_OFFS_DROP) == 0 {
                if leaf {
                    stats.dropped_cols_len_leaf += len;
                    if !dropped_column_counted {
                        stats.n_contain_dropped_cols_recs_leaf += 1;
                    }
                } else {
                    stats.dropped_cols_len_non_leaf += len;
                    if !dropped_column_counted {
                        stats.n_contain_dropped_cols_recs_non_leaf += 1;
                    }
                }
                dropped_column_counted = true;
            }

            let bytes = rec.field_bytes(i);
            let ext_len = if (word & REC_OFFS_EXTERNAL) != 0 && end_pos >= 20 {
                Some(util::u32_val(
                    rec.buf_ref(),
                    rec.pos + end_pos as usize - 20 + BTR_EXTERN_LEN + 4,
                ))
            } else {
                None
            };

            fields.push(FieldReport {
                name,
                utf8_type,
                field_type,
                se_type,
                len,
                word,
                bytes,
                ext_len,
                node_ptr,
            });
            start_pos = end_pos;
        }

        let header_start = rec.pos - header_len as usize;
        RecordReport {
            row_no,
            pos: rec.pos,
            deleted,
            header_len,
            body_len,
            header_bytes: rec.buf_ref().slice(header_start..rec.pos),
            fields,
        }
    }

    /// Leftmost page number of every level, root first.
    pub fn leftmost_pages(&self, table: &TableDef, index: &IndexDef) -> Result<Vec<u32>> {
        if !table.is_rec_parsing_supported() || !index.is_supported() {
            return Err(IbdError::UnsupportedObject(format!(
                "index {} cannot be traversed: {}{}",
                index.idx_name,
                table.unsupported_reason(),
                index.unsupported_reason()
            )));
        }

        let mut buf = self.space.read_page(index.ib_page)?;
        let mut pages = vec![index.ib_page];
        let mut level = IndexPageHeader::new(&buf).level;

        while level != 0 {
            let page_no = *pages.last().unwrap();
            let rec_pos = first_user_rec(&buf, self.space.physical_size, page_no)?;
            let mut rec = Record::new(&buf, rec_pos, table, index);
            rec.compute_offsets()?;
            let child_page_no = rec.child_page_no()?;

            buf = self.space.read_page(child_page_no)?;
            let child_level = IndexPageHeader::new(&buf).level;
            if child_level != level - 1 {
                return Err(IbdError::CorruptPage {
                    page_no: child_page_no,
                    reason: "page levels do not decrease by one on the descent".into(),
                });
            }
            pages.push(child_page_no);
            level = child_level;
        }
        Ok(pages)
    }

    /// Walk one whole index: descend to the leftmost leaf, then follow
    /// every level's sibling chain aggregating per-page statistics.
    pub fn parse_index(&self, index_id: u64) -> Result<IndexReport> {
        let (table, index) = self.get_index(index_id).ok_or_else(|| {
            IbdError::InvalidArgument(format!("no index with id {} was found", index_id))
        })?;
        self.parse_index_of(table.as_ref(), index)
    }

    pub fn parse_index_of(&self, table: &TableDef, index: &IndexDef) -> Result<IndexReport> {
        let leftmost_pages = self.leftmost_pages(table, index)?;
        let mut stats = IndexStats::default();
        let mut n_levels_left = leftmost_pages.len();

        for &level_first in &leftmost_pages {
            n_levels_left -= 1;
            debug!(
                "analyzing index {} at level {}...",
                index.idx_name, n_levels_left
            );
            stats.n_levels += 1;
            let mut current_page_no = level_first;
            loop {
                let buf = self.space.read_page(current_page_no)?;
                if IndexPageHeader::new(&buf).level > 0 {
                    stats.n_pages_non_leaf += 1;
                } else {
                    stats.n_pages_leaf += 1;
                }
                if let Err(e) = self.parse_page(current_page_no, Some(&mut stats.recs), false) {
                    error!(
                        "error while parsing page {} at level {}, skipping this level: {}",
                        current_page_no, n_levels_left, e
                    );
                    break;
                }
                let next_page_no = util::u32_val(&buf, FIL_PAGE_NEXT);
                if next_page_no == FIL_NULL {
                    break;
                }
                current_page_no = next_page_no;
            }
        }

        Ok(IndexReport {
            index_name: index.idx_name.clone(),
            index_id: index.ib_id,
            schema: table.schema_ref.clone(),
            table: table.tab_name.clone(),
            root_page_no: index.ib_page,
            n_fields: index.get_n_fields(table),
            leftmost_pages,
            stats,
            physical_size: self.space.physical_size,
        })
    }

    /// Analyze every supported index of one table.
    pub fn parse_table(&self, table_id: u64) -> Result<Vec<IndexReport>> {
        let table = self.tables.get(&table_id).ok_or_else(|| {
            IbdError::InvalidArgument(format!("no table with id {} was found", table_id))
        })?;
        let mut reports = Vec::new();
        for idx in &table.idx_defs {
            if idx.is_supported() {
                reports.push(self.parse_index_of(table.as_ref(), idx)?);
            }
        }
        Ok(reports)
    }
}

fn first_user_rec(buf: &Bytes, physical_size: usize, page_no: u32) -> Result<usize> {
    if &buf[PAGE_NEW_INFIMUM..PAGE_NEW_INFIMUM + 7] != b"infimum" {
        return Err(IbdError::CorruptPage {
            page_no,
            reason: "corrupt infimum record".into(),
        });
    }
    let next_rec_off = util::u16_val(buf, PAGE_NEW_INFIMUM - REC_OFF_NEXT) as usize;
    if PAGE_NEW_INFIMUM + next_rec_off >= physical_size {
        return Err(IbdError::CorruptPage {
            page_no,
            reason: "infimum next pointer out of range".into(),
        });
    }
    Ok(PAGE_NEW_INFIMUM + next_rec_off)
}

fn next_user_rec(
    buf: &Bytes,
    current: usize,
    physical_size: usize,
    page_no: u32,
) -> Result<Option<usize>> {
    let next = rec_next_offs(buf, current, physical_size);
    if next == 0 {
        return Err(IbdError::CorruptRecord {
            offset: current,
            reason: "self-relative next pointer is zero".into(),
        });
    }
    if next < PAGE_NEW_INFIMUM {
        return Err(IbdError::CorruptRecord {
            offset: current,
            reason: "next pointer lands before the record area".into(),
        });
    }
    if rec_status(buf, next) == RecordStatus::REC_STATUS_SUPREMUM {
        if &buf[next..next + 8] != b"supremum" {
            return Err(IbdError::CorruptPage {
                page_no,
                reason: "corrupt supremum record".into(),
            });
        }
        if util::u16_val(buf, next - REC_OFF_NEXT) != 0 {
            return Err(IbdError::CorruptPage {
                page_no,
                reason: "supremum has a next record".into(),
            });
        }
        return Ok(None);
    }
    Ok(Some(next))
}

#[cfg(test)]
mod walk_tests {
    use super::*;
    use crate::util;

    fn setup() {
        util::init_unit_test();
    }

    #[test]
    fn stats_fold() {
        setup();
        let mut total = PageStats::default();
        let page = PageStats {
            n_recs_leaf: 3,
            recs_len_leaf: 120,
            n_deleted_recs_leaf: 1,
            deleted_recs_len_leaf: 40,
            ..PageStats::default()
        };
        total.add(&page);
        total.add(&page);
        assert_eq!(total.n_recs_leaf, 6);
        assert_eq!(total.recs_len_leaf, 240);
        assert_eq!(total.n_deleted_recs_leaf, 2);
        assert_eq!(total.deleted_recs_len_leaf, 80);
    }
}
