use bytes::Bytes;
use num_enum::FromPrimitive;
use strum::Display;

use crate::errors::{IbdError, Result};
use crate::meta::def::{IndexDef, TableDef, MAX_ROW_VERSION, VERSION_UNDEF};
use crate::util;

// Compact record header, 5 bytes preceding the record origin.
pub const REC_N_NEW_EXTRA_BYTES: usize = 5;
pub const REC_NEW_INFO_BITS: usize = 5;
pub const REC_NEW_STATUS: usize = 3;
pub const REC_OFF_TYPE: usize = 3;
pub const REC_OFF_NEXT: usize = 2;

pub const REC_INFO_MIN_REC_FLAG: u8 = 0x10;
pub const REC_INFO_DELETED_FLAG: u8 = 0x20;
pub const REC_INFO_VERSION_FLAG: u8 = 0x40;
pub const REC_INFO_INSTANT_FLAG: u8 = 0x80;

pub const REC_NODE_PTR_SIZE: usize = 4;
pub const REC_N_FIELDS_TWO_BYTES_FLAG: u8 = 0x80;
pub const REC_N_FIELDS_ONE_BYTE_MAX: u8 = 0x7f;
pub const REC_MAX_N_FIELDS: u32 = 1024 - 1;

// Offset words: status bits in the high nibble, end offset below.
pub const REC_OFFS_COMPACT: u32 = 1 << 31;
pub const REC_OFFS_SQL_NULL: u32 = 1 << 31;
pub const REC_OFFS_EXTERNAL: u32 = 1 << 30;
pub const REC_OFFS_DEFAULT: u32 = 1 << 29;
pub const REC_OFFS_DROP: u32 = 1 << 28;
pub const REC_OFFS_MASK: u32 = REC_OFFS_DROP - 1;
pub const REC_OFFS_HEADER_SIZE: usize = 2;

#[repr(u8)]
#[allow(non_camel_case_types)]
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Display, FromPrimitive, Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
pub enum RecordStatus {
    REC_STATUS_ORDINARY = 0,
    REC_STATUS_NODE_PTR = 1,
    REC_STATUS_INFIMUM = 2,
    REC_STATUS_SUPREMUM = 3,
    #[default]
    UNDEF,
}

/// How the record was inserted relative to the table's instant ADD/DROP
/// history; decides the null-bitmap anchor and the per-field dispatch.
#[allow(non_camel_case_types)]
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Display, Clone, Copy, Eq, PartialEq)]
pub enum RecInsertState {
    INSERTED_BEFORE_INSTANT_ADD_OLD_IMPLEMENTATION,
    INSERTED_AFTER_INSTANT_ADD_OLD_IMPLEMENTATION,
    INSERTED_AFTER_UPGRADE_BEFORE_INSTANT_ADD_NEW_IMPLEMENTATION,
    INSERTED_BEFORE_INSTANT_ADD_NEW_IMPLEMENTATION,
    INSERTED_AFTER_INSTANT_ADD_NEW_IMPLEMENTATION,
    INSERTED_INTO_TABLE_WITH_NO_INSTANT_NO_VERSION,
}

/// Record header bits, decoded from the 5 bytes before the origin.
#[derive(Debug, Clone)]
pub struct RecordHeader {
    pub info_bits: u8,            // MIN_REC/DELETED/VERSION/INSTANT, see rec.h
    pub n_owned: u8,              // 4 bits
    pub heap_no: u16,             // 13 bits
    pub rec_status: RecordStatus, // 3 bits, see rec.h
    pub next_rec_offset: i16,     // self-relative next record offset
}

impl RecordHeader {
    pub fn new(buf: &[u8], rec: usize) -> Self {
        let b0 = buf[rec - REC_N_NEW_EXTRA_BYTES];
        let b1 = util::u16_val(buf, rec - 4);
        Self {
            info_bits: b0 & 0xf0,
            n_owned: b0 & 0x0f,
            heap_no: (b1 & 0xfff8) >> 3,
            rec_status: ((b1 & 0x0007) as u8).into(),
            next_rec_offset: util::u16_val(buf, rec - REC_OFF_NEXT) as i16,
        }
    }

    pub fn is_min_rec(&self) -> bool {
        (self.info_bits & REC_INFO_MIN_REC_FLAG) > 0
    }

    pub fn is_deleted(&self) -> bool {
        (self.info_bits & REC_INFO_DELETED_FLAG) > 0
    }
}

pub fn rec_status(buf: &[u8], rec: usize) -> RecordStatus {
    (buf[rec - REC_NEW_STATUS] & 0x7).into()
}

pub fn rec_is_deleted(buf: &[u8], rec: usize) -> bool {
    (buf[rec - REC_NEW_INFO_BITS] & REC_INFO_DELETED_FLAG) != 0
}

/// Resolve the self-relative next-record pointer into a page offset.
/// Returns 0 when the stored pointer is 0 (a corruption marker).
pub fn rec_next_offs(buf: &[u8], rec: usize, page_size: usize) -> usize {
    let field = util::u16_val(buf, rec - REC_OFF_NEXT) as usize;
    if field == 0 {
        return 0;
    }
    (rec + field) & (page_size - 1)
}

/// One record of an INDEX page together with its decoded offsets vector.
/// The vector layout is `[n_alloc, n_fields, header_word, end_1 .. end_n]`;
/// each end word carries NULL/EXTERNAL/DEFAULT/DROP status in the high
/// nibble and the in-record end offset in the low 28 bits.
pub struct Record<'a> {
    buf: &'a Bytes,
    pub pos: usize,
    table: &'a TableDef,
    index: &'a IndexDef,
    offsets: Vec<u32>,
}

impl<'a> Record<'a> {
    pub fn new(buf: &'a Bytes, pos: usize, table: &'a TableDef, index: &'a IndexDef) -> Self {
        Self {
            buf,
            pos,
            table,
            index,
            offsets: Vec::new(),
        }
    }

    pub fn header(&self) -> RecordHeader {
        RecordHeader::new(self.buf, self.pos)
    }

    pub fn buf_ref(&self) -> &Bytes {
        self.buf
    }

    pub fn status(&self) -> RecordStatus {
        rec_status(self.buf, self.pos)
    }

    pub fn info_bits(&self) -> u8 {
        self.buf[self.pos - REC_NEW_INFO_BITS] & 0xf0
    }

    pub fn is_deleted(&self) -> bool {
        (self.info_bits() & REC_INFO_DELETED_FLAG) != 0
    }

    fn is_versioned(&self) -> bool {
        (self.info_bits() & REC_INFO_VERSION_FLAG) != 0
    }

    fn instant_flag(&self) -> bool {
        (self.info_bits() & REC_INFO_INSTANT_FLAG) != 0
    }

    fn corrupt(&self, reason: &str) -> IbdError {
        IbdError::CorruptRecord {
            offset: self.pos,
            reason: reason.to_string(),
        }
    }

    fn byte_at(&self, at: usize) -> u8 {
        self.buf[at]
    }

    fn step_down(&self, at: &mut usize) -> Result<()> {
        *at = at
            .checked_sub(1)
            .ok_or_else(|| self.corrupt("record header runs off the page start"))?;
        Ok(())
    }

    pub fn n_fields(&self) -> usize {
        self.offsets[1] as usize
    }

    fn base(&self) -> &[u32] {
        &self.offsets[REC_OFFS_HEADER_SIZE..]
    }

    /// Extra-bytes length of the record header, status bits masked off.
    pub fn header_len(&self) -> u32 {
        self.base()[0] & REC_OFFS_MASK
    }

    /// End offset of the last field, i.e. the record body length.
    pub fn body_len(&self) -> u32 {
        self.base()[self.n_fields()] & REC_OFFS_MASK
    }

    /// Raw offset word of field `i` (status bits included).
    pub fn field_word(&self, i: usize) -> u32 {
        self.base()[i + 1]
    }

    pub fn field_end(&self, i: usize) -> u32 {
        self.field_word(i) & REC_OFFS_MASK
    }

    pub fn any_external(&self) -> bool {
        (self.base()[0] & REC_OFFS_EXTERNAL) != 0
    }

    /// Value bytes of field `i` within the page buffer, None when the field
    /// stores no bytes in this record (NULL / instant default / dropped).
    pub fn field_bytes(&self, i: usize) -> Option<Bytes> {
        let word = self.field_word(i);
        if (word & (REC_OFFS_SQL_NULL | REC_OFFS_DEFAULT | REC_OFFS_DROP)) != 0 {
            return None;
        }
        let start = if i == 0 { 0 } else { self.field_end(i - 1) } as usize;
        let end = (word & REC_OFFS_MASK) as usize;
        Some(self.buf.slice(self.pos + start..self.pos + end))
    }

    /// Build the per-field end-offset vector for this record.
    pub fn compute_offsets(&mut self) -> Result<()> {
        if !self.table.is_compact() {
            return Err(IbdError::UnsupportedObject(format!(
                "row format of table {} is not compact",
                self.table.tab_name
            )));
        }

        let n = match self.status() {
            RecordStatus::REC_STATUS_ORDINARY => self.index.get_n_fields(self.table) as usize,
            RecordStatus::REC_STATUS_NODE_PTR => {
                self.index.get_n_unique_in_tree_nonleaf(self.table) as usize + 1
            }
            RecordStatus::REC_STATUS_INFIMUM | RecordStatus::REC_STATUS_SUPREMUM => 1,
            RecordStatus::UNDEF => return Err(self.corrupt("unsupported record status")),
        };

        let size = n + 1 + REC_OFFS_HEADER_SIZE;
        self.offsets = vec![0u32; size];
        self.offsets[0] = size as u32;
        self.offsets[1] = n as u32;

        match self.status() {
            RecordStatus::REC_STATUS_INFIMUM | RecordStatus::REC_STATUS_SUPREMUM => {
                self.offsets[REC_OFFS_HEADER_SIZE] =
                    REC_N_NEW_EXTRA_BYTES as u32 | REC_OFFS_COMPACT;
                self.offsets[REC_OFFS_HEADER_SIZE + 1] = 8;
                Ok(())
            }
            RecordStatus::REC_STATUS_NODE_PTR => self.init_offsets_node_ptr(),
            RecordStatus::REC_STATUS_ORDINARY => self.init_offsets_leaf(),
            RecordStatus::UNDEF => unreachable!(),
        }?;

        if self.pos + self.body_len() as usize > self.buf.len() {
            return Err(self.corrupt("record body runs past the page end"));
        }
        Ok(())
    }

    fn init_offsets_node_ptr(&mut self) -> Result<()> {
        if self.is_versioned() {
            return Err(self.corrupt("node pointer record carries a row version"));
        }
        let n_node_ptr_field = self.index.get_n_unique_in_tree_nonleaf(self.table) as usize;

        let mut nulls = self.pos - (REC_N_NEW_EXTRA_BYTES + 1);
        let nullable_cols = self.index.get_nullable_before_instant_add_drop();
        let mut lens = nulls
            .checked_sub(util::bits_in_bytes(nullable_cols as usize))
            .ok_or_else(|| self.corrupt("null bitmap runs off the page start"))?;

        let mut offs: u32 = 0;
        let mut null_mask: u32 = 1;
        let n_fields = self.offsets[1] as usize;

        for i in 0..n_fields {
            let len: u32;
            if i == n_node_ptr_field {
                offs += REC_NODE_PTR_SIZE as u32;
                self.offsets[REC_OFFS_HEADER_SIZE + 1 + i] = offs;
                continue;
            }

            let field = &self.index.fields[i];
            let col = &self.table.col_defs[field.column_opx];
            if col.is_nullable {
                if null_mask > 0x80 {
                    self.step_down(&mut nulls)?;
                    null_mask = 1;
                }
                if (self.byte_at(nulls) as u32 & null_mask) != 0 {
                    null_mask <<= 1;
                    self.offsets[REC_OFFS_HEADER_SIZE + 1 + i] = offs | REC_OFFS_SQL_NULL;
                    continue;
                }
                null_mask <<= 1;
            }

            if field.fixed_len == 0 {
                let mut l = self.byte_at(lens) as u32;
                self.step_down(&mut lens)?;
                if col.is_big_col() && (l & 0x80) != 0 {
                    l = (l << 8) | self.byte_at(lens) as u32;
                    self.step_down(&mut lens)?;
                    if (l & 0x4000) != 0 {
                        return Err(self.corrupt("externally stored field on a node pointer"));
                    }
                    offs += l & 0x3fff;
                    self.offsets[REC_OFFS_HEADER_SIZE + 1 + i] = offs;
                    continue;
                }
                offs += l;
                len = offs;
            } else {
                offs += field.fixed_len;
                len = offs;
            }
            self.offsets[REC_OFFS_HEADER_SIZE + 1 + i] = len;
        }

        self.offsets[REC_OFFS_HEADER_SIZE] = (self.pos - (lens + 1)) as u32 | REC_OFFS_COMPACT;
        Ok(())
    }

    fn get_insert_state(&self) -> Result<RecInsertState> {
        use RecInsertState::*;

        if !self.index.has_instant_cols_or_row_versions() {
            return Ok(INSERTED_INTO_TABLE_WITH_NO_INSTANT_NO_VERSION);
        }

        let is_versioned = self.is_versioned();
        let is_instant = self.instant_flag();
        if is_versioned && is_instant {
            return Err(self.corrupt("record carries both version and instant flags"));
        }

        let state = if is_versioned {
            let version = self.byte_at(self.pos - (REC_N_NEW_EXTRA_BYTES + 1)) as u32;
            if version > MAX_ROW_VERSION {
                return Err(self.corrupt("row version out of range"));
            }
            if version == 0 {
                if !self.index.instant_cols {
                    return Err(IbdError::Internal(
                        "version 0 record in an index without upgraded instant columns".into(),
                    ));
                }
                INSERTED_AFTER_UPGRADE_BEFORE_INSTANT_ADD_NEW_IMPLEMENTATION
            } else {
                if !self.index.row_versions {
                    return Err(IbdError::Internal(
                        "versioned record in an index without row versions".into(),
                    ));
                }
                INSERTED_AFTER_INSTANT_ADD_NEW_IMPLEMENTATION
            }
        } else if is_instant {
            if !self.table.has_instant_cols() {
                return Err(IbdError::Internal(
                    "instant record in a table without instant columns".into(),
                ));
            }
            INSERTED_AFTER_INSTANT_ADD_OLD_IMPLEMENTATION
        } else if self.table.has_instant_cols() {
            INSERTED_BEFORE_INSTANT_ADD_OLD_IMPLEMENTATION
        } else {
            INSERTED_BEFORE_INSTANT_ADD_NEW_IMPLEMENTATION
        };
        Ok(state)
    }

    /// Field count stored on old-implementation instant records, encoded in
    /// one or two bytes right before the fixed header.
    fn get_n_fields_instant(&self, extra_bytes: usize) -> Result<(u16, usize)> {
        let mut ptr = self.pos - (extra_bytes + 1);
        let b = self.byte_at(ptr);
        if (b & REC_N_FIELDS_TWO_BYTES_FLAG) == 0 {
            return Ok((b as u16, 1));
        }

        let mut n_fields = ((b & REC_N_FIELDS_ONE_BYTE_MAX) as u16) << 8;
        self.step_down(&mut ptr)?;
        n_fields |= self.byte_at(ptr) as u16;
        if n_fields as u32 >= REC_MAX_N_FIELDS || n_fields == 0 {
            return Err(self.corrupt("stored field count out of range"));
        }
        Ok((n_fields, 2))
    }

    fn instant_offset(&self, n: usize, offs: u32) -> u32 {
        let col = &self.table.col_defs[self.index.physical_field(n).column_opx];
        if col.instant_default {
            offs | REC_OFFS_DEFAULT
        } else {
            offs | REC_OFFS_SQL_NULL
        }
    }

    /// Locate the null bitmap and the length area for a leaf record and
    /// classify it; see §Record offset reconstruction.
    fn init_nulls_and_lens(
        &self,
    ) -> Result<(usize, usize, u16, u16, u32, RecInsertState)> {
        use RecInsertState::*;

        let mut non_default_fields = self.index.get_n_fields(self.table) as u16;
        let mut row_version = VERSION_UNDEF;
        let mut nulls = self.pos - (REC_N_NEW_EXTRA_BYTES + 1);

        let state = self.get_insert_state()?;
        let n_null: u16 = match state {
            INSERTED_INTO_TABLE_WITH_NO_INSTANT_NO_VERSION => self.index.n_nullable as u16,

            INSERTED_AFTER_INSTANT_ADD_NEW_IMPLEMENTATION
            | INSERTED_AFTER_UPGRADE_BEFORE_INSTANT_ADD_NEW_IMPLEMENTATION => {
                row_version = self.byte_at(nulls) as u32;
                self.step_down(&mut nulls)?;
                self.index.get_nullable_in_version(row_version) as u16
            }

            INSERTED_AFTER_INSTANT_ADD_OLD_IMPLEMENTATION => {
                let (n, length) = self.get_n_fields_instant(REC_N_NEW_EXTRA_BYTES)?;
                non_default_fields = n;
                nulls = nulls
                    .checked_sub(length)
                    .ok_or_else(|| self.corrupt("stored field count runs off the page"))?;
                self.index
                    .calculate_n_instant_nullable(self.table, non_default_fields as u32)
                    as u16
            }

            INSERTED_BEFORE_INSTANT_ADD_OLD_IMPLEMENTATION => {
                non_default_fields = self.index.get_n_original_fields(self.table) as u16;
                self.index.get_nullable_before_instant_add_drop() as u16
            }

            INSERTED_BEFORE_INSTANT_ADD_NEW_IMPLEMENTATION => {
                self.index.get_nullable_before_instant_add_drop() as u16
            }
        };

        let lens = nulls
            .checked_sub(util::bits_in_bytes(n_null as usize))
            .ok_or_else(|| self.corrupt("null bitmap runs off the page start"))?;
        Ok((nulls, lens, n_null, non_default_fields, row_version, state))
    }

    fn init_offsets_leaf(&mut self) -> Result<()> {
        use RecInsertState::*;

        let (mut nulls, mut lens, mut n_null, non_default_fields, row_version, state) =
            self.init_nulls_and_lens()?;

        let mut offs: u32 = 0;
        let mut any_ext: u32 = 0;
        let mut null_mask: u32 = 1;
        let n_fields = self.offsets[1] as usize;

        for i in 0..n_fields {
            let field = self.index.physical_field(i);
            let col = &self.table.col_defs[field.column_opx];

            // instant-class sub-decision
            let resolved: Option<u32> = match state {
                INSERTED_INTO_TABLE_WITH_NO_INSTANT_NO_VERSION => None,

                INSERTED_BEFORE_INSTANT_ADD_NEW_IMPLEMENTATION
                | INSERTED_AFTER_UPGRADE_BEFORE_INSTANT_ADD_NEW_IMPLEMENTATION
                | INSERTED_AFTER_INSTANT_ADD_NEW_IMPLEMENTATION => {
                    // records written before any version stamp decode as version 0
                    let version = if state == INSERTED_BEFORE_INSTANT_ADD_NEW_IMPLEMENTATION {
                        0
                    } else {
                        row_version
                    };
                    if col.is_dropped_in_or_before(version) {
                        Some(offs | REC_OFFS_DROP)
                    } else if col.is_added_after(version) {
                        Some(self.instant_offset(i, offs))
                    } else {
                        None
                    }
                }

                INSERTED_BEFORE_INSTANT_ADD_OLD_IMPLEMENTATION
                | INSERTED_AFTER_INSTANT_ADD_OLD_IMPLEMENTATION => {
                    if non_default_fields == 0 {
                        return Err(IbdError::Internal(
                            "old-style instant record without stored fields".into(),
                        ));
                    }
                    if i >= non_default_fields as usize {
                        Some(self.instant_offset(i, offs))
                    } else {
                        None
                    }
                }
            };
            if let Some(len) = resolved {
                self.offsets[REC_OFFS_HEADER_SIZE + 1 + i] = len;
                continue;
            }

            // null-bit sub-decision
            if col.is_nullable {
                if n_null == 0 {
                    return Err(IbdError::Internal(
                        "nullable field counter underflow while decoding".into(),
                    ));
                }
                n_null -= 1;
                if null_mask > 0x80 {
                    self.step_down(&mut nulls)?;
                    null_mask = 1;
                }
                if (self.byte_at(nulls) as u32 & null_mask) != 0 {
                    null_mask <<= 1;
                    self.offsets[REC_OFFS_HEADER_SIZE + 1 + i] = offs | REC_OFFS_SQL_NULL;
                    continue;
                }
                null_mask <<= 1;
            }

            // length sub-decision
            if field.fixed_len == 0 {
                let mut len = self.byte_at(lens) as u32;
                self.step_down(&mut lens)?;
                if col.is_big_col() && (len & 0x80) != 0 {
                    len = (len << 8) | self.byte_at(lens) as u32;
                    self.step_down(&mut lens)?;
                    offs += len & 0x3fff;
                    let word = if (len & 0x4000) != 0 {
                        if !self.index.is_clustered() {
                            return Err(
                                self.corrupt("externally stored field on a secondary index")
                            );
                        }
                        any_ext = REC_OFFS_EXTERNAL;
                        offs | REC_OFFS_EXTERNAL
                    } else {
                        offs
                    };
                    self.offsets[REC_OFFS_HEADER_SIZE + 1 + i] = word;
                    continue;
                }
                offs += len;
                self.offsets[REC_OFFS_HEADER_SIZE + 1 + i] = offs;
            } else {
                offs += field.fixed_len;
                self.offsets[REC_OFFS_HEADER_SIZE + 1 + i] = offs;
            }
        }

        self.offsets[REC_OFFS_HEADER_SIZE] =
            (self.pos - (lens + 1)) as u32 | REC_OFFS_COMPACT | any_ext;
        Ok(())
    }

    /// Child page number of a node-pointer record, stored in its last
    /// 4 bytes.
    pub fn child_page_no(&self) -> Result<u32> {
        let n_fields = self.n_fields();
        if n_fields < 2 {
            return Err(self.corrupt("node pointer record with too few fields"));
        }
        let last_2_end = self.field_end(n_fields - 2) as usize;
        let last_end = self.field_end(n_fields - 1) as usize;
        if last_end - last_2_end != REC_NODE_PTR_SIZE {
            return Err(self.corrupt("malformed node pointer field"));
        }
        Ok(util::u32_val(self.buf, self.pos + last_2_end))
    }
}

#[cfg(test)]
mod record_tests {
    use super::*;
    use crate::meta::def::*;
    use crate::sdi::record::{ColumnTypes, RowFormats};
    use crate::util;

    fn setup() {
        util::init_unit_test();
    }

    fn column(
        name: &str,
        dd_type: ColumnTypes,
        mtype: SeTypes,
        col_len: u32,
        nullable: bool,
    ) -> ColumnDef {
        ColumnDef {
            col_name: name.to_string(),
            dd_type,
            mtype,
            col_len,
            is_nullable: nullable,
            version_added: VERSION_UNDEF,
            version_dropped: VERSION_UNDEF,
            phy_pos: PHY_POS_UNDEF,
            ..ColumnDef::default()
        }
    }

    /// a INT NOT NULL PRIMARY KEY, b VARCHAR(10) NULL; clustered layout
    /// a, DB_TRX_ID, DB_ROLL_PTR, b.
    fn plain_table() -> TableDef {
        let mut table = TableDef {
            tab_name: "t1".into(),
            row_format: RowFormats::RF_DYNAMIC,
            n_cols: 5,
            n_instant_cols: 5,
            current_col_count: 2,
            initial_col_count: 2,
            total_col_count: 2,
            ..TableDef::default()
        };
        table.col_defs = vec![
            column("a", ColumnTypes::LONG, SeTypes::DATA_INT, 4, false),
            column("DB_TRX_ID", ColumnTypes::INT24, SeTypes::DATA_SYS, 6, false),
            column("DB_ROLL_PTR", ColumnTypes::LONGLONG, SeTypes::DATA_SYS, 7, false),
            column("b", ColumnTypes::VARCHAR, SeTypes::DATA_VARMYSQL, 40, true),
        ];
        for (i, col) in table.col_defs.iter_mut().enumerate() {
            col.ib_ind = i;
            col.phy_pos = i as u32;
        }
        table.col_defs[1].version_added = 0;
        table.col_defs[1].version_dropped = 0;
        table.col_defs[2].version_added = 0;
        table.col_defs[2].version_dropped = 0;

        let index = IndexDef {
            idx_name: "PRIMARY".into(),
            ib_type: DICT_CLUSTERED | DICT_UNIQUE,
            n_fields: 4,
            n_uniq: 1,
            n_def: 4,
            n_nullable: 1,
            n_instant_nullable: 1,
            n_total_fields: 4,
            nullables: vec![0; (MAX_ROW_VERSION + 1) as usize],
            fields: vec![
                IndexFieldDef { column_opx: 0, fixed_len: 4 },
                IndexFieldDef { column_opx: 1, fixed_len: 6 },
                IndexFieldDef { column_opx: 2, fixed_len: 7 },
                IndexFieldDef { column_opx: 3, fixed_len: 0 },
            ],
            ..IndexDef::default()
        };
        table.idx_defs = vec![index];
        table.clust_idx = Some(0);
        table
    }

    const POS: usize = 200;

    /// Assemble a compact leaf record at POS: `pre` holds the bytes below
    /// the 5-byte header (variable lengths, then the null bitmap, then an
    /// optional version byte), `body` the field values.
    fn build_page(pre: &[u8], info_bits: u8, status: u8, body: &[u8]) -> Bytes {
        let mut page = vec![0u8; 16 * 1024];
        let pre_start = POS - REC_N_NEW_EXTRA_BYTES - pre.len();
        page[pre_start..POS - REC_N_NEW_EXTRA_BYTES].copy_from_slice(pre);
        page[POS - REC_NEW_INFO_BITS] = info_bits;
        page[POS - REC_NEW_STATUS] = status;
        page[POS..POS + body.len()].copy_from_slice(body);
        Bytes::from(page)
    }

    fn body_plain(a: u32, b: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&a.to_be_bytes());
        body.extend_from_slice(&[0u8; 6]);
        body.extend_from_slice(&[0u8; 7]);
        body.extend_from_slice(b);
        body
    }

    #[test]
    fn leaf_record_fixed_and_varlen() {
        setup();
        let table = plain_table();
        let index = &table.idx_defs[0];
        // b = "x": one varlen byte, one null byte
        let page = build_page(&[0x01, 0x00], 0, 0, &body_plain(1, b"x"));
        let mut rec = Record::new(&page, POS, &table, index);
        rec.compute_offsets().unwrap();

        assert_eq!(rec.n_fields(), 4);
        assert_eq!(rec.field_end(0), 4);
        assert_eq!(rec.field_end(1), 10);
        assert_eq!(rec.field_end(2), 17);
        assert_eq!(rec.field_end(3), 18);
        // 5 header bytes + null bitmap + one length byte
        assert_eq!(rec.header_len(), 7);
        assert_eq!(rec.body_len(), 18);
        assert!(!rec.any_external());
        assert_eq!(rec.field_bytes(3).unwrap().as_ref(), b"x");

        // offsets are non-decreasing and bounded by the page size
        for i in 1..rec.n_fields() {
            assert!(rec.field_end(i) >= rec.field_end(i - 1));
        }
    }

    #[test]
    fn leaf_record_null_field() {
        setup();
        let table = plain_table();
        let index = &table.idx_defs[0];
        // b IS NULL: bitmap bit set, no varlen byte
        let page = build_page(&[0x01], 0, 0, &body_plain(2, b""));
        let mut rec = Record::new(&page, POS, &table, index);
        rec.compute_offsets().unwrap();

        let word = rec.field_word(3);
        assert_eq!(word & REC_OFFS_SQL_NULL, REC_OFFS_SQL_NULL);
        // a NULL field keeps the offset of the previous field end
        assert_eq!(rec.field_end(3), 17);
        assert_eq!(rec.field_bytes(3), None);
        assert_eq!(rec.header_len(), 6);
    }

    #[test]
    fn node_ptr_record() {
        setup();
        let table = plain_table();
        let index = &table.idx_defs[0];
        // key a + 4-byte child pointer; null bitmap precedes the header
        let mut body = Vec::new();
        body.extend_from_slice(&7u32.to_be_bytes());
        body.extend_from_slice(&5u32.to_be_bytes());
        let page = build_page(&[0x00], 0, 1, &body);
        let mut rec = Record::new(&page, POS, &table, index);
        rec.compute_offsets().unwrap();

        assert_eq!(rec.n_fields(), 2);
        assert_eq!(rec.field_end(0), 4);
        assert_eq!(rec.field_end(1), 8);
        assert_eq!(rec.child_page_no().unwrap(), 5);
    }

    #[test]
    fn infimum_supremum_offsets() {
        setup();
        let table = plain_table();
        let index = &table.idx_defs[0];
        let page = build_page(&[], 0, 2, b"infimum\0");
        let mut rec = Record::new(&page, POS, &table, index);
        rec.compute_offsets().unwrap();
        assert_eq!(rec.n_fields(), 1);
        assert_eq!(rec.header_len(), REC_N_NEW_EXTRA_BYTES as u32);
        assert_eq!(rec.body_len(), 8);
    }

    /// plain_table plus c INT NOT NULL DEFAULT 7 added instantly (row
    /// version 1, new implementation).
    fn instant_add_table() -> TableDef {
        let mut table = plain_table();
        table.current_row_version = 1;
        table.total_col_count = 3;
        table.current_col_count = 3;
        table.n_cols = 6;
        table.n_instant_cols = 6;

        let mut c = column("c", ColumnTypes::LONG, SeTypes::DATA_INT, 4, false);
        c.version_added = 1;
        c.instant_default = true;
        c.ib_ind = 4;
        c.phy_pos = 4;
        table.col_defs.push(c);

        let idx = &mut table.idx_defs[0];
        idx.fields.push(IndexFieldDef { column_opx: 4, fixed_len: 4 });
        idx.n_def = 5;
        idx.n_fields = 5;
        idx.n_total_fields = 5;
        idx.row_versions = true;
        idx.fields_array = (0..5).collect();
        idx.nullables[0] = 1;
        idx.nullables[1] = 1;
        table
    }

    #[test]
    fn instant_add_old_row_reports_default() {
        setup();
        let table = instant_add_table();
        let index = &table.idx_defs[0];
        // inserted before the ADD: no version flag, c is missing
        let page = build_page(&[0x01, 0x00], 0, 0, &body_plain(1, b"x"));
        let mut rec = Record::new(&page, POS, &table, index);
        rec.compute_offsets().unwrap();

        assert_eq!(rec.n_fields(), 5);
        assert_eq!(rec.field_end(3), 18);
        let word = rec.field_word(4);
        assert_eq!(word & REC_OFFS_DEFAULT, REC_OFFS_DEFAULT);
        assert_eq!(rec.field_end(4), 18);
        assert_eq!(rec.field_bytes(4), None);
    }

    #[test]
    fn instant_add_new_row_carries_value() {
        setup();
        let table = instant_add_table();
        let index = &table.idx_defs[0];
        // inserted after the ADD: version flag, version byte 1, c stored
        let mut body = body_plain(4, b"zz");
        body.extend_from_slice(&9u32.to_be_bytes());
        // pre bytes below header: varlen, null bitmap, version byte
        let page = build_page(&[0x02, 0x00, 0x01], REC_INFO_VERSION_FLAG, 0, &body);
        let mut rec = Record::new(&page, POS, &table, index);
        rec.compute_offsets().unwrap();

        assert_eq!(rec.field_end(3), 19);
        assert_eq!(rec.field_end(4), 23);
        assert_eq!(rec.field_word(4) & !REC_OFFS_MASK, 0);
        assert_eq!(
            rec.field_bytes(4).unwrap().as_ref(),
            &9u32.to_be_bytes()[..]
        );
        // version byte joins the header accounting
        assert_eq!(rec.header_len(), 8);
    }

    /// plain_table with b instantly dropped in version 1: surviving fields
    /// a, trx, roll, then the dropped b at the tail.
    fn instant_drop_table() -> TableDef {
        let mut table = plain_table();
        table.current_row_version = 1;
        table.current_col_count = 1;
        table.initial_col_count = 2;
        table.total_col_count = 2;
        table.n_cols = 4;
        table.n_instant_cols = 4;

        table.col_defs[3].version_dropped = 1;

        let idx = &mut table.idx_defs[0];
        idx.n_def = 4;
        idx.n_fields = 3;
        idx.n_total_fields = 4;
        idx.row_versions = true;
        idx.fields_array = (0..4).collect();
        idx.nullables[0] = 1;
        idx.nullables[1] = 0;
        table
    }

    #[test]
    fn instant_drop_marks_new_rows() {
        setup();
        let table = instant_drop_table();
        let index = &table.idx_defs[0];
        // inserted after the DROP: version 1, no bytes for b at all
        let page = build_page(&[0x01], REC_INFO_VERSION_FLAG, 0, &body_plain(9, b""));
        let mut rec = Record::new(&page, POS, &table, index);
        rec.compute_offsets().unwrap();

        assert_eq!(rec.n_fields(), 4);
        assert_eq!(rec.field_end(2), 17);
        let word = rec.field_word(3);
        assert_eq!(word & REC_OFFS_DROP, REC_OFFS_DROP);
        assert_eq!(rec.field_end(3), 17);
    }

    #[test]
    fn instant_drop_keeps_old_rows_bytes() {
        setup();
        let table = instant_drop_table();
        let index = &table.idx_defs[0];
        // inserted before the DROP (version 0 semantics): b materialises
        let page = build_page(&[0x01, 0x00], 0, 0, &body_plain(1, b"x"));
        let mut rec = Record::new(&page, POS, &table, index);
        rec.compute_offsets().unwrap();

        let word = rec.field_word(3);
        assert_eq!(word & REC_OFFS_DROP, 0);
        assert_eq!(rec.field_end(3), 18);
        assert_eq!(rec.field_bytes(3).unwrap().as_ref(), b"x");
    }

    /// Old-implementation INSTANT ADD: c added without row versions; the
    /// table remembers 2 user columns before the ALTER.
    fn old_instant_table() -> TableDef {
        let mut table = plain_table();
        table.n_cols = 6;
        table.n_instant_cols = 5; // a, b + 3 system columns
        table.current_col_count = 3;
        table.initial_col_count = 2;
        table.total_col_count = 3;

        let mut c = column("c", ColumnTypes::LONG, SeTypes::DATA_INT, 4, false);
        c.instant_default = true;
        c.ib_ind = 4;
        table.col_defs.push(c);

        let idx = &mut table.idx_defs[0];
        idx.fields.push(IndexFieldDef { column_opx: 4, fixed_len: 4 });
        idx.n_def = 5;
        idx.n_fields = 5;
        idx.n_total_fields = 5;
        idx.instant_cols = true;
        idx.n_instant_nullable = 1;
        table
    }

    #[test]
    fn old_instant_record_without_flag_uses_original_fields() {
        setup();
        let table = old_instant_table();
        let index = &table.idx_defs[0];
        // original-format record: 4 fields, no instant flag
        let page = build_page(&[0x01, 0x00], 0, 0, &body_plain(1, b"x"));
        let mut rec = Record::new(&page, POS, &table, index);
        rec.compute_offsets().unwrap();

        assert_eq!(rec.field_end(3), 18);
        assert_eq!(rec.field_word(4) & REC_OFFS_DEFAULT, REC_OFFS_DEFAULT);
    }

    #[test]
    fn old_instant_record_with_flag_stores_field_count() {
        setup();
        let table = old_instant_table();
        let index = &table.idx_defs[0];
        // instant-flagged record stores all 5 fields; count byte precedes
        // the null bitmap
        let mut body = body_plain(4, b"zz");
        body.extend_from_slice(&9u32.to_be_bytes());
        let page = build_page(&[0x02, 0x00, 0x05], REC_INFO_INSTANT_FLAG, 0, &body);
        let mut rec = Record::new(&page, POS, &table, index);
        rec.compute_offsets().unwrap();

        assert_eq!(rec.field_end(3), 19);
        assert_eq!(rec.field_end(4), 23);
        assert_eq!(rec.field_word(4) & !REC_OFFS_MASK, 0);
    }

    #[test]
    fn next_offs_wraps_within_page() {
        setup();
        let mut page = vec![0u8; 16 * 1024];
        // next pointer of the record at POS points 32 bytes ahead
        page[POS - 2..POS].copy_from_slice(&32u16.to_be_bytes());
        assert_eq!(rec_next_offs(&page, POS, page.len()), POS + 32);
        // zero marks corruption
        page[POS - 2..POS].copy_from_slice(&0u16.to_be_bytes());
        assert_eq!(rec_next_offs(&page, POS, page.len()), 0);
    }
}
