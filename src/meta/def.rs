use num_enum::FromPrimitive;
use strum::Display;

use crate::meta::cst;
use crate::meta::prop::Properties;
use crate::sdi::record::{
    ColumnKeys, ColumnTypes, HiddenTypes, IndexAlgorithm, IndexOrder, IndexTypes, PartitionTypes,
    RowFormats, TableHiddenTypes,
};

pub const DATA_ROW_ID_LEN: u32 = 6;
pub const DATA_TRX_ID_LEN: u32 = 6;
pub const DATA_ROLL_PTR_LEN: u32 = 7;
pub const DATA_N_SYS_COLS: u32 = 3;
/// MBR of a spatial key, SPDIMS * 2 * sizeof(double).
pub const DATA_MBR_LEN: u32 = 2 * 2 * 8;
pub const DICT_MAX_FIXED_COL_LEN: u32 = 768;

pub const DICT_CLUSTERED: u32 = 1;
pub const DICT_UNIQUE: u32 = 2;
pub const DICT_FTS: u32 = 32;
pub const DICT_SPATIAL: u32 = 64;

pub const HA_NOSAME: u32 = 1;
pub const HA_FULLTEXT: u32 = 1 << 7;
pub const HA_SPATIAL: u32 = 1 << 10;

pub const MAX_ROW_VERSION: u32 = 64;
pub const VERSION_UNDEF: u32 = u8::MAX as u32;
pub const PHY_POS_UNDEF: u32 = u32::MAX;

pub const ROW_ID_COL_NAME: &str = "DB_ROW_ID";
pub const TRX_ID_COL_NAME: &str = "DB_TRX_ID";
pub const ROLL_PTR_COL_NAME: &str = "DB_ROLL_PTR";
pub const FTS_DOC_ID_COL_NAME: &str = "FTS_DOC_ID";
pub const FTS_DOC_ID_INDEX_NAME: &str = "FTS_DOC_ID_INDEX";

// Tables
pub const UNSUPP_TABLE_MASK: u32 = 0x1F;
pub const UNSUPP_TABLE_MASK_PARTITION: u32 = 0x1;
pub const UNSUPP_TABLE_MASK_ENCRYPT: u32 = 0x2;
pub const UNSUPP_TABLE_MASK_FTS_AUX_INDEX: u32 = 0x4;
pub const UNSUPP_TABLE_MASK_FTS_COM_INDEX: u32 = 0x8;
pub const UNSUPP_TABLE_MASK_VERSION: u32 = 0x10;

// Indexes
pub const UNSUPP_INDEX_MASK: u32 = 0x7;
pub const UNSUPP_INDEX_MASK_VIRTUAL: u32 = 0x1;
pub const UNSUPP_INDEX_MASK_FTS: u32 = 0x2;
pub const UNSUPP_INDEX_MASK_SPATIAL: u32 = 0x4;

pub const SUPPORTED_VERSION_MIN: u32 = 80016;
pub const SUPPORTED_VERSION_MAX: u32 = 80040;

/// Storage engine main types, see storage/innobase/include/data0type.h
#[repr(u32)]
#[allow(non_camel_case_types)]
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Display, FromPrimitive, Default, Clone, Copy, PartialEq, Eq)]
pub enum SeTypes {
    #[default]
    DATA_MISSING = 0,
    DATA_VARCHAR = 1,
    DATA_CHAR = 2,
    DATA_FIXBINARY = 3,
    DATA_BINARY = 4,
    DATA_BLOB = 5,
    DATA_INT = 6,
    DATA_SYS = 8,
    DATA_FLOAT = 9,
    DATA_DOUBLE = 10,
    DATA_DECIMAL = 11,
    DATA_VARMYSQL = 12,
    DATA_MYSQL = 13,
    DATA_GEOMETRY = 14,
    DATA_POINT = 15,
    DATA_VAR_POINT = 16,
}

const DIG_PER_DEC1: u32 = 9;
const DIG2BYTES: [u32; (DIG_PER_DEC1 + 1) as usize] = [0, 1, 1, 2, 2, 3, 3, 4, 4, 4];
/// The BLOB pack length includes an in-memory pointer on the server side.
const PORTABLE_SIZEOF_CHAR_PTR: u32 = 8;

#[derive(Debug, Default, Clone)]
pub struct ColumnDef {
    pub pos: usize,                 // ordinal position, starts from 1
    pub col_name: String,           // column name
    pub dd_type: ColumnTypes,       // data dictionary type
    pub is_nullable: bool,          // is nullable
    pub is_virtual: bool,           // is generated virtual column
    pub hidden: HiddenTypes,        // hidden type
    pub col_key: ColumnKeys,        // column key type
    pub char_length: u32,           // declared length in bytes
    pub numeric_precision: u32,     // decimal precision
    pub numeric_scale: u32,         // decimal scale
    pub datetime_precision: u32,    // fractional seconds precision
    pub elements_size: usize,       // number of ENUM/SET elements
    pub collation_id: u32,          // see INFORMATION_SCHEMA.COLLATIONS
    pub default_null: bool,         // instant default is NULL
    pub default_value: String,      // raw instant default from se_private_data
    pub default_value_utf8: String, // utf8 rendering of the default
    pub comment: String,            // comment
    pub utf8_def: String,           // utf8 column definition
    pub options: Properties,        // dd options
    pub se_private_data: Properties, // engine-private k=v data

    /* storage engine attributes, assigned by the physical builder */
    pub ib_ind: usize,        // slot in the physical column vector
    pub mtype: SeTypes,       // storage type
    pub is_visible: bool,     // visible to the server
    pub version_added: u32,   // row version the column appeared in
    pub version_dropped: u32, // row version the column was dropped in
    pub phy_pos: u32,         // stable physical position
    pub col_len: u32,         // storage length, varchar excludes length header
    pub instant_default: bool, // an instant default value is stored
    pub se_explicit: bool,    // synthesized by the engine, absent from SDI
}

impl ColumnDef {
    pub fn is_system_column(&self) -> bool {
        self.col_name == ROW_ID_COL_NAME
            || self.col_name == TRX_ID_COL_NAME
            || self.col_name == ROLL_PTR_COL_NAME
    }

    pub fn is_se_hidden(&self) -> bool {
        self.hidden == HiddenTypes::HT_HIDDEN_SE
    }

    /// Server field type the dictionary type is handled as. Versioned
    /// temporals collapse onto their base type, ENUM/SET onto STRING.
    pub fn field_type(&self) -> ColumnTypes {
        match self.dd_type {
            ColumnTypes::VAR_STRING | ColumnTypes::STRING => ColumnTypes::STRING,
            ColumnTypes::VARCHAR => ColumnTypes::VARCHAR,
            ColumnTypes::BLOB
            | ColumnTypes::MEDIUM_BLOB
            | ColumnTypes::TINY_BLOB
            | ColumnTypes::LONG_BLOB => ColumnTypes::BLOB,
            ColumnTypes::GEOMETRY => ColumnTypes::GEOMETRY,
            ColumnTypes::JSON => ColumnTypes::JSON,
            ColumnTypes::ENUM | ColumnTypes::SET => ColumnTypes::STRING,
            ColumnTypes::TIMESTAMP | ColumnTypes::TIMESTAMP2 => ColumnTypes::TIMESTAMP,
            ColumnTypes::NEWDATE | ColumnTypes::DATE => ColumnTypes::DATE,
            ColumnTypes::TIME | ColumnTypes::TIME2 => ColumnTypes::TIME,
            ColumnTypes::DATETIME | ColumnTypes::DATETIME2 => ColumnTypes::DATETIME,
            other => other,
        }
    }

    pub fn is_binary(&self) -> bool {
        match self.field_type() {
            ColumnTypes::STRING
            | ColumnTypes::VARCHAR
            | ColumnTypes::BLOB
            | ColumnTypes::GEOMETRY
            | ColumnTypes::JSON
            | ColumnTypes::TYPE_NULL => self.collation_id == cst::COLLATION_BINARY,
            _ => true,
        }
    }

    pub fn varchar_len_bytes(&self) -> u32 {
        if self.char_length < 256 {
            1
        } else {
            2
        }
    }

    /// Server-side packed length of one value, see Field::pack_length().
    pub fn pack_length(&self) -> u32 {
        match self.dd_type {
            ColumnTypes::VAR_STRING | ColumnTypes::STRING | ColumnTypes::DECIMAL => {
                self.char_length
            }
            ColumnTypes::VARCHAR => self.varchar_len_bytes() + self.char_length,
            ColumnTypes::TINY_BLOB => 1 + PORTABLE_SIZEOF_CHAR_PTR,
            ColumnTypes::BLOB => 2 + PORTABLE_SIZEOF_CHAR_PTR,
            ColumnTypes::MEDIUM_BLOB => 3 + PORTABLE_SIZEOF_CHAR_PTR,
            ColumnTypes::LONG_BLOB | ColumnTypes::GEOMETRY | ColumnTypes::JSON => {
                4 + PORTABLE_SIZEOF_CHAR_PTR
            }
            ColumnTypes::ENUM => {
                if self.elements_size < 256 {
                    1
                } else {
                    2
                }
            }
            ColumnTypes::SET => {
                let len = (self.elements_size as u32 + 7) / 8;
                if len > 4 {
                    8
                } else {
                    len
                }
            }
            ColumnTypes::NEWDECIMAL => {
                let precision = self.numeric_precision;
                let scale = self.numeric_scale;
                let intg = precision - scale;
                let intg0 = intg / DIG_PER_DEC1;
                let frac0 = scale / DIG_PER_DEC1;
                let intg0x = intg - intg0 * DIG_PER_DEC1;
                let frac0x = scale - frac0 * DIG_PER_DEC1;
                intg0 * 4 + DIG2BYTES[intg0x as usize] + frac0 * 4 + DIG2BYTES[frac0x as usize]
            }
            ColumnTypes::FLOAT => 4,
            ColumnTypes::DOUBLE => 8,
            ColumnTypes::TINY | ColumnTypes::YEAR => 1,
            ColumnTypes::SHORT => 2,
            ColumnTypes::INT24 | ColumnTypes::NEWDATE | ColumnTypes::TIME => 3,
            ColumnTypes::LONG | ColumnTypes::DATE => 4,
            ColumnTypes::LONGLONG | ColumnTypes::DATETIME => 8,
            ColumnTypes::TIMESTAMP => self.char_length,
            ColumnTypes::TIMESTAMP2 => 4 + (self.datetime_precision + 1) / 2,
            ColumnTypes::TIME2 => 3 + (self.datetime_precision + 1) / 2,
            ColumnTypes::DATETIME2 => 5 + (self.datetime_precision + 1) / 2,
            ColumnTypes::BIT => (self.char_length + 7) / 8,
            ColumnTypes::TYPE_NULL | ColumnTypes::UNDEF => 0,
        }
    }

    /// Storage type the engine assigns, see get_innobase_type_from_mysql_type().
    pub fn se_type(&self) -> SeTypes {
        // ENUM/SET are stored as integers regardless of the collapsed type.
        if self.dd_type == ColumnTypes::ENUM || self.dd_type == ColumnTypes::SET {
            return SeTypes::DATA_INT;
        }

        match self.field_type() {
            ColumnTypes::VARCHAR => {
                if self.is_binary() {
                    SeTypes::DATA_BINARY
                } else if self.collation_id == cst::COLLATION_LATIN1_SWEDISH_CI {
                    SeTypes::DATA_VARCHAR
                } else {
                    SeTypes::DATA_VARMYSQL
                }
            }
            ColumnTypes::BIT | ColumnTypes::STRING => {
                if self.is_binary() {
                    SeTypes::DATA_FIXBINARY
                } else if self.collation_id == cst::COLLATION_LATIN1_SWEDISH_CI {
                    SeTypes::DATA_CHAR
                } else {
                    SeTypes::DATA_MYSQL
                }
            }
            ColumnTypes::NEWDECIMAL => SeTypes::DATA_FIXBINARY,
            ColumnTypes::LONG
            | ColumnTypes::LONGLONG
            | ColumnTypes::TINY
            | ColumnTypes::SHORT
            | ColumnTypes::INT24
            | ColumnTypes::DATE
            | ColumnTypes::YEAR => SeTypes::DATA_INT,
            ColumnTypes::TIME | ColumnTypes::DATETIME | ColumnTypes::TIMESTAMP => {
                // The real dictionary type tells new from legacy temporals.
                match self.dd_type {
                    ColumnTypes::TIME | ColumnTypes::DATETIME | ColumnTypes::TIMESTAMP => {
                        SeTypes::DATA_INT
                    }
                    _ => SeTypes::DATA_FIXBINARY,
                }
            }
            ColumnTypes::FLOAT => SeTypes::DATA_FLOAT,
            ColumnTypes::DOUBLE => SeTypes::DATA_DOUBLE,
            ColumnTypes::DECIMAL => SeTypes::DATA_DECIMAL,
            ColumnTypes::GEOMETRY => SeTypes::DATA_GEOMETRY,
            ColumnTypes::BLOB | ColumnTypes::JSON => SeTypes::DATA_BLOB,
            _ => SeTypes::DATA_MISSING,
        }
    }

    /// Fixed storage length, 0 when the column is variable-length.
    pub fn get_fixed_size(&self) -> u32 {
        match self.mtype {
            SeTypes::DATA_SYS
            | SeTypes::DATA_CHAR
            | SeTypes::DATA_FIXBINARY
            | SeTypes::DATA_INT
            | SeTypes::DATA_FLOAT
            | SeTypes::DATA_DOUBLE
            | SeTypes::DATA_POINT => self.col_len,
            SeTypes::DATA_MYSQL => {
                if self.is_binary() {
                    self.col_len
                } else {
                    let coll = cst::coll_find(self.collation_id);
                    if coll.min_len == coll.max_len {
                        self.col_len
                    } else {
                        0
                    }
                }
            }
            _ => 0,
        }
    }

    pub fn is_instant_added(&self) -> bool {
        self.version_added != VERSION_UNDEF && self.version_added > 0
    }

    pub fn is_instant_dropped(&self) -> bool {
        self.version_dropped != VERSION_UNDEF && self.version_dropped > 0
    }

    pub fn is_dropped_in_or_before(&self, version: u32) -> bool {
        self.is_instant_dropped() && self.version_dropped <= version
    }

    pub fn is_added_after(&self, version: u32) -> bool {
        self.is_instant_added() && self.version_added > version
    }

    /// Columns whose on-record length may take two bytes.
    pub fn is_big_col(&self) -> bool {
        self.col_len > 255
            || matches!(
                self.mtype,
                SeTypes::DATA_BLOB | SeTypes::DATA_VAR_POINT | SeTypes::DATA_GEOMETRY
            )
    }
}

/// One key part as declared in the data dictionary.
#[derive(Debug, Default, Clone)]
pub struct IndexElementDef {
    pub pos: usize,         // ordinal position
    pub ele_len: u32,       // key (prefix) length in bytes
    pub order: IndexOrder,  // ASC/DESC
    pub hidden: bool,       // hidden element
    pub column_opx: usize,  // slot in TableDef::col_defs
}

/// One physical field of a built index.
#[derive(Debug, Default, Clone)]
pub struct IndexFieldDef {
    pub column_opx: usize, // slot in TableDef::col_defs
    pub fixed_len: u32,    // 0 for variable length
}

#[derive(Debug, Default, Clone)]
pub struct IndexDef {
    pub pos: usize,                     // ordinal position
    pub idx_name: String,               // index name
    pub hidden: bool,                   // no explicit primary key when true
    pub is_generated: bool,
    pub comment: String,
    pub idx_type: IndexTypes,           // index type
    pub algorithm: IndexAlgorithm,      // index algorithm
    pub is_visible: bool,
    pub options: Properties,
    pub se_private_data: Properties,
    pub elements: Vec<IndexElementDef>, // declared key parts

    /* table share */
    pub user_defined_key_parts: u32,
    pub key_length: u32,
    pub flags: u32, // HA_* bits

    /* storage engine */
    pub unsupported: u32, // unsupported-reason bits
    pub ib_id: u64,       // index id
    pub ib_page: u32,     // root page number
    pub ib_type: u32,     // DICT_* bits
    pub n_fields: u32,    // physical fields in the current version
    pub n_uniq: u32,      // fields that decide row identity
    pub n_def: u32,       // all defined fields, dropped included
    pub n_nullable: u32,
    pub n_user_defined_cols: u32,
    pub n_instant_nullable: u32,
    pub n_total_fields: u32,
    pub row_versions: bool,
    pub instant_cols: bool,
    pub fields: Vec<IndexFieldDef>, // physical fields in append order
    pub fields_array: Vec<u16>,     // phy_pos -> slot in fields
    pub nullables: Vec<u32>,        // nullable count per row version
}

impl IndexDef {
    pub fn is_clustered(&self) -> bool {
        (self.ib_type & DICT_CLUSTERED) != 0
    }

    pub fn is_unique(&self) -> bool {
        (self.ib_type & DICT_UNIQUE) != 0
    }

    pub fn is_supported(&self) -> bool {
        (self.unsupported & UNSUPP_INDEX_MASK) == 0
    }

    pub fn unsupported_reason(&self) -> String {
        let mut reason = String::new();
        if (self.unsupported & UNSUPP_INDEX_MASK_VIRTUAL) != 0 {
            reason.push_str("[Index using virtual columns as keys]");
        }
        if (self.unsupported & UNSUPP_INDEX_MASK_FTS) != 0 {
            reason.push_str("[Fulltext index]");
        }
        if (self.unsupported & UNSUPP_INDEX_MASK_SPATIAL) != 0 {
            reason.push_str("[Spatial index]");
        }
        reason
    }

    /// All physical fields to decode, dropped columns included once the
    /// table carries row versions.
    pub fn get_n_fields(&self, table: &TableDef) -> u32 {
        if table.has_row_versions() {
            self.n_total_fields
        } else {
            self.n_fields
        }
    }

    /// Field count of the index before any instant ADD/DROP happened.
    pub fn get_n_original_fields(&self, table: &TableDef) -> u32 {
        let n_inst_cols_v1 = table.get_n_instant_added_col_v1();
        let n_drop = table.get_n_instant_drop_cols();
        let n_add = table.get_n_instant_add_cols();
        self.n_fields + n_drop - n_add - n_inst_cols_v1
    }

    pub fn get_n_nullable_before(&self, table: &TableDef, nth: u32) -> u32 {
        let mut nullable = 0;
        for field in self.fields.iter().take(nth as usize) {
            let col = &table.col_defs[field.column_opx];
            if col.is_nullable {
                nullable += 1;
            }
        }
        nullable
    }

    /// Nullable fields a record with `n_fields` stored fields carries.
    pub fn calculate_n_instant_nullable(&self, table: &TableDef, n_fields: u32) -> u32 {
        if !table.has_row_versions() {
            return self.get_n_nullable_before(table, n_fields);
        }

        let mut n_drop_nullable_cols = 0;
        let mut new_n_nullable = 0;
        for field in self.fields.iter().take(self.n_def as usize) {
            let col = &table.col_defs[field.column_opx];
            if col.is_instant_added() {
                continue;
            }
            if col.is_instant_dropped() {
                if col.phy_pos < n_fields && col.is_nullable {
                    n_drop_nullable_cols += 1;
                }
                continue;
            }
            if col.phy_pos < n_fields && col.is_nullable {
                new_n_nullable += 1;
            }
        }
        new_n_nullable + n_drop_nullable_cols
    }

    pub fn has_instant_cols_or_row_versions(&self) -> bool {
        self.is_clustered() && (self.row_versions || self.instant_cols)
    }

    pub fn get_nullable_in_version(&self, version: u32) -> u32 {
        self.nullables[version as usize]
    }

    pub fn get_nullable_before_instant_add_drop(&self) -> u32 {
        if self.instant_cols {
            return self.n_instant_nullable;
        }
        if self.row_versions {
            return self.get_nullable_in_version(0);
        }
        self.n_nullable
    }

    pub fn get_n_unique_in_tree(&self, table: &TableDef) -> u32 {
        if self.is_clustered() {
            self.n_uniq
        } else {
            self.get_n_fields(table)
        }
    }

    pub fn get_n_unique_in_tree_nonleaf(&self, table: &TableDef) -> u32 {
        // Spatial node pointers are a single MBR field; spatial indexes are
        // rejected before record parsing, so the B-tree rule applies.
        self.get_n_unique_in_tree(table)
    }

    /// Field at physical position `pos`, honoring the row-version
    /// permutation when one is active. System tables skip the permutation
    /// build and keep the append order.
    pub fn physical_field(&self, pos: usize) -> &IndexFieldDef {
        if self.row_versions && !self.fields_array.is_empty() {
            return &self.fields[self.fields_array[pos] as usize];
        }
        &self.fields[pos]
    }
}

#[derive(Debug, Default, Clone)]
pub struct TableDef {
    pub schema_ref: String,          // schema name
    pub tab_name: String,            // table name
    pub mysql_version_id: u32,       // server version the table was written by
    pub created: u64,                // creation timestamp
    pub last_altered: u64,           // last alter timestamp
    pub hidden: TableHiddenTypes,
    pub collation_id: u32,
    pub row_format: RowFormats,
    pub partition_type: PartitionTypes,
    pub options: Properties,
    pub se_private_data: Properties,
    pub col_defs: Vec<ColumnDef>,   // column definitions
    pub idx_defs: Vec<IndexDef>,    // index definitions

    /* table share */
    pub s_fields: u32,
    pub s_null_fields: u32,

    /* storage engine */
    pub unsupported: u32, // unsupported-reason bits
    pub ib_id: u64,       // se_private_id
    pub n_cols: u32,      // non-virtual columns, system columns included
    pub n_v_cols: u32,    // virtual columns
    pub n_m_v_cols: u32,  // multi-valued virtual columns
    pub n_t_cols: u32,    // all columns
    pub n_instant_cols: u32, // column count before first old-style instant add
    pub upgraded_instant: bool, // had instant columns before the upgrade
    pub initial_col_count: u32,
    pub current_col_count: u32,
    pub total_col_count: u32,
    pub current_row_version: u32,
    pub n_def: u32,
    pub ib_cols: Vec<usize>, // physical column vector, slots in col_defs
    pub is_system_table: bool,
    pub clust_idx: Option<usize>, // slot in idx_defs
}

impl TableDef {
    pub fn has_row_versions(&self) -> bool {
        self.current_row_version > 0
    }

    pub fn get_total_cols(&self) -> u32 {
        if !self.has_row_versions() {
            return self.n_cols;
        }
        self.n_cols + self.get_n_instant_drop_cols()
    }

    pub fn get_n_instant_add_cols(&self) -> u32 {
        self.total_col_count - self.initial_col_count
    }

    pub fn get_n_instant_drop_cols(&self) -> u32 {
        self.total_col_count - self.current_col_count
    }

    pub fn has_instant_drop_cols(&self) -> bool {
        self.get_n_instant_drop_cols() > 0
    }

    /// Columns added by the pre-row-version INSTANT ADD implementation.
    pub fn get_n_instant_added_col_v1(&self) -> u32 {
        self.n_cols + self.get_n_instant_drop_cols() - self.get_n_instant_add_cols()
            - self.n_instant_cols
    }

    pub fn is_compact(&self) -> bool {
        self.row_format != RowFormats::RF_REDUNDANT
    }

    pub fn has_instant_cols(&self) -> bool {
        self.upgraded_instant || self.n_instant_cols < self.n_cols
    }

    pub fn is_supported(&self) -> bool {
        (self.unsupported & UNSUPP_TABLE_MASK) == 0
    }

    pub fn unsupported_reason(&self) -> String {
        let mut reason = String::new();
        if (self.unsupported & UNSUPP_TABLE_MASK_PARTITION) != 0 {
            reason.push_str("[Partition table]");
        }
        if (self.unsupported & UNSUPP_TABLE_MASK_ENCRYPT) != 0 {
            reason.push_str("[Encrypted table]");
        }
        if (self.unsupported & UNSUPP_TABLE_MASK_FTS_AUX_INDEX) != 0 {
            reason.push_str("[FTS Auxiliary index table]");
        }
        if (self.unsupported & UNSUPP_TABLE_MASK_FTS_COM_INDEX) != 0 {
            reason.push_str("[FTS Common index table]");
        }
        if (self.unsupported & UNSUPP_TABLE_MASK_VERSION) != 0 {
            reason.push_str(&format!(
                "[Table was created in unsupported version {}, expected in [{}, {}]]",
                self.mysql_version_id, SUPPORTED_VERSION_MIN, SUPPORTED_VERSION_MAX
            ));
        }
        reason
    }

    /// Record decoding additionally requires a compact-family row format.
    pub fn is_rec_parsing_supported(&self) -> bool {
        self.is_supported()
            && matches!(self.row_format, RowFormats::RF_DYNAMIC | RowFormats::RF_COMPACT)
    }

    pub fn clust_index(&self) -> Option<&IndexDef> {
        self.clust_idx.map(|i| &self.idx_defs[i])
    }

    pub fn find_column(&self, col_name: &str) -> Option<usize> {
        self.col_defs.iter().position(|c| c.col_name == col_name)
    }
}
