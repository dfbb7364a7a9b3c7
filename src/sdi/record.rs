use std::collections::HashMap;

use num_enum::FromPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_repr::{Deserialize_repr, Serialize_repr};
use strum::{Display, EnumString};

/// SDI document of type "Table", see sql/dd/impl/sdi.cc
#[derive(Debug, Deserialize, Serialize)]
pub struct SdiObject {
    pub dd_object: DataDictObject,
    pub mysqld_version_id: u32,
    pub dd_version: u32,
    pub sdi_version: u32,
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

/// see sql/dd/impl/types/table_impl.h, class Table_impl
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DataDictObject {
    pub name: String,
    pub mysql_version_id: u32,
    pub created: u64,
    pub last_altered: u64,
    pub hidden: TableHiddenTypes,
    pub options: String,
    pub schema_ref: String,
    pub se_private_id: u64,
    pub engine: String,
    pub comment: String,
    pub se_private_data: String,
    pub row_format: RowFormats,
    pub partition_type: PartitionTypes,
    pub collation_id: u32,
    pub columns: Vec<DataDictColumn>,
    pub indexes: Vec<DataDictIndex>,
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

// see sql/dd/types/column.h
//     enum class enum_column_types
#[repr(u8)]
#[allow(non_camel_case_types)]
#[allow(clippy::upper_case_acronyms)]
#[derive(
    Deserialize_repr, Serialize_repr, EnumString, FromPrimitive, Debug, Display, Default, Clone, Copy, PartialEq, Eq,
)]
pub enum ColumnTypes {
    DECIMAL = 1,
    TINY = 2,
    SHORT = 3,
    LONG = 4,
    FLOAT = 5,
    DOUBLE = 6,
    TYPE_NULL = 7,
    TIMESTAMP = 8,
    LONGLONG = 9,
    INT24 = 10,
    DATE = 11,
    TIME = 12,
    DATETIME = 13,
    YEAR = 14,
    NEWDATE = 15,
    VARCHAR = 16,
    BIT = 17,
    TIMESTAMP2 = 18,
    DATETIME2 = 19,
    TIME2 = 20,
    NEWDECIMAL = 21,
    ENUM = 22,
    SET = 23,
    TINY_BLOB = 24,
    MEDIUM_BLOB = 25,
    LONG_BLOB = 26,
    BLOB = 27,
    VAR_STRING = 28,
    STRING = 29,
    GEOMETRY = 30,
    JSON = 31,
    #[default]
    UNDEF,
}

// see sql/dd/types/column.h
//     enum class enum_hidden_type
#[repr(u8)]
#[allow(non_camel_case_types)]
#[derive(
    Deserialize_repr, Serialize_repr, EnumString, FromPrimitive, Debug, Display, Default, Clone, Copy, PartialEq, Eq,
)]
pub enum HiddenTypes {
    /// The column is visible (a normal column)
    HT_VISIBLE = 1,
    /// The column is completely invisible to the server
    HT_HIDDEN_SE = 2,
    /// The column is visible to the server, but hidden from the user.
    /// This is used for i.e. implementing functional indexes.
    HT_HIDDEN_SQL = 3,
    /// User table column marked as INVISIBLE by using the column visibility
    /// attribute. Column is visible to the server.
    HT_HIDDEN_USER = 4,
    #[default]
    UNDEF,
}

// see sql/dd/types/column.h
//     enum class enum_column_key
#[repr(u8)]
#[allow(non_camel_case_types)]
#[derive(
    Deserialize_repr, Serialize_repr, EnumString, FromPrimitive, Debug, Display, Default, Clone, Copy, PartialEq, Eq,
)]
pub enum ColumnKeys {
    CK_NONE = 1,
    CK_PRIMARY = 2,
    CK_UNIQUE = 3,
    CK_MULTIPLE = 4,
    #[default]
    UNDEF,
}

/// see sql/dd/impl/types/column_impl.h, class Column_impl
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DataDictColumn {
    pub ordinal_position: u32,
    #[serde(rename = "name")]
    pub col_name: String,
    #[serde(rename = "type")]
    pub dd_type: ColumnTypes,
    pub is_nullable: bool,
    pub is_zerofill: bool,
    pub is_unsigned: bool,
    pub is_auto_increment: bool,
    pub is_virtual: bool,
    pub hidden: HiddenTypes,
    pub char_length: u32,
    pub numeric_precision: u32,
    pub numeric_scale: u32,
    pub numeric_scale_null: bool,
    pub datetime_precision: u32,
    pub datetime_precision_null: bool,
    pub has_no_default: bool,
    pub default_value_null: bool,
    pub default_value: String,
    pub default_value_utf8_null: bool,
    pub default_value_utf8: String,
    pub comment: String,
    pub options: String,
    pub se_private_data: String,
    pub column_key: ColumnKeys,
    pub column_type_utf8: String,
    pub elements: Vec<DataDictColumnElement>,
    pub collation_id: u32,
    pub is_explicit_collation: bool,
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

/// Only the element count matters downstream (ENUM/SET storage sizing).
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DataDictColumnElement {
    pub index: u32,
    pub name: String,
}

// see sql/dd/types/index.h
//     enum class enum_index_type
#[repr(u8)]
#[allow(non_camel_case_types)]
#[derive(
    Deserialize_repr, Serialize_repr, EnumString, FromPrimitive, Debug, Display, Default, Clone, Copy, PartialEq, Eq,
)]
pub enum IndexTypes {
    IT_PRIMARY = 1,
    IT_UNIQUE = 2,
    IT_MULTIPLE = 3,
    IT_FULLTEXT = 4,
    IT_SPATIAL = 5,
    #[default]
    UNDEF,
}

// see sql/dd/types/index.h
//     enum class enum_index_algorithm
#[repr(u8)]
#[allow(non_camel_case_types)]
#[derive(
    Deserialize_repr, Serialize_repr, EnumString, FromPrimitive, Debug, Display, Default, Clone, Copy, PartialEq, Eq,
)]
pub enum IndexAlgorithm {
    IA_SE_SPECIFIC = 1,
    IA_BTREE = 2,
    IA_RTREE = 3,
    IA_HASH = 4,
    IA_FULLTEXT = 5,
    #[default]
    UNDEF,
}

// see sql/dd/types/index_element.h
//     enum class enum_index_element_order
#[repr(u8)]
#[allow(non_camel_case_types)]
#[derive(
    Deserialize_repr, Serialize_repr, EnumString, FromPrimitive, Debug, Display, Default, Clone, Copy, PartialEq, Eq,
)]
pub enum IndexOrder {
    #[default]
    ORDER_UNDEF = 1,
    ORDER_ASC = 2,
    ORDER_DESC = 3,
}

// see sql/dd/types/table.h
//     enum class enum_hidden_type
#[repr(u8)]
#[allow(non_camel_case_types)]
#[derive(
    Deserialize_repr, Serialize_repr, EnumString, FromPrimitive, Debug, Display, Default, Clone, Copy, PartialEq, Eq,
)]
pub enum TableHiddenTypes {
    #[default]
    HT_VISIBLE = 1,
    HT_HIDDEN_SYSTEM = 2,
    HT_HIDDEN_SE = 3,
    HT_HIDDEN_DDL = 4,
}

// see sql/dd/types/table.h
//     enum class enum_row_format
#[repr(u8)]
#[allow(non_camel_case_types)]
#[derive(
    Deserialize_repr, Serialize_repr, EnumString, FromPrimitive, Debug, Display, Default, Clone, Copy, PartialEq, Eq,
)]
pub enum RowFormats {
    RF_FIXED = 1,
    #[default]
    RF_DYNAMIC = 2,
    RF_COMPRESSED = 3,
    RF_REDUNDANT = 4,
    RF_COMPACT = 5,
    RF_PAGED = 6,
}

// see sql/dd/types/table.h
//     enum class enum_partition_type
#[repr(u8)]
#[allow(non_camel_case_types)]
#[derive(
    Deserialize_repr, Serialize_repr, EnumString, FromPrimitive, Debug, Display, Default, Clone, Copy, PartialEq, Eq,
)]
pub enum PartitionTypes {
    #[default]
    PT_NONE = 0,
    PT_HASH = 1,
    PT_KEY_51 = 2,
    PT_KEY_55 = 3,
    PT_LINEAR_HASH = 4,
    PT_LINEAR_KEY_51 = 5,
    PT_LINEAR_KEY_55 = 6,
    PT_RANGE = 7,
    PT_LIST = 8,
    PT_RANGE_COLUMNS = 9,
    PT_LIST_COLUMNS = 10,
    PT_AUTO = 11,
    PT_AUTO_LINEAR = 12,
}

/// see sql/dd/impl/types/index_impl.h, class Index_impl
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DataDictIndex {
    pub ordinal_position: u32,
    pub name: String,
    pub hidden: bool,
    pub is_generated: bool,
    pub comment: String,
    pub options: String,
    pub se_private_data: String,
    #[serde(rename = "type")]
    pub idx_type: IndexTypes,
    pub algorithm: IndexAlgorithm,
    pub is_algorithm_explicit: bool,
    pub is_visible: bool,
    pub engine: String,
    pub elements: Vec<DataDictIndexElement>,
    pub tablespace_ref: String,
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

/// see write_opx_reference(w, m_column, STRING_WITH_LEN("column_opx"));
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DataDictIndexElement {
    pub ordinal_position: u32,
    pub length: u32,
    pub order: IndexOrder,
    pub hidden: bool,
    pub column_opx: u32,
}

#[cfg(test)]
mod record_tests {
    use super::*;
    use crate::util;

    fn setup() {
        util::init_unit_test();
    }

    #[test]
    fn parse_minimal_table_object() {
        setup();
        let doc = r#"{
            "mysqld_version_id": 80032,
            "dd_version": 80023,
            "sdi_version": 80019,
            "dd_object_type": "Table",
            "dd_object": {
                "name": "t1",
                "mysql_version_id": 80032,
                "schema_ref": "test",
                "hidden": 1,
                "se_private_id": 1065,
                "row_format": 2,
                "partition_type": 0,
                "collation_id": 255,
                "columns": [
                    {
                        "name": "a",
                        "type": 4,
                        "is_nullable": false,
                        "hidden": 1,
                        "ordinal_position": 1,
                        "char_length": 11,
                        "column_key": 2,
                        "column_type_utf8": "int",
                        "collation_id": 255,
                        "elements": [],
                        "se_private_data": "table_id=1065;"
                    }
                ],
                "indexes": [
                    {
                        "name": "PRIMARY",
                        "hidden": false,
                        "ordinal_position": 1,
                        "type": 1,
                        "algorithm": 2,
                        "is_visible": true,
                        "engine": "InnoDB",
                        "se_private_data": "id=330;root=4;",
                        "elements": [
                            {"ordinal_position": 1, "length": 4, "order": 2, "hidden": false, "column_opx": 0}
                        ]
                    }
                ]
            }
        }"#;
        let obj: SdiObject = serde_json::from_str(doc).unwrap();
        assert_eq!(obj.dd_object.name, "t1");
        assert_eq!(obj.dd_object.columns[0].dd_type, ColumnTypes::LONG);
        assert_eq!(obj.dd_object.indexes[0].idx_type, IndexTypes::IT_PRIMARY);
        assert_eq!(obj.dd_object.row_format, RowFormats::RF_DYNAMIC);
    }
}
