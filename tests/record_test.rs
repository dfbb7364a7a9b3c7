use std::io::Write;
use std::path::PathBuf;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use ibx::errors::IbdError;
use ibx::ibd::page::{
    FIL_PAGE_NEXT, FIL_PAGE_OFFSET, FIL_PAGE_PREV, FIL_PAGE_SPACE_ID, FIL_PAGE_TYPE, PAGE_HEADER,
    PAGE_NEW_INFIMUM, PAGE_NEW_SUPREMUM,
};
use ibx::ibd::record::{RecordStatus, REC_NEW_STATUS, REC_OFFS_MASK, REC_OFFS_SQL_NULL};
use ibx::ibd::walk::Inspector;
use ibx::util;

const PAGE_SIZE: usize = 16 * 1024;
const FIL_NULL: u32 = u32::MAX;

const TABLE_ID: u64 = 1065;
const INDEX_ID: u64 = 330;

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

fn blank_page(page_no: u32, page_type: u16) -> Vec<u8> {
    let mut page = vec![0u8; PAGE_SIZE];
    page[FIL_PAGE_OFFSET..FIL_PAGE_OFFSET + 4].copy_from_slice(&page_no.to_be_bytes());
    page[FIL_PAGE_TYPE..FIL_PAGE_TYPE + 2].copy_from_slice(&page_type.to_be_bytes());
    page
}

fn fsp_page0() -> Vec<u8> {
    let mut page = blank_page(0, 8);
    page[FIL_PAGE_SPACE_ID..FIL_PAGE_SPACE_ID + 4].copy_from_slice(&42u32.to_be_bytes());
    // post_antelope + atomic_blobs + sdi, 16 KiB pages
    page[38 + 16..38 + 20].copy_from_slice(&0x4021u32.to_be_bytes());
    // SDI root page number
    page[10509..10513].copy_from_slice(&3u32.to_be_bytes());
    page
}

/// `a INT NOT NULL PRIMARY KEY, b VARCHAR(10) NULL` on utf8mb4, as the
/// server serializes it into the SDI.
fn table_sdi_json() -> String {
    r#"{
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
            "se_private_data": "autoinc=0;version=0;",
            "row_format": 2,
            "partition_type": 0,
            "collation_id": 255,
            "columns": [
                {"name": "a", "type": 4, "is_nullable": false, "hidden": 1,
                 "ordinal_position": 1, "char_length": 11, "column_key": 2,
                 "column_type_utf8": "int", "collation_id": 255,
                 "se_private_data": "table_id=1065;"},
                {"name": "b", "type": 16, "is_nullable": true, "hidden": 1,
                 "ordinal_position": 2, "char_length": 40, "column_key": 1,
                 "column_type_utf8": "varchar(10)", "collation_id": 255,
                 "se_private_data": "table_id=1065;"},
                {"name": "DB_TRX_ID", "type": 10, "is_nullable": false, "hidden": 2,
                 "ordinal_position": 3, "char_length": 6, "column_key": 1,
                 "column_type_utf8": "", "collation_id": 63,
                 "se_private_data": "table_id=1065;"},
                {"name": "DB_ROLL_PTR", "type": 9, "is_nullable": false, "hidden": 2,
                 "ordinal_position": 4, "char_length": 7, "column_key": 1,
                 "column_type_utf8": "", "collation_id": 63,
                 "se_private_data": "table_id=1065;"}
            ],
            "indexes": [
                {"name": "PRIMARY", "hidden": false, "ordinal_position": 1,
                 "type": 1, "algorithm": 2, "is_visible": true, "engine": "InnoDB",
                 "se_private_data": "id=330;root=4;space_id=42;table_id=1065;trx_id=2570;",
                 "elements": [
                    {"ordinal_position": 1, "length": 4, "order": 2,
                     "hidden": false, "column_opx": 0},
                    {"ordinal_position": 2, "length": 4294967295, "order": 2,
                     "hidden": true, "column_opx": 2},
                    {"ordinal_position": 3, "length": 4294967295, "order": 2,
                     "hidden": true, "column_opx": 3},
                    {"ordinal_position": 4, "length": 4294967295, "order": 2,
                     "hidden": true, "column_opx": 1}
                 ]}
            ]
        }
    }"#
    .to_string()
}

fn sdi_leaf_page(page_no: u32, sdi_id: u64, comp: &[u8], uncomp_len: u32) -> Vec<u8> {
    let mut page = blank_page(page_no, 17853);
    page[PAGE_NEW_INFIMUM..PAGE_NEW_INFIMUM + 7].copy_from_slice(b"infimum");
    page[PAGE_NEW_INFIMUM - REC_NEW_STATUS] = RecordStatus::REC_STATUS_INFIMUM as u8;
    page[PAGE_NEW_SUPREMUM..PAGE_NEW_SUPREMUM + 8].copy_from_slice(b"supremum");
    page[PAGE_NEW_SUPREMUM - REC_NEW_STATUS] = RecordStatus::REC_STATUS_SUPREMUM as u8;
    page[FIL_PAGE_NEXT..FIL_PAGE_NEXT + 4].copy_from_slice(&FIL_NULL.to_be_bytes());
    page[FIL_PAGE_PREV..FIL_PAGE_PREV + 4].copy_from_slice(&FIL_NULL.to_be_bytes());
    page[PAGE_HEADER + 16..PAGE_HEADER + 18].copy_from_slice(&1u16.to_be_bytes());

    let pos = 200usize;
    if comp.len() < 128 {
        page[pos - 6] = comp.len() as u8;
    } else {
        page[pos - 6] = 0x80 | ((comp.len() >> 8) as u8 & 0x3f);
        page[pos - 7] = (comp.len() & 0xff) as u8;
    }
    page[pos - 3] = 0; // ordinary record
    page[pos..pos + 4].copy_from_slice(&1u32.to_be_bytes());
    page[pos + 4..pos + 12].copy_from_slice(&sdi_id.to_be_bytes());
    page[pos + 25..pos + 29].copy_from_slice(&uncomp_len.to_be_bytes());
    page[pos + 29..pos + 33].copy_from_slice(&(comp.len() as u32).to_be_bytes());
    page[pos + 33..pos + 33 + comp.len()].copy_from_slice(comp);

    let delta = (pos - PAGE_NEW_INFIMUM) as u16;
    page[PAGE_NEW_INFIMUM - 2..PAGE_NEW_INFIMUM].copy_from_slice(&delta.to_be_bytes());
    let delta = (PAGE_NEW_SUPREMUM as i64 - pos as i64) as u16;
    page[pos - 2..pos].copy_from_slice(&delta.to_be_bytes());
    page
}

struct RowSpec {
    a: u32,
    b: Option<&'static [u8]>,
    deleted: bool,
}

/// Lay out compact user records for (a, b) rows: the variable length byte,
/// the null bitmap, the 5-byte header, then a / DB_TRX_ID / DB_ROLL_PTR / b.
fn index_leaf_page(page_no: u32, rows: &[RowSpec]) -> Vec<u8> {
    let mut page = blank_page(page_no, 17855);
    page[FIL_PAGE_PREV..FIL_PAGE_PREV + 4].copy_from_slice(&FIL_NULL.to_be_bytes());
    page[FIL_PAGE_NEXT..FIL_PAGE_NEXT + 4].copy_from_slice(&FIL_NULL.to_be_bytes());
    page[PAGE_NEW_INFIMUM..PAGE_NEW_INFIMUM + 7].copy_from_slice(b"infimum");
    page[PAGE_NEW_INFIMUM - REC_NEW_STATUS] = RecordStatus::REC_STATUS_INFIMUM as u8;
    page[PAGE_NEW_SUPREMUM..PAGE_NEW_SUPREMUM + 8].copy_from_slice(b"supremum");
    page[PAGE_NEW_SUPREMUM - REC_NEW_STATUS] = RecordStatus::REC_STATUS_SUPREMUM as u8;

    // page header: 2 dir slots, heap top, compact flag, record count
    page[PAGE_HEADER..PAGE_HEADER + 2].copy_from_slice(&2u16.to_be_bytes());
    page[PAGE_HEADER + 2..PAGE_HEADER + 4].copy_from_slice(&400u16.to_be_bytes());
    let n_heap = 0x8000u16 | (2 + rows.len() as u16);
    page[PAGE_HEADER + 4..PAGE_HEADER + 6].copy_from_slice(&n_heap.to_be_bytes());
    page[PAGE_HEADER + 16..PAGE_HEADER + 18]
        .copy_from_slice(&(rows.len() as u16).to_be_bytes());
    page[PAGE_HEADER + 28..PAGE_HEADER + 36].copy_from_slice(&INDEX_ID.to_be_bytes());

    let mut origins = Vec::new();
    let mut pos = 200usize;
    for row in rows {
        match row.b {
            Some(b) => {
                page[pos - 7] = b.len() as u8; // variable length area
                page[pos - 6] = 0x00; // null bitmap
            }
            None => {
                page[pos - 6] = 0x01; // b is NULL
            }
        }
        if row.deleted {
            page[pos - 5] = 0x20;
        }
        page[pos - 3] = 0; // ordinary record
        page[pos..pos + 4].copy_from_slice(&row.a.to_be_bytes());
        // DB_TRX_ID and DB_ROLL_PTR stay zero
        if let Some(b) = row.b {
            page[pos + 17..pos + 17 + b.len()].copy_from_slice(b);
        }
        origins.push(pos);
        pos += 60;
    }

    let mut prev = PAGE_NEW_INFIMUM;
    for &origin in &origins {
        let delta = (origin - prev) as u16;
        page[prev - 2..prev].copy_from_slice(&delta.to_be_bytes());
        prev = origin;
    }
    let delta = (PAGE_NEW_SUPREMUM as i64 - prev as i64) as u16;
    page[prev - 2..prev].copy_from_slice(&delta.to_be_bytes());
    page
}

fn write_space(name: &str, pages: Vec<Vec<u8>>) -> PathBuf {
    let path = std::env::temp_dir().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    for page in pages {
        f.write_all(&page).unwrap();
    }
    drop(f);
    path
}

fn build_space(name: &str, extra_pages: Vec<Vec<u8>>) -> PathBuf {
    let json = table_sdi_json();
    let comp = zlib(json.as_bytes());
    let mut pages = vec![
        fsp_page0(),
        blank_page(1, 0),
        blank_page(2, 0),
        sdi_leaf_page(3, 7, &comp, json.len() as u32),
    ];
    pages.extend(extra_pages);
    write_space(name, pages)
}

#[test]
fn loads_dictionary_from_sdi() {
    util::init_unit_test();
    let leaf = index_leaf_page(
        4,
        &[RowSpec {
            a: 1,
            b: Some(b"x"),
            deleted: false,
        }],
    );
    let path = build_space("ibx_it_load.ibd", vec![leaf]);

    let inspector = Inspector::load(path.clone()).unwrap();
    assert_eq!(inspector.tables.len(), 1);
    let table = inspector.tables.get(&TABLE_ID).unwrap();
    assert_eq!(table.tab_name, "t1");
    assert!(table.is_rec_parsing_supported());

    let (table, index) = inspector.get_index(INDEX_ID).unwrap();
    assert_eq!(index.idx_name, "PRIMARY");
    assert_eq!(index.ib_page, 4);
    // a, DB_TRX_ID, DB_ROLL_PTR, b
    assert_eq!(index.get_n_fields(table.as_ref()), 4);

    std::fs::remove_file(path).ok();
}

#[test]
fn parses_leaf_records_and_nulls() {
    util::init_unit_test();
    let leaf = index_leaf_page(
        4,
        &[
            RowSpec { a: 1, b: Some(b"x"), deleted: false },
            RowSpec { a: 2, b: None, deleted: false },
            RowSpec { a: 3, b: Some(b"yyy"), deleted: false },
        ],
    );
    let path = build_space("ibx_it_rows.ibd", vec![leaf]);
    let inspector = Inspector::load(path.clone()).unwrap();

    let report = inspector.parse_page(4, None, true).unwrap();
    assert!(report.leaf);
    assert_eq!(report.records.len(), 3);
    assert_eq!(report.stats.n_recs_leaf, 3);
    assert_eq!(report.stats.n_deleted_recs_leaf, 0);
    // headers: 7 + 6 + 7; bodies: 18 + 17 + 20
    assert_eq!(report.stats.headers_len_leaf, 20);
    assert_eq!(report.stats.recs_len_leaf, 55);
    // free space: garbage(0) + page - dir(8) - 2 slots - heap top(400)
    assert_eq!(report.stats.free_leaf, 15972);

    let row2 = &report.records[1];
    assert_eq!(row2.fields[0].name, "a");
    assert_eq!(row2.fields[3].name, "b");
    assert_ne!(row2.fields[3].word & REC_OFFS_SQL_NULL, 0);
    // a NULL keeps the previous field's end offset
    assert_eq!(row2.fields[3].word & REC_OFFS_MASK, 17);

    let row3 = &report.records[2];
    assert_eq!(row3.fields[3].bytes.as_ref().unwrap().as_ref(), b"yyy");

    // offsets monotonicity over every decoded record
    for rec in &report.records {
        let mut prev = 0;
        for field in &rec.fields {
            let end = field.word & REC_OFFS_MASK;
            assert!(end >= prev);
            assert!(end as usize <= PAGE_SIZE);
            prev = end;
        }
    }

    std::fs::remove_file(path).ok();
}

#[test]
fn accounts_delete_marked_records() {
    util::init_unit_test();
    let leaf = index_leaf_page(
        4,
        &[
            RowSpec { a: 1, b: Some(b"x"), deleted: false },
            RowSpec { a: 2, b: Some(b"yy"), deleted: true },
        ],
    );
    let path = build_space("ibx_it_deleted.ibd", vec![leaf]);
    let inspector = Inspector::load(path.clone()).unwrap();

    let report = inspector.parse_page(4, None, true).unwrap();
    assert_eq!(report.stats.n_recs_leaf, 1);
    assert_eq!(report.stats.n_deleted_recs_leaf, 1);
    // the deleted row: 7 header bytes + 4 + 6 + 7 + 2 body bytes
    assert_eq!(report.stats.deleted_recs_len_leaf, 26);
    assert!(report.records[1].deleted);

    std::fs::remove_file(path).ok();
}

#[test]
fn walks_single_level_index() {
    util::init_unit_test();
    let leaf = index_leaf_page(
        4,
        &[
            RowSpec { a: 1, b: Some(b"x"), deleted: false },
            RowSpec { a: 2, b: None, deleted: false },
        ],
    );
    let path = build_space("ibx_it_index.ibd", vec![leaf]);
    let inspector = Inspector::load(path.clone()).unwrap();

    let (table, index) = inspector.get_index(INDEX_ID).unwrap();
    assert_eq!(
        inspector.leftmost_pages(table.as_ref(), index).unwrap(),
        vec![4]
    );

    let report = inspector.parse_index(INDEX_ID).unwrap();
    assert_eq!(report.stats.n_levels, 1);
    assert_eq!(report.stats.n_pages_leaf, 1);
    assert_eq!(report.stats.n_pages_non_leaf, 0);
    assert_eq!(report.stats.recs.n_recs_leaf, 2);

    let reports = inspector.parse_table(TABLE_ID).unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].index_name, "PRIMARY");

    std::fs::remove_file(path).ok();
}

#[test]
fn corrupt_infimum_aborts_the_session() {
    util::init_unit_test();
    let json = table_sdi_json();
    let comp = zlib(json.as_bytes());
    let mut sdi_page = sdi_leaf_page(3, 7, &comp, json.len() as u32);
    sdi_page[PAGE_NEW_INFIMUM] = b'X';

    let path = write_space(
        "ibx_it_corrupt.ibd",
        vec![fsp_page0(), blank_page(1, 0), blank_page(2, 0), sdi_page],
    );

    let err = Inspector::load(path.clone()).unwrap_err();
    assert!(matches!(err, IbdError::CorruptPage { page_no: 3, .. }));

    std::fs::remove_file(path).ok();
}
