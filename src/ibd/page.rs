use bytes::Bytes;
use num_enum::FromPrimitive;
use strum::Display;

use crate::util;

// FIL header, the first 38 bytes of every page.
pub const FIL_PAGE_SPACE_OR_CHKSUM: usize = 0;
pub const FIL_PAGE_OFFSET: usize = 4;
pub const FIL_PAGE_PREV: usize = 8;
pub const FIL_PAGE_SRV_VERSION: usize = 8;
pub const FIL_PAGE_NEXT: usize = 12;
pub const FIL_PAGE_SPACE_VERSION: usize = 12;
pub const FIL_PAGE_LSN: usize = 16;
pub const FIL_PAGE_TYPE: usize = 24;
pub const FIL_PAGE_FILE_FLUSH_LSN: usize = 26;
pub const FIL_PAGE_SPACE_ID: usize = 34;
pub const FIL_PAGE_DATA: usize = 38;
// FIL trailer, the last 8 bytes: checksum + low half of the LSN.
pub const FIL_PAGE_DATA_END: usize = 8;
pub const FIL_PAGE_END_LSN_OLD_CHKSUM: usize = 8;
pub const FIL_NULL: u32 = u32::MAX;

// Index page header, at FIL_PAGE_DATA.
pub const PAGE_HEADER: usize = FIL_PAGE_DATA;
pub const PAGE_N_DIR_SLOTS: usize = 0;
pub const PAGE_HEAP_TOP: usize = 2;
pub const PAGE_N_HEAP: usize = 4;
pub const PAGE_FREE: usize = 6;
pub const PAGE_GARBAGE: usize = 8;
pub const PAGE_LAST_INSERT: usize = 10;
pub const PAGE_DIRECTION: usize = 12;
pub const PAGE_N_DIRECTION: usize = 14;
pub const PAGE_N_RECS: usize = 16;
pub const PAGE_MAX_TRX_ID: usize = 18;
pub const PAGE_LEVEL: usize = 26;
pub const PAGE_INDEX_ID: usize = 28;

pub const FSEG_HEADER_SIZE: usize = 10;
pub const PAGE_DATA: usize = PAGE_HEADER + 36 + 2 * FSEG_HEADER_SIZE;
pub const PAGE_NEW_INFIMUM: usize = PAGE_DATA + 5;
pub const PAGE_NEW_SUPREMUM: usize = PAGE_DATA + 2 * 5 + 8;
pub const PAGE_NEW_SUPREMUM_END: usize = PAGE_NEW_SUPREMUM + 8;

// Page directory, grows downwards from the FIL trailer.
pub const PAGE_DIR: usize = FIL_PAGE_DATA_END;
pub const PAGE_DIR_SLOT_SIZE: usize = 2;

#[repr(u16)]
#[allow(non_camel_case_types)]
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Display, FromPrimitive, Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
pub enum PageTypes {
    ALLOCATED = 0,
    UNUSED = 1,
    UNDO_LOG = 2,
    INODE = 3,
    IBUF_FREE_LIST = 4,
    IBUF_BITMAP = 5,
    SYS = 6,
    TRX_SYS = 7,
    FSP_HDR = 8,
    XDES = 9,
    BLOB = 10,
    ZBLOB = 11,
    ZBLOB2 = 12,
    UNKNOWN = 13,
    COMPRESSED = 14,
    ENCRYPTED = 15,
    COMPRESSED_AND_ENCRYPTED = 16,
    ENCRYPTED_RTREE = 17,
    SDI_BLOB = 18,
    SDI_ZBLOB = 19,
    LEGACY_DBLWR = 20,
    RSEG_ARRAY = 21,
    LOB_INDEX = 22,
    LOB_DATA = 23,
    LOB_FIRST = 24,
    ZLOB_FIRST = 25,
    ZLOB_DATA = 26,
    ZLOB_INDEX = 27,
    ZLOB_FRAG = 28,
    ZLOB_FRAG_ENTRY = 29,
    RTREE = 17854,
    SDI = 17853,
    INDEX = 17855,
    #[default]
    UNDEF,
}

/// FIL header of a page.
#[derive(Debug, Clone)]
pub struct FilPageHeader {
    pub check_sum: u32,      // page checksum
    pub page_no: u32,        // page number
    pub prev_page: u32,      // previous page on the same level, FIL_NULL if none
    pub next_page: u32,      // next page on the same level, FIL_NULL if none
    pub lsn: u64,            // LSN of the last page modification
    pub page_type: PageTypes,
    pub flush_lsn: u64,      // only meaningful on page 0
    pub space_id: u32,
}

impl FilPageHeader {
    pub fn new(buf: &Bytes) -> Self {
        Self {
            check_sum: util::u32_val(buf, FIL_PAGE_SPACE_OR_CHKSUM),
            page_no: util::u32_val(buf, FIL_PAGE_OFFSET),
            prev_page: util::u32_val(buf, FIL_PAGE_PREV),
            next_page: util::u32_val(buf, FIL_PAGE_NEXT),
            lsn: util::u64_val(buf, FIL_PAGE_LSN),
            page_type: util::u16_val(buf, FIL_PAGE_TYPE).into(),
            flush_lsn: util::u64_val(buf, FIL_PAGE_FILE_FLUSH_LSN),
            space_id: util::u32_val(buf, FIL_PAGE_SPACE_ID),
        }
    }

    /// On page 0 the prev/next slots hold the server and space versions.
    pub fn server_version(&self) -> u32 {
        self.prev_page
    }

    pub fn space_version(&self) -> u32 {
        self.next_page
    }
}

/// Index page header, present on INDEX and SDI pages.
#[derive(Debug, Clone)]
pub struct IndexPageHeader {
    pub n_dir_slots: u16,  // number of directory slots
    pub heap_top: u16,     // record heap top
    pub n_heap: u16,       // heap record count, high bit masked off
    pub compact: bool,     // high bit of PAGE_N_HEAP
    pub free: u16,         // first garbage record offset, 0 if none
    pub garbage: u16,      // bytes in deleted records
    pub last_insert: u16,
    pub direction: u16,
    pub n_direction: u16,
    pub n_recs: u16,       // user records on the page
    pub max_trx_id: u64,
    pub level: u16,        // 0 for leaf pages
    pub index_id: u64,
}

impl IndexPageHeader {
    pub fn new(buf: &Bytes) -> Self {
        let n_heap_raw = util::u16_val(buf, PAGE_HEADER + PAGE_N_HEAP);
        Self {
            n_dir_slots: util::u16_val(buf, PAGE_HEADER + PAGE_N_DIR_SLOTS),
            heap_top: util::u16_val(buf, PAGE_HEADER + PAGE_HEAP_TOP),
            n_heap: n_heap_raw & 0x7fff,
            compact: (n_heap_raw & 0x8000) != 0,
            free: util::u16_val(buf, PAGE_HEADER + PAGE_FREE),
            garbage: util::u16_val(buf, PAGE_HEADER + PAGE_GARBAGE),
            last_insert: util::u16_val(buf, PAGE_HEADER + PAGE_LAST_INSERT),
            direction: util::u16_val(buf, PAGE_HEADER + PAGE_DIRECTION),
            n_direction: util::u16_val(buf, PAGE_HEADER + PAGE_N_DIRECTION),
            n_recs: util::u16_val(buf, PAGE_HEADER + PAGE_N_RECS),
            max_trx_id: util::u64_val(buf, PAGE_HEADER + PAGE_MAX_TRX_ID),
            level: util::u16_val(buf, PAGE_HEADER + PAGE_LEVEL),
            index_id: util::u64_val(buf, PAGE_HEADER + PAGE_INDEX_ID),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.level == 0
    }
}

pub fn page_type(buf: &[u8]) -> PageTypes {
    util::u16_val(buf, FIL_PAGE_TYPE).into()
}

pub fn page_level(buf: &[u8]) -> u16 {
    util::u16_val(buf, PAGE_HEADER + PAGE_LEVEL)
}

pub fn page_n_recs(buf: &[u8]) -> u16 {
    util::u16_val(buf, PAGE_HEADER + PAGE_N_RECS)
}

pub fn page_is_compact(buf: &[u8]) -> bool {
    (util::u16_val(buf, PAGE_HEADER + PAGE_N_HEAP) & 0x8000) != 0
}

/// The low halves of the header LSN and the trailer LSN must agree.
pub fn page_lsn_consistent(buf: &[u8], logical_size: usize) -> bool {
    let hdr = &buf[FIL_PAGE_LSN + 4..FIL_PAGE_LSN + 8];
    let trl_at = logical_size - FIL_PAGE_END_LSN_OLD_CHKSUM + 4;
    let trl = &buf[trl_at..trl_at + 4];
    hdr == trl
}

#[cfg(test)]
mod page_tests {
    use super::*;
    use crate::util;

    fn setup() {
        util::init_unit_test();
    }

    #[test]
    fn sentinel_offsets() {
        setup();
        assert_eq!(PAGE_DATA, 94);
        assert_eq!(PAGE_NEW_INFIMUM, 99);
        assert_eq!(PAGE_NEW_SUPREMUM, 112);
        assert_eq!(PAGE_NEW_SUPREMUM_END, 120);
    }

    #[test]
    fn parse_fil_header() {
        setup();
        let mut page = vec![0u8; 16 * 1024];
        page[FIL_PAGE_OFFSET..FIL_PAGE_OFFSET + 4].copy_from_slice(&7u32.to_be_bytes());
        page[FIL_PAGE_TYPE..FIL_PAGE_TYPE + 2].copy_from_slice(&17855u16.to_be_bytes());
        page[FIL_PAGE_SPACE_ID..FIL_PAGE_SPACE_ID + 4].copy_from_slice(&3u32.to_be_bytes());
        page[FIL_PAGE_NEXT..FIL_PAGE_NEXT + 4].copy_from_slice(&u32::MAX.to_be_bytes());
        let buf = Bytes::from(page);
        let hdr = FilPageHeader::new(&buf);
        assert_eq!(hdr.page_no, 7);
        assert_eq!(hdr.page_type, PageTypes::INDEX);
        assert_eq!(hdr.space_id, 3);
        assert_eq!(hdr.next_page, FIL_NULL);
    }

    #[test]
    fn lsn_consistency() {
        setup();
        let size = 16 * 1024;
        let mut page = vec![0u8; size];
        page[FIL_PAGE_LSN..FIL_PAGE_LSN + 8].copy_from_slice(&0x1122334455667788u64.to_be_bytes());
        page[size - 8..].copy_from_slice(&[0, 0, 0, 0, 0x55, 0x66, 0x77, 0x88]);
        assert!(page_lsn_consistent(&page, size));
        page[size - 1] = 0;
        assert!(!page_lsn_consistent(&page, size));
    }
}
