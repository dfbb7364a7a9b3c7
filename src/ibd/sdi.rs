use bytes::Bytes;
use log::{debug, warn};
use serde_json::Value;

use crate::errors::{IbdError, Result};
use crate::ibd::page::{
    page_type, FilPageHeader, PageTypes, FIL_NULL, FIL_PAGE_DATA, FIL_PAGE_NEXT, PAGE_HEADER,
    PAGE_LEVEL, PAGE_NEW_INFIMUM, PAGE_N_RECS,
};
use crate::ibd::record::{rec_is_deleted, rec_next_offs, rec_status, RecordStatus, REC_OFF_NEXT};
use crate::ibd::tabspace::Tablespace;
use crate::util;

/// SDI record layout: fixed-position fields relative to the record origin.
pub const REC_DATA_TYPE_LEN: usize = 4;
pub const REC_DATA_ID_LEN: usize = 8;
pub const REC_OFF_DATA_TYPE: usize = 0;
pub const REC_OFF_DATA_ID: usize = REC_OFF_DATA_TYPE + REC_DATA_TYPE_LEN;
pub const REC_OFF_DATA_TRX_ID: usize = REC_OFF_DATA_ID + REC_DATA_ID_LEN;
pub const REC_OFF_DATA_ROLL_PTR: usize = REC_OFF_DATA_TRX_ID + 6;
pub const REC_OFF_DATA_UNCOMP_LEN: usize = REC_OFF_DATA_ROLL_PTR + 7;
pub const REC_OFF_DATA_COMP_LEN: usize = REC_OFF_DATA_UNCOMP_LEN + 4;
pub const REC_OFF_DATA_VARCHAR: usize = REC_OFF_DATA_COMP_LEN + 4;
pub const REC_MIN_HEADER_SIZE: usize = 5;

/// SDI BLOB pages are never expected among the first pages of a space:
/// 0 (FSP header), 1 (bitmap), 2 (ibuf bitmap), 3 (SDI root).
pub const SDI_BLOB_ALLOWED: u32 = 4;

pub const BTR_EXTERN_SPACE_ID: usize = 0;
pub const BTR_EXTERN_PAGE_NO: usize = 4;
pub const BTR_EXTERN_LEN: usize = 12;
pub const LOB_HDR_PART_LEN: usize = 0;
pub const LOB_HDR_NEXT_PAGE_NO: usize = 4;
pub const LOB_HDR_SIZE: usize = 8;
/// In-page prefix length of an externally stored SDI payload.
pub const REC_ANTELOPE_MAX_INDEX_COL_LEN: usize = 768;

/// Fixed header of an SDI record.
#[derive(Debug, Clone)]
pub struct SdiDataHeader {
    /// (4 bytes) Type of the serialized object
    pub data_type: u32,
    /// (8 bytes) Object id
    pub data_id: u64,
    /// (6 bytes) Transaction id
    pub trx_id: u64,
    /// (7 bytes) Rollback pointer
    pub roll_ptr: u64,
    /// (4 bytes) Uncompressed payload length
    pub uncomp_len: u32,
    /// (4 bytes) Compressed payload length
    pub comp_len: u32,
}

impl SdiDataHeader {
    pub fn new(buf: &[u8], addr: usize) -> Self {
        Self {
            data_type: util::u32_val(buf, addr + REC_OFF_DATA_TYPE),
            data_id: util::u64_val(buf, addr + REC_OFF_DATA_ID),
            trx_id: util::u48_val(buf, addr + REC_OFF_DATA_TRX_ID),
            roll_ptr: util::u56_val(buf, addr + REC_OFF_DATA_ROLL_PTR),
            uncomp_len: util::u32_val(buf, addr + REC_OFF_DATA_UNCOMP_LEN),
            comp_len: util::u32_val(buf, addr + REC_OFF_DATA_COMP_LEN),
        }
    }
}

/// One inflated SDI document.
#[derive(Debug, Clone)]
pub struct SdiDocument {
    pub sdi_type: u32,
    pub sdi_id: u64,
    pub json: String,
}

/// A document is usable iff it names a Table or Tablespace object and
/// carries the three version stamps.
pub fn validate_document(doc: &Value) -> bool {
    let type_ok = matches!(
        doc.get("dd_object_type").and_then(Value::as_str),
        Some("Table") | Some("Tablespace")
    );
    let object_ok = doc.get("dd_object").map(Value::is_object).unwrap_or(false);
    let versions_ok = ["mysqld_version_id", "dd_version", "sdi_version"]
        .iter()
        .all(|key| doc.get(*key).map(Value::is_u64).unwrap_or(false));
    type_ok && object_ok && versions_ok
}

fn corrupt_page(page_no: u32, reason: &str) -> IbdError {
    IbdError::CorruptPage {
        page_no,
        reason: reason.to_string(),
    }
}

/// Descend the SDI B-tree from its root to the leftmost leaf. At every
/// level the first user record after the infimum is a node pointer whose
/// payload tail is the child page number.
fn to_leftmost_leaf(space: &Tablespace) -> Result<(Bytes, u32)> {
    let mut buf = space.read_page(space.sdi_root)?;
    if page_type(&buf) != PageTypes::SDI {
        return Err(corrupt_page(space.sdi_root, "SDI root has a wrong page type"));
    }

    let mut page_level = util::u16_val(&buf, PAGE_HEADER + PAGE_LEVEL);
    let n_recs = util::u16_val(&buf, PAGE_HEADER + PAGE_N_RECS);
    if n_recs == 0 {
        warn!("no SDI found in this file, it might be from an older MySQL version");
        return Err(IbdError::UnsupportedSpace(
            "the SDI index is empty".into(),
        ));
    }

    let mut curr_page_no = space.sdi_root;
    while page_level != 0 {
        if rec_status(&buf, PAGE_NEW_INFIMUM) != RecordStatus::REC_STATUS_INFIMUM {
            return Err(corrupt_page(curr_page_no, "infimum record has a wrong status"));
        }

        let next_rec_off = util::u16_val(&buf, PAGE_NEW_INFIMUM - REC_OFF_NEXT) as usize;
        let child_page_no = util::u32_val(
            &buf,
            PAGE_NEW_INFIMUM + next_rec_off + REC_DATA_TYPE_LEN + REC_DATA_ID_LEN,
        );
        if child_page_no < SDI_BLOB_ALLOWED {
            return Err(corrupt_page(curr_page_no, "SDI node pointer child is out of range"));
        }

        let curr_page_level = page_level;
        buf = space.read_page(child_page_no)?;
        if page_type(&buf) != PageTypes::SDI {
            return Err(corrupt_page(child_page_no, "SDI child has a wrong page type"));
        }
        page_level = util::u16_val(&buf, PAGE_HEADER + PAGE_LEVEL);
        if page_level != curr_page_level - 1 {
            return Err(corrupt_page(
                child_page_no,
                "page levels do not decrease by one on the SDI descent",
            ));
        }
        curr_page_no = child_page_no;
    }
    Ok((buf, curr_page_no))
}

fn first_user_rec(buf: &Bytes) -> Result<usize> {
    let page_no = FilPageHeader::new(buf).page_no;
    if &buf[PAGE_NEW_INFIMUM..PAGE_NEW_INFIMUM + 7] != b"infimum" {
        return Err(corrupt_page(page_no, "corrupt infimum record"));
    }
    let next_rec_off = util::u16_val(buf, PAGE_NEW_INFIMUM - REC_OFF_NEXT) as usize;
    if PAGE_NEW_INFIMUM + next_rec_off >= buf.len() {
        return Err(corrupt_page(page_no, "infimum next pointer out of range"));
    }
    Ok(PAGE_NEW_INFIMUM + next_rec_off)
}

/// Forward cursor over the user records of the SDI leaf chain. Delete
/// marked records are skipped; reaching the last supremum ends iteration.
struct LeafCursor<'a> {
    space: &'a Tablespace,
    buf: Bytes,
    rec: Option<usize>,
}

impl<'a> LeafCursor<'a> {
    fn new(space: &'a Tablespace) -> Result<Self> {
        let (buf, _leaf_page_no) = to_leftmost_leaf(space)?;
        let mut cursor = Self {
            space,
            rec: Some(first_user_rec(&buf)?),
            buf,
        };
        // the first record may be delete-marked or the page may be empty
        if let Some(rec) = cursor.rec {
            if rec_is_deleted(&cursor.buf, rec)
                || rec_status(&cursor.buf, rec) == RecordStatus::REC_STATUS_SUPREMUM
            {
                if rec_status(&cursor.buf, rec) == RecordStatus::REC_STATUS_SUPREMUM {
                    cursor.hop_or_end(rec)?;
                } else {
                    cursor.advance()?;
                }
            }
        }
        Ok(cursor)
    }

    fn page_no(&self) -> u32 {
        FilPageHeader::new(&self.buf).page_no
    }

    /// Move past the supremum at `rec` onto the next leaf, or end.
    fn hop_or_end(&mut self, rec: usize) -> Result<()> {
        if &self.buf[rec..rec + 8] != b"supremum" {
            return Err(corrupt_page(self.page_no(), "corrupt supremum record"));
        }
        if util::u16_val(&self.buf, rec - REC_OFF_NEXT) != 0 {
            return Err(corrupt_page(self.page_no(), "supremum has a next record"));
        }
        let next_page_no = util::u32_val(&self.buf, FIL_PAGE_NEXT);
        if next_page_no == FIL_NULL {
            self.rec = None;
            return Ok(());
        }
        self.buf = self.space.read_page(next_page_no)?;
        if page_type(&self.buf) != PageTypes::SDI {
            return Err(corrupt_page(next_page_no, "SDI leaf chain hit a non-SDI page"));
        }
        self.rec = Some(first_user_rec(&self.buf)?);
        if let Some(rec) = self.rec {
            if rec_is_deleted(&self.buf, rec) {
                return self.advance();
            }
            if rec_status(&self.buf, rec) == RecordStatus::REC_STATUS_SUPREMUM {
                return self.hop_or_end(rec);
            }
        }
        Ok(())
    }

    fn advance(&mut self) -> Result<()> {
        let rec = match self.rec {
            Some(rec) => rec,
            None => return Ok(()),
        };
        let next = rec_next_offs(&self.buf, rec, self.space.physical_size);
        if next == 0 {
            return Err(IbdError::CorruptRecord {
                offset: rec,
                reason: "self-relative next pointer is zero".into(),
            });
        }
        if rec_is_deleted(&self.buf, next) {
            self.rec = Some(next);
            return self.advance();
        }
        if rec_status(&self.buf, next) == RecordStatus::REC_STATUS_SUPREMUM {
            return self.hop_or_end(next);
        }
        self.rec = Some(next);
        Ok(())
    }
}

/// Reassemble and inflate the payload of the SDI record at `rec`.
fn parse_rec(space: &Tablespace, buf: &Bytes, rec: usize) -> Result<SdiDocument> {
    let hdr = SdiDataHeader::new(buf, rec);
    debug!("sdi rec @{}: {:?}", rec, hdr);

    let len_byte = buf[rec - REC_MIN_HEADER_SIZE - 1];
    let mut is_external = false;
    let mut in_page_len = 0usize;
    let data_len: usize = if (len_byte & 0x80) != 0 {
        in_page_len = ((len_byte & 0x3f) as usize) << 8;
        if (len_byte & 0x40) != 0 {
            is_external = true;
            let ext_len =
                util::u64_val(buf, rec + REC_OFF_DATA_VARCHAR + in_page_len + BTR_EXTERN_LEN);
            ext_len as usize + in_page_len
        } else {
            buf[rec - REC_MIN_HEADER_SIZE - 2] as usize + in_page_len
        }
    } else {
        len_byte as usize
    };

    let data_origin = rec + REC_OFF_DATA_VARCHAR;
    let comp_data: Vec<u8> = if is_external {
        if in_page_len != 0 && in_page_len != REC_ANTELOPE_MAX_INDEX_COL_LEN {
            return Err(IbdError::CorruptSdi(format!(
                "unexpected in-page prefix length {}",
                in_page_len
            )));
        }
        let mut data = buf[data_origin..data_origin + in_page_len].to_vec();
        let first_blob_page_no =
            util::u32_val(buf, data_origin + in_page_len + BTR_EXTERN_PAGE_NO);
        fetch_blob(space, first_blob_page_no, data_len - in_page_len, &mut data)?;
        data
    } else {
        if data_origin + data_len > buf.len() {
            return Err(IbdError::CorruptSdi(format!(
                "inline payload of {} bytes runs past the page end",
                data_len
            )));
        }
        buf[data_origin..data_origin + data_len].to_vec()
    };

    if comp_data.len() != hdr.comp_len as usize {
        return Err(IbdError::CorruptSdi(format!(
            "assembled payload is {} bytes, the record declares {}",
            comp_data.len(),
            hdr.comp_len
        )));
    }

    let json = util::zlib_uncomp(Bytes::from(comp_data))
        .map_err(|e| IbdError::CorruptSdi(format!("zlib inflate failed: {}", e)))?;
    if json.len() != hdr.uncomp_len as usize {
        return Err(IbdError::CorruptSdi(format!(
            "inflated payload is {} bytes, the record declares {}",
            json.len(),
            hdr.uncomp_len
        )));
    }

    Ok(SdiDocument {
        sdi_type: hdr.data_type,
        sdi_id: hdr.data_id,
        json,
    })
}

/// Follow a chain of SDI BLOB pages, appending each part to `dest`.
fn fetch_blob(
    space: &Tablespace,
    first_blob_page_no: u32,
    total_off_page_length: usize,
    dest: &mut Vec<u8>,
) -> Result<()> {
    let mut calc_length = 0usize;
    let mut next_page_no = first_blob_page_no;

    loop {
        let page = space.read_page(next_page_no)?;
        if page_type(&page) != PageTypes::SDI_BLOB {
            return Err(corrupt_page(next_page_no, "expected an SDI BLOB page"));
        }

        let part_len = util::u32_val(&page, FIL_PAGE_DATA + LOB_HDR_PART_LEN) as usize;
        let payload = FIL_PAGE_DATA + LOB_HDR_SIZE;
        if payload + part_len > page.len() {
            return Err(corrupt_page(next_page_no, "BLOB part length out of range"));
        }
        dest.extend_from_slice(&page[payload..payload + part_len]);
        calc_length += part_len;

        next_page_no = util::u32_val(&page, FIL_PAGE_DATA + LOB_HDR_NEXT_PAGE_NO);
        if next_page_no == FIL_NULL {
            break;
        }
        if next_page_no <= SDI_BLOB_ALLOWED {
            return Err(corrupt_page(next_page_no, "BLOB chain points into reserved pages"));
        }
    }

    if calc_length != total_off_page_length {
        return Err(IbdError::CorruptSdi(format!(
            "BLOB chain yielded {} bytes, the record declares {}",
            calc_length, total_off_page_length
        )));
    }
    Ok(())
}

/// Load every SDI document of the tablespace, in on-disk order.
pub fn load_documents(space: &Tablespace) -> Result<Vec<SdiDocument>> {
    let mut docs = Vec::new();
    let mut cursor = LeafCursor::new(space)?;
    while let Some(rec) = cursor.rec {
        docs.push(parse_rec(space, &cursor.buf, rec)?);
        cursor.advance()?;
    }
    debug!("loaded {} SDI documents", docs.len());
    Ok(docs)
}
