use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;

use bytes::Bytes;
use log::{debug, warn};

use crate::errors::{IbdError, Result};
use crate::ibd::page::{FIL_PAGE_OFFSET, FIL_PAGE_SPACE_ID};
use crate::util;

pub const UNIV_PAGE_SIZE_SHIFT_MIN: u32 = 12;
pub const UNIV_PAGE_SIZE_SHIFT_MAX: u32 = 16;
pub const UNIV_PAGE_SIZE_ORIG: usize = 1 << 14;
pub const UNIV_ZIP_SIZE_MIN: usize = 1 << 10;
pub const PAGE_ZIP_SSIZE_MAX: u32 = 5;
/// page_ssize values for the 4 KiB .. 64 KiB window.
pub const UNIV_PAGE_SSIZE_MIN: u32 = UNIV_PAGE_SIZE_SHIFT_MIN - 10 + 1;
pub const UNIV_PAGE_SSIZE_MAX: u32 = UNIV_PAGE_SIZE_SHIFT_MAX - 10 + 1;

pub const FSP_HEADER_OFFSET: usize = 38;
pub const FSP_SPACE_FLAGS: usize = 16;
pub const FIL_ADDR_SIZE: usize = 6;
pub const FLST_BASE_NODE_SIZE: usize = 4 + 2 * FIL_ADDR_SIZE;
pub const FLST_NODE_SIZE: usize = 2 * FIL_ADDR_SIZE;
pub const FSP_HEADER_SIZE: usize = 32 + 5 * FLST_BASE_NODE_SIZE;
pub const XDES_ARR_OFFSET: usize = FSP_HEADER_OFFSET + FSP_HEADER_SIZE;
pub const XDES_BITMAP: usize = FLST_NODE_SIZE + 12;
pub const XDES_BITS_PER_PAGE: usize = 2;
/// Encryption info block reserved between the XDES array and the SDI slot.
pub const INFO_MAX_SIZE: usize = (3 + 4 + 32 * 2 + 36 + 4) + 4;

// FSP flags bit layout
const FSP_FLAGS_POS_POST_ANTELOPE: u32 = 0;
const FSP_FLAGS_POS_ZIP_SSIZE: u32 = 1;
const FSP_FLAGS_POS_ATOMIC_BLOBS: u32 = 5;
const FSP_FLAGS_POS_PAGE_SSIZE: u32 = 6;
const FSP_FLAGS_POS_DATA_DIR: u32 = 10;
const FSP_FLAGS_POS_SHARED: u32 = 11;
const FSP_FLAGS_POS_TEMPORARY: u32 = 12;
const FSP_FLAGS_POS_ENCRYPTION: u32 = 13;
const FSP_FLAGS_POS_SDI: u32 = 14;
const FSP_FLAGS_POS_UNUSED: u32 = 15;

/// Decoded FSP_SPACE_FLAGS of page 0.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpaceFlags {
    pub raw: u32,
    pub post_antelope: bool,
    pub zip_ssize: u32,
    pub atomic_blobs: bool,
    pub page_ssize: u32,
    pub data_dir: bool,
    pub shared: bool,
    pub temporary: bool,
    pub encryption: bool,
    pub sdi: bool,
    pub unused: u32,
}

impl SpaceFlags {
    pub fn decode(flags: u32) -> Self {
        Self {
            raw: flags,
            post_antelope: (flags >> FSP_FLAGS_POS_POST_ANTELOPE) & 0x1 != 0,
            zip_ssize: (flags >> FSP_FLAGS_POS_ZIP_SSIZE) & 0xf,
            atomic_blobs: (flags >> FSP_FLAGS_POS_ATOMIC_BLOBS) & 0x1 != 0,
            page_ssize: (flags >> FSP_FLAGS_POS_PAGE_SSIZE) & 0xf,
            data_dir: (flags >> FSP_FLAGS_POS_DATA_DIR) & 0x1 != 0,
            shared: (flags >> FSP_FLAGS_POS_SHARED) & 0x1 != 0,
            temporary: (flags >> FSP_FLAGS_POS_TEMPORARY) & 0x1 != 0,
            encryption: (flags >> FSP_FLAGS_POS_ENCRYPTION) & 0x1 != 0,
            sdi: (flags >> FSP_FLAGS_POS_SDI) & 0x1 != 0,
            unused: flags >> FSP_FLAGS_POS_UNUSED,
        }
    }

    pub fn is_valid(&self) -> bool {
        if self.raw == 0 {
            return true;
        }
        if self.post_antelope != self.atomic_blobs {
            return false;
        }
        if self.unused != 0 {
            return false;
        }
        if self.zip_ssize > PAGE_ZIP_SSIZE_MAX {
            return false;
        }
        if self.page_ssize != 0
            && !(UNIV_PAGE_SSIZE_MIN..=UNIV_PAGE_SSIZE_MAX).contains(&self.page_ssize)
        {
            return false;
        }
        if self.data_dir && (self.shared || self.temporary) {
            return false;
        }
        if self.encryption && self.temporary {
            return false;
        }
        true
    }

    /// Logical page size encoded in the flags, 16 KiB when page_ssize is 0.
    pub fn logical_size(&self) -> usize {
        if self.page_ssize == 0 {
            UNIV_PAGE_SIZE_ORIG
        } else {
            (UNIV_ZIP_SIZE_MIN >> 1) << self.page_ssize
        }
    }
}

fn page_size_shift(page_size: usize) -> u32 {
    for n in UNIV_PAGE_SIZE_SHIFT_MIN..=UNIV_PAGE_SIZE_SHIFT_MAX {
        if page_size == (1usize << n) {
            return n;
        }
    }
    0
}

pub fn fsp_extent_size(logical_size: usize) -> usize {
    if logical_size <= 16384 {
        1048576 / logical_size
    } else if logical_size <= 32768 {
        2097152 / logical_size
    } else {
        4194304 / logical_size
    }
}

pub fn xdes_size(logical_size: usize) -> usize {
    XDES_BITMAP + util::bits_in_bytes(fsp_extent_size(logical_size) * XDES_BITS_PER_PAGE)
}

/// An open, validated, uncompressed tablespace. All page reads are
/// positional and idempotent; the handle is immutable after open.
#[derive(Debug)]
pub struct Tablespace {
    pub target: PathBuf,
    file: File,
    pub size: usize,
    pub space_id: u32,
    pub first_page_no: u32,
    pub flags: SpaceFlags,
    pub page_size_shift: u32,
    pub logical_size: usize,
    pub physical_size: usize,
    pub n_pages: u32,
    pub sdi_root: u32,
}

impl Tablespace {
    pub fn open(target: PathBuf) -> Result<Tablespace> {
        let file = File::open(&target)
            .map_err(|e| IbdError::InvalidArgument(format!("cannot open {:?}: {}", target, e)))?;
        let size = file.metadata()?.len() as usize;
        if size < UNIV_ZIP_SIZE_MIN {
            return Err(IbdError::InvalidArgument(format!(
                "{:?} is too small to be a valid ibd file",
                target
            )));
        }

        let mut probe = vec![0u8; UNIV_ZIP_SIZE_MIN];
        file.read_exact_at(&mut probe, 0)?;

        let space_id = util::u32_val(&probe, FIL_PAGE_SPACE_ID);
        let first_page_no = util::u32_val(&probe, FIL_PAGE_OFFSET);
        let flags = SpaceFlags::decode(util::u32_val(&probe, FSP_HEADER_OFFSET + FSP_SPACE_FLAGS));
        if !flags.is_valid() {
            return Err(IbdError::UnsupportedSpace(format!(
                "invalid space flags 0x{:x} on page 0",
                flags.raw
            )));
        }

        let logical_size = flags.logical_size();
        let shift = page_size_shift(logical_size);
        if shift == 0 {
            return Err(IbdError::UnsupportedSpace(format!(
                "unsupported page size {}",
                logical_size
            )));
        }

        if flags.zip_ssize != 0 {
            return Err(IbdError::UnsupportedSpace(
                "compressed tablespaces are not supported".into(),
            ));
        }
        if flags.encryption {
            return Err(IbdError::UnsupportedSpace(
                "encrypted tablespaces are not supported".into(),
            ));
        }
        if flags.temporary {
            return Err(IbdError::UnsupportedSpace(
                "temporary tablespaces are not supported".into(),
            ));
        }

        let physical_size = logical_size;
        let n_pages = (size / physical_size) as u32;

        let mut space = Tablespace {
            target,
            file,
            size,
            space_id,
            first_page_no,
            flags,
            page_size_shift: shift,
            logical_size,
            physical_size,
            n_pages,
            sdi_root: 0,
        };

        let page0 = space.read_page(0)?;
        let sdi_offset = XDES_ARR_OFFSET
            + xdes_size(logical_size) * (physical_size / fsp_extent_size(logical_size))
            + INFO_MAX_SIZE;
        space.sdi_root = util::u32_val(&page0, sdi_offset + 4);
        if !space.flags.sdi {
            warn!(
                "FSP doesn't have the SDI flag, attempting to parse the SDI root page {} anyway",
                space.sdi_root
            );
        }
        debug!(
            "opened {:?}: space_id={}, page_size={}, n_pages={}, sdi_root={}",
            space.target, space.space_id, space.logical_size, space.n_pages, space.sdi_root
        );
        Ok(space)
    }

    pub fn read_page(&self, page_no: u32) -> Result<Bytes> {
        if page_no >= self.n_pages {
            return Err(IbdError::InvalidArgument(format!(
                "page number {} is too large, the space has {} pages",
                page_no, self.n_pages
            )));
        }
        let mut buf = vec![0u8; self.physical_size];
        self.file
            .read_exact_at(&mut buf, (page_no as usize * self.physical_size) as u64)?;
        Ok(Bytes::from(buf))
    }
}

#[cfg(test)]
mod tabspace_tests {
    use super::*;
    use crate::util;
    use std::io::Write;

    fn setup() {
        util::init_unit_test();
    }

    #[test]
    fn flags_truth_table() {
        setup();
        // zeroed flags are pre-antelope but valid
        assert!(SpaceFlags::decode(0).is_valid());

        // standard 8.0 single-table space: post_antelope, atomic_blobs, sdi
        let flags = SpaceFlags::decode(0x4021);
        assert!(flags.is_valid());
        assert!(flags.sdi);
        assert!(!flags.temporary);
        assert_eq!(flags.logical_size(), 16384);

        // post_antelope without atomic_blobs
        assert!(!SpaceFlags::decode(0x1).is_valid());
        // unused region set
        assert!(!SpaceFlags::decode(0x21 | (1 << 15)).is_valid());
        // zip_ssize out of range
        assert!(!SpaceFlags::decode(0x21 | (0xf << 1)).is_valid());
        // page_ssize below the window
        assert!(!SpaceFlags::decode(0x21 | (1 << 6)).is_valid());
        // data_dir together with shared
        assert!(!SpaceFlags::decode(0x21 | (1 << 10) | (1 << 11)).is_valid());
        // encryption together with temporary
        assert!(!SpaceFlags::decode(0x21 | (1 << 12) | (1 << 13)).is_valid());
    }

    #[test]
    fn page_ssize_window() {
        setup();
        for ssize in 3..=7u32 {
            let flags = SpaceFlags::decode(0x21 | (ssize << 6));
            assert!(flags.is_valid());
            assert_eq!(flags.logical_size(), 512usize << ssize);
        }
    }

    #[test]
    fn sdi_root_offset_for_16k() {
        setup();
        // 64-page extents, 40-byte XDES entries
        assert_eq!(fsp_extent_size(16384), 64);
        assert_eq!(xdes_size(16384), 40);
        let off = XDES_ARR_OFFSET + xdes_size(16384) * (16384 / 64) + INFO_MAX_SIZE;
        assert_eq!(off, 10505);
    }

    #[test]
    fn open_synthetic_space() {
        setup();
        let size = 16 * 1024;
        let mut page0 = vec![0u8; size];
        page0[FIL_PAGE_SPACE_ID..FIL_PAGE_SPACE_ID + 4].copy_from_slice(&42u32.to_be_bytes());
        page0[FSP_HEADER_OFFSET + FSP_SPACE_FLAGS..FSP_HEADER_OFFSET + FSP_SPACE_FLAGS + 4]
            .copy_from_slice(&0x4021u32.to_be_bytes());
        // SDI root lives 4 bytes past the SDI version slot
        page0[10509..10513].copy_from_slice(&3u32.to_be_bytes());

        let path = std::env::temp_dir().join("ibx_tabspace_test.ibd");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(&page0).unwrap();
        f.write_all(&vec![0u8; 3 * size]).unwrap();
        drop(f);

        let space = Tablespace::open(path.clone()).unwrap();
        assert_eq!(space.space_id, 42);
        assert_eq!(space.logical_size, 16384);
        assert_eq!(space.n_pages, 4);
        assert_eq!(space.sdi_root, 3);
        assert_eq!(space.size % space.physical_size, 0);

        let page = space.read_page(3).unwrap();
        assert_eq!(page.len(), size);
        assert!(space.read_page(4).is_err());

        std::fs::remove_file(path).ok();
    }
}
