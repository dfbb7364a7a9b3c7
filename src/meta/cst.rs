use std::collections::HashMap;

use lazy_static::lazy_static;

/// Character set byte widths per collation id, the part of
/// INFORMATION_SCHEMA.COLLATIONS the storage engine consults when deciding
/// whether a MYSQL string column can be stored at a fixed length.
#[derive(Debug, Clone, Copy)]
pub struct Collation {
    pub name: &'static str,
    pub charset: &'static str,
    pub id: u32,
    pub min_len: u32,
    pub max_len: u32,
}

pub const COLLATION_LATIN1_SWEDISH_CI: u32 = 8;
pub const COLLATION_BINARY: u32 = 63;

macro_rules! coll {
    ($map:expr, $id:expr, $name:expr, $charset:expr, $min:expr, $max:expr) => {
        $map.insert(
            $id,
            Collation {
                name: $name,
                charset: $charset,
                id: $id,
                min_len: $min,
                max_len: $max,
            },
        );
    };
}

lazy_static! {
    static ref COLLMAP: HashMap<u32, Collation> = {
        let mut m = HashMap::new();
        coll!(m, 1, "big5_chinese_ci", "big5", 1, 2);
        coll!(m, 84, "big5_bin", "big5", 1, 2);
        coll!(m, 2, "latin2_czech_cs", "latin2", 1, 1);
        coll!(m, 9, "latin2_general_ci", "latin2", 1, 1);
        coll!(m, 3, "dec8_swedish_ci", "dec8", 1, 1);
        coll!(m, 4, "cp850_general_ci", "cp850", 1, 1);
        coll!(m, 5, "latin1_german1_ci", "latin1", 1, 1);
        coll!(m, 8, "latin1_swedish_ci", "latin1", 1, 1);
        coll!(m, 15, "latin1_danish_ci", "latin1", 1, 1);
        coll!(m, 47, "latin1_bin", "latin1", 1, 1);
        coll!(m, 48, "latin1_general_ci", "latin1", 1, 1);
        coll!(m, 49, "latin1_general_cs", "latin1", 1, 1);
        coll!(m, 94, "latin1_spanish_ci", "latin1", 1, 1);
        coll!(m, 6, "hp8_english_ci", "hp8", 1, 1);
        coll!(m, 7, "koi8r_general_ci", "koi8r", 1, 1);
        coll!(m, 10, "swe7_swedish_ci", "swe7", 1, 1);
        coll!(m, 11, "ascii_general_ci", "ascii", 1, 1);
        coll!(m, 65, "ascii_bin", "ascii", 1, 1);
        coll!(m, 12, "ujis_japanese_ci", "ujis", 1, 3);
        coll!(m, 91, "ujis_bin", "ujis", 1, 3);
        coll!(m, 13, "sjis_japanese_ci", "sjis", 1, 2);
        coll!(m, 88, "sjis_bin", "sjis", 1, 2);
        coll!(m, 16, "hebrew_general_ci", "hebrew", 1, 1);
        coll!(m, 18, "tis620_thai_ci", "tis620", 1, 1);
        coll!(m, 19, "euckr_korean_ci", "euckr", 1, 2);
        coll!(m, 85, "euckr_bin", "euckr", 1, 2);
        coll!(m, 22, "koi8u_general_ci", "koi8u", 1, 1);
        coll!(m, 24, "gb2312_chinese_ci", "gb2312", 1, 2);
        coll!(m, 86, "gb2312_bin", "gb2312", 1, 2);
        coll!(m, 25, "greek_general_ci", "greek", 1, 1);
        coll!(m, 26, "cp1250_general_ci", "cp1250", 1, 1);
        coll!(m, 66, "cp1250_bin", "cp1250", 1, 1);
        coll!(m, 28, "gbk_chinese_ci", "gbk", 1, 2);
        coll!(m, 87, "gbk_bin", "gbk", 1, 2);
        coll!(m, 30, "latin5_turkish_ci", "latin5", 1, 1);
        coll!(m, 32, "armscii8_general_ci", "armscii8", 1, 1);
        coll!(m, 64, "armscii8_bin", "armscii8", 1, 1);
        coll!(m, 33, "utf8mb3_general_ci", "utf8mb3", 1, 3);
        coll!(m, 76, "utf8mb3_tolower_ci", "utf8mb3", 1, 3);
        coll!(m, 83, "utf8mb3_bin", "utf8mb3", 1, 3);
        coll!(m, 35, "ucs2_general_ci", "ucs2", 2, 2);
        coll!(m, 90, "ucs2_bin", "ucs2", 2, 2);
        coll!(m, 36, "cp866_general_ci", "cp866", 1, 1);
        coll!(m, 37, "keybcs2_general_ci", "keybcs2", 1, 1);
        coll!(m, 38, "macce_general_ci", "macce", 1, 1);
        coll!(m, 39, "macroman_general_ci", "macroman", 1, 1);
        coll!(m, 40, "cp852_general_ci", "cp852", 1, 1);
        coll!(m, 41, "latin7_general_ci", "latin7", 1, 1);
        coll!(m, 45, "utf8mb4_general_ci", "utf8mb4", 1, 4);
        coll!(m, 46, "utf8mb4_bin", "utf8mb4", 1, 4);
        coll!(m, 51, "cp1251_general_ci", "cp1251", 1, 1);
        coll!(m, 54, "utf16_general_ci", "utf16", 2, 4);
        coll!(m, 55, "utf16_bin", "utf16", 2, 4);
        coll!(m, 56, "utf16le_general_ci", "utf16le", 2, 4);
        coll!(m, 57, "cp1256_general_ci", "cp1256", 1, 1);
        coll!(m, 59, "cp1257_general_ci", "cp1257", 1, 1);
        coll!(m, 60, "utf32_general_ci", "utf32", 4, 4);
        coll!(m, 61, "utf32_bin", "utf32", 4, 4);
        coll!(m, 63, "binary", "binary", 1, 1);
        coll!(m, 92, "geostd8_general_ci", "geostd8", 1, 1);
        coll!(m, 95, "cp932_japanese_ci", "cp932", 1, 2);
        coll!(m, 96, "cp932_bin", "cp932", 1, 2);
        coll!(m, 97, "eucjpms_japanese_ci", "eucjpms", 1, 3);
        coll!(m, 98, "eucjpms_bin", "eucjpms", 1, 3);
        coll!(m, 248, "gb18030_chinese_ci", "gb18030", 1, 4);
        coll!(m, 249, "gb18030_bin", "gb18030", 1, 4);
        coll!(m, 250, "gb18030_unicode_520_ci", "gb18030", 1, 4);
        coll!(m, 255, "utf8mb4_0900_ai_ci", "utf8mb4", 1, 4);
        coll!(m, 278, "utf8mb4_0900_as_cs", "utf8mb4", 1, 4);
        coll!(m, 303, "utf8mb4_ja_0900_as_cs", "utf8mb4", 1, 4);
        coll!(m, 305, "utf8mb4_0900_as_ci", "utf8mb4", 1, 4);
        coll!(m, 309, "utf8mb4_0900_bin", "utf8mb4", 1, 4);
        m
    };
}

/// Look up a collation; ids missing from the table are classified by the
/// ranges MySQL assigns per character set.
pub fn coll_find(id: u32) -> Collation {
    if let Some(coll) = COLLMAP.get(&id) {
        return *coll;
    }
    let (name, charset, min_len, max_len) = match id {
        192..=223 => ("utf8mb3_general_ci", "utf8mb3", 1, 3),
        224..=247 | 256..=323 => ("utf8mb4_0900_ai_ci", "utf8mb4", 1, 4),
        101..=124 => ("utf16_unicode_ci", "utf16", 2, 4),
        160..=183 => ("utf32_unicode_ci", "utf32", 4, 4),
        128..=151 => ("ucs2_unicode_ci", "ucs2", 2, 2),
        _ => ("unknown", "unknown", 1, 1),
    };
    Collation {
        name,
        charset,
        id,
        min_len,
        max_len,
    }
}
