use std::collections::{BTreeMap, HashSet};

use crate::errors::{IbdError, Result};

/// Option keys the data dictionary may attach to a table, see
/// dd::Table_impl default_valid_option_keys.
pub const TABLE_OPTION_KEYS: &[&str] = &[
    "avg_row_length",
    "checksum",
    "compress",
    "connection_string",
    "delay_key_write",
    "encrypt_type",
    "explicit_tablespace",
    "key_block_size",
    "keys_disabled",
    "max_rows",
    "min_rows",
    "pack_keys",
    "pack_record",
    "plugin_version",
    "row_type",
    "secondary_engine",
    "secondary_load",
    "server_i_s_table",
    "server_p_s_table",
    "stats_auto_recalc",
    "stats_persistent",
    "stats_sample_pages",
    "storage",
    "tablespace",
    "timestamp",
    "view_valid",
    "gipk",
];

pub const COLUMN_OPTION_KEYS: &[&str] = &[
    "column_format",
    "geom_type",
    "interval_count",
    "not_secondary",
    "storage",
    "treat_bit_as_char",
    "is_array",
    "gipk",
];

pub const INDEX_OPTION_KEYS: &[&str] = &["block_size", "flags", "parser_name", "gipk"];

/// A `key=value;...` mapping carried in a single SDI string field. When a
/// whitelist is configured, keys outside it fail construction.
#[derive(Debug, Default, Clone)]
pub struct Properties {
    keys: HashSet<&'static str>,
    kvs: BTreeMap<String, String>,
}

impl Properties {
    pub fn with_keys(keys: &[&'static str]) -> Self {
        Self {
            keys: keys.iter().copied().collect(),
            kvs: BTreeMap::new(),
        }
    }

    fn valid_key(&self, key: &str) -> bool {
        self.keys.is_empty() || self.keys.contains(key)
    }

    /// Scan `opt_string`, tolerating empty values (`k=;`).
    pub fn insert_values(&mut self, opt_string: &str) -> Result<()> {
        for token in opt_string.split(';') {
            if token.is_empty() {
                continue;
            }
            let (key, value) = match token.split_once('=') {
                Some(kv) => kv,
                None => (token, ""),
            };
            if key.is_empty() {
                return Err(IbdError::CorruptSdi(format!(
                    "empty properties key in {:?}",
                    opt_string
                )));
            }
            if !self.valid_key(key) {
                return Err(IbdError::CorruptSdi(format!(
                    "invalid properties key {:?}",
                    key
                )));
            }
            self.kvs.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    pub fn exists(&self, key: &str) -> bool {
        self.valid_key(key) && self.kvs.contains_key(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.kvs.get(key).map(|v| v.as_str())
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.kvs.get(key).and_then(|v| v.parse().ok())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.kvs.get(key).and_then(|v| v.parse().ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        let v = self.kvs.get(key)?;
        match v.as_str() {
            "true" => Some(true),
            "false" | "0" => Some(false),
            s => {
                let digits = s.strip_prefix(|c| c == '+' || c == '-').unwrap_or(s);
                if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                    Some(true)
                } else {
                    None
                }
            }
        }
    }
}
