use log::debug;

use crate::errors::{IbdError, Result};
use crate::meta::def::*;
use crate::meta::prop::{Properties, COLUMN_OPTION_KEYS, INDEX_OPTION_KEYS, TABLE_OPTION_KEYS};
use crate::sdi::record::{
    ColumnTypes, DataDictColumn, DataDictIndex, HiddenTypes, IndexTypes, PartitionTypes, SdiObject,
    TableHiddenTypes,
};

/// Build a fully-derived table definition from one SDI "Table" document:
/// parse the data dictionary shape, then run the storage-engine build that
/// assigns the physical column vector and fills every index.
pub fn load_table(sdi: &SdiObject) -> Result<TableDef> {
    let ddobj = &sdi.dd_object;

    let mut col_defs = Vec::with_capacity(ddobj.columns.len());
    for ddc in &ddobj.columns {
        col_defs.push(column_from_dd(ddc)?);
    }

    let mut idx_defs = Vec::with_capacity(ddobj.indexes.len());
    for (pos, ddi) in ddobj.indexes.iter().enumerate() {
        idx_defs.push(index_from_dd(ddi, pos)?);
    }

    let mut options = Properties::with_keys(TABLE_OPTION_KEYS);
    options.insert_values(&ddobj.options)?;
    let mut se_private_data = Properties::default();
    se_private_data.insert_values(&ddobj.se_private_data)?;

    let mut table = TableDef {
        schema_ref: ddobj.schema_ref.clone(),
        tab_name: ddobj.name.clone(),
        mysql_version_id: ddobj.mysql_version_id,
        created: ddobj.created,
        last_altered: ddobj.last_altered,
        hidden: ddobj.hidden,
        collation_id: ddobj.collation_id,
        row_format: ddobj.row_format,
        partition_type: ddobj.partition_type,
        options,
        se_private_data,
        col_defs,
        idx_defs,
        ib_id: ddobj.se_private_id,
        ..TableDef::default()
    };

    // table share: fields visible to the server layer
    for col in &table.col_defs {
        if col.is_se_hidden() {
            continue;
        }
        if col.is_nullable {
            table.s_null_fields += 1;
        }
        table.s_fields += 1;
    }

    init_se_table(&mut table)?;
    Ok(table)
}

fn column_from_dd(ddc: &DataDictColumn) -> Result<ColumnDef> {
    let mut options = Properties::with_keys(COLUMN_OPTION_KEYS);
    options.insert_values(&ddc.options)?;
    let mut se_private_data = Properties::default();
    se_private_data.insert_values(&ddc.se_private_data)?;

    let default_null = se_private_data.exists("default_null");
    let default_value = if default_null {
        String::new()
    } else {
        se_private_data.get_str("default").unwrap_or("").to_string()
    };

    let version_added = se_private_data.get_u32("version_added").unwrap_or(VERSION_UNDEF);
    let version_dropped = se_private_data
        .get_u32("version_dropped")
        .unwrap_or(VERSION_UNDEF);

    Ok(ColumnDef {
        pos: ddc.ordinal_position as usize,
        col_name: ddc.col_name.clone(),
        dd_type: ddc.dd_type,
        is_nullable: ddc.is_nullable,
        is_virtual: ddc.is_virtual,
        hidden: ddc.hidden,
        col_key: ddc.column_key,
        char_length: ddc.char_length,
        numeric_precision: ddc.numeric_precision,
        numeric_scale: ddc.numeric_scale,
        datetime_precision: ddc.datetime_precision,
        elements_size: ddc.elements.len(),
        collation_id: ddc.collation_id,
        default_null,
        default_value,
        default_value_utf8: ddc.default_value_utf8.clone(),
        comment: ddc.comment.clone(),
        utf8_def: ddc.column_type_utf8.clone(),
        options,
        se_private_data,
        version_added,
        version_dropped,
        phy_pos: PHY_POS_UNDEF,
        is_visible: ddc.hidden == HiddenTypes::HT_VISIBLE
            || ddc.hidden == HiddenTypes::HT_HIDDEN_USER,
        ..ColumnDef::default()
    })
}

fn index_from_dd(ddi: &DataDictIndex, pos: usize) -> Result<IndexDef> {
    let mut options = Properties::with_keys(INDEX_OPTION_KEYS);
    options.insert_values(&ddi.options)?;
    let mut se_private_data = Properties::default();
    se_private_data.insert_values(&ddi.se_private_data)?;

    let elements = ddi
        .elements
        .iter()
        .map(|e| IndexElementDef {
            pos: e.ordinal_position as usize,
            ele_len: e.length,
            order: e.order,
            hidden: e.hidden,
            column_opx: e.column_opx as usize,
        })
        .collect();

    Ok(IndexDef {
        pos,
        idx_name: ddi.name.clone(),
        hidden: ddi.hidden,
        is_generated: ddi.is_generated,
        comment: ddi.comment.clone(),
        idx_type: ddi.idx_type,
        algorithm: ddi.algorithm,
        is_visible: ddi.is_visible,
        options,
        se_private_data,
        elements,
        ..IndexDef::default()
    })
}

fn precheck_table(table: &mut TableDef) {
    if table.mysql_version_id < SUPPORTED_VERSION_MIN
        || table.mysql_version_id > SUPPORTED_VERSION_MAX
    {
        table.unsupported |= UNSUPP_TABLE_MASK_VERSION;
    }

    if table.partition_type != PartitionTypes::PT_NONE {
        table.unsupported |= UNSUPP_TABLE_MASK_PARTITION;
    }

    if table.options.exists("encrypt_type") {
        let encrypted = table.options.get_str("encrypt_type").unwrap_or("");
        if !encrypted.is_empty() && encrypted != "N" && encrypted != "n" {
            table.unsupported |= UNSUPP_TABLE_MASK_ENCRYPT;
        }
    }

    for index in &table.idx_defs {
        if index.idx_name == "FTS_INDEX_TABLE_IND"
            && table.hidden == TableHiddenTypes::HT_HIDDEN_SE
        {
            table.unsupported |= UNSUPP_TABLE_MASK_FTS_AUX_INDEX;
            continue;
        }
        if index.idx_name == "FTS_COMMON_TABLE_IND"
            && table.hidden == TableHiddenTypes::HT_HIDDEN_SE
        {
            table.unsupported |= UNSUPP_TABLE_MASK_FTS_COM_INDEX;
        }
    }
}

/// Derive the storage-engine view of the table: counters, the physical
/// column vector with system column injection, instant ADD/DROP metadata,
/// then every index layout.
fn init_se_table(table: &mut TableDef) -> Result<()> {
    precheck_table(table);
    if !table.is_supported() {
        return Ok(());
    }

    table.is_system_table = table.schema_ref == "mysql"
        || table.schema_ref == "information_schema"
        || table.schema_ref == "performance_schema";

    // An SE-hidden FTS_DOC_ID in the dictionary means the engine carries its
    // own copy of the column.
    let mut add_doc_id = false;
    if let Some(opx) = table.find_column(FTS_DOC_ID_COL_NAME) {
        let col = &table.col_defs[opx];
        if col.dd_type == ColumnTypes::LONGLONG && !col.is_nullable && col.is_se_hidden() {
            add_doc_id = true;
        }
    }

    let n_cols = table.s_fields + u32::from(add_doc_id);
    let mut n_v_cols = 0;
    let mut n_m_v_cols = 0;
    for col in &table.col_defs {
        if col.is_se_hidden() {
            continue;
        }
        if col.is_virtual {
            n_v_cols += 1;
            if col.options.get_bool("is_array").unwrap_or(false) {
                n_m_v_cols += 1;
            }
        }
    }

    let mut current_row_version = 0;
    let mut n_current_cols = 0;
    let mut n_dropped_cols = 0;
    let mut n_added_cols = 0;
    let mut n_added_and_dropped_cols = 0;
    let mut has_row_version = false;
    for col in &table.col_defs {
        if col.is_system_column() || col.is_virtual {
            continue;
        }

        if !has_row_version && col.se_private_data.exists("physical_pos") {
            has_row_version = true;
        }

        if col.se_private_data.exists("version_dropped") {
            n_dropped_cols += 1;
            if col.se_private_data.exists("version_added") {
                n_added_and_dropped_cols += 1;
            }
            current_row_version = current_row_version.max(col.version_dropped);
            continue;
        }

        if col.se_private_data.exists("version_added") {
            n_added_cols += 1;
            current_row_version = current_row_version.max(col.version_added);
        }
        n_current_cols += 1;
    }

    table.n_t_cols = n_cols + DATA_N_SYS_COLS;
    table.n_v_cols = n_v_cols;
    table.n_m_v_cols = n_m_v_cols;
    table.n_cols = table.n_t_cols - table.n_v_cols;
    table.n_instant_cols = table.n_cols;
    table.initial_col_count =
        (n_current_cols - n_added_cols) + (n_dropped_cols - n_added_and_dropped_cols);
    table.current_col_count = n_current_cols;
    table.total_col_count = n_current_cols + n_dropped_cols;
    table.current_row_version = current_row_version;
    table.upgraded_instant = false;

    if table.se_private_data.exists("instant_col") {
        // Pre-8.0.29 INSTANT ADD: the dictionary remembers how many columns
        // the table had before the first such ALTER.
        let n_inst_cols = table.se_private_data.get_u32("instant_col").unwrap_or(0);
        table.n_instant_cols = n_inst_cols + DATA_N_SYS_COLS;
        table.upgraded_instant = true;
    }

    table.ib_cols.clear();
    table.n_def = 0;

    for opx in 0..table.col_defs.len() {
        if table.col_defs[opx].is_se_hidden() {
            continue;
        }
        let n_def = table.n_def;
        let col = &mut table.col_defs[opx];
        col.mtype = col.se_type();
        if col.is_virtual {
            continue;
        }
        col.ib_ind = n_def as usize;
        let mut phy_pos = PHY_POS_UNDEF;
        if has_row_version {
            if let Some(pos) = col.se_private_data.get_u32("physical_pos") {
                phy_pos = pos;
            }
        }
        let is_hidden_by_system = col.hidden == HiddenTypes::HT_HIDDEN_SE
            || col.hidden == HiddenTypes::HT_HIDDEN_SQL;
        col.is_visible = !is_hidden_by_system;
        // version_added was already recovered from se_private_data; surviving
        // columns never carry version_dropped.
        col.version_dropped = VERSION_UNDEF;
        col.phy_pos = phy_pos;
        col.col_len = if col.field_type() == ColumnTypes::VARCHAR {
            // The col_len of VARCHAR in InnoDB does not include the length header.
            col.pack_length() - col.varchar_len_bytes()
        } else {
            col.pack_length()
        };
        table.ib_cols.push(opx);
        table.n_def += 1;
    }

    if add_doc_id {
        let doc_id_col = ColumnDef {
            col_name: FTS_DOC_ID_COL_NAME.to_string(),
            dd_type: ColumnTypes::LONGLONG,
            mtype: SeTypes::DATA_INT,
            col_len: 8,
            ib_ind: table.n_def as usize,
            version_added: VERSION_UNDEF,
            version_dropped: VERSION_UNDEF,
            phy_pos: PHY_POS_UNDEF,
            se_explicit: true,
            ..ColumnDef::default()
        };
        table.col_defs.push(doc_id_col);
        table.ib_cols.push(table.col_defs.len() - 1);
        table.n_def += 1;
    }

    add_system_column(table, ROW_ID_COL_NAME, has_row_version)?;
    add_system_column(table, TRX_ID_COL_NAME, has_row_version)?;
    add_system_column(table, ROLL_PTR_COL_NAME, has_row_version)?;

    if table.has_instant_drop_cols() {
        for opx in 0..table.col_defs.len() {
            if table.col_defs[opx].is_system_column() {
                continue;
            }
            if !table.col_defs[opx].se_private_data.exists("version_dropped") {
                continue;
            }
            let n_def = table.n_def;
            let col = &mut table.col_defs[opx];
            col.mtype = col.se_type();
            col.ib_ind = n_def as usize;
            let phy_pos = col
                .se_private_data
                .get_u32("physical_pos")
                .ok_or_else(|| {
                    IbdError::CorruptSdi(format!(
                        "dropped column {} carries no physical_pos",
                        col.col_name
                    ))
                })?;
            col.is_visible = false;
            col.phy_pos = phy_pos;
            col.col_len = if col.field_type() == ColumnTypes::VARCHAR {
                col.pack_length() - col.varchar_len_bytes()
            } else {
                col.pack_length()
            };
            table.ib_cols.push(opx);
            table.n_def += 1;
        }
    }

    if table.has_instant_cols() || table.has_row_versions() {
        for col in &mut table.col_defs {
            col.instant_default = false;
            if col.is_virtual || col.is_system_column() {
                continue;
            }
            if col.is_instant_dropped() {
                continue;
            }
            if !col.se_private_data.exists("default_null")
                && !col.se_private_data.exists("default")
            {
                // not an INSTANT ADD column
                continue;
            }
            col.instant_default = col.se_private_data.exists("default");
        }
    }

    if table.idx_defs.is_empty() {
        return Err(IbdError::CorruptSdi(format!(
            "table {} has no indexes",
            table.tab_name
        )));
    }
    for ind in 0..table.idx_defs.len() {
        fill_index(table, ind)?;
    }

    debug!(
        "built table {}.{}: n_cols={}, total={}, row_version={}",
        table.schema_ref, table.tab_name, table.n_cols, table.total_col_count,
        table.current_row_version
    );
    Ok(())
}

/// Inject one of DB_ROW_ID / DB_TRX_ID / DB_ROLL_PTR into the physical
/// column vector, reusing the dictionary's SE-hidden copy when present.
fn add_system_column(table: &mut TableDef, name: &str, has_row_version: bool) -> Result<()> {
    let col_len = match name {
        ROW_ID_COL_NAME => DATA_ROW_ID_LEN,
        TRX_ID_COL_NAME => DATA_TRX_ID_LEN,
        ROLL_PTR_COL_NAME => DATA_ROLL_PTR_LEN,
        _ => unreachable!(),
    };

    match table.find_column(name) {
        Some(opx) => {
            let n_def = table.n_def;
            let col = &mut table.col_defs[opx];
            col.ib_ind = n_def as usize;
            col.mtype = SeTypes::DATA_SYS;
            col.is_visible = false;
            col.version_added = 0;
            col.version_dropped = 0;
            let mut phy_pos = PHY_POS_UNDEF;
            if has_row_version {
                if let Some(pos) = col.se_private_data.get_u32("physical_pos") {
                    phy_pos = pos;
                }
            }
            col.phy_pos = phy_pos;
            col.col_len = col_len;
            table.ib_cols.push(opx);
            table.n_def += 1;
        }
        None => {
            if name != ROW_ID_COL_NAME {
                return Err(IbdError::CorruptSdi(format!(
                    "system column {} is missing from the SDI",
                    name
                )));
            }
            let row_id_col = ColumnDef {
                col_name: name.to_string(),
                dd_type: ColumnTypes::INT24,
                mtype: SeTypes::DATA_SYS,
                col_len,
                ib_ind: table.n_def as usize,
                version_added: 0,
                version_dropped: 0,
                phy_pos: PHY_POS_UNDEF,
                se_explicit: true,
                ..ColumnDef::default()
            };
            table.col_defs.push(row_id_col);
            table.ib_cols.push(table.col_defs.len() - 1);
            table.n_def += 1;
        }
    }
    Ok(())
}

fn precheck_index(table: &TableDef, idx: &mut IndexDef) {
    if idx.idx_type == IndexTypes::IT_FULLTEXT {
        idx.unsupported |= UNSUPP_INDEX_MASK_FTS;
    }
    if idx.idx_type == IndexTypes::IT_SPATIAL {
        idx.unsupported |= UNSUPP_INDEX_MASK_SPATIAL;
    }
    for ele in &idx.elements {
        if ele.hidden {
            continue;
        }
        if table.col_defs[ele.column_opx].is_virtual {
            idx.unsupported |= UNSUPP_INDEX_MASK_VIRTUAL;
            break;
        }
    }
}

fn fill_index(table: &mut TableDef, ind: usize) -> Result<()> {
    let mut idx = std::mem::take(&mut table.idx_defs[ind]);

    idx.user_defined_key_parts = 0;
    idx.key_length = 0;
    for ele in &idx.elements {
        if ele.hidden {
            continue;
        }
        idx.user_defined_key_parts += 1;
        idx.key_length += ele.ele_len;
    }
    idx.flags = match idx.idx_type {
        IndexTypes::IT_MULTIPLE => 0,
        IndexTypes::IT_FULLTEXT => HA_FULLTEXT,
        IndexTypes::IT_SPATIAL => HA_SPATIAL,
        IndexTypes::IT_PRIMARY | IndexTypes::IT_UNIQUE => HA_NOSAME,
        IndexTypes::UNDEF => {
            return Err(IbdError::Internal(format!(
                "index {} has no type",
                idx.idx_name
            )))
        }
    };

    let ret = fill_se_index(table, &mut idx, ind);
    table.idx_defs[ind] = idx;
    ret
}

fn index_add_col(table: &TableDef, idx: &mut IndexDef, col_opx: usize, prefix_len: u32) {
    let col = &table.col_defs[col_opx];
    let mut fixed_len = if (idx.ib_type & DICT_SPATIAL) != 0
        && matches!(col.mtype, SeTypes::DATA_POINT | SeTypes::DATA_VAR_POINT)
        && idx.n_def == 0
    {
        DATA_MBR_LEN
    } else {
        col.get_fixed_size()
    };

    if prefix_len != 0 && fixed_len > prefix_len {
        fixed_len = prefix_len;
    }
    if fixed_len > DICT_MAX_FIXED_COL_LEN {
        fixed_len = 0;
    }

    idx.fields.push(IndexFieldDef {
        column_opx: col_opx,
        fixed_len,
    });
    idx.n_def += 1;

    if col.is_nullable && !col.is_instant_dropped() {
        idx.n_nullable += 1;
    }
}

fn fill_se_index(table: &mut TableDef, idx: &mut IndexDef, ind: usize) -> Result<()> {
    precheck_index(table, idx);
    if !idx.is_supported() {
        return Ok(());
    }

    idx.n_fields = idx.user_defined_key_parts;
    idx.n_uniq = idx.n_fields;
    if ind == 0 {
        if (idx.flags & HA_NOSAME) == 0 {
            return Err(IbdError::Internal(format!(
                "first index {} of {} is not unique-capable",
                idx.idx_name, table.tab_name
            )));
        }
        // dd hidden == true means there is no explicit primary index; the
        // generated one is DICT_CLUSTERED only, consistent with InnoDB.
        idx.ib_type = if idx.hidden {
            DICT_CLUSTERED
        } else {
            DICT_CLUSTERED | DICT_UNIQUE
        };
    } else {
        idx.ib_type = if (idx.flags & HA_NOSAME) != 0 {
            DICT_UNIQUE
        } else {
            0
        };
    }

    idx.n_def = 0;
    idx.n_nullable = 0;
    idx.fields.clear();
    idx.nullables = vec![0; (MAX_ROW_VERSION + 1) as usize];

    let eles: Vec<(usize, bool, u32)> = idx
        .elements
        .iter()
        .map(|e| (e.column_opx, e.hidden, e.ele_len))
        .collect();
    for &(col_opx, hidden, ele_len) in &eles {
        if hidden {
            continue;
        }
        index_add_col(table, idx, col_opx, ele_len);
    }

    // The FTS_DOC_ID_INDEX elements in the SDI reference the dictionary's
    // FTS_DOC_ID column, which lacks SE attributes; rebind them to the copy
    // built into the physical column vector.
    if idx.idx_name == FTS_DOC_ID_INDEX_NAME {
        let doc_opx = table
            .ib_cols
            .iter()
            .copied()
            .find(|&opx| table.col_defs[opx].col_name == FTS_DOC_ID_COL_NAME);
        for ele in &mut idx.elements {
            if table.col_defs[ele.column_opx].col_name == FTS_DOC_ID_COL_NAME {
                if let Some(doc_opx) = doc_opx {
                    ele.column_opx = doc_opx;
                }
            }
        }
        let hidden_eles: Vec<usize> = idx
            .elements
            .iter()
            .filter(|e| e.hidden)
            .map(|e| e.column_opx)
            .collect();
        for col_opx in hidden_eles {
            index_add_col(table, idx, col_opx, 0);
        }
    }

    if idx.is_clustered() {
        fill_se_clust_index(table, idx, ind)?;
    } else {
        fill_se_sec_index(table, idx)?;
    }

    idx.ib_id = idx.se_private_data.get_u64("id").unwrap_or(0);
    idx.ib_page = idx.se_private_data.get_u32("root").unwrap_or(0);

    idx.n_fields = idx.n_def;
    if idx.is_clustered() && table.has_row_versions() {
        idx.n_fields = idx.n_def - table.get_n_instant_drop_cols();
    }

    idx.n_total_fields = idx.n_def;
    idx.row_versions = false;
    idx.instant_cols = false;
    idx.n_instant_nullable = idx.n_nullable;
    if idx.is_clustered() {
        idx.row_versions = table.has_row_versions();
        if table.has_instant_cols() {
            idx.instant_cols = true;
            let n_instant_fields = idx.get_n_original_fields(table);
            idx.n_instant_nullable = idx.calculate_n_instant_nullable(table, n_instant_fields);
        }
    }
    Ok(())
}

fn assign_phy_pos(table: &mut TableDef, col_opx: usize, pos: u32) -> Result<()> {
    if !table.has_row_versions() {
        table.col_defs[col_opx].phy_pos = pos;
    } else if table.col_defs[col_opx].phy_pos == PHY_POS_UNDEF {
        return Err(IbdError::Internal(format!(
            "column {} of row-versioned table has no physical_pos",
            table.col_defs[col_opx].col_name
        )));
    }
    Ok(())
}

fn fill_se_clust_index(table: &mut TableDef, idx: &mut IndexDef, ind: usize) -> Result<()> {
    idx.n_user_defined_cols = idx.user_defined_key_parts;
    if !idx.is_unique() {
        idx.n_uniq += 1;
    }

    let mut n_fields_processed: u32 = 0;
    while n_fields_processed < idx.n_def {
        let col_opx = idx.fields[n_fields_processed as usize].column_opx;
        assign_phy_pos(table, col_opx, n_fields_processed)?;
        n_fields_processed += 1;
    }

    let mut found_db_row_id = false;
    let mut found_db_trx_id = false;
    let mut found_db_roll_ptr = false;
    for opx in table.ib_cols.clone() {
        let name = table.col_defs[opx].col_name.clone();
        let wanted = match name.as_str() {
            ROW_ID_COL_NAME => !idx.is_unique(),
            TRX_ID_COL_NAME | ROLL_PTR_COL_NAME => true,
            _ => false,
        };
        if !wanted {
            continue;
        }
        match name.as_str() {
            ROW_ID_COL_NAME => found_db_row_id = true,
            TRX_ID_COL_NAME => found_db_trx_id = true,
            _ => found_db_roll_ptr = true,
        }
        assign_phy_pos(table, opx, n_fields_processed)?;
        index_add_col(table, idx, opx, 0);
        n_fields_processed += 1;
        idx.n_fields += 1;
    }
    if !((idx.is_unique() || found_db_row_id) && found_db_trx_id && found_db_roll_ptr) {
        return Err(IbdError::Internal(format!(
            "system columns missing while building clustered index of {}",
            table.tab_name
        )));
    }

    let mut indexed = vec![false; table.get_total_cols() as usize];
    for field in &idx.fields {
        indexed[table.col_defs[field.column_opx].ib_ind] = true;
    }
    for i in 0..(table.n_cols - DATA_N_SYS_COLS) as usize {
        let opx = table.ib_cols[i];
        if table.col_defs[opx].mtype == SeTypes::DATA_SYS {
            return Err(IbdError::Internal(format!(
                "unexpected system column in user slot {} of {}",
                i, table.tab_name
            )));
        }
        if indexed[table.col_defs[opx].ib_ind] {
            continue;
        }
        assign_phy_pos(table, opx, n_fields_processed)?;
        index_add_col(table, idx, opx, 0);
        n_fields_processed += 1;
        idx.n_fields += 1;
    }
    // dropped columns go last and do not count into n_fields
    for i in (table.n_cols as usize)..(table.get_total_cols() as usize) {
        let opx = table.ib_cols[i];
        index_add_col(table, idx, opx, 0);
        n_fields_processed += 1;
    }

    if !table.is_system_table {
        idx.fields_array.clear();
        idx.nullables = vec![0; (MAX_ROW_VERSION + 1) as usize];
        if table.has_row_versions() {
            idx.fields_array = vec![0u16; idx.n_def as usize];
            for i in 0..idx.n_def as usize {
                let phy_pos = table.col_defs[idx.fields[i].column_opx].phy_pos as usize;
                if phy_pos >= idx.fields_array.len() {
                    return Err(IbdError::CorruptSdi(format!(
                        "physical_pos {} out of range in table {}",
                        phy_pos, table.tab_name
                    )));
                }
                idx.fields_array[phy_pos] = i as u16;
            }

            let current_row_version = table.current_row_version;
            for i in 0..idx.n_def as usize {
                let col = &table.col_defs[idx.fields[i].column_opx];
                if col.is_system_column() || !col.is_nullable {
                    continue;
                }
                let start_from = if col.is_instant_added() {
                    col.version_added
                } else {
                    0
                };
                for v in start_from..=current_row_version {
                    idx.nullables[v as usize] += 1;
                }
                if col.is_instant_dropped() {
                    for v in col.version_dropped..=current_row_version {
                        if idx.nullables[v as usize] == 0 {
                            return Err(IbdError::Internal(format!(
                                "nullable count underflow at version {} of {}",
                                v, table.tab_name
                            )));
                        }
                        idx.nullables[v as usize] -= 1;
                    }
                }
            }
        }
    }

    if table.clust_idx.is_some() {
        return Err(IbdError::Internal(format!(
            "table {} has more than one clustered index",
            table.tab_name
        )));
    }
    table.clust_idx = Some(ind);
    Ok(())
}

fn fill_se_sec_index(table: &mut TableDef, idx: &mut IndexDef) -> Result<()> {
    idx.n_user_defined_cols = idx.user_defined_key_parts;

    let mut indexed = vec![false; table.get_total_cols() as usize];
    for field in &idx.fields {
        let col = &table.col_defs[field.column_opx];
        if col.is_virtual {
            continue;
        }
        indexed[col.ib_ind] = true;
    }

    let clust = table.clust_index().ok_or_else(|| {
        IbdError::Internal(format!(
            "secondary index {} built before the clustered index",
            idx.idx_name
        ))
    })?;
    let clust_key_opxs: Vec<usize> = clust
        .fields
        .iter()
        .take(clust.n_uniq as usize)
        .map(|f| f.column_opx)
        .collect();
    for col_opx in clust_key_opxs {
        if !indexed[table.col_defs[col_opx].ib_ind] {
            index_add_col(table, idx, col_opx, 0);
        }
    }

    // at this point n_fields still holds the user-defined key part count
    idx.n_uniq = if idx.is_unique() {
        idx.n_fields
    } else {
        idx.n_def
    };
    idx.n_fields = idx.n_def;
    Ok(())
}
