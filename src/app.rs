use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use bytes::Bytes;
use clap::Subcommand;
use colored::Colorize;
use log::{debug, info};

use crate::ibd::record::{REC_OFFS_DEFAULT, REC_OFFS_DROP, REC_OFFS_SQL_NULL};
use crate::ibd::walk::{IndexReport, Inspector, PageReport, RecordReport};

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List supported tables and their supported indexes
    List {
        /// Include unsupported tables and indexes, with the reasons
        #[arg(short, long, default_value_t = false)]
        all: bool,
    },

    /// Print the SDI json documents
    Sdi,

    /// Show the leftmost page number at each level of an index
    Leftmost {
        /// The index id, see the list command
        index_id: u64,
    },

    /// Analyze every supported index of a table
    Table {
        /// The table id, see the list command
        table_id: u64,
    },

    /// Analyze an index, walking all of its levels
    Index {
        /// The index id, see the list command
        index_id: u64,
    },

    /// Parse a single INDEX page and its records
    Page {
        /// The page number, starts from 0
        page_no: u32,

        /// Skip printing per-record details
        #[arg(short, long, default_value_t = false)]
        no_print_record: bool,
    },
}

#[derive(Debug)]
pub struct App {
    pub timer: Instant,
    pub input: PathBuf,
}

impl App {
    pub fn new(input: PathBuf) -> Self {
        Self {
            timer: Instant::now(),
            input,
        }
    }

    pub fn time_costs(&self) -> Duration {
        self.timer.elapsed()
    }

    pub fn run(&mut self, command: Commands) -> Result<()> {
        debug!("{:?}, {:?}", command, self);

        let inspector = Inspector::load(self.input.clone())?;
        self.do_banner(&inspector);

        match command {
            Commands::List { all } => self.do_list(&inspector, all),
            Commands::Sdi => self.do_sdi(&inspector),
            Commands::Leftmost { index_id } => self.do_leftmost(&inspector, index_id)?,
            Commands::Table { table_id } => self.do_table(&inspector, table_id)?,
            Commands::Index { index_id } => self.do_index(&inspector, index_id)?,
            Commands::Page {
                page_no,
                no_print_record,
            } => self.do_page(&inspector, page_no, no_print_record)?,
        }

        Ok(())
    }

    fn do_banner(&self, inspector: &Inspector) {
        let space = &inspector.space;
        println!("File Information:");
        println!("{:>24} => {:?}", "file name".green(), space.target);
        println!("{:>24} => {} B", "file size".green(), space.size.to_string().blue());
        println!("{:>24} => {}", "space id".green(), space.space_id.to_string().blue());
        println!(
            "{:>24} => [logical: {} B], [physical: {} B]",
            "page size".green(),
            space.logical_size.to_string().blue(),
            space.physical_size.to_string().blue()
        );
        println!("{:>24} => {}", "total pages".green(), space.n_pages.to_string().blue());
        println!("{:>24} => {}", "sdi root page".green(), space.sdi_root.to_string().blue());
        println!(
            "{:>24} => post_antelope={}, atomic_blobs={}, data_dir={}, shared={}, sdi={}",
            "flags".green(),
            space.flags.post_antelope,
            space.flags.atomic_blobs,
            space.flags.data_dir,
            space.flags.shared,
            space.flags.sdi,
        );
        info!(
            "successfully loaded {} tables with {} indexes",
            inspector.tables.len(),
            inspector.indexes.len()
        );
        println!();
    }

    fn do_list(&self, inspector: &Inspector, all: bool) {
        if all {
            println!("Listing all tables and indexes in the datafile:");
            for table in &inspector.all_tables {
                println!("---------------------------------------");
                let mark = if table.is_supported() {
                    String::new()
                } else {
                    format!(" unsupported: {}", table.unsupported_reason().red())
                };
                println!(
                    "[Table] name: {}.{}{}",
                    table.schema_ref.magenta(),
                    table.tab_name.magenta(),
                    mark
                );
                for idx in &table.idx_defs {
                    let mark = if idx.is_supported() {
                        String::new()
                    } else {
                        format!(" unsupported: {}", idx.unsupported_reason().red())
                    };
                    println!("        [Index] name: {}{}", idx.idx_name.cyan(), mark);
                }
            }
            return;
        }

        println!("Listing all *supported* tables and indexes in the datafile:");
        for (id, table) in &inspector.tables {
            println!("---------------------------------------");
            println!(
                "[Table] id: {:<7} name: {}.{}",
                id.to_string().blue(),
                table.schema_ref.magenta(),
                table.tab_name.magenta()
            );
            for idx in &table.idx_defs {
                if !idx.is_supported() || !inspector.indexes.contains_key(&idx.ib_id) {
                    continue;
                }
                println!(
                    "        [Index] id: {:<7} root page: {:<7} name: {}",
                    idx.ib_id.to_string().blue(),
                    idx.ib_page.to_string().yellow(),
                    idx.idx_name.cyan()
                );
            }
        }
    }

    fn do_sdi(&self, inspector: &Inspector) {
        for doc in &inspector.documents {
            println!(
                "[SDI] type={}, id={}",
                doc.sdi_type.to_string().green(),
                doc.sdi_id.to_string().blue()
            );
            match jsonxf::pretty_print(&doc.json) {
                Ok(pretty) => println!("{}", pretty),
                Err(_) => println!("{}", doc.json),
            }
        }
    }

    fn do_leftmost(&self, inspector: &Inspector, index_id: u64) -> Result<()> {
        let (table, index) = inspector
            .get_index(index_id)
            .ok_or_else(|| anyhow::anyhow!("no index with id {} was found", index_id))?;
        let pages = inspector.leftmost_pages(table.as_ref(), index)?;

        println!("---------------------------------------");
        println!(
            "Table name: {}.{}",
            table.schema_ref.magenta(),
            table.tab_name.magenta()
        );
        println!("Index name: {}", index.idx_name.cyan());
        let mut level = pages.len();
        for page_no in pages {
            level -= 1;
            println!("  Level {} => page {}", level, page_no.to_string().yellow());
        }
        Ok(())
    }

    fn do_table(&self, inspector: &Inspector, table_id: u64) -> Result<()> {
        let table = inspector
            .tables
            .get(&table_id)
            .ok_or_else(|| anyhow::anyhow!("no table with id {} was found", table_id))?;
        println!("Table Analysis:");
        println!(
            "{:>24} => {}.{}",
            "table name".green(),
            table.schema_ref.magenta(),
            table.tab_name.magenta()
        );
        println!("{:>24} => {}", "table id".green(), table.ib_id.to_string().blue());
        println!(
            "{:>24} => {}",
            "number of indexes".green(),
            table.idx_defs.len().to_string().blue()
        );

        for report in inspector.parse_table(table_id)? {
            Self::print_index_report(&report);
        }
        Ok(())
    }

    fn do_index(&self, inspector: &Inspector, index_id: u64) -> Result<()> {
        let report = inspector.parse_index(index_id)?;
        Self::print_index_report(&report);
        Ok(())
    }

    fn do_page(&self, inspector: &Inspector, page_no: u32, no_print_record: bool) -> Result<()> {
        let report = inspector.parse_page(page_no, None, !no_print_record)?;
        Self::print_page_report(&report, inspector.space.physical_size);
        Ok(())
    }

    fn ratio(part: u32, total: usize) -> String {
        format!("{:.5} %", part as f64 / total as f64 * 100.0)
    }

    fn print_index_report(report: &IndexReport) {
        let stats = &report.stats;
        let page_size = report.physical_size;

        println!();
        println!("Index Analysis:");
        println!("{:>24} => {}", "index name".green(), report.index_name.cyan());
        println!("{:>24} => {}", "index id".green(), report.index_id.to_string().blue());
        println!(
            "{:>24} => {}.{}",
            "belongs to".green(),
            report.schema.magenta(),
            report.table.magenta()
        );
        println!(
            "{:>24} => {}",
            "root page".green(),
            report.root_page_no.to_string().yellow()
        );
        println!("{:>24} => {}", "number of fields".green(), report.n_fields.to_string().blue());
        println!(
            "{:>24} => {}",
            "number of levels".green(),
            report.stats.n_levels.to_string().blue()
        );
        println!(
            "{:>24} => {} [non-leaf: {}] [leaf: {}]",
            "number of pages".green(),
            (stats.n_pages_non_leaf + stats.n_pages_leaf).to_string().blue(),
            stats.n_pages_non_leaf.to_string().blue(),
            stats.n_pages_leaf.to_string().blue()
        );

        if stats.n_levels > 1 {
            let total = stats.n_pages_non_leaf as usize * page_size;
            println!("  -------- non-leaf levels --------");
            println!(
                "{:>24} => {} ({} B)",
                "pages".green(),
                stats.n_pages_non_leaf.to_string().blue(),
                total.to_string().blue()
            );
            println!(
                "{:>24} => {} [headers: {} B] [bodies: {} B] ({})",
                "valid records".green(),
                stats.recs.n_recs_non_leaf.to_string().blue(),
                stats.recs.headers_len_non_leaf.to_string().blue(),
                stats.recs.recs_len_non_leaf.to_string().blue(),
                Self::ratio(stats.recs.headers_len_non_leaf + stats.recs.recs_len_non_leaf, total)
                    .yellow()
            );
            println!(
                "{:>24} => {} ({} B, {})",
                "delete-marked records".green(),
                stats.recs.n_deleted_recs_non_leaf.to_string().blue(),
                stats.recs.deleted_recs_len_non_leaf.to_string().blue(),
                Self::ratio(stats.recs.deleted_recs_len_non_leaf, total).yellow()
            );
            println!(
                "{:>24} => {} B ({})",
                "innodb internal space".green(),
                stats.recs.innodb_internal_used_non_leaf.to_string().blue(),
                Self::ratio(stats.recs.innodb_internal_used_non_leaf, total).yellow()
            );
            println!(
                "{:>24} => {} B ({})",
                "free space".green(),
                stats.recs.free_non_leaf.to_string().blue(),
                Self::ratio(stats.recs.free_non_leaf, total).yellow()
            );
        }

        let total = stats.n_pages_leaf as usize * page_size;
        println!("  -------- leaf level --------");
        println!(
            "{:>24} => {} ({} B)",
            "pages".green(),
            stats.n_pages_leaf.to_string().blue(),
            total.to_string().blue()
        );
        println!(
            "{:>24} => {} [headers: {} B] [bodies: {} B] ({})",
            "valid records".green(),
            stats.recs.n_recs_leaf.to_string().blue(),
            stats.recs.headers_len_leaf.to_string().blue(),
            stats.recs.recs_len_leaf.to_string().blue(),
            Self::ratio(stats.recs.headers_len_leaf + stats.recs.recs_len_leaf, total).yellow()
        );
        println!(
            "{:>24} => {} ({} B, {})",
            "records w/ dropped cols".green(),
            stats.recs.n_contain_dropped_cols_recs_leaf.to_string().blue(),
            stats.recs.dropped_cols_len_leaf.to_string().blue(),
            Self::ratio(stats.recs.dropped_cols_len_leaf, total).yellow()
        );
        println!(
            "{:>24} => {} ({} B, {})",
            "delete-marked records".green(),
            stats.recs.n_deleted_recs_leaf.to_string().blue(),
            stats.recs.deleted_recs_len_leaf.to_string().blue(),
            Self::ratio(stats.recs.deleted_recs_len_leaf, total).yellow()
        );
        println!(
            "{:>24} => {} B ({})",
            "innodb internal space".green(),
            stats.recs.innodb_internal_used_leaf.to_string().blue(),
            Self::ratio(stats.recs.innodb_internal_used_leaf, total).yellow()
        );
        println!(
            "{:>24} => {} B ({})",
            "free space".green(),
            stats.recs.free_leaf.to_string().blue(),
            Self::ratio(stats.recs.free_leaf, total).yellow()
        );
    }

    fn print_page_report(report: &PageReport, page_size: usize) {
        println!("Page Information:");
        println!("{:>24} => {}", "page no".green(), report.page_no.to_string().yellow());
        let sibling = |p: u32| {
            if p == u32::MAX {
                "NULL".to_string()
            } else {
                p.to_string()
            }
        };
        println!(
            "{:>24} => {} [{}] {}",
            "sibling pages".green(),
            sibling(report.fil.prev_page).yellow(),
            report.page_no.to_string().yellow(),
            sibling(report.fil.next_page).yellow()
        );
        println!("{:>24} => {}", "space id".green(), report.fil.space_id.to_string().blue());
        println!("{:>24} => {}", "page type".green(), report.fil.page_type.to_string().cyan());
        println!("{:>24} => {}", "lsn".green(), report.fil.lsn.to_string().blue());
        println!("{:>24} => {}", "page level".green(), report.hdr.level.to_string().blue());
        println!("{:>24} => {}", "number of records".green(), report.hdr.n_recs.to_string().blue());
        println!("{:>24} => {}", "index id".green(), report.hdr.index_id.to_string().blue());
        println!(
            "{:>24} => [table: {}.{}] [index: {}]",
            "belongs to".green(),
            report.schema.magenta(),
            report.table.magenta(),
            report.index.cyan()
        );
        println!("{:>24} => {}", "row format".green(), report.row_format.blue());
        println!("{:>24} => {}", "number dir slots".green(), report.hdr.n_dir_slots.to_string().blue());
        println!("{:>24} => {}", "heap top".green(), report.hdr.heap_top.to_string().blue());
        println!("{:>24} => {}", "first free rec".green(), report.hdr.free.to_string().blue());
        println!("{:>24} => {} B", "garbage".green(), report.hdr.garbage.to_string().blue());
        println!("{:>24} => {}", "max trx id".green(), report.hdr.max_trx_id.to_string().blue());

        if !report.records.is_empty() {
            println!();
            println!("Records Information:");
            for rec in &report.records {
                Self::print_record_report(rec);
            }
        }

        let stats = &report.stats;
        let (n_recs, headers, bodies, n_del, del_len, internal, free) = if report.leaf {
            (
                stats.n_recs_leaf,
                stats.headers_len_leaf,
                stats.recs_len_leaf,
                stats.n_deleted_recs_leaf,
                stats.deleted_recs_len_leaf,
                stats.innodb_internal_used_leaf,
                stats.free_leaf,
            )
        } else {
            (
                stats.n_recs_non_leaf,
                stats.headers_len_non_leaf,
                stats.recs_len_non_leaf,
                stats.n_deleted_recs_non_leaf,
                stats.deleted_recs_len_non_leaf,
                stats.innodb_internal_used_non_leaf,
                stats.free_non_leaf,
            )
        };

        println!();
        println!("Page Analysis:");
        println!(
            "{:>24} => {} ({} B = {} + {}, {})",
            "valid records".green(),
            n_recs.to_string().blue(),
            (headers + bodies).to_string().blue(),
            headers,
            bodies,
            Self::ratio(headers + bodies, page_size).yellow()
        );
        if report.leaf {
            println!(
                "{:>24} => {} ({} B, {})",
                "records w/ dropped cols".green(),
                stats.n_contain_dropped_cols_recs_leaf.to_string().blue(),
                stats.dropped_cols_len_leaf.to_string().blue(),
                Self::ratio(stats.dropped_cols_len_leaf, page_size).yellow()
            );
        }
        println!(
            "{:>24} => {} ({} B, {})",
            "delete-marked records".green(),
            n_del.to_string().blue(),
            del_len.to_string().blue(),
            Self::ratio(del_len, page_size).yellow()
        );
        println!(
            "{:>24} => {} B ({})",
            "innodb internal space".green(),
            internal.to_string().blue(),
            Self::ratio(internal, page_size).yellow()
        );
        println!(
            "{:>24} => {} B ({})",
            "free space".green(),
            free.to_string().blue(),
            Self::ratio(free, page_size).yellow()
        );
    }

    fn print_record_report(rec: &RecordReport) {
        println!("------------------------------------------------------------------");
        println!(
            "[ROW {}] length: {} ({} + {}), fields: {}{}",
            rec.row_no.to_string().red(),
            (rec.header_len + rec.body_len).to_string().blue(),
            rec.header_len,
            rec.body_len,
            rec.fields.len().to_string().blue(),
            if rec.deleted {
                " [DELETE MARKED]".red().to_string()
            } else {
                String::new()
            }
        );
        println!("  [HEADER   ] {}", Self::hex_dump(&rec.header_bytes).yellow());
        for (i, field) in rec.fields.iter().enumerate() {
            println!(
                "  [FIELD {:>3}] name  : {}",
                i + 1,
                if field.node_ptr {
                    field.name.yellow()
                } else {
                    field.name.magenta()
                }
            );
            if !field.node_ptr {
                println!(
                    "              type  : {:<15} | {:<12} | {}",
                    field.utf8_type.green(),
                    field.field_type.blue(),
                    field.se_type.cyan()
                );
            }
            println!("              length: {}", field.len.to_string().blue());
            let value = if (field.word & REC_OFFS_SQL_NULL) != 0 {
                "*NULL*".red().to_string()
            } else if (field.word & REC_OFFS_DROP) != 0 {
                format!(
                    "{} (this row was inserted after the column was instantly dropped)",
                    "*NULL*".red()
                )
            } else if (field.word & REC_OFFS_DEFAULT) != 0 {
                format!(
                    "{} (this row was inserted before the column was instantly added)",
                    "*DEFAULT*".yellow()
                )
            } else {
                match &field.bytes {
                    Some(bytes) => Self::hex_dump(bytes),
                    None => String::new(),
                }
            };
            println!("              value : {}", value);
            if let Some(ext_len) = field.ext_len {
                println!(
                    "              ({} more bytes have been offloaded externally)",
                    ext_len.to_string().red()
                );
            }
        }
    }

    fn hex_dump(bytes: &Bytes) -> String {
        bytes
            .chunks(8)
            .map(|chunk| {
                chunk
                    .iter()
                    .map(|b| hex::encode([*b]))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("  ")
    }
}
