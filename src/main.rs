use std::{collections::HashMap, fs::File, io::Write, path::Path};

use pxread::{
    config::ReadOptions,
    executor::scan::Scanner,
    storage::{table::ParadoxTable, view::read_view},
    types::{error::DatabaseError, field::Field, value::Value},
};
use rustyline::{DefaultEditor, Result, error::ReadlineError};

const HISTORY_FILE: &str = ".pxread_history";
const DEFAULT_SCAN_LIMIT: usize = 20;

fn welcome_message() -> String {
    format!(
        "pxread {}\nParadox table inspector. Type 'help' for commands.",
        env!("CARGO_PKG_VERSION")
    )
}

fn read_multiline_command(rl: &mut DefaultEditor) -> Result<String> {
    let mut input = String::new();
    let mut prompt = "pxread> ".to_string();

    loop {
        let line = rl.readline(&prompt)?;
        let trimmed_line = line.trim_end();

        // Trailing backslash continues the command
        if let Some(without_backslash) = trimmed_line.strip_suffix('\\') {
            input.push_str(without_backslash);
            input.push(' ');
            prompt = "     -> ".to_string();
        } else {
            input.push_str(trimmed_line);
            break;
        }
    }

    Ok(input)
}

fn print_header(table: &ParadoxTable) {
    let header = table.header();
    println!("file:          {}", header.file_name);
    println!("table name:    {}", header.table_name);
    println!("version:       0x{:02X}", header.version_id);
    println!("code page:     {} ({})", header.code_page, header.charset);
    println!("record size:   {}", header.record_size);
    println!("header size:   {}", header.header_size);
    println!("block size:    {} KiB", header.block_size);
    println!(
        "rows/blocks:   {} rows, {} used / {} total blocks",
        header.row_count, header.used_blocks, header.total_blocks
    );
    println!("first/last:    {} / {}", header.first_block, header.last_block);
    println!("auto inc:      {}", header.auto_increment_value);
    println!("encrypted:     {}", header.is_encrypted());
    if let Some(sort) = &header.sort_order_id {
        println!("sort order:    {sort}");
    }
    println!("fields:");
    for field in &header.fields {
        let type_name = field
            .field_type()
            .map(|t| format!("{:?}", t))
            .unwrap_or_else(|| format!("0x{:02X}", field.type_tag));
        println!("  {:>3} {:<24} {:<14} {}", field.order, field.name, type_name, field.size);
    }
    for warning in &header.warnings {
        println!("warning: {warning}");
    }
}

fn print_rows(table: &ParadoxTable, limit: usize) -> std::result::Result<(), DatabaseError> {
    let mut scanner = table.scanner(None)?;
    let mut blobs = table.blob_session();
    let names: Vec<String> = scanner.fields().iter().map(|f| f.name.clone()).collect();
    println!("{}", names.join(" | "));

    for row in scanner.scan_batch(limit)? {
        let cells: Vec<String> = row
            .values
            .iter()
            .map(|value| match value {
                Value::Lob(lob) if lob.text => blobs
                    .resolve_text(lob, table.charset())
                    .unwrap_or_else(|e| format!("<{e}>")),
                other => other.to_string(),
            })
            .collect();
        println!("{:>5}: {}", row.row_id.unwrap_or_default(), cells.join(" | "));
    }
    Ok(())
}

fn print_indexes(table: &ParadoxTable) -> std::result::Result<(), DatabaseError> {
    match table.load_primary_key()? {
        Some(key) => {
            let names: Vec<&str> = key.fields().iter().map(|f| f.name.as_str()).collect();
            println!(
                "primary key: ({}) root={} levels={}",
                names.join(", "),
                key.index_root,
                key.index_levels
            );
        }
        None => println!("primary key: none"),
    }
    let indexes = table.load_indexes();
    for index in &indexes.value {
        let names: Vec<&str> = index.fields().iter().map(|f| f.name.as_str()).collect();
        println!(
            "index {}: ({}) sort={}",
            index.name.as_deref().unwrap_or(&index.header.file_name),
            names.join(", "),
            index.sort_order_id().unwrap_or("-")
        );
    }
    for warning in &indexes.warnings {
        println!("warning: {warning}");
    }
    Ok(())
}

fn print_validation(table: &ParadoxTable) {
    let validation = table.load_validation();
    match &validation.value {
        Some(data) => {
            for entry in &data.entries {
                let show = |v: &Option<Value>| {
                    v.as_ref()
                        .map(Value::to_string)
                        .unwrap_or_else(|| "-".to_string())
                };
                println!(
                    "{:<24} min={} max={} default={} mask={}",
                    entry.field_name,
                    show(&entry.minimum),
                    show(&entry.maximum),
                    show(&entry.default),
                    entry.mask.as_deref().unwrap_or("-")
                );
            }
        }
        None => println!("no validation data"),
    }
    for warning in &validation.warnings {
        println!("warning: {warning}");
    }
}

fn print_view(
    view_path: &str,
    tables: &[&str],
    options: &ReadOptions,
) -> std::result::Result<(), DatabaseError> {
    let mut catalog: HashMap<String, Vec<Field>> = HashMap::new();
    for path in tables {
        let table = ParadoxTable::open(path, options)?;
        let name = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string());
        catalog.insert(name, table.fields().to_vec());
    }

    let file = File::open(view_path)?;
    let view = read_view(file, view_path, &catalog, options.view_charset()?)?;
    if !view.value.valid {
        println!("{view_path} is not a query view");
        return Ok(());
    }
    if let Some(answer) = &view.value.answer_table {
        println!("answer: {answer}");
    }
    for field in view.value.output_fields() {
        println!(
            "{}->\"{}\"{}{}",
            field.table_name,
            field.field.name,
            field.alias.as_deref().map(|a| format!(" as {a}")).unwrap_or_default(),
            field.expression.as_deref().map(|e| format!(" [{e}]")).unwrap_or_default()
        );
    }
    for warning in &view.warnings {
        println!("warning: {warning}");
    }
    Ok(())
}

fn run_command(
    command: &str,
    args: &[&str],
    options: &ReadOptions,
) -> std::result::Result<(), DatabaseError> {
    let Some(path) = args.first() else {
        println!("usage: {command} <file>");
        return Ok(());
    };
    match command {
        "header" => print_header(&ParadoxTable::open(path, options)?),
        "scan" => {
            let limit = args
                .get(1)
                .and_then(|l| l.parse().ok())
                .unwrap_or(DEFAULT_SCAN_LIMIT);
            print_rows(&ParadoxTable::open(path, options)?, limit)?;
        }
        "index" => print_indexes(&ParadoxTable::open(path, options)?)?,
        "val" => print_validation(&ParadoxTable::open(path, options)?),
        "view" => print_view(path, &args[1..], options)?,
        other => println!("Unknown command '{other}'"),
    }
    Ok(())
}

fn process_command(command: &str, options: &ReadOptions) -> bool {
    let parts: Vec<&str> = command.split_whitespace().collect();
    let Some((first, args)) = parts.split_first() else {
        return true;
    };

    match first.to_lowercase().as_str() {
        "exit" | "quit" | "q" => {
            println!("Goodbye!");
            return false;
        }
        "help" | "h" => {
            println!(
                r#"
Available commands:
  header <table.db>               - Show the parsed table header
  scan <table.db> [limit]         - Print the first rows of a table
  index <table.db>                - Show primary key and secondary indexes
  val <table.db>                  - Show validation constraints
  view <query.qbe> [table.db...]  - Parse a saved query view
  help, h                         - Show this help message
  clear                           - Clear the screen
  exit, quit, q                   - Exit

Use '\' at the end of a line for multiline input.
Set RUST_LOG=debug to trace block and blob traversal.
"#
            );
        }
        "clear" => {
            print!("\x1B[2J\x1B[1;1H");
            let _ = std::io::stdout().flush();
        }
        cmd @ ("header" | "scan" | "index" | "val" | "view") => {
            if let Err(e) = run_command(cmd, args, options) {
                println!("Error: {e}");
            }
        }
        other => println!("Unknown command '{other}', type 'help'"),
    }

    true
}

fn load_options() -> std::result::Result<ReadOptions, DatabaseError> {
    let args: Vec<String> = std::env::args().collect();
    match args.iter().position(|a| a == "--config") {
        Some(i) => match args.get(i + 1) {
            Some(path) => ReadOptions::from_file(path),
            None => Err(DatabaseError::Config {
                details: "--config needs a path".to_string(),
            }),
        },
        None => Ok(ReadOptions::default()),
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let options = match load_options() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    println!("{}", welcome_message());

    let mut rl = DefaultEditor::new()?;
    if rl.load_history(HISTORY_FILE).is_err() {
        log::debug!("no command history at {HISTORY_FILE}");
    }

    loop {
        match read_multiline_command(&mut rl) {
            Ok(input) => {
                let command = input.trim().to_string();
                if !command.is_empty() {
                    rl.add_history_entry(&command)?;
                    if !process_command(&command, &options) {
                        break;
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Interrupted");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("EOF");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    let _ = rl.save_history(HISTORY_FILE);
    Ok(())
}
