use anyhow::Result;
use colored::Colorize;
use serde_json::Value;
use tabled::builder::Builder;
use tabled::settings::Style;

pub fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_table<I, R>(header: &[&str], rows: I)
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = String>,
{
    let mut builder = Builder::default();
    builder.push_record(header.iter().map(|h| h.to_string()));
    let mut empty = true;
    for row in rows {
        builder.push_record(row);
        empty = false;
    }
    if empty {
        println!("No rows.");
        return;
    }
    let table = builder.build().with(Style::rounded()).to_string();
    println!("{table}");
}

pub fn yes_no(flag: bool) -> String {
    if flag {
        "✓".green().to_string()
    } else {
        "✗".red().to_string()
    }
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}
