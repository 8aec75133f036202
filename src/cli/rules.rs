use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::db::open_sink;
use crate::error::Result;
use crate::fmt::truncate;
use crate::models::RawRule;
use crate::pattern_index::{PatternIndex, WILDCARD_KEY};
use crate::rules::{add_rule, load_rules};
use crate::settings::load_settings;

pub fn add(bank: &str, subject: &str, sender: &str, regex: &str, groups: &str) -> Result<()> {
    let settings = load_settings();
    let rule = RawRule {
        bank: bank.to_string(),
        subject: subject.to_string(),
        sender: sender.to_string(),
        body_regex: regex.to_string(),
        match_groups: groups.to_string(),
    };
    // Refuse a rule that would break the next scan.
    PatternIndex::build(std::slice::from_ref(&rule), settings.subject_key_len)?;

    let mut sink = open_sink(&settings.data_dir())?;
    add_rule(&mut sink, &rule)?;
    println!("Added rule for {bank}");
    Ok(())
}

pub fn list() -> Result<()> {
    let sink = open_sink(&load_settings().data_dir())?;
    let rules = load_rules(&sink)?;

    let mut table = Table::new();
    table.set_header(vec!["#", "Bank", "Subject", "Sender", "BodyRegex", "MatchGroups"]);
    for (i, r) in rules.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&r.bank),
            Cell::new(&r.subject),
            Cell::new(&r.sender),
            Cell::new(truncate(&r.body_regex, 48)),
            Cell::new(&r.match_groups),
        ]);
    }
    println!("Rules\n{table}");
    Ok(())
}

pub fn check() -> Result<()> {
    let settings = load_settings();
    let sink = open_sink(&settings.data_dir())?;
    let rules = load_rules(&sink)?;
    let index = PatternIndex::build(&rules, settings.subject_key_len)?;

    let mut table = Table::new();
    table.set_header(vec!["Key", "Rows", "Banks"]);
    for (key, bucket) in index.buckets() {
        let key_cell = if key == WILDCARD_KEY {
            Cell::new("(wildcard)".yellow().to_string())
        } else {
            Cell::new(key)
        };
        let rows: Vec<String> = bucket.iter().map(|r| r.row.to_string()).collect();
        let banks: Vec<&str> = bucket.iter().map(|r| r.bank.as_str()).collect();
        table.add_row(vec![key_cell, Cell::new(rows.join(", ")), Cell::new(banks.join(", "))]);
    }
    println!("{table}");
    println!(
        "{} {} rule(s) compiled, subject key length {}",
        "OK".green().bold(),
        index.len(),
        index.subject_key_len()
    );
    Ok(())
}
